//! Backward walk through the tour ring.
//!
//! The device appends tours to the ring as
//!
//! ```text
//! AA (start)  BB BB ... BB  CC (terminal)  DD (end)
//! ```
//!
//! and keeps a pointer to the record after the newest `DD`. The start and end
//! records point at each other, so the walk goes
//! `DD -> its AA -> record before that AA (previous DD) -> ...` until it finds
//! a record that is not an end record or arrives back where it started.

use crate::decoder::guard::{IntegrityGuard, Visit, expect_linked, expect_tag};
use crate::decoder::image::{RawImage, RecordBytes};
use crate::decoder::types::{DecodeError, DeviceProfile, FormatVariant, Offset, interval_from_code};

/// Contents of a start (`AA`) record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRecord {
    pub profile: DeviceProfile,
    pub time_interval: u16,
    pub end_pointer: Offset,
    pub minute: u8,
    pub hour: u8,
    pub day: u8,
    pub month: u8,
    pub start_distance: u32,
    pub start_altitude: i16,
    pub start_pulse: u8,
}

impl StartRecord {
    fn parse(record: &RecordBytes<'_>) -> Self {
        let mode = record.byte(1);
        Self {
            profile: DeviceProfile::from_id((mode & 0xF0) >> 4),
            time_interval: interval_from_code(mode & 0x0F),
            end_pointer: record.le16(2).into(),
            minute: record.byte(4),
            hour: record.byte(5),
            day: record.byte(6),
            month: record.byte(7),
            start_distance: record.le32(8),
            start_altitude: record.le16(12) as i16,
            start_pulse: record.byte(14),
        }
    }
}

/// Contents of an end (`DD`) record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRecord {
    pub start_pointer: Offset,
    pub distance: u16,
    pub altitude_up: u16,
    pub altitude_down: u16,
}

impl EndRecord {
    fn parse(record: &RecordBytes<'_>) -> Self {
        Self {
            start_pointer: record.le16(2).into(),
            distance: record.le16(8),
            altitude_up: record.le16(10),
            altitude_down: record.le16(12),
        }
    }
}

/// Either half of a boundary record pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryRecord {
    Start(StartRecord),
    End(EndRecord),
}

impl BoundaryRecord {
    /// Parse a boundary record; any other tag is structural corruption.
    pub fn parse(record: &RecordBytes<'_>, variant: &FormatVariant) -> Result<Self, DecodeError> {
        match record.tag() {
            tag if tag == variant.start_tag => Ok(BoundaryRecord::Start(StartRecord::parse(record))),
            tag if tag == variant.end_tag => Ok(BoundaryRecord::End(EndRecord::parse(record))),
            found => Err(DecodeError::StructuralCorruption {
                offset: record.offset,
                expected: variant.start_tag,
                found,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Continuation,
    Terminal,
}

/// A `BB` or `CC` record: shared metadata plus packed sample words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRecord {
    pub kind: SampleKind,
    pub temperature: i8,
    /// Cadence for continuation records, tour end time for the terminal record.
    pub cadence: u8,
    pub marker: u8,
    pub words: Vec<u16>,
}

impl SampleRecord {
    pub fn parse(record: &RecordBytes<'_>, variant: &FormatVariant) -> Self {
        let kind = if record.tag() == variant.terminal_tag {
            SampleKind::Terminal
        } else {
            SampleKind::Continuation
        };
        Self {
            kind,
            temperature: record.byte(1) as i8,
            cadence: record.byte(2),
            marker: record.byte(3),
            words: (0..variant.words_per_record())
                .map(|index| record.le16(4 + 2 * index))
                .collect(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == SampleKind::Terminal
    }
}

/// One validated tour location in the ring.
#[derive(Debug, Clone)]
pub struct SessionSpan {
    pub start_offset: Offset,
    pub end_offset: Offset,
    pub start: StartRecord,
    pub end: EndRecord,
    pub samples: Vec<SampleRecord>,
}

/// Offset arithmetic over the ring of one image.
#[derive(Debug, Clone, Copy)]
pub struct RecordCursor<'a> {
    image: &'a RawImage,
    variant: FormatVariant,
}

impl<'a> RecordCursor<'a> {
    pub fn new(image: &'a RawImage) -> Self {
        Self {
            image,
            variant: *image.variant(),
        }
    }

    /// Offset of the record the device would write next.
    pub fn locate_newest_free_slot(&self) -> Result<Offset, DecodeError> {
        let offset = Offset::from(self.image.read_le16(self.variant.next_free_pointer)?);
        if offset < self.variant.tour_data_start || offset >= self.variant.tour_data_end {
            return Err(DecodeError::OutOfRange {
                offset,
                len: self.variant.record_len,
            });
        }
        Ok(offset)
    }

    /// Step one record back, wrapping from the ring start to its last record.
    pub fn previous_boundary_offset(&self, offset: Offset) -> Offset {
        if offset < self.variant.tour_data_start + self.variant.record_len {
            self.variant.tour_data_end - self.variant.record_len
        } else {
            offset - self.variant.record_len
        }
    }

    /// Step one record forward, wrapping from the ring end to its start.
    pub fn next_record_offset(&self, offset: Offset) -> Offset {
        let next = offset + self.variant.record_len;
        if next >= self.variant.tour_data_end {
            self.variant.tour_data_start
        } else {
            next
        }
    }

    /// Whether `offset` is the first byte of a record inside the ring.
    pub fn is_record_offset(&self, offset: Offset) -> bool {
        offset >= self.variant.tour_data_start
            && offset + self.variant.record_len <= self.variant.tour_data_end
            && (offset - self.variant.tour_data_start) % self.variant.record_len == 0
    }

    pub fn read_boundary(&self, offset: Offset) -> Result<BoundaryRecord, DecodeError> {
        BoundaryRecord::parse(&self.image.read_record(offset)?, &self.variant)
    }

    /// Read sample records following the start record up to and including
    /// the terminal record. Returns them with the offset after the terminal.
    pub fn read_samples(
        &self,
        start_offset: Offset,
    ) -> Result<(Vec<SampleRecord>, Offset), DecodeError> {
        let mut offset = self.next_record_offset(start_offset);
        let mut records = Vec::new();

        for _ in 0..self.variant.ring_capacity() {
            let record = self.image.read_record(offset)?;
            if record.tag() == self.variant.start_tag || record.tag() == self.variant.end_tag {
                return Err(DecodeError::StructuralCorruption {
                    offset,
                    expected: self.variant.terminal_tag,
                    found: record.tag(),
                });
            }

            let sample = SampleRecord::parse(&record, &self.variant);
            offset = self.next_record_offset(offset);
            let terminal = sample.is_terminal();
            records.push(sample);
            if terminal {
                return Ok((records, offset));
            }
        }

        Err(DecodeError::StructuralCorruption {
            offset: start_offset,
            expected: self.variant.terminal_tag,
            found: self.variant.start_tag,
        })
    }

    /// Iterate over tours from newest to oldest.
    pub fn walk(&self) -> Result<SessionWalk<'a>, DecodeError> {
        let origin = self.previous_boundary_offset(self.locate_newest_free_slot()?);
        Ok(SessionWalk {
            cursor: *self,
            guard: IntegrityGuard::new(origin, self.variant.ring_capacity()),
            next: Some(origin),
            pending: None,
            stop: None,
        })
    }
}

/// Why a [`SessionWalk`] ran out without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStop {
    EndOfData,
    RingClosed,
}

/// Iterator over validated tours, newest first.
///
/// An error is yielded at most once and ends the iteration.
#[derive(Debug)]
pub struct SessionWalk<'a> {
    cursor: RecordCursor<'a>,
    guard: IntegrityGuard,
    next: Option<Offset>,
    pending: Option<DecodeError>,
    stop: Option<WalkStop>,
}

impl SessionWalk<'_> {
    /// Set once the iterator is exhausted without an error.
    pub fn stop(&self) -> Option<WalkStop> {
        self.stop
    }

    fn step(&mut self, end_offset: Offset) -> Result<Option<SessionSpan>, DecodeError> {
        let variant = &self.cursor.variant;
        let end_record = self.cursor.image.read_record(end_offset)?;
        if end_record.tag() != variant.end_tag {
            return Ok(None);
        }
        let end = EndRecord::parse(&end_record);

        let start_offset = end.start_pointer;
        if !self.cursor.is_record_offset(start_offset) {
            // Whatever sits at a misaligned pointer is not a start record.
            let start_points_to = self
                .cursor
                .image
                .read_le16(start_offset + 2)
                .map(Offset::from)
                .unwrap_or_default();
            return Err(DecodeError::LinkIntegrityViolation {
                start_offset,
                start_points_to,
                end_offset,
                end_points_to: start_offset,
            });
        }
        let start = match self.cursor.read_boundary(start_offset)? {
            BoundaryRecord::Start(start) => start,
            BoundaryRecord::End(_) => {
                return Err(DecodeError::StructuralCorruption {
                    offset: start_offset,
                    expected: variant.start_tag,
                    found: variant.end_tag,
                });
            }
        };
        expect_linked(start_offset, start.end_pointer, end_offset, end.start_pointer)?;

        let (samples, after_terminal) = self.cursor.read_samples(start_offset)?;
        if after_terminal != end_offset {
            let trailing = self.cursor.image.read_record(after_terminal)?;
            expect_tag(&trailing, variant.end_tag)?;
            return Err(DecodeError::LinkIntegrityViolation {
                start_offset,
                start_points_to: start.end_pointer,
                end_offset: after_terminal,
                end_points_to: trailing.le16(2).into(),
            });
        }

        if let Err(error) = self.guard.record(end_offset) {
            self.pending = Some(error);
        } else {
            let previous = self.cursor.previous_boundary_offset(start_offset);
            match self.guard.visit(previous) {
                Visit::Origin => self.stop = Some(WalkStop::RingClosed),
                Visit::Continue => self.next = Some(previous),
            }
        }

        Ok(Some(SessionSpan {
            start_offset,
            end_offset,
            start,
            end,
            samples,
        }))
    }
}

impl Iterator for SessionWalk<'_> {
    type Item = Result<SessionSpan, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(error) = self.pending.take() {
            return Some(Err(error));
        }
        let end_offset = self.next.take()?;
        match self.step(end_offset) {
            Ok(Some(span)) => Some(Ok(span)),
            Ok(None) => {
                self.stop = Some(WalkStop::EndOfData);
                None
            }
            Err(error) => Some(Err(error)),
        }
    }
}
