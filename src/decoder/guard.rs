use crate::decoder::image::RecordBytes;
use crate::decoder::types::{DecodeError, Offset};

/// Result of visiting the next end-record offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    /// The walk is back at its first end record.
    Origin,
}

/// Tracks a backward walk through the ring and stops it when it cannot end.
///
/// Offsets shrink while the walk moves backward. Each wrap around the ring
/// end makes them jump up once, which is tolerated for the first two laps
/// through two checkpoints that may only decrease. A third lap means the
/// chain of back-pointers forms a cycle that never reaches the origin.
#[derive(Debug, Clone)]
pub struct IntegrityGuard {
    origin: Offset,
    first_lap: Offset,
    second_lap: Offset,
    steps: usize,
    max_steps: usize,
}

impl IntegrityGuard {
    pub fn new(origin: Offset, max_steps: usize) -> Self {
        Self {
            origin,
            first_lap: Offset::MAX,
            second_lap: Offset::MAX,
            steps: 0,
            max_steps,
        }
    }

    /// Record the end-record offset of the tour that was just decoded.
    pub fn record(&mut self, offset: Offset) -> Result<(), DecodeError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(DecodeError::InfiniteLoopDetected { offset });
        }

        if self.first_lap > offset {
            self.first_lap = offset;
        } else if self.second_lap > offset {
            self.second_lap = offset;
        } else {
            return Err(DecodeError::InfiniteLoopDetected { offset });
        }
        Ok(())
    }

    /// Classify the end-record offset the walk is about to read.
    pub fn visit(&self, next: Offset) -> Visit {
        if next == self.origin {
            Visit::Origin
        } else {
            Visit::Continue
        }
    }
}

/// Fail unless `record` carries the expected tag.
pub fn expect_tag(record: &RecordBytes<'_>, expected: u8) -> Result<(), DecodeError> {
    if record.tag() == expected {
        Ok(())
    } else {
        Err(DecodeError::StructuralCorruption {
            offset: record.offset,
            expected,
            found: record.tag(),
        })
    }
}

/// Fail unless the start and end records point at each other.
pub fn expect_linked(
    start_offset: Offset,
    start_points_to: Offset,
    end_offset: Offset,
    end_points_to: Offset,
) -> Result<(), DecodeError> {
    if start_points_to == end_offset && end_points_to == start_offset {
        Ok(())
    } else {
        Err(DecodeError::LinkIntegrityViolation {
            start_offset,
            start_points_to,
            end_offset,
            end_points_to,
        })
    }
}
