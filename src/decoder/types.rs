use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use thiserror::Error;

/// Byte offset into the dump, relative to the skipped file header.
pub type Offset = usize;

/// Layout constants of one member of the AFRO ring-buffer family.
///
/// Older and newer devices share the same traversal and sample packing; only
/// the constants below differ between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVariant {
    pub name: &'static str,
    /// Signature at the very start of the file, compared case-insensitively.
    pub signature: &'static [u8; 4],
    /// Hardware id stored right after the signature.
    pub hardware_id: u8,
    /// Bytes skipped before any record offset applies.
    pub header_len: usize,
    pub tour_data_start: Offset,
    pub tour_data_end: Offset,
    pub record_len: usize,
    /// Location of the little-endian "next free record" pointer.
    pub next_free_pointer: Offset,
    pub start_tag: u8,
    pub end_tag: u8,
    pub terminal_tag: u8,
    pub no_marker: u8,
    /// Modulus applied to the terminal cadence byte to get the final slice length.
    pub terminal_time_modulus: u16,
}

impl FormatVariant {
    pub const HAC5: FormatVariant = FormatVariant {
        name: "HAC5",
        signature: b"AFRO",
        hardware_id: 0x03,
        header_len: 6,
        tour_data_start: 0x0800,
        tour_data_end: 0x10000,
        record_len: 0x10,
        next_free_pointer: 0x0380 + 2,
        start_tag: 0xAA,
        end_tag: 0xDD,
        terminal_tag: 0xCC,
        no_marker: 0xFF,
        terminal_time_modulus: 20,
    };

    /// Number of records the ring can hold.
    pub fn ring_capacity(&self) -> usize {
        (self.tour_data_end - self.tour_data_start) / self.record_len
    }

    /// Number of packed sample words in one sample record.
    pub fn words_per_record(&self) -> usize {
        (self.record_len - 4) / 2
    }
}

impl Default for FormatVariant {
    fn default() -> Self {
        Self::HAC5
    }
}

/// User-facing toggles for one decode call.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Year of the newest tour; the dump itself stores no year.
    pub import_year: Option<i32>,
    /// Accept dumps whose rolling checksum does not match.
    pub skip_checksum: bool,
}

/// Per-call decode state. Nothing here is shared between files.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext {
    pub variant: FormatVariant,
    /// Year assigned to the newest tour before month roll-back is applied.
    pub reference_year: i32,
}

impl DecodeContext {
    pub fn new(reference_year: i32) -> Self {
        Self {
            variant: FormatVariant::HAC5,
            reference_year,
        }
    }

    /// Resolve the reference year from an explicit override or the dump's timestamp year.
    pub fn resolve(options: &DecodeOptions, file_year: i32) -> Self {
        Self::new(options.import_year.unwrap_or(file_year))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProfile {
    Bike1,
    Bike2,
    Rds,
    Alpine,
    Run,
    Unknown(u8),
}

impl DeviceProfile {
    pub fn from_id(id: u8) -> Self {
        match id {
            0 => DeviceProfile::Bike1,
            1 => DeviceProfile::Bike2,
            2 => DeviceProfile::Rds,
            3 => DeviceProfile::Alpine,
            4 => DeviceProfile::Run,
            other => DeviceProfile::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeviceProfile::Bike1 => "Bike 1",
            DeviceProfile::Bike2 => "Bike 2",
            DeviceProfile::Rds => "RDS",
            DeviceProfile::Alpine => "Alpine",
            DeviceProfile::Run => "Run",
            DeviceProfile::Unknown(_) => "No profile",
        }
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Recording interval, decoded from the low nibble of the start record.
pub fn interval_from_code(code: u8) -> u16 {
    match code {
        0 => 2,
        1 => 5,
        2 => 10,
        _ => 20,
    }
}

/// Tour start as stored by the device plus the year inferred during the walk.
///
/// Fields are kept raw; a damaged dump may carry values that are not a valid
/// calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StartTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

impl StartTime {
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month.into(), self.day.into())?
            .and_hms_opt(self.hour.into(), self.minute.into(), 0)
    }
}

impl fmt::Display for StartTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

/// Sensor channels that may be missing from a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Distance,
    Pulse,
    Cadence,
    Temperature,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Distance,
        Channel::Pulse,
        Channel::Cadence,
        Channel::Temperature,
    ];
}

/// One time slice of a tour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Seconds since the tour start.
    pub elapsed: u32,
    /// Length of this slice in seconds.
    pub duration: u16,
    pub pulse_delta: i16,
    pub altitude_delta: i16,
    pub distance_delta: u16,
    pub pulse: i32,
    pub altitude: i32,
    pub distance: u32,
    pub cadence: u8,
    pub temperature: i8,
    pub marker: Option<u8>,
}

/// A decoded tour. Built once by [`crate::decoder::assemble::SessionBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub start: StartTime,
    pub profile: DeviceProfile,
    pub time_interval: u16,
    pub start_distance: u32,
    pub start_altitude: i16,
    pub start_pulse: u8,
    pub samples: Vec<Sample>,
    /// Ascent computed from the altitude deltas.
    pub ascent: u32,
    /// Descent computed from the altitude deltas.
    pub descent: u32,
    /// Totals the device wrote into the end record.
    pub recorded_distance: u16,
    pub recorded_ascent: u16,
    pub recorded_descent: u16,
    pub start_offset: Offset,
    pub end_offset: Offset,
    pub absent: Vec<Channel>,
}

impl Session {
    pub fn has_sensor(&self, channel: Channel) -> bool {
        !self.absent.contains(&channel)
    }

    /// Elapsed seconds from start to the last slice.
    pub fn duration_seconds(&self) -> u32 {
        self.samples.last().map(|sample| sample.elapsed).unwrap_or(0)
    }

    /// Distance covered by the decoded samples, in metres.
    pub fn distance_meters(&self) -> u32 {
        self.samples.last().map(|sample| sample.distance).unwrap_or(0)
    }
}

/// Why the ring walk stopped.
#[derive(Debug)]
pub enum WalkOutcome {
    /// The record preceding the last tour is not an end record.
    EndOfData,
    /// The walk came back to the first end record; the whole ring was read.
    RingClosed,
    /// Corruption ended the walk; sessions decoded before it are kept.
    Aborted(DecodeError),
}

impl WalkOutcome {
    pub fn is_clean(&self) -> bool {
        !matches!(self, WalkOutcome::Aborted(_))
    }
}

/// Date reported as the day the dump was transferred from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDate {
    pub year: i32,
    pub month: u8,
    pub day: u8,
}

/// Everything decoded from one dump.
#[derive(Debug)]
pub struct DecodedFile {
    /// Tours in ring order, newest first.
    pub sessions: Vec<DecodedSession>,
    pub outcome: WalkOutcome,
    pub transfer: Option<TransferDate>,
}

#[derive(Debug, Clone)]
pub struct DecodedSession {
    pub identity: crate::decoder::identity::SessionIdentity,
    pub session: Session,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid HAC5 file: {0}")]
    InvalidHeader(String),
    #[error("Unsupported hardware id {found:#04x}, expected {expected:#04x}")]
    UnsupportedHardware { expected: u8, found: u8 },
    #[error("File is truncated: {len} bytes, at least {required} required")]
    Truncated { len: usize, required: usize },
    #[error("Checksum mismatch: computed {computed:#06x}, stored {stored:#06x}")]
    ChecksumMismatch { computed: u16, stored: u16 },
    #[error("Unexpected record tag {found:#04x} at offset {offset:#06x}, expected {expected:#04x}")]
    StructuralCorruption {
        offset: Offset,
        expected: u8,
        found: u8,
    },
    #[error(
        "Boundary records do not point to each other: start {start_offset:#06x} points to {start_points_to:#06x}, end {end_offset:#06x} points to {end_points_to:#06x}"
    )]
    LinkIntegrityViolation {
        start_offset: Offset,
        start_points_to: Offset,
        end_offset: Offset,
        end_points_to: Offset,
    },
    #[error("Ring traversal does not terminate, stopped at offset {offset:#06x}")]
    InfiniteLoopDetected { offset: Offset },
    #[error("Read of {len} bytes at offset {offset:#06x} is out of range")]
    OutOfRange { offset: Offset, len: usize },
    #[error("Failed to read HAC5 file: {0}")]
    IoFailure(#[from] std::io::Error),
}

impl DecodeError {
    /// Errors that end the ring walk but keep the tours decoded so far.
    pub fn keeps_partial_results(&self) -> bool {
        matches!(
            self,
            DecodeError::StructuralCorruption { .. }
                | DecodeError::LinkIntegrityViolation { .. }
                | DecodeError::InfiniteLoopDetected { .. }
        )
    }
}

/// Derived overview metrics of one tour.
#[derive(Debug, Clone, Default)]
pub struct TourSummary {
    pub duration_seconds: Option<u32>,
    pub profile: Option<String>,
    pub distance_meters: Option<u32>,
    pub pulse_min: Option<i32>,
    pub pulse_mean: Option<f64>,
    pub pulse_max: Option<i32>,
    pub altitude_min: Option<i32>,
    pub altitude_max: Option<i32>,
    pub ascent: u32,
    pub descent: u32,
    pub speed_mean: Option<f64>,
}
