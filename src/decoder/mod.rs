pub mod assemble;
pub mod cursor;
pub mod guard;
pub mod identity;
pub mod image;
pub mod record;
pub mod sample;
pub mod summary;
pub mod types;

use assemble::assemble_session;
use chrono::{DateTime, Datelike, Local};
use cursor::{RecordCursor, WalkStop};
use image::RawImage;
use std::path::Path;
use std::time::SystemTime;

pub use identity::SessionIdentity;
pub use record::{MarkerRecord, TourRecord};
pub use summary::derive_tour_summary;
pub use types::{
    Channel, DecodeContext, DecodeError, DecodeOptions, DecodedFile, DecodedSession,
    DeviceProfile, FormatVariant, Sample, Session, StartTime, TourSummary, TransferDate,
    WalkOutcome,
};

/// Infers tour years while the ring is read newest first.
///
/// The device stores month and day only. Moving backward in time, a month
/// larger than the previous tour's month means the walk crossed a new year.
#[derive(Debug, Clone, Copy)]
struct YearTracker {
    year: i32,
    last_month: Option<u8>,
}

impl YearTracker {
    fn new(reference_year: i32) -> Self {
        Self {
            year: reference_year,
            last_month: None,
        }
    }

    fn year_for(&mut self, month: u8) -> i32 {
        if matches!(self.last_month, Some(last) if month > last) {
            self.year -= 1;
        }
        self.last_month = Some(month);
        self.year
    }
}

/// Decode an already validated image.
///
/// The walk proceeds as:
/// 1. [`RecordCursor::walk`] follows the end/start record links backward
///    through the ring, validating tags, back-pointers and loop termination.
/// 2. [`assemble::assemble_session`] turns each span's sample records into an
///    absolute time series with ascent/descent totals.
/// 3. [`SessionIdentity::of`] derives the dedup key of every tour.
///
/// Corruption found during the walk ends it, but tours decoded before the
/// corrupted record are returned with [`WalkOutcome::Aborted`].
pub fn decode_image(image: &RawImage, context: &DecodeContext) -> Result<DecodedFile, DecodeError> {
    let cursor = RecordCursor::new(image);
    let mut walk = cursor.walk()?;
    let mut years = YearTracker::new(context.reference_year);
    let mut sessions: Vec<DecodedSession> = Vec::new();
    let mut aborted: Option<DecodeError> = None;

    for step in walk.by_ref() {
        let span = match step {
            Ok(span) => span,
            Err(error) if error.keeps_partial_results() => {
                tracing::warn!(
                    "stopping ring walk after {} tour(s): {error}",
                    sessions.len()
                );
                aborted = Some(error);
                break;
            }
            Err(error) => return Err(error),
        };

        let year = years.year_for(span.start.month);
        let session = assemble_session(&span, year, context.variant);
        let identity = SessionIdentity::of(&session);
        tracing::debug!(
            start = %session.start,
            samples = session.samples.len(),
            %identity,
            "decoded tour at {:#06x}",
            span.start_offset
        );
        sessions.push(DecodedSession { identity, session });
    }

    let outcome = match (aborted, walk.stop()) {
        (Some(error), _) => WalkOutcome::Aborted(error),
        (None, Some(WalkStop::RingClosed)) => WalkOutcome::RingClosed,
        (None, _) => WalkOutcome::EndOfData,
    };

    let transfer = sessions.first().map(|newest| TransferDate {
        year: context.reference_year,
        month: newest.session.start.month,
        day: newest.session.start.day,
    });

    Ok(DecodedFile {
        sessions,
        outcome,
        transfer,
    })
}

/// Validate and decode an in-memory dump.
pub fn decode_hac5_bytes(
    bytes: Vec<u8>,
    context: &DecodeContext,
    options: &DecodeOptions,
) -> Result<DecodedFile, DecodeError> {
    let image = RawImage::from_bytes(bytes, context.variant)?;
    image.validate(!options.skip_checksum)?;
    let decoded = decode_image(&image, context)?;
    tracing::info!(
        "decoded {} tour(s) from {} dump",
        decoded.sessions.len(),
        context.variant.name
    );
    Ok(decoded)
}

/// Validate and decode a dump on disk. Without an explicit import year the
/// file's modification year is used.
pub fn decode_hac5_file(
    path: impl AsRef<Path>,
    options: &DecodeOptions,
) -> Result<DecodedFile, DecodeError> {
    let path = path.as_ref();
    let (image, modified) = RawImage::open(path, FormatVariant::HAC5)?;
    let context = DecodeContext::resolve(options, year_of(modified));

    image.validate(!options.skip_checksum)?;
    let decoded = decode_image(&image, &context)?;
    tracing::info!(
        "decoded {} tour(s) from {}",
        decoded.sessions.len(),
        path.display()
    );
    Ok(decoded)
}

/// Local calendar year of a timestamp, falling back to the current year.
pub fn year_of(time: Option<SystemTime>) -> i32 {
    time.map(DateTime::<Local>::from)
        .unwrap_or_else(Local::now)
        .year()
}
