use crate::decoder::types::Session;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-derived key used to recognise a tour that was imported before.
///
/// The value is the decimal concatenation of the start date, start time and
/// the odometer reading at the start, read back as a number, so it sorts
/// roughly by start time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionIdentity(i64);

impl SessionIdentity {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn of(session: &Session) -> Self {
        let start = &session.start;
        let prefix = format!(
            "{}{}{}{}{}",
            start.year, start.month, start.day, start.hour, start.minute
        );
        let suffix = session.start_distance.to_string();

        if let Ok(value) = format!("{prefix}{suffix}").parse::<i64>() {
            return Self(value);
        }

        let shortened = &suffix[..suffix.len().min(5)];
        if let Ok(value) = format!("{prefix}{shortened}").parse::<i64>() {
            return Self(value);
        }

        Self::digest(&prefix, &suffix)
    }

    /// Fallback for start fields too large to concatenate into an `i64`.
    fn digest(prefix: &str, suffix: &str) -> Self {
        let hash = Sha256::new()
            .chain_update(prefix.as_bytes())
            .chain_update(b":")
            .chain_update(suffix.as_bytes())
            .finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&hash[..8]);
        Self((u64::from_be_bytes(head) >> 1) as i64)
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::types::{DeviceProfile, StartTime};

    fn session(year: i32, month: u8, start_distance: u32) -> Session {
        Session {
            start: StartTime {
                year,
                month,
                day: 7,
                hour: 14,
                minute: 5,
            },
            profile: DeviceProfile::Run,
            time_interval: 20,
            start_distance,
            start_altitude: 0,
            start_pulse: 0,
            samples: Vec::new(),
            ascent: 0,
            descent: 0,
            recorded_distance: 0,
            recorded_ascent: 0,
            recorded_descent: 0,
            start_offset: 0x0800,
            end_offset: 0x0820,
            absent: Vec::new(),
        }
    }

    #[test]
    fn identity_concatenates_start_fields_and_distance() {
        let identity = SessionIdentity::of(&session(2024, 3, 12_345));
        assert_eq!(identity.value(), 20243714512345);
    }

    #[test]
    fn long_distances_are_shortened_to_five_digits() {
        let identity = SessionIdentity::of(&session(2024, 12, 4_000_000_000));
        // 2024 12 7 14 5 + 4000000000 has 20 digits and overflows i64
        assert_eq!(identity.value(), 202412714540000);
    }

    #[test]
    fn oversized_fields_fall_back_to_a_stable_digest() {
        let broken = session(i32::MAX, 255, 4_000_000_000);
        let first = SessionIdentity::of(&broken);
        let second = SessionIdentity::of(&broken.clone());
        assert_eq!(first, second);
        assert!(first.value() >= 0);
    }

    #[test]
    fn different_distances_give_different_identities() {
        assert_ne!(
            SessionIdentity::of(&session(2024, 3, 100)),
            SessionIdentity::of(&session(2024, 3, 200))
        );
    }
}
