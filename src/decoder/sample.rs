//! Packed sample words.
//!
//! Each 16-bit word carries one time slice:
//!
//! ```text
//! 15    12 11        6 5         0
//! +-------+-----------+-----------+
//! | pulse |  altitude |  distance |
//! +-------+-----------+-----------+
//! ```
//!
//! Pulse and altitude are two's-complement deltas. Altitude deltas larger than
//! 16 in magnitude are stretched by a factor of 7 beyond 16. Distance is an
//! unsigned count of 10 m units.

/// Delta values decoded from one packed word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliceDelta {
    pub pulse: i16,
    pub altitude: i16,
    pub distance: u16,
}

const ALTITUDE_LINEAR_LIMIT: i16 = 16;
const ALTITUDE_EXPANSION: i16 = 7;
const DISTANCE_UNIT: u16 = 10;

fn sign_extend(value: u16, bits: u32) -> i16 {
    let shift = 16 - bits;
    ((value << shift) as i16) >> shift
}

fn expand_altitude(raw: i16) -> i16 {
    let magnitude = raw.abs();
    if magnitude > ALTITUDE_LINEAR_LIMIT {
        raw.signum() * (ALTITUDE_LINEAR_LIMIT + (magnitude - ALTITUDE_LINEAR_LIMIT) * ALTITUDE_EXPANSION)
    } else {
        raw
    }
}

/// Decode one packed sample word. Total over all inputs.
pub fn decode_word(word: u16) -> SliceDelta {
    let pulse = sign_extend(word >> 12, 4);
    let altitude = expand_altitude(sign_extend((word >> 6) & 0x3F, 6));
    let distance = (word & 0x3F) * DISTANCE_UNIT;

    SliceDelta {
        pulse,
        altitude,
        distance,
    }
}
