//! Random-access view over a HAC5 dump.
//!
//! A dump starts with a 6-byte header (`AFRO` plus a hardware id and one spare
//! byte). Every offset stored inside the dump is relative to the end of that
//! header. The tour data itself lives in a ring of fixed-size records between
//! `tour_data_start` and `tour_data_end`.

use crate::decoder::types::{DecodeError, FormatVariant, Offset};
use std::path::Path;
use std::time::SystemTime;

/// Read-only dump bytes plus the layout used to interpret them.
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Vec<u8>,
    variant: FormatVariant,
}

/// One fixed-size record borrowed from a [`RawImage`].
#[derive(Debug, Clone, Copy)]
pub struct RecordBytes<'a> {
    pub offset: Offset,
    bytes: &'a [u8],
}

impl RecordBytes<'_> {
    pub fn tag(&self) -> u8 {
        self.bytes[0]
    }

    pub fn byte(&self, index: usize) -> u8 {
        self.bytes[index]
    }

    pub fn le16(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.bytes[index], self.bytes[index + 1]])
    }

    pub fn le32(&self, index: usize) -> u32 {
        u32::from_le_bytes([
            self.bytes[index],
            self.bytes[index + 1],
            self.bytes[index + 2],
            self.bytes[index + 3],
        ])
    }
}

impl RawImage {
    /// Wrap dump bytes, rejecting files too short to hold the whole ring.
    pub fn from_bytes(bytes: Vec<u8>, variant: FormatVariant) -> Result<Self, DecodeError> {
        let required = variant.header_len + variant.tour_data_end;
        if bytes.len() < required {
            return Err(DecodeError::Truncated {
                len: bytes.len(),
                required,
            });
        }
        Ok(Self { bytes, variant })
    }

    /// Read a dump from disk. The modification time is returned alongside
    /// because the dump stores no year.
    pub fn open(
        path: impl AsRef<Path>,
        variant: FormatVariant,
    ) -> Result<(Self, Option<SystemTime>), DecodeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let modified = std::fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .ok();
        Ok((Self::from_bytes(bytes, variant)?, modified))
    }

    pub fn variant(&self) -> &FormatVariant {
        &self.variant
    }

    fn slice(&self, offset: Offset, len: usize) -> Result<&[u8], DecodeError> {
        let start = self.variant.header_len + offset;
        self.bytes
            .get(start..start + len)
            .ok_or(DecodeError::OutOfRange { offset, len })
    }

    /// Borrow the record at `offset`, which must lie entirely inside the ring.
    pub fn read_record(&self, offset: Offset) -> Result<RecordBytes<'_>, DecodeError> {
        let len = self.variant.record_len;
        if offset < self.variant.tour_data_start || offset + len > self.variant.tour_data_end {
            return Err(DecodeError::OutOfRange { offset, len });
        }
        Ok(RecordBytes {
            offset,
            bytes: self.slice(offset, len)?,
        })
    }

    pub fn read_le16(&self, offset: Offset) -> Result<u16, DecodeError> {
        let raw = self.slice(offset, 2)?;
        Ok(u16::from_le_bytes([raw[0], raw[1]]))
    }

    pub fn read_le32(&self, offset: Offset) -> Result<u32, DecodeError> {
        let raw = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Check signature, hardware id and, unless skipped, the rolling checksum.
    pub fn validate(&self, verify_checksum: bool) -> Result<(), DecodeError> {
        let signature = &self.bytes[..self.variant.signature.len()];
        if !signature.eq_ignore_ascii_case(self.variant.signature) {
            return Err(DecodeError::InvalidHeader(format!(
                "missing {} signature",
                String::from_utf8_lossy(self.variant.signature)
            )));
        }

        let hardware_id = self.bytes[self.variant.signature.len()];
        if hardware_id != self.variant.hardware_id {
            return Err(DecodeError::UnsupportedHardware {
                expected: self.variant.hardware_id,
                found: hardware_id,
            });
        }

        if verify_checksum {
            let (computed, stored) = rolling_checksum(&self.bytes[self.variant.header_len..]);
            if computed != stored {
                return Err(DecodeError::ChecksumMismatch { computed, stored });
            }
        }

        Ok(())
    }
}

/// Sum every little-endian word except the last one and return the sum
/// together with that last word.
///
/// A trailing odd byte forms a final word with the high byte of the word
/// before it, which is how transfer dumps of odd length are checksummed.
pub fn rolling_checksum(data: &[u8]) -> (u16, u16) {
    let mut checksum: u16 = 0;
    let mut last_value: u16 = 0;
    let mut high: u8 = 0;

    for chunk in data.chunks(2) {
        checksum = checksum.wrapping_add(last_value);
        let low = chunk[0];
        if let Some(&next) = chunk.get(1) {
            high = next;
        }
        last_value = u16::from_le_bytes([low, high]);
    }

    (checksum, last_value)
}
