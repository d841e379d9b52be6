//! Little-endian field access over a history log payload.

use crate::error::{Error, Result};
use crate::model::LogEntry;

/// Bounds-checked reader over the type-specific cargo of one entry.
///
/// Every accessor returns [`Error::InvalidPayload`] naming the entry when
/// the payload is too short for the requested field.
pub struct PayloadReader<'a> {
    bytes: &'a [u8],
    seq_id: u64,
    type_id: u32,
}

impl<'a> PayloadReader<'a> {
    #[must_use]
    pub fn new(entry: &'a LogEntry) -> Self {
        Self {
            bytes: &entry.payload,
            seq_id: entry.seq_id,
            type_id: entry.type_id,
        }
    }

    /// Fail unless the payload holds at least `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] for short payloads.
    pub fn require(&self, len: usize) -> Result<()> {
        if self.bytes.len() < len {
            return Err(self.error(format!(
                "expected at least {len} bytes, got {}",
                self.bytes.len()
            )));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if the field is out of bounds.
    pub fn u8(&self, offset: usize) -> Result<u8> {
        Ok(self.array::<1>(offset)?[0])
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if the field is out of bounds.
    pub fn u16(&self, offset: usize) -> Result<u16> {
        self.array(offset).map(u16::from_le_bytes)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if the field is out of bounds.
    pub fn u32(&self, offset: usize) -> Result<u32> {
        self.array(offset).map(u32::from_le_bytes)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidPayload`] if the field is out of bounds.
    pub fn f32(&self, offset: usize) -> Result<f32> {
        self.array(offset).map(f32::from_le_bytes)
    }

    /// Like [`Self::u16`], but `None` when the payload ends before `offset`.
    #[must_use]
    pub fn opt_u16(&self, offset: usize) -> Option<u16> {
        self.u16(offset).ok()
    }

    fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        offset
            .checked_add(N)
            .and_then(|end| self.bytes.get(offset..end))
            .and_then(|slice| <[u8; N]>::try_from(slice).ok())
            .ok_or_else(|| {
                self.error(format!(
                    "field at offset {offset} ({N} bytes) exceeds payload of {} bytes",
                    self.bytes.len()
                ))
            })
    }

    fn error(&self, message: String) -> Error {
        Error::InvalidPayload {
            seq_id: self.seq_id,
            type_id: self.type_id,
            message,
        }
    }
}

/// Convert milli-units (the device's insulin unit) to units.
#[must_use]
pub fn milli_to_units(milli: u32) -> f64 {
    f64::from(milli) / 1000.0
}

/// Round to three decimals so float noise from `f32` fields does not leak
/// into uploaded records.
#[must_use]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
