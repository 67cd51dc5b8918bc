//! Forward references: "value unknown yet, patch later" slots.
//!
//! A [`FileRef`] records the file offset of a zeroed placeholder written
//! earlier in the stream. Two kinds exist: a *length* reference, patched
//! with the byte count between the end of the placeholder and a section's
//! close, and a *shift* reference, patched with the distance from a fixed
//! anchor to some later target (how a box leaf points at a data block
//! written long after it).
//!
//! Patching consumes the reference by value, so a double patch does not
//! compile; the writer counts outstanding references so a forgotten patch
//! fails the file close instead of corrupting the output.

use crate::error::{Error, Result};

/// Width of a patch slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchWidth {
    /// 4-byte slot.
    U32,
    /// 8-byte slot, for sections that may exceed 4 GiB.
    U64,
}

impl PatchWidth {
    /// Slot size in bytes.
    pub fn bytes(self) -> u64 {
        match self {
            PatchWidth::U32 => 4,
            PatchWidth::U64 => 8,
        }
    }
}

/// What the placeholder will eventually hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    /// Byte length of the range from just after the slot to a close
    /// position supplied at patch time.
    Length,
    /// Distance from `anchor` to a target position supplied at patch
    /// time.
    Shift {
        /// The fixed position the stored value is relative to.
        anchor: u64,
    },
}

/// A pending forward reference into the output file.
#[derive(Debug)]
pub struct FileRef {
    origin: u64,
    width: PatchWidth,
    kind: RefKind,
}

impl FileRef {
    pub(crate) fn new(origin: u64, width: PatchWidth, kind: RefKind) -> Self {
        Self { origin, width, kind }
    }

    /// File offset of the placeholder.
    pub fn origin(&self) -> u64 {
        self.origin
    }

    /// Slot width.
    pub fn width(&self) -> PatchWidth {
        self.width
    }

    /// Resolve the value to store for a patch at `position`: the section
    /// end for a length reference, the target offset for a shift
    /// reference. Fails when the value does not fit the slot.
    pub(crate) fn resolve(&self, position: u64) -> Result<u64> {
        let value = match self.kind {
            RefKind::Length => {
                let body_start = self.origin + self.width.bytes();
                position.checked_sub(body_start).ok_or_else(|| {
                    Error::protocol(format!(
                        "section end {} precedes its length slot at {}",
                        position, self.origin
                    ))
                })?
            }
            RefKind::Shift { anchor } => position.checked_sub(anchor).ok_or_else(|| {
                Error::protocol(format!(
                    "shift target {} precedes its anchor {}",
                    position, anchor
                ))
            })?,
        };
        if self.width == PatchWidth::U32 && value > u32::MAX as u64 {
            return Err(Error::limit(format!(
                "value {} does not fit a 4-byte patch slot",
                value
            )));
        }
        Ok(value)
    }

    /// Encode `value` at this reference's width, little-endian.
    pub(crate) fn encode(&self, value: u64) -> Vec<u8> {
        match self.width {
            PatchWidth::U32 => (value as u32).to_le_bytes().to_vec(),
            PatchWidth::U64 => value.to_le_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_resolution() {
        let r = FileRef::new(100, PatchWidth::U32, RefKind::Length);
        // Slot occupies bytes 100..104; body is 104..150.
        assert_eq!(r.resolve(150).unwrap(), 46);
        assert_eq!(r.resolve(104).unwrap(), 0);
    }

    #[test]
    fn test_shift_resolution() {
        let r = FileRef::new(100, PatchWidth::U32, RefKind::Shift { anchor: 80 });
        assert_eq!(r.resolve(200).unwrap(), 120);
    }

    #[test]
    fn test_shift_before_anchor_rejected() {
        let r = FileRef::new(100, PatchWidth::U32, RefKind::Shift { anchor: 300 });
        assert!(matches!(r.resolve(200), Err(Error::Protocol(_))));
    }

    #[test]
    fn test_narrow_slot_overflow() {
        let r = FileRef::new(0, PatchWidth::U32, RefKind::Shift { anchor: 0 });
        let too_far = u32::MAX as u64 + 1;
        assert!(matches!(r.resolve(too_far), Err(Error::LimitExceeded(_))));
    }

    #[test]
    fn test_wide_slot_accepts_large_values() {
        let r = FileRef::new(0, PatchWidth::U64, RefKind::Shift { anchor: 0 });
        let far = u32::MAX as u64 + 1;
        assert_eq!(r.resolve(far).unwrap(), far);
        assert_eq!(r.encode(far).len(), 8);
    }

    #[test]
    fn test_encode_little_endian() {
        let r = FileRef::new(0, PatchWidth::U32, RefKind::Length);
        assert_eq!(r.encode(0x0102_0304), vec![0x04, 0x03, 0x02, 0x01]);
    }
}
