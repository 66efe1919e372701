//! Value representations.
//!
//! A child slot is a fixed-width cell that holds a child pointer, a small
//! value stored inline, or nothing. The three representations differ in slot
//! width and in the sentinel pattern used to tell those cases apart; the tree
//! engine is generic over [`ValueRepr`] and never looks at slot bytes itself.

use crate::error::{ArtError, Result};

/// Widest slot of any representation.
pub const MAX_SLOT_SIZE: usize = 12;

/// Copy of one encoded child slot. Only the first `R::SLOT_SIZE` bytes are
/// meaningful.
pub(crate) type RawSlot = [u8; MAX_SLOT_SIZE];

/// First four bytes of a 12-byte slot holding a child pointer (or nothing).
const PTR_SENTINEL: [u8; 4] = [0xFF; 4];

/// What a slot holds, decoded from its sentinel pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTag {
    Empty,
    Child(usize),
    Inline,
}

mod private {
    pub trait Sealed {}
}

/// Encoding of values inside nodes and child slots.
pub trait ValueRepr: private::Sealed + Send + Sync + 'static {
    /// Width of one child slot in bytes.
    const SLOT_SIZE: usize;
    /// Recorded in every node header so a tree can be told apart from one
    /// built with 8-byte slots.
    const WIDE_SLOTS: bool;
    /// Length of every value, or `None` when values carry a length prefix.
    const FIXED_LEN: Option<usize>;
    /// An all-zero slot decodes as empty.
    const EMPTY_IS_ZERO: bool;

    fn check_value(value: &[u8]) -> Result<()>;
    fn is_inlinable(value: &[u8]) -> bool;
    fn encode_inline(value: &[u8], slot: &mut [u8]);
    fn inline_value(slot: &[u8]) -> &[u8];
    fn encode_child(addr: usize, slot: &mut [u8]);
    fn encode_empty(slot: &mut [u8]);
    fn decode(slot: &[u8]) -> SlotTag;

    /// Bytes taken by a node's own value of `len` bytes.
    #[inline]
    fn stored_len(len: usize) -> usize {
        match Self::FIXED_LEN {
            Some(fixed) => fixed,
            None => 4 + len,
        }
    }
}

pub(crate) fn inline_slot<R: ValueRepr>(value: &[u8]) -> RawSlot {
    let mut raw = [0u8; MAX_SLOT_SIZE];
    R::encode_inline(value, &mut raw[..R::SLOT_SIZE]);
    raw
}

pub(crate) fn child_slot<R: ValueRepr>(addr: usize) -> RawSlot {
    let mut raw = [0u8; MAX_SLOT_SIZE];
    R::encode_child(addr, &mut raw[..R::SLOT_SIZE]);
    raw
}

fn check_var_len(value: &[u8]) -> Result<()> {
    if u32::try_from(value.len()).is_err() {
        return Err(ArtError::InvalidValue("value length does not fit in 32 bits"));
    }
    Ok(())
}

fn decode_wide(slot: &[u8]) -> SlotTag {
    if slot[..4] != PTR_SENTINEL {
        return SlotTag::Inline;
    }
    let mut addr = [0u8; 8];
    addr.copy_from_slice(&slot[4..12]);
    match u64::from_le_bytes(addr) {
        0 => SlotTag::Empty,
        addr => SlotTag::Child(addr as usize),
    }
}

fn encode_wide_child(addr: usize, slot: &mut [u8]) {
    slot[..4].copy_from_slice(&PTR_SENTINEL);
    slot[4..12].copy_from_slice(&(addr as u64).to_le_bytes());
}

/// Variable-length values with 8-byte slots. Values up to 7 bytes are stored
/// inline with the low bit of the first byte set, which no aligned pointer
/// can have.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarValue;

impl private::Sealed for VarValue {}

impl ValueRepr for VarValue {
    const SLOT_SIZE: usize = 8;
    const WIDE_SLOTS: bool = false;
    const FIXED_LEN: Option<usize> = None;
    const EMPTY_IS_ZERO: bool = true;

    fn check_value(value: &[u8]) -> Result<()> {
        check_var_len(value)
    }

    #[inline]
    fn is_inlinable(value: &[u8]) -> bool {
        value.len() <= 7
    }

    fn encode_inline(value: &[u8], slot: &mut [u8]) {
        slot[..8].fill(0);
        slot[0] = 1 | ((value.len() as u8) << 1);
        slot[1..1 + value.len()].copy_from_slice(value);
    }

    #[inline]
    fn inline_value(slot: &[u8]) -> &[u8] {
        let len = (slot[0] >> 1) as usize;
        &slot[1..1 + len]
    }

    fn encode_child(addr: usize, slot: &mut [u8]) {
        slot[..8].copy_from_slice(&(addr as u64).to_le_bytes());
    }

    fn encode_empty(slot: &mut [u8]) {
        slot[..8].fill(0);
    }

    #[inline]
    fn decode(slot: &[u8]) -> SlotTag {
        let mut word = [0u8; 8];
        word.copy_from_slice(&slot[..8]);
        match u64::from_le_bytes(word) {
            0 => SlotTag::Empty,
            w if w & 1 == 1 => SlotTag::Inline,
            addr => SlotTag::Child(addr as usize),
        }
    }
}

/// Fixed 12-byte values, always stored inline in 12-byte slots. A value must
/// not begin with `FF FF FF FF`, which marks a child pointer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Value12;

impl private::Sealed for Value12 {}

impl ValueRepr for Value12 {
    const SLOT_SIZE: usize = 12;
    const WIDE_SLOTS: bool = true;
    const FIXED_LEN: Option<usize> = Some(12);
    const EMPTY_IS_ZERO: bool = false;

    fn check_value(value: &[u8]) -> Result<()> {
        if value.len() != 12 {
            return Err(ArtError::InvalidValue("fixed values must be exactly 12 bytes"));
        }
        if value[..4] == PTR_SENTINEL {
            return Err(ArtError::InvalidValue(
                "fixed values must not start with FF FF FF FF",
            ));
        }
        Ok(())
    }

    #[inline]
    fn is_inlinable(_value: &[u8]) -> bool {
        true
    }

    fn encode_inline(value: &[u8], slot: &mut [u8]) {
        slot[..12].copy_from_slice(value);
    }

    #[inline]
    fn inline_value(slot: &[u8]) -> &[u8] {
        &slot[..12]
    }

    fn encode_child(addr: usize, slot: &mut [u8]) {
        encode_wide_child(addr, slot);
    }

    fn encode_empty(slot: &mut [u8]) {
        encode_wide_child(0, slot);
    }

    #[inline]
    fn decode(slot: &[u8]) -> SlotTag {
        decode_wide(slot)
    }
}

/// Variable-length values with 12-byte slots. Values up to 11 bytes are stored
/// inline behind a length byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarValue12;

impl private::Sealed for VarValue12 {}

impl ValueRepr for VarValue12 {
    const SLOT_SIZE: usize = 12;
    const WIDE_SLOTS: bool = true;
    const FIXED_LEN: Option<usize> = None;
    const EMPTY_IS_ZERO: bool = false;

    fn check_value(value: &[u8]) -> Result<()> {
        check_var_len(value)
    }

    #[inline]
    fn is_inlinable(value: &[u8]) -> bool {
        value.len() <= 11
    }

    fn encode_inline(value: &[u8], slot: &mut [u8]) {
        slot[..12].fill(0);
        slot[0] = value.len() as u8;
        slot[1..1 + value.len()].copy_from_slice(value);
    }

    #[inline]
    fn inline_value(slot: &[u8]) -> &[u8] {
        let len = slot[0] as usize;
        &slot[1..1 + len]
    }

    fn encode_child(addr: usize, slot: &mut [u8]) {
        encode_wide_child(addr, slot);
    }

    fn encode_empty(slot: &mut [u8]) {
        encode_wide_child(0, slot);
    }

    #[inline]
    fn decode(slot: &[u8]) -> SlotTag {
        decode_wide(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_value_slots() {
        let raw = inline_slot::<VarValue>(b"abc");
        assert_eq!(VarValue::decode(&raw), SlotTag::Inline);
        assert_eq!(VarValue::inline_value(&raw), b"abc");

        let empty_inline = inline_slot::<VarValue>(b"");
        assert_eq!(VarValue::decode(&empty_inline), SlotTag::Inline);
        assert_eq!(VarValue::inline_value(&empty_inline), b"");

        let child = child_slot::<VarValue>(0x1000);
        assert_eq!(VarValue::decode(&child), SlotTag::Child(0x1000));
        assert_eq!(VarValue::decode(&[0u8; 8]), SlotTag::Empty);

        assert!(VarValue::is_inlinable(b"1234567"));
        assert!(!VarValue::is_inlinable(b"12345678"));
    }

    #[test]
    fn value12_slots() {
        let value = *b"hello world!";
        VarValue12::check_value(&value).unwrap();
        Value12::check_value(&value).unwrap();
        let raw = inline_slot::<Value12>(&value);
        assert_eq!(Value12::decode(&raw), SlotTag::Inline);
        assert_eq!(Value12::inline_value(&raw), &value);

        let child = child_slot::<Value12>(0xdead_bee8);
        assert_eq!(Value12::decode(&child), SlotTag::Child(0xdead_bee8));

        let mut empty = [0u8; 12];
        Value12::encode_empty(&mut empty);
        assert_eq!(Value12::decode(&empty), SlotTag::Empty);
        // An all-zero 12-byte value is a legitimate inline value.
        assert_eq!(Value12::decode(&[0u8; 12]), SlotTag::Inline);
    }

    #[test]
    fn value12_rejects_malformed_values() {
        assert!(matches!(
            Value12::check_value(b"short"),
            Err(ArtError::InvalidValue(_))
        ));
        let mut sentinel = [0u8; 12];
        sentinel[..4].copy_from_slice(&PTR_SENTINEL);
        assert!(matches!(
            Value12::check_value(&sentinel),
            Err(ArtError::InvalidValue(_))
        ));
    }

    #[test]
    fn var_value12_slots() {
        let raw = inline_slot::<VarValue12>(b"eleven byte");
        assert_eq!(VarValue12::decode(&raw), SlotTag::Inline);
        assert_eq!(VarValue12::inline_value(&raw), b"eleven byte");
        assert!(!VarValue12::is_inlinable(b"twelve bytes"));
        assert_eq!(VarValue12::stored_len(3), 7);
        assert_eq!(Value12::stored_len(12), 12);
    }
}
