//! Key encodings. Composite keys are big-endian so lexicographic order over
//! the raw bytes equals numeric order, which is what range scans rely on.

use byteorder::{BigEndian, ByteOrder};
use types::primitives::{Slot, H256};

use crate::errors::StoreError;

pub const HEAD_BLOCK_ROOT_KEY: &[u8] = b"head-block-root";
pub const GENESIS_BLOCK_ROOT_KEY: &[u8] = b"genesis-block-root";
pub const JUSTIFIED_CHECKPOINT_KEY: &[u8] = b"justified-checkpoint";
pub const FINALIZED_CHECKPOINT_KEY: &[u8] = b"finalized-checkpoint";
pub const LAST_ARCHIVED_INDEX_KEY: &[u8] = b"last-archived-index";

const SLOT_ROOT_KEY_SIZE: usize = 40;
const ROOT_PAIR_KEY_SIZE: usize = 64;

/// Key of the slot index: `slot ‖ block_root`.
#[derive(Debug)]
pub struct SlotRootKey {
    data: [u8; SLOT_ROOT_KEY_SIZE],
}

impl SlotRootKey {
    pub fn new(slot: Slot, root: H256) -> Self {
        let mut data = [0; SLOT_ROOT_KEY_SIZE];
        BigEndian::write_u64(&mut data[..8], slot);
        data[8..].copy_from_slice(root.as_slice());
        Self { data }
    }

    pub fn parse(bytes: &[u8]) -> Result<(Slot, H256), StoreError> {
        if bytes.len() != SLOT_ROOT_KEY_SIZE {
            return Err(StoreError::CorruptEncoding {
                context: "slot index key has the wrong length",
            });
        }
        let slot = BigEndian::read_u64(&bytes[..8]);
        let root = H256::from_slice(&bytes[8..]);
        Ok((slot, root))
    }
}

impl AsRef<[u8]> for SlotRootKey {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// Key of the parent index: `parent_root ‖ block_root`.
#[derive(Debug)]
pub struct RootPairKey {
    data: [u8; ROOT_PAIR_KEY_SIZE],
}

impl RootPairKey {
    pub fn new(first: H256, second: H256) -> Self {
        let mut data = [0; ROOT_PAIR_KEY_SIZE];
        data[..32].copy_from_slice(first.as_slice());
        data[32..].copy_from_slice(second.as_slice());
        Self { data }
    }

    pub fn parse(bytes: &[u8]) -> Result<(H256, H256), StoreError> {
        if bytes.len() != ROOT_PAIR_KEY_SIZE {
            return Err(StoreError::CorruptEncoding {
                context: "parent index key has the wrong length",
            });
        }
        Ok((
            H256::from_slice(&bytes[..32]),
            H256::from_slice(&bytes[32..]),
        ))
    }
}

impl AsRef<[u8]> for RootPairKey {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

/// 8-byte big-endian archived-point index key.
pub fn archived_index_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

/// Lower bound of the slot index range covering `slot`.
pub fn slot_range_start(slot: Slot) -> [u8; 8] {
    slot.to_be_bytes()
}

/// Exclusive upper bound of the slot index range covering slots `..= slot`.
/// `None` means the range is unbounded above.
pub fn slot_range_end(slot: Slot) -> Option<[u8; 8]> {
    slot.checked_add(1).map(|next| next.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_root_keys_sort_by_slot_first() {
        let low = SlotRootKey::new(1, H256::repeat_byte(0xff));
        let high = SlotRootKey::new(2, H256::repeat_byte(0x00));
        assert!(low.as_ref() < high.as_ref());
    }

    #[test]
    fn slot_root_key_round_trips() {
        let key = SlotRootKey::new(77, H256::repeat_byte(0x13));
        let (slot, root) = SlotRootKey::parse(key.as_ref()).expect("key parses");
        assert_eq!(slot, 77);
        assert_eq!(root, H256::repeat_byte(0x13));
    }

    #[test]
    fn root_pair_key_round_trips() {
        let key = RootPairKey::new(H256::repeat_byte(1), H256::repeat_byte(2));
        let (first, second) = RootPairKey::parse(key.as_ref()).expect("key parses");
        assert_eq!(first, H256::repeat_byte(1));
        assert_eq!(second, H256::repeat_byte(2));
    }
}
