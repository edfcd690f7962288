use core::fmt;
use core::str::FromStr;

use derive_more::Display;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz::{Decode, DecodeError, Encode};
use tree_hash::{Hash256, PackedEncoding, TreeHash, TreeHashType};

pub use alloy_primitives::B256 as H256;

pub type Slot = u64;
pub type Epoch = u64;
pub type Gwei = u64;
pub type CommitteeIndex = u64;
pub type ValidatorIndex = u64;
pub type DomainType = u32;
pub type UnixSeconds = u64;

pub type AggregateSignatureBytes = SignatureBytes;

/// A fork version. Stored as raw bytes because hash types bring the wrong
/// serde format and `tree_hash` treats 4-byte values as packed basics.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Deserialize, Serialize)]
pub struct Version(#[serde(with = "serde_fork_version")] [u8; 4]);

impl Version {
    pub fn as_array(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for Version {
    fn from(array: [u8; 4]) -> Self {
        Self(array)
    }
}

impl From<Version> for [u8; 4] {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "0x{}", hex::encode(self.0))
    }
}

impl Encode for Version {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        4
    }

    fn ssz_bytes_len(&self) -> usize {
        4
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decode for Version {
    fn is_ssz_fixed_len() -> bool {
        true
    }

    fn ssz_fixed_len() -> usize {
        4
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != 4 {
            return Err(DecodeError::InvalidByteLength {
                len: bytes.len(),
                expected: 4,
            });
        }
        let mut array = [0; 4];
        array.copy_from_slice(bytes);
        Ok(Self(array))
    }
}

impl TreeHash for Version {
    fn tree_hash_type() -> TreeHashType {
        u32::tree_hash_type()
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        u32::from_le_bytes(self.0).tree_hash_packed_encoding()
    }

    fn tree_hash_packing_factor() -> usize {
        u32::tree_hash_packing_factor()
    }

    fn tree_hash_root(&self) -> Hash256 {
        u32::from_le_bytes(self.0).tree_hash_root()
    }
}

mod serde_fork_version {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8; 4], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 4], D::Error> {
        let string = String::deserialize(deserializer)?;
        let stripped = string
            .strip_prefix("0x")
            .ok_or_else(|| D::Error::custom("fork version must start with 0x"))?;
        let bytes = hex::decode(stripped).map_err(D::Error::custom)?;
        if bytes.len() != 4 {
            return Err(D::Error::custom("fork version must be 4 bytes"));
        }
        let mut array = [0; 4];
        array.copy_from_slice(&bytes);
        Ok(array)
    }
}

/// An 8-byte signature domain: domain type followed by fork version.
/// Represented as a little-endian integer like the rest of the basic types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Debug, Display, Deserialize, Serialize)]
#[display(fmt = "{:#018x}", _0)]
pub struct Domain(u64);

impl Domain {
    pub fn to_integer(self) -> u64 {
        self.0
    }
}

impl From<u64> for Domain {
    fn from(integer: u64) -> Self {
        Self(integer)
    }
}

impl Encode for Domain {
    fn is_ssz_fixed_len() -> bool {
        <u64 as Encode>::is_ssz_fixed_len()
    }

    fn ssz_fixed_len() -> usize {
        <u64 as Encode>::ssz_fixed_len()
    }

    fn ssz_bytes_len(&self) -> usize {
        self.0.ssz_bytes_len()
    }

    fn ssz_append(&self, buf: &mut Vec<u8>) {
        self.0.ssz_append(buf)
    }
}

impl Decode for Domain {
    fn is_ssz_fixed_len() -> bool {
        <u64 as Decode>::is_ssz_fixed_len()
    }

    fn ssz_fixed_len() -> usize {
        <u64 as Decode>::ssz_fixed_len()
    }

    fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        u64::from_ssz_bytes(bytes).map(Self)
    }
}

impl TreeHash for Domain {
    fn tree_hash_type() -> TreeHashType {
        u64::tree_hash_type()
    }

    fn tree_hash_packed_encoding(&self) -> PackedEncoding {
        self.0.tree_hash_packed_encoding()
    }

    fn tree_hash_packing_factor() -> usize {
        u64::tree_hash_packing_factor()
    }

    fn tree_hash_root(&self) -> Hash256 {
        self.0.tree_hash_root()
    }
}

// BLS keys and signatures stay in their serialized form throughout the state.
// Deserialization into curve points happens inside `helper_functions::crypto`
// right before verification, where failures can be reported per message.
macro_rules! impl_signature_bytes {
    ($name: ident, $byte_size: expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $byte_size]);

        impl $name {
            pub const SIZE: usize = $byte_size;

            pub fn empty() -> Self {
                Self([0; $byte_size])
            }

            pub fn as_bytes(&self) -> &[u8; $byte_size] {
                &self.0
            }

            pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                Self::from_ssz_bytes(bytes)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::empty()
            }
        }

        impl From<[u8; $byte_size]> for $name {
            fn from(array: [u8; $byte_size]) -> Self {
                Self(array)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "0x{}", hex::encode(&self.0[..]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "{:?}", self)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(string: &str) -> Result<Self, Self::Err> {
                let stripped = string
                    .strip_prefix("0x")
                    .ok_or_else(|| "must start with 0x".to_string())?;
                let bytes = hex::decode(stripped).map_err(|error| error.to_string())?;
                Self::from_bytes(bytes.as_slice()).map_err(|error| format!("{:?}", error))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&format!("{:?}", self))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let string = String::deserialize(deserializer)?;
                string.parse().map_err(D::Error::custom)
            }
        }

        impl Encode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $byte_size
            }

            fn ssz_bytes_len(&self) -> usize {
                $byte_size
            }

            fn ssz_append(&self, buf: &mut Vec<u8>) {
                buf.extend_from_slice(&self.0);
            }
        }

        impl Decode for $name {
            fn is_ssz_fixed_len() -> bool {
                true
            }

            fn ssz_fixed_len() -> usize {
                $byte_size
            }

            fn from_ssz_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
                if bytes.len() != $byte_size {
                    return Err(DecodeError::InvalidByteLength {
                        len: bytes.len(),
                        expected: $byte_size,
                    });
                }
                let mut array = [0; $byte_size];
                array.copy_from_slice(bytes);
                Ok(Self(array))
            }
        }

        impl TreeHash for $name {
            fn tree_hash_type() -> TreeHashType {
                TreeHashType::Vector
            }

            fn tree_hash_packed_encoding(&self) -> PackedEncoding {
                unreachable!("vector should never be packed")
            }

            fn tree_hash_packing_factor() -> usize {
                unreachable!("vector should never be packed")
            }

            fn tree_hash_root(&self) -> Hash256 {
                tree_hash::merkle_root(&self.0[..], ($byte_size + 31) / 32)
            }
        }
    };
}

impl_signature_bytes!(PublicKeyBytes, 48);
impl_signature_bytes!(SignatureBytes, 96);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ssz_round_trip() {
        let version = Version::from([0, 1, 2, 3]);
        let bytes = version.as_ssz_bytes();
        assert_eq!(bytes, vec![0, 1, 2, 3]);
        assert_eq!(Version::from_ssz_bytes(&bytes), Ok(version));
    }

    #[test]
    fn domain_ssz_matches_u64() {
        let domain = Domain::from(0x0403_0201);
        assert_eq!(domain.as_ssz_bytes(), 0x0403_0201_u64.as_ssz_bytes());
    }

    #[test]
    fn pubkey_bytes_rejects_wrong_length() {
        assert!(PublicKeyBytes::from_bytes(&[0; 47]).is_err());
        assert!(PublicKeyBytes::from_bytes(&[0; 48]).is_ok());
    }

    #[test]
    fn signature_bytes_hex_round_trip() {
        let signature = SignatureBytes::from([7; 96]);
        let string = format!("{}", signature);
        assert_eq!(string.parse::<SignatureBytes>(), Ok(signature));
    }
}
