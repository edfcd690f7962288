//! On-disk value format: an 8-byte big-endian length of the SSZ encoding,
//! followed by its snappy compression.

use core::convert::TryFrom;

use ssz::{Decode, Encode};

use crate::errors::StoreError;

pub fn encode_value<T: Encode>(value: &T) -> Result<Vec<u8>, StoreError> {
    let ssz_bytes = value.as_ssz_bytes();
    let compressed = snap::raw::Encoder::new()
        .compress_vec(&ssz_bytes)
        .map_err(|_| StoreError::CorruptEncoding {
            context: "snappy compression failed",
        })?;

    let mut output = Vec::with_capacity(compressed.len() + 8);
    output.extend_from_slice(&(ssz_bytes.len() as u64).to_be_bytes());
    output.extend_from_slice(&compressed);
    Ok(output)
}

pub fn decode_value<T: Decode>(bytes: &[u8]) -> Result<T, StoreError> {
    if bytes.len() < 8 {
        return Err(StoreError::CorruptEncoding {
            context: "value shorter than its length prefix",
        });
    }

    let mut prefix = [0; 8];
    prefix.copy_from_slice(&bytes[..8]);
    let expected_length = usize::try_from(u64::from_be_bytes(prefix)).map_err(|_| {
        StoreError::CorruptEncoding {
            context: "length prefix does not fit the platform",
        }
    })?;

    let ssz_bytes = snap::raw::Decoder::new()
        .decompress_vec(&bytes[8..])
        .map_err(|_| StoreError::CorruptEncoding {
            context: "snappy decompression failed",
        })?;
    if ssz_bytes.len() != expected_length {
        return Err(StoreError::CorruptEncoding {
            context: "length prefix disagrees with the payload",
        });
    }

    T::from_ssz_bytes(&ssz_bytes).map_err(|_| StoreError::CorruptEncoding {
        context: "ssz decoding failed",
    })
}
