use blst::min_pk::{PublicKey, Signature};
use blst::BLST_ERROR;
use tree_hash::TreeHash;
use types::primitives::{PublicKeyBytes, SignatureBytes, H256};

use crate::error::Error;

/// Ciphersuite tag for the proof-of-possession BLS scheme the chain uses.
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

pub fn hash(input: &[u8]) -> Vec<u8> {
    ethereum_hashing::hash(input)
}

pub fn hash_tree_root<T: TreeHash>(value: &T) -> H256 {
    value.tree_hash_root()
}

pub fn bls_verify(
    pubkey: &PublicKeyBytes,
    message: &[u8],
    signature: &SignatureBytes,
) -> Result<bool, Error> {
    let public_key = decompress_pubkey(pubkey)?;
    let signature = decompress_signature(signature)?;

    Ok(signature.verify(true, message, DST, &[], &public_key, true) == BLST_ERROR::BLST_SUCCESS)
}

/// Verifies an aggregate signature over a single message, the shape every
/// attestation signature takes after aggregation.
pub fn bls_fast_aggregate_verify<'pk>(
    pubkeys: impl IntoIterator<Item = &'pk PublicKeyBytes>,
    message: &[u8],
    signature: &SignatureBytes,
) -> Result<bool, Error> {
    let public_keys = pubkeys
        .into_iter()
        .map(decompress_pubkey)
        .collect::<Result<Vec<_>, _>>()?;
    if public_keys.is_empty() {
        return Ok(false);
    }
    let references = public_keys.iter().collect::<Vec<_>>();
    let signature = decompress_signature(signature)?;

    Ok(
        signature.fast_aggregate_verify(true, message, DST, references.as_slice())
            == BLST_ERROR::BLST_SUCCESS,
    )
}

fn decompress_pubkey(pubkey: &PublicKeyBytes) -> Result<PublicKey, Error> {
    PublicKey::from_bytes(pubkey.as_bytes()).map_err(|_| Error::InvalidPublicKey)
}

fn decompress_signature(signature: &SignatureBytes) -> Result<Signature, Error> {
    Signature::from_bytes(signature.as_bytes()).map_err(|_| Error::InvalidSignature)
}
