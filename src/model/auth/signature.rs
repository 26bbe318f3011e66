use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use thiserror::Error;

use crate::model::common::address::WalletAddress;

/// Length of a recoverable secp256k1 signature: `r || s || v`.
const SIGNATURE_LENGTH: usize = 65;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Malformed signature")]
    Malformed,
    #[error("Signature verification failed")]
    Recovery,
}

/// Recover the wallet address that produced the given personal-sign signature
/// over the given message.
///
/// Wallets sign the Keccak-256 hash of the message wrapped in the
/// `"\x19Ethereum Signed Message:\n" + byte length` envelope, and append a
/// recovery byte `v` (27 or 28, or 0/1 from some signers) to the 64-byte
/// `r || s` pair.
pub fn recover_address(message: &str, signature: &str) -> Result<WalletAddress, SignatureError> {
    let hex = signature.strip_prefix("0x").unwrap_or(signature);
    let bytes = data_encoding::HEXLOWER_PERMISSIVE
        .decode(hex.as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    if bytes.len() != SIGNATURE_LENGTH {
        return Err(SignatureError::Malformed);
    }

    let v = bytes[SIGNATURE_LENGTH - 1];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let recovery_id = RecoveryId::from_byte(recovery_byte).ok_or(SignatureError::Malformed)?;
    let signature = Signature::from_slice(&bytes[..SIGNATURE_LENGTH - 1])
        .map_err(|_| SignatureError::Malformed)?;

    let key = VerifyingKey::recover_from_digest(personal_digest(message), &signature, recovery_id)
        .map_err(|_| SignatureError::Recovery)?;
    Ok(address_of(&key))
}

/// The personal-sign digest of a message.
fn personal_digest(message: &str) -> Keccak256 {
    Keccak256::new()
        .chain_update("\x19Ethereum Signed Message:\n")
        .chain_update(message.len().to_string())
        .chain_update(message)
}

/// The address of a public key: the last 20 bytes of the Keccak-256 hash of
/// its uncompressed SEC1 encoding, minus the 0x04 tag.
fn address_of(key: &VerifyingKey) -> WalletAddress {
    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    let mut address = [0_u8; 20];
    address.copy_from_slice(&hash[12..]);
    WalletAddress::from_bytes(&address)
}
