use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

use super::crypto::PublicKey;

/// Version byte prepended to the public key hash
pub const ADDRESS_VERSION: u8 = 0x00;

/// Version byte + RIPEMD-160 digest
const PAYLOAD_LEN: usize = 21;

const CHECKSUM_LEN: usize = 4;

/// Length of a decoded address (payload + checksum)
pub const ADDRESS_LEN: usize = PAYLOAD_LEN + CHECKSUM_LEN;

/// Errors that can occur while decoding an address
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid base58 encoding: {0}")]
    Base58(String),

    #[error("Invalid address length: expected 25 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Unknown address version byte: {0:#04x}")]
    InvalidVersion(u8),

    #[error("Address checksum mismatch")]
    InvalidChecksum,
}

/// A blockchain address.
///
/// Addresses derived from a public key are base58 strings of a 25 byte
/// payload: version byte, RIPEMD-160(SHA-256(X || Y)), and a 4 byte
/// double SHA-256 checksum. The type itself does not enforce that shape,
/// because the ledger records whatever sender and recipient strings a
/// transaction carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Derives the address of a public key
    ///
    /// # Arguments
    ///
    /// * `public_key` - The public key to derive the address from
    ///
    /// # Returns
    ///
    /// The base58 encoded address
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let point = public_key.to_bytes();
        let key_hash = Ripemd160::digest(Sha256::digest(point));

        let mut address = [0u8; ADDRESS_LEN];
        address[0] = ADDRESS_VERSION;
        address[1..PAYLOAD_LEN].copy_from_slice(&key_hash);
        let checksum = checksum(&address[..PAYLOAD_LEN]);
        address[PAYLOAD_LEN..].copy_from_slice(&checksum);

        Address(bs58::encode(address).into_string())
    }

    /// Decodes the address back into its 25 raw bytes, verifying the
    /// version byte and the checksum on the way
    pub fn decode_payload(&self) -> Result<[u8; ADDRESS_LEN], AddressError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| AddressError::Base58(e.to_string()))?;

        let bytes: [u8; ADDRESS_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;

        if bytes[0] != ADDRESS_VERSION {
            return Err(AddressError::InvalidVersion(bytes[0]));
        }

        if checksum(&bytes[..PAYLOAD_LEN]) != bytes[PAYLOAD_LEN..] {
            return Err(AddressError::InvalidChecksum);
        }

        Ok(bytes)
    }

    /// Whether the address decodes to a well-formed, checksummed payload
    pub fn has_valid_checksum(&self) -> bool {
        self.decode_payload().is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// First four bytes of SHA-256(SHA-256(payload))
fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(&digest[..CHECKSUM_LEN]);
    checksum
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}
