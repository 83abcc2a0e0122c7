use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use p256::{EncodedPoint, FieldBytes};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

use super::address::Address;

/// Hex digits of one 256-bit value (scalar or coordinate)
pub const SCALAR_HEX_LEN: usize = 64;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Random source unavailable: {0}")]
    Entropy(String),

    #[error("Failed to sign message: {0}")]
    SigningError(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Public key does not match private key")]
    KeyMismatch,
}

/// A P-256 public point
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Returns X || Y, each coordinate as a 32 byte big-endian string
    pub fn to_bytes(&self) -> [u8; 64] {
        // uncompressed SEC1 encoding is 0x04 || X || Y
        let point = self.0.to_encoded_point(false);
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&point.as_bytes()[1..]);
        bytes
    }

    /// Returns the X and Y coordinates, each zero-padded to 64 hex digits
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parses a public key from its 128 hex digit X || Y form
    ///
    /// # Arguments
    ///
    /// * `s` - The hex string
    ///
    /// # Returns
    ///
    /// The public key, or an error if the string is malformed or the
    /// point is not on the curve
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        if s.len() != 2 * SCALAR_HEX_LEN {
            return Err(CryptoError::InvalidPublicKey(format!(
                "expected {} hex digits, got {}",
                2 * SCALAR_HEX_LEN,
                s.len()
            )));
        }

        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(&bytes[..32]),
            FieldBytes::from_slice(&bytes[32..]),
            false,
        );

        VerifyingKey::from_encoded_point(&point)
            .map(PublicKey)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    /// Checks an ECDSA signature over a 32 byte message digest
    pub fn verify_digest(&self, digest: &[u8; 32], signature: &Signature) -> bool {
        self.0.verify_prehash(digest, &signature.0).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

/// A P-256 private scalar
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Big-endian hex form of the scalar, 64 digits
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    /// Parses a big-endian hex scalar. Shorter strings are left-padded
    /// with zeros; zero and values >= the curve order are rejected.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        if s.is_empty() || s.len() > SCALAR_HEX_LEN {
            return Err(CryptoError::InvalidPrivateKey(format!(
                "expected at most {} hex digits, got {}",
                SCALAR_HEX_LEN,
                s.len()
            )));
        }

        let padded = format!("{:0>width$}", s, width = SCALAR_HEX_LEN);
        let bytes = hex::decode(padded).map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        SigningKey::from_slice(&bytes)
            .map(PrivateKey)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))
    }

    /// The public point matching this scalar
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().clone())
    }

    /// Signs a 32 byte message digest
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, CryptoError> {
        let signature: EcdsaSignature = self
            .0
            .sign_prehash(digest)
            .map_err(|e| CryptoError::SigningError(e.to_string()))?;

        Ok(Signature(signature))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// A detached ECDSA signature (r, s).
///
/// Travels as a single string: r and s zero-padded to 64 hex digits each
/// and concatenated.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature(EcdsaSignature);

impl Signature {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        if s.len() != 2 * SCALAR_HEX_LEN {
            return Err(CryptoError::InvalidSignature(format!(
                "expected {} hex digits, got {}",
                2 * SCALAR_HEX_LEN,
                s.len()
            )));
        }

        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;

        EcdsaSignature::from_slice(&bytes)
            .map(Signature)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }

    /// The r component as 64 hex digits
    pub fn r_hex(&self) -> String {
        hex::encode(&self.0.to_bytes()[..32])
    }

    /// The s component as 64 hex digits
    pub fn s_hex(&self) -> String {
        hex::encode(&self.0.to_bytes()[32..])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Signature {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signature::from_hex(s)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Represents a wallet with a P-256 keypair and its derived address
#[derive(Debug, Clone)]
pub struct Wallet {
    private_key: PrivateKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    ///
    /// The scalar is drawn from the operating system's CSPRNG. Seeds that
    /// fall outside `[1, n)` are redrawn, which keeps the distribution
    /// uniform over valid scalars.
    ///
    /// # Returns
    ///
    /// A new Wallet, or `CryptoError::Entropy` if the random source fails
    pub fn new() -> Result<Self, CryptoError> {
        let mut seed = [0u8; 32];

        loop {
            OsRng
                .try_fill_bytes(&mut seed)
                .map_err(|e| CryptoError::Entropy(e.to_string()))?;

            if let Ok(signing_key) = SigningKey::from_slice(&seed) {
                return Ok(Self::from_private_key(PrivateKey(signing_key)));
            }
        }
    }

    /// Creates a wallet around an existing private key
    pub fn from_private_key(private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        let address = Address::from_public_key(&public_key);

        Wallet {
            private_key,
            public_key,
            address,
        }
    }

    /// Rebuilds a wallet from the hex forms handed out by `private_key_hex`
    /// and `public_key_hex`, rejecting a public key that does not belong to
    /// the private key
    pub fn from_keys(private_key_hex: &str, public_key_hex: &str) -> Result<Self, CryptoError> {
        let private_key = PrivateKey::from_hex(private_key_hex)?;
        let public_key = PublicKey::from_hex(public_key_hex)?;

        if private_key.public_key() != public_key {
            return Err(CryptoError::KeyMismatch);
        }

        Ok(Self::from_private_key(private_key))
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Gets the wallet's private key
    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    pub fn private_key_hex(&self) -> String {
        self.private_key.to_hex()
    }

    pub fn public_key_hex(&self) -> String {
        self.public_key.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn digest(message: &[u8]) -> [u8; 32] {
        Sha256::digest(message).into()
    }

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new().unwrap();

        assert!(!wallet.address().as_str().is_empty());
        assert_eq!(wallet.private_key_hex().len(), 64);
        assert_eq!(wallet.public_key_hex().len(), 128);
        assert_eq!(wallet.private_key().public_key(), *wallet.public_key());
    }

    #[test]
    fn test_key_hex_round_trip() {
        let wallet = Wallet::new().unwrap();

        let restored = Wallet::from_keys(&wallet.private_key_hex(), &wallet.public_key_hex()).unwrap();

        assert_eq!(restored.address(), wallet.address());
        assert_eq!(restored.public_key(), wallet.public_key());
    }

    #[test]
    fn test_short_private_key_is_left_padded() {
        let key = PrivateKey::from_hex("1").unwrap();
        assert_eq!(key.to_hex(), format!("{:0>64}", "1"));
    }

    #[test]
    fn test_invalid_key_material_is_rejected() {
        assert!(PrivateKey::from_hex("").is_err());
        assert!(PrivateKey::from_hex(&"0".repeat(64)).is_err());
        assert!(PrivateKey::from_hex(&"f".repeat(64)).is_err());
        assert!(PrivateKey::from_hex("zz").is_err());

        assert!(PublicKey::from_hex("abcd").is_err());
        // (1, 1) is not on the curve
        let off_curve = format!("{:0>64}{:0>64}", "1", "1");
        assert!(PublicKey::from_hex(&off_curve).is_err());
    }

    #[test]
    fn test_mismatched_keys_are_rejected() {
        let a = Wallet::new().unwrap();
        let b = Wallet::new().unwrap();

        let result = Wallet::from_keys(&a.private_key_hex(), &b.public_key_hex());
        assert!(matches!(result, Err(CryptoError::KeyMismatch)));
    }

    #[test]
    fn test_signing_and_verification() {
        let wallet = Wallet::new().unwrap();
        let message = digest(b"Hello, world!");

        let signature = wallet.private_key().sign_digest(&message).unwrap();
        assert!(wallet.public_key().verify_digest(&message, &signature));

        let wrong_message = digest(b"Wrong message");
        assert!(!wallet.public_key().verify_digest(&wrong_message, &signature));

        let other = Wallet::new().unwrap();
        assert!(!other.public_key().verify_digest(&message, &signature));
    }

    #[test]
    fn test_signature_string_form() {
        let wallet = Wallet::new().unwrap();
        let signature = wallet.private_key().sign_digest(&digest(b"payload")).unwrap();

        let encoded = signature.to_string();
        assert_eq!(encoded.len(), 128);
        assert_eq!(encoded, format!("{}{}", signature.r_hex(), signature.s_hex()));
        assert_eq!(encoded, encoded.to_lowercase());

        let decoded: Signature = encoded.parse().unwrap();
        assert_eq!(decoded, signature);
    }

    #[test]
    fn test_signature_serde_uses_hex_string() {
        let wallet = Wallet::new().unwrap();
        let signature = wallet.private_key().sign_digest(&digest(b"payload")).unwrap();

        let json = serde_json::to_string(&signature).unwrap();
        assert_eq!(json, format!("\"{}\"", signature.to_hex()));

        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signature);
    }
}
