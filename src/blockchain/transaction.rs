use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use super::crypto::{CryptoError, PrivateKey, PublicKey, Signature};
use super::Address;

/// Sender identity of locally minted mining rewards.
///
/// Contains characters outside the base58 alphabet, so no derived address
/// can ever equal it.
pub const REWARD_SENDER: &str = "COINBASE";

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Failed to encode transaction: {0}")]
    EncodingError(#[from] serde_json::Error),

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// A value transfer as it is recorded on the ledger.
///
/// Only these three fields are ever signed, stored in the pool or sealed
/// into a block. Key material never travels with a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address
    #[serde(rename = "senderAddress")]
    #[schema(value_type = String)]
    sender: Address,

    /// Recipient's address
    #[serde(rename = "recipientAddress")]
    #[schema(value_type = String)]
    recipient: Address,

    /// Amount being transferred
    value: f32,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The address of the sender
    /// * `recipient` - The address of the recipient
    /// * `value` - The amount to transfer
    ///
    /// # Returns
    ///
    /// A new Transaction instance
    pub fn new(sender: Address, recipient: Address, value: f32) -> Self {
        Transaction {
            sender,
            recipient,
            value,
        }
    }

    /// Creates a mining reward paid out by the reserved reward sender
    pub fn new_reward(recipient: Address, value: f32) -> Self {
        Transaction::new(Address::from(REWARD_SENDER), recipient, value)
    }

    pub fn sender(&self) -> &Address {
        &self.sender
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender.as_str() == REWARD_SENDER
    }

    /// Canonical encoding that signatures are computed over.
    ///
    /// Compact JSON with the fields in declaration order:
    /// `{"senderAddress":..,"recipientAddress":..,"value":..}`, the value in
    /// shortest round-trip `f32` notation. Signer and verifier both go
    /// through this function, so the bytes always agree.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// SHA-256 of the canonical encoding
    pub fn digest(&self) -> Result<[u8; 32], TransactionError> {
        let bytes = self.canonical_bytes()?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(bytes));
        Ok(digest)
    }

    /// Signs the transaction
    ///
    /// # Arguments
    ///
    /// * `private_key` - The sender's private key
    ///
    /// # Returns
    ///
    /// The transaction paired with its detached signature
    pub fn sign(self, private_key: &PrivateKey) -> Result<SignedTransaction, TransactionError> {
        let signature = private_key.sign_digest(&self.digest()?)?;

        Ok(SignedTransaction {
            transaction: self,
            signature,
        })
    }
}

/// A transaction together with the signature issued over it
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    transaction: Transaction,
    signature: Signature,
}

impl SignedTransaction {
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Verifies the signature against the sender's public key
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        verify_signature(public_key, &self.signature, &self.transaction)
    }

    pub fn into_parts(self) -> (Transaction, Signature) {
        (self.transaction, self.signature)
    }
}

/// Verifies a signature over a transaction's ledger-visible fields
///
/// # Arguments
///
/// * `public_key` - The public key of the claimed signer
/// * `signature` - The signature to check
/// * `transaction` - The transaction the signature should cover
///
/// # Returns
///
/// true if the signature is valid, false otherwise
pub fn verify_signature(public_key: &PublicKey, signature: &Signature, transaction: &Transaction) -> bool {
    match transaction.digest() {
        Ok(digest) => public_key.verify_digest(&digest, signature),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Wallet;

    fn transfer(sender: &Wallet, recipient: &Wallet, value: f32) -> Transaction {
        Transaction::new(sender.address().clone(), recipient.address().clone(), value)
    }

    #[test]
    fn test_new_transaction() {
        let sender_wallet = Wallet::new().unwrap();
        let recipient_wallet = Wallet::new().unwrap();

        let transaction = transfer(&sender_wallet, &recipient_wallet, 10.5);

        assert_eq!(transaction.sender(), sender_wallet.address());
        assert_eq!(transaction.recipient(), recipient_wallet.address());
        assert_eq!(transaction.value(), 10.5);
        assert!(!transaction.is_reward());
    }

    #[test]
    fn test_canonical_bytes_layout() {
        let transaction = Transaction::new(Address::from("alice"), Address::from("bob"), 1.5);

        let bytes = transaction.canonical_bytes().unwrap();

        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"senderAddress":"alice","recipientAddress":"bob","value":1.5}"#
        );
    }

    #[test]
    fn test_sign_and_verify() {
        let sender_wallet = Wallet::new().unwrap();
        let recipient_wallet = Wallet::new().unwrap();

        let signed = transfer(&sender_wallet, &recipient_wallet, 1.0)
            .sign(sender_wallet.private_key())
            .unwrap();

        assert!(signed.verify(sender_wallet.public_key()));
        assert_eq!(signed.signature().to_hex().len(), 128);
    }

    #[test]
    fn test_tampered_fields_fail_verification() {
        let a = Wallet::new().unwrap();
        let b = Wallet::new().unwrap();
        let c = Wallet::new().unwrap();

        let (transaction, signature) = transfer(&a, &b, 2.5)
            .sign(a.private_key())
            .unwrap()
            .into_parts();

        let other_sender = Transaction::new(c.address().clone(), b.address().clone(), 2.5);
        let other_recipient = Transaction::new(a.address().clone(), c.address().clone(), 2.5);
        // flip the lowest mantissa bit of the value
        let flipped = f32::from_bits(2.5f32.to_bits() ^ 1);
        let other_value = Transaction::new(a.address().clone(), b.address().clone(), flipped);

        assert!(verify_signature(a.public_key(), &signature, &transaction));
        assert!(!verify_signature(a.public_key(), &signature, &other_sender));
        assert!(!verify_signature(a.public_key(), &signature, &other_recipient));
        assert!(!verify_signature(a.public_key(), &signature, &other_value));
    }

    #[test]
    fn test_foreign_public_key_fails_verification() {
        let a = Wallet::new().unwrap();
        let b = Wallet::new().unwrap();

        let signed = transfer(&a, &b, 1.0).sign(a.private_key()).unwrap();

        assert!(!signed.verify(b.public_key()));
    }

    #[test]
    fn test_reward_transaction() {
        let miner_wallet = Wallet::new().unwrap();

        let transaction = Transaction::new_reward(miner_wallet.address().clone(), 0.1);

        assert_eq!(transaction.sender().as_str(), REWARD_SENDER);
        assert_eq!(transaction.recipient(), miner_wallet.address());
        assert_eq!(transaction.value(), 0.1);
        assert!(transaction.is_reward());
    }
}
