use actix_web::web;
use log::info;
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::schema::{ChainTransactionRequest, WalletResponse, WalletTransactionRequest};
use crate::blockchain::{
    Address, Block, Blockchain, BlockchainError, CryptoError, PublicKey, Signature, Transaction,
    TransactionError, Wallet, REWARD_SENDER,
};

/// Errors surfaced by ledger operations.
///
/// Remote callers only ever see success or fail; the variants exist for
/// logging and tests.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Missing fields: {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error("Sender {0} is reserved for mining rewards")]
    ReservedSender(String),

    #[error("Sender address {sender} does not belong to public key (expected {expected})")]
    SenderMismatch { sender: String, expected: String },

    #[error("Invalid value {0:?}")]
    Parse(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Blockchain error: {0}")]
    Blockchain(#[from] BlockchainError),

    #[error("Mining timed out after {0:?}")]
    MiningTimeout(Duration),

    #[error("Mining worker failed: {0}")]
    Worker(String),
}

/// Names of the fields whose flag is set
fn missing_fields(fields: &[(&'static str, bool)]) -> Vec<&'static str> {
    fields
        .iter()
        .filter(|(_, missing)| *missing)
        .map(|(name, _)| *name)
        .collect()
}

/// Parses a decimal amount, rejecting NaN and infinities
fn parse_value(value: &str) -> Result<f32, ServiceError> {
    match value.trim().parse::<f32>() {
        Ok(parsed) if parsed.is_finite() => Ok(parsed),
        _ => Err(ServiceError::Parse(value.to_string())),
    }
}

/// Whether a transfer's sender address must be the address of the public
/// key that signed it.
///
/// `Unbound` matches the historical behavior: only the signature over the
/// transfer is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SenderPolicy {
    #[default]
    Unbound,
    BoundToKey,
}

/// Checks that `sender` is the address derived from `public_key`, when the
/// policy asks for it
fn check_sender(policy: SenderPolicy, sender: &str, public_key: &PublicKey) -> Result<(), ServiceError> {
    if policy == SenderPolicy::Unbound {
        return Ok(());
    }

    let expected = Address::from_public_key(public_key);
    if expected.as_str() != sender {
        return Err(ServiceError::SenderMismatch {
            sender: sender.to_string(),
            expected: expected.0,
        });
    }
    Ok(())
}

/// The operations offered to HTTP clients, over one explicitly owned ledger
#[derive(Debug, Clone)]
pub struct LedgerService {
    blockchain: Blockchain,

    /// Upper bound on one proof-of-work search, none by default
    mining_timeout: Option<Duration>,

    sender_policy: SenderPolicy,
}

impl LedgerService {
    pub fn new(blockchain: Blockchain) -> Self {
        LedgerService {
            blockchain,
            mining_timeout: None,
            sender_policy: SenderPolicy::default(),
        }
    }

    pub fn with_mining_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.mining_timeout = timeout;
        self
    }

    pub fn with_sender_policy(mut self, policy: SenderPolicy) -> Self {
        self.sender_policy = policy;
        self
    }

    pub fn sender_policy(&self) -> SenderPolicy {
        self.sender_policy
    }

    /// Generates a wallet and hands out its key material
    pub fn create_wallet(&self) -> Result<WalletResponse, ServiceError> {
        let wallet = Wallet::new()?;

        Ok(WalletResponse {
            private_key: wallet.private_key_hex(),
            public_key: wallet.public_key_hex(),
            blockchain_address: wallet.address().0.clone(),
        })
    }

    /// Builds a transfer from the sender's keys and signs it
    ///
    /// # Arguments
    ///
    /// * `request` - Sender keys, both addresses and the value as a decimal string
    ///
    /// # Returns
    ///
    /// The signed request, ready for `submit_transaction`
    pub fn build_and_sign_transaction(
        &self,
        request: &WalletTransactionRequest,
    ) -> Result<ChainTransactionRequest, ServiceError> {
        let (Some(private_key), Some(sender), Some(recipient), Some(public_key), Some(value)) = (
            request.sender_private_key.as_deref(),
            request.sender_blockchain_address.as_deref(),
            request.recipient_blockchain_address.as_deref(),
            request.sender_public_key.as_deref(),
            request.value.as_deref(),
        ) else {
            return Err(ServiceError::Validation(missing_fields(&[
                ("senderPrivateKey", request.sender_private_key.is_none()),
                ("senderBlockchainAddress", request.sender_blockchain_address.is_none()),
                ("recipientBlockchainAddress", request.recipient_blockchain_address.is_none()),
                ("senderPublicKey", request.sender_public_key.is_none()),
                ("value", request.value.is_none()),
            ])));
        };

        let value = parse_value(value)?;
        let wallet = Wallet::from_keys(private_key, public_key)?;
        check_sender(self.sender_policy, sender, wallet.public_key())?;

        let signed = Transaction::new(Address::from(sender), Address::from(recipient), value)
            .sign(wallet.private_key())?;

        Ok(ChainTransactionRequest {
            sender_blockchain_address: Some(sender.to_string()),
            recipient_blockchain_address: Some(recipient.to_string()),
            sender_public_key: Some(wallet.public_key_hex()),
            value: Some(value),
            signature: Some(signed.signature().to_hex()),
        })
    }

    /// Submits a signed transfer to the pool
    pub fn submit_transaction(&self, request: &ChainTransactionRequest) -> Result<(), ServiceError> {
        let (Some(sender), Some(recipient), Some(public_key), Some(value), Some(signature)) = (
            request.sender_blockchain_address.as_deref(),
            request.recipient_blockchain_address.as_deref(),
            request.sender_public_key.as_deref(),
            request.value,
            request.signature.as_deref(),
        ) else {
            return Err(ServiceError::Validation(missing_fields(&[
                ("senderBlockchainAddress", request.sender_blockchain_address.is_none()),
                ("recipientBlockchainAddress", request.recipient_blockchain_address.is_none()),
                ("senderPublicKey", request.sender_public_key.is_none()),
                ("value", request.value.is_none()),
                ("signature", request.signature.is_none()),
            ])));
        };

        // rewards are only ever minted by the ledger itself
        if sender == REWARD_SENDER {
            return Err(ServiceError::ReservedSender(sender.to_string()));
        }

        let public_key = PublicKey::from_hex(public_key)?;
        let signature = Signature::from_hex(signature)?;
        check_sender(self.sender_policy, sender, &public_key)?;

        self.blockchain.try_admit_transaction(
            Address::from(sender),
            Address::from(recipient),
            value,
            Some(&public_key),
            Some(&signature),
        )?;

        Ok(())
    }

    /// Builds, signs and submits in one step, like the wallet front-end does
    pub fn send_transaction(&self, request: &WalletTransactionRequest) -> Result<(), ServiceError> {
        let signed = self.build_and_sign_transaction(request)?;
        self.submit_transaction(&signed)
    }

    /// Seals the pool into a block on a blocking worker thread.
    ///
    /// With a mining timeout configured, the search is cancelled once the
    /// timeout elapses. `MiningTimeout` is only returned once the worker has
    /// withdrawn, so the ledger is unchanged; a block the worker committed
    /// before noticing the cancel is returned as a success.
    pub async fn mine(&self) -> Result<Block, ServiceError> {
        let blockchain = self.blockchain.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();

        let task = web::block(move || blockchain.seal_block_cancellable(&flag));
        tokio::pin!(task);

        let joined = match self.mining_timeout {
            Some(limit) => {
                let timed = tokio::time::timeout(limit, &mut task).await;
                match timed {
                    Ok(joined) => joined,
                    Err(_) => {
                        cancel.store(true, Ordering::Release);

                        // the worker either withdraws at its next check or has
                        // already committed, and the answer must say which
                        match task.await {
                            Ok(Err(BlockchainError::MiningCancelled)) => {
                                return Err(ServiceError::MiningTimeout(limit));
                            }
                            joined => joined,
                        }
                    }
                }
            }
            None => task.await,
        };

        let block = joined.map_err(|e| ServiceError::Worker(e.to_string()))??;
        info!("Sealed block {} with {} transactions", block.hash(), block.transactions().len());

        Ok(block)
    }

    pub fn get_chain(&self) -> Vec<Block> {
        self.blockchain.get_chain()
    }

    pub fn is_valid(&self) -> bool {
        self.blockchain.is_valid()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.blockchain.get_pending_transactions()
    }

    pub fn compute_balance(&self, address: &str) -> f32 {
        self.blockchain.compute_balance(&Address::from(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{LedgerConfig, MINING_REWARD};

    fn service(difficulty: usize) -> (LedgerService, Wallet) {
        let miner = Wallet::new().unwrap();
        let blockchain = Blockchain::with_config(
            miner.address().clone(),
            LedgerConfig {
                difficulty,
                ..LedgerConfig::default()
            },
        );
        (LedgerService::new(blockchain), miner)
    }

    fn wallet_request(from: &WalletResponse, to: &WalletResponse, value: &str) -> WalletTransactionRequest {
        WalletTransactionRequest {
            sender_private_key: Some(from.private_key.clone()),
            sender_blockchain_address: Some(from.blockchain_address.clone()),
            recipient_blockchain_address: Some(to.blockchain_address.clone()),
            sender_public_key: Some(from.public_key.clone()),
            value: Some(value.to_string()),
        }
    }

    #[test]
    fn test_create_wallet_encodings() {
        let (service, _) = service(1);

        let wallet = service.create_wallet().unwrap();

        assert_eq!(wallet.private_key.len(), 64);
        assert_eq!(wallet.public_key.len(), 128);
        assert!(Address::from(wallet.blockchain_address.as_str()).has_valid_checksum());
    }

    #[actix_web::test]
    async fn test_wallet_to_chain_scenario() {
        let (service, miner) = service(3);
        let a = service.create_wallet().unwrap();
        let b = service.create_wallet().unwrap();

        let signed = service.build_and_sign_transaction(&wallet_request(&a, &b, "1.0")).unwrap();
        assert_eq!(signed.signature.as_ref().unwrap().len(), 128);
        service.submit_transaction(&signed).unwrap();

        let block = service.mine().await.unwrap();
        assert_eq!(block.transactions().len(), 2);

        assert_eq!(service.compute_balance(&b.blockchain_address), 1.0);
        assert_eq!(service.compute_balance(&a.blockchain_address), -1.0);
        assert_eq!(service.compute_balance(miner.address().as_str()), MINING_REWARD);
        assert!(service.is_valid());
    }

    #[test]
    fn test_missing_fields_are_listed() {
        let (service, _) = service(1);
        let request = WalletTransactionRequest {
            value: Some("1".to_string()),
            ..WalletTransactionRequest::default()
        };

        match service.build_and_sign_transaction(&request) {
            Err(ServiceError::Validation(fields)) => assert_eq!(
                fields,
                vec![
                    "senderPrivateKey",
                    "senderBlockchainAddress",
                    "recipientBlockchainAddress",
                    "senderPublicKey"
                ]
            ),
            other => panic!("unexpected result: {:?}", other),
        }

        let result = service.submit_transaction(&ChainTransactionRequest::default());
        assert!(matches!(result, Err(ServiceError::Validation(fields)) if fields.len() == 5));
    }

    #[test]
    fn test_malformed_value_is_parse_error() {
        let (service, _) = service(1);
        let a = service.create_wallet().unwrap();
        let b = service.create_wallet().unwrap();

        for value in ["abc", "", "NaN", "inf"] {
            let result = service.build_and_sign_transaction(&wallet_request(&a, &b, value));
            assert!(matches!(result, Err(ServiceError::Parse(_))), "value {:?}", value);
        }

        let signed = service.build_and_sign_transaction(&wallet_request(&a, &b, " 0.25 ")).unwrap();
        assert_eq!(signed.value, Some(0.25));
    }

    #[test]
    fn test_reserved_sender_is_refused() {
        let (service, _) = service(1);
        let a = service.create_wallet().unwrap();

        let mut request = service
            .build_and_sign_transaction(&wallet_request(&a, &a, "1"))
            .unwrap();
        request.sender_blockchain_address = Some(REWARD_SENDER.to_string());

        assert!(matches!(
            service.submit_transaction(&request),
            Err(ServiceError::ReservedSender(_))
        ));
        assert!(service.pending_transactions().is_empty());
    }

    #[test]
    fn test_signature_from_other_key_is_rejected() {
        let (service, _) = service(1);
        let a = service.create_wallet().unwrap();
        let b = service.create_wallet().unwrap();
        let mallory = service.create_wallet().unwrap();

        let mut request = service.build_and_sign_transaction(&wallet_request(&a, &b, "1")).unwrap();
        let forged = service
            .build_and_sign_transaction(&wallet_request(&mallory, &b, "1"))
            .unwrap();
        request.signature = forged.signature;

        let result = service.submit_transaction(&request);

        assert!(matches!(
            result,
            Err(ServiceError::Blockchain(BlockchainError::InvalidSignature))
        ));
        assert!(service.pending_transactions().is_empty());
    }

    #[test]
    fn test_sender_binding_follows_policy() {
        let (service, _) = service(1);
        let a = service.create_wallet().unwrap();
        let b = service.create_wallet().unwrap();

        // a's keys, but b's address as sender
        let mut request = wallet_request(&a, &b, "1");
        request.sender_blockchain_address = Some(b.blockchain_address.clone());

        // unbound: a valid signature is all admission asks for
        let signed = service.build_and_sign_transaction(&request).unwrap();
        service.submit_transaction(&signed).unwrap();
        assert_eq!(service.pending_transactions().len(), 1);

        let service = service.with_sender_policy(SenderPolicy::BoundToKey);
        assert!(matches!(
            service.build_and_sign_transaction(&request),
            Err(ServiceError::SenderMismatch { .. })
        ));
        assert!(matches!(
            service.submit_transaction(&signed),
            Err(ServiceError::SenderMismatch { .. })
        ));
        assert_eq!(service.pending_transactions().len(), 1);

        let honest = service.build_and_sign_transaction(&wallet_request(&a, &b, "1")).unwrap();
        service.submit_transaction(&honest).unwrap();
        assert_eq!(service.pending_transactions().len(), 2);
    }

    #[test]
    fn test_mismatched_key_pair_is_refused() {
        let (service, _) = service(1);
        let a = service.create_wallet().unwrap();
        let b = service.create_wallet().unwrap();

        let mut request = wallet_request(&a, &b, "1");
        request.sender_public_key = Some(b.public_key.clone());

        assert!(matches!(
            service.build_and_sign_transaction(&request),
            Err(ServiceError::Crypto(CryptoError::KeyMismatch))
        ));
    }

    #[test]
    fn test_send_transaction_queues() {
        let (service, _) = service(1);
        let a = service.create_wallet().unwrap();
        let b = service.create_wallet().unwrap();

        service.send_transaction(&wallet_request(&a, &b, "2.5")).unwrap();

        let pending = service.pending_transactions();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].value(), 2.5);
        assert_eq!(pending[0].sender().as_str(), a.blockchain_address);
    }

    #[actix_web::test]
    async fn test_mining_timeout_rolls_back() {
        let (service, _) = service(64);
        let service = service.with_mining_timeout(Some(Duration::from_millis(50)));

        let result = service.mine().await;

        assert!(matches!(result, Err(ServiceError::MiningTimeout(_))));
        assert!(service.pending_transactions().is_empty());
        assert_eq!(service.get_chain().len(), 1);
    }

    #[actix_web::test]
    async fn test_timeout_outcome_matches_ledger() {
        // with an easy target the worker often finds a nonce before it sees
        // the cancel; the reply must agree with what reached the chain
        let (service, _) = service(1);
        let service = service.with_mining_timeout(Some(Duration::ZERO));

        for _ in 0..20 {
            let height = service.get_chain().len();

            match service.mine().await {
                Ok(block) => {
                    assert_eq!(service.get_chain().len(), height + 1);
                    assert_eq!(service.blockchain.get_last_block(), Some(block));
                }
                Err(ServiceError::MiningTimeout(_)) => {
                    assert_eq!(service.get_chain().len(), height);
                }
                Err(err) => panic!("unexpected error: {}", err),
            }

            assert!(service.pending_transactions().is_empty());
        }

        assert!(service.is_valid());
    }
}
