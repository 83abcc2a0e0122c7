// Blockchain module
//
// This module contains the ledger engine:
// - Address derivation
// - Wallets, keys and signatures
// - Transactions
// - Blocks and proof of work
// - Balances and the ledger itself

pub mod account;
pub mod address;
pub mod block;
pub mod chain;
pub mod crypto;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use account::BalancePolicy;
pub use address::Address;
pub use block::{Block, BlockHash};
pub use chain::{Blockchain, BlockchainError, LedgerConfig, MINING_REWARD};
pub use crypto::{CryptoError, PublicKey, Signature, Wallet};
pub use transaction::{Transaction, TransactionError, REWARD_SENDER};
