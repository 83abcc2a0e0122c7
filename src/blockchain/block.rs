use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use std::fmt;

use super::transaction::Transaction;

/// A 256-bit SHA-256 block digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    /// Lowercase hex, 64 digits
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(BlockHash(bytes))
    }

    /// Number of leading '0' digits in the hex form of the hash
    pub fn leading_zero_digits(&self) -> usize {
        let mut count = 0;
        for byte in self.0 {
            if byte == 0 {
                count += 2;
                continue;
            }
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
        count
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for BlockHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BlockHash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Represents a block in the blockchain
///
/// Blocks are built once and never changed afterwards; the hash is derived
/// from the fields on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Creation time in nanoseconds since the Unix epoch
    timestamp: i64,

    /// Proof of work
    nonce: u64,

    /// Hash of the previous block
    #[schema(value_type = String, example = "000a3f5c0e0d64fa58b3c1b6a0e8a4c9d0f4d2b0e7f0c1a9b8e6d5c4b3a29180")]
    previous_hash: BlockHash,

    /// Transactions sealed into this block
    transactions: Vec<Transaction>,
}

/// Borrowed view of the hashed fields. Shares field names and order with
/// `Block`, so a trial block and a sealed one hash identically.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockContent<'a> {
    timestamp: i64,
    nonce: u64,
    previous_hash: &'a BlockHash,
    transactions: &'a [Transaction],
}

impl Block {
    /// Creates a new block stamped with the current time
    ///
    /// # Arguments
    ///
    /// * `nonce` - The proof of work
    /// * `previous_hash` - The hash of the previous block
    /// * `transactions` - The transactions to seal
    ///
    /// # Returns
    ///
    /// A new Block instance
    pub fn new(nonce: u64, previous_hash: BlockHash, transactions: Vec<Transaction>) -> Self {
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        Self::with_timestamp(timestamp, nonce, previous_hash, transactions)
    }

    pub fn with_timestamp(
        timestamp: i64,
        nonce: u64,
        previous_hash: BlockHash,
        transactions: Vec<Transaction>,
    ) -> Self {
        Block {
            timestamp,
            nonce,
            previous_hash,
            transactions,
        }
    }

    /// The all-zero block; its hash is the genesis block's previous hash
    pub fn empty() -> Self {
        Self::with_timestamp(0, 0, BlockHash::ZERO, Vec::new())
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn previous_hash(&self) -> &BlockHash {
        &self.previous_hash
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// SHA-256 over the block's JSON encoding
    pub fn hash(&self) -> BlockHash {
        content_hash(self.timestamp, self.nonce, &self.previous_hash, &self.transactions)
    }
}

/// Hashes block fields without assembling a `Block`
pub fn content_hash(
    timestamp: i64,
    nonce: u64,
    previous_hash: &BlockHash,
    transactions: &[Transaction],
) -> BlockHash {
    let content = BlockContent {
        timestamp,
        nonce,
        previous_hash,
        transactions,
    };

    let mut hasher = Sha256::new();
    // plain structs with string keys always serialize
    serde_json::to_writer(&mut hasher, &content).expect("block content is serializable");

    BlockHash(hasher.finalize().into())
}
