use super::block::{content_hash, BlockHash};
use super::transaction::Transaction;

/// Leading zero hex digits a block hash needs
pub const DEFAULT_DIFFICULTY: usize = 3;

/// Nonce search over trial blocks.
///
/// A trial block carries timestamp 0 instead of the wall clock, so the
/// hash of a given nonce never changes during a search. The search is a
/// pure function of its inputs and can be resumed from any nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: usize,
}

impl ProofOfWork {
    /// Difficulty is capped at 64, the length of a hex SHA-256 digest
    pub fn new(difficulty: usize) -> Self {
        ProofOfWork {
            difficulty: difficulty.min(64),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Checks whether `nonce` satisfies the difficulty for the given
    /// previous hash and transactions
    pub fn is_valid_proof(&self, nonce: u64, previous_hash: &BlockHash, transactions: &[Transaction]) -> bool {
        content_hash(0, nonce, previous_hash, transactions).leading_zero_digits() >= self.difficulty
    }

    /// Scans nonces upwards from `start_nonce` until one is valid.
    ///
    /// Unbounded: callers that need to give up should use `search_range`.
    pub fn search(&self, start_nonce: u64, previous_hash: &BlockHash, transactions: &[Transaction]) -> u64 {
        let mut nonce = start_nonce;
        while !self.is_valid_proof(nonce, previous_hash, transactions) {
            nonce = nonce.wrapping_add(1);
        }
        nonce
    }

    /// Tries at most `count` nonces starting at `start_nonce`
    ///
    /// # Returns
    ///
    /// The first valid nonce in the range, or None
    pub fn search_range(
        &self,
        start_nonce: u64,
        count: u64,
        previous_hash: &BlockHash,
        transactions: &[Transaction],
    ) -> Option<u64> {
        (start_nonce..start_nonce.saturating_add(count))
            .find(|&nonce| self.is_valid_proof(nonce, previous_hash, transactions))
    }
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork::new(DEFAULT_DIFFICULTY)
    }
}
