use log::{info, warn};
use parking_lot::Mutex;
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::account::{self, AccountError, BalancePolicy};
use super::address::Address;
use super::block::{Block, BlockHash};
use super::crypto::{PublicKey, Signature};
use super::pow::{ProofOfWork, DEFAULT_DIFFICULTY};
use super::transaction::{verify_signature, Transaction, TransactionError};

/// Reward credited to the ledger's reward address for every sealed block
pub const MINING_REWARD: f32 = 0.1;

/// Nonces tried between two checks of the cancellation flag
const SEARCH_CHUNK: u64 = 4096;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Couldn't verify transaction signature")]
    InvalidSignature,

    #[error("Missing sender public key or signature")]
    MissingCredentials,

    #[error("Account error: {0}")]
    AccountError(#[from] AccountError),

    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Mining cancelled")]
    MiningCancelled,
}

/// Tunables of a ledger instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerConfig {
    /// Mining difficulty (number of leading zero hex digits required in hash)
    pub difficulty: usize,

    /// Mining reward
    pub mining_reward: f32,

    /// Insufficient-funds check on admission
    pub balance_policy: BalancePolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: MINING_REWARD,
            balance_policy: BalancePolicy::default(),
        }
    }
}

#[derive(Debug)]
struct LedgerState {
    /// The chain of blocks, never empty
    chain: Vec<Block>,

    /// Hash of the last block in `chain`
    tip: BlockHash,

    /// Pending transactions to be included in the next block
    pool: Vec<Transaction>,
}

impl LedgerState {
    fn push_block(&mut self, block: Block) {
        self.tip = block.hash();
        self.chain.push(block);
    }
}

/// Frozen inputs of one sealing attempt
struct SealJob {
    previous_hash: BlockHash,
    transactions: Vec<Transaction>,
}

/// Represents the blockchain
///
/// Cloning is cheap and every clone shares the same chain and pool.
/// Chain and pool sit behind one lock, so admissions and the pool
/// snapshot of a seal never interleave. A second lock serializes whole
/// seals, which keeps two miners from building on the same tip.
#[derive(Debug, Clone)]
pub struct Blockchain {
    state: Arc<Mutex<LedgerState>>,

    mining: Arc<Mutex<()>>,

    /// Address credited with mining rewards
    reward_address: Address,

    pow: ProofOfWork,

    config: LedgerConfig,
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block
    ///
    /// # Arguments
    ///
    /// * `reward_address` - The address that receives mining rewards
    ///
    /// # Returns
    ///
    /// A new Blockchain instance
    pub fn new(reward_address: Address) -> Self {
        Self::with_config(reward_address, LedgerConfig::default())
    }

    /// Creates a new blockchain with custom difficulty, reward and
    /// balance policy
    pub fn with_config(reward_address: Address, config: LedgerConfig) -> Self {
        // genesis links to the hash of the all-zero block
        let genesis = Block::new(0, Block::empty().hash(), Vec::new());

        let state = LedgerState {
            tip: genesis.hash(),
            chain: vec![genesis],
            pool: Vec::new(),
        };

        Blockchain {
            state: Arc::new(Mutex::new(state)),
            mining: Arc::new(Mutex::new(())),
            reward_address,
            pow: ProofOfWork::new(config.difficulty),
            config,
        }
    }

    pub fn reward_address(&self) -> &Address {
        &self.reward_address
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Gets the last block in the chain
    pub fn get_last_block(&self) -> Option<Block> {
        self.state.lock().chain.last().cloned()
    }

    /// Adds a transaction to the pool
    ///
    /// Rewards are admitted unconditionally. Anything else needs a public
    /// key and a signature that verifies over the ledger-visible fields,
    /// and must pass the configured balance policy.
    ///
    /// # Returns
    ///
    /// Ok if the transaction was queued, the reason for rejection otherwise
    pub fn try_admit_transaction(
        &self,
        sender: Address,
        recipient: Address,
        value: f32,
        sender_public_key: Option<&PublicKey>,
        signature: Option<&Signature>,
    ) -> Result<(), BlockchainError> {
        let transaction = Transaction::new(sender, recipient, value);

        if !transaction.is_reward() {
            let (public_key, signature) = match (sender_public_key, signature) {
                (Some(public_key), Some(signature)) => (public_key, signature),
                _ => return Err(BlockchainError::MissingCredentials),
            };

            if !verify_signature(public_key, signature, &transaction) {
                return Err(BlockchainError::InvalidSignature);
            }
        }

        let mut state = self.state.lock();
        account::check_funds(self.config.balance_policy, &state.chain, &transaction)?;
        state.pool.push(transaction);

        Ok(())
    }

    /// Adds a transaction to the pool, reporting only whether it was accepted
    pub fn admit_transaction(
        &self,
        sender: Address,
        recipient: Address,
        value: f32,
        sender_public_key: Option<&PublicKey>,
        signature: Option<&Signature>,
    ) -> bool {
        match self.try_admit_transaction(sender, recipient, value, sender_public_key, signature) {
            Ok(()) => true,
            Err(err) => {
                warn!("Error: {}", err);
                false
            }
        }
    }

    /// Seals the pool into a new block
    ///
    /// Queues the mining reward, freezes the pool, searches for a nonce
    /// without holding the state lock, then appends the block and drops the
    /// sealed transactions from the pool. Transactions admitted while the
    /// search runs stay pending for the next block.
    ///
    /// # Returns
    ///
    /// The newly sealed block
    pub fn seal_block(&self) -> Block {
        let _mining = self.mining.lock();

        let job = self.prepare_seal();
        let nonce = self.pow.search(0, &job.previous_hash, &job.transactions);

        self.commit_seal(job, nonce)
    }

    /// Like `seal_block`, but gives up once `cancel` is set.
    ///
    /// A cancelled seal leaves chain and pool as they were before the call.
    pub fn seal_block_cancellable(&self, cancel: &AtomicBool) -> Result<Block, BlockchainError> {
        let _mining = self.mining.lock();

        let job = self.prepare_seal();
        let mut start = 0u64;

        loop {
            if cancel.load(Ordering::Acquire) {
                Self::withdraw_reward(&mut self.state.lock(), &job);
                warn!("action=mining status=cancelled nonces_tried={}", start);
                return Err(BlockchainError::MiningCancelled);
            }

            if let Some(nonce) = self
                .pow
                .search_range(start, SEARCH_CHUNK, &job.previous_hash, &job.transactions)
            {
                let mut state = self.state.lock();

                // a cancel raised during the last chunk still beats the commit
                if cancel.load(Ordering::Acquire) {
                    Self::withdraw_reward(&mut state, &job);
                    warn!("action=mining status=cancelled nonce={} found_after_cancel=true", nonce);
                    return Err(BlockchainError::MiningCancelled);
                }

                return Ok(Self::append_sealed(&mut state, job, nonce));
            }

            start = start.saturating_add(SEARCH_CHUNK);
        }
    }

    /// Mines one block, as exposed to clients
    pub fn mine(&self) -> bool {
        self.seal_block();
        true
    }

    fn prepare_seal(&self) -> SealJob {
        let reward = Transaction::new_reward(self.reward_address.clone(), self.config.mining_reward);

        let mut state = self.state.lock();
        state.pool.push(reward);

        SealJob {
            previous_hash: state.tip,
            transactions: state.pool.clone(),
        }
    }

    fn commit_seal(&self, job: SealJob, nonce: u64) -> Block {
        Self::append_sealed(&mut self.state.lock(), job, nonce)
    }

    fn append_sealed(state: &mut LedgerState, job: SealJob, nonce: u64) -> Block {
        debug_assert_eq!(state.tip, job.previous_hash);

        // only seals remove from the pool and seals are serialized, so the
        // frozen snapshot is still the pool's prefix
        state.pool.drain(..job.transactions.len());

        let block = Block::new(nonce, job.previous_hash, job.transactions);
        state.push_block(block.clone());

        info!(
            "action=mining status=success height={} nonce={} transactions={}",
            state.chain.len() - 1,
            nonce,
            block.transactions().len()
        );

        block
    }

    fn withdraw_reward(state: &mut LedgerState, job: &SealJob) {
        // the reward queued by prepare_seal is the snapshot's last entry
        let reward_index = job.transactions.len() - 1;
        state.pool.remove(reward_index);
    }

    /// Computes the balance of an address over all sealed blocks
    ///
    /// Scans every sealed transaction on each call.
    pub fn compute_balance(&self, address: &Address) -> f32 {
        let state = self.state.lock();
        account::balance_of(&state.chain, address)
    }

    /// Gets the entire blockchain
    pub fn get_chain(&self) -> Vec<Block> {
        self.state.lock().chain.clone()
    }

    /// Gets all pending transactions
    pub fn get_pending_transactions(&self) -> Vec<Transaction> {
        self.state.lock().pool.clone()
    }

    /// Validates the blockchain
    ///
    /// # Returns
    ///
    /// true if every block links to its predecessor and carries a valid
    /// proof of work, false otherwise
    pub fn is_valid(&self) -> bool {
        let state = self.state.lock();
        let chain = &state.chain;

        match chain.first() {
            Some(genesis) if *genesis.previous_hash() == Block::empty().hash() => {}
            _ => return false,
        }

        for i in 1..chain.len() {
            let current_block = &chain[i];
            let previous_block = &chain[i - 1];

            // Check if the previous hash is correct
            if *current_block.previous_hash() != previous_block.hash() {
                return false;
            }

            // Check the proof of work
            if !self.pow.is_valid_proof(
                current_block.nonce(),
                current_block.previous_hash(),
                current_block.transactions(),
            ) {
                return false;
            }
        }

        chain.last().map(Block::hash) == Some(state.tip)
    }
}
