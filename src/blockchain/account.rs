use thiserror::Error;

use super::block::Block;
use super::address::Address;
use super::transaction::Transaction;

/// Errors that can occur during account operations
#[derive(Debug, Error, PartialEq)]
pub enum AccountError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f32, available: f32 },
}

/// Whether admission checks the sender's sealed balance.
///
/// `Permissive` matches the historical behavior: a sender may queue more
/// than it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BalancePolicy {
    #[default]
    Permissive,
    Enforce,
}

/// Computes the balance of an address over every sealed transaction
///
/// # Arguments
///
/// * `blocks` - The sealed chain
/// * `address` - The address to total
///
/// # Returns
///
/// Received value minus sent value
pub fn balance_of(blocks: &[Block], address: &Address) -> f32 {
    let mut total = 0.0f32;

    for transaction in blocks.iter().flat_map(|block| block.transactions()) {
        if transaction.recipient() == address {
            total += transaction.value();
        }
        if transaction.sender() == address {
            total -= transaction.value();
        }
    }

    total
}

/// Applies the balance policy to a transaction about to enter the pool.
/// Rewards are never checked.
pub fn check_funds(policy: BalancePolicy, blocks: &[Block], transaction: &Transaction) -> Result<(), AccountError> {
    if policy == BalancePolicy::Permissive || transaction.is_reward() {
        return Ok(());
    }

    let available = balance_of(blocks, transaction.sender());
    if available < transaction.value() {
        return Err(AccountError::InsufficientFunds {
            required: transaction.value(),
            available,
        });
    }

    Ok(())
}
