//! Node configuration, read from command-line flags with environment
//! variable fallbacks.

use clap::Parser;

use std::time::Duration;

use crate::api::service::SenderPolicy;
use crate::blockchain::pow::DEFAULT_DIFFICULTY;
use crate::blockchain::{BalancePolicy, LedgerConfig, MINING_REWARD};

#[derive(Debug, Clone, Parser)]
#[command(name = "pow_ledger", version, about = "Single-node proof-of-work ledger")]
pub struct NodeConfig {
    /// Interface to bind the HTTP server to
    #[arg(long, env = "LEDGER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// TCP port for the HTTP server
    #[arg(long, env = "LEDGER_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Leading zero hex digits a block hash needs
    #[arg(long, env = "LEDGER_DIFFICULTY", default_value_t = DEFAULT_DIFFICULTY)]
    pub difficulty: usize,

    /// Reward credited per sealed block
    #[arg(long, env = "LEDGER_MINING_REWARD", default_value_t = MINING_REWARD)]
    pub mining_reward: f32,

    /// Address receiving mining rewards; a fresh wallet is generated when unset
    #[arg(long, env = "LEDGER_MINER_ADDRESS")]
    pub miner_address: Option<String>,

    /// Reject transfers exceeding the sender's sealed balance
    #[arg(long, env = "LEDGER_ENFORCE_BALANCE")]
    pub enforce_balance: bool,

    /// Reject transfers whose sender address is not the signing key's address
    #[arg(long, env = "LEDGER_BIND_SENDER")]
    pub bind_sender: bool,

    /// Abandon a proof-of-work search after this many seconds
    #[arg(long, env = "LEDGER_MINING_TIMEOUT_SECS")]
    pub mining_timeout_secs: Option<u64>,

    /// Seal a block every N seconds in the background, 0 disables
    #[arg(long, env = "LEDGER_MINING_INTERVAL_SECS", default_value_t = 0)]
    pub mining_interval_secs: u64,
}

impl NodeConfig {
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            difficulty: self.difficulty,
            mining_reward: self.mining_reward,
            balance_policy: if self.enforce_balance {
                BalancePolicy::Enforce
            } else {
                BalancePolicy::Permissive
            },
        }
    }

    pub fn sender_policy(&self) -> SenderPolicy {
        if self.bind_sender {
            SenderPolicy::BoundToKey
        } else {
            SenderPolicy::Unbound
        }
    }

    pub fn mining_timeout(&self) -> Option<Duration> {
        self.mining_timeout_secs.map(Duration::from_secs)
    }

    pub fn mining_interval(&self) -> Option<Duration> {
        match self.mining_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
