use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::Block;

/// Coarse success/fail body returned to remote callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// "success" or "fail"
    pub message: String,
}

impl StatusResponse {
    pub fn success() -> Self {
        StatusResponse {
            message: "success".to_string(),
        }
    }

    pub fn fail() -> Self {
        StatusResponse {
            message: "fail".to_string(),
        }
    }
}

/// Key material and address of a freshly generated wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    /// Private scalar, 64 hex digits
    pub private_key: String,

    /// X || Y, 128 hex digits
    pub public_key: String,

    /// Base58 address
    pub blockchain_address: String,
}

/// Wallet-side request: build and sign a transfer with the sender's keys.
///
/// Every field is optional at the wire level so that a missing one is
/// reported as a validation failure rather than a decode error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransactionRequest {
    #[serde(alias = "senderPrivatekey")]
    pub sender_private_key: Option<String>,

    pub sender_blockchain_address: Option<String>,

    pub recipient_blockchain_address: Option<String>,

    pub sender_public_key: Option<String>,

    /// Decimal amount, e.g. "1.5"
    pub value: Option<String>,
}

/// Chain-side request: a signed transfer submitted to the ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainTransactionRequest {
    pub sender_blockchain_address: Option<String>,

    pub recipient_blockchain_address: Option<String>,

    pub sender_public_key: Option<String>,

    pub value: Option<f32>,

    /// r || s, 128 hex digits
    pub signature: Option<String>,
}

/// Signature produced by the wallet-side signing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SignatureResponse {
    pub signature: String,
}

/// Response for the chain endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChainResponse {
    /// The length of the chain
    pub length: usize,

    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// Whether the chain is valid
    pub is_valid: bool,
}

/// Response for the mine endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub message: String,

    /// The newly sealed block
    pub block: Block,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountQuery {
    pub blockchain_address: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AmountResponse {
    pub amount: f32,
}
