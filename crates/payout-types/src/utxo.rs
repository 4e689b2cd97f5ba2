//! Unspent transaction outputs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{hex::Hex, serde_as};

use crate::{Result, TypesError};

/// A 32-byte transaction hash, serialized as lowercase hex.
#[serde_as]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(#[serde_as(as = "Hex")] pub [u8; 32]);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for TxId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| TypesError::InvalidTxId(e.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| TypesError::InvalidTxId(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Self(arr))
    }
}

/// Non-native token metadata attached to an output.
///
/// Any output carrying this is excluded from coin selection: spending it
/// as plain value would destroy the token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMeta {
    /// Token identifier as reported by the indexer.
    pub token_id: String,
    /// Token amount held by the output (indexer units).
    #[serde(default)]
    pub amount: u64,
}

/// An unspent transaction output as observed from the indexer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// Hash of the transaction that created this output.
    pub tx_id: TxId,
    /// Output index within that transaction.
    pub vout: u32,
    /// Value in base units.
    pub value: u64,
    /// Height of the block that confirmed the transaction.
    pub block_height: u32,
    /// Whether the output is a block reward.
    #[serde(default)]
    pub is_coinbase: bool,
    /// Token metadata, if the output carries a non-native token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_meta: Option<TokenMeta>,
}

impl UnspentOutput {
    /// `tx_id:vout`, for logs.
    pub fn outpoint(&self) -> String {
        format!("{}:{}", self.tx_id, self.vout)
    }

    /// Confirmation depth at `current_height`, or `None` if the output is
    /// reported above the current tip.
    pub fn depth(&self, current_height: u32) -> Option<u32> {
        current_height.checked_sub(self.block_height)
    }
}
