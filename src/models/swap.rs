use ethers::types::{TransactionReceipt, H256, U64};
use serde::{Deserialize, Serialize};

use super::notification::Toast;
use super::token::TokenSymbol;

/// Which contract entry point a token pair is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    EthToToken,
    TokenToEth,
    TokenToToken,
}

impl SwapDirection {
    pub fn between(src: TokenSymbol, dest: TokenSymbol) -> Option<Self> {
        match (src.is_native(), dest.is_native()) {
            _ if src == dest => None,
            (true, false) => Some(SwapDirection::EthToToken),
            (false, true) => Some(SwapDirection::TokenToEth),
            (false, false) => Some(SwapDirection::TokenToToken),
            (true, true) => None,
        }
    }

    /// ETH is sent as call value; everything else needs an ERC20 allowance.
    pub fn needs_allowance(&self) -> bool {
        !matches!(self, SwapDirection::EthToToken)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapSide {
    Input,
    Output,
}

impl SwapSide {
    pub fn opposite(&self) -> Self {
        match self {
            SwapSide::Input => SwapSide::Output,
            SwapSide::Output => SwapSide::Input,
        }
    }
}

/// Label of the form's action button; it also decides what a click does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwapButton {
    #[serde(rename = "Wallet is not connected")]
    WalletNotConnected,
    #[serde(rename = "Enter Amount")]
    EnterAmount,
    #[serde(rename = "Increase Allowance")]
    IncreaseAllowance,
    #[serde(rename = "Swap")]
    Swap,
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub src: String,
    pub dest: String,
    pub amount: String,
    pub side: Option<SwapSide>,
}

#[derive(Debug, Serialize)]
pub struct Quote {
    pub src: TokenSymbol,
    pub dest: TokenSymbol,
    pub input: String,
    pub output: String,
    pub rate: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectTokenRequest {
    pub side: SwapSide,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub side: SwapSide,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PriceUpdateRequest {
    pub token: String,
    pub usd_price: f64,
}

/// The parts of a mined transaction the client cares about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SwapReceipt {
    pub transaction_hash: H256,
    pub block_number: Option<U64>,
    pub gas_used: Option<String>,
}

impl From<&TransactionReceipt> for SwapReceipt {
    fn from(receipt: &TransactionReceipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used.map(|gas| gas.to_string()),
        }
    }
}

/// Result of a click on the form's action button.
#[derive(Debug, Serialize)]
pub struct SwapOutcome {
    pub receipt: Option<SwapReceipt>,
    pub toast: Option<Toast>,
}

/// Fills the input field with a share of the wallet's source-token balance.
#[derive(Debug, Deserialize)]
pub struct PercentageRequest {
    pub percent: u8,
}
