use serde::{Serialize, Serializer};

use crate::{
    errors::CustomError,
    models::{
        swap::{SwapButton, SwapDirection, SwapSide},
        token::{TokenSymbol, UNSELECTED_TOKEN},
    },
    utils::format::parse_positive,
};

use super::price_service::PriceCache;

fn serialize_token<S: Serializer>(token: &Option<TokenSymbol>, s: S) -> Result<S::Ok, S::Error> {
    match token {
        Some(token) => s.serialize_str(token.as_str()),
        None => s.serialize_str(UNSELECTED_TOKEN),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapForm {
    #[serde(serialize_with = "serialize_token")]
    src: Option<TokenSymbol>,
    #[serde(serialize_with = "serialize_token")]
    dest: Option<TokenSymbol>,
    input: String,
    output: String,
    button: SwapButton,
    tx_pending: bool,
    loading: bool,
    #[serde(skip)]
    awaiting_allowance: bool,
}

impl Default for SwapForm {
    fn default() -> Self {
        Self::new()
    }
}

impl SwapForm {
    /// ETH on the source side, nothing chosen on the destination side.
    pub fn new() -> Self {
        Self {
            src: Some(TokenSymbol::Eth),
            dest: None,
            input: String::new(),
            output: String::new(),
            button: SwapButton::EnterAmount,
            tx_pending: false,
            loading: false,
            awaiting_allowance: false,
        }
    }

    pub fn src(&self) -> Option<TokenSymbol> {
        self.src
    }

    pub fn dest(&self) -> Option<TokenSymbol> {
        self.dest
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn button(&self) -> SwapButton {
        self.button
    }

    pub fn is_tx_pending(&self) -> bool {
        self.tx_pending
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn token(&self, side: SwapSide) -> Option<TokenSymbol> {
        match side {
            SwapSide::Input => self.src,
            SwapSide::Output => self.dest,
        }
    }

    pub fn pair(&self) -> Option<(TokenSymbol, TokenSymbol)> {
        Some((self.src?, self.dest?))
    }

    pub fn direction(&self) -> Option<SwapDirection> {
        self.pair()
            .and_then(|(src, dest)| SwapDirection::between(src, dest))
    }

    /// Tokens offered by a side's selector: everything except the token
    /// already chosen on the opposite side.
    pub fn selectable(&self, side: SwapSide) -> Vec<TokenSymbol> {
        let taken = self.token(side.opposite());
        TokenSymbol::ALL
            .into_iter()
            .filter(|token| Some(*token) != taken)
            .collect()
    }

    pub fn select_token(
        &mut self,
        side: SwapSide,
        token: TokenSymbol,
        prices: &PriceCache,
    ) -> Result<(), CustomError> {
        self.ensure_idle()?;
        if self.token(side.opposite()) == Some(token) {
            return Err(CustomError::ValidationError(format!(
                "{} is already selected on the other side",
                token
            )));
        }

        match side {
            SwapSide::Input => self.src = Some(token),
            SwapSide::Output => self.dest = Some(token),
        }
        self.awaiting_allowance = false;
        self.sync_from(SwapSide::Input, prices);
        Ok(())
    }

    /// Stores a typed amount and recomputes the field on the other side.
    pub fn set_amount(
        &mut self,
        side: SwapSide,
        value: &str,
        prices: &PriceCache,
    ) -> Result<(), CustomError> {
        self.ensure_idle()?;
        let value = value.trim().to_string();
        match side {
            SwapSide::Input => self.input = value,
            SwapSide::Output => self.output = value,
        }
        self.awaiting_allowance = false;
        self.sync_from(side, prices);
        Ok(())
    }

    fn sync_from(&mut self, side: SwapSide, prices: &PriceCache) {
        let Some((src, dest)) = self.pair() else {
            return;
        };

        match side {
            SwapSide::Input => {
                if self.input.is_empty() {
                    self.output.clear();
                } else if let Some(output) = prices.quote_output(src, dest, &self.input) {
                    self.output = output;
                } else {
                    self.output.clear();
                }
            }
            SwapSide::Output => {
                if self.output.is_empty() {
                    self.input.clear();
                } else if let Some(input) = prices.quote_input(src, dest, &self.output) {
                    self.input = input;
                } else {
                    self.input.clear();
                }
            }
        }
    }

    /// Flips the pair and the two amounts, then requotes the input from the
    /// amount now on the output side.
    pub fn reverse(&mut self, prices: &PriceCache) -> Result<(), CustomError> {
        self.ensure_idle()?;
        std::mem::swap(&mut self.src, &mut self.dest);
        std::mem::swap(&mut self.input, &mut self.output);
        self.awaiting_allowance = false;
        self.sync_from(SwapSide::Output, prices);
        Ok(())
    }

    pub fn has_valid_amount(&self) -> bool {
        parse_positive(&self.input).is_some() && !self.output.is_empty()
    }

    pub fn refresh_button(&mut self, wallet_connected: bool) {
        self.button = if !wallet_connected {
            SwapButton::WalletNotConnected
        } else if !self.has_valid_amount() {
            SwapButton::EnterAmount
        } else if self.awaiting_allowance {
            SwapButton::IncreaseAllowance
        } else {
            SwapButton::Swap
        };
    }

    pub fn require_allowance(&mut self) {
        self.awaiting_allowance = true;
        self.button = SwapButton::IncreaseAllowance;
    }

    pub fn allowance_granted(&mut self) {
        self.awaiting_allowance = false;
        self.button = SwapButton::Swap;
    }

    pub fn clear_amounts(&mut self) {
        self.input.clear();
        self.output.clear();
        self.awaiting_allowance = false;
        self.button = SwapButton::EnterAmount;
    }

    pub fn begin_transaction(&mut self) -> Result<(), CustomError> {
        self.ensure_idle()?;
        self.tx_pending = true;
        Ok(())
    }

    pub fn end_transaction(&mut self) {
        self.tx_pending = false;
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn exchange_rate(&self, prices: &PriceCache) -> Option<String> {
        let (src, dest) = self.pair()?;
        prices.exchange_rate(src, dest)
    }

    fn ensure_idle(&self) -> Result<(), CustomError> {
        if self.tx_pending {
            Err(CustomError::TransactionPendingError)
        } else {
            Ok(())
        }
    }
}
