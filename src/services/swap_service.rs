use ethers::types::Address;
use log::{error, info, warn};

use crate::{
    models::{
        notification::Toast,
        swap::{SwapButton, SwapDirection, SwapOutcome, SwapReceipt},
    },
    utils::format::{to_wei, TOKEN_DECIMALS},
};

use super::{blockchain_service::DexGateway, swap_form::SwapForm};

const CONNECT_WALLET: &str = "Please connect your wallet";
const ENTER_VALID_AMOUNT: &str = "Please enter a valid amount";
const INVALID_COMBINATION: &str = "Invalid swap combination";
const INSUFFICIENT_ALLOWANCE: &str = "Insufficient allowance. Please increase allowance first.";

/// Runs the form's action button against the DEX.
pub struct SwapController<'a> {
    gateway: &'a dyn DexGateway,
}

fn failed(toast: Toast) -> SwapOutcome {
    SwapOutcome {
        receipt: None,
        toast: Some(toast),
    }
}

fn succeeded(receipt: SwapReceipt, message: &str) -> SwapOutcome {
    SwapOutcome {
        receipt: Some(receipt),
        toast: Some(Toast::success(message)),
    }
}

impl<'a> SwapController<'a> {
    pub fn new(gateway: &'a dyn DexGateway) -> Self {
        Self { gateway }
    }

    /// Handles a click on the action button. The form is marked pending for
    /// the whole call; on failure its amounts are left as they were.
    pub async fn click(&self, form: &mut SwapForm, account: Option<Address>) -> SwapOutcome {
        if let Err(e) = form.begin_transaction() {
            return failed(Toast::from(&e));
        }

        form.refresh_button(account.is_some());
        let outcome = match (form.button(), account) {
            (SwapButton::IncreaseAllowance, Some(_)) => self.increase_allowance(form).await,
            (SwapButton::Swap, Some(account)) => self.swap(form, account).await,
            (SwapButton::EnterAmount, _) => failed(Toast::error(ENTER_VALID_AMOUNT)),
            _ => failed(Toast::error(CONNECT_WALLET)),
        };

        form.end_transaction();
        form.refresh_button(account.is_some());
        outcome
    }

    async fn increase_allowance(&self, form: &mut SwapForm) -> SwapOutcome {
        let Some(src) = form.src() else {
            return failed(Toast::error(INVALID_COMBINATION));
        };
        let amount = match to_wei(form.input(), TOKEN_DECIMALS) {
            Ok(amount) => amount,
            Err(_) => return failed(Toast::error(ENTER_VALID_AMOUNT)),
        };

        match self.gateway.approve(src, amount).await {
            Ok(receipt) => {
                info!("Allowance for {} raised to {}", src, amount);
                form.allowance_granted();
                succeeded(receipt, "Allowance increased successfully")
            }
            Err(e) => {
                error!("Error increasing allowance: {}", e);
                failed(Toast::from(&e))
            }
        }
    }

    async fn swap(&self, form: &mut SwapForm, account: Address) -> SwapOutcome {
        let (Some((src, dest)), Some(direction)) = (form.pair(), form.direction()) else {
            return failed(Toast::error(INVALID_COMBINATION));
        };
        let amount = match to_wei(form.input(), TOKEN_DECIMALS) {
            Ok(amount) => amount,
            Err(_) => return failed(Toast::error(ENTER_VALID_AMOUNT)),
        };

        if direction.needs_allowance() {
            form.set_loading(true);
            let allowance = self.gateway.allowance(src, account).await;
            form.set_loading(false);

            match allowance {
                Ok(allowance) if allowance >= amount => {}
                Ok(allowance) => {
                    warn!(
                        "{} allowance of {:?} is {} but {} is needed",
                        src, account, allowance, amount
                    );
                    form.require_allowance();
                    return failed(Toast::error(INSUFFICIENT_ALLOWANCE));
                }
                Err(e) => {
                    error!("Error checking allowance: {}", e);
                    return failed(Toast::error("Error checking token allowance"));
                }
            }
        }

        let result = match direction {
            SwapDirection::EthToToken => self.gateway.swap_eth_to_token(dest, amount).await,
            SwapDirection::TokenToEth => self.gateway.swap_token_to_eth(src, amount).await,
            SwapDirection::TokenToToken => {
                self.gateway.swap_token_to_token(src, dest, amount).await
            }
        };

        match result {
            Ok(receipt) => {
                info!(
                    "Swapped {} {} -> {} in {:?}",
                    form.input(),
                    src,
                    dest,
                    receipt.transaction_hash
                );
                form.clear_amounts();
                succeeded(receipt, "Swap successful!")
            }
            Err(e) => {
                error!("Swap error: {}", e);
                failed(Toast::from(&e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::CustomError,
        models::{notification::ToastKind, swap::SwapSide, token::TokenSymbol},
        services::{blockchain_service::MockDexGateway, price_service::PriceCache},
    };
    use ethers::types::{H256, U256, U64};
    use mockall::predicate::eq;

    fn prices() -> PriceCache {
        PriceCache::with_prices([(TokenSymbol::Usdt, 0.0004), (TokenSymbol::Usdc, 0.0005)])
    }

    fn receipt() -> SwapReceipt {
        SwapReceipt {
            transaction_hash: H256::repeat_byte(0xab),
            block_number: Some(U64::from(7u64)),
            gas_used: Some("21000".into()),
        }
    }

    fn form(src: TokenSymbol, dest: TokenSymbol, input: &str) -> SwapForm {
        let prices = prices();
        let mut form = SwapForm::new();
        form.select_token(SwapSide::Input, src, &prices).unwrap();
        form.select_token(SwapSide::Output, dest, &prices).unwrap();
        form.set_amount(SwapSide::Input, input, &prices).unwrap();
        form
    }

    fn account() -> Address {
        Address::repeat_byte(0x01)
    }

    fn wei(amount: &str) -> U256 {
        to_wei(amount, TOKEN_DECIMALS).unwrap()
    }

    #[tokio::test]
    async fn eth_to_token_swaps_without_allowance_and_clears_form() {
        let mut gateway = MockDexGateway::new();
        gateway.expect_allowance().never();
        gateway
            .expect_swap_eth_to_token()
            .with(eq(TokenSymbol::Usdt), eq(wei("0.5")))
            .times(1)
            .returning(|_, _| Ok(receipt()));

        let mut form = form(TokenSymbol::Eth, TokenSymbol::Usdt, "0.5");
        let outcome = SwapController::new(&gateway)
            .click(&mut form, Some(account()))
            .await;

        assert_eq!(outcome.receipt, Some(receipt()));
        assert_eq!(outcome.toast.unwrap().message, "Swap successful!");
        assert_eq!(form.input(), "");
        assert_eq!(form.output(), "");
        assert!(!form.is_tx_pending());
    }

    #[tokio::test]
    async fn rejected_transaction_leaves_fields_unchanged() {
        let mut gateway = MockDexGateway::new();
        gateway
            .expect_swap_eth_to_token()
            .returning(|_, _| Err(CustomError::UserRejectedError));

        let mut form = form(TokenSymbol::Eth, TokenSymbol::Usdc, "1");
        let (input, output) = (form.input().to_string(), form.output().to_string());

        let outcome = SwapController::new(&gateway)
            .click(&mut form, Some(account()))
            .await;

        let toast = outcome.toast.unwrap();
        assert_eq!(toast.kind, ToastKind::Error);
        assert_eq!(toast.message, "Transaction rejected by user");
        assert_eq!(form.input(), input);
        assert_eq!(form.output(), output);
        assert_eq!(form.button(), SwapButton::Swap);
        assert!(!form.is_tx_pending());
    }

    #[tokio::test]
    async fn insufficient_allowance_asks_for_approval() {
        let mut gateway = MockDexGateway::new();
        gateway
            .expect_allowance()
            .with(eq(TokenSymbol::Usdt), eq(account()))
            .returning(|_, _| Ok(U256::zero()));
        gateway.expect_swap_token_to_eth().never();

        let mut form = form(TokenSymbol::Usdt, TokenSymbol::Eth, "100");
        let outcome = SwapController::new(&gateway)
            .click(&mut form, Some(account()))
            .await;

        assert_eq!(outcome.toast.unwrap().message, INSUFFICIENT_ALLOWANCE);
        assert_eq!(form.button(), SwapButton::IncreaseAllowance);
        assert_eq!(form.input(), "100");
    }

    #[tokio::test]
    async fn approval_then_token_to_token_swap() {
        let mut gateway = MockDexGateway::new();
        gateway
            .expect_approve()
            .with(eq(TokenSymbol::Usdc), eq(wei("4")))
            .times(1)
            .returning(|_, _| Ok(receipt()));
        gateway
            .expect_allowance()
            .returning(|_, _| Ok(to_wei("4", TOKEN_DECIMALS).unwrap()));
        gateway
            .expect_swap_token_to_token()
            .with(eq(TokenSymbol::Usdc), eq(TokenSymbol::Usdt), eq(wei("4")))
            .times(1)
            .returning(|_, _, _| Ok(receipt()));

        let mut form = form(TokenSymbol::Usdc, TokenSymbol::Usdt, "4");
        form.require_allowance();
        let controller = SwapController::new(&gateway);

        let approval = controller.click(&mut form, Some(account())).await;
        assert_eq!(
            approval.toast.unwrap().message,
            "Allowance increased successfully"
        );
        assert_eq!(form.button(), SwapButton::Swap);

        let swap = controller.click(&mut form, Some(account())).await;
        assert!(swap.receipt.is_some());
        assert_eq!(form.input(), "");
    }

    #[tokio::test]
    async fn disconnected_wallet_is_refused() {
        let mut gateway = MockDexGateway::new();
        gateway.expect_swap_eth_to_token().never();

        let mut form = form(TokenSymbol::Eth, TokenSymbol::Usdt, "1");
        let outcome = SwapController::new(&gateway).click(&mut form, None).await;

        assert_eq!(outcome.toast.unwrap().message, CONNECT_WALLET);
        assert_eq!(form.button(), SwapButton::WalletNotConnected);
        assert_eq!(form.input(), "1");
    }

    #[tokio::test]
    async fn missing_amount_is_refused() {
        let gateway = MockDexGateway::new();
        let mut form = form(TokenSymbol::Eth, TokenSymbol::Usdt, "");
        let outcome = SwapController::new(&gateway)
            .click(&mut form, Some(account()))
            .await;
        assert_eq!(outcome.toast.unwrap().message, ENTER_VALID_AMOUNT);
    }

    #[tokio::test]
    async fn allowance_lookup_failure_is_reported() {
        let mut gateway = MockDexGateway::new();
        gateway
            .expect_allowance()
            .returning(|_, _| Err(CustomError::ContractError("rpc down".into())));

        let mut form = form(TokenSymbol::Usdt, TokenSymbol::Usdc, "1");
        let outcome = SwapController::new(&gateway)
            .click(&mut form, Some(account()))
            .await;

        assert_eq!(
            outcome.toast.unwrap().message,
            "Error checking token allowance"
        );
        assert!(!form.is_loading());
        assert_eq!(form.input(), "1");
    }
}
