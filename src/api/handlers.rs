use actix_web::{get, post, web, HttpResponse};
use ethers::types::H256;
use log::info;
use serde_json::json;

use crate::{
    errors::CustomError,
    models::{
        api_response::success_response,
        swap::{PriceUpdateRequest, Quote, QuoteQuery, SwapDirection, SwapSide},
        token::{TokenBalance, TokenInfo, TokenSymbol},
    },
    services::{
        contract::{parse_address, token_key},
        portfolio_service::{usd_to_wei, PortfolioService},
    },
    state::AppState,
    utils::format::{to_eth, TOKEN_DECIMALS},
};

#[get("/tokens")]
async fn list_tokens(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    let mut tokens = Vec::with_capacity(TokenSymbol::ALL.len());
    for symbol in TokenSymbol::ALL {
        let address = if symbol.is_native() {
            None
        } else {
            Some(state.gateway.token_address(symbol).await?)
        };
        tokens.push(TokenInfo {
            symbol,
            key: H256::from(token_key(symbol)),
            address,
        });
    }
    Ok(success_response(tokens))
}

#[get("/prices")]
async fn get_prices(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    let prices = state.prices.read().await;
    Ok(success_response(json!({
        "prices": prices.snapshot(),
        "refreshed_at": prices.refreshed_at(),
    })))
}

#[post("/prices/refresh")]
async fn refresh_prices(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    let prices = state.refresh_prices().await?;
    Ok(success_response(json!({
        "prices": prices.snapshot(),
        "refreshed_at": prices.refreshed_at(),
    })))
}

#[get("/quote")]
async fn get_quote(
    state: web::Data<AppState>,
    query: web::Query<QuoteQuery>,
) -> Result<HttpResponse, CustomError> {
    let src: TokenSymbol = query.src.parse()?;
    let dest: TokenSymbol = query.dest.parse()?;
    if SwapDirection::between(src, dest).is_none() {
        return Err(CustomError::ValidationError(
            "Invalid swap combination".to_string(),
        ));
    }

    let prices = state.prices.read().await;
    let quote = match query.side.unwrap_or(SwapSide::Input) {
        SwapSide::Input => prices
            .quote_output(src, dest, &query.amount)
            .map(|output| (query.amount.trim().to_string(), output)),
        SwapSide::Output => prices
            .quote_input(src, dest, &query.amount)
            .map(|input| (input, query.amount.trim().to_string())),
    };
    let (input, output) = quote.ok_or_else(|| CustomError::InvalidAmountError(query.amount.clone()))?;

    Ok(success_response(Quote {
        src,
        dest,
        input,
        output,
        rate: prices.exchange_rate(src, dest),
    }))
}

#[get("/balances/{address}")]
async fn get_balances(
    state: web::Data<AppState>,
    address: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let owner = parse_address(&address)?;
    let mut balances = Vec::with_capacity(TokenSymbol::ALL.len());
    for symbol in TokenSymbol::ALL {
        let balance = state.gateway.token_balance(symbol, owner).await?;
        let token_address = if symbol.is_native() {
            None
        } else {
            Some(format!("{:?}", state.gateway.token_address(symbol).await?))
        };
        balances.push(TokenBalance {
            token_address,
            symbol,
            balance,
            decimals: TOKEN_DECIMALS as u8,
            formatted_balance: to_eth(balance, TOKEN_DECIMALS)?,
        });
    }
    Ok(success_response(balances))
}

#[get("/portfolio/{address}")]
async fn get_portfolio(
    state: web::Data<AppState>,
    address: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let owner = parse_address(&address)?;
    let portfolio = PortfolioService::new(state.gateway.as_ref(), state.eth_usd_price)
        .portfolio(owner)
        .await?;
    Ok(success_response(portfolio))
}

#[get("/network")]
async fn get_network(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    Ok(success_response(state.gateway.network_status().await?))
}

#[get("/owner")]
async fn get_owner(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    let owner = state.gateway.owner().await?;
    Ok(success_response(json!({
        "owner": owner,
        "dex_address": state.dex_address,
    })))
}

#[get("/allowance/{owner}/{token}")]
async fn get_allowance(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, CustomError> {
    let (owner, token) = path.into_inner();
    let owner = parse_address(&owner)?;
    let token: TokenSymbol = token.parse()?;
    if token.is_native() {
        return Err(CustomError::ValidationError(
            "ETH does not use an allowance".to_string(),
        ));
    }

    let allowance = state.gateway.allowance(token, owner).await?;
    Ok(success_response(json!({
        "owner": owner,
        "token": token,
        "spender": state.dex_address,
        "allowance": to_eth(allowance, TOKEN_DECIMALS)?,
    })))
}

#[post("/admin/withdraw-fees")]
async fn withdraw_fees(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    let receipt = state.gateway.withdraw_fees().await?;
    info!("Fees withdrawn in {:?}", receipt.transaction_hash);
    Ok(success_response(receipt))
}

#[post("/admin/prices")]
async fn update_price(
    state: web::Data<AppState>,
    req: web::Json<PriceUpdateRequest>,
) -> Result<HttpResponse, CustomError> {
    let token: TokenSymbol = req.token.parse()?;
    if token.is_native() {
        return Err(CustomError::ValidationError(
            "ETH price is fixed at 1 ETH".to_string(),
        ));
    }

    let price = usd_to_wei(req.usd_price, state.eth_usd_price)?;
    let receipt = state.gateway.update_token_price(token, price).await?;
    info!("{} price set to {} wei", token, price);

    state.reload_prices().await;
    Ok(success_response(receipt))
}
