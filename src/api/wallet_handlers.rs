use actix_web::{get, post, web, HttpResponse};

use crate::{
    errors::CustomError,
    models::{api_response::success_response, wallet::SwitchNetworkRequest},
    state::AppState,
};

#[get("/wallet")]
async fn get_wallet(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    let wallet = state.wallet.lock().await;
    Ok(success_response(wallet.snapshot()))
}

#[post("/wallet/connect")]
async fn connect_wallet(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    let mut wallet = state.wallet.lock().await;
    wallet.connect_wallet().await?;
    wallet.refresh_balances(state.gateway.as_ref()).await;
    Ok(success_response(wallet.snapshot()))
}

#[post("/wallet/disconnect")]
async fn disconnect_wallet(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    let mut wallet = state.wallet.lock().await;
    wallet.disconnect_wallet().await;
    Ok(success_response(wallet.snapshot()))
}

#[post("/wallet/switch-network")]
async fn switch_network(
    state: web::Data<AppState>,
    req: Option<web::Json<SwitchNetworkRequest>>,
) -> Result<HttpResponse, CustomError> {
    let req = req.map(web::Json::into_inner).unwrap_or_default();
    let mut wallet = state.wallet.lock().await;
    match req.chain_id {
        Some(chain_id) => wallet.switch_network(chain_id).await?,
        None => wallet.switch_to_sepolia().await?,
    }
    Ok(success_response(wallet.snapshot()))
}
