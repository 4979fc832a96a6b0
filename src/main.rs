use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use log::info;
use std::sync::Arc;

mod api;
mod config;
mod errors;
mod models;
mod services;
mod state;
mod utils;

use services::{
    blockchain_service::{build_gateway, connect_provider},
    wallet_service::{LocalKeyWallet, WalletContext, WalletProvider},
};
use state::{watch_wallet_events, AppState};

fn startup_error(e: errors::CustomError) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env().map_err(startup_error)?;

    let provider = connect_provider(&config.rpc_url, config.chain_id)
        .await
        .map_err(startup_error)?;
    let wallet = Arc::new(
        LocalKeyWallet::from_private_key(config.private_key.as_deref(), config.chain_id)
            .map_err(startup_error)?,
    );
    let gateway = build_gateway(
        provider,
        config.dex_address,
        config.chain_id,
        wallet.signer(),
    )
    .map_err(startup_error)?;

    let events = wallet.subscribe();
    let state = web::Data::new(AppState::new(
        gateway,
        WalletContext::new(wallet, config.chain_id),
        config.dex_address,
        config.eth_usd_price,
    ));

    state.reload_prices().await;
    state
        .wallet
        .lock()
        .await
        .check_connection(state.gateway.as_ref())
        .await;
    actix_web::rt::spawn(watch_wallet_events(state.clone(), events));

    info!(
        "Serving DEX {:?} on chain {} at {}:{}",
        config.dex_address, config.chain_id, config.host, config.port
    );

    let origins = config.allowed_origins.clone();
    HttpServer::new(move || {
        let cors = origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
            ])
            .supports_credentials();
        App::new()
            .app_data(state.clone())
            .configure(api::config)
            .wrap(cors)
            .wrap(Logger::default())
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
