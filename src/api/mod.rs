use actix_web::web;

use crate::errors::CustomError;

mod handlers;
mod swap_handlers;
mod wallet_handlers;

pub fn config(cfg: &mut web::ServiceConfig) {
    // malformed bodies and queries get the FAILURE envelope like every other error
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        CustomError::ValidationError(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        CustomError::ValidationError(err.to_string()).into()
    }))
    .service(
        web::scope("/api/v1")
            .service(handlers::list_tokens)
            .service(handlers::get_prices)
            .service(handlers::refresh_prices)
            .service(handlers::get_quote)
            .service(handlers::get_balances)
            .service(handlers::get_portfolio)
            .service(handlers::get_network)
            .service(handlers::get_owner)
            .service(handlers::get_allowance)
            .service(handlers::withdraw_fees)
            .service(handlers::update_price)
            .service(wallet_handlers::get_wallet)
            .service(wallet_handlers::connect_wallet)
            .service(wallet_handlers::disconnect_wallet)
            .service(wallet_handlers::switch_network)
            .service(swap_handlers::create_session)
            .service(swap_handlers::get_session)
            .service(swap_handlers::delete_session)
            .service(swap_handlers::select_token)
            .service(swap_handlers::set_amount)
            .service(swap_handlers::set_percentage)
            .service(swap_handlers::reverse)
            .service(swap_handlers::submit),
    );
}
