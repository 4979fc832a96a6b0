pub mod blockchain_service;
pub mod contract;
pub mod network_config;
pub mod portfolio_service;
pub mod price_service;
pub mod swap_form;
pub mod swap_service;
pub mod wallet_service;
