pub mod api_response;
pub mod network_config;
pub mod network_status;
pub mod notification;
pub mod portfolio;
pub mod swap;
pub mod token;
pub mod wallet;
