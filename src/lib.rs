pub mod command;
pub mod config;
pub mod credentials;
pub mod load_config;
pub mod mirror;
pub mod server;
pub mod transfer;
