pub mod app_state;
pub mod auth;
pub mod config;
pub mod device;
pub mod services;
pub mod store;
