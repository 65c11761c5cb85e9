pub mod api;
pub mod auth;
pub mod bootstrap;
pub mod cluster;
pub mod config;
pub mod errors;
pub mod hub;
pub mod metrics;
pub mod notify;
pub mod server;
pub mod services;

pub use bootstrap::build_from_env;
pub use server::{ApiServer, AppState};
