//! HTTP front end for crypto-market-overwatch
//!
//! Serves the Prometheus scrape endpoint and the JSON asset API on top of
//! the collector's snapshot store.

pub mod cli;
pub mod logging;
pub mod routes;
pub mod server;
pub mod settings;

pub use cli::Cli;
pub use routes::{build_router, AppState, HealthResponse};
pub use server::{HttpServer, HttpServerBuilder};
pub use settings::SettingsError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
