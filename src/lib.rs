pub mod auth;
pub mod client;
pub mod config;
pub mod forms;
pub mod gateway;
pub mod metrics;
pub mod types;

// Re-export commonly used types
pub use client::FormSyncClient;
pub use config::Config;
pub use gateway::{ApiRequest, FilePart, Gateway, GatewayError, RenewalError};
pub use types::{Profile, Role, TokenPair};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
