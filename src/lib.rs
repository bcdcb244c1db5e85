/// Group gate
///
/// Serves per-group configuration and gates each group's QR code behind an
/// external enrollment check.

pub mod api;
pub mod cache;
pub mod config;
pub mod content;
pub mod context;
pub mod error;
pub mod identity;
pub mod jobs;
pub mod locale;
pub mod metrics;
pub mod rate_limit;
pub mod server;
pub mod verification;

pub use config::ServerConfig;
pub use context::AppContext;
pub use error::{GateError, GateResult};
