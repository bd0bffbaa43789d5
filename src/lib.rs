// Export all modules for public use
pub mod auth;
pub mod client;
pub mod config;
pub mod core;
pub mod crypto;
pub mod protocol;
pub mod store;
pub mod types;
pub mod utils;

// Re-export the most commonly used items for convenience
pub use crate::auth::{AuthManager, AuthOutcome, AuthenticatedUser};
pub use crate::client::ClientHandshake;
pub use crate::config::{CoreArgs, CoreConfig};
pub use crate::core::{SecurityCore, ServiceState, SweepReport};
pub use crate::types::{CoreError, Result};
