//! REST API for the channel digest platform.
//!
//! - Parser endpoints: scrape a window, optionally persisting the artifact
//! - Report endpoints: generate digests from messages, artifacts or a fresh scrape
//! - Job status lookup backed by the job registry
//! - Admin endpoints: registry stats, reclamation and retention sweeps
//!
//! # Example
//!
//! ```ignore
//! use digest_api::{serve, ApiConfig, AppState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = AppState::new(/* ... */);
//!     serve(ApiConfig::default(), state, std::future::pending()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod types;

pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use router::{create_router, serve};
pub use state::AppState;
