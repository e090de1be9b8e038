//! Resource lifecycle core for the channel digest platform.
//!
//! This crate owns the in-process memory and scrape-admission machinery:
//! - `JobRegistry` - TTL-evicting, lock-serialized map of job states
//! - `Reclaimer` - evicts expired jobs, severs large payloads, trims the heap
//! - `ScrapeGate` - process-wide mutual exclusion around scraping sessions
//! - `CachePolicy` - decides whether a persisted artifact may be reused
//! - `RetentionService` - daily sweep of stale artifacts
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use digest_core::{JobRegistry, Reclaimer, ReclaimerConfig};
//! use digest_models::JobStatus;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(JobRegistry::new());
//!     let mut reclaimer = Reclaimer::new(Arc::clone(&registry), ReclaimerConfig::default());
//!     reclaimer.start();
//!
//!     registry.put("u1_123", Some(serde_json::json!({"step": 1})), JobStatus::Processing).await;
//!     registry.put("u1_123", Some(serde_json::json!({"step": 2})), JobStatus::Completed).await;
//!
//!     reclaimer.shutdown().await.ok();
//! }
//! ```

pub mod admission;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod memory;
pub mod reclaimer;
pub mod registry;
pub mod retention;

pub use admission::{cache_key, CacheDescriptor, CachePolicy, DEFAULT_TODAY_MAX_AGE};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{CoreError, Result};
pub use gate::{ScrapeGate, ScrapePermit};
pub use memory::{
    process_memory, system_memory, trim_heap, ProcessMemory, SystemMemory, WorkingSetEstimate,
};
pub use reclaimer::{
    CycleReport, PassKind, ReclaimReport, Reclaimer, ReclaimerConfig, LARGE_PAYLOAD_FIELDS,
};
pub use registry::{JobRegistry, JobSnapshot, RegistryStats, TtlPolicy};
pub use retention::{sweep_blocking, RetentionService};
