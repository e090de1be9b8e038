//! Artifact storage for the channel digest platform.
//!
//! Scrape results are persisted as JSON artifacts under a data root:
//!
//! ```text
//! data/
//! ├── raw_parses/   # fixed historical windows, swept by retention
//! └── temp/         # the live "today" cache, never swept
//! ```
//!
//! Writes are crash-safe (write to temp file, then rename) and every
//! artifact read or write is followed by a best-effort page-cache release.
//!
//! # Example
//!
//! ```no_run
//! use digest_persistence::{ArtifactStore, FsArtifactStore};
//!
//! let store = FsArtifactStore::new("/data");
//! store.write("raw_parses/2025-03-09.json", b"[]").unwrap();
//! assert!(store.exists("raw_parses/2025-03-09.json"));
//! ```

pub mod atomic;
pub mod error;
pub mod page_cache;
pub mod retention;
pub mod store;

pub use error::{PersistenceError, Result};
pub use page_cache::release_page_cache;
pub use retention::{RetentionConfig, RetentionSweeper, SweepReport};
pub use store::{ArtifactInfo, ArtifactStore, DirStats, FsArtifactStore, RAW_PARSES_DIR, TEMP_DIR};
