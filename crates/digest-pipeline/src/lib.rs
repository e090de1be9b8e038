//! Message fetching and report orchestration.
//!
//! - `scraper` - `ScrapeProvider` and the channel-list driven `ChannelScraper`
//! - `bridge` - HTTP `ChannelClient` for an external scraping bridge
//! - `fetch` - cache admission plus the scrape gate around every scrape
//! - `request` - option and period resolution for user requests
//! - `pipeline` - `fetch -> digest -> render` with job tracking

pub mod bridge;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod request;
pub mod scraper;

pub use bridge::{BridgeSession, HttpBridgeClient};
pub use error::{PipelineError, Result};
pub use fetch::{FetchOutcome, MessageFetcher};
pub use pipeline::{GeneratedReport, PipelineOutput, ReportPipeline};
pub use request::{channel_source_or_default, parse_report_type, resolve_period, ReportOptions};
pub use scraper::{ChannelClient, ChannelScraper, ChannelSession, ScrapeProvider};
