//! Report generation for the channel digest platform.
//!
//! Turns scraped messages into a structured digest through an LLM and
//! renders the result as a downloadable document:
//! - `prepare` - message cards and prompt loading
//! - `provider` - the `LlmProvider` seam with Gemini and Polza adapters
//! - `sanitize` - response cleanup and truncated-JSON salvage
//! - `generator` - the end-to-end `messages -> report data` call
//! - `render` - `DocumentRenderer` and the Markdown renderer

pub mod error;
pub mod gemini;
pub mod generator;
pub mod polza;
pub mod prepare;
pub mod provider;
pub mod render;
pub mod sanitize;

pub use error::{ReportError, Result};
pub use gemini::GeminiProvider;
pub use generator::ReportGenerator;
pub use polza::PolzaProvider;
pub use prepare::{load_prompt, prepare_message_text};
pub use provider::{build_provider, LlmProvider, ProviderFactory, ProviderSettings};
pub use render::{report_filename, DocumentRenderer, MarkdownRenderer, RenderedDocument};
pub use sanitize::{parse_report_json, salvage_items, sanitize_json_response};
