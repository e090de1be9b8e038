//! API request handlers.

pub mod admin;
pub mod health;
pub mod jobs;
pub mod parser;
pub mod reports;

pub use admin::*;
pub use health::*;
pub use jobs::*;
pub use parser::*;
pub use reports::*;
