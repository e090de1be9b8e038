//! Request and response types for the API.

pub mod requests;
pub mod responses;

pub use requests::*;
pub use responses::*;
