//! Appliance Common Library
//!
//! Types shared between the page-object model and its tooling: the ordered
//! product version used for feature gating, the value carried by a form
//! field, and the identity of the server whose settings are being driven.

pub mod error;
pub mod types;
pub mod version;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use version::Version;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
