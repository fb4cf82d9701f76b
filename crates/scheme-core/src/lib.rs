//! scheme-core: shared types for the custom-scheme responder.
//!
//! - **request**: the read-only request descriptor a host hands to a responder
//! - **header**: ordered, case-insensitive header list
//! - **config**: `scheme.toml` parsing and scaffolding

pub mod config;
pub mod header;
pub mod request;

pub use config::SchemeConfig;
pub use header::{Header, HeaderMap};
pub use request::Request;
