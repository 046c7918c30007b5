//! Utility functions shared by the registry, snapshot renderer and CLI.
//!
//! - **URL validation**: refuses non-http(s) and private-network feed URLs
//! - **Text**: description rewrite rules and HTML escaping
//! - **Files**: atomic replace of exported pages

mod feed_url;
mod fs;
mod text;

pub use feed_url::{validate_feed_url, UrlValidationError};
pub use fs::atomic_write;
pub use text::{escape_html, Rewrite, RewriteRules};
