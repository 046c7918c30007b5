//! newsdesk - periodically refreshes a set of RSS/Atom feeds and publishes
//! them as one rendered news page.
//!
//! The [`refresh`] module holds the core: per-feed backoff, the refresh loop
//! and snapshot building. [`state::NewsHandle`] is the shared view that a
//! serving layer reads the current page, feed status and registry from.

pub mod config;
pub mod feed;
pub mod refresh;
pub mod registry;
pub mod state;
pub mod storage;
pub mod util;
