//! Feed retrieval: HTTP fetching and RSS/Atom parsing.
//!
//! - [`parser`] - converts feed XML into [`RawItem`]s using the `feed-rs` crate
//! - [`fetcher`] - the [`FeedFetcher`] seam and its `reqwest` implementation
//!
//! The refresh scheduler only sees the [`FeedFetcher`] trait, so tests can
//! substitute scripted fetchers for the network.

mod fetcher;
mod parser;

pub use fetcher::{FeedFetcher, FetchError, HttpFetcher};
pub use parser::{parse_feed, RawItem};
