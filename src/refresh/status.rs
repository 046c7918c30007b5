use chrono::{DateTime, Utc};
use serde::Serialize;

use super::retry::RetryState;

/// Externally visible refresh state of one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    pub name: String,
    pub url: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_eligible_at: Option<DateTime<Utc>>,
}

impl FeedStatus {
    pub fn project(name: &str, url: &str, retry: &RetryState) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            attempts: retry.attempts(),
            last_error: retry.last_error().map(str::to_string),
            next_eligible_at: retry.next_eligible_at(),
        }
    }
}
