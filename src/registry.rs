//! Feed registry: which names are refreshed and where they are fetched from.
//!
//! The registry is the bundled `feeds.json` overlaid with registrations
//! persisted in the database. A persisted name never shadows a bundled one.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::storage::{Database, DatabaseError};

const BUNDLED_FEEDS: &str = include_str!("../feeds.json");

/// One registered feed. Names are the identity; a different URL needs a
/// different name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedEntry {
    pub name: String,
    pub url: String,
}

/// Name -> URL map. `BTreeMap` keeps iteration in lexicographic name order.
pub type FeedMap = BTreeMap<String, String>;

/// The feeds shipped with the binary.
pub fn bundled_feeds() -> FeedMap {
    match serde_json::from_str(BUNDLED_FEEDS) {
        Ok(feeds) => feeds,
        Err(e) => {
            tracing::error!(error = %e, "Bundled feeds.json is invalid, starting with no defaults");
            FeedMap::new()
        }
    }
}

/// Adds `overrides` to `base`, skipping names `base` already has.
pub fn overlay(mut base: FeedMap, overrides: impl IntoIterator<Item = (String, String)>) -> FeedMap {
    for (name, url) in overrides {
        if base.contains_key(&name) {
            tracing::debug!(feed = %name, "Persisted feed shadows a bundled name, ignoring");
            continue;
        }
        tracing::debug!(feed = %name, url = %url, "Loading persisted feed");
        base.insert(name, url);
    }
    base
}

/// Bundled defaults plus every registration stored in `db`.
pub async fn load(db: &Database) -> Result<FeedMap, DatabaseError> {
    let overrides = db.feed_overrides().await?;
    Ok(overlay(bundled_feeds(), overrides))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_feeds_parse() {
        let feeds = bundled_feeds();
        assert!(!feeds.is_empty());
        assert!(feeds.values().all(|url| url.starts_with("https://")));
    }

    #[test]
    fn test_overlay_adds_new_names_only() {
        let mut base = FeedMap::new();
        base.insert("A".into(), "https://a.example.com".into());

        let merged = overlay(
            base,
            vec![
                ("A".to_string(), "https://hijack.example.com".to_string()),
                ("B".to_string(), "https://b.example.com".to_string()),
            ],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged["A"], "https://a.example.com");
        assert_eq!(merged["B"], "https://b.example.com");
    }

    #[tokio::test]
    async fn test_load_merges_database() {
        let db = Database::open(":memory:").await.unwrap();
        db.insert_feed_override("zz-local", "https://local.example.com/rss")
            .await
            .unwrap();

        let feeds = load(&db).await.unwrap();
        assert_eq!(feeds.len(), bundled_feeds().len() + 1);
        assert_eq!(feeds["zz-local"], "https://local.example.com/rss");
    }
}
