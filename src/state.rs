//! Shared state between the refresh loop and everything that reads from it.
//!
//! [`NewsHandle`] is a cheap clone around one reader/writer lock guarding the
//! feed registry, the per-feed retry table and the current snapshot. Readers
//! (serving the page, exporting status, listing feeds) share the lock; feed
//! registration and snapshot commits take it exclusively and briefly. The
//! refresh loop never holds it across a network fetch.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::refresh::{FeedStatus, RetryState, Snapshot};
use crate::registry::{self, FeedEntry, FeedMap};
use crate::storage::{Database, DatabaseError};
use crate::util::{validate_feed_url, UrlValidationError};

/// Errors returned to callers of [`NewsHandle::register`].
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("feed exists with name {0}")]
    Conflict(String),
    #[error("invalid feed url: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    #[error("failed to save feed: {0}")]
    Storage(#[from] DatabaseError),
}

#[derive(Default)]
struct NewsState {
    feeds: FeedMap,
    retries: HashMap<String, RetryState>,
    snapshot: Option<Arc<Snapshot>>,
}

#[derive(Clone)]
pub struct NewsHandle {
    state: Arc<RwLock<NewsState>>,
    db: Database,
}

impl NewsHandle {
    /// Loads the registry (bundled defaults plus persisted registrations) and
    /// the last published snapshot, if any, so the page can be served before
    /// the first refresh completes.
    pub async fn open(db: Database) -> Result<Self, DatabaseError> {
        let feeds = registry::load(&db).await?;
        let handle = Self::with_feeds(db, feeds);

        match handle.db.load_snapshot().await {
            Ok(Some(stored)) => {
                tracing::info!(
                    published_at = %stored.published_at,
                    bytes = stored.html.len(),
                    "Restored last published snapshot"
                );
                handle.state.write().await.snapshot = Some(Arc::new(Snapshot::restored(stored)));
            }
            Ok(None) => tracing::debug!("No stored snapshot, serving nothing until first refresh"),
            Err(e) => tracing::warn!(error = %e, "Failed to load stored snapshot"),
        }

        Ok(handle)
    }

    /// A handle over an explicit registry, without touching stored state.
    pub fn with_feeds(db: Database, feeds: FeedMap) -> Self {
        Self {
            state: Arc::new(RwLock::new(NewsState {
                feeds,
                ..NewsState::default()
            })),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The page currently being served. The returned `Arc` stays valid after
    /// a newer snapshot is published.
    pub async fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.state.read().await.snapshot.clone()
    }

    /// Refresh state of every registered feed, in name order.
    pub async fn status(&self) -> Vec<FeedStatus> {
        let state = self.state.read().await;
        state
            .feeds
            .iter()
            .map(|(name, url)| {
                let retry = state.retries.get(name).cloned().unwrap_or_default();
                FeedStatus::project(name, url, &retry)
            })
            .collect()
    }

    pub async fn feeds(&self) -> Vec<FeedEntry> {
        let state = self.state.read().await;
        state
            .feeds
            .iter()
            .map(|(name, url)| FeedEntry {
                name: name.clone(),
                url: url.clone(),
            })
            .collect()
    }

    /// Adds a feed to the registry and persists it. The new feed is picked up
    /// by the next refresh cycle.
    ///
    /// The write lock is only taken after the database insert, so readers are
    /// never blocked behind SQLite.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Conflict`] if the name is taken, in memory or in
    /// the database; the existing URL is left unchanged.
    pub async fn register(&self, name: &str, url: &str) -> Result<FeedEntry, RegistrationError> {
        let name = name.trim();
        let url = url.trim();
        if name.is_empty() {
            return Err(RegistrationError::MissingField("name"));
        }
        if url.is_empty() {
            return Err(RegistrationError::MissingField("feed"));
        }
        validate_feed_url(url)?;

        if self.state.read().await.feeds.contains_key(name) {
            return Err(RegistrationError::Conflict(name.to_string()));
        }
        // The primary key settles concurrent registrations of one name.
        if !self.db.insert_feed_override(name, url).await? {
            return Err(RegistrationError::Conflict(name.to_string()));
        }

        let mut state = self.state.write().await;
        if state.feeds.contains_key(name) {
            // Only a registry reload can have added it since the check above,
            // and it read this very row.
            tracing::debug!(feed = %name, "Feed already loaded from storage");
        } else {
            state.feeds.insert(name.to_string(), url.to_string());
        }
        drop(state);

        tracing::info!(feed = %name, url = %url, "Registered feed");
        Ok(FeedEntry {
            name: name.to_string(),
            url: url.to_string(),
        })
    }

    /// Merges registrations persisted since this handle loaded its registry,
    /// e.g. by `newsdesk add` from another process. Returns how many feeds
    /// were added. Names already loaded are never replaced.
    pub async fn reload_registry(&self) -> Result<usize, DatabaseError> {
        let overrides = self.db.feed_overrides().await?;

        let mut state = self.state.write().await;
        let before = state.feeds.len();
        for (name, url) in overrides {
            if !state.feeds.contains_key(&name) {
                tracing::info!(feed = %name, url = %url, "Picked up registered feed");
                state.feeds.insert(name, url);
            }
        }
        Ok(state.feeds.len() - before)
    }

    /// Copies the registry (in name order) and retry table for one cycle.
    pub(crate) async fn cycle_inputs(&self) -> (Vec<FeedEntry>, HashMap<String, RetryState>) {
        let state = self.state.read().await;
        let feeds = state
            .feeds
            .iter()
            .map(|(name, url)| FeedEntry {
                name: name.clone(),
                url: url.clone(),
            })
            .collect();
        (feeds, state.retries.clone())
    }

    /// Applies one cycle's retry transitions and, if present, publishes its
    /// snapshot. Returns the newly published snapshot.
    pub(crate) async fn commit(
        &self,
        updates: Vec<(String, RetryState)>,
        snapshot: Option<Snapshot>,
    ) -> Option<Arc<Snapshot>> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        for (name, retry) in updates {
            if state.feeds.contains_key(&name) {
                state.retries.insert(name, retry);
            }
        }
        let feeds = &state.feeds;
        state.retries.retain(|name, _| feeds.contains_key(name));

        let published = snapshot.map(Arc::new);
        if let Some(snapshot) = &published {
            state.snapshot = Some(Arc::clone(snapshot));
        }
        published
    }
}
