use chrono::{DateTime, Utc};

use super::schema::Database;
use super::types::{DatabaseError, SnapshotRow, StoredSnapshot};

impl Database {
    // ========================================================================
    // Snapshot Persistence
    // ========================================================================

    /// Replace the stored page with `snapshot`.
    pub async fn save_snapshot(&self, snapshot: &StoredSnapshot) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO snapshots (id, html, published_at, digest) VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                html = excluded.html,
                published_at = excluded.published_at,
                digest = excluded.digest
        "#,
        )
        .bind(&snapshot.html)
        .bind(snapshot.published_at.timestamp_millis())
        .bind(&snapshot.digest)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The last saved page, if any was ever published.
    pub async fn load_snapshot(&self) -> Result<Option<StoredSnapshot>, DatabaseError> {
        let row: Option<SnapshotRow> =
            sqlx::query_as("SELECT html, published_at, digest FROM snapshots WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.and_then(|(html, published_ms, digest)| {
            let published_at = DateTime::<Utc>::from_timestamp_millis(published_ms)?;
            Some(StoredSnapshot {
                html,
                published_at,
                digest,
            })
        }))
    }
}
