use chrono::Utc;

use super::schema::Database;
use super::types::DatabaseError;

impl Database {
    // ========================================================================
    // Registry Overrides
    // ========================================================================

    /// All persisted registrations, ordered by name.
    pub async fn feed_overrides(&self) -> Result<Vec<(String, String)>, DatabaseError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, url FROM feeds ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    /// Persist a registration. Returns `false` when the name is already stored,
    /// in which case the stored URL is left unchanged.
    pub async fn insert_feed_override(&self, name: &str, url: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO feeds (name, url, added_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(url)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
