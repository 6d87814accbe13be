// SPDX-License-Identifier: MPL-2.0

use crate::cache::{CacheDb, CacheError};
use crate::feed::RefreshOutcome;
use crate::model::ContentItem;
use rusqlite::params;

/// Cache operations for the merged feed snapshot
pub struct FeedCache<'a> {
    db: &'a CacheDb,
}

impl<'a> FeedCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    /// Replace the stored snapshot with `items`, keeping their order
    pub fn store_snapshot(&self, items: &[ContentItem]) -> Result<(), CacheError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;
        let now = CacheDb::now();

        tx.execute("DELETE FROM feed_snapshot", [])?;
        for (position, item) in items.iter().enumerate() {
            let item_json = serde_json::to_string(item)?;
            tx.execute(
                r#"
                INSERT INTO feed_snapshot (source_type, item_id, position, item_json, fetched_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(source_type, item_id) DO UPDATE SET
                    position = excluded.position,
                    item_json = excluded.item_json,
                    fetched_at = excluded.fetched_at
                "#,
                params![
                    item.source_type.as_str(),
                    item.id,
                    position as i64,
                    item_json,
                    now
                ],
            )?;
        }

        tx.commit()?;
        tracing::debug!(items = items.len(), "stored feed snapshot");
        Ok(())
    }

    /// Store the feed a refresh produced. A refresh that reached no source
    /// leaves the previous snapshot in place. Returns whether it stored.
    pub fn store_refreshed(
        &self,
        outcome: &RefreshOutcome,
        items: &[ContentItem],
    ) -> Result<bool, CacheError> {
        if !outcome.replaced {
            tracing::debug!("refresh reached no source, keeping stored snapshot");
            return Ok(false);
        }
        self.store_snapshot(items)?;
        Ok(true)
    }

    /// Load the stored snapshot in its stored order. Rows that no longer
    /// deserialize are skipped.
    pub fn load_snapshot(&self) -> Result<Vec<ContentItem>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT source_type, item_id, item_json
            FROM feed_snapshot
            ORDER BY position ASC
            "#,
        )?;

        let mut rows = stmt.query([])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let item_json: String = row.get(2)?;
            match serde_json::from_str::<ContentItem>(&item_json) {
                Ok(item) => items.push(item),
                Err(e) => {
                    let source: String = row.get(0)?;
                    let id: String = row.get(1)?;
                    tracing::warn!(%source, %id, error = %e, "skipping unreadable snapshot row");
                }
            }
        }

        Ok(items)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.db.conn().execute("DELETE FROM feed_snapshot", [])?;
        Ok(())
    }

    /// Number of cached items
    pub fn count(&self) -> Result<usize, CacheError> {
        let conn = self.db.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM feed_snapshot", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
