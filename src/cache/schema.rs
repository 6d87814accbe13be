// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the feed snapshot database
pub const SCHEMA: &str = r#"
-- Database version for migrations
PRAGMA user_version = 1;

-- feed_snapshot: the last merged feed, one row per item
CREATE TABLE IF NOT EXISTS feed_snapshot (
    source_type TEXT NOT NULL,
    item_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    item_json TEXT NOT NULL,
    fetched_at INTEGER NOT NULL,
    PRIMARY KEY (source_type, item_id)
);

CREATE INDEX IF NOT EXISTS idx_feed_snapshot_position ON feed_snapshot(position);
CREATE INDEX IF NOT EXISTS idx_feed_snapshot_fetched_at ON feed_snapshot(fetched_at);
"#;
