use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::metrics::EditMetrics;
use crate::segments::Segment;
use crate::snapshot::TrackerSnapshot;

/// Everything persisted for one translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_name: String,
    pub user_surname: String,
    pub last_updated: DateTime<Utc>,
    pub metrics: Vec<EditMetrics>,
    pub full_text: Vec<Segment>,
    pub time_tracker: Option<TrackerSnapshot>,
}

impl UserProgress {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.user_name, self.user_surname)
    }
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS user_progress (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_name TEXT NOT NULL,
        user_surname TEXT NOT NULL,
        last_updated TEXT NOT NULL,
        metrics TEXT NOT NULL,
        full_text TEXT NOT NULL,
        time_tracker TEXT,
        UNIQUE (user_name, user_surname)
    )
"#;

/// SQLite-backed store of per-user progress documents
#[derive(Debug)]
pub struct ProgressStore {
    conn: Connection,
}

impl ProgressStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!("opened progress store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_user_progress_updated ON user_progress(last_updated)",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Insert or replace the progress of `(user_name, user_surname)`.
    pub fn save(&self, progress: &UserProgress) -> Result<()> {
        let time_tracker = progress
            .time_tracker
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            r#"
            INSERT INTO user_progress
            (user_name, user_surname, last_updated, metrics, full_text, time_tracker)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (user_name, user_surname) DO UPDATE SET
                last_updated = excluded.last_updated,
                metrics = excluded.metrics,
                full_text = excluded.full_text,
                time_tracker = excluded.time_tracker
            "#,
            params![
                progress.user_name,
                progress.user_surname,
                progress.last_updated.to_rfc3339(),
                serde_json::to_string(&progress.metrics)?,
                serde_json::to_string(&progress.full_text)?,
                time_tracker,
            ],
        )?;
        debug!(
            "saved progress for {} ({} metric(s))",
            progress.display_name(),
            progress.metrics.len()
        );
        Ok(())
    }

    pub fn load(&self, user_name: &str, user_surname: &str) -> Result<Option<UserProgress>> {
        let raw = self
            .conn
            .query_row(
                r#"
                SELECT user_name, user_surname, last_updated, metrics, full_text, time_tracker
                FROM user_progress
                WHERE user_name = ?1 AND user_surname = ?2
                "#,
                params![user_name, user_surname],
                RawProgress::from_row,
            )
            .optional()?;

        raw.map(RawProgress::decode).transpose()
    }

    /// All stored progress documents, most recently updated first.
    pub fn all_users(&self) -> Result<Vec<UserProgress>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT user_name, user_surname, last_updated, metrics, full_text, time_tracker
            FROM user_progress
            ORDER BY last_updated DESC, user_surname, user_name
            "#,
        )?;

        let rows = stmt.query_map([], RawProgress::from_row)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?.decode()?);
        }
        Ok(users)
    }

    /// Returns whether a document was removed.
    pub fn delete(&self, user_name: &str, user_surname: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM user_progress WHERE user_name = ?1 AND user_surname = ?2",
            params![user_name, user_surname],
        )?;
        Ok(removed > 0)
    }
}

/// Row as stored, before the JSON columns are decoded.
struct RawProgress {
    user_name: String,
    user_surname: String,
    last_updated: String,
    metrics: String,
    full_text: String,
    time_tracker: Option<String>,
}

impl RawProgress {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            user_name: row.get(0)?,
            user_surname: row.get(1)?,
            last_updated: row.get(2)?,
            metrics: row.get(3)?,
            full_text: row.get(4)?,
            time_tracker: row.get(5)?,
        })
    }

    fn decode(self) -> Result<UserProgress> {
        let last_updated = DateTime::parse_from_rfc3339(&self.last_updated)
            .map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    2,
                    "last_updated".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?
            .with_timezone(&Utc);

        Ok(UserProgress {
            user_name: self.user_name,
            user_surname: self.user_surname,
            last_updated,
            metrics: serde_json::from_str(&self.metrics)?,
            full_text: serde_json::from_str(&self.full_text)?,
            time_tracker: self
                .time_tracker
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{epoch, ManualClock};
    use crate::metrics::sample;
    use crate::tracker::SegmentTimeTracker;
    use chrono::Duration;
    use tempfile::tempdir;

    fn progress(name: &str, surname: &str, minutes: i64) -> UserProgress {
        let clock = ManualClock::at_epoch();
        let mut tracker = SegmentTimeTracker::with_clock(clock.clone());
        tracker.start(0);
        clock.advance_secs(9.0);
        tracker.pause(0);

        UserProgress {
            user_name: name.to_string(),
            user_surname: surname.to_string(),
            last_updated: epoch() + Duration::minutes(minutes),
            metrics: vec![sample(0, "Il gatto dorme.", 9.0, 1, 1)],
            full_text: vec![Segment::new("The cat sleeps.", "Il gatto dorme.")],
            time_tracker: Some(tracker.to_snapshot()),
        }
    }

    #[test]
    fn test_save_and_load() {
        let store = ProgressStore::open_in_memory().unwrap();
        let saved = progress("Ada", "Lovelace", 1);
        store.save(&saved).unwrap();

        let loaded = store.load("Ada", "Lovelace").unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_load_unknown_user() {
        let store = ProgressStore::open_in_memory().unwrap();
        assert!(store.load("Nobody", "Here").unwrap().is_none());
    }

    #[test]
    fn test_save_upserts() {
        let store = ProgressStore::open_in_memory().unwrap();
        store.save(&progress("Ada", "Lovelace", 1)).unwrap();

        let mut updated = progress("Ada", "Lovelace", 5);
        updated.metrics.push(sample(1, "Il cane abbaia.", 4.0, 0, 2));
        updated.time_tracker = None;
        store.save(&updated).unwrap();

        let users = store.all_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].metrics.len(), 2);
        assert_eq!(users[0].time_tracker, None);
    }

    #[test]
    fn test_all_users_newest_first() {
        let store = ProgressStore::open_in_memory().unwrap();
        store.save(&progress("Ada", "Lovelace", 1)).unwrap();
        store.save(&progress("Grace", "Hopper", 10)).unwrap();

        let names: Vec<String> = store
            .all_users()
            .unwrap()
            .iter()
            .map(UserProgress::display_name)
            .collect();
        assert_eq!(names, vec!["Grace Hopper", "Ada Lovelace"]);
    }

    #[test]
    fn test_delete() {
        let store = ProgressStore::open_in_memory().unwrap();
        store.save(&progress("Ada", "Lovelace", 1)).unwrap();

        assert!(store.delete("Ada", "Lovelace").unwrap());
        assert!(!store.delete("Ada", "Lovelace").unwrap());
        assert!(store.all_users().unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.db");
        {
            let store = ProgressStore::open(&path).unwrap();
            store.save(&progress("Ada", "Lovelace", 1)).unwrap();
        }
        assert!(path.exists());

        let reopened = ProgressStore::open(&path).unwrap();
        assert!(reopened.load("Ada", "Lovelace").unwrap().is_some());
    }
}
