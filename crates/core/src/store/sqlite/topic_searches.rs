use chrono::Utc;
use rusqlite::{params, Row};

use crate::store::{StoreError, TopicSearch, TopicSearchStore};

use super::{format_ts, parse_ts, SqliteStore};

const TOPIC_SEARCH_COLUMNS: &str =
    "id, topic, related_topic, is_handled, created_at, updated_at";

fn row_to_topic_search(row: &Row) -> rusqlite::Result<TopicSearch> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;

    Ok(TopicSearch {
        id: row.get(0)?,
        topic: row.get(1)?,
        related_topic: row.get(2)?,
        is_handled: row.get(3)?,
        created_at: parse_ts(4, &created_at)?,
        updated_at: parse_ts(5, &updated_at)?,
    })
}

impl TopicSearchStore for SqliteStore {
    fn topic_expanded(&self, topic: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM topic_searches WHERE topic = ?)",
            params![topic],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn upsert_topic_search(
        &self,
        topic: &str,
        related_topic: &str,
    ) -> Result<TopicSearch, StoreError> {
        let conn = self.conn()?;
        let now = format_ts(Utc::now());

        conn.execute(
            "INSERT OR IGNORE INTO topic_searches \
                (id, topic, related_topic, is_handled, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 0, ?4, ?4)",
            params![uuid::Uuid::new_v4().to_string(), topic, related_topic, now],
        )?;

        let sql = format!(
            "SELECT {TOPIC_SEARCH_COLUMNS} FROM topic_searches \
             WHERE topic = ?1 AND related_topic = ?2"
        );
        Ok(conn.query_row(&sql, params![topic, related_topic], row_to_topic_search)?)
    }

    fn list_unhandled_topic_searches(&self, topic: &str) -> Result<Vec<TopicSearch>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {TOPIC_SEARCH_COLUMNS} FROM topic_searches \
             WHERE topic = ? AND is_handled = 0 \
             ORDER BY created_at ASC, rowid ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![topic], row_to_topic_search)?;

        let mut searches = Vec::new();
        for row in rows {
            searches.push(row?);
        }
        Ok(searches)
    }

    fn mark_topic_search_handled(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE topic_searches SET is_handled = 1, updated_at = ?1 WHERE id = ?2",
            params![format_ts(Utc::now()), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_is_idempotent_and_keeps_handled_flag() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(!store.topic_expanded("travel").unwrap());

        let first = store.upsert_topic_search("travel", "cheap flights").unwrap();
        assert!(!first.is_handled);
        assert!(store.topic_expanded("travel").unwrap());

        store.mark_topic_search_handled(&first.id).unwrap();
        let again = store.upsert_topic_search("travel", "cheap flights").unwrap();
        assert_eq!(again.id, first.id);
        assert!(again.is_handled);
    }

    #[test]
    fn test_list_unhandled_only() {
        let store = SqliteStore::in_memory().unwrap();
        let a = store.upsert_topic_search("travel", "a").unwrap();
        store.upsert_topic_search("travel", "b").unwrap();
        store.upsert_topic_search("food", "c").unwrap();

        store.mark_topic_search_handled(&a.id).unwrap();

        let pending = store.list_unhandled_topic_searches("travel").unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].related_topic, "b");

        assert!(matches!(
            store.mark_topic_search_handled("missing"),
            Err(StoreError::NotFound(_))
        ));
    }
}
