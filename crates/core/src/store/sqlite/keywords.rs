//! Keyword queue on SQLite.
//!
//! Claims are single `UPDATE ... WHERE id = (SELECT ... LIMIT 1) RETURNING`
//! statements, so two consumers can never receive the same keyword.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};

use crate::store::{
    Keyword, KeywordCounts, KeywordStore, NewKeyword, RenderState, Script, ScriptState,
    StoreError, VideoFormat, VideoRef,
};

use super::{format_ts, parse_json, parse_ts, placeholders, SqliteStore};

const KEYWORD_COLUMNS: &str = "id, keyword, topic, second_topic, competition, volume, overall, \
     estimated_monthly_search, priority, script_state, short_state, long_state, created_at, updated_at";

fn state_column(format: VideoFormat) -> &'static str {
    match format {
        VideoFormat::Short => "short_state",
        VideoFormat::Long => "long_state",
    }
}

fn row_to_keyword(row: &Row) -> rusqlite::Result<Keyword> {
    let script_state: String = row.get(9)?;
    let short_state: String = row.get(10)?;
    let long_state: String = row.get(11)?;
    let created_at: String = row.get(12)?;
    let updated_at: String = row.get(13)?;

    Ok(Keyword {
        id: row.get(0)?,
        keyword: row.get(1)?,
        topic: row.get(2)?,
        second_topic: row.get(3)?,
        competition: row.get(4)?,
        volume: row.get(5)?,
        overall: row.get(6)?,
        estimated_monthly_search: row.get(7)?,
        priority: row.get(8)?,
        script_state: parse_json(9, &script_state)?,
        short_state: parse_json(10, &short_state)?,
        long_state: parse_json(11, &long_state)?,
        created_at: parse_ts(12, &created_at)?,
        updated_at: parse_ts(13, &updated_at)?,
    })
}

/// `(topic IN (...) OR second_topic IN (...))` plus its parameters.
fn topic_clause(topics: &[String]) -> (String, Vec<Box<dyn ToSql>>) {
    let marks = placeholders(topics.len());
    let clause = format!("(topic IN ({marks}) OR second_topic IN ({marks}))");
    let mut params: Vec<Box<dyn ToSql>> = Vec::with_capacity(topics.len() * 2);
    for _ in 0..2 {
        for topic in topics {
            params.push(Box::new(topic.clone()));
        }
    }
    (clause, params)
}

impl SqliteStore {
    fn keyword_by_id(conn: &Connection, id: &str) -> Result<Option<Keyword>, StoreError> {
        let sql = format!("SELECT {KEYWORD_COLUMNS} FROM keywords WHERE id = ?");
        Ok(conn.query_row(&sql, params![id], row_to_keyword).optional()?)
    }

    /// Explain why a guarded transition matched no row.
    fn transition_error(
        conn: &Connection,
        id: &str,
        operation: &str,
        current: impl Fn(&Keyword) -> &'static str,
    ) -> StoreError {
        match Self::keyword_by_id(conn, id) {
            Ok(Some(keyword)) => StoreError::InvalidState {
                id: id.to_string(),
                state: current(&keyword).to_string(),
                operation: operation.to_string(),
            },
            Ok(None) => StoreError::NotFound(id.to_string()),
            Err(e) => e,
        }
    }
}

impl KeywordStore for SqliteStore {
    fn get_keyword(&self, id: &str) -> Result<Option<Keyword>, StoreError> {
        let conn = self.conn()?;
        Self::keyword_by_id(&conn, id)
    }

    fn keyword_exists(&self, keyword: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM keywords WHERE keyword = ?)",
            params![keyword],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn upsert_keyword(&self, keyword: NewKeyword) -> Result<Keyword, StoreError> {
        let conn = self.conn()?;
        let now = format_ts(Utc::now());
        let script_state = serde_json::to_string(&ScriptState::Pending)?;
        let render_state = serde_json::to_string(&RenderState::NotRequested)?;

        let sql = format!(
            "INSERT INTO keywords ({KEYWORD_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11, ?12, ?12) \
             ON CONFLICT(keyword) DO UPDATE SET \
                topic = excluded.topic, \
                second_topic = excluded.second_topic, \
                competition = excluded.competition, \
                volume = excluded.volume, \
                overall = excluded.overall, \
                estimated_monthly_search = excluded.estimated_monthly_search, \
                priority = excluded.priority, \
                updated_at = excluded.updated_at \
             RETURNING {KEYWORD_COLUMNS}"
        );

        let stored = conn.query_row(
            &sql,
            params![
                uuid::Uuid::new_v4().to_string(),
                keyword.keyword,
                keyword.topic,
                keyword.second_topic,
                keyword.competition,
                keyword.volume,
                keyword.overall,
                keyword.estimated_monthly_search,
                keyword.priority,
                script_state,
                render_state,
                now,
            ],
            row_to_keyword,
        )?;
        Ok(stored)
    }

    fn claim_next_unscripted(&self) -> Result<Option<Keyword>, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let claimed = serde_json::to_string(&ScriptState::Generating { claimed_at: now })?;

        let sql = format!(
            "UPDATE keywords SET script_state = ?1, updated_at = ?2 \
             WHERE id = ( \
                SELECT id FROM keywords \
                WHERE json_extract(script_state, '$.type') = 'pending' \
                ORDER BY priority DESC, created_at ASC, rowid ASC LIMIT 1 \
             ) \
             RETURNING {KEYWORD_COLUMNS}"
        );

        Ok(conn
            .query_row(&sql, params![claimed, format_ts(now)], row_to_keyword)
            .optional()?)
    }

    fn complete_script(&self, id: &str, script: Script) -> Result<Keyword, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let state = serde_json::to_string(&ScriptState::Generated {
            script,
            generated_at: now,
        })?;

        let sql = format!(
            "UPDATE keywords SET script_state = ?1, updated_at = ?2 \
             WHERE id = ?3 AND json_extract(script_state, '$.type') = 'generating' \
             RETURNING {KEYWORD_COLUMNS}"
        );

        match conn
            .query_row(&sql, params![state, format_ts(now), id], row_to_keyword)
            .optional()?
        {
            Some(keyword) => Ok(keyword),
            None => Err(Self::transition_error(&conn, id, "complete script for", |k| {
                k.script_state.state_type()
            })),
        }
    }

    fn release_script_claim(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let pending = serde_json::to_string(&ScriptState::Pending)?;
        conn.execute(
            "UPDATE keywords SET script_state = ?1, updated_at = ?2 \
             WHERE id = ?3 AND json_extract(script_state, '$.type') = 'generating'",
            params![pending, format_ts(Utc::now()), id],
        )?;
        Ok(())
    }

    fn claim_next_for_render(
        &self,
        format: VideoFormat,
        topics: &[String],
    ) -> Result<Option<Keyword>, StoreError> {
        if topics.is_empty() {
            return Ok(None);
        }

        let conn = self.conn()?;
        let now = Utc::now();
        let column = state_column(format);
        let claimed = serde_json::to_string(&RenderState::Rendering { claimed_at: now })?;
        let (topic_sql, topic_params) = topic_clause(topics);

        let sql = format!(
            "UPDATE keywords SET {column} = ?, updated_at = ? \
             WHERE id = ( \
                SELECT id FROM keywords \
                WHERE json_extract(script_state, '$.type') = 'generated' \
                  AND json_extract({column}, '$.type') = 'not_requested' \
                  AND {topic_sql} \
                ORDER BY priority DESC, created_at ASC, rowid ASC LIMIT 1 \
             ) \
             RETURNING {KEYWORD_COLUMNS}"
        );

        let mut all_params: Vec<Box<dyn ToSql>> = vec![Box::new(claimed), Box::new(format_ts(now))];
        all_params.extend(topic_params);
        let param_refs: Vec<&dyn ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        Ok(conn
            .query_row(&sql, param_refs.as_slice(), row_to_keyword)
            .optional()?)
    }

    fn complete_render(
        &self,
        id: &str,
        format: VideoFormat,
        video: VideoRef,
    ) -> Result<Keyword, StoreError> {
        let conn = self.conn()?;
        let now = Utc::now();
        let column = state_column(format);
        let state = serde_json::to_string(&RenderState::Done {
            video,
            completed_at: now,
        })?;

        let sql = format!(
            "UPDATE keywords SET {column} = ?1, updated_at = ?2 \
             WHERE id = ?3 AND json_extract({column}, '$.type') = 'rendering' \
             RETURNING {KEYWORD_COLUMNS}"
        );

        match conn
            .query_row(&sql, params![state, format_ts(now), id], row_to_keyword)
            .optional()?
        {
            Some(keyword) => Ok(keyword),
            None => Err(Self::transition_error(&conn, id, "complete render for", |k| {
                k.render_state(format).state_type()
            })),
        }
    }

    fn release_render_claim(&self, id: &str, format: VideoFormat) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let column = state_column(format);
        let not_requested = serde_json::to_string(&RenderState::NotRequested)?;
        let sql = format!(
            "UPDATE keywords SET {column} = ?1, updated_at = ?2 \
             WHERE id = ?3 AND json_extract({column}, '$.type') = 'rendering'"
        );
        conn.execute(&sql, params![not_requested, format_ts(Utc::now()), id])?;
        Ok(())
    }

    fn count_rendered(&self, format: VideoFormat, topics: &[String]) -> Result<i64, StoreError> {
        if topics.is_empty() {
            return Ok(0);
        }

        let conn = self.conn()?;
        let column = state_column(format);
        let (topic_sql, topic_params) = topic_clause(topics);
        let sql = format!(
            "SELECT COUNT(*) FROM keywords \
             WHERE json_extract({column}, '$.type') = 'done' AND {topic_sql}"
        );
        let param_refs: Vec<&dyn ToSql> = topic_params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    fn list_rendered(
        &self,
        format: VideoFormat,
        topics: &[String],
    ) -> Result<Vec<Keyword>, StoreError> {
        if topics.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let column = state_column(format);
        let (topic_sql, topic_params) = topic_clause(topics);
        let sql = format!(
            "SELECT {KEYWORD_COLUMNS} FROM keywords \
             WHERE json_extract(script_state, '$.type') = 'generated' \
               AND json_extract({column}, '$.type') = 'done' AND {topic_sql} \
             ORDER BY priority DESC, created_at ASC"
        );
        let param_refs: Vec<&dyn ToSql> = topic_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), row_to_keyword)?;
        let mut keywords = Vec::new();
        for row in rows {
            keywords.push(row?);
        }
        Ok(keywords)
    }

    fn list_least_recently_updated(&self, limit: i64) -> Result<Vec<Keyword>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {KEYWORD_COLUMNS} FROM keywords ORDER BY updated_at ASC LIMIT ?");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], row_to_keyword)?;
        let mut keywords = Vec::new();
        for row in rows {
            keywords.push(row?);
        }
        Ok(keywords)
    }

    fn set_priority(
        &self,
        id: &str,
        priority: f64,
        second_topic: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE keywords SET priority = ?1, second_topic = ?2, updated_at = ?3 WHERE id = ?4",
            params![priority, second_topic, format_ts(Utc::now()), id],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn delete_keyword(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM keywords WHERE id = ?", params![id])?;
        Ok(changed > 0)
    }

    fn release_stale_claims(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let now = format_ts(Utc::now());
        let pending = serde_json::to_string(&ScriptState::Pending)?;
        let not_requested = serde_json::to_string(&RenderState::NotRequested)?;

        let mut touched = conn.execute(
            "UPDATE keywords SET script_state = ?1, updated_at = ?2 \
             WHERE json_extract(script_state, '$.type') = 'generating'",
            params![pending, now],
        )?;

        for format in VideoFormat::ALL {
            let column = state_column(format);
            let sql = format!(
                "UPDATE keywords SET {column} = ?1, updated_at = ?2 \
                 WHERE json_extract({column}, '$.type') = 'rendering'"
            );
            touched += conn.execute(&sql, params![not_requested, now])?;
        }

        Ok(touched)
    }

    fn keyword_counts(&self) -> Result<KeywordCounts, StoreError> {
        let conn = self.conn()?;
        let counts = conn.query_row(
            "SELECT COUNT(*), \
                COALESCE(SUM(json_extract(script_state, '$.type') = 'pending'), 0), \
                COALESCE(SUM(json_extract(script_state, '$.type') = 'generating'), 0), \
                COALESCE(SUM(json_extract(script_state, '$.type') = 'generated'), 0), \
                COALESCE(SUM(json_extract(short_state, '$.type') = 'rendering'), 0), \
                COALESCE(SUM(json_extract(short_state, '$.type') = 'done'), 0), \
                COALESCE(SUM(json_extract(long_state, '$.type') = 'rendering'), 0), \
                COALESCE(SUM(json_extract(long_state, '$.type') = 'done'), 0) \
             FROM keywords",
            [],
            |row| {
                Ok(KeywordCounts {
                    total: row.get(0)?,
                    script_pending: row.get(1)?,
                    script_generating: row.get(2)?,
                    script_generated: row.get(3)?,
                    short_rendering: row.get(4)?,
                    short_done: row.get(5)?,
                    long_rendering: row.get(6)?,
                    long_done: row.get(7)?,
                })
            },
        )?;
        Ok(counts)
    }
}
