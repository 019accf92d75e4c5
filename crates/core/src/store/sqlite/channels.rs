use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row, ToSql};

use crate::store::{Channel, ChannelFilter, ChannelStore, NewChannel, StoreError};

use super::{format_ts, parse_json, parse_ts, SqliteStore};

const CHANNEL_COLUMNS: &str = "id, name, topics, max_daily_short_videos_limit, \
     max_daily_long_videos_limit, chrome_profile_id, is_active, is_uploading_video, \
     is_running_search_keyword, created_at, updated_at";

fn row_to_channel(row: &Row) -> rusqlite::Result<Channel> {
    let topics: String = row.get(2)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(Channel {
        id: row.get(0)?,
        name: row.get(1)?,
        topics: parse_json(2, &topics)?,
        max_daily_short_videos_limit: row.get(3)?,
        max_daily_long_videos_limit: row.get(4)?,
        chrome_profile_id: row.get(5)?,
        is_active: row.get(6)?,
        is_uploading_video: row.get(7)?,
        is_running_search_keyword: row.get(8)?,
        created_at: parse_ts(9, &created_at)?,
        updated_at: parse_ts(10, &updated_at)?,
    })
}

impl ChannelStore for SqliteStore {
    fn create_channel(&self, channel: NewChannel) -> Result<Channel, StoreError> {
        let conn = self.conn()?;
        let now = format_ts(Utc::now());
        let topics = serde_json::to_string(&channel.topics)?;

        let sql = format!(
            "INSERT INTO channels ({CHANNEL_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10) \
             RETURNING {CHANNEL_COLUMNS}"
        );

        let created = conn.query_row(
            &sql,
            params![
                uuid::Uuid::new_v4().to_string(),
                channel.name,
                topics,
                channel.max_daily_short_videos_limit,
                channel.max_daily_long_videos_limit,
                channel.chrome_profile_id,
                channel.is_active,
                channel.is_uploading_video,
                channel.is_running_search_keyword,
                now,
            ],
            row_to_channel,
        )?;
        Ok(created)
    }

    fn get_channel(&self, id: &str) -> Result<Option<Channel>, StoreError> {
        let conn = self.conn()?;
        let sql = format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = ?");
        Ok(conn.query_row(&sql, params![id], row_to_channel).optional()?)
    }

    fn list_channels(&self, filter: &ChannelFilter) -> Result<Vec<Channel>, StoreError> {
        let conn = self.conn()?;

        let mut conditions = Vec::new();
        let mut filter_params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(active) = filter.is_active {
            conditions.push("is_active = ?");
            filter_params.push(Box::new(active));
        }
        if let Some(searching) = filter.is_running_search_keyword {
            conditions.push("is_running_search_keyword = ?");
            filter_params.push(Box::new(searching));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels {where_clause} ORDER BY created_at ASC, rowid ASC"
        );
        let param_refs: Vec<&dyn ToSql> = filter_params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), row_to_channel)?;
        let mut channels = Vec::new();
        for row in rows {
            channels.push(row?);
        }
        Ok(channels)
    }
}
