//! Upload ledger on SQLite.
//!
//! The daily quota is enforced inside the insert statement itself, so the
//! count and the insert cannot interleave with another scheduler.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::store::{
    DayWindow, NewUpload, StoreError, Upload, UploadCounts, UploadInsert, UploadStore,
    VideoFormat, Visibility,
};

use super::{format_ts, parse_ts, SqliteStore};

const UPLOAD_COLUMNS: &str = "id, channel_id, keyword_id, video_type, visibility, publish_at, \
     youtube_link, created_at, updated_at";

fn parse_enum<T: std::str::FromStr<Err = String>>(idx: usize, value: &str) -> rusqlite::Result<T> {
    value
        .parse()
        .map_err(|e: String| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn row_to_upload(row: &Row) -> rusqlite::Result<Upload> {
    let video_type: String = row.get(3)?;
    let visibility: String = row.get(4)?;
    let publish_at: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;

    Ok(Upload {
        id: row.get(0)?,
        channel_id: row.get(1)?,
        keyword_id: row.get(2)?,
        video_type: parse_enum(3, &video_type)?,
        visibility: parse_enum(4, &visibility)?,
        publish_at: parse_ts(5, &publish_at)?,
        youtube_link: row.get(6)?,
        created_at: parse_ts(7, &created_at)?,
        updated_at: parse_ts(8, &updated_at)?,
    })
}

impl SqliteStore {
    fn upload_by_id(conn: &Connection, id: &str) -> Result<Option<Upload>, StoreError> {
        let sql = format!("SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = ?");
        Ok(conn.query_row(&sql, params![id], row_to_upload).optional()?)
    }
}

impl UploadStore for SqliteStore {
    fn create_upload_within_quota(
        &self,
        upload: NewUpload,
        window: &DayWindow,
        limit: u32,
    ) -> Result<UploadInsert, StoreError> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO uploads \
                (id, channel_id, keyword_id, video_type, visibility, publish_at, \
                 youtube_link, created_at, updated_at) \
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7 \
             WHERE ( \
                SELECT COUNT(*) FROM uploads \
                WHERE channel_id = ?2 AND video_type = ?4 \
                  AND created_at >= ?8 AND created_at < ?9 \
             ) < ?10",
            params![
                id,
                upload.channel_id,
                upload.keyword_id,
                upload.video_type.as_str(),
                Visibility::Unlisted.as_str(),
                format_ts(upload.publish_at),
                format_ts(upload.created_at),
                format_ts(window.start),
                format_ts(window.end),
                limit,
            ],
        )?;

        if inserted > 0 {
            return match Self::upload_by_id(&conn, &id)? {
                Some(created) => Ok(UploadInsert::Created(created)),
                None => Err(StoreError::NotFound(id)),
            };
        }

        let already: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM uploads \
             WHERE channel_id = ?1 AND keyword_id = ?2 AND video_type = ?3)",
            params![
                upload.channel_id,
                upload.keyword_id,
                upload.video_type.as_str()
            ],
            |row| row.get(0),
        )?;

        Ok(if already {
            UploadInsert::AlreadyScheduled
        } else {
            UploadInsert::QuotaExhausted
        })
    }

    fn get_upload(&self, id: &str) -> Result<Option<Upload>, StoreError> {
        let conn = self.conn()?;
        Self::upload_by_id(&conn, id)
    }

    fn count_uploads(&self, channel_id: &str, format: VideoFormat) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM uploads WHERE channel_id = ?1 AND video_type = ?2",
            params![channel_id, format.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn count_uploads_in_window(
        &self,
        channel_id: &str,
        format: VideoFormat,
        window: &DayWindow,
    ) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM uploads \
             WHERE channel_id = ?1 AND video_type = ?2 AND created_at >= ?3 AND created_at < ?4",
            params![
                channel_id,
                format.as_str(),
                format_ts(window.start),
                format_ts(window.end)
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn scheduled_keyword_ids(
        &self,
        channel_id: &str,
        format: VideoFormat,
    ) -> Result<HashSet<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT keyword_id FROM uploads WHERE channel_id = ?1 AND video_type = ?2")?;
        let rows = stmt.query_map(params![channel_id, format.as_str()], |row| {
            row.get::<_, String>(0)
        })?;

        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    fn list_due_uploads(&self, now: DateTime<Utc>) -> Result<Vec<Upload>, StoreError> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads \
             WHERE visibility = ?1 AND publish_at <= ?2 \
             ORDER BY publish_at ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![Visibility::Unlisted.as_str(), format_ts(now)],
            row_to_upload,
        )?;

        let mut uploads = Vec::new();
        for row in rows {
            uploads.push(row?);
        }
        Ok(uploads)
    }

    fn publish_upload(&self, id: &str, youtube_link: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE uploads SET visibility = ?1, youtube_link = ?2, updated_at = ?3 \
             WHERE id = ?4 AND visibility = ?5",
            params![
                Visibility::Public.as_str(),
                youtube_link,
                format_ts(Utc::now()),
                id,
                Visibility::Unlisted.as_str()
            ],
        )?;
        Ok(changed > 0)
    }

    fn upload_counts(&self) -> Result<UploadCounts, StoreError> {
        let conn = self.conn()?;
        let counts = conn.query_row(
            "SELECT COALESCE(SUM(visibility = 'unlisted'), 0), \
                    COALESCE(SUM(visibility = 'public'), 0) \
             FROM uploads",
            [],
            |row| {
                Ok(UploadCounts {
                    unlisted: row.get(0)?,
                    public: row.get(1)?,
                })
            },
        )?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChannelStore, NewChannel};
    use chrono::{Duration, TimeZone};

    fn window() -> DayWindow {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 4, 0, 0).unwrap();
        DayWindow {
            start,
            end: start + Duration::days(1),
        }
    }

    fn new_upload(channel_id: &str, keyword_id: &str, created_at: DateTime<Utc>) -> NewUpload {
        NewUpload {
            channel_id: channel_id.to_string(),
            keyword_id: keyword_id.to_string(),
            video_type: VideoFormat::Short,
            publish_at: created_at + Duration::days(1),
            created_at,
        }
    }

    fn store_with_channel() -> (SqliteStore, String) {
        let store = SqliteStore::in_memory().unwrap();
        let channel = store
            .create_channel(NewChannel::new("c", vec!["travel".into()]))
            .unwrap();
        (store, channel.id)
    }

    #[test]
    fn test_quota_caps_uploads_per_window() {
        let (store, channel) = store_with_channel();
        let w = window();
        let inside = w.start + Duration::hours(2);

        let first = store
            .create_upload_within_quota(new_upload(&channel, "k1", inside), &w, 2)
            .unwrap();
        let UploadInsert::Created(created) = first else {
            panic!("expected created upload");
        };
        assert_eq!(created.visibility, Visibility::Unlisted);
        assert!(created.youtube_link.is_none());

        assert!(matches!(
            store
                .create_upload_within_quota(new_upload(&channel, "k2", inside), &w, 2)
                .unwrap(),
            UploadInsert::Created(_)
        ));
        assert!(matches!(
            store
                .create_upload_within_quota(new_upload(&channel, "k3", inside), &w, 2)
                .unwrap(),
            UploadInsert::QuotaExhausted
        ));
        assert_eq!(
            store
                .count_uploads_in_window(&channel, VideoFormat::Short, &w)
                .unwrap(),
            2
        );

        // The next day has a fresh budget.
        let next = DayWindow {
            start: w.end,
            end: w.end + Duration::days(1),
        };
        assert!(matches!(
            store
                .create_upload_within_quota(new_upload(&channel, "k3", w.end), &next, 2)
                .unwrap(),
            UploadInsert::Created(_)
        ));
        assert_eq!(store.count_uploads(&channel, VideoFormat::Short).unwrap(), 3);
    }

    #[test]
    fn test_quota_is_per_format() {
        let (store, channel) = store_with_channel();
        let w = window();
        let inside = w.start + Duration::hours(1);

        store
            .create_upload_within_quota(new_upload(&channel, "k1", inside), &w, 1)
            .unwrap();
        let long = NewUpload {
            video_type: VideoFormat::Long,
            ..new_upload(&channel, "k1", inside)
        };
        assert!(matches!(
            store.create_upload_within_quota(long, &w, 1).unwrap(),
            UploadInsert::Created(_)
        ));
    }

    #[test]
    fn test_same_keyword_is_not_scheduled_twice() {
        let (store, channel) = store_with_channel();
        let w = window();
        let inside = w.start + Duration::hours(1);

        store
            .create_upload_within_quota(new_upload(&channel, "k1", inside), &w, 5)
            .unwrap();
        assert!(matches!(
            store
                .create_upload_within_quota(new_upload(&channel, "k1", inside), &w, 5)
                .unwrap(),
            UploadInsert::AlreadyScheduled
        ));

        let ids = store
            .scheduled_keyword_ids(&channel, VideoFormat::Short)
            .unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains("k1"));
        assert!(store
            .scheduled_keyword_ids(&channel, VideoFormat::Long)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_due_uploads_and_publish() {
        let (store, channel) = store_with_channel();
        let w = window();
        let created_at = w.start + Duration::hours(1);

        let UploadInsert::Created(upload) = store
            .create_upload_within_quota(new_upload(&channel, "k1", created_at), &w, 5)
            .unwrap()
        else {
            panic!("expected created");
        };

        assert!(store
            .list_due_uploads(upload.publish_at - Duration::seconds(1))
            .unwrap()
            .is_empty());
        let due = store.list_due_uploads(upload.publish_at).unwrap();
        assert_eq!(due.len(), 1);

        assert!(store
            .publish_upload(&upload.id, "https://youtu.be/abc")
            .unwrap());
        assert!(!store.publish_upload(&upload.id, "https://youtu.be/other").unwrap());

        let published = store.get_upload(&upload.id).unwrap().unwrap();
        assert_eq!(published.visibility, Visibility::Public);
        assert_eq!(published.youtube_link.as_deref(), Some("https://youtu.be/abc"));

        assert!(store
            .list_due_uploads(upload.publish_at + Duration::days(1))
            .unwrap()
            .is_empty());

        let counts = store.upload_counts().unwrap();
        assert_eq!(counts.public, 1);
        assert_eq!(counts.unlisted, 0);
    }

    #[test]
    fn test_upload_requires_known_channel() {
        let store = SqliteStore::in_memory().unwrap();
        let w = window();
        let result = store.create_upload_within_quota(new_upload("ghost", "k1", w.start), &w, 1);
        assert!(matches!(result, Err(StoreError::Database(_))));
    }
}
