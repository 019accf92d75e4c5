//! Upload scheduler.
//!
//! Spends each channel's daily quota at schedule time: an `Unlisted` upload
//! is created per rendered keyword, in priority order, until the channel has
//! as many uploads created today as its limit allows. Uploads go public the
//! next day at a random time inside the publish window.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::reporting::ErrorReporter;
use crate::store::{
    Channel, ChannelFilter, DayWindow, NewUpload, UploadInsert, VideoFormat, WorkStore,
};

use super::config::{LoopPolicy, ScheduleConfig, SchedulingConfig};
use super::types::{Pass, PipelineError, Stage};

fn to_utc(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(t) => t.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Skipped by a DST jump: read the wall time as UTC offset instead.
        LocalResult::None => tz.from_utc_datetime(&local).with_timezone(&Utc),
    }
}

fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    to_utc(tz, date.and_time(NaiveTime::default()))
}

/// The calendar day containing `now` in `tz`, as a UTC window.
pub fn day_window(now: DateTime<Utc>, tz: Tz) -> DayWindow {
    let today = now.with_timezone(&tz).date_naive();
    DayWindow {
        start: local_midnight(tz, today),
        end: local_midnight(tz, today + Days::new(1)),
    }
}

/// Tomorrow (in `tz`) at a random hour in `[hour_start, hour_end)` and a
/// random minute.
pub fn publish_time<R: Rng + ?Sized>(
    now: DateTime<Utc>,
    tz: Tz,
    hour_start: u32,
    hour_end: u32,
    rng: &mut R,
) -> Result<DateTime<Utc>, PipelineError> {
    if hour_start >= hour_end || hour_end > 24 {
        return Err(PipelineError::Config(format!(
            "invalid publish window {}..{}",
            hour_start, hour_end
        )));
    }

    let tomorrow = now.with_timezone(&tz).date_naive() + Days::new(1);
    let hour = rng.random_range(hour_start..hour_end);
    let minute = rng.random_range(0..60);
    let local = tomorrow
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| PipelineError::Config(format!("invalid publish time {}:{}", hour, minute)))?;
    Ok(to_utc(tz, local))
}

pub struct UploadScheduler {
    store: Arc<dyn WorkStore>,
    reporter: Arc<dyn ErrorReporter>,
    config: SchedulingConfig,
    schedule: ScheduleConfig,
    tz: Tz,
}

impl UploadScheduler {
    pub fn new(
        store: Arc<dyn WorkStore>,
        reporter: Arc<dyn ErrorReporter>,
        config: SchedulingConfig,
        schedule: ScheduleConfig,
    ) -> Result<Self, PipelineError> {
        let tz = schedule.tz().map_err(PipelineError::Config)?;
        Ok(Self {
            store,
            reporter,
            config,
            schedule,
            tz,
        })
    }

    /// Schedule rendered keywords for one channel and format. Returns the
    /// number of uploads created.
    pub fn schedule_channel(
        &self,
        channel: &Channel,
        format: VideoFormat,
        now: DateTime<Utc>,
    ) -> Result<usize, PipelineError> {
        let window = day_window(now, self.tz);
        let limit = channel.daily_limit(format);
        let used = self
            .store
            .count_uploads_in_window(&channel.id, format, &window)?;
        if used >= i64::from(limit) {
            debug!(channel = %channel.name, %format, used, limit, "Daily quota already spent");
            return Ok(0);
        }

        let scheduled = self.store.scheduled_keyword_ids(&channel.id, format)?;
        let candidates = self.store.list_rendered(format, &channel.topics)?;
        let mut rng = rand::rng();
        let mut created = 0;

        for keyword in candidates.iter().filter(|k| !scheduled.contains(&k.id)) {
            let publish_at = publish_time(
                now,
                self.tz,
                self.schedule.publish_hour_start,
                self.schedule.publish_hour_end,
                &mut rng,
            )?;
            let upload = NewUpload {
                channel_id: channel.id.clone(),
                keyword_id: keyword.id.clone(),
                video_type: format,
                publish_at,
                created_at: now,
            };

            match self
                .store
                .create_upload_within_quota(upload, &window, limit)?
            {
                UploadInsert::Created(upload) => {
                    created += 1;
                    metrics::UPLOADS_SCHEDULED
                        .with_label_values(&[format.as_str()])
                        .inc();
                    info!(
                        channel = %channel.name,
                        %format,
                        keyword = %keyword.keyword,
                        publish_at = %upload.publish_at,
                        "Scheduled upload"
                    );
                }
                UploadInsert::QuotaExhausted => {
                    debug!(channel = %channel.name, %format, limit, "Daily quota reached");
                    break;
                }
                UploadInsert::AlreadyScheduled => {}
            }
        }

        Ok(created)
    }

    /// Run the scheduler over every active channel and format.
    pub fn schedule_all(&self, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        let channels = self.store.list_channels(&ChannelFilter::active())?;
        let mut created = 0;

        for channel in &channels {
            for format in VideoFormat::ALL {
                match self.schedule_channel(channel, format, now) {
                    Ok(n) => created += n,
                    Err(e) => {
                        warn!(channel = %channel.name, %format, error = %e, "Scheduling failed");
                        self.reporter.capture("schedule", &e);
                    }
                }
            }
        }

        Ok(created)
    }
}

#[async_trait]
impl Stage for UploadScheduler {
    fn name(&self) -> &'static str {
        "scheduling"
    }

    fn policy(&self) -> LoopPolicy {
        self.config.policy()
    }

    async fn run_once(&self) -> Result<Pass, PipelineError> {
        let created = self.schedule_all(Utc::now())?;
        Ok(if created > 0 { Pass::Worked } else { Pass::Idle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ChannelStore, NewChannel, SqliteStore, UploadStore, Visibility};
    use crate::testing::{fixtures, RecordingReporter};
    use chrono::Timelike;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ny() -> Tz {
        "America/New_York".parse().unwrap()
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn scheduler(store: &Arc<SqliteStore>) -> UploadScheduler {
        UploadScheduler::new(
            store.clone(),
            Arc::new(RecordingReporter::new()),
            SchedulingConfig::default(),
            ScheduleConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_day_window_follows_timezone() {
        // 03:00 UTC is still the previous evening in New York (EDT, UTC-4).
        let window = day_window(at("2025-06-11T03:00:00Z"), ny());
        assert_eq!(window.start, at("2025-06-10T04:00:00Z"));
        assert_eq!(window.end, at("2025-06-11T04:00:00Z"));
    }

    #[test]
    fn test_day_window_across_dst() {
        // 2025-03-09 is 23 hours long in New York.
        let window = day_window(at("2025-03-09T12:00:00Z"), ny());
        assert_eq!(window.start, at("2025-03-09T05:00:00Z"));
        assert_eq!(window.end, at("2025-03-10T04:00:00Z"));
    }

    #[test]
    fn test_publish_time_is_next_day_in_window() {
        let now = at("2025-06-10T15:00:00Z");
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let publish = publish_time(now, ny(), 10, 24, &mut rng).unwrap();
            let local = publish.with_timezone(&ny());
            assert_eq!(local.date_naive().to_string(), "2025-06-11");
            assert!((10..24).contains(&local.hour()));
        }
    }

    #[test]
    fn test_publish_time_rejects_empty_window() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(publish_time(Utc::now(), ny(), 12, 12, &mut rng).is_err());
        assert!(publish_time(Utc::now(), ny(), 10, 25, &mut rng).is_err());
    }

    #[test]
    fn test_schedules_until_quota() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let channel = store
            .create_channel(
                NewChannel::new("Wanderlust", vec!["travel".to_string()]).with_limits(2, 1),
            )
            .unwrap();
        for name in ["one", "two", "three"] {
            fixtures::store_rendered_keyword(&*store, name, "travel", "a", VideoFormat::Short);
        }

        let scheduler = scheduler(&store);
        let now = at("2025-06-10T15:00:00Z");
        assert_eq!(
            scheduler.schedule_channel(&channel, VideoFormat::Short, now).unwrap(),
            2
        );
        // Same day: quota spent.
        assert_eq!(
            scheduler.schedule_channel(&channel, VideoFormat::Short, now).unwrap(),
            0
        );
        // Next day: the remaining keyword is scheduled.
        let tomorrow = at("2025-06-11T15:00:00Z");
        assert_eq!(
            scheduler.schedule_channel(&channel, VideoFormat::Short, tomorrow).unwrap(),
            1
        );
        assert_eq!(store.count_uploads(&channel.id, VideoFormat::Short).unwrap(), 3);
        assert_eq!(
            scheduler.schedule_channel(&channel, VideoFormat::Short, tomorrow).unwrap(),
            0
        );
    }

    #[test]
    fn test_spent_quota_skips_candidate_lookup() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let channel = store
            .create_channel(
                NewChannel::new("Wanderlust", vec!["travel".to_string()]).with_limits(0, 1),
            )
            .unwrap();
        fixtures::store_rendered_keyword(&*store, "one", "travel", "a", VideoFormat::Short);

        let now = at("2025-06-10T15:00:00Z");
        assert_eq!(
            scheduler(&store).schedule_channel(&channel, VideoFormat::Short, now).unwrap(),
            0
        );
        assert_eq!(store.count_uploads(&channel.id, VideoFormat::Short).unwrap(), 0);
    }

    #[test]
    fn test_scheduled_uploads_are_unlisted_and_future() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let channel = store
            .create_channel(NewChannel::new("Wanderlust", vec!["travel".to_string()]))
            .unwrap();
        fixtures::store_rendered_keyword(&*store, "one", "travel", "a", VideoFormat::Long);

        let now = at("2025-06-10T15:00:00Z");
        assert_eq!(scheduler(&store).schedule_all(now).unwrap(), 1);

        let due = store.list_due_uploads(at("2025-06-12T12:00:00Z")).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].channel_id, channel.id);
        assert_eq!(due[0].visibility, Visibility::Unlisted);
        assert_eq!(due[0].video_type, VideoFormat::Long);
        assert!(due[0].publish_at > now);
        assert!(store.list_due_uploads(now).unwrap().is_empty());
    }

    #[test]
    fn test_ignores_other_topics_and_unrendered() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        store
            .create_channel(NewChannel::new("Wanderlust", vec!["travel".to_string()]))
            .unwrap();
        fixtures::store_rendered_keyword(&*store, "pho", "food", "a", VideoFormat::Short);
        fixtures::store_scripted_keyword(&*store, "bali", "travel", "a", 1.0);

        assert_eq!(scheduler(&store).schedule_all(Utc::now()).unwrap(), 0);
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let result = UploadScheduler::new(
            store,
            Arc::new(RecordingReporter::new()),
            SchedulingConfig::default(),
            ScheduleConfig {
                timezone: "Mars/Olympus".to_string(),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
