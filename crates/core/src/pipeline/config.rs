//! Pipeline configuration.
//!
//! Every sleep, backoff and attempt count used by the loops lives here as
//! plain data. Values are in milliseconds so tests can shrink them.

use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Sleep cadence of a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopPolicy {
    /// Pause after a pass that did work.
    pub interval: Duration,
    /// Pause after a pass that found nothing to do.
    pub idle_interval: Duration,
    /// Extra pause after a failed work item.
    pub failure_backoff: Duration,
}

impl LoopPolicy {
    /// Same delay for every case. Handy in tests.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            interval: delay,
            idle_interval: delay,
            failure_backoff: delay,
        }
    }
}

/// Bounded retry of a single fallible call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Topic discovery loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Pause between full discovery passes.
    #[serde(default = "default_discovery_interval")]
    pub interval_ms: u64,
    /// Rate-limit pause after each stored keyword.
    #[serde(default = "default_candidate_delay")]
    pub candidate_delay_ms: u64,
    /// Pause after a topic pair fails.
    #[serde(default = "default_discovery_backoff")]
    pub failure_backoff_ms: u64,
    /// Channels expanded at the same time.
    #[serde(default = "default_channel_concurrency")]
    pub channel_concurrency: usize,
}

fn default_discovery_interval() -> u64 {
    3_600_000 // 1 hour
}

fn default_candidate_delay() -> u64 {
    2_000
}

fn default_discovery_backoff() -> u64 {
    60_000
}

fn default_channel_concurrency() -> usize {
    2
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_discovery_interval(),
            candidate_delay_ms: default_candidate_delay(),
            failure_backoff_ms: default_discovery_backoff(),
            channel_concurrency: default_channel_concurrency(),
        }
    }
}

impl DiscoveryConfig {
    pub fn policy(&self) -> LoopPolicy {
        LoopPolicy {
            interval: Duration::from_millis(self.interval_ms),
            idle_interval: Duration::from_millis(self.interval_ms),
            failure_backoff: Duration::from_millis(self.failure_backoff_ms),
        }
    }

    pub fn candidate_delay(&self) -> Duration {
        Duration::from_millis(self.candidate_delay_ms)
    }
}

/// Script generation loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Pause after each processed keyword.
    #[serde(default = "default_script_interval")]
    pub interval_ms: u64,
    /// Pause before returning when the queue is empty.
    #[serde(default = "default_script_idle")]
    pub idle_interval_ms: u64,
    /// Extra pause after a recoverable failure.
    #[serde(default = "default_script_backoff")]
    pub failure_backoff_ms: u64,
}

fn default_script_interval() -> u64 {
    180_000 // 3 minutes
}

fn default_script_idle() -> u64 {
    1_800_000 // 30 minutes
}

fn default_script_backoff() -> u64 {
    1_800_000 // 30 minutes
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_script_interval(),
            idle_interval_ms: default_script_idle(),
            failure_backoff_ms: default_script_backoff(),
        }
    }
}

impl ScriptingConfig {
    pub fn policy(&self) -> LoopPolicy {
        LoopPolicy {
            interval: Duration::from_millis(self.interval_ms),
            idle_interval: Duration::from_millis(self.idle_interval_ms),
            failure_backoff: Duration::from_millis(self.failure_backoff_ms),
        }
    }
}

/// Video generation loops (one per format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Pause between channel sweeps that rendered something.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,
    /// Pause between sweeps that rendered nothing.
    #[serde(default = "default_render_idle")]
    pub idle_interval_ms: u64,
    /// Task status poll cadence.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Attempts per status poll before the render fails.
    #[serde(default = "default_poll_attempts")]
    pub poll_attempts: u32,
    /// Pause between failed status poll attempts.
    #[serde(default = "default_poll_retry_delay")]
    pub poll_retry_delay_ms: u64,
    /// Unchanged progress for this long aborts the task.
    #[serde(default = "default_stuck_timeout")]
    pub stuck_timeout_ms: u64,
}

fn default_sweep_interval() -> u64 {
    60_000
}

fn default_render_idle() -> u64 {
    600_000 // 10 minutes
}

fn default_poll_interval() -> u64 {
    10_000
}

fn default_poll_attempts() -> u32 {
    10
}

fn default_poll_retry_delay() -> u64 {
    1_000
}

fn default_stuck_timeout() -> u64 {
    1_800_000 // 30 minutes
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_ms: default_sweep_interval(),
            idle_interval_ms: default_render_idle(),
            poll_interval_ms: default_poll_interval(),
            poll_attempts: default_poll_attempts(),
            poll_retry_delay_ms: default_poll_retry_delay(),
            stuck_timeout_ms: default_stuck_timeout(),
        }
    }
}

impl RenderingConfig {
    pub fn policy(&self) -> LoopPolicy {
        LoopPolicy {
            interval: Duration::from_millis(self.sweep_interval_ms),
            idle_interval: Duration::from_millis(self.idle_interval_ms),
            failure_backoff: Duration::ZERO,
        }
    }

    pub fn poll_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.poll_attempts,
            Duration::from_millis(self.poll_retry_delay_ms),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stuck_timeout(&self) -> Duration {
        Duration::from_millis(self.stuck_timeout_ms)
    }
}

/// Upload scheduler loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_five_minutes")]
    pub interval_ms: u64,
}

fn default_five_minutes() -> u64 {
    300_000
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_five_minutes(),
        }
    }
}

impl SchedulingConfig {
    pub fn policy(&self) -> LoopPolicy {
        LoopPolicy {
            interval: Duration::from_millis(self.interval_ms),
            idle_interval: Duration::from_millis(self.interval_ms),
            failure_backoff: Duration::ZERO,
        }
    }
}

/// Upload worker loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Pause between sweeps over due uploads.
    #[serde(default = "default_five_minutes")]
    pub interval_ms: u64,
    /// Pause between two uploads on the same channel.
    #[serde(default = "default_upload_spacing")]
    pub upload_spacing_ms: u64,
}

fn default_upload_spacing() -> u64 {
    60_000
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: default_five_minutes(),
            upload_spacing_ms: default_upload_spacing(),
        }
    }
}

impl PublishingConfig {
    pub fn policy(&self) -> LoopPolicy {
        LoopPolicy {
            interval: Duration::from_millis(self.interval_ms),
            idle_interval: Duration::from_millis(self.interval_ms),
            failure_backoff: Duration::ZERO,
        }
    }

    pub fn upload_spacing(&self) -> Duration {
        Duration::from_millis(self.upload_spacing_ms)
    }
}

/// Priority recomputation sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprioritizeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,
    /// Pause after each rescored keyword.
    #[serde(default = "default_row_delay")]
    pub row_delay_ms: u64,
    /// Pause when there is nothing to rescore.
    #[serde(default = "default_reprioritize_idle")]
    pub idle_interval_ms: u64,
}

fn default_batch_size() -> i64 {
    1000
}

fn default_row_delay() -> u64 {
    1_000
}

fn default_reprioritize_idle() -> u64 {
    60_000
}

impl Default for ReprioritizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            batch_size: default_batch_size(),
            row_delay_ms: default_row_delay(),
            idle_interval_ms: default_reprioritize_idle(),
        }
    }
}

impl ReprioritizeConfig {
    pub fn policy(&self) -> LoopPolicy {
        LoopPolicy {
            interval: Duration::from_millis(self.row_delay_ms),
            idle_interval: Duration::from_millis(self.idle_interval_ms),
            failure_backoff: Duration::ZERO,
        }
    }
}

/// Configuration for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Reset claims left by a crashed process on startup.
    #[serde(default = "default_true")]
    pub release_stale_claims: bool,
    /// Pause before a loop that returned is started again.
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub scripting: ScriptingConfig,
    #[serde(default)]
    pub rendering: RenderingConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub publishing: PublishingConfig,
    #[serde(default)]
    pub reprioritize: ReprioritizeConfig,
}

fn default_restart_delay() -> u64 {
    1_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            release_stale_claims: true,
            restart_delay_ms: default_restart_delay(),
            discovery: DiscoveryConfig::default(),
            scripting: ScriptingConfig::default(),
            rendering: RenderingConfig::default(),
            scheduling: SchedulingConfig::default(),
            publishing: PublishingConfig::default(),
            reprioritize: ReprioritizeConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

/// When scheduled uploads go public.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA zone used for the publish hour and the daily quota window.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// First publish hour (inclusive).
    #[serde(default = "default_hour_start")]
    pub publish_hour_start: u32,
    /// Last publish hour (exclusive).
    #[serde(default = "default_hour_end")]
    pub publish_hour_end: u32,
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}

fn default_hour_start() -> u32 {
    10
}

fn default_hour_end() -> u32 {
    24
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            publish_hour_start: default_hour_start(),
            publish_hour_end: default_hour_end(),
        }
    }
}

impl ScheduleConfig {
    pub fn tz(&self) -> Result<Tz, String> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| format!("unknown timezone: {}", self.timezone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.channel_concurrency, 2);
        assert_eq!(config.scripting.idle_interval_ms, 1_800_000);
        assert_eq!(config.rendering.poll_attempts, 10);
        assert_eq!(config.rendering.stuck_timeout(), Duration::from_secs(1800));
        assert_eq!(config.publishing.upload_spacing(), Duration::from_secs(60));
        assert!(!config.reprioritize.enabled);
        assert_eq!(config.reprioritize.batch_size, 1000);
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            [rendering]
            poll_interval_ms = 5000

            [reprioritize]
            enabled = true
        "#;
        let config: PipelineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.rendering.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.rendering.sweep_interval_ms, 60_000);
        assert!(config.reprioritize.enabled);
        assert!(config.scripting.enabled);
        assert!(config.release_stale_claims);
    }

    #[test]
    fn test_policies_follow_config() {
        let config = ScriptingConfig {
            interval_ms: 10,
            idle_interval_ms: 20,
            failure_backoff_ms: 30,
            ..Default::default()
        };
        let policy = config.policy();
        assert_eq!(policy.interval, Duration::from_millis(10));
        assert_eq!(policy.idle_interval, Duration::from_millis(20));
        assert_eq!(policy.failure_backoff, Duration::from_millis(30));

        let retry = RenderingConfig::default().poll_retry();
        assert_eq!(retry.max_attempts, 10);
    }

    #[test]
    fn test_schedule_timezone() {
        let schedule = ScheduleConfig::default();
        assert_eq!(schedule.tz().unwrap(), chrono_tz::America::New_York);

        let bad = ScheduleConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(bad.tz().is_err());
    }
}
