use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::pipeline::{retry_async, RetryPolicy};

use super::{RenderError, TaskStatus, VideoRenderer};

/// How a render task is watched.
#[derive(Debug, Clone, Copy)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    /// Applied to every single status poll.
    pub poll_retry: RetryPolicy,
    /// Unchanged progress for this long fails the render.
    pub stuck_timeout: Duration,
}

/// Poll `task_id` until it finishes.
///
/// When the reported progress stays the same for `stuck_timeout` the task is
/// deleted (errors ignored) and [`RenderError::Stuck`] is returned. A poll
/// that still fails after its retries ends the watch with that error.
pub async fn wait_for_completion(
    renderer: &dyn VideoRenderer,
    task_id: &str,
    settings: &WatchSettings,
) -> Result<TaskStatus, RenderError> {
    let mut last_progress: Option<f64> = None;
    let mut last_change = Instant::now();

    loop {
        let status = retry_async(&settings.poll_retry, "get_task", || {
            renderer.get_task(task_id)
        })
        .await?;

        if status.is_finished() {
            return Ok(status);
        }

        match last_progress {
            Some(previous) if previous == status.progress => {
                let waited = last_change.elapsed();
                if waited >= settings.stuck_timeout {
                    warn!(task_id, progress = status.progress, ?waited, "Render stuck, deleting task");
                    if let Err(e) = renderer.delete_task(task_id).await {
                        warn!(task_id, error = %e, "Failed to delete stuck task");
                    }
                    return Err(RenderError::Stuck {
                        progress: status.progress,
                        waited,
                    });
                }
            }
            _ => {
                last_progress = Some(status.progress);
                last_change = Instant::now();
            }
        }

        debug!(task_id, progress = status.progress, "Render in progress");
        tokio::time::sleep(settings.poll_interval).await;
    }
}
