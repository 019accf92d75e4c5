//! Pipeline runner.
//!
//! Spawns one long-lived task per enabled stage. Every task sleeps through
//! [`sleep_or_shutdown`] and races its current pass against the shutdown
//! signal, so `stop()` interrupts work in flight. Claims abandoned that way
//! are reset by `release_stale_claims` on the next start.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::classifier::Classifier;
use crate::render::VideoRenderer;
use crate::reporting::ErrorReporter;
use crate::script_service::ScriptService;
use crate::store::{VideoFormat, WorkStore};
use crate::uploader::Uploader;

use super::config::{PipelineConfig, ScheduleConfig};
use super::discovery::{ChannelSeedProvider, Reprioritizer, SeedProvider, TopicDiscovery};
use super::policy::sleep_or_shutdown;
use super::publishing::UploadPublisher;
use super::rendering::RenderStage;
use super::scheduling::UploadScheduler;
use super::scripting::ScriptGenerator;
use super::types::{Pass, PipelineError, PipelineStatus, Stage};

/// External collaborators the stages talk to.
#[derive(Clone)]
pub struct PipelineServices {
    pub store: Arc<dyn WorkStore>,
    pub classifier: Arc<dyn Classifier>,
    pub scripts: Arc<dyn ScriptService>,
    pub renderer: Arc<dyn VideoRenderer>,
    pub uploader: Arc<dyn Uploader>,
    pub reporter: Arc<dyn ErrorReporter>,
}

/// Why a stage loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Shutdown,
    /// The stage ran dry and asked to be restarted later.
    Idle,
}

pub struct Pipeline {
    store: Arc<dyn WorkStore>,
    reporter: Arc<dyn ErrorReporter>,
    stages: Vec<Arc<dyn Stage>>,
    config: PipelineConfig,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Pipeline {
    /// Build the enabled stages.
    pub fn new(
        services: PipelineServices,
        config: PipelineConfig,
        schedule: ScheduleConfig,
        video_task_dir: PathBuf,
    ) -> Result<Self, PipelineError> {
        let PipelineServices {
            store,
            classifier,
            scripts,
            renderer,
            uploader,
            reporter,
        } = services;
        let seeds: Arc<dyn SeedProvider> = Arc::new(ChannelSeedProvider::new(store.clone()));
        let mut stages: Vec<Arc<dyn Stage>> = Vec::new();

        if config.discovery.enabled {
            stages.push(Arc::new(TopicDiscovery::new(
                store.clone(),
                seeds.clone(),
                scripts.clone(),
                classifier,
                reporter.clone(),
                config.discovery.clone(),
            )));
        }
        if config.reprioritize.enabled {
            stages.push(Arc::new(Reprioritizer::new(
                store.clone(),
                seeds,
                config.reprioritize.clone(),
            )));
        }
        if config.scripting.enabled {
            stages.push(Arc::new(ScriptGenerator::new(
                store.clone(),
                scripts,
                reporter.clone(),
                config.scripting.clone(),
            )));
        }
        if config.rendering.enabled {
            for format in VideoFormat::ALL {
                stages.push(Arc::new(RenderStage::new(
                    format,
                    store.clone(),
                    renderer.clone(),
                    reporter.clone(),
                    config.rendering.clone(),
                )));
            }
        }
        if config.scheduling.enabled {
            stages.push(Arc::new(UploadScheduler::new(
                store.clone(),
                reporter.clone(),
                config.scheduling.clone(),
                schedule,
            )?));
        }
        if config.publishing.enabled {
            stages.push(Arc::new(UploadPublisher::new(
                store.clone(),
                uploader,
                reporter.clone(),
                config.publishing.clone(),
                video_task_dir,
            )));
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            store,
            reporter,
            stages,
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        })
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start every stage loop.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Pipeline already running");
            return;
        }

        info!(stages = ?self.stage_names(), "Starting pipeline");

        if self.config.release_stale_claims {
            match self.store.release_stale_claims() {
                Ok(0) => {}
                Ok(n) => info!(released = n, "Released stale claims"),
                Err(e) => error!(error = %e, "Failed to release stale claims"),
            }
        }

        let mut handles = self.handles.lock().await;
        for stage in &self.stages {
            handles.push(self.spawn_stage(stage.clone()));
        }

        info!("Pipeline started");
    }

    /// Signal shutdown and wait for the loops to exit.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Pipeline not running");
            return;
        }

        info!("Stopping pipeline");
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Stage task ended abnormally");
            }
        }

        info!("Pipeline stopped");
    }

    /// Running flag plus store counts.
    pub fn status(&self) -> Result<PipelineStatus, PipelineError> {
        Ok(PipelineStatus {
            running: self.is_running(),
            stages: self
                .stage_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            keywords: self.store.keyword_counts()?,
            uploads: self.store.upload_counts()?,
        })
    }

    fn spawn_stage(&self, stage: Arc<dyn Stage>) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let reporter = Arc::clone(&self.reporter);
        let restart_delay = self.config.restart_delay();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let name = stage.name();
            info!(stage = name, "Loop started");
            loop {
                let exit = run_stage(
                    stage.as_ref(),
                    reporter.as_ref(),
                    &running,
                    &mut shutdown_rx,
                )
                .await;
                if exit == LoopExit::Shutdown {
                    break;
                }
                info!(stage = name, ?restart_delay, "Loop returned, restarting");
                if !sleep_or_shutdown(restart_delay, &mut shutdown_rx).await {
                    break;
                }
            }
            info!(stage = name, "Loop stopped");
        })
    }
}

async fn run_stage(
    stage: &dyn Stage,
    reporter: &dyn ErrorReporter,
    running: &AtomicBool,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> LoopExit {
    loop {
        let outcome = tokio::select! {
            _ = shutdown_rx.recv() => {
                info!(stage = stage.name(), "Loop received shutdown signal");
                return LoopExit::Shutdown;
            }
            outcome = stage.run_once() => outcome,
        };

        let policy = stage.policy();
        let delay: Duration = match &outcome {
            Ok(Pass::Worked) => policy.interval,
            Ok(Pass::Idle) => policy.idle_interval,
            Err(e) => {
                warn!(stage = stage.name(), error = %e, "Stage pass failed");
                reporter.capture(stage.name(), e);
                policy.failure_backoff
            }
        };

        if !sleep_or_shutdown(delay, shutdown_rx).await || !running.load(Ordering::Relaxed) {
            return LoopExit::Shutdown;
        }

        if matches!(outcome, Ok(Pass::Idle)) && stage.exits_when_idle() {
            return LoopExit::Idle;
        }
    }
}
