//! Script generation stage: one keyword in flight at a time.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::metrics;
use crate::reporting::ErrorReporter;
use crate::script_service::{ScriptError, ScriptService};
use crate::store::{Keyword, WorkStore};

use super::config::{LoopPolicy, ScriptingConfig};
use super::types::{Pass, PipelineError, Stage};

/// What happened to a claimed keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    Generated,
    /// The backend rejected the keyword for good and it was deleted.
    Deleted,
    /// Recoverable failure, the claim was released.
    Failed,
}

pub struct ScriptGenerator {
    store: Arc<dyn WorkStore>,
    scripts: Arc<dyn ScriptService>,
    reporter: Arc<dyn ErrorReporter>,
    config: ScriptingConfig,
}

impl ScriptGenerator {
    pub fn new(
        store: Arc<dyn WorkStore>,
        scripts: Arc<dyn ScriptService>,
        reporter: Arc<dyn ErrorReporter>,
        config: ScriptingConfig,
    ) -> Self {
        Self {
            store,
            scripts,
            reporter,
            config,
        }
    }

    /// Generate a script for a keyword already claimed for scripting.
    pub async fn process(&self, keyword: &Keyword) -> Result<ScriptOutcome, PipelineError> {
        info!(keyword = %keyword.keyword, priority = keyword.priority, "Generating script");

        match self.scripts.generate_script(&keyword.keyword).await {
            Ok(generated) => {
                let script = generated.into_script(&keyword.keyword);
                if let Err(e) = self.store.complete_script(&keyword.id, script) {
                    self.release_claim(keyword);
                    return Err(e.into());
                }
                metrics::SCRIPTS.with_label_values(&["generated"]).inc();
                info!(keyword = %keyword.keyword, "Generated script");
                Ok(ScriptOutcome::Generated)
            }
            Err(ScriptError::InvalidKeyword(reason)) => {
                self.store.delete_keyword(&keyword.id)?;
                metrics::SCRIPTS.with_label_values(&["invalid"]).inc();
                warn!(keyword = %keyword.keyword, reason = %reason, "Keyword rejected, deleted");
                Ok(ScriptOutcome::Deleted)
            }
            Err(e) => {
                self.release_claim(keyword);
                metrics::SCRIPTS.with_label_values(&["failed"]).inc();
                warn!(keyword = %keyword.keyword, error = %e, "Script generation failed");
                self.reporter.capture("script", &e);
                Ok(ScriptOutcome::Failed)
            }
        }
    }

    fn release_claim(&self, keyword: &Keyword) {
        if let Err(e) = self.store.release_script_claim(&keyword.id) {
            warn!(keyword = %keyword.keyword, error = %e, "Failed to release script claim");
        }
    }
}

#[async_trait]
impl Stage for ScriptGenerator {
    fn name(&self) -> &'static str {
        "scripting"
    }

    fn policy(&self) -> LoopPolicy {
        self.config.policy()
    }

    async fn run_once(&self) -> Result<Pass, PipelineError> {
        let Some(keyword) = self.store.claim_next_unscripted()? else {
            info!("No keywords waiting for a script");
            return Ok(Pass::Idle);
        };

        if self.process(&keyword).await? == ScriptOutcome::Failed {
            tokio::time::sleep(self.policy().failure_backoff).await;
        }
        Ok(Pass::Worked)
    }

    fn exits_when_idle(&self) -> bool {
        true
    }
}
