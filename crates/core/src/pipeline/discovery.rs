//! Topic discovery and keyword reprioritization.
//!
//! Discovery expands each channel interest topic into related topics once,
//! then turns every unhandled `(topic, related)` pair into classified,
//! scored keywords. A pair is marked handled only after all its candidates
//! went through.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::metrics;
use crate::reporting::ErrorReporter;
use crate::script_service::{KeywordQuestion, ScriptService};
use crate::store::{Channel, ChannelFilter, NewKeyword, TopicSearch, WorkStore};
use crate::text::{calculate_priority, is_english_text};

use super::config::{DiscoveryConfig, LoopPolicy, ReprioritizeConfig};
use super::types::{Pass, PipelineError, Stage};

/// Source of the channels whose topics seed discovery.
pub trait SeedProvider: Send + Sync {
    fn seed_channels(&self) -> Result<Vec<Channel>, PipelineError>;
}

/// Active channels with keyword search switched on.
pub struct ChannelSeedProvider {
    store: Arc<dyn WorkStore>,
}

impl ChannelSeedProvider {
    pub fn new(store: Arc<dyn WorkStore>) -> Self {
        Self { store }
    }
}

impl SeedProvider for ChannelSeedProvider {
    fn seed_channels(&self) -> Result<Vec<Channel>, PipelineError> {
        Ok(self.store.list_channels(&ChannelFilter::searching())?)
    }
}

/// Deduplicated union of every channel's interest topics.
pub fn interest_topics(channels: &[Channel]) -> Vec<String> {
    channels
        .iter()
        .flat_map(|c| c.topics.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Discovery stage.
pub struct TopicDiscovery {
    store: Arc<dyn WorkStore>,
    seeds: Arc<dyn SeedProvider>,
    scripts: Arc<dyn ScriptService>,
    classifier: Arc<dyn Classifier>,
    reporter: Arc<dyn ErrorReporter>,
    config: DiscoveryConfig,
}

impl TopicDiscovery {
    pub fn new(
        store: Arc<dyn WorkStore>,
        seeds: Arc<dyn SeedProvider>,
        scripts: Arc<dyn ScriptService>,
        classifier: Arc<dyn Classifier>,
        reporter: Arc<dyn ErrorReporter>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            store,
            seeds,
            scripts,
            classifier,
            reporter,
            config,
        }
    }

    /// Create related-topic pairs for a topic that was never expanded.
    pub async fn expand_topic(&self, topic: &str) -> Result<usize, PipelineError> {
        if self.store.topic_expanded(topic)? {
            return Ok(0);
        }

        let related = self.scripts.related_keywords(topic).await?;
        for related_topic in &related {
            self.store.upsert_topic_search(topic, related_topic)?;
        }
        info!(topic, related = related.len(), "Expanded topic");
        Ok(related.len())
    }

    /// Turn one pair's questions into keywords. Returns how many were stored.
    pub async fn process_pair(
        &self,
        pair: &TopicSearch,
        interests: &[String],
    ) -> Result<usize, PipelineError> {
        let questions = self.scripts.questions(&pair.related_topic).await?;
        let mut stored = 0;

        for question in questions {
            if self.process_candidate(question, interests).await? {
                stored += 1;
                tokio::time::sleep(self.config.candidate_delay()).await;
            }
        }

        self.store.mark_topic_search_handled(&pair.id)?;
        debug!(topic = %pair.topic, related = %pair.related_topic, stored, "Handled topic pair");
        Ok(stored)
    }

    async fn process_candidate(
        &self,
        question: KeywordQuestion,
        interests: &[String],
    ) -> Result<bool, PipelineError> {
        let keyword = question.keyword.trim();

        if !is_english_text(keyword) {
            debug!(keyword, "Skipping non-English keyword");
            metrics::KEYWORDS_SKIPPED
                .with_label_values(&["not_english"])
                .inc();
            return Ok(false);
        }

        if self.store.keyword_exists(keyword)? {
            debug!(keyword, "Skipping existing keyword");
            metrics::KEYWORDS_SKIPPED.with_label_values(&["exists"]).inc();
            return Ok(false);
        }

        // A failure leaves the pair unhandled; stored candidates are skipped on retry.
        let topic = self.classifier.classify(keyword).await?;

        let (priority, second_topic) = calculate_priority(&topic, interests);
        self.store.upsert_keyword(NewKeyword {
            keyword: keyword.to_string(),
            topic: topic.clone(),
            second_topic,
            competition: question.competition,
            volume: question.volume,
            overall: question.overall,
            estimated_monthly_search: question.estimated_monthly_search,
            priority,
        })?;

        metrics::KEYWORDS_DISCOVERED.inc();
        info!(keyword, topic = %topic, priority, "Stored keyword");
        Ok(true)
    }

    /// Expand and process every topic of one channel, one topic at a time.
    async fn discover_channel(&self, channel: &Channel, interests: &[String]) -> usize {
        let mut stored = 0;

        for topic in &channel.topics {
            if let Err(e) = self.expand_topic(topic).await {
                self.fail(topic, &e).await;
                continue;
            }

            let pairs = match self.store.list_unhandled_topic_searches(topic) {
                Ok(pairs) => pairs,
                Err(e) => {
                    self.fail(topic, &e.into()).await;
                    continue;
                }
            };

            for pair in pairs {
                match self.process_pair(&pair, interests).await {
                    Ok(n) => stored += n,
                    Err(e) => self.fail(&pair.related_topic, &e).await,
                }
            }
        }

        info!(channel = %channel.name, stored, "Channel discovery finished");
        stored
    }

    async fn fail(&self, topic: &str, err: &PipelineError) {
        warn!(topic, error = %err, "Discovery failed for topic");
        self.reporter.capture("discovery", err);
        tokio::time::sleep(self.policy().failure_backoff).await;
    }
}

#[async_trait]
impl Stage for TopicDiscovery {
    fn name(&self) -> &'static str {
        "discovery"
    }

    fn policy(&self) -> LoopPolicy {
        self.config.policy()
    }

    async fn run_once(&self) -> Result<Pass, PipelineError> {
        let channels = self.seeds.seed_channels()?;
        if channels.is_empty() {
            debug!("No channels to discover for");
            return Ok(Pass::Idle);
        }

        let interests = interest_topics(&channels);
        let concurrency = self.config.channel_concurrency.max(1);

        let passes: Vec<_> = channels
            .iter()
            .map(|channel| Box::pin(self.discover_channel(channel, &interests)))
            .collect();
        let stored: usize = stream::iter(passes)
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .sum();

        info!(channels = channels.len(), stored, "Discovery pass finished");
        Ok(if stored > 0 { Pass::Worked } else { Pass::Idle })
    }
}

/// Recomputes keyword priorities against the current channel topics.
pub struct Reprioritizer {
    store: Arc<dyn WorkStore>,
    seeds: Arc<dyn SeedProvider>,
    config: ReprioritizeConfig,
}

impl Reprioritizer {
    pub fn new(
        store: Arc<dyn WorkStore>,
        seeds: Arc<dyn SeedProvider>,
        config: ReprioritizeConfig,
    ) -> Self {
        Self {
            store,
            seeds,
            config,
        }
    }
}

#[async_trait]
impl Stage for Reprioritizer {
    fn name(&self) -> &'static str {
        "reprioritize"
    }

    fn policy(&self) -> LoopPolicy {
        self.config.policy()
    }

    /// Rescore one batch of the least recently updated keywords.
    async fn run_once(&self) -> Result<Pass, PipelineError> {
        let interests = interest_topics(&self.seeds.seed_channels()?);
        let batch = self
            .store
            .list_least_recently_updated(self.config.batch_size)?;
        if batch.is_empty() {
            return Ok(Pass::Idle);
        }

        let row_delay = self.policy().interval;
        for keyword in &batch {
            let (priority, second_topic) = calculate_priority(&keyword.topic, &interests);
            self.store
                .set_priority(&keyword.id, priority, second_topic.as_deref())?;
            tokio::time::sleep(row_delay).await;
        }

        debug!(rescored = batch.len(), "Reprioritized keywords");
        Ok(Pass::Worked)
    }
}
