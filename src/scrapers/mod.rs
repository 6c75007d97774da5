//! Metric-producing units. Each scraper fans out over the configured
//! organizations and pushes its samples into the sink it is handed.

pub mod users;
pub mod workspaces;

pub use users::ScrapeUsers;
pub use workspaces::ScrapeWorkspaces;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::{PolicyConfig, ScrapersConfig};
use crate::context::ScrapeContext;
use crate::error::Result;
use crate::models::MetricDesc;
use crate::sink::SampleSink;
use crate::tfe::TfeApi;

/// Shared, read-only inputs for every scraper in a cycle.
#[derive(Clone)]
pub struct ScrapeConfig {
    pub client: Arc<dyn TfeApi>,
    pub organizations: Vec<String>,
    pub page_size: u32,
    pub policy: PolicyConfig,
}

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Unique name, used as the `collector` label of the exporter's own metrics.
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static str;

    /// API version the scraper reads from.
    fn source_api_version(&self) -> &'static str;

    /// Every metric this scraper can emit.
    fn metrics(&self) -> &'static [&'static MetricDesc];

    async fn scrape(
        &self,
        ctx: &ScrapeContext,
        config: &ScrapeConfig,
        sink: &SampleSink,
    ) -> Result<()>;
}

/// The scrapers enabled by config, built once at startup.
pub fn default_scrapers(enabled: &ScrapersConfig) -> Vec<Arc<dyn Scraper>> {
    let mut scrapers: Vec<Arc<dyn Scraper>> = Vec::new();
    if enabled.workspaces {
        scrapers.push(Arc::new(ScrapeWorkspaces));
    }
    if enabled.users {
        scrapers.push(Arc::new(ScrapeUsers));
    }
    scrapers
}

/// What a per-organization worker task owns.
#[derive(Clone)]
pub(crate) struct WorkerEnv {
    pub api: Arc<dyn TfeApi>,
    pub page_size: u32,
    pub policy: PolicyConfig,
    pub sink: SampleSink,
    /// Reference instant for age-based values, fixed for the whole cycle.
    pub now: DateTime<Utc>,
}

impl WorkerEnv {
    pub fn new(config: &ScrapeConfig, sink: &SampleSink) -> Self {
        Self {
            api: config.client.clone(),
            page_size: config.page_size,
            policy: config.policy.clone(),
            sink: sink.clone(),
            now: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_scrapers_follow_config() {
        let all = default_scrapers(&ScrapersConfig::default());
        let names: Vec<_> = all.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["workspaces", "users"]);
        assert!(all.iter().all(|s| s.source_api_version() == "v2"));

        let only_ws = default_scrapers(&ScrapersConfig {
            workspaces: true,
            users: false,
        });
        assert_eq!(only_ws.len(), 1);
    }

    #[test]
    fn test_metric_names_are_unique_across_scrapers() {
        let all = default_scrapers(&ScrapersConfig::default());
        let mut seen = HashSet::new();
        for desc in all.iter().flat_map(|s| s.metrics().iter()) {
            assert!(seen.insert(desc.name), "duplicate metric {}", desc.name);
        }
    }
}
