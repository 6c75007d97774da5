use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::models::EntityKind;

/// Top-level config loaded from `tfe_exporter.toml`, then overridden from the
/// environment.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ExporterConfig {
    /// Organizations to collect. Empty means every organization the token can see.
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub scrapers: ScrapersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_address")]
    pub address: String,
    /// Usually supplied through `TFE_TOKEN` rather than the file.
    pub token: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            token: None,
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_address() -> String {
    "https://app.terraform.io".to_string()
}

fn default_page_size() -> u32 {
    crate::pagination::DEFAULT_PAGE_SIZE
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:9100".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Deadline for one scraper within a cycle.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            timeout_secs: default_timeout(),
            sink_capacity: default_sink_capacity(),
        }
    }
}

fn default_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    50
}

fn default_sink_capacity() -> usize {
    crate::sink::DEFAULT_CAPACITY
}

impl CollectionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// What a worker does when a page of an entity kind can't be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the organization's work and return the error.
    Abort,
    /// Log, skip the page and continue with what was fetched.
    Degrade,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "abort")]
    pub workspaces: FailurePolicy,
    #[serde(default = "degrade")]
    pub projects: FailurePolicy,
    #[serde(default = "abort")]
    pub memberships: FailurePolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            workspaces: FailurePolicy::Abort,
            projects: FailurePolicy::Degrade,
            memberships: FailurePolicy::Abort,
        }
    }
}

fn abort() -> FailurePolicy {
    FailurePolicy::Abort
}

fn degrade() -> FailurePolicy {
    FailurePolicy::Degrade
}

impl PolicyConfig {
    pub fn for_kind(&self, kind: EntityKind) -> FailurePolicy {
        match kind {
            EntityKind::Workspace => self.workspaces,
            EntityKind::Project => self.projects,
            EntityKind::Membership => self.memberships,
            EntityKind::Organization => FailurePolicy::Abort,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapersConfig {
    #[serde(default = "default_true")]
    pub workspaces: bool,
    #[serde(default = "default_true")]
    pub users: bool,
}

impl Default for ScrapersConfig {
    fn default() -> Self {
        Self {
            workspaces: true,
            users: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl ExporterConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: ExporterConfig = toml::from_str(&contents)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `TFE_*` overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("TFE_TOKEN").filter(|t| !t.is_empty()) {
            self.api.token = Some(token);
        }
        if let Some(address) = lookup("TFE_ADDRESS").filter(|a| !a.is_empty()) {
            self.api.address = address;
        }
        if let Some(orgs) = lookup("TFE_ORGANIZATIONS") {
            let orgs: Vec<String> = orgs
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            if !orgs.is_empty() {
                self.organizations = orgs;
            }
        }
        if let Some(listen) = lookup("TFE_EXPORTER_LISTEN").filter(|l| !l.is_empty()) {
            self.server.listen = listen;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api.token.as_deref().is_none_or(str::is_empty) {
            anyhow::bail!("an API token is required (set TFE_TOKEN or api.token)");
        }
        if !(1..=100).contains(&self.api.page_size) {
            anyhow::bail!("api.page_size must be between 1 and 100, got {}", self.api.page_size);
        }
        if self.organizations.iter().any(|o| o.trim().is_empty()) {
            anyhow::bail!("organization names must not be empty");
        }
        if self.collection.timeout_secs >= self.collection.interval_secs {
            tracing::warn!(
                "collection.timeout_secs ({}) >= interval_secs ({}); cycles may overlap ticks",
                self.collection.timeout_secs,
                self.collection.interval_secs
            );
        }
        Ok(())
    }
}
