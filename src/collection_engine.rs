use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinHandle, JoinSet};

use crate::context::ScrapeContext;
use crate::error::{CollectError, Result};
use crate::models::{EntityKind, PageRequest, Sample};
use crate::registry::Registry;
use crate::scrapers::{ScrapeConfig, Scraper};
use crate::sink::{self, SampleSink};
use crate::tfe::TfeApi;

/// Runs every scraper once per interval and publishes the results.
pub struct CollectionEngine {
    scrapers: Vec<Arc<dyn Scraper>>,
    config: ScrapeConfig,
    registry: Arc<Registry>,
    timeout: Duration,
    sink_capacity: usize,
}

impl CollectionEngine {
    pub fn new(
        scrapers: Vec<Arc<dyn Scraper>>,
        config: ScrapeConfig,
        registry: Arc<Registry>,
        timeout: Duration,
        sink_capacity: usize,
    ) -> Self {
        Self {
            scrapers,
            config,
            registry,
            timeout,
            sink_capacity: sink_capacity.max(1),
        }
    }

    /// One collection cycle. Every scraper runs concurrently under its own
    /// deadline; returns whether all of them succeeded.
    pub async fn run_cycle(&self, shutdown: &ScrapeContext) -> bool {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;

        let mut tasks = JoinSet::new();
        for scraper in &self.scrapers {
            let scraper = scraper.clone();
            let config = self.config.clone();
            let ctx = shutdown.child_with_deadline(deadline);
            let capacity = self.sink_capacity;
            tasks.spawn(async move {
                let name = scraper.name();
                let t0 = Instant::now();
                let res = AssertUnwindSafe(run_scraper(scraper.as_ref(), &ctx, &config, capacity))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(CollectError::WorkerPanicked(panic_message(&*panic))));
                (name, res, t0.elapsed())
            });
        }

        let mut all_ok = true;
        let mut samples = 0usize;
        while let Some(joined) = tasks.join_next().await {
            let (name, res, elapsed) = match joined {
                Ok(out) => out,
                Err(e) => {
                    tracing::error!("collection engine: scraper task failed: {e}");
                    all_ok = false;
                    continue;
                }
            };
            match res {
                Ok(out) => {
                    tracing::debug!(
                        "collection engine: {name} produced {} samples in {:.2}s",
                        out.len(),
                        elapsed.as_secs_f64()
                    );
                    samples += out.len();
                    self.registry.record_success(name, &out, elapsed);
                }
                Err(e) => {
                    all_ok = false;
                    tracing::warn!("collection engine: {name} failed, keeping previous samples: {e}");
                    self.registry.record_failure(name, elapsed);
                }
            }
        }

        self.registry.set_up(all_ok);
        tracing::info!(
            "collection engine: cycle finished in {:.2}s, {samples} samples, {} series published, ok={all_ok}",
            started.elapsed().as_secs_f64(),
            self.registry.sample_count()
        );
        all_ok
    }
}

/// Runs one scraper against a fresh sink and returns everything it emitted.
async fn run_scraper(
    scraper: &dyn Scraper,
    ctx: &ScrapeContext,
    config: &ScrapeConfig,
    capacity: usize,
) -> Result<Vec<Sample>> {
    let (sink, rx) = SampleSink::channel(capacity);
    let consumer = tokio::spawn(sink::drain(rx));
    let res = scraper.scrape(ctx, config, &sink).await;
    drop(sink);
    let samples = consumer
        .await
        .map_err(|e| CollectError::WorkerPanicked(e.to_string()))?;
    res.map(|()| samples)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "scraper panicked".to_string()
    }
}

/// Spawns the periodic collection loop. It stops when `shutdown` is cancelled;
/// an in-flight cycle observes the same signal.
pub fn spawn_collection_engine(
    engine: Arc<CollectionEngine>,
    interval: Duration,
    shutdown: ScrapeContext,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            engine.run_cycle(&shutdown).await;
        }
        tracing::info!("collection engine stopped");
    })
}

/// Lists every organization visible to the token.
pub async fn discover_organizations(api: &dyn TfeApi, page_size: u32) -> Result<Vec<String>> {
    let mut organizations = Vec::new();
    let mut number = 1;
    loop {
        let page = api
            .list_organizations(PageRequest::new(number, page_size))
            .await
            .map_err(|source| CollectError::RemoteList {
                kind: EntityKind::Organization,
                organization: String::new(),
                page: number,
                source,
            })?;
        organizations.extend(page.items);
        if number >= page.pagination.total_pages {
            break;
        }
        number += 1;
    }
    Ok(organizations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyConfig, ScrapersConfig};
    use crate::models::MetricDesc;
    use crate::registry::gauge_value;
    use crate::scrapers::default_scrapers;
    use crate::testing::{Failure, FakeTfe, member, workspace};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static FLAKY: MetricDesc = MetricDesc {
        name: "tf_flaky",
        help: "test",
        labels: &["run"],
    };

    static FLAKY_METRICS: [&MetricDesc; 1] = [&FLAKY];

    /// Succeeds on the first run, fails afterwards.
    struct Flaky {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Scraper for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn help(&self) -> &'static str {
            "test"
        }
        fn source_api_version(&self) -> &'static str {
            "v2"
        }
        fn metrics(&self) -> &'static [&'static MetricDesc] {
            &FLAKY_METRICS
        }
        async fn scrape(
            &self,
            ctx: &ScrapeContext,
            _config: &ScrapeConfig,
            sink: &SampleSink,
        ) -> Result<()> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            if run > 0 {
                return Err(CollectError::SinkClosed);
            }
            sink.send(ctx, Sample::new(&FLAKY, 1.0, vec![run.to_string()])?)
                .await
        }
    }

    /// Succeeds on the first run, panics afterwards.
    struct Panicky {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl Scraper for Panicky {
        fn name(&self) -> &'static str {
            "panicky"
        }
        fn help(&self) -> &'static str {
            "test"
        }
        fn source_api_version(&self) -> &'static str {
            "v2"
        }
        fn metrics(&self) -> &'static [&'static MetricDesc] {
            &PANICKY_METRICS
        }
        async fn scrape(
            &self,
            ctx: &ScrapeContext,
            _config: &ScrapeConfig,
            sink: &SampleSink,
        ) -> Result<()> {
            if self.runs.fetch_add(1, Ordering::SeqCst) > 0 {
                panic!("lost track of a page");
            }
            sink.send(ctx, Sample::new(&PANICKY, 1.0, vec![])?).await
        }
    }

    static PANICKY: MetricDesc = MetricDesc {
        name: "tf_panicky",
        help: "test",
        labels: &[],
    };

    static PANICKY_METRICS: [&MetricDesc; 1] = [&PANICKY];

    /// Never finishes on its own.
    struct Stuck;

    #[async_trait]
    impl Scraper for Stuck {
        fn name(&self) -> &'static str {
            "stuck"
        }
        fn help(&self) -> &'static str {
            "test"
        }
        fn source_api_version(&self) -> &'static str {
            "v2"
        }
        fn metrics(&self) -> &'static [&'static MetricDesc] {
            &[]
        }
        async fn scrape(
            &self,
            ctx: &ScrapeContext,
            _config: &ScrapeConfig,
            _sink: &SampleSink,
        ) -> Result<()> {
            ctx.guard(std::future::pending::<()>()).await
        }
    }

    fn scrape_config(api: Arc<FakeTfe>, orgs: &[&str]) -> ScrapeConfig {
        ScrapeConfig {
            client: api,
            organizations: orgs.iter().map(|s| s.to_string()).collect(),
            page_size: 10,
            policy: PolicyConfig::default(),
        }
    }

    fn success(registry: &Registry, collector: &str) -> Option<f64> {
        gauge_value(registry, "tf_scrape_collector_success", &[("collector", collector)])
    }

    fn engine(
        scrapers: Vec<Arc<dyn Scraper>>,
        config: ScrapeConfig,
        timeout: Duration,
    ) -> (CollectionEngine, Arc<Registry>) {
        let registry = Arc::new(Registry::for_scrapers(&scrapers).unwrap());
        let engine = CollectionEngine::new(scrapers, config, registry.clone(), timeout, 8);
        (engine, registry)
    }

    #[tokio::test]
    async fn test_cycle_publishes_all_scrapers() {
        let api = Arc::new(
            FakeTfe::new()
                .with_workspaces("acme", vec![workspace("acme", "ws-1"), workspace("acme", "ws-2")])
                .with_memberships("acme", vec![member("1", "alice")]),
        );
        let (engine, registry) = engine(
            default_scrapers(&ScrapersConfig::default()),
            scrape_config(api, &["acme"]),
            Duration::from_secs(5),
        );

        assert!(engine.run_cycle(&ScrapeContext::new()).await);

        // 2 workspaces x 10 metrics + 1 user
        assert_eq!(registry.sample_count(), 21);
        assert_eq!(
            gauge_value(
                &registry,
                "tf_users_info",
                &[("id", "user-1"), ("username", "alice"), ("email", "alice@example.com")]
            ),
            Some(1.0)
        );
        assert_eq!(success(&registry, "workspaces"), Some(1.0));
        assert_eq!(success(&registry, "users"), Some(1.0));
        assert_eq!(gauge_value(&registry, "tf_up", &[]), Some(1.0));
        assert!(registry.render().unwrap().contains("tf_workspaces_info{"));
    }

    #[tokio::test]
    async fn test_failed_scraper_keeps_stale_samples() {
        let api = Arc::new(FakeTfe::new());
        let flaky: Arc<dyn Scraper> = Arc::new(Flaky {
            runs: AtomicUsize::new(0),
        });
        let (engine, registry) = engine(vec![flaky], scrape_config(api, &[]), Duration::from_secs(5));
        let ctx = ScrapeContext::new();

        assert!(engine.run_cycle(&ctx).await);
        assert!(!engine.run_cycle(&ctx).await);

        assert_eq!(gauge_value(&registry, "tf_flaky", &[("run", "0")]), Some(1.0));
        assert_eq!(success(&registry, "flaky"), Some(0.0));
        assert_eq!(gauge_value(&registry, "tf_up", &[]), Some(0.0));
    }

    #[tokio::test]
    async fn test_panicking_scraper_is_reported_as_failed() {
        let api = Arc::new(FakeTfe::new());
        let panicky: Arc<dyn Scraper> = Arc::new(Panicky {
            runs: AtomicUsize::new(0),
        });
        let (engine, registry) = engine(vec![panicky], scrape_config(api, &[]), Duration::from_secs(5));
        let ctx = ScrapeContext::new();

        assert!(engine.run_cycle(&ctx).await);
        assert_eq!(success(&registry, "panicky"), Some(1.0));

        assert!(!engine.run_cycle(&ctx).await);
        assert_eq!(success(&registry, "panicky"), Some(0.0));
        assert_eq!(gauge_value(&registry, "tf_up", &[]), Some(0.0));
        assert_eq!(gauge_value(&registry, "tf_panicky", &[]), Some(1.0));
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"boom".to_string()), "boom");
        assert_eq!(panic_message(&7u8), "scraper panicked");
    }

    #[tokio::test]
    async fn test_one_scraper_failure_does_not_affect_another() {
        let api = Arc::new(
            FakeTfe::new()
                .with_workspaces("acme", vec![workspace("acme", "ws-1")])
                .fail(Failure::new(EntityKind::Membership, "acme", 1)),
        );
        let (engine, registry) = engine(
            default_scrapers(&ScrapersConfig::default()),
            scrape_config(api, &["acme"]),
            Duration::from_secs(5),
        );

        assert!(!engine.run_cycle(&ScrapeContext::new()).await);
        assert_eq!(success(&registry, "workspaces"), Some(1.0));
        assert_eq!(success(&registry, "users"), Some(0.0));
        assert_eq!(registry.sample_count(), 10);
    }

    #[tokio::test]
    async fn test_scraper_deadline() {
        let api = Arc::new(FakeTfe::new());
        let (engine, registry) = engine(
            vec![Arc::new(Stuck)],
            scrape_config(api, &[]),
            Duration::from_millis(50),
        );
        let ok = tokio::time::timeout(Duration::from_secs(2), engine.run_cycle(&ScrapeContext::new()))
            .await
            .expect("deadline should end the cycle");
        assert!(!ok);
        assert_eq!(success(&registry, "stuck"), Some(0.0));
    }

    #[tokio::test]
    async fn test_engine_stops_on_shutdown() {
        let api = Arc::new(FakeTfe::new());
        let (engine, _registry) = engine(
            vec![Arc::new(Stuck)],
            scrape_config(api, &[]),
            Duration::from_secs(60),
        );
        let shutdown = ScrapeContext::new();
        let handle = spawn_collection_engine(Arc::new(engine), Duration::from_secs(60), shutdown.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("engine should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_discover_organizations_walks_pages() {
        let api = FakeTfe::new().with_organizations(&["a", "b", "c", "d", "e"]);
        let orgs = discover_organizations(&api, 2).await.unwrap();
        assert_eq!(orgs, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(api.pages_requested(EntityKind::Organization, ""), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_discover_organizations_error() {
        let api = FakeTfe::new()
            .with_organizations(&["a", "b", "c"])
            .fail(Failure::new(EntityKind::Organization, "", 2));
        let err = discover_organizations(&api, 2).await.unwrap_err();
        assert!(matches!(
            err,
            CollectError::RemoteList {
                kind: EntityKind::Organization,
                page: 2,
                ..
            }
        ));
    }
}
