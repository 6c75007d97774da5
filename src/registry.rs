use prometheus::{Gauge, GaugeVec, Opts, TextEncoder};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::models::{MetricDesc, Sample};
use crate::scrapers::Scraper;

/// Latest samples of every collector, exposed through a prometheus registry.
/// A failed run leaves the collector's gauges untouched; only its status
/// gauges change.
pub struct Registry {
    registry: prometheus::Registry,
    /// Metric name -> gauge family.
    gauges: HashMap<&'static str, GaugeVec>,
    /// Collector name -> names of the metrics it owns.
    owned: HashMap<&'static str, Vec<&'static str>>,
    up: Gauge,
    collector_success: GaugeVec,
    collector_duration: GaugeVec,
    /// Series currently published per collector. Held while gauges are
    /// swapped or gathered so a render never sees a half-replaced snapshot.
    series: Mutex<BTreeMap<&'static str, usize>>,
}

impl Registry {
    /// Registers every metric the given collectors declare.
    pub fn new(
        collectors: impl IntoIterator<Item = (&'static str, &'static [&'static MetricDesc])>,
    ) -> prometheus::Result<Self> {
        let registry = prometheus::Registry::new();

        let mut gauges = HashMap::new();
        let mut owned: HashMap<&'static str, Vec<&'static str>> = HashMap::new();
        for (collector, metrics) in collectors {
            for desc in metrics {
                let vec = GaugeVec::new(Opts::new(desc.name, desc.help), desc.labels)?;
                registry.register(Box::new(vec.clone()))?;
                gauges.insert(desc.name, vec);
                owned.entry(collector).or_default().push(desc.name);
            }
        }

        let up = Gauge::new(
            "tf_up",
            "Whether every collector succeeded in the last collection cycle.",
        )?;
        let collector_success = GaugeVec::new(
            Opts::new(
                "tf_scrape_collector_success",
                "Whether the collector succeeded in the last collection cycle.",
            ),
            &["collector"],
        )?;
        let collector_duration = GaugeVec::new(
            Opts::new(
                "tf_scrape_collector_duration_seconds",
                "Duration of the collector's last run.",
            ),
            &["collector"],
        )?;
        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(collector_success.clone()))?;
        registry.register(Box::new(collector_duration.clone()))?;

        Ok(Self {
            registry,
            gauges,
            owned,
            up,
            collector_success,
            collector_duration,
            series: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn for_scrapers(scrapers: &[Arc<dyn Scraper>]) -> prometheus::Result<Self> {
        Self::new(scrapers.iter().map(|s| (s.name(), s.metrics())))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<&'static str, usize>> {
        self.series.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the collector's published samples.
    pub fn record_success(&self, collector: &'static str, samples: &[Sample], duration: Duration) {
        let mut series = self.lock();
        for name in self.owned.get(collector).into_iter().flatten() {
            if let Some(vec) = self.gauges.get(name) {
                vec.reset();
            }
        }

        let mut published = 0;
        for sample in samples {
            let Some(vec) = self.gauges.get(sample.metric_name()) else {
                tracing::warn!(
                    "registry: {collector} emitted undeclared metric {}",
                    sample.metric_name()
                );
                continue;
            };
            let labels: Vec<&str> = sample.labels().iter().map(String::as_str).collect();
            match vec.get_metric_with_label_values(&labels) {
                Ok(gauge) => {
                    gauge.set(sample.value());
                    published += 1;
                }
                Err(e) => tracing::warn!("registry: dropping {}: {e}", sample.metric_name()),
            }
        }
        series.insert(collector, published);

        self.collector_success.with_label_values(&[collector]).set(1.0);
        self.collector_duration
            .with_label_values(&[collector])
            .set(duration.as_secs_f64());
    }

    /// Marks the collector as failed and keeps whatever it published before.
    pub fn record_failure(&self, collector: &'static str, duration: Duration) {
        let _series = self.lock();
        self.collector_success.with_label_values(&[collector]).set(0.0);
        self.collector_duration
            .with_label_values(&[collector])
            .set(duration.as_secs_f64());
    }

    pub fn set_up(&self, up: bool) {
        self.up.set(if up { 1.0 } else { 0.0 });
    }

    /// Number of series currently published by collectors.
    pub fn sample_count(&self) -> usize {
        self.lock().values().sum()
    }

    /// Encodes everything in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let families = {
            let _series = self.lock();
            self.registry.gather()
        };
        let mut out = String::new();
        TextEncoder::new().encode_utf8(&families, &mut out)?;
        Ok(out)
    }

    #[cfg(test)]
    pub(crate) fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}

/// Value of one gathered gauge series, if it exists.
#[cfg(test)]
pub(crate) fn gauge_value(registry: &Registry, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    registry
        .gather()
        .iter()
        .filter(|mf| mf.get_name() == name)
        .flat_map(|mf| mf.get_metric().iter())
        .find(|m| {
            m.get_label().len() == labels.len()
                && labels.iter().all(|(k, v)| {
                    m.get_label()
                        .iter()
                        .any(|lp| lp.get_name() == *k && lp.get_value() == *v)
                })
        })
        .map(|m| m.get_gauge().get_value())
}
