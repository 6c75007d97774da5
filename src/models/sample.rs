use crate::error::{CollectError, Result};

/// Declared schema of an exposed gauge.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// One gauge value with its label values in declared order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    desc: &'static MetricDesc,
    value: f64,
    labels: Vec<String>,
}

impl Sample {
    /// Builds a sample, rejecting label sequences that don't match the schema.
    pub fn new(desc: &'static MetricDesc, value: f64, labels: Vec<String>) -> Result<Self> {
        if labels.len() != desc.labels.len() {
            return Err(CollectError::InvalidSample {
                metric: desc.name,
                expected: desc.labels.len(),
                got: labels.len(),
            });
        }
        Ok(Self {
            desc,
            value,
            labels,
        })
    }

    pub fn desc(&self) -> &'static MetricDesc {
        self.desc
    }

    pub fn metric_name(&self) -> &'static str {
        self.desc.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Label values in the order the descriptor declares them.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label value by name, mostly useful in tests and logs.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .labels
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }
}
