//! Normalization of raw workspace and run fields into label values and gauge
//! values. Every function is total: edge cases resolve to a sentinel.

use chrono::{DateTime, Utc};

use crate::models::Run;

/// Label value used when a field has no value.
pub const NA: &str = "na";

/// Tags joined with `;` in their given order, or `na` when there are none.
pub fn tags_to_label(tags: &[String]) -> String {
    if tags.is_empty() {
        return NA.to_string();
    }
    tags.join(";")
}

/// Value of the first tag starting with `prefix`, with the prefix removed.
pub fn tag_value(tags: &[String], prefix: &str) -> String {
    tags.iter()
        .find_map(|t| t.strip_prefix(prefix))
        .map(str::to_string)
        .unwrap_or_else(|| NA.to_string())
}

pub fn bool_to_gauge(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Applies `extract` to the run, or returns `sentinel` when there is none.
pub fn run_field<T>(run: Option<&Run>, extract: impl FnOnce(&Run) -> T, sentinel: T) -> T {
    match run {
        Some(r) => extract(r),
        None => sentinel,
    }
}

pub fn run_id(run: Option<&Run>) -> String {
    run_field(run, |r| r.id.clone(), NA.to_string())
}

pub fn run_status(run: Option<&Run>) -> String {
    run_field(run, |r| r.status.as_str().to_string(), NA.to_string())
}

pub fn run_created_at(run: Option<&Run>) -> String {
    run_field(run, |r| timestamp_label(&r.created_at), NA.to_string())
}

/// Monthly cost delta of the run with any `$` removed; unparsable text is 0.
pub fn cost_delta(run: Option<&Run>) -> f64 {
    run_field(
        run,
        |r| {
            r.delta_monthly_cost
                .as_deref()
                .map(|s| s.replace('$', ""))
                .and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .unwrap_or(0.0)
        },
        0.0,
    )
}

/// Whole days between `now` and the run's creation, truncated toward zero.
pub fn days_since_last_run(run: Option<&Run>, now: DateTime<Utc>) -> f64 {
    run_field(
        run,
        |r| (now - r.created_at).num_days() as f64,
        0.0,
    )
}

/// Average durations are reported in milliseconds.
pub fn duration_to_seconds(avg_ms: i64) -> f64 {
    avg_ms as f64 / 1000.0
}

pub fn bool_label(b: bool) -> String {
    b.to_string()
}

pub fn timestamp_label(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}
