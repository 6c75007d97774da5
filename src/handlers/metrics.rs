use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};

use crate::AppState;

/// Serves the latest collected samples in the Prometheus text format.
pub async fn metrics(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let body = state.registry.render().map_err(|e| {
        tracing::error!("metrics encoding failed: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricDesc, Sample};
    use crate::registry::Registry;
    use axum::body::to_bytes;
    use std::sync::Arc;
    use std::time::Duration;

    static DESC: MetricDesc = MetricDesc {
        name: "tf_workspaces_resource_count",
        help: "Count of resources in the workspace.",
        labels: &["ws_id"],
    };

    static METRICS: [&MetricDesc; 1] = [&DESC];

    #[tokio::test]
    async fn test_metrics_renders_registry() {
        let registry = Arc::new(Registry::new([("workspaces", &METRICS[..])]).unwrap());
        let sample = Sample::new(&DESC, 42.0, vec!["ws-1".to_string()]).unwrap();
        registry.record_success("workspaces", &[sample], Duration::from_millis(250));
        let state = AppState { registry };

        let resp = metrics(State(state)).await.unwrap().into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], prometheus::TEXT_FORMAT);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("# TYPE tf_workspaces_resource_count gauge"));
        assert!(text.contains("tf_workspaces_resource_count{ws_id=\"ws-1\"} 42"));
        assert!(text.contains("tf_scrape_collector_duration_seconds{collector=\"workspaces\"} 0.25"));
    }
}
