use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use common::db::SharedRedis;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub redis: Arc<SharedRedis>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(redis: SharedRedis, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            redis: Arc::new(redis),
            metrics,
        }
    }
}
