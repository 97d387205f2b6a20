//! Shared application state for the relay server.
//!
//! [`AppState`] holds the broadcast hub plus the handful of settings the
//! handlers consult on every request.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use metrics_exporter_prometheus::PrometheusHandle;
use metrics_process::Collector;

use crate::config::{ConfigError, DashboardConfig};
use crate::hub::Hub;
use crate::origin::OriginPolicy;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
pub struct AppState {
    /// The broadcast hub all events flow through.
    pub hub: Arc<Hub>,
    /// Name reported by the health endpoint.
    pub service_name: String,
    /// Origin policy for CORS and viewer upgrades.
    pub origins: OriginPolicy,
    /// Reject incomplete failure injections instead of forwarding them.
    pub validate_failure_requests: bool,
    /// Prometheus handle rendered by `/metrics`, when a recorder is
    /// installed.
    pub metrics: Option<PrometheusHandle>,
    /// Process metrics sampled on every scrape.
    pub process: Collector,
    /// Wall-clock start time.
    pub started_at: SystemTime,
    started: Instant,
}

impl AppState {
    /// Build state from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the origin list is unusable.
    pub fn new(config: &DashboardConfig) -> Result<Self, ConfigError> {
        let origins = OriginPolicy::from_origins(&config.server.allowed_origins)?;
        Ok(Self::with_parts(
            Hub::new(config.hub.viewer_queue_capacity),
            config.server.service_name.clone(),
            origins,
            config.gateway.validate_failure_requests,
        ))
    }

    fn with_parts(
        hub: Hub,
        service_name: String,
        origins: OriginPolicy,
        validate_failure_requests: bool,
    ) -> Self {
        Self {
            hub: Arc::new(hub),
            service_name,
            origins,
            validate_failure_requests,
            metrics: None,
            process: Collector::default(),
            started_at: SystemTime::now(),
            started: Instant::now(),
        }
    }

    /// Attach the Prometheus handle rendered by `/metrics`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Replace the origin policy.
    #[must_use]
    pub fn with_origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = origins;
        self
    }

    /// Turn failure-request validation on or off.
    #[must_use]
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate_failure_requests = enabled;
        self
    }

    /// Monotonic start instant, for uptime.
    pub const fn started(&self) -> Instant {
        self.started
    }
}

impl Default for AppState {
    fn default() -> Self {
        let defaults = DashboardConfig::default();
        Self::with_parts(
            Hub::new(defaults.hub.viewer_queue_capacity),
            defaults.server.service_name,
            OriginPolicy::Any,
            defaults.gateway.validate_failure_requests,
        )
    }
}
