//! Cross-origin policy shared by the HTTP API and the viewer socket.
//!
//! Browsers enforce CORS for `fetch` calls, but not for `WebSocket`
//! upgrades, so the same policy is also checked by hand in the upgrade
//! handler.

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ConfigError;

/// Which origins may reach the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OriginPolicy {
    /// Every origin is allowed.
    #[default]
    Any,
    /// Only the listed origins are allowed. An empty list blocks all
    /// browser origins.
    List(Vec<HeaderValue>),
}

impl OriginPolicy {
    /// Build a policy from configured origin strings. A `"*"` entry
    /// anywhere in the list allows everything.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an origin is not a valid header
    /// value.
    pub fn from_origins(origins: &[String]) -> Result<Self, ConfigError> {
        if origins.iter().any(|o| o == "*") {
            return Ok(Self::Any);
        }
        let values = origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim_end_matches('/'))
                    .map_err(|e| ConfigError::Invalid(format!("allowed origin {origin:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::List(values))
    }

    /// Whether a request carrying this `Origin` header may proceed.
    ///
    /// Requests without an `Origin` header come from non-browser clients
    /// and are always allowed.
    pub fn allows(&self, origin: Option<&HeaderValue>) -> bool {
        match (self, origin) {
            (Self::Any, _) | (Self::List(_), None) => true,
            (Self::List(allowed), Some(origin)) => allowed.iter().any(|a| a == origin),
        }
    }

    /// CORS middleware matching this policy.
    pub fn cors_layer(&self) -> CorsLayer {
        let origin = match self {
            Self::Any => AllowOrigin::from(Any),
            Self::List(values) => AllowOrigin::list(values.iter().cloned()),
        };
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
