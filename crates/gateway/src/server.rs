//! HTTP stack assembly: router plus the CORS, concurrency and rate-limit
//! layers configured under `[server]`.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use wg_domain::config::CorsConfig;

use crate::api;
use crate::state::AppState;

/// Build the fully layered application.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// per-IP rate limiter keys on the peer address.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let server = &state.config.server;

    let max_concurrent = server.max_concurrent_requests;
    tracing::info!(max_concurrent, "concurrency limit set");

    let router = api::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&server.cors))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_concurrent));

    // ── Rate-limit layer (per-IP token bucket via governor) ─────────
    let router = match &server.rate_limit {
        Some(rl) => {
            use tower_governor::governor::GovernorConfigBuilder;
            use tower_governor::GovernorLayer;

            let gov_config = GovernorConfigBuilder::default()
                .per_second(rl.requests_per_second)
                .burst_size(rl.burst_size)
                .finish()
                .ok_or_else(|| {
                    anyhow::anyhow!("rate_limit: requests_per_second and burst_size must be > 0")
                })?;
            tracing::info!(
                requests_per_second = rl.requests_per_second,
                burst_size = rl.burst_size,
                "per-IP rate limiting enabled"
            );
            router.layer(GovernorLayer {
                config: Arc::new(gov_config),
            })
        }
        None => {
            tracing::info!("per-IP rate limiting disabled (no [server.rate_limit] in config)");
            router
        }
    };

    Ok(router.with_state(state))
}

/// Build a [`CorsLayer`] from the configured allowed origins.
///
/// Entries ending in `:*` accept any numeric port on that host.  A lone
/// `"*"` allows every origin without credentials.
pub fn build_cors_layer(cors: &CorsConfig) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let headers = [header::CONTENT_TYPE, header::AUTHORIZATION];

    if cors.allowed_origins.len() == 1 && cors.allowed_origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\"; all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let patterns = OriginPatterns::parse(&cors.allowed_origins);
    let allow_origin = if patterns.port_wildcards.is_empty() {
        AllowOrigin::list(patterns.exact)
    } else {
        AllowOrigin::predicate(move |origin, _| patterns.allows(origin))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}

#[derive(Debug, Default)]
struct OriginPatterns {
    exact: Vec<HeaderValue>,
    /// `scheme://host:` prefixes; the remainder must be a port.
    port_wildcards: Vec<String>,
}

impl OriginPatterns {
    fn parse(origins: &[String]) -> Self {
        let mut patterns = Self::default();
        for origin in origins {
            if let Some(prefix) = origin.strip_suffix('*').filter(|p| p.ends_with(':')) {
                patterns.port_wildcards.push(prefix.to_owned());
            } else if let Ok(hv) = origin.parse::<HeaderValue>() {
                patterns.exact.push(hv);
            } else {
                tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
            }
        }
        patterns
    }

    fn allows(&self, origin: &HeaderValue) -> bool {
        if self.exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
            return true;
        }
        let Ok(origin) = origin.to_str() else {
            return false;
        };
        self.port_wildcards.iter().any(|prefix| {
            origin
                .strip_prefix(prefix.as_str())
                .is_some_and(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(origins: &[&str]) -> OriginPatterns {
        let owned: Vec<String> = origins.iter().map(|s| s.to_string()).collect();
        OriginPatterns::parse(&owned)
    }

    #[test]
    fn port_wildcard_accepts_numeric_ports_only() {
        let p = patterns(&["http://localhost:*"]);
        assert!(p.allows(&HeaderValue::from_static("http://localhost:5173")));
        assert!(!p.allows(&HeaderValue::from_static("http://localhost:")));
        assert!(!p.allows(&HeaderValue::from_static("http://localhost:80.evil.com")));
        assert!(!p.allows(&HeaderValue::from_static("https://localhost:5173")));
    }

    #[test]
    fn exact_origins_match_verbatim() {
        let p = patterns(&["https://panel.example.com", "http://127.0.0.1:*"]);
        assert!(p.allows(&HeaderValue::from_static("https://panel.example.com")));
        assert!(p.allows(&HeaderValue::from_static("http://127.0.0.1:3000")));
        assert!(!p.allows(&HeaderValue::from_static("https://other.example.com")));
    }

    #[test]
    fn zero_rate_limit_is_a_startup_error() {
        let mut config = wg_domain::config::Config::default();
        config.server.rate_limit = Some(wg_domain::config::RateLimitConfig {
            requests_per_second: 0,
            burst_size: 0,
        });
        let driver = Arc::new(wg_sessions::testing::ScriptedDriver::new());
        let state = crate::bootstrap::app_state_with_driver(Arc::new(config), driver, None);
        assert!(app(state).is_err());
    }
}
