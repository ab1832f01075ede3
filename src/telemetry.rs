//! Observability (C13).
//!
//! Request-scoped telemetry lives in a `tokio::task_local!` carrier so two
//! concurrent requests can never contaminate each other's counters:
//! `last_used_at` stays a process-wide map, while per-request call counts
//! live only in the task-local carrier and are read out once at the end of
//! the request to build the debug payload.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::models::ProviderStatus;
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrationCounters {
    pub called: u32,
    pub two_xx: u32,
    pub cache_hits: u32,
    pub last_latency_ms: Option<f64>,
    pub last_status: Option<ProviderStatus>,
}

/// Request-scoped telemetry bundle. Never stored in `AppState`.
#[derive(Debug, Default)]
pub struct RequestTelemetry {
    inner: Mutex<HashMap<String, IntegrationCounters>>,
}

impl RequestTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(
        &self,
        integration: &str,
        status: ProviderStatus,
        cache_hit: bool,
        latency_ms: f64,
    ) {
        let mut guard = self.inner.lock();
        let entry = guard.entry(integration.to_string()).or_default();
        entry.called += 1;
        if cache_hit {
            entry.cache_hits += 1;
        }
        if matches!(status, ProviderStatus::Success) {
            entry.two_xx += 1;
        }
        entry.last_latency_ms = Some(latency_ms);
        entry.last_status = Some(status);
    }

    pub fn snapshot(&self) -> HashMap<String, IntegrationCounters> {
        self.inner.lock().clone()
    }

    pub fn cache_hit_rate(&self) -> f64 {
        let guard = self.inner.lock();
        let (hits, total) = guard
            .values()
            .fold((0u32, 0u32), |(h, t), c| (h + c.cache_hits, t + c.called));
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

tokio::task_local! {
    static CURRENT: Arc<RequestTelemetry>;
}

/// Run `fut` with a fresh, request-scoped telemetry carrier installed.
pub async fn scope<F, T>(fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    CURRENT.scope(Arc::new(RequestTelemetry::new()), fut).await
}

/// Record a call against the telemetry carrier for the *current* request.
/// Panics (caught at the call boundary by construction: only ever called
/// from within `scope`) if no carrier is installed, since that would mean a
/// provider call happened outside any request — a programming error, not a
/// runtime condition to recover from.
pub fn record(integration: &str, status: ProviderStatus, cache_hit: bool, latency_ms: f64) {
    let _ = CURRENT.try_with(|t| t.record_call(integration, status, cache_hit, latency_ms));
    last_used_registry().touch_with_status(integration, status);
}

pub fn snapshot() -> HashMap<String, IntegrationCounters> {
    CURRENT
        .try_with(|t| t.snapshot())
        .unwrap_or_default()
}

pub fn current_cache_hit_rate() -> f64 {
    CURRENT.try_with(|t| t.cache_hit_rate()).unwrap_or(0.0)
}

/// Process-wide `last_used_at` + last-observed-status map, safe to share
/// across requests because it carries no per-request counts, only the
/// timestamp and outcome of the most recent call — what `/integrations`
/// reports, and what `probe()` reads to tell `Configured` (a key is present
/// but nothing has actually been observed yet) apart from `Validated` /
/// `Unavailable` / `Error` (a call has actually gone out and resolved).
#[derive(Debug, Default)]
pub struct LastUsedRegistry {
    map: DashMap<String, Instant>,
    status: DashMap<String, ProviderStatus>,
}

impl LastUsedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch(&self, integration: &str) {
        self.map.insert(integration.to_string(), Instant::now());
    }

    pub fn touch_with_status(&self, integration: &str, status: ProviderStatus) {
        self.touch(integration);
        self.status.insert(integration.to_string(), status);
    }

    pub fn get(&self, integration: &str) -> Option<Instant> {
        self.map.get(integration).map(|e| *e)
    }

    pub fn last_status(&self, integration: &str) -> Option<ProviderStatus> {
        self.status.get(integration).map(|e| *e)
    }
}

static LAST_USED: std::sync::OnceLock<LastUsedRegistry> = std::sync::OnceLock::new();

/// The process-wide registry every `record()` call touches. Exposed so the
/// integrations debug endpoint can read `last_used_at` without threading a
/// registry handle through `AppState`.
pub fn last_used_registry() -> &'static LastUsedRegistry {
    LAST_USED.get_or_init(LastUsedRegistry::new)
}

/// Query-string keys and value shapes that must never reach a log line or a
/// debug response body unredacted.
const SENSITIVE_QUERY_KEYS: &[&str] = &["apiKey", "api_key", "token", "secret", "authorization", "cookie"];

pub fn sanitize_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return redact_bearer_like(url);
    };
    let sanitized_query: Vec<String> = query
        .split('&')
        .map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            if SENSITIVE_QUERY_KEYS
                .iter()
                .any(|k| k.eq_ignore_ascii_case(key))
            {
                format!("{key}=[REDACTED]")
            } else {
                pair.to_string()
            }
        })
        .collect();
    redact_bearer_like(&format!("{base}?{}", sanitized_query.join("&")))
}

/// Replace bearer/JWT-shaped tokens embedded in free text (e.g. inside an
/// `Authorization: Bearer …` log field) with `[REDACTED]`.
pub fn redact_bearer_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let lower = text.to_lowercase();
    if let Some(idx) = lower.find("bearer ") {
        out.push_str(&text[..idx + "bearer ".len()]);
        out.push_str("[REDACTED]");
        let rest_start = text[idx..]
            .find(char::is_whitespace)
            .map(|p| idx + p)
            .unwrap_or(text.len());
        if rest_start < text.len() {
            out.push_str(&text[rest_start..]);
        }
        return out;
    }
    text.to_string()
}

pub fn sanitize_log_line(line: &str) -> String {
    sanitize_url(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_known_query_keys() {
        let url = "https://api.example.com/odds?api_key=SUPERSECRET&sport=nba";
        let sanitized = sanitize_url(url);
        assert!(!sanitized.contains("SUPERSECRET"));
        assert!(sanitized.contains("api_key=[REDACTED]"));
        assert!(sanitized.contains("sport=nba"));
    }

    #[test]
    fn redacts_bearer_tokens() {
        let line = "calling provider with Authorization: Bearer abc.def.ghi";
        let sanitized = redact_bearer_like(line);
        assert!(!sanitized.contains("abc.def.ghi"));
        assert!(sanitized.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn request_telemetry_is_scoped_and_non_contaminating() {
        let a = scope(async {
            record("odds", ProviderStatus::Success, false, 12.0);
            record("odds", ProviderStatus::Success, true, 1.0);
            snapshot().get("odds").cloned().unwrap().called
        });
        let b = scope(async {
            // A concurrent request that makes no calls must see zero, not
            // the other request's count.
            snapshot().get("odds").map(|c| c.called).unwrap_or(0)
        });
        let (count_a, count_b) = tokio::join!(a, b);
        assert_eq!(count_a, 2);
        assert_eq!(count_b, 0);
    }
}
