//! Astronomical data (moon phase), feeding the esoteric engine. Any
//! calculation spanning a reference epoch must use a zone-aware reference —
//! `synodic_age_days` below takes a `DateTime<Utc>` and never a naive one.

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoonPhase {
    /// 0.0 = new moon, 0.5 = full moon, wrapping at 1.0.
    pub phase_fraction: Option<f64>,
    pub illumination_pct: Option<f64>,
}

/// Known new moon reference instant (2000-01-06 18:14 UTC) and the mean
/// synodic month length, used for a deterministic fallback when the
/// external API is unavailable.
const REFERENCE_NEW_MOON_UNIX: i64 = 947182440;
const SYNODIC_MONTH_DAYS: f64 = 29.530588853;

pub fn deterministic_phase_fraction(ts: DateTime<Utc>) -> f64 {
    let elapsed_days = (ts.timestamp() - REFERENCE_NEW_MOON_UNIX) as f64 / 86400.0;
    let cycles = elapsed_days / SYNODIC_MONTH_DAYS;
    (cycles - cycles.floor()).clamp(0.0, 1.0)
}

pub struct AstronomyClient {
    http: reqwest::Client,
    base_url: String,
    configured: bool,
    invoker: Invoker<i64, MoonPhase>,
}

impl AstronomyClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("ASTRONOMY_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.astronomyapi.com".to_string()),
            configured: std::env::var("ASTRONOMY_API_ID").is_ok()
                && std::env::var("ASTRONOMY_API_SECRET").is_ok(),
            invoker: Invoker::new(ProviderConfig {
                name: "astronomy",
                timeout,
                ttl: Duration::from_secs(6 * 60 * 60),
                daily_quota: Some(100),
                monthly_quota: None,
                shadow: false,
            }),
        }
    }

    pub async fn get_moon_phase(&self, date: DateTime<Utc>) -> (MoonPhase, ProviderStatus) {
        if !self.configured {
            // Fall back to a deterministic zone-aware computation rather
            // than returning empty: moon phase is pure astronomical math,
            // not truly "missing data" just because no API key is set.
            return (
                MoonPhase {
                    phase_fraction: Some(deterministic_phase_fraction(date)),
                    illumination_pct: None,
                },
                ProviderStatus::Success,
            );
        }
        let key = date.timestamp() / 86400;
        let outcome = self
            .invoker
            .call(key, || {
                let http = self.http.clone();
                let url = format!("{}/api/v2/studio/moon-phase", self.base_url);
                async move {
                    let resp = http.get(&url).send().await?;
                    let record: MoonPhase = resp.json().await.unwrap_or_default();
                    Ok(record)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for AstronomyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn phase_fraction_at_known_new_moon_is_near_zero() {
        let ts = Utc.timestamp_opt(REFERENCE_NEW_MOON_UNIX, 0).unwrap();
        let phase = deterministic_phase_fraction(ts);
        assert!(phase < 0.01 || phase > 0.99);
    }
}
