//! Officials/venue data, feeding the context modifier (officials tendency,
//! venue surface/altitude).

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfficialsRecord {
    pub crew_name: Option<String>,
    pub home_cover_rate: Option<f64>,
    pub avg_total_points: Option<f64>,
    pub venue_altitude_ft: Option<f64>,
    pub venue_surface: Option<String>,
}

pub struct OfficialsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    invoker: Invoker<String, OfficialsRecord>,
}

impl OfficialsClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("OFFICIALS_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.officials.example".to_string()),
            api_key: std::env::var("OFFICIALS_API_KEY").ok(),
            invoker: Invoker::new(ProviderConfig {
                name: "officials",
                timeout,
                ttl: Duration::from_secs(60 * 60),
                daily_quota: Some(200),
                monthly_quota: None,
                shadow: false,
            }),
        }
    }

    pub async fn get_event_officials(&self, event_id: &str) -> (OfficialsRecord, ProviderStatus) {
        if self.api_key.is_none() {
            return (OfficialsRecord::default(), ProviderStatus::NoData);
        }
        let outcome = self
            .invoker
            .call(event_id.to_string(), || {
                let http = self.http.clone();
                let url = format!("{}/events/{}/officials", self.base_url, event_id);
                let api_key = self.api_key.clone().unwrap_or_default();
                async move {
                    let resp = http.get(&url).query(&[("apiKey", api_key)]).send().await?;
                    let record: OfficialsRecord = resp.json().await.unwrap_or_default();
                    Ok(record)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for OfficialsClient {
    fn default() -> Self {
        Self::new()
    }
}
