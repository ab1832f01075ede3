//! NOAA SWPC geomagnetic Kp-index. Public, no-auth API feeding the esoteric
//! engine's GLITCH aggregate.

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KpIndex {
    pub value: Option<f64>,
}

pub struct SpaceWeatherClient {
    http: reqwest::Client,
    base_url: String,
    invoker: Invoker<(), KpIndex>,
}

impl SpaceWeatherClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("NOAA_SWPC_BASE_URL")
                .unwrap_or_else(|_| "https://services.swpc.noaa.gov".to_string()),
            invoker: Invoker::new(ProviderConfig {
                name: "space_weather",
                timeout,
                ttl: Duration::from_secs(30 * 60),
                daily_quota: None,
                monthly_quota: None,
                shadow: false,
            }),
        }
    }

    pub async fn get_kp_index(&self) -> (KpIndex, ProviderStatus) {
        let outcome = self
            .invoker
            .call((), || {
                let http = self.http.clone();
                let url = format!(
                    "{}/products/noaa-planetary-k-index.json",
                    self.base_url
                );
                async move {
                    let resp = http.get(&url).send().await?;
                    let rows: Vec<Vec<serde_json::Value>> = resp.json().await.unwrap_or_default();
                    let latest = rows
                        .last()
                        .and_then(|row| row.get(1))
                        .and_then(|v| v.as_str())
                        .and_then(|s| s.parse::<f64>().ok());
                    Ok(KpIndex { value: latest })
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for SpaceWeatherClient {
    fn default() -> Self {
        Self::new()
    }
}
