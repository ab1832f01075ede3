//! Search-trend velocity ("noosphere"), sourced from a SERP-style provider.
//! Also backs the SERP post-base boost family, so its quota is shared and
//! enforced once here rather than per-boost.

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendRecord {
    pub velocity: Option<f64>,
}

pub struct TrendsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    invoker: Invoker<String, TrendRecord>,
}

impl TrendsClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("SERP_API_BASE_URL")
                .unwrap_or_else(|_| "https://serpapi.com".to_string()),
            api_key: std::env::var("SERP_API_KEY")
                .or_else(|_| std::env::var("SERPAPI_KEY"))
                .ok(),
            invoker: Invoker::new(ProviderConfig {
                name: "trends",
                timeout,
                ttl: Duration::from_secs(30 * 60),
                daily_quota: Some(100),
                monthly_quota: Some(2500),
                shadow: false,
            }),
        }
    }

    pub async fn get_trend(&self, query: &str) -> (TrendRecord, ProviderStatus) {
        if self.api_key.is_none() {
            return (TrendRecord::default(), ProviderStatus::NoData);
        }
        let key = query.to_lowercase();
        let outcome = self
            .invoker
            .call(key, || {
                let http = self.http.clone();
                let url = format!("{}/search", self.base_url);
                let api_key = self.api_key.clone().unwrap_or_default();
                let query = query.to_string();
                async move {
                    let resp = http
                        .get(&url)
                        .query(&[("api_key", api_key.as_str()), ("q", query.as_str())])
                        .send()
                        .await?;
                    let record: TrendRecord = resp.json().await.unwrap_or_default();
                    Ok(record)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for TrendsClient {
    fn default() -> Self {
        Self::new()
    }
}
