//! News headline sentiment, feeding the Research engine's ESPN
//! cross-validation / situational-spot signals.

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsRecord {
    pub headline_count: usize,
    pub sentiment: Option<f64>, // -1.0 (negative) .. 1.0 (positive)
}

pub struct NewsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    invoker: Invoker<String, NewsRecord>,
}

impl NewsClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("NEWS_API_BASE_URL")
                .unwrap_or_else(|_| "https://newsapi.org".to_string()),
            api_key: std::env::var("NEWS_API_KEY").ok(),
            invoker: Invoker::new(ProviderConfig {
                name: "news",
                timeout,
                ttl: Duration::from_secs(15 * 60),
                daily_quota: Some(100),
                monthly_quota: None,
                shadow: false,
            }),
        }
    }

    pub async fn get_news(&self, query: &str) -> (NewsRecord, ProviderStatus) {
        if self.api_key.is_none() {
            return (NewsRecord::default(), ProviderStatus::NoData);
        }
        let key = query.to_lowercase();
        let outcome = self
            .invoker
            .call(key, || {
                let http = self.http.clone();
                let url = format!("{}/v2/everything", self.base_url);
                let api_key = self.api_key.clone().unwrap_or_default();
                let query = query.to_string();
                async move {
                    let resp = http
                        .get(&url)
                        .query(&[("apiKey", api_key.as_str()), ("q", query.as_str())])
                        .send()
                        .await?;
                    let record: NewsRecord = resp.json().await.unwrap_or_default();
                    Ok(record)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for NewsClient {
    fn default() -> Self {
        Self::new()
    }
}
