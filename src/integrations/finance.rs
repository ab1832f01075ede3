//! Financial-sentiment quote, feeding the Jarvis engine's financial-sentiment
//! component (internal to Jarvis, same as MSRF, never a post-base boost).

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinanceQuote {
    pub symbol: String,
    pub change_pct: Option<f64>,
}

pub struct FinanceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    invoker: Invoker<String, FinanceQuote>,
}

impl FinanceClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("FINANCE_API_BASE_URL")
                .unwrap_or_else(|_| "https://www.alphavantage.co".to_string()),
            api_key: std::env::var("FINANCE_API_KEY")
                .or_else(|_| std::env::var("ALPHAVANTAGE_API_KEY"))
                .ok(),
            invoker: Invoker::new(ProviderConfig {
                name: "finance",
                timeout,
                ttl: Duration::from_secs(15 * 60),
                daily_quota: Some(500),
                monthly_quota: None,
                shadow: false,
            }),
        }
    }

    pub async fn get_quote(&self, symbol: &str) -> (FinanceQuote, ProviderStatus) {
        if self.api_key.is_none() {
            return (FinanceQuote::default(), ProviderStatus::NoData);
        }
        let outcome = self
            .invoker
            .call(symbol.to_uppercase(), || {
                let http = self.http.clone();
                let url = format!("{}/query", self.base_url);
                let api_key = self.api_key.clone().unwrap_or_default();
                let symbol = symbol.to_string();
                async move {
                    let resp = http
                        .get(&url)
                        .query(&[
                            ("apikey", api_key.as_str()),
                            ("function", "GLOBAL_QUOTE"),
                            ("symbol", symbol.as_str()),
                        ])
                        .send()
                        .await?;
                    let quote: FinanceQuote = resp.json().await.unwrap_or_default();
                    Ok(quote)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for FinanceClient {
    fn default() -> Self {
        Self::new()
    }
}
