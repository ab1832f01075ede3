//! Playbook-sourced betting splits: ticket% vs money%. The Research engine's
//! sharp-money signal may only ever read from this client — never from
//! `odds`, per the strict source separation invariant.

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitsRecord {
    pub ticket_pct: Option<f64>,
    pub money_pct: Option<f64>,
}

impl SplitsRecord {
    /// Ticket% vs money% divergence, the basis of the sharp-money signal.
    pub fn divergence(&self) -> Option<f64> {
        match (self.ticket_pct, self.money_pct) {
            (Some(t), Some(m)) => Some((m - t).abs()),
            _ => None,
        }
    }
}

pub struct PlaybookClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    invoker: Invoker<(String, String, String), SplitsRecord>,
}

impl PlaybookClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("PLAYBOOK_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.playbook.example".to_string()),
            api_key: std::env::var("PLAYBOOK_API_KEY").ok(),
            invoker: Invoker::new(ProviderConfig {
                name: "playbook",
                timeout,
                ttl: Duration::from_secs(5 * 60),
                daily_quota: Some(1000),
                monthly_quota: None,
                shadow: false,
            }),
        }
    }

    pub async fn get_splits(
        &self,
        sport: &str,
        home: &str,
        away: &str,
    ) -> (SplitsRecord, ProviderStatus) {
        if self.api_key.is_none() {
            return (SplitsRecord::default(), ProviderStatus::NoData);
        }
        let key = (sport.to_lowercase(), home.to_lowercase(), away.to_lowercase());
        let outcome = self
            .invoker
            .call(key, || {
                let http = self.http.clone();
                let url = format!("{}/splits", self.base_url);
                let api_key = self.api_key.clone().unwrap_or_default();
                let sport = sport.to_string();
                let home = home.to_string();
                let away = away.to_string();
                async move {
                    let resp = http
                        .get(&url)
                        .query(&[
                            ("apiKey", api_key.as_str()),
                            ("sport", sport.as_str()),
                            ("home", home.as_str()),
                            ("away", away.as_str()),
                        ])
                        .send()
                        .await?;
                    let record: SplitsRecord = resp.json().await.unwrap_or_default();
                    Ok(record)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for PlaybookClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divergence_requires_both_fields() {
        let r = SplitsRecord { ticket_pct: Some(45.0), money_pct: Some(62.0) };
        assert_eq!(r.divergence(), Some(17.0));
        let r2 = SplitsRecord { ticket_pct: Some(45.0), money_pct: None };
        assert_eq!(r2.divergence(), None);
    }
}
