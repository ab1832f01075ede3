//! Odds-API-sourced data: the day's scoreboard plus cross-book odds. Feeds
//! the AI engine (games list) and the Research engine's line-variance
//! signal, which per its invariants may only ever read from *this* client.

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookLine {
    pub book: String,
    pub line: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OddsQuote {
    pub per_book: Vec<BookLine>,
}

impl OddsQuote {
    /// Cross-book max-min spread; `None` unless at least two books quoted.
    pub fn line_variance(&self) -> Option<f64> {
        if self.per_book.len() < 2 {
            return None;
        }
        let lines: Vec<f64> = self.per_book.iter().map(|b| b.line).collect();
        let max = lines.iter().cloned().fold(f64::MIN, f64::max);
        let min = lines.iter().cloned().fold(f64::MAX, f64::min);
        Some(max - min)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameEvent {
    pub provider_event_id: String,
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: Option<DateTime<Utc>>,
}

pub struct OddsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    odds_invoker: Invoker<(String, String, String), OddsQuote>,
    scoreboard_invoker: Invoker<String, Vec<GameEvent>>,
}

impl OddsClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("ODDS_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.the-odds-api.com".to_string()),
            api_key: std::env::var("ODDS_API_KEY")
                .or_else(|_| std::env::var("THE_ODDS_API_KEY"))
                .ok(),
            odds_invoker: Invoker::new(ProviderConfig {
                name: "odds",
                timeout,
                ttl: Duration::from_secs(5 * 60),
                daily_quota: Some(500),
                monthly_quota: Some(15_000),
                shadow: false,
            }),
            scoreboard_invoker: Invoker::new(ProviderConfig {
                name: "odds",
                timeout,
                ttl: Duration::from_secs(2 * 60),
                daily_quota: None,
                monthly_quota: None,
                shadow: false,
            }),
        }
    }

    pub async fn get_scoreboard(&self, sport: &str) -> (Vec<GameEvent>, ProviderStatus) {
        if self.api_key.is_none() {
            return (Vec::new(), ProviderStatus::NoData);
        }
        let sport = sport.to_string();
        let outcome = self
            .scoreboard_invoker
            .call(sport.clone(), || {
                let http = self.http.clone();
                let url = format!("{}/v4/sports/{}/events", self.base_url, sport.to_lowercase());
                let key = self.api_key.clone().unwrap_or_default();
                async move {
                    let resp = http.get(&url).query(&[("apiKey", key)]).send().await?;
                    let events: Vec<GameEvent> = resp.json().await.unwrap_or_default();
                    Ok(events)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }

    /// Cross-book odds for a single game, keyed by the same `(home, away,
    /// target)` tuple the pre-fetch planner dedups on.
    pub async fn get_odds(
        &self,
        sport: &str,
        home: &str,
        away: &str,
    ) -> (OddsQuote, ProviderStatus) {
        let key = (
            format!("{}:{}", sport.to_lowercase(), home.to_lowercase()),
            away.to_lowercase(),
            "odds".to_string(),
        );
        let outcome = self
            .odds_invoker
            .call(key, || {
                let http = self.http.clone();
                let url = format!("{}/v4/sports/odds", self.base_url);
                let key = self.api_key.clone().unwrap_or_default();
                let sport = sport.to_string();
                let home = home.to_string();
                let away = away.to_string();
                async move {
                    let resp = http
                        .get(&url)
                        .query(&[
                            ("apiKey", key.as_str()),
                            ("sport", sport.as_str()),
                            ("home", home.as_str()),
                            ("away", away.as_str()),
                        ])
                        .send()
                        .await?;
                    let quote: OddsQuote = resp.json().await.unwrap_or_default();
                    Ok(quote)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for OddsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_variance_is_max_minus_min() {
        let quote = OddsQuote {
            per_book: vec![
                BookLine { book: "a".into(), line: -3.0 },
                BookLine { book: "b".into(), line: -5.5 },
            ],
        };
        assert_eq!(quote.line_variance(), Some(2.5));
    }

    #[test]
    fn single_book_has_no_variance() {
        let quote = OddsQuote {
            per_book: vec![BookLine { book: "a".into(), line: -3.0 }],
        };
        assert_eq!(quote.line_variance(), None);
    }
}
