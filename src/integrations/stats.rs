//! Player stats and injuries. Injuries arrive from upstream in either a
//! Playbook-shaped or an ESPN-shaped payload; this client normalizes both at
//! the boundary into one `InjuryReport` shape so downstream signal code
//! never has to branch on source, per the design notes' dual-use-dict rule.

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjuryReport {
    pub player_name: String,
    pub status: String, // "OUT" | "QUESTIONABLE" | "PROBABLE" | ...
    pub team: String,
}

#[derive(Debug, Deserialize)]
struct PlaybookInjuryShape {
    athlete: String,
    designation: String,
    team_name: String,
}

#[derive(Debug, Deserialize)]
struct EspnInjuryShape {
    #[serde(rename = "displayName")]
    display_name: String,
    #[serde(rename = "injuryStatus")]
    injury_status: String,
    #[serde(rename = "teamAbbreviation")]
    team_abbreviation: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawInjury {
    Playbook(PlaybookInjuryShape),
    Espn(EspnInjuryShape),
}

impl From<RawInjury> for InjuryReport {
    fn from(raw: RawInjury) -> Self {
        match raw {
            RawInjury::Playbook(p) => InjuryReport {
                player_name: p.athlete,
                status: p.designation,
                team: p.team_name,
            },
            RawInjury::Espn(e) => InjuryReport {
                player_name: e.display_name,
                status: e.injury_status,
                team: e.team_abbreviation,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerStatsRecord {
    pub player_name: String,
    pub recent_average: Option<f64>,
    pub sample_size: usize,
}

/// A player prop line as published by the stats provider, the seed for
/// prop-candidate discovery alongside the odds provider's game scoreboard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropLine {
    pub player_name: String,
    pub team: String,
    pub stat_type: String,
    pub line: f64,
}

pub struct StatsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    injuries_invoker: Invoker<String, Vec<InjuryReport>>,
    player_invoker: Invoker<(String, String), PlayerStatsRecord>,
    props_invoker: Invoker<String, Vec<PropLine>>,
}

impl StatsClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("STATS_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.sportsdata.example".to_string()),
            api_key: std::env::var("STATS_API_KEY")
                .or_else(|_| std::env::var("SPORTSDATA_API_KEY"))
                .ok(),
            injuries_invoker: Invoker::new(ProviderConfig {
                name: "player_stats",
                timeout,
                ttl: Duration::from_secs(10 * 60),
                daily_quota: Some(1000),
                monthly_quota: None,
                shadow: false,
            }),
            player_invoker: Invoker::new(ProviderConfig {
                name: "player_stats",
                timeout,
                ttl: Duration::from_secs(10 * 60),
                daily_quota: Some(1000),
                monthly_quota: None,
                shadow: false,
            }),
            props_invoker: Invoker::new(ProviderConfig {
                name: "player_stats",
                timeout,
                ttl: Duration::from_secs(10 * 60),
                daily_quota: Some(1000),
                monthly_quota: None,
                shadow: false,
            }),
        }
    }

    pub async fn get_injuries(&self, sport: &str) -> (Vec<InjuryReport>, ProviderStatus) {
        if self.api_key.is_none() {
            return (Vec::new(), ProviderStatus::NoData);
        }
        let outcome = self
            .injuries_invoker
            .call(sport.to_lowercase(), || {
                let http = self.http.clone();
                let url = format!("{}/injuries", self.base_url);
                let api_key = self.api_key.clone().unwrap_or_default();
                let sport = sport.to_string();
                async move {
                    let resp = http
                        .get(&url)
                        .query(&[("apiKey", api_key.as_str()), ("sport", sport.as_str())])
                        .send()
                        .await?;
                    let raw: Vec<RawInjury> = resp.json().await.unwrap_or_default();
                    Ok(raw.into_iter().map(InjuryReport::from).collect())
                }
            })
            .await;
        (outcome.value, outcome.status)
    }

    /// Per-player searches cannot be pre-fetched in a batch; each is issued
    /// inline by the scoring loop under the overall request budget.
    pub async fn get_player_recent_stats(
        &self,
        sport: &str,
        player: &str,
    ) -> (PlayerStatsRecord, ProviderStatus) {
        if self.api_key.is_none() {
            return (PlayerStatsRecord::default(), ProviderStatus::NoData);
        }
        let key = (sport.to_lowercase(), player.to_lowercase());
        let outcome = self
            .player_invoker
            .call(key, || {
                let http = self.http.clone();
                let url = format!("{}/players/recent", self.base_url);
                let api_key = self.api_key.clone().unwrap_or_default();
                let sport = sport.to_string();
                let player = player.to_string();
                async move {
                    let resp = http
                        .get(&url)
                        .query(&[
                            ("apiKey", api_key.as_str()),
                            ("sport", sport.as_str()),
                            ("player", player.as_str()),
                        ])
                        .send()
                        .await?;
                    let record: PlayerStatsRecord = resp.json().await.unwrap_or_default();
                    Ok(record)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }

    /// Published prop lines for a sport, the seed list for prop-candidate
    /// discovery (one `PropLine` becomes one `Candidate` once paired with
    /// current odds via the prefetch stage).
    pub async fn get_props(&self, sport: &str) -> (Vec<PropLine>, ProviderStatus) {
        if self.api_key.is_none() {
            return (Vec::new(), ProviderStatus::NoData);
        }
        let outcome = self
            .props_invoker
            .call(sport.to_lowercase(), || {
                let http = self.http.clone();
                let url = format!("{}/props", self.base_url);
                let api_key = self.api_key.clone().unwrap_or_default();
                let sport = sport.to_string();
                async move {
                    let resp = http
                        .get(&url)
                        .query(&[("apiKey", api_key.as_str()), ("sport", sport.as_str())])
                        .send()
                        .await?;
                    let props: Vec<PropLine> = resp.json().await.unwrap_or_default();
                    Ok(props)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for StatsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_playbook_shape() {
        let raw: RawInjury = serde_json::from_str(
            r#"{"athlete":"Player X","designation":"OUT","team_name":"Lakers"}"#,
        )
        .unwrap();
        let report: InjuryReport = raw.into();
        assert_eq!(report.player_name, "Player X");
        assert_eq!(report.status, "OUT");
    }

    #[test]
    fn normalizes_espn_shape() {
        let raw: RawInjury = serde_json::from_str(
            r#"{"displayName":"Player Y","injuryStatus":"QUESTIONABLE","teamAbbreviation":"BOS"}"#,
        )
        .unwrap();
        let report: InjuryReport = raw.into();
        assert_eq!(report.player_name, "Player Y");
        assert_eq!(report.team, "BOS");
    }

    #[tokio::test]
    async fn get_props_is_no_data_without_api_key() {
        std::env::remove_var("STATS_API_KEY");
        std::env::remove_var("SPORTSDATA_API_KEY");
        let client = StatsClient::new();
        let (props, status) = client.get_props("NBA").await;
        assert!(props.is_empty());
        assert_eq!(status, ProviderStatus::NoData);
    }
}
