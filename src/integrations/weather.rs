//! Weather, relevant only to outdoor sports. Indoor sports (NBA, NHL)
//! resolve to `NotRelevant` rather than calling out at all.

use super::client::{build_http_client, Invoker, ProviderConfig};
use crate::models::ProviderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub temp_f: Option<f64>,
    pub wind_mph: Option<f64>,
    pub precip_probability: Option<f64>,
}

pub struct WeatherClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    invoker: Invoker<(i64, i64, i64), WeatherRecord>,
}

impl WeatherClient {
    pub fn new() -> Self {
        let timeout = Duration::from_secs(2);
        Self {
            http: build_http_client(timeout),
            base_url: std::env::var("WEATHER_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.openweathermap.org".to_string()),
            api_key: std::env::var("WEATHER_API_KEY")
                .or_else(|_| std::env::var("OPENWEATHER_API_KEY"))
                .ok(),
            invoker: Invoker::new(ProviderConfig {
                name: "weather",
                timeout,
                ttl: Duration::from_secs(15 * 60),
                daily_quota: Some(1000),
                monthly_quota: None,
                shadow: false,
            }),
        }
    }

    pub async fn get_weather(
        &self,
        sport: &str,
        lat: f64,
        lon: f64,
        ts: DateTime<Utc>,
    ) -> (WeatherRecord, ProviderStatus) {
        if !super::weather_relevant(sport) {
            return (WeatherRecord::default(), ProviderStatus::NotRelevant);
        }
        if self.api_key.is_none() {
            return (WeatherRecord::default(), ProviderStatus::NoData);
        }
        // Coarse-grained keying so nearby requests for the same venue/hour hit cache.
        let key = ((lat * 100.0) as i64, (lon * 100.0) as i64, ts.timestamp() / 3600);
        let outcome = self
            .invoker
            .call(key, || {
                let http = self.http.clone();
                let url = format!("{}/data/2.5/weather", self.base_url);
                let api_key = self.api_key.clone().unwrap_or_default();
                async move {
                    let resp = http
                        .get(&url)
                        .query(&[
                            ("appid", api_key),
                            ("lat", lat.to_string()),
                            ("lon", lon.to_string()),
                        ])
                        .send()
                        .await?;
                    let record: WeatherRecord = resp.json().await.unwrap_or_default();
                    Ok(record)
                }
            })
            .await;
        (outcome.value, outcome.status)
    }
}

impl Default for WeatherClient {
    fn default() -> Self {
        Self::new()
    }
}
