//! Integration registry (C3) and provider clients (C4).

pub mod client;

pub mod astronomy;
pub mod finance;
pub mod news;
pub mod odds;
pub mod officials;
pub mod space_weather;
pub mod splits;
pub mod stats;
pub mod trends;
pub mod weather;

use serde::Serialize;

/// Classification a liveness probe resolves an integration to. `FeatureDisabled`
/// is deliberately not a variant: relevance gating must resolve to
/// `NotRelevant` instead, per the design notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationStatus {
    Validated,
    Configured,
    NotRelevant,
    Unavailable,
    Error,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    None,
    Key,
}

/// A definition row in the registry table. `env_vars[0]` is the primary
/// name; the remainder are accepted aliases.
#[derive(Debug, Clone)]
pub struct IntegrationDef {
    pub name: &'static str,
    pub env_vars: &'static [&'static str],
    pub required: bool,
    pub owning_module: &'static str,
    pub feeds_engine: &'static str,
    pub auth_type: AuthType,
}

pub const REGISTRY: &[IntegrationDef] = &[
    IntegrationDef {
        name: "odds",
        env_vars: &["ODDS_API_KEY", "THE_ODDS_API_KEY"],
        required: true,
        owning_module: "integrations::odds",
        feeds_engine: "research",
        auth_type: AuthType::Key,
    },
    IntegrationDef {
        name: "playbook",
        env_vars: &["PLAYBOOK_API_KEY"],
        required: true,
        owning_module: "integrations::splits",
        feeds_engine: "research",
        auth_type: AuthType::Key,
    },
    IntegrationDef {
        name: "player_stats",
        env_vars: &["STATS_API_KEY", "SPORTSDATA_API_KEY"],
        required: true,
        owning_module: "integrations::stats",
        feeds_engine: "ai",
        auth_type: AuthType::Key,
    },
    IntegrationDef {
        name: "weather",
        env_vars: &["WEATHER_API_KEY", "OPENWEATHER_API_KEY"],
        required: false,
        owning_module: "integrations::weather",
        feeds_engine: "context",
        auth_type: AuthType::Key,
    },
    IntegrationDef {
        name: "space_weather",
        env_vars: &["NOAA_SWPC_BASE_URL"],
        required: false,
        owning_module: "integrations::space_weather",
        feeds_engine: "esoteric",
        auth_type: AuthType::None,
    },
    IntegrationDef {
        name: "astronomy",
        env_vars: &["ASTRONOMY_API_ID", "ASTRONOMY_API_SECRET"],
        required: false,
        owning_module: "integrations::astronomy",
        feeds_engine: "esoteric",
        auth_type: AuthType::Key,
    },
    IntegrationDef {
        name: "trends",
        env_vars: &["SERP_API_KEY", "SERPAPI_KEY"],
        required: false,
        owning_module: "integrations::trends",
        feeds_engine: "esoteric",
        auth_type: AuthType::Key,
    },
    IntegrationDef {
        name: "news",
        env_vars: &["NEWS_API_KEY"],
        required: false,
        owning_module: "integrations::news",
        feeds_engine: "research",
        auth_type: AuthType::Key,
    },
    IntegrationDef {
        name: "officials",
        env_vars: &["OFFICIALS_API_KEY"],
        required: false,
        owning_module: "integrations::officials",
        feeds_engine: "context",
        auth_type: AuthType::Key,
    },
    IntegrationDef {
        name: "finance",
        env_vars: &["FINANCE_API_KEY", "ALPHAVANTAGE_API_KEY"],
        required: false,
        owning_module: "integrations::finance",
        feeds_engine: "jarvis",
        auth_type: AuthType::Key,
    },
];

/// True if `sport` has no relevant outdoor/weather exposure — e.g. NBA is
/// played indoors. Used so the weather client resolves to `NotRelevant`
/// rather than the banned `FeatureDisabled`.
pub fn weather_relevant(sport: &str) -> bool {
    !matches!(sport.to_uppercase().as_str(), "NBA" | "NHL")
}

/// Run each integration's liveness probe and classify it. The probe is a
/// cheap, deterministic check rather than a fresh network call: whether a
/// required env var is present, whether the integration is even relevant
/// to the sport in this request, and — for a configured integration — the
/// most recent call outcome `telemetry` already observed. A configured
/// integration that has never been called yet reads as `Configured`; one
/// whose last call actually succeeded is promoted to `Validated`; a
/// timeout or error downgrades it to `Unavailable`/`Error` without ever
/// issuing a probe call of its own.
pub fn probe(def: &IntegrationDef, sport: &str) -> IntegrationStatus {
    if def.name == "weather" && !weather_relevant(sport) {
        return IntegrationStatus::NotRelevant;
    }

    let configured = def
        .env_vars
        .iter()
        .any(|v| std::env::var(v).map(|s| !s.trim().is_empty()).unwrap_or(false));

    match (configured, def.required) {
        (true, _) => match crate::telemetry::last_used_registry().last_status(def.name) {
            Some(crate::models::ProviderStatus::Success) => IntegrationStatus::Validated,
            Some(crate::models::ProviderStatus::Timeout) => IntegrationStatus::Unavailable,
            Some(crate::models::ProviderStatus::Error) => IntegrationStatus::Error,
            Some(crate::models::ProviderStatus::SkippedQuota)
            | Some(crate::models::ProviderStatus::NoData)
            | None => IntegrationStatus::Configured,
        },
        (false, true) => IntegrationStatus::Missing,
        (false, false) => IntegrationStatus::NotRelevant,
    }
}

/// Masked environment-presence map for the `/integrations` debug endpoint:
/// never the value, only whether it's set, and omitting `key_present`
/// entirely for no-auth integrations per the auth-tagging rule.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrationReport {
    pub name: &'static str,
    pub required: bool,
    pub status: IntegrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_present: Option<bool>,
    pub auth_type: &'static str,
}

pub fn build_report(sport: &str) -> Vec<IntegrationReport> {
    REGISTRY
        .iter()
        .map(|def| {
            let status = probe(def, sport);
            let key_present = match def.auth_type {
                AuthType::None => None,
                AuthType::Key => Some(
                    def.env_vars
                        .iter()
                        .any(|v| std::env::var(v).map(|s| !s.trim().is_empty()).unwrap_or(false)),
                ),
            };
            IntegrationReport {
                name: def.name,
                required: def.required,
                status,
                key_present,
                auth_type: match def.auth_type {
                    AuthType::None => "none",
                    AuthType::Key => "key",
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_is_not_relevant_for_indoor_sports() {
        assert_eq!(probe(
            REGISTRY.iter().find(|d| d.name == "weather").unwrap(),
            "NBA"
        ), IntegrationStatus::NotRelevant);
    }

    #[test]
    fn public_integrations_omit_key_present() {
        let reports = build_report("NBA");
        let space = reports.iter().find(|r| r.name == "space_weather").unwrap();
        assert!(space.key_present.is_none());
        assert_eq!(space.auth_type, "none");
    }

    #[test]
    fn probe_promotes_configured_to_validated_after_an_observed_success() {
        std::env::set_var("OFFICIALS_API_KEY", "test-key");
        let def = REGISTRY.iter().find(|d| d.name == "officials").unwrap();

        assert_eq!(probe(def, "NFL"), IntegrationStatus::Configured);

        crate::telemetry::last_used_registry()
            .touch_with_status("officials", crate::models::ProviderStatus::Success);
        assert_eq!(probe(def, "NFL"), IntegrationStatus::Validated);

        crate::telemetry::last_used_registry()
            .touch_with_status("officials", crate::models::ProviderStatus::Timeout);
        assert_eq!(probe(def, "NFL"), IntegrationStatus::Unavailable);

        crate::telemetry::last_used_registry()
            .touch_with_status("officials", crate::models::ProviderStatus::Error);
        assert_eq!(probe(def, "NFL"), IntegrationStatus::Error);

        std::env::remove_var("OFFICIALS_API_KEY");
    }
}
