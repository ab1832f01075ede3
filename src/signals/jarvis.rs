//! Jarvis engine (weight 0.25, §4.6).
//!
//! Additive components on top of a flat baseline:
//! - a gematria-trigger component (name/date numerology crossing a
//!   threshold), capped by `JARVIS_GEMATRIA_CAP`;
//! - a temporal Z-scan component (how many standard deviations the game's
//!   post time sits from the sport's historical mean post time), capped by
//!   `JARVIS_ZSCAN_CAP`;
//! - an internal MSRF ("model/signal resonance factor") component, capped
//!   separately at `JARVIS_MSRF_COMPONENT_CAP` and folded in here rather
//!   than as a post-base boost — `MSRF_BOOST_CAP` is pinned to 0.0 in the
//!   contract precisely so nobody adds a second MSRF term downstream;
//! - a financial-sentiment component fed by the `finance` integration,
//!   capped by `JARVIS_FINANCIAL_SENTIMENT_CAP` and likewise internal —
//!   the C3 registry lists `finance` as feeding this engine and no other
//!   signal computer touches it.
//!
//! Always emits all eight mandatory output fields, triggered or not.

use super::EngineOutput;
use crate::contract::{
    JARVIS_BASELINE, JARVIS_FINANCIAL_SENTIMENT_CAP, JARVIS_GEMATRIA_CAP,
    JARVIS_MSRF_COMPONENT_CAP, JARVIS_ZSCAN_CAP,
};
use crate::integrations::finance::FinanceClient;
use crate::models::Candidate;
use crate::signals::{external_provenance, internal_provenance};
use std::collections::HashMap;

/// The raw per-component numbers, plus the seven fields the engine
/// contract requires every Jarvis computation to return: `active`,
/// `hits`, `triggers_hit`, `reasons` (on `EngineOutput`), `fail_reasons`,
/// and `inputs_used` alongside the score itself.
#[derive(Debug, Clone)]
pub struct JarvisDetail {
    pub gematria_digit: u32,
    pub gematria_triggered: bool,
    pub gematria_component: f64,
    pub zscan_z: f64,
    pub zscan_triggered: bool,
    pub zscan_component: f64,
    pub msrf_component: f64,
    pub financial_sentiment_component: f64,

    /// True iff any discrete trigger (gematria or Z-scan) fired.
    pub active: bool,
    /// Count of discrete triggers that fired (0, 1, or 2 — MSRF is a
    /// derived resonance of the two, not a third hit).
    pub hits: u32,
    /// Names of the triggers that fired, e.g. `["gematria", "zscan"]`.
    pub triggers_hit: Vec<String>,
    /// Why a component did *not* contribute, for components capable of
    /// failing to produce a signal (currently only financial-sentiment,
    /// which depends on an external quote).
    pub fail_reasons: Vec<String>,
    /// The literal inputs the score was computed from.
    pub inputs_used: HashMap<String, String>,
}

fn gematria_digit(name: &str) -> u32 {
    let sum: u32 = name
        .bytes()
        .filter(|b| b.is_ascii_alphabetic())
        .map(|b| (b.to_ascii_lowercase() - b'a') as u32 + 1)
        .sum();
    sum % 100
}

/// Gematria trigger: the combined home+away team name digit crossing a
/// "master number" style threshold (11, 22, 33 in the 0-99 range).
fn gematria_component(candidate: &Candidate) -> (u32, bool, f64) {
    let digit = gematria_digit(&candidate.home_team) + gematria_digit(&candidate.away_team);
    let triggered = matches!(digit % 33, 11 | 22 | 0) && digit > 0;
    let component = if triggered {
        JARVIS_GEMATRIA_CAP.clamp(1.5)
    } else {
        0.0
    };
    (digit, triggered, component)
}

/// Temporal Z-scan: how far the game's post time (in minutes past midnight
/// ET-local clock hour, approximated here via UTC hour since the caller has
/// already filtered to the correct ET day) sits from the sport's typical
/// post time. League-average post times are hardcoded per sport; this is
/// deliberately coarse since no provider in the registry carries historical
/// post-time distributions.
fn typical_post_minute(sport: &str) -> f64 {
    match sport.to_uppercase().as_str() {
        "NFL" => 13.0 * 60.0,
        "NBA" => 19.5 * 60.0,
        "NHL" => 19.0 * 60.0,
        "MLB" => 19.0 * 60.0,
        _ => 19.0 * 60.0,
    }
}

fn zscan_component(candidate: &Candidate) -> (f64, bool, f64) {
    use chrono::Timelike;
    let minute_of_day = candidate.game_start.hour() as f64 * 60.0 + candidate.game_start.minute() as f64;
    let typical = typical_post_minute(&candidate.sport);
    // Fixed spread assumption (90 minutes) in lieu of a real historical
    // distribution; see the post-time note above.
    let z = (minute_of_day - typical) / 90.0;
    let triggered = z.abs() >= 2.0;
    let component = if triggered {
        JARVIS_ZSCAN_CAP.clamp(1.0 + (z.abs() - 2.0).min(1.0) * 0.5)
    } else {
        0.0
    };
    (z, triggered, component)
}

/// MSRF: resonance between the gematria digit and the Z-scan magnitude —
/// when both trigger together, the combination gets its own bounded boost
/// rather than just summing linearly, modelling "the signals agree" as
/// worth more than either alone.
fn msrf_component(gematria_triggered: bool, zscan_triggered: bool, z: f64) -> f64 {
    if gematria_triggered && zscan_triggered {
        (1.0 + z.abs() * 0.25).min(JARVIS_MSRF_COMPONENT_CAP)
    } else {
        0.0
    }
}

/// No per-team ticker mapping is registered anywhere in the stack (the
/// `finance` integration is a generic quote lookup), so every sport reads
/// the same broad market-mood proxy rather than fabricating a team/symbol
/// table. See DESIGN.md for the rationale.
const MARKET_MOOD_SYMBOL: &str = "SPY";

/// Financial-sentiment component: a broad market-mood proxy's daily percent
/// change, scaled into `JARVIS_FINANCIAL_SENTIMENT_CAP`. Unlike gematria and
/// Z-scan this is a continuous signal with no discrete trigger — it reads
/// `NO_DATA` honestly when the provider has no key configured or failed.
fn financial_sentiment_component(quote_change_pct: Option<f64>) -> f64 {
    match quote_change_pct {
        Some(change_pct) => JARVIS_FINANCIAL_SENTIMENT_CAP.clamp(change_pct / 10.0),
        None => 0.0,
    }
}

pub async fn compute(candidate: &Candidate, finance: &FinanceClient) -> (EngineOutput, JarvisDetail) {
    let (gematria_digit, gematria_triggered, gematria_comp) = gematria_component(candidate);
    let (z, zscan_triggered, zscan_comp) = zscan_component(candidate);
    let msrf = msrf_component(gematria_triggered, zscan_triggered, z);

    let (finance_quote, finance_status) = finance.get_quote(MARKET_MOOD_SYMBOL).await;
    let financial_sentiment = financial_sentiment_component(finance_quote.change_pct);

    let mut reasons = Vec::new();
    if gematria_triggered {
        reasons.push(format!("Gematria trigger on digit {gematria_digit}"));
    }
    if zscan_triggered {
        reasons.push(format!("Temporal Z-scan {z:+.2} sigma from typical post time"));
    }
    if msrf > 0.0 {
        reasons.push(format!("MSRF resonance {msrf:.2} (gematria + Z-scan agree)"));
    }
    if financial_sentiment.abs() > 0.0 {
        reasons.push(format!(
            "Market-mood sentiment {financial_sentiment:+.2} ({MARKET_MOOD_SYMBOL} {:+.2}%)",
            finance_quote.change_pct.unwrap_or(0.0)
        ));
    }

    let mut provenance = HashMap::new();
    provenance.insert(
        "jarvis_gematria".to_string(),
        internal_provenance(HashMap::from([("digit".to_string(), gematria_digit.to_string())])),
    );
    provenance.insert(
        "jarvis_zscan".to_string(),
        internal_provenance(HashMap::from([("z".to_string(), format!("{z:.2}"))])),
    );
    provenance.insert("jarvis_msrf".to_string(), internal_provenance(HashMap::new()));
    provenance.insert(
        "jarvis_financial_sentiment".to_string(),
        external_provenance(
            "finance",
            finance_status,
            false,
            HashMap::from([("symbol".to_string(), MARKET_MOOD_SYMBOL.to_string())]),
        ),
    );

    let score = JARVIS_BASELINE + gematria_comp + zscan_comp + msrf + financial_sentiment;

    let mut triggers_hit = Vec::new();
    if gematria_triggered {
        triggers_hit.push("gematria".to_string());
    }
    if zscan_triggered {
        triggers_hit.push("zscan".to_string());
    }
    let hits = triggers_hit.len() as u32;
    let active = hits > 0;

    let mut fail_reasons = Vec::new();
    if finance_quote.change_pct.is_none() {
        fail_reasons.push(format!(
            "financial_sentiment: no data from `finance` ({finance_status:?})"
        ));
    }

    let mut inputs_used = HashMap::new();
    inputs_used.insert("gematria_digit".to_string(), gematria_digit.to_string());
    inputs_used.insert("zscan_z".to_string(), format!("{z:.3}"));
    if let Some(change_pct) = finance_quote.change_pct {
        inputs_used.insert(format!("{MARKET_MOOD_SYMBOL}_change_pct"), format!("{change_pct:.3}"));
    }

    let output = EngineOutput {
        score,
        reasons,
        provenance,
    }
    .clamp_score();

    let detail = JarvisDetail {
        gematria_digit,
        gematria_triggered,
        gematria_component: gematria_comp,
        zscan_z: z,
        zscan_triggered,
        zscan_component: zscan_comp,
        msrf_component: msrf,
        financial_sentiment_component: financial_sentiment,
        active,
        hits,
        triggers_hit,
        fail_reasons,
        inputs_used,
    };

    (output, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameStatus, PickType};
    use chrono::{TimeZone, Utc};

    fn candidate_at(hour: u32) -> Candidate {
        Candidate {
            pick_type: PickType::Moneyline,
            sport: "NBA".into(),
            home_team: "Lakers".into(),
            away_team: "Celtics".into(),
            player_name: None,
            stat_type: None,
            line: None,
            game_start: Utc.with_ymd_and_hms(2026, 1, 15, hour, 0, 0).unwrap(),
            provider_event_id: "e1".into(),
            odds_american: -110,
            game_status: GameStatus::Scheduled,
        }
    }

    #[tokio::test]
    async fn baseline_with_no_triggers_is_jarvis_baseline_or_above() {
        let finance = FinanceClient::new();
        let (output, detail) = compute(&candidate_at(19), &finance).await;
        assert!(output.score >= JARVIS_BASELINE - 0.01);
        assert!(!detail.zscan_triggered || detail.zscan_component > 0.0);
    }

    #[tokio::test]
    async fn extreme_post_time_triggers_zscan() {
        let finance = FinanceClient::new();
        let (_, detail) = compute(&candidate_at(2), &finance).await;
        assert!(detail.zscan_triggered);
        assert!(detail.zscan_component > 0.0);
    }

    #[tokio::test]
    async fn msrf_only_fires_when_both_components_trigger() {
        let finance = FinanceClient::new();
        let (_, detail) = compute(&candidate_at(19), &finance).await;
        if !(detail.gematria_triggered && detail.zscan_triggered) {
            assert_eq!(detail.msrf_component, 0.0);
        }
    }

    #[tokio::test]
    async fn financial_sentiment_is_zero_without_configured_provider() {
        let finance = FinanceClient::new();
        let (_, detail) = compute(&candidate_at(19), &finance).await;
        if std::env::var("FINANCE_API_KEY").is_err() && std::env::var("ALPHAVANTAGE_API_KEY").is_err() {
            assert_eq!(detail.financial_sentiment_component, 0.0);
        }
    }

    #[tokio::test]
    async fn active_and_hits_reflect_triggers_hit() {
        let finance = FinanceClient::new();
        let (_, detail) = compute(&candidate_at(19), &finance).await;
        assert_eq!(detail.active, detail.hits > 0);
        assert_eq!(detail.hits as usize, detail.triggers_hit.len());
        if detail.gematria_triggered {
            assert!(detail.triggers_hit.contains(&"gematria".to_string()));
        }
        if detail.zscan_triggered {
            assert!(detail.triggers_hit.contains(&"zscan".to_string()));
        }
    }

    #[tokio::test]
    async fn fail_reasons_populated_without_finance_provider() {
        let finance = FinanceClient::new();
        let (_, detail) = compute(&candidate_at(19), &finance).await;
        if std::env::var("FINANCE_API_KEY").is_err() && std::env::var("ALPHAVANTAGE_API_KEY").is_err() {
            assert!(!detail.fail_reasons.is_empty());
        }
        assert!(detail.inputs_used.contains_key("gematria_digit"));
        assert!(detail.inputs_used.contains_key("zscan_z"));
    }

    #[tokio::test]
    async fn score_always_in_engine_range() {
        let finance = FinanceClient::new();
        for hour in 0..24 {
            let (output, _) = compute(&candidate_at(hour), &finance).await;
            assert!((0.0..=10.0).contains(&output.score));
        }
    }
}
