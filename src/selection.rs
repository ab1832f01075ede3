//! Selection / tiering (C8), applied once every candidate has been scored.
//!
//! 1. ET-day filter: drop any whose game start falls outside the ET day.
//! 2. Min-score floor: drop `final_score < MIN_DISPLAY_SCORE`.
//! 3. Contradiction/dedup: at most one pick per `(event, market, side)`;
//!    opposite sides of the same market keep the higher score.
//! 4. Tiering: Titanium / Gold-Star / Silver / Standard.
//! 5. Sort descending by final score, then confluence, then AI score,
//!    within each tier.

use crate::contract::{
    GOLD_STAR_AI_MIN, GOLD_STAR_ESOTERIC_MIN, GOLD_STAR_FINAL_MIN, GOLD_STAR_JARVIS_MIN,
    GOLD_STAR_RESEARCH_MIN, MIN_DISPLAY_SCORE, SILVER_FINAL_MIN, TITANIUM_ENGINE_THRESHOLD,
    TITANIUM_MIN_ENGINES,
};
use crate::models::{ScoredPick, Tier};
use crate::time_authority::is_within_day;
use chrono::NaiveDate;
use std::collections::HashMap;

fn assign_tier(pick: &ScoredPick) -> Tier {
    let above_titanium = [pick.ai_score, pick.research_score, pick.esoteric_score, pick.jarvis_score]
        .iter()
        .filter(|&&s| s >= TITANIUM_ENGINE_THRESHOLD)
        .count();

    if above_titanium >= TITANIUM_MIN_ENGINES {
        return Tier::TitaniumSmash;
    }

    let gold_star = pick.ai_score >= GOLD_STAR_AI_MIN
        && pick.research_score >= GOLD_STAR_RESEARCH_MIN
        && pick.jarvis_score >= GOLD_STAR_JARVIS_MIN
        && pick.esoteric_score >= GOLD_STAR_ESOTERIC_MIN
        && pick.final_score >= GOLD_STAR_FINAL_MIN;

    if gold_star {
        return Tier::GoldStar;
    }

    if pick.final_score >= SILVER_FINAL_MIN {
        return Tier::Silver;
    }

    Tier::Standard
}

/// `(event_id, market, side)` — a pick's own dedup identity. `side` is the
/// selection string (team name, OVER/UNDER, player name) so that opposite
/// sides of the same market collide on purpose.
fn dedup_key(pick: &ScoredPick) -> (String, String, String) {
    (
        pick.candidate.provider_event_id.clone(),
        pick.market.clone(),
        pick.selection.clone(),
    )
}

/// Same market, opposite side: same event + market, different selection.
fn contradiction_key(pick: &ScoredPick) -> (String, String) {
    (pick.candidate.provider_event_id.clone(), pick.market.clone())
}

pub fn select(mut picks: Vec<ScoredPick>, et_date: NaiveDate) -> Vec<ScoredPick> {
    picks.retain(|p| is_within_day(p.candidate.game_start, et_date));
    picks.retain(|p| p.final_score >= MIN_DISPLAY_SCORE);

    // Exact-duplicate collapse (same event/market/side): keep the higher score.
    let mut by_dedup_key: HashMap<(String, String, String), ScoredPick> = HashMap::new();
    for pick in picks {
        let key = dedup_key(&pick);
        match by_dedup_key.get(&key) {
            Some(existing) if existing.final_score >= pick.final_score => {}
            _ => {
                by_dedup_key.insert(key, pick);
            }
        }
    }

    // Contradiction collapse (opposite sides of the same market): keep the
    // higher score per (event, market).
    let mut by_contradiction_key: HashMap<(String, String), ScoredPick> = HashMap::new();
    for (_, pick) in by_dedup_key {
        let key = contradiction_key(&pick);
        match by_contradiction_key.get(&key) {
            Some(existing) if existing.final_score >= pick.final_score => {}
            _ => {
                by_contradiction_key.insert(key, pick);
            }
        }
    }

    let mut picks: Vec<ScoredPick> = by_contradiction_key.into_values().collect();
    for pick in &mut picks {
        pick.tier = assign_tier(pick);
    }

    picks.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.confluence_boost.partial_cmp(&a.confluence_boost).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| b.ai_score.partial_cmp(&a.ai_score).unwrap_or(std::cmp::Ordering::Equal))
    });

    // Tier ordering within the overall list groups Titanium first, then
    // Gold-Star, then Silver, then Standard, preserving the score-descending
    // order established above within each group.
    let mut tiered: Vec<ScoredPick> = Vec::with_capacity(picks.len());
    for tier in [Tier::TitaniumSmash, Tier::GoldStar, Tier::Silver, Tier::Standard] {
        tiered.extend(picks.iter().filter(|p| p.tier == tier).cloned());
    }
    tiered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CallProof, Candidate, GameStatus, PickType, Provenance, ProviderStatus, ResearchDetail, SourceType};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn base_pick(event_id: &str, market: &str, selection: &str, final_score: f64) -> ScoredPick {
        ScoredPick {
            candidate: Candidate {
                pick_type: PickType::Spread,
                sport: "NBA".into(),
                home_team: "Lakers".into(),
                away_team: "Celtics".into(),
                player_name: None,
                stat_type: None,
                line: Some(-3.5),
                game_start: Utc.with_ymd_and_hms(2026, 1, 15, 19, 0, 0).unwrap(),
                provider_event_id: event_id.into(),
                odds_american: -110,
                game_status: GameStatus::Scheduled,
            },
            pick_id: format!("{event_id}-{market}-{selection}"),
            ai_score: 7.0,
            research_score: 7.0,
            esoteric_score: 6.0,
            jarvis_score: 6.5,
            research_detail: ResearchDetail {
                sharp_boost: 0.0,
                sharp_strength: crate::models::SharpStrength::None,
                sharp_source_api: "playbook",
                sharp_status: ProviderStatus::NoData,
                sharp_raw_inputs: HashMap::new(),
                line_boost: 0.0,
                line_source_api: "odds",
                line_status: ProviderStatus::NoData,
                line_raw_inputs: HashMap::new(),
            },
            context_modifier: 0.0,
            confluence_boost: 0.0,
            msrf_boost: 0.0,
            jason_sim_boost: 0.0,
            serp_boost: 0.0,
            ensemble_adjustment: 0.0,
            live_adjustment: 0.0,
            hook_penalty: 0.0,
            expert_consensus_boost: 0.0,
            prop_correlation_adjustment: 0.0,
            totals_calibration_adj: 0.0,
            final_score,
            reconciliation_delta: 0.0,
            tier: Tier::Standard,
            selection: selection.into(),
            selection_home_away: "HOME".into(),
            market: market.into(),
            reasons_ai: Vec::new(),
            reasons_research: Vec::new(),
            reasons_esoteric: Vec::new(),
            reasons_jarvis: Vec::new(),
            per_signal_provenance: HashMap::from([(
                "test".to_string(),
                Provenance {
                    source_api: None,
                    source_type: SourceType::Internal,
                    status: ProviderStatus::Success,
                    call_proof: CallProof::None,
                    raw_inputs_summary: HashMap::new(),
                },
            )]),
            integrations_used: Vec::new(),
        }
    }

    #[test]
    fn drops_below_min_display_score() {
        let picks = vec![base_pick("e1", "spread", "Lakers", 6.0)];
        let et_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert!(select(picks, et_date).is_empty());
    }

    #[test]
    fn contradiction_keeps_higher_score_side() {
        let picks = vec![
            base_pick("e1", "spread", "Lakers", 7.2),
            base_pick("e1", "spread", "Celtics", 8.1),
        ];
        let et_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let selected = select(picks, et_date);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].selection, "Celtics");
    }

    #[test]
    fn titanium_requires_three_engines_above_threshold() {
        let mut pick = base_pick("e1", "spread", "Lakers", 9.0);
        pick.ai_score = 8.5;
        pick.research_score = 8.2;
        pick.esoteric_score = 8.1;
        pick.jarvis_score = 5.0;
        let et_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let selected = select(vec![pick], et_date);
        assert_eq!(selected[0].tier, Tier::TitaniumSmash);
    }

    #[test]
    fn sorted_descending_by_final_score_within_tier() {
        let picks = vec![
            base_pick("e1", "total", "OVER", 7.1),
            base_pick("e2", "total", "OVER", 7.9),
        ];
        let et_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let selected = select(picks, et_date);
        assert!(selected[0].final_score >= selected[1].final_score);
    }
}
