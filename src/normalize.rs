//! Pick normalizer (C9): the fixed `ScoredPickOut` response shape.
//!
//! Field order matches the response contract exactly (`serde` emits struct
//! fields in declaration order). Every boost field is present even at
//! zero; ET-formatted display fields only, no UTC or telemetry leaking
//! into the public payload.

use crate::models::{PickType, Provenance, ScoredPick, Tier};
use crate::time_authority::to_et_display;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct ScoredPickOut {
    pub pick_id: String,
    pub sport: String,
    pub matchup: String,
    pub selection: String,
    pub selection_home_away: String,
    pub market: String,
    pub pick_type: PickType,
    pub line: Option<f64>,
    pub odds_american: i32,

    pub ai_score: f64,
    pub research_score: f64,
    pub esoteric_score: f64,
    pub jarvis_score: f64,
    pub base_4_score: f64,

    pub context_modifier: f64,
    pub confluence_boost: f64,
    pub msrf_boost: f64,
    pub jason_sim_boost: f64,
    pub serp_boost: f64,
    pub ensemble_adjustment: f64,
    pub live_adjustment: f64,
    pub hook_penalty: f64,
    pub expert_consensus_boost: f64,
    pub prop_correlation_adjustment: f64,
    pub totals_calibration_adj: f64,

    pub final_score: f64,
    pub tier: Tier,

    pub reasons_ai: Vec<String>,
    pub reasons_research: Vec<String>,
    pub reasons_esoteric: Vec<String>,
    pub reasons_jarvis: Vec<String>,

    pub per_signal_provenance: HashMap<String, Provenance>,

    pub game_start_et: String,
}

fn base_4_score(pick: &ScoredPick) -> f64 {
    use crate::contract::{AI_WEIGHT, ESOTERIC_WEIGHT, JARVIS_WEIGHT, RESEARCH_WEIGHT};
    pick.ai_score * AI_WEIGHT
        + pick.research_score * RESEARCH_WEIGHT
        + pick.esoteric_score * ESOTERIC_WEIGHT
        + pick.jarvis_score * JARVIS_WEIGHT
}

pub fn normalize(pick: &ScoredPick) -> ScoredPickOut {
    ScoredPickOut {
        pick_id: pick.pick_id.clone(),
        sport: pick.candidate.sport.clone(),
        matchup: format!("{} @ {}", pick.candidate.away_team, pick.candidate.home_team),
        selection: pick.selection.clone(),
        selection_home_away: pick.selection_home_away.clone(),
        market: pick.market.clone(),
        pick_type: pick.candidate.pick_type,
        line: pick.candidate.line,
        odds_american: pick.candidate.odds_american,

        ai_score: pick.ai_score,
        research_score: pick.research_score,
        esoteric_score: pick.esoteric_score,
        jarvis_score: pick.jarvis_score,
        base_4_score: base_4_score(pick),

        context_modifier: pick.context_modifier,
        confluence_boost: pick.confluence_boost,
        msrf_boost: pick.msrf_boost,
        jason_sim_boost: pick.jason_sim_boost,
        serp_boost: pick.serp_boost,
        ensemble_adjustment: pick.ensemble_adjustment,
        live_adjustment: pick.live_adjustment,
        hook_penalty: pick.hook_penalty,
        expert_consensus_boost: pick.expert_consensus_boost,
        prop_correlation_adjustment: pick.prop_correlation_adjustment,
        totals_calibration_adj: pick.totals_calibration_adj,

        final_score: pick.final_score,
        tier: pick.tier,

        reasons_ai: pick.reasons_ai.clone(),
        reasons_research: pick.reasons_research.clone(),
        reasons_esoteric: pick.reasons_esoteric.clone(),
        reasons_jarvis: pick.reasons_jarvis.clone(),

        per_signal_provenance: pick.per_signal_provenance.clone(),

        game_start_et: to_et_display(pick.candidate.game_start),
    }
}

/// Split a scored, selected list into game picks and props, preserving the
/// relative order selection already established.
pub fn split_game_and_prop(picks: &[ScoredPick]) -> (Vec<ScoredPickOut>, Vec<ScoredPickOut>) {
    let mut game_picks = Vec::new();
    let mut props = Vec::new();
    for pick in picks {
        if pick.candidate.pick_type.is_game_market() {
            game_picks.push(normalize(pick));
        } else {
            props.push(normalize(pick));
        }
    }
    (game_picks, props)
}
