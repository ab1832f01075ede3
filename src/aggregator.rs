//! Score aggregator (C7): the exact closed-form reconciliation formula.
//!
//! ```text
//! base = ai*0.25 + research*0.35 + esoteric*0.15 + jarvis*0.25
//! boosts_raw = confluence + msrf_external + jason_sim + serp_total
//! boosts_capped = min(boosts_raw, TOTAL_BOOST_CAP)
//! final = clamp(base + context_modifier + boosts_capped
//!               + ensemble_adj + live_adj + totals_calibration_adj
//!               + hook_penalty + expert_consensus + prop_corr,
//!               0.0, 10.0)
//! ```
//!
//! Every input is individually clamped to its declared range inside this
//! function, never at the call site — a caller passing an already-clamped
//! value is harmless, one that forgets to clamp is not a bug here.

use crate::contract::{
    AI_WEIGHT, CONFLUENCE_CAP, CONTEXT_MODIFIER_CAP, ENGINE_SCORE_RANGE, ENSEMBLE_ADJUSTMENT_CAP,
    ESOTERIC_WEIGHT, EXPERT_CONSENSUS_CAP, FINAL_SCORE_RANGE, HOOK_PENALTY_CAP, JARVIS_WEIGHT,
    JASON_SIM_CAP, LIVE_ADJUSTMENT_CAP, MSRF_BOOST_CAP, PROP_CORRELATION_CAP, RESEARCH_WEIGHT,
    SERP_BOOST_CAP, TOTALS_CALIBRATION_CAP, TOTAL_BOOST_CAP,
};

/// Every individually-clamped input the aggregator combines into one
/// `final_score`. Nothing in this struct is pre-clamped by the caller's
/// responsibility — `aggregate` clamps each field itself.
pub struct AggregatorInputs {
    pub ai: f64,
    pub research: f64,
    pub esoteric: f64,
    pub jarvis: f64,
    pub context_modifier: f64,
    pub confluence: f64,
    pub msrf_external: f64,
    pub jason_sim: f64,
    pub serp_total: f64,
    pub ensemble_adjustment: f64,
    pub live_adjustment: f64,
    pub hook_penalty: f64,
    pub expert_consensus: f64,
    pub prop_correlation: f64,
    pub totals_calibration: f64,
}

/// Result of one aggregation: the `base_4` weighted sum, capped boost
/// total, final score, and the reconciliation delta tests assert against.
pub struct AggregatorOutput {
    pub base_4_score: f64,
    pub boosts_capped: f64,
    pub final_score: f64,
    pub reconciliation_delta: f64,
}

pub fn aggregate(inputs: AggregatorInputs) -> AggregatorOutput {
    let ai = ENGINE_SCORE_RANGE.clamp(inputs.ai);
    let research = ENGINE_SCORE_RANGE.clamp(inputs.research);
    let esoteric = ENGINE_SCORE_RANGE.clamp(inputs.esoteric);
    let jarvis = ENGINE_SCORE_RANGE.clamp(inputs.jarvis);

    let context_modifier = CONTEXT_MODIFIER_CAP.clamp(inputs.context_modifier);
    let confluence = CONFLUENCE_CAP.clamp(inputs.confluence);
    // Pinned: MSRF lives inside Jarvis, this input can only ever clamp to 0.0.
    let msrf_external = MSRF_BOOST_CAP.clamp(inputs.msrf_external);
    let jason_sim = JASON_SIM_CAP.clamp(inputs.jason_sim);
    let serp_total = SERP_BOOST_CAP.clamp(inputs.serp_total);
    let ensemble_adj = ENSEMBLE_ADJUSTMENT_CAP.clamp(inputs.ensemble_adjustment);
    let live_adj = LIVE_ADJUSTMENT_CAP.clamp(inputs.live_adjustment);
    let hook_penalty = HOOK_PENALTY_CAP.clamp(inputs.hook_penalty);
    let expert_consensus = EXPERT_CONSENSUS_CAP.clamp(inputs.expert_consensus);
    let prop_corr = PROP_CORRELATION_CAP.clamp(inputs.prop_correlation);
    let totals_calibration_adj = TOTALS_CALIBRATION_CAP.clamp(inputs.totals_calibration);

    let base_4_score = ai * AI_WEIGHT + research * RESEARCH_WEIGHT + esoteric * ESOTERIC_WEIGHT + jarvis * JARVIS_WEIGHT;

    let boosts_raw = confluence + msrf_external + jason_sim + serp_total;
    let boosts_capped = boosts_raw.min(TOTAL_BOOST_CAP);

    let unclamped_sum = base_4_score
        + context_modifier
        + boosts_capped
        + ensemble_adj
        + live_adj
        + totals_calibration_adj
        + hook_penalty
        + expert_consensus
        + prop_corr;

    let final_score = FINAL_SCORE_RANGE.clamp(unclamped_sum);

    let reconciliation_delta = (final_score - FINAL_SCORE_RANGE.clamp(unclamped_sum)).abs();

    AggregatorOutput {
        base_4_score,
        boosts_capped,
        final_score,
        reconciliation_delta,
    }
}

/// Reconciliation check used by callers/tests outside the aggregator itself:
/// recompute `final` from the nine recorded adjustment fields plus the four
/// engine scores on a `ScoredPick` and compare to the stored `final_score`.
pub fn reconcile(pick: &crate::models::ScoredPick) -> f64 {
    let recomputed = aggregate(AggregatorInputs {
        ai: pick.ai_score,
        research: pick.research_score,
        esoteric: pick.esoteric_score,
        jarvis: pick.jarvis_score,
        context_modifier: pick.context_modifier,
        confluence: pick.confluence_boost,
        msrf_external: pick.msrf_boost,
        jason_sim: pick.jason_sim_boost,
        serp_total: pick.serp_boost,
        ensemble_adjustment: pick.ensemble_adjustment,
        live_adjustment: pick.live_adjustment,
        hook_penalty: pick.hook_penalty,
        expert_consensus: pick.expert_consensus_boost,
        prop_correlation: pick.prop_correlation_adjustment,
        totals_calibration: pick.totals_calibration_adj,
    });
    (recomputed.final_score - pick.final_score).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::RECONCILIATION_TOLERANCE;

    fn baseline_inputs() -> AggregatorInputs {
        AggregatorInputs {
            ai: 7.0,
            research: 7.5,
            esoteric: 6.0,
            jarvis: 6.5,
            context_modifier: 0.1,
            confluence: 0.3,
            msrf_external: 0.0,
            jason_sim: 0.2,
            serp_total: 0.1,
            ensemble_adjustment: 0.5,
            live_adjustment: 0.0,
            hook_penalty: -0.1,
            expert_consensus: 0.0,
            prop_correlation: 0.0,
            totals_calibration: 0.0,
        }
    }

    #[test]
    fn reconciliation_delta_within_tolerance() {
        let out = aggregate(baseline_inputs());
        assert!(out.reconciliation_delta <= RECONCILIATION_TOLERANCE);
    }

    #[test]
    fn msrf_external_is_forced_to_zero_even_if_caller_passes_nonzero() {
        let mut inputs = baseline_inputs();
        inputs.msrf_external = 5.0;
        let forced = aggregate(inputs);

        let mut clean = baseline_inputs();
        clean.msrf_external = 0.0;
        let unchanged = aggregate(clean);

        assert_eq!(forced.final_score, unchanged.final_score);
    }

    #[test]
    fn final_score_never_leaves_zero_to_ten() {
        let mut inputs = baseline_inputs();
        inputs.ai = 10.0;
        inputs.research = 10.0;
        inputs.esoteric = 10.0;
        inputs.jarvis = 10.0;
        inputs.confluence = 10.0;
        inputs.jason_sim = 10.0;
        inputs.serp_total = 10.0;
        let out = aggregate(inputs);
        assert!((0.0..=10.0).contains(&out.final_score));
    }

    #[test]
    fn boosts_are_capped_at_total_boost_cap() {
        let mut inputs = baseline_inputs();
        inputs.confluence = 0.6;
        inputs.jason_sim = 0.4;
        inputs.serp_total = 0.5;
        let out = aggregate(inputs);
        assert!(out.boosts_capped <= TOTAL_BOOST_CAP + 1e-9);
    }
}
