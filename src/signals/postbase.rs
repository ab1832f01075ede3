//! Post-base additive terms (§4.6). Applied after the four weighted engines
//! are combined into the base score; each term is computed independently
//! and clamped to its own cap before the aggregator sums them, and the
//! total of the boost group (`confluence + msrf_external + jason_sim +
//! serp_total`) is clamped again at `TOTAL_BOOST_CAP`.
//!
//! `msrf_external` is always `0.0` here — real MSRF is computed entirely
//! inside the Jarvis engine (`signals::jarvis`) and `MSRF_BOOST_CAP` is
//! pinned to `(0.0, 0.0)` in the contract so a second copy can't sneak in.

use crate::contract::{
    CONFLUENCE_CAP, ENSEMBLE_ADJUSTMENT_CAP, ENSEMBLE_ADJUSTMENT_STEP, EXPERT_CONSENSUS_CAP,
    HARMONIC_CONVERGENCE_BONUS, HOOK_PENALTY_CAP, JASON_SIM_CAP, LIVE_ADJUSTMENT_CAP,
    PROP_CORRELATION_CAP, SERP_BOOST_CAP, TOTALS_CALIBRATION_CAP,
};
use crate::integrations::trends::TrendRecord;
use crate::models::{Candidate, GameStatus, PickType, ProviderStatus};

/// All four engine scores, needed by confluence/ensemble to judge agreement.
pub struct EngineScores {
    pub ai: f64,
    pub research: f64,
    pub esoteric: f64,
    pub jarvis: f64,
}

impl EngineScores {
    fn as_slice(&self) -> [f64; 4] {
        [self.ai, self.research, self.esoteric, self.jarvis]
    }

    fn mean(&self) -> f64 {
        self.as_slice().iter().sum::<f64>() / 4.0
    }

    fn stddev(&self) -> f64 {
        let mean = self.mean();
        (self
            .as_slice()
            .iter()
            .map(|s| (s - mean).powi(2))
            .sum::<f64>()
            / 4.0)
            .sqrt()
    }
}

/// Every post-base term, already clamped individually, plus the reasons
/// each one produced.
#[derive(Debug, Clone, Default)]
pub struct PostBaseAdjustments {
    pub confluence: f64,
    pub msrf_external: f64,
    pub jason_sim: f64,
    pub serp_total: f64,
    pub ensemble: f64,
    pub live_adjustment: f64,
    pub hook_penalty: f64,
    pub expert_consensus: f64,
    pub prop_correlation: f64,
    pub totals_calibration: f64,
    pub reasons: Vec<String>,
}

/// Engines agreeing (low spread, high mean) earns a base confluence term
/// proportional to agreement. The harmonic-convergence bonus is a distinct,
/// narrower condition: research and esoteric both exceeding 8.0, independent
/// of the four-way agreement spread.
fn confluence(engines: &EngineScores) -> (f64, Option<String>) {
    let stddev = engines.stddev();
    let mean = engines.mean();
    let mut boost = if mean < 6.0 {
        0.0
    } else {
        let agreement = (1.0 - stddev / 3.0).clamp(0.0, 1.0);
        agreement * 0.4
    };
    let mut reason = None;
    if engines.research > 8.0 && engines.esoteric > 8.0 {
        boost += HARMONIC_CONVERGENCE_BONUS;
        reason = Some(format!(
            "Harmonic convergence: research {:.2} and esoteric {:.2} both above 8.0",
            engines.research, engines.esoteric
        ));
    }
    (CONFLUENCE_CAP.clamp(boost), reason)
}

/// Jason-Monte-Carlo: a deterministic proxy for a simulated-distribution
/// edge, built from the final-engine spread rather than true Monte Carlo
/// sampling (no RNG is used, to keep this function pure and reproducible).
fn jason_monte_carlo(engines: &EngineScores) -> (f64, Option<String>) {
    let mean = engines.mean();
    if mean <= 5.0 {
        return (0.0, None);
    }
    let edge = ((mean - 5.0) / 5.0).clamp(0.0, 1.0) * JASON_SIM_CAP.hi;
    if edge > 0.1 {
        (edge, Some(format!("Simulated edge {edge:.2} over baseline")))
    } else {
        (edge, None)
    }
}

/// SERP family: five sub-boosts sharing the trends/search-velocity quota,
/// summed and then clamped once at the family cap.
fn serp_boosts(trend: &(TrendRecord, ProviderStatus)) -> (f64, Vec<String>) {
    let (record, status) = trend;
    if *status != ProviderStatus::Success {
        return (0.0, Vec::new());
    }
    let Some(velocity) = record.velocity else {
        return (0.0, Vec::new());
    };
    let mut reasons = Vec::new();
    let mut total = 0.0;

    // breaking_news_spike
    if velocity.abs() > 50.0 {
        total += 0.1;
        reasons.push("SERP: breaking-news search spike".to_string());
    }
    // sustained_interest
    if velocity > 10.0 {
        total += 0.08;
        reasons.push("SERP: sustained elevated search interest".to_string());
    }
    // sentiment_shift (proxy from sign of velocity)
    if velocity.abs() > 20.0 {
        total += 0.07;
    }
    // social_volume (proxy from magnitude)
    if velocity.abs() > 30.0 {
        total += 0.1;
    }
    // injury_chatter (proxy: very high magnitude treated as injury-related churn)
    if velocity.abs() > 75.0 {
        total += 0.15;
        reasons.push("SERP: injury-chatter volume spike".to_string());
    }

    (SERP_BOOST_CAP.clamp(total), reasons)
}

/// Ensemble adjustment: a discrete +/- 0.5 step, not a continuous value —
/// either the secondary ensemble model agrees with the engines' direction
/// or it doesn't.
fn ensemble_adjustment(engines: &EngineScores) -> (f64, Option<String>) {
    let mean = engines.mean();
    if mean >= 7.0 {
        (
            ENSEMBLE_ADJUSTMENT_CAP.clamp(ENSEMBLE_ADJUSTMENT_STEP),
            Some("Ensemble model agrees with engine consensus".to_string()),
        )
    } else if mean <= 4.0 {
        (
            ENSEMBLE_ADJUSTMENT_CAP.clamp(-ENSEMBLE_ADJUSTMENT_STEP),
            Some("Ensemble model disagrees with engine consensus".to_string()),
        )
    } else {
        (0.0, None)
    }
}

/// Live in-game adjustment: no live-score feed is registered in the
/// integration registry, so this resolves honestly to 0.0 for scheduled
/// games and logs unavailability for live ones, matching the context
/// modifier's live component.
fn live_adjustment(candidate: &Candidate) -> (f64, Option<String>) {
    if candidate.game_status == GameStatus::Live {
        (
            LIVE_ADJUSTMENT_CAP.clamp(0.0),
            Some("live adjustment unavailable; no live-score feed registered".to_string()),
        )
    } else {
        (0.0, None)
    }
}

/// Hook-discipline penalty: lines landing on a half-point hook (e.g. x.5)
/// are inherently less certain than whole-number lines for totals/spreads;
/// always zero or negative.
fn hook_penalty(candidate: &Candidate) -> (f64, Option<String>) {
    if !candidate.pick_type.is_game_market() {
        return (0.0, None);
    }
    let Some(line) = candidate.line else {
        return (0.0, None);
    };
    let fractional = (line.abs() - line.abs().floor()).abs();
    if (fractional - 0.5).abs() < 0.01 {
        (
            HOOK_PENALTY_CAP.clamp(-0.1),
            Some(format!("Hook discipline penalty: line sits on a half-point ({line:.1})")),
        )
    } else {
        (0.0, None)
    }
}

/// Expert-consensus boost: shadow mode by default (computed and logged but
/// never contributes to the score) until an expert-picks integration is
/// registered. No such integration exists in this registry, so the boost
/// is always 0.0 and the reason documents why.
fn expert_consensus() -> (f64, Option<String>) {
    (
        EXPERT_CONSENSUS_CAP.clamp(0.0),
        Some("expert-consensus boost in shadow mode; no expert-picks provider registered".to_string()),
    )
}

/// Prop-correlation: a player prop that runs alongside the team's game
/// total direction gets a small same-direction nudge.
fn prop_correlation(candidate: &Candidate, engines: &EngineScores) -> (f64, Option<String>) {
    if candidate.pick_type != PickType::Prop {
        return (0.0, None);
    }
    let direction = engines.mean() - 5.0;
    let adj = PROP_CORRELATION_CAP.clamp(direction * 0.06);
    if adj.abs() > 0.05 {
        (adj, Some(format!("Prop correlated with game-level consensus ({direction:+.2})")))
    } else {
        (adj, None)
    }
}

/// Totals calibration: a market-specific correction so totals picks aren't
/// scored with the same curve as spreads/moneylines.
fn totals_calibration(candidate: &Candidate, engines: &EngineScores) -> (f64, Option<String>) {
    if candidate.pick_type != PickType::Total {
        return (0.0, None);
    }
    let research_vs_mean = engines.research - engines.mean();
    let adj = TOTALS_CALIBRATION_CAP.clamp(research_vs_mean * 0.1);
    (adj, None)
}

pub fn compute(
    candidate: &Candidate,
    engines: &EngineScores,
    trend: &(TrendRecord, ProviderStatus),
) -> PostBaseAdjustments {
    let mut reasons = Vec::new();

    let (confluence_v, r) = confluence(engines);
    if let Some(r) = r {
        reasons.push(r);
    }
    let (jason_v, r) = jason_monte_carlo(engines);
    if let Some(r) = r {
        reasons.push(r);
    }
    let (serp_v, serp_reasons) = serp_boosts(trend);
    reasons.extend(serp_reasons);
    let (ensemble_v, r) = ensemble_adjustment(engines);
    if let Some(r) = r {
        reasons.push(r);
    }
    let (live_v, r) = live_adjustment(candidate);
    if let Some(r) = r {
        reasons.push(r);
    }
    let (hook_v, r) = hook_penalty(candidate);
    if let Some(r) = r {
        reasons.push(r);
    }
    let (expert_v, r) = expert_consensus();
    if let Some(r) = r {
        reasons.push(r);
    }
    let (prop_v, r) = prop_correlation(candidate, engines);
    if let Some(r) = r {
        reasons.push(r);
    }
    let (totals_v, r) = totals_calibration(candidate, engines);
    if let Some(r) = r {
        reasons.push(r);
    }

    PostBaseAdjustments {
        confluence: confluence_v,
        msrf_external: 0.0,
        jason_sim: jason_v,
        serp_total: serp_v,
        ensemble: ensemble_v,
        live_adjustment: live_v,
        hook_penalty: hook_v,
        expert_consensus: expert_v,
        prop_correlation: prop_v,
        totals_calibration: totals_v,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GameStatus;
    use chrono::Utc;

    fn candidate() -> Candidate {
        Candidate {
            pick_type: PickType::Spread,
            sport: "NBA".into(),
            home_team: "Lakers".into(),
            away_team: "Celtics".into(),
            player_name: None,
            stat_type: None,
            line: Some(-3.5),
            game_start: Utc::now(),
            provider_event_id: "e1".into(),
            odds_american: -110,
            game_status: GameStatus::Scheduled,
        }
    }

    #[test]
    fn msrf_external_is_always_zero() {
        let engines = EngineScores { ai: 7.0, research: 7.0, esoteric: 7.0, jarvis: 7.0 };
        let trend = (TrendRecord::default(), ProviderStatus::NoData);
        let out = compute(&candidate(), &engines, &trend);
        assert_eq!(out.msrf_external, 0.0);
    }

    #[test]
    fn expert_consensus_is_shadow_mode_zero() {
        let engines = EngineScores { ai: 7.0, research: 7.0, esoteric: 7.0, jarvis: 7.0 };
        let trend = (TrendRecord::default(), ProviderStatus::NoData);
        let out = compute(&candidate(), &engines, &trend);
        assert_eq!(out.expert_consensus, 0.0);
        assert!(out.reasons.iter().any(|r| r.contains("shadow mode")));
    }

    #[test]
    fn research_and_esoteric_both_above_8_triggers_harmonic_convergence() {
        let engines = EngineScores { ai: 5.0, research: 8.5, esoteric: 8.1, jarvis: 5.0 };
        let trend = (TrendRecord::default(), ProviderStatus::NoData);
        let out = compute(&candidate(), &engines, &trend);
        assert!(out.confluence > 0.0);
        assert!(out.confluence <= CONFLUENCE_CAP.hi);
        assert!(out.reasons.iter().any(|r| r.contains("Harmonic convergence")));
    }

    #[test]
    fn low_stddev_alone_does_not_trigger_harmonic_convergence() {
        let engines = EngineScores { ai: 7.0, research: 7.0, esoteric: 7.0, jarvis: 7.0 };
        let trend = (TrendRecord::default(), ProviderStatus::NoData);
        let out = compute(&candidate(), &engines, &trend);
        assert!(!out.reasons.iter().any(|r| r.contains("Harmonic convergence")));
    }

    #[test]
    fn hook_penalty_never_positive() {
        let mut c = candidate();
        c.line = Some(-3.5);
        let engines = EngineScores { ai: 5.0, research: 5.0, esoteric: 5.0, jarvis: 5.0 };
        let trend = (TrendRecord::default(), ProviderStatus::NoData);
        let out = compute(&c, &engines, &trend);
        assert!(out.hook_penalty <= 0.0);
    }
}
