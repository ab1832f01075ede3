//! Rule-based trap loop: per-`TrapDefinition`, evaluate a JSON condition
//! tree against every graded pick for the day; on match, apply a bounded
//! weight nudge if all guards pass.
//!
//! Guard order matters: cooldown and weekly-rate are checked against the
//! trap's own counters first (cheap, in-memory), then the single-trigger
//! and lifetime caps clamp the delta actually applied.

use crate::contract::{TRAP_DEFAULT_COOLDOWN_HOURS, TRAP_DEFAULT_MAX_TRIGGERS_PER_WEEK};
use crate::errors::EngineResult;
use crate::models::{PredictionRecord, TrapDefinition, TrapStatus, Weights};
use crate::persistence::{predictions, traps, weights_store, Store};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;

/// Evaluate a condition tree. Leaves are `{"field", "op", "value"}`;
/// `"all"`/`"any"` combine a list of subconditions. An unrecognized shape
/// evaluates to `false` rather than panicking — a malformed trap should
/// simply never fire, not take down the evaluation loop.
pub fn eval_condition(condition: &serde_json::Value, fields: &HashMap<String, serde_json::Value>) -> bool {
    if let Some(all) = condition.get("all").and_then(|v| v.as_array()) {
        return all.iter().all(|c| eval_condition(c, fields));
    }
    if let Some(any) = condition.get("any").and_then(|v| v.as_array()) {
        return any.iter().any(|c| eval_condition(c, fields));
    }

    let (Some(field), Some(op)) = (
        condition.get("field").and_then(|v| v.as_str()),
        condition.get("op").and_then(|v| v.as_str()),
    ) else {
        return false;
    };
    let Some(actual) = fields.get(field) else {
        return false;
    };
    let expected = condition.get("value").cloned().unwrap_or(serde_json::Value::Null);

    match op {
        "eq" => actual == &expected,
        "neq" => actual != &expected,
        "gt" | "lt" | "gte" | "lte" => {
            let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) else {
                return false;
            };
            match op {
                "gt" => a > b,
                "lt" => a < b,
                "gte" => a >= b,
                "lte" => a <= b,
                _ => unreachable!(),
            }
        }
        _ => false,
    }
}

fn guards_pass(trap: &TrapDefinition, now: chrono::DateTime<Utc>) -> bool {
    if trap.status != TrapStatus::Active {
        return false;
    }
    let cooldown_hours = if trap.cooldown_hours > 0 { trap.cooldown_hours } else { TRAP_DEFAULT_COOLDOWN_HOURS };
    if let Some(last) = trap.last_triggered_at {
        if now - last < chrono::Duration::hours(cooldown_hours) {
            return false;
        }
    }
    let weekly_cap = if trap.max_triggers_per_week > 0 { trap.max_triggers_per_week } else { TRAP_DEFAULT_MAX_TRIGGERS_PER_WEEK };
    if trap.triggers_this_week >= weekly_cap {
        return false;
    }
    if trap.lifetime_applied.abs() >= trap.lifetime_cap.abs() {
        return false;
    }
    true
}

fn clamped_delta(trap: &TrapDefinition) -> f64 {
    let single_cap = trap.single_trigger_cap.abs();
    let remaining_lifetime = (trap.lifetime_cap.abs() - trap.lifetime_applied.abs()).max(0.0);
    let magnitude = trap.delta.abs().min(single_cap).min(remaining_lifetime);
    magnitude * trap.delta.signum()
}

/// Runs one day's trap evaluation pass: every active trap against every
/// graded pick for `et_date`. Mutates and persists the trap registry's
/// counters, appends an evaluation record per (trap, pick) pair, and
/// appends an adjustment record for every application.
pub async fn run_trap_evaluation(store: &Store, et_date: NaiveDate) -> EngineResult<()> {
    let et_date_str = et_date.format("%Y-%m-%d").to_string();
    let mut registry = traps::load_traps(store).await?;
    let graded: Vec<PredictionRecord> = predictions::read_joined(store)
        .await?
        .into_iter()
        .filter(|r| r.et_date == et_date_str && r.outcome.is_some())
        .collect();

    let mut weights = weights_store::load(store).await?;
    let now = Utc::now();

    for trap in registry.iter_mut() {
        for record in &graded {
            let fields = super::enrich(record);
            let matched = eval_condition(&trap.condition, &fields);

            traps::append_evaluation(
                store,
                &traps::TrapEvaluation {
                    trap_id: trap.id.clone(),
                    pick_id: record.pick_id.clone(),
                    matched,
                    evaluated_at: now,
                },
            )
            .await?;

            if !matched || !guards_pass(trap, now) {
                continue;
            }

            let delta = clamped_delta(trap);
            if delta == 0.0 {
                continue;
            }

            apply_weight_delta(&mut weights, trap, record, delta);

            trap.lifetime_applied += delta.abs();
            trap.triggers_this_week += 1;
            trap.last_triggered_at = Some(now);

            traps::append_adjustment(
                store,
                &traps::TrapAdjustment {
                    trap_id: trap.id.clone(),
                    target_engine: trap.target_engine.clone(),
                    target_parameter: trap.target_parameter.clone(),
                    delta_applied: delta,
                    applied_at: now,
                },
            )
            .await?;
        }
    }

    weights_store::save(store, &weights).await?;
    traps::save_traps(store, &registry).await?;
    Ok(())
}

fn apply_weight_delta(weights: &mut Weights, trap: &TrapDefinition, record: &PredictionRecord, delta: f64) {
    let stat_or_market = record.pick_type.market_key();
    let current = weights.get(&trap.sport, stat_or_market, &trap.target_parameter).unwrap_or(0.0);
    weights.set(&trap.sport, stat_or_market, &trap.target_parameter, current + delta);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(values: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        values.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn eq_condition_matches_exact_value() {
        let condition = serde_json::json!({"field": "hit", "op": "eq", "value": true});
        let f = fields(&[("hit", serde_json::json!(true))]);
        assert!(eval_condition(&condition, &f));
    }

    #[test]
    fn gt_condition_compares_numerically() {
        let condition = serde_json::json!({"field": "final_score", "op": "gt", "value": 7.0});
        let f = fields(&[("final_score", serde_json::json!(8.1))]);
        assert!(eval_condition(&condition, &f));
        let f2 = fields(&[("final_score", serde_json::json!(6.5))]);
        assert!(!eval_condition(&condition, &f2));
    }

    #[test]
    fn all_combinator_requires_every_subcondition() {
        let condition = serde_json::json!({"all": [
            {"field": "hit", "op": "eq", "value": false},
            {"field": "final_score", "op": "gte", "value": 7.0}
        ]});
        let f = fields(&[("hit", serde_json::json!(false)), ("final_score", serde_json::json!(7.5))]);
        assert!(eval_condition(&condition, &f));
    }

    #[test]
    fn unknown_field_never_matches() {
        let condition = serde_json::json!({"field": "nonexistent", "op": "eq", "value": 1});
        assert!(!eval_condition(&condition, &HashMap::new()));
    }

    #[test]
    fn clamped_delta_respects_remaining_lifetime_budget() {
        let trap = TrapDefinition {
            id: "t1".into(),
            sport: "NFL".into(),
            team: None,
            condition: serde_json::json!({}),
            action: crate::models::TrapAction::WeightAdjust,
            delta: 0.1,
            target_engine: "research".into(),
            target_parameter: "sharp_boost".into(),
            single_trigger_cap: 0.05,
            lifetime_cap: 0.15,
            cooldown_hours: 24,
            max_triggers_per_week: 3,
            status: TrapStatus::Active,
            lifetime_applied: 0.12,
            triggers_this_week: 0,
            last_triggered_at: None,
        };
        assert!((clamped_delta(&trap) - 0.03).abs() < 1e-9);
    }

    #[test]
    fn guards_reject_paused_trap() {
        let mut trap_template = TrapDefinition {
            id: "t1".into(),
            sport: "NFL".into(),
            team: None,
            condition: serde_json::json!({}),
            action: crate::models::TrapAction::WeightAdjust,
            delta: 0.05,
            target_engine: "research".into(),
            target_parameter: "sharp_boost".into(),
            single_trigger_cap: 0.05,
            lifetime_cap: 0.15,
            cooldown_hours: 24,
            max_triggers_per_week: 3,
            status: TrapStatus::Paused,
            lifetime_applied: 0.0,
            triggers_this_week: 0,
            last_triggered_at: None,
        };
        assert!(!guards_pass(&trap_template, Utc::now()));
        trap_template.status = TrapStatus::Active;
        assert!(guards_pass(&trap_template, Utc::now()));
    }
}
