//! Statistical auto-grader: reads a day's graded picks, computes per-signal
//! bias, and nudges the weight table — unless the trap loop already
//! touched that `(engine, parameter)` cell in the last
//! `AUTOGRADER_TRAP_DEFER_WINDOW_HOURS`, in which case it defers and
//! records why.

use crate::contract::{AUTOGRADER_DAILY_DECAY, AUTOGRADER_MAX_ADJUSTMENT, AUTOGRADER_TRAP_DEFER_WINDOW_HOURS};
use crate::errors::EngineResult;
use crate::models::{Outcome, PredictionRecord};
use crate::persistence::{audit, predictions, traps, weights_store, Store};
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;

struct SignalGroup {
    hits: u32,
    misses: u32,
    error_sum: f64,
    error_count: u32,
}

impl SignalGroup {
    fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.5
        } else {
            self.hits as f64 / total as f64
        }
    }

    fn mean_error(&self) -> f64 {
        if self.error_count == 0 {
            0.0
        } else {
            self.error_sum / self.error_count as f64
        }
    }
}

/// Runs one day's grading pass. Idempotent from the caller's side: running
/// it twice for the same `et_date` just recomputes the same bias from the
/// same graded picks and rewrites the same artifacts.
pub async fn run_daily_grading(store: &Store, et_date: NaiveDate) -> EngineResult<()> {
    let et_date_str = et_date.format("%Y-%m-%d").to_string();
    let graded: Vec<PredictionRecord> = predictions::read_joined(store)
        .await?
        .into_iter()
        .filter(|r| r.et_date == et_date_str && r.outcome.is_some())
        .collect();

    if graded.is_empty() {
        return Ok(());
    }

    let mut groups: HashMap<(String, String, String), SignalGroup> = HashMap::new();
    for record in &graded {
        let stat_or_market = record.pick_type.market_key().to_string();
        for signal in record.per_signal_contributions.keys() {
            let key = (record.sport.clone(), stat_or_market.clone(), signal.clone());
            let group = groups.entry(key).or_insert(SignalGroup {
                hits: 0,
                misses: 0,
                error_sum: 0.0,
                error_count: 0,
            });
            match record.outcome {
                Some(Outcome::Hit) => group.hits += 1,
                Some(Outcome::Miss) => group.misses += 1,
                _ => {}
            }
            if let Some(error) = record.error_magnitude {
                group.error_sum += error;
                group.error_count += 1;
            }
        }
    }

    let mut weights = weights_store::load(store).await?;
    let mut entries = Vec::new();
    let mut applied = 0u32;
    let mut deferred = 0u32;

    for ((sport, stat_or_market, signal), group) in &groups {
        let deferred_to_trap = !traps::recent_adjustments(
            store,
            signal,
            stat_or_market,
            AUTOGRADER_TRAP_DEFER_WINDOW_HOURS,
        )
        .await?
        .is_empty();

        let weight_before = weights.get(sport, stat_or_market, signal).unwrap_or(0.0);
        let bias = group.hit_rate() - 0.5;
        let raw_adjustment = bias * AUTOGRADER_DAILY_DECAY;
        let adjustment = raw_adjustment.clamp(-AUTOGRADER_MAX_ADJUSTMENT, AUTOGRADER_MAX_ADJUSTMENT);

        let weight_after = if deferred_to_trap {
            weight_before
        } else {
            weight_before + adjustment
        };

        if deferred_to_trap {
            deferred += 1;
        } else if adjustment != 0.0 {
            applied += 1;
            weights.set(sport, stat_or_market, signal, weight_after);
        }

        entries.push(audit::AuditEntry {
            sport: sport.clone(),
            stat_or_market: stat_or_market.clone(),
            signal: signal.clone(),
            mean_error: group.mean_error(),
            hit_rate: group.hit_rate(),
            weight_before,
            weight_after,
            deferred_to_trap,
        });
    }

    weights_store::save(store, &weights).await?;

    audit::write_audit_log(
        store,
        et_date,
        &audit::AuditLog {
            et_date: et_date_str.clone(),
            generated_at: Utc::now(),
            entries,
        },
    )
    .await?;

    let summary = format!(
        "{} graded picks, {} signals adjusted, {} deferred to trap layer",
        graded.len(),
        applied,
        deferred
    );
    audit::write_lesson(
        store,
        et_date,
        &audit::Lesson {
            et_date: et_date_str,
            generated_at: Utc::now(),
            summary,
            adjustments_applied: applied,
            adjustments_deferred: deferred,
        },
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PickType, Tier};
    use std::time::Duration;

    fn test_store() -> (Store, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::Config {
            port: 8080,
            volume_mount: dir.path().to_path_buf(),
            request_budget: Duration::from_secs(45),
            provider_timeout: Duration::from_secs(2),
            prefetch_pool_size: 16,
            demo_mode: false,
        };
        (Store::new(config), dir)
    }

    fn graded_record(pick_id: &str, outcome: Outcome) -> PredictionRecord {
        let mut per_signal_contributions = HashMap::new();
        per_signal_contributions.insert("ai_model".to_string(), 0.0);
        PredictionRecord {
            pick_id: pick_id.to_string(),
            et_date: "2026-01-15".to_string(),
            sport: "NBA".to_string(),
            selection: "Lakers".to_string(),
            line: Some(-3.5),
            odds_american: -110,
            pick_type: PickType::Spread,
            ai_score: 7.0,
            research_score: 7.0,
            esoteric_score: 6.0,
            jarvis_score: 6.5,
            post_base_adjustments: HashMap::new(),
            per_signal_contributions,
            final_score: 7.2,
            tier: Tier::Silver,
            created_at: Utc::now(),
            outcome: Some(outcome),
            error_magnitude: Some(0.3),
            graded_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn no_graded_picks_is_a_harmless_no_op() {
        let (store, _dir) = test_store();
        let et_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        run_daily_grading(&store, et_date).await.unwrap();
        assert!(audit::read_audit_log(&store, et_date).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn grading_writes_audit_log_and_lesson() {
        let (store, _dir) = test_store();
        predictions::append_prediction(&store, &graded_record("p1", Outcome::Hit)).await.unwrap();
        predictions::append_prediction(&store, &graded_record("p2", Outcome::Hit)).await.unwrap();

        let et_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        run_daily_grading(&store, et_date).await.unwrap();

        let log = audit::read_audit_log(&store, et_date).await.unwrap().unwrap();
        assert_eq!(log.entries.len(), 1);
        assert_eq!(log.entries[0].hit_rate, 1.0);

        let lessons = audit::read_lessons(&store).await.unwrap();
        assert_eq!(lessons.len(), 1);
    }

    #[tokio::test]
    async fn defers_when_trap_already_adjusted_same_cell() {
        let (store, _dir) = test_store();
        predictions::append_prediction(&store, &graded_record("p1", Outcome::Hit)).await.unwrap();
        traps::append_adjustment(
            &store,
            &traps::TrapAdjustment {
                trap_id: "t1".into(),
                target_engine: "ai_model".into(),
                target_parameter: "spread".into(),
                delta_applied: 0.02,
                applied_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let et_date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        run_daily_grading(&store, et_date).await.unwrap();

        let log = audit::read_audit_log(&store, et_date).await.unwrap().unwrap();
        assert!(log.entries[0].deferred_to_trap);
        assert_eq!(log.entries[0].weight_before, log.entries[0].weight_after);
    }
}
