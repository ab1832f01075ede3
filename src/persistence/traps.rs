//! `trap_learning/`: the trap registry plus its append-only evaluation and
//! adjustment logs. `traps.jsonl` is rewritten whole (trap state mutates —
//! trigger counts, cooldowns — so it is not itself append-only); the other
//! two are a running history of what the trap loop decided and did.

use super::Store;
use crate::errors::EngineResult;
use crate::models::TrapDefinition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const TRAPS_PATH: &str = "trap_learning/traps.jsonl";
const EVALUATIONS_PATH: &str = "trap_learning/evaluations.jsonl";
const ADJUSTMENTS_PATH: &str = "trap_learning/adjustments.jsonl";

/// One evaluation of a trap's condition against a graded game, whether or
/// not it matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapEvaluation {
    pub trap_id: String,
    pub pick_id: String,
    pub matched: bool,
    pub evaluated_at: DateTime<Utc>,
}

/// A trap adjustment that passed all guards and was applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapAdjustment {
    pub trap_id: String,
    pub target_engine: String,
    pub target_parameter: String,
    pub delta_applied: f64,
    pub applied_at: DateTime<Utc>,
}

/// The full registry is small enough to rewrite whole each time a trap's
/// mutable counters change; this mirrors `weights_store`'s whole-file
/// rewrite rather than `predictions`'s append-then-join pattern.
pub async fn load_traps(store: &Store) -> EngineResult<Vec<TrapDefinition>> {
    let lines = store.read_lines(TRAPS_PATH).await?;
    Ok(lines.iter().filter_map(|l| serde_json::from_str(l).ok()).collect())
}

pub async fn save_traps(store: &Store, traps: &[TrapDefinition]) -> EngineResult<()> {
    let mut content = String::new();
    for trap in traps {
        let line = serde_json::to_string(trap)
            .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
        content.push_str(&line);
        content.push('\n');
    }
    store.write_whole(TRAPS_PATH, &content).await
}

pub async fn append_evaluation(store: &Store, evaluation: &TrapEvaluation) -> EngineResult<()> {
    let line = serde_json::to_string(evaluation)
        .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
    store.append_line(EVALUATIONS_PATH, &line).await
}

pub async fn append_adjustment(store: &Store, adjustment: &TrapAdjustment) -> EngineResult<()> {
    let line = serde_json::to_string(adjustment)
        .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
    store.append_line(ADJUSTMENTS_PATH, &line).await
}

/// Every adjustment applied to `(target_engine, target_parameter)` within
/// `within_hours`, the input the auto-grader's 24h-defer check reads.
pub async fn recent_adjustments(
    store: &Store,
    target_engine: &str,
    target_parameter: &str,
    within_hours: i64,
) -> EngineResult<Vec<TrapAdjustment>> {
    let lines = store.read_lines(ADJUSTMENTS_PATH).await?;
    let cutoff = Utc::now() - chrono::Duration::hours(within_hours);
    Ok(lines
        .iter()
        .filter_map(|l| serde_json::from_str::<TrapAdjustment>(l).ok())
        .filter(|a| a.target_engine == target_engine && a.target_parameter == target_parameter && a.applied_at >= cutoff)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TrapAction, TrapStatus};
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

    fn sample_trap() -> TrapDefinition {
        TrapDefinition {
            id: "trap-1".into(),
            sport: "NFL".into(),
            team: Some("Bills".into()),
            condition: serde_json::json!({"field": "ats_cover", "op": "eq", "value": false}),
            action: TrapAction::WeightAdjust,
            delta: 0.03,
            target_engine: "research".into(),
            target_parameter: "sharp_boost".into(),
            single_trigger_cap: 0.05,
            lifetime_cap: 0.15,
            cooldown_hours: 24,
            max_triggers_per_week: 3,
            status: TrapStatus::Active,
            lifetime_applied: 0.0,
            triggers_this_week: 0,
            last_triggered_at: None,
        }
    }

    #[tokio::test]
    async fn traps_round_trip() {
        let (store, _dir) = test_store();
        save_traps(&store, &[sample_trap()]).await.unwrap();
        let loaded = load_traps(&store).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "trap-1");
    }

    #[tokio::test]
    async fn recent_adjustments_filters_by_target_and_window() {
        let (store, _dir) = test_store();
        append_adjustment(
            &store,
            &TrapAdjustment {
                trap_id: "trap-1".into(),
                target_engine: "research".into(),
                target_parameter: "sharp_boost".into(),
                delta_applied: 0.03,
                applied_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        let matches = recent_adjustments(&store, "research", "sharp_boost", 24).await.unwrap();
        assert_eq!(matches.len(), 1);

        let no_matches = recent_adjustments(&store, "ai", "sharp_boost", 24).await.unwrap();
        assert!(no_matches.is_empty());
    }
}
