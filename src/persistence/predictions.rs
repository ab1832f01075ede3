//! `predictions/predictions.jsonl`: one line per prediction at emission
//! time, plus later grading-update lines appended by the nightly grader.
//! Pairs are joined at read time — never by rewriting the original line.

use super::Store;
use crate::errors::EngineResult;
use crate::models::{Outcome, PredictionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const PATH: &str = "predictions/predictions.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
enum Line {
    Prediction(PredictionRecord),
    Grading {
        pick_id: String,
        outcome: Outcome,
        error_magnitude: f64,
        graded_at: DateTime<Utc>,
    },
}

pub async fn append_prediction(store: &Store, record: &PredictionRecord) -> EngineResult<()> {
    let line = serde_json::to_string(&Line::Prediction(record.clone()))
        .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
    store.append_line(PATH, &line).await
}

pub async fn append_grading(
    store: &Store,
    pick_id: &str,
    outcome: Outcome,
    error_magnitude: f64,
) -> EngineResult<()> {
    let line = serde_json::to_string(&Line::Grading {
        pick_id: pick_id.to_string(),
        outcome,
        error_magnitude,
        graded_at: Utc::now(),
    })
    .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
    store.append_line(PATH, &line).await
}

/// Fold the append-only log into one `PredictionRecord` per `pick_id`,
/// applying any later grading-update line on top of the original
/// prediction. Order of lines within the file determines which grading
/// update wins if more than one somehow exists for the same pick.
pub async fn read_joined(store: &Store) -> EngineResult<Vec<PredictionRecord>> {
    let lines = store.read_lines(PATH).await?;
    let mut by_id: std::collections::HashMap<String, PredictionRecord> = std::collections::HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for raw in lines {
        let parsed: Line = match serde_json::from_str(&raw) {
            Ok(l) => l,
            Err(_) => continue,
        };
        match parsed {
            Line::Prediction(record) => {
                if !by_id.contains_key(&record.pick_id) {
                    order.push(record.pick_id.clone());
                }
                by_id.insert(record.pick_id.clone(), record);
            }
            Line::Grading { pick_id, outcome, error_magnitude, graded_at } => {
                if let Some(existing) = by_id.get_mut(&pick_id) {
                    existing.outcome = Some(outcome);
                    existing.error_magnitude = Some(error_magnitude);
                    existing.graded_at = Some(graded_at);
                }
            }
        }
    }

    Ok(order.into_iter().filter_map(|id| by_id.remove(&id)).collect())
}

/// Ungraded predictions for a given ET date, the input the auto-grader and
/// trap loop both read from.
pub async fn read_ungraded_for_date(store: &Store, et_date: &str) -> EngineResult<Vec<PredictionRecord>> {
    let all = read_joined(store).await?;
    Ok(all
        .into_iter()
        .filter(|r| r.et_date == et_date && r.outcome.is_none())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PickType, Tier};
    use std::collections::HashMap;
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

    fn record(pick_id: &str) -> PredictionRecord {
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
            per_signal_contributions: HashMap::new(),
            final_score: 7.2,
            tier: Tier::Silver,
            created_at: Utc::now(),
            outcome: None,
            error_magnitude: None,
            graded_at: None,
        }
    }

    #[tokio::test]
    async fn grading_line_joins_onto_prediction() {
        let (store, _dir) = test_store();
        append_prediction(&store, &record("p1")).await.unwrap();
        append_grading(&store, "p1", Outcome::Hit, 0.3).await.unwrap();

        let joined = read_joined(&store).await.unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].outcome, Some(Outcome::Hit));
    }

    #[tokio::test]
    async fn ungraded_filter_excludes_graded_picks() {
        let (store, _dir) = test_store();
        append_prediction(&store, &record("p1")).await.unwrap();
        append_prediction(&store, &record("p2")).await.unwrap();
        append_grading(&store, "p1", Outcome::Miss, 1.0).await.unwrap();

        let ungraded = read_ungraded_for_date(&store, "2026-01-15").await.unwrap();
        assert_eq!(ungraded.len(), 1);
        assert_eq!(ungraded[0].pick_id, "p2");
    }
}
