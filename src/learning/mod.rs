//! Learning loop (C12): statistical auto-grading plus rule-based traps.
//!
//! Two independent adjusters write to the same weight table. Reconciliation
//! is mandatory and one-directional: a trap's adjustment always wins: the
//! auto-grader checks `persistence::traps::recent_adjustments` before
//! touching a `(engine, parameter)` pair and defers for
//! `AUTOGRADER_TRAP_DEFER_WINDOW_HOURS` if the trap loop got there first.

pub mod autograder;
pub mod trap;

use crate::models::{Outcome, PredictionRecord};
use std::collections::HashMap;

/// Enriched per-graded-pick fields a trap condition tree can reference.
/// Built once per graded `PredictionRecord` and reused by every trap
/// evaluated against it.
pub fn enrich(record: &PredictionRecord) -> HashMap<String, serde_json::Value> {
    let mut fields = HashMap::new();
    fields.insert("sport".to_string(), serde_json::json!(record.sport));
    fields.insert("pick_type".to_string(), serde_json::json!(record.pick_type));
    fields.insert("final_score".to_string(), serde_json::json!(record.final_score));
    fields.insert(
        "hit".to_string(),
        serde_json::json!(matches!(record.outcome, Some(Outcome::Hit))),
    );
    fields.insert(
        "miss".to_string(),
        serde_json::json!(matches!(record.outcome, Some(Outcome::Miss))),
    );
    if let Some(error_magnitude) = record.error_magnitude {
        fields.insert("error_magnitude".to_string(), serde_json::json!(error_magnitude));
    }
    fields
}
