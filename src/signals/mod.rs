//! Signal computers (C6). Every function in here is pure with respect to
//! cross-request state: it may call provider clients, but holds nothing
//! between calls. Each returns a uniform `SignalResult` (see `models.rs`).

pub mod ai;
pub mod context;
pub mod esoteric;
pub mod jarvis;
pub mod postbase;
pub mod research;

use crate::models::{CallProof, Provenance, SignalResult, SourceType};
use std::collections::HashMap;

/// Build a provenance record for a signal backed by a live/cached external
/// call.
pub fn external_provenance(
    source_api: &str,
    status: crate::models::ProviderStatus,
    cache_hit: bool,
    raw_inputs: HashMap<String, String>,
) -> Provenance {
    Provenance {
        source_api: Some(source_api.to_string()),
        source_type: SourceType::External,
        status,
        call_proof: if cache_hit {
            CallProof::CacheHit
        } else if status == crate::models::ProviderStatus::Success {
            CallProof::Http2xxDelta { delta: 1 }
        } else {
            CallProof::None
        },
        raw_inputs_summary: raw_inputs,
    }
}

/// Build a provenance record for a signal computed purely from internal
/// math (no external call at all).
pub fn internal_provenance(raw_inputs: HashMap<String, String>) -> Provenance {
    Provenance {
        source_api: None,
        source_type: SourceType::Internal,
        status: crate::models::ProviderStatus::Success,
        call_proof: CallProof::None,
        raw_inputs_summary: raw_inputs,
    }
}

pub fn no_data_result(source_api: Option<&str>, source_type: SourceType) -> SignalResult {
    SignalResult::no_data(source_api, source_type)
}

/// Output of one of the four base engines: a clamped 0-10 score, the
/// reasons that produced it, and the provenance of every sub-signal it
/// folded in.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub score: f64,
    pub reasons: Vec<String>,
    pub provenance: HashMap<String, Provenance>,
}

impl EngineOutput {
    pub fn clamp_score(mut self) -> Self {
        self.score = crate::contract::ENGINE_SCORE_RANGE.clamp(self.score);
        self
    }
}

