//! Data model (§3): Candidate, ScoredPick, PredictionRecord, Weights,
//! TrapDefinition, and the shared enums every component threads through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pick-type tag. Game picks carry the market tag directly — there is no
/// generic `"GAME"` variant; per the design notes, a fallback branch for
/// `"GAME"` is a bug, so every match on this enum must be exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PickType {
    Spread,
    Moneyline,
    Total,
    Prop,
    Sharp,
}

impl PickType {
    /// Lower-case key used to index `Weights` — game markets use the pick
    /// type name, props use the stat name instead (see `StatOrMarket`).
    pub fn market_key(&self) -> &'static str {
        match self {
            PickType::Spread => "spread",
            PickType::Moneyline => "moneyline",
            PickType::Total => "total",
            PickType::Prop => "prop",
            PickType::Sharp => "sharp",
        }
    }

    pub fn is_game_market(&self) -> bool {
        !matches!(self, PickType::Prop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Scheduled,
    Live,
    Final,
}

/// A potential bet under consideration before scoring. Produced from raw
/// provider data at request time; discarded after the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub pick_type: PickType,
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    pub player_name: Option<String>,
    pub stat_type: Option<String>,
    pub line: Option<f64>,
    pub game_start: DateTime<Utc>,
    pub provider_event_id: String,
    pub odds_american: i32,
    pub game_status: GameStatus,
}

impl Candidate {
    /// The key used for `Weights` lookup: lower-cased pick type for game
    /// markets, the stat name for props.
    pub fn stat_or_market_key(&self) -> String {
        match self.pick_type {
            PickType::Prop => self
                .stat_type
                .clone()
                .unwrap_or_else(|| "unknown_stat".to_string())
                .to_lowercase(),
            other => other.market_key().to_string(),
        }
    }

    /// The `(home, away, target)` tuple the pre-fetch planner dedups on.
    /// `target` is the stat type for props, the pick type for game markets —
    /// a partial key here is the cache-contamination bug the design notes
    /// warn about, so every field that distinguishes results must be present.
    pub fn prefetch_key(&self) -> (String, String, String) {
        let target = match &self.stat_type {
            Some(stat) => stat.to_lowercase(),
            None => self.pick_type.market_key().to_string(),
        };
        (
            self.home_team.to_lowercase(),
            self.away_team.to_lowercase(),
            target,
        )
    }
}

/// Strength of a sharp-money signal; `None` is the only legal value whenever
/// the Playbook source did not return SUCCESS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SharpStrength {
    None,
    Weak,
    Moderate,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    TitaniumSmash,
    GoldStar,
    Silver,
    Standard,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::TitaniumSmash => "TITANIUM_SMASH",
            Tier::GoldStar => "GOLD_STAR",
            Tier::Silver => "SILVER",
            Tier::Standard => "STANDARD",
        }
    }
}

/// Source of an external signal input, surfaced per the provenance contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    External,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    Success,
    NoData,
    Timeout,
    Error,
    SkippedQuota,
    Disabled,
    NotRelevant,
}

/// Per-signal provenance: where the value came from, and whether it can be
/// trusted to have actually moved the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub source_api: Option<String>,
    pub source_type: SourceType,
    pub status: ProviderStatus,
    /// `cache_hit` or an HTTP-2xx call-count delta, proving the data used
    /// really came from a live call and not a stale/placeholder value.
    pub call_proof: CallProof,
    pub raw_inputs_summary: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum CallProof {
    CacheHit,
    Http2xxDelta { delta: u32 },
    None,
}

/// Uniform output of every signal computer (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalResult {
    pub value: f64,
    pub triggered: bool,
    pub reasons: Vec<String>,
    pub provenance: Provenance,
}

impl SignalResult {
    pub fn no_data(source_api: Option<&str>, source_type: SourceType) -> Self {
        Self {
            value: 0.0,
            triggered: false,
            reasons: Vec::new(),
            provenance: Provenance {
                source_api: source_api.map(str::to_string),
                source_type,
                status: ProviderStatus::NoData,
                call_proof: CallProof::None,
                raw_inputs_summary: HashMap::new(),
            },
        }
    }
}

/// The Research engine's two strictly-separated source signals, broken out
/// as typed fields (rather than folded into the generic provenance map) so
/// the separation invariants in §8 are directly checkable: `sharp_boost >
/// 0` must imply `sharp_source_api == "playbook"` and `sharp_status ==
/// SUCCESS`; `sharp_status != SUCCESS` must imply `sharp_strength ==
/// SharpStrength::None` and no reason beginning with "Sharp".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchDetail {
    pub sharp_boost: f64,
    pub sharp_strength: SharpStrength,
    pub sharp_source_api: &'static str,
    pub sharp_status: ProviderStatus,
    pub sharp_raw_inputs: HashMap<String, String>,

    pub line_boost: f64,
    pub line_source_api: &'static str,
    pub line_status: ProviderStatus,
    pub line_raw_inputs: HashMap<String, String>,
}

/// A Candidate plus every engine score, every additive term, and the
/// provenance of every signal that fed them. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPick {
    pub candidate: Candidate,
    pub pick_id: String,

    pub ai_score: f64,
    pub research_score: f64,
    pub esoteric_score: f64,
    pub jarvis_score: f64,

    pub research_detail: ResearchDetail,

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
    pub reconciliation_delta: f64,
    pub tier: Tier,

    pub selection: String,
    pub selection_home_away: String,
    pub market: String,

    pub reasons_ai: Vec<String>,
    pub reasons_research: Vec<String>,
    pub reasons_esoteric: Vec<String>,
    pub reasons_jarvis: Vec<String>,

    /// Signal name -> provenance, 28 signals wide (§3).
    pub per_signal_provenance: HashMap<String, Provenance>,

    /// Which integrations were actually used, snapshotted verbatim.
    pub integrations_used: Vec<String>,
}

impl ScoredPick {
    pub fn titanium_eligible(&self) -> bool {
        let engines = [
            self.ai_score,
            self.research_score,
            self.esoteric_score,
            self.jarvis_score,
        ];
        engines
            .iter()
            .filter(|&&s| s >= crate::contract::TITANIUM_ENGINE_THRESHOLD)
            .count()
            >= crate::contract::TITANIUM_MIN_ENGINES
    }
}

/// Outcome of a graded pick, filled in after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Hit,
    Miss,
    Push,
}

/// The persisted form of a `ScoredPick`, enriched with grading fields.
/// Append-only: outcome fields are filled via a read-modify-append workflow,
/// never an in-place mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub pick_id: String,
    pub et_date: String,
    pub sport: String,
    pub selection: String,
    pub line: Option<f64>,
    pub odds_american: i32,
    pub pick_type: PickType,

    pub ai_score: f64,
    pub research_score: f64,
    pub esoteric_score: f64,
    pub jarvis_score: f64,

    pub post_base_adjustments: HashMap<String, f64>,
    pub per_signal_contributions: HashMap<String, f64>,

    pub final_score: f64,
    pub tier: Tier,

    pub created_at: DateTime<Utc>,

    pub outcome: Option<Outcome>,
    pub error_magnitude: Option<f64>,
    pub graded_at: Option<DateTime<Utc>>,
}

impl PredictionRecord {
    pub fn from_scored_pick(pick: &ScoredPick, et_date: &str) -> Self {
        let mut post_base_adjustments = HashMap::new();
        post_base_adjustments.insert("confluence".to_string(), pick.confluence_boost);
        post_base_adjustments.insert("msrf".to_string(), pick.msrf_boost);
        post_base_adjustments.insert("jason_sim".to_string(), pick.jason_sim_boost);
        post_base_adjustments.insert("serp".to_string(), pick.serp_boost);
        post_base_adjustments.insert("ensemble".to_string(), pick.ensemble_adjustment);
        post_base_adjustments.insert("live".to_string(), pick.live_adjustment);
        post_base_adjustments.insert("hook_penalty".to_string(), pick.hook_penalty);
        post_base_adjustments.insert("expert_consensus".to_string(), pick.expert_consensus_boost);
        post_base_adjustments.insert(
            "prop_correlation".to_string(),
            pick.prop_correlation_adjustment,
        );
        post_base_adjustments.insert(
            "totals_calibration".to_string(),
            pick.totals_calibration_adj,
        );

        let per_signal_contributions = pick
            .per_signal_provenance
            .iter()
            .map(|(k, _)| (k.clone(), 0.0))
            .collect();

        Self {
            pick_id: pick.pick_id.clone(),
            et_date: et_date.to_string(),
            sport: pick.candidate.sport.clone(),
            selection: pick.selection.clone(),
            line: pick.candidate.line,
            odds_american: pick.candidate.odds_american,
            pick_type: pick.candidate.pick_type,
            ai_score: pick.ai_score,
            research_score: pick.research_score,
            esoteric_score: pick.esoteric_score,
            jarvis_score: pick.jarvis_score,
            post_base_adjustments,
            per_signal_contributions,
            final_score: pick.final_score,
            tier: pick.tier,
            created_at: Utc::now(),
            outcome: None,
            error_magnitude: None,
            graded_at: None,
        }
    }
}

/// `(sport, stat-type-or-market) -> {signal-name -> weight}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Weights {
    pub table: HashMap<String, HashMap<String, f64>>,
}

impl Weights {
    pub fn key(sport: &str, stat_or_market: &str) -> String {
        format!("{}:{}", sport.to_lowercase(), stat_or_market.to_lowercase())
    }

    pub fn get(&self, sport: &str, stat_or_market: &str, signal: &str) -> Option<f64> {
        self.table
            .get(&Self::key(sport, stat_or_market))
            .and_then(|m| m.get(signal))
            .copied()
    }

    pub fn set(&mut self, sport: &str, stat_or_market: &str, signal: &str, weight: f64) {
        self.table
            .entry(Self::key(sport, stat_or_market))
            .or_default()
            .insert(signal.to_string(), weight);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapAction {
    WeightAdjust,
    AuditTrigger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapStatus {
    Active,
    Paused,
    Retired,
}

/// A declarative rule: on a matching graded outcome, nudge a named engine
/// parameter by a bounded delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrapDefinition {
    pub id: String,
    pub sport: String,
    pub team: Option<String>,
    /// Condition tree serialized as JSON; evaluated by `learning::trap`.
    pub condition: serde_json::Value,
    pub action: TrapAction,
    pub delta: f64,
    pub target_engine: String,
    pub target_parameter: String,
    pub single_trigger_cap: f64,
    pub lifetime_cap: f64,
    pub cooldown_hours: i64,
    pub max_triggers_per_week: u32,
    pub status: TrapStatus,

    pub lifetime_applied: f64,
    pub triggers_this_week: u32,
    pub last_triggered_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prop_uses_stat_name_for_weight_key() {
        let c = Candidate {
            pick_type: PickType::Prop,
            sport: "NBA".into(),
            home_team: "Lakers".into(),
            away_team: "Celtics".into(),
            player_name: Some("Player X".into()),
            stat_type: Some("Points".into()),
            line: Some(24.5),
            game_start: Utc::now(),
            provider_event_id: "evt1".into(),
            odds_american: -110,
            game_status: GameStatus::Scheduled,
        };
        assert_eq!(c.stat_or_market_key(), "points");
    }

    #[test]
    fn game_market_uses_pick_type_for_weight_key() {
        let c = Candidate {
            pick_type: PickType::Spread,
            sport: "NFL".into(),
            home_team: "A".into(),
            away_team: "B".into(),
            player_name: None,
            stat_type: None,
            line: Some(-3.5),
            game_start: Utc::now(),
            provider_event_id: "evt2".into(),
            odds_american: -110,
            game_status: GameStatus::Scheduled,
        };
        assert_eq!(c.stat_or_market_key(), "spread");
    }

    #[test]
    fn prefetch_key_is_fully_qualified() {
        let c = Candidate {
            pick_type: PickType::Prop,
            sport: "NBA".into(),
            home_team: "Lakers".into(),
            away_team: "Celtics".into(),
            player_name: Some("Player X".into()),
            stat_type: Some("Rebounds".into()),
            line: Some(8.5),
            game_start: Utc::now(),
            provider_event_id: "evt3".into(),
            odds_american: -110,
            game_status: GameStatus::Scheduled,
        };
        assert_eq!(
            c.prefetch_key(),
            ("lakers".to_string(), "celtics".to_string(), "rebounds".to_string())
        );
    }
}
