//! Request orchestration (C6): turns `best-bets(sport, date?)` into a scored,
//! selected, persisted list of picks.
//!
//! Candidate discovery reads the day's scoreboard plus the published prop
//! lines, builds one `Candidate` per game market and per prop, resolves a
//! shared line for each from the pre-fetch bundle, then runs the five signal
//! computers in the order the scoring contract requires: AI, Research,
//! Esoteric and Context are independent of each other and of post-base;
//! post-base runs last because it is the only computer that reads the other
//! four engines' scores. Everything that can be deduplicated across
//! candidates in the same request (moon phase, Kp-index, injuries, officials
//! per event) is resolved once and reused.

use crate::aggregator::{self, AggregatorInputs};
use crate::config::Config;
use crate::integrations::astronomy::AstronomyClient;
use crate::integrations::finance::FinanceClient;
use crate::integrations::news::NewsClient;
use crate::integrations::odds::{GameEvent, OddsClient};
use crate::integrations::officials::{OfficialsClient, OfficialsRecord};
use crate::integrations::space_weather::SpaceWeatherClient;
use crate::integrations::splits::PlaybookClient;
use crate::integrations::stats::StatsClient;
use crate::integrations::trends::TrendsClient;
use crate::models::{Candidate, GameStatus, PickType, ProviderStatus, ScoredPick, Weights};
use crate::persistence::{self, Store};
use crate::prefetch::{self, PrefetchCache};
use crate::selection;
use crate::signals::{ai, context, esoteric, jarvis, postbase, research};
use crate::signals::esoteric::EsotericInputs;
use crate::signals::postbase::EngineScores;
use crate::telemetry;
use crate::time_authority;

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Every provider client the pipeline needs, bundled so a handler only has
/// to thread one value through instead of ten `Arc`s.
pub struct Clients {
    pub odds: Arc<OddsClient>,
    pub playbook: Arc<PlaybookClient>,
    pub stats: Arc<StatsClient>,
    pub astronomy: Arc<AstronomyClient>,
    pub space_weather: Arc<SpaceWeatherClient>,
    pub trends: Arc<TrendsClient>,
    pub news: Arc<NewsClient>,
    pub officials: Arc<OfficialsClient>,
    pub finance: Arc<FinanceClient>,
}

/// Everything a `best-bets` request needs besides the sport/date itself.
pub struct RequestContext {
    pub store: Arc<Store>,
    pub clients: Arc<Clients>,
    pub config: Config,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct PhaseTimings {
    pub fetch_ms: f64,
    pub prefetch_ms: f64,
    pub score_ms: f64,
    pub select_ms: f64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IntegrationImpact {
    pub nonzero_boosts: u32,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RequestProof {
    pub integrations_called: Vec<String>,
    pub cache_hit_rate: f64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DebugPayload {
    pub candidates_considered: usize,
    pub picks_selected: usize,
    pub cache_hit_rate: f64,
    pub timings: PhaseTimings,
    pub timed_out_components: Vec<String>,
    pub integration_calls: HashMap<String, telemetry::IntegrationCounters>,
    pub integration_impact: HashMap<String, IntegrationImpact>,
    pub request_proof: RequestProof,
}

/// `{component, code, detail}` per §7's propagation policy: request handlers
/// never raise for data issues, they populate this list instead. Empty on a
/// fully successful request.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorEntry {
    pub component: String,
    pub code: String,
    pub detail: String,
}

/// Resolve the day's candidates: one per game market (spread/moneyline/
/// total) for every scheduled game, plus one per published prop line that
/// can be matched to a discovered game by team name.
async fn discover_candidates(
    sport: &str,
    et_date: NaiveDate,
    clients: &Clients,
) -> (Vec<Candidate>, Vec<GameEvent>) {
    let (events, _status) = clients.odds.get_scoreboard(sport).await;
    let todays_events: Vec<GameEvent> = events
        .into_iter()
        .filter(|e| {
            e.start_time
                .map(|ts| time_authority::is_within_day(ts, et_date))
                .unwrap_or(false)
        })
        .collect();

    let mut candidates = Vec::new();
    for event in &todays_events {
        let game_start = event.start_time.unwrap_or_else(chrono::Utc::now);
        for pick_type in [PickType::Spread, PickType::Moneyline, PickType::Total] {
            candidates.push(Candidate {
                pick_type,
                sport: sport.to_string(),
                home_team: event.home_team.clone(),
                away_team: event.away_team.clone(),
                player_name: None,
                stat_type: None,
                line: None,
                game_start,
                provider_event_id: event.provider_event_id.clone(),
                odds_american: -110,
                game_status: GameStatus::Scheduled,
            });
        }
    }

    let (props, _status) = clients.stats.get_props(sport).await;
    for prop in props {
        let Some(event) = todays_events.iter().find(|e| {
            e.home_team.eq_ignore_ascii_case(&prop.team) || e.away_team.eq_ignore_ascii_case(&prop.team)
        }) else {
            continue;
        };
        candidates.push(Candidate {
            pick_type: PickType::Prop,
            sport: sport.to_string(),
            home_team: event.home_team.clone(),
            away_team: event.away_team.clone(),
            player_name: Some(prop.player_name.clone()),
            stat_type: Some(prop.stat_type.clone()),
            line: Some(prop.line),
            game_start: event.start_time.unwrap_or_else(chrono::Utc::now),
            provider_event_id: event.provider_event_id.clone(),
            odds_american: -110,
            game_status: GameStatus::Scheduled,
        });
    }

    (candidates, todays_events)
}

/// A game market's line is synthesized from the pre-fetched cross-book
/// average; props already carry their own line from the stats provider.
fn resolve_line(candidate: &Candidate, bundle: Option<&prefetch::PrefetchBundle>) -> Option<f64> {
    if candidate.line.is_some() {
        return candidate.line;
    }
    let quote = &bundle?.odds.0;
    if quote.per_book.is_empty() {
        return None;
    }
    let sum: f64 = quote.per_book.iter().map(|b| b.line).sum();
    Some(sum / quote.per_book.len() as f64)
}

/// Home/away side string for the confirmed selection. The corpus has no
/// stated tie-break for which side of a market to display; this picks the
/// favorite by American odds sign, falling back to home for ties and for
/// markets (totals) with no intrinsic side — see DESIGN.md.
fn selection_strings(candidate: &Candidate, line: Option<f64>) -> (String, String, String) {
    match candidate.pick_type {
        PickType::Total => {
            let label = line.map(|l| format!("Total {l:.1}")).unwrap_or_else(|| "Total".to_string());
            (label, "N/A".to_string(), "total".to_string())
        }
        PickType::Prop => {
            let player = candidate.player_name.clone().unwrap_or_else(|| "Unknown".to_string());
            let stat = candidate.stat_type.clone().unwrap_or_else(|| "stat".to_string());
            let line_str = line.map(|l| format!("{l:.1}")).unwrap_or_else(|| "N/A".to_string());
            (
                format!("{player} OVER {line_str} {stat}"),
                "AWAY".to_string(),
                format!("prop_{stat}"),
            )
        }
        PickType::Spread | PickType::Moneyline | PickType::Sharp => {
            let favored_home = candidate.odds_american < 0;
            let (side, home_away) = if favored_home {
                (candidate.home_team.clone(), "HOME".to_string())
            } else {
                (candidate.away_team.clone(), "AWAY".to_string())
            };
            let label = match (candidate.pick_type, line) {
                (PickType::Spread, Some(l)) => format!("{side} {l:+.1}"),
                _ => side,
            };
            (label, home_away, candidate.pick_type.market_key().to_string())
        }
    }
}

struct ResolvedShared {
    moon: (crate::integrations::astronomy::MoonPhase, ProviderStatus),
    kp: (crate::integrations::space_weather::KpIndex, ProviderStatus),
}

/// Score a single candidate against every signal computer, in the order the
/// contract requires, and assemble the final `ScoredPick`. The min-score
/// floor and tiering both happen downstream in `selection::select`, not
/// here — this always returns a pick, scored honestly even if it will be
/// dropped by that floor.
async fn score_candidate(
    candidate: Candidate,
    weights: &Weights,
    clients: &Clients,
    store: &Store,
    prefetch_cache: &PrefetchCache,
    shared: &ResolvedShared,
    officials_by_event: &mut HashMap<String, (OfficialsRecord, ProviderStatus)>,
    injuries: &[crate::integrations::stats::InjuryReport],
) -> ScoredPick {
    let key = candidate.prefetch_key();
    let bundle = prefetch_cache.get(&key);
    let (odds, splits) = match bundle {
        Some(b) => (b.odds.clone(), b.splits.clone()),
        None => (
            clients.odds.get_odds(&candidate.sport, &candidate.home_team, &candidate.away_team).await,
            clients.playbook.get_splits(&candidate.sport, &candidate.home_team, &candidate.away_team).await,
        ),
    };

    let line = resolve_line(&candidate, bundle);
    let mut candidate = candidate;
    candidate.line = line;

    let matchup = format!("{} @ {}", candidate.away_team, candidate.home_team);

    let ai_output = ai::compute(&candidate, weights, &clients.stats).await;
    let (research_output, research_detail) = research::compute(&matchup, &odds, &splits, &clients.news).await;

    let trend = clients.trends.get_trend(&matchup).await;

    let multi_book_lines: Vec<f64> = odds.0.per_book.iter().map(|b| b.line).collect();
    let line_history_snapshots = persistence::line_history::read_snapshots(
        store,
        &candidate.sport,
        &candidate.provider_event_id,
        &candidate.stat_or_market_key(),
    )
    .await
    .unwrap_or_default();

    let esoteric_output = esoteric::compute(EsotericInputs {
        candidate: &candidate,
        moon: &shared.moon,
        trend: &trend,
        kp: &shared.kp,
        multi_book_lines: &multi_book_lines,
        line_history_snapshots: &line_history_snapshots,
    });

    let (jarvis_output, _jarvis_detail) = jarvis::compute(&candidate, &clients.finance).await;

    let officials = if let Some(existing) = officials_by_event.get(&candidate.provider_event_id) {
        existing.clone()
    } else {
        let fetched = clients.officials.get_event_officials(&candidate.provider_event_id).await;
        officials_by_event.insert(candidate.provider_event_id.clone(), fetched.clone());
        fetched
    };
    let context_output = context::compute(&candidate, injuries, &officials);

    let engines = EngineScores {
        ai: ai_output.score,
        research: research_output.score,
        esoteric: esoteric_output.score,
        jarvis: jarvis_output.score,
    };
    let post_base = postbase::compute(&candidate, &engines, &trend);

    let agg = aggregator::aggregate(AggregatorInputs {
        ai: engines.ai,
        research: engines.research,
        esoteric: engines.esoteric,
        jarvis: engines.jarvis,
        context_modifier: context_output.score - 5.0,
        confluence: post_base.confluence,
        msrf_external: post_base.msrf_external,
        jason_sim: post_base.jason_sim,
        serp_total: post_base.serp_total,
        ensemble_adjustment: post_base.ensemble,
        live_adjustment: post_base.live_adjustment,
        hook_penalty: post_base.hook_penalty,
        expert_consensus: post_base.expert_consensus,
        prop_correlation: post_base.prop_correlation,
        totals_calibration: post_base.totals_calibration,
    });

    let (selection, selection_home_away, market) = selection_strings(&candidate, candidate.line);

    let mut per_signal_provenance = HashMap::new();
    per_signal_provenance.extend(ai_output.provenance.clone());
    per_signal_provenance.extend(research_output.provenance.clone());
    per_signal_provenance.extend(esoteric_output.provenance.clone());
    per_signal_provenance.extend(jarvis_output.provenance.clone());
    per_signal_provenance.extend(context_output.provenance.clone());

    let mut integrations_used: Vec<String> = per_signal_provenance
        .values()
        .filter_map(|p| p.source_api.clone())
        .collect();
    integrations_used.sort();
    integrations_used.dedup();

    ScoredPick {
        candidate,
        pick_id: Uuid::new_v4().to_string(),
        ai_score: engines.ai,
        research_score: engines.research,
        esoteric_score: engines.esoteric,
        jarvis_score: engines.jarvis,
        research_detail,
        context_modifier: context_output.score - 5.0,
        confluence_boost: post_base.confluence,
        msrf_boost: post_base.msrf_external,
        jason_sim_boost: post_base.jason_sim,
        serp_boost: post_base.serp_total,
        ensemble_adjustment: post_base.ensemble,
        live_adjustment: post_base.live_adjustment,
        hook_penalty: post_base.hook_penalty,
        expert_consensus_boost: post_base.expert_consensus,
        prop_correlation_adjustment: post_base.prop_correlation,
        totals_calibration_adj: post_base.totals_calibration,
        final_score: agg.final_score,
        reconciliation_delta: agg.reconciliation_delta,
        tier: crate::models::Tier::Standard,
        selection,
        selection_home_away,
        market,
        reasons_ai: ai_output.reasons,
        reasons_research: research_output.reasons,
        reasons_esoteric: esoteric_output.reasons,
        reasons_jarvis: jarvis_output.reasons,
        per_signal_provenance,
        integrations_used,
    }
}

/// Top-level entry point: runs the full `best-bets(sport, date?)` request
/// under a fresh request-scoped telemetry carrier.
pub async fn run_best_bets(
    ctx: &RequestContext,
    sport: &str,
    et_date: NaiveDate,
    debug: bool,
) -> ScoredPickGroup {
    telemetry::scope(run_inner(ctx, sport, et_date, debug)).await
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ScoredPickGroup {
    pub game_picks: Vec<crate::normalize::ScoredPickOut>,
    pub props: Vec<crate::normalize::ScoredPickOut>,
    pub debug: Option<DebugPayload>,
    pub errors: Vec<ErrorEntry>,
}

async fn run_inner(ctx: &RequestContext, sport: &str, et_date: NaiveDate, debug: bool) -> ScoredPickGroup {
    let mut errors = Vec::new();
    let mut timed_out_components = Vec::new();

    let weights = persistence::weights_store::load(&ctx.store).await.unwrap_or_else(|e| {
        errors.push(ErrorEntry {
            component: "weights_store".to_string(),
            code: "STORAGE_ERROR".to_string(),
            detail: e.to_string(),
        });
        Default::default()
    });

    let fetch_started = std::time::Instant::now();
    let (candidates, _events) = discover_candidates(sport, et_date, &ctx.clients).await;
    let fetch_ms = fetch_started.elapsed().as_secs_f64() * 1000.0;

    let prefetch_started = std::time::Instant::now();
    let prefetch_outcome = prefetch::run(
        &candidates,
        ctx.clients.odds.clone(),
        ctx.clients.playbook.clone(),
        ctx.config.prefetch_pool_size,
        ctx.config.request_budget,
    )
    .await;
    let prefetch_ms = prefetch_started.elapsed().as_secs_f64() * 1000.0;
    if prefetch_outcome.timed_out {
        timed_out_components.push("prefetch".to_string());
    }
    let prefetch_cache = prefetch_outcome.cache;

    let (day_start, _day_end) = time_authority::day_bounds_et(et_date);
    let moon = ctx.clients.astronomy.get_moon_phase(day_start).await;
    let kp = ctx.clients.space_weather.get_kp_index().await;
    let shared = ResolvedShared { moon, kp };

    let (injuries, _injuries_status) = ctx.clients.stats.get_injuries(sport).await;

    let mut officials_by_event: HashMap<String, (OfficialsRecord, ProviderStatus)> = HashMap::new();

    let score_started = std::time::Instant::now();
    let mut picks = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter().cloned() {
        let pick = score_candidate(
            candidate,
            &weights,
            &ctx.clients,
            &ctx.store,
            &prefetch_cache,
            &shared,
            &mut officials_by_event,
            &injuries,
        )
        .await;
        picks.push(pick);
    }
    let score_ms = score_started.elapsed().as_secs_f64() * 1000.0;

    let select_started = std::time::Instant::now();
    let selected = selection::select(picks, et_date);
    let select_ms = select_started.elapsed().as_secs_f64() * 1000.0;

    let et_date_str = et_date.format("%Y-%m-%d").to_string();
    for pick in &selected {
        let record = crate::models::PredictionRecord::from_scored_pick(pick, &et_date_str);
        if let Err(e) = persistence::predictions::append_prediction(&ctx.store, &record).await {
            errors.push(ErrorEntry {
                component: "predictions".to_string(),
                code: "STORAGE_ERROR".to_string(),
                detail: e.to_string(),
            });
        }
    }

    let (game_picks, props) = crate::normalize::split_game_and_prop(&selected);

    let debug_payload = debug.then(|| {
        let mut integration_impact: HashMap<String, IntegrationImpact> = HashMap::new();
        for pick in &selected {
            for provenance in pick.per_signal_provenance.values() {
                let Some(source) = &provenance.source_api else { continue };
                let entry = integration_impact.entry(source.clone()).or_default();
                if provenance.status == ProviderStatus::Success {
                    entry.nonzero_boosts += 1;
                }
            }
            let all_reasons: Vec<&String> = pick
                .reasons_ai
                .iter()
                .chain(&pick.reasons_research)
                .chain(&pick.reasons_esoteric)
                .chain(&pick.reasons_jarvis)
                .collect();
            for source in &pick.integrations_used {
                let entry = integration_impact.entry(source.clone()).or_default();
                entry.reasons.extend(all_reasons.iter().map(|r| r.to_string()));
            }
        }

        let mut integrations_called: Vec<String> = telemetry::snapshot().into_keys().collect();
        integrations_called.sort();

        DebugPayload {
            candidates_considered: candidates.len(),
            picks_selected: selected.len(),
            cache_hit_rate: telemetry::current_cache_hit_rate(),
            timings: PhaseTimings {
                fetch_ms,
                prefetch_ms,
                score_ms,
                select_ms,
            },
            timed_out_components: timed_out_components.clone(),
            integration_calls: telemetry::snapshot(),
            integration_impact,
            request_proof: RequestProof {
                integrations_called,
                cache_hit_rate: telemetry::current_cache_hit_rate(),
            },
        }
    });

    ScoredPickGroup {
        game_picks,
        props,
        debug: debug_payload,
        errors,
    }
}
