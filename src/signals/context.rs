//! Context modifier (§4.6). Not a fifth weighted engine — a single bounded
//! delta folded directly into the aggregator formula, built from whatever
//! real signals are actually available: pace/usage vacuum from injuries,
//! officials tendency, and venue surface/altitude.
//!
//! Two plausible components have no backing provider in the integration
//! registry: travel fatigue (would need stadium coordinate tables,
//! explicitly out of scope) and live in-game state (no live-score feed is
//! registered). Both resolve to `0.0` with a NO_DATA reason rather than
//! being faked — see the design notes.

use super::EngineOutput;
use crate::contract::CONTEXT_MODIFIER_CAP;
use crate::integrations::stats::InjuryReport;
use crate::models::{Candidate, GameStatus, ProviderStatus};
use crate::signals::{external_provenance, internal_provenance};
use std::collections::HashMap;

/// Injury-driven "usage vacuum": a starter ruled OUT opens up opportunity
/// for teammates, a meaningful signal for props specifically.
fn usage_vacuum(candidate: &Candidate, injuries: &[InjuryReport]) -> (f64, Option<String>) {
    let relevant_team_outs = injuries
        .iter()
        .filter(|i| i.status.eq_ignore_ascii_case("OUT"))
        .filter(|i| {
            i.team.eq_ignore_ascii_case(&candidate.home_team)
                || i.team.eq_ignore_ascii_case(&candidate.away_team)
        })
        .count();
    if relevant_team_outs == 0 {
        return (0.0, None);
    }
    let delta = (relevant_team_outs as f64 * 0.05).min(0.15);
    (
        delta,
        Some(format!("{relevant_team_outs} relevant OUT designation(s) open usage")),
    )
}

fn officials_tendency(officials: &(crate::integrations::officials::OfficialsRecord, ProviderStatus)) -> (f64, Option<String>) {
    let (record, status) = officials;
    if *status != ProviderStatus::Success {
        return (0.0, None);
    }
    match record.home_cover_rate {
        Some(rate) if rate > 55.0 => (0.1, Some(format!("Crew {:?} favors home ATS at {rate:.0}%", record.crew_name))),
        Some(rate) if rate < 45.0 => (-0.1, Some(format!("Crew {:?} favors away ATS at {rate:.0}%", record.crew_name))),
        _ => (0.0, None),
    }
}

fn venue_surface(officials: &(crate::integrations::officials::OfficialsRecord, ProviderStatus)) -> (f64, Option<String>) {
    let (record, status) = officials;
    if *status != ProviderStatus::Success {
        return (0.0, None);
    }
    match record.venue_altitude_ft {
        Some(altitude) if altitude > 4000.0 => (
            0.05,
            Some(format!("High-altitude venue ({altitude:.0} ft) favors the over/home")),
        ),
        _ => (0.0, None),
    }
}

pub fn compute(
    candidate: &Candidate,
    injuries: &[InjuryReport],
    officials: &(crate::integrations::officials::OfficialsRecord, ProviderStatus),
) -> EngineOutput {
    let mut reasons = Vec::new();
    let mut provenance = HashMap::new();

    let (vacuum_delta, vacuum_reason) = usage_vacuum(candidate, injuries);
    if let Some(r) = vacuum_reason {
        reasons.push(r);
    }
    provenance.insert(
        "context_usage_vacuum".to_string(),
        external_provenance("player_stats", ProviderStatus::Success, false, HashMap::new()),
    );

    let (tendency_delta, tendency_reason) = officials_tendency(officials);
    if let Some(r) = tendency_reason {
        reasons.push(r);
    }
    let (surface_delta, surface_reason) = venue_surface(officials);
    if let Some(r) = surface_reason {
        reasons.push(r);
    }
    provenance.insert(
        "context_officials".to_string(),
        external_provenance("officials", officials.1, false, HashMap::new()),
    );

    // Travel fatigue: no stadium coordinate source is registered.
    provenance.insert("context_travel".to_string(), internal_provenance(HashMap::new()));

    // Live in-game state: no live-score feed is registered.
    let live_delta = if candidate.game_status == GameStatus::Live {
        reasons.push("live game-state context unavailable; no live feed registered".to_string());
        0.0
    } else {
        0.0
    };
    provenance.insert("context_live".to_string(), internal_provenance(HashMap::new()));

    let raw = vacuum_delta + tendency_delta + surface_delta + live_delta;
    let clamped = CONTEXT_MODIFIER_CAP.clamp(raw);

    EngineOutput {
        score: clamped,
        reasons,
        provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::officials::OfficialsRecord;
    use crate::models::PickType;
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
    fn modifier_stays_within_cap() {
        let injuries = vec![
            InjuryReport { player_name: "A".into(), status: "OUT".into(), team: "Lakers".into() },
            InjuryReport { player_name: "B".into(), status: "OUT".into(), team: "Lakers".into() },
            InjuryReport { player_name: "C".into(), status: "OUT".into(), team: "Lakers".into() },
        ];
        let officials = (
            OfficialsRecord {
                crew_name: Some("Crew A".into()),
                home_cover_rate: Some(65.0),
                avg_total_points: None,
                venue_altitude_ft: Some(5300.0),
                venue_surface: None,
            },
            ProviderStatus::Success,
        );
        let out = compute(&candidate(), &injuries, &officials);
        assert!(out.score <= CONTEXT_MODIFIER_CAP.hi + 1e-9);
        assert!(out.score >= CONTEXT_MODIFIER_CAP.lo - 1e-9);
    }

    #[test]
    fn no_injuries_or_officials_data_yields_zero() {
        let officials = (OfficialsRecord::default(), ProviderStatus::NoData);
        let out = compute(&candidate(), &[], &officials);
        assert_eq!(out.score, 0.0);
    }
}
