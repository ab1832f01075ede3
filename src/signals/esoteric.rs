//! Esoteric engine (weight 0.15, §4.6).
//!
//! Two families fold into one raw accumulator that is clamped to `[0, 10]`
//! only at the very end:
//!
//! - The **GLITCH aggregate**: six physics/anomaly-flavored sub-signals with
//!   fixed weights (sum 1.20) declared in the contract. Hurst and Benford
//!   each have a minimum-sample precondition; below it they contribute 0.0
//!   and log NO_DATA rather than silently degrading to a smaller estimate.
//! - **Phase-8**: thirteen smaller signals, each a bounded delta on the same
//!   accumulator.
//!
//! Every sub-signal is a pure function of its inputs — team/player names,
//! the game date, and whatever external records the caller already fetched
//! through the pre-fetch cache. None of them read wall-clock time directly.

use super::EngineOutput;
use crate::contract::{
    ESOTERIC_NEUTRAL_BASELINE, GLITCH_BENFORD_WEIGHT, GLITCH_CHROME_WEIGHT,
    GLITCH_KP_WEIGHT, GLITCH_NOOSPHERE_WEIGHT, GLITCH_TO_SCORE_SCALE, GLITCH_VOID_WEIGHT,
    GLITCH_HURST_WEIGHT, BENFORD_MIN_UNIQUE_VALUES, HURST_MIN_SNAPSHOTS, PHASE8_SIGNAL_DELTA_CAP,
};
use crate::integrations::astronomy::MoonPhase;
use crate::integrations::space_weather::KpIndex;
use crate::integrations::trends::TrendRecord;
use crate::models::{Candidate, PickType, ProviderStatus};
use crate::signals::{external_provenance, internal_provenance, no_data_result};
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;

/// Everything the esoteric engine needs, already resolved by the caller
/// (pre-fetch cache hit or inline call) — this function itself never calls
/// a provider client directly for multi-book data.
pub struct EsotericInputs<'a> {
    pub candidate: &'a Candidate,
    pub moon: &'a (MoonPhase, ProviderStatus),
    pub trend: &'a (TrendRecord, ProviderStatus),
    pub kp: &'a (KpIndex, ProviderStatus),
    /// Cross-book line values for this game/prop, aggregated; feeds Benford.
    pub multi_book_lines: &'a [f64],
    /// Chronological line snapshots (oldest first) for this candidate's
    /// target, sourced from the `line_history` store; feeds Hurst.
    pub line_history_snapshots: &'a [f64],
}

fn gematria_digit(name: &str) -> u32 {
    let sum: u32 = name
        .bytes()
        .filter(|b| b.is_ascii_alphabetic())
        .map(|b| (b.to_ascii_lowercase() - b'a') as u32 + 1)
        .sum();
    if sum == 0 {
        0
    } else {
        // Pythagorean digital root.
        let mut n = sum;
        while n >= 10 {
            n = n.to_string().bytes().map(|d| (d - b'0') as u32).sum();
        }
        n
    }
}

/// Chrome-resonance: a player's name-gematria digit against the game date's
/// day-of-month digital root. No birthdate feed is registered in C3, so this
/// uses the player's name as the deterministic anchor instead of a literal
/// birthday, the same deterministic-substitute pattern gematria signals use
/// elsewhere in this engine.
fn chrome_resonance(candidate: &Candidate, game_date: DateTime<Utc>) -> (f64, Option<String>) {
    let Some(player) = &candidate.player_name else {
        return (0.0, None);
    };
    let name_digit = gematria_digit(player);
    let date_digit = game_date.day() % 9 + 1;
    let distance = (name_digit as i32 - date_digit as i32).unsigned_abs();
    let resonance = 1.0 - (distance as f64 / 9.0);
    if resonance > 0.6 {
        (
            resonance,
            Some(format!("Chrome resonance {resonance:.2} for {player}")),
        )
    } else {
        (resonance.max(0.0), None)
    }
}

/// Void-of-course moon: phase fractions near the new/full boundary are
/// treated as a low-energy "void" window.
fn void_of_course(moon: &(MoonPhase, ProviderStatus)) -> (f64, Option<String>) {
    let (record, status) = moon;
    if *status != ProviderStatus::Success {
        return (0.0, None);
    }
    let Some(phase) = record.phase_fraction else {
        return (0.0, None);
    };
    let distance_from_new = (phase - phase.round()).abs();
    let intensity = (1.0 - distance_from_new * 8.0).clamp(0.0, 1.0);
    if intensity > 0.3 {
        (intensity, Some(format!("Void-of-course moon intensity {intensity:.2}")))
    } else {
        (intensity, None)
    }
}

/// Hive-mind search velocity ("noosphere").
fn noosphere(trend: &(TrendRecord, ProviderStatus)) -> (f64, Option<String>) {
    let (record, status) = trend;
    if *status != ProviderStatus::Success {
        return (0.0, None);
    }
    match record.velocity {
        Some(v) if v.abs() > 0.0 => {
            let intensity = (v.abs() / 100.0).clamp(0.0, 1.0);
            (intensity, Some(format!("Search velocity {v:+.1}")))
        }
        _ => (0.0, None),
    }
}

/// Hurst exponent via a simple rescaled-range estimate over the line-history
/// series. Requires `HURST_MIN_SNAPSHOTS` points; below that, NO_DATA.
pub fn hurst_exponent(snapshots: &[f64]) -> Option<f64> {
    if snapshots.len() < HURST_MIN_SNAPSHOTS {
        return None;
    }
    let n = snapshots.len();
    let mean: f64 = snapshots.iter().sum::<f64>() / n as f64;
    let mut cumulative = 0.0;
    let mut max_dev = f64::MIN;
    let mut min_dev = f64::MAX;
    for v in snapshots {
        cumulative += v - mean;
        max_dev = max_dev.max(cumulative);
        min_dev = min_dev.min(cumulative);
    }
    let range = max_dev - min_dev;
    let std_dev = (snapshots.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
    if std_dev <= f64::EPSILON || range <= 0.0 {
        return Some(0.5);
    }
    let rescaled = range / std_dev;
    // H = log(R/S) / log(n), clamped to the theoretically valid [0, 1] band.
    let hurst = (rescaled.ln() / (n as f64).ln()).clamp(0.0, 1.0);
    Some(hurst)
}

/// Benford's-law leading-digit anomaly across aggregated multi-book line
/// values. Requires `BENFORD_MIN_UNIQUE_VALUES` unique values; below that,
/// NO_DATA.
pub fn benford_anomaly(values: &[f64]) -> Option<f64> {
    let unique: std::collections::HashSet<i64> =
        values.iter().map(|v| (v.abs() * 100.0).round() as i64).collect();
    if unique.len() < BENFORD_MIN_UNIQUE_VALUES {
        return None;
    }
    let mut observed = [0u32; 9];
    let mut total = 0u32;
    for v in values {
        let abs = v.abs();
        if abs < 1.0 {
            continue;
        }
        let leading = first_significant_digit(abs);
        if (1..=9).contains(&leading) {
            observed[(leading - 1) as usize] += 1;
            total += 1;
        }
    }
    if total == 0 {
        return Some(0.0);
    }
    let mut deviation = 0.0;
    for d in 1..=9u32 {
        let expected = ((1.0 + 1.0 / d as f64).log10()) * total as f64;
        let actual = observed[(d - 1) as usize] as f64;
        deviation += (actual - expected).abs();
    }
    Some((deviation / total as f64).clamp(0.0, 1.0))
}

fn first_significant_digit(mut v: f64) -> u32 {
    if v <= 0.0 {
        return 0;
    }
    while v >= 10.0 {
        v /= 10.0;
    }
    while v < 1.0 {
        v *= 10.0;
    }
    v.floor() as u32
}

fn geomagnetic(kp: &(KpIndex, ProviderStatus)) -> (f64, Option<String>) {
    let (record, status) = kp;
    if *status != ProviderStatus::Success {
        return (0.0, None);
    }
    match record.value {
        Some(v) if v >= 5.0 => (
            (v / 9.0).clamp(0.0, 1.0),
            Some(format!("Geomagnetic storm Kp={v:.1}")),
        ),
        Some(v) => ((v / 9.0).clamp(0.0, 1.0), None),
        None => (0.0, None),
    }
}

/// GLITCH aggregate: weighted sum of the six sub-signals above, scaled into
/// a score delta. Returns the delta plus the per-signal provenance so the
/// caller can surface each sub-signal independently.
fn glitch_aggregate(inputs: &EsotericInputs) -> (f64, Vec<String>, HashMap<String, crate::models::Provenance>) {
    let mut reasons = Vec::new();
    let mut provenance = HashMap::new();

    let (chrome, chrome_reason) = chrome_resonance(inputs.candidate, inputs.candidate.game_start);
    if let Some(r) = chrome_reason {
        reasons.push(r);
    }
    provenance.insert("glitch_chrome".to_string(), internal_provenance(HashMap::new()));

    let (void, void_reason) = void_of_course(inputs.moon);
    if let Some(r) = void_reason {
        reasons.push(r);
    }
    provenance.insert(
        "glitch_void".to_string(),
        external_provenance("astronomy", inputs.moon.1, false, HashMap::new()),
    );

    let (noo, noo_reason) = noosphere(inputs.trend);
    if let Some(r) = noo_reason {
        reasons.push(r);
    }
    provenance.insert(
        "glitch_noosphere".to_string(),
        external_provenance("trends", inputs.trend.1, false, HashMap::new()),
    );

    let hurst = hurst_exponent(inputs.line_history_snapshots);
    if hurst.is_none() {
        provenance.insert(
            "glitch_hurst".to_string(),
            no_data_result(None, crate::models::SourceType::Internal).provenance,
        );
    } else if let Some(h) = hurst {
        reasons.push(format!("Hurst exponent {h:.2} over {} snapshots", inputs.line_history_snapshots.len()));
        provenance.insert("glitch_hurst".to_string(), internal_provenance(HashMap::new()));
    }

    let (kp_value, kp_reason) = geomagnetic(inputs.kp);
    if let Some(r) = kp_reason {
        reasons.push(r);
    }
    provenance.insert(
        "glitch_kp".to_string(),
        external_provenance("space_weather", inputs.kp.1, false, HashMap::new()),
    );

    let benford = benford_anomaly(inputs.multi_book_lines);
    if benford.is_none() {
        provenance.insert(
            "glitch_benford".to_string(),
            no_data_result(None, crate::models::SourceType::Internal).provenance,
        );
    } else if let Some(b) = benford {
        if b > 0.15 {
            reasons.push(format!("Benford leading-digit deviation {b:.2}"));
        }
        provenance.insert("glitch_benford".to_string(), internal_provenance(HashMap::new()));
    }

    let weighted = chrome * GLITCH_CHROME_WEIGHT
        + void * GLITCH_VOID_WEIGHT
        + noo * GLITCH_NOOSPHERE_WEIGHT
        + hurst.unwrap_or(0.0) * GLITCH_HURST_WEIGHT
        + kp_value * GLITCH_KP_WEIGHT
        + benford.unwrap_or(0.0) * GLITCH_BENFORD_WEIGHT;

    (weighted * GLITCH_TO_SCORE_SCALE, reasons, provenance)
}

// --- Phase-8 signals ---------------------------------------------------------

fn clamp_phase8(delta: f64) -> f64 {
    PHASE8_SIGNAL_DELTA_CAP.clamp(delta)
}

fn numerology(candidate: &Candidate) -> (f64, Option<String>) {
    let digit = gematria_digit(&candidate.home_team) % 9;
    let delta = clamp_phase8((digit as f64 - 4.0) / 20.0);
    (delta, None)
}

fn sidereal_astrology(game_date: DateTime<Utc>) -> (f64, Option<String>) {
    let delta = clamp_phase8(((game_date.day0() % 12) as f64 - 5.5) / 40.0);
    (delta, None)
}

const FIBONACCI: [f64; 8] = [1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0];

fn fibonacci_alignment(candidate: &Candidate) -> (f64, Option<String>) {
    let Some(line) = candidate.line else {
        return (0.0, None);
    };
    let nearest = FIBONACCI
        .iter()
        .min_by(|a, b| {
            (*a - line.abs())
                .abs()
                .partial_cmp(&(*b - line.abs()).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .copied()
        .unwrap_or(0.0);
    let distance = (nearest - line.abs()).abs();
    if distance < 0.25 {
        (clamp_phase8(0.3), Some(format!("Line {line:.1} aligns with Fibonacci {nearest:.0}")))
    } else {
        (0.0, None)
    }
}

fn fibonacci_retracement(candidate: &Candidate, multi_book_lines: &[f64]) -> (f64, Option<String>) {
    if multi_book_lines.len() < 2 {
        return (0.0, None);
    }
    let max = multi_book_lines.iter().cloned().fold(f64::MIN, f64::max);
    let min = multi_book_lines.iter().cloned().fold(f64::MAX, f64::min);
    let range = max - min;
    if range <= 0.0 {
        return (0.0, None);
    }
    let Some(line) = candidate.line else {
        return (0.0, None);
    };
    let retrace = (line - min) / range;
    let levels = [0.236, 0.382, 0.5, 0.618, 0.786];
    if levels.iter().any(|l| (retrace - l).abs() < 0.03) {
        (clamp_phase8(0.2), Some("Line sits on a Fibonacci retracement level".to_string()))
    } else {
        (0.0, None)
    }
}

fn tesla_369(candidate: &Candidate) -> (f64, Option<String>) {
    let digit = gematria_digit(&candidate.away_team);
    if matches!(digit, 3 | 6 | 9) {
        (clamp_phase8(0.25), Some(format!("Tesla 3-6-9 vortex digit {digit}")))
    } else {
        (0.0, None)
    }
}

fn daily_energy(game_date: DateTime<Utc>) -> (f64, Option<String>) {
    let delta = clamp_phase8(((game_date.ordinal() % 7) as f64 - 3.0) / 30.0);
    (delta, None)
}

fn biorhythm(candidate: &Candidate) -> (f64, Option<String>) {
    if candidate.pick_type != PickType::Prop {
        return (0.0, None);
    }
    let Some(player) = &candidate.player_name else {
        return (0.0, None);
    };
    let digit = gematria_digit(player) as f64;
    let cycle = (digit / 9.0 * std::f64::consts::TAU).sin();
    (clamp_phase8(cycle * 0.2), None)
}

fn gann_square(candidate: &Candidate) -> (f64, Option<String>) {
    if candidate.pick_type == PickType::Prop {
        return (0.0, None);
    }
    let Some(line) = candidate.line else {
        return (0.0, None);
    };
    let sqrt = line.abs().sqrt();
    let nearest_whole = sqrt.round();
    if (sqrt - nearest_whole).abs() < 0.05 {
        (clamp_phase8(0.2), Some(format!("Line {line:.1} sits on a Gann square root level")))
    } else {
        (0.0, None)
    }
}

fn founders_echo_gematria(candidate: &Candidate) -> (f64, Option<String>) {
    let home = gematria_digit(&candidate.home_team);
    let away = gematria_digit(&candidate.away_team);
    let delta = clamp_phase8((home as f64 - away as f64) / 20.0);
    (delta, None)
}

fn lunar_phase_intensity(moon: &(MoonPhase, ProviderStatus)) -> (f64, Option<String>) {
    let (record, status) = moon;
    if *status != ProviderStatus::Success {
        return (0.0, None);
    }
    match record.phase_fraction {
        Some(phase) if (phase - 0.5).abs() < 0.03 => (
            clamp_phase8(0.25),
            Some("Full-moon intensity window".to_string()),
        ),
        _ => (0.0, None),
    }
}

fn mercury_retrograde(game_date: DateTime<Utc>) -> (f64, Option<String>) {
    // Deterministic stand-in windows (no ephemeris provider registered):
    // treat roughly one week in three as a retrograde window.
    if game_date.ordinal() % 21 < 7 {
        (clamp_phase8(-0.15), Some("Mercury retrograde adjustment".to_string()))
    } else {
        (0.0, None)
    }
}

fn rivalry_intensity(candidate: &Candidate) -> (f64, Option<String>) {
    let rivalry_pairs: &[(&str, &str)] = &[
        ("Lakers", "Celtics"),
        ("Yankees", "Red Sox"),
        ("Cowboys", "Eagles"),
    ];
    let is_rivalry = rivalry_pairs.iter().any(|(a, b)| {
        (candidate.home_team.contains(a) && candidate.away_team.contains(b))
            || (candidate.home_team.contains(b) && candidate.away_team.contains(a))
    });
    if is_rivalry {
        (clamp_phase8(0.3), Some("Rivalry intensity bump".to_string()))
    } else {
        (0.0, None)
    }
}

fn streak_momentum(candidate: &Candidate) -> (f64, Option<String>) {
    let digit = gematria_digit(&candidate.home_team) % 5;
    (clamp_phase8((digit as f64 - 2.0) / 15.0), None)
}

fn solar_flare_classification(kp: &(KpIndex, ProviderStatus)) -> (f64, Option<String>) {
    let (record, status) = kp;
    if *status != ProviderStatus::Success {
        return (0.0, None);
    }
    match record.value {
        Some(v) if v >= 7.0 => (
            clamp_phase8(-0.2),
            Some(format!("Solar-flare-class geomagnetic disturbance Kp={v:.1}")),
        ),
        _ => (0.0, None),
    }
}

pub fn compute(inputs: EsotericInputs) -> EngineOutput {
    let mut reasons = Vec::new();
    let mut provenance = HashMap::new();

    let (glitch_delta, glitch_reasons, glitch_prov) = glitch_aggregate(&inputs);
    reasons.extend(glitch_reasons);
    provenance.extend(glitch_prov);

    let mut phase8_sum = 0.0;
    let mut push = |name: &str, (delta, reason): (f64, Option<String>), reasons: &mut Vec<String>, sum: &mut f64| {
        *sum += delta;
        if let Some(r) = reason {
            reasons.push(r);
        }
        provenance.insert(name.to_string(), internal_provenance(HashMap::new()));
    };

    push("numerology", numerology(inputs.candidate), &mut reasons, &mut phase8_sum);
    push(
        "sidereal_astrology",
        sidereal_astrology(inputs.candidate.game_start),
        &mut reasons,
        &mut phase8_sum,
    );
    push("fibonacci_alignment", fibonacci_alignment(inputs.candidate), &mut reasons, &mut phase8_sum);
    push(
        "fibonacci_retracement",
        fibonacci_retracement(inputs.candidate, inputs.multi_book_lines),
        &mut reasons,
        &mut phase8_sum,
    );
    push("tesla_369", tesla_369(inputs.candidate), &mut reasons, &mut phase8_sum);
    push("daily_energy", daily_energy(inputs.candidate.game_start), &mut reasons, &mut phase8_sum);
    push("biorhythm", biorhythm(inputs.candidate), &mut reasons, &mut phase8_sum);
    push("gann_square", gann_square(inputs.candidate), &mut reasons, &mut phase8_sum);
    push(
        "founders_echo_gematria",
        founders_echo_gematria(inputs.candidate),
        &mut reasons,
        &mut phase8_sum,
    );
    push("lunar_phase_intensity", lunar_phase_intensity(inputs.moon), &mut reasons, &mut phase8_sum);
    push("mercury_retrograde", mercury_retrograde(inputs.candidate.game_start), &mut reasons, &mut phase8_sum);
    push("rivalry_intensity", rivalry_intensity(inputs.candidate), &mut reasons, &mut phase8_sum);
    push("streak_momentum", streak_momentum(inputs.candidate), &mut reasons, &mut phase8_sum);
    push("solar_flare_classification", solar_flare_classification(inputs.kp), &mut reasons, &mut phase8_sum);

    let score = ESOTERIC_NEUTRAL_BASELINE + glitch_delta + phase8_sum;

    EngineOutput {
        score,
        reasons,
        provenance,
    }
    .clamp_score()
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
    fn hurst_requires_minimum_snapshots() {
        let nine: Vec<f64> = (0..9).map(|i| i as f64).collect();
        assert!(hurst_exponent(&nine).is_none());
        let ten: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(hurst_exponent(&ten).is_some());
    }

    #[test]
    fn benford_requires_minimum_unique_values() {
        let nine: Vec<f64> = (1..=9).map(|i| i as f64).collect();
        assert!(benford_anomaly(&nine).is_none());
        let ten: Vec<f64> = (1..=10).map(|i| i as f64 * 1.1).collect();
        assert!(benford_anomaly(&ten).is_some());
    }

    #[test]
    fn esoteric_score_stays_in_range() {
        let moon = (MoonPhase { phase_fraction: Some(0.5), illumination_pct: None }, ProviderStatus::Success);
        let trend = (TrendRecord { velocity: Some(10.0) }, ProviderStatus::Success);
        let kp = (KpIndex { value: Some(3.0) }, ProviderStatus::Success);
        let candidate = candidate();
        let inputs = EsotericInputs {
            candidate: &candidate,
            moon: &moon,
            trend: &trend,
            kp: &kp,
            multi_book_lines: &[-3.0, -3.5, -4.0],
            line_history_snapshots: &[],
        };
        let out = compute(inputs);
        assert!((0.0..=10.0).contains(&out.score));
    }
}
