//! Research engine (weight 0.35, §4.6).
//!
//! Four invariants govern the sharp/line split and must never be violated:
//! 1. Sharp strength is read only from the Playbook-sourced record.
//! 2. Line signal is read only from Odds-API-sourced records.
//! 3. If sharp status is anything but SUCCESS, strength must be `None` and
//!    no reason may begin with "Sharp".
//! 4. Each signal tags its own `source_api`.

use super::EngineOutput;
use crate::contract::{RLM_DISAGREEMENT_THRESHOLD, SHARP_DIVERGENCE_THRESHOLD};
use crate::integrations::news::NewsClient;
use crate::integrations::odds::OddsQuote;
use crate::integrations::splits::SplitsRecord;
use crate::models::{Provenance, ProviderStatus, ResearchDetail, SharpStrength, SourceType};
use crate::signals::external_provenance;
use std::collections::HashMap;

fn sharp_strength_from_divergence(divergence: f64) -> SharpStrength {
    if divergence >= 30.0 {
        SharpStrength::Strong
    } else if divergence >= 20.0 {
        SharpStrength::Moderate
    } else if divergence >= SHARP_DIVERGENCE_THRESHOLD {
        SharpStrength::Weak
    } else {
        SharpStrength::None
    }
}

fn compute_sharp(splits: &(SplitsRecord, ProviderStatus)) -> (ResearchDetailSharpPart, Vec<String>) {
    let (record, status) = splits;
    let mut raw = HashMap::new();
    if let Some(t) = record.ticket_pct {
        raw.insert("ticket_pct".to_string(), format!("{t:.1}"));
    }
    if let Some(m) = record.money_pct {
        raw.insert("money_pct".to_string(), format!("{m:.1}"));
    }

    // Invariant 3: anything other than SUCCESS collapses to NONE, no reasons.
    if *status != ProviderStatus::Success {
        return (
            ResearchDetailSharpPart {
                boost: 0.0,
                strength: SharpStrength::None,
                status: *status,
                raw_inputs: raw,
            },
            Vec::new(),
        );
    }

    match record.divergence() {
        Some(divergence) if divergence >= SHARP_DIVERGENCE_THRESHOLD => {
            let strength = sharp_strength_from_divergence(divergence);
            let boost = (divergence / 100.0 * 3.0).clamp(0.0, 3.0);
            (
                ResearchDetailSharpPart {
                    boost,
                    strength,
                    status: *status,
                    raw_inputs: raw,
                },
                vec![format!("Sharp money divergence {divergence:.1}pp ({strength:?})")],
            )
        }
        _ => (
            ResearchDetailSharpPart {
                boost: 0.0,
                strength: SharpStrength::None,
                status: *status,
                raw_inputs: raw,
            },
            Vec::new(),
        ),
    }
}

struct ResearchDetailSharpPart {
    boost: f64,
    strength: SharpStrength,
    status: ProviderStatus,
    raw_inputs: HashMap<String, String>,
}

fn compute_line(odds: &(OddsQuote, ProviderStatus)) -> (f64, ProviderStatus, HashMap<String, String>, Vec<String>) {
    let (quote, status) = odds;
    let mut raw = HashMap::new();
    if *status != ProviderStatus::Success {
        return (0.0, *status, raw, Vec::new());
    }
    match quote.line_variance() {
        Some(variance) => {
            raw.insert("line_variance".to_string(), format!("{variance:.2}"));
            let boost = (variance / 5.0).clamp(0.0, 2.0);
            (
                boost,
                *status,
                raw,
                vec![format!("Line variance {variance:.2} across books")],
            )
        }
        None => (0.0, *status, raw, Vec::new()),
    }
}

/// Public-fade: ticket%/money% inverted relative to the sharp read —
/// the public is heavy on one side while money is not, a contrarian signal.
fn compute_public_fade(splits: &(SplitsRecord, ProviderStatus)) -> (f64, Vec<String>) {
    let (record, status) = splits;
    if *status != ProviderStatus::Success {
        return (0.0, Vec::new());
    }
    match (record.ticket_pct, record.money_pct) {
        (Some(ticket), Some(money)) if ticket > 65.0 && money < 50.0 => (
            1.0,
            vec![format!(
                "Public-fade: {ticket:.0}% tickets but only {money:.0}% of money"
            )],
        ),
        _ => (0.0, Vec::new()),
    }
}

/// Reverse line movement: public favors one side by a wide margin while
/// the line moves against that side.
fn compute_rlm(splits: &(SplitsRecord, ProviderStatus), line_variance: Option<f64>) -> (f64, Vec<String>) {
    let (record, status) = splits;
    if *status != ProviderStatus::Success {
        return (0.0, Vec::new());
    }
    match (record.ticket_pct, line_variance) {
        (Some(ticket), Some(variance))
            if (ticket - 50.0).abs() >= RLM_DISAGREEMENT_THRESHOLD && variance > 1.0 =>
        {
            (1.2, vec!["Reverse line movement detected".to_string()])
        }
        _ => (0.0, Vec::new()),
    }
}

async fn compute_espn_cross_validation(news: &NewsClient, matchup: &str) -> (f64, Provenance, Vec<String>) {
    let (record, status) = news.get_news(matchup).await;
    let mut raw = HashMap::new();
    raw.insert("headline_count".to_string(), record.headline_count.to_string());
    let prov = external_provenance("news", status, false, raw);
    if status != ProviderStatus::Success {
        return (0.0, prov, Vec::new());
    }
    match record.sentiment {
        Some(s) if s.abs() > 0.3 => (
            s.clamp(-1.0, 1.0),
            prov,
            vec![format!("News sentiment {s:+.2}")],
        ),
        _ => (0.0, prov, Vec::new()),
    }
}

pub async fn compute(
    matchup: &str,
    odds: &(OddsQuote, ProviderStatus),
    splits: &(SplitsRecord, ProviderStatus),
    news: &NewsClient,
) -> (EngineOutput, ResearchDetail) {
    let mut reasons = Vec::new();
    let mut provenance = HashMap::new();

    let (sharp_part, sharp_reasons) = compute_sharp(splits);
    reasons.extend(sharp_reasons);
    provenance.insert(
        "research_sharp".to_string(),
        external_provenance("playbook", sharp_part.status, false, sharp_part.raw_inputs.clone()),
    );

    let (line_boost, line_status, line_raw, line_reasons) = compute_line(odds);
    reasons.extend(line_reasons);
    provenance.insert(
        "research_line".to_string(),
        external_provenance("odds", line_status, false, line_raw.clone()),
    );

    let (fade_boost, fade_reasons) = compute_public_fade(splits);
    reasons.extend(fade_reasons);

    let (rlm_boost, rlm_reasons) = compute_rlm(splits, odds.0.line_variance());
    reasons.extend(rlm_reasons);

    let (espn_boost, espn_prov, espn_reasons) = compute_espn_cross_validation(news, matchup).await;
    reasons.extend(espn_reasons);
    provenance.insert("research_espn".to_string(), espn_prov);

    let raw_sum = 5.0 + sharp_part.boost + line_boost + fade_boost + rlm_boost + espn_boost;

    let detail = ResearchDetail {
        sharp_boost: sharp_part.boost,
        sharp_strength: sharp_part.strength,
        sharp_source_api: "playbook",
        sharp_status: sharp_part.status,
        sharp_raw_inputs: sharp_part.raw_inputs,
        line_boost,
        line_source_api: "odds",
        line_status,
        line_raw_inputs: line_raw,
    };

    let output = EngineOutput {
        score: raw_sum,
        reasons,
        provenance,
    }
    .clamp_score();

    (output, detail)
}

// Keep `SourceType` import used even as the module evolves.
#[allow(dead_code)]
fn _assert_source_type_used(_: SourceType) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::odds::BookLine;

    #[tokio::test]
    async fn sharp_and_line_are_independently_sourced() {
        let odds = (
            OddsQuote {
                per_book: vec![
                    BookLine { book: "a".into(), line: -3.0 },
                    BookLine { book: "b".into(), line: -5.5 },
                ],
            },
            ProviderStatus::Success,
        );
        let splits = (
            SplitsRecord { ticket_pct: Some(45.0), money_pct: Some(62.0) },
            ProviderStatus::Success,
        );
        let news = NewsClient::new();
        let (_, detail) = compute("Lakers vs Celtics", &odds, &splits, &news).await;

        assert!(detail.sharp_boost > 0.0);
        assert_eq!(detail.sharp_source_api, "playbook");
        assert_eq!(detail.sharp_status, ProviderStatus::Success);
        assert!(detail.sharp_raw_inputs.contains_key("ticket_pct"));

        assert!(detail.line_boost > 0.0);
        assert_eq!(detail.line_source_api, "odds");
        assert_eq!(detail.line_status, ProviderStatus::Success);
        assert!(detail.line_raw_inputs.contains_key("line_variance"));
    }

    #[tokio::test]
    async fn sharp_none_when_playbook_unavailable_line_still_positive() {
        let odds = (
            OddsQuote {
                per_book: vec![
                    BookLine { book: "a".into(), line: -3.0 },
                    BookLine { book: "b".into(), line: -5.5 },
                ],
            },
            ProviderStatus::Success,
        );
        let splits = (SplitsRecord::default(), ProviderStatus::NoData);
        let news = NewsClient::new();
        let (output, detail) = compute("Lakers vs Celtics", &odds, &splits, &news).await;

        assert_eq!(detail.sharp_strength, SharpStrength::None);
        assert_eq!(detail.sharp_boost, 0.0);
        assert!(!output.reasons.iter().any(|r| r.starts_with("Sharp")));
        assert!(detail.line_boost > 0.0);
    }
}
