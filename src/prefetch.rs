//! Request pre-fetch planner (C5).
//!
//! Deduplicates `(home_team, away_team, target)` tuples across every
//! candidate in the request, then fans out one task per tuple to a
//! semaphore-bounded pool, all under a deadline of at most half the overall
//! request budget. Per-player prop lookups are not batchable this way and
//! are left for the scoring loop to call inline.

use crate::integrations::odds::{OddsClient, OddsQuote};
use crate::integrations::splits::{PlaybookClient, SplitsRecord};
use crate::models::{Candidate, ProviderStatus};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct PrefetchBundle {
    pub odds: (OddsQuote, ProviderStatus),
    pub splits: (SplitsRecord, ProviderStatus),
}

/// Request-local cache: lives exactly as long as the request, never
/// survives to contaminate a later one.
#[derive(Default)]
pub struct PrefetchCache {
    entries: HashMap<(String, String, String), PrefetchBundle>,
}

impl PrefetchCache {
    /// Scoring reads the cache first; only calls a client directly on a miss.
    pub fn get(&self, key: &(String, String, String)) -> Option<&PrefetchBundle> {
        self.entries.get(key)
    }
}

/// Result of a pre-fetch batch: the populated cache plus whether the batch
/// deadline was hit before every task finished (surfaced to the response's
/// `timed_out_components` list, never as an error).
pub struct PrefetchOutcome {
    pub cache: PrefetchCache,
    pub timed_out: bool,
}

pub async fn run(
    candidates: &[Candidate],
    odds: Arc<OddsClient>,
    splits: Arc<PlaybookClient>,
    pool_size: usize,
    overall_budget: Duration,
) -> PrefetchOutcome {
    let deadline = overall_budget / 2;

    let mut dedup: HashMap<(String, String, String), (String, String)> = HashMap::new();
    for c in candidates {
        let key = c.prefetch_key();
        dedup.entry(key).or_insert((c.home_team.clone(), c.away_team.clone()));
    }

    let semaphore = Arc::new(Semaphore::new(pool_size));
    let sport = candidates
        .first()
        .map(|c| c.sport.clone())
        .unwrap_or_default();

    let mut tasks = Vec::with_capacity(dedup.len());
    for (key, (home, away)) in dedup {
        let sem = semaphore.clone();
        let odds = odds.clone();
        let splits = splits.clone();
        let sport = sport.clone();
        tasks.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok();
            let odds_result = odds.get_odds(&sport, &home, &away).await;
            let splits_result = splits.get_splits(&sport, &home, &away).await;
            (
                key,
                PrefetchBundle {
                    odds: odds_result,
                    splits: splits_result,
                },
            )
        }));
    }

    let mut cache = PrefetchCache::default();
    let gathered = tokio::time::timeout(deadline, futures_util::future::join_all(tasks)).await;
    let timed_out = match gathered {
        Ok(results) => {
            for result in results {
                if let Ok((key, bundle)) = result {
                    cache.entries.insert(key, bundle);
                }
            }
            false
        }
        Err(_) => {
            warn!("pre-fetch deadline exceeded; scoring will fall back to inline calls");
            true
        }
    };
    PrefetchOutcome { cache, timed_out }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GameStatus, PickType};
    use chrono::Utc;

    fn candidate(home: &str, away: &str, stat: Option<&str>) -> Candidate {
        Candidate {
            pick_type: if stat.is_some() { PickType::Prop } else { PickType::Spread },
            sport: "NBA".into(),
            home_team: home.into(),
            away_team: away.into(),
            player_name: None,
            stat_type: stat.map(str::to_string),
            line: None,
            game_start: Utc::now(),
            provider_event_id: "e1".into(),
            odds_american: -110,
            game_status: GameStatus::Scheduled,
        }
    }

    #[test]
    fn dedups_across_candidates() {
        let candidates = vec![
            candidate("Lakers", "Celtics", None),
            candidate("Lakers", "Celtics", Some("points")),
            candidate("Lakers", "Celtics", Some("points")),
        ];
        let mut dedup: HashMap<(String, String, String), ()> = HashMap::new();
        for c in &candidates {
            dedup.insert(c.prefetch_key(), ());
        }
        assert_eq!(dedup.len(), 2);
    }
}
