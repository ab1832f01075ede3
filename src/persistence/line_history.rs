//! `line_history/<sport>/<event>-<target>.jsonl`: periodic line snapshots
//! appended every 30 minutes by the scheduler, read back as the Hurst-
//! exponent input for the esoteric engine's `glitch_aggregate`.

use super::Store;
use crate::errors::EngineResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Snapshot {
    recorded_at: DateTime<Utc>,
    value: f64,
}

fn path_for(sport: &str, event_id: &str, target: &str) -> String {
    let safe_target = target.replace('/', "_");
    format!("line_history/{}/{}-{}.jsonl", sport.to_lowercase(), event_id, safe_target)
}

/// Appends one line snapshot. `target` identifies what's being tracked
/// within the event (`"spread"`, `"total"`, a player-prop key) since a
/// single event can carry several lines worth of history.
pub async fn append_snapshot(
    store: &Store,
    sport: &str,
    event_id: &str,
    target: &str,
    value: f64,
    recorded_at: DateTime<Utc>,
) -> EngineResult<()> {
    let line = serde_json::to_string(&Snapshot { recorded_at, value })
        .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
    store.append_line(&path_for(sport, event_id, target), &line).await
}

/// Snapshots in file order (oldest first), the shape `esoteric::hurst_exponent`
/// and `esoteric::benford_anomaly` both expect.
pub async fn read_snapshots(
    store: &Store,
    sport: &str,
    event_id: &str,
    target: &str,
) -> EngineResult<Vec<f64>> {
    let lines = store.read_lines(&path_for(sport, event_id, target)).await?;
    Ok(lines
        .iter()
        .filter_map(|l| serde_json::from_str::<Snapshot>(l).ok())
        .map(|s| s.value)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[tokio::test]
    async fn snapshots_read_back_in_append_order() {
        let (store, _dir) = test_store();
        append_snapshot(&store, "NBA", "evt1", "spread", -3.5, Utc::now()).await.unwrap();
        append_snapshot(&store, "NBA", "evt1", "spread", -3.0, Utc::now()).await.unwrap();

        let snapshots = read_snapshots(&store, "NBA", "evt1", "spread").await.unwrap();
        assert_eq!(snapshots, vec![-3.5, -3.0]);
    }

    #[tokio::test]
    async fn distinct_targets_do_not_collide() {
        let (store, _dir) = test_store();
        append_snapshot(&store, "NBA", "evt1", "spread", -3.5, Utc::now()).await.unwrap();
        append_snapshot(&store, "NBA", "evt1", "total", 220.0, Utc::now()).await.unwrap();

        assert_eq!(read_snapshots(&store, "NBA", "evt1", "spread").await.unwrap(), vec![-3.5]);
        assert_eq!(read_snapshots(&store, "NBA", "evt1", "total").await.unwrap(), vec![220.0]);
    }
}
