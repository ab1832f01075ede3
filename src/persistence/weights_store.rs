//! `grader_data/weights.json`: the learned per-(sport, market/stat, signal)
//! weight table. Written only by the daily retrain job in the scheduler,
//! read by every scoring request — never mutated in place by a handler.

use super::Store;
use crate::errors::EngineResult;
use crate::models::Weights;

const PATH: &str = "grader_data/weights.json";

pub async fn load(store: &Store) -> EngineResult<Weights> {
    match store.read_whole(PATH).await? {
        Some(content) => serde_json::from_str(&content)
            .map_err(|e| crate::errors::EngineError::Storage(e.to_string())),
        None => Ok(Weights::default()),
    }
}

pub async fn save(store: &Store, weights: &Weights) -> EngineResult<()> {
    let content = serde_json::to_string_pretty(weights)
        .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
    store.write_whole(PATH, &content).await
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
    async fn missing_weights_file_loads_as_default() {
        let (store, _dir) = test_store();
        let weights = load(&store).await.unwrap();
        assert!(weights.table.is_empty());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (store, _dir) = test_store();
        let mut weights = Weights::default();
        weights.set("NBA", "spread", "ai_model", 0.3);
        save(&store, &weights).await.unwrap();

        let loaded = load(&store).await.unwrap();
        assert_eq!(loaded.get("NBA", "spread", "ai_model"), Some(0.3));
    }
}
