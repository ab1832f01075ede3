//! `grader_data/audit_logs/`: one rewritten-daily audit snapshot, one
//! rewritten-daily lesson artifact, and an append-only running log of
//! every lesson ever written.

use super::Store;
use crate::errors::EngineResult;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single weight nudge the auto-grader (or the trap loop, via its own
/// `trap_learning/adjustments.jsonl`) decided to make, with the reasoning
/// that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub sport: String,
    pub stat_or_market: String,
    pub signal: String,
    pub mean_error: f64,
    pub hit_rate: f64,
    pub weight_before: f64,
    pub weight_after: f64,
    pub deferred_to_trap: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub et_date: String,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub et_date: String,
    pub generated_at: DateTime<Utc>,
    pub summary: String,
    pub adjustments_applied: u32,
    pub adjustments_deferred: u32,
}

fn audit_path(et_date: NaiveDate) -> String {
    format!("grader_data/audit_logs/audit_{}.json", et_date)
}

fn lesson_path(et_date: NaiveDate) -> String {
    format!("grader_data/audit_logs/lesson_{}.json", et_date)
}

const LESSONS_LOG: &str = "grader_data/audit_logs/lessons.jsonl";

pub async fn write_audit_log(store: &Store, et_date: NaiveDate, log: &AuditLog) -> EngineResult<()> {
    let content = serde_json::to_string_pretty(log)
        .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
    store.write_whole(&audit_path(et_date), &content).await
}

pub async fn read_audit_log(store: &Store, et_date: NaiveDate) -> EngineResult<Option<AuditLog>> {
    match store.read_whole(&audit_path(et_date)).await? {
        Some(content) => serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| crate::errors::EngineError::Storage(e.to_string())),
        None => Ok(None),
    }
}

/// Rewrites the day's lesson artifact and appends the same lesson to the
/// running `lessons.jsonl` log — the artifact is idempotent under rewrite,
/// the log is append-only so history is never lost to a same-day rerun.
pub async fn write_lesson(store: &Store, et_date: NaiveDate, lesson: &Lesson) -> EngineResult<()> {
    let content = serde_json::to_string_pretty(lesson)
        .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
    store.write_whole(&lesson_path(et_date), &content).await?;

    let line = serde_json::to_string(lesson)
        .map_err(|e| crate::errors::EngineError::Storage(e.to_string()))?;
    store.append_line(LESSONS_LOG, &line).await
}

pub async fn read_lessons(store: &Store) -> EngineResult<Vec<Lesson>> {
    let lines = store.read_lines(LESSONS_LOG).await?;
    Ok(lines.iter().filter_map(|l| serde_json::from_str(l).ok()).collect())
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

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    #[tokio::test]
    async fn audit_log_round_trips() {
        let (store, _dir) = test_store();
        let log = AuditLog {
            et_date: "2026-01-15".to_string(),
            generated_at: Utc::now(),
            entries: vec![AuditEntry {
                sport: "NBA".into(),
                stat_or_market: "spread".into(),
                signal: "ai_model".into(),
                mean_error: 0.4,
                hit_rate: 0.55,
                weight_before: 0.25,
                weight_after: 0.26,
                deferred_to_trap: false,
            }],
        };
        write_audit_log(&store, sample_date(), &log).await.unwrap();

        let loaded = read_audit_log(&store, sample_date()).await.unwrap().unwrap();
        assert_eq!(loaded.entries.len(), 1);
        assert_eq!(loaded.entries[0].signal, "ai_model");
    }

    #[tokio::test]
    async fn missing_audit_log_reads_as_none() {
        let (store, _dir) = test_store();
        assert!(read_audit_log(&store, sample_date()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lessons_accumulate_across_days() {
        let (store, _dir) = test_store();
        let day1 = Lesson {
            et_date: "2026-01-14".to_string(),
            generated_at: Utc::now(),
            summary: "research signal overweighted on unders".into(),
            adjustments_applied: 2,
            adjustments_deferred: 0,
        };
        let day2 = Lesson {
            et_date: "2026-01-15".to_string(),
            generated_at: Utc::now(),
            summary: "jarvis z-scan overfiring on west-coast night games".into(),
            adjustments_applied: 1,
            adjustments_deferred: 1,
        };
        write_lesson(&store, NaiveDate::from_ymd_opt(2026, 1, 14).unwrap(), &day1).await.unwrap();
        write_lesson(&store, sample_date(), &day2).await.unwrap();

        let lessons = read_lessons(&store).await.unwrap();
        assert_eq!(lessons.len(), 2);
        assert_eq!(lessons[1].et_date, "2026-01-15");
    }
}
