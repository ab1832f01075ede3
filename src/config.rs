//! Environment-first configuration.
//!
//! Tunables (timeouts, pool sizes, request budget, volume mount path) are
//! read once at startup via `Config::from_env`, each with a hardcoded
//! fallback. The scoring contract (`contract.rs`) is deliberately *not* part
//! of this struct: its weights and caps are code constants, never
//! environment-overridable.

use crate::errors::{EngineError, EngineResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub volume_mount: PathBuf,
    /// Overall per-request time budget.
    pub request_budget: Duration,
    /// Default per-provider call timeout.
    pub provider_timeout: Duration,
    /// Bounded worker pool size for the pre-fetch fan-out.
    pub prefetch_pool_size: usize,
    pub demo_mode: bool,
}

impl Config {
    pub fn from_env() -> EngineResult<Self> {
        dotenv::dotenv().ok();

        let port = env_parse("PORT", 8080u16);
        let volume_mount = std::env::var("VOLUME_MOUNT")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let request_budget = Duration::from_secs_f64(env_parse("REQUEST_BUDGET_SECS", 45.0f64));
        let provider_timeout =
            Duration::from_secs_f64(env_parse("PROVIDER_TIMEOUT_SECS", 2.0f64));
        let prefetch_pool_size = env_parse("PREFETCH_POOL_SIZE", 16usize);
        let demo_mode = std::env::var("DEMO_MODE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE"))
            .unwrap_or(false);

        if prefetch_pool_size == 0 {
            return Err(EngineError::Config(
                "PREFETCH_POOL_SIZE must be > 0".to_string(),
            ));
        }

        Ok(Self {
            port,
            volume_mount,
            request_budget,
            provider_timeout,
            prefetch_pool_size,
            demo_mode,
        })
    }

    /// Resolve a relative storage path under the configured volume mount,
    /// refusing any attempt to escape it. This is a fatal, startup-time
    /// check — never a silently-corrected one.
    pub fn resolve_under_mount(&self, relative: &str) -> EngineResult<PathBuf> {
        let joined = self.volume_mount.join(relative);
        let mount_abs = absolute_lexical(&self.volume_mount);
        let joined_abs = absolute_lexical(&joined);
        if !joined_abs.starts_with(&mount_abs) {
            return Err(EngineError::VolumeEscape {
                attempted: joined.display().to_string(),
                mount: self.volume_mount.display().to_string(),
            });
        }
        Ok(joined)
    }
}

/// Lexical (no filesystem access) absolute-path normalization, so the mount
/// check works even before the directory tree exists on disk.
fn absolute_lexical(path: &Path) -> PathBuf {
    let mut stack: Vec<std::ffi::OsString> = Vec::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => {
                stack.pop();
            }
            Component::CurDir => {}
            other => stack.push(other.as_os_str().to_os_string()),
        }
    }
    stack.into_iter().collect()
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mount_escape() {
        let cfg = Config {
            port: 8080,
            volume_mount: PathBuf::from("./data"),
            request_budget: Duration::from_secs(45),
            provider_timeout: Duration::from_secs(2),
            prefetch_pool_size: 16,
            demo_mode: false,
        };
        assert!(cfg.resolve_under_mount("predictions/predictions.jsonl").is_ok());
        assert!(cfg.resolve_under_mount("../outside.jsonl").is_err());
    }
}
