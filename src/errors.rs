//! Crate-wide fatal error type.
//!
//! Per the scoring contract's error-handling design, *domain* failures
//! (a provider timing out, a quota ceiling hit, an insufficient sample for
//! an internal signal) never raise — they collapse into a `ProviderStatus`
//! carried on the affected signal's provenance. `EngineError` exists only
//! for conditions that should stop the process, or refuse a request outright
//! at the boundary: a broken contract, or a storage path escaping the
//! configured volume mount.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("scoring contract is inconsistent: {0}")]
    ContractViolation(String),

    #[error("path `{attempted}` resolves outside volume mount `{mount}`")]
    VolumeEscape { attempted: String, mount: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
