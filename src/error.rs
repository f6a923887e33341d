//! Crate-wide error type (§7 of the specification).
//!
//! All errors bubble to the top-level synthesis entry point
//! ([`crate::synthesize`]); none are swallowed partway through a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("invalid sketch: {0}")]
    InvalidSketch(String),

    #[error("model checker returned an inconsistent result: {0}")]
    OracleContract(String),

    #[error("SAT solver returned unknown; treating as exhausted")]
    SolverError,

    #[error("unsupported mode: {0}")]
    UnsupportedMode(String),
}
