// SPDX-License-Identifier: BSD-3-Clause
use std::path::PathBuf;

/// Errors surfaced by fact loading and the analysis itself.
///
/// Malformed fact rows are deliberately not represented here: the reader
/// recovers from them locally by skipping the row and reporting a count.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The fact universe names no methods, so the call graph cannot be
    /// seeded.
    #[error("no entry point: the fact universe contains no methods")]
    NoEntryPoint,

    /// The iteration cap was exhausted before a full pass added zero tuples.
    /// Only possible when a cap is configured; unlimited iteration always
    /// reaches the fixpoint.
    #[error("analysis did not converge within {cap} iterations")]
    NonConvergence { cap: usize },

    #[error("facts directory not found: {}", .0.display())]
    FactsDirNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("couldn't serialize results: {0}")]
    Json(#[from] serde_json::Error),
}
