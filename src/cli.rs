// SPDX-License-Identifier: BSD-3-Clause
use std::path::PathBuf;

/// Andersen-style points-to analysis over Jimple fact files
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory containing the tab-delimited .facts files
    pub facts: PathBuf,

    /// Write JSON, facts, and text exports under this directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Cap on the number of growing fixpoint passes
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Cap detailed listings at this many rows
    #[arg(long)]
    pub limit: Option<usize>,

    /// Quiet: summary only, no relation listings
    #[arg(long)]
    pub quiet: bool,

    /// Debug: per-pass growth on stderr
    #[arg(long)]
    pub debug: bool,

    /// Tracing
    #[arg(long)]
    pub tracing: bool,
}
