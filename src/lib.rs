// SPDX-License-Identifier: BSD-3-Clause
//! Andersen-style, context-insensitive points-to analysis over tab-delimited
//! fact files extracted from Java bytecode.
//!
//! The pipeline is: load a directory of `.facts` files into a read-only
//! [`facts::FactStore`], resolve the entry method, and iterate nine
//! inference rules to a least fixpoint over three relations (variable
//! points-to, field points-to, call graph). [`results`] owns all printing
//! and export of the converged relations.

pub mod analysis;
pub mod cli;
mod entry;
mod error;
pub mod facts;
pub mod layers;
pub mod results;

pub use analysis::pointer;
pub use entry::EntryResolver;
pub use error::Error;
pub use facts::{FactStore, FactsReader, ReadStats};
