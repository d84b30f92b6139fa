// SPDX-License-Identifier: BSD-3-Clause
//! Entry-point resolution: which method seeds the call graph.

use regex::RegexSet;

use crate::error::Error;
use crate::facts::{FactStore, MethodName};

/// Signature patterns a conventional program entry matches.
const MAIN_PATTERNS: &[&str] = &[
    r"main\(java\.lang\.String\[\]\)",
    r"main\(java\.lang\.String\)",
    r"main\(\)",
    r":\s*void main\(",
];

/// Picks the entry method from the fact universe.
///
/// Prefers the lexicographically smallest method matching one of the `main`
/// signature patterns. When none matches, falls back to the smallest method
/// in the universe; that degrades precision (the seed may not dominate the
/// program), so the fallback is logged as a warning. Fails only when the
/// universe is empty.
pub struct EntryResolver {
    set: RegexSet,
}

impl Default for EntryResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryResolver {
    pub fn new() -> Self {
        // The patterns are literals, so compilation cannot fail.
        let set = RegexSet::new(MAIN_PATTERNS).unwrap();
        EntryResolver { set }
    }

    pub fn resolve(&self, facts: &FactStore) -> Result<MethodName, Error> {
        let universe = facts.method_universe();
        for method in &universe {
            if self.set.is_match(method.as_str()) {
                tracing::info!(%method, "found entry method");
                return Ok((*method).clone());
            }
        }
        match universe.into_iter().next() {
            Some(method) => {
                tracing::warn!(
                    %method,
                    "no main method found, falling back to the smallest method"
                );
                Ok(method.clone())
            }
            None => Err(Error::NoEntryPoint),
        }
    }
}
