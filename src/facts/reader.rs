// SPDX-License-Identifier: BSD-3-Clause
//! Loading of tab-delimited `.facts` files into a [`FactStore`].
//!
//! One file per table, named after the table (`HeapAllocation.facts`,
//! `Move.facts`, ...). Blank lines and `#` comments are skipped. A row with
//! too few columns, or an unparseable parameter index, is dropped and
//! counted rather than failing the load. A missing file is a warning; a
//! missing directory is an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::error::Error;
use crate::facts::FactStore;

/// What the reader dropped on the floor, visible to the caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadStats {
    /// Rows skipped for missing columns or unparseable fields.
    pub skipped_rows: usize,
    /// Fact files absent from the directory.
    pub missing_files: usize,
}

pub struct FactsReader {
    dir: PathBuf,
    facts: FactStore,
    stats: ReadStats,
}

impl FactsReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FactsReader {
            dir: dir.into(),
            facts: FactStore::default(),
            stats: ReadStats::default(),
        }
    }

    /// Read every fact file in the directory.
    pub fn read_all(mut self) -> Result<(FactStore, ReadStats), Error> {
        if !self.dir.is_dir() {
            return Err(Error::FactsDirNotFound(self.dir));
        }

        for row in self.read_table("HeapAllocation.facts", 3)? {
            self.facts.allocations.insert(super::Allocation {
                variable: row[0].as_str().into(),
                site: row[1].as_str().into(),
                method: row[2].as_str().into(),
            });
        }
        for row in self.read_table("HeapAllocation-Type.facts", 2)? {
            self.facts.alloc_types.insert(super::AllocType {
                site: row[0].as_str().into(),
                ty: row[1].as_str().into(),
            });
        }
        for row in self.read_table("Move.facts", 3)? {
            self.facts.moves.insert(super::Move {
                from: row[0].as_str().into(),
                to: row[1].as_str().into(),
                method: row[2].as_str().into(),
            });
        }
        for row in self.read_table("Load.facts", 4)? {
            self.facts.loads.insert(super::Load {
                to: row[0].as_str().into(),
                base: row[1].as_str().into(),
                field: row[2].as_str().into(),
                method: row[3].as_str().into(),
            });
        }
        for row in self.read_table("Store.facts", 4)? {
            self.facts.stores.insert(super::Store {
                base: row[0].as_str().into(),
                field: row[1].as_str().into(),
                from: row[2].as_str().into(),
                method: row[3].as_str().into(),
            });
        }
        for row in self.read_table("ReturnVar.facts", 2)? {
            self.facts.return_vars.insert(super::ReturnVar {
                variable: row[0].as_str().into(),
                method: row[1].as_str().into(),
            });
        }
        for row in self.read_table("VirtualMethodInvocation.facts", 4)? {
            self.facts.virtual_invocations.insert(super::VirtualInvocation {
                invocation: row[0].as_str().into(),
                base: row[1].as_str().into(),
                method_name: row[2].as_str().into(),
                enclosing: row[3].as_str().into(),
            });
        }
        for row in self.read_table("StaticMethodInvocation.facts", 3)? {
            self.facts.static_invocations.insert(super::StaticInvocation {
                invocation: row[0].as_str().into(),
                callee: row[1].as_str().into(),
                enclosing: row[2].as_str().into(),
            });
        }
        for row in self.read_table("SpecialMethodInvocation.facts", 4)? {
            self.facts.special_invocations.insert(super::SpecialInvocation {
                invocation: row[0].as_str().into(),
                base: row[1].as_str().into(),
                callee: row[2].as_str().into(),
                enclosing: row[3].as_str().into(),
            });
        }
        for row in self.read_table("ActualParam.facts", 3)? {
            match row[0].parse::<usize>() {
                Ok(index) => {
                    self.facts.actual_params.insert(super::ActualParam {
                        index,
                        invocation: row[1].as_str().into(),
                        variable: row[2].as_str().into(),
                    });
                }
                Err(_) => self.skip_row("ActualParam.facts", &row),
            }
        }
        for row in self.read_table("FormalParam.facts", 3)? {
            match row[0].parse::<usize>() {
                Ok(index) => {
                    self.facts.formal_params.insert(super::FormalParam {
                        index,
                        method: row[1].as_str().into(),
                        variable: row[2].as_str().into(),
                    });
                }
                Err(_) => self.skip_row("FormalParam.facts", &row),
            }
        }
        for row in self.read_table("ThisVar.facts", 2)? {
            self.facts.this_vars.insert(super::ThisVar {
                method: row[0].as_str().into(),
                variable: row[1].as_str().into(),
            });
        }
        for row in self.read_table("AssignReturnValue.facts", 2)? {
            self.facts.assign_return_values.insert(super::AssignReturnValue {
                invocation: row[0].as_str().into(),
                variable: row[1].as_str().into(),
            });
        }
        for row in self.read_table("Method-Name-Type.facts", 3)? {
            self.facts.method_name_types.insert(super::MethodNameType {
                method: row[0].as_str().into(),
                name: row[1].as_str().into(),
                class: row[2].as_str().into(),
            });
        }
        for row in self.read_table("Method.facts", 1)? {
            self.facts.methods.insert(row[0].as_str().into());
        }

        Ok((self.facts, self.stats))
    }

    fn skip_row(&mut self, file: &str, row: &[String]) {
        self.stats.skipped_rows += 1;
        tracing::debug!(file, ?row, "skipping malformed fact row");
    }

    /// Read one fact file into rows of at least `arity` columns. Shorter
    /// rows are counted and dropped.
    fn read_table(&mut self, filename: &str, arity: usize) -> Result<Vec<Vec<String>>, Error> {
        let path = self.dir.join(filename);
        if !path.exists() {
            tracing::warn!(file = filename, "fact file not found, skipping");
            self.stats.missing_files += 1;
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        for line in BufReader::new(File::open(&path)?).lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let row: Vec<String> = line.split('\t').map(str::to_owned).collect();
            if row.len() < arity {
                self.skip_row(filename, &row);
                continue;
            }
            rows.push(row);
        }
        Ok(rows)
    }
}
