// SPDX-License-Identifier: BSD-3-Clause
//! Printing and export of the converged relations.
//!
//! Everything here runs after the fixpoint loop, on read-only snapshots.
//! All output is sorted so repeated runs produce byte-identical files.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Error;
use crate::pointer::OutputRelations;

fn sorted_var_points_to(outs: &OutputRelations) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> = outs
        .var_points_to
        .iter()
        .map(|(v, s)| (v.to_string(), s.to_string()))
        .collect();
    rows.sort();
    rows
}

fn sorted_field_points_to(outs: &OutputRelations) -> Vec<(String, String, String)> {
    let mut rows: Vec<(String, String, String)> = outs
        .field_points_to
        .iter()
        .map(|(b, f, t)| (b.to_string(), f.to_string(), t.to_string()))
        .collect();
    rows.sort();
    rows
}

/// Call-graph rows; the entry edge's invocation is `None`.
fn sorted_call_graph(outs: &OutputRelations) -> Vec<(Option<String>, String)> {
    let mut rows: Vec<(Option<String>, String)> = outs
        .call_graph
        .iter()
        .map(|(i, m)| (i.as_ref().map(|i| i.to_string()), m.to_string()))
        .collect();
    rows.sort();
    rows
}

pub fn print_summary(w: &mut impl Write, outs: &OutputRelations) -> io::Result<()> {
    writeln!(w, "summary")?;
    writeln!(w, "-------")?;
    writeln!(w, "entry method: {}", outs.stats.entry)?;
    writeln!(w, "iterations: {}", outs.stats.iterations)?;
    writeln!(w, "analysis time: {:?}", outs.stats.elapsed)?;
    if outs.stats.missing_this_vars > 0 {
        writeln!(
            w,
            "callees without ThisVar facts: {}",
            outs.stats.missing_this_vars
        )?;
    }
    writeln!(w, "var_points_to: {}", outs.var_points_to.len())?;
    writeln!(w, "field_points_to: {}", outs.field_points_to.len())?;
    writeln!(w, "call_graph edges: {}", outs.call_graph.len())?;
    writeln!(w, "total: {}", outs.len())?;
    Ok(())
}

fn truncated<'a, T>(rows: &'a [T], limit: Option<usize>) -> (&'a [T], usize) {
    match limit {
        Some(limit) if rows.len() > limit => (&rows[..limit], rows.len() - limit),
        _ => (rows, 0),
    }
}

pub fn print_relations(
    w: &mut impl Write,
    outs: &OutputRelations,
    limit: Option<usize>,
) -> io::Result<()> {
    writeln!(w, "var_points_to")?;
    writeln!(w, "-------------")?;
    let rows = sorted_var_points_to(outs);
    let (shown, rest) = truncated(&rows, limit);
    for (variable, site) in shown {
        writeln!(w, "{} --> {}", variable, site)?;
    }
    if rest > 0 {
        writeln!(w, "... and {} more", rest)?;
    }
    writeln!(w)?;

    writeln!(w, "field_points_to")?;
    writeln!(w, "---------------")?;
    let rows = sorted_field_points_to(outs);
    let (shown, rest) = truncated(&rows, limit);
    for (base, field, target) in shown {
        writeln!(w, "({}).{} --> {}", base, field, target)?;
    }
    if rest > 0 {
        writeln!(w, "... and {} more", rest)?;
    }
    writeln!(w)?;

    writeln!(w, "call_graph")?;
    writeln!(w, "----------")?;
    let rows = sorted_call_graph(outs);
    let (shown, rest) = truncated(&rows, limit);
    for (invocation, method) in shown {
        writeln!(
            w,
            "{} --> {}",
            invocation.as_deref().unwrap_or("<root>"),
            method
        )?;
    }
    if rest > 0 {
        writeln!(w, "... and {} more", rest)?;
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct Report {
    metadata: Metadata,
    var_points_to: Vec<VarRow>,
    field_points_to: Vec<FieldRow>,
    call_graph: Vec<EdgeRow>,
}

#[derive(serde::Serialize)]
struct Metadata {
    analysis_time: f64,
    iterations: usize,
    summary: Summary,
}

#[derive(serde::Serialize)]
struct Summary {
    var_points_to: usize,
    field_points_to: usize,
    call_graph_edges: usize,
    total_results: usize,
    iterations: usize,
}

#[derive(serde::Serialize)]
struct VarRow {
    variable: String,
    #[serde(rename = "allocationSite")]
    allocation_site: String,
}

#[derive(serde::Serialize)]
struct FieldRow {
    heap: String,
    field: String,
    #[serde(rename = "mappedHeap")]
    mapped_heap: String,
}

#[derive(serde::Serialize)]
struct EdgeRow {
    #[serde(rename = "invocationSite")]
    invocation_site: Option<String>,
    method: String,
}

pub fn export_json(outs: &OutputRelations, path: &Path) -> Result<(), Error> {
    let report = Report {
        metadata: Metadata {
            analysis_time: outs.stats.elapsed.as_secs_f64(),
            iterations: outs.stats.iterations,
            summary: Summary {
                var_points_to: outs.var_points_to.len(),
                field_points_to: outs.field_points_to.len(),
                call_graph_edges: outs.call_graph.len(),
                total_results: outs.len(),
                iterations: outs.stats.iterations,
            },
        },
        var_points_to: sorted_var_points_to(outs)
            .into_iter()
            .map(|(variable, allocation_site)| VarRow {
                variable,
                allocation_site,
            })
            .collect(),
        field_points_to: sorted_field_points_to(outs)
            .into_iter()
            .map(|(heap, field, mapped_heap)| FieldRow {
                heap,
                field,
                mapped_heap,
            })
            .collect(),
        call_graph: sorted_call_graph(outs)
            .into_iter()
            .map(|(invocation_site, method)| EdgeRow {
                invocation_site,
                method,
            })
            .collect(),
    };
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &report)?;
    Ok(())
}

/// Write the three relations back out in the same tab-delimited shape the
/// input facts use, one file per relation.
pub fn export_facts(outs: &OutputRelations, dir: &Path) -> Result<(), Error> {
    fs::create_dir_all(dir)?;

    let mut w = BufWriter::new(File::create(dir.join("VarPointsTo.facts"))?);
    writeln!(w, "# Variable\tAllocationSite")?;
    for (variable, site) in sorted_var_points_to(outs) {
        writeln!(w, "{}\t{}", variable, site)?;
    }

    let mut w = BufWriter::new(File::create(dir.join("FieldPointsTo.facts"))?);
    writeln!(w, "# BaseHeap\tField\tTargetHeap")?;
    for (base, field, target) in sorted_field_points_to(outs) {
        writeln!(w, "{}\t{}\t{}", base, field, target)?;
    }

    let mut w = BufWriter::new(File::create(dir.join("CallGraph.facts"))?);
    writeln!(w, "# InvocationSite\tMethod")?;
    for (invocation, method) in sorted_call_graph(outs) {
        writeln!(w, "{}\t{}", invocation.as_deref().unwrap_or(""), method)?;
    }
    Ok(())
}

pub fn export_text(outs: &OutputRelations, path: &Path, limit: Option<usize>) -> Result<(), Error> {
    let mut w = BufWriter::new(File::create(path)?);
    print_summary(&mut w, outs)?;
    writeln!(w)?;
    print_relations(&mut w, outs, limit)?;
    Ok(())
}
