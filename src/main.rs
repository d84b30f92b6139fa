// SPDX-License-Identifier: BSD-3-Clause
use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;

use tracing_flame::FlameLayer;
use tracing_subscriber::{fmt, prelude::*};

use japt::{cli, layers, pointer, results, FactsReader};

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn setup_global_subscriber() -> Result<impl Drop> {
    let filter_layer = tracing::level_filters::LevelFilter::TRACE;
    let fmt_layer = fmt::Layer::default();
    let (flame_layer, guard) =
        FlameLayer::with_file("./tracing.folded").context("Couldn't open tracing.folded")?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(flame_layer)
        .with(layers::ExecCountLayer::default())
        .init();
    Ok(guard)
}

fn main() -> Result<()> {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    let args = cli::Args::parse();

    let _guard = if args.tracing {
        Some(setup_global_subscriber()?)
    } else {
        None
    };

    let reader = FactsReader::new(&args.facts);
    let (facts, read_stats) = reader.read_all().with_context(|| {
        format!(
            "Couldn't read fact files from {}",
            args.facts.display()
        )
    })?;
    if read_stats.skipped_rows > 0 {
        tracing::warn!(
            "skipped {} malformed fact rows while reading {}",
            read_stats.skipped_rows,
            args.facts.display()
        );
    }

    let opts = pointer::Options {
        max_iterations: args.max_iterations,
        debug: args.debug,
    };
    let outs = pointer::analysis(&facts, &opts).context("Analysis failed")?;

    {
        let mut stdout = io::stdout().lock();
        results::print_summary(&mut stdout, &outs)?;
        if !args.quiet {
            writeln!(stdout)?;
            results::print_relations(&mut stdout, &outs, args.limit)?;
        }
    }

    if let Some(out_dir) = args.output {
        std::fs::create_dir_all(&out_dir)
            .with_context(|| format!("Couldn't create {}", out_dir.display()))?;
        results::export_json(&outs, &out_dir.join("results.json"))
            .context("Couldn't write JSON results")?;
        results::export_facts(&outs, &out_dir).context("Couldn't write fact-file results")?;
        results::export_text(&outs, &out_dir.join("results.txt"), args.limit)
            .context("Couldn't write text report")?;
    }

    Ok(())
}
