// SPDX-License-Identifier: Apache-2.0
//! Puppetmaster CLI
//!
//! Drives the scheduling core against CSV-described transaction batches and
//! prints the Started/Finished/Failed event stream.

mod csv_input;
mod generators;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pm_core::{Dispatcher, EventStatus};
use tracing::{info, Level};

use generators::GeneratorKind;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Print one JSON object per event instead of a human-readable line.
    #[clap(long, global = true)]
    json: bool,

    /// Enable debug-level tracing of the scheduling pipeline.
    #[clap(long, global = true)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Runs a CSV-described batch of transactions to completion.
    Run {
        /// Path to the CSV input file.
        path: String,
        /// Upper bound on simulated cycles before giving up.
        #[clap(long, default_value_t = 100_000)]
        max_cycles: u64,
        /// Asserted against the compiled-in `TX_DURATION`; this build cannot
        /// change it at runtime, so a mismatch is a usage error rather than
        /// a silent override.
        #[clap(long)]
        tx_duration: Option<u64>,
        /// Asserted against the compiled-in `POOL` size, for the same reason.
        #[clap(long)]
        pool_size_check: Option<usize>,
    },
    /// Emits a deterministic CSV test batch to stdout.
    Generate {
        /// Which conflict pattern to generate.
        #[clap(value_enum)]
        kind: GeneratorKind,
        /// Number of transactions to emit.
        count: u64,
    },
}

fn main() {
    let args = Args::parse();
    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let exit_code = match run(&args) {
        Ok(()) => 0,
        Err(err) => {
            if let Some(csv_err) = err.downcast_ref::<csv_input::CsvInputError>() {
                eprintln!("error: {csv_err}");
                csv_err.exit_code()
            } else {
                eprintln!("error: {err}");
                1
            }
        }
    };
    std::process::exit(exit_code);
}

fn run(args: &Args) -> Result<()> {
    match &args.command {
        Command::Generate { kind, count } => {
            print!("{}", generators::generate(*kind, *count));
            Ok(())
        }
        Command::Run {
            path,
            max_cycles,
            tx_duration,
            pool_size_check,
        } => {
            let config = pm_core::Config::default();
            if let Some(requested) = tx_duration {
                anyhow::ensure!(
                    *requested == config.tx_duration,
                    "this build is compiled with TX_DURATION = {}, not {requested}; rebuild to change it",
                    config.tx_duration
                );
            }
            if let Some(requested) = pool_size_check {
                anyhow::ensure!(
                    *requested == config.pool,
                    "this build is compiled with POOL = {}, not {requested}; rebuild to change it",
                    config.pool
                );
            }
            run_csv(path, *max_cycles, args.json)
        }
    }
}

fn run_csv(path: &str, max_cycles: u64, json: bool) -> Result<()> {
    let mut pending: std::collections::VecDeque<_> = csv_input::read_transactions(path)?.into();
    info!(count = pending.len(), "loaded transactions");

    let mut dispatcher = Dispatcher::new();
    for _ in 0..max_cycles {
        // The renamer's admission queue is bounded; retry on a later cycle
        // rather than failing the whole run when it's momentarily full.
        if let Some(tr) = pending.pop_front() {
            if dispatcher.enqueue_transaction(tr.clone()).is_err() {
                pending.push_front(tr);
            }
        }

        dispatcher.tick();
        while let Some(event) = dispatcher.next_event() {
            emit_event(&event, json);
        }
        if pending.is_empty() && dispatcher.is_idle() {
            break;
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct EventJson {
    tid: u64,
    status: &'static str,
    cycle: u64,
}

fn emit_event(event: &pm_core::Event, json: bool) {
    if json {
        let status = match event.status {
            EventStatus::Started => "started",
            EventStatus::Finished => "finished",
            EventStatus::Failed => "failed",
        };
        let line = EventJson {
            tid: event.tid.0,
            status,
            cycle: event.cycle,
        };
        println!("{}", serde_json::to_string(&line).expect("EventJson is always serializable"));
    } else {
        match event.status {
            EventStatus::Started => println!("[{}] tid {} started", event.cycle, event.tid),
            EventStatus::Finished => println!("[{}] tid {} finished", event.cycle, event.tid),
            EventStatus::Failed => println!("[{}] tid {} failed to rename", event.cycle, event.tid),
        }
    }
}
