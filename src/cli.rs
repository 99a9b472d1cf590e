//! Operator-facing surface: a `clap`-derived one-shot command plus an
//! interactive REPL reading single-character commands.
//!
//! Grounded on `benchmark_tester.cpp::Run`'s command loop
//! (`e/m/s/p/i/a/g/l/h/q`); the REPL is kept even though spec.md marks it
//! informative-only, since it's the only operator entry point the original
//! ships. The one-shot `clap` surface is the ambient addition for scripted
//! use, styled after the teacher's `#[derive(Parser)]`/`#[derive(Subcommand)]`
//! pattern.

use crate::driver::{Driver, Subject};
use crate::graph::Graph;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "relaxq-bench")]
#[command(about = "Benchmark harness for lock-free k-relaxed FIFO queues")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a microbenchmark sweep across the thread-count ladder.
    Micro {
        #[arg(long)]
        subject: String,
        #[arg(long, default_value_t = 1)]
        parameter: i64,
        #[arg(long, default_value_t = 1)]
        width: usize,
        #[arg(long, default_value_t = 50.0)]
        enq_rate: f32,
        #[arg(long, default_value_t = 1.2)]
        delay: f32,
        #[arg(long)]
        track_relaxation: bool,
        /// Sweep the relaxation bound geometrically instead of the
        /// thread-count ladder (spec.md §4.L; TSWD/2Dd only).
        #[arg(long)]
        scale_with_depth: bool,
        #[arg(long, default_value_t = 4)]
        min_relaxation_bound: i64,
    },
    /// Run a macrobenchmark (parallel relaxed BFS) sweep.
    Macro {
        #[arg(long)]
        subject: String,
        #[arg(long, default_value_t = 1)]
        parameter: i64,
        #[arg(long, default_value_t = 1)]
        width: usize,
        #[arg(long)]
        graph: Option<std::path::PathBuf>,
        #[arg(long, default_value_t = 1000)]
        generate_vertices: usize,
    },
    /// Enter the interactive REPL (spec.md §6's original command surface).
    Repl,
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Command::Micro {
            subject,
            parameter,
            width,
            enq_rate,
            delay,
            track_relaxation,
            scale_with_depth,
            min_relaxation_bound,
        }) => {
            let mut driver = Driver::new();
            driver.subject = Some(Subject::from_str_name(&subject)?);
            driver.parameter = parameter;
            driver.width = width;
            driver.enq_rate_percent = enq_rate;
            driver.delay_microseconds = delay;
            driver.checks_relaxation_distance = track_relaxation;
            driver.scales_with_depth = scale_with_depth;
            if scale_with_depth {
                report_micro(&driver.run_depth_sweep(min_relaxation_bound)?);
            } else {
                report_micro(&driver.run_microbenchmark_sweep()?);
            }
            Ok(())
        }
        Some(Command::Macro {
            subject,
            parameter,
            width,
            graph,
            generate_vertices,
        }) => {
            let mut driver = Driver::new();
            driver.subject = Some(Subject::from_str_name(&subject)?);
            driver.parameter = parameter;
            driver.width = width;
            driver.graph = Some(Arc::new(match graph {
                Some(path) => Graph::load(&path)?.0,
                None => Graph::generate(generate_vertices, 16, crate::graph::DEFAULT_SEED),
            }));
            report_macro(&driver.run_macrobenchmark_sweep()?);
            Ok(())
        }
        Some(Command::Repl) | None => run_repl(),
    }
}

fn report_micro(results: &std::collections::BTreeMap<i64, Vec<crate::driver::MicroResult>>) {
    for (num_thread, runs) in results {
        for r in runs {
            info!(
                num_thread,
                elapsed_secs = r.elapsed_secs,
                num_dequeued = r.num_dequeued,
                sum_rd = r.sum_rd,
                max_rd = r.max_rd,
                "microbenchmark result"
            );
            println!(
                "threads={num_thread} elapsed={:.6}s dequeued={} sum_rd={} max_rd={}",
                r.elapsed_secs, r.num_dequeued, r.sum_rd, r.max_rd
            );
        }
    }
}

fn report_macro(results: &std::collections::BTreeMap<i64, Vec<crate::driver::MacroResult>>) {
    for (num_thread, runs) in results {
        for r in runs {
            info!(
                num_thread,
                elapsed_secs = r.elapsed_secs,
                distance = r.distance,
                "macrobenchmark result"
            );
            println!(
                "threads={num_thread} elapsed={:.6}s distance={}",
                r.elapsed_secs, r.distance
            );
        }
    }
}

/// Interactive command loop matching `benchmark_tester.cpp::Run`'s
/// single-character dispatch.
fn run_repl() -> anyhow::Result<()> {
    let mut driver = Driver::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("Command ('h' for help): ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            return Ok(());
        };
        let line = line?;
        let cmd = line.trim();
        if cmd.len() != 1 {
            continue;
        }

        match cmd.chars().next().unwrap() {
            'e' => prompt_set(&mut driver.enq_rate_percent, "enqueue rate (0-100)")?,
            'm' => driver.checks_relaxation_distance = !driver.checks_relaxation_distance,
            'c' => {
                driver.scales_with_depth = !driver.scales_with_depth;
                println!(
                    "scaling mode: {}",
                    if driver.scales_with_depth {
                        "depth (relaxation bound)"
                    } else {
                        "thread count"
                    }
                );
            }
            'w' => prompt_set_usize(&mut driver.width, "width (queues per thread)")?,
            'd' => prompt_set(&mut driver.delay_microseconds, "delay (microseconds)")?,
            's' => prompt_set_subject(&mut driver)?,
            'p' => prompt_set_parameter(&mut driver)?,
            'i' => {
                let outcome = if driver.scales_with_depth {
                    driver.run_depth_sweep(driver.parameter.max(1))
                } else {
                    driver.run_microbenchmark_sweep()
                };
                match outcome {
                    Ok(results) => report_micro(&results),
                    Err(e) => println!("[Error] {e}"),
                }
            }
            'a' => match driver.run_macrobenchmark_sweep() {
                Ok(results) => report_macro(&results),
                Err(e) => println!("[Error] {e}"),
            },
            'g' => {
                driver.graph = Some(Arc::new(Graph::generate(1000, 16, crate::graph::DEFAULT_SEED)));
                println!("generated a fresh graph");
            }
            'l' => println!("[Error] use the `macro --graph <path>` one-shot form to load a graph"),
            'h' => print_help(),
            'q' => return Ok(()),
            _ => {}
        }
    }
}

fn prompt_set(target: &mut f32, label: &str) -> anyhow::Result<()> {
    print!("Set {label}: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if let Ok(value) = input.trim().parse() {
        *target = value;
    }
    Ok(())
}

fn prompt_set_usize(target: &mut usize, label: &str) -> anyhow::Result<()> {
    print!("Set {label}: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if let Ok(value) = input.trim().parse() {
        *target = value;
    }
    Ok(())
}

fn prompt_set_subject(driver: &mut Driver) -> anyhow::Result<()> {
    print!("Subject (dq-rr/cbo/2dd/tswd/ts-atomic/ts-stutter/ts-cas/ts-interval): ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    match Subject::from_str_name(input.trim()) {
        Ok(subject) => driver.subject = Some(subject),
        Err(e) => println!("[Error] {e}"),
    }
    Ok(())
}

fn prompt_set_parameter(driver: &mut Driver) -> anyhow::Result<()> {
    print!("Parameter: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    if let Ok(value) = input.trim().parse() {
        driver.parameter = value;
    }
    Ok(())
}

fn print_help() {
    println!("e: set enqueue rate");
    println!("m: toggle relaxation-distance tracking");
    println!("c: toggle scaling mode (thread count vs. depth)");
    println!("w: set width (queues per thread)");
    println!("d: set delay (microseconds)");
    println!("s: set subject");
    println!("p: set parameter");
    println!("i: run microbenchmark sweep");
    println!("a: run macrobenchmark sweep");
    println!("g: generate a fresh graph");
    println!("l: load a graph from disk (one-shot command only)");
    println!("h: this help");
    println!("q: quit");
}
