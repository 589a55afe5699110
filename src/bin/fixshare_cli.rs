//! Command-line runner for fixshare experiments.
//!
//! Examples:
//!   fixshare-cli config > experiment.json
//!   fixshare-cli run experiment.json --archive run.fxs
//!   fixshare-cli run experiment.json --seed 7 --json history.json
//!   fixshare-cli inspect run.fxs
//!   fixshare-cli regret run.fxs 200 300

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::process;

use fixshare::prelude::*;
use fixshare::storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ExperimentConfig {
    aggregator: AggregatorConfig,
    generator: GeneratorConfig,
}

struct RunOptions {
    config_path: String,
    seed: Option<u64>,
    json_out: Option<String>,
    archive_out: Option<String>,
}

fn usage() -> ! {
    eprintln!("fixshare-cli (runs and inspects fixed-share experiments)");
    eprintln!("Usage: fixshare-cli <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  config                          Print the default experiment config as JSON");
    eprintln!("  run <config.json> [options]     Run an experiment and print a summary");
    eprintln!("      --seed <n>                  Override the generator seed");
    eprintln!("      --json <file>               Write the full history as JSON");
    eprintln!("      --archive <file>            Write a compressed history archive");
    eprintln!("  inspect <archive>               Summarize a saved run");
    eprintln!("  regret <archive> <start> <end>  Master vs best expert over [start, end)");
    process::exit(1);
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{}", msg);
    process::exit(1);
}

fn parse_run_options(args: &[String]) -> RunOptions {
    if args.is_empty() {
        usage();
    }
    let mut opts = RunOptions {
        config_path: args[0].clone(),
        seed: None,
        json_out: None,
        archive_out: None,
    };

    let mut i = 1;
    while i < args.len() {
        let value = args.get(i + 1).cloned().unwrap_or_else(|| usage());
        match args[i].as_str() {
            "--seed" => {
                let seed = value
                    .parse()
                    .unwrap_or_else(|_| fail("--seed must be a non-negative integer"));
                opts.seed = Some(seed);
            }
            "--json" => opts.json_out = Some(value),
            "--archive" => opts.archive_out = Some(value),
            other => fail(format!("unknown option: {other}")),
        }
        i += 2;
    }
    opts
}

fn load_config(path: &str) -> Result<ExperimentConfig> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

fn run(opts: RunOptions) -> Result<()> {
    let mut exp = load_config(&opts.config_path)?;
    if let Some(seed) = opts.seed {
        exp.generator.seed = seed;
    }

    let source = RegimeGenerator::new(exp.generator.clone())?;
    let stamps = source.stamps().to_vec();
    let mut agg = Aggregator::new(exp.aggregator, source)?;
    let history = agg.run()?;

    print_summary(history, &stamps);

    if let Some(path) = &opts.json_out {
        let w = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(w, history)?;
        info!(path = %path, "history written");
    }
    if let Some(path) = &opts.archive_out {
        storage::save_history(path, history)?;
        info!(path = %path, "archive written");
    }
    Ok(())
}

fn print_summary(history: &History, stamps: &[usize]) {
    let cfg = history.config();
    let master: f64 = history.master_losses().iter().sum();
    let oracle = cumulative(&history.oracle_losses(stamps));

    println!(
        "steps={} period={} train_window={} bounds=[{}, {}]",
        history.len(),
        cfg.period,
        cfg.train_window,
        cfg.a,
        cfg.b
    );
    println!("experts={}", history.max_experts());
    println!("master_loss={master:.3}");
    if !stamps.is_empty() {
        println!("oracle_loss={:.3}", oracle.last().copied().unwrap_or(0.0));
    }
    if let Some(last) = history.last() {
        println!("reserved_mass={:.4}", last.weights[0]);
        let leader = last.weights[1..]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1));
        if let Some((i, w)) = leader {
            println!("leading_expert={} weight={:.4}", i + 1, w);
        }
    }
}

fn inspect(path: &str) -> Result<()> {
    let history = storage::load_history(path)?;
    println!("{}", serde_json::to_string_pretty(history.config())?);
    print_summary(&history, &[]);
    Ok(())
}

fn regret(path: &str, start: usize, end: usize) -> Result<()> {
    let history = storage::load_history(path)?;
    let summary = history.regret_over(start..end);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_index(s: &str, name: &str) -> usize {
    s.parse()
        .unwrap_or_else(|_| fail(format!("{name} must be a non-negative integer")))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let result = match args[0].as_str() {
        "config" => serde_json::to_string_pretty(&ExperimentConfig::default())
            .map(|s| println!("{s}"))
            .map_err(FixShareError::from),
        "run" => run(parse_run_options(&args[1..])),
        "inspect" => {
            if args.len() < 2 {
                usage();
            }
            inspect(&args[1])
        }
        "regret" => {
            if args.len() < 4 {
                usage();
            }
            regret(
                &args[1],
                parse_index(&args[2], "start"),
                parse_index(&args[3], "end"),
            )
        }
        "-h" | "--help" | "help" => usage(),
        other => {
            eprintln!("Unknown command: {other}");
            usage();
        }
    };

    if let Err(e) = result {
        fail(format!("error: {e}"));
    }
}
