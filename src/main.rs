#[path = "experiments/assays.rs"]
mod assays;

use fixshare::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h" || args[1] == "help") {
        print_help();
        return;
    }
    if args.len() >= 2 && args[1] == "assays" {
        if let Err(e) = assays::run() {
            eprintln!("assays failed: {e}");
            std::process::exit(1);
        }
        return;
    }

    if args.len() >= 2 {
        eprintln!("Unknown command: {}", args[1]);
        print_help();
        std::process::exit(2);
    }

    if let Err(e) = run_demo() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!("fixshare (fixed-share aggregation of a growing expert pool)");
    println!("usage:");
    println!("  cargo run");
    println!("  cargo run -- assays");
    println!("  cargo run -- --help");
    println!();
    println!("set RUST_LOG=fixshare=debug to see expert spawns");
}

// Three linear regimes switching every 100 steps, a new expert every 20 steps.
fn run_demo() -> Result<()> {
    let cfg = AggregatorConfig::default().with_period(20);
    let source = RegimeGenerator::demo(7);
    let stamps = source.stamps().to_vec();
    let mut agg = Aggregator::new(cfg, source)?;

    while !agg.is_finished() {
        agg.step()?;
        let t = agg.time();
        if t % 50 == 0 {
            let snap = AggregatorAdapter::new(&agg).snapshot();
            println!(
                "t={:4} experts={:2} reserved={:.3} leader={:?} last_loss={:8.3} total_loss={:10.2}",
                snap.time,
                snap.launched,
                snap.reserved_mass,
                snap.leading_expert.map(|(i, w)| (i, (w * 1000.0).round() / 1000.0)),
                snap.last_master_loss.unwrap_or(0.0),
                snap.cumulative_master_loss
            );
        }
    }

    let history = agg.history();
    let oracle = cumulative(&history.oracle_losses(&stamps));
    let master: f64 = history.master_losses().iter().sum();

    println!();
    println!("segment            master     best expert   regret");
    let mut bounds = vec![0];
    bounds.extend(stamps.iter().copied());
    bounds.push(cfg.total_time);
    for seg in bounds.windows(2) {
        let summary = history.regret_over(seg[0]..seg[1]);
        match (summary.best_expert, summary.best_expert_loss, summary.regret) {
            (Some(i), Some(loss), Some(regret)) => println!(
                "[{:3}, {:3})  {:10.2}  #{:<2} {:9.2}  {:8.2}",
                summary.start, summary.end, summary.master_loss, i, loss, regret
            ),
            _ => println!(
                "[{:3}, {:3})  {:10.2}  (no expert covers the segment)",
                summary.start, summary.end, summary.master_loss
            ),
        }
    }

    println!();
    println!("master cumulative loss: {master:.2}");
    println!(
        "oracle cumulative loss: {:.2}",
        oracle.last().copied().unwrap_or(0.0)
    );
    Ok(())
}
