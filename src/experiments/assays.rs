use fixshare::aggregator::{Aggregator, AggregatorConfig};
use fixshare::generator::{GeneratorConfig, Regime, RegimeGenerator};
use fixshare::history::{cumulative, History};
use fixshare::Result;

#[derive(Debug, Clone)]
struct AssayReport {
    seed: u64,

    // Single regime, two experts.
    line_master_loss: f64,
    line_best_expert_loss: f64,
    line_regret: f64,

    // Regime switching demo.
    switch_steps: usize,
    switch_period: usize,
    experts_launched: usize,
    master_loss_total: f64,
    oracle_loss_total: f64,
    best_fixed_expert: Option<usize>,
    best_fixed_loss: Option<f64>,
    min_reserved_mass: f64,
    max_reserved_mass: f64,
    /// Steps after each switch until an expert launched after it leads.
    handover_steps: Vec<Option<usize>>,
}

pub fn run() -> Result<()> {
    let seed = 42u64;

    let (line_master_loss, line_best_expert_loss) = two_expert_line(seed)?;

    let cfg = AggregatorConfig::default().with_horizon(400).with_period(20);
    let source = RegimeGenerator::demo(seed);
    let stamps = source.stamps().to_vec();
    let mut agg = Aggregator::new(cfg, source)?;
    agg.run()?;

    let history = agg.history();
    let oracle = cumulative(&history.oracle_losses(&stamps));
    let fixed = history.best_expert_over(cfg.period..cfg.total_time);
    let (min_reserved_mass, max_reserved_mass) = reserved_range(history);
    let handover_steps = stamps
        .iter()
        .map(|&s| handover(history, s, cfg.period))
        .collect();

    let report = AssayReport {
        seed,
        line_master_loss,
        line_best_expert_loss,
        line_regret: line_master_loss - line_best_expert_loss,
        switch_steps: cfg.total_time,
        switch_period: cfg.period,
        experts_launched: agg.launched(),
        master_loss_total: history.master_losses().iter().sum(),
        oracle_loss_total: oracle.last().copied().unwrap_or(0.0),
        best_fixed_expert: fixed.map(|(i, _)| i),
        best_fixed_loss: fixed.map(|(_, l)| l),
        min_reserved_mass,
        max_reserved_mass,
        handover_steps,
    };

    print_report(&report);
    Ok(())
}

/// Noisy line `y = 2x`, horizon 120, experts at 40 and 80. Returns the
/// master and best expert losses over `[80, 120)`.
fn two_expert_line(seed: u64) -> Result<(f64, f64)> {
    let source = RegimeGenerator::new(GeneratorConfig {
        regimes: vec![Regime::new(vec![2.0], 0.0)],
        seed,
        ..GeneratorConfig::default()
    })?;

    let cfg = AggregatorConfig::default().with_horizon(120).with_period(40);
    let mut agg = Aggregator::new(cfg, source)?;
    let history = agg.run()?;

    let summary = history.regret_over(80..120);
    Ok((
        summary.master_loss,
        summary.best_expert_loss.unwrap_or(f64::NAN),
    ))
}

fn reserved_range(history: &History) -> (f64, f64) {
    history
        .records()
        .iter()
        .filter(|r| r.launched > 0)
        .map(|r| r.weights[0])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), m| {
            (lo.min(m), hi.max(m))
        })
}

fn handover(history: &History, stamp: usize, period: usize) -> Option<usize> {
    history.records().iter().skip(stamp).find_map(|r| {
        let leader = r.weights[1..]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i + 1)?;
        (leader * period > stamp).then(|| r.t - stamp)
    })
}

fn print_report(r: &AssayReport) {
    println!("fixshare assays");
    println!("seed={}", r.seed);
    println!("line_master_loss={:.3}", r.line_master_loss);
    println!("line_best_expert_loss={:.3}", r.line_best_expert_loss);
    println!("line_regret={:.3}", r.line_regret);
    println!("switch_steps={}", r.switch_steps);
    println!("switch_period={}", r.switch_period);
    println!("experts_launched={}", r.experts_launched);
    println!("master_loss_total={:.3}", r.master_loss_total);
    println!("oracle_loss_total={:.3}", r.oracle_loss_total);
    println!("best_fixed_expert={:?}", r.best_fixed_expert);
    println!("best_fixed_loss={:?}", r.best_fixed_loss);
    println!("min_reserved_mass={:.4}", r.min_reserved_mass);
    println!("max_reserved_mass={:.4}", r.max_reserved_mass);
    println!("handover_steps={:?}", r.handover_steps);
}
