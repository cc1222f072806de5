use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info, Level};

use mdpsim::bellman::{BellmanConfig, SingleStateEvaluation};
use mdpsim::config::SimConfig;
use mdpsim::engine::Engine;
use mdpsim::error::MdpError;
use mdpsim::inventory::{DemandRegime, InventoryModel};
use mdpsim::line::{AlwaysRight, LineModel};
use mdpsim::model::MdpModel;
use mdpsim::mrp::{Activity, Drift, MrpModel};
use mdpsim::policy::{Policy, RandomPolicy};
use mdpsim::portfolio::{PortfolioModel, RegimePolicy};
use mdpsim::production::ProductionModel;
use mdpsim::random::{RandomStream, WeightedOutcomes};
use mdpsim::regime::Regime;
use mdpsim::report;
use mdpsim::robot::{RobotModel, WalkingPolicy};

/// Command line argument parser.
#[derive(Parser, Debug)]
#[command(about = "Simulate small regime-switching Markov decision processes", long_about = None)]
pub struct Args {
    /// Path to mdpsim configuration TOML file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for the random stream. Overrides the configuration file.
    #[arg(short, long, env = "MDPSIM_SEED")]
    seed: Option<u64>,

    /// Log more (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate inventory control with regime-switching demand.
    Inventory(RunArgs),
    /// Simulate production planning with switching capacity.
    Production(RunArgs),
    /// Simulate a walking robot until it falls or reaches the goal.
    Robot(RunArgs),
    /// Simulate a toy portfolio under bull and bear markets.
    Portfolio(RunArgs),
    /// Simulate the student Markov reward process and its discounted return.
    Mrp(RunArgs),
    /// Walk a five-cell line until reaching the rewarding end.
    Line(RunArgs),
    /// Print regime transition matrices, demand distributions and the MRP table.
    Probs,
    /// Evaluate a fixed policy at a single decision state.
    Bellman,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    #[arg(long, value_enum, default_value_t = PolicyKind::Heuristic)]
    policy: PolicyKind,

    /// Step bound. Defaults to the configured horizon.
    #[arg(long)]
    steps: Option<usize>,

    /// Also write the trajectory to this CSV file.
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PolicyKind {
    Heuristic,
    Random,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> Result<(), MdpError> {
    let cfg = SimConfig::load(args.config.as_deref())?;
    let seed = args.seed.unwrap_or(cfg.seed);
    let mut rng = RandomStream::seed(seed);

    match &args.command {
        Commands::Inventory(opts) => {
            let model = InventoryModel::new(&cfg.inventory)?;
            let heuristic = cfg.inventory.heuristic();
            let engine = Engine::new(opts.steps.unwrap_or(cfg.inventory.steps));
            let policy = select::<InventoryModel>(opts.policy, &heuristic);
            simulate(&model, policy, cfg.inventory.start_state(), engine, opts, seed, &mut rng)
        }
        Commands::Production(opts) => {
            let model = ProductionModel::new(&cfg.production)?;
            let heuristic = cfg.production.heuristic();
            let engine = Engine::new(opts.steps.unwrap_or(cfg.production.steps));
            let policy = select::<ProductionModel>(opts.policy, &heuristic);
            simulate(&model, policy, cfg.production.start_state(), engine, opts, seed, &mut rng)
        }
        Commands::Robot(opts) => {
            let model = RobotModel::new(&cfg.robot)?;
            info!(goal = model.goal(), "robot track");
            let engine = Engine::new(opts.steps.unwrap_or(cfg.robot.steps));
            let policy = select::<RobotModel>(opts.policy, &WalkingPolicy);
            simulate(&model, policy, cfg.robot.start_state(), engine, opts, seed, &mut rng)
        }
        Commands::Portfolio(opts) => {
            let model = PortfolioModel::new(&cfg.portfolio)?;
            let engine = Engine::new(opts.steps.unwrap_or(cfg.portfolio.steps));
            let policy = select::<PortfolioModel>(opts.policy, &RegimePolicy);
            simulate(&model, policy, cfg.portfolio.start_state(), engine, opts, seed, &mut rng)
        }
        Commands::Mrp(opts) => {
            let model = MrpModel::new(&cfg.mrp)?;
            let engine = Engine::new(opts.steps.unwrap_or(cfg.mrp.steps))
                .with_discount(model.gamma())?;
            let policy = select::<MrpModel>(opts.policy, &Drift);
            simulate(&model, policy, cfg.mrp.start, engine, opts, seed, &mut rng)
        }
        Commands::Line(opts) => {
            let engine = Engine::new(opts.steps.unwrap_or(cfg.line.steps));
            let policy = select::<LineModel>(opts.policy, &AlwaysRight);
            simulate(&LineModel, policy, cfg.line.start, engine, opts, seed, &mut rng)
        }
        Commands::Probs => show_probs(&cfg),
        Commands::Bellman => show_bellman(&cfg.bellman),
    }
}

fn select<'a, M: MdpModel>(kind: PolicyKind, heuristic: &'a dyn Policy<M>) -> &'a dyn Policy<M> {
    match kind {
        PolicyKind::Heuristic => heuristic,
        PolicyKind::Random => &RandomPolicy,
    }
}

fn simulate<M: MdpModel>(
    model: &M,
    policy: &dyn Policy<M>,
    initial: M::State,
    engine: Engine,
    opts: &RunArgs,
    seed: u64,
    rng: &mut RandomStream,
) -> Result<(), MdpError> {
    info!(
        model = model.name(),
        policy = policy.name(),
        seed,
        steps = engine.max_steps(),
        discount = ?engine.discount(),
        "starting episode"
    );
    let episode = engine.run(model, policy, initial, rng)?;
    print!("{}", report::render(&episode));
    if let Some(path) = &opts.csv {
        report::save_csv(&episode, path)?;
        info!(path = %path.display(), "trajectory written");
    }
    Ok(())
}

/// Probability of each distinct value; repeated entries are merged.
fn show_distribution(dist: &WeightedOutcomes<u32>) {
    let mut merged: BTreeMap<u32, f64> = BTreeMap::new();
    for (value, p) in dist.probabilities() {
        *merged.entry(*value).or_default() += p;
    }
    for (value, p) in merged {
        println!("  demand {value:>3} | {p:.3}");
    }
}

fn show_probs(cfg: &SimConfig) -> Result<(), MdpError> {
    let inventory = InventoryModel::new(&cfg.inventory)?;
    println!("\n=== Inventory Demand Regime Transitions ===");
    print!("{}", inventory.regimes());
    for &regime in DemandRegime::ALL {
        println!("\n=== Inventory Demand ({regime}) ===");
        show_distribution(inventory.demand(regime));
    }

    let production = ProductionModel::new(&cfg.production)?;
    println!("\n=== Production Capacity Regime Transitions ===");
    print!("{}", production.regimes());
    println!("\n=== Production Demand ===");
    show_distribution(production.demand());

    let portfolio = PortfolioModel::new(&cfg.portfolio)?;
    println!("\n=== Portfolio Market Regime Transitions ===");
    print!("{}", portfolio.markets());

    let mrp = MrpModel::new(&cfg.mrp)?;
    println!("\n=== Student MRP Transitions ===");
    for a in Activity::ALL {
        let name = a.to_string();
        let Some(chain) = mrp.successors(a) else {
            println!("  {name:>8} (R = {:+}) | terminal", a.reward());
            continue;
        };
        let row: Vec<String> = chain
            .probabilities()
            .map(|(next, p)| format!("{next} {p:.2}"))
            .collect();
        println!("  {name:>8} (R = {:+}) | {}", a.reward(), row.join(", "));
    }
    Ok(())
}

fn show_bellman(cfg: &BellmanConfig) -> Result<(), MdpError> {
    let eval = SingleStateEvaluation::new(cfg)?;
    let state = eval.state();

    println!("Given:");
    println!("  gamma = {}", eval.gamma());
    for (action, p) in eval.actions() {
        println!("  pi({action}|{state}) = {p}");
    }
    println!("  Successor values:");
    for (s, v) in eval.values() {
        println!("    V({s}) = {v}");
    }

    let result = eval.evaluate(cfg.tolerance, cfg.max_iterations);
    println!("\nAction values:");
    for (action, _) in eval.actions() {
        if let Some(q) = eval.q_value(action, result.value) {
            println!("  Q({state}, {action}) = {q:.6}");
        }
    }
    println!("  Greedy choice: {}", eval.greedy_action(result.value));

    println!("\nPolicy evaluation of V({state}):");
    println!("iter | V_old        -> V_new        | delta");
    println!("{}", "-".repeat(52));
    for it in &result.iterations {
        println!(
            "{:4} | {:12.8} -> {:12.8} | {:.3e}",
            it.iter, it.old, it.new, it.delta
        );
    }
    if !result.converged {
        println!("(stopped after {} iterations)", result.iterations.len());
    }
    println!("\nV({state}) = {:.6}", result.value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_run_options() {
        let args = Args::try_parse_from([
            "mdpsim", "--seed", "4", "-vv", "robot", "--policy", "random", "--steps", "7",
        ])
        .unwrap();
        assert_eq!(args.seed, Some(4));
        assert_eq!(args.verbose, 2);
        match args.command {
            Commands::Robot(opts) => {
                assert_eq!(opts.policy, PolicyKind::Random);
                assert_eq!(opts.steps, Some(7));
                assert!(opts.csv.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_new_simulators() {
        let args = Args::try_parse_from(["mdpsim", "mrp", "--steps", "50"]).unwrap();
        match args.command {
            Commands::Mrp(opts) => assert_eq!(opts.steps, Some(50)),
            other => panic!("unexpected command {other:?}"),
        }
        let args = Args::try_parse_from(["mdpsim", "line", "--policy", "random"]).unwrap();
        match args.command {
            Commands::Line(opts) => assert_eq!(opts.policy, PolicyKind::Random),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn heuristic_is_the_default_policy() {
        let args = Args::try_parse_from(["mdpsim", "inventory"]).unwrap();
        match args.command {
            Commands::Inventory(opts) => assert_eq!(opts.policy, PolicyKind::Heuristic),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
