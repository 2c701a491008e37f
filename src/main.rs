use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use rand::rngs::OsRng;
use rand::RngCore;
use sphincs_fault::attack::stats::mean_of_successes;
use sphincs_fault::attack::{
    run_stats_trials, AttackConfig, AttackMode, AttackPipeline, DigitRow, LocalOracle, SigningOracle,
};
use sphincs_fault::{Params, Result};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Fault attack on the top hypertree layer of SPHINCS+.
#[derive(Parser)]
#[command(name = "sphincs-fault")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Parameter set, e.g. sha256-256f-robust or sha256-128f-simple.
    #[arg(long, global = true, default_value = "sha256-256f-robust")]
    params: String,
    /// Stop after this many faulty signatures instead of waiting for enter.
    #[arg(long, global = true)]
    max_queries: Option<usize>,
    /// Throwaway key pairs the forger may try.
    #[arg(long, global = true, default_value_t = 10_000)]
    forge_attempts: usize,
    /// Sign without fresh randomness.
    #[arg(long, global = true)]
    deterministic: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover the chains of the top-layer key one message uses, then forge.
    #[command(name = "singleSubtree")]
    SingleSubtree,
    /// Count the faulty signatures a single-key forgery needs, over many trials.
    #[command(name = "singleSubtreeStats")]
    SingleSubtreeStats {
        /// File the per-trial counts are appended to.
        #[arg(long, default_value = "singleNodeFaultyRequires.csv")]
        stats_file: PathBuf,
        /// Number of trials; runs until enter is pressed if omitted.
        #[arg(long)]
        trials: Option<usize>,
    },
    /// Recover the chains of every top-layer key at once, then forge.
    #[command(name = "parallelSubtree")]
    ParallelSubtree,
    /// Count the faulty signatures a forgery needs when every key is attacked.
    #[command(name = "parallelSubtreeStats")]
    ParallelSubtreeStats {
        /// File the per-trial counts are appended to.
        #[arg(long, default_value = "parallelFaultyRequires.csv")]
        stats_file: PathBuf,
        /// Number of trials; runs until enter is pressed if omitted.
        #[arg(long)]
        trials: Option<usize>,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let params = cli.params.parse::<Params>()?.with_randomize(!cli.deterministic);
    let config = AttackConfig::default()
        .with_max_queries(cli.max_queries)
        .with_forge_attempts(cli.forge_attempts);
    info!("parameter set {}, {} variant", cli.params, params.variant);

    match cli.command {
        Commands::SingleSubtree => attack(params, config.with_mode(AttackMode::SingleSubtree)),
        Commands::SingleSubtreeStats { stats_file, trials } => stats(
            params,
            config
                .with_mode(AttackMode::SingleSubtree)
                .with_stats_path(Some(stats_file)),
            trials,
        ),
        Commands::ParallelSubtree => attack(params, config.with_mode(AttackMode::ParallelSubtree)),
        Commands::ParallelSubtreeStats { stats_file, trials } => stats(
            params,
            config
                .with_mode(AttackMode::ParallelSubtree)
                .with_stats_path(Some(stats_file)),
            trials,
        ),
    }
}

/// A flag that is raised once a line is read from stdin.
fn cancel_on_enter() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    thread::spawn(move || {
        let mut line = String::new();
        // EOF never cancels, so a closed stdin leaves the query limit in charge.
        if let Ok(read) = io::stdin().lock().read_line(&mut line) {
            if read > 0 {
                flag.store(true, Ordering::Relaxed);
            }
        }
    });
    cancel
}

fn random_message(params: &Params) -> Vec<u8> {
    let mut message = vec![0u8; params.n];
    OsRng.fill_bytes(&mut message);
    message
}

fn attack(params: Params, config: AttackConfig) -> Result<()> {
    let message = random_message(&params);
    let target = random_message(&params);
    let oracle = LocalOracle::new(params)?;
    let mut pipeline = AttackPipeline::new(oracle, config.with_forge_target(Some(target)))?;

    if pipeline.config().max_queries.is_none() {
        println!("Signing faulty messages. Press enter to stop");
    }
    let cancel = cancel_on_enter();
    let report = pipeline.run(&message, &cancel);
    pipeline.oracle_mut().shutdown();
    let report = report?;

    println!(
        "{} honest and {} faulty signatures, {} improved a chain, {} were inconclusive",
        report.honest_queries, report.faulty_queries, report.improvements, report.inconclusive
    );
    for state in report.recovery.leaves() {
        println!("Top leaf {} signs any message whose digits are at least:", state.leaf());
        println!(
            "{}",
            DigitRow {
                known: state.hash_count(),
                required: None,
            }
        );
    }

    match report.forgery {
        Some(forgery) => {
            let verified = report
                .recovery
                .sphincs()
                .verify(&forgery.signature, &forgery.message, pipeline.oracle().public_key());
            println!("Forged signature after {} attempts, verifies: {verified}", forgery.attempts);
        }
        None => println!("Didn't quite work: no forgery found"),
    }
    Ok(())
}

fn stats(params: Params, config: AttackConfig, trials: Option<usize>) -> Result<()> {
    if trials.is_none() {
        println!("Running trials. Press enter to stop after the current one");
    }
    let cancel = cancel_on_enter();
    let results = run_stats_trials(params, &config, trials, &cancel)?;

    match mean_of_successes(&results) {
        Some(mean) => println!(
            "{} trials, {} forgeable, mean faulty signatures required {mean:.1}",
            results.len(),
            results.iter().flatten().count()
        ),
        None => println!("{} trials, none forgeable", results.len()),
    }
    Ok(())
}
