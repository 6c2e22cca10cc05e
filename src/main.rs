//! crowdkappa - agreement between crowd workers on span annotations.
//!
//! Exit codes:
//!   0 - The report was computed
//!   1 - Invalid configuration, or no record could be loaded

use anyhow::{bail, Context, Result};
use clap::Parser;
use crowdkappa::{
    aggregate_kappa, build_scenarios, load_paths, AgreementConfig, AgreementConfigBuilder,
    OverlapStrategy, PolicyKind, ScenarioAnnotations,
};
use std::path::PathBuf;
use std::str::FromStr;

/// Fleiss' kappa between the workers of a crowd span annotation job.
///
/// Examples:
///   crowdkappa output/
///   crowdkappa --policy quorum --quota 50 --workers 3 output/
///   crowdkappa --compare output/scenario-12.json
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Files or directories holding the annotation export (.json or .jsonl)
    #[arg(required = true, value_name = "PATHS")]
    paths: Vec<PathBuf>,

    /// How per-scenario kappas are averaged: `mean` or `quorum`
    #[arg(long, value_parser = PolicyKind::from_str)]
    policy: Option<PolicyKind>,

    /// Number of scenarios the quorum average is computed over
    #[arg(long, value_name = "COUNT")]
    quota: Option<usize>,

    /// Number of workers a scenario needs to count toward the quorum average
    #[arg(long, value_name = "COUNT")]
    workers: Option<usize>,

    /// Kappa credited for each scenario missing from the quota
    #[arg(long, value_name = "KAPPA")]
    pass_credit: Option<f64>,

    /// How entities of the same label combine: `last-write-wins` or `union`
    #[arg(long, value_parser = OverlapStrategy::from_str)]
    overlap: Option<OverlapStrategy>,

    /// Score the scenarios on all cores
    #[arg(long)]
    parallel: bool,

    /// TOML configuration file; command-line options take precedence over it
    #[arg(short, long, value_name = "FILE", env = "CROWDKAPPA_CONFIG")]
    config: Option<PathBuf>,

    /// Print the label vectors of every scenario as JSON
    #[arg(long)]
    vectors: bool,

    /// Print every scenario with each worker's vectors under its text
    #[arg(long)]
    compare: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity; repeat for more (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn build_config(args: &Args) -> Result<AgreementConfig> {
    let mut builder = match &args.config {
        Some(path) => AgreementConfigBuilder::from_toml_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AgreementConfigBuilder::default(),
    };
    if let Some(policy) = args.policy {
        builder = builder.policy(policy);
    }
    if let Some(quota) = args.quota {
        builder = builder.quota(quota);
    }
    if let Some(workers) = args.workers {
        builder = builder.workers(workers);
    }
    if let Some(pass_credit) = args.pass_credit {
        builder = builder.pass_credit(pass_credit);
    }
    if let Some(overlap) = args.overlap {
        builder = builder.overlap(overlap);
    }
    if args.parallel {
        builder = builder.parallel(true);
    }
    Ok(builder.build()?)
}

fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    log::info!("{}", config);

    let corpus = load_paths(&args.paths);
    if corpus.is_empty() {
        bail!("No annotation record could be loaded");
    }
    let load_failures = corpus.failures.len();
    let records = corpus.into_records();
    let (scenarios, failed) = build_scenarios(&records, config.overlap());

    if args.vectors {
        let views: Vec<ScenarioAnnotations> = scenarios.iter().map(|s| s.annotations()).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    }
    if args.compare {
        for scenario in scenarios.iter() {
            println!("{}", scenario);
        }
    }

    let reporter = aggregate_kappa(&scenarios, &config).with_skipped(failed);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&reporter)?);
    } else {
        println!("{}", reporter);
    }
    if load_failures > 0 {
        log::warn!("{} files could not be loaded", load_failures);
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    setup_logging(args.verbose);
    log::debug!("Arguments: {:?}", args);

    if let Err(err) = run(args) {
        log::error!("{:#}", err);
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
