use crate::association::PairwiseDriver;
use crate::catalog::MutationCatalog;
use crate::config::AssociationConfig;
use crate::io::{read_mutation_records, summary_path, write_results, write_summary, RunSummary};
use crate::stats::TestMethod;
use anyhow::{ensure, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;

/// Test every resistance mutation against every other mutation for
/// co-occurrence across samples.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// CSV of passing mutation calls with UNIQUEID, GENE and MUTATION columns (.gz accepted)
    #[arg(long)]
    pub mutations: PathBuf,

    /// CSV of resistance-associated mutation calls, same columns (.gz accepted)
    #[arg(long)]
    pub effects: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Statistical association test
    #[arg(long, value_enum)]
    pub test_method: Option<TestMethod>,

    /// Minimum number of samples a resistance mutation must exceed
    #[arg(long)]
    pub n_resistant: Option<usize>,

    /// Minimum number of samples an other mutation must exceed
    #[arg(long)]
    pub n_other: Option<usize>,

    /// Include synonymous mutations in the analysis
    #[arg(long)]
    pub include_syn: bool,

    /// Number of Monte-Carlo simulations per pair
    #[arg(long)]
    pub n_simulations: Option<u64>,

    /// Number of samples in each simulation
    #[arg(long)]
    pub sim_sample_size: Option<u64>,

    /// Population size the observed counts are relative to
    #[arg(long)]
    pub population_size: Option<u64>,

    /// Seed for the Monte-Carlo test
    #[arg(long)]
    pub seed: Option<u64>,

    /// Disable the continuity correction of the chi-square test
    #[arg(long)]
    pub no_yates: bool,

    /// Number of threads to use
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Print progress information at debug level
    #[arg(long)]
    pub debug: bool,

    /// Output CSV; the run summary goes to <OUTFILE>.summary.json
    #[arg(short, long, default_value = "results.csv")]
    pub outfile: PathBuf,
}

impl Cli {
    /// Merges defaults, the optional config file and the command-line flags.
    pub fn resolve_config(&self) -> Result<AssociationConfig> {
        let mut config = match &self.config {
            Some(path) => AssociationConfig::from_json_file(path)?,
            None => AssociationConfig::default(),
        };

        if let Some(method) = self.test_method {
            config.method = method;
        }
        if let Some(n) = self.n_resistant {
            config.min_resistant_samples = n;
        }
        if let Some(n) = self.n_other {
            config.min_other_samples = n;
        }
        if self.include_syn {
            config.include_synonymous = true;
        }
        if let Some(n) = self.n_simulations {
            config.monte_carlo.n_simulations = n;
        }
        if let Some(n) = self.sim_sample_size {
            config.monte_carlo.n_samples_per_sim = n;
        }
        if let Some(n) = self.population_size {
            config.population_size = n;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.no_yates {
            config.yates_correction = false;
        }
        if let Some(threads) = self.threads {
            config.parallel.threads = threads;
        }

        ensure!(
            config.min_resistant_samples > 0,
            "n_resistant must be a positive number"
        );
        ensure!(
            config.min_other_samples > 0,
            "n_other must be a positive number"
        );
        Ok(config)
    }
}

/// Main entry point for CLI
pub fn run_cli(cli: Cli) -> Result<RunSummary> {
    let config = cli.resolve_config()?;
    info!("Configuration: {:?}", config);

    let mutations = read_mutation_records(&cli.mutations)?;
    let effects = read_mutation_records(&cli.effects)?;
    let catalog = MutationCatalog::build(&mutations, &effects, &config.catalog_options())?;
    check_population_size(&config, catalog.universe.len());

    let run = PairwiseDriver::new(config.strategy())
        .with_parallel(config.parallel.clone())
        .run(
            &catalog.resistant_mutations,
            &catalog.other_mutations,
            &catalog.membership,
            &catalog.universe,
        )?;

    if let Some(strongest) = run
        .iter_tested()
        .min_by(|a, b| a.outcome.p_value().total_cmp(&b.outcome.p_value()))
    {
        info!(
            "Smallest p-value: {} for {} with {}",
            strongest.outcome.p_value(),
            strongest.resistant_mutation,
            strongest.other_mutation
        );
    }

    write_results(&run, &cli.outfile)?;
    let summary = RunSummary::new(&run, &catalog);
    let summary_file = summary_path(&cli.outfile);
    write_summary(&summary, &summary_file)?;
    info!(
        "Wrote {} rows to {} and the run summary to {}",
        run.n_pairs(),
        cli.outfile.display(),
        summary_file.display()
    );

    Ok(summary)
}

/// Warns when Monte-Carlo frequencies are taken relative to a population that
/// is not the cohort being analysed. Returns whether the sizes disagree.
fn check_population_size(config: &AssociationConfig, n_samples: usize) -> bool {
    let mismatch =
        config.method == TestMethod::Numerical && config.population_size != n_samples as u64;
    if mismatch {
        warn!(
            "Population size {} differs from the {} samples in the cohort; simulated marginal frequencies will not match the observed ones",
            config.population_size, n_samples
        );
    }
    mismatch
}
