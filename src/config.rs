//! Run configuration.
//!
//! Defaults reproduce the usual analysis: Monte-Carlo test with 100,000
//! simulations of 10,000 samples, a population of 64,722 samples and a
//! 50-sample minimum for both mutation classes. A JSON file can override any
//! subset of the fields; command-line flags override the file.

use crate::catalog::CatalogOptions;
use crate::stats::monte_carlo::DEFAULT_POPULATION_SIZE;
use crate::stats::{MonteCarloParams, TestMethod, TestStrategy};
use crate::utils::parallel::ParallelConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    pub method: TestMethod,
    pub monte_carlo: MonteCarloParams,
    /// Population the Monte-Carlo marginal frequencies are relative to
    pub population_size: u64,
    pub seed: u64,
    /// Apply the continuity correction in the chi-square test
    pub yates_correction: bool,
    pub min_resistant_samples: usize,
    pub min_other_samples: usize,
    pub include_synonymous: bool,
    pub parallel: ParallelConfig,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        let catalog = CatalogOptions::default();
        AssociationConfig {
            method: TestMethod::Numerical,
            monte_carlo: MonteCarloParams::default(),
            population_size: DEFAULT_POPULATION_SIZE,
            seed: DEFAULT_SEED,
            yates_correction: true,
            min_resistant_samples: catalog.min_resistant_samples,
            min_other_samples: catalog.min_other_samples,
            include_synonymous: catalog.include_synonymous,
            parallel: ParallelConfig::default(),
        }
    }
}

impl AssociationConfig {
    /// Loads a configuration from a JSON file; missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file '{}'", path.display()))?;
        let config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;
        Ok(config)
    }

    pub fn strategy(&self) -> TestStrategy {
        match self.method {
            TestMethod::Exact => TestStrategy::Exact,
            TestMethod::ChiSquare => TestStrategy::ChiSquare {
                yates: self.yates_correction,
            },
            TestMethod::Numerical => TestStrategy::MonteCarlo {
                params: self.monte_carlo,
                population_size: self.population_size,
                seed: self.seed,
            },
        }
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            min_resistant_samples: self.min_resistant_samples,
            min_other_samples: self.min_other_samples,
            include_synonymous: self.include_synonymous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AssociationConfig::default();
        assert_eq!(config.method, TestMethod::Numerical);
        assert_eq!(config.population_size, 64_722);
        assert_eq!(config.monte_carlo.n_simulations, 100_000);
        assert_eq!(config.monte_carlo.n_samples_per_sim, 10_000);
        assert_eq!(config.catalog_options(), CatalogOptions::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{"method": "chi-square", "yates_correction": false, "monte_carlo": {{"n_simulations": 500}}}}"#
        )
        .unwrap();

        let config = AssociationConfig::from_json_file(&path).unwrap();
        assert_eq!(config.method, TestMethod::ChiSquare);
        assert_eq!(config.monte_carlo.n_simulations, 500);
        assert_eq!(config.monte_carlo.n_samples_per_sim, 10_000);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.strategy(), TestStrategy::ChiSquare { yates: false });
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(AssociationConfig::from_json_file(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_numerical_strategy_carries_parameters() {
        let config = AssociationConfig {
            population_size: 1_000,
            seed: 3,
            ..AssociationConfig::default()
        };
        match config.strategy() {
            TestStrategy::MonteCarlo {
                params,
                population_size,
                seed,
            } => {
                assert_eq!(params, MonteCarloParams::default());
                assert_eq!(population_size, 1_000);
                assert_eq!(seed, 3);
            }
            other => panic!("unexpected strategy {:?}", other),
        }
    }
}
