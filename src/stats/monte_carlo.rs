//! Monte-Carlo estimate of co-occurrence significance.
//!
//! Each simulation draws a resistance trait for every simulated sample and,
//! among the samples that carry it, an independent "other" trait. The number
//! of simulated samples carrying both is compared with the observed
//! co-occurrence rescaled to the simulated sample size.

use crate::error::{AssociationError, Result};
use log::debug;
use rand::distr::{Bernoulli, Distribution};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Historical cohort size the marginal frequencies were estimated against.
pub const DEFAULT_POPULATION_SIZE: u64 = 64_722;

/// Simulations are run in fixed blocks, each with its own derived seed, so
/// the estimate does not depend on how many threads execute them.
const SIMULATION_BLOCK: u64 = 1_000;

/// Simulation sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloParams {
    pub n_simulations: u64,
    pub n_samples_per_sim: u64,
}

impl Default for MonteCarloParams {
    fn default() -> Self {
        MonteCarloParams {
            n_simulations: 100_000,
            n_samples_per_sim: 10_000,
        }
    }
}

/// Simulated p-value kept as an exact fraction `exceeding / simulations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedPValue {
    pub exceeding: u64,
    pub simulations: u64,
}

impl SimulatedPValue {
    pub fn one() -> Self {
        SimulatedPValue {
            exceeding: 1,
            simulations: 1,
        }
    }

    pub fn value(&self) -> f64 {
        self.exceeding as f64 / self.simulations as f64
    }
}

impl fmt::Display for SimulatedPValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.exceeding, self.simulations)
    }
}

/// Estimates P(simulated co-occurrence >= observed co-occurrence).
///
/// # Arguments
///
/// * `params` - Number of simulations and simulated samples per simulation.
/// * `n_resistant_observed` - Samples carrying the resistance mutation.
/// * `n_other_observed` - Samples carrying the other mutation.
/// * `n_both_observed` - Samples carrying both.
/// * `population_size` - Population the marginal frequencies are relative to.
/// * `seed` - Base seed; equal seeds give equal results.
pub fn numerical_pvalue(
    params: &MonteCarloParams,
    n_resistant_observed: u64,
    n_other_observed: u64,
    n_both_observed: u64,
    population_size: u64,
    seed: u64,
) -> Result<SimulatedPValue> {
    if params.n_simulations == 0 || params.n_samples_per_sim == 0 {
        return Err(AssociationError::NumericalDomain(format!(
            "simulation needs at least one run and one sample, got {:?}",
            params
        )));
    }
    if population_size == 0 {
        return Err(AssociationError::NumericalDomain(
            "population size must be positive".to_string(),
        ));
    }
    if n_resistant_observed > population_size || n_other_observed > population_size {
        return Err(AssociationError::NumericalDomain(format!(
            "observed counts ({}, {}) exceed population size {}",
            n_resistant_observed, n_other_observed, population_size
        )));
    }
    if n_both_observed > n_resistant_observed.min(n_other_observed) {
        return Err(AssociationError::NumericalDomain(format!(
            "co-occurrence {} exceeds a marginal count ({}, {})",
            n_both_observed, n_resistant_observed, n_other_observed
        )));
    }

    let population = population_size as f64;
    let resistant = Bernoulli::new(n_resistant_observed as f64 / population)
        .map_err(|e| AssociationError::NumericalDomain(e.to_string()))?;
    let other = Bernoulli::new(n_other_observed as f64 / population)
        .map_err(|e| AssociationError::NumericalDomain(e.to_string()))?;
    let scaled_observed = n_both_observed as f64 / population * params.n_samples_per_sim as f64;

    let n_blocks = params.n_simulations.div_ceil(SIMULATION_BLOCK);
    let exceeding: u64 = (0..n_blocks)
        .into_par_iter()
        .map(|block| {
            let start = block * SIMULATION_BLOCK;
            let end = (start + SIMULATION_BLOCK).min(params.n_simulations);
            let mut rng = StdRng::seed_from_u64(derive_seed(seed, block));
            (start..end)
                .filter(|_| {
                    let both = simulate_co_occurrence(
                        &mut rng,
                        &resistant,
                        &other,
                        params.n_samples_per_sim,
                    );
                    both as f64 >= scaled_observed
                })
                .count() as u64
        })
        .sum();

    debug!(
        "Monte-Carlo: {}/{} simulations reached scaled co-occurrence {:.3}",
        exceeding, params.n_simulations, scaled_observed
    );

    Ok(SimulatedPValue {
        exceeding,
        simulations: params.n_simulations,
    })
}

/// One simulation: the other trait is only drawn where the resistance trait
/// is present.
fn simulate_co_occurrence(
    rng: &mut StdRng,
    resistant: &Bernoulli,
    other: &Bernoulli,
    n_samples: u64,
) -> u64 {
    let mut both = 0;
    for _ in 0..n_samples {
        if resistant.sample(rng) && other.sample(rng) {
            both += 1;
        }
    }
    both
}

/// Mixes a base seed with a stream index (SplitMix64 finalizer).
pub fn derive_seed(base: u64, stream: u64) -> u64 {
    let mut z = base
        .wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
