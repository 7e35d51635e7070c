//! Statistical tests for 2×2 co-occurrence tables.
//!
//! Three interchangeable strategies are available: an exact hypergeometric
//! test, a chi-square test and a Monte-Carlo simulation. A run picks one
//! `TestStrategy` up front; every tested pair then yields a `TestOutcome`
//! of the matching shape.

pub mod chi_square;
pub mod exact;
pub mod monte_carlo;

pub use chi_square::{chi_square, ChiSquareResult};
pub use exact::{exact_pvalue, ExactPValues};
pub use monte_carlo::{numerical_pvalue, MonteCarloParams, SimulatedPValue};

use crate::contingency::Table2x2;
use crate::error::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of the available tests, as used on the command line and in config
/// files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum TestMethod {
    /// Exact hypergeometric test
    #[serde(rename = "fisher")]
    #[value(name = "fisher")]
    Exact,
    #[serde(rename = "chi-square")]
    #[value(name = "chi-square")]
    ChiSquare,
    /// Monte-Carlo simulation
    #[serde(rename = "numerical")]
    #[value(name = "numerical")]
    Numerical,
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestMethod::Exact => "fisher",
            TestMethod::ChiSquare => "chi-square",
            TestMethod::Numerical => "numerical",
        };
        f.write_str(name)
    }
}

/// A configured test, fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub enum TestStrategy {
    Exact,
    ChiSquare {
        yates: bool,
    },
    MonteCarlo {
        params: MonteCarloParams,
        population_size: u64,
        seed: u64,
    },
}

/// Output of one strategy for one table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestOutcome {
    Exact(ExactPValues),
    ChiSquare(ChiSquareResult),
    MonteCarlo(SimulatedPValue),
}

impl TestOutcome {
    /// The p-value reported downstream. For the exact test this is the
    /// right tail.
    pub fn p_value(&self) -> f64 {
        match self {
            TestOutcome::Exact(p) => p.right_tail,
            TestOutcome::ChiSquare(res) => res.p_value,
            TestOutcome::MonteCarlo(p) => p.value(),
        }
    }
}

impl TestStrategy {
    pub fn method(&self) -> TestMethod {
        match self {
            TestStrategy::Exact => TestMethod::Exact,
            TestStrategy::ChiSquare { .. } => TestMethod::ChiSquare,
            TestStrategy::MonteCarlo { .. } => TestMethod::Numerical,
        }
    }

    /// Runs the test on `table`.
    ///
    /// `pair_index` selects the random stream of the Monte-Carlo strategy so
    /// every pair gets its own reproducible draws; other strategies ignore it.
    pub fn evaluate(&self, table: &Table2x2, pair_index: u64) -> Result<TestOutcome> {
        match self {
            TestStrategy::Exact => Ok(TestOutcome::Exact(exact_pvalue(table))),
            TestStrategy::ChiSquare { yates } => {
                chi_square(table, *yates).map(TestOutcome::ChiSquare)
            }
            TestStrategy::MonteCarlo {
                params,
                population_size,
                seed,
            } => numerical_pvalue(
                params,
                table.row_sums()[1],
                table.col_sums()[1],
                table.both(),
                *population_size,
                monte_carlo::derive_seed(*seed, pair_index),
            )
            .map(TestOutcome::MonteCarlo),
        }
    }

    /// Outcome recorded for pairs that are skipped without testing.
    pub fn neutral_outcome(&self, table: &Table2x2) -> TestOutcome {
        match self {
            TestStrategy::Exact => TestOutcome::Exact(ExactPValues::neutral()),
            TestStrategy::ChiSquare { .. } => {
                TestOutcome::ChiSquare(ChiSquareResult::neutral(table))
            }
            TestStrategy::MonteCarlo { .. } => TestOutcome::MonteCarlo(SimulatedPValue::one()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn strategies() -> Vec<TestStrategy> {
        vec![
            TestStrategy::Exact,
            TestStrategy::ChiSquare { yates: true },
            TestStrategy::MonteCarlo {
                params: MonteCarloParams {
                    n_simulations: 200,
                    n_samples_per_sim: 100,
                },
                population_size: 10,
                seed: 5,
            },
        ]
    }

    #[test]
    fn test_outcome_shape_follows_strategy() {
        let table = Table2x2::from_cells(6, 1, 1, 2);
        for strategy in strategies() {
            let outcome = strategy.evaluate(&table, 0).unwrap();
            match (&strategy, outcome) {
                (TestStrategy::Exact, TestOutcome::Exact(_))
                | (TestStrategy::ChiSquare { .. }, TestOutcome::ChiSquare(_))
                | (TestStrategy::MonteCarlo { .. }, TestOutcome::MonteCarlo(_)) => {}
                other => panic!("mismatched outcome {:?}", other),
            }
            let p = outcome.p_value();
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_neutral_outcomes_are_not_significant() {
        let table = Table2x2::from_cells(8, 2, 0, 0);
        for strategy in strategies() {
            assert_eq!(strategy.neutral_outcome(&table).p_value(), 1.0);
        }
    }

    #[test]
    fn test_exact_outcome_reports_right_tail() {
        let outcome = TestStrategy::Exact
            .evaluate(&Table2x2::from_cells(6, 1, 1, 2), 0)
            .unwrap();
        assert_relative_eq!(outcome.p_value(), 22.0 / 120.0, epsilon = 1e-12);
    }

    #[test]
    fn test_method_names() {
        assert_eq!(TestMethod::Exact.to_string(), "fisher");
        assert_eq!(
            TestStrategy::ChiSquare { yates: false }.method(),
            TestMethod::ChiSquare
        );
        let parsed: TestMethod = serde_json::from_str("\"numerical\"").unwrap();
        assert_eq!(parsed, TestMethod::Numerical);
    }
}
