//! Pairwise association between resistance mutations and other mutations.
//!
//! The driver walks the cross-product of the two label sequences (other
//! mutations in the outer loop, resistance mutations in the inner loop),
//! builds a contingency table per pair and runs the configured test on every
//! pair whose mutations co-occur at least once. Degenerate pairs (no
//! co-occurrence, or a margin of zero) receive the strategy's neutral outcome
//! and do not count as tests.

use crate::contingency::{build_table, Table2x2};
use crate::error::{AssociationError, Result};
use crate::stats::{TestMethod, TestOutcome, TestStrategy};
use crate::utils::parallel::{ParallelConfig, ParallelExecutor};
use indexmap::IndexMap;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Resolves a mutation label to the samples that carry it.
pub trait MembershipLookup<S> {
    fn members(&self, label: &str) -> Option<&HashSet<S>>;
}

impl<S, H: BuildHasher> MembershipLookup<S> for HashMap<String, HashSet<S>, H> {
    fn members(&self, label: &str) -> Option<&HashSet<S>> {
        self.get(label)
    }
}

impl<S, H: BuildHasher> MembershipLookup<S> for IndexMap<String, HashSet<S>, H> {
    fn members(&self, label: &str) -> Option<&HashSet<S>> {
        self.get(label)
    }
}

/// One row of output: a (resistance mutation, other mutation) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationResult {
    pub resistant_mutation: String,
    pub other_mutation: String,
    pub outcome: TestOutcome,
    pub table: Table2x2,
    /// Samples carrying the resistance mutation
    pub n_resistant: u64,
    /// Samples carrying the other mutation
    pub n_other: u64,
    /// Whether the strategy actually ran for this pair
    pub tested: bool,
}

/// Everything a run produces: ordered rows plus the number of tests run.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationRun {
    pub method: TestMethod,
    pub results: Vec<AssociationResult>,
    pub test_count: u64,
}

impl AssociationRun {
    pub fn n_pairs(&self) -> usize {
        self.results.len()
    }

    pub fn iter_tested(&self) -> impl Iterator<Item = &AssociationResult> {
        self.results.iter().filter(|r| r.tested)
    }
}

/// Drives the pairwise tests for one strategy.
pub struct PairwiseDriver {
    strategy: TestStrategy,
    parallel: ParallelConfig,
}

impl PairwiseDriver {
    pub fn new(strategy: TestStrategy) -> Self {
        PairwiseDriver {
            strategy,
            parallel: ParallelConfig::default(),
        }
    }

    pub fn with_parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Tests every (resistant, other) pair.
    ///
    /// All labels are resolved before any table is built, so an unknown
    /// label fails the run without producing partial output. Rows are
    /// returned with `other_mutations` as the outer loop and
    /// `resistant_mutations` as the inner loop, whatever the thread count.
    pub fn run<S, L>(
        &self,
        resistant_mutations: &[String],
        other_mutations: &[String],
        membership: &L,
        universe: &HashSet<S>,
    ) -> Result<AssociationRun>
    where
        S: Eq + Hash + Sync,
        L: MembershipLookup<S> + Sync,
    {
        if universe.is_empty() {
            return Err(AssociationError::InputConsistency(
                "sample universe is empty".to_string(),
            ));
        }

        let resistant_sets = resolve_all(resistant_mutations, membership)?;
        let other_sets = resolve_all(other_mutations, membership)?;

        info!(
            "Testing {} resistance mutations against {} other mutations ({} pairs) over {} samples using the {} test",
            resistant_mutations.len(),
            other_mutations.len(),
            resistant_mutations.len() * other_mutations.len(),
            universe.len(),
            self.strategy.method()
        );

        let executor = ParallelExecutor::new(self.parallel.clone())?;
        debug!("Running pairs on {} threads", executor.threads());
        let n_resistant = resistant_mutations.len();
        let n_outer = other_mutations.len();
        let completed = AtomicUsize::new(0);
        let report_every = (n_outer / 10).max(1);

        let slices = executor.execute(&other_sets, |outer, &(other_label, other_members)| {
            let mut rows = Vec::with_capacity(n_resistant);
            let mut tests = 0u64;

            for (inner, &(resistant_label, resistant_members)) in
                resistant_sets.iter().enumerate()
            {
                let table = build_table(universe, resistant_members, other_members)?;
                let pair_index = (outer * n_resistant + inner) as u64;

                let (outcome, tested) = if table.both() == 0 || table.has_zero_margin() {
                    (self.strategy.neutral_outcome(&table), false)
                } else {
                    tests += 1;
                    (self.strategy.evaluate(&table, pair_index)?, true)
                };

                rows.push(AssociationResult {
                    resistant_mutation: resistant_label.to_string(),
                    other_mutation: other_label.to_string(),
                    outcome,
                    table,
                    n_resistant: resistant_members.len() as u64,
                    n_other: other_members.len() as u64,
                    tested,
                });
            }

            debug!("{}: {} of {} pairs tested", other_label, tests, n_resistant);
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if done % report_every == 0 || done == n_outer {
                info!("Processed {}/{} other mutations", done, n_outer);
            }

            Ok::<_, AssociationError>((rows, tests))
        })?;

        let mut results = Vec::with_capacity(n_outer * n_resistant);
        let mut test_count = 0;
        for (rows, tests) in slices {
            results.extend(rows);
            test_count += tests;
        }

        info!(
            "Number of tests performed: {} of {} pairs",
            test_count,
            results.len()
        );

        Ok(AssociationRun {
            method: self.strategy.method(),
            results,
            test_count,
        })
    }
}

fn resolve_all<'a, S, L>(
    labels: &'a [String],
    membership: &'a L,
) -> Result<Vec<(&'a str, &'a HashSet<S>)>>
where
    L: MembershipLookup<S>,
{
    labels
        .iter()
        .map(|label| {
            membership
                .members(label)
                .map(|set| (label.as_str(), set))
                .ok_or_else(|| AssociationError::UnknownLabel(label.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::MonteCarloParams;
    use approx::assert_relative_eq;

    fn ids(range: impl IntoIterator<Item = usize>) -> HashSet<String> {
        range.into_iter().map(|i| format!("s{}", i)).collect()
    }

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn all_strategies() -> Vec<TestStrategy> {
        vec![
            TestStrategy::Exact,
            TestStrategy::ChiSquare { yates: true },
            TestStrategy::MonteCarlo {
                params: MonteCarloParams {
                    n_simulations: 200,
                    n_samples_per_sim: 200,
                },
                population_size: 100,
                seed: 11,
            },
        ]
    }

    /// 10 resistance mutations × 10 other mutations over 100 samples where
    /// exactly 7 pairs share carriers.
    fn synthetic_ten_by_ten() -> (Vec<String>, Vec<String>, HashMap<String, HashSet<String>>) {
        let mut membership = HashMap::new();
        let mut resistant = Vec::new();
        let mut other = Vec::new();

        // resistance mutation r carried by samples 5r..5r+4 (0..50)
        for r in 0..10 {
            let label = format!("rpoB_R{}", r);
            membership.insert(label.clone(), ids(5 * r..5 * r + 5));
            resistant.push(label);
        }
        // other mutations 0..7 each overlap exactly one resistance block,
        // the rest live entirely in samples 50..100
        for o in 0..10 {
            let label = format!("rpoC_O{}", o);
            let members = if o < 7 {
                let mut m = ids(5 * o + 2..5 * o + 4);
                m.extend(ids(60 + o..61 + o));
                m
            } else {
                ids(80 + o..85 + o)
            };
            membership.insert(label.clone(), members);
            other.push(label);
        }
        (resistant, other, membership)
    }

    #[test]
    fn test_ledger_counts_only_co_occurring_pairs() {
        let (resistant, other, membership) = synthetic_ten_by_ten();
        let universe = ids(0..100);
        for strategy in all_strategies() {
            let run = PairwiseDriver::new(strategy)
                .run(&resistant, &other, &membership, &universe)
                .unwrap();
            assert_eq!(run.test_count, 7);
            assert_eq!(run.n_pairs(), 100);
            assert_eq!(run.iter_tested().count(), 7);
        }
    }

    #[test]
    fn test_skipped_pairs_are_neutral() {
        let (resistant, other, membership) = synthetic_ten_by_ten();
        let universe = ids(0..100);
        for strategy in all_strategies() {
            let run = PairwiseDriver::new(strategy)
                .run(&resistant, &other, &membership, &universe)
                .unwrap();
            for row in run.results.iter().filter(|r| !r.tested) {
                assert_eq!(row.table.both(), 0);
                assert_eq!(row.outcome.p_value(), 1.0);
            }
        }
    }

    #[test]
    fn test_row_order_is_other_outer_resistant_inner() {
        let (resistant, other, membership) = synthetic_ten_by_ten();
        let universe = ids(0..100);
        let run = PairwiseDriver::new(TestStrategy::Exact)
            .with_parallel(ParallelConfig {
                threads: 4,
                chunk_size: 1,
            })
            .run(&resistant, &other, &membership, &universe)
            .unwrap();

        for (i, row) in run.results.iter().enumerate() {
            assert_eq!(row.other_mutation, other[i / 10]);
            assert_eq!(row.resistant_mutation, resistant[i % 10]);
        }
    }

    #[test]
    fn test_thread_count_does_not_change_results() {
        let (resistant, other, membership) = synthetic_ten_by_ten();
        let universe = ids(0..100);
        let strategy = all_strategies().pop().unwrap();
        let run_with = |threads| {
            PairwiseDriver::new(strategy.clone())
                .with_parallel(ParallelConfig {
                    threads,
                    chunk_size: 1,
                })
                .run(&resistant, &other, &membership, &universe)
                .unwrap()
        };
        assert_eq!(run_with(1), run_with(3));
    }

    #[test]
    fn test_zero_margin_pairs_are_not_tested() {
        // every sample carries the other mutation
        let universe = ids(0..10);
        let mut membership = HashMap::new();
        membership.insert("geneA_A1B".to_string(), ids(0..4));
        membership.insert("geneZ_Q1R".to_string(), ids(0..10));

        for strategy in all_strategies() {
            let run = PairwiseDriver::new(strategy)
                .run(
                    &labels(&["geneA_A1B"]),
                    &labels(&["geneZ_Q1R"]),
                    &membership,
                    &universe,
                )
                .unwrap();
            assert_eq!(run.test_count, 0);
            assert!(!run.results[0].tested);
            assert_eq!(run.results[0].table.both(), 4);
            assert_eq!(run.results[0].outcome.p_value(), 1.0);
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let universe = ids(1..=10);
        let mut membership = HashMap::new();
        membership.insert("geneA_A1B".to_string(), ids([1, 2, 3]));
        membership.insert("geneC_X9Y".to_string(), ids([2, 3, 4]));

        let run = PairwiseDriver::new(TestStrategy::Exact)
            .run(
                &labels(&["geneA_A1B"]),
                &labels(&["geneC_X9Y"]),
                &membership,
                &universe,
            )
            .unwrap();

        assert_eq!(run.test_count, 1);
        let row = &run.results[0];
        assert_eq!(row.table.cells(), [[6, 1], [1, 2]]);
        assert_eq!((row.n_resistant, row.n_other), (3, 3));
        assert_relative_eq!(row.outcome.p_value(), 22.0 / 120.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_label_aborts_run() {
        let universe = ids(1..=4);
        let mut membership = IndexMap::new();
        membership.insert("geneA_A1B".to_string(), ids([1]));

        let err = PairwiseDriver::new(TestStrategy::Exact)
            .run(
                &labels(&["geneA_A1B"]),
                &labels(&["geneC_MISSING"]),
                &membership,
                &universe,
            )
            .unwrap_err();
        assert!(matches!(err, AssociationError::UnknownLabel(l) if l == "geneC_MISSING"));
    }

    #[test]
    fn test_members_outside_universe_abort_run() {
        let universe = ids(1..=4);
        let mut membership = HashMap::new();
        membership.insert("geneA_A1B".to_string(), ids([1, 9]));
        membership.insert("geneC_X9Y".to_string(), ids([1]));

        let err = PairwiseDriver::new(TestStrategy::Exact)
            .run(
                &labels(&["geneA_A1B"]),
                &labels(&["geneC_X9Y"]),
                &membership,
                &universe,
            )
            .unwrap_err();
        assert!(matches!(err, AssociationError::InputConsistency(_)));
    }

    #[test]
    fn test_empty_universe_is_rejected() {
        let membership: HashMap<String, HashSet<String>> = HashMap::new();
        let err = PairwiseDriver::new(TestStrategy::Exact)
            .run(&[], &[], &membership, &HashSet::new())
            .unwrap_err();
        assert!(matches!(err, AssociationError::InputConsistency(_)));
    }

    #[test]
    fn test_strategy_errors_abort_run() {
        // population smaller than the observed carriers
        let universe = ids(0..20);
        let mut membership = HashMap::new();
        membership.insert("geneA_A1B".to_string(), ids(0..10));
        membership.insert("geneC_X9Y".to_string(), ids(5..15));
        let strategy = TestStrategy::MonteCarlo {
            params: MonteCarloParams::default(),
            population_size: 5,
            seed: 0,
        };
        let err = PairwiseDriver::new(strategy)
            .run(
                &labels(&["geneA_A1B"]),
                &labels(&["geneC_X9Y"]),
                &membership,
                &universe,
            )
            .unwrap_err();
        assert!(matches!(err, AssociationError::NumericalDomain(_)));
    }
}
