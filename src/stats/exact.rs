//! Exact (hypergeometric) test for 2×2 co-occurrence tables.
//!
//! With both margins fixed, the number of samples carrying both mutations
//! follows a hypergeometric distribution:
//!   population = all samples in the universe
//!   successes  = samples carrying the resistance mutation
//!   draws      = samples carrying the other mutation
//!
//! Probabilities are evaluated in log space so margins in the tens of
//! thousands do not overflow.

use crate::contingency::Table2x2;
use statrs::function::factorial::ln_factorial;

/// Relative slack used when collecting "as or less likely" outcomes for the
/// two-tailed p-value.
const TWO_TAILED_RELATIVE_TOLERANCE: f64 = 1e-7;

/// Tail probabilities of the exact test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExactPValues {
    /// P(both <= observed)
    pub left_tail: f64,
    /// P(both >= observed)
    pub right_tail: f64,
    pub two_tailed: f64,
}

impl ExactPValues {
    pub fn neutral() -> Self {
        ExactPValues {
            left_tail: 1.0,
            right_tail: 1.0,
            two_tailed: 1.0,
        }
    }
}

/// Computes left, right and two-tailed exact p-values for `table`.
///
/// A table with a zero margin has a single possible outcome, so every tail
/// is 1.
pub fn exact_pvalue(table: &Table2x2) -> ExactPValues {
    if table.has_zero_margin() {
        return ExactPValues::neutral();
    }

    let n_total = table.total();
    let n_success = table.row_sums()[1];
    let n_draws = table.col_sums()[1];
    let observed = table.both();

    let min_k = (n_success + n_draws).saturating_sub(n_total);
    let max_k = n_success.min(n_draws);

    let p_observed = hypergeom_pmf(observed, n_total, n_success, n_draws);
    let threshold = p_observed * (1.0 + TWO_TAILED_RELATIVE_TOLERANCE);

    let mut left_tail = 0.0;
    let mut right_tail = 0.0;
    let mut two_tailed = 0.0;
    for k in min_k..=max_k {
        let p_k = hypergeom_pmf(k, n_total, n_success, n_draws);
        if k <= observed {
            left_tail += p_k;
        }
        if k >= observed {
            right_tail += p_k;
        }
        if p_k <= threshold {
            two_tailed += p_k;
        }
    }

    ExactPValues {
        left_tail: f64::min(left_tail, 1.0),
        right_tail: f64::min(right_tail, 1.0),
        two_tailed: f64::min(two_tailed, 1.0),
    }
}

/// Hypergeometric PMF: P(X = k | N, K, n)
fn hypergeom_pmf(k: u64, n_total: u64, n_success: u64, n_draws: u64) -> f64 {
    if k > n_draws {
        return 0.0;
    }
    let log_p = ln_choose(n_success, k) + ln_choose(n_total - n_success, n_draws - k)
        - ln_choose(n_total, n_draws);
    log_p.exp()
}

/// ln(C(n, k))
fn ln_choose(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}
