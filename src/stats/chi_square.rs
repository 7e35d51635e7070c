//! Pearson chi-square test of independence for 2×2 tables.
//!
//! The approximation is unreliable when any expected cell count is below 5.
//! Such tables are still evaluated; the caller decides what to trust.

use crate::contingency::Table2x2;
use crate::error::{AssociationError, Result};
use log::debug;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// A 2×2 table always has one degree of freedom.
pub const DEGREES_OF_FREEDOM: u32 = 1;

const MIN_RELIABLE_EXPECTED: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: u32,
    /// Expected counts under independence, indexed like the table.
    pub expected: [[f64; 2]; 2],
}

impl ChiSquareResult {
    /// Result recorded for pairs that were never tested.
    pub fn neutral(table: &Table2x2) -> Self {
        ChiSquareResult {
            statistic: 0.0,
            p_value: 1.0,
            degrees_of_freedom: DEGREES_OF_FREEDOM,
            expected: table.expected_counts(),
        }
    }
}

/// Runs the chi-square test on `table`.
///
/// With `yates` set, every observed count is moved toward its expectation by
/// at most 0.5 before the statistic is formed.
pub fn chi_square(table: &Table2x2, yates: bool) -> Result<ChiSquareResult> {
    if table.has_zero_margin() {
        return Err(AssociationError::NumericalDomain(format!(
            "chi-square needs non-zero margins, got rows {:?} columns {:?}",
            table.row_sums(),
            table.col_sums()
        )));
    }

    let observed = table.cells();
    let expected = table.expected_counts();

    if expected.iter().flatten().any(|&e| e < MIN_RELIABLE_EXPECTED) {
        debug!(
            "Expected counts {:?} include cells below {}; chi-square approximation is unreliable",
            expected, MIN_RELIABLE_EXPECTED
        );
    }

    let mut statistic = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            let e = expected[i][j];
            let mut diff = (observed[i][j] as f64 - e).abs();
            if yates {
                diff -= diff.min(0.5);
            }
            statistic += diff * diff / e;
        }
    }

    let dist = ChiSquared::new(DEGREES_OF_FREEDOM as f64)
        .map_err(|e| AssociationError::NumericalDomain(e.to_string()))?;
    let p_value = dist.sf(statistic);

    Ok(ChiSquareResult {
        statistic,
        p_value,
        degrees_of_freedom: DEGREES_OF_FREEDOM,
        expected,
    })
}
