//! 2×2 contingency tables of sample co-occurrence.
//!
//! Rows are indexed by "carries the resistance mutation", columns by
//! "carries the other mutation", so `cells[1][1]` counts the samples that
//! carry both.

use crate::error::{AssociationError, Result};
use std::collections::HashSet;
use std::hash::Hash;

/// A 2×2 count matrix over the sample universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table2x2 {
    /// `cells[has_resistant][has_other]`
    cells: [[u64; 2]; 2],
}

impl Table2x2 {
    /// Builds a table directly from its four cells.
    pub fn from_cells(neither: u64, other_only: u64, resistant_only: u64, both: u64) -> Self {
        Table2x2 {
            cells: [[neither, other_only], [resistant_only, both]],
        }
    }

    pub fn cells(&self) -> [[u64; 2]; 2] {
        self.cells
    }

    pub fn neither(&self) -> u64 {
        self.cells[0][0]
    }

    pub fn other_only(&self) -> u64 {
        self.cells[0][1]
    }

    pub fn resistant_only(&self) -> u64 {
        self.cells[1][0]
    }

    pub fn both(&self) -> u64 {
        self.cells[1][1]
    }

    pub fn total(&self) -> u64 {
        self.cells.iter().flatten().sum()
    }

    /// Row sums: `[samples without the resistance mutation, samples with it]`.
    pub fn row_sums(&self) -> [u64; 2] {
        [
            self.cells[0][0] + self.cells[0][1],
            self.cells[1][0] + self.cells[1][1],
        ]
    }

    /// Column sums: `[samples without the other mutation, samples with it]`.
    pub fn col_sums(&self) -> [u64; 2] {
        [
            self.cells[0][0] + self.cells[1][0],
            self.cells[0][1] + self.cells[1][1],
        ]
    }

    /// Swaps the resistant and other roles.
    pub fn transpose(&self) -> Self {
        Table2x2::from_cells(
            self.neither(),
            self.resistant_only(),
            self.other_only(),
            self.both(),
        )
    }

    pub fn has_zero_margin(&self) -> bool {
        self.row_sums().contains(&0) || self.col_sums().contains(&0)
    }

    /// Cell expectations under independence of the two traits.
    ///
    /// Returns all zeros for an empty table.
    pub fn expected_counts(&self) -> [[f64; 2]; 2] {
        let total = self.total() as f64;
        let rows = self.row_sums();
        let cols = self.col_sums();
        let mut expected = [[0.0; 2]; 2];
        if total == 0.0 {
            return expected;
        }
        for (i, row) in expected.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = rows[i] as f64 * cols[j] as f64 / total;
            }
        }
        expected
    }
}

/// Cross-tabulates the universe by membership in the two sets.
///
/// Both membership sets must be subsets of `universe`; anything else means
/// the input tables are inconsistent and the run cannot continue. Only the
/// smaller membership set is scanned, so the cost is independent of the
/// universe size.
pub fn build_table<S>(
    universe: &HashSet<S>,
    resistant_members: &HashSet<S>,
    other_members: &HashSet<S>,
) -> Result<Table2x2>
where
    S: Eq + Hash,
{
    if !resistant_members.is_subset(universe) {
        return Err(AssociationError::InputConsistency(format!(
            "{} resistant-mutation carriers are outside the sample universe",
            resistant_members.difference(universe).count()
        )));
    }
    if !other_members.is_subset(universe) {
        return Err(AssociationError::InputConsistency(format!(
            "{} other-mutation carriers are outside the sample universe",
            other_members.difference(universe).count()
        )));
    }

    let (smaller, larger) = if resistant_members.len() <= other_members.len() {
        (resistant_members, other_members)
    } else {
        (other_members, resistant_members)
    };
    let both = smaller.iter().filter(|s| larger.contains(*s)).count() as u64;

    let resistant_only = resistant_members.len() as u64 - both;
    let other_only = other_members.len() as u64 - both;
    let neither = universe.len() as u64 - both - resistant_only - other_only;

    Ok(Table2x2::from_cells(neither, other_only, resistant_only, both))
}
