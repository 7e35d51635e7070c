//! Co-occurrence association between resistance mutations and other
//! mutations across a cohort of samples.
//!
//! The core is [`association::PairwiseDriver`]: for every
//! (resistance mutation, other mutation) pair it builds a 2×2
//! [`contingency::Table2x2`] over the sample universe and evaluates it with
//! one of the strategies in [`stats`] (exact, chi-square or Monte-Carlo).
//! The remaining modules load inputs, hold configuration and write results.

pub mod association;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod contingency;
pub mod error;
pub mod io;
pub mod stats;
pub mod utils;

pub use association::{AssociationResult, AssociationRun, MembershipLookup, PairwiseDriver};
pub use contingency::{build_table, Table2x2};
pub use error::{AssociationError, Result};
pub use stats::{TestMethod, TestOutcome, TestStrategy};
