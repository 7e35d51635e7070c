//! Builds the inputs of a pairwise run from long-format mutation records.
//!
//! Records are expected to be quality-filtered already. This module only
//! applies label-level rules: labels are `GENE_MUTATION`, synonymous changes
//! can be dropped, "other" mutations are every observed label that is not a
//! resistance mutation, and both label sets are thresholded on the number of
//! carrying samples.

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashSet;

/// One called mutation in one sample.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MutationRecord {
    #[serde(rename = "UNIQUEID")]
    pub sample_id: String,
    #[serde(rename = "GENE")]
    pub gene: String,
    #[serde(rename = "MUTATION")]
    pub mutation: String,
}

impl MutationRecord {
    pub fn label(&self) -> String {
        format!("{}_{}", self.gene, self.mutation)
    }

    /// A change whose first and last characters agree, e.g. `L452L`.
    pub fn is_synonymous(&self) -> bool {
        let mut chars = self.mutation.chars();
        match (chars.next(), chars.next_back()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }
}

/// Label-level selection rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogOptions {
    /// A resistance mutation is kept when more than this many samples carry it.
    pub min_resistant_samples: usize,
    /// An other mutation is kept when more than this many samples carry it.
    pub min_other_samples: usize,
    pub include_synonymous: bool,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        CatalogOptions {
            min_resistant_samples: 50,
            min_other_samples: 50,
            include_synonymous: false,
        }
    }
}

/// Sample universe, label sequences and membership index for one run.
#[derive(Debug, Clone)]
pub struct MutationCatalog {
    pub universe: HashSet<String>,
    pub resistant_mutations: Vec<String>,
    pub other_mutations: Vec<String>,
    pub membership: IndexMap<String, HashSet<String>>,
}

impl MutationCatalog {
    /// Builds the catalog.
    ///
    /// # Arguments
    ///
    /// * `mutations` - Every passing mutation call in the cohort.
    /// * `effects` - Calls of mutations associated with resistance.
    /// * `options` - Thresholds and synonymous handling.
    pub fn build(
        mutations: &[MutationRecord],
        effects: &[MutationRecord],
        options: &CatalogOptions,
    ) -> Result<Self> {
        let calls: Vec<&MutationRecord> = mutations
            .iter()
            .filter(|r| options.include_synonymous || !r.is_synonymous())
            .collect();
        if calls.len() < mutations.len() {
            info!(
                "Dropped {} synonymous mutation calls",
                mutations.len() - calls.len()
            );
        }

        let universe: HashSet<String> = calls.iter().map(|r| r.sample_id.clone()).collect();
        if universe.is_empty() {
            return Err(anyhow!("No samples with mutations remain after filtering"));
        }
        info!("There are {} samples with mutations", universe.len());

        let mut observed = group_by_label(calls.iter().copied());
        let mut resistant = group_by_label(effects.iter());

        // carriers only count if they belong to the universe
        let mut dropped = 0;
        for members in resistant.values_mut() {
            let before = members.len();
            members.retain(|s| universe.contains(s));
            dropped += before - members.len();
        }
        if dropped > 0 {
            warn!(
                "Ignored {} resistance-mutation calls from samples outside the sample universe",
                dropped
            );
        }

        let resistant_mutations: Vec<String> = resistant
            .iter()
            .filter(|(_, members)| members.len() > options.min_resistant_samples)
            .map(|(label, _)| label.clone())
            .sorted()
            .collect();
        info!(
            "There are {} resistant mutations using a threshold of {} samples",
            resistant_mutations.len(),
            options.min_resistant_samples
        );

        let other_mutations: Vec<String> = observed
            .iter()
            .filter(|(label, _)| !resistant.contains_key(*label))
            .filter(|(_, members)| members.len() > options.min_other_samples)
            .map(|(label, _)| label.clone())
            .sorted()
            .collect();
        info!(
            "There are {} non-resistant mutations using a threshold of {} samples",
            other_mutations.len(),
            options.min_other_samples
        );

        let mut membership =
            IndexMap::with_capacity(resistant_mutations.len() + other_mutations.len());
        for label in &resistant_mutations {
            if let Some(members) = resistant.swap_remove(label) {
                membership.insert(label.clone(), members);
            }
        }
        for label in &other_mutations {
            if let Some(members) = observed.swap_remove(label) {
                membership.insert(label.clone(), members);
            }
        }

        Ok(MutationCatalog {
            universe,
            resistant_mutations,
            other_mutations,
            membership,
        })
    }
}

fn group_by_label<'a>(
    records: impl Iterator<Item = &'a MutationRecord>,
) -> IndexMap<String, HashSet<String>> {
    let mut groups: IndexMap<String, HashSet<String>> = IndexMap::new();
    for record in records {
        groups
            .entry(record.label())
            .or_default()
            .insert(record.sample_id.clone());
    }
    groups
}
