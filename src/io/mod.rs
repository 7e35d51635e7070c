//! Input/Output operations module.
//!
//! Reads long-format mutation tables (plain or gzip-compressed CSV) and
//! writes the per-pair result table and a JSON run summary.

use crate::association::{AssociationResult, AssociationRun};
use crate::catalog::{MutationCatalog, MutationRecord};
use crate::stats::{TestMethod, TestOutcome};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

const CHI_SQUARE_HEADER: [&str; 12] = [
    "resistant_mutation",
    "other_mutation",
    "chi-square statistic",
    "p_value",
    "dof",
    "expected",
    "None",
    "other",
    "resistant",
    "both",
    "n_resistant",
    "n_other",
];

const P_VALUE_HEADER: [&str; 9] = [
    "resistant_mutation",
    "other_mutation",
    "p_value",
    "None",
    "other",
    "resistant",
    "both",
    "n_resistant",
    "n_other",
];

/// Scalar facts about a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub method: TestMethod,
    /// Pairs for which a test was actually performed
    pub n_tests: u64,
    pub n_pairs: usize,
    pub n_resistant_mutations: usize,
    pub n_other_mutations: usize,
    pub n_samples: usize,
}

impl RunSummary {
    pub fn new(run: &AssociationRun, catalog: &MutationCatalog) -> Self {
        RunSummary {
            method: run.method,
            n_tests: run.test_count,
            n_pairs: run.n_pairs(),
            n_resistant_mutations: catalog.resistant_mutations.len(),
            n_other_mutations: catalog.other_mutations.len(),
            n_samples: catalog.universe.len(),
        }
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(GzDecoder::new(BufReader::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(reader)
}

/// Reads mutation calls from a CSV with `UNIQUEID`, `GENE` and `MUTATION`
/// columns. Other columns are ignored; `.gz` files are decompressed.
pub fn read_mutation_records(path: impl AsRef<Path>) -> Result<Vec<MutationRecord>> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_reader(open_input(path)?);
    let mut records = Vec::new();
    for (i, row) in rdr.deserialize().enumerate() {
        let record: MutationRecord = row.with_context(|| {
            format!("Malformed mutation record {} in '{}'", i + 1, path.display())
        })?;
        records.push(record);
    }
    log::info!("Read {} mutation calls from {}", records.len(), path.display());
    Ok(records)
}

/// Writes one CSV row per tested pair, in run order.
///
/// The columns depend on the test: chi-square rows carry the statistic, dof
/// and expected counts, the other tests a single p-value (the right tail for
/// the exact test).
pub fn write_results(run: &AssociationRun, output_path: impl AsRef<Path>) -> Result<()> {
    let path = output_path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));

    match run.method {
        TestMethod::ChiSquare => writer.write_record(CHI_SQUARE_HEADER)?,
        TestMethod::Exact | TestMethod::Numerical => writer.write_record(P_VALUE_HEADER)?,
    }

    for result in &run.results {
        writer.write_record(result_record(result))?;
    }

    writer.flush()?;
    Ok(())
}

fn result_record(result: &AssociationResult) -> Vec<String> {
    let mut record = vec![
        result.resistant_mutation.clone(),
        result.other_mutation.clone(),
    ];
    match &result.outcome {
        TestOutcome::ChiSquare(chi) => {
            let e = chi.expected;
            record.push(chi.statistic.to_string());
            record.push(chi.p_value.to_string());
            record.push(chi.degrees_of_freedom.to_string());
            record.push(format!(
                "[[{}, {}], [{}, {}]]",
                e[0][0], e[0][1], e[1][0], e[1][1]
            ));
        }
        outcome => record.push(outcome.p_value().to_string()),
    }
    let table = &result.table;
    record.extend(
        [
            table.neither(),
            table.other_only(),
            table.resistant_only(),
            table.both(),
            result.n_resistant,
            result.n_other,
        ]
        .iter()
        .map(|n| n.to_string()),
    );
    record
}

/// Path of the summary written next to `output_path`.
pub fn summary_path(output_path: impl AsRef<Path>) -> PathBuf {
    let mut name = output_path.as_ref().as_os_str().to_owned();
    name.push(".summary.json");
    PathBuf::from(name)
}

pub fn write_summary(summary: &RunSummary, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file =
        File::create(path).with_context(|| format!("Failed to create '{}'", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    Ok(())
}
