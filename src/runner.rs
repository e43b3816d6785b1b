//! High-level runner API for the report builder.
//!
//! This module wires run selection, database connections, the fetch loop and
//! file output together. It is the API used by the CLI.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::db::pool::{self as db_pool, PoolArgsBuilder};
use crate::db::{CcdbProvider, Pool, RcdbProvider};
use crate::error::UsageError;
use crate::report::calibration::load_calibration;
use crate::report::fetch::fetch_conditions;
use crate::report::render::write_calibration_csv;
use crate::report::runs::RunPattern;
use crate::report::{CalibrationReport, ConditionReport, RunSet, Table, WarningBudget};
use crate::telemetry::{ConsoleSink, ProgressConsole};

/// Arguments for a run-range condition table
#[derive(Debug, Clone)]
pub struct ConditionTableArgs {
    pub rcdb_url: String,

    // Run selection
    pub run_min: u32,
    pub run_max: u32,
    pub files: Vec<String>,
    pub pattern: String,

    pub conditions: Vec<String>,

    // Output
    /// `None` prints every lookup warning
    pub max_warnings: Option<usize>,
    pub output: Option<PathBuf>,
    pub quiet: bool,

    // Test-only: inject a pre-created pool (for SQLite testing)
    #[cfg(test)]
    pub test_pool: Option<Pool>,
}

/// Result of a condition table run
#[derive(Debug)]
pub struct ConditionTableResult {
    pub report: ConditionReport,
    pub table: Table,
    /// File the CSV was written to, if one was requested
    pub output: Option<PathBuf>,
}

/// Arguments for a file-list condition listing
#[derive(Debug, Clone)]
pub struct ConditionListArgs {
    pub rcdb_url: String,
    pub files: Vec<String>,
    pub pattern: String,
    pub condition: String,
    pub quiet: bool,

    #[cfg(test)]
    pub test_pool: Option<Pool>,
}

/// One value per input file, in input order
#[derive(Debug)]
pub struct ConditionListResult {
    pub runs: Vec<u32>,
    pub values: Vec<String>,
    pub report: ConditionReport,
}

/// Arguments for a calibration table report
#[derive(Debug, Clone)]
pub struct CalibrationArgs {
    pub ccdb_url: String,
    pub ccdb_user: String,
    pub table_path: String,
    pub output: PathBuf,

    #[cfg(test)]
    pub test_pool: Option<Pool>,
}

/// Result of a calibration table run
#[derive(Debug)]
pub struct CalibrationResult {
    pub report: CalibrationReport,
    pub table: Table,
    pub output: PathBuf,
}

fn validate_conditions(conditions: &[String]) -> Result<(), UsageError> {
    if conditions.iter().any(|c| c.trim().is_empty()) {
        return Err(UsageError::EmptyCondition);
    }
    Ok(())
}

async fn rcdb_pool(url: &str) -> Result<Pool> {
    let pool_args = PoolArgsBuilder::default().url(url).build()?;
    db_pool::pool(pool_args)
        .await
        .context("Failed to connect to the run conditions database")
}

async fn fetch_with_console(
    rcdb: &RcdbProvider,
    runs: &RunSet,
    conditions: &[String],
    budget: &mut WarningBudget,
    quiet: bool,
    sink: &mut dyn ConsoleSink,
) -> Result<ConditionReport> {
    let mut progress = (!quiet).then(|| ProgressConsole::new(runs.len() as u64));
    let console: &mut dyn ConsoleSink = match progress.as_mut() {
        Some(progress) => progress,
        None => sink,
    };

    let report = fetch_conditions(rcdb, runs, conditions, budget, console).await;

    if let Some(progress) = &progress {
        progress.finish();
    }
    report
}

/// Build a condition table for a run range (plus any runs named by files)
///
/// Lookup warnings go to `sink`, or above the progress bar unless `quiet`.
/// When `output` is set the CSV is also written to that file.
pub async fn run_condition_table(
    args: ConditionTableArgs,
    sink: &mut dyn ConsoleSink,
) -> Result<ConditionTableResult> {
    validate_conditions(&args.conditions)?;

    let mut runs = RunSet::from_range(args.run_min, args.run_max)?;
    runs.extend_files(args.files.as_slice(), &args.pattern)?;

    tracing::info!(
        runs = runs.len(),
        conditions = args.conditions.len(),
        "building condition table"
    );

    #[cfg(test)]
    let pool = match args.test_pool {
        Some(test_pool) => test_pool,
        None => rcdb_pool(&args.rcdb_url).await?,
    };

    #[cfg(not(test))]
    let pool = rcdb_pool(&args.rcdb_url).await?;

    let rcdb = RcdbProvider::new(pool);
    let mut budget = WarningBudget::new(args.max_warnings);
    let report = fetch_with_console(
        &rcdb,
        &runs,
        &args.conditions,
        &mut budget,
        args.quiet,
        sink,
    )
    .await?;

    let table = Table::from(&report);

    if let Some(path) = &args.output {
        table.write_csv_file(path)?;
        tracing::info!(path = %path.display(), rows = table.rows.len(), "wrote condition table");
    }

    Ok(ConditionTableResult {
        report,
        table,
        output: args.output,
    })
}

/// Look up one condition for the run of each input file
pub async fn run_condition_list(
    args: ConditionListArgs,
    sink: &mut dyn ConsoleSink,
) -> Result<ConditionListResult> {
    let conditions = vec![args.condition.clone()];
    validate_conditions(&conditions)?;

    let pattern = RunPattern::new(&args.pattern)?;
    let file_runs = args
        .files
        .iter()
        .map(|file| pattern.extract(file))
        .collect::<Result<Vec<u32>, UsageError>>()?;
    let runs: RunSet = file_runs.iter().copied().collect();
    if runs.is_empty() {
        return Err(UsageError::NoRuns.into());
    }

    #[cfg(test)]
    let pool = match args.test_pool {
        Some(test_pool) => test_pool,
        None => rcdb_pool(&args.rcdb_url).await?,
    };

    #[cfg(not(test))]
    let pool = rcdb_pool(&args.rcdb_url).await?;

    let rcdb = RcdbProvider::new(pool);
    let mut budget = WarningBudget::unbounded();
    let report =
        fetch_with_console(&rcdb, &runs, &conditions, &mut budget, args.quiet, sink).await?;

    let values = file_runs
        .iter()
        .map(|run| {
            report
                .rows
                .iter()
                .find(|row| row.run == *run)
                .map(|row| row.text(&args.condition))
                .unwrap_or_default()
        })
        .collect();

    Ok(ConditionListResult {
        runs: file_runs,
        values,
        report,
    })
}

/// Read a calibration table, report run-range gaps, and write it as CSV
///
/// Gap warnings are printed to `sink` before the file is written; they never
/// change the records.
pub async fn run_calibration_report(
    args: CalibrationArgs,
    sink: &mut dyn ConsoleSink,
) -> Result<CalibrationResult> {
    #[cfg(test)]
    let ccdb = match args.test_pool {
        Some(test_pool) => CcdbProvider::new(test_pool, &args.ccdb_user),
        None => CcdbProvider::connect(&args.ccdb_url, &args.ccdb_user).await?,
    };

    #[cfg(not(test))]
    let ccdb = CcdbProvider::connect(&args.ccdb_url, &args.ccdb_user).await?;

    let report = load_calibration(&ccdb, &args.table_path).await?;

    for gap in &report.gaps {
        sink.line(&gap.to_string())?;
    }
    if !report.gaps.is_empty() {
        tracing::warn!(gaps = report.gaps.len(), "calibration run ranges are not contiguous");
    }

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    write_calibration_csv(&report.records, file)?;
    tracing::info!(
        path = %args.output.display(),
        records = report.records.len(),
        "wrote calibration table"
    );

    let table = Table::from(&report);

    Ok(CalibrationResult {
        report,
        table,
        output: args.output,
    })
}
