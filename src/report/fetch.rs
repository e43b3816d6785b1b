//! Per-run condition fetch loop

use anyhow::Result;
use std::collections::HashMap;

use super::condition::{ConditionValue, normalize};
use super::runs::RunSet;
use crate::db::rcdb::{ConditionDatabase, get_run};
use crate::error::LookupError;
use crate::telemetry::{ConsoleSink, FetchStats, TelemetryEvent};

/// Caps how many lookup warnings are printed.
///
/// With `max = Some(n)` the first `n` warnings are printed verbatim and the
/// rest only counted; [`WarningBudget::finish`] then prints the total.
/// `max = None` prints everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningBudget {
    max: Option<usize>,
    total: usize,
}

impl WarningBudget {
    pub fn new(max: Option<usize>) -> Self {
        Self { max, total: 0 }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Count a warning and print it if the budget allows
    pub fn warn(&mut self, message: &str, sink: &mut dyn ConsoleSink) -> Result<()> {
        self.total += 1;
        if self.max.is_none_or(|max| self.total <= max) {
            sink.line(message)?;
        }
        Ok(())
    }

    /// Print the aggregate line if any warning was suppressed
    pub fn finish(&self, sink: &mut dyn ConsoleSink) -> Result<()> {
        if self.suppressed() > 0 {
            sink.line(&format!("Total number of warning messages: {}", self.total))?;
        }
        Ok(())
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn suppressed(&self) -> usize {
        match self.max {
            Some(max) => self.total.saturating_sub(max),
            None => 0,
        }
    }
}

/// One report row: a run and whichever conditions resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub run: u32,
    pub values: HashMap<String, ConditionValue>,
}

impl ReportRow {
    pub fn new(run: u32) -> Self {
        Self {
            run,
            values: HashMap::new(),
        }
    }

    /// Text form of a condition, empty when the lookup failed
    pub fn text(&self, key: &str) -> String {
        self.values
            .get(key)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

/// Conditions for a set of runs, in fetch order
#[derive(Debug, Clone)]
pub struct ConditionReport {
    pub conditions: Vec<String>,
    pub rows: Vec<ReportRow>,
    pub stats: FetchStats,
    pub warnings: usize,
}

fn lookup_warning(run: u32, key: &str) -> String {
    format!("Run {run} failed to get data for condition {key} ...skipping...")
}

fn record(stats: &mut FetchStats, sink: &mut dyn ConsoleSink, event: TelemetryEvent) {
    stats.update(&event);
    sink.event(&event);
}

/// Fetch every condition for every run.
///
/// Lookup failures never abort the loop: the field is left out of the row and
/// a warning goes through `budget`. Every run gets a row, even if all of its
/// lookups failed.
pub async fn fetch_conditions(
    db: &dyn ConditionDatabase,
    runs: &RunSet,
    conditions: &[String],
    budget: &mut WarningBudget,
    sink: &mut dyn ConsoleSink,
) -> Result<ConditionReport> {
    let mut stats = FetchStats::new();
    let mut rows = Vec::new();

    for run in runs.iter() {
        let mut row = ReportRow::new(run);

        match get_run(db, run).await {
            Ok(handle) => {
                for key in conditions {
                    match handle.get_condition(key).await {
                        Ok(value) => {
                            row.values.insert(key.clone(), normalize(key, value));
                            record(&mut stats, sink, TelemetryEvent::LookupSucceeded);
                        }
                        Err(e) => {
                            report_failure(run, key, &e, budget, sink)?;
                            record(&mut stats, sink, TelemetryEvent::LookupFailed);
                        }
                    }
                }
            }
            Err(e) => {
                for key in conditions {
                    report_failure(run, key, &e, budget, sink)?;
                    record(&mut stats, sink, TelemetryEvent::LookupFailed);
                }
            }
        }

        rows.push(row);
        record(&mut stats, sink, TelemetryEvent::RunCompleted { run });
    }

    budget.finish(sink)?;

    tracing::info!(
        runs = stats.runs_completed,
        lookups = stats.lookups(),
        failed = stats.lookups_failed,
        "condition fetch complete"
    );

    Ok(ConditionReport {
        conditions: conditions.to_vec(),
        rows,
        stats,
        warnings: budget.total(),
    })
}

fn report_failure(
    run: u32,
    key: &str,
    error: &LookupError,
    budget: &mut WarningBudget,
    sink: &mut dyn ConsoleSink,
) -> Result<()> {
    tracing::debug!(run, key, error = %error, "lookup failed");
    budget.warn(&lookup_warning(run, key), sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Runs 1..=`last_run` exist; every condition fails except those listed.
    struct FakeRcdb {
        last_run: u32,
        values: HashMap<(u32, &'static str), ConditionValue>,
    }

    impl FakeRcdb {
        fn empty(last_run: u32) -> Self {
            Self {
                last_run,
                values: HashMap::new(),
            }
        }
    }

    #[async_trait]
    impl ConditionDatabase for FakeRcdb {
        async fn has_run(&self, run: u32) -> Result<bool, LookupError> {
            Ok(run <= self.last_run)
        }

        async fn condition(&self, run: u32, key: &str) -> Result<ConditionValue, LookupError> {
            self.values
                .iter()
                .find(|((r, k), _)| *r == run && *k == key)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| LookupError::ConditionNotFound {
                    run,
                    key: key.to_string(),
                })
        }
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn lines(sink: Vec<u8>) -> Vec<String> {
        String::from_utf8(sink)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_bounded_warnings() {
        let db = FakeRcdb::empty(10);
        let runs = RunSet::from_range(1, 10).unwrap();
        let mut budget = WarningBudget::new(Some(5));
        let mut sink = Vec::new();

        let report = fetch_conditions(&db, &runs, &keys(&["target"]), &mut budget, &mut sink)
            .await
            .unwrap();

        let out = lines(sink);
        assert_eq!(out.len(), 6);
        for (i, line) in out[..5].iter().enumerate() {
            assert_eq!(
                line,
                &format!(
                    "Run {} failed to get data for condition target ...skipping...",
                    i + 1
                )
            );
        }
        assert_eq!(out[5], "Total number of warning messages: 10");
        assert_eq!(report.warnings, 10);
        assert_eq!(report.rows.len(), 10);
    }

    #[tokio::test]
    async fn test_unbounded_warnings_print_everything() {
        let db = FakeRcdb::empty(10);
        let runs = RunSet::from_range(1, 10).unwrap();
        let mut budget = WarningBudget::unbounded();
        let mut sink = Vec::new();

        fetch_conditions(&db, &runs, &keys(&["target"]), &mut budget, &mut sink)
            .await
            .unwrap();

        let out = lines(sink);
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|l| !l.starts_with("Total number")));
    }

    #[tokio::test]
    async fn test_no_aggregate_when_under_budget() {
        let db = FakeRcdb::empty(3);
        let runs = RunSet::from_range(1, 3).unwrap();
        let mut budget = WarningBudget::new(Some(5));
        let mut sink = Vec::new();

        fetch_conditions(&db, &runs, &keys(&["target"]), &mut budget, &mut sink)
            .await
            .unwrap();

        assert_eq!(lines(sink).len(), 3);
        assert_eq!(budget.suppressed(), 0);
    }

    #[tokio::test]
    async fn test_one_row_per_run_even_when_all_fail() {
        let mut db = FakeRcdb::empty(3);
        db.values
            .insert((2, "target"), ConditionValue::Text(" 12C ".to_string()));
        db.values
            .insert((2, "events_rate"), ConditionValue::Float(3.5));
        // Runs 4 and 5 are not registered at all.
        let runs = RunSet::from_range(1, 5).unwrap();
        let mut budget = WarningBudget::new(Some(0));
        let mut sink = Vec::new();

        let report = fetch_conditions(
            &db,
            &runs,
            &keys(&["events_rate", "target"]),
            &mut budget,
            &mut sink,
        )
        .await
        .unwrap();

        assert_eq!(
            report.rows.iter().map(|r| r.run).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(report.rows[1].text("target"), "C");
        assert_eq!(report.rows[1].text("events_rate"), "3.5");
        assert_eq!(report.rows[0].text("target"), "");
        assert!(report.rows[3].values.is_empty());
        assert_eq!(report.stats.lookups_succeeded, 2);
        assert_eq!(report.stats.lookups_failed, 8);
        assert_eq!(report.stats.runs_completed, 5);
        // Budget of zero: only the total is printed.
        assert_eq!(lines(sink), vec!["Total number of warning messages: 8"]);
    }

    #[test]
    fn test_budget_counts() {
        let mut budget = WarningBudget::new(Some(2));
        let mut sink = Vec::new();
        for i in 0..4 {
            budget.warn(&format!("w{i}"), &mut sink).unwrap();
        }
        assert_eq!(budget.total(), 4);
        assert_eq!(budget.suppressed(), 2);
        assert_eq!(lines(sink), vec!["w0", "w1"]);
    }
}
