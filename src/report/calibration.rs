//! Faraday-cup calibration records and the run-range contiguity check

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fmt;

use crate::config::{FCUP_ROW_ARITY, FCUP_SLOPE_INDEX, WARNING_SEPARATOR_WIDTH};
use crate::db::ccdb::{CalibrationDatabase, ConstantSet};

/// Calibration constants valid for one run range
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationRecord {
    pub run_min: i64,
    pub run_max: i64,
    pub slope: String,
    pub offset: String,
    pub atten: String,
}

/// Column names of the calibration CSV, matching the serialized field order
pub const CALIBRATION_COLUMNS: [&str; 5] = ["runMin", "runMax", "slope", "offset", "atten"];

impl CalibrationRecord {
    /// Build a record from a constant set shaped like a Faraday-cup row
    pub fn from_constant_set(set: &ConstantSet) -> Result<Self> {
        if set.data.len() != FCUP_ROW_ARITY {
            bail!(
                "Constant set {} has {} values, expected {}",
                set.id,
                set.data.len(),
                FCUP_ROW_ARITY
            );
        }

        // Constants are written back exactly as CCDB stores them.
        let field = |offset: usize| set.data[FCUP_SLOPE_INDEX + offset].clone();

        Ok(Self {
            run_min: set.run_min,
            run_max: set.run_max,
            slope: field(0),
            offset: field(1),
            atten: field(2),
        })
    }
}

/// A break in run coverage between two consecutive stored records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContiguityGap {
    pub index: usize,
    pub run_max: i64,
    pub next_run_min: i64,
}

impl fmt::Display for ContiguityGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Warning: Table jump between rows {} and {}",
            self.index,
            self.index + 1
        )?;
        writeln!(f, "runMax at row {}: {}", self.index, self.run_max)?;
        writeln!(f, "runMin at row {}: {}", self.index + 1, self.next_run_min)?;
        write!(f, "{}", "-".repeat(WARNING_SEPARATOR_WIDTH))
    }
}

/// Compare each record with the next one in stored order.
///
/// Records are never reordered or modified; a gap or overlap is only reported.
pub fn check_contiguity(records: &[CalibrationRecord]) -> Vec<ContiguityGap> {
    records
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[0].run_max + 1 != pair[1].run_min)
        .map(|(index, pair)| ContiguityGap {
            index,
            run_max: pair[0].run_max,
            next_run_min: pair[1].run_min,
        })
        .collect()
}

/// Calibration records of one table, with the gaps found between them
#[derive(Debug, Clone)]
pub struct CalibrationReport {
    pub table_path: String,
    pub records: Vec<CalibrationRecord>,
    pub gaps: Vec<ContiguityGap>,
}

/// Load every constant set of `table_path` as calibration records
pub async fn load_calibration(
    db: &dyn CalibrationDatabase,
    table_path: &str,
) -> Result<CalibrationReport> {
    let table = db
        .get_type_table(table_path)
        .await
        .with_context(|| format!("Failed to read calibration table {table_path}"))?;

    if !table.columns.is_empty() && table.columns.len() != FCUP_ROW_ARITY {
        tracing::warn!(
            path = table_path,
            columns = table.columns.len(),
            "unexpected column count"
        );
    }

    let records = table
        .constant_sets
        .iter()
        .map(|set| {
            tracing::debug!(
                id = set.id,
                variation = %set.variation,
                run_min = set.run_min,
                run_max = set.run_max,
                "constant set"
            );
            CalibrationRecord::from_constant_set(set)
        })
        .collect::<Result<Vec<_>>>()?;

    let gaps = check_contiguity(&records);

    Ok(CalibrationReport {
        table_path: table.path,
        records,
        gaps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(run_min: i64, run_max: i64) -> CalibrationRecord {
        CalibrationRecord {
            run_min,
            run_max,
            slope: "906.2".to_string(),
            offset: "0".to_string(),
            atten: "9.8088".to_string(),
        }
    }

    fn set(data: &[&str]) -> ConstantSet {
        ConstantSet {
            id: 17,
            run_min: 100,
            run_max: 199,
            variation: "default".to_string(),
            data: data.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_single_gap_detected() {
        let records = vec![record(0, 99), record(100, 199), record(201, 299)];
        let gaps = check_contiguity(&records);
        assert_eq!(
            gaps,
            vec![ContiguityGap {
                index: 1,
                run_max: 199,
                next_run_min: 201
            }]
        );
    }

    #[test]
    fn test_contiguous_records_have_no_gaps() {
        let records = vec![record(0, 99), record(100, 199), record(200, 2147483647)];
        assert!(check_contiguity(&records).is_empty());
        assert!(check_contiguity(&[]).is_empty());
        assert!(check_contiguity(&records[..1]).is_empty());
    }

    #[test]
    fn test_stored_order_is_checked_as_is() {
        // Unsorted input: the check compares neighbours as stored.
        let records = vec![record(100, 199), record(0, 99), record(200, 299)];
        let gaps = check_contiguity(&records);
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].index, 0);
        assert_eq!(gaps[1].index, 1);
    }

    #[test]
    fn test_open_ended_range_reported() {
        let records = vec![record(0, 2147483647), record(100, 199)];
        let gaps = check_contiguity(&records);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].run_max, 2147483647);
    }

    #[test]
    fn test_gap_message() {
        let gap = ContiguityGap {
            index: 1,
            run_max: 199,
            next_run_min: 201,
        };
        let text = gap.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Warning: Table jump between rows 1 and 2");
        assert_eq!(lines[1], "runMax at row 1: 199");
        assert_eq!(lines[2], "runMin at row 2: 201");
        assert_eq!(lines[3], "-".repeat(75));
    }

    #[test]
    fn test_record_from_constant_set() {
        let rec = CalibrationRecord::from_constant_set(&set(&["0", "0", "0", "906.20", "-0.5", "1e-05"]))
            .unwrap();
        assert_eq!(rec.run_min, 100);
        assert_eq!(rec.run_max, 199);
        assert_eq!(rec.slope, "906.20");
        assert_eq!(rec.offset, "-0.5");
        assert_eq!(rec.atten, "1e-05");
    }

    #[test]
    fn test_record_wrong_arity() {
        let err = CalibrationRecord::from_constant_set(&set(&["1", "2", "3"])).unwrap_err();
        assert!(err.to_string().contains("has 3 values, expected 6"));
    }

    #[test]
    fn test_record_keeps_non_numeric_text() {
        let rec = CalibrationRecord::from_constant_set(&set(&["0", "0", "0", "x", "0", "nan"]))
            .unwrap();
        assert_eq!(rec.slope, "x");
        assert_eq!(rec.offset, "0");
        assert_eq!(rec.atten, "nan");
    }
}
