//! Report pipeline: run selection, condition fetch, calibration checks, rendering

pub mod calibration;
pub mod condition;
pub mod fetch;
pub mod render;
pub mod runs;

pub use calibration::{CalibrationRecord, CalibrationReport, ContiguityGap, check_contiguity};
pub use condition::{ConditionValue, normalize};
pub use fetch::{ConditionReport, ReportRow, WarningBudget, fetch_conditions};
pub use render::{Table, render_list};
pub use runs::RunSet;
