//! Configuration constants for the report builder
//!
//! This module centralizes the defaults that the CLI exposes as overridable
//! parameters, plus the fixed layout constants of the reports.

// ============================================================================
// Database Connections
// ============================================================================

pub const DEFAULT_RCDB_URL: &str = "mysql://rcdb@clasdb/rcdb";

pub const DEFAULT_CCDB_URL: &str = "mysql://clas12reader@clasdb.jlab.org/clas12";

/// Name recorded by CCDB for this session
pub const DEFAULT_CCDB_USER: &str = "anonymous";

/// Lookups are issued one at a time, so a single connection is enough.
pub const MAX_CONNECTIONS: u32 = 1;

// ============================================================================
// Run Selection
// ============================================================================

/// Pattern used to pull the run number out of a HIPO file name.
/// Capture group 1 must hold the digits.
pub const DEFAULT_RUN_PATTERN: &str = r"sidisdvcs_([0-9]+)\.hipo";

// ============================================================================
// Condition Reports
// ============================================================================

/// Number of per-row lookup warnings printed before the rest are collapsed
/// into a single total.
pub const DEFAULT_MAX_WARNINGS: usize = 5;

pub const DEFAULT_CONDITIONS_OUTPUT: &str = "run_conditions.csv";

/// Condition whose text values are normalized before storage
pub const TARGET_CONDITION: &str = "target";

// ============================================================================
// Calibration Reports
// ============================================================================

pub const DEFAULT_FCUP_TABLE: &str = "/runcontrol/fcup";

pub const DEFAULT_CALIBRATION_OUTPUT: &str = "runcontrol_data.csv";

/// Faraday-cup rows carry sector, layer, component, slope, offset, atten.
pub const FCUP_ROW_ARITY: usize = 6;

/// Position of `slope` in a Faraday-cup row; offset and atten follow it.
pub const FCUP_SLOPE_INDEX: usize = 3;

/// Width of the separator printed under each contiguity warning
pub const WARNING_SEPARATOR_WIDTH: usize = 75;
