//! Database layer - connection pool and the RCDB/CCDB providers

pub mod ccdb;
pub mod pool;
pub mod rcdb;

pub use ccdb::{CalibrationDatabase, CcdbProvider};
pub use pool::Pool;
pub use rcdb::{ConditionDatabase, RcdbProvider};
