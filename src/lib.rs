// Public API - the runner plus the types its results expose
pub mod config;
pub mod db;
pub mod error;
pub mod report;
pub mod runner;
pub mod telemetry;
