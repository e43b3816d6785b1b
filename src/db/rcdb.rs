//! Run Conditions Database (RCDB) access
//!
//! RCDB stores one row per (run, condition type) in `conditions`, with the
//! value in the column that matches the condition type's `value_type`.

use async_trait::async_trait;

use super::pool::{Bind, Pool};
use crate::error::LookupError;
use crate::report::ConditionValue;

/// Source of per-run condition values
#[async_trait]
pub trait ConditionDatabase: Send + Sync {
    /// Check that a run is registered
    async fn has_run(&self, run: u32) -> Result<bool, LookupError>;

    /// Look up one condition of one run
    async fn condition(&self, run: u32, key: &str) -> Result<ConditionValue, LookupError>;
}

/// A run that is known to exist in the database
pub struct RunHandle<'a> {
    db: &'a dyn ConditionDatabase,
    number: u32,
}

impl<'a> RunHandle<'a> {
    pub fn number(&self) -> u32 {
        self.number
    }

    pub async fn get_condition(&self, key: &str) -> Result<ConditionValue, LookupError> {
        self.db.condition(self.number, key).await
    }
}

/// Open a run, failing with [`LookupError::RunNotFound`] if it is not registered
pub async fn get_run(db: &dyn ConditionDatabase, run: u32) -> Result<RunHandle<'_>, LookupError> {
    if db.has_run(run).await? {
        Ok(RunHandle { db, number: run })
    } else {
        Err(LookupError::RunNotFound(run))
    }
}

/// Raw condition row, one value column per RCDB value type
#[derive(Debug, sqlx::FromRow)]
struct ConditionRow {
    value_type: String,
    text_value: Option<String>,
    int_value: Option<i64>,
    float_value: Option<f64>,
    bool_value: Option<bool>,
    time_value: Option<String>,
}

impl ConditionRow {
    fn into_value(self, run: u32, key: &str) -> Result<ConditionValue, LookupError> {
        let missing = || LookupError::ConditionNotFound {
            run,
            key: key.to_string(),
        };

        match self.value_type.to_ascii_lowercase().as_str() {
            "string" | "json" | "blob" => self.text_value.map(ConditionValue::Text),
            "int" => self.int_value.map(ConditionValue::Int),
            "float" => self.float_value.map(ConditionValue::Float),
            "bool" => self.bool_value.map(ConditionValue::Bool),
            "time" => self.time_value.map(ConditionValue::Time),
            other => {
                return Err(LookupError::UnsupportedValueType {
                    key: key.to_string(),
                    value_type: other.to_string(),
                });
            }
        }
        .ok_or_else(missing)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CountRow {
    count: i64,
}

/// SQL-backed RCDB provider
pub struct RcdbProvider {
    pool: Pool,
}

impl RcdbProvider {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConditionDatabase for RcdbProvider {
    async fn has_run(&self, run: u32) -> Result<bool, LookupError> {
        let row: Option<CountRow> = self
            .pool
            .fetch_optional(
                "SELECT COUNT(*) AS count FROM runs WHERE number = ?",
                &[Bind::Int(run.into())],
            )
            .await?;
        Ok(row.is_some_and(|r| r.count > 0))
    }

    async fn condition(&self, run: u32, key: &str) -> Result<ConditionValue, LookupError> {
        let query = r#"
            SELECT
                ct.value_type AS value_type,
                c.text_value AS text_value,
                c.int_value AS int_value,
                c.float_value AS float_value,
                c.bool_value AS bool_value,
                CAST(c.time_value AS CHAR) AS time_value
            FROM conditions c
            JOIN condition_types ct ON ct.id = c.condition_type_id
            WHERE c.run_number = ? AND ct.name = ?
            ORDER BY c.id
            LIMIT 1
        "#;

        let row: Option<ConditionRow> = self
            .pool
            .fetch_optional(query, &[Bind::Int(run.into()), Bind::Text(key)])
            .await?;

        match row {
            Some(row) => row.into_value(run, key),
            None => Err(LookupError::ConditionNotFound {
                run,
                key: key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value_type: &str) -> ConditionRow {
        ConditionRow {
            value_type: value_type.to_string(),
            text_value: None,
            int_value: None,
            float_value: None,
            bool_value: None,
            time_value: None,
        }
    }

    #[test]
    fn test_value_column_follows_type() {
        let mut r = row("float");
        r.float_value = Some(2.5);
        r.int_value = Some(7);
        assert_eq!(r.into_value(1, "beam_current").unwrap(), ConditionValue::Float(2.5));

        let mut r = row("int");
        r.int_value = Some(7);
        assert_eq!(r.into_value(1, "events").unwrap(), ConditionValue::Int(7));

        let mut r = row("json");
        r.text_value = Some("{\"a\":1}".to_string());
        assert_eq!(
            r.into_value(1, "meta").unwrap(),
            ConditionValue::Text("{\"a\":1}".to_string())
        );

        let mut r = row("BOOL");
        r.bool_value = Some(true);
        assert_eq!(r.into_value(1, "is_valid").unwrap(), ConditionValue::Bool(true));
    }

    #[test]
    fn test_null_value_is_missing_condition() {
        let err = row("string").into_value(42, "target").unwrap_err();
        assert!(matches!(
            err,
            LookupError::ConditionNotFound { run: 42, ref key } if key == "target"
        ));
    }

    #[test]
    fn test_unknown_value_type() {
        let err = row("matrix").into_value(1, "odd").unwrap_err();
        assert!(matches!(err, LookupError::UnsupportedValueType { .. }));
    }
}
