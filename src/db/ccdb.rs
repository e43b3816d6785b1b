//! Calibration Constants Database (CCDB) access
//!
//! Tables live in a directory tree (`directories.parentId`, root = 0). Each
//! constant set stores its values as a `|`-delimited vault and is bound to a
//! run range through an assignment.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;

use super::pool::{self as db_pool, Bind, Pool, PoolArgsBuilder};

/// Escaped form of `|` inside a vault value (CCDB's own spelling)
const VAULT_DELIMITER_ESCAPE: &str = "&delimeter;";

/// One constant set and the run range it is assigned to
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantSet {
    pub id: i64,
    pub run_min: i64,
    pub run_max: i64,
    pub variation: String,
    pub data: Vec<String>,
}

/// A CCDB type table with all of its constant sets
#[derive(Debug, Clone)]
pub struct TypeTable {
    pub path: String,
    pub columns: Vec<String>,
    pub constant_sets: Vec<ConstantSet>,
}

/// Source of calibration type tables
#[async_trait]
pub trait CalibrationDatabase: Send + Sync {
    /// Fetch a table by its absolute path, e.g. `/runcontrol/fcup`
    async fn get_type_table(&self, path: &str) -> Result<TypeTable>;
}

/// Split a vault string into its values
pub fn parse_vault(vault: &str) -> Vec<String> {
    if vault.is_empty() {
        return Vec::new();
    }
    vault
        .split('|')
        .map(|v| v.replace(VAULT_DELIMITER_ESCAPE, "|"))
        .collect()
}

#[derive(Debug, sqlx::FromRow)]
struct IdRow {
    id: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct NameRow {
    name: String,
}

#[derive(Debug, sqlx::FromRow)]
struct ConstantSetRow {
    id: i64,
    vault: String,
    run_min: i64,
    run_max: i64,
    variation: String,
}

/// SQL-backed CCDB provider
pub struct CcdbProvider {
    pool: Pool,
    user: String,
}

impl CcdbProvider {
    pub fn new(pool: Pool, user: impl Into<String>) -> Self {
        Self {
            pool,
            user: user.into(),
        }
    }

    /// Connect to CCDB. The user name only labels the session in logs.
    pub async fn connect(url: &str, user: &str) -> Result<Self> {
        let pool_args = PoolArgsBuilder::default().url(url).build()?;
        let pool = db_pool::pool(pool_args)
            .await
            .context("Failed to connect to the calibration database")?;
        Ok(Self::new(pool, user))
    }

    async fn resolve_directory(&self, dirs: &[&str]) -> Result<i64> {
        let mut parent = 0i64;
        for (depth, name) in dirs.iter().enumerate() {
            let row: Option<IdRow> = self
                .pool
                .fetch_optional(
                    "SELECT id FROM directories WHERE name = ? AND parentId = ?",
                    &[Bind::Text(name), Bind::Int(parent)],
                )
                .await
                .context("Failed to query CCDB directories")?;
            parent = row
                .ok_or_else(|| anyhow!("Directory '/{}' not found", dirs[..=depth].join("/")))?
                .id;
        }
        Ok(parent)
    }
}

#[async_trait]
impl CalibrationDatabase for CcdbProvider {
    async fn get_type_table(&self, path: &str) -> Result<TypeTable> {
        tracing::info!(path, user = %self.user, "reading type table");

        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let (table_name, dirs) = parts
            .split_last()
            .ok_or_else(|| anyhow!("Invalid table path '{}'", path))?;

        let directory_id = self.resolve_directory(dirs).await?;

        let table: IdRow = self
            .pool
            .fetch_optional(
                "SELECT id FROM typeTables WHERE directoryId = ? AND name = ?",
                &[Bind::Int(directory_id), Bind::Text(table_name)],
            )
            .await
            .context("Failed to query CCDB type tables")?
            .ok_or_else(|| anyhow!("Type table '{}' not found", path))?;

        let columns: Vec<NameRow> = self
            .pool
            .fetch_all(
                "SELECT name FROM columns WHERE typeId = ? ORDER BY `order`",
                &[Bind::Int(table.id)],
            )
            .await
            .context("Failed to query CCDB table columns")?;

        let query = r#"
            SELECT
                cs.id AS id,
                cs.vault AS vault,
                rr.runMin AS run_min,
                rr.runMax AS run_max,
                v.name AS variation
            FROM constantSets cs
            JOIN assignments a ON a.constantSetId = cs.id
            JOIN runRanges rr ON rr.id = a.runRangeId
            JOIN variations v ON v.id = a.variationId
            WHERE cs.constantTypeId = ?
            ORDER BY cs.id
        "#;

        let rows: Vec<ConstantSetRow> = self
            .pool
            .fetch_all(query, &[Bind::Int(table.id)])
            .await
            .context("Failed to query CCDB constant sets")?;

        tracing::info!(path, sets = rows.len(), "type table loaded");

        Ok(TypeTable {
            path: path.to_string(),
            columns: columns.into_iter().map(|c| c.name).collect(),
            constant_sets: rows
                .into_iter()
                .map(|row| ConstantSet {
                    id: row.id,
                    run_min: row.run_min,
                    run_max: row.run_max,
                    variation: row.variation,
                    data: parse_vault(&row.vault),
                })
                .collect(),
        })
    }
}
