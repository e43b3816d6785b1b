//! Connection pool shared by the RCDB and CCDB providers.
use anyhow::{Context, Result};
use derive_builder::Builder;
use sqlx::FromRow;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};

use crate::config::MAX_CONNECTIONS;

/// Inner pool variants
#[derive(Debug, Clone)]
enum PoolInner {
    MySql(MySqlPool),
    #[cfg(test)]
    Sqlite(sqlx::SqlitePool),
}

/// Rows that can be decoded from every backend the pool supports.
#[cfg(not(test))]
pub trait DbRow: for<'r> FromRow<'r, MySqlRow> + Send + Unpin {}

#[cfg(not(test))]
impl<T> DbRow for T where T: for<'r> FromRow<'r, MySqlRow> + Send + Unpin {}

/// Rows that can be decoded from every backend the pool supports.
#[cfg(test)]
pub trait DbRow:
    for<'r> FromRow<'r, MySqlRow> + for<'r> FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin
{
}

#[cfg(test)]
impl<T> DbRow for T where
    T: for<'r> FromRow<'r, MySqlRow> + for<'r> FromRow<'r, sqlx::sqlite::SqliteRow> + Send + Unpin
{
}

/// A positional query parameter. Both backends use `?` placeholders.
#[derive(Debug, Clone, Copy)]
pub enum Bind<'a> {
    Int(i64),
    Text(&'a str),
}

// Wrap pool implementations so the providers stay backend-agnostic.
#[derive(Debug, Clone)]
pub struct Pool {
    inner: PoolInner,
}

#[derive(Builder)]
pub struct PoolArgs {
    #[builder(setter(into))]
    url: String,
    #[builder(default = "MAX_CONNECTIONS")]
    max_connections: u32,
}

/// Open a pool against a `mysql://` URL. Failing to reach the server is fatal.
pub async fn pool(args: PoolArgs) -> Result<Pool> {
    let PoolArgs {
        url,
        max_connections,
    } = args;

    tracing::info!(url = %url, "connecting");

    let mysql_pool = MySqlPoolOptions::new()
        .max_connections(max_connections)
        .connect(&url)
        .await
        .with_context(|| format!("Failed to connect to database at {url}"))?;

    Ok(Pool {
        inner: PoolInner::MySql(mysql_pool),
    })
}

impl Pool {
    /// Create an in-memory SQLite pool for testing
    ///
    /// Capped at one connection: every SQLite in-memory connection is its own
    /// database.
    #[cfg(test)]
    pub async fn sqlite_in_memory() -> Result<Self, sqlx::Error> {
        let sqlite_pool = sqlx::sqlite::SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Pool {
            inner: PoolInner::Sqlite(sqlite_pool),
        })
    }

    /// Execute a statement without results (test fixtures only)
    #[cfg(test)]
    pub async fn execute_query(&self, sql: &str) -> Result<(), sqlx::Error> {
        match &self.inner {
            PoolInner::MySql(pool) => {
                sqlx::query(sql).execute(pool).await?;
            }
            PoolInner::Sqlite(pool) => {
                sqlx::query(sql).execute(pool).await?;
            }
        }
        Ok(())
    }

    /// Fetch at most one row
    pub async fn fetch_optional<T: DbRow>(
        &self,
        sql: &str,
        binds: &[Bind<'_>],
    ) -> Result<Option<T>, sqlx::Error> {
        match &self.inner {
            PoolInner::MySql(pool) => {
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    query = match *bind {
                        Bind::Int(v) => query.bind(v),
                        Bind::Text(s) => query.bind(s),
                    };
                }
                query.fetch_optional(pool).await
            }
            #[cfg(test)]
            PoolInner::Sqlite(pool) => {
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    query = match *bind {
                        Bind::Int(v) => query.bind(v),
                        Bind::Text(s) => query.bind(s),
                    };
                }
                query.fetch_optional(pool).await
            }
        }
    }

    /// Fetch every row, in the order the database returns them
    pub async fn fetch_all<T: DbRow>(
        &self,
        sql: &str,
        binds: &[Bind<'_>],
    ) -> Result<Vec<T>, sqlx::Error> {
        match &self.inner {
            PoolInner::MySql(pool) => {
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    query = match *bind {
                        Bind::Int(v) => query.bind(v),
                        Bind::Text(s) => query.bind(s),
                    };
                }
                query.fetch_all(pool).await
            }
            #[cfg(test)]
            PoolInner::Sqlite(pool) => {
                let mut query = sqlx::query_as::<_, T>(sql);
                for bind in binds {
                    query = match *bind {
                        Bind::Int(v) => query.bind(v),
                        Bind::Text(s) => query.bind(s),
                    };
                }
                query.fetch_all(pool).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, sqlx::FromRow)]
    struct Pair {
        id: i64,
        name: String,
    }

    #[test]
    fn test_pool_args_default_connection_cap() {
        let args = PoolArgsBuilder::default()
            .url("mysql://reader@localhost/db")
            .build()
            .unwrap();
        assert_eq!(args.url, "mysql://reader@localhost/db");
        assert_eq!(args.max_connections, MAX_CONNECTIONS);
    }

    #[test]
    fn test_pool_args_requires_url() {
        assert!(PoolArgsBuilder::default().build().is_err());
    }

    #[tokio::test]
    async fn test_sqlite_fetch_with_binds() {
        let pool = Pool::sqlite_in_memory().await.unwrap();
        pool.execute_query("CREATE TABLE pairs (id INTEGER, name TEXT)")
            .await
            .unwrap();
        pool.execute_query("INSERT INTO pairs VALUES (1, 'a'), (2, 'b'), (3, 'b')")
            .await
            .unwrap();

        let rows: Vec<Pair> = pool
            .fetch_all(
                "SELECT id, name FROM pairs WHERE name = ? ORDER BY id",
                &[Bind::Text("b")],
            )
            .await
            .unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);

        let row: Option<Pair> = pool
            .fetch_optional("SELECT id, name FROM pairs WHERE id = ?", &[Bind::Int(1)])
            .await
            .unwrap();
        assert_eq!(row.unwrap().name, "a");

        let missing: Option<Pair> = pool
            .fetch_optional("SELECT id, name FROM pairs WHERE id = ?", &[Bind::Int(9)])
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
