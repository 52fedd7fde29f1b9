//! Database session.
//!
//! Only this module and the loan store talk to SQLite. The session is opened
//! once, handed to the store by reference, and closed explicitly (or on drop)
//! by whoever opened it.

use std::time::Duration;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::config::DatabaseConfig;
use crate::decimal::{Money, Rate};
use crate::errors::{db_err, Result};

const SCHEMA: &str = include_str!("schema.sql");

/// connected, transactable database session
pub struct Session {
    conn: Connection,
}

impl Session {
    /// open (or create) the database described by `config` and bootstrap the schema
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let conn = if config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.path)
        }
        .map_err(db_err(format!("opening database {}", config.path.display())))?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(db_err("setting busy timeout"))?;
        if config.enforce_foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON;")
                .map_err(db_err("enabling foreign keys"))?;
        }

        let session = Self { conn };
        session.bootstrap()?;

        tracing::info!(path = %config.path.display(), "database session opened");
        Ok(session)
    }

    /// private in-memory database with foreign keys enforced
    pub fn in_memory() -> Result<Self> {
        Self::open(&DatabaseConfig::in_memory())
    }

    fn bootstrap(&self) -> Result<()> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(db_err("creating loan schema"))
    }

    /// cheap round trip to prove the connection is usable
    pub fn health_check(&self) -> Result<()> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(db_err("health check"))
    }

    /// close the session, reporting any failure instead of ignoring it on drop
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, source)| db_err("closing database")(source))?;
        tracing::info!("database session closed");
        Ok(())
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_decimal().to_string()))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        decimal_from_sql(value).map(Money::from_decimal)
    }
}

/// rates are stored as annual percentages
impl ToSql for Rate {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_percentage().to_string()))
    }
}

impl FromSql for Rate {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        decimal_from_sql(value).map(Rate::from_percentage)
    }
}

/// accepts decimal text and, for hand-edited rows, plain numbers
fn decimal_from_sql(value: ValueRef<'_>) -> FromSqlResult<Decimal> {
    match value {
        ValueRef::Text(_) => {
            let text = value.as_str()?;
            Decimal::from_str_exact(text.trim()).map_err(|e| FromSqlError::Other(Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => Decimal::try_from(f).map_err(|e| FromSqlError::Other(Box::new(e))),
        _ => Err(FromSqlError::InvalidType),
    }
}
