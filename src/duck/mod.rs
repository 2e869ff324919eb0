use crate::table::{Scalar, Table};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate};
use duckdb::types::{TimeUnit, Value};
use duckdb::{AccessMode, Config, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::debug;

/// A single DuckDB connection shared behind a mutex; queries run one at a time.
pub struct QueryEngine {
    conn: Mutex<Connection>,
}

impl QueryEngine {
    /// Open an existing database file read-only.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Config::default().access_mode(AccessMode::ReadOnly)?;
        let conn = Connection::open_with_flags(path, config)
            .with_context(|| format!("opening {} read-only", path.display()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).with_context(|| format!("opening {}", path.display()))?;
        Ok(Self::from_connection(conn))
    }

    /// Open a DuckDB in‐memory database
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("duckdb connection mutex poisoned"))
    }

    /// Run statements that return no rows (setup, fixtures).
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Run one SQL statement and collect its full result grid.
    pub fn query(&self, sql: &str) -> Result<Table> {
        let conn = self.lock()?;
        let start = Instant::now();

        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let columns = rows
            .as_ref()
            .map(|s| s.column_names())
            .unwrap_or_default();

        let mut table = Table::new(columns);
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(table.columns.len());
            for i in 0..table.columns.len() {
                values.push(to_scalar(row.get::<_, Value>(i)?));
            }
            table.rows.push(values);
        }

        debug!(
            rows = table.num_rows(),
            columns = table.columns.len(),
            elapsed = ?start.elapsed(),
            "query finished"
        );
        Ok(table)
    }
}

/// Map a DuckDB value onto the evaluator's scalar model. Booleans, temporal values and
/// nested types become text.
fn to_scalar(value: Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::Boolean(b) => Scalar::Text(b.to_string()),
        Value::TinyInt(v) => Scalar::Int(v.into()),
        Value::SmallInt(v) => Scalar::Int(v.into()),
        Value::Int(v) => Scalar::Int(v.into()),
        Value::BigInt(v) => Scalar::Int(v),
        Value::UTinyInt(v) => Scalar::Int(v.into()),
        Value::USmallInt(v) => Scalar::Int(v.into()),
        Value::UInt(v) => Scalar::Int(v.into()),
        Value::UBigInt(v) => i64::try_from(v)
            .map(Scalar::Int)
            .unwrap_or_else(|_| Scalar::Text(v.to_string())),
        Value::HugeInt(v) => i64::try_from(v)
            .map(Scalar::Int)
            .unwrap_or_else(|_| Scalar::Text(v.to_string())),
        Value::Float(v) => Scalar::Float(v.into()),
        Value::Double(v) => Scalar::Float(v),
        Value::Decimal(d) => {
            let s = d.to_string();
            s.parse::<f64>()
                .map(Scalar::Float)
                .unwrap_or_else(|_| Scalar::Text(s))
        }
        Value::Text(s) | Value::Enum(s) => Scalar::Text(s),
        Value::Date32(days) => date_text(days)
            .map(Scalar::Text)
            .unwrap_or_else(|| Scalar::Int(days.into())),
        Value::Timestamp(unit, v) => timestamp_text(unit, v)
            .map(Scalar::Text)
            .unwrap_or_else(|| Scalar::Int(v)),
        other => Scalar::Text(format!("{:?}", other)),
    }
}

fn date_text(days: i32) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let date = epoch.checked_add_signed(Duration::days(days.into()))?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn timestamp_text(unit: TimeUnit, value: i64) -> Option<String> {
    let micros = match unit {
        TimeUnit::Second => value.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => value.checked_mul(1_000)?,
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    };
    let ts = DateTime::from_timestamp_micros(micros)?;
    Some(ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
}
