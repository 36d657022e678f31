//! SQLite storage for normalized records
//!
//! Tables are created on demand from a sample record, so any scraped table
//! can be persisted without a fixed schema. Column names are quoted and kept
//! exactly as they appear on the page (`3P%`, `+/-`).

use crate::data::normalize::{NormalizedRecord, Value};
use crate::{HoopsError, Result};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, Params, ToSql};
use std::path::Path;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Text(s) => ToSqlOutput::from(s.as_str()),
            Value::Int(i) => ToSqlOutput::from(*i),
            Value::Float(x) => ToSqlOutput::from(*x),
            Value::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
        })
    }
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Ok(Database { conn })
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Database { conn })
    }

    // ==================== Schema ====================

    /// Create `table` with the columns of `sample` unless it already exists,
    /// then add any column of `sample` the table lacks.
    ///
    /// Column affinity follows the sample's value types; `key_columns` form a
    /// UNIQUE constraint that [`Database::upsert`] resolves conflicts on.
    /// Added columns are NULL for rows stored before them.
    pub fn ensure_table(&self, table: &str, sample: &NormalizedRecord, key_columns: &[&str]) -> Result<()> {
        if sample.is_empty() {
            return Err(HoopsError::Parse(format!("Cannot create {} from an empty record", table)));
        }
        for key in key_columns {
            if !sample.contains(key) {
                return Err(HoopsError::Parse(format!(
                    "Key column {} is not in the record for {}",
                    key, table
                )));
            }
        }

        let mut definitions: Vec<String> = sample
            .iter()
            .map(|(column, value)| format!("{} {}", quote(column), affinity(value)))
            .collect();
        if !key_columns.is_empty() {
            definitions.push(format!("UNIQUE({})", quote_list(key_columns.iter().copied())));
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(table),
            definitions.join(", ")
        );
        log::debug!("{}", sql);
        self.conn.execute(&sql, [])?;

        let existing = self.column_names(table)?;
        for (column, value) in sample.iter() {
            if existing.iter().any(|c| c == column) {
                continue;
            }
            let sql = format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                quote(table),
                quote(column),
                affinity(value)
            );
            log::debug!("{}", sql);
            self.conn.execute(&sql, [])?;
        }
        Ok(())
    }

    /// Columns of `table` in definition order
    pub fn column_names(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote(table)))?;
        let names = stmt
            .query_map([], |row| row.get(1))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Names of all user tables
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    // ==================== Writes ====================

    /// Plain insert; a UNIQUE violation is an error
    pub fn insert(&self, table: &str, record: &NormalizedRecord) -> Result<()> {
        let sql = insert_sql(table, record);
        self.conn.execute(&sql, rusqlite::params_from_iter(values(record)))?;
        Ok(())
    }

    /// Insert, or overwrite every non-key column of the row sharing
    /// `conflict_columns` with `record`
    pub fn upsert(&self, table: &str, record: &NormalizedRecord, conflict_columns: &[&str]) -> Result<()> {
        if conflict_columns.is_empty() {
            return Err(HoopsError::Parse(format!(
                "Upsert into {} needs at least one conflict column",
                table
            )));
        }

        let updates: Vec<String> = record
            .columns()
            .filter(|c| !conflict_columns.contains(c))
            .map(|c| format!("{0} = excluded.{0}", quote(c)))
            .collect();
        let action = if updates.is_empty() {
            "NOTHING".to_string()
        } else {
            format!("UPDATE SET {}", updates.join(", "))
        };

        let sql = format!(
            "{} ON CONFLICT({}) DO {}",
            insert_sql(table, record),
            quote_list(conflict_columns.iter().copied()),
            action
        );
        self.conn.execute(&sql, rusqlite::params_from_iter(values(record)))?;
        Ok(())
    }

    /// Upsert several records one at a time
    pub fn upsert_all(&self, table: &str, records: &[NormalizedRecord], conflict_columns: &[&str]) -> Result<usize> {
        let mut count = 0;
        for record in records {
            self.upsert(table, record, conflict_columns)?;
            count += 1;
        }
        Ok(count)
    }

    /// Ensure `table` fits every record, then upsert them all
    pub fn store(&self, table: &str, records: &[NormalizedRecord], conflict_columns: &[&str]) -> Result<usize> {
        for record in records {
            self.ensure_table(table, record, conflict_columns)?;
        }
        self.upsert_all(table, records, conflict_columns)
    }

    /// Insert all records in one transaction; nothing is written if any
    /// insert fails
    pub fn append(&mut self, table: &str, records: &[NormalizedRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for record in records {
            let sql = insert_sql(table, record);
            tx.execute(&sql, rusqlite::params_from_iter(values(record)))?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    // ==================== Reads ====================

    /// Run a query and read every row back as a record
    pub fn query<P: Params>(&self, sql: &str, params: P) -> Result<Vec<NormalizedRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

        let records = stmt
            .query_map(params, |row| {
                let mut record = NormalizedRecord::new();
                for (i, column) in columns.iter().enumerate() {
                    record.set(column, from_sql(row.get_ref(i)?));
                }
                Ok(record)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn count(&self, table: &str) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote(table)), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ==================== Statistics ====================

    /// Row count of every table
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let mut tables = Vec::new();
        for name in self.table_names()? {
            let rows = self.count(&name)?;
            tables.push((name, rows));
        }
        Ok(DatabaseStats { tables })
    }
}

/// Database statistics
#[derive(Debug, Clone, Default)]
pub struct DatabaseStats {
    pub tables: Vec<(String, usize)>,
}

impl DatabaseStats {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|(_, n)| n).sum()
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn quote_list<'a>(identifiers: impl Iterator<Item = &'a str>) -> String {
    identifiers.map(quote).collect::<Vec<_>>().join(", ")
}

fn affinity(value: &Value) -> &'static str {
    match value {
        Value::Int(_) => "INTEGER",
        Value::Float(_) => "REAL",
        Value::Text(_) | Value::Date(_) => "TEXT",
    }
}

fn insert_sql(table: &str, record: &NormalizedRecord) -> String {
    let placeholders: Vec<String> = (1..=record.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        quote_list(record.columns()),
        placeholders.join(", ")
    )
}

fn values(record: &NormalizedRecord) -> impl Iterator<Item = &Value> {
    record.iter().map(|(_, v)| v)
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Text(String::new()),
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(x) => Value::Float(x),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
