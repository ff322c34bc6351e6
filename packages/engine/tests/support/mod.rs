#![allow(dead_code)]

use std::sync::{Mutex, Once};

use async_trait::async_trait;
use rusqlite::{params_from_iter, Connection, Row};
use strata_engine::metadata::StaticMetamodel;
use strata_engine::{QueryResult, SqlDialect, StrataBackend, StrataError, Value};

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    pub fn in_memory() -> Result<Self, StrataError> {
        let conn = Connection::open_in_memory().map_err(sqlite_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs a `;`-separated script, for fixtures.
    pub fn run_script(&self, sql: &str) -> Result<(), StrataError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StrataError::unknown("sqlite mutex poisoned"))?;
        conn.execute_batch(sql).map_err(sqlite_error)
    }

    pub fn count(&self, table: &str) -> Result<i64, StrataError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StrataError::unknown("sqlite mutex poisoned"))?;
        conn.query_row(&format!("select count(*) from {table}"), [], |row| row.get(0))
            .map_err(sqlite_error)
    }
}

#[async_trait(?Send)]
impl StrataBackend for SqliteBackend {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, StrataError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StrataError::unknown("sqlite mutex poisoned"))?;
        let mut stmt = conn.prepare(sql).map_err(sqlite_error)?;
        let bound_params = params.iter().cloned().map(to_sql_value);

        if stmt.column_count() == 0 {
            let rows_affected = stmt
                .execute(params_from_iter(bound_params))
                .map_err(sqlite_error)?;
            return Ok(QueryResult::affected(rows_affected as u64));
        }

        let columns = stmt
            .column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect::<Vec<_>>();
        let mut rows = stmt
            .query(params_from_iter(bound_params))
            .map_err(sqlite_error)?;
        let mut result_rows = Vec::new();
        while let Some(row) = rows.next().map_err(sqlite_error)? {
            result_rows.push(map_row(row)?);
        }
        Ok(QueryResult {
            rows: result_rows,
            columns,
            rows_affected: 0,
        })
    }
}

fn sqlite_error(err: rusqlite::Error) -> StrataError {
    StrataError::unknown(err.to_string())
}

fn map_row(row: &Row<'_>) -> Result<Vec<Value>, StrataError> {
    let mut values = Vec::new();
    for idx in 0..row.as_ref().column_count() {
        let value = row.get_ref(idx).map_err(sqlite_error)?;
        values.push(match value {
            rusqlite::types::ValueRef::Null => Value::Null,
            rusqlite::types::ValueRef::Integer(value) => Value::Integer(value),
            rusqlite::types::ValueRef::Real(value) => Value::Real(value),
            rusqlite::types::ValueRef::Text(value) => {
                Value::Text(String::from_utf8_lossy(value).to_string())
            }
            rusqlite::types::ValueRef::Blob(value) => Value::Blob(value.to_vec()),
        });
    }
    Ok(values)
}

fn to_sql_value(value: Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(value) => rusqlite::types::Value::Integer(value),
        Value::Real(value) => rusqlite::types::Value::Real(value),
        Value::Text(value) => rusqlite::types::Value::Text(value),
        Value::Blob(value) => rusqlite::types::Value::Blob(value),
    }
}

/// One statement as the backend saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    pub sql: String,
    pub rows_affected: Option<u64>,
}

/// Wraps a backend, records every statement and fails the first statement
/// containing `fail_on`.
pub struct RecordingBackend<B> {
    inner: B,
    fail_on: Option<String>,
    dialect: Option<SqlDialect>,
    statements: Mutex<Vec<RecordedStatement>>,
}

impl<B: StrataBackend> RecordingBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            fail_on: None,
            dialect: None,
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on = Some(fragment.into());
        self
    }

    pub fn with_dialect(mut self, dialect: SqlDialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.statements
            .lock()
            .map(|statements| statements.clone())
            .unwrap_or_default()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements()
            .into_iter()
            .map(|statement| statement.sql)
            .collect()
    }

    fn record(&self, sql: &str, rows_affected: Option<u64>) {
        if let Ok(mut statements) = self.statements.lock() {
            statements.push(RecordedStatement {
                sql: sql.to_string(),
                rows_affected,
            });
        }
    }
}

#[async_trait(?Send)]
impl<B: StrataBackend> StrataBackend for RecordingBackend<B> {
    fn dialect(&self) -> SqlDialect {
        self.dialect.unwrap_or_else(|| self.inner.dialect())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, StrataError> {
        if self
            .fail_on
            .as_deref()
            .is_some_and(|fragment| sql.contains(fragment))
        {
            self.record(sql, None);
            return Err(StrataError::unknown(format!("injected failure for `{sql}`")));
        }
        let result = self.inner.execute(sql, params).await;
        self.record(sql, result.as_ref().ok().map(|result| result.rows_affected));
        result
    }
}

/// A backend that accepts everything and reports a fixed row count.
pub struct NullBackend {
    pub dialect: SqlDialect,
    pub rows_affected: u64,
}

#[async_trait(?Send)]
impl StrataBackend for NullBackend {
    fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult, StrataError> {
        Ok(QueryResult::affected(self.rows_affected))
    }
}

pub const INVOICE_SCHEMA: &str = "
    create table customer (id integer primary key, name text not null, city text);
    create table invoice (
        id integer primary key,
        dtype text not null,
        total real not null,
        currency text,
        amount real,
        customer_id integer references customer(id)
    );
    create table invoice_detail (
        invoice_id integer primary key references invoice(id),
        note text
    );
    create table invoice_tag (invoice_id integer not null, tag text not null);
";

pub const INVOICE_ROWS: &str = "
    insert into customer (id, name, city) values (1, 'Acme', 'Berlin'), (2, 'Globex', 'Paris');
    insert into invoice (id, dtype, total, currency, amount, customer_id) values
        (1, 'INV', 50, 'EUR', 50, 1),
        (2, 'INV', 150, 'EUR', 150, 1),
        (3, 'INV', 250, 'USD', 250, 2),
        (4, 'INV', 350, NULL, NULL, 2),
        (5, 'CRN', 450, 'EUR', 450, 1);
    insert into invoice_detail (invoice_id, note) values
        (1, 'small'), (2, 'medium'), (3, 'large'), (4, 'huge'), (5, 'credit');
    insert into invoice_tag (invoice_id, tag) values (2, 'urgent'), (3, 'urgent'), (3, 'export');
";

/// `Customer` in one table, `Invoice` across `invoice` and `invoice_detail`
/// sharing its table with credit notes through `dtype`.
pub fn invoice_model() -> StaticMetamodel {
    StaticMetamodel::from_json(
        &serde_json::json!([
            {
                "name": "Customer",
                "root_table": { "name": "customer" },
                "identifier": {
                    "name": "id",
                    "kind": "basic",
                    "columns": [{ "table": "customer", "name": "id", "sql_type": "integer" }]
                },
                "attributes": [
                    {
                        "name": "name",
                        "kind": "basic",
                        "columns": [{ "table": "customer", "name": "name", "sql_type": "text" }]
                    },
                    {
                        "name": "city",
                        "kind": "basic",
                        "columns": [{ "table": "customer", "name": "city", "sql_type": "text" }]
                    }
                ]
            },
            {
                "name": "Invoice",
                "root_table": { "name": "invoice" },
                "identifier": {
                    "name": "id",
                    "kind": "basic",
                    "columns": [{ "table": "invoice", "name": "id", "sql_type": "integer" }]
                },
                "joined_tables": [
                    { "table": "invoice_detail", "key_columns": ["invoice_id"] }
                ],
                "discriminator": {
                    "column": { "table": "invoice", "name": "dtype", "sql_type": "text" },
                    "value": "INV",
                    "restrict_to": ["INV"]
                },
                "attributes": [
                    {
                        "name": "total",
                        "kind": "basic",
                        "columns": [{ "table": "invoice", "name": "total", "sql_type": "real" }]
                    },
                    {
                        "name": "price",
                        "kind": "embedded",
                        "embeddable": "Money",
                        "components": [
                            {
                                "name": "currency",
                                "kind": "basic",
                                "columns": [{ "table": "invoice", "name": "currency", "sql_type": "text" }]
                            },
                            {
                                "name": "amount",
                                "kind": "basic",
                                "columns": [{ "table": "invoice", "name": "amount", "sql_type": "real" }]
                            }
                        ]
                    },
                    {
                        "name": "note",
                        "kind": "basic",
                        "columns": [{ "table": "invoice_detail", "name": "note", "sql_type": "text" }]
                    },
                    {
                        "name": "customer",
                        "kind": "to_one",
                        "target": "Customer",
                        "columns": [{ "table": "invoice", "name": "customer_id", "sql_type": "integer" }]
                    },
                    {
                        "name": "tags",
                        "kind": "collection",
                        "role": "Invoice.tags",
                        "table": "invoice_tag",
                        "key_columns": [{ "table": "invoice_tag", "name": "invoice_id", "sql_type": "integer" }],
                        "element_columns": [{ "table": "invoice_tag", "name": "tag", "sql_type": "text" }]
                    }
                ]
            }
        ])
        .to_string(),
    )
    .expect("invoice metadata should load")
}

pub fn seeded_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("in-memory sqlite should open");
    backend
        .run_script(INVOICE_SCHEMA)
        .expect("schema should apply");
    backend.run_script(INVOICE_ROWS).expect("rows should load");
    backend
}
