use async_trait::async_trait;

use crate::{QueryResult, SqlDialect, StrataError, Value};

#[async_trait(?Send)]
pub trait StrataBackend {
    fn dialect(&self) -> SqlDialect;

    /// Runs one parameterized statement. Implementations translate their native
    /// failures into `StrataError`.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, StrataError>;

    /// Runs DDL outside the caller's unit of work. Backends without a separate
    /// connection or transaction for this fall back to `execute`.
    async fn execute_isolated(&self, sql: &str, transactional: bool) -> Result<(), StrataError> {
        let _ = transactional;
        self.execute(sql, &[]).await.map(|_| ())
    }
}
