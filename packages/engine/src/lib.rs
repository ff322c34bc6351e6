mod backend;
mod config;
mod dialect;
mod error;
pub mod errors;
pub mod metadata;
pub mod sql;
mod types;

pub use backend::StrataBackend;
pub use config::EngineConfig;
pub use dialect::{
    AfterUseAction, BeforeUseAction, SqlDialect, TemporaryTableIsolation, TemporaryTableKind,
};
pub use error::StrataError;
pub use errors::{ErrorCategory, ErrorCode};
pub use sql::{
    compile_bulk_mutation, parse_expression, BulkMutation, CompiledSelect, ExecutionContext,
    QueryParameters, SelectQuery, StandardWhereCompiler, StatementExecutor, WhereClauseCompiler,
};
pub use types::{QueryResult, Value};
