pub mod ast;
pub mod from;
pub mod mutation;
pub mod parameters;
pub mod predicate;
pub mod query;
pub mod reader;
pub mod render;
pub mod select;

pub use ast::parse_expression;
pub use mutation::{
    compile_bulk_mutation, BulkMutation, ExecutionContext, StatementExecutor,
};
pub use parameters::{ParameterKey, ParameterSpecification, QueryParameters};
pub use predicate::{StandardWhereCompiler, WhereClauseCompiler};
pub use query::{CompiledSelect, SelectQuery};
