mod basic;
mod cache;
mod compile;
mod delete;
mod executor;
mod id_table;
mod statement;
mod temp_table;
mod update;

pub use basic::BasicExecutor;
pub use cache::{ActionQueue, BulkInvalidation, CacheInvalidationSink, ExecutionContext};
pub use compile::compile_bulk_mutation;
pub use delete::TableBasedDeleteExecutor;
pub use executor::{ExecutionPhase, PhysicalStatement, StatementExecutor};
pub use id_table::IdTable;
pub use statement::{Assignment, BulkMutation};
pub use temp_table::{ensure_id_table, release_id_table, LifecycleOutcome};
pub use update::TableBasedUpdateExecutor;
