use tracing::debug;

use super::basic::BasicExecutor;
use super::delete::TableBasedDeleteExecutor;
use super::executor::StatementExecutor;
use super::statement::BulkMutation;
use super::update::TableBasedUpdateExecutor;
use crate::errors;
use crate::metadata::{require_entity, Metamodel};
use crate::sql::predicate::WhereClauseCompiler;
use crate::{EngineConfig, SqlDialect, StrataError};

/// Picks the execution strategy for a bulk statement: a single statement for
/// entities stored in one table, the id table flow for the others.
pub fn compile_bulk_mutation(
    mutation: &BulkMutation,
    model: &dyn Metamodel,
    dialect: SqlDialect,
    config: &EngineConfig,
    compiler: &dyn WhereClauseCompiler,
) -> Result<Box<dyn StatementExecutor>, StrataError> {
    config.validate()?;
    let entity = require_entity(model, mutation.entity_name())?;
    if entity.is_union_root() {
        return Err(errors::unsupported_mutation_error(&format!(
            "bulk {} of `{}` spans the tables of its union subclasses",
            mutation.kind_name(),
            entity.name
        )));
    }
    let table_based = entity.is_multi_table();
    debug!(
        entity = %entity.name,
        kind = mutation.kind_name(),
        dialect = dialect.name(),
        table_based,
        "compiling bulk statement"
    );

    let executor: Box<dyn StatementExecutor> = match mutation {
        BulkMutation::Delete { predicate, .. } if table_based => Box::new(
            TableBasedDeleteExecutor::compile(
                model,
                entity,
                predicate.as_ref(),
                dialect,
                config,
                compiler,
            )?,
        ),
        BulkMutation::Delete { predicate, .. } => Box::new(BasicExecutor::compile_delete(
            model,
            entity,
            predicate.as_ref(),
            dialect,
            compiler,
        )?),
        BulkMutation::Update {
            assignments,
            predicate,
            ..
        } if table_based => Box::new(TableBasedUpdateExecutor::compile(
            model,
            entity,
            assignments,
            predicate.as_ref(),
            dialect,
            config,
            compiler,
        )?),
        BulkMutation::Update {
            assignments,
            predicate,
            ..
        } => Box::new(BasicExecutor::compile_update(
            model,
            entity,
            assignments,
            predicate.as_ref(),
            dialect,
            compiler,
        )?),
        BulkMutation::InsertSelect { .. } if table_based => {
            return Err(errors::unsupported_mutation_error(&format!(
                "insert-select into `{}` would have to split rows across its tables",
                entity.name
            )))
        }
        BulkMutation::InsertSelect {
            attributes, select, ..
        } => Box::new(BasicExecutor::compile_insert_select(
            model, entity, attributes, select,
        )?),
    };
    Ok(executor)
}
