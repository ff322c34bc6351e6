use async_trait::async_trait;
use sqlparser::ast::Expr;

use super::cache::{BulkInvalidation, ExecutionContext};
use super::executor::{
    compile_id_capture, PhysicalStatement, StatementExecutor, TableBasedExecution,
};
use super::id_table::IdTable;
use super::statement::Assignment;
use crate::errors;
use crate::metadata::{EntityDescriptor, Metamodel, PhysicalColumn};
use crate::sql::parameters::{number_anonymous_placeholders, ParameterCollector, QueryParameters};
use crate::sql::predicate::{TableColumnResolver, WhereClauseCompiler};
use crate::{EngineConfig, SqlDialect, StrataBackend, StrataError};

/// Updates a multi-table entity through its id table, one statement per table
/// that has assigned columns.
#[derive(Debug, Clone)]
pub struct TableBasedUpdateExecutor {
    execution: TableBasedExecution,
}

impl TableBasedUpdateExecutor {
    pub fn compile(
        model: &dyn Metamodel,
        entity: &EntityDescriptor,
        assignments: &[Assignment],
        predicate: Option<&Expr>,
        dialect: SqlDialect,
        config: &EngineConfig,
        compiler: &dyn WhereClauseCompiler,
    ) -> Result<Self, StrataError> {
        if assignments.is_empty() {
            return Err(errors::unsupported_mutation_error(&format!(
                "update of `{}` assigns nothing",
                entity.name
            )));
        }
        let id_table = IdTable::for_entity(entity, config, dialect)?;

        let mut values = assignments
            .iter()
            .map(|assignment| assignment.value.clone())
            .collect::<Vec<_>>();
        let mut predicate = predicate.cloned();
        number_anonymous_placeholders(values.iter_mut().chain(predicate.iter_mut()))?;

        let targets = assignments
            .iter()
            .map(|assignment| assignment_column(entity, assignment))
            .collect::<Result<Vec<_>, _>>()?;
        let id_insert = compile_id_capture(model, entity, &id_table, predicate.as_ref(), compiler)?;

        let mut table_statements = Vec::new();
        for mapping in entity.constraint_ordered_table_closure()? {
            let mut parameters = ParameterCollector::new(dialect);
            let mut resolver = TableColumnResolver::new(model, entity, [mapping.table.as_str()]);
            let mut set_list = Vec::new();
            for (column, value) in targets.iter().zip(&values) {
                if column.table != mapping.table {
                    continue;
                }
                let value = compiler.compile_expression(value, &mut resolver, &mut parameters)?;
                set_list.push(format!("{} = {value}", column.name));
            }
            if set_list.is_empty() {
                continue;
            }
            let restriction = id_table.key_restriction(&mapping.table, &mapping.key_columns)?;
            table_statements.push(PhysicalStatement::new(
                format!(
                    "update {} set {} where {restriction}",
                    mapping.table,
                    set_list.join(", ")
                ),
                parameters.into_specifications(),
            ));
        }

        Ok(Self {
            execution: TableBasedExecution {
                entity_name: entity.name.clone(),
                id_table,
                id_insert,
                table_statements,
                invalidation: BulkInvalidation::for_entity(model, entity),
                config: config.clone(),
            },
        })
    }

    pub fn id_table(&self) -> &IdTable {
        &self.execution.id_table
    }
}

/// The single column an assignment writes.
pub(crate) fn assignment_column(
    entity: &EntityDescriptor,
    assignment: &Assignment,
) -> Result<PhysicalColumn, StrataError> {
    let attribute = entity
        .find_attribute(&assignment.attribute)
        .ok_or_else(|| errors::unknown_attribute_error(&entity.name, &assignment.attribute))?;
    if attribute.name == entity.identifier.name {
        return Err(errors::unsupported_mutation_error(&format!(
            "the identifier of `{}` cannot be assigned in a bulk update",
            entity.name
        )));
    }
    match attribute.selectable_columns().as_slice() {
        [column] => Ok(column.clone()),
        columns => Err(errors::unsupported_mutation_error(&format!(
            "`{}.{}` maps to {} columns; bulk updates assign single columns",
            entity.name,
            assignment.attribute,
            columns.len()
        ))),
    }
}

#[async_trait(?Send)]
impl StatementExecutor for TableBasedUpdateExecutor {
    fn entity_name(&self) -> &str {
        &self.execution.entity_name
    }

    fn sql_statements(&self) -> Vec<&str> {
        self.execution.sql_statements()
    }

    async fn execute(
        &self,
        backend: &dyn StrataBackend,
        parameters: &QueryParameters,
        context: &ExecutionContext<'_>,
    ) -> Result<u64, StrataError> {
        self.execution.run(backend, parameters, context).await
    }
}
