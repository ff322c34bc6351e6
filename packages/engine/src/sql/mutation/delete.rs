use async_trait::async_trait;
use sqlparser::ast::Expr;

use super::cache::{BulkInvalidation, ExecutionContext};
use super::executor::{
    compile_id_capture, PhysicalStatement, StatementExecutor, TableBasedExecution,
};
use super::id_table::IdTable;
use crate::errors;
use crate::metadata::{AttributeKind, CollectionMapping, EntityDescriptor, Metamodel};
use crate::sql::parameters::{number_anonymous_placeholders, QueryParameters};
use crate::sql::predicate::WhereClauseCompiler;
use crate::{EngineConfig, SqlDialect, StrataBackend, StrataError};

/// Deletes a multi-table entity through its id table: collection tables and
/// dependent tables first, the root table last.
#[derive(Debug, Clone)]
pub struct TableBasedDeleteExecutor {
    execution: TableBasedExecution,
}

impl TableBasedDeleteExecutor {
    pub fn compile(
        model: &dyn Metamodel,
        entity: &EntityDescriptor,
        predicate: Option<&Expr>,
        dialect: SqlDialect,
        config: &EngineConfig,
        compiler: &dyn WhereClauseCompiler,
    ) -> Result<Self, StrataError> {
        let id_table = IdTable::for_entity(entity, config, dialect)?;
        let mut predicate = predicate.cloned();
        number_anonymous_placeholders(predicate.iter_mut())?;
        let id_insert = compile_id_capture(model, entity, &id_table, predicate.as_ref(), compiler)?;

        let mut table_statements = Vec::new();
        for attribute in entity.persistent_attributes() {
            if let AttributeKind::Collection(collection) = &attribute.kind {
                table_statements.push(collection_delete(entity, collection, &id_table)?);
            }
        }
        for mapping in entity.constraint_ordered_table_closure()? {
            let restriction = id_table.key_restriction(&mapping.table, &mapping.key_columns)?;
            table_statements.push(PhysicalStatement::new(
                format!("delete from {} where {restriction}", mapping.table),
                Vec::new(),
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

/// Collection rows keyed by the owner identifier are matched against the id
/// table directly. Rows keyed by a property-ref go through the owner table.
fn collection_delete(
    entity: &EntityDescriptor,
    collection: &CollectionMapping,
    id_table: &IdTable,
) -> Result<PhysicalStatement, StrataError> {
    let key_columns = collection
        .key_columns
        .iter()
        .map(|column| column.name.clone())
        .collect::<Vec<_>>();
    let restriction = match &collection.property_ref {
        None => id_table.key_restriction(&collection.table, &key_columns)?,
        Some(property) => {
            let owner_columns = entity
                .find_attribute(property)
                .ok_or_else(|| errors::unknown_attribute_error(&entity.name, property))?
                .selectable_columns();
            if owner_columns.len() != key_columns.len() {
                return Err(errors::invalid_configuration_error(&format!(
                    "collection `{}` has {} key columns but `{property}` has {}",
                    collection.role,
                    key_columns.len(),
                    owner_columns.len()
                )));
            }
            let owner_table = owner_columns
                .first()
                .map(|column| column.table.clone())
                .unwrap_or_else(|| entity.root_table.name.clone());
            let owner_keys = entity.key_column_closure(&owner_table).ok_or_else(|| {
                errors::unresolved_table_binding_error(&owner_table, &entity.name)
            })?;
            let property_list = owner_columns
                .iter()
                .map(|column| column.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let lhs = match key_columns.as_slice() {
                [single] => single.clone(),
                _ => format!("({})", key_columns.join(", ")),
            };
            format!(
                "{lhs} in (select {property_list} from {owner_table} where {})",
                id_table.key_restriction(&owner_table, &owner_keys)?
            )
        }
    };
    Ok(PhysicalStatement::new(
        format!("delete from {} where {restriction}", collection.table),
        Vec::new(),
    ))
}

#[async_trait(?Send)]
impl StatementExecutor for TableBasedDeleteExecutor {
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
