use async_trait::async_trait;
use sqlparser::ast::Expr;
use tracing::debug;

use super::cache::{BulkInvalidation, ExecutionContext};
use super::executor::{execute_statement, PhysicalStatement, StatementExecutor};
use super::statement::Assignment;
use super::update::assignment_column;
use crate::errors;
use crate::metadata::{AttributeKind, CollectionMapping, EntityDescriptor, Metamodel};
use crate::sql::parameters::{number_anonymous_placeholders, ParameterCollector, QueryParameters};
use crate::sql::predicate::{TableColumnResolver, WhereClauseCompiler};
use crate::sql::query::CompiledSelect;
use crate::{SqlDialect, StrataBackend, StrataError};

/// Runs a bulk statement against an entity stored in a single table, without
/// an id table.
#[derive(Debug, Clone)]
pub struct BasicExecutor {
    entity_name: String,
    statements: Vec<PhysicalStatement>,
    /// Index of the statement whose row count is reported.
    counted: usize,
    invalidation: BulkInvalidation,
}

struct RestrictionCompiler<'a> {
    model: &'a dyn Metamodel,
    entity: &'a EntityDescriptor,
    predicate: Option<&'a Expr>,
    compiler: &'a dyn WhereClauseCompiler,
}

impl RestrictionCompiler<'_> {
    /// `" where <subclass restriction> and (<user restriction>)"`, or empty.
    fn compile(&self, parameters: &mut ParameterCollector) -> Result<String, StrataError> {
        let table = self.entity.root_table.name.as_str();
        let mut conditions = Vec::new();
        if let Some(fragment) = self.entity.where_join_fragment(table) {
            conditions.push(fragment);
        }
        if let Some(predicate) = self.predicate {
            let mut resolver = TableColumnResolver::new(self.model, self.entity, [table]);
            let compiled = self.compiler.compile_where(predicate, &mut resolver, parameters)?;
            conditions.push(format!("({})", compiled.condition()));
        }
        if conditions.is_empty() {
            return Ok(String::new());
        }
        Ok(format!(" where {}", conditions.join(" and ")))
    }
}

impl BasicExecutor {
    pub fn compile_delete(
        model: &dyn Metamodel,
        entity: &EntityDescriptor,
        predicate: Option<&Expr>,
        dialect: SqlDialect,
        compiler: &dyn WhereClauseCompiler,
    ) -> Result<Self, StrataError> {
        let mut predicate = predicate.cloned();
        number_anonymous_placeholders(predicate.iter_mut())?;
        let restriction = RestrictionCompiler {
            model,
            entity,
            predicate: predicate.as_ref(),
            compiler,
        };

        let mut statements = Vec::new();
        for attribute in entity.persistent_attributes() {
            if let AttributeKind::Collection(collection) = &attribute.kind {
                statements.push(collection_delete(entity, collection, &restriction, dialect)?);
            }
        }
        let mut parameters = ParameterCollector::new(dialect);
        let sql = format!(
            "delete from {}{}",
            entity.root_table.name,
            restriction.compile(&mut parameters)?
        );
        statements.push(PhysicalStatement::new(sql, parameters.into_specifications()));

        Ok(Self {
            entity_name: entity.name.clone(),
            counted: statements.len() - 1,
            statements,
            invalidation: BulkInvalidation::for_entity(model, entity),
        })
    }

    pub fn compile_update(
        model: &dyn Metamodel,
        entity: &EntityDescriptor,
        assignments: &[Assignment],
        predicate: Option<&Expr>,
        dialect: SqlDialect,
        compiler: &dyn WhereClauseCompiler,
    ) -> Result<Self, StrataError> {
        if assignments.is_empty() {
            return Err(errors::unsupported_mutation_error(&format!(
                "update of `{}` assigns nothing",
                entity.name
            )));
        }
        let mut values = assignments
            .iter()
            .map(|assignment| assignment.value.clone())
            .collect::<Vec<_>>();
        let mut predicate = predicate.cloned();
        number_anonymous_placeholders(values.iter_mut().chain(predicate.iter_mut()))?;

        let table = entity.root_table.name.as_str();
        let mut parameters = ParameterCollector::new(dialect);
        let mut resolver = TableColumnResolver::new(model, entity, [table]);
        let mut set_list = Vec::with_capacity(assignments.len());
        for (assignment, value) in assignments.iter().zip(&values) {
            let column = assignment_column(entity, assignment)?;
            let value = compiler.compile_expression(value, &mut resolver, &mut parameters)?;
            set_list.push(format!("{} = {value}", column.name));
        }
        let restriction = RestrictionCompiler {
            model,
            entity,
            predicate: predicate.as_ref(),
            compiler,
        }
        .compile(&mut parameters)?;
        let sql = format!("update {table} set {}{restriction}", set_list.join(", "));

        Ok(Self {
            entity_name: entity.name.clone(),
            statements: vec![PhysicalStatement::new(sql, parameters.into_specifications())],
            counted: 0,
            invalidation: BulkInvalidation::for_entity(model, entity),
        })
    }

    /// `insert into <table> (<columns>) <select>`; the select supplies one
    /// column per target attribute column, in order.
    pub fn compile_insert_select(
        model: &dyn Metamodel,
        entity: &EntityDescriptor,
        attributes: &[String],
        select: &CompiledSelect,
    ) -> Result<Self, StrataError> {
        if attributes.is_empty() {
            return Err(errors::unsupported_mutation_error(&format!(
                "insert into `{}` names no attributes",
                entity.name
            )));
        }
        let table = entity.root_table.name.as_str();
        let mut columns = Vec::new();
        for name in attributes {
            let attribute = entity
                .find_attribute(name)
                .ok_or_else(|| errors::unknown_attribute_error(&entity.name, name))?;
            if matches!(attribute.kind, AttributeKind::Collection(_)) {
                return Err(errors::unsupported_mutation_error(&format!(
                    "collection `{}.{name}` cannot be an insert target",
                    entity.name
                )));
            }
            for column in attribute.selectable_columns() {
                if column.table != table {
                    return Err(errors::unsupported_mutation_error(&format!(
                        "`{}.{name}` is stored in `{}`, not in `{table}`",
                        entity.name, column.table
                    )));
                }
                columns.push(column.name);
            }
        }
        if columns.len() != select.column_count() {
            return Err(errors::invalid_expression_error(&format!(
                "insert into `{}` targets {} columns but the select returns {}",
                entity.name,
                columns.len(),
                select.column_count()
            )));
        }
        let sql = format!("insert into {table} ({}) {}", columns.join(", "), select.sql);

        Ok(Self {
            entity_name: entity.name.clone(),
            statements: vec![PhysicalStatement::new(sql, select.parameters.clone())],
            counted: 0,
            invalidation: BulkInvalidation::for_entity(model, entity),
        })
    }
}

/// Collection rows of the owners the restriction selects, matched through a
/// subquery on the owner table.
fn collection_delete(
    entity: &EntityDescriptor,
    collection: &CollectionMapping,
    restriction: &RestrictionCompiler<'_>,
    dialect: SqlDialect,
) -> Result<PhysicalStatement, StrataError> {
    let owner_columns = match &collection.property_ref {
        None => entity.identifier_columns().to_vec(),
        Some(property) => entity
            .find_attribute(property)
            .ok_or_else(|| errors::unknown_attribute_error(&entity.name, property))?
            .selectable_columns(),
    };
    if owner_columns.len() != collection.key_columns.len() {
        return Err(errors::invalid_configuration_error(&format!(
            "collection `{}` has {} key columns but its owner key has {}",
            collection.role,
            collection.key_columns.len(),
            owner_columns.len()
        )));
    }
    let key_list = collection
        .key_columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>();
    let owner_list = owner_columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let lhs = match key_list.as_slice() {
        [single] => single.to_string(),
        _ if dialect.supports_row_value_constructor() => format!("({})", key_list.join(", ")),
        _ => {
            return Err(errors::unsupported_mutation_error(&format!(
                "{} cannot match the composite key of `{}`",
                dialect.name(),
                collection.role
            )))
        }
    };

    let mut parameters = ParameterCollector::new(dialect);
    let sql = format!(
        "delete from {} where {lhs} in (select {owner_list} from {}{})",
        collection.table,
        entity.root_table.name,
        restriction.compile(&mut parameters)?
    );
    Ok(PhysicalStatement::new(sql, parameters.into_specifications()))
}

#[async_trait(?Send)]
impl StatementExecutor for BasicExecutor {
    fn entity_name(&self) -> &str {
        &self.entity_name
    }

    fn sql_statements(&self) -> Vec<&str> {
        self.statements
            .iter()
            .map(|statement| statement.sql.as_str())
            .collect()
    }

    async fn execute(
        &self,
        backend: &dyn StrataBackend,
        parameters: &QueryParameters,
        context: &ExecutionContext<'_>,
    ) -> Result<u64, StrataError> {
        let values = self
            .statements
            .iter()
            .map(|statement| statement.bind(parameters))
            .collect::<Result<Vec<_>, _>>()?;
        context.schedule_invalidation(self.invalidation.clone());

        let mut affected = 0;
        for (index, (statement, values)) in self.statements.iter().zip(&values).enumerate() {
            let result = execute_statement(backend, statement, values).await?;
            if index == self.counted {
                affected = result.rows_affected;
            }
        }
        debug!(entity = %self.entity_name, affected, "bulk statement applied");
        Ok(affected)
    }
}
