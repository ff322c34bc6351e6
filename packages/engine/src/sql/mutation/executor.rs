use std::fmt;

use async_trait::async_trait;
use sqlparser::ast::Expr;
use tracing::debug;

use super::cache::{BulkInvalidation, ExecutionContext};
use super::id_table::IdTable;
use super::temp_table::{ensure_id_table, release_id_table};
use crate::errors;
use crate::metadata::{EntityDescriptor, Metamodel};
use crate::sql::from::FromClause;
use crate::sql::parameters::{
    bind_parameters, ParameterCollector, ParameterSpecification, QueryParameters,
};
use crate::sql::predicate::{QueryPathResolver, WhereClauseCompiler};
use crate::sql::render::render_from_clause;
use crate::{EngineConfig, QueryResult, StrataBackend, StrataError, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPhase {
    Start,
    TempTableEnsured,
    IdsCaptured,
    PerTableDmlApplied,
    TempTableCleaned,
    Done,
    Failed,
}

impl ExecutionPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::TempTableEnsured => "temp_table_ensured",
            Self::IdsCaptured => "ids_captured",
            Self::PerTableDmlApplied => "per_table_dml_applied",
            Self::TempTableCleaned => "temp_table_cleaned",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SQL text plus the parameters its placeholders bind, in textual order.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalStatement {
    pub sql: String,
    pub parameters: Vec<ParameterSpecification>,
}

impl PhysicalStatement {
    pub fn new(sql: impl Into<String>, parameters: Vec<ParameterSpecification>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }

    pub fn bind(&self, parameters: &QueryParameters) -> Result<Vec<Value>, StrataError> {
        bind_parameters(&self.parameters, parameters)
    }
}

/// A compiled bulk statement, executable any number of times.
#[async_trait(?Send)]
pub trait StatementExecutor {
    fn entity_name(&self) -> &str;

    /// Every statement an execution issues against entity tables, in order.
    fn sql_statements(&self) -> Vec<&str>;

    /// Returns the number of affected entities.
    async fn execute(
        &self,
        backend: &dyn StrataBackend,
        parameters: &QueryParameters,
        context: &ExecutionContext<'_>,
    ) -> Result<u64, StrataError>;
}

pub(crate) async fn execute_statement(
    backend: &dyn StrataBackend,
    statement: &PhysicalStatement,
    values: &[Value],
) -> Result<QueryResult, StrataError> {
    debug!(sql = %statement.sql, "executing bulk statement");
    backend
        .execute(&statement.sql, values)
        .await
        .map_err(|error| errors::statement_execution_error(&statement.sql, error))
}

fn enter_phase(entity: &str, phase: ExecutionPhase) {
    debug!(entity, phase = %phase, "bulk execution phase");
}

/// The shared temporary-table flow of multi-table deletes and updates:
/// capture ids, apply one statement per table, clean up.
#[derive(Debug, Clone)]
pub(crate) struct TableBasedExecution {
    pub(crate) entity_name: String,
    pub(crate) id_table: IdTable,
    pub(crate) id_insert: PhysicalStatement,
    pub(crate) table_statements: Vec<PhysicalStatement>,
    pub(crate) invalidation: BulkInvalidation,
    pub(crate) config: EngineConfig,
}

impl TableBasedExecution {
    pub(crate) fn sql_statements(&self) -> Vec<&str> {
        std::iter::once(self.id_insert.sql.as_str())
            .chain(self.table_statements.iter().map(|statement| statement.sql.as_str()))
            .collect()
    }

    pub(crate) async fn run(
        &self,
        backend: &dyn StrataBackend,
        parameters: &QueryParameters,
        context: &ExecutionContext<'_>,
    ) -> Result<u64, StrataError> {
        enter_phase(&self.entity_name, ExecutionPhase::Start);
        let id_values = self.id_insert.bind(parameters)?;
        let table_values = self
            .table_statements
            .iter()
            .map(|statement| statement.bind(parameters))
            .collect::<Result<Vec<_>, _>>()?;

        context.schedule_invalidation(self.invalidation.clone());

        ensure_id_table(backend, &self.id_table, &self.config).await;
        enter_phase(&self.entity_name, ExecutionPhase::TempTableEnsured);

        let outcome = self.apply(backend, &id_values, &table_values).await;

        release_id_table(backend, &self.id_table, &self.config).await;
        enter_phase(&self.entity_name, ExecutionPhase::TempTableCleaned);

        match &outcome {
            Ok(_) => enter_phase(&self.entity_name, ExecutionPhase::Done),
            Err(_) => enter_phase(&self.entity_name, ExecutionPhase::Failed),
        }
        outcome
    }

    async fn apply(
        &self,
        backend: &dyn StrataBackend,
        id_values: &[Value],
        table_values: &[Vec<Value>],
    ) -> Result<u64, StrataError> {
        // Secondary table row counts do not map onto entities, so the count
        // comes from the id capture.
        let affected = execute_statement(backend, &self.id_insert, id_values)
            .await?
            .rows_affected;
        enter_phase(&self.entity_name, ExecutionPhase::IdsCaptured);

        for (statement, values) in self.table_statements.iter().zip(table_values) {
            execute_statement(backend, statement, values).await?;
        }
        enter_phase(&self.entity_name, ExecutionPhase::PerTableDmlApplied);
        Ok(affected)
    }
}

/// `insert into <id table> (<ids>) select <aliased ids> from <entity tables>
/// where <subclass restriction> and (<user restriction>)`
pub(crate) fn compile_id_capture(
    model: &dyn Metamodel,
    entity: &EntityDescriptor,
    id_table: &IdTable,
    predicate: Option<&Expr>,
    compiler: &dyn WhereClauseCompiler,
) -> Result<PhysicalStatement, StrataError> {
    let mut from = FromClause::new();
    let root = from.add_root_entity(entity, None)?;
    let id_columns = from
        .table_group_mut(root)?
        .resolve_column_bindings(entity.identifier_columns())?;
    let root_alias = from
        .table_group(root)?
        .root_table_binding()?
        .identification_variable()
        .to_string();

    let mut parameters = ParameterCollector::new(id_table.dialect());
    let mut conditions = Vec::new();
    if let Some(fragment) = entity.where_join_fragment(&root_alias) {
        conditions.push(fragment);
    }
    if let Some(predicate) = predicate {
        let mut resolver = QueryPathResolver::new(&mut from, model, Some(root));
        let compiled = compiler.compile_where(predicate, &mut resolver, &mut parameters)?;
        conditions.push(format!("({})", compiled.condition()));
    }

    let select_list = id_columns
        .iter()
        .map(|binding| binding.render())
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "insert into {} ({}) select {select_list}{}",
        id_table.name(),
        id_table.column_list(),
        render_from_clause(&from)?
    );
    if !conditions.is_empty() {
        sql.push_str(" where ");
        sql.push_str(&conditions.join(" and "));
    }
    Ok(PhysicalStatement::new(sql, parameters.into_specifications()))
}
