use sqlparser::ast::Expr;
use tracing::debug;

use crate::errors;
use crate::metadata::{require_entity, Metamodel};
use crate::sql::ast::{conjunction, nested, parse_expression};
use crate::sql::from::{FromClause, JoinKind, TableGroupId};
use crate::sql::parameters::{
    bind_parameters, ParameterCollector, ParameterSpecification, QueryParameters,
};
use crate::sql::predicate::{resolve_attribute_path, QueryPathResolver, WhereClauseCompiler};
use crate::sql::render::render_from_clause;
use crate::sql::select::{QueryReturn, ReturnValue, SelectClause, Selectable, Selection};
use crate::{SqlDialect, StrataBackend, StrataError, Value};

/// Builds one select statement over the entity model.
pub struct SelectQuery<'m> {
    model: &'m dyn Metamodel,
    dialect: SqlDialect,
    from: FromClause,
    select: SelectClause,
    predicates: Vec<Expr>,
}

impl<'m> SelectQuery<'m> {
    pub fn new(model: &'m dyn Metamodel, dialect: SqlDialect) -> Self {
        Self {
            model,
            dialect,
            from: FromClause::new(),
            select: SelectClause::new(),
            predicates: Vec::new(),
        }
    }

    /// Adds a table space rooted at `entity`.
    pub fn from_entity(
        &mut self,
        entity: &str,
        alias: Option<&str>,
    ) -> Result<TableGroupId, StrataError> {
        let entity = require_entity(self.model, entity)?;
        self.from.add_root_entity(entity, alias)
    }

    pub fn join(
        &mut self,
        lhs: TableGroupId,
        attribute: &str,
        kind: JoinKind,
        alias: Option<&str>,
    ) -> Result<TableGroupId, StrataError> {
        self.from
            .add_entity_join(lhs, attribute, kind, self.model, alias)
    }

    pub fn join_collection(
        &mut self,
        lhs: TableGroupId,
        attribute: &str,
        kind: JoinKind,
        alias: Option<&str>,
    ) -> Result<TableGroupId, StrataError> {
        self.from
            .add_collection_join(lhs, attribute, kind, self.model, alias)
    }

    pub fn cross_join(
        &mut self,
        lhs: TableGroupId,
        entity: &str,
        alias: Option<&str>,
    ) -> Result<TableGroupId, StrataError> {
        let entity = require_entity(self.model, entity)?;
        self.from.add_cross_join(lhs, entity, alias)
    }

    pub fn select_entity(
        &mut self,
        group: TableGroupId,
        shallow: bool,
        alias: Option<&str>,
    ) -> Result<(), StrataError> {
        let table_group = self.from.table_group_mut(group)?;
        let entity_name = table_group.entity_name().ok_or_else(|| {
            errors::invalid_expression_error(&format!(
                "`{}` is not an entity reference",
                table_group.property_path()
            ))
        })?;
        let entity = require_entity(self.model, entity_name)?;
        let source = table_group.property_path().to_string();
        let selectable = Selectable::entity(table_group, entity, shallow)?;
        self.push_selection(selectable, source, alias)
    }

    /// Selects `alias`, `alias.attribute` or `attribute` of the first root.
    /// Entity references select the full entity.
    pub fn select_path(&mut self, path: &str, alias: Option<&str>) -> Result<(), StrataError> {
        let segments = path.split('.').map(str::to_string).collect::<Vec<_>>();
        let resolved = resolve_attribute_path(
            &self.from,
            self.model,
            self.from.primary_group(),
            &segments,
        )?;
        let group_is_entity = self.from.table_group(resolved.group)?.entity_name().is_some();
        match resolved.attribute {
            None if group_is_entity => self.select_entity(resolved.group, false, alias),
            None => {
                let group = self.from.table_group_mut(resolved.group)?;
                let bindings = group.resolve_column_bindings(&resolved.columns)?;
                let selectable = match <[_; 1]>::try_from(bindings) {
                    Ok([binding]) => Selectable::Scalar { binding },
                    Err(bindings) => Selectable::Composite {
                        embeddable: path.to_string(),
                        bindings,
                    },
                };
                self.push_selection(selectable, path.to_string(), alias)
            }
            Some(attribute) => {
                let group = self.from.table_group_mut(resolved.group)?;
                let selectable = Selectable::for_attribute(group, &attribute)?;
                self.push_selection(selectable, path.to_string(), alias)
            }
        }
    }

    pub fn distinct(&mut self) {
        self.select.set_distinct(true);
    }

    /// Adds a restriction. Several restrictions are combined with `and`.
    pub fn filter(&mut self, predicate: &str) -> Result<(), StrataError> {
        self.predicates.push(parse_expression(predicate)?);
        Ok(())
    }

    pub fn filter_expr(&mut self, predicate: Expr) {
        self.predicates.push(predicate);
    }

    pub fn from_clause(&self) -> &FromClause {
        &self.from
    }

    pub fn compile(mut self, compiler: &dyn WhereClauseCompiler) -> Result<CompiledSelect, StrataError> {
        if self.select.selections().is_empty() {
            return Err(errors::invalid_expression_error("select query selects nothing"));
        }
        let returns = self.select.finalize()?;

        let mut parameters = ParameterCollector::new(self.dialect);
        let mut restrictions = Vec::with_capacity(self.predicates.len());
        {
            let default_group = self.from.primary_group();
            let mut resolver = QueryPathResolver::new(&mut self.from, self.model, default_group);
            for predicate in &self.predicates {
                let compiled = compiler.compile_expression(predicate, &mut resolver, &mut parameters)?;
                restrictions.push(nested(compiled));
            }
        }
        restrictions.extend(self.discriminator_restrictions()?);

        let mut sql = self.select.render();
        sql.push_str(&render_from_clause(&self.from)?);
        if let Some(condition) = conjunction(restrictions) {
            sql.push_str(&format!(" where {condition}"));
        }
        Ok(CompiledSelect {
            sql,
            parameters: parameters.into_specifications(),
            column_count: self.select.sql_selections().len(),
            returns,
        })
    }

    fn push_selection(
        &mut self,
        selectable: Selectable,
        source: String,
        alias: Option<&str>,
    ) -> Result<(), StrataError> {
        let selection = Selection::new(selectable, source);
        let selection = match alias {
            Some(alias) => selection.with_alias(alias),
            None => selection,
        };
        self.select.add_selection(selection)
    }

    /// Subclass restrictions of table space roots and cross-joined entities.
    /// Joined entities carry theirs in the join predicate.
    fn discriminator_restrictions(&self) -> Result<Vec<Expr>, StrataError> {
        let mut groups = Vec::new();
        for space in self.from.table_spaces() {
            groups.push(space.root_group());
            groups.extend(
                space
                    .joined_groups()
                    .iter()
                    .filter(|join| join.kind() == JoinKind::Cross)
                    .map(|join| join.group()),
            );
        }
        let mut restrictions = Vec::new();
        for id in groups {
            let group = self.from.table_group(id)?;
            let Some(entity_name) = group.entity_name() else {
                continue;
            };
            let entity = require_entity(self.model, entity_name)?;
            let alias = group.root_table_binding()?.identification_variable();
            if let Some(fragment) = entity.where_join_fragment(alias) {
                restrictions.push(parse_expression(&fragment)?);
            }
        }
        Ok(restrictions)
    }
}

/// Executable select text plus what is needed to bind and read it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSelect {
    pub sql: String,
    pub parameters: Vec<ParameterSpecification>,
    pub returns: Vec<QueryReturn>,
    column_count: usize,
}

impl CompiledSelect {
    /// Number of columns in the select list.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn bind(&self, parameters: &QueryParameters) -> Result<Vec<Value>, StrataError> {
        bind_parameters(&self.parameters, parameters)
    }

    pub fn read_row(&self, row: &[Value]) -> Result<Vec<ReturnValue>, StrataError> {
        self.returns
            .iter()
            .map(|query_return| query_return.read(row))
            .collect()
    }

    pub async fn list(
        &self,
        backend: &dyn StrataBackend,
        parameters: &QueryParameters,
    ) -> Result<Vec<Vec<ReturnValue>>, StrataError> {
        let values = self.bind(parameters)?;
        debug!(sql = %self.sql, "executing select");
        let result = backend
            .execute(&self.sql, &values)
            .await
            .map_err(|error| errors::statement_execution_error(&self.sql, error))?;
        result
            .rows
            .iter()
            .map(|row| self.read_row(row))
            .collect()
    }
}
