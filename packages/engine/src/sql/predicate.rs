use std::ops::ControlFlow;

use sqlparser::ast::{Expr, Ident, Value as SqlValue, VisitMut, VisitorMut};

use crate::errors;
use crate::metadata::{
    require_entity, AttributeKind, AttributeMapping, EntityDescriptor, Metamodel, PhysicalColumn,
};
use crate::sql::from::{FromClause, TableGroupId, TableGroupKind};
use crate::sql::parameters::{ParameterCollector, ParameterSpecification};
use crate::StrataError;

/// Turns attribute paths found in an expression into SQL column references.
pub trait PathResolver {
    fn resolve_path(&mut self, segments: &[String]) -> Result<Expr, StrataError>;
}

/// What an attribute path of a query points at.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPath {
    pub group: TableGroupId,
    /// `None` when the path names the table group itself.
    pub attribute: Option<AttributeMapping>,
    pub columns: Vec<PhysicalColumn>,
}

/// Resolves `alias.attribute.component` paths against the table groups of a
/// from clause. Paths without a known identification variable start at the
/// default group.
pub struct QueryPathResolver<'a> {
    from: &'a mut FromClause,
    model: &'a dyn Metamodel,
    default_group: Option<TableGroupId>,
}

impl<'a> QueryPathResolver<'a> {
    pub fn new(
        from: &'a mut FromClause,
        model: &'a dyn Metamodel,
        default_group: Option<TableGroupId>,
    ) -> Self {
        Self {
            from,
            model,
            default_group,
        }
    }

    pub fn resolve_attribute_path(&self, segments: &[String]) -> Result<ResolvedPath, StrataError> {
        resolve_attribute_path(&*self.from, self.model, self.default_group, segments)
    }
}

impl PathResolver for QueryPathResolver<'_> {
    fn resolve_path(&mut self, segments: &[String]) -> Result<Expr, StrataError> {
        let resolved = self.resolve_attribute_path(segments)?;
        let bindings = self
            .from
            .table_group_mut(resolved.group)?
            .resolve_column_bindings(&resolved.columns)?;
        let mut expressions = bindings
            .iter()
            .map(|binding| binding.to_expr())
            .collect::<Vec<_>>();
        match expressions.len() {
            0 => Err(errors::invalid_expression_error(&format!(
                "`{}` has no columns to compare",
                segments.join(".")
            ))),
            1 => Ok(expressions.remove(0)),
            _ => Ok(Expr::Tuple(expressions)),
        }
    }
}

pub fn resolve_attribute_path(
    from: &FromClause,
    model: &dyn Metamodel,
    default_group: Option<TableGroupId>,
    segments: &[String],
) -> Result<ResolvedPath, StrataError> {
    let (group_id, rest) = match segments.split_first() {
        Some((head, tail)) => match from.find_by_identification_variable(head) {
            Some(group) => (group, tail),
            None => (
                default_group.ok_or_else(|| {
                    errors::invalid_expression_error(&format!(
                        "`{}` does not start with a known identification variable",
                        segments.join(".")
                    ))
                })?,
                segments,
            ),
        },
        None => {
            return Err(errors::invalid_expression_error("empty attribute path"));
        }
    };
    let group = from.table_group(group_id)?;

    let entity_name = match group.kind() {
        TableGroupKind::Entity { entity_name } => entity_name,
        TableGroupKind::Collection { role, owner_entity } => {
            return resolve_collection_path(model, group_id, role, owner_entity, rest);
        }
    };
    let entity = require_entity(model, entity_name)?;
    if rest.is_empty() {
        return Ok(ResolvedPath {
            group: group_id,
            attribute: None,
            columns: entity.identifier_columns().to_vec(),
        });
    }
    let attribute = walk_attribute(model, entity, rest)?;
    Ok(ResolvedPath {
        group: group_id,
        columns: attribute.selectable_columns(),
        attribute: Some(attribute),
    })
}

fn walk_attribute(
    model: &dyn Metamodel,
    entity: &EntityDescriptor,
    path: &[String],
) -> Result<AttributeMapping, StrataError> {
    let full_path = path.join(".");
    let Some((head, tail)) = path.split_first() else {
        return Err(errors::unknown_attribute_error(&entity.name, &full_path));
    };
    let mut current = entity
        .find_attribute(head)
        .ok_or_else(|| errors::unknown_attribute_error(&entity.name, &full_path))?
        .clone();

    let mut remaining = tail;
    while let Some((segment, rest)) = remaining.split_first() {
        current = match &current.kind {
            AttributeKind::Embedded { .. } => current
                .component(segment)
                .ok_or_else(|| errors::unknown_attribute_error(&entity.name, &full_path))?
                .clone(),
            AttributeKind::ToOne { target } => {
                let target = require_entity(model, target)?;
                // The foreign key already holds the target identifier.
                if target.identifier.name == *segment && rest.is_empty() {
                    AttributeMapping {
                        name: format!("{}.{}", current.name, segment),
                        ..current.clone()
                    }
                } else {
                    return Err(errors::invalid_expression_error(&format!(
                        "`{full_path}` needs an explicit join on `{}`",
                        current.name
                    )));
                }
            }
            AttributeKind::Basic | AttributeKind::Collection(_) => {
                return Err(errors::invalid_expression_error(&format!(
                    "`{full_path}` cannot be dereferenced past `{}`",
                    current.name
                )));
            }
        };
        remaining = rest;
    }
    if matches!(current.kind, AttributeKind::Collection(_)) {
        return Err(errors::invalid_expression_error(&format!(
            "collection `{full_path}` must be joined before it can be referenced"
        )));
    }
    Ok(current)
}

fn resolve_collection_path(
    model: &dyn Metamodel,
    group: TableGroupId,
    role: &str,
    owner_entity: &str,
    rest: &[String],
) -> Result<ResolvedPath, StrataError> {
    let owner = require_entity(model, owner_entity)?;
    let collection = owner
        .persistent_attributes()
        .find_map(|attribute| match &attribute.kind {
            AttributeKind::Collection(mapping) if mapping.role == role => Some(mapping),
            _ => None,
        })
        .ok_or_else(|| errors::unknown_attribute_error(&owner.name, role))?;
    let columns = match rest {
        [] => collection.element_columns.clone(),
        [column] => collection
            .element_columns
            .iter()
            .chain(&collection.key_columns)
            .filter(|candidate| candidate.name == *column)
            .cloned()
            .collect::<Vec<_>>(),
        _ => Vec::new(),
    };
    if columns.is_empty() {
        return Err(errors::unknown_attribute_error(role, &rest.join(".")));
    }
    Ok(ResolvedPath {
        group,
        attribute: None,
        columns,
    })
}

/// Resolves attribute names to unqualified columns of the entity's tables,
/// for statements that target a table directly.
pub struct TableColumnResolver<'a> {
    model: &'a dyn Metamodel,
    entity: &'a EntityDescriptor,
    tables: Vec<String>,
}

impl<'a> TableColumnResolver<'a> {
    pub fn new(
        model: &'a dyn Metamodel,
        entity: &'a EntityDescriptor,
        tables: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            model,
            entity,
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }
}

impl PathResolver for TableColumnResolver<'_> {
    fn resolve_path(&mut self, segments: &[String]) -> Result<Expr, StrataError> {
        let columns = walk_attribute(self.model, self.entity, segments)?.selectable_columns();
        if let Some(foreign) = columns
            .iter()
            .find(|column| !self.tables.iter().any(|table| *table == column.table))
        {
            return Err(errors::unsupported_mutation_error(&format!(
                "`{}` is stored in `{}`, which this statement does not target",
                segments.join("."),
                foreign.table
            )));
        }
        let mut expressions = columns
            .iter()
            .map(|column| Expr::Identifier(Ident::new(column.name.as_str())))
            .collect::<Vec<_>>();
        match expressions.len() {
            0 => Err(errors::invalid_expression_error(&format!(
                "`{}` has no columns",
                segments.join(".")
            ))),
            1 => Ok(expressions.remove(0)),
            _ => Ok(Expr::Tuple(expressions)),
        }
    }
}

/// Generated where clause text, prefixed with `" where "`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledWhere {
    pub sql: String,
    pub parameters: Vec<ParameterSpecification>,
}

impl CompiledWhere {
    /// The condition without the leading `" where "`.
    pub fn condition(&self) -> &str {
        self.sql.strip_prefix(" where ").unwrap_or(&self.sql)
    }
}

pub trait WhereClauseCompiler {
    /// Rewrites paths and placeholders of `expression` into executable SQL.
    fn compile_expression(
        &self,
        expression: &Expr,
        resolver: &mut dyn PathResolver,
        parameters: &mut ParameterCollector,
    ) -> Result<Expr, StrataError>;

    fn compile_where(
        &self,
        predicate: &Expr,
        resolver: &mut dyn PathResolver,
        parameters: &mut ParameterCollector,
    ) -> Result<CompiledWhere, StrataError> {
        let first = parameters.len();
        let condition = self.compile_expression(predicate, resolver, parameters)?;
        Ok(CompiledWhere {
            sql: format!(" where {condition}"),
            parameters: parameters.specifications()[first..].to_vec(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardWhereCompiler;

impl WhereClauseCompiler for StandardWhereCompiler {
    fn compile_expression(
        &self,
        expression: &Expr,
        resolver: &mut dyn PathResolver,
        parameters: &mut ParameterCollector,
    ) -> Result<Expr, StrataError> {
        let mut rewritten = expression.clone();
        let mut rewriter = ExpressionRewriter {
            resolver,
            parameters,
        };
        if let ControlFlow::Break(error) = rewritten.visit(&mut rewriter) {
            return Err(error);
        }
        Ok(rewritten)
    }
}

struct ExpressionRewriter<'r> {
    resolver: &'r mut dyn PathResolver,
    parameters: &'r mut ParameterCollector,
}

impl VisitorMut for ExpressionRewriter<'_> {
    type Break = StrataError;

    fn pre_visit_value(&mut self, value: &mut SqlValue) -> ControlFlow<Self::Break> {
        let SqlValue::Placeholder(token) = value else {
            return ControlFlow::Continue(());
        };
        match self.parameters.register(token) {
            Ok(placeholder) => {
                *value = SqlValue::Placeholder(placeholder);
                ControlFlow::Continue(())
            }
            Err(error) => ControlFlow::Break(error),
        }
    }

    fn post_visit_expr(&mut self, expr: &mut Expr) -> ControlFlow<Self::Break> {
        let segments = match expr {
            Expr::Identifier(ident) => vec![ident.value.clone()],
            Expr::CompoundIdentifier(idents) => {
                idents.iter().map(|ident| ident.value.clone()).collect()
            }
            _ => return ControlFlow::Continue(()),
        };
        match self.resolver.resolve_path(&segments) {
            Ok(resolved) => {
                *expr = resolved;
                ControlFlow::Continue(())
            }
            Err(error) => ControlFlow::Break(error),
        }
    }
}
