use sqlparser::ast::Expr;

use crate::errors;
use crate::sql::ast::parse_expression;
use crate::sql::query::CompiledSelect;
use crate::StrataError;

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub attribute: String,
    pub value: Expr,
}

/// A bulk statement against one entity, as written against the entity model.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkMutation {
    Delete {
        entity: String,
        predicate: Option<Expr>,
    },
    Update {
        entity: String,
        assignments: Vec<Assignment>,
        predicate: Option<Expr>,
    },
    InsertSelect {
        entity: String,
        attributes: Vec<String>,
        select: CompiledSelect,
    },
}

impl BulkMutation {
    pub fn delete(entity: impl Into<String>) -> Self {
        Self::Delete {
            entity: entity.into(),
            predicate: None,
        }
    }

    pub fn update(entity: impl Into<String>) -> Self {
        Self::Update {
            entity: entity.into(),
            assignments: Vec::new(),
            predicate: None,
        }
    }

    pub fn insert_select(
        entity: impl Into<String>,
        attributes: impl IntoIterator<Item = impl Into<String>>,
        select: CompiledSelect,
    ) -> Self {
        Self::InsertSelect {
            entity: entity.into(),
            attributes: attributes.into_iter().map(Into::into).collect(),
            select,
        }
    }

    /// Sets the where clause. Replaces an earlier one.
    pub fn filter(mut self, predicate: &str) -> Result<Self, StrataError> {
        let parsed = parse_expression(predicate)?;
        match &mut self {
            Self::Delete { predicate, .. } | Self::Update { predicate, .. } => {
                *predicate = Some(parsed);
            }
            Self::InsertSelect { .. } => {
                return Err(errors::unsupported_mutation_error(
                    "insert-select statements take their restriction from the select",
                ));
            }
        }
        Ok(self)
    }

    pub fn set(mut self, attribute: impl Into<String>, value: &str) -> Result<Self, StrataError> {
        let value = parse_expression(value)?;
        match &mut self {
            Self::Update { assignments, .. } => assignments.push(Assignment {
                attribute: attribute.into(),
                value,
            }),
            Self::Delete { .. } | Self::InsertSelect { .. } => {
                return Err(errors::unsupported_mutation_error(
                    "only update statements take assignments",
                ));
            }
        }
        Ok(self)
    }

    pub fn entity_name(&self) -> &str {
        match self {
            Self::Delete { entity, .. }
            | Self::Update { entity, .. }
            | Self::InsertSelect { entity, .. } => entity,
        }
    }

    pub fn predicate(&self) -> Option<&Expr> {
        match self {
            Self::Delete { predicate, .. } | Self::Update { predicate, .. } => predicate.as_ref(),
            Self::InsertSelect { .. } => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Delete { .. } => "delete",
            Self::Update { .. } => "update",
            Self::InsertSelect { .. } => "insert-select",
        }
    }
}
