use std::collections::BTreeMap;
use std::fmt;
use std::ops::ControlFlow;

use sqlparser::ast::{Expr, Value as SqlValue, VisitMut, VisitorMut};

use crate::errors;
use crate::{SqlDialect, StrataError, Value};

/// Where a parameter value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterKey {
    /// 0-based index into the positional values.
    Positional(usize),
    Named(String),
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positional(index) => write!(f, "?{}", index + 1),
            Self::Named(name) => write!(f, ":{name}"),
        }
    }
}

/// One placeholder emitted into generated SQL, in textual order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSpecification {
    key: ParameterKey,
    position: usize,
}

impl ParameterSpecification {
    pub fn key(&self) -> &ParameterKey {
        &self.key
    }

    /// 1-based position of the placeholder within its statement.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Parameter values supplied for one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParameters {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(values: impl IntoIterator<Item = Value>) -> Self {
        Self {
            positional: values.into_iter().collect(),
            named: BTreeMap::new(),
        }
    }

    pub fn with_positional(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    pub fn get(&self, key: &ParameterKey) -> Option<&Value> {
        match key {
            ParameterKey::Positional(index) => self.positional.get(*index),
            ParameterKey::Named(name) => self.named.get(name),
        }
    }
}

/// Values in placeholder order. Fails on the first missing value.
pub fn bind_parameters(
    specifications: &[ParameterSpecification],
    parameters: &QueryParameters,
) -> Result<Vec<Value>, StrataError> {
    specifications
        .iter()
        .map(|specification| {
            parameters
                .get(&specification.key)
                .cloned()
                .ok_or_else(|| errors::unbound_parameter_error(&specification.key.to_string()))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PlaceholderState {
    next_ordinal: usize,
}

impl PlaceholderState {
    pub(crate) fn new() -> Self {
        Self { next_ordinal: 0 }
    }
}

/// Collects the placeholders of one physical statement and rewrites them into
/// the dialect's syntax.
#[derive(Debug, Clone)]
pub struct ParameterCollector {
    dialect: SqlDialect,
    state: PlaceholderState,
    specifications: Vec<ParameterSpecification>,
}

impl ParameterCollector {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            state: PlaceholderState::new(),
            specifications: Vec::new(),
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn len(&self) -> usize {
        self.specifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specifications.is_empty()
    }

    pub fn specifications(&self) -> &[ParameterSpecification] {
        &self.specifications
    }

    pub fn into_specifications(self) -> Vec<ParameterSpecification> {
        self.specifications
    }

    /// Records a source placeholder and returns the text that replaces it.
    pub fn register(&mut self, token: &str) -> Result<String, StrataError> {
        let key = resolve_placeholder_key(token, &mut self.state)?;
        let position = self.specifications.len() + 1;
        self.specifications
            .push(ParameterSpecification { key, position });
        Ok(self.dialect.placeholder(position))
    }
}

fn resolve_placeholder_key(
    token: &str,
    state: &mut PlaceholderState,
) -> Result<ParameterKey, StrataError> {
    let trimmed = token.trim();
    if trimmed.is_empty() || trimmed == "?" {
        let index = state.next_ordinal;
        state.next_ordinal += 1;
        return Ok(ParameterKey::Positional(index));
    }
    if let Some(numeric) = trimmed.strip_prefix('?').or_else(|| trimmed.strip_prefix('$')) {
        let parsed = parse_1_based_index(trimmed, numeric)?;
        state.next_ordinal = state.next_ordinal.max(parsed);
        return Ok(ParameterKey::Positional(parsed - 1));
    }
    if let Some(name) = trimmed.strip_prefix(':') {
        if !name.is_empty() && name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Ok(ParameterKey::Named(name.to_string()));
        }
    }
    Err(errors::invalid_expression_error(&format!(
        "unsupported SQL placeholder format '{trimmed}'"
    )))
}

fn parse_1_based_index(token: &str, numeric: &str) -> Result<usize, StrataError> {
    let parsed = numeric.parse::<usize>().map_err(|_| {
        errors::invalid_expression_error(&format!("invalid SQL placeholder '{token}'"))
    })?;
    if parsed == 0 {
        return Err(errors::invalid_expression_error(&format!(
            "invalid SQL placeholder '{token}': parameter numbers start at 1"
        )));
    }
    Ok(parsed)
}

/// Gives every anonymous `?` in `expressions` an explicit number, in the order
/// the expressions are passed. A logical statement split over several physical
/// statements keeps binding the same values that way.
pub(crate) fn number_anonymous_placeholders<'e>(
    expressions: impl IntoIterator<Item = &'e mut Expr>,
) -> Result<(), StrataError> {
    let mut numberer = PlaceholderNumberer {
        state: PlaceholderState::new(),
    };
    for expression in expressions {
        if let ControlFlow::Break(error) = expression.visit(&mut numberer) {
            return Err(error);
        }
    }
    Ok(())
}

struct PlaceholderNumberer {
    state: PlaceholderState,
}

impl VisitorMut for PlaceholderNumberer {
    type Break = StrataError;

    fn pre_visit_value(&mut self, value: &mut SqlValue) -> ControlFlow<Self::Break> {
        let SqlValue::Placeholder(token) = value else {
            return ControlFlow::Continue(());
        };
        match resolve_placeholder_key(token, &mut self.state) {
            Ok(ParameterKey::Positional(index)) => {
                *value = SqlValue::Placeholder(format!("?{}", index + 1));
                ControlFlow::Continue(())
            }
            Ok(ParameterKey::Named(_)) => ControlFlow::Continue(()),
            Err(error) => ControlFlow::Break(error),
        }
    }
}
