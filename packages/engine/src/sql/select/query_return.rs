use crate::sql::from::ColumnBinding;
use crate::sql::reader::ValueReader;
use crate::StrataError;

/// A column binding's fixed slot in the rendered select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlSelection {
    position: usize,
    reader: ValueReader,
    expression: String,
}

impl SqlSelection {
    pub(crate) fn new(position: usize, binding: &ColumnBinding) -> Self {
        Self {
            position,
            reader: binding.reader(),
            expression: binding.render(),
        }
    }

    /// 0-based index into a result row.
    pub fn position(&self) -> usize {
        self.position
    }

    /// 1-based index, as result set APIs count columns.
    pub fn jdbc_position(&self) -> usize {
        self.position + 1
    }

    pub fn reader(&self) -> ValueReader {
        self.reader
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlSelectionGroup {
    /// The attribute contributes no columns to this query.
    Empty,
    Selections(Vec<SqlSelection>),
}

impl SqlSelectionGroup {
    pub fn selections(&self) -> &[SqlSelection] {
        match self {
            Self::Empty => &[],
            Self::Selections(selections) => selections,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selections().is_empty()
    }
}

/// Assigns each column binding its slot in the select list.
pub trait SqlSelectionResolver {
    fn resolve_sql_selection(&mut self, binding: &ColumnBinding)
        -> Result<SqlSelection, StrataError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeRole {
    Identifier,
    RowId,
    Discriminator,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeReturn {
    pub name: String,
    pub role: AttributeRole,
    pub selections: SqlSelectionGroup,
}

/// Describes how one selection is read back from a result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryReturn {
    Scalar {
        alias: Option<String>,
        selection: SqlSelection,
    },
    Composite {
        alias: Option<String>,
        embeddable: String,
        selections: SqlSelectionGroup,
    },
    Entity {
        alias: Option<String>,
        entity_name: String,
        shallow: bool,
        /// Identifier, row id, discriminator, then attributes in declaration
        /// order.
        attributes: Vec<AttributeReturn>,
    },
}

impl QueryReturn {
    pub fn alias(&self) -> Option<&str> {
        match self {
            Self::Scalar { alias, .. }
            | Self::Composite { alias, .. }
            | Self::Entity { alias, .. } => alias.as_deref(),
        }
    }

    /// Every select-list slot this return reads, in reading order.
    pub fn sql_selections(&self) -> Vec<&SqlSelection> {
        match self {
            Self::Scalar { selection, .. } => vec![selection],
            Self::Composite { selections, .. } => selections.selections().iter().collect(),
            Self::Entity { attributes, .. } => attributes
                .iter()
                .flat_map(|attribute| attribute.selections.selections())
                .collect(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeReturn> {
        match self {
            Self::Entity { attributes, .. } => {
                attributes.iter().find(|attribute| attribute.name == name)
            }
            _ => None,
        }
    }
}
