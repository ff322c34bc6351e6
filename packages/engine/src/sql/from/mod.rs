mod column_binding;
mod from_clause;
mod join;
mod table_binding;
mod table_group;

use std::fmt;

pub use column_binding::ColumnBinding;
pub use from_clause::{FromClause, TableSpace};
pub use join::{column_equality_predicate, JoinKind, TableGroupJoin, TableJoin};
pub use table_binding::TableBinding;
pub use table_group::{TableGroup, TableGroupKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableGroupId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableSpaceId(pub(crate) usize);

/// Attribute path from a query root to the reference a table group represents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    root: String,
    segments: Vec<String>,
}

impl PropertyPath {
    pub fn root(entity_name: impl Into<String>) -> Self {
        Self {
            root: entity_name.into(),
            segments: Vec::new(),
        }
    }

    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self {
            root: self.root.clone(),
            segments,
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}
