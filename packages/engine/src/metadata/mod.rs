//! Read-only object/relational mapping model consulted by the compiler.

mod entity;
mod metamodel;

use serde::{Deserialize, Serialize};

pub use entity::{
    AttributeKind, AttributeMapping, CollectionMapping, DiscriminatorMapping, EntityDescriptor,
    TableMapping,
};
pub use metamodel::{affected_entity_names, require_entity, Metamodel, StaticMetamodel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Blob,
    Boolean,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhysicalColumn {
    pub table: String,
    pub name: String,
    pub sql_type: SqlType,
}

impl PhysicalColumn {
    pub fn new(table: impl Into<String>, name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            sql_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalTable {
    pub name: String,
    /// Subclass tables this table stands in for when the hierarchy is mapped
    /// as a union of subclass tables.
    #[serde(default)]
    pub union_members: Vec<String>,
    /// SQL rendered in place of the table name, wrapped in parentheses.
    #[serde(default)]
    pub subquery: Option<String>,
}

impl PhysicalTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            union_members: Vec::new(),
            subquery: None,
        }
    }

    pub fn union_of(
        name: impl Into<String>,
        members: impl IntoIterator<Item = impl Into<String>>,
        subquery: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            union_members: members.into_iter().map(Into::into).collect(),
            subquery: Some(subquery.into()),
        }
    }

    pub fn is_union(&self) -> bool {
        !self.union_members.is_empty()
    }

    pub fn includes(&self, table: &str) -> bool {
        self.name == table || self.union_members.iter().any(|member| member == table)
    }
}
