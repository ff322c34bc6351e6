use serde::{Deserialize, Serialize};

use super::{PhysicalColumn, PhysicalTable};
use crate::errors;
use crate::StrataError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeKind {
    Basic,
    Embedded {
        embeddable: String,
        components: Vec<AttributeMapping>,
    },
    /// Columns of the owning attribute are the foreign key columns.
    ToOne { target: String },
    Collection(CollectionMapping),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMapping {
    pub role: String,
    pub table: String,
    /// Columns of the collection table referencing the owner.
    pub key_columns: Vec<PhysicalColumn>,
    #[serde(default)]
    pub element_columns: Vec<PhysicalColumn>,
    /// Owner attribute the key references instead of the identifier.
    #[serde(default)]
    pub property_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMapping {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<PhysicalColumn>,
    #[serde(flatten)]
    pub kind: AttributeKind,
    #[serde(default)]
    pub transient: bool,
}

impl AttributeMapping {
    pub fn basic(name: impl Into<String>, column: PhysicalColumn) -> Self {
        Self {
            name: name.into(),
            columns: vec![column],
            kind: AttributeKind::Basic,
            transient: false,
        }
    }

    pub fn composite_id(name: impl Into<String>, columns: Vec<PhysicalColumn>) -> Self {
        Self {
            name: name.into(),
            columns,
            kind: AttributeKind::Basic,
            transient: false,
        }
    }

    pub fn embedded(
        name: impl Into<String>,
        embeddable: impl Into<String>,
        components: Vec<AttributeMapping>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            kind: AttributeKind::Embedded {
                embeddable: embeddable.into(),
                components,
            },
            transient: false,
        }
    }

    pub fn to_one(
        name: impl Into<String>,
        target: impl Into<String>,
        columns: Vec<PhysicalColumn>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            kind: AttributeKind::ToOne {
                target: target.into(),
            },
            transient: false,
        }
    }

    pub fn collection(name: impl Into<String>, mapping: CollectionMapping) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            kind: AttributeKind::Collection(mapping),
            transient: false,
        }
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn component(&self, name: &str) -> Option<&AttributeMapping> {
        match &self.kind {
            AttributeKind::Embedded { components, .. } => components
                .iter()
                .find(|component| component.name == name && !component.transient),
            _ => None,
        }
    }

    /// Columns this attribute reads directly from its owner's tables, in
    /// declaration order. Collections contribute none.
    pub fn selectable_columns(&self) -> Vec<PhysicalColumn> {
        match &self.kind {
            AttributeKind::Basic | AttributeKind::ToOne { .. } => self.columns.clone(),
            AttributeKind::Embedded { components, .. } => components
                .iter()
                .filter(|component| !component.transient)
                .flat_map(AttributeMapping::selectable_columns)
                .collect(),
            AttributeKind::Collection(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMapping {
    pub table: String,
    pub key_columns: Vec<String>,
    /// Table whose key this table's key references. `None` means the root table.
    #[serde(default)]
    pub references: Option<String>,
    /// Rows may be absent, so reads use an outer join.
    #[serde(default)]
    pub optional: bool,
}

impl TableMapping {
    pub fn new(
        table: impl Into<String>,
        key_columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            table: table.into(),
            key_columns: key_columns.into_iter().map(Into::into).collect(),
            references: None,
            optional: false,
        }
    }

    pub fn references(mut self, table: impl Into<String>) -> Self {
        self.references = Some(table.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscriminatorMapping {
    pub column: PhysicalColumn,
    pub value: String,
    /// Values a query against this entity must be limited to. Empty when the
    /// entity owns every row of its table.
    #[serde(default)]
    pub restrict_to: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub root_table: PhysicalTable,
    pub identifier: AttributeMapping,
    /// Secondary, superclass and subclass tables, each joined on its key columns.
    #[serde(default)]
    pub joined_tables: Vec<TableMapping>,
    #[serde(default)]
    pub row_id: Option<PhysicalColumn>,
    #[serde(default)]
    pub discriminator: Option<DiscriminatorMapping>,
    #[serde(default)]
    pub attributes: Vec<AttributeMapping>,
    #[serde(default)]
    pub super_entity: Option<String>,
    #[serde(default)]
    pub subclasses: Vec<String>,
}

impl EntityDescriptor {
    pub fn new(
        name: impl Into<String>,
        root_table: PhysicalTable,
        identifier: AttributeMapping,
    ) -> Self {
        Self {
            name: name.into(),
            root_table,
            identifier,
            joined_tables: Vec::new(),
            row_id: None,
            discriminator: None,
            attributes: Vec::new(),
            super_entity: None,
            subclasses: Vec::new(),
        }
    }

    pub fn with_joined_table(mut self, mapping: TableMapping) -> Self {
        self.joined_tables.push(mapping);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeMapping) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_row_id(mut self, column: PhysicalColumn) -> Self {
        self.row_id = Some(column);
        self
    }

    pub fn with_discriminator(mut self, discriminator: DiscriminatorMapping) -> Self {
        self.discriminator = Some(discriminator);
        self
    }

    pub fn with_super_entity(mut self, name: impl Into<String>) -> Self {
        self.super_entity = Some(name.into());
        self
    }

    pub fn with_subclass(mut self, name: impl Into<String>) -> Self {
        self.subclasses.push(name.into());
        self
    }

    pub fn identifier_columns(&self) -> &[PhysicalColumn] {
        &self.identifier.columns
    }

    pub fn is_union_root(&self) -> bool {
        self.root_table.is_union()
    }

    pub fn is_multi_table(&self) -> bool {
        !self.joined_tables.is_empty()
    }

    /// Non-transient attributes in declaration order.
    pub fn persistent_attributes(&self) -> impl Iterator<Item = &AttributeMapping> {
        self.attributes.iter().filter(|attribute| !attribute.transient)
    }

    pub fn find_attribute(&self, name: &str) -> Option<&AttributeMapping> {
        if self.identifier.name == name {
            return Some(&self.identifier);
        }
        self.persistent_attributes()
            .find(|attribute| attribute.name == name)
    }

    /// Every table backing the entity, root first.
    pub fn table_mappings(&self) -> Vec<TableMapping> {
        let root = TableMapping::new(
            self.root_table.name.clone(),
            self.identifier
                .columns
                .iter()
                .map(|column| column.name.clone()),
        );
        std::iter::once(root)
            .chain(self.joined_tables.iter().cloned())
            .collect()
    }

    /// Physical table names, including union members.
    pub fn physical_table_names(&self) -> Vec<String> {
        let mut names = vec![self.root_table.name.clone()];
        names.extend(self.root_table.union_members.iter().cloned());
        names.extend(self.joined_tables.iter().map(|mapping| mapping.table.clone()));
        names
    }

    /// Tables ordered so that every table holding a foreign key to another
    /// table of the entity precedes the table it references.
    pub fn constraint_ordered_table_closure(&self) -> Result<Vec<TableMapping>, StrataError> {
        let mappings = self.table_mappings();
        let mut ranked = Vec::with_capacity(mappings.len());
        for (position, mapping) in mappings.iter().enumerate() {
            ranked.push((self.reference_depth(mapping, &mappings)?, position));
        }
        ranked.sort_by(|left, right| right.0.cmp(&left.0).then(left.1.cmp(&right.1)));
        Ok(ranked
            .into_iter()
            .map(|(_, position)| mappings[position].clone())
            .collect())
    }

    /// Joined tables ordered so that every table follows the table its key
    /// references. Ties keep declaration order.
    pub fn joined_tables_parents_first(&self) -> Result<Vec<&TableMapping>, StrataError> {
        let mappings = self.table_mappings();
        let mut ranked = Vec::with_capacity(self.joined_tables.len());
        for (position, mapping) in self.joined_tables.iter().enumerate() {
            ranked.push((self.reference_depth(mapping, &mappings)?, position));
        }
        ranked.sort();
        Ok(ranked
            .into_iter()
            .map(|(_, position)| &self.joined_tables[position])
            .collect())
    }

    pub fn key_column_closure(&self, table: &str) -> Option<Vec<String>> {
        self.table_mappings()
            .into_iter()
            .find(|mapping| mapping.table == table)
            .map(|mapping| mapping.key_columns)
    }

    /// Column pairs joining `mapping` to the table it references, referenced
    /// side first.
    pub fn join_column_pairs(
        &self,
        mapping: &TableMapping,
    ) -> Result<Vec<(PhysicalColumn, PhysicalColumn)>, StrataError> {
        let referenced_table = mapping
            .references
            .clone()
            .unwrap_or_else(|| self.root_table.name.clone());
        let referenced_keys = self.key_column_closure(&referenced_table).ok_or_else(|| {
            errors::unresolved_table_binding_error(&referenced_table, &self.name)
        })?;
        if referenced_keys.len() != mapping.key_columns.len()
            || mapping.key_columns.len() != self.identifier.columns.len()
        {
            return Err(errors::invalid_configuration_error(&format!(
                "table `{}` of entity `{}` declares {} key columns, but `{referenced_table}` has {}",
                mapping.table,
                self.name,
                mapping.key_columns.len(),
                referenced_keys.len()
            )));
        }
        Ok(referenced_keys
            .iter()
            .zip(&mapping.key_columns)
            .zip(&self.identifier.columns)
            .map(|((referenced, own), id_column)| {
                (
                    PhysicalColumn::new(referenced_table.clone(), referenced, id_column.sql_type),
                    PhysicalColumn::new(mapping.table.clone(), own, id_column.sql_type),
                )
            })
            .collect())
    }

    /// Restriction a query needs when the entity shares its table with other
    /// entities of the hierarchy.
    pub fn where_join_fragment(&self, alias: &str) -> Option<String> {
        let discriminator = self.discriminator.as_ref()?;
        let literals = discriminator
            .restrict_to
            .iter()
            .map(|value| format!("'{}'", value.replace('\'', "''")))
            .collect::<Vec<_>>();
        match literals.as_slice() {
            [] => None,
            [single] => Some(format!("{alias}.{} = {single}", discriminator.column.name)),
            _ => Some(format!(
                "{alias}.{} in ({})",
                discriminator.column.name,
                literals.join(", ")
            )),
        }
    }

    fn reference_depth(
        &self,
        mapping: &TableMapping,
        mappings: &[TableMapping],
    ) -> Result<usize, StrataError> {
        let mut depth = 0;
        let mut current = mapping;
        while current.table != self.root_table.name {
            depth += 1;
            if depth > mappings.len() {
                return Err(errors::invalid_configuration_error(&format!(
                    "table references of entity `{}` form a cycle through `{}`",
                    self.name, mapping.table
                )));
            }
            let referenced = current
                .references
                .as_deref()
                .unwrap_or(self.root_table.name.as_str());
            current = mappings
                .iter()
                .find(|candidate| candidate.table == referenced)
                .ok_or_else(|| errors::unresolved_table_binding_error(referenced, &self.name))?;
        }
        Ok(depth)
    }
}
