use std::collections::BTreeMap;

use tracing::debug;

use super::{
    column_equality_predicate, ColumnBinding, JoinKind, PropertyPath, TableBinding, TableJoin,
    TableSpaceId,
};
use crate::errors;
use crate::metadata::{EntityDescriptor, PhysicalColumn, PhysicalTable};
use crate::StrataError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableGroupKind {
    Entity { entity_name: String },
    Collection { role: String, owner_entity: String },
}

/// Cache key for resolved columns: owning table, then column expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ColumnKey {
    table: String,
    column: String,
}

/// One entity or collection reference of a query, owning the table bindings
/// that back it.
#[derive(Debug, Clone)]
pub struct TableGroup {
    table_space: TableSpaceId,
    uid: String,
    alias_base: String,
    property_path: PropertyPath,
    kind: TableGroupKind,
    root: Option<TableBinding>,
    joins: Vec<TableJoin>,
    column_cache: BTreeMap<ColumnKey, ColumnBinding>,
}

impl TableGroup {
    pub fn new(
        table_space: TableSpaceId,
        uid: impl Into<String>,
        alias_base: impl Into<String>,
        property_path: PropertyPath,
        kind: TableGroupKind,
    ) -> Self {
        Self {
            table_space,
            uid: uid.into(),
            alias_base: alias_base.into(),
            property_path,
            kind,
            root: None,
            joins: Vec::new(),
            column_cache: BTreeMap::new(),
        }
    }

    /// Builds the group for an entity: its root table plus one join per
    /// secondary, superclass or subclass table. A table is joined after the
    /// table its key references.
    pub fn for_entity(
        table_space: TableSpaceId,
        uid: impl Into<String>,
        alias_base: impl Into<String>,
        property_path: PropertyPath,
        entity: &EntityDescriptor,
    ) -> Result<Self, StrataError> {
        let mut group = Self::new(
            table_space,
            uid,
            alias_base,
            property_path,
            TableGroupKind::Entity {
                entity_name: entity.name.clone(),
            },
        );
        let root_alias = group.next_table_alias();
        group.set_root_table_binding(TableBinding::new(entity.root_table.clone(), root_alias));

        for mapping in entity.joined_tables_parents_first()? {
            let binding = TableBinding::new(
                PhysicalTable::new(mapping.table.clone()),
                group.next_table_alias(),
            );
            let pairs = entity.join_column_pairs(mapping)?;
            let mut referenced = Vec::with_capacity(pairs.len());
            let mut own = Vec::with_capacity(pairs.len());
            for (referenced_column, own_column) in pairs {
                referenced.push(group.resolve_column_binding(&referenced_column)?);
                own.push(ColumnBinding::new(own_column, &binding));
            }
            let kind = if mapping.optional {
                JoinKind::Left
            } else {
                JoinKind::Inner
            };
            let predicate = column_equality_predicate(&referenced, &own)?;
            group.add_table_join(TableJoin::new(kind, binding, Some(predicate))?);
        }
        Ok(group)
    }

    pub fn table_space(&self) -> TableSpaceId {
        self.table_space
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn alias_base(&self) -> &str {
        &self.alias_base
    }

    pub fn property_path(&self) -> &PropertyPath {
        &self.property_path
    }

    pub fn kind(&self) -> &TableGroupKind {
        &self.kind
    }

    pub fn entity_name(&self) -> Option<&str> {
        match &self.kind {
            TableGroupKind::Entity { entity_name } => Some(entity_name),
            TableGroupKind::Collection { .. } => None,
        }
    }

    /// Alias for the next table bound into this group.
    pub fn next_table_alias(&self) -> String {
        let bound = usize::from(self.root.is_some()) + self.joins.len();
        format!("{}{}", self.alias_base, bound)
    }

    /// Rebinding is part of incremental construction (subclass narrowing), so
    /// a second call replaces the root instead of being ignored.
    pub fn set_root_table_binding(&mut self, binding: TableBinding) {
        if let Some(previous) = &self.root {
            debug!(
                table_group = %self.uid,
                previous_table = %previous.table().name,
                table = %binding.table().name,
                "rebinding table group root"
            );
            self.column_cache.clear();
        }
        self.root = Some(binding);
    }

    pub fn root_table_binding(&self) -> Result<&TableBinding, StrataError> {
        self.root
            .as_ref()
            .ok_or_else(|| errors::missing_root_table_binding_error(&self.uid))
    }

    pub fn add_table_join(&mut self, join: TableJoin) {
        self.joins.push(join);
    }

    pub fn table_joins(&self) -> &[TableJoin] {
        &self.joins
    }

    /// Every bound table, root first.
    pub fn table_bindings(&self) -> impl Iterator<Item = &TableBinding> {
        self.root
            .iter()
            .chain(self.joins.iter().map(TableJoin::binding))
    }

    pub fn locate_table_binding(&self, table: &str) -> Result<&TableBinding, StrataError> {
        let root = self.root_table_binding()?;
        if root.binds(table) {
            return Ok(root);
        }
        self.joins
            .iter()
            .map(TableJoin::binding)
            .find(|binding| binding.table().name == table)
            .ok_or_else(|| errors::unresolved_table_binding_error(table, &self.uid))
    }

    pub fn resolve_column_binding(
        &mut self,
        column: &PhysicalColumn,
    ) -> Result<ColumnBinding, StrataError> {
        let key = ColumnKey {
            table: column.table.clone(),
            column: column.name.clone(),
        };
        if let Some(cached) = self.column_cache.get(&key) {
            return Ok(cached.clone());
        }
        let binding = match self.locate_table_binding(&column.table) {
            Ok(table_binding) => ColumnBinding::new(column.clone(), table_binding),
            Err(error) if error.has_code(errors::ErrorCode::UnresolvedTableBinding) => {
                return Err(errors::unresolved_column_binding_error(
                    &column.table,
                    &column.name,
                    &self.uid,
                ))
            }
            Err(error) => return Err(error),
        };
        self.column_cache.insert(key, binding.clone());
        Ok(binding)
    }

    pub fn resolve_column_bindings(
        &mut self,
        columns: &[PhysicalColumn],
    ) -> Result<Vec<ColumnBinding>, StrataError> {
        columns
            .iter()
            .map(|column| self.resolve_column_binding(column))
            .collect()
    }
}
