use std::collections::BTreeMap;

use sqlparser::ast::{BinaryOperator, Expr};

use super::{
    column_equality_predicate, JoinKind, PropertyPath, TableBinding, TableGroup, TableGroupId,
    TableGroupJoin, TableGroupKind, TableSpaceId,
};
use crate::errors;
use crate::metadata::{
    require_entity, AttributeKind, CollectionMapping, EntityDescriptor, Metamodel, PhysicalColumn,
    PhysicalTable,
};
use crate::sql::ast::parse_expression;
use crate::StrataError;

/// A root table group plus everything joined onto it. Table spaces are
/// rendered comma separated.
#[derive(Debug, Clone)]
pub struct TableSpace {
    root_group: TableGroupId,
    joined_groups: Vec<TableGroupJoin>,
}

impl TableSpace {
    pub fn root_group(&self) -> TableGroupId {
        self.root_group
    }

    pub fn joined_groups(&self) -> &[TableGroupJoin] {
        &self.joined_groups
    }
}

/// Arena owning every table group of one statement compilation.
#[derive(Debug, Clone, Default)]
pub struct FromClause {
    groups: Vec<TableGroup>,
    spaces: Vec<TableSpace>,
    alias_counters: BTreeMap<char, usize>,
    identification_variables: BTreeMap<String, TableGroupId>,
}

impl FromClause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root_entity(
        &mut self,
        entity: &EntityDescriptor,
        identification_variable: Option<&str>,
    ) -> Result<TableGroupId, StrataError> {
        let space = TableSpaceId(self.spaces.len());
        let id = self.push_entity_group(space, PropertyPath::root(&entity.name), entity)?;
        self.spaces.push(TableSpace {
            root_group: id,
            joined_groups: Vec::new(),
        });
        self.register_identification_variable(identification_variable, id)?;
        Ok(id)
    }

    /// Joins the target of a to-one attribute of `lhs`, matching the foreign
    /// key columns against the target's identifier.
    pub fn add_entity_join(
        &mut self,
        lhs: TableGroupId,
        attribute: &str,
        kind: JoinKind,
        model: &dyn Metamodel,
        identification_variable: Option<&str>,
    ) -> Result<TableGroupId, StrataError> {
        let owner = self.owner_entity(lhs, model)?;
        let mapping = owner
            .find_attribute(attribute)
            .ok_or_else(|| errors::unknown_attribute_error(&owner.name, attribute))?;
        let AttributeKind::ToOne { target } = &mapping.kind else {
            return Err(errors::invalid_expression_error(&format!(
                "`{}.{attribute}` is not a to-one association",
                owner.name
            )));
        };
        let target = require_entity(model, target)?;
        let foreign_key = self
            .table_group_mut(lhs)?
            .resolve_column_bindings(&mapping.columns)?;

        let path = self.table_group(lhs)?.property_path().append(attribute);
        let space = self.table_group(lhs)?.table_space();
        let id = self.push_entity_group(space, path, target)?;
        let target_key = self
            .table_group_mut(id)?
            .resolve_column_bindings(target.identifier_columns())?;
        let mut predicate = column_equality_predicate(&foreign_key, &target_key)?;
        let target_alias = self.table_group(id)?.root_table_binding()?.identification_variable();
        if let Some(fragment) = target.where_join_fragment(target_alias) {
            predicate = Expr::BinaryOp {
                left: Box::new(predicate),
                op: BinaryOperator::And,
                right: Box::new(parse_expression(&fragment)?),
            };
        }

        self.attach(space, TableGroupJoin::new(kind, id, Some(predicate))?)?;
        self.register_identification_variable(identification_variable, id)?;
        Ok(id)
    }

    /// Adds an unrelated entity to the table space of `lhs` with a cross join.
    pub fn add_cross_join(
        &mut self,
        lhs: TableGroupId,
        entity: &EntityDescriptor,
        identification_variable: Option<&str>,
    ) -> Result<TableGroupId, StrataError> {
        let space = self.table_group(lhs)?.table_space();
        let id = self.push_entity_group(space, PropertyPath::root(&entity.name), entity)?;
        self.attach(space, TableGroupJoin::new(JoinKind::Cross, id, None)?)?;
        self.register_identification_variable(identification_variable, id)?;
        Ok(id)
    }

    /// Joins the collection table of `attribute`. The owner side of the join
    /// is the `property_ref` attribute when the mapping names one, otherwise
    /// the owner's identifier.
    pub fn add_collection_join(
        &mut self,
        lhs: TableGroupId,
        attribute: &str,
        kind: JoinKind,
        model: &dyn Metamodel,
        identification_variable: Option<&str>,
    ) -> Result<TableGroupId, StrataError> {
        let owner = self.owner_entity(lhs, model)?;
        let mapping = owner
            .find_attribute(attribute)
            .ok_or_else(|| errors::unknown_attribute_error(&owner.name, attribute))?;
        let AttributeKind::Collection(collection) = &mapping.kind else {
            return Err(errors::invalid_expression_error(&format!(
                "`{}.{attribute}` is not a collection",
                owner.name
            )));
        };
        let owner_columns = collection_owner_columns(owner, collection)?;
        let owner_key = self
            .table_group_mut(lhs)?
            .resolve_column_bindings(&owner_columns)?;

        let path = self.table_group(lhs)?.property_path().append(attribute);
        let space = self.table_group(lhs)?.table_space();
        let id = TableGroupId(self.groups.len());
        let alias_base = self.next_alias_base(attribute);
        let mut group = TableGroup::new(
            space,
            format!("{}#{}", collection.role, id.0),
            alias_base,
            path,
            TableGroupKind::Collection {
                role: collection.role.clone(),
                owner_entity: owner.name.clone(),
            },
        );
        let root_alias = group.next_table_alias();
        group.set_root_table_binding(TableBinding::new(
            PhysicalTable::new(collection.table.clone()),
            root_alias,
        ));
        let collection_key = group.resolve_column_bindings(&collection.key_columns)?;
        self.groups.push(group);

        let predicate = column_equality_predicate(&owner_key, &collection_key)?;
        self.attach(space, TableGroupJoin::new(kind, id, Some(predicate))?)?;
        self.register_identification_variable(identification_variable, id)?;
        Ok(id)
    }

    pub fn table_group(&self, id: TableGroupId) -> Result<&TableGroup, StrataError> {
        self.groups
            .get(id.0)
            .ok_or_else(|| errors::missing_root_table_binding_error(&format!("#{}", id.0)))
    }

    pub fn table_group_mut(&mut self, id: TableGroupId) -> Result<&mut TableGroup, StrataError> {
        self.groups
            .get_mut(id.0)
            .ok_or_else(|| errors::missing_root_table_binding_error(&format!("#{}", id.0)))
    }

    pub fn find_by_identification_variable(&self, variable: &str) -> Option<TableGroupId> {
        self.identification_variables.get(variable).copied()
    }

    pub fn table_spaces(&self) -> &[TableSpace] {
        &self.spaces
    }

    /// Root group of the first table space.
    pub fn primary_group(&self) -> Option<TableGroupId> {
        self.spaces.first().map(TableSpace::root_group)
    }

    pub fn table_groups(&self) -> impl Iterator<Item = (TableGroupId, &TableGroup)> {
        self.groups
            .iter()
            .enumerate()
            .map(|(index, group)| (TableGroupId(index), group))
    }

    fn owner_entity<'m>(
        &self,
        lhs: TableGroupId,
        model: &'m dyn Metamodel,
    ) -> Result<&'m EntityDescriptor, StrataError> {
        let group = self.table_group(lhs)?;
        let name = group.entity_name().ok_or_else(|| {
            errors::invalid_expression_error(&format!(
                "`{}` is a collection and has no attributes to join",
                group.property_path()
            ))
        })?;
        require_entity(model, name)
    }

    fn push_entity_group(
        &mut self,
        space: TableSpaceId,
        path: PropertyPath,
        entity: &EntityDescriptor,
    ) -> Result<TableGroupId, StrataError> {
        let id = TableGroupId(self.groups.len());
        let alias_base = self.next_alias_base(&entity.name);
        let group = TableGroup::for_entity(
            space,
            format!("{}#{}", entity.name, id.0),
            alias_base,
            path,
            entity,
        )?;
        self.groups.push(group);
        Ok(id)
    }

    fn attach(&mut self, space: TableSpaceId, join: TableGroupJoin) -> Result<(), StrataError> {
        let table_space = self.spaces.get_mut(space.0).ok_or_else(|| {
            errors::invalid_expression_error(&format!("table space #{} does not exist", space.0))
        })?;
        table_space.joined_groups.push(join);
        Ok(())
    }

    fn next_alias_base(&mut self, name: &str) -> String {
        let stem = name
            .chars()
            .find(|c| c.is_ascii_alphabetic())
            .map(|c| c.to_ascii_lowercase())
            .unwrap_or('t');
        let counter = self.alias_counters.entry(stem).or_insert(0);
        *counter += 1;
        format!("{stem}{counter}_")
    }

    fn register_identification_variable(
        &mut self,
        variable: Option<&str>,
        id: TableGroupId,
    ) -> Result<(), StrataError> {
        let Some(variable) = variable else {
            return Ok(());
        };
        if self.identification_variables.contains_key(variable) {
            return Err(errors::invalid_expression_error(&format!(
                "identification variable `{variable}` is already defined"
            )));
        }
        self.identification_variables
            .insert(variable.to_string(), id);
        Ok(())
    }
}

fn collection_owner_columns(
    owner: &EntityDescriptor,
    collection: &CollectionMapping,
) -> Result<Vec<PhysicalColumn>, StrataError> {
    let owner_columns = match &collection.property_ref {
        Some(property) => owner
            .find_attribute(property)
            .ok_or_else(|| errors::unknown_attribute_error(&owner.name, property))?
            .selectable_columns(),
        None => owner.identifier_columns().to_vec(),
    };
    if owner_columns.len() != collection.key_columns.len() {
        return Err(errors::invalid_configuration_error(&format!(
            "collection `{}` has {} key columns but its owner side has {}",
            collection.role,
            collection.key_columns.len(),
            owner_columns.len()
        )));
    }
    // Without a property-ref the key must carry the owner's identifier type.
    if collection.property_ref.is_none() {
        let mismatch = owner_columns
            .iter()
            .zip(&collection.key_columns)
            .find(|(owner_column, key_column)| owner_column.sql_type != key_column.sql_type);
        if let Some((owner_column, key_column)) = mismatch {
            return Err(errors::invalid_configuration_error(&format!(
                "collection `{}` key column `{}` is {:?} but owner identifier `{}` is {:?}; map it with a property-ref",
                collection.role,
                key_column.name,
                key_column.sql_type,
                owner_column.name,
                owner_column.sql_type
            )));
        }
    }
    Ok(owner_columns)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::FromClause;
    use crate::errors::{ErrorCategory, ErrorCode};
    use crate::metadata::{
        AttributeMapping, CollectionMapping, EntityDescriptor, Metamodel, PhysicalColumn,
        PhysicalTable, SqlType, StaticMetamodel, TableMapping,
    };
    use crate::sql::from::JoinKind;

    fn model() -> StaticMetamodel {
        let customer = EntityDescriptor::new(
            "Customer",
            PhysicalTable::new("customer"),
            AttributeMapping::basic("id", PhysicalColumn::new("customer", "id", SqlType::Integer)),
        )
        .with_attribute(AttributeMapping::basic(
            "code",
            PhysicalColumn::new("customer", "code", SqlType::Text),
        ))
        .with_attribute(AttributeMapping::collection(
            "tags",
            CollectionMapping {
                role: "Customer.tags".to_string(),
                table: "customer_tag".to_string(),
                key_columns: vec![PhysicalColumn::new(
                    "customer_tag",
                    "customer_id",
                    SqlType::Integer,
                )],
                element_columns: vec![PhysicalColumn::new("customer_tag", "tag", SqlType::Text)],
                property_ref: None,
            },
        ))
        .with_attribute(AttributeMapping::collection(
            "aliases",
            CollectionMapping {
                role: "Customer.aliases".to_string(),
                table: "customer_alias".to_string(),
                key_columns: vec![PhysicalColumn::new(
                    "customer_alias",
                    "customer_code",
                    SqlType::Text,
                )],
                element_columns: vec![PhysicalColumn::new(
                    "customer_alias",
                    "alias",
                    SqlType::Text,
                )],
                property_ref: Some("code".to_string()),
            },
        ));
        let invoice = EntityDescriptor::new(
            "Invoice",
            PhysicalTable::new("invoice"),
            AttributeMapping::basic("id", PhysicalColumn::new("invoice", "id", SqlType::Integer)),
        )
        .with_joined_table(TableMapping::new("invoice_detail", ["invoice_id"]))
        .with_attribute(AttributeMapping::to_one(
            "customer",
            "Customer",
            vec![PhysicalColumn::new("invoice", "customer_id", SqlType::Integer)],
        ));
        StaticMetamodel::new().with_entity(customer).with_entity(invoice)
    }

    fn all_aliases(from: &FromClause) -> Vec<String> {
        from.table_groups()
            .flat_map(|(_, group)| {
                group
                    .table_bindings()
                    .map(|binding| binding.identification_variable().to_string())
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    #[test]
    fn every_group_gets_a_distinct_alias_base() {
        let model = model();
        let invoice = model.entity("Invoice").unwrap().clone();
        let mut from = FromClause::new();
        let root = from.add_root_entity(&invoice, Some("i")).unwrap();
        let customer = from
            .add_entity_join(root, "customer", JoinKind::Inner, &model, Some("c"))
            .unwrap();
        let other = from.add_cross_join(root, &invoice, Some("other")).unwrap();

        assert_eq!(from.table_group(root).unwrap().alias_base(), "i1_");
        assert_eq!(from.table_group(customer).unwrap().alias_base(), "c1_");
        assert_eq!(from.table_group(other).unwrap().alias_base(), "i2_");

        let roots = from
            .table_groups()
            .map(|(_, group)| group.root_table_binding().unwrap().identification_variable().to_string())
            .collect::<BTreeSet<_>>();
        assert_eq!(roots.len(), 3);

        let aliases = all_aliases(&from);
        let distinct = aliases.iter().collect::<BTreeSet<_>>();
        assert_eq!(aliases.len(), distinct.len());
    }

    #[test]
    fn entity_join_matches_foreign_key_to_target_identifier() {
        let model = model();
        let invoice = model.entity("Invoice").unwrap().clone();
        let mut from = FromClause::new();
        let root = from.add_root_entity(&invoice, None).unwrap();
        let customer = from
            .add_entity_join(root, "customer", JoinKind::Left, &model, None)
            .unwrap();

        let join = &from.table_spaces()[0].joined_groups()[0];
        assert_eq!(join.group(), customer);
        assert_eq!(join.kind(), JoinKind::Left);
        assert_eq!(
            join.predicate().map(ToString::to_string).as_deref(),
            Some("i1_0.customer_id = c1_0.id")
        );
        assert_eq!(
            from.table_group(customer).unwrap().property_path().to_string(),
            "Invoice.customer"
        );
    }

    #[test]
    fn collection_join_uses_property_ref_columns() {
        let model = model();
        let customer = model.entity("Customer").unwrap().clone();
        let mut from = FromClause::new();
        let root = from.add_root_entity(&customer, Some("c")).unwrap();
        from.add_collection_join(root, "tags", JoinKind::Left, &model, Some("t"))
            .unwrap();
        from.add_collection_join(root, "aliases", JoinKind::Left, &model, None)
            .unwrap();

        let predicates = from.table_spaces()[0]
            .joined_groups()
            .iter()
            .map(|join| join.predicate().map(ToString::to_string).unwrap_or_default())
            .collect::<Vec<_>>();
        assert_eq!(
            predicates,
            vec![
                "c1_0.id = t1_0.customer_id".to_string(),
                "c1_0.code = a1_0.customer_code".to_string(),
            ]
        );
        assert!(from.find_by_identification_variable("t").is_some());
    }

    #[test]
    fn joining_a_basic_attribute_is_rejected() {
        let model = model();
        let customer = model.entity("Customer").unwrap().clone();
        let mut from = FromClause::new();
        let root = from.add_root_entity(&customer, None).unwrap();
        let error = from
            .add_entity_join(root, "code", JoinKind::Inner, &model, None)
            .expect_err("code is a basic attribute");
        assert!(error.has_code(ErrorCode::InvalidExpression));

        let unknown = from
            .add_entity_join(root, "missing", JoinKind::Inner, &model, None)
            .expect_err("missing attribute");
        assert!(unknown.has_code(ErrorCode::UnknownAttribute));
        assert_eq!(unknown.category(), ErrorCategory::Semantic);
    }

    #[test]
    fn duplicate_identification_variable_is_rejected() {
        let model = model();
        let invoice = model.entity("Invoice").unwrap().clone();
        let mut from = FromClause::new();
        let root = from.add_root_entity(&invoice, Some("x")).unwrap();
        assert!(from.add_cross_join(root, &invoice, Some("x")).is_err());
    }
}
