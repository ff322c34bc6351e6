use super::query_return::{
    AttributeReturn, AttributeRole, QueryReturn, SqlSelectionGroup, SqlSelectionResolver,
};
use crate::errors;
use crate::metadata::{AttributeKind, AttributeMapping, EntityDescriptor, PhysicalColumn};
use crate::sql::from::{ColumnBinding, PropertyPath, TableGroup};
use crate::StrataError;

const ROW_ID_ATTRIBUTE: &str = "row_id";
const DISCRIMINATOR_ATTRIBUTE: &str = "class";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnBindingGroup {
    /// Associations and collections that are not fetched by this query.
    Empty,
    Bindings(Vec<ColumnBinding>),
}

impl ColumnBindingGroup {
    fn from_bindings(bindings: Vec<ColumnBinding>) -> Self {
        if bindings.is_empty() {
            Self::Empty
        } else {
            Self::Bindings(bindings)
        }
    }

    pub fn bindings(&self) -> &[ColumnBinding] {
        match self {
            Self::Empty => &[],
            Self::Bindings(bindings) => bindings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bindings().is_empty()
    }

    fn to_selection_group(
        &self,
        resolver: &mut dyn SqlSelectionResolver,
    ) -> Result<SqlSelectionGroup, StrataError> {
        match self {
            Self::Empty => Ok(SqlSelectionGroup::Empty),
            Self::Bindings(bindings) => bindings
                .iter()
                .map(|binding| resolver.resolve_sql_selection(binding))
                .collect::<Result<Vec<_>, _>>()
                .map(SqlSelectionGroup::Selections),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityAttributeBindings {
    pub name: String,
    pub role: AttributeRole,
    pub columns: ColumnBindingGroup,
}

/// Something a query selects, already resolved to column bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selectable {
    Scalar {
        binding: ColumnBinding,
    },
    Composite {
        embeddable: String,
        bindings: Vec<ColumnBinding>,
    },
    Entity {
        entity_name: String,
        property_path: PropertyPath,
        shallow: bool,
        attributes: Vec<EntityAttributeBindings>,
    },
}

impl Selectable {
    pub fn scalar(group: &mut TableGroup, column: &PhysicalColumn) -> Result<Self, StrataError> {
        Ok(Self::Scalar {
            binding: group.resolve_column_binding(column)?,
        })
    }

    /// Selects the columns of an embedded value, or of any attribute mapped to
    /// several columns.
    pub fn composite(
        group: &mut TableGroup,
        attribute: &AttributeMapping,
    ) -> Result<Self, StrataError> {
        let embeddable = match &attribute.kind {
            AttributeKind::Embedded { embeddable, .. } => embeddable.clone(),
            AttributeKind::Collection(collection) => {
                return Err(errors::invalid_expression_error(&format!(
                    "collection `{}` cannot be selected as a value",
                    collection.role
                )));
            }
            AttributeKind::Basic | AttributeKind::ToOne { .. } => attribute.name.clone(),
        };
        Ok(Self::Composite {
            embeddable,
            bindings: group.resolve_column_bindings(&attribute.selectable_columns())?,
        })
    }

    /// Picks the scalar form for single-column attributes and the composite
    /// form otherwise.
    pub fn for_attribute(
        group: &mut TableGroup,
        attribute: &AttributeMapping,
    ) -> Result<Self, StrataError> {
        let columns = attribute.selectable_columns();
        match (&attribute.kind, columns.as_slice()) {
            (AttributeKind::Basic | AttributeKind::ToOne { .. }, [column]) => {
                Self::scalar(group, column)
            }
            _ => Self::composite(group, attribute),
        }
    }

    pub fn entity(
        group: &mut TableGroup,
        entity: &EntityDescriptor,
        shallow: bool,
    ) -> Result<Self, StrataError> {
        let mut attributes = Vec::with_capacity(entity.attributes.len() + 3);
        attributes.push(EntityAttributeBindings {
            name: entity.identifier.name.clone(),
            role: AttributeRole::Identifier,
            columns: ColumnBindingGroup::from_bindings(
                group.resolve_column_bindings(entity.identifier_columns())?,
            ),
        });
        if let Some(row_id) = &entity.row_id {
            attributes.push(EntityAttributeBindings {
                name: ROW_ID_ATTRIBUTE.to_string(),
                role: AttributeRole::RowId,
                columns: ColumnBindingGroup::Bindings(vec![group.resolve_column_binding(row_id)?]),
            });
        }
        if let Some(discriminator) = &entity.discriminator {
            attributes.push(EntityAttributeBindings {
                name: DISCRIMINATOR_ATTRIBUTE.to_string(),
                role: AttributeRole::Discriminator,
                columns: ColumnBindingGroup::Bindings(vec![
                    group.resolve_column_binding(&discriminator.column)?
                ]),
            });
        }
        if !shallow {
            for attribute in entity.persistent_attributes() {
                attributes.push(EntityAttributeBindings {
                    name: attribute.name.clone(),
                    role: AttributeRole::Attribute,
                    columns: ColumnBindingGroup::from_bindings(
                        group.resolve_column_bindings(&attribute.selectable_columns())?,
                    ),
                });
            }
        }
        Ok(Self::Entity {
            entity_name: entity.name.clone(),
            property_path: group.property_path().clone(),
            shallow,
            attributes,
        })
    }

    /// Every column this selectable needs, in select-list order. Empty groups
    /// are skipped.
    pub fn column_bindings(&self) -> Vec<ColumnBinding> {
        match self {
            Self::Scalar { binding } => vec![binding.clone()],
            Self::Composite { bindings, .. } => bindings.clone(),
            Self::Entity { attributes, .. } => attributes
                .iter()
                .filter(|attribute| !attribute.columns.is_empty())
                .flat_map(|attribute| attribute.columns.bindings().iter().cloned())
                .collect(),
        }
    }

    pub fn to_query_return(
        &self,
        alias: Option<&str>,
        resolver: &mut dyn SqlSelectionResolver,
    ) -> Result<QueryReturn, StrataError> {
        let alias = alias.map(str::to_string);
        match self {
            Self::Scalar { binding } => Ok(QueryReturn::Scalar {
                alias,
                selection: resolver.resolve_sql_selection(binding)?,
            }),
            Self::Composite {
                embeddable,
                bindings,
            } => Ok(QueryReturn::Composite {
                alias,
                embeddable: embeddable.clone(),
                selections: ColumnBindingGroup::from_bindings(bindings.clone())
                    .to_selection_group(resolver)?,
            }),
            Self::Entity {
                entity_name,
                shallow,
                attributes,
                ..
            } => {
                let attributes = attributes
                    .iter()
                    .map(|attribute| {
                        Ok(AttributeReturn {
                            name: attribute.name.clone(),
                            role: attribute.role,
                            selections: attribute.columns.to_selection_group(resolver)?,
                        })
                    })
                    .collect::<Result<Vec<_>, StrataError>>()?;
                Ok(QueryReturn::Entity {
                    alias,
                    entity_name: entity_name.clone(),
                    shallow: *shallow,
                    attributes,
                })
            }
        }
    }
}
