use serde::Serialize;

use super::query_return::{AttributeRole, QueryReturn, SqlSelection, SqlSelectionGroup};
use crate::{StrataError, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeValue {
    pub name: String,
    pub role: AttributeRole,
    /// One value per mapped column. Empty when the attribute was not fetched.
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRow {
    pub entity_name: String,
    pub shallow: bool,
    pub attributes: Vec<AttributeValue>,
}

impl EntityRow {
    pub fn identifier(&self) -> &[Value] {
        self.attributes
            .iter()
            .find(|attribute| attribute.role == AttributeRole::Identifier)
            .map(|attribute| attribute.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.values.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReturnValue {
    Null,
    Scalar { value: Value },
    Composite { embeddable: String, values: Vec<Value> },
    Entity(EntityRow),
}

impl QueryReturn {
    pub fn read(&self, row: &[Value]) -> Result<ReturnValue, StrataError> {
        match self {
            Self::Scalar { selection, .. } => Ok(ReturnValue::Scalar {
                value: read_selection(selection, row)?,
            }),
            Self::Composite {
                embeddable,
                selections,
                ..
            } => {
                let values = read_group(selections, row)?;
                if values.iter().all(Value::is_null) {
                    return Ok(ReturnValue::Null);
                }
                Ok(ReturnValue::Composite {
                    embeddable: embeddable.clone(),
                    values,
                })
            }
            Self::Entity {
                entity_name,
                shallow,
                attributes,
                ..
            } => {
                let mut values = Vec::with_capacity(attributes.len());
                for attribute in attributes {
                    values.push(AttributeValue {
                        name: attribute.name.clone(),
                        role: attribute.role,
                        values: read_group(&attribute.selections, row)?,
                    });
                }
                let row = EntityRow {
                    entity_name: entity_name.clone(),
                    shallow: *shallow,
                    attributes: values,
                };
                // Unmatched outer joins leave the whole identifier null.
                if row.identifier().iter().all(Value::is_null) {
                    return Ok(ReturnValue::Null);
                }
                Ok(ReturnValue::Entity(row))
            }
        }
    }
}

fn read_selection(selection: &SqlSelection, row: &[Value]) -> Result<Value, StrataError> {
    selection.reader().read(row, selection.position())
}

fn read_group(group: &SqlSelectionGroup, row: &[Value]) -> Result<Vec<Value>, StrataError> {
    group
        .selections()
        .iter()
        .map(|selection| read_selection(selection, row))
        .collect()
}
