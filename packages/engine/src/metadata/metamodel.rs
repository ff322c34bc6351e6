use std::collections::{BTreeMap, BTreeSet};

use super::EntityDescriptor;
use crate::errors;
use crate::StrataError;

pub trait Metamodel {
    fn entity(&self, name: &str) -> Option<&EntityDescriptor>;

    fn entity_names(&self) -> Vec<&str>;
}

pub fn require_entity<'m>(
    model: &'m dyn Metamodel,
    name: &str,
) -> Result<&'m EntityDescriptor, StrataError> {
    model
        .entity(name)
        .ok_or_else(|| errors::unknown_entity_error(name))
}

/// Entities whose cached state may be stale after rows of `entity` change:
/// the entity itself, its subclasses, and anything sharing a physical table.
pub fn affected_entity_names(model: &dyn Metamodel, entity: &EntityDescriptor) -> BTreeSet<String> {
    let mut affected = BTreeSet::new();
    let mut pending = vec![entity.name.clone()];
    while let Some(name) = pending.pop() {
        if !affected.insert(name.clone()) {
            continue;
        }
        if let Some(descriptor) = model.entity(&name) {
            pending.extend(descriptor.subclasses.iter().cloned());
        }
    }

    let touched_tables = entity
        .physical_table_names()
        .into_iter()
        .collect::<BTreeSet<_>>();
    for name in model.entity_names() {
        let Some(candidate) = model.entity(name) else {
            continue;
        };
        let shares_table = candidate
            .physical_table_names()
            .iter()
            .any(|table| touched_tables.contains(table));
        if shares_table {
            affected.insert(candidate.name.clone());
        }
    }
    affected
}

#[derive(Debug, Clone, Default)]
pub struct StaticMetamodel {
    entities: BTreeMap<String, EntityDescriptor>,
}

impl StaticMetamodel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, entity: EntityDescriptor) -> Self {
        self.register(entity);
        self
    }

    pub fn register(&mut self, entity: EntityDescriptor) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Loads a JSON array of entity descriptors.
    pub fn from_json(raw: &str) -> Result<Self, StrataError> {
        let entities: Vec<EntityDescriptor> = serde_json::from_str(raw).map_err(|error| {
            errors::invalid_configuration_error(&format!("invalid mapping metadata: {error}"))
        })?;
        let mut model = Self::new();
        for entity in entities {
            model.register(entity);
        }
        Ok(model)
    }
}

impl Metamodel for StaticMetamodel {
    fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(name)
    }

    fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }
}
