use std::collections::BTreeSet;

use serde::Serialize;

use crate::metadata::{affected_entity_names, AttributeKind, EntityDescriptor, Metamodel};

/// Cached state to discard after a bulk statement changes rows directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkInvalidation {
    pub entity_names: BTreeSet<String>,
    /// Entity tables plus the collection tables of the entity.
    pub tables: BTreeSet<String>,
    /// Collections owned by the affected rows.
    pub collection_roles: BTreeSet<String>,
}

impl BulkInvalidation {
    pub fn for_entity(model: &dyn Metamodel, entity: &EntityDescriptor) -> Self {
        let mut tables = entity.physical_table_names().into_iter().collect::<BTreeSet<_>>();
        let mut collection_roles = BTreeSet::new();
        for attribute in entity.persistent_attributes() {
            if let AttributeKind::Collection(collection) = &attribute.kind {
                tables.insert(collection.table.clone());
                collection_roles.insert(collection.role.clone());
            }
        }
        Self {
            entity_names: affected_entity_names(model, entity),
            tables,
            collection_roles,
        }
    }
}

pub trait CacheInvalidationSink {
    fn invalidate(&self, invalidation: &BulkInvalidation);
}

/// Pending actions of the caller's unit of work.
pub trait ActionQueue {
    fn enqueue_bulk_invalidation(&self, invalidation: BulkInvalidation);
}

/// What the caller's session offers a bulk execution.
#[derive(Clone, Copy, Default)]
pub struct ExecutionContext<'a> {
    pub cache: Option<&'a dyn CacheInvalidationSink>,
    pub action_queue: Option<&'a dyn ActionQueue>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, cache: &'a dyn CacheInvalidationSink) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_action_queue(mut self, queue: &'a dyn ActionQueue) -> Self {
        self.action_queue = Some(queue);
        self
    }

    /// Queues the invalidation with the unit of work when there is one,
    /// otherwise invalidates right away.
    pub fn schedule_invalidation(&self, invalidation: BulkInvalidation) {
        match (self.action_queue, self.cache) {
            (Some(queue), _) => queue.enqueue_bulk_invalidation(invalidation),
            (None, Some(cache)) => cache.invalidate(&invalidation),
            (None, None) => {}
        }
    }
}
