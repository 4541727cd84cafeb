//! Collections scoped by a parent entity.

use super::{Collection, Entity, EntityEvent, SeedTicket, Snapshot};
use mixdesk_types::EntityId;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// Per-parent snapshots, keyed by parent id.
pub type NestedSnapshot<C> = Arc<BTreeMap<EntityId, Snapshot<C>>>;

/// One independent [`Collection`] per parent.
///
/// Events and seed results addressed to a parent that is not attached are
/// ignored; the parent's own lifecycle decides which scopes exist.
pub struct NestedStore<C: Entity> {
    parents: BTreeMap<EntityId, Collection<C>>,
    tx: watch::Sender<NestedSnapshot<C>>,
}

impl<C: Entity> Default for NestedStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Entity> NestedStore<C> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(BTreeMap::new()));
        Self {
            parents: BTreeMap::new(),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<NestedSnapshot<C>> {
        self.tx.subscribe()
    }

    pub fn get(&self, parent: &EntityId) -> Option<&Collection<C>> {
        self.parents.get(parent)
    }

    pub fn contains(&self, parent: &EntityId) -> bool {
        self.parents.contains_key(parent)
    }

    pub fn parents(&self) -> impl Iterator<Item = &EntityId> {
        self.parents.keys()
    }

    /// Open an empty, already complete scope for a newly created parent.
    pub fn attach(&mut self, parent: EntityId) -> bool {
        if self.parents.contains_key(&parent) {
            return false;
        }
        self.parents.insert(parent, Collection::new_live());
        self.publish();
        true
    }

    pub fn detach(&mut self, parent: &EntityId) -> bool {
        let removed = self.parents.remove(parent).is_some();
        if removed {
            self.publish();
        }
        removed
    }

    /// Drop every scope whose parent is not in `keep`.
    pub fn retain(&mut self, keep: impl Fn(&EntityId) -> bool) -> bool {
        let before = self.parents.len();
        self.parents.retain(|parent, _| keep(parent));
        let changed = self.parents.len() != before;
        if changed {
            self.publish();
        }
        changed
    }

    /// Start seeding one parent's scope, opening it if needed.
    pub fn begin_seed(&mut self, parent: &EntityId) -> SeedTicket {
        let ticket = self
            .parents
            .entry(parent.clone())
            .or_default()
            .begin_seed();
        self.publish();
        ticket
    }

    pub fn apply_seed(&mut self, parent: &EntityId, ticket: SeedTicket, items: Vec<C>) -> bool {
        let Some(collection) = self.parents.get_mut(parent) else {
            trace!(kind = C::KIND, %parent, "Ignoring seed for detached parent");
            return false;
        };
        let changed = collection.apply_seed(ticket, items);
        if changed {
            self.publish();
        }
        changed
    }

    pub fn fail_seed(&mut self, parent: &EntityId, ticket: SeedTicket) -> bool {
        let changed = self
            .parents
            .get_mut(parent)
            .map(|collection| collection.fail_seed(ticket))
            .unwrap_or(false);
        if changed {
            self.publish();
        }
        changed
    }

    pub fn apply(&mut self, parent: &EntityId, event: EntityEvent<C>) -> bool {
        let Some(collection) = self.parents.get_mut(parent) else {
            trace!(kind = C::KIND, %parent, "Ignoring event for unknown parent");
            return false;
        };
        let changed = collection.apply(event);
        if changed {
            self.publish();
        }
        changed
    }

    fn publish(&self) {
        let map = self
            .parents
            .iter()
            .map(|(parent, collection)| (parent.clone(), collection.snapshot()))
            .collect();
        self.tx.send_replace(Arc::new(map));
    }
}
