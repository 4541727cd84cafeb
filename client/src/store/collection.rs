//! Reconciliation of one mirrored collection.
//!
//! A seed fetch races with the push events arriving while it is in flight.
//! Events received in [`SyncPhase::Seeding`] are applied immediately and also
//! journaled per id; when the fetch lands, the journal decides for every id
//! whether the event copy or the fetched copy wins, and replays buffered
//! patches over fetched records.

use super::{Entity, EntityEvent, Snapshot, SyncPhase};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Identifies one seed attempt; results of superseded attempts are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedTicket(u64);

/// What happened to one id since the current seed began.
#[derive(Debug)]
enum Journal<P> {
    Created,
    Patched(Vec<P>),
    Removed,
}

#[derive(Debug)]
pub struct Collection<E: Entity> {
    items: Arc<Vec<E>>,
    phase: SyncPhase,
    generation: u64,
    journal: HashMap<E::Id, Journal<E::Patch>>,
    revision: u64,
}

impl<E: Entity> Default for Collection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> Collection<E> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            phase: SyncPhase::Empty,
            generation: 0,
            journal: HashMap::new(),
            revision: 0,
        }
    }

    /// An empty collection already known to be complete, e.g. the channel
    /// list of a mixer created after the initial load.
    pub fn new_live() -> Self {
        Self {
            phase: SyncPhase::Live,
            ..Self::new()
        }
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.items.iter()
    }

    pub fn snapshot(&self) -> Snapshot<E> {
        Snapshot {
            items: Arc::clone(&self.items),
            phase: self.phase,
            revision: self.revision,
        }
    }

    pub fn apply(&mut self, event: EntityEvent<E>) -> bool {
        match event {
            EntityEvent::Created(items) => {
                let mut changed = false;
                for item in items {
                    changed |= self.create(item);
                }
                changed
            }
            EntityEvent::Updated(patch) => self.update(patch),
            EntityEvent::Removed(id) => self.remove(&id),
        }
    }

    /// Append a new entity. A create for an id already held is a duplicate
    /// delivery (event plus local confirmation) and is ignored.
    pub fn create(&mut self, item: E) -> bool {
        let id = item.id().clone();
        if self.position(&id).is_some() {
            trace!(kind = E::KIND, %id, "Ignoring duplicate create");
            return false;
        }
        if self.phase == SyncPhase::Seeding {
            self.journal.insert(id, Journal::Created);
        }
        self.items_mut().push(item);
        true
    }

    /// Merge a patch into the entity it addresses.
    ///
    /// Unknown ids are dropped once live. While seeding they are buffered and
    /// replayed over the fetched record.
    pub fn update(&mut self, patch: E::Patch) -> bool {
        let id = E::patch_id(&patch).clone();
        let position = self.position(&id);

        if let Some(idx) = position {
            self.items_mut()[idx].merge(&patch);
        }

        if self.phase == SyncPhase::Seeding {
            match self
                .journal
                .entry(id.clone())
                .or_insert_with(|| Journal::Patched(Vec::new()))
            {
                Journal::Patched(patches) => patches.push(patch),
                Journal::Created | Journal::Removed => {}
            }
            if position.is_none() {
                trace!(kind = E::KIND, %id, "Buffered update for id not yet seeded");
            }
        } else if position.is_none() {
            trace!(kind = E::KIND, %id, "Ignoring update for unknown id");
        }

        position.is_some()
    }

    pub fn remove(&mut self, id: &E::Id) -> bool {
        if self.phase == SyncPhase::Seeding {
            self.journal.insert(id.clone(), Journal::Removed);
        }
        match self.position(id) {
            Some(idx) => {
                self.items_mut().remove(idx);
                true
            }
            None => {
                trace!(kind = E::KIND, %id, "Ignoring remove for unknown id");
                false
            }
        }
    }

    /// Mutate one entity in place.
    pub fn modify(&mut self, id: &E::Id, f: impl FnOnce(&mut E)) -> bool {
        match self.position(id) {
            Some(idx) => {
                f(&mut self.items_mut()[idx]);
                true
            }
            None => false,
        }
    }

    /// Start a seed attempt, superseding any attempt still in flight.
    pub fn begin_seed(&mut self) -> SeedTicket {
        self.generation += 1;
        self.phase = SyncPhase::Seeding;
        self.journal.clear();
        self.revision += 1;
        debug!(kind = E::KIND, generation = self.generation, "Seeding collection");
        SeedTicket(self.generation)
    }

    fn is_current(&self, ticket: SeedTicket) -> bool {
        self.phase == SyncPhase::Seeding && ticket.0 == self.generation
    }

    /// Merge a completed fetch and go live.
    ///
    /// Held entities the fetch no longer lists are dropped unless they were
    /// created after the seed began. Existing entities keep their position,
    /// newly fetched ones are appended in fetch order.
    pub fn apply_seed(&mut self, ticket: SeedTicket, fetched: Vec<E>) -> bool {
        if !self.is_current(ticket) {
            debug!(kind = E::KIND, "Ignoring stale seed result");
            return false;
        }

        let journal = std::mem::take(&mut self.journal);
        let fetched_count = fetched.len();

        let fetched_ids: std::collections::HashSet<E::Id> =
            fetched.iter().map(|item| item.id().clone()).collect();

        let mut merged: Vec<E> = Vec::with_capacity(fetched_count.max(self.items.len()));
        let mut index: HashMap<E::Id, usize> = HashMap::new();
        for item in self.items.iter() {
            let id = item.id();
            let created = matches!(journal.get(id), Some(Journal::Created));
            if created || fetched_ids.contains(id) {
                index.insert(id.clone(), merged.len());
                merged.push(item.clone());
            } else {
                trace!(kind = E::KIND, %id, "Dropping entity absent from seed");
            }
        }

        for mut item in fetched {
            let id = item.id().clone();
            match journal.get(&id) {
                Some(Journal::Created) | Some(Journal::Removed) => continue,
                Some(Journal::Patched(patches)) => {
                    for patch in patches {
                        item.merge(patch);
                    }
                }
                None => {}
            }
            match index.get(&id) {
                Some(&idx) => merged[idx] = item,
                None => {
                    index.insert(id, merged.len());
                    merged.push(item);
                }
            }
        }

        self.items = Arc::new(merged);
        self.phase = SyncPhase::Live;
        self.revision += 1;
        debug!(
            kind = E::KIND,
            fetched = fetched_count,
            held = self.items.len(),
            "Collection seeded"
        );
        true
    }

    /// Give up on a seed attempt; held entities stay and events apply live.
    pub fn fail_seed(&mut self, ticket: SeedTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.journal.clear();
        self.phase = SyncPhase::Live;
        self.revision += 1;
        true
    }

    fn position(&self, id: &E::Id) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn items_mut(&mut self) -> &mut Vec<E> {
        self.revision += 1;
        // Snapshots handed out keep the old allocation.
        Arc::make_mut(&mut self.items)
    }
}
