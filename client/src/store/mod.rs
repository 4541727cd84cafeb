//! Client-side mirrors of backend-owned collections.
//!
//! Every collection (inputs, outputs, mixers, mixer channels, players) is
//! reconciled by the same generic [`Collection`], which merges an initial
//! seed fetch with push events arriving before, during and after it.
//! [`EntityStore`] publishes a fresh [`Snapshot`] after each change so that
//! readers can detect change by identity.

mod collection;
mod mixer;
mod nested;

pub use collection::{Collection, SeedTicket};
pub use mixer::MixerStore;
pub use nested::{NestedSnapshot, NestedStore};

use mixdesk_types::{
    Channel, ChannelPatch, DeskEvent, EntityId, Input, InputPatch, Mixer, MixerPatch, Output,
    OutputPatch, Player, PlayerPatch,
};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::watch;

/// A backend-owned record mirrored on the client.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    type Id: Clone + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;
    /// Partial update; fields absent from the patch are left untouched.
    type Patch: Clone + fmt::Debug + Send + Sync + 'static;

    /// Collection name used in logs
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;

    fn patch_id(patch: &Self::Patch) -> &Self::Id;

    /// Shallow field merge of `patch` into `self`.
    fn merge(&mut self, patch: &Self::Patch);

    /// The part of a push event addressed to this collection, if any.
    fn select_event(_event: &DeskEvent) -> Option<EntityEvent<Self>> {
        None
    }
}

/// A mutation addressed to one collection.
#[derive(Debug, Clone)]
pub enum EntityEvent<E: Entity> {
    Created(Vec<E>),
    Updated(E::Patch),
    Removed(E::Id),
}

impl Entity for Input {
    type Id = EntityId;
    type Patch = InputPatch;
    const KIND: &'static str = "input";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn patch_id(patch: &InputPatch) -> &EntityId {
        &patch.id
    }

    fn merge(&mut self, patch: &InputPatch) {
        Input::merge(self, patch)
    }

    fn select_event(event: &DeskEvent) -> Option<EntityEvent<Self>> {
        match event {
            DeskEvent::InputCreate(created) => {
                Some(EntityEvent::Created(created.clone().into_vec()))
            }
            DeskEvent::InputUpdate(patch) => Some(EntityEvent::Updated(patch.clone())),
            DeskEvent::InputRemove(r) => Some(EntityEvent::Removed(r.id.clone())),
            _ => None,
        }
    }
}

impl Entity for Output {
    type Id = EntityId;
    type Patch = OutputPatch;
    const KIND: &'static str = "output";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn patch_id(patch: &OutputPatch) -> &EntityId {
        &patch.id
    }

    fn merge(&mut self, patch: &OutputPatch) {
        Output::merge(self, patch)
    }

    fn select_event(event: &DeskEvent) -> Option<EntityEvent<Self>> {
        match event {
            DeskEvent::OutputCreate(created) => {
                Some(EntityEvent::Created(created.clone().into_vec()))
            }
            DeskEvent::OutputUpdate(patch) => Some(EntityEvent::Updated(patch.clone())),
            DeskEvent::OutputRemove(r) => Some(EntityEvent::Removed(r.id.clone())),
            _ => None,
        }
    }
}

impl Entity for Mixer {
    type Id = EntityId;
    type Patch = MixerPatch;
    const KIND: &'static str = "mixer";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn patch_id(patch: &MixerPatch) -> &EntityId {
        &patch.id
    }

    fn merge(&mut self, patch: &MixerPatch) {
        Mixer::merge(self, patch)
    }

    fn select_event(event: &DeskEvent) -> Option<EntityEvent<Self>> {
        match event {
            DeskEvent::MixerCreate(created) => {
                Some(EntityEvent::Created(created.clone().into_vec()))
            }
            DeskEvent::MixerUpdate(patch) => Some(EntityEvent::Updated(patch.clone())),
            DeskEvent::MixerRemove(r) => Some(EntityEvent::Removed(r.id.clone())),
            _ => None,
        }
    }
}

impl Entity for Player {
    type Id = EntityId;
    type Patch = PlayerPatch;
    const KIND: &'static str = "player";

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn patch_id(patch: &PlayerPatch) -> &EntityId {
        &patch.id
    }

    fn merge(&mut self, patch: &PlayerPatch) {
        Player::merge(self, patch)
    }

    fn select_event(event: &DeskEvent) -> Option<EntityEvent<Self>> {
        match event {
            DeskEvent::PlayerCreate(created) => {
                Some(EntityEvent::Created(created.clone().into_vec()))
            }
            DeskEvent::PlayerRemove(r) => Some(EntityEvent::Removed(r.id.clone())),
            other => other.player_patch().map(EntityEvent::Updated),
        }
    }
}

/// Channels are addressed through their mixer, see [`MixerStore`].
impl Entity for Channel {
    type Id = mixdesk_types::ChannelId;
    type Patch = ChannelPatch;
    const KIND: &'static str = "mixer channel";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn patch_id(patch: &ChannelPatch) -> &Self::Id {
        &patch.channel
    }

    fn merge(&mut self, patch: &ChannelPatch) {
        Channel::merge(self, patch)
    }
}

/// Synchronization phase of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// Nothing fetched yet
    #[default]
    Empty,
    /// A seed fetch is outstanding; events are journaled for it
    Seeding,
    /// Push events are the source of truth
    Live,
}

/// Immutable view of a collection at one revision.
///
/// Each mutation of the owning collection produces a snapshot with a new
/// backing allocation; a snapshot already handed out never changes.
#[derive(Debug)]
pub struct Snapshot<E> {
    items: Arc<Vec<E>>,
    phase: SyncPhase,
    revision: u64,
}

impl<E> Clone for Snapshot<E> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            phase: self.phase,
            revision: self.revision,
        }
    }
}

impl<E> Default for Snapshot<E> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            phase: SyncPhase::Empty,
            revision: 0,
        }
    }
}

impl<E: Entity> Snapshot<E> {
    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.items.iter()
    }

    pub fn get(&self, id: &E::Id) -> Option<&E> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &E::Id) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether both snapshots share the same backing data.
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.items, &other.items)
    }
}

/// A [`Collection`] that publishes its snapshots to subscribers.
pub struct EntityStore<E: Entity> {
    collection: Collection<E>,
    tx: watch::Sender<Snapshot<E>>,
}

impl<E: Entity> Default for EntityStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityStore<E> {
    pub fn new() -> Self {
        let collection = Collection::new();
        let (tx, _) = watch::channel(collection.snapshot());
        Self { collection, tx }
    }

    /// Receiver of the latest snapshot, notified after every change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<E>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<E> {
        self.collection.snapshot()
    }

    pub fn collection(&self) -> &Collection<E> {
        &self.collection
    }

    /// Apply the part of `event` addressed to this collection.
    pub fn handle(&mut self, event: &DeskEvent) -> bool {
        match E::select_event(event) {
            Some(event) => self.apply(event),
            None => false,
        }
    }

    pub fn apply(&mut self, event: EntityEvent<E>) -> bool {
        let changed = self.collection.apply(event);
        if changed {
            self.publish();
        }
        changed
    }

    pub fn begin_seed(&mut self) -> SeedTicket {
        let ticket = self.collection.begin_seed();
        self.publish();
        ticket
    }

    pub fn apply_seed(&mut self, ticket: SeedTicket, items: Vec<E>) -> bool {
        let changed = self.collection.apply_seed(ticket, items);
        if changed {
            self.publish();
        }
        changed
    }

    pub fn fail_seed(&mut self, ticket: SeedTicket) -> bool {
        let changed = self.collection.fail_seed(ticket);
        if changed {
            self.publish();
        }
        changed
    }

    /// Mutate one entry in place; unknown ids are ignored.
    pub fn modify(&mut self, id: &E::Id, f: impl FnOnce(&mut E)) -> bool {
        let changed = self.collection.modify(id, f);
        if changed {
            self.publish();
        }
        changed
    }

    fn publish(&self) {
        self.tx.send_replace(self.collection.snapshot());
    }
}
