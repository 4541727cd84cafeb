//! Mixers together with their per-mixer channel lists.

use super::{EntityEvent, EntityStore, NestedSnapshot, NestedStore, SeedTicket, Snapshot};
use mixdesk_types::{Channel, ChannelId, DeskEvent, EntityId, Mixer};
use tokio::sync::watch;

/// Keeps the channel scopes in step with the mixer collection: a scope is
/// opened when its mixer appears and dropped when it goes away.
#[derive(Default)]
pub struct MixerStore {
    mixers: EntityStore<Mixer>,
    channels: NestedStore<Channel>,
}

impl MixerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot<Mixer>> {
        self.mixers.subscribe()
    }

    pub fn subscribe_channels(&self) -> watch::Receiver<NestedSnapshot<Channel>> {
        self.channels.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot<Mixer> {
        self.mixers.snapshot()
    }

    pub fn handle(&mut self, event: &DeskEvent) -> bool {
        match event {
            DeskEvent::MixerCreate(created) => {
                let created = created.clone().into_vec();
                for mixer in &created {
                    self.channels.attach(mixer.id.clone());
                }
                self.mixers.apply(EntityEvent::Created(created))
            }
            DeskEvent::MixerUpdate(patch) => self.mixers.apply(EntityEvent::Updated(patch.clone())),
            DeskEvent::MixerRemove(r) => self.remove_mixer(&r.id),
            DeskEvent::MixerChannelCreate(created) => self.channels.apply(
                &created.mixer,
                EntityEvent::Created(vec![created.channel()]),
            ),
            DeskEvent::MixerChannelUpdate(patch) => self
                .channels
                .apply(&patch.mixer, EntityEvent::Updated(patch.clone())),
            DeskEvent::MixerChannelRemove(r) => self
                .channels
                .apply(&r.mixer, EntityEvent::Removed(r.channel)),
            _ => false,
        }
    }

    /// Local confirmation of a mixer this client created.
    pub fn confirm_created(&mut self, mixer: Mixer) -> bool {
        self.channels.attach(mixer.id.clone());
        self.mixers.apply(EntityEvent::Created(vec![mixer]))
    }

    pub fn remove_mixer(&mut self, id: &EntityId) -> bool {
        let removed = self.mixers.apply(EntityEvent::Removed(id.clone()));
        self.channels.detach(id);
        removed
    }

    pub fn begin_seed(&mut self) -> SeedTicket {
        self.mixers.begin_seed()
    }

    /// Merge the mixer list and return the mixers whose channels should be
    /// fetched next.
    pub fn apply_seed(&mut self, ticket: SeedTicket, mixers: Vec<Mixer>) -> Option<Vec<EntityId>> {
        if !self.mixers.apply_seed(ticket, mixers) {
            return None;
        }
        let held = self.mixers.snapshot();
        self.channels.retain(|parent| held.contains(parent));
        Some(held.iter().map(|mixer| mixer.id.clone()).collect())
    }

    pub fn fail_seed(&mut self, ticket: SeedTicket) -> bool {
        self.mixers.fail_seed(ticket)
    }

    /// Start seeding the channels of a held mixer.
    pub fn begin_channel_seed(&mut self, mixer: &EntityId) -> Option<SeedTicket> {
        if self.mixers.collection().get(mixer).is_none() {
            return None;
        }
        Some(self.channels.begin_seed(mixer))
    }

    pub fn apply_channel_seed(
        &mut self,
        mixer: &EntityId,
        ticket: SeedTicket,
        channels: Vec<Channel>,
    ) -> bool {
        self.channels.apply_seed(mixer, ticket, channels)
    }

    pub fn fail_channel_seed(&mut self, mixer: &EntityId, ticket: SeedTicket) -> bool {
        self.channels.fail_seed(mixer, ticket)
    }

    /// Local confirmation of a channel this client added.
    pub fn confirm_channel(&mut self, mixer: &EntityId, channel: Channel) -> bool {
        self.channels.apply(mixer, EntityEvent::Created(vec![channel]))
    }

    pub fn confirm_channel_removed(&mut self, mixer: &EntityId, channel: ChannelId) -> bool {
        self.channels.apply(mixer, EntityEvent::Removed(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixdesk_types::{ChannelCreated, ChannelPatch, ChannelRef, Created, EntityRef};

    fn mixer(id: &str) -> Mixer {
        Mixer {
            id: id.into(),
            display_name: format!("Mixer {id}"),
            output_channels: 2,
        }
    }

    fn channel_created(mixer: &str, channel: u32) -> DeskEvent {
        DeskEvent::MixerChannelCreate(ChannelCreated {
            mixer: mixer.into(),
            channel: ChannelId(channel),
            volume: 1.0,
            input_id: None,
        })
    }

    #[test]
    fn test_channel_events_follow_mixer_lifecycle() {
        let mut store = MixerStore::new();
        let channels = store.subscribe_channels();

        // No scope before the mixer exists
        assert!(!store.handle(&channel_created("m", 0)));

        store.handle(&DeskEvent::MixerCreate(Created::One(mixer("m"))));
        assert!(store.handle(&channel_created("m", 0)));
        assert!(store.handle(&DeskEvent::MixerChannelUpdate(ChannelPatch {
            mixer: "m".into(),
            channel: ChannelId(0),
            volume: Some(0.3),
            input_id: Some(Some("in-1".into())),
        })));

        {
            let snapshot = channels.borrow();
            let channel = snapshot[&EntityId::new("m")].get(&ChannelId(0)).unwrap();
            assert_eq!(channel.volume, 0.3);
            assert_eq!(channel.input_id, Some(EntityId::new("in-1")));
        }

        store.handle(&DeskEvent::MixerRemove(EntityRef { id: "m".into() }));
        assert!(channels.borrow().is_empty());
        assert!(!store.handle(&DeskEvent::MixerChannelRemove(ChannelRef {
            mixer: "m".into(),
            channel: ChannelId(0),
        })));
    }

    #[test]
    fn test_seed_returns_mixers_to_fetch_and_prunes_scopes() {
        let mut store = MixerStore::new();
        store.confirm_created(mixer("gone"));

        let ticket = store.begin_seed();
        let to_fetch = store
            .apply_seed(ticket, vec![mixer("a"), mixer("b")])
            .unwrap();

        assert_eq!(to_fetch, vec![EntityId::new("a"), EntityId::new("b")]);
        assert!(!store.subscribe_channels().borrow().contains_key(&EntityId::new("gone")));

        let ticket = store.begin_channel_seed(&"a".into()).unwrap();
        assert!(store.begin_channel_seed(&"gone".into()).is_none());
        assert!(store.apply_channel_seed(
            &"a".into(),
            ticket,
            vec![Channel::new(ChannelId(0)), Channel::new(ChannelId(1))]
        ));
        assert_eq!(store.subscribe_channels().borrow()[&EntityId::new("a")].len(), 2);
    }

    #[test]
    fn test_channel_confirmation_and_event_do_not_duplicate() {
        let mut store = MixerStore::new();
        store.confirm_created(mixer("m"));

        assert!(store.confirm_channel(&"m".into(), Channel::new(ChannelId(4))));
        assert!(!store.handle(&channel_created("m", 4)));
        assert_eq!(store.subscribe_channels().borrow()[&EntityId::new("m")].len(), 1);
    }
}
