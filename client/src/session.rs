//! The session: owner of every mirrored collection.
//!
//! All store mutation happens on one task. Seed fetches, per-item detail
//! fetches and gateway calls run elsewhere and report back as
//! [`SessionMessage`]s, so collections never need a lock. Readers observe
//! snapshots through watch receivers handed out by [`SessionHandle`].

use crate::api::{ApiError, ApiResult, DeleteTarget, SeedSource, WriteGateway};
use crate::config::DebounceConfig;
use crate::editable::{DebouncedValue, WriteFn};
use crate::events::EventChannel;
use crate::routing::SourceCatalog;
use crate::state::{ConnectionState, SessionMessage};
use crate::store::{EntityEvent, EntityStore, MixerStore, NestedSnapshot, Snapshot};
use futures_util::future::BoxFuture;
use mixdesk_types::api::{
    ChannelUpdate, CreateInputRequest, CreateMixerRequest, CreateOutputRequest,
    CreatePlayerRequest, InputUpdate, MixerUpdate, OutputUpdate, PlayerUpdate,
};
use mixdesk_types::{
    Channel, ChannelId, DeskEvent, EntityId, Input, Mixer, Output, Player,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Mirrored state of one backend, before it is started.
pub struct Session {
    source: Arc<dyn SeedSource>,
    writer: Arc<dyn WriteGateway>,
    events: EventChannel,
    debounce: DebounceConfig,
    inputs: EntityStore<Input>,
    outputs: EntityStore<Output>,
    mixers: MixerStore,
    players: EntityStore<Player>,
    catalog: watch::Sender<SourceCatalog>,
    tx: mpsc::UnboundedSender<SessionMessage>,
    rx: mpsc::UnboundedReceiver<SessionMessage>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        debounce: DebounceConfig,
        source: Arc<dyn SeedSource>,
        writer: Arc<dyn WriteGateway>,
        events: EventChannel,
    ) -> Self {
        let (catalog, _) = watch::channel(SourceCatalog::default());
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            writer,
            events,
            debounce,
            inputs: EntityStore::new(),
            outputs: EntityStore::new(),
            mixers: MixerStore::new(),
            players: EntityStore::new(),
            catalog,
            tx,
            rx,
            cancel: CancellationToken::new(),
        }
    }

    /// Start the session task.
    pub fn spawn(self) -> (SessionHandle, JoinHandle<()>) {
        let handle = SessionHandle {
            writer: Arc::clone(&self.writer),
            tx: self.tx.clone(),
            inputs: self.inputs.subscribe(),
            outputs: self.outputs.subscribe(),
            mixers: self.mixers.subscribe(),
            channels: self.mixers.subscribe_channels(),
            players: self.players.subscribe(),
            catalog: self.catalog.subscribe(),
            connection: self.events.connection_state(),
            debounce: self.debounce,
            cancel: self.cancel.clone(),
        };

        // Subscribe before seeding so no event between fetch and
        // subscription is lost.
        let events = self.events.subscribe();
        let task = tokio::spawn(self.run(events));
        (handle, task)
    }

    async fn run(mut self, mut events: broadcast::Receiver<DeskEvent>) {
        let mut epoch = self.events.connection_epoch();
        epoch.mark_unchanged();

        info!("Session started");
        self.seed_all();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Session fell behind by {} events, resyncing", missed);
                        self.seed_all();
                    }
                    Err(RecvError::Closed) => break,
                },
                Some(message) = self.rx.recv() => self.handle_message(message),
                Ok(()) = epoch.changed() => {
                    let connection = *epoch.borrow_and_update();
                    self.handle_connected(connection);
                }
            }
            self.refresh_catalog();
        }

        info!("Session stopped");
    }

    /// Events may have been missed before the connection came up.
    fn handle_connected(&mut self, connection: u64) {
        info!("Event stream connection {} established, resyncing", connection);
        self.seed_all();
    }

    fn handle_event(&mut self, event: DeskEvent) {
        trace!("Event: {}", event.description());

        let created_players: Vec<EntityId> = match &event {
            DeskEvent::PlayerCreate(created) => created
                .clone()
                .into_vec()
                .into_iter()
                .map(|player| player.id)
                .collect(),
            _ => Vec::new(),
        };

        self.inputs.handle(&event);
        self.outputs.handle(&event);
        self.mixers.handle(&event);
        if self.players.handle(&event) {
            for id in created_players {
                self.load_player_detail(id);
            }
        }
    }

    fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::InputsLoaded(ticket, result) => match result {
                Ok(items) => {
                    self.inputs.apply_seed(ticket, items);
                }
                Err(e) => {
                    error!("Failed to load inputs: {}", e);
                    self.inputs.fail_seed(ticket);
                }
            },
            SessionMessage::OutputsLoaded(ticket, result) => match result {
                Ok(items) => {
                    self.outputs.apply_seed(ticket, items);
                }
                Err(e) => {
                    error!("Failed to load outputs: {}", e);
                    self.outputs.fail_seed(ticket);
                }
            },
            SessionMessage::MixersLoaded(ticket, result) => match result {
                Ok(items) => {
                    if let Some(mixers) = self.mixers.apply_seed(ticket, items) {
                        for mixer in mixers {
                            self.seed_channels(mixer);
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to load mixers: {}", e);
                    self.mixers.fail_seed(ticket);
                }
            },
            SessionMessage::ChannelsLoaded {
                mixer,
                ticket,
                result,
            } => match result {
                Ok(channels) => {
                    self.mixers.apply_channel_seed(&mixer, ticket, channels);
                }
                Err(e) => {
                    error!("Failed to load channels of mixer {}: {}", mixer, e);
                    self.mixers.fail_channel_seed(&mixer, ticket);
                }
            },
            SessionMessage::PlayersLoaded(ticket, result) => match result {
                Ok(items) => {
                    if self.players.apply_seed(ticket, items) {
                        let ids: Vec<EntityId> =
                            self.players.snapshot().iter().map(|p| p.id.clone()).collect();
                        for id in ids {
                            self.load_player_detail(id);
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to load players: {}", e);
                    self.players.fail_seed(ticket);
                }
            },
            SessionMessage::PlayerDetailLoaded { id, result } => match result {
                Ok(detail) => {
                    self.players.modify(&id, |player| player.fill_missing(&detail));
                }
                Err(e) => error!("Failed to load player {} detail: {}", id, e),
            },

            SessionMessage::InputsCreated(items) => {
                self.inputs.apply(EntityEvent::Created(items));
            }
            SessionMessage::OutputsCreated(items) => {
                self.outputs.apply(EntityEvent::Created(items));
            }
            SessionMessage::MixersCreated(items) => {
                for mixer in items {
                    self.mixers.confirm_created(mixer);
                }
            }
            SessionMessage::ChannelAdded { mixer, channel } => {
                self.mixers.confirm_channel(&mixer, Channel::new(channel));
            }
            SessionMessage::PlayerCreated(player) => {
                let id = player.id.clone();
                if self.players.apply(EntityEvent::Created(vec![player])) {
                    self.load_player_detail(id);
                }
            }
            SessionMessage::Deleted(target) => {
                let removed = match target {
                    DeleteTarget::Input(ref id) => {
                        self.inputs.apply(EntityEvent::Removed(id.clone()))
                    }
                    DeleteTarget::Output(ref id) => {
                        self.outputs.apply(EntityEvent::Removed(id.clone()))
                    }
                    DeleteTarget::Mixer(ref id) => self.mixers.remove_mixer(id),
                    DeleteTarget::Channel(ref mixer, channel) => {
                        self.mixers.confirm_channel_removed(mixer, channel)
                    }
                    DeleteTarget::Player(ref id) => {
                        self.players.apply(EntityEvent::Removed(id.clone()))
                    }
                };
                trace!("Delete of {} confirmed (removed here: {})", target, removed);
            }

            SessionMessage::Resync => self.seed_all(),
        }
    }

    fn seed_all(&mut self) {
        let source = Arc::clone(&self.source);
        let ticket = self.inputs.begin_seed();
        self.spawn_fetch(
            async move { source.list_inputs().await },
            move |result| SessionMessage::InputsLoaded(ticket, result),
        );

        let source = Arc::clone(&self.source);
        let ticket = self.outputs.begin_seed();
        self.spawn_fetch(
            async move { source.list_outputs().await },
            move |result| SessionMessage::OutputsLoaded(ticket, result),
        );

        let source = Arc::clone(&self.source);
        let ticket = self.mixers.begin_seed();
        self.spawn_fetch(
            async move { source.list_mixers().await },
            move |result| SessionMessage::MixersLoaded(ticket, result),
        );

        let source = Arc::clone(&self.source);
        let ticket = self.players.begin_seed();
        self.spawn_fetch(
            async move { source.list_players().await },
            move |result| SessionMessage::PlayersLoaded(ticket, result),
        );
    }

    fn seed_channels(&mut self, mixer: EntityId) {
        let Some(ticket) = self.mixers.begin_channel_seed(&mixer) else {
            return;
        };
        let source = Arc::clone(&self.source);
        let id = mixer.clone();
        self.spawn_fetch(
            async move { source.mixer_channels(&id).await },
            move |result| SessionMessage::ChannelsLoaded {
                mixer,
                ticket,
                result,
            },
        );
    }

    fn load_player_detail(&self, id: EntityId) {
        let source = Arc::clone(&self.source);
        let player = id.clone();
        self.spawn_fetch(
            async move { source.player_detail(&player).await },
            move |result| SessionMessage::PlayerDetailLoaded { id, result },
        );
    }

    /// Run `fetch` off the session task and post its result back.
    fn spawn_fetch<T, F, M>(&self, fetch: F, wrap: M)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        M: FnOnce(T) -> SessionMessage + Send + 'static,
    {
        let tx = self.tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                result = fetch => {
                    let _ = tx.send(wrap(result));
                }
            }
        });
    }

    fn refresh_catalog(&mut self) {
        let inputs = self.inputs.snapshot();
        let players = self.players.snapshot();
        let mixers = self.mixers.snapshot();
        let stale = self.catalog.borrow().is_stale(&inputs, &players, &mixers);
        if stale {
            self.catalog
                .send_replace(SourceCatalog::build(&inputs, &players, &mixers));
        }
    }
}

/// Cloneable access to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    writer: Arc<dyn WriteGateway>,
    tx: mpsc::UnboundedSender<SessionMessage>,
    inputs: watch::Receiver<Snapshot<Input>>,
    outputs: watch::Receiver<Snapshot<Output>>,
    mixers: watch::Receiver<Snapshot<Mixer>>,
    channels: watch::Receiver<NestedSnapshot<Channel>>,
    players: watch::Receiver<Snapshot<Player>>,
    catalog: watch::Receiver<SourceCatalog>,
    connection: watch::Receiver<ConnectionState>,
    debounce: DebounceConfig,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn inputs(&self) -> watch::Receiver<Snapshot<Input>> {
        self.inputs.clone()
    }

    pub fn outputs(&self) -> watch::Receiver<Snapshot<Output>> {
        self.outputs.clone()
    }

    pub fn mixers(&self) -> watch::Receiver<Snapshot<Mixer>> {
        self.mixers.clone()
    }

    /// Channel lists keyed by mixer id.
    pub fn channels(&self) -> watch::Receiver<NestedSnapshot<Channel>> {
        self.channels.clone()
    }

    pub fn players(&self) -> watch::Receiver<Snapshot<Player>> {
        self.players.clone()
    }

    /// Sources selectable for channel and output routing.
    pub fn catalog(&self) -> watch::Receiver<SourceCatalog> {
        self.catalog.clone()
    }

    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.tx.is_closed()
    }

    /// Token cancelled by [`SessionHandle::shutdown`]; child tokens of it tie
    /// other tasks, such as the event stream connection, to the session.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the session, its pending fetches and every bound edit.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Re-seed every collection.
    pub fn resync(&self) {
        self.post(SessionMessage::Resync);
    }

    fn post(&self, message: SessionMessage) {
        if self.tx.send(message).is_err() {
            debug!("Session is gone, dropping message");
        }
    }

    pub async fn create_input(&self, request: CreateInputRequest) -> ApiResult<Vec<Input>> {
        let created = self.writer.create_input(&request).await?;
        self.post(SessionMessage::InputsCreated(created.clone()));
        Ok(created)
    }

    pub async fn create_output(&self, request: CreateOutputRequest) -> ApiResult<Vec<Output>> {
        let created = self.writer.create_output(&request).await?;
        self.post(SessionMessage::OutputsCreated(created.clone()));
        Ok(created)
    }

    pub async fn create_mixer(&self, request: CreateMixerRequest) -> ApiResult<Vec<Mixer>> {
        let created = self.writer.create_mixer(&request).await?;
        self.post(SessionMessage::MixersCreated(created.clone()));
        Ok(created)
    }

    pub async fn add_channel(&self, mixer: &EntityId) -> ApiResult<ChannelId> {
        let channel = self.writer.add_channel(mixer).await?;
        self.post(SessionMessage::ChannelAdded {
            mixer: mixer.clone(),
            channel,
        });
        Ok(channel)
    }

    pub async fn create_player(&self, name: impl Into<String>) -> ApiResult<EntityId> {
        let request = CreatePlayerRequest { name: name.into() };
        let id = self.writer.create_player(&request).await?;
        self.post(SessionMessage::PlayerCreated(Player::new(
            id.clone(),
            request.name,
        )));
        Ok(id)
    }

    /// Delete an entity; on failure the collection is left as it is.
    pub async fn delete(&self, target: DeleteTarget) -> ApiResult<()> {
        match self.writer.delete(&target).await {
            Ok(()) => {
                self.post(SessionMessage::Deleted(target));
                Ok(())
            }
            Err(e) => {
                error!("Failed to delete {}: {}", target, e);
                Err(e)
            }
        }
    }

    pub fn edit_input_name(&self, id: &EntityId) -> DebouncedValue<String> {
        let writer = Arc::clone(&self.writer);
        let target = id.clone();
        let write = write_fn(move |name: String| {
            let writer = Arc::clone(&writer);
            let id = target.clone();
            async move {
                let update = InputUpdate {
                    display_name: Some(name),
                };
                writer.update_input(&id, &update).await
            }
        });
        let id = id.clone();
        self.bind(self.debounce.name_delay(), write, self.inputs(), move |s| {
            s.get(&id).map(|input| input.display_name.clone())
        })
    }

    pub fn edit_output_name(&self, id: &EntityId) -> DebouncedValue<String> {
        let writer = Arc::clone(&self.writer);
        let target = id.clone();
        let write = write_fn(move |name: String| {
            let writer = Arc::clone(&writer);
            let id = target.clone();
            async move {
                let update = OutputUpdate {
                    display_name: Some(name),
                    ..Default::default()
                };
                writer.update_output(&id, &update).await
            }
        });
        let id = id.clone();
        self.bind(self.debounce.name_delay(), write, self.outputs(), move |s| {
            s.get(&id).map(|output| output.display_name.clone())
        })
    }

    /// The source routed to an output; `None` clears it.
    pub fn edit_output_source(&self, id: &EntityId) -> DebouncedValue<Option<EntityId>> {
        let writer = Arc::clone(&self.writer);
        let target = id.clone();
        let write = write_fn(move |input: Option<EntityId>| {
            let writer = Arc::clone(&writer);
            let id = target.clone();
            async move {
                let update = OutputUpdate {
                    input: Some(input),
                    ..Default::default()
                };
                writer.update_output(&id, &update).await
            }
        });
        let id = id.clone();
        self.bind(self.debounce.name_delay(), write, self.outputs(), move |s| {
            s.get(&id).map(|output| output.input_id.clone())
        })
    }

    pub fn edit_mixer_name(&self, id: &EntityId) -> DebouncedValue<String> {
        let writer = Arc::clone(&self.writer);
        let target = id.clone();
        let write = write_fn(move |name: String| {
            let writer = Arc::clone(&writer);
            let id = target.clone();
            async move {
                let update = MixerUpdate {
                    display_name: Some(name),
                };
                writer.update_mixer(&id, &update).await
            }
        });
        let id = id.clone();
        self.bind(self.debounce.name_delay(), write, self.mixers(), move |s| {
            s.get(&id).map(|mixer| mixer.display_name.clone())
        })
    }

    pub fn edit_channel_volume(&self, mixer: &EntityId, channel: ChannelId) -> DebouncedValue<f64> {
        let writer = Arc::clone(&self.writer);
        let target = mixer.clone();
        let write = write_fn(move |volume: f64| {
            let writer = Arc::clone(&writer);
            let mixer = target.clone();
            async move {
                let update = ChannelUpdate {
                    volume: Some(volume),
                    ..Default::default()
                };
                writer.update_channel(&mixer, channel, &update).await
            }
        });
        let mixer = mixer.clone();
        self.bind(self.debounce.volume_delay(), write, self.channels(), move |s| {
            s.get(&mixer)
                .and_then(|channels| channels.get(&channel))
                .map(|c| c.volume)
        })
    }

    /// The source routed to a mixer channel; `None` clears it.
    pub fn edit_channel_source(
        &self,
        mixer: &EntityId,
        channel: ChannelId,
    ) -> DebouncedValue<Option<EntityId>> {
        let writer = Arc::clone(&self.writer);
        let target = mixer.clone();
        let write = write_fn(move |input: Option<EntityId>| {
            let writer = Arc::clone(&writer);
            let mixer = target.clone();
            async move {
                let update = ChannelUpdate {
                    input: Some(input),
                    ..Default::default()
                };
                writer.update_channel(&mixer, channel, &update).await
            }
        });
        let mixer = mixer.clone();
        self.bind(self.debounce.name_delay(), write, self.channels(), move |s| {
            s.get(&mixer)
                .and_then(|channels| channels.get(&channel))
                .map(|c| c.input_id.clone())
        })
    }

    pub fn edit_player_name(&self, id: &EntityId) -> DebouncedValue<String> {
        let writer = Arc::clone(&self.writer);
        let target = id.clone();
        let write = write_fn(move |name: String| {
            let writer = Arc::clone(&writer);
            let id = target.clone();
            async move { writer.update_player(&id, &PlayerUpdate { name }).await }
        });
        let id = id.clone();
        self.bind(self.debounce.name_delay(), write, self.players(), move |s| {
            s.get(&id).map(|player| player.name.clone())
        })
    }

    /// A debounced value seeded from, and following, one snapshot field.
    fn bind<S, T, F>(
        &self,
        delay: Duration,
        write: WriteFn<T>,
        snapshots: watch::Receiver<S>,
        extract: F,
    ) -> DebouncedValue<T>
    where
        S: Send + Sync + 'static,
        T: Clone + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static,
        F: Fn(&S) -> Option<T> + Send + 'static,
    {
        let initial = extract(&snapshots.borrow()).unwrap_or_default();
        let value = DebouncedValue::with_cancel(initial, delay, write, self.cancel.clone());
        value.follow(snapshots, extract);
        value
    }
}

fn write_fn<T, F, Fut>(f: F) -> WriteFn<T>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ApiError>> + Send + 'static,
{
    Arc::new(move |value: T| -> BoxFuture<'static, ApiResult<()>> { Box::pin(f(value)) })
}
