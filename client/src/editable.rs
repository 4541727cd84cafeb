//! Locally edited values that are pushed to the backend once editing settles.
//!
//! [`EditableField`] holds the state machine and does no I/O. A
//! [`DebouncedValue`] runs one field on its own task: it renders the local
//! value through a watch channel, waits for edits to settle, and issues at
//! most one write at a time.

use crate::api::ApiResult;
use futures_util::future::{BoxFuture, OptionFuture};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// Settle time used when none is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(600);

/// A scalar with an authoritative server value and a local edit.
#[derive(Debug, Clone)]
pub struct EditableField<T> {
    server: T,
    local: T,
    delay: Duration,
    deadline: Option<Instant>,
    in_flight: Option<T>,
    deferred: bool,
    /// Bumped whenever external state moves the server value.
    generation: u64,
    write_generation: u64,
    /// Last acknowledged write, until external state moves.
    written: Option<T>,
}

impl<T: Clone + PartialEq> EditableField<T> {
    pub fn new(value: T, delay: Duration) -> Self {
        Self {
            server: value.clone(),
            local: value,
            delay,
            deadline: None,
            in_flight: None,
            deferred: false,
            generation: 0,
            write_generation: 0,
            written: None,
        }
    }

    pub fn server_value(&self) -> &T {
        &self.server
    }

    /// The value to render.
    pub fn local_value(&self) -> &T {
        &self.local
    }

    pub fn is_dirty(&self) -> bool {
        self.local != self.server
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_writing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// An edit is waiting to settle or being written.
    pub fn is_editing(&self) -> bool {
        self.deadline.is_some() || self.in_flight.is_some()
    }

    /// Take a new authoritative value.
    ///
    /// An edit in progress keeps rendering; only the server value moves, so
    /// the next fire compares against the newest state. Once nothing is
    /// pending, the delivered value replaces an acknowledged local value.
    pub fn initialize(&mut self, value: T) {
        if self.local == self.server || !self.is_editing() {
            self.local = value.clone();
            self.written = None;
        }
        if value != self.server {
            self.generation += 1;
            self.written = None;
            self.server = value;
        }
    }

    /// Record an edit and restart the settle timer.
    pub fn set(&mut self, value: T, now: Instant) {
        self.local = value;
        self.deadline = Some(now + self.delay);
    }

    /// Fire an expired timer; returns the value to write, if any.
    ///
    /// While a write is in flight the fire is deferred until it finishes.
    pub fn fire(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.deadline = None,
            _ => return None,
        }
        if self.in_flight.is_some() {
            self.deferred = true;
            return None;
        }
        self.start_write()
    }

    /// Settle the write in flight; returns a deferred write to start next.
    ///
    /// The server value is left alone: only delivered state moves it. A
    /// failed write reverts the local value unless it was edited again after
    /// the write was issued. So does a successful one that newer external
    /// state overtook.
    pub fn write_finished<E>(&mut self, result: &Result<(), E>) -> Option<T> {
        let attempted = self.in_flight.take()?;
        let overtaken = self.generation != self.write_generation;
        match result {
            Ok(()) if !overtaken => self.written = Some(attempted),
            _ => {
                if self.local == attempted && self.deadline.is_none() {
                    self.local = self.server.clone();
                }
            }
        }
        if std::mem::take(&mut self.deferred) {
            self.start_write()
        } else {
            None
        }
    }

    fn start_write(&mut self) -> Option<T> {
        if self.local == self.server || self.written.as_ref() == Some(&self.local) {
            return None;
        }
        self.write_generation = self.generation;
        self.in_flight = Some(self.local.clone());
        self.in_flight.clone()
    }
}

/// Issues the backend write for one value.
pub type WriteFn<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ApiResult<()>> + Send + Sync>;

enum Command<T> {
    Set(T),
    Initialize(T),
}

/// Handle to a debounced field running on its own task.
///
/// Dropping the handle stops the task and discards an edit that has not
/// fired yet.
pub struct DebouncedValue<T> {
    commands: mpsc::UnboundedSender<Command<T>>,
    local: watch::Receiver<T>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl<T> fmt::Debug for DebouncedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedValue").finish_non_exhaustive()
    }
}

impl<T> DebouncedValue<T>
where
    T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(initial: T, delay: Duration, write: WriteFn<T>) -> Self {
        Self::with_cancel(initial, delay, write, CancellationToken::new())
    }

    /// Run until `cancel` fires or the handle is dropped.
    pub fn with_cancel(
        initial: T,
        delay: Duration,
        write: WriteFn<T>,
        cancel: CancellationToken,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (local_tx, local) = watch::channel(initial.clone());
        let field = EditableField::new(initial, delay);
        let cancel = cancel.child_token();

        tokio::spawn(run(field, rx, local_tx, write, cancel.clone()));

        Self {
            commands,
            local,
            _guard: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Record a user edit.
    pub fn set(&self, value: T) {
        let _ = self.commands.send(Command::Set(value));
    }

    /// Take a new authoritative value.
    pub fn initialize(&self, value: T) {
        let _ = self.commands.send(Command::Initialize(value));
    }

    /// Receiver of the value to render.
    pub fn local(&self) -> watch::Receiver<T> {
        self.local.clone()
    }

    /// Current value to render.
    pub fn get(&self) -> T {
        self.local.borrow().clone()
    }

    /// Keep the server value in step with a published snapshot.
    ///
    /// `extract` picks the field out of each snapshot; `None` (entity gone)
    /// leaves the field untouched. Every publish is delivered, even when the
    /// extracted value repeats, since the watch may have coalesced a change
    /// and its revert.
    pub fn follow<S, F>(&self, mut snapshots: watch::Receiver<S>, extract: F)
    where
        S: Send + Sync + 'static,
        F: Fn(&S) -> Option<T> + Send + 'static,
    {
        let commands = self.commands.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                let current = {
                    let snapshot = snapshots.borrow_and_update();
                    extract(&snapshot)
                };
                if let Some(value) = current {
                    if commands.send(Command::Initialize(value)).is_err() {
                        break;
                    }
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
}

async fn run<T>(
    mut field: EditableField<T>,
    mut commands: mpsc::UnboundedReceiver<Command<T>>,
    local_tx: watch::Sender<T>,
    write: WriteFn<T>,
    cancel: CancellationToken,
) where
    T: Clone + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    let mut in_flight: Option<BoxFuture<'static, ApiResult<()>>> = None;

    loop {
        let deadline = field.deadline();

        tokio::select! {
            _ = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(Command::Set(value)) => field.set(value, Instant::now()),
                Some(Command::Initialize(value)) => field.initialize(value),
                None => break,
            },
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(value) = field.fire(Instant::now()) {
                    debug!("Writing settled value {:?}", value);
                    in_flight = Some(write(value));
                }
            }
            Some(result) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                in_flight = None;
                if let Err(ref e) = result {
                    warn!("Write of edited value failed: {}", e);
                }
                if let Some(value) = field.write_finished(&result) {
                    debug!("Writing deferred value {:?}", value);
                    in_flight = Some(write(value));
                }
            }
        }

        local_tx.send_if_modified(|rendered| {
            if rendered != field.local_value() {
                *rendered = field.local_value().clone();
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;

    const DELAY: Duration = Duration::from_millis(600);

    fn field(value: &str) -> EditableField<String> {
        EditableField::new(value.to_string(), DELAY)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_fire_only_after_settling() {
        let t0 = Instant::now();
        let mut f = field("Bar");

        f.set("Foo".to_string(), t0);
        f.set("Foobar".to_string(), t0 + ms(50));

        assert_eq!(f.fire(t0 + ms(600)), None);
        assert_eq!(f.fire(t0 + ms(649)), None);
        assert_eq!(f.fire(t0 + ms(650)), Some("Foobar".to_string()));
        assert_eq!(f.fire(t0 + ms(700)), None);
    }

    #[test]
    fn test_no_write_when_edit_matches_server() {
        let t0 = Instant::now();
        let mut f = field("Bar");
        f.set("Baz".to_string(), t0);
        f.set("Bar".to_string(), t0 + ms(10));
        assert_eq!(f.fire(t0 + ms(700)), None);
        assert!(!f.is_writing());
    }

    #[test]
    fn test_initialize_does_not_clobber_edit() {
        let t0 = Instant::now();
        let mut f = field("Old");
        f.set("Mine".to_string(), t0);

        f.initialize("Theirs".to_string());
        assert_eq!(f.local_value(), "Mine");
        assert_eq!(f.server_value(), "Theirs");

        // Not dirty: both move
        let mut clean = field("Old");
        clean.initialize("Theirs".to_string());
        assert_eq!(clean.local_value(), "Theirs");
    }

    #[test]
    fn test_failed_write_reverts_unless_edited_again() {
        let t0 = Instant::now();
        let mut f = field("Old");
        f.set("New".to_string(), t0);
        assert!(f.fire(t0 + DELAY).is_some());

        f.write_finished(&Err::<(), _>(ApiError::Http(500, String::new())));
        assert_eq!(f.local_value(), "Old");

        f.set("Again".to_string(), t0 + ms(700));
        assert!(f.fire(t0 + ms(1300)).is_some());
        f.set("Newer".to_string(), t0 + ms(1350));
        f.write_finished(&Err::<(), _>(ApiError::Network(String::new())));
        assert_eq!(f.local_value(), "Newer");
    }

    #[test]
    fn test_fire_during_write_is_deferred() {
        let t0 = Instant::now();
        let mut f = field("A");
        f.set("B".to_string(), t0);
        assert_eq!(f.fire(t0 + DELAY), Some("B".to_string()));

        f.set("C".to_string(), t0 + ms(700));
        assert_eq!(f.fire(t0 + ms(1300)), None);

        let next = f.write_finished(&Ok::<(), ApiError>(()));
        assert_eq!(f.server_value(), "A");
        assert_eq!(next, Some("C".to_string()));
        assert!(f.is_writing());
    }

    #[test]
    fn test_ack_does_not_advance_server_value() {
        let t0 = Instant::now();
        let mut f = field("A");
        f.set("B".to_string(), t0);
        assert_eq!(f.fire(t0 + DELAY), Some("B".to_string()));

        assert_eq!(f.write_finished(&Ok::<(), ApiError>(())), None);
        assert_eq!(f.server_value(), "A");
        assert_eq!(f.local_value(), "B");

        // Already accepted; no second write before the echo
        f.set("B".to_string(), t0 + ms(700));
        assert_eq!(f.fire(t0 + ms(1300)), None);

        f.initialize("B".to_string());
        assert_eq!(f.server_value(), "B");
        assert_eq!(f.local_value(), "B");
    }

    #[test]
    fn test_ack_after_newer_external_value_keeps_later_edit() {
        let t0 = Instant::now();
        let mut f = field("A");
        f.set("B".to_string(), t0);
        assert_eq!(f.fire(t0 + DELAY), Some("B".to_string()));

        // Echo, then someone else sets it back, all before the ack
        f.initialize("B".to_string());
        f.initialize("A".to_string());
        assert_eq!(f.write_finished(&Ok::<(), ApiError>(())), None);
        assert_eq!(f.server_value(), "A");
        assert_eq!(f.local_value(), "A");

        f.set("B".to_string(), t0 + ms(1000));
        assert_eq!(f.fire(t0 + ms(1600)), Some("B".to_string()));
    }

    #[test]
    fn test_ack_then_stale_value_is_authoritative() {
        let t0 = Instant::now();
        let mut f = field("A");
        f.set("B".to_string(), t0);
        assert!(f.fire(t0 + DELAY).is_some());
        f.write_finished(&Ok::<(), ApiError>(()));

        f.initialize("A".to_string());
        assert_eq!(f.local_value(), "A");
        assert!(!f.is_dirty());
    }

    fn recording_write(
        result: ApiResult<()>,
        latency: Duration,
    ) -> (WriteFn<String>, mpsc::UnboundedReceiver<(String, Instant)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let write: WriteFn<String> = Arc::new(move |value: String| -> BoxFuture<'static, ApiResult<()>> {
            let tx = tx.clone();
            let result = result.clone();
            Box::pin(async move {
                let _ = tx.send((value, Instant::now()));
                tokio::time::sleep(latency).await;
                result
            })
        });
        (write, rx)
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_foobar_is_written_once() {
        let (write, mut writes) = recording_write(Ok(()), Duration::ZERO);
        let value = DebouncedValue::new("Bar".to_string(), DELAY, write);

        value.set("Foo".to_string());
        tokio::time::sleep(ms(50)).await;
        value.set("Foobar".to_string());
        tokio::time::sleep(ms(599)).await;
        settle().await;
        assert!(writes.try_recv().is_err());

        tokio::time::sleep(ms(2)).await;
        settle().await;
        let (written, _) = writes.try_recv().unwrap();
        assert_eq!(written, "Foobar");
        assert!(writes.try_recv().is_err());
        assert_eq!(value.get(), "Foobar");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_reverts_rendered_value() {
        let (write, mut writes) =
            recording_write(Err(ApiError::Http(400, "bad".to_string())), Duration::ZERO);
        let value = DebouncedValue::new("0.5".to_string(), DELAY, write);
        let mut local = value.local();

        value.set("0.9".to_string());
        tokio::time::sleep(ms(10)).await;
        assert_eq!(*local.borrow_and_update(), "0.9");

        tokio::time::sleep(ms(700)).await;
        settle().await;
        assert!(writes.try_recv().is_ok());
        assert_eq!(*local.borrow_and_update(), "0.5");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_discards_pending_edit() {
        let (write, mut writes) = recording_write(Ok(()), Duration::ZERO);
        let value = DebouncedValue::new("Old".to_string(), DELAY, write);

        value.set("New".to_string());
        tokio::time::sleep(ms(100)).await;
        drop(value);

        tokio::time::sleep(ms(1000)).await;
        settle().await;
        assert!(writes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_during_slow_write_follows_it() {
        let (write, mut writes) = recording_write(Ok(()), ms(1000));
        let start = Instant::now();
        let value = DebouncedValue::new("A".to_string(), DELAY, write);

        value.set("B".to_string());
        tokio::time::sleep(ms(700)).await;
        value.set("C".to_string());
        tokio::time::sleep(ms(2000)).await;
        settle().await;

        let (first, first_at) = writes.try_recv().unwrap();
        let (second, second_at) = writes.try_recv().unwrap();
        assert_eq!(first, "B");
        assert_eq!(second, "C");
        assert!(first_at - start >= DELAY);
        // Deferred until the first write returned
        assert!(second_at - start >= ms(1600));
        assert!(writes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_follow_initializes_from_snapshots() {
        let (write, _writes) = recording_write(Ok(()), Duration::ZERO);
        let value = DebouncedValue::new(String::new(), DELAY, write);
        let (tx, rx) = watch::channel(Some("Mic".to_string()));

        value.follow(rx, |name: &Option<String>| name.clone());
        settle().await;
        assert_eq!(value.get(), "Mic");

        value.set("Vocal".to_string());
        settle().await;
        tx.send_replace(Some("Renamed elsewhere".to_string()));
        settle().await;
        assert_eq!(value.get(), "Vocal");

        tx.send_replace(None);
        settle().await;
        assert_eq!(value.get(), "Vocal");
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalesced_echo_and_revert_renders_revert() {
        let (write, mut writes) = recording_write(Ok(()), Duration::ZERO);
        let value = DebouncedValue::new("A".to_string(), DELAY, write);
        let (tx, rx) = watch::channel(Some("A".to_string()));
        value.follow(rx, |name: &Option<String>| name.clone());
        settle().await;

        value.set("B".to_string());
        tokio::time::sleep(ms(700)).await;
        settle().await;
        let (written, _) = writes.try_recv().unwrap();
        assert_eq!(written, "B");
        assert_eq!(value.get(), "B");

        // Both publishes land before the follower wakes
        tx.send_replace(Some("B".to_string()));
        tx.send_replace(Some("A".to_string()));
        settle().await;
        assert_eq!(value.get(), "A");
        assert!(writes.try_recv().is_err());
    }
}
