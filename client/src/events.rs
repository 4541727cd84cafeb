//! Push-event channel over WebSocket.
//!
//! One connection task per [`EventChannel`] reads text frames, decodes them
//! into [`DeskEvent`]s and fans them out over a broadcast channel. The task
//! reconnects with exponential backoff until cancelled.

use crate::state::ConnectionState;
use futures_util::stream::StreamExt;
use mixdesk_types::DeskEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Default number of undelivered events kept per subscriber.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Handle to the push-event stream of one backend.
///
/// Cloning shares the underlying broadcast and connection state.
#[derive(Clone)]
pub struct EventChannel {
    url: String,
    auth_token: Option<String>,
    events: broadcast::Sender<DeskEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    /// Number of connections established so far
    epoch: Arc<watch::Sender<u64>>,
}

impl EventChannel {
    pub fn new(url: impl Into<String>, auth_token: Option<String>, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (epoch, _) = watch::channel(0);
        Self {
            url: url.into(),
            auth_token,
            events,
            state: Arc::new(state),
            epoch: Arc::new(epoch),
        }
    }

    /// A channel that is never connected; events only arrive through
    /// [`EventChannel::publish`].
    pub fn detached(capacity: usize) -> Self {
        Self::new(String::new(), None, capacity)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// New receiver of all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DeskEvent> {
        self.events.subscribe()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Receiver of the connection count.
    ///
    /// Every change is a new connection, even when the state watch only
    /// ever shows `Connected` because a drop and reconnect fell between
    /// two reads.
    pub fn connection_epoch(&self) -> watch::Receiver<u64> {
        self.epoch.subscribe()
    }

    /// Record that a new connection was established.
    pub fn mark_connected(&self) {
        self.set_state(ConnectionState::Connected);
        self.epoch.send_modify(|epoch| *epoch += 1);
    }

    /// Deliver an event to current subscribers.
    pub fn publish(&self, event: DeskEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// URL with the auth token appended as query parameter if present.
    fn connect_url(&self) -> String {
        match self.auth_token {
            Some(ref token) => {
                let token = urlencoding::encode(token);
                if self.url.contains('?') {
                    format!("{}&auth_token={}", self.url, token)
                } else {
                    format!("{}?auth_token={}", self.url, token)
                }
            }
            None => self.url.clone(),
        }
    }

    /// Connect and keep reconnecting until `cancel` fires.
    pub fn connect(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let channel = self.clone();
        tokio::spawn(async move {
            channel.connection_loop(cancel).await;
        })
    }

    async fn connection_loop(self, cancel: CancellationToken) {
        let url = self.connect_url();
        info!("Connecting to event stream: {}", self.url);

        let mut attempt = 1u32;

        loop {
            self.set_state(ConnectionState::Reconnecting { attempt });
            debug!("Event stream connection attempt {} to: {}", attempt, self.url);

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                result = connect_async(url.as_str()) => result,
            };

            match connected {
                Ok((mut ws_stream, _)) => {
                    info!("Event stream connected");
                    self.mark_connected();
                    attempt = 1;

                    loop {
                        let msg_result = tokio::select! {
                            _ = cancel.cancelled() => {
                                let _ = ws_stream.close(None).await;
                                self.set_state(ConnectionState::Disconnected);
                                info!("Event stream closed");
                                return;
                            }
                            next = ws_stream.next() => match next {
                                Some(msg_result) => msg_result,
                                None => break,
                            },
                        };

                        match msg_result {
                            Ok(Message::Text(text)) => self.dispatch(text.as_str()),
                            Ok(Message::Binary(_)) => {
                                trace!("Received binary message (ignored)");
                            }
                            Ok(Message::Ping(_)) => {
                                // Pong is automatically handled by tokio-tungstenite
                                trace!("Received ping");
                            }
                            Ok(Message::Pong(_)) => {
                                trace!("Received pong");
                            }
                            Ok(Message::Close(_)) => {
                                info!("Event stream closed by server");
                                break;
                            }
                            Ok(Message::Frame(_)) => {}
                            Err(e) => {
                                error!("Event stream error: {}", e);
                                break;
                            }
                        }
                    }

                    warn!("Event stream connection lost, will attempt to reconnect");
                }
                Err(e) => {
                    error!("Failed to connect event stream: {}", e);
                }
            }

            self.set_state(ConnectionState::Disconnected);

            // Exponential backoff, at most 10 seconds
            let delay = backoff_delay(attempt);
            debug!("Waiting {:?} before reconnection attempt", delay);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }

        self.set_state(ConnectionState::Disconnected);
    }

    fn dispatch(&self, text: &str) {
        trace!("Received event frame: {}", text);
        match serde_json::from_str::<DeskEvent>(text) {
            Ok(event) => {
                trace!("Parsed event: {}", event.description());
                self.publish(event);
            }
            Err(err) => {
                warn!("Failed to parse event frame: {}", err);
            }
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let ms = (1000u64 * 2u64.pow(attempt.clamp(1, 4) - 1)).min(10_000);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixdesk_types::EntityRef;

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(9), Duration::from_secs(8));
    }

    #[test]
    fn test_auth_token_query_param() {
        let plain = EventChannel::new("ws://host/events", None, 8);
        let authed = EventChannel::new("ws://host/events", Some("a b".to_string()), 8);
        let with_query = EventChannel::new("ws://host/events?v=1", Some("t".to_string()), 8);

        assert_eq!(plain.connect_url(), "ws://host/events");
        assert_eq!(authed.connect_url(), "ws://host/events?auth_token=a%20b");
        assert_eq!(with_query.connect_url(), "ws://host/events?v=1&auth_token=t");
    }

    #[tokio::test]
    async fn test_dispatch_skips_undecodable_frames() {
        let channel = EventChannel::detached(8);
        let mut rx = channel.subscribe();

        channel.dispatch("{not json");
        channel.dispatch(r#"{"type": "input_remove", "data": {"id": "in-1"}}"#);

        let event = rx.recv().await.unwrap();
        assert_eq!(event, DeskEvent::InputRemove(EntityRef { id: "in-1".into() }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_every_connection_moves_epoch() {
        let channel = EventChannel::detached(8);
        let mut epoch = channel.connection_epoch();
        let state = channel.connection_state();

        channel.mark_connected();
        channel.set_state(ConnectionState::Disconnected);
        channel.mark_connected();

        assert_eq!(*state.borrow(), ConnectionState::Connected);
        assert!(epoch.has_changed().unwrap());
        assert_eq!(*epoch.borrow_and_update(), 2);
    }
}
