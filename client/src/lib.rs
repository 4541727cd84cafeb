//! Synchronized client state for the mixdesk audio control panel.
//!
//! The backend owns inputs, outputs, mixers (with their channels) and live
//! players. This crate mirrors them locally: each collection is seeded from a
//! REST fetch, kept current by WebSocket push events, and published as
//! immutable snapshots. User edits go through debounced values that write
//! back once editing settles.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mixdesk_client::{ApiClient, ClientConfig, EventChannel, Session};
//!
//! # async fn demo() {
//! let config = ClientConfig::default();
//! let api = Arc::new(ApiClient::new_with_auth(config.api_url(), None));
//! let events = EventChannel::new(config.events_url(), None, config.session.event_buffer);
//!
//! let (handle, _task) = Session::new(config.debounce, api.clone(), api, events.clone()).spawn();
//! events.connect(handle.cancellation().child_token());
//!
//! let inputs = handle.inputs();
//! println!("{} inputs", inputs.borrow().len());
//! # }
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod api;
pub mod config;
pub mod editable;
pub mod events;
pub mod routing;
pub mod search;
pub mod session;
pub mod state;
pub mod store;

pub use api::{ApiClient, ApiError, ApiResult, DeleteTarget, SeedSource, WriteGateway};
pub use config::ClientConfig;
pub use editable::{DebouncedValue, EditableField};
pub use events::EventChannel;
pub use routing::{RouteSource, Selection, SourceCatalog, SourceKind};
pub use search::{SearchResults, TrackSearch};
pub use session::{Session, SessionHandle};
pub use state::ConnectionState;
pub use store::{EntityStore, Snapshot, SyncPhase};
