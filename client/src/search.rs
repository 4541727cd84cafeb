//! Debounced track library search.

use crate::api::{ApiClient, ApiResult};
use futures_util::future::{BoxFuture, OptionFuture};
use mixdesk_types::{Track, TrackPage, TrackQuery};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, warn};

/// Latest search outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    pub query: String,
    /// A query is waiting to settle or being fetched
    pub loading: bool,
    /// Total matches across all pages
    pub count: u64,
    pub tracks: Vec<Track>,
}

/// Search box backed by `GET /library/track`.
///
/// Each query restarts the settle timer; a result for a query that has since
/// been replaced is discarded. An empty query clears the results.
pub struct TrackSearch {
    queries: mpsc::UnboundedSender<String>,
    results: watch::Receiver<SearchResults>,
    _guard: DropGuard,
}

impl TrackSearch {
    pub fn new(api: ApiClient, delay: Duration, cancel: CancellationToken) -> Self {
        let (queries, rx) = mpsc::unbounded_channel();
        let (tx, results) = watch::channel(SearchResults::default());
        let cancel = cancel.child_token();
        tokio::spawn(run(api, delay, rx, tx, cancel.clone()));
        Self {
            queries,
            results,
            _guard: cancel.drop_guard(),
        }
    }

    pub fn set_query(&self, query: impl Into<String>) {
        let _ = self.queries.send(query.into());
    }

    pub fn results(&self) -> watch::Receiver<SearchResults> {
        self.results.clone()
    }
}

type PageFuture = BoxFuture<'static, ApiResult<TrackPage>>;

async fn run(
    api: ApiClient,
    delay: Duration,
    mut queries: mpsc::UnboundedReceiver<String>,
    results: watch::Sender<SearchResults>,
    cancel: CancellationToken,
) {
    let mut pending: Option<(String, Instant)> = None;
    let mut in_flight: Option<(String, PageFuture)> = None;

    loop {
        let deadline = pending.as_ref().map(|(_, at)| *at);

        tokio::select! {
            _ = cancel.cancelled() => break,
            query = queries.recv() => {
                let Some(query) = query else { break };
                in_flight = None;
                if query.is_empty() {
                    pending = None;
                    results.send_replace(SearchResults::default());
                } else {
                    pending = Some((query.clone(), Instant::now() + delay));
                    results.send_modify(|r| {
                        r.query = query;
                        r.loading = true;
                    });
                }
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some((query, _)) = pending.take() {
                    debug!("Searching library for {:?}", query);
                    let api = api.clone();
                    let request = TrackQuery::new(query.clone());
                    let fetch: PageFuture = Box::pin(async move { api.search_tracks(&request).await });
                    in_flight = Some((query, fetch));
                }
            }
            Some(result) = OptionFuture::from(in_flight.as_mut().map(|(_, fetch)| fetch)), if in_flight.is_some() => {
                let query = in_flight.take().map(|(query, _)| query).unwrap_or_default();
                match result {
                    Ok(page) => {
                        results.send_replace(SearchResults {
                            query,
                            loading: false,
                            count: page.count,
                            tracks: page.tracks,
                        });
                    }
                    Err(e) => {
                        warn!("Library search for {:?} failed: {}", query, e);
                        results.send_modify(|r| r.loading = false);
                    }
                }
            }
        }
    }
}
