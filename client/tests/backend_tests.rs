//! Client against a mock backend served over real HTTP and WebSocket.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use mixdesk_client::config::DebounceConfig;
use mixdesk_client::{
    ApiClient, ApiError, ConnectionState, EventChannel, Session, SyncPhase, TrackSearch,
};
use mixdesk_types::api::{
    CreateInputRequest, CreatePlaylistRequest, OutputUpdate, PlaylistUpdate, TrackUpdate,
};
use mixdesk_types::{BrowsePath, ChannelId, DeskEvent, EntityId, PlayerState, TrackQuery};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const TOKEN: &str = "s3cret token";

#[derive(Default)]
struct Mock {
    inputs: Mutex<Vec<Value>>,
    requests: Mutex<Vec<String>>,
    input_listings: AtomicUsize,
    connections: AtomicUsize,
    /// Frames sent to every new event stream connection
    frames: Mutex<Vec<String>>,
    /// Close the first event stream connection right after its frames
    drop_first: bool,
    library: Mutex<Library>,
}

#[derive(Default)]
struct Library {
    roots: Vec<String>,
    /// Playlist id to name and track order
    playlists: BTreeMap<u64, (String, Vec<u64>)>,
}

impl Mock {
    fn log(&self, line: String) {
        self.requests.lock().unwrap().push(line);
    }
}

type Shared = State<Arc<Mock>>;

async fn list_inputs(State(mock): Shared, headers: HeaderMap) -> impl IntoResponse {
    let expected = format!("Bearer {}", TOKEN);
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, Json(json!("missing token")));
    }
    mock.input_listings.fetch_add(1, Ordering::SeqCst);
    let inputs = mock.inputs.lock().unwrap().clone();
    (StatusCode::OK, Json(Value::Array(inputs)))
}

async fn create_input(State(mock): Shared, Json(body): Json<Value>) -> Json<Value> {
    mock.log(format!("POST /audio/input {}", body));
    let input = json!({
        "id": "in-1",
        "display_name": body["display_name"],
        "type": "device",
        "name": body["name"],
    });
    mock.inputs.lock().unwrap().push(input.clone());
    Json(json!([input]))
}

async fn update_output(
    State(mock): Shared,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    mock.log(format!("PUT /audio/output/{} {}", id, body));
    StatusCode::OK
}

async fn delete_output(Path(id): Path<String>) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, format!("no output {}", id))
}

async fn add_channel(Path(mixer): Path<String>) -> Json<Value> {
    assert_eq!(mixer, "mx");
    Json(json!(4))
}

async fn player_state() -> Json<Value> {
    Json(json!("playing"))
}

async fn player_tracks() -> Json<Value> {
    Json(json!([{"id": 11, "type": "loop"}]))
}

async fn jingle_count() -> Json<Value> {
    Json(json!(5))
}

async fn jingle_playlist() -> Json<Value> {
    Json(json!(""))
}

async fn search(State(mock): Shared, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let query = params.get("query").cloned().unwrap_or_default();
    mock.log(format!(
        "GET /library/track {} {} {}",
        params.get("results").map_or("", String::as_str),
        params.get("page").map_or("", String::as_str),
        query
    ));
    Json(json!({
        "count": 21,
        "tracks": [{"id": 1, "artist": "Nina", "title": query, "length": 181.0}],
    }))
}

fn track_json(id: u64) -> Value {
    json!({
        "id": id,
        "artist": "Nina",
        "title": format!("Track {}", id),
        "length": 60.0,
        "location": format!("/srv/music/{}.mp3", id),
    })
}

async fn track_info(Path(id): Path<u64>) -> Json<Value> {
    Json(track_json(id))
}

async fn update_track(
    State(mock): Shared,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> Json<Value> {
    mock.log(format!("PUT /library/track/{} {}", id, body));
    Json(json!(true))
}

async fn list_playlists(State(mock): Shared) -> Json<Value> {
    let library = mock.library.lock().unwrap();
    let playlists: Vec<Value> = library
        .playlists
        .iter()
        .map(|(id, (name, _))| json!({"id": id, "name": name}))
        .collect();
    Json(Value::Array(playlists))
}

async fn create_playlist(State(mock): Shared, Json(body): Json<Value>) -> Json<Value> {
    let mut library = mock.library.lock().unwrap();
    let id = library.playlists.keys().last().map_or(1, |last| last + 1);
    let name = body["name"].as_str().unwrap_or_default().to_string();
    library.playlists.insert(id, (name, Vec::new()));
    Json(json!(id))
}

async fn playlist_tracks(State(mock): Shared, Path(id): Path<u64>) -> impl IntoResponse {
    let library = mock.library.lock().unwrap();
    match library.playlists.get(&id) {
        Some((_, tracks)) => {
            let tracks: Vec<Value> = tracks.iter().copied().map(track_json).collect();
            (StatusCode::OK, Json(Value::Array(tracks)))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"message": "no playlist"}))),
    }
}

async fn update_playlist(
    State(mock): Shared,
    Path(id): Path<u64>,
    Json(body): Json<Value>,
) -> StatusCode {
    mock.log(format!("PUT /playlist/{} {}", id, body));
    let mut library = mock.library.lock().unwrap();
    let Some((name, tracks)) = library.playlists.get_mut(&id) else {
        return StatusCode::NOT_FOUND;
    };
    if let Some(new_name) = body["name"].as_str() {
        *name = new_name.to_string();
    }
    if let Some(order) = body["tracks"].as_array() {
        *tracks = order.iter().filter_map(Value::as_u64).collect();
    }
    StatusCode::OK
}

async fn delete_playlist(State(mock): Shared, Path(id): Path<u64>) -> StatusCode {
    match mock.library.lock().unwrap().playlists.remove(&id) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn library_roots(State(mock): Shared) -> Json<Value> {
    Json(json!(mock.library.lock().unwrap().roots))
}

async fn add_library_root(State(mock): Shared, Json(body): Json<Value>) -> Json<Value> {
    let directory = body["directory"].as_str().unwrap_or_default().to_string();
    mock.library.lock().unwrap().roots.push(directory);
    Json(json!(true))
}

async fn remove_library_root(State(mock): Shared, Json(body): Json<Value>) -> Json<Value> {
    let directory = body["directory"].as_str().unwrap_or_default();
    mock.library.lock().unwrap().roots.retain(|root| root != directory);
    Json(json!(true))
}

async fn browse_root(State(mock): Shared) -> Json<Value> {
    mock.log("GET /browse".to_string());
    Json(json!(["home", "srv"]))
}

async fn browse_dir(State(mock): Shared, Path(path): Path<String>) -> impl IntoResponse {
    mock.log(format!("GET /browse/{}", path));
    match path.as_str() {
        "srv/My Music" => (StatusCode::OK, Json(json!(["Live sets", "Jingles"]))),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Directory does not exist"})),
        ),
    }
}

async fn events(
    ws: WebSocketUpgrade,
    State(mock): Shared,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    assert_eq!(params.get("auth_token").map(String::as_str), Some(TOKEN));
    ws.on_upgrade(move |socket| serve_events(socket, mock))
}

async fn serve_events(mut socket: WebSocket, mock: Arc<Mock>) {
    let connection = mock.connections.fetch_add(1, Ordering::SeqCst);
    let frames = mock.frames.lock().unwrap().clone();
    for frame in frames {
        if socket.send(Message::Text(frame.into())).await.is_err() {
            return;
        }
    }
    if connection == 0 && mock.drop_first {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    while let Some(Ok(_)) = socket.recv().await {}
}

async fn spawn_backend(mock: Arc<Mock>) -> String {
    let app = Router::new()
        .route("/audio/input", get(list_inputs).post(create_input))
        .route("/audio/output/{id}", put(update_output).delete(delete_output))
        .route("/audio/mixer/{id}/channel", post(add_channel))
        .route("/player/{id}/state", get(player_state))
        .route("/player/{id}/tracks", get(player_tracks))
        .route("/player/{id}/jingle_count", get(jingle_count))
        .route("/player/{id}/jingle_playlist", get(jingle_playlist))
        .route("/library/track", get(search))
        .route("/library/track/{id}", put(update_track))
        .route("/library/track/{id}/info", get(track_info))
        .route(
            "/library",
            get(library_roots)
                .post(add_library_root)
                .delete(remove_library_root),
        )
        .route("/playlist", get(list_playlists).post(create_playlist))
        .route(
            "/playlist/{id}",
            get(playlist_tracks)
                .put(update_playlist)
                .delete(delete_playlist),
        )
        .route("/browse", get(browse_root))
        .route("/browse/{*path}", get(browse_dir))
        .route("/events", get(events))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

async fn settle<T: Clone>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) -> T {
    let value = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(pred))
        .await
        .expect("timed out waiting for state")
        .expect("sender dropped")
        .clone();
    value
}

#[tokio::test]
async fn test_requests_carry_bearer_token() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock.clone()).await;

    let anonymous = ApiClient::new(format!("http://{}", addr));
    let err = anonymous.list_inputs().await.unwrap_err();
    assert_eq!(err, ApiError::Http(401, "\"missing token\"".to_string()));

    let client = ApiClient::new_with_auth(format!("http://{}/", addr), Some(TOKEN.to_string()));
    assert!(client.list_inputs().await.unwrap().is_empty());
    assert_eq!(mock.input_listings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_input_returns_created_list() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock.clone()).await;
    let client = ApiClient::new_with_auth(format!("http://{}", addr), Some(TOKEN.to_string()));

    let created = client
        .create_input(&CreateInputRequest::device("hw:1"))
        .await
        .unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].id, EntityId::from("in-1"));
    assert_eq!(created[0].display_name, "hw:1");

    let listed = client.list_inputs().await.unwrap();
    assert_eq!(listed, created);
}

#[tokio::test]
async fn test_clearing_output_source_sends_empty_reference() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock.clone()).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let update = OutputUpdate {
        input: Some(None),
        ..Default::default()
    };
    client
        .update_output(&EntityId::from("out"), &update)
        .await
        .unwrap();

    let requests = mock.requests.lock().unwrap().clone();
    assert_eq!(requests, vec![r#"PUT /audio/output/out {"input":""}"#.to_string()]);
}

#[tokio::test]
async fn test_delete_of_unknown_entity_is_not_found() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let err = client
        .delete_output(&EntityId::from("gone"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let client = ApiClient::new("http://127.0.0.1:1");
    assert!(matches!(
        client.list_players().await,
        Err(ApiError::Network(_))
    ));
}

#[tokio::test]
async fn test_add_channel_returns_channel_id() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let id = client.add_channel(&EntityId::from("mx")).await.unwrap();
    assert_eq!(id, ChannelId(4));
}

#[tokio::test]
async fn test_player_detail_gathers_sub_resources() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let detail = client.player_detail(&EntityId::from(3u64)).await.unwrap();
    assert_eq!(detail.state, PlayerState::Playing);
    assert_eq!(detail.jingle_count, Some(5));
    assert_eq!(detail.jingle_playlist, None);
    assert_eq!(detail.tracks.len(), 1);
    assert_eq!(detail.tracks[0].id, 11);
}

#[tokio::test]
async fn test_track_search_encodes_query() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock.clone()).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let page = client
        .search_tracks(&TrackQuery::new("rock & roll"))
        .await
        .unwrap();
    assert_eq!(page.count, 21);
    assert_eq!(page.tracks[0].title, "rock & roll");
    assert_eq!(
        mock.requests.lock().unwrap().clone(),
        vec!["GET /library/track 10 0 rock & roll".to_string()]
    );
}

#[tokio::test]
async fn test_track_details_can_be_read_and_corrected() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock.clone()).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let track = client.track_info(8).await.unwrap();
    assert_eq!(track.title, "Track 8");
    assert_eq!(track.location.as_deref(), Some("/srv/music/8.mp3"));

    let update = TrackUpdate {
        title: Some("Intro".to_string()),
        ..Default::default()
    };
    client.update_track(8, &update).await.unwrap();
    assert_eq!(
        mock.requests.lock().unwrap().clone(),
        vec![r#"PUT /library/track/8 {"title":"Intro"}"#.to_string()]
    );
}

#[tokio::test]
async fn test_playlist_lifecycle() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock.clone()).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let id = client
        .create_playlist(&CreatePlaylistRequest {
            name: "Morning".to_string(),
        })
        .await
        .unwrap();
    assert!(client.get_playlist(id).await.unwrap().is_empty());

    client
        .update_playlist(id, &PlaylistUpdate::reorder([3, 1, 2]))
        .await
        .unwrap();
    let tracks = client.get_playlist(id).await.unwrap();
    assert_eq!(tracks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![3, 1, 2]);
    assert_eq!(tracks[0].title, "Track 3");

    client
        .update_playlist(id, &PlaylistUpdate::rename("Breakfast"))
        .await
        .unwrap();
    let listed = client.list_playlists().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].name, "Breakfast");
    // Renaming leaves the order alone
    assert_eq!(client.get_playlist(id).await.unwrap().len(), 3);

    client.delete_playlist(id).await.unwrap();
    assert!(client.list_playlists().await.unwrap().is_empty());
    assert!(client.get_playlist(id).await.unwrap_err().is_not_found());
    assert_eq!(
        mock.requests.lock().unwrap().clone(),
        vec![
            format!(r#"PUT /playlist/{} {{"tracks":[3,1,2]}}"#, id),
            format!(r#"PUT /playlist/{} {{"name":"Breakfast"}}"#, id),
        ]
    );
}

#[tokio::test]
async fn test_library_roots_are_added_and_removed_by_directory() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock).await;
    let client = ApiClient::new(format!("http://{}", addr));

    client.add_library_root("/srv/music").await.unwrap();
    client.add_library_root("/mnt/dj").await.unwrap();
    assert_eq!(
        client.list_library_roots().await.unwrap(),
        vec!["/srv/music".to_string(), "/mnt/dj".to_string()]
    );

    client.remove_library_root("/srv/music").await.unwrap();
    assert_eq!(
        client.list_library_roots().await.unwrap(),
        vec!["/mnt/dj".to_string()]
    );
}

#[tokio::test]
async fn test_browse_walks_backend_directories() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock.clone()).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let top = client.browse(&BrowsePath::root()).await.unwrap();
    assert_eq!(top, vec!["home".to_string(), "srv".to_string()]);

    let music = BrowsePath::root().join("srv").join("My Music");
    let dirs = client.browse(&music).await.unwrap();
    assert_eq!(dirs, vec!["Live sets".to_string(), "Jingles".to_string()]);

    let err = client.browse(&music.join("gone")).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(
        mock.requests.lock().unwrap().clone(),
        vec![
            "GET /browse".to_string(),
            "GET /browse/srv/My Music".to_string(),
            "GET /browse/srv/My Music/gone".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_debounced_search_only_fetches_settled_query() {
    let mock = Arc::new(Mock::default());
    let addr = spawn_backend(mock.clone()).await;
    let client = ApiClient::new(format!("http://{}", addr));

    let search = TrackSearch::new(client, Duration::from_millis(50), CancellationToken::new());
    let mut results = search.results();
    search.set_query("ja");
    search.set_query("jaz");
    search.set_query("jazz");

    let page = settle(&mut results, |r| r.query == "jazz" && !r.loading).await;
    assert_eq!(page.count, 21);
    assert_eq!(page.tracks[0].title, "jazz");
    assert_eq!(mock.requests.lock().unwrap().len(), 1);

    search.set_query("");
    let cleared = settle(&mut results, |r| r.query.is_empty()).await;
    assert!(cleared.tracks.is_empty());
}

#[tokio::test]
async fn test_event_stream_skips_undecodable_frames() {
    let mock = Arc::new(Mock {
        frames: Mutex::new(vec![
            "not json".to_string(),
            json!({"type": "bogus_event", "data": {}}).to_string(),
            json!({"type": "input_remove", "data": {"id": "a"}}).to_string(),
        ]),
        ..Default::default()
    });
    let addr = spawn_backend(mock).await;

    let channel = EventChannel::new(
        format!("ws://{}/events", addr),
        Some(TOKEN.to_string()),
        16,
    );
    let mut rx = channel.subscribe();
    let cancel = CancellationToken::new();
    let task = channel.connect(cancel.clone());

    let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("no event")
        .unwrap();
    match event {
        DeskEvent::InputRemove(r) => assert_eq!(r.id, EntityId::from("a")),
        other => panic!("unexpected event {:?}", other),
    }
    assert!(channel.connection_state().borrow().is_connected());

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(*channel.connection_state().borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_session_resyncs_after_reconnect() {
    let mock = Arc::new(Mock {
        inputs: Mutex::new(vec![
            json!({"id": "a", "display_name": "Mic", "type": "device", "name": "hw:0"}),
            json!({"id": "b", "display_name": "Line", "type": "device", "name": "hw:1"}),
        ]),
        drop_first: true,
        ..Default::default()
    });
    let addr = spawn_backend(mock.clone()).await;

    let api = Arc::new(ApiClient::new_with_auth(
        format!("http://{}", addr),
        Some(TOKEN.to_string()),
    ));
    let events = EventChannel::new(
        format!("ws://{}/events", addr),
        Some(TOKEN.to_string()),
        16,
    );
    let (handle, _session) =
        Session::new(DebounceConfig::default(), api.clone(), api, events.clone()).spawn();
    let mut inputs = handle.inputs();
    settle(&mut inputs, |s| s.len() == 2 && s.phase() == SyncPhase::Live).await;

    // "b" goes away while no event stream is there to announce it.
    mock.inputs.lock().unwrap().retain(|i| i["id"] != "b");
    let _stream = events.connect(handle.cancellation().child_token());

    let snapshot = settle(&mut inputs, |s| {
        s.phase() == SyncPhase::Live && s.len() == 1
    })
    .await;
    assert!(snapshot.contains(&EntityId::from("a")));

    // Initial seed, first connect and reconnect.
    tokio::time::timeout(Duration::from_secs(10), async {
        while mock.connections.load(Ordering::SeqCst) < 2
            || mock.input_listings.load(Ordering::SeqCst) < 3
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("no reseed after reconnect");
    settle(&mut handle.connection(), |c| c.is_connected()).await;

    handle.shutdown();
}
