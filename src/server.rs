use std::future::Future;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, error, info, warn};

use crate::audio::Synth;
use crate::error::{AudioError, TheoryError};
use crate::pages;
use crate::registry::{ConnectionState, HubHandle};
use crate::state::AppState;
use crate::theory::{PitchClass, ScaleKind, SpecificChord, SpecificNote};

const NOTE_SECONDS: f32 = 1.0;
const CHORD_SECONDS: f32 = 1.0;

/// Failures surfaced to HTTP clients.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    BadRequest(#[from] TheoryError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Audio(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);
    let favicon = ServeFile::new(state.config.static_dir.join("favicon.ico"));
    Router::new()
        .route("/", get(|| async { Redirect::to("/live") }))
        .route("/live", get(live))
        .route("/ws", get(ws_upgrade))
        .route("/play_note/:note/:octave", get(play_note))
        .route("/play_chord/:chord", get(play_chord))
        .route("/diads", get(diads))
        .route("/triads", get(triads))
        .route("/triads/lowest_up", get(lowest_up))
        .route("/triads/lowest_down", get(lowest_down))
        .route("/available_scales", get(available_scales))
        .route("/circle/:kind/", get(circle))
        .route("/scale_not_found", get(scale_not_found))
        .route_service("/favicon.ico", favicon)
        .nest_service("/static", static_files)
        .with_state(state)
}

/// Serves until `shutdown` flips to `true`.
pub async fn serve(
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(state.config.bind).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("HTTP server shutting down");
        })
        .await
}

/// Waits for `signal`, then asks every task to stop: the ingestion loop and
/// server through `shutdown`, viewers through the hub, and the audio worker.
///
/// If the signal cannot be listened for, `shutdown` is kept alive forever
/// so its receivers never see the sender vanish.
pub async fn relay_shutdown<F>(
    signal: F,
    shutdown: watch::Sender<bool>,
    hub: HubHandle,
    synth: Arc<Synth>,
) where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
    let _ = shutdown.send(true);
    hub.shutdown();
    synth.stop();
}

async fn live(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(pages::live(&state.config.scale))
}

async fn play_note(
    State(state): State<Arc<AppState>>,
    Path((pitch, octave)): Path<(String, i8)>,
) -> Result<Json<Value>, ApiError> {
    let pitch: PitchClass = pitch.parse()?;
    let note = SpecificNote::new(pitch, octave);
    info!(%note, "play note");
    state.synth.play([note], NOTE_SECONDS)?;
    Ok(Json(json!({ "status": "play_note success" })))
}

async fn play_chord(
    State(state): State<Arc<AppState>>,
    Path(chord): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let chord: SpecificChord = chord.parse()?;
    info!(%chord, "play chord");
    state.synth.play(chord.notes(), CHORD_SECONDS)?;
    Ok(Json(json!({ "status": "play_chord success" })))
}

async fn diads(State(state): State<Arc<AppState>>) -> Html<String> {
    let config = &state.config;
    let range = config.scale.note_range(config.range_low, config.range_high);
    Html(pages::interval_table(&config.scale, &range, None))
}

#[derive(Debug, Deserialize)]
struct LowestQuery {
    lowest: Option<String>,
}

impl LowestQuery {
    fn resolve(&self, state: &AppState) -> Result<SpecificNote, TheoryError> {
        match &self.lowest {
            Some(lowest) => lowest.parse(),
            None => Ok(state.config.lowest),
        }
    }
}

async fn triads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LowestQuery>,
) -> Result<Html<String>, ApiError> {
    let lowest = query.resolve(&state)?;
    let config = &state.config;
    let range = config.scale.note_range(config.range_low, config.range_high);
    Ok(Html(pages::interval_table(&config.scale, &range, Some(lowest))))
}

fn move_lowest(state: &AppState, query: &LowestQuery, steps: i32) -> Result<Redirect, ApiError> {
    let lowest = state.config.scale.add_note(query.resolve(state)?, steps)?;
    debug!(%lowest, "moved lowest note");
    let param = lowest.to_string().replace('#', "%23");
    Ok(Redirect::to(&format!("/triads?lowest={param}")))
}

async fn lowest_up(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LowestQuery>,
) -> Result<Redirect, ApiError> {
    move_lowest(&state, &query, 1)
}

async fn lowest_down(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LowestQuery>,
) -> Result<Redirect, ApiError> {
    move_lowest(&state, &query, -1)
}

async fn available_scales() -> Html<String> {
    Html(pages::available_scales())
}

async fn circle(Path(kind): Path<String>) -> Response {
    match kind.parse::<ScaleKind>() {
        Ok(kind) => Html(pages::circle(kind)).into_response(),
        Err(_) => Redirect::to("/scale_not_found").into_response(),
    }
}

async fn scale_not_found() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, Html(pages::scale_not_found()))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let conn_state = ConnectionState::Connecting;
    debug!(?conn_state, "viewer handshake requested");
    let hub = state.hub.clone();
    ws.on_failed_upgrade(|e| warn!("viewer handshake failed: {}", e))
        .on_upgrade(move |socket| viewer_session(socket, hub, conn_state))
}

/// Forwards chord payloads to one viewer until either side goes away.
async fn viewer_session(socket: WebSocket, hub: HubHandle, mut conn_state: ConnectionState) {
    if !conn_state.transition(ConnectionState::Open) {
        warn!(?conn_state, "viewer session cannot open");
        return;
    }
    let (id, mut payloads) = hub.register();
    debug!(id, ?conn_state, "viewer registered");

    let (mut sink, mut stream) = socket.split();
    let mut writer = tokio::spawn(async move {
        while let Some(payload) = payloads.recv().await {
            let text = match serde_json::to_string(&*payload) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode payload {}: {}", payload.seq, e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        // hub closed our queue
        let _ = sink.send(Message::Close(None)).await;
    });
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    if conn_state.transition(ConnectionState::Closed) {
        hub.unregister(id);
    }
    debug!(id, ?conn_state, "viewer session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::ChordBroadcaster;
    use crate::config::{AppConfig, Args};
    use crate::registry::spawn_hub;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use clap::Parser;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
    use tower::ServiceExt;

    type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    fn app() -> Router {
        let args = Args::parse_from(["chordcast", "--no-audio"]);
        let config = AppConfig::from_args(&args).unwrap();
        let (hub, _task) = spawn_hub();
        router(AppState::new(config, hub, Synth::new()))
    }

    async fn fetch(uri: &str) -> Response {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn root_redirects_to_live_view() {
        let response = fetch("/").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/live");
    }

    #[tokio::test]
    async fn play_note_without_audio_is_unavailable() {
        let response = fetch("/play_note/C/4").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn bad_pitch_is_rejected() {
        let response = fetch("/play_note/H/4").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let response = fetch("/play_chord/C4_X4").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lowest_moves_by_scale_degree() {
        let response = fetch("/triads/lowest_up?lowest=C1").await;
        assert_eq!(response.headers()[header::LOCATION], "/triads?lowest=D1");
        let response = fetch("/triads/lowest_down").await;
        assert_eq!(response.headers()[header::LOCATION], "/triads?lowest=B0");
    }

    #[tokio::test]
    async fn triads_render_requested_lowest() {
        let response = fetch("/triads?lowest=E1").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("triads lowest=E1"));
    }

    #[tokio::test]
    async fn unknown_circle_redirects() {
        let response = fetch("/circle/ionian/").await;
        assert_eq!(response.headers()[header::LOCATION], "/scale_not_found");
        let response = fetch("/circle/dorian/").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn favicon_is_served_from_static_dir() {
        let response = fetch("/favicon.ico").await;
        assert_eq!(response.status(), StatusCode::OK);
        let icon = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!icon.is_empty());
    }

    #[tokio::test]
    async fn lowest_up_past_the_top_octave_is_rejected() {
        let response = fetch("/triads/lowest_up?lowest=B127").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    async fn serve_on_loopback() -> (SocketAddr, HubHandle) {
        let args = Args::parse_from(["chordcast", "--no-audio"]);
        let config = AppConfig::from_args(&args).unwrap();
        let (hub, _task) = spawn_hub();
        let state = AppState::new(config, hub.clone(), Synth::new());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(state)).await });
        (addr, hub)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();
        client
    }

    async fn wait_for_viewers(hub: &HubHandle, expected: usize) {
        for _ in 0..500 {
            if hub.viewer_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} registered viewers");
    }

    async fn next_message(client: &mut Client) -> Option<tungstenite::Message> {
        tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .and_then(Result::ok)
    }

    async fn next_payload(client: &mut Client) -> Value {
        loop {
            match next_message(client).await {
                Some(tungstenite::Message::Text(text)) => {
                    return serde_json::from_str(&text).unwrap();
                }
                Some(_) => continue,
                None => panic!("viewer socket closed before a payload arrived"),
            }
        }
    }

    #[tokio::test]
    async fn viewers_get_payloads_until_they_close() {
        let (addr, hub) = serve_on_loopback().await;
        let mut a = connect(addr).await;
        let mut b = connect(addr).await;
        wait_for_viewers(&hub, 2).await;

        let mut broadcaster = ChordBroadcaster::new("C major".parse().unwrap(), hub.clone());
        let triad: SpecificChord = "C4_E4_G4".parse().unwrap();
        broadcaster.broadcast(&triad);
        for client in [&mut a, &mut b] {
            let payload = next_payload(client).await;
            assert_eq!(payload["seq"], 1);
            assert_eq!(payload["chord"], "C4_E4_G4");
            assert_eq!(payload["chord_abstract"], "CEG");
        }

        a.close(None).await.unwrap();
        wait_for_viewers(&hub, 1).await;

        broadcaster.broadcast(&SpecificChord::default());
        let payload = next_payload(&mut b).await;
        assert_eq!(payload["seq"], 2);
        assert_eq!(payload["chord"], "<empty>");
    }

    #[tokio::test]
    async fn dropped_viewer_is_unregistered() {
        let (addr, hub) = serve_on_loopback().await;
        let a = connect(addr).await;
        let mut b = connect(addr).await;
        wait_for_viewers(&hub, 2).await;

        drop(a);
        wait_for_viewers(&hub, 1).await;

        let mut broadcaster = ChordBroadcaster::new("C major".parse().unwrap(), hub.clone());
        broadcaster.broadcast(&"D4".parse().unwrap());
        assert_eq!(next_payload(&mut b).await["chord"], "D4");
    }

    #[tokio::test]
    async fn hub_shutdown_closes_viewer_sockets() {
        let (addr, hub) = serve_on_loopback().await;
        let mut client = connect(addr).await;
        wait_for_viewers(&hub, 1).await;

        hub.shutdown();
        loop {
            match next_message(&mut client).await {
                Some(tungstenite::Message::Close(_)) | None => break,
                Some(_) => continue,
            }
        }
    }

    #[tokio::test]
    async fn shutdown_signal_stops_everything() {
        let (hub, hub_task) = spawn_hub();
        let (_id, mut viewer) = hub.register();
        let (tx, mut rx) = watch::channel(false);
        relay_shutdown(std::future::ready(Ok(())), tx, hub, Synth::new()).await;
        assert!(*rx.borrow_and_update());
        hub_task.await.unwrap();
        assert!(viewer.recv().await.is_none());
    }

    #[tokio::test]
    async fn unavailable_signal_keeps_serving() {
        let (hub, _hub_task) = spawn_hub();
        let (tx, rx) = watch::channel(false);
        let failing = std::future::ready(Err(std::io::Error::other("no signal handler")));
        let relay = tokio::spawn(relay_shutdown(failing, tx, hub.clone(), Synth::new()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!relay.is_finished());
        assert!(!*rx.borrow());
        assert_eq!(rx.has_changed().ok(), Some(false));
        assert_eq!(hub.viewer_count().await, 0);
        let (_id, _viewer) = hub.register();
        assert_eq!(hub.viewer_count().await, 1);
        relay.abort();
    }
}
