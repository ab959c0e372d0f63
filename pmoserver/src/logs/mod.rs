//! Logs en mémoire exposés par HTTP
//!
//! Le [`SseLayer`] copie chaque événement `tracing` dans un buffer circulaire
//! ([`LogState`]) qui alimente `/log-dump` et le flux `/log-sse`.

mod sselayer;

use pmoconfig::get_config;
pub use sselayer::SseLayer;

use std::{
    collections::VecDeque,
    sync::{Arc, PoisonError, RwLock},
    time::SystemTime,
};

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::Level;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const LEVELS: [&str; 5] = ["ERROR", "WARN", "INFO", "DEBUG", "TRACE"];
const LIVE_CHANNEL_SIZE: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub level: String,
    pub target: String,
    pub message: String,
}

type LevelHandle = reload::Handle<LevelFilter, Registry>;

/// Buffer circulaire des derniers logs et diffusion en direct
#[derive(Clone)]
pub struct LogState {
    history: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
    live: broadcast::Sender<LogEntry>,
    level: Arc<RwLock<Level>>,
    level_handle: Arc<RwLock<Option<LevelHandle>>>,
}

impl LogState {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(LIVE_CHANNEL_SIZE);
        Self {
            history: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            live,
            level: Arc::new(RwLock::new(Level::TRACE)),
            level_handle: Arc::new(RwLock::new(None)),
        }
    }

    fn attach_reload_handle(&self, handle: LevelHandle, level: Level) {
        *self.level_handle.write().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = level;
    }

    /// Change le niveau maximal, y compris pour le subscriber global
    pub fn set_max_level(&self, level: Level) {
        *self.level.write().unwrap_or_else(PoisonError::into_inner) = level;

        let handle = self.level_handle.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = handle.as_ref() {
            if let Err(e) = handle.reload(LevelFilter::from_level(level)) {
                eprintln!("Failed to reload log level filter: {}", e);
            }
        }
    }

    pub fn get_max_level(&self) -> Level {
        *self.level.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, entry: LogEntry) {
        {
            let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
            while history.len() >= self.capacity {
                history.pop_front();
            }
            history.push_back(entry.clone());
        }
        // aucun abonné SSE : l'envoi échoue, sans conséquence
        let _ = self.live.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.live.subscribe()
    }

    pub fn dump(&self) -> Vec<LogEntry> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Filtres de `/log-sse` : niveaux cochés et recherche texte
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LogQuery {
    pub error: Option<bool>,
    pub warn: Option<bool>,
    pub info: Option<bool>,
    pub debug: Option<bool>,
    pub trace: Option<bool>,
    pub search: Option<String>,
}

/// Sérialise `entry` en événement SSE s'il passe le niveau courant et les filtres
fn to_event(state: &LogState, entry: &LogEntry, query: &LogQuery) -> Option<Event> {
    if !is_level_allowed(&entry.level, state.get_max_level()) || !filter_entry(entry, query) {
        return None;
    }
    serde_json::to_string(entry)
        .ok()
        .map(|json| Event::default().data(json))
}

/// Flux SSE : historique filtré puis logs en direct
pub async fn log_sse(
    State(state): State<LogState>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let mut live = state.subscribe();
    let history = state.dump();

    let stream = async_stream::stream! {
        for entry in &history {
            if let Some(event) = to_event(&state, entry, &query) {
                yield Ok::<_, axum::Error>(event);
            }
        }

        loop {
            match live.recv().await {
                Ok(entry) => {
                    if let Some(event) = to_event(&state, &entry, &query) {
                        yield Ok::<_, axum::Error>(event);
                    }
                }
                // client trop lent : on saute les entrées perdues
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Contenu du buffer en JSON
pub async fn log_dump(State(state): State<LogState>) -> impl IntoResponse {
    Json(state.dump())
}

fn is_level_allowed(log_level: &str, max_level: Level) -> bool {
    string_to_level(log_level).is_some_and(|level| level <= max_level)
}

fn filter_entry(entry: &LogEntry, query: &LogQuery) -> bool {
    let level = entry.level.to_lowercase();
    let checked: Vec<&str> = [
        ("error", query.error),
        ("warn", query.warn),
        ("info", query.info),
        ("debug", query.debug),
        ("trace", query.trace),
    ]
    .into_iter()
    .filter(|(_, flag)| flag.unwrap_or(false))
    .map(|(name, _)| name)
    .collect();

    // aucune case cochée : tous les niveaux
    let level_ok = checked.is_empty() || checked.contains(&level.as_str());
    let search_ok = query
        .search
        .as_deref()
        .is_none_or(|needle| entry.message.contains(needle) || entry.target.contains(needle));

    level_ok && search_ok
}

/// Installe le subscriber global : filtre rechargeable, [`SseLayer`] et,
/// si `host.logger.enable_console`, une sortie console
///
/// Si un subscriber est déjà installé (tests), le `LogState` retourné reste
/// utilisable mais ne reçoit rien.
pub fn init_logging() -> LogState {
    let config = get_config();

    let level = config
        .get_log_min_level()
        .ok()
        .and_then(|name| string_to_level(&name))
        .unwrap_or(Level::INFO);
    let state = LogState::new(config.get_log_cache_size().unwrap_or(500));

    let (filter, handle) = reload::Layer::new(LevelFilter::from_level(level));
    state.attach_reload_handle(handle, level);

    // filtre en tête : le buffer ne voit que les niveaux retenus
    let registry = Registry::default()
        .with(filter)
        .with(SseLayer::new(state.clone()));

    let console = config
        .get_log_enable_console()
        .unwrap_or(true)
        .then(|| tracing_subscriber::fmt::layer().with_target(true).with_ansi(true));

    if let Err(e) = registry.with(console).try_init() {
        eprintln!("Logging already initialized: {}", e);
    }

    state
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LogSetupRequest {
    /// ERROR, WARN, INFO, DEBUG ou TRACE
    pub level: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct LogSetupResponse {
    pub current_level: String,
    pub available_levels: Vec<String>,
}

impl From<Level> for LogSetupResponse {
    fn from(level: Level) -> Self {
        Self {
            current_level: level.to_string(),
            available_levels: LEVELS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Niveau de log courant
#[utoipa::path(
    get,
    path = "/log_setup",
    responses(
        (status = 200, description = "Current log level", body = LogSetupResponse)
    ),
    tag = "logs"
)]
pub async fn log_setup_get(State(state): State<LogState>) -> impl IntoResponse {
    Json(LogSetupResponse::from(state.get_max_level()))
}

/// Change le niveau de log à chaud
#[utoipa::path(
    post,
    path = "/log_setup",
    request_body = LogSetupRequest,
    responses(
        (status = 200, description = "Log level updated", body = LogSetupResponse),
        (status = 400, description = "Unknown log level")
    ),
    tag = "logs"
)]
pub async fn log_setup_post(
    State(state): State<LogState>,
    Json(request): Json<LogSetupRequest>,
) -> impl IntoResponse {
    match string_to_level(&request.level) {
        Some(level) => {
            state.set_max_level(level);
            tracing::info!("Log level changed to: {}", level);
            (StatusCode::OK, Json(LogSetupResponse::from(level))).into_response()
        }
        None => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "error": format!("Invalid log level. Must be one of: {}", LEVELS.join(", "))
            })),
        )
            .into_response(),
    }
}

fn string_to_level(name: &str) -> Option<Level> {
    let name = name.trim();
    LEVELS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(name))
        .then(|| name.parse().ok())
        .flatten()
}

/// Crée le router pour l'API de gestion des logs
pub fn create_logs_router(log_state: LogState) -> axum::Router {
    use axum::routing::get;
    axum::Router::new()
        .route("/log_setup", get(log_setup_get).post(log_setup_post))
        .with_state(log_state)
}

/// API OpenAPI pour la gestion des logs
#[derive(utoipa::OpenApi)]
#[openapi(
    paths(log_setup_get, log_setup_post),
    components(schemas(LogSetupRequest, LogSetupResponse)),
    tags((name = "logs", description = "Log level configuration endpoints"))
)]
pub struct LogsApiDoc;
