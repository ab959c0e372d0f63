//! Endpoints API REST du relais
//!
//! - `GET /stream?url=...` : relaie une ressource audio distante
//! - `GET /preview?trackId=...` : résout l'URL de preview d'une piste

use crate::{
    error::RelayError,
    relay::{StreamRelay, StreamResponse},
    resolver::PreviewResolver,
};
use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};

/// État partagé des handlers du relais
#[derive(Clone)]
pub struct RelayState {
    pub relay: Arc<StreamRelay>,
    pub resolver: Arc<PreviewResolver>,
}

impl RelayState {
    pub fn new(relay: StreamRelay, resolver: PreviewResolver) -> Self {
        Self {
            relay: Arc::new(relay),
            resolver: Arc::new(resolver),
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct StreamParams {
    /// URL absolue de la ressource audio à relayer
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(default, rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct PreviewParams {
    /// Identifiant de la piste dans le catalogue
    pub track_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub preview_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Crée le router du relais
pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/stream", get(stream_audio))
        .route("/preview", get(get_preview))
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/stream",
    params(StreamParams),
    responses(
        (status = 200, description = "Flux audio relayé", content_type = "audio/flac"),
        (status = 400, description = "URL absente ou invalide", body = ErrorBody),
        (status = 500, description = "Erreur de transport vers l'origine", body = ErrorBody)
    ),
    tag = "relay"
)]
async fn stream_audio(
    State(state): State<RelayState>,
    Query(params): Query<StreamParams>,
) -> Result<StreamResponse, AppError> {
    state
        .relay
        .relay(params.url.as_deref())
        .await
        .map_err(AppError::stream)
}

#[utoipa::path(
    get,
    path = "/preview",
    params(PreviewParams),
    responses(
        (status = 200, description = "URL de preview", body = PreviewResponse),
        (status = 400, description = "Identifiant de piste absent", body = ErrorBody),
        (status = 500, description = "Résolution impossible", body = ErrorBody)
    ),
    tag = "relay"
)]
async fn get_preview(
    State(state): State<RelayState>,
    Query(params): Query<PreviewParams>,
) -> Result<Json<PreviewResponse>, AppError> {
    let preview_url = state
        .resolver
        .resolve(params.track_id.as_deref())
        .await
        .map_err(AppError::preview)?;
    Ok(Json(PreviewResponse { preview_url }))
}

impl IntoResponse for StreamResponse {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        let content_type = HeaderValue::from_str(self.content_type())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.content_length()));
        if self.accepts_range_requests() {
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }

        (StatusCode::OK, headers, Body::from(self.into_body())).into_response()
    }
}

/// Message renvoyé au client selon l'endpoint
///
/// Les corps de l'origine ne sont jamais retransmis.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Stream,
    Preview,
}

/// Wrapper pour convertir RelayError en réponse HTTP
#[derive(Debug)]
pub struct AppError {
    endpoint: Endpoint,
    error: RelayError,
}

impl AppError {
    fn stream(error: RelayError) -> Self {
        Self {
            endpoint: Endpoint::Stream,
            error,
        }
    }

    fn preview(error: RelayError) -> Self {
        Self {
            endpoint: Endpoint::Preview,
            error,
        }
    }

    fn message(&self) -> String {
        match (&self.error, self.endpoint) {
            (RelayError::MissingParameter(_), _) => self.error.to_string(),
            (RelayError::InvalidUrl(_), _) => "Invalid URL".to_string(),
            (RelayError::Upstream(_), Endpoint::Stream) => "Failed to fetch audio".to_string(),
            (_, Endpoint::Stream) => "Failed to stream audio".to_string(),
            (_, Endpoint::Preview) => "Failed to get preview URL".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() && !self.error.is_upstream_error() {
            error!("{:?} request failed: {}", self.endpoint, self.error);
        }

        let body = Json(ErrorBody {
            error: self.message(),
        });
        (status, body).into_response()
    }
}

/// API OpenAPI du relais
#[derive(OpenApi)]
#[openapi(
    info(
        title = "PMOPreview Relay API",
        version = "1.0.0",
        description = "Relais audio et résolution des URLs de preview"
    ),
    paths(stream_audio, get_preview),
    components(schemas(PreviewResponse, ErrorBody)),
    tags((name = "relay", description = "Audio relay endpoints"))
)]
pub struct RelayApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_per_endpoint() {
        assert_eq!(
            AppError::stream(RelayError::MissingParameter("URL")).message(),
            "URL is required"
        );
        assert_eq!(
            AppError::stream(RelayError::InvalidUrl("x".into())).message(),
            "Invalid URL"
        );
        assert_eq!(
            AppError::stream(RelayError::Upstream(404)).message(),
            "Failed to fetch audio"
        );
        assert_eq!(
            AppError::stream(RelayError::Payload(String::new())).message(),
            "Failed to stream audio"
        );
        assert_eq!(
            AppError::preview(RelayError::Upstream(401)).message(),
            "Failed to get preview URL"
        );
        assert_eq!(
            AppError::preview(RelayError::MissingParameter("Track ID")).message(),
            "Track ID is required"
        );
    }

    #[test]
    fn test_upstream_status_is_preserved() {
        let response = AppError::stream(RelayError::Upstream(403)).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
