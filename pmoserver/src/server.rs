//! # Serveur HTTP de PMOPreview
//!
//! Enveloppe autour d'un `axum::Router` partagé : les crates du workspace y
//! montent leurs routes (directement ou via un trait d'extension) avant le
//! démarrage.

use crate::logs::{LogState, LogsApiDoc, create_logs_router, init_logging, log_dump, log_sse};
use axum::handler::Handler;
use axum::routing::get;
use axum::{Json, Router};
use pmoconfig::get_config;
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::RwLock, task::JoinHandle};
use tracing::{error, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const DEFAULT_SERVER_NAME: &str = "PMO-Preview-Server";

/// Info serveur sérialisable
#[derive(Clone, Debug, Serialize, utoipa::ToSchema)]
pub struct ServerInfo {
    pub name: String,
    pub base_url: String,
    pub http_port: u16,
}

pub struct Server {
    info: ServerInfo,
    router: Arc<RwLock<Router>>,
    join_handle: Option<JoinHandle<()>>,
    log_state: Option<LogState>,
}

/// Chemin `'static` exigé par SwaggerUi ; une fuite par API montée
fn static_path(path: String) -> &'static str {
    Box::leak(path.into_boxed_str())
}

impl Server {
    /// * `name` - nom affiché dans les logs
    /// * `base_url` - hôte annoncé (ex: "192.168.1.10")
    /// * `http_port` - port d'écoute
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                base_url: base_url.into(),
                http_port,
            },
            router: Arc::new(RwLock::new(Router::new())),
            join_handle: None,
            log_state: None,
        }
    }

    /// Serveur configuré depuis la section `host`
    pub fn new_configured() -> Self {
        ServerBuilder::new_configured().build()
    }

    async fn update_router(&self, f: impl FnOnce(Router) -> Router) {
        let mut router = self.router.write().await;
        *router = f(std::mem::take(&mut *router));
    }

    async fn mount(&mut self, path: &str, route: Router) {
        if path == "/" {
            self.update_router(|r| r.merge(route)).await;
        } else {
            self.update_router(|r| r.nest(path, route)).await;
        }
    }

    /// Route GET renvoyant en JSON le résultat de `f`
    ///
    /// ```rust,no_run
    /// # use pmoserver::Server;
    /// # #[tokio::main]
    /// # async fn main() {
    /// let mut server = Server::new("Test", "localhost", 3000);
    /// server.add_route("/info", || async {
    ///     serde_json::json!({"version": "1.0.0"})
    /// }).await;
    /// # }
    /// ```
    pub async fn add_route<F, Fut, T>(&mut self, path: &str, f: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Serialize + Send + 'static,
    {
        let f = Arc::new(f);
        let handler = move || {
            let f = Arc::clone(&f);
            async move { Json(f().await) }
        };
        self.mount(path, Router::new().route("/", get(handler)))
            .await;
    }

    /// Handler GET avec état
    pub async fn add_handler_with_state<H, T, S>(&mut self, path: &str, handler: H, state: S)
    where
        H: Handler<T, S> + Clone + 'static,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        let route = Router::new().route("/", get(handler)).with_state(state);
        self.mount(path, route).await;
    }

    /// Monte une API documentée
    ///
    /// - routes de `api_router` sous `/api/{name}`
    /// - Swagger UI sous `/swagger-ui/{name}`
    /// - document OpenAPI sous `/api-docs/{name}.json`
    pub async fn add_openapi(
        &mut self,
        api_router: Router,
        openapi: utoipa::openapi::OpenApi,
        name: &str,
    ) {
        let swagger = SwaggerUi::new(static_path(format!("/swagger-ui/{name}")))
            .url(static_path(format!("/api-docs/{name}.json")), openapi);
        let api = Router::new().nest(&format!("/api/{name}"), api_router);

        self.update_router(|r| r.merge(api).merge(swagger)).await;
    }

    /// Sous-router monté sous `path` ("/" pour une fusion à la racine)
    pub async fn add_router(&mut self, path: &str, sub_router: Router) {
        let path = match path {
            "/" => "/".to_string(),
            other => format!("/{}", other.trim_start_matches('/')),
        };
        self.mount(&path, sub_router).await;
    }

    /// Copie du router courant (tests `oneshot`)
    pub async fn router(&self) -> Router {
        self.router.read().await.clone()
    }

    /// Démarre l'écoute en tâche de fond ; Ctrl+C déclenche un arrêt propre
    ///
    /// Les routes ajoutées après cet appel ne sont pas servies.
    pub async fn start(&mut self) {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.info.http_port));
        let app = self.router().await;
        info!(
            "Server {} running at http://{}:{}",
            self.info.name, self.info.base_url, self.info.http_port
        );

        self.join_handle = Some(tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Cannot bind {}: {}", addr, e);
                    return;
                }
            };

            let served = axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await;
            if let Err(e) = served {
                error!("HTTP server stopped with error: {}", e);
            }
        }));
    }

    /// Attend l'arrêt du serveur
    pub async fn wait(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.await {
                error!("Server task failed: {}", e);
            }
        }
    }

    pub fn info(&self) -> ServerInfo {
        self.info.clone()
    }

    /// État des logs, si [`Server::init_logging`] a été appelé
    pub fn log_state(&self) -> Option<&LogState> {
        self.log_state.as_ref()
    }

    /// Installe le subscriber tracing et monte les routes de logs
    ///
    /// - `GET /log-sse` : flux SSE
    /// - `GET /log-dump` : buffer circulaire en JSON
    /// - `GET|POST /api/logs/log_setup` : niveau courant
    pub async fn init_logging(&mut self) {
        let logs = init_logging();

        self.add_handler_with_state("/log-sse", log_sse, logs.clone())
            .await;
        self.add_handler_with_state("/log-dump", log_dump, logs.clone())
            .await;
        self.add_openapi(create_logs_router(logs.clone()), LogsApiDoc::openapi(), "logs")
            .await;

        self.log_state = Some(logs);
    }
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C reçu, arrêt gracieux"),
        Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
    }
}

pub struct ServerBuilder {
    name: String,
    base_url: String,
    http_port: u16,
}

impl ServerBuilder {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            http_port,
        }
    }

    pub fn new_configured() -> Self {
        let config = get_config();
        Self::new(DEFAULT_SERVER_NAME, config.get_base_url(), config.get_http_port())
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn build(self) -> Server {
        Server::new(self.name, self.base_url, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn add_route_serves_json() {
        let mut server = ServerBuilder::new("Test", "localhost", 0).build();
        server
            .add_route("/info", || async { serde_json::json!({"version": "1.0.0"}) })
            .await;

        let response = server
            .router()
            .await
            .oneshot(Request::get("/info").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn add_router_normalizes_path() {
        let mut server = ServerBuilder::new("Test", "localhost", 0).build();
        let sub = Router::new().route("/ping", get(|| async { "pong" }));
        server.add_router("sub", sub).await;

        let response = server
            .router()
            .await
            .oneshot(Request::get("/sub/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn add_openapi_serves_api_and_document() {
        #[derive(OpenApi)]
        #[openapi(info(title = "Ping"))]
        struct PingDoc;

        let mut server = ServerBuilder::new("Test", "localhost", 0).build();
        let api = Router::new().route("/ping", get(|| async { "pong" }));
        server.add_openapi(api, PingDoc::openapi(), "ping").await;

        let router = server.router().await;
        let api_response = router
            .clone()
            .oneshot(Request::get("/api/ping/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let doc_response = router
            .oneshot(Request::get("/api-docs/ping.json").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(api_response.status(), StatusCode::OK);
        assert_eq!(doc_response.status(), StatusCode::OK);
    }

    #[test]
    fn info_reflects_builder() {
        let server = ServerBuilder::new("Relay", "10.0.0.2", 8181)
            .name("Preview")
            .build();
        let info = server.info();
        assert_eq!(info.name, "Preview");
        assert_eq!(info.base_url, "10.0.0.2");
        assert_eq!(info.http_port, 8181);
    }
}
