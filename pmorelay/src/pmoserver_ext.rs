//! Extension de pmoserver::Server pour monter le relais audio
//!
//! `pmoserver` reste générique : c'est `pmorelay` qui ajoute ses routes via
//! ce trait, sans que le serveur ait à le connaître.

use crate::api_rest::{RelayApiDoc, RelayState, create_router};
use crate::relay::StreamRelay;
use crate::resolver::PreviewResolver;
use anyhow::Result;
use tracing::info;
use utoipa::OpenApi;

/// Trait d'extension pour ajouter le relais à un serveur pmoserver
///
/// # Exemple
///
/// ```rust,no_run
/// use pmorelay::RelayExt;
/// use pmoserver::ServerBuilder;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let mut server = ServerBuilder::new_configured().build();
///     server.init_stream_relay().await?;
///
///     server.start().await;
///     server.wait().await;
///     Ok(())
/// }
/// ```
pub trait RelayExt {
    /// Initialise le relais depuis la configuration et enregistre ses routes
    ///
    /// # Routes enregistrées
    ///
    /// - `GET /api/relay/stream?url=...`
    /// - `GET /api/relay/preview?trackId=...`
    /// - `GET /swagger-ui/relay`
    /// - `GET /api-docs/relay.json`
    async fn init_stream_relay(&mut self) -> Result<RelayState>;

    /// Comme [`RelayExt::init_stream_relay`] avec des instances fournies
    async fn init_stream_relay_with(
        &mut self,
        relay: StreamRelay,
        resolver: PreviewResolver,
    ) -> Result<RelayState>;
}

impl RelayExt for pmoserver::Server {
    async fn init_stream_relay(&mut self) -> Result<RelayState> {
        let relay = StreamRelay::from_config()?;
        let resolver = PreviewResolver::from_config()?;
        self.init_stream_relay_with(relay, resolver).await
    }

    async fn init_stream_relay_with(
        &mut self,
        relay: StreamRelay,
        resolver: PreviewResolver,
    ) -> Result<RelayState> {
        let state = RelayState::new(relay, resolver);

        self.add_openapi(create_router(state.clone()), RelayApiDoc::openapi(), "relay")
            .await;
        info!("Stream relay mounted under /api/relay");

        Ok(state)
    }
}
