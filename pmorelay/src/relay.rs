//! Relais audio : récupère une ressource distante pour le compte du client
//!
//! Chaque appel est indépendant : pas de cache, pas d'état partagé hormis le
//! pool de connexions du client `reqwest`. Le corps est entièrement bufferisé
//! avant d'être renvoyé, la mémoire est donc bornée à une piste par requête.

use crate::error::{RelayError, Result};
use bytes::Bytes;
use pmoconfig::Config;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Type MIME par défaut du flux relayé
pub const DEFAULT_CONTENT_TYPE: &str = "audio/flac";

/// Timeout par défaut : une piste hi-res complète doit tenir dedans
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// User-Agent par défaut
pub const DEFAULT_USER_AGENT: &str = "pmorelay/0.1.0";

/// Requête de relais validée
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    source_url: Url,
}

impl StreamRequest {
    /// Valide le paramètre `url` d'une requête entrante
    ///
    /// Absent ou vide : [`RelayError::MissingParameter`]. Non parsable, relatif
    /// ou hors http(s) : [`RelayError::InvalidUrl`].
    pub fn parse(request_url: Option<&str>) -> Result<Self> {
        let raw = request_url
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RelayError::MissingParameter("URL"))?;

        let source_url =
            Url::parse(raw).map_err(|e| RelayError::InvalidUrl(format!("{}: {}", raw, e)))?;

        match source_url.scheme() {
            "http" | "https" => Ok(Self { source_url }),
            other => Err(RelayError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                raw, other
            ))),
        }
    }

    pub fn source_url(&self) -> &Url {
        &self.source_url
    }
}

/// Réponse prête à être réémise vers le client
///
/// `content_length` est toujours dérivé du corps : il ne peut pas diverger
/// des octets réellement transmis.
#[derive(Debug, Clone)]
pub struct StreamResponse {
    body: Bytes,
    content_type: String,
    accepts_range_requests: bool,
}

impl StreamResponse {
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content_length(&self) -> u64 {
        self.body.len() as u64
    }

    /// Capacité annoncée au client (`Accept-Ranges: bytes`)
    ///
    /// Le relais ne traite pas les en-têtes `Range` entrants : l'annonce
    /// permet seulement à l'UI d'afficher une barre de progression navigable.
    pub fn accepts_range_requests(&self) -> bool {
        self.accepts_range_requests
    }
}

/// Relais HTTP sans état
///
/// # Exemple
///
/// ```rust,no_run
/// use pmorelay::StreamRelay;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let relay = StreamRelay::new()?;
///     let response = relay.relay(Some("https://cdn.example/track.flac")).await?;
///     println!("{} bytes of {}", response.content_length(), response.content_type());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StreamRelay {
    client: Client,
    content_type: String,
    advertise_ranges: bool,
}

impl StreamRelay {
    /// Crée un relais avec les réglages par défaut
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> RelayBuilder {
        RelayBuilder::default()
    }

    /// Crée un relais en utilisant la configuration de pmoconfig
    pub fn from_config() -> Result<Self> {
        let config = pmoconfig::get_config();
        Self::from_config_obj(config.as_ref())
    }

    /// Crée un relais depuis un objet Config spécifique
    pub fn from_config_obj(config: &Config) -> Result<Self> {
        Self::builder()
            .content_type(config.get_relay_content_type()?)
            .timeout(Duration::from_secs(config.get_relay_timeout_secs()? as u64))
            .user_agent(config.get_relay_user_agent()?)
            .advertise_ranges(config.get_relay_advertise_ranges()?)
            .build()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Valide `request_url` puis relaie la ressource
    pub async fn relay(&self, request_url: Option<&str>) -> Result<StreamResponse> {
        let request = StreamRequest::parse(request_url)?;
        self.fetch(&request).await
    }

    /// Effectue le GET vers l'origine et bufferise le corps
    ///
    /// Aucun retry : un échec de récupération est un échec de la requête.
    pub async fn fetch(&self, request: &StreamRequest) -> Result<StreamResponse> {
        let url = request.source_url();
        debug!("Relaying {}", url);

        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Upstream {} responded with HTTP {}", url, status.as_u16());
            return Err(RelayError::Upstream(status.as_u16()));
        }

        let body = response.bytes().await?;
        info!("Relayed {} bytes from {}", body.len(), url);

        Ok(StreamResponse {
            body,
            content_type: self.content_type.clone(),
            accepts_range_requests: self.advertise_ranges,
        })
    }
}

/// Builder for configuring a StreamRelay
#[derive(Debug)]
pub struct RelayBuilder {
    client: Option<Client>,
    content_type: String,
    timeout: Duration,
    user_agent: String,
    advertise_ranges: bool,
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self {
            client: None,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            advertise_ranges: true,
        }
    }
}

impl RelayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a custom HTTP client (timeout and user agent are then ignored)
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Type MIME annoncé pour tous les flux relayés
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn advertise_ranges(mut self, advertise: bool) -> Self {
        self.advertise_ranges = advertise;
        self
    }

    pub fn build(self) -> Result<StreamRelay> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .user_agent(&self.user_agent)
                .timeout(self.timeout)
                .build()
                .map_err(|e| RelayError::ClientSetup(e.to_string()))?,
        };

        Ok(StreamRelay {
            client,
            content_type: self.content_type,
            advertise_ranges: self.advertise_ranges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_missing_url() {
        assert!(matches!(
            StreamRequest::parse(None),
            Err(RelayError::MissingParameter("URL"))
        ));
        assert!(matches!(
            StreamRequest::parse(Some("   ")),
            Err(RelayError::MissingParameter("URL"))
        ));
    }

    #[test]
    fn test_parse_invalid_url() {
        assert!(matches!(
            StreamRequest::parse(Some("not a url")),
            Err(RelayError::InvalidUrl(_))
        ));
        assert!(matches!(
            StreamRequest::parse(Some("/relative/track.flac")),
            Err(RelayError::InvalidUrl(_))
        ));
        assert!(matches!(
            StreamRequest::parse(Some("ftp://cdn.example/track.flac")),
            Err(RelayError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_parse_valid_url() {
        let request = StreamRequest::parse(Some("https://cdn.example/track.flac")).unwrap();
        assert_eq!(request.source_url().host_str(), Some("cdn.example"));
        assert_eq!(request.source_url().path(), "/track.flac");
    }

    #[test]
    fn test_builder_defaults() {
        let relay = StreamRelay::builder().build().unwrap();
        assert_eq!(relay.content_type(), DEFAULT_CONTENT_TYPE);
        assert!(relay.advertise_ranges);
    }

    #[test]
    fn test_from_config_obj() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        config
            .set_relay_content_type("audio/mpeg".to_string())
            .unwrap();
        config.set_relay_advertise_ranges(false).unwrap();

        let relay = StreamRelay::from_config_obj(&config).unwrap();
        assert_eq!(relay.content_type(), "audio/mpeg");
        assert!(!relay.advertise_ranges);
    }
}
