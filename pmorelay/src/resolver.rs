//! Résolution d'un identifiant de piste en URL de preview
//!
//! Client minimal vers l'endpoint `track/getFileUrl` du catalogue. L'URL
//! obtenue est directement jouable ou peut être repassée au relais.

use crate::error::{RelayError, Result};
use pmoconfig::Config;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Base par défaut de l'API catalogue
pub const DEFAULT_API_BASE: &str = "https://www.qobuz.com/api.json/0.2";

/// Format demandé par défaut (MP3 320)
pub const DEFAULT_FORMAT_ID: u32 = 5;

const RESOLVER_TIMEOUT_SECS: u64 = 30;

/// Sous-ensemble utile de la réponse `track/getFileUrl`
#[derive(Debug, Deserialize)]
struct FileUrlResponse {
    #[serde(default)]
    url: Option<String>,
}

/// Client de résolution des URLs de preview
#[derive(Debug, Clone)]
pub struct PreviewResolver {
    client: Client,
    api_base: String,
    app_id: String,
    user_auth_token: String,
    format_id: u32,
}

impl PreviewResolver {
    /// Crée un resolver avec des identifiants explicites
    pub fn new(
        api_base: impl Into<String>,
        app_id: impl Into<String>,
        user_auth_token: impl Into<String>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(RESOLVER_TIMEOUT_SECS))
            .build()
            .map_err(|e| RelayError::ClientSetup(e.to_string()))?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            user_auth_token: user_auth_token.into(),
            format_id: DEFAULT_FORMAT_ID,
        })
    }

    /// Crée un resolver depuis la section `catalog` de la configuration globale
    pub fn from_config() -> Result<Self> {
        let config = pmoconfig::get_config();
        Self::from_config_obj(config.as_ref())
    }

    pub fn from_config_obj(config: &Config) -> Result<Self> {
        let (app_id, user_auth_token) = config.get_catalog_credentials()?;
        if app_id.is_empty() {
            warn!("catalog.app_id is not configured, preview resolution will likely be rejected");
        }

        let resolver = Self::new(config.get_catalog_api_base()?, app_id, user_auth_token)?;
        Ok(resolver.with_format_id(config.get_catalog_format_id()? as u32))
    }

    pub fn with_format_id(mut self, format_id: u32) -> Self {
        self.format_id = format_id;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn format_id(&self) -> u32 {
        self.format_id
    }

    /// Résout `track_id` en URL de preview
    ///
    /// Un statut non-succès du catalogue est propagé tel quel
    /// ([`RelayError::Upstream`]) ; une réponse sans champ `url` donne
    /// [`RelayError::Payload`].
    pub async fn resolve(&self, track_id: Option<&str>) -> Result<String> {
        let track_id = track_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RelayError::MissingParameter("Track ID"))?;

        let endpoint = format!("{}/track/getFileUrl", self.api_base);
        let format_id = self.format_id.to_string();
        debug!(track_id, format_id = %format_id, "Resolving preview URL");

        let response = self
            .client
            .get(&endpoint)
            .header("X-App-Id", &self.app_id)
            .header("X-User-Auth-Token", &self.user_auth_token)
            .query(&[("track_id", track_id), ("format_id", format_id.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "Catalog refused preview for track {} (HTTP {})",
                track_id,
                status.as_u16()
            );
            return Err(RelayError::Upstream(status.as_u16()));
        }

        let payload: FileUrlResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse getFileUrl response: {}", e);
            RelayError::Payload(e.to_string())
        })?;

        payload
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RelayError::Payload(format!("no url for track {}", track_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_is_normalized() {
        let resolver = PreviewResolver::new("http://catalog.local/api/", "app", "token").unwrap();
        assert_eq!(resolver.api_base(), "http://catalog.local/api");
        assert_eq!(resolver.format_id(), DEFAULT_FORMAT_ID);
    }

    #[tokio::test]
    async fn test_missing_track_id() {
        let resolver = PreviewResolver::new(DEFAULT_API_BASE, "app", "token").unwrap();
        let err = resolver.resolve(None).await.unwrap_err();
        assert_eq!(err.to_string(), "Track ID is required");

        let err = resolver.resolve(Some("")).await.unwrap_err();
        assert!(err.is_client_error());
    }

    #[tokio::test]
    async fn test_malformed_catalog_answer() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let catalog = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/track/getFileUrl"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&catalog)
            .await;

        let resolver = PreviewResolver::new(catalog.uri(), "app", "token").unwrap();
        let err = resolver.resolve(Some("12345")).await.unwrap_err();

        assert!(matches!(err, RelayError::Payload(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_from_config_obj() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        config
            .set_catalog_api_base("http://catalog.local".to_string())
            .unwrap();
        config.set_catalog_format_id(27).unwrap();

        let resolver = PreviewResolver::from_config_obj(&config).unwrap();
        assert_eq!(resolver.api_base(), "http://catalog.local");
        assert_eq!(resolver.format_id(), 27);
    }
}
