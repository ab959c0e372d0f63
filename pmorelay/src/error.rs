//! Gestion des erreurs du relais audio

use thiserror::Error;

/// Type Result personnalisé pour pmorelay
pub type Result<T> = std::result::Result<T, RelayError>;

/// Erreurs possibles lors d'un relais ou d'une résolution de preview
///
/// Trois familles : erreur client (paramètre absent ou invalide), erreur de
/// l'origine (statut non-succès propagé tel quel) et erreur de transport.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Paramètre obligatoire absent ou vide
    #[error("{0} is required")]
    MissingParameter(&'static str),

    /// URL syntaxiquement invalide ou schéma non supporté
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// L'origine a répondu avec un statut non-succès
    #[error("Upstream responded with HTTP {0}")]
    Upstream(u16),

    /// Erreur réseau (DNS, timeout, connexion coupée, corps illisible)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Réponse de l'origine reçue mais inexploitable
    #[error("Malformed upstream payload: {0}")]
    Payload(String),

    /// Erreur de configuration (anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// Impossible de construire le client HTTP
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

impl RelayError {
    /// Statut HTTP que le relais renvoie pour cette erreur
    ///
    /// Le statut de l'origine est propagé sans traduction.
    pub fn status_code(&self) -> u16 {
        match self {
            RelayError::MissingParameter(_) | RelayError::InvalidUrl(_) => 400,
            RelayError::Upstream(status) => *status,
            RelayError::Transport(_)
            | RelayError::Payload(_)
            | RelayError::Config(_)
            | RelayError::ClientSetup(_) => 500,
        }
    }

    /// Vrai si l'appelant est en cause (4xx non issu de l'origine)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::MissingParameter(_) | RelayError::InvalidUrl(_)
        )
    }

    /// Vrai si l'origine a répondu avec un statut non-succès
    pub fn is_upstream_error(&self) -> bool {
        matches!(self, RelayError::Upstream(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(RelayError::MissingParameter("URL").status_code(), 400);
        assert_eq!(RelayError::InvalidUrl("nope".into()).status_code(), 400);
        assert_eq!(RelayError::Upstream(404).status_code(), 404);
        assert_eq!(RelayError::Upstream(503).status_code(), 503);
        assert_eq!(RelayError::Payload("no url".into()).status_code(), 500);
    }

    #[test]
    fn test_missing_parameter_message() {
        assert_eq!(
            RelayError::MissingParameter("URL").to_string(),
            "URL is required"
        );
        assert_eq!(
            RelayError::MissingParameter("Track ID").to_string(),
            "Track ID is required"
        );
    }

    #[test]
    fn test_error_families() {
        assert!(RelayError::MissingParameter("URL").is_client_error());
        assert!(!RelayError::Upstream(404).is_client_error());
        assert!(RelayError::Upstream(404).is_upstream_error());
        assert!(!RelayError::Payload(String::new()).is_upstream_error());
    }
}
