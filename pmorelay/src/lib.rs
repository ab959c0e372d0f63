//! # pmorelay - Relais audio pour PMOPreview
//!
//! Cette crate permet à un client (navigateur, lecteur) de lire une ressource
//! audio distante à travers le serveur PMOPreview, sans contrainte
//! cross-origin côté client.
//!
//! ## Vue d'ensemble
//!
//! - [`StreamRelay`] : GET vers l'origine, corps bufferisé, en-têtes
//!   `Content-Type`, `Content-Length` et `Accept-Ranges` fixés par le relais
//! - [`PreviewResolver`] : résolution d'un identifiant de piste en URL jouable
//! - [`RelayExt`] : montage des routes sur un `pmoserver::Server`
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmorelay::StreamRelay;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let relay = StreamRelay::from_config()?;
//!     let response = relay.relay(Some("https://cdn.example/track.flac")).await?;
//!     assert_eq!(response.content_length(), response.body().len() as u64);
//!     Ok(())
//! }
//! ```
//!
//! ## Erreurs
//!
//! | Cas                         | Statut HTTP          |
//! |-----------------------------|----------------------|
//! | `url` absent ou vide        | 400                  |
//! | URL invalide                | 400                  |
//! | origine non-succès          | statut de l'origine  |
//! | erreur réseau               | 500                  |

pub mod error;
pub mod relay;
pub mod resolver;

#[cfg(feature = "pmoserver")]
pub mod api_rest;

#[cfg(feature = "pmoserver")]
pub mod pmoserver_ext;

pub use error::{RelayError, Result};
pub use relay::{RelayBuilder, StreamRelay, StreamRequest, StreamResponse};
pub use resolver::PreviewResolver;

#[cfg(feature = "pmoserver")]
pub use api_rest::{RelayApiDoc, RelayState, create_router};

#[cfg(feature = "pmoserver")]
pub use pmoserver_ext::RelayExt;
