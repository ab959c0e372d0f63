//! # pmoconfig - configuration de PMOPreview
//!
//! La configuration est un document YAML unique construit en trois couches :
//!
//! 1. les valeurs par défaut embarquées (`pmopreview.yaml`) ;
//! 2. le fichier `config.yaml` du répertoire de configuration ;
//! 3. les variables `PMOPREVIEW_CONFIG__SECTION__KEY`.
//!
//! Le résultat est réécrit sur disque au chargement et après chaque
//! modification. Les clés sont insensibles à la casse.
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let content_type = config.get_relay_content_type()?;
//! config.set_http_port(9000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde_yaml::{Mapping, Number, Value};
use std::{
    env, fs,
    net::UdpSocket,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, info, warn};

const DEFAULT_CONFIG: &str = include_str!("pmopreview.yaml");
const CONFIG_FILE: &str = "config.yaml";
const CONFIG_DIR_NAME: &str = ".pmopreview";

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMOPreview configuration"));
}

const ENV_CONFIG_DIR: &str = "PMOPREVIEW_CONFIG";
const ENV_PREFIX: &str = "PMOPREVIEW_CONFIG__";

const DEFAULT_HTTP_PORT: u16 = 8080;
const DEFAULT_LOG_BUFFER_CAPACITY: usize = 1000;
const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;
const DEFAULT_RELAY_CONTENT_TYPE: &str = "audio/flac";
const DEFAULT_RELAY_TIMEOUT_SECS: usize = 120;
const DEFAULT_RELAY_USER_AGENT: &str = "pmorelay/0.1.0";
const DEFAULT_RELAY_ADVERTISE_RANGES: bool = true;
const DEFAULT_CATALOG_API_BASE: &str = "https://www.qobuz.com/api.json/0.2";
const DEFAULT_CATALOG_FORMAT_ID: usize = 5;
const DEFAULT_PLAYER_VOLUME: f64 = 0.8;

/// Getter/setter pour un entier ; une chaîne numérique est acceptée
macro_rules! impl_usize_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<usize> {
            Ok(match self.get_value($path)? {
                Value::Number(n) => n.as_u64().map_or($default, |v| v as usize),
                Value::String(s) => s.trim().parse().unwrap_or($default),
                _ => $default,
            })
        }

        pub fn $setter(&self, value: usize) -> Result<()> {
            self.set_value($path, Value::Number(Number::from(value)))
        }
    };
}

/// Getter/setter pour un booléen
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            Ok(self.get_value($path)?.as_bool().unwrap_or($default))
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Getter/setter pour une chaîne ; vide ou absente donne la valeur par défaut
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            Ok(match self.get_value($path)? {
                Value::String(s) if !s.trim().is_empty() => s,
                _ => $default.to_string(),
            })
        }

        pub fn $setter(&self, value: String) -> Result<()> {
            self.set_value($path, Value::String(value))
        }
    };
}

/// Configuration de PMOPreview, persistée dans `<config_dir>/config.yaml`
#[derive(Debug)]
pub struct Config {
    config_dir: String,
    path: PathBuf,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(self.data().clone()),
        }
    }
}

impl Config {
    /// Premier répertoire candidat : argument, `PMOPREVIEW_CONFIG`,
    /// `./.pmopreview`, `~/.pmopreview`, puis `./.pmopreview` à créer
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(from_env) = env::var(ENV_CONFIG_DIR) {
            debug!(env_var = ENV_CONFIG_DIR, path = %from_env, "Config directory from environment");
            return from_env;
        }

        let local = PathBuf::from(CONFIG_DIR_NAME);
        let home = home_dir().map(|h| h.join(CONFIG_DIR_NAME));

        [Some(local), home]
            .into_iter()
            .flatten()
            .find(|candidate| candidate.is_dir())
            .map(|found| found.to_string_lossy().into_owned())
            .unwrap_or_else(|| CONFIG_DIR_NAME.to_string())
    }

    /// Crée le répertoire si besoin et vérifie qu'il est accessible en écriture
    fn validate_config_dir(path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        let probe = path.join(".write_test");
        fs::write(&probe, b"pmopreview")?;
        fs::remove_file(&probe)?;
        Ok(())
    }

    /// Résout puis valide le répertoire de configuration
    pub fn config_dir(directory: &str) -> Result<String> {
        let dir = Self::find_config_dir(directory);
        Self::validate_config_dir(Path::new(&dir))?;
        Ok(dir)
    }

    /// Charge les trois couches de configuration depuis `directory`
    /// (chaîne vide : recherche automatique) et réécrit le résultat
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        let path = Path::new(&config_dir).join(CONFIG_FILE);
        info!(config_file = %path.display(), "Loading configuration");

        let mut merged = lowercase_keys(serde_yaml::from_str(DEFAULT_CONFIG)?);

        match fs::read_to_string(&path) {
            Ok(text) => {
                let external: Value = serde_yaml::from_str(&text)?;
                // un fichier vide se lit comme `null`
                if !external.is_null() {
                    merge_yaml(&mut merged, &lowercase_keys(external));
                }
            }
            Err(_) => info!("No {} yet, starting from embedded defaults", CONFIG_FILE),
        }

        Self::apply_env_overrides(&mut merged);

        let config = Config {
            config_dir,
            path,
            data: Mutex::new(merged),
        };
        config.save()?;
        Ok(config)
    }

    fn data(&self) -> MutexGuard<'_, Value> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Réécrit `config.yaml`
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(&*self.data())?;
        fs::write(&self.path, yaml)?;
        Ok(())
    }

    /// Répertoire contenant `config.yaml`
    pub fn directory(&self) -> &str {
        &self.config_dir
    }

    /// Écrit `value` sous `path` (ex. `&["relay", "content_type"]`), crée les
    /// sections intermédiaires puis sauvegarde
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        insert_at(&mut self.data(), path, value)?;
        self.save()
    }

    /// Valeur sous `path` ; erreur si un segment manque
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data();
        let mut node: &Value = &data;
        for (depth, key) in path.iter().enumerate() {
            let Value::Mapping(map) = node else {
                return Err(anyhow!("{} is not a section", path[..depth].join(".")));
            };
            node = map
                .get(Value::String(key.to_lowercase()))
                .ok_or_else(|| anyhow!("Path {} does not exist", path[..=depth].join(".")))?;
        }
        Ok(node.clone())
    }

    fn apply_env_overrides(config: &mut Value) {
        for (name, raw) in env::vars() {
            let Some(suffix) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let path: Vec<&str> = suffix.split("__").collect();
            if let Err(e) = insert_at(config, &path, Self::convert_env_value(&raw)) {
                warn!(variable = %name, "Ignoring environment override: {}", e);
            }
        }
    }

    /// Interprète la valeur comme un scalaire YAML, sinon comme une chaîne
    fn convert_env_value(raw: &str) -> Value {
        serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    }

    // ============ Host ============

    /// Hôte annoncé par le serveur ; adresse locale devinée si `host.base_url` est vide
    pub fn get_base_url(&self) -> String {
        match self.get_value(&["host", "base_url"]) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            Ok(_) => guess_local_ip(),
            Err(err) => {
                warn!("Failed to get base URL: {}, guessing local address", err);
                guess_local_ip()
            }
        }
    }

    /// Port HTTP, 8080 si absent ou invalide
    pub fn get_http_port(&self) -> u16 {
        let port = match self.get_value(&["host", "http_port"]) {
            Ok(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
            Ok(Value::String(s)) => s.trim().parse::<u16>().ok(),
            Ok(_) => None,
            Err(err) => {
                warn!("Failed to get HTTP port: {}", err);
                None
            }
        };

        port.unwrap_or_else(|| {
            warn!("Invalid HTTP port, using default {}", DEFAULT_HTTP_PORT);
            DEFAULT_HTTP_PORT
        })
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::Number(Number::from(port)))
    }

    impl_usize_config!(
        get_log_cache_size,
        set_log_cache_size,
        &["host", "logger", "buffer_capacity"],
        DEFAULT_LOG_BUFFER_CAPACITY
    );

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );

    // ============ Relay ============

    impl_string_config!(
        get_relay_content_type,
        set_relay_content_type,
        &["relay", "content_type"],
        DEFAULT_RELAY_CONTENT_TYPE
    );

    impl_usize_config!(
        get_relay_timeout_secs,
        set_relay_timeout_secs,
        &["relay", "timeout_secs"],
        DEFAULT_RELAY_TIMEOUT_SECS
    );

    impl_string_config!(
        get_relay_user_agent,
        set_relay_user_agent,
        &["relay", "user_agent"],
        DEFAULT_RELAY_USER_AGENT
    );

    impl_bool_config!(
        get_relay_advertise_ranges,
        set_relay_advertise_ranges,
        &["relay", "advertise_ranges"],
        DEFAULT_RELAY_ADVERTISE_RANGES
    );

    // ============ Catalog ============

    impl_string_config!(
        get_catalog_api_base,
        set_catalog_api_base,
        &["catalog", "api_base"],
        DEFAULT_CATALOG_API_BASE
    );

    impl_usize_config!(
        get_catalog_format_id,
        set_catalog_format_id,
        &["catalog", "format_id"],
        DEFAULT_CATALOG_FORMAT_ID
    );

    /// Returns `(app_id, user_auth_token)` for the catalog API.
    ///
    /// Missing values come back as empty strings: the catalog decides whether
    /// an anonymous call is acceptable.
    pub fn get_catalog_credentials(&self) -> Result<(String, String)> {
        let read = |key: &str| -> Result<String> {
            match self.get_value(&["catalog", key]) {
                Ok(Value::String(s)) => Ok(s),
                Ok(Value::Number(n)) => Ok(n.to_string()),
                Ok(_) => Ok(String::new()),
                Err(_) => Ok(String::new()),
            }
        };
        Ok((read("app_id")?, read("user_auth_token")?))
    }

    pub fn set_catalog_credentials(&self, app_id: String, user_auth_token: String) -> Result<()> {
        self.set_value(&["catalog", "app_id"], Value::String(app_id))?;
        self.set_value(&["catalog", "user_auth_token"], Value::String(user_auth_token))
    }

    // ============ Player ============

    /// Volume applied to a new playback session, clamped to `[0, 1]`.
    pub fn get_player_default_volume(&self) -> Result<f64> {
        let volume = match self.get_value(&["player", "default_volume"]) {
            Ok(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_PLAYER_VOLUME),
            Ok(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_PLAYER_VOLUME),
            _ => DEFAULT_PLAYER_VOLUME,
        };
        if volume.is_finite() {
            Ok(volume.clamp(0.0, 1.0))
        } else {
            Ok(DEFAULT_PLAYER_VOLUME)
        }
    }

    pub fn set_player_default_volume(&self, volume: f64) -> Result<()> {
        self.set_value(&["player", "default_volume"], Value::Number(Number::from(volume)))
    }
}

/// Configuration globale, chargée au premier accès
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

/// Fusionne `overlay` dans `base` : les sections sont fusionnées clé par
/// clé, les scalaires et les listes de `overlay` remplacent ceux de `base`
fn merge_yaml(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                if let Some(existing) = base_map.get_mut(key) {
                    merge_yaml(existing, value);
                } else {
                    base_map.insert(key.clone(), value.clone());
                }
            }
        }
        (slot, replacement) => *slot = replacement.clone(),
    }
}

/// Écrit `value` sous `path` en créant les sections manquantes
fn insert_at(root: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return Ok(());
    };

    let mut node = root;
    for key in parents {
        let Value::Mapping(map) = node else {
            return Err(anyhow!("Cannot descend into {}: not a section", key));
        };
        node = map
            .entry(Value::String(key.to_lowercase()))
            .or_insert_with(|| Value::Mapping(Mapping::new()));
    }

    match node {
        Value::Mapping(map) => {
            map.insert(Value::String(last.to_lowercase()), value);
            Ok(())
        }
        _ => Err(anyhow!("Cannot set {}: parent is not a section", path.join("."))),
    }
}

/// Met en minuscules toutes les clés chaîne, récursivement
fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lowercase_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Devine l'adresse IP locale utilisée pour les connexions sortantes.
///
/// UDP est sans connexion : `connect` ne fait que choisir l'interface.
/// Retourne `127.0.0.1` en cas d'échec.
fn guess_local_ip() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_in(dir: &tempfile::TempDir) -> Config {
        Config::load_config(dir.path().to_str().unwrap()).unwrap()
    }

    #[test]
    fn test_defaults_are_loaded_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);

        assert_eq!(config.get_http_port(), 8080);
        assert_eq!(config.get_relay_content_type().unwrap(), "audio/flac");
        assert!(config.get_relay_advertise_ranges().unwrap());
        assert_eq!(config.get_catalog_format_id().unwrap(), 5);
        assert!((config.get_player_default_volume().unwrap() - 0.8).abs() < f64::EPSILON);
        assert!(dir.path().join("config.yaml").exists());
    }

    #[test]
    fn test_external_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yaml"),
            "host:\n  http_port: 9090\nrelay:\n  content_type: audio/mpeg\n",
        )
        .unwrap();

        let config = load_in(&dir);
        assert_eq!(config.get_http_port(), 9090);
        assert_eq!(config.get_relay_content_type().unwrap(), "audio/mpeg");
        // untouched keys keep their embedded default
        assert_eq!(config.get_relay_timeout_secs().unwrap(), 120);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "HOST:\n  HTTP_PORT: 9191\n").unwrap();

        let config = load_in(&dir);
        assert_eq!(config.get_http_port(), 9191);
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
        assert_eq!(config.get_value(&["Host", "Http_Port"]).unwrap(), Value::Number(9191.into()));
    }

    #[test]
    fn test_set_value_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);
        config.set_http_port(7000).unwrap();
        config
            .set_catalog_credentials("123".to_string(), "token".to_string())
            .unwrap();

        let reloaded = load_in(&dir);
        assert_eq!(reloaded.get_http_port(), 7000);
        assert_eq!(
            reloaded.get_catalog_credentials().unwrap(),
            ("123".to_string(), "token".to_string())
        );
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);
        assert!(config.get_value(&["relay", "nope"]).is_err());
        assert!(config.get_value(&["relay", "content_type", "deeper"]).is_err());
    }

    #[test]
    fn test_player_volume_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_in(&dir);
        config.set_player_default_volume(3.5).unwrap();
        assert_eq!(config.get_player_default_volume().unwrap(), 1.0);
    }

    #[test]
    fn test_merge_yaml_replaces_scalars_and_keeps_siblings() {
        let mut base: Value = serde_yaml::from_str("a:\n  b: 1\n  c: 2\n").unwrap();
        let ext: Value = serde_yaml::from_str("a:\n  b: 5\n  d: 3\n").unwrap();
        merge_yaml(&mut base, &ext);

        let expected: Value = serde_yaml::from_str("a:\n  b: 5\n  c: 2\n  d: 3\n").unwrap();
        assert_eq!(base, expected);
    }

    #[test]
    fn test_convert_env_value_parses_yaml_scalars() {
        assert_eq!(Config::convert_env_value("42"), Value::Number(Number::from(42)));
        assert_eq!(Config::convert_env_value("true"), Value::Bool(true));
        assert_eq!(
            Config::convert_env_value("audio/ogg"),
            Value::String("audio/ogg".to_string())
        );
    }
}
