//! # Server Configuration
//!
//! Layered settings for the CLI and the HTTP server. Values resolve in
//! precedence order: command-line flags, then `ORRERY_*` environment
//! variables, then an optional `orrery.toml` in the working directory,
//! then built-in defaults.
//!
//! Access secrets (`ORRERY_PRIVATE_SECRET`, `ORRERY_PARTNER_SECRET`) are
//! deliberately absent here: they are read from the environment at
//! request time and never written to a config file.

use orrery_core::OrreryError;
use orrery_llm::{Generator, OllamaGenerator, ollama};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "orrery.toml";

/// Default bind host for the HTTP server.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default bind port for the HTTP server.
pub const DEFAULT_PORT: u16 = 3001;

/// Default database file.
pub const DEFAULT_DATABASE: &str = "orrery.redb";

/// Default requests per second when no limit is configured.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

// =============================================================================
// FILE CONFIG
// =============================================================================

/// The subset of settings `orrery.toml` may carry.
///
/// Every field is optional; unknown keys are rejected so a typo fails
/// loudly instead of silently falling back to a default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<PathBuf>,
    pub backend: Option<String>,
    pub rate_limit: Option<u32>,
    pub cors_origins: Option<Vec<String>>,
}

impl FileConfig {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self, OrreryError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| OrreryError::IoError(format!("read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| OrreryError::Validation(format!("parse {}: {e}", path.display())))
    }

    /// Load [`CONFIG_FILE`] from the working directory when present.
    ///
    /// A missing file is not an error; a malformed one is.
    pub fn discover() -> Result<Self, OrreryError> {
        let path = Path::new(CONFIG_FILE);
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

// =============================================================================
// SERVER CONFIG
// =============================================================================

/// Fully resolved settings for the `serve` command.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Requests per second for the global limiter. Zero disables limiting.
    pub rate_limit: u32,
    /// Allowed CORS origins. `None` means the localhost development set;
    /// a list containing `"*"` means any origin.
    pub cors_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

impl ServerConfig {
    /// Resolve serve settings from flags, environment, and file config.
    pub fn resolve(file: &FileConfig, host_flag: Option<&str>, port_flag: Option<u16>) -> Self {
        let host = host_flag
            .map(str::to_string)
            .or_else(|| file.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = port_flag.or(file.port).unwrap_or(DEFAULT_PORT);
        let rate_limit = env_u32("ORRERY_RATE_LIMIT")
            .or(file.rate_limit)
            .unwrap_or(DEFAULT_RATE_LIMIT);
        let cors_origins = env_list("ORRERY_CORS_ORIGINS").or_else(|| file.cors_origins.clone());

        Self {
            host,
            port,
            rate_limit,
            cors_origins,
        }
    }

    /// Bind address in `host:port` form.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

// =============================================================================
// GENERATOR CONFIG
// =============================================================================

/// Build the text generator from the environment.
///
/// `ORRERY_GENERATOR=ollama` enables the Ollama backend, honoring
/// `ORRERY_OLLAMA_URL` and `ORRERY_OLLAMA_MODEL`. Unset or any other
/// value leaves generation disabled, so endpoints that need a generator
/// degrade instead of timing out against a daemon that is not running.
pub fn generator_from_env() -> Result<Generator, OrreryError> {
    match std::env::var("ORRERY_GENERATOR").ok().as_deref() {
        Some("ollama") => {
            let endpoint = std::env::var("ORRERY_OLLAMA_URL")
                .unwrap_or_else(|_| ollama::DEFAULT_ENDPOINT.to_string());
            let model = std::env::var("ORRERY_OLLAMA_MODEL")
                .unwrap_or_else(|_| ollama::DEFAULT_MODEL.to_string());
            let client = OllamaGenerator::new(endpoint, model)
                .map_err(|e| OrreryError::Generation(e.to_string()))?;
            Ok(Generator::Ollama(client))
        }
        Some("") | Some("disabled") | None => Ok(Generator::Disabled),
        Some(other) => Err(OrreryError::Validation(format!(
            "unknown generator backend: {other:?}"
        ))),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_config_parses_all_fields() {
        let config: FileConfig = toml::from_str(
            r#"
            host = "0.0.0.0"
            port = 8080
            database = "data/universe.redb"
            backend = "redb"
            rate_limit = 25
            cors_origins = ["https://site.example"]
            "#,
        )
        .expect("valid config");

        assert_eq!(config.host.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.port, Some(8080));
        assert_eq!(config.backend.as_deref(), Some("redb"));
        assert_eq!(config.rate_limit, Some(25));
        assert_eq!(
            config.cors_origins,
            Some(vec!["https://site.example".to_string()])
        );
    }

    #[test]
    fn file_config_rejects_unknown_keys() {
        let result: Result<FileConfig, _> = toml::from_str("prot = 8080\n");
        assert!(result.is_err());
    }

    #[test]
    fn load_reports_malformed_file_as_validation() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(b"port = \"not a number\"")
            .expect("write temp file");

        let result = FileConfig::load(file.path());
        assert!(matches!(result, Err(OrreryError::Validation(_))));
    }

    #[test]
    fn resolve_prefers_flags_over_file() {
        let file = FileConfig {
            host: Some("10.0.0.1".to_string()),
            port: Some(9000),
            ..FileConfig::default()
        };

        let config = ServerConfig::resolve(&file, Some("127.0.0.1"), Some(4000));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn resolve_falls_back_to_file_then_defaults() {
        let file = FileConfig {
            port: Some(9000),
            ..FileConfig::default()
        };

        let config = ServerConfig::resolve(&file, None, None);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, 9000);
        assert_eq!(config.rate_limit, DEFAULT_RATE_LIMIT);
        assert!(config.cors_origins.is_none());
    }

    #[test]
    fn addr_joins_host_and_port() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "127.0.0.1:3001");
    }
}
