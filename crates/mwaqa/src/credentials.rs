//! Credentials for quality database writes
//!
//! The registry maps user names to secure keys and may override the QA base
//! URL. It's read from INI files:
//!
//! ```text
//! [KEYS]
//! quality = secret
//!
//! [BASEURL]
//! url = http://mro.mwa128t.org/
//! ```
//!
//! Loading happens at most once per [`CredentialCache`], on first use.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use config::{Config, File, FileFormat};
use log::{debug, warn};

use crate::error::{QueryError, Result};

pub const DEFAULT_USER: &str = "quality";

/// Lowest priority first; later files override earlier ones
pub const CONFIG_PATHS: &[&str] = &["/usr/local/etc/quality.conf", "./quality.conf"];

/// Extra config file, read last
pub const CONFIG_ENV_VAR: &str = "MWAQA_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_name: String,
    pub secure_key: Option<String>,
}

impl Credentials {
    pub fn new(user_name: impl Into<String>, secure_key: Option<&str>) -> Self {
        Self {
            user_name: user_name.into(),
            secure_key: secure_key.map(str::to_string),
        }
    }

    pub fn has_key(&self) -> bool {
        self.secure_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// User name to secure key mapping, plus an optional QA base URL override
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRegistry {
    keys: HashMap<String, String>,
    base_url: Option<String>,
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, user_name: &str, secure_key: &str) -> Self {
        self.keys
            .insert(user_name.to_lowercase(), secure_key.trim().to_string());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn secure_key(&self, user_name: &str) -> Option<&str> {
        self.keys.get(&user_name.to_lowercase()).map(String::as_str)
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Where a registry comes from
pub trait CredentialSource {
    fn load(&self) -> Result<CredentialRegistry>;
}

impl CredentialSource for CredentialRegistry {
    fn load(&self) -> Result<CredentialRegistry> {
        Ok(self.clone())
    }
}

/// INI files read in order, later files overriding earlier ones.
/// Missing files are skipped; if none exist the registry is empty.
#[derive(Debug, Clone)]
pub struct ConfigFileSource {
    paths: Vec<PathBuf>,
}

impl ConfigFileSource {
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Default for ConfigFileSource {
    fn default() -> Self {
        let mut paths: Vec<PathBuf> = CONFIG_PATHS.iter().map(PathBuf::from).collect();
        if let Some(extra) = std::env::var_os(CONFIG_ENV_VAR) {
            paths.push(PathBuf::from(extra));
        }
        Self { paths }
    }
}

impl CredentialSource for ConfigFileSource {
    fn load(&self) -> Result<CredentialRegistry> {
        debug!("loading config file.");
        let existing: Vec<&PathBuf> = self.paths.iter().filter(|p| p.is_file()).collect();
        if existing.is_empty() {
            warn!(
                "None of the specified configuration files found: {:?}",
                self.paths
            );
            return Ok(CredentialRegistry::new());
        }

        let mut builder = Config::builder();
        for path in existing {
            builder = builder.add_source(
                File::new(&path.to_string_lossy(), FileFormat::Ini).required(false),
            );
        }
        let config = builder
            .build()
            .map_err(|e| QueryError::Config(e.to_string()))?;
        let sections: HashMap<String, config::Value> = config
            .try_deserialize()
            .map_err(|e| QueryError::Config(e.to_string()))?;

        let mut registry = CredentialRegistry::new();
        for (section, value) in sections {
            // Top-level keys outside any section are not tables
            let Ok(table) = value.into_table() else {
                continue;
            };
            if section.eq_ignore_ascii_case("keys") {
                for (user_name, key) in table {
                    let key = key
                        .into_string()
                        .map_err(|e| QueryError::Config(e.to_string()))?;
                    registry = registry.with_key(&user_name, &key);
                }
            } else if section.eq_ignore_ascii_case("baseurl") {
                for (_, url) in table {
                    let url = url
                        .into_string()
                        .map_err(|e| QueryError::Config(e.to_string()))?;
                    registry.base_url = Some(url.trim().to_string());
                }
            }
        }

        debug!("Config file loaded, {} keys", registry.len());
        Ok(registry)
    }
}

/// Lazily loaded registry, owned by the caller and shared by clients
pub struct CredentialCache {
    source: Box<dyn CredentialSource + Send + Sync>,
    registry: OnceLock<CredentialRegistry>,
}

impl CredentialCache {
    pub fn new(source: impl CredentialSource + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(source),
            registry: OnceLock::new(),
        }
    }

    /// Cache over the default config file locations
    pub fn from_config_files() -> Self {
        Self::new(ConfigFileSource::default())
    }

    pub fn is_loaded(&self) -> bool {
        self.registry.get().is_some()
    }

    /// Load on first call, then keep returning the same registry
    pub fn registry(&self) -> Result<&CredentialRegistry> {
        if let Some(registry) = self.registry.get() {
            return Ok(registry);
        }
        let loaded = self.source.load()?;
        Ok(self.registry.get_or_init(|| loaded))
    }

    /// Explicit `secure_key` wins; otherwise look the user up in the registry
    pub fn resolve(&self, user_name: &str, secure_key: Option<&str>) -> Result<Credentials> {
        if secure_key.is_some() {
            return Ok(Credentials::new(user_name, secure_key));
        }
        let registry = self.registry()?;
        Ok(Credentials::new(user_name, registry.secure_key(user_name)))
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
