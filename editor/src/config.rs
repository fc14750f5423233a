//! Editor configuration.
//!
//! Everything the bootstrap needs to locate host-side assets: the base URL,
//! the loader script, module names and their global bindings, and the poll
//! fallback intervals. Values come from the embedder directly or from a TOML
//! file; unset fields keep their defaults.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use inkpad_host::LoaderSettings;

const DEFAULT_BASE_URL: &str = "https://localhost/inkpad/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot resolve '{path}' against '{base}': {message}")]
    Resolve {
        base: Url,
        path: String,
        message: String,
    },
    #[error("poll_interval_ms must be non-zero")]
    ZeroPollInterval,
    #[error("ready_timeout_ms ({timeout}) must be at least poll_interval_ms ({interval})")]
    TimeoutShorterThanInterval { timeout: u64, interval: u64 },
}

/// Bootstrap configuration for one editor instance.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Absolute base every relative path below resolves against. Resolution
    /// follows RFC 3986, so end the base with `/` to nest paths under it.
    pub base_url: Url,
    /// Module-loader script injected into the inner context.
    pub loader_script_path: String,
    /// Location applied as the loader's module root.
    pub module_root_path: String,
    /// Location applied as the loader's library root.
    pub module_library_path: String,
    /// Global name the loader registers itself under.
    pub global_key: String,
    /// Inner-editor module and the global it is bound to.
    pub editor_module: String,
    pub editor_binding: String,
    /// Plugin-registry module and the global it is bound to.
    pub plugins_module: String,
    pub plugins_binding: String,
    /// DOM-utility module and the global it is bound to.
    pub dom_module: String,
    pub dom_binding: String,
    /// Cache-busting token appended as a `v=` query parameter to script URLs.
    pub cache_key: Option<String>,
    /// Poll fallback probe interval.
    pub poll_interval_ms: u64,
    /// Poll fallback deadline.
    pub ready_timeout_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            loader_script_path: "modules/loader.js".to_string(),
            module_root_path: "modules/src".to_string(),
            module_library_path: "modules/lib".to_string(),
            global_key: "require".to_string(),
            editor_module: "editor_inner".to_string(),
            editor_binding: "EditorInner".to_string(),
            plugins_module: "client_plugins".to_string(),
            plugins_binding: "plugins".to_string(),
            dom_module: "domlib".to_string(),
            dom_binding: "$".to_string(),
            cache_key: None,
            poll_interval_ms: 10,
            ready_timeout_ms: 5000,
        }
    }
}

impl EditorConfig {
    /// Parses a TOML document and validates the result.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.ready_timeout_ms < self.poll_interval_ms {
            return Err(ConfigError::TimeoutShorterThanInterval {
                timeout: self.ready_timeout_ms,
                interval: self.poll_interval_ms,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Resolves a path against the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
        self.base_url.join(path).map_err(|e| ConfigError::Resolve {
            base: self.base_url.clone(),
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    /// Resolves a script location, appending the cache-busting token.
    pub fn script_url(&self, path: &str) -> Result<Url, ConfigError> {
        let mut url = self.resolve(path)?;
        if let Some(key) = &self.cache_key {
            url.query_pairs_mut().append_pair("v", key);
        }
        Ok(url)
    }

    pub fn loader_script_url(&self) -> Result<Url, ConfigError> {
        self.script_url(&self.loader_script_path)
    }

    /// Module scripts worth fetching ahead of the loader handshake.
    pub fn module_prefetch_urls(&self) -> Result<Vec<Url>, ConfigError> {
        let root = &self.module_root_path;
        Ok(vec![
            self.script_url(&format!("{root}/{}.js", self.editor_module))?,
            self.script_url(&format!("{root}/{}.js", self.plugins_module))?,
        ])
    }

    /// Settings pushed into the inner context's module loader.
    pub fn loader_settings(&self) -> Result<LoaderSettings, ConfigError> {
        Ok(LoaderSettings {
            root: self.resolve(&self.module_root_path)?,
            library: self.resolve(&self.module_library_path)?,
            global_key: self.global_key.clone(),
        })
    }
}
