//! Settings for the folio tools.
//!
//! Settings are layered, later layers overriding earlier ones:
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `folio/config.toml` in the user config dir)
//! 3. environment variables `FOLIO__<SECTION>__<KEY>`, e.g.
//!    `FOLIO__SEARCH__BOOL_MODE=or`
//!
//! Paths may start with `~`.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use folio_index::{ExtractOptions, RenderOptions, SearchOptions};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "FOLIO";

/// Errors that can occur when loading settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Settings file not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Where the corpus lives and where its index goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusSettings {
    /// Directory searched recursively for `*.xml` sources
    pub source_dir: String,
    /// Text registry (TOML, `[[texts]]` tables)
    pub registry: String,
    /// Directory holding `index.json` and `manifest.json`
    pub artifact_dir: String,
}

impl Default for CorpusSettings {
    fn default() -> Self {
        Self {
            source_dir: "texts".to_string(),
            registry: "texts.toml".to_string(),
            artifact_dir: folio_index::DEFAULT_ARTIFACT_DIR.to_string(),
        }
    }
}

impl CorpusSettings {
    pub fn source_dir(&self) -> PathBuf {
        expand(&self.source_dir)
    }

    pub fn registry(&self) -> PathBuf {
        expand(&self.registry)
    }

    pub fn artifact_dir(&self) -> PathBuf {
        expand(&self.artifact_dir)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub corpus: CorpusSettings,
    pub extract: ExtractOptions,
    pub search: SearchOptions,
    pub render: RenderOptions,
}

impl Settings {
    /// Load settings. An explicit `path` must exist; otherwise the default
    /// settings file is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) if !path.exists() => return Err(SettingsError::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_settings_path().filter(|path| path.exists()),
        };
        Self::load_layers(file.as_deref(), ENV_PREFIX)
    }

    fn load_layers(file: Option<&Path>, env_prefix: &str) -> Result<Self, SettingsError> {
        let defaults = toml::to_string(&Settings::default())?;
        let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).format(FileFormat::Toml));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// `folio/config.toml` in the platform's user config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("folio").join("config.toml"))
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
