//! Configuration for tagdex.
//!
//! Values are layered: built-in defaults, then an optional configuration file
//! (TOML, YAML or JSON, chosen by extension), then `TAGDEX_`-prefixed
//! environment variables, then anything the command line overrides.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tagdex_watcher::DEFAULT_EXTENSIONS;

const ENV_PREFIX: &str = "TAGDEX_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Absolute directory whose media files are indexed.
    pub watch_root: PathBuf,
    /// Where the index, status marker and error log are written. Defaults to
    /// the watch root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
    /// Defaults to the platform cache directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    pub tick_interval_ms: u64,
    /// How often the directory watcher re-walks the watch root.
    pub rescan_interval_ms: u64,
    pub extensions: Vec<String>,
    pub index_file: String,
    pub status_file: String,
    pub error_log_file: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            watch_root: PathBuf::new(),
            output_dir: None,
            cache_dir: None,
            tick_interval_ms: 1000,
            rescan_interval_ms: 5000,
            extensions: DEFAULT_EXTENSIONS.map(String::from).to_vec(),
            index_file: "index.xml".to_string(),
            status_file: "status.json".to_string(),
            error_log_file: "errors.log".to_string(),
        }
    }
}

impl Config {
    /// Load and validate configuration.
    ///
    /// `watch_root` takes precedence over every other source when given.
    pub fn load(file: Option<&Path>, watch_root: Option<&Path>) -> Result<Self> {
        let mut figment = Self::figment(file)?;
        if let Some(root) = watch_root {
            figment = figment.merge(Serialized::default("watch_root", root));
        }
        let config: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(root = %config.watch_root.display(), "Configuration loaded");
        Ok(config)
    }

    fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::new().merge(Serialized::defaults(Self::default()));
        let figment = match file {
            None => figment,
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => match path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
                Some("toml") => figment.merge(Toml::file_exact(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
                Some("json") => figment.merge(Json::file_exact(path)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
            },
        };
        Ok(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.watch_root.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("watch_root is required".to_string()));
        }
        if !self.watch_root.is_absolute() {
            exn::bail!(ErrorKind::Invalid(format!("watch_root must be absolute: {}", self.watch_root.display())));
        }
        if !self.watch_root.is_dir() {
            exn::bail!(ErrorKind::Invalid(format!("watch_root is not a directory: {}", self.watch_root.display())));
        }
        if self.tick_interval_ms == 0 || self.rescan_interval_ms == 0 {
            exn::bail!(ErrorKind::Invalid("intervals must be greater than zero".to_string()));
        }
        if self.extensions.iter().all(|ext| ext.trim().is_empty()) {
            exn::bail!(ErrorKind::Invalid("at least one extension is required".to_string()));
        }
        for (key, name) in [
            ("index_file", &self.index_file),
            ("status_file", &self.status_file),
            ("error_log_file", &self.error_log_file),
        ] {
            if name.trim().is_empty() {
                exn::bail!(ErrorKind::Invalid(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_millis(self.rescan_interval_ms)
    }

    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.watch_root)
    }

    pub fn index_path(&self) -> PathBuf {
        self.output_dir().join(&self.index_file)
    }

    pub fn status_path(&self) -> PathBuf {
        self.output_dir().join(&self.status_file)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.output_dir().join(&self.error_log_file)
    }

    /// The cache file for this watch root.
    ///
    /// Each watch root gets its own cache, named after a hash of the root path.
    pub fn cache_path(&self) -> Result<PathBuf> {
        let dir = match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => ProjectDirs::from("", "", "tagdex").ok_or_raise(|| ErrorKind::NoCacheDir)?.cache_dir().to_path_buf(),
        };
        Ok(dir.join(cache_file_name(&self.watch_root)))
    }
}

fn cache_file_name(root: &Path) -> String {
    let hash = blake3::hash(root.as_os_str().as_encoded_bytes()).to_hex();
    format!("{}.sqlite", &hash[..16])
}
