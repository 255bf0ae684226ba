//! Application configuration.
//!
//! The top-level [`Config`] is deserialized from JSON; every section defaults
//! sensibly so an empty `{}` file is valid. Partial configs are applied via
//! [`ConfigOverlay`]: named fields override, list-valued fields replace
//! wholesale (downstream code relies on full-list replacement). Environment
//! variables carry provider credentials with the highest precedence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use pl_core::{Error, MediaKind, Result};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ordered list of watched directories; first source-prefix match wins.
    pub directories: Vec<DirectoryConfig>,
    /// Destination for files whose path matches no directory config.
    pub default_dest_dir: Option<PathBuf>,
    /// Substring patterns ignored by the watcher (beyond dotfiles and
    /// `.tmp`/`.part` suffixes).
    pub ignore_patterns: Vec<String>,
    pub watch: WatchConfig,
    pub metadata: MetadataConfig,
    pub redo: RedoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            default_dest_dir: None,
            ignore_patterns: default_ignore_patterns(),
            watch: WatchConfig::default(),
            metadata: MetadataConfig::default(),
            redo: RedoConfig::default(),
        }
    }
}

fn default_ignore_patterns() -> Vec<String> {
    vec![
        ".tmp".into(),
        ".part".into(),
        ".DS_Store".into(),
        "Thumbs.db".into(),
    ]
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist. Environment overrides are
    /// applied last.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let mut config = match path {
            None => Self::default(),
            Some(path) => match std::fs::read_to_string(path) {
                Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse config file {}: {e}", path.display());
                    Self::default()
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::info!("No config file at {}; using defaults", path.display());
                    Self::default()
                }
                Err(e) => {
                    tracing::warn!("Failed to read config file {}: {e}", path.display());
                    Self::default()
                }
            },
        };
        config.apply_env();
        config
    }

    /// Apply a partial configuration.
    ///
    /// Named fields override; list-valued fields (`directories`,
    /// `ignore_patterns`) replace the existing list wholesale.
    pub fn apply(&mut self, overlay: ConfigOverlay) {
        if let Some(directories) = overlay.directories {
            self.directories = directories;
        }
        if let Some(default_dest_dir) = overlay.default_dest_dir {
            self.default_dest_dir = Some(default_dest_dir);
        }
        if let Some(ignore_patterns) = overlay.ignore_patterns {
            self.ignore_patterns = ignore_patterns;
        }
        if let Some(watch) = overlay.watch {
            self.watch = watch;
        }
        if let Some(metadata) = overlay.metadata {
            self.metadata = metadata;
        }
        if let Some(redo) = overlay.redo {
            self.redo = redo;
        }
    }

    /// Provider credentials from the environment take precedence over the
    /// config file.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("TMDB_API_KEY") {
            if !key.is_empty() {
                self.metadata.tmdb_api_key = Some(key);
            }
        }
        if let Ok(cookies) = std::env::var("DOUBAN_COOKIES") {
            if !cookies.is_empty() {
                self.metadata.douban_cookies = Some(cookies);
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (i, dir) in self.directories.iter().enumerate() {
            if dir.source_dir.as_os_str().is_empty() {
                warnings.push(format!("directories[{i}].source_dir is empty"));
            }
            if dir.dest_dir.as_os_str().is_empty() {
                warnings.push(format!("directories[{i}].dest_dir is empty"));
            }
        }

        if self.directories.is_empty() && self.default_dest_dir.is_none() {
            warnings.push("no directories configured and no default_dest_dir set".into());
        }

        if self.metadata.tmdb_api_key.is_none() {
            warnings.push("metadata.tmdb_api_key is not set; primary provider disabled".into());
        }

        if self.redo.max_entries == 0 {
            warnings.push("redo.max_entries is 0; failed placements will not be retained".into());
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// One watched source directory and its destination root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub name: String,
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    /// Default kind applied when classification yields Unknown.
    #[serde(default)]
    pub media_type: Option<MediaKind>,
}

/// File-system watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub enabled: bool,
    /// Delay after a creation event before the existence/size check.
    #[serde(default = "default_create_settle")]
    pub create_settle_secs: u64,
    /// Window after a modification event before the mtime recheck.
    #[serde(default = "default_modify_settle")]
    pub modify_settle_secs: u64,
}

fn default_create_settle() -> u64 {
    1
}

fn default_modify_settle() -> u64 {
    2
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            create_settle_secs: default_create_settle(),
            modify_settle_secs: default_modify_settle(),
        }
    }
}

/// Metadata enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub tmdb_api_key: Option<String>,
    pub douban_cookies: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    /// Consult the secondary provider when the primary yields nothing.
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_language() -> String {
    "zh-CN".into()
}

fn default_true() -> bool {
    true
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/cache")
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            tmdb_api_key: None,
            douban_cookies: None,
            language: default_language(),
            fallback_enabled: default_true(),
            cache_dir: default_cache_dir(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Redo log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedoConfig {
    #[serde(default = "default_redo_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_redo_dir() -> PathBuf {
    PathBuf::from("./data/redo")
}

fn default_max_entries() -> usize {
    100
}

impl Default for RedoConfig {
    fn default() -> Self {
        Self {
            dir: default_redo_dir(),
            max_entries: default_max_entries(),
        }
    }
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// A partial configuration: every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigOverlay {
    pub directories: Option<Vec<DirectoryConfig>>,
    pub default_dest_dir: Option<PathBuf>,
    pub ignore_patterns: Option<Vec<String>>,
    pub watch: Option<WatchConfig>,
    pub metadata: Option<MetadataConfig>,
    pub redo: Option<RedoConfig>,
}
