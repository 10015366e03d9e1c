//! Framework configuration
//!
//! The process-wide settings the compute framework is built from:
//! - `rhi` - the shader platform the process renders with
//! - `compile` - editor / automation mode and compile worker count
//! - `cache` - which cache backend to use and where it keeps its records
//!
//! # Files
//!
//! Configuration is stored as TOML (`computegraph.toml`). A `.json` file is
//! read and written as JSON instead.
//!
//! # Cache Location
//!
//! The on-disk cache defaults to the platform cache directory under
//! `dev.computegraph-rs/ddc`:
//! - **Linux**: `~/.cache/dev.computegraph-rs/ddc/`
//! - **macOS**: `~/Library/Caches/dev.computegraph-rs/ddc/`
//! - **Windows**: `%LOCALAPPDATA%\dev.computegraph-rs\ddc\`
//!
//! # Example
//!
//! ```ignore
//! use computegraph_rs::config::FrameworkConfig;
//!
//! let mut config = FrameworkConfig::load_or_default("computegraph.toml");
//! config.compile.worker_threads = 8;
//! config.save("computegraph.toml")?;
//! ```

use crate::error::{ComputeGraphError, Result};
use crate::types::{FeatureLevel, ShaderPlatform};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.computegraph-rs";

/// Default configuration filename
pub const CONFIG_FILE: &str = "computegraph.toml";

/// Subdirectory of the cache directory holding cache records
pub const CACHE_SUBDIR: &str = "ddc";

/// Default number of compile worker threads
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Default on-disk cache directory
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs_next::cache_dir().map(|p| p.join(APP_ID).join(CACHE_SUBDIR))
}

// ==================== RHI ====================

/// Rendering hardware settings of the process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RhiConfig {
    /// Max RHI shader platform; its max feature level is the cache feature level
    #[serde(default)]
    pub shader_platform: ShaderPlatform,

    /// False for headless processes that never build render proxies
    #[serde(default = "default_true")]
    pub can_ever_render: bool,
}

impl Default for RhiConfig {
    fn default() -> Self {
        Self {
            shader_platform: ShaderPlatform::default(),
            can_ever_render: true,
        }
    }
}

impl RhiConfig {
    pub fn feature_level(&self) -> FeatureLevel {
        self.shader_platform.max_feature_level()
    }
}

// ==================== Compile ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Running inside the editor (asynchronous compiles are allowed)
    #[serde(default)]
    pub editor: bool,

    /// Running under automation; every compile is synchronous
    #[serde(default)]
    pub automation_testing: bool,

    /// Compile and cache I/O worker threads
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            editor: false,
            automation_testing: false,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

// ==================== Cache ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Filesystem,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,

    /// Root of the file system cache; defaults to [`default_cache_dir`]
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl CacheConfig {
    /// Directory the file system backend uses
    pub fn resolved_directory(&self) -> Result<PathBuf> {
        self.directory
            .clone()
            .or_else(default_cache_dir)
            .ok_or_else(|| {
                ComputeGraphError::Config("Could not determine cache directory".to_string())
            })
    }
}

// ==================== Framework ====================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameworkConfig {
    #[serde(default)]
    pub rhi: RhiConfig,

    #[serde(default)]
    pub compile: CompileConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_true() -> bool {
    true
}

fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl FrameworkConfig {
    /// Editor process defaults
    pub fn editor() -> Self {
        Self {
            compile: CompileConfig {
                editor: true,
                ..CompileConfig::default()
            },
            ..Self::default()
        }
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ComputeGraphError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        if is_json(path) {
            serde_json::from_str(&content).map_err(|e| {
                ComputeGraphError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })
        } else {
            toml::from_str(&content).map_err(|e| {
                ComputeGraphError::Config(format!("Failed to parse {}: {}", path.display(), e))
            })
        }
    }

    /// Load a configuration file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load framework config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save to a configuration file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_json(path) {
            serde_json::to_string_pretty(self).map_err(|e| {
                ComputeGraphError::Config(format!("Failed to serialize config: {}", e))
            })?
        } else {
            toml::to_string_pretty(self).map_err(|e| {
                ComputeGraphError::Config(format!("Failed to serialize config: {}", e))
            })?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ComputeGraphError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| ComputeGraphError::Config(format!("Failed to write config: {}", e)))
    }
}
