//! Run configuration.
//!
//! All structs deserialize with `#[serde(default)]`, so a JSON file only
//! needs the fields it overrides.

use std::path::{Path, PathBuf};

use crate::detector::{BlurConfig, HoughConfig};
use crate::tracker::FlowConfig;

pub use crate::metrics::EvalConfig;

/// Failure to load a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Parameters of an automatic tracking run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    /// Pre-blur of the search region before detection.
    pub blur: BlurConfig,
    /// Seed detection.
    pub detector: HoughConfig,
    /// Frame-to-frame motion estimation.
    pub flow: FlowConfig,
}

impl TrackConfig {
    /// Load from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Parameters of a manual annotation session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub blur: BlurConfig,
    /// Detector used to suggest a point on each frame.
    pub detector: HoughConfig,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            blur: BlurConfig::default(),
            detector: HoughConfig::annotation(),
        }
    }
}
