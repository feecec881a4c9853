//! Analysis configuration types (linkscan.toml format).

use crate::error::{ConfigError, Result};
use linkscan_analyser::MarkerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkscanConfig {
    /// Project metadata.
    pub project: ProjectConfig,

    /// Region marker vocabulary.
    #[serde(default)]
    pub markers: MarkerConfig,

    /// What to analyse and where to cache results.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Project metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name.
    pub name: String,

    /// Project version (optional).
    #[serde(default)]
    pub version: Option<String>,

    /// Project root directory (default: config file directory).
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Analysis settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// C sources to analyse, relative to the project root.
    #[serde(default)]
    pub sources: Vec<PathBuf>,

    /// Folder for cached `.an` results. No caching when absent.
    #[serde(default)]
    pub prebuild: Option<PathBuf>,

    /// Wrap `#include` lines in region pragmas before analysing.
    #[serde(default)]
    pub inject_pragmas: bool,

    /// Worker threads (default: one per core).
    #[serde(default)]
    pub jobs: Option<usize>,
}

impl LinkscanConfig {
    /// A configuration with defaults for everything but the project name.
    pub fn new(name: &str) -> Self {
        Self {
            project: ProjectConfig {
                name: name.to_string(),
                version: None,
                root: None,
            },
            markers: MarkerConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }

    /// Load and validate configuration from a TOML file.
    ///
    /// A relative `project.root` is resolved against the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&content)?;

        let base = path.parent().unwrap_or(Path::new("."));
        config.project.root = Some(match config.project.root.take() {
            Some(root) if root.is_relative() => base.join(root),
            Some(root) => root,
            None => base.to_path_buf(),
        });
        Ok(config)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        let config: LinkscanConfig = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the marker vocabulary can be recognised unambiguously.
    pub fn validate(&self) -> Result<()> {
        let markers = &self.markers;
        if markers.namespace.is_empty() || markers.namespace.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "marker namespace must be a single word, got {:?}",
                markers.namespace
            )));
        }

        let names = [
            &markers.system.start,
            &markers.system.end,
            &markers.user.start,
            &markers.user.end,
        ];
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(ConfigError::Validation(format!(
                    "marker names must be single words, got {name:?}"
                )));
            }
            if names[..i].contains(name) {
                return Err(ConfigError::Validation(format!(
                    "marker name {name:?} is used more than once"
                )));
            }
        }

        if self.analysis.jobs == Some(0) {
            return Err(ConfigError::Validation("jobs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Project root directory.
    pub fn root(&self) -> &Path {
        self.project.root.as_deref().unwrap_or(Path::new("."))
    }

    /// Source paths resolved against the project root.
    pub fn source_paths(&self) -> Vec<PathBuf> {
        self.analysis
            .sources
            .iter()
            .map(|source| self.root().join(source))
            .collect()
    }

    /// Prebuild folder resolved against the project root.
    pub fn prebuild_dir(&self) -> Option<PathBuf> {
        self.analysis
            .prebuild
            .as_ref()
            .map(|prebuild| self.root().join(prebuild))
    }
}
