//! Configuration file loading.
//!
//! The file is JSON:
//!
//! ```json
//! {
//!   "settings": { "interval": "1s", "rsync_args": ["-e", "ssh"] },
//!   "mappings": [
//!     { "source": "$HOME/project/", "target": "host:/srv/project", "exclusions": ["build/"] }
//!   ]
//! }
//! ```
//!
//! Capitalised keys (`Settings`, `Mappings`, `Interval`, `Source`, ...) are
//! accepted too.

use std::path::Path;
use std::time::Duration;

use autorsync_directory_watcher::PathMatch;
use serde::Deserialize;

use crate::env;
use crate::error::{EngineError, Result};
use crate::mapping::{Mapping, Settings};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".autorsync";

/// Fully resolved configuration ready to start the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Mappings in configuration order.
    pub mappings: Vec<Mapping>,

    /// Global settings.
    pub settings: Settings,
}

impl EngineConfig {
    /// Create a configuration from already resolved parts.
    pub fn new(mappings: Vec<Mapping>, settings: Settings) -> Self {
        Self { mappings, settings }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(alias = "Settings")]
    settings: SettingsFile,

    #[serde(alias = "Mappings", default)]
    mappings: Vec<MappingFile>,
}

#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(alias = "Interval")]
    interval: String,

    #[serde(default)]
    rsync_args: Vec<String>,

    #[serde(default)]
    exclusion_matching: PathMatch,

    #[serde(default = "default_track_new_directories")]
    track_new_directories: bool,
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    #[serde(alias = "Source")]
    source: String,

    #[serde(alias = "Target")]
    target: String,

    #[serde(alias = "Exclusions", default)]
    exclusions: Vec<String>,
}

fn default_track_new_directories() -> bool {
    true
}

/// Load a configuration file, expanding variables from the process environment.
pub fn load(path: &Path) -> Result<EngineConfig> {
    let contents = std::fs::read_to_string(path)?;
    parse(&contents, &path.to_string_lossy(), env::lookup)
}

/// Parse configuration text.
///
/// `config_path` is appended verbatim to every mapping's exclusions so the
/// configuration file never gets synced. `lookup` resolves environment
/// variables.
pub fn parse<F>(contents: &str, config_path: &str, lookup: F) -> Result<EngineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file: ConfigFile = serde_json::from_str(contents)?;

    if file.mappings.is_empty() {
        return Err(EngineError::Config("no mappings configured".to_string()));
    }

    let interval = parse_interval(&file.settings.interval)?;
    let path_match = file.settings.exclusion_matching;

    let mut settings = Settings::new(interval)
        .with_extra_args(
            file.settings
                .rsync_args
                .iter()
                .map(|arg| env::expand_with(arg, &lookup))
                .collect(),
        )
        .with_path_match(path_match);
    if !file.settings.track_new_directories {
        settings = settings.without_directory_tracking();
    }

    let mappings = file
        .mappings
        .into_iter()
        .enumerate()
        .map(|(index, mapping)| {
            let source = env::expand_with(&mapping.source, &lookup);
            let target = env::expand_with(&mapping.target, &lookup);

            if source.is_empty() {
                return Err(EngineError::Config(format!(
                    "mapping {index} has an empty source"
                )));
            }
            if target.is_empty() {
                return Err(EngineError::Config(format!(
                    "mapping {index} has an empty target"
                )));
            }

            let mut exclusions = mapping.exclusions;
            exclusions.push(config_path.to_string());

            Ok(Mapping::new(source, target, exclusions).with_path_match(path_match))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(EngineConfig { mappings, settings })
}

/// Parse an interval such as `500ms`, `1s` or `1m30s`. Zero is rejected.
pub fn parse_interval(input: &str) -> Result<Duration> {
    let interval =
        humantime::parse_duration(input.trim()).map_err(|e| EngineError::InvalidInterval {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

    if interval.is_zero() {
        return Err(EngineError::InvalidInterval {
            input: input.to_string(),
            reason: "interval must be greater than zero".to_string(),
        });
    }

    Ok(interval)
}
