// Copyright (c) The runtree Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration.
//!
//! Configuration is read from a TOML file:
//!
//! ```toml
//! [convertor]
//! # Treat event stream inconsistencies as hard errors. Intended for
//! # protocol-conformance testing only.
//! strict = false
//! ```
//!
//! Setting `RUNTREE_STRICT=1` in the environment enables strict mode
//! regardless of the file.

use crate::errors::ConfigError;
use camino::{Utf8Path, Utf8PathBuf};
use etcetera::{BaseStrategy, HomeDirError, base_strategy::Xdg};
use serde::Deserialize;
use std::{collections::BTreeSet, env, io};
use swrite::{SWrite, swrite};
use tracing::{debug, warn};

/// Special value for `--config` and `RUNTREE_CONFIG` that skips loading
/// configuration entirely.
pub const CONFIG_NONE: &str = "none";

/// The environment variable that forces strict mode.
pub const STRICT_ENV: &str = "RUNTREE_STRICT";

/// Specifies where to load configuration from.
#[derive(Clone, Copy, Debug)]
pub enum ConfigLocation<'a> {
    /// Discover configuration from the default location
    /// (`~/.config/runtree/config.toml`).
    Default,

    /// Skip loading configuration, using only built-in defaults.
    Isolated,

    /// Load configuration from an explicit path. It is an error for the file
    /// not to exist.
    Explicit(&'a Utf8Path),
}

impl<'a> ConfigLocation<'a> {
    /// Creates a location from a CLI or environment variable value.
    ///
    /// Returns `Default` if `None`, `Isolated` if `"none"`, otherwise
    /// `Explicit` with the path.
    pub fn from_cli_or_env(s: Option<&'a str>) -> Self {
        match s {
            None => Self::Default,
            Some(CONFIG_NONE) => Self::Isolated,
            Some(s) => Self::Explicit(Utf8Path::new(s)),
        }
    }
}

/// Settings for the event convertor and the name-based tree builder.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConvertorConfig {
    /// If true, stream inconsistencies are returned as errors instead of
    /// being logged and dropped.
    pub strict: bool,
}

impl ConvertorConfig {
    /// A configuration with strict mode enabled.
    pub const STRICT: Self = Self { strict: true };
}

/// Resolved configuration.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RuntreeConfig {
    /// Convertor settings.
    pub convertor: ConvertorConfig,
}

impl RuntreeConfig {
    /// Loads configuration from `location` and applies environment overrides.
    pub fn load(location: ConfigLocation<'_>) -> Result<Self, ConfigError> {
        Self::load_with_warnings(location, &mut DefaultConfigWarnings)
    }

    fn load_with_warnings(
        location: ConfigLocation<'_>,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Self, ConfigError> {
        let deserialized = match location {
            ConfigLocation::Isolated => {
                debug!("config: skipping (isolated)");
                None
            }
            ConfigLocation::Explicit(path) => {
                debug!("config: loading from explicit path {path}");
                match DeserializedConfig::from_path_with_warnings(path, warnings)? {
                    Some(config) => Some(config),
                    None => {
                        return Err(ConfigError::FileNotFound {
                            path: path.to_owned(),
                        });
                    }
                }
            }
            ConfigLocation::Default => match default_config_path()? {
                Some(path) => DeserializedConfig::from_path_with_warnings(&path, warnings)?,
                None => {
                    debug!("config: could not determine config directory");
                    None
                }
            },
        };

        let mut config = Self::default();
        if let Some(deserialized) = deserialized {
            config.convertor.strict = deserialized.convertor.strict.unwrap_or(false);
        }
        if strict_from_env() {
            debug!("config: strict mode enabled via {STRICT_ENV}");
            config.convertor.strict = true;
        }
        Ok(config)
    }
}

fn strict_from_env() -> bool {
    env::var(STRICT_ENV).is_ok_and(|value| value == "1")
}

/// Returns the default config path, `$XDG_CONFIG_HOME/runtree/config.toml`.
pub fn default_config_path() -> Result<Option<Utf8PathBuf>, ConfigError> {
    let strategy = match Xdg::new() {
        Ok(s) => s,
        Err(HomeDirError) => return Ok(None),
    };

    let config_path = strategy.config_dir().join("runtree").join("config.toml");
    Utf8PathBuf::try_from(config_path)
        .map(Some)
        .map_err(|error| ConfigError::NonUtf8Path { error })
}

/// Handling for configuration warnings, so that tests can collect them
/// instead of logging them.
trait ConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>);
}

struct DefaultConfigWarnings;

impl ConfigWarnings for DefaultConfigWarnings {
    fn unknown_config_keys(&mut self, config_file: &Utf8Path, unknown: &BTreeSet<String>) {
        let mut unknown_str = String::new();
        if unknown.len() == 1 {
            // Print this on the same line.
            unknown_str.push_str("key: ");
            unknown_str.push_str(unknown.iter().next().map_or("", String::as_str));
        } else {
            unknown_str.push_str("keys:\n");
            for ignored_key in unknown {
                swrite!(unknown_str, "\n  - {ignored_key}");
            }
        }

        warn!("in config file {config_file}, ignoring unknown configuration {unknown_str}");
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedConfig {
    #[serde(default)]
    convertor: DeserializedConvertorConfig,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DeserializedConvertorConfig {
    #[serde(default)]
    strict: Option<bool>,
}

impl DeserializedConfig {
    /// Returns `Ok(None)` if the file does not exist.
    fn from_path_with_warnings(
        path: &Utf8Path,
        warnings: &mut impl ConfigWarnings,
    ) -> Result<Option<Self>, ConfigError> {
        debug!("config: attempting to load from {path}");
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("config: file does not exist at {path}");
                return Ok(None);
            }
            Err(error) => {
                return Err(ConfigError::Read {
                    path: path.to_owned(),
                    error,
                });
            }
        };

        let (config, unknown) =
            Self::deserialize_toml(&contents).map_err(|error| ConfigError::Parse {
                path: path.to_owned(),
                error,
            })?;

        if !unknown.is_empty() {
            warnings.unknown_config_keys(path, &unknown);
        }

        debug!("config: loaded successfully from {path}");
        Ok(Some(config))
    }

    fn deserialize_toml(contents: &str) -> Result<(Self, BTreeSet<String>), toml::de::Error> {
        let deserializer = toml::Deserializer::parse(contents)?;
        let mut unknown = BTreeSet::new();
        let config: DeserializedConfig = serde_ignored::deserialize(deserializer, |path| {
            unknown.insert(path.to_string());
        })?;
        Ok((config, unknown))
    }
}
