//! Transition configuration
//!
//! Engines can be preconfigured from a TOML document:
//!
//! ```toml
//! default_display = "inline-block"
//!
//! [bindings]
//! x = "css-x"
//! visible = "css-hidden"
//!
//! [states.open]
//! values = { x = 0, opacity = 1 }
//! params = { duration = 300 }
//! ```
//!
//! Bindings are kept as dynamic values and validated when an engine is
//! created, so a bad entry fails with the same message `bind` would give.

use fl_core::ValueMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::default_suite::DEFAULT_DISPLAY;
use crate::params::FireParams;

/// Errors loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse transition config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A named state preset
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StateConfig {
    #[serde(default)]
    pub values: ValueMap,
    #[serde(default)]
    pub params: Option<ValueMap>,
}

impl StateConfig {
    pub fn fire_params(&self) -> Option<FireParams> {
        self.params.clone().map(FireParams::from_values)
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TransitionConfig {
    /// Display restored when showing an element with no recorded display
    #[serde(default = "default_display")]
    pub default_display: String,
    /// scope property -> transition property
    #[serde(default)]
    pub bindings: ValueMap,
    #[serde(default)]
    pub states: IndexMap<String, StateConfig>,
}

fn default_display() -> String {
    DEFAULT_DISPLAY.to_string()
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            default_display: default_display(),
            bindings: ValueMap::new(),
            states: IndexMap::new(),
        }
    }
}

impl TransitionConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            bindings = config.bindings.len(),
            states = config.states.len(),
            "loaded transition config"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_core::Value;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TransitionConfig::from_toml_str("").unwrap();
        assert_eq!(config, TransitionConfig::default());
        assert_eq!(config.default_display, "block");
    }

    #[test]
    fn test_parse_bindings_and_states() {
        let config = TransitionConfig::from_toml_str(
            r#"
default_display = "inline"

[bindings]
x = "css-x"
hidden = "css-hidden"

[states.open]
values = { x = 0, width = "100%" }
params = { a = "value" }

[states.closed]
values = { x = -200 }
"#,
        )
        .unwrap();

        assert_eq!(config.default_display, "inline");
        assert_eq!(config.bindings.get("x"), Some(&Value::from("css-x")));
        assert_eq!(config.states.keys().collect::<Vec<_>>(), vec!["open", "closed"]);

        let open = &config.states["open"];
        assert_eq!(open.values.get("x"), Some(&Value::from(0)));
        assert_eq!(open.values.get("width"), Some(&Value::from("100%")));
        let params = open.fire_params().unwrap();
        assert_eq!(params.get("a"), Some(&Value::from("value")));
        assert!(config.states["closed"].fire_params().is_none());
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let err = TransitionConfig::from_toml_str("bindings = 12").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = TransitionConfig::load("/nonexistent/fl-transition.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/fl-transition.toml"));
    }
}
