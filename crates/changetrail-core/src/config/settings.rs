//! Serde-loadable tracking settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Scalar tracking settings, typically loaded from a JSON file at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSettings {
    /// Master switch for audit drafting.
    pub enabled: bool,
    /// Record every included property on add/delete, even without a value.
    pub track_empty_properties_on_addition_and_deletion: bool,
    /// Read original values back from the store instead of the snapshot.
    pub disconnected_context: bool,
    /// Constant user name stamped on logs when no factory is configured.
    pub default_username: Option<String>,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            track_empty_properties_on_addition_and_deletion: false,
            disconnected_context: false,
            default_username: None,
        }
    }
}

impl TrackingSettings {
    /// Parse settings from a JSON document. Missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Load settings from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Render the settings as pretty JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = TrackingSettings::default();
        assert!(settings.enabled);
        assert!(!settings.track_empty_properties_on_addition_and_deletion);
        assert!(!settings.disconnected_context);
        assert!(settings.default_username.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings = TrackingSettings::from_json(r#"{ "disconnected_context": true }"#).unwrap();
        assert!(settings.enabled);
        assert!(settings.disconnected_context);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            TrackingSettings::from_json("{ not json"),
            Err(Error::Deserialization(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracking.json");
        let settings = TrackingSettings {
            default_username: Some("system".into()),
            ..Default::default()
        };
        std::fs::write(&path, settings.to_json().unwrap()).unwrap();

        assert_eq!(TrackingSettings::from_file(&path).unwrap(), settings);
    }
}
