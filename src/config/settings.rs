//! Filter configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use serde::Deserialize;

use crate::error::ConfigError;

/// Root filter configuration structure.
///
/// Everything defaults to "enabled"; the file only needs to name what to
/// switch off.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterSettings {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// HTTP methods that are switched off entirely.
    #[serde(rename = "disabledOperations", default)]
    pub disabled_operations: DisabledOperations,

    /// Operation IDs that are switched off individually.
    #[serde(rename = "disabledEndpoints", default)]
    pub disabled_endpoints: Vec<String>,

    /// Regex patterns matched against operation paths.
    #[serde(rename = "disabledPaths", default)]
    pub disabled_paths: Vec<String>,
}

impl FilterSettings {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any disabled-path pattern is not a valid
    /// regular expression.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in &self.disabled_paths {
            if let Err(source) = regex::Regex::new(pattern) {
                return Err(ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                });
            }
        }
        Ok(())
    }
}

/// Per-method switches. `true` means the method is disabled.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DisabledOperations {
    /// Disable all GET operations.
    #[serde(default)]
    pub get: bool,
    /// Disable all POST operations.
    #[serde(default)]
    pub post: bool,
    /// Disable all PUT operations.
    #[serde(default)]
    pub put: bool,
    /// Disable all DELETE operations.
    #[serde(default)]
    pub delete: bool,
    /// Disable all PATCH operations.
    #[serde(default)]
    pub patch: bool,
    /// Accepted for compatibility; HEAD is never projected anyway.
    #[serde(default)]
    pub head: bool,
    /// Accepted for compatibility; OPTIONS is never projected anyway.
    #[serde(default)]
    pub options: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_settings() {
        let settings: FilterSettings = serde_json::from_str("{}").unwrap();
        assert!(settings.validate().is_ok());
        assert!(!settings.disabled_operations.delete);
        assert!(settings.disabled_endpoints.is_empty());
    }

    #[test]
    fn parse_full_settings() {
        let json = r#"{
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "disabledOperations": {
                "delete": true,
                "patch": true
            },
            "disabledEndpoints": ["dropDatabase"],
            "disabledPaths": ["^/admin/"]
        }"#;

        let settings: FilterSettings = serde_json::from_str(json).unwrap();
        assert!(settings.validate().is_ok());
        assert!(settings.disabled_operations.delete);
        assert!(settings.disabled_operations.patch);
        assert!(!settings.disabled_operations.get);
        assert_eq!(settings.disabled_endpoints, vec!["dropDatabase"]);
    }

    #[test]
    fn reject_invalid_pattern() {
        let json = r#"{"disabledPaths": ["["]}"#;
        let settings: FilterSettings = serde_json::from_str(json).unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn reject_unknown_fields() {
        let json = r#"{"unknown_field": "value"}"#;
        let result: Result<FilterSettings, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
