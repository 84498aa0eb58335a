//! Operation filter configuration.
//!
//! An optional JSON file (via `--config`) can switch off whole HTTP
//! methods, individual operation IDs, or path patterns. A disabled
//! operation is neither listed by `tools/list` nor callable via
//! `tools/call`.

mod settings;

pub use settings::{DisabledOperations, FilterSettings};

use std::path::Path;

use regex::Regex;

use crate::error::ConfigError;
use crate::openapi::HttpMethod;

/// A validated, compiled operation filter.
#[derive(Debug, Default)]
pub struct OperationFilter {
    settings: FilterSettings,
    disabled_paths: Vec<Regex>,
}

impl OperationFilter {
    /// Compiles a filter from parsed settings.
    ///
    /// # Errors
    ///
    /// Returns an error if any disabled-path pattern fails to compile.
    pub fn from_settings(settings: FilterSettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        let disabled_paths = settings
            .disabled_paths
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            settings,
            disabled_paths,
        })
    }

    /// Whether the given operation may be projected and called.
    #[must_use]
    pub fn allows(&self, method: HttpMethod, path: &str, operation_id: &str) -> bool {
        let ops = &self.settings.disabled_operations;
        let method_disabled = match method {
            HttpMethod::Get => ops.get,
            HttpMethod::Post => ops.post,
            HttpMethod::Put => ops.put,
            HttpMethod::Delete => ops.delete,
            HttpMethod::Patch => ops.patch,
        };
        if method_disabled {
            return false;
        }

        if self
            .settings
            .disabled_endpoints
            .iter()
            .any(|id| id == operation_id)
        {
            return false;
        }

        !self.disabled_paths.iter().any(|re| re.is_match(path))
    }
}

/// Loads and compiles the filter configuration.
///
/// A `None` path yields the default filter, which allows everything.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_filter(path: Option<&Path>) -> Result<OperationFilter, ConfigError> {
    let Some(path) = path else {
        return Ok(OperationFilter::default());
    };

    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let settings: FilterSettings =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    OperationFilter::from_settings(settings)
}
