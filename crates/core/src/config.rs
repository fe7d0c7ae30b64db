//! Validation strictness options.

use crate::error::{BindscopeError, Result};
use bindscope_api::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use ValidationType as V;

pub const OPTION_PREFIX: &str = "bindscope.";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationType {
    Error,
    Warning,
    None,
}

impl ValidationType {
    /// The severity to report with, or `None` when the check is disabled.
    pub fn diagnostic_kind(self) -> Option<Severity> {
        match self {
            ValidationType::Error => Some(Severity::Error),
            ValidationType::Warning => Some(Severity::Warning),
            ValidationType::None => None,
        }
    }

    fn parse(key: &str, value: &str, allowed: &[ValidationType]) -> Result<Self> {
        let parsed = match value.to_ascii_uppercase().as_str() {
            "ERROR" => ValidationType::Error,
            "WARNING" => ValidationType::Warning,
            "NONE" => ValidationType::None,
            _ => return Err(invalid(key, value)),
        };
        if allowed.contains(&parsed) {
            Ok(parsed)
        } else {
            Err(invalid(key, value))
        }
    }
}

fn invalid(key: &str, value: &str) -> BindscopeError {
    BindscopeError::InvalidOption {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerOptions {
    pub nullable_validation: ValidationType,
    pub scope_cycle_validation: ValidationType,
    pub full_binding_graph_validation: ValidationType,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            nullable_validation: ValidationType::Error,
            scope_cycle_validation: ValidationType::Error,
            full_binding_graph_validation: ValidationType::None,
        }
    }
}

impl CompilerOptions {
    /// Parses processor options of the form `bindscope.nullableValidation=WARNING`.
    ///
    /// Keys outside the `bindscope.` namespace belong to other processors and are
    /// ignored.
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let mut result = Self::default();
        let mut keys: Vec<&String> = options.keys().collect();
        keys.sort();
        for key in keys {
            let Some(name) = key.strip_prefix(OPTION_PREFIX) else {
                continue;
            };
            let value = &options[key];
            match name {
                "nullableValidation" => {
                    result.nullable_validation = V::parse(key, value, &[V::Error, V::Warning])?
                }
                "scopeCycleValidation" => {
                    result.scope_cycle_validation =
                        V::parse(key, value, &[V::Error, V::Warning, V::None])?
                }
                "fullBindingGraphValidation" => {
                    result.full_binding_graph_validation =
                        V::parse(key, value, &[V::Error, V::Warning, V::None])?
                }
                _ => return Err(invalid(key, value)),
            }
        }
        Ok(result)
    }

    pub fn full_binding_graph_enabled(&self) -> bool {
        self.full_binding_graph_validation != ValidationType::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let opts = CompilerOptions::from_options(&HashMap::new()).unwrap();
        assert_eq!(opts, CompilerOptions::default());
        assert_eq!(opts.nullable_validation.diagnostic_kind(), Some(Severity::Error));
        assert!(!opts.full_binding_graph_enabled());
    }

    #[test]
    fn test_parse_case_insensitive() {
        let opts = CompilerOptions::from_options(&options(&[
            ("bindscope.nullableValidation", "warning"),
            ("bindscope.scopeCycleValidation", "NONE"),
            ("bindscope.fullBindingGraphValidation", "Error"),
            ("other.processor.flag", "whatever"),
        ]))
        .unwrap();
        assert_eq!(opts.nullable_validation, ValidationType::Warning);
        assert_eq!(opts.scope_cycle_validation.diagnostic_kind(), None);
        assert!(opts.full_binding_graph_enabled());
    }

    #[test]
    fn test_nullable_validation_cannot_be_disabled() {
        let err = CompilerOptions::from_options(&options(&[("bindscope.nullableValidation", "NONE")]));
        assert!(matches!(err, Err(BindscopeError::InvalidOption { .. })));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = CompilerOptions::from_options(&options(&[("bindscope.fastMode", "true")]));
        assert!(err.is_err());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let opts: CompilerOptions =
            serde_json::from_str(r#"{ "scopeCycleValidation": "WARNING" }"#).unwrap();
        assert_eq!(opts.scope_cycle_validation, ValidationType::Warning);
        assert_eq!(opts.nullable_validation, ValidationType::Error);
    }
}
