//! Conversion configuration.
//!
//! The only externally tunable input of a decision besides runtime facts:
//! which conversions run, and which target form is preferred where RSpec 3
//! offers more than one.
//!
//! Loaded from an optional JSON file and then overridden by CLI flags:
//!
//! ```json
//! {
//!   "negative_form": "to_not",
//!   "boolean_matcher": "truthy,falsy",
//!   "conversions": { "hook_scope": true, "pending": false }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::str::FromStr;

use respec_core::error::RespecError;
use thiserror::Error;

use crate::syntax::ConstructKind;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown conversion '{0}' (see --list-conversions)")]
    UnknownConversion(String),

    #[error("invalid value '{value}' for {option}; expected one of: {expected}")]
    InvalidValue {
        option: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl From<ConfigError> for RespecError {
    fn from(err: ConfigError) -> Self {
        RespecError::invalid_args(err.to_string())
    }
}

// ============================================================================
// Preferred Forms
// ============================================================================

/// How negative expectations are spelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegativeForm {
    #[default]
    NotTo,
    ToNot,
}

impl NegativeForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            NegativeForm::NotTo => "not_to",
            NegativeForm::ToNot => "to_not",
        }
    }
}

impl FromStr for NegativeForm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_to" => Ok(NegativeForm::NotTo),
            "to_not" => Ok(NegativeForm::ToNot),
            _ => Err(ConfigError::InvalidValue {
                option: "negative_form",
                value: s.to_string(),
                expected: "not_to, to_not",
            }),
        }
    }
}

/// Replacement for `be_true` / `be_false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BooleanMatcher {
    #[default]
    #[serde(rename = "truthy,falsey")]
    TruthyFalsey,
    #[serde(rename = "truthy,falsy")]
    TruthyFalsy,
    /// Exact `be true` / `be false`; stricter than the RSpec 2 matchers.
    #[serde(rename = "true,false")]
    TrueFalse,
}

impl BooleanMatcher {
    pub fn as_str(&self) -> &'static str {
        match self {
            BooleanMatcher::TruthyFalsey => "truthy,falsey",
            BooleanMatcher::TruthyFalsy => "truthy,falsy",
            BooleanMatcher::TrueFalse => "true,false",
        }
    }

    /// Matcher text for `be_true` (`true`) or `be_false` (`false`).
    pub fn replacement(&self, value: bool) -> &'static str {
        match (self, value) {
            (BooleanMatcher::TrueFalse, true) => "be true",
            (BooleanMatcher::TrueFalse, false) => "be false",
            (_, true) => "be_truthy",
            (BooleanMatcher::TruthyFalsy, false) => "be_falsy",
            (_, false) => "be_falsey",
        }
    }
}

impl FromStr for BooleanMatcher {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "truthy,falsey" => Ok(BooleanMatcher::TruthyFalsey),
            "truthy,falsy" => Ok(BooleanMatcher::TruthyFalsy),
            "true,false" => Ok(BooleanMatcher::TrueFalse),
            _ => Err(ConfigError::InvalidValue {
                option: "boolean_matcher",
                value: s.to_string(),
                expected: "truthy,falsey, truthy,falsy, true,false",
            }),
        }
    }
}

impl fmt::Display for BooleanMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Conversion Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    pub negative_form: NegativeForm,
    pub boolean_matcher: BooleanMatcher,
    /// Per-kind overrides of the default enablement, keyed by kind name.
    pub conversions: BTreeMap<String, bool>,
}

impl ConversionConfig {
    /// Load a config file and check the conversion names in it.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: ConversionConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unknown conversion names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in self.conversions.keys() {
            if ConstructKind::parse(name).is_none() {
                return Err(ConfigError::UnknownConversion(name.clone()));
            }
        }
        Ok(())
    }

    pub fn is_enabled(&self, kind: ConstructKind) -> bool {
        self.conversions
            .get(kind.name())
            .copied()
            .unwrap_or_else(|| kind.enabled_by_default())
    }

    pub fn set_enabled(&mut self, kind: ConstructKind, enabled: bool) {
        self.conversions.insert(kind.name().to_string(), enabled);
    }

    /// Apply a comma-separated list of kind names, as given to
    /// `--enable` / `--disable`.
    pub fn set_enabled_list(&mut self, list: &str, enabled: bool) -> Result<(), ConfigError> {
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let kind = ConstructKind::parse(name)
                .ok_or_else(|| ConfigError::UnknownConversion(name.to_string()))?;
            self.set_enabled(kind, enabled);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_kind_defaults() {
        let config = ConversionConfig::default();
        assert!(config.is_enabled(ConstructKind::Should));
        assert!(!config.is_enabled(ConstructKind::HookScope));
        assert!(!config.is_enabled(ConstructKind::ExampleGroup));
        assert_eq!(config.negative_form.as_str(), "not_to");
    }

    #[test]
    fn enable_and_disable_lists() {
        let mut config = ConversionConfig::default();
        config.set_enabled_list("hook_scope, example_group", true).unwrap();
        config.set_enabled_list("pending", false).unwrap();
        assert!(config.is_enabled(ConstructKind::HookScope));
        assert!(config.is_enabled(ConstructKind::ExampleGroup));
        assert!(!config.is_enabled(ConstructKind::Pending));

        let err = config.set_enabled_list("shoulda", true).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownConversion(ref n) if n == "shoulda"));
    }

    #[test]
    fn json_round_trip_of_forms() {
        let config: ConversionConfig = serde_json::from_str(
            r#"{"negative_form":"to_not","boolean_matcher":"true,false","conversions":{"should":false}}"#,
        )
        .unwrap();
        assert_eq!(config.negative_form, NegativeForm::ToNot);
        assert_eq!(config.boolean_matcher, BooleanMatcher::TrueFalse);
        assert!(!config.is_enabled(ConstructKind::Should));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result: Result<ConversionConfig, _> = serde_json::from_str(r#"{"colour": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn boolean_replacements() {
        assert_eq!(BooleanMatcher::TruthyFalsey.replacement(false), "be_falsey");
        assert_eq!(BooleanMatcher::TruthyFalsy.replacement(false), "be_falsy");
        assert_eq!(BooleanMatcher::TruthyFalsy.replacement(true), "be_truthy");
        assert_eq!(BooleanMatcher::TrueFalse.replacement(true), "be true");
        assert_eq!("truthy,falsy".parse::<BooleanMatcher>().unwrap(), BooleanMatcher::TruthyFalsy);
        assert!("yes,no".parse::<BooleanMatcher>().is_err());
    }

    #[test]
    fn config_errors_are_invalid_arguments() {
        let err = RespecError::from(ConfigError::UnknownConversion("x".into()));
        assert_eq!(err.error_code().code(), 2);
    }
}
