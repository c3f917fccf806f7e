// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Analysis settings and configuration errors.

use core::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::check::Check;
use crate::model::ANY;
use crate::scenario::ScenarioKind;

/// Problems that stop a scenario before any rule is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    UnknownCheck { name: String, scenario: ScenarioKind },
    NoChecks { scenario: ScenarioKind },
    MissingInventory { scenario: ScenarioKind, inventory: &'static str },
    DuplicateRuleName { name: String },
    InvalidConfig { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownCheck { name, scenario } => {
                write!(f, "unknown check `{}` for scenario `{}`", name, scenario)
            }
            ConfigError::NoChecks { scenario } => {
                write!(f, "every check of scenario `{}` is excluded", scenario)
            }
            ConfigError::MissingInventory {
                scenario,
                inventory,
            } => write!(f, "scenario `{}` requires {}", scenario, inventory),
            ConfigError::DuplicateRuleName { name } => {
                write!(f, "rule name `{}` appears more than once", name)
            }
            ConfigError::InvalidConfig { field, reason } => {
                write!(f, "invalid configuration value for `{}`: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Knobs shared by every scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Token that matches anything in a rule field.
    pub wildcard: String,
    /// Names of checks to skip.
    pub exclude_checks: Vec<String>,
    /// Record every earlier rule that covers a shadowed rule, not only the
    /// first.
    pub all_predecessors: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            wildcard: ANY.to_string(),
            exclude_checks: Vec::new(),
            all_predecessors: true,
        }
    }
}

impl AnalysisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wildcard(mut self, wildcard: impl Into<String>) -> Self {
        self.wildcard = wildcard.into();
        self
    }

    pub fn with_excluded_checks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.exclude_checks.contains(&name) {
                self.exclude_checks.push(name);
            }
        }
        self
    }

    pub fn with_all_predecessors(mut self, all: bool) -> Self {
        self.all_predecessors = all;
        self
    }

    /// Reject values no scenario could run with.
    ///
    /// Check names are only validated against the global registry here;
    /// whether a check belongs to a scenario is decided by the scenario.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wildcard.trim().is_empty() {
            return Err(ConfigError::InvalidConfig {
                field: "wildcard",
                reason: "must not be empty".to_string(),
            });
        }
        if self.wildcard.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidConfig {
                field: "wildcard",
                reason: format!("`{}` contains whitespace", self.wildcard),
            });
        }
        if let Some(name) = self
            .exclude_checks
            .iter()
            .find(|name| Check::from_name(name).is_none())
        {
            return Err(ConfigError::InvalidConfig {
                field: "exclude-checks",
                reason: format!("`{}` is not a known check", name),
            });
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("failed to parse JSON config")?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            #[cfg(feature = "yaml")]
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            Some(ext) => bail!("unsupported config file extension `{}`", ext),
            None => bail!("config file {} has no extension", path.display()),
        };
        config.with_context(|| format!("invalid config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.wildcard, "any");
        assert!(config.all_predecessors);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_uses_kebab_case_and_fills_defaults() {
        let config =
            AnalysisConfig::from_json_str(r#"{"exclude-checks": ["services"]}"#).expect("valid");
        assert_eq!(config.exclude_checks, vec!["services".to_string()]);
        assert_eq!(config.wildcard, "any");

        assert!(AnalysisConfig::from_json_str(r#"{"excluded": []}"#).is_err());
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn yaml_config() {
        let config = AnalysisConfig::from_yaml_str("wildcard: '*'\nall-predecessors: false\n")
            .expect("valid");
        assert_eq!(config.wildcard, "*");
        assert!(!config.all_predecessors);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = AnalysisConfig::new().with_wildcard(" ").validate();
        assert!(matches!(
            err,
            Err(ConfigError::InvalidConfig {
                field: "wildcard",
                ..
            })
        ));

        let err = AnalysisConfig::new()
            .with_excluded_checks(["nonsense"])
            .validate();
        assert!(matches!(
            err,
            Err(ConfigError::InvalidConfig {
                field: "exclude-checks",
                ..
            })
        ));
    }

    #[test]
    fn excluded_checks_are_deduplicated() {
        let config = AnalysisConfig::new().with_excluded_checks(["services", "services"]);
        assert_eq!(config.exclude_checks.len(), 1);
    }
}
