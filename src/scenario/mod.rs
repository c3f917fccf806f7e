// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Scenario runner
//!
//! A [`Scenario`] binds a [`ScenarioKind`] to an [`Inventory`], lets the
//! caller exclude checks, executes the comparison and finally summarizes
//! the outcome into an [`Analysis`].
//!
//! ```text
//! Created --exclude_checks--> Configured --execute--> Executed --analyze--> Analyzed
//! ```
//!
//! Configuration problems are returned as [`ConfigError`] before any rule
//! is compared. Address resolution problems never abort a run; they come
//! back as [`ResolutionWarning`]s next to the findings.

mod shadowing;

use core::fmt;
use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

pub use shadowing::{FieldCoverage, Finding, Predecessor, Severity};

use crate::check::Check;
use crate::config::{AnalysisConfig, ConfigError};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::model::{AddressGroup, AddressObject, SecurityRule};
use crate::resolver::{AddressField, AddressResolver, ResolveError, ResolvedRule};

use shadowing::{find_shadowed, ComparisonInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    /// Compare address fields by token name.
    Shadowing,
    /// Compare address fields by their resolved values.
    ShadowingByValue,
}

const SHADOWING_CHECKS: [Check; 6] = [
    Check::SourceZones,
    Check::DestinationZones,
    Check::SourceAddresses,
    Check::DestinationAddresses,
    Check::Applications,
    Check::Services,
];

const SHADOWING_BY_VALUE_CHECKS: [Check; 6] = [
    Check::SourceZones,
    Check::DestinationZones,
    Check::SourceAddressValues,
    Check::DestinationAddressValues,
    Check::Applications,
    Check::Services,
];

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 2] = [ScenarioKind::Shadowing, ScenarioKind::ShadowingByValue];

    pub fn name(self) -> &'static str {
        match self {
            ScenarioKind::Shadowing => "shadowing",
            ScenarioKind::ShadowingByValue => "shadowing-by-value",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ScenarioKind::Shadowing => {
                "Finds rules that an earlier rule hides, comparing addresses by object and group name."
            }
            ScenarioKind::ShadowingByValue => {
                "Finds rules that an earlier rule hides, comparing addresses by their resolved IP ranges and FQDNs."
            }
        }
    }

    /// The checks this scenario runs, in evaluation order.
    pub fn checks(self) -> &'static [Check] {
        match self {
            ScenarioKind::Shadowing => &SHADOWING_CHECKS,
            ScenarioKind::ShadowingByValue => &SHADOWING_BY_VALUE_CHECKS,
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioState {
    Created,
    Configured,
    Executed,
    Analyzed,
}

/// Everything a scenario may read. Address inventories are optional since
/// only value-level checks need them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Inventory {
    pub rules: Vec<SecurityRule>,
    #[serde(default)]
    pub address_objects: Option<Vec<AddressObject>>,
    #[serde(default)]
    pub address_groups: Option<Vec<AddressGroup>>,
}

impl Inventory {
    pub fn new(rules: Vec<SecurityRule>) -> Self {
        Self {
            rules,
            address_objects: None,
            address_groups: None,
        }
    }

    pub fn with_address_objects(mut self, objects: Vec<AddressObject>) -> Self {
        self.address_objects = Some(objects);
        self
    }

    pub fn with_address_groups(mut self, groups: Vec<AddressGroup>) -> Self {
        self.address_groups = Some(groups);
        self
    }
}

/// A rule field whose addresses could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionWarning {
    pub rule: String,
    pub position: usize,
    pub field: AddressField,
    #[serde(flatten)]
    pub kind: ResolveError,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rule `{}` (#{}) {}: {}",
            self.rule, self.position, self.field, self.kind
        )
    }
}

/// Raw result of [`Scenario::execute`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioOutput {
    pub scenario: ScenarioKind,
    pub checks: Vec<Check>,
    pub rules: usize,
    pub findings: Vec<Finding>,
    pub warnings: Vec<ResolutionWarning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub rules: usize,
    pub shadowed: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub warnings: usize,
    /// Rules with at least one unresolved address field.
    pub unresolved_rules: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub scenario: ScenarioKind,
    pub checks: Vec<Check>,
    pub summary: Summary,
    pub findings: Vec<Finding>,
    pub warnings: Vec<ResolutionWarning>,
}

pub struct Scenario {
    kind: ScenarioKind,
    inventory: Inventory,
    config: AnalysisConfig,
    excluded: BTreeSet<Check>,
    state: ScenarioState,
}

impl Scenario {
    pub fn new(kind: ScenarioKind, inventory: Inventory) -> Self {
        Self {
            kind,
            inventory,
            config: AnalysisConfig::default(),
            excluded: BTreeSet::new(),
            state: ScenarioState::Created,
        }
    }

    /// Every scenario this crate can run.
    pub fn available() -> &'static [ScenarioKind] {
        &ScenarioKind::ALL
    }

    /// Apply settings, including the checks the config excludes.
    pub fn with_config(mut self, config: AnalysisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let excluded = config.exclude_checks.clone();
        self.config = config;
        self.exclude_checks(excluded)?;
        Ok(self)
    }

    pub fn kind(&self) -> ScenarioKind {
        self.kind
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Enabled checks in evaluation order.
    pub fn checks(&self) -> Vec<Check> {
        self.kind
            .checks()
            .iter()
            .copied()
            .filter(|c| !self.excluded.contains(c))
            .collect()
    }

    /// Skip the named checks. Names must belong to this scenario.
    ///
    /// Nothing is excluded when any name is rejected.
    pub fn exclude_checks<I, S>(&mut self, names: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut excluded = self.excluded.clone();
        for name in names {
            let name = name.as_ref();
            match Check::from_name(name) {
                Some(check) if self.kind.checks().contains(&check) => {
                    excluded.insert(check);
                }
                _ => {
                    return Err(ConfigError::UnknownCheck {
                        name: name.to_string(),
                        scenario: self.kind,
                    })
                }
            }
        }
        if self.kind.checks().iter().all(|c| excluded.contains(c)) {
            return Err(ConfigError::NoChecks {
                scenario: self.kind,
            });
        }
        self.excluded = excluded;
        self.state = ScenarioState::Configured;
        Ok(())
    }

    fn validate(&self, checks: &[Check]) -> Result<(), ConfigError> {
        if checks.is_empty() {
            return Err(ConfigError::NoChecks {
                scenario: self.kind,
            });
        }
        if checks.iter().any(|c| c.needs_resolution()) {
            if self.inventory.address_objects.is_none() {
                return Err(ConfigError::MissingInventory {
                    scenario: self.kind,
                    inventory: "address objects",
                });
            }
            if self.inventory.address_groups.is_none() {
                return Err(ConfigError::MissingInventory {
                    scenario: self.kind,
                    inventory: "address groups",
                });
            }
        }
        let mut seen = HashSet::new();
        for rule in &self.inventory.rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(ConfigError::DuplicateRuleName {
                    name: rule.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Resolve every rule's address fields up front. The comparison loop
    /// only starts once this index is complete.
    fn resolve_rules(&self) -> (Vec<ResolvedRule>, Vec<ResolutionWarning>, usize) {
        let objects = self.inventory.address_objects.as_deref().unwrap_or_default();
        let groups = self.inventory.address_groups.as_deref().unwrap_or_default();
        let mut resolver =
            AddressResolver::new(objects, groups).with_wildcard(self.config.wildcard.as_str());

        let mut resolved = Vec::with_capacity(self.inventory.rules.len());
        let mut warnings = Vec::new();
        for (index, rule) in self.inventory.rules.iter().enumerate() {
            let (fields, errors) = resolver.resolve_rule(rule);
            resolved.push(fields);
            warnings.extend(errors.into_iter().map(|(field, kind)| ResolutionWarning {
                rule: rule.name.clone(),
                position: index + 1,
                field,
                kind,
            }));
        }

        warnings.sort_by(|a, b| {
            (a.position, a.field, &a.kind).cmp(&(b.position, b.field, &b.kind))
        });
        warnings.dedup();
        (resolved, warnings, resolver.cached_groups())
    }

    /// Run the comparison.
    ///
    /// Executing again over the same inventory yields the same output.
    pub fn execute(
        &mut self,
        sink: &mut dyn DiagnosticSink,
    ) -> Result<ScenarioOutput, ConfigError> {
        self.config.validate()?;
        let checks = self.checks();
        self.validate(&checks)?;

        let rules = &self.inventory.rules;
        sink.emit(&DiagnosticEvent::ScenarioStarted {
            scenario: self.kind,
            rules: rules.len(),
            checks: checks.clone(),
        });
        if !self.excluded.is_empty() {
            sink.emit(&DiagnosticEvent::ChecksExcluded {
                checks: self.excluded.iter().copied().collect(),
            });
        }

        let (resolved, warnings) = if checks.iter().any(|c| c.needs_resolution()) {
            let (resolved, warnings, groups) = self.resolve_rules();
            let unresolved_fields = resolved
                .iter()
                .map(|r| usize::from(r.source.is_none()) + usize::from(r.destination.is_none()))
                .sum();
            sink.emit(&DiagnosticEvent::ResolverReady {
                groups,
                unresolved_fields,
            });
            for warning in &warnings {
                sink.emit(&DiagnosticEvent::Warning(warning.clone()));
            }
            (Some(resolved), warnings)
        } else {
            (None, Vec::new())
        };

        let input = ComparisonInput {
            rules,
            resolved: resolved.as_deref(),
            checks: &checks,
            wildcard: &self.config.wildcard,
            all_predecessors: self.config.all_predecessors,
        };
        let findings = find_shadowed(&input, sink);

        sink.emit(&DiagnosticEvent::ScenarioFinished {
            findings: findings.len(),
            warnings: warnings.len(),
        });
        self.state = ScenarioState::Executed;

        Ok(ScenarioOutput {
            scenario: self.kind,
            checks,
            rules: rules.len(),
            findings,
            warnings,
        })
    }

    /// Summarize an execution's output.
    pub fn analyze(&mut self, output: ScenarioOutput) -> Analysis {
        let count = |severity: Severity| {
            output
                .findings
                .iter()
                .filter(|f| f.severity == severity)
                .count()
        };
        let unresolved_rules = output
            .warnings
            .iter()
            .map(|w| w.position)
            .collect::<BTreeSet<_>>()
            .len();
        let summary = Summary {
            rules: output.rules,
            shadowed: output.findings.len(),
            high: count(Severity::High),
            medium: count(Severity::Medium),
            low: count(Severity::Low),
            warnings: output.warnings.len(),
            unresolved_rules,
        };
        self.state = ScenarioState::Analyzed;
        Analysis {
            scenario: output.scenario,
            checks: output.checks,
            summary,
            findings: output.findings,
            warnings: output.warnings,
        }
    }

    /// Execute and analyze in one step.
    pub fn run(&mut self, sink: &mut dyn DiagnosticSink) -> Result<Analysis, ConfigError> {
        let output = self.execute(sink)?;
        Ok(self.analyze(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NullSink;
    use crate::model::Action;

    fn value_inventory() -> Inventory {
        Inventory::new(vec![
            SecurityRule::new("g1", Action::Allow).with_source_addresses(["G1"]),
            SecurityRule::new("g2", Action::Deny).with_source_addresses(["G2"]),
        ])
        .with_address_objects(vec![
            AddressObject::netmask("net", "10.0.0.0/24"),
            AddressObject::netmask("host", "10.0.0.5"),
        ])
        .with_address_groups(vec![
            AddressGroup::new("G1", ["net"]),
            AddressGroup::new("G2", ["host"]),
        ])
    }

    #[test]
    fn name_and_value_scenarios_disagree_on_groups() {
        let mut by_name = Scenario::new(ScenarioKind::Shadowing, value_inventory());
        let analysis = by_name.run(&mut NullSink).expect("runs");
        assert!(analysis.findings.is_empty());

        let mut by_value = Scenario::new(ScenarioKind::ShadowingByValue, value_inventory());
        let analysis = by_value.run(&mut NullSink).expect("runs");
        assert_eq!(analysis.findings.len(), 1);
        assert_eq!(analysis.findings[0].rule, "g2");
        assert_eq!(analysis.findings[0].severity, Severity::High);
        assert_eq!(analysis.summary.high, 1);
        assert_eq!(by_value.state(), ScenarioState::Analyzed);
    }

    #[test]
    fn exclusions_are_validated() {
        let mut scenario = Scenario::new(ScenarioKind::Shadowing, Inventory::default());
        assert_eq!(scenario.state(), ScenarioState::Created);

        assert!(matches!(
            scenario.exclude_checks(["source-address-values"]),
            Err(ConfigError::UnknownCheck { .. })
        ));
        assert!(matches!(
            scenario.exclude_checks(["bogus"]),
            Err(ConfigError::UnknownCheck { .. })
        ));

        scenario
            .exclude_checks(["services", "applications"])
            .expect("known checks");
        assert_eq!(scenario.state(), ScenarioState::Configured);
        assert_eq!(scenario.checks().len(), 4);

        let all: Vec<&str> = ScenarioKind::Shadowing.checks().iter().map(|c| c.name()).collect();
        assert_eq!(
            scenario.exclude_checks(all),
            Err(ConfigError::NoChecks {
                scenario: ScenarioKind::Shadowing
            })
        );
        // A rejected exclusion leaves the previous selection in place.
        assert_eq!(scenario.checks().len(), 4);
    }

    #[test]
    fn value_scenario_needs_address_inventories() {
        let inventory = Inventory::new(vec![SecurityRule::new("r", Action::Allow)]);
        let mut scenario = Scenario::new(ScenarioKind::ShadowingByValue, inventory.clone());
        assert!(matches!(
            scenario.execute(&mut NullSink),
            Err(ConfigError::MissingInventory { .. })
        ));

        let mut scenario = Scenario::new(
            ScenarioKind::ShadowingByValue,
            inventory.with_address_objects(vec![]).with_address_groups(vec![]),
        );
        assert!(scenario.execute(&mut NullSink).is_ok());
    }

    #[test]
    fn duplicate_rule_names_are_rejected() {
        let inventory = Inventory::new(vec![
            SecurityRule::new("same", Action::Allow),
            SecurityRule::new("same", Action::Deny),
        ]);
        let mut scenario = Scenario::new(ScenarioKind::Shadowing, inventory);
        assert_eq!(
            scenario.execute(&mut NullSink),
            Err(ConfigError::DuplicateRuleName {
                name: "same".to_string()
            })
        );
    }

    #[test]
    fn cyclic_groups_warn_and_never_cover() {
        let inventory = Inventory::new(vec![
            SecurityRule::new("loop", Action::Allow).with_source_addresses(["A"]),
            SecurityRule::new("host", Action::Deny).with_source_addresses(["10.0.0.1"]),
            SecurityRule::new("loop-again", Action::Deny).with_source_addresses(["A"]),
        ])
        .with_address_objects(vec![])
        .with_address_groups(vec![AddressGroup::new("A", ["B"]), AddressGroup::new("B", ["A"])]);

        let mut events: Vec<DiagnosticEvent> = Vec::new();
        let mut scenario = Scenario::new(ScenarioKind::ShadowingByValue, inventory);
        let analysis = scenario.run(&mut events).expect("runs");

        assert!(analysis.findings.is_empty());
        assert_eq!(analysis.warnings.len(), 2);
        assert_eq!(analysis.warnings[0].rule, "loop");
        assert_eq!(analysis.warnings[0].field, AddressField::Source);
        assert!(matches!(
            analysis.warnings[0].kind,
            ResolveError::CyclicGroupReference { .. }
        ));
        assert_eq!(analysis.summary.unresolved_rules, 2);
        assert_eq!(events.iter().filter(|e| e.is_warning()).count(), 2);
    }

    #[test]
    fn execution_is_repeatable() {
        let mut scenario = Scenario::new(ScenarioKind::ShadowingByValue, value_inventory());
        let first = scenario.execute(&mut NullSink).expect("runs");
        let second = scenario.execute(&mut NullSink).expect("runs");
        assert_eq!(first, second);
    }

    #[test]
    fn config_applies_wildcard_and_exclusions() {
        let inventory = Inventory::new(vec![
            SecurityRule::new("star", Action::Allow).with_applications(["*"]),
            SecurityRule::new("web", Action::Allow).with_applications(["web-browsing"]),
        ]);
        let config = AnalysisConfig::new()
            .with_wildcard("*")
            .with_excluded_checks(["services"]);
        let mut scenario = Scenario::new(ScenarioKind::Shadowing, inventory)
            .with_config(config)
            .expect("valid config");
        assert!(!scenario.checks().contains(&Check::Services));

        let analysis = scenario.run(&mut NullSink).expect("runs");
        assert_eq!(analysis.findings.len(), 1);
        assert_eq!(analysis.findings[0].rule, "web");
    }

    #[test]
    fn omitted_fields_match_anything_under_custom_wildcard() {
        let inventory = Inventory::new(vec![
            SecurityRule::new("allow-all", Action::Allow),
            SecurityRule::new("deny-host", Action::Deny).with_source_addresses(["10.0.0.5"]),
        ])
        .with_address_objects(vec![])
        .with_address_groups(vec![]);

        for kind in ScenarioKind::ALL {
            let mut scenario = Scenario::new(kind, inventory.clone())
                .with_config(AnalysisConfig::new().with_wildcard("*"))
                .expect("valid config");
            let analysis = scenario.run(&mut NullSink).expect("runs");
            assert!(analysis.warnings.is_empty(), "{}", kind);
            assert_eq!(analysis.findings.len(), 1, "{}", kind);
            assert_eq!(analysis.findings[0].rule, "deny-host");
            assert_eq!(analysis.findings[0].severity, Severity::High);
        }
    }
}
