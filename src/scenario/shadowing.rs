// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pairwise ordered comparison of a rule-base.
//!
//! Rule `i` is shadowed when some rule `j < i` covers it on every enabled
//! check. Both the name-level and the value-level scenario run this loop;
//! they differ only in which checks are enabled and whether resolved
//! addresses are supplied.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::check::{Check, RuleView};
use crate::containment::Coverage;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::model::{Action, SecurityRule};
use crate::resolver::ResolvedRule;

/// How surprising a shadowed rule is, judged from the actions involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    /// Both rules have the same effect; the later one is dead weight.
    Low,
    /// A block hides a later allow; traffic the author meant to let through
    /// is dropped.
    Medium,
    /// An allow hides a later block; traffic the author meant to stop goes
    /// through.
    High,
}

impl Severity {
    pub fn from_actions(preceding: Action, shadowed: Action) -> Self {
        match (preceding.is_permissive(), shadowed.is_permissive()) {
            (true, false) => Severity::High,
            (false, true) => Severity::Medium,
            _ => Severity::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldCoverage {
    pub check: Check,
    pub coverage: Coverage,
}

/// An earlier rule that covers the shadowed rule on every check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predecessor {
    pub rule: String,
    pub position: usize,
    pub action: Action,
    pub coverage: Vec<FieldCoverage>,
}

/// One shadowed rule together with the rules that hide it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub rule: String,
    /// 1-based position in the rule-base.
    pub position: usize,
    pub action: Action,
    pub severity: Severity,
    /// Covering rules in rule-base order; never empty.
    pub predecessors: Vec<Predecessor>,
}

impl Finding {
    /// The first covering rule, the one that actually matches the traffic.
    pub fn primary(&self) -> Option<&Predecessor> {
        self.predecessors.first()
    }
}

pub(crate) struct ComparisonInput<'r> {
    pub rules: &'r [SecurityRule],
    /// Parallel to `rules` when the scenario compares address values.
    pub resolved: Option<&'r [ResolvedRule]>,
    pub checks: &'r [Check],
    pub wildcard: &'r str,
    pub all_predecessors: bool,
}

impl<'r> ComparisonInput<'r> {
    fn view(&self, index: usize) -> RuleView<'r> {
        let rule = &self.rules[index];
        match self.resolved.and_then(|resolved| resolved.get(index)) {
            Some(resolved) => RuleView::with_resolved(rule, resolved),
            None => RuleView::new(rule),
        }
    }

    /// Per-check coverage of `following` by `preceding`, or `None` as soon
    /// as one check fails.
    fn covers(&self, preceding: usize, following: usize) -> Option<Vec<FieldCoverage>> {
        let (p, f) = (self.view(preceding), self.view(following));
        let mut coverage = Vec::with_capacity(self.checks.len());
        for &check in self.checks {
            let outcome = check.evaluate(p, f, self.wildcard);
            if !outcome.is_covered() {
                return None;
            }
            coverage.push(FieldCoverage {
                check,
                coverage: outcome,
            });
        }
        Some(coverage)
    }
}

pub(crate) fn find_shadowed(
    input: &ComparisonInput<'_>,
    sink: &mut dyn DiagnosticSink,
) -> Vec<Finding> {
    let rules = input.rules;
    let mut findings = Vec::new();

    for (i, rule) in rules.iter().enumerate() {
        let mut predecessors: Vec<Predecessor> = Vec::new();
        for (j, earlier) in rules[..i].iter().enumerate() {
            let Some(coverage) = input.covers(j, i) else {
                continue;
            };
            predecessors.push(Predecessor {
                rule: earlier.name.clone(),
                position: j + 1,
                action: earlier.action,
                coverage,
            });
            if !input.all_predecessors {
                break;
            }
        }

        let Some(primary) = predecessors.first() else {
            continue;
        };
        sink.emit(&DiagnosticEvent::Shadowed {
            rule: rule.name.clone(),
            position: i + 1,
            by: primary.rule.clone(),
        });
        findings.push(Finding {
            rule: rule.name.clone(),
            position: i + 1,
            action: rule.action,
            severity: Severity::from_actions(primary.action, rule.action),
            predecessors,
        });
    }

    findings
}
