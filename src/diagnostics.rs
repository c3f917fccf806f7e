// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Progress and warning events raised while a scenario runs.
//!
//! The engine never logs on its own. Callers pass a [`DiagnosticSink`] to
//! [`crate::Scenario::execute`] and decide where events go: nowhere
//! ([`NullSink`]), into `tracing` ([`TracingSink`]), or into a `Vec` for
//! inspection.

use core::fmt;

use serde::Serialize;

use crate::check::Check;
use crate::scenario::{ResolutionWarning, ScenarioKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum DiagnosticEvent {
    ScenarioStarted {
        scenario: ScenarioKind,
        rules: usize,
        checks: Vec<Check>,
    },
    ChecksExcluded {
        checks: Vec<Check>,
    },
    /// Address resolution finished; comparison starts next.
    ResolverReady {
        groups: usize,
        unresolved_fields: usize,
    },
    Warning(ResolutionWarning),
    Shadowed {
        rule: String,
        position: usize,
        by: String,
    },
    ScenarioFinished {
        findings: usize,
        warnings: usize,
    },
}

impl DiagnosticEvent {
    pub fn is_warning(&self) -> bool {
        matches!(self, DiagnosticEvent::Warning(_))
    }
}

impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticEvent::ScenarioStarted {
                scenario,
                rules,
                checks,
            } => write!(
                f,
                "running {} over {} rules with {} checks",
                scenario,
                rules,
                checks.len()
            ),
            DiagnosticEvent::ChecksExcluded { checks } => {
                let names: Vec<&str> = checks.iter().map(|c| c.name()).collect();
                write!(f, "excluded checks: {}", names.join(", "))
            }
            DiagnosticEvent::ResolverReady {
                groups,
                unresolved_fields,
            } => write!(
                f,
                "resolved {} address groups, {} fields unresolved",
                groups, unresolved_fields
            ),
            DiagnosticEvent::Warning(warning) => write!(f, "{}", warning),
            DiagnosticEvent::Shadowed { rule, position, by } => {
                write!(f, "rule `{}` (#{}) is shadowed by `{}`", rule, position, by)
            }
            DiagnosticEvent::ScenarioFinished { findings, warnings } => {
                write!(f, "finished: {} findings, {} warnings", findings, warnings)
            }
        }
    }
}

pub trait DiagnosticSink {
    fn emit(&mut self, event: &DiagnosticEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&mut self, _event: &DiagnosticEvent) {}
}

impl DiagnosticSink for Vec<DiagnosticEvent> {
    fn emit(&mut self, event: &DiagnosticEvent) {
        self.push(event.clone());
    }
}

/// Forwards events to `tracing`. Warnings go out at `WARN`, per-rule
/// events at `DEBUG`, the rest at `INFO`.
#[cfg(feature = "tracing")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[cfg(feature = "tracing")]
impl DiagnosticSink for TracingSink {
    fn emit(&mut self, event: &DiagnosticEvent) {
        match event {
            DiagnosticEvent::Warning(_) => tracing::warn!("{}", event),
            DiagnosticEvent::Shadowed { .. } => tracing::debug!("{}", event),
            _ => tracing::info!("{}", event),
        }
    }
}
