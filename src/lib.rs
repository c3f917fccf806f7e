// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shadowing analysis for ordered firewall rule-bases
//!
//! A rule is *shadowed* when an earlier rule of the same rule-base already
//! matches every packet it could match, so the later rule never fires.
//! This crate finds such rules in Panorama-style security policies:
//!
//! - **shadowing** compares rule fields token by token;
//! - **shadowing-by-value** first expands address objects and (nested,
//!   possibly cyclic) address groups into concrete IP ranges and FQDNs and
//!   compares those.
//!
//! # Usage
//!
//! ```rust
//! use policy_inspector::*;
//!
//! let rules = vec![
//!     SecurityRule::new("allow-all", Action::Allow),
//!     SecurityRule::new("block-host", Action::Deny).with_source_addresses(["10.0.0.5"]),
//! ];
//! let mut scenario = Scenario::new(ScenarioKind::Shadowing, Inventory::new(rules));
//! let analysis = scenario.run(&mut NullSink)?;
//! assert_eq!(analysis.findings[0].severity, Severity::High);
//! ```

pub mod address;
pub mod check;
pub mod config;
pub mod containment;
pub mod diagnostics;
pub mod loader;
pub mod model;
pub mod report;
pub mod resolver;
pub mod scenario;
pub mod tracing_utils;

pub use address::{AddressValue, ResolvedValues, ValueSet};
pub use check::Check;
pub use config::{AnalysisConfig, ConfigError};
pub use containment::Coverage;
#[cfg(feature = "tracing")]
pub use diagnostics::TracingSink;
pub use diagnostics::{DiagnosticEvent, DiagnosticSink, NullSink};
pub use model::{Action, AddressGroup, AddressKind, AddressObject, SecurityRule, TokenSet};
pub use report::ReportFormat;
pub use resolver::{AddressField, AddressResolver, ResolveError};
pub use scenario::{
    Analysis, Finding, Inventory, Predecessor, ResolutionWarning, Scenario, ScenarioKind,
    ScenarioOutput, ScenarioState, Severity, Summary,
};
