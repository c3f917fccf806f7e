// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Address-group resolver
//!
//! Expands address tokens into closed sets of [`AddressValue`]s. Groups are
//! walked depth-first with an explicit stack of the group names currently
//! being expanded: meeting a name that is already on the stack is a cycle,
//! reported as [`ResolveError::CyclicGroupReference`] instead of recursing
//! forever. Every group is expanded at most once per resolver; the outcome,
//! successful or not, is memoized.
//!
//! Resolution never aborts the caller. Failures come back as values so that
//! the analysis can treat the affected field as "cannot confirm" and keep
//! going with the remaining rules.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::address::{AddressParseError, AddressValue, ResolvedValues, ValueSet};
use crate::model::{AddressGroup, AddressKind, AddressObject, SecurityRule, TokenSet, ANY};
use crate::tracing_utils::debug;

/// Why a token could not be expanded into concrete values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResolveError {
    /// The name is neither an object, a group, nor a literal address.
    UnresolvedReference { token: String },
    /// A group reaches itself. `chain` lists the groups from the first
    /// repeated one back to itself, e.g. `["A", "B", "A"]`.
    CyclicGroupReference { chain: Vec<String> },
    /// An address object whose value cannot be parsed.
    MalformedAddress {
        object: String,
        value: String,
        reason: String,
    },
    /// A dynamic group; its members depend on runtime tags.
    DynamicGroup { group: String, filter: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UnresolvedReference { token } => {
                write!(f, "unresolved reference `{}`", token)
            }
            ResolveError::CyclicGroupReference { chain } => {
                write!(f, "cyclic group reference {}", chain.join(" -> "))
            }
            ResolveError::MalformedAddress {
                object,
                value,
                reason,
            } => write!(
                f,
                "address object `{}` has malformed value `{}`: {}",
                object, value, reason
            ),
            ResolveError::DynamicGroup { group, filter } => {
                write!(
                    f,
                    "dynamic group `{}` (filter `{}`) cannot be expanded statically",
                    group, filter
                )
            }
        }
    }
}

impl std::error::Error for ResolveError {}

pub type Resolution = Result<Arc<ValueSet>, ResolveError>;

/// Which address field of a rule a resolution belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressField {
    Source,
    Destination,
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AddressField::Source => "source",
            AddressField::Destination => "destination",
        })
    }
}

/// Both address fields of one rule, expanded. `None` marks a field that
/// could not be fully resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRule {
    pub source: Option<ResolvedValues>,
    pub destination: Option<ResolvedValues>,
}

impl ResolvedRule {
    pub fn field(&self, field: AddressField) -> Option<&ResolvedValues> {
        match field {
            AddressField::Source => self.source.as_ref(),
            AddressField::Destination => self.destination.as_ref(),
        }
    }
}

/// Resolves tokens against one run's object and group inventories.
pub struct AddressResolver<'a> {
    objects: BTreeMap<&'a str, &'a AddressObject>,
    groups: BTreeMap<&'a str, &'a AddressGroup>,
    wildcard: String,
    cache: BTreeMap<String, Resolution>,
    // Groups currently being expanded, outermost first.
    visiting: Vec<String>,
}

impl<'a> AddressResolver<'a> {
    pub fn new(objects: &'a [AddressObject], groups: &'a [AddressGroup]) -> Self {
        Self {
            objects: objects.iter().map(|o| (o.name.as_str(), o)).collect(),
            groups: groups.iter().map(|g| (g.name.as_str(), g)).collect(),
            wildcard: ANY.to_string(),
            cache: BTreeMap::new(),
            visiting: Vec::new(),
        }
    }

    /// Use a different token as the "match anything" wildcard.
    pub fn with_wildcard(mut self, wildcard: impl Into<String>) -> Self {
        self.wildcard = wildcard.into();
        self
    }

    /// Number of groups expanded so far.
    pub fn cached_groups(&self) -> usize {
        self.cache.len()
    }

    /// Expand a single token.
    ///
    /// Lookup order is wildcard, object name, group name, then literal
    /// address. Names shadow literals so an object called `10.0.0.1` means
    /// whatever the object says.
    pub fn resolve(&mut self, token: &str) -> Resolution {
        if token == self.wildcard {
            return Ok(Arc::new(core::iter::once(AddressValue::Any).collect()));
        }
        if let Some(object) = self.objects.get(token).copied() {
            return resolve_object(object).map(|value| Arc::new(core::iter::once(value).collect()));
        }
        if self.groups.contains_key(token) {
            return self.resolve_group(token);
        }
        match AddressValue::parse_literal(token) {
            Some(value) => Ok(Arc::new(core::iter::once(value).collect())),
            None => Err(ResolveError::UnresolvedReference {
                token: token.to_string(),
            }),
        }
    }

    /// Expand every token of a rule field into one set.
    ///
    /// Returns all errors met along the way when any token fails, so a
    /// report can list every broken reference of the field at once.
    pub fn resolve_field(&mut self, tokens: &TokenSet) -> Result<ValueSet, Vec<ResolveError>> {
        if tokens.is_omitted() {
            return Ok(core::iter::once(AddressValue::Any).collect());
        }
        let mut values = ValueSet::new();
        let mut errors = Vec::new();
        for token in tokens.iter() {
            match self.resolve(token) {
                Ok(set) => values.extend(set.iter().cloned()),
                Err(e) => {
                    if !errors.contains(&e) {
                        errors.push(e);
                    }
                }
            }
        }
        if errors.is_empty() {
            Ok(values)
        } else {
            Err(errors)
        }
    }

    /// Expand both address fields of a rule, returning the errors of each
    /// failed field alongside.
    pub fn resolve_rule(
        &mut self,
        rule: &SecurityRule,
    ) -> (ResolvedRule, Vec<(AddressField, ResolveError)>) {
        let mut errors = Vec::new();
        let mut resolve = |field: AddressField, tokens: &TokenSet| {
            match self.resolve_field(tokens) {
                Ok(values) => Some(ResolvedValues::new(values)),
                Err(field_errors) => {
                    errors.extend(field_errors.into_iter().map(|e| (field, e)));
                    None
                }
            }
        };
        let source = resolve(AddressField::Source, &rule.source_addresses);
        let destination = resolve(AddressField::Destination, &rule.destination_addresses);
        (
            ResolvedRule {
                source,
                destination,
            },
            errors,
        )
    }

    fn resolve_group(&mut self, name: &str) -> Resolution {
        if let Some(cached) = self.cache.get(name) {
            return cached.clone();
        }

        if let Some(pos) = self.visiting.iter().position(|g| g == name) {
            let mut chain = self.visiting[pos..].to_vec();
            chain.push(name.to_string());
            debug!("cycle detected: {}", chain.join(" -> "));
            // Not memoized here; the groups on the chain memoize this error
            // as the expansion unwinds.
            return Err(ResolveError::CyclicGroupReference { chain });
        }

        let group = match self.groups.get(name).copied() {
            Some(group) => group,
            None => {
                return Err(ResolveError::UnresolvedReference {
                    token: name.to_string(),
                })
            }
        };

        self.visiting.push(name.to_string());
        let result = self.expand_members(group);
        self.visiting.pop();

        debug!(
            "resolved group `{}`: {}",
            name,
            match &result {
                Ok(values) => format!("{} values", values.len()),
                Err(e) => e.to_string(),
            }
        );
        self.cache.insert(name.to_string(), result.clone());
        result
    }

    fn expand_members(&mut self, group: &'a AddressGroup) -> Resolution {
        if let Some(dynamic) = &group.dynamic {
            if group.members.is_empty() {
                return Err(ResolveError::DynamicGroup {
                    group: group.name.clone(),
                    filter: dynamic.filter.clone(),
                });
            }
        }

        let mut values = ValueSet::new();
        for member in group.members.iter() {
            // A single unresolvable member leaves the group's true extent
            // unknown, so the whole group fails.
            let resolved = self.resolve(member)?;
            values.extend(resolved.iter().cloned());
        }
        Ok(Arc::new(values))
    }
}

fn resolve_object(object: &AddressObject) -> Result<AddressValue, ResolveError> {
    let parsed = match &object.value {
        AddressKind::IpNetmask(raw) => AddressValue::parse_netmask(raw),
        AddressKind::IpRange(raw) => AddressValue::parse_range(raw),
        AddressKind::Fqdn(raw) => AddressValue::parse_fqdn(raw),
        AddressKind::IpWildcard(_) => Err(AddressParseError::Unsupported("ip-wildcard")),
    };
    parsed.map_err(|e| ResolveError::MalformedAddress {
        object: object.name.clone(),
        value: object.value.raw().to_string(),
        reason: e.to_string(),
    })
}
