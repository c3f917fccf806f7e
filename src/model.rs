// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Firewall entity model
//!
//! Immutable value types for the three inventories the analysis consumes:
//! security rules (ordered), address objects and address groups.
//!
//! Every type deserializes both from the Panorama export shape
//! (`"@name"`, `{"member": [...]}` wrappers, kebab-case keys) and from a
//! flat shape where each field is a plain list, so fixtures can be written
//! by hand without the envelope noise.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Reserved token meaning "match anything" in every rule field.
pub const ANY: &str = "any";

// ============================================================================
// Token sets
// ============================================================================

/// Raw shapes a member list can take on the wire.
#[derive(Deserialize)]
#[serde(untagged)]
enum MemberList {
    Wrapped { member: Vec<String> },
    List(Vec<String>),
    Single(String),
}

impl From<MemberList> for TokenSet {
    fn from(list: MemberList) -> Self {
        match list {
            MemberList::Wrapped { member } | MemberList::List(member) => {
                member.into_iter().collect()
            }
            MemberList::Single(token) => core::iter::once(token).collect(),
        }
    }
}

/// An ordered set of opaque reference tokens.
///
/// Keeps the first occurrence of every token in declaration order, so two
/// runs over the same input always iterate identically.
///
/// A set built by [`TokenSet::any`] stands for a field that was left out.
/// It shows as `any` but matches anything whatever wildcard token the
/// analysis is configured with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MemberList", into = "Vec<String>")]
pub struct TokenSet {
    tokens: Vec<String>,
    omitted: bool,
}

impl TokenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The set of an omitted field: matches anything.
    pub fn any() -> Self {
        Self {
            tokens: vec![ANY.to_string()],
            omitted: true,
        }
    }

    /// True for the set of a field that was left out.
    pub fn is_omitted(&self) -> bool {
        self.omitted
    }

    /// True when the set matches anything under the given wildcard token.
    pub fn matches_anything(&self, wildcard: &str) -> bool {
        self.omitted || self.contains(wildcard)
    }

    /// Adds a token. The first explicit token replaces the placeholder of
    /// an omitted set.
    pub fn insert(&mut self, token: impl Into<String>) -> bool {
        if self.omitted {
            self.omitted = false;
            self.tokens.clear();
        }
        let token = token.into();
        if self.contains(&token) {
            return false;
        }
        self.tokens.push(token);
        true
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.iter().any(|t| t == token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True when every token of `self` also appears in `other`.
    pub fn is_subset(&self, other: &TokenSet) -> bool {
        self.iter().all(|t| other.contains(t))
    }
}

impl<S: Into<String>> FromIterator<S> for TokenSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TokenSet::new();
        for token in iter {
            set.insert(token);
        }
        set
    }
}

impl From<TokenSet> for Vec<String> {
    fn from(set: TokenSet) -> Self {
        set.tokens
    }
}

impl fmt::Display for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(", "))
    }
}

// ============================================================================
// Security rules
// ============================================================================

/// What a rule does with the traffic it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Allow,
    Deny,
    Drop,
    ResetClient,
    ResetServer,
    ResetBoth,
}

impl Action {
    /// Whether matched traffic is let through.
    pub fn is_permissive(self) -> bool {
        matches!(self, Action::Allow)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
            Action::Drop => "drop",
            Action::ResetClient => "reset-client",
            Action::ResetServer => "reset-server",
            Action::ResetBoth => "reset-both",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The match attributes of a security rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleField {
    SourceZones,
    DestinationZones,
    SourceAddresses,
    DestinationAddresses,
    Applications,
    Services,
}

impl RuleField {
    pub const ALL: [RuleField; 6] = [
        RuleField::SourceZones,
        RuleField::DestinationZones,
        RuleField::SourceAddresses,
        RuleField::DestinationAddresses,
        RuleField::Applications,
        RuleField::Services,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RuleField::SourceZones => "source_zones",
            RuleField::DestinationZones => "destination_zones",
            RuleField::SourceAddresses => "source_addresses",
            RuleField::DestinationAddresses => "destination_addresses",
            RuleField::Applications => "applications",
            RuleField::Services => "services",
        }
    }
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an ordered rule-base.
///
/// The position of a rule inside its rule-base is not stored here; it is the
/// index in the `Vec` the rule lives in and must be preserved by every
/// consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRule {
    #[serde(alias = "@name")]
    pub name: String,
    #[serde(default = "TokenSet::any", alias = "from")]
    pub source_zones: TokenSet,
    #[serde(default = "TokenSet::any", alias = "to")]
    pub destination_zones: TokenSet,
    #[serde(default = "TokenSet::any", alias = "source")]
    pub source_addresses: TokenSet,
    #[serde(default = "TokenSet::any", alias = "destination")]
    pub destination_addresses: TokenSet,
    #[serde(default = "TokenSet::any", alias = "application")]
    pub applications: TokenSet,
    #[serde(default = "TokenSet::any", alias = "service")]
    pub services: TokenSet,
    pub action: Action,
}

impl SecurityRule {
    /// A rule matching everything with the given action. Narrow it with the
    /// builder methods below.
    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            name: name.into(),
            source_zones: TokenSet::any(),
            destination_zones: TokenSet::any(),
            source_addresses: TokenSet::any(),
            destination_addresses: TokenSet::any(),
            applications: TokenSet::any(),
            services: TokenSet::any(),
            action,
        }
    }

    pub fn field(&self, field: RuleField) -> &TokenSet {
        match field {
            RuleField::SourceZones => &self.source_zones,
            RuleField::DestinationZones => &self.destination_zones,
            RuleField::SourceAddresses => &self.source_addresses,
            RuleField::DestinationAddresses => &self.destination_addresses,
            RuleField::Applications => &self.applications,
            RuleField::Services => &self.services,
        }
    }

    pub fn with_source_zones<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        zones: I,
    ) -> Self {
        self.source_zones = zones.into_iter().collect();
        self
    }

    pub fn with_destination_zones<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        zones: I,
    ) -> Self {
        self.destination_zones = zones.into_iter().collect();
        self
    }

    pub fn with_source_addresses<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        addresses: I,
    ) -> Self {
        self.source_addresses = addresses.into_iter().collect();
        self
    }

    pub fn with_destination_addresses<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        addresses: I,
    ) -> Self {
        self.destination_addresses = addresses.into_iter().collect();
        self
    }

    pub fn with_applications<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        apps: I,
    ) -> Self {
        self.applications = apps.into_iter().collect();
        self
    }

    pub fn with_services<I: IntoIterator<Item = S>, S: Into<String>>(
        mut self,
        services: I,
    ) -> Self {
        self.services = services.into_iter().collect();
        self
    }
}

// ============================================================================
// Address objects and groups
// ============================================================================

/// The single concrete representation carried by an address object.
///
/// Values are kept as raw strings; they are parsed when a rule that uses the
/// object is resolved, so a malformed value only degrades that rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressKind {
    IpNetmask(String),
    IpRange(String),
    Fqdn(String),
    IpWildcard(String),
}

impl AddressKind {
    pub fn raw(&self) -> &str {
        match self {
            AddressKind::IpNetmask(v)
            | AddressKind::IpRange(v)
            | AddressKind::Fqdn(v)
            | AddressKind::IpWildcard(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressObject {
    #[serde(alias = "@name")]
    pub name: String,
    #[serde(flatten)]
    pub value: AddressKind,
}

impl AddressObject {
    pub fn new(name: impl Into<String>, value: AddressKind) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn netmask(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, AddressKind::IpNetmask(value.into()))
    }
}

/// Filter expression of a dynamic address group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFilter {
    pub filter: String,
}

/// A named set of references to objects or other groups.
///
/// Membership may be cyclic; that is only detected when a rule using the
/// group is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressGroup {
    #[serde(alias = "@name")]
    pub name: String,
    #[serde(default, alias = "static")]
    pub members: TokenSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicFilter>,
}

impl AddressGroup {
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(
        name: impl Into<String>,
        members: I,
    ) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().collect(),
            dynamic: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_set_keeps_first_occurrence_order() {
        let set: TokenSet = ["b", "a", "b", "c", "a"].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn explicit_token_replaces_omitted_placeholder() {
        let mut set = TokenSet::any();
        assert!(set.matches_anything("*"));
        assert!(set.insert("trust"));
        assert!(!set.is_omitted());
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["trust"]);
        assert!(!set.matches_anything("*"));
    }

    #[test]
    fn security_rule_from_panorama_entry() {
        let json = r#"{
            "@name": "web-in",
            "@location": "device-group",
            "from": {"member": ["untrust"]},
            "to": {"member": ["dmz"]},
            "source": {"member": ["any"]},
            "destination": {"member": ["web-servers", "10.1.1.10"]},
            "application": {"member": ["web-browsing", "ssl"]},
            "service": {"member": ["application-default"]},
            "action": "allow"
        }"#;

        let rule: SecurityRule = serde_json::from_str(json).expect("failed to parse rule");
        assert_eq!(rule.name, "web-in");
        assert!(rule.source_zones.contains("untrust"));
        assert!(rule.source_addresses.contains(ANY));
        // Written out explicitly, `any` is only the default wildcard token.
        assert!(!rule.source_addresses.is_omitted());
        assert!(!rule.source_addresses.matches_anything("*"));
        assert_eq!(rule.destination_addresses.len(), 2);
        assert_eq!(rule.action, Action::Allow);
    }

    #[test]
    fn security_rule_from_flat_entry() {
        let json = r#"{
            "name": "block",
            "source_zones": ["trust"],
            "destination_zones": "untrust",
            "action": "reset-both"
        }"#;

        let rule: SecurityRule = serde_json::from_str(json).expect("failed to parse rule");
        assert!(rule.destination_zones.contains("untrust"));
        // Omitted fields match anything.
        assert_eq!(rule.applications, TokenSet::any());
        assert!(rule.applications.matches_anything("*"));
        assert!(!rule.destination_zones.is_omitted());
        assert_eq!(rule.action, Action::ResetBoth);
        assert!(!rule.action.is_permissive());
    }

    #[test]
    fn address_object_kinds() {
        let obj: AddressObject =
            serde_json::from_str(r#"{"@name": "h1", "ip-netmask": "10.0.0.5", "description": "x"}"#)
                .expect("failed to parse object");
        assert_eq!(obj.value, AddressKind::IpNetmask("10.0.0.5".to_string()));

        let obj: AddressObject =
            serde_json::from_str(r#"{"name": "site", "fqdn": "example.com"}"#)
                .expect("failed to parse object");
        assert_eq!(obj.value.raw(), "example.com");
    }

    #[test]
    fn address_group_static_and_dynamic() {
        let group: AddressGroup =
            serde_json::from_str(r#"{"@name": "g", "static": {"member": ["a", "b"]}}"#)
                .expect("failed to parse group");
        assert_eq!(group.members.len(), 2);
        assert!(group.dynamic.is_none());

        let group: AddressGroup =
            serde_json::from_str(r#"{"@name": "d", "dynamic": {"filter": "'web' and 'prod'"}}"#)
                .expect("failed to parse group");
        assert!(group.members.is_empty());
        assert!(group.dynamic.is_some());
    }
}
