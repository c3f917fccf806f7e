// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-field shadowing checks
//!
//! A scenario is an ordered list of [`Check`]s. An earlier rule shadows a
//! later one when every check of the scenario reports coverage.

use core::fmt;

use serde::Serialize;

use crate::containment::{resolved_cover, tokens_cover, Coverage};
use crate::model::{RuleField, SecurityRule};
use crate::resolver::{AddressField, ResolvedRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Check {
    SourceZones,
    DestinationZones,
    SourceAddresses,
    DestinationAddresses,
    SourceAddressValues,
    DestinationAddressValues,
    Applications,
    Services,
}

impl Check {
    pub const ALL: [Check; 8] = [
        Check::SourceZones,
        Check::DestinationZones,
        Check::SourceAddresses,
        Check::DestinationAddresses,
        Check::SourceAddressValues,
        Check::DestinationAddressValues,
        Check::Applications,
        Check::Services,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Check::SourceZones => "source-zones",
            Check::DestinationZones => "destination-zones",
            Check::SourceAddresses => "source-addresses",
            Check::DestinationAddresses => "destination-addresses",
            Check::SourceAddressValues => "source-address-values",
            Check::DestinationAddressValues => "destination-address-values",
            Check::Applications => "applications",
            Check::Services => "services",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            Check::SourceZones => "Preceding rule's source zones include the following rule's.",
            Check::DestinationZones => {
                "Preceding rule's destination zones include the following rule's."
            }
            Check::SourceAddresses => {
                "Preceding rule's source address tokens include the following rule's, compared by name."
            }
            Check::DestinationAddresses => {
                "Preceding rule's destination address tokens include the following rule's, compared by name."
            }
            Check::SourceAddressValues => {
                "Preceding rule's resolved source addresses contain the following rule's."
            }
            Check::DestinationAddressValues => {
                "Preceding rule's resolved destination addresses contain the following rule's."
            }
            Check::Applications => "Preceding rule's applications include the following rule's.",
            Check::Services => "Preceding rule's services include the following rule's.",
        }
    }

    /// The rule attribute this check inspects.
    pub fn field(self) -> RuleField {
        match self {
            Check::SourceZones => RuleField::SourceZones,
            Check::DestinationZones => RuleField::DestinationZones,
            Check::SourceAddresses | Check::SourceAddressValues => RuleField::SourceAddresses,
            Check::DestinationAddresses | Check::DestinationAddressValues => {
                RuleField::DestinationAddresses
            }
            Check::Applications => RuleField::Applications,
            Check::Services => RuleField::Services,
        }
    }

    /// The address field compared by value, for value-level checks.
    pub fn address_field(self) -> Option<AddressField> {
        match self {
            Check::SourceAddressValues => Some(AddressField::Source),
            Check::DestinationAddressValues => Some(AddressField::Destination),
            _ => None,
        }
    }

    pub fn needs_resolution(self) -> bool {
        self.address_field().is_some()
    }

    /// Compare one field of two rules.
    ///
    /// Value-level checks read the rules' resolved addresses; without them
    /// the field is unresolved.
    pub fn evaluate(
        self,
        preceding: RuleView<'_>,
        following: RuleView<'_>,
        wildcard: &str,
    ) -> Coverage {
        match self.address_field() {
            Some(field) => resolved_cover(
                preceding.resolved.and_then(|r| r.field(field)),
                following.resolved.and_then(|r| r.field(field)),
            ),
            None => tokens_cover(
                preceding.rule.field(self.field()),
                following.rule.field(self.field()),
                wildcard,
            ),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A rule together with its resolved addresses, if the scenario resolves.
#[derive(Debug, Clone, Copy)]
pub struct RuleView<'r> {
    pub rule: &'r SecurityRule,
    pub resolved: Option<&'r ResolvedRule>,
}

impl<'r> RuleView<'r> {
    pub fn new(rule: &'r SecurityRule) -> Self {
        Self {
            rule,
            resolved: None,
        }
    }

    pub fn with_resolved(rule: &'r SecurityRule, resolved: &'r ResolvedRule) -> Self {
        Self {
            rule,
            resolved: Some(resolved),
        }
    }
}
