// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Field containment predicates
//!
//! Each predicate answers "does the preceding rule's field match at least
//! everything the following rule's field matches" and reports how the
//! answer was reached, so findings can explain themselves.

use core::fmt;

use serde::Serialize;

use crate::address::{AddressValue, ResolvedValues};
use crate::model::TokenSet;

/// Outcome of one field comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Coverage {
    /// The preceding field is the wildcard.
    Wildcard,
    /// The following field lies within the preceding one.
    Contained,
    /// Some part of the following field escapes the preceding one.
    NotCovered,
    /// One side could not be resolved; treated as not covering.
    Unresolved,
}

impl Coverage {
    pub fn is_covered(self) -> bool {
        matches!(self, Coverage::Wildcard | Coverage::Contained)
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Coverage::Wildcard => "wildcard",
            Coverage::Contained => "contained",
            Coverage::NotCovered => "not covered",
            Coverage::Unresolved => "unresolved",
        })
    }
}

/// Syntactic comparison of two token sets.
///
/// Tokens are opaque: two differently named groups with identical contents
/// do not cover each other here.
pub fn tokens_cover(preceding: &TokenSet, following: &TokenSet, wildcard: &str) -> Coverage {
    if following.is_empty() {
        return Coverage::NotCovered;
    }
    if preceding.matches_anything(wildcard) {
        return Coverage::Wildcard;
    }
    if following.matches_anything(wildcard) {
        return Coverage::NotCovered;
    }
    if following.is_subset(preceding) {
        Coverage::Contained
    } else {
        Coverage::NotCovered
    }
}

/// Comparison of two resolved address fields. `None` marks a field whose
/// resolution failed.
pub fn resolved_cover(
    preceding: Option<&ResolvedValues>,
    following: Option<&ResolvedValues>,
) -> Coverage {
    let (preceding, following) = match (preceding, following) {
        (Some(p), Some(f)) => (p, f),
        _ => return Coverage::Unresolved,
    };
    if following.is_empty() {
        return Coverage::NotCovered;
    }
    if preceding.values().contains(&AddressValue::Any) {
        return Coverage::Wildcard;
    }
    if preceding.covers(following.values()) {
        Coverage::Contained
    } else {
        Coverage::NotCovered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ANY;

    fn tokens(items: &[&str]) -> TokenSet {
        items.iter().copied().collect()
    }

    #[test]
    fn wildcard_dominates_any_following_value() {
        let cases: [&[&str]; 3] = [&["trust"], &["any"], &["a", "b", "c"]];
        for following in cases {
            assert_eq!(
                tokens_cover(&tokens(&["any"]), &tokens(following), ANY),
                Coverage::Wildcard
            );
        }
    }

    #[test]
    fn subset_is_contained() {
        assert_eq!(
            tokens_cover(&tokens(&["a", "b"]), &tokens(&["b"]), ANY),
            Coverage::Contained
        );
        assert_eq!(
            tokens_cover(&tokens(&["a"]), &tokens(&["a", "b"]), ANY),
            Coverage::NotCovered
        );
    }

    #[test]
    fn following_wildcard_needs_preceding_wildcard() {
        assert_eq!(
            tokens_cover(&tokens(&["a"]), &tokens(&["any"]), ANY),
            Coverage::NotCovered
        );
    }

    #[test]
    fn empty_following_is_never_covered() {
        assert_eq!(
            tokens_cover(&tokens(&["any"]), &TokenSet::new(), ANY),
            Coverage::NotCovered
        );
    }

    #[test]
    fn custom_wildcard_token() {
        assert_eq!(
            tokens_cover(&tokens(&["*"]), &tokens(&["x"]), "*"),
            Coverage::Wildcard
        );
        assert_eq!(
            tokens_cover(&tokens(&["any"]), &tokens(&["x"]), "*"),
            Coverage::NotCovered
        );
    }

    #[test]
    fn omitted_field_is_wildcard_under_any_token() {
        assert_eq!(
            tokens_cover(&TokenSet::any(), &tokens(&["x"]), "*"),
            Coverage::Wildcard
        );
        assert_eq!(
            tokens_cover(&tokens(&["any"]), &TokenSet::any(), "*"),
            Coverage::NotCovered
        );
        assert_eq!(
            tokens_cover(&tokens(&["*"]), &TokenSet::any(), "*"),
            Coverage::Wildcard
        );
    }

    #[test]
    fn unresolved_sides_never_cover() {
        let any = ResolvedValues::new(core::iter::once(AddressValue::Any).collect());
        assert_eq!(resolved_cover(None, Some(&any)), Coverage::Unresolved);
        assert_eq!(resolved_cover(Some(&any), None), Coverage::Unresolved);
        assert_eq!(resolved_cover(Some(&any), Some(&any)), Coverage::Wildcard);
        assert_eq!(
            resolved_cover(Some(&any), Some(&ResolvedValues::default())),
            Coverage::NotCovered
        );
    }
}
