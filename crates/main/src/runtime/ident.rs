////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::{
    borrow::Borrow,
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
};

use compact_str::CompactString;
use strsim::normalized_damerau_levenshtein;

/// The minimum similarity between two member names to suggest one as
/// a replacement for the other.
const SUGGESTION_THRESHOLD: f64 = 0.6;

/// The maximum number of suggestions attached to an error.
const SUGGESTION_LIMIT: usize = 3;

/// A name of a native member as requested by the scripting side.
///
/// Member names are short in practice, so the Ident stores the string inline
/// when possible.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Ident(CompactString);

impl Debug for Ident {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(&self.0, formatter)
    }
}

impl Display for Ident {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, formatter)
    }
}

impl AsRef<str> for Ident {
    #[inline(always)]
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl Borrow<str> for Ident {
    #[inline(always)]
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}

impl<'a> From<&'a str> for Ident {
    #[inline(always)]
    fn from(value: &'a str) -> Self {
        Self(CompactString::from(value))
    }
}

impl From<CompactString> for Ident {
    #[inline(always)]
    fn from(value: CompactString) -> Self {
        Self(value)
    }
}

impl Ident {
    /// Returns the string representation of this name.
    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the name without a single trailing underscore.
    ///
    /// Scripting languages reserve some words (e.g., `exec`, `print`, `in`)
    /// that may collide with native member names. The scripting side spells
    /// such names with a trailing underscore (`exec_`), and the bridge
    /// retries the lookup with the underscore removed.
    ///
    /// Returns None if the name does not end with exactly one underscore, or
    /// if the stripped name would be shorter than two characters.
    pub fn strip_keyword_suffix(&self) -> Option<&str> {
        let name = self.as_str();

        if name.len() <= 2 {
            return None;
        }

        let stripped = name.strip_suffix('_')?;

        if stripped.ends_with('_') {
            return None;
        }

        Some(stripped)
    }

    /// Picks up to a few names from `candidates` that look similar to this
    /// name, the most similar first.
    pub fn suggest<'a>(&self, candidates: impl IntoIterator<Item = &'a str>) -> Vec<CompactString> {
        let mut scored = candidates
            .into_iter()
            .filter_map(|candidate| {
                let score = normalized_damerau_levenshtein(self.as_str(), candidate);

                match score >= SUGGESTION_THRESHOLD {
                    true => Some((score, candidate)),
                    false => None,
                }
            })
            .collect::<Vec<_>>();

        scored.sort_by(|(a_score, a_name), (b_score, b_name)| {
            b_score
                .partial_cmp(a_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a_name.cmp(b_name))
        });

        scored.dedup_by(|(_, a), (_, b)| a == b);

        scored
            .into_iter()
            .take(SUGGESTION_LIMIT)
            .map(|(_, name)| CompactString::from(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::Ident;

    #[test]
    fn test_keyword_suffix() {
        assert_eq!(Ident::from("exec_").strip_keyword_suffix(), Some("exec"));
        assert_eq!(Ident::from("exec").strip_keyword_suffix(), None);
        assert_eq!(Ident::from("a_").strip_keyword_suffix(), None);
        assert_eq!(Ident::from("__init__").strip_keyword_suffix(), None);
    }

    #[test]
    fn test_suggestions() {
        let ident = Ident::from("setValeu");

        let suggestions = ident.suggest(["setValue", "value", "destroy", "setValue"]);

        assert_eq!(suggestions.first().map(|s| s.as_str()), Some("setValue"));
        assert!(!suggestions.iter().any(|s| s.as_str() == "destroy"));
    }
}
