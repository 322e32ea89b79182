//! Case-variant expansion of sensitive terms.
//!
//! Engine text search folds ASCII case but not the case of other scripts, so
//! "Ω" does not find "ω". Every casing of the non-ASCII letters in a term is
//! therefore searched explicitly: a term with `k` variable positions becomes
//! `2^k` patterns, where bit `j` of the variant index picks upper case (1) or
//! lower case (0) for variable position `j`.
//!
//! A position is variable when its upper- and lower-case renderings differ.
//! Uncased non-ASCII characters (digits, CJK, punctuation) would only produce
//! identical strings, so they are copied through like ASCII.

use crate::error::ValidationError;
use std::collections::BTreeSet;

/// Hard upper bound on variable positions per term, whatever the caller asks for.
pub const MAX_VARIABLE_POSITIONS: u32 = 20;

/// Expand `terms` into the union of all their case variants.
///
/// Fails before doing any work if a term has more than `max_variable`
/// variable positions. `max_variable` is capped at [`MAX_VARIABLE_POSITIONS`].
pub fn expand_terms<S: AsRef<str>>(
    terms: &[S],
    max_variable: u32,
) -> Result<BTreeSet<String>, ValidationError> {
    let max_variable = max_variable.min(MAX_VARIABLE_POSITIONS);
    let mut parsed = Vec::with_capacity(terms.len());
    for term in terms {
        let term = Term::parse(term.as_ref());
        if term.variable.len() > max_variable as usize {
            return Err(ValidationError::new(format!(
                "sensitive_content entry has {} case-variable characters; at most {} are supported",
                term.variable.len(),
                max_variable
            )));
        }
        parsed.push(term);
    }

    let mut patterns = BTreeSet::new();
    for term in &parsed {
        term.variants_into(&mut patterns);
    }
    Ok(patterns)
}

/// Number of variable positions in `term`.
pub fn variable_positions(term: &str) -> usize {
    Term::parse(term).variable.len()
}

enum Slot {
    Fixed(char),
    Variable { lower: String, upper: String },
}

struct Term {
    slots: Vec<Slot>,
    /// Indices into `slots` of the variable positions, in order.
    variable: Vec<usize>,
}

impl Term {
    fn parse(term: &str) -> Self {
        let mut slots = Vec::new();
        let mut variable = Vec::new();
        for c in term.chars() {
            if c.is_ascii() {
                slots.push(Slot::Fixed(c));
                continue;
            }
            let lower: String = c.to_lowercase().collect();
            let upper: String = c.to_uppercase().collect();
            if lower == upper {
                slots.push(Slot::Fixed(c));
            } else {
                variable.push(slots.len());
                slots.push(Slot::Variable { lower, upper });
            }
        }
        Self { slots, variable }
    }

    fn variants_into(&self, out: &mut BTreeSet<String>) {
        let k = self.variable.len();
        for i in 0u64..(1u64 << k) {
            let mut s = String::new();
            let mut j = 0;
            for slot in &self.slots {
                match slot {
                    Slot::Fixed(c) => s.push(*c),
                    Slot::Variable { lower, upper } => {
                        s.push_str(if i >> j & 1 == 1 { upper } else { lower });
                        j += 1;
                    }
                }
            }
            out.insert(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn ascii_terms_pass_through() {
        let out = expand_terms(&["Alice Smith"], 12).unwrap();
        assert_eq!(out, BTreeSet::from(["Alice Smith".to_string()]));
    }

    #[test]
    fn omega_expands_to_both_cases() {
        let out = expand_terms(&["Ω"], 12).unwrap();
        assert_eq!(out, BTreeSet::from(["Ω".to_string(), "ω".to_string()]));
    }

    #[test]
    fn mixed_term_varies_only_non_ascii() {
        let out = expand_terms(&["Zoë Ångström"], 12).unwrap();
        assert_eq!(out.len(), 8);
        assert!(out.contains("Zoë Ångström"));
        assert!(out.contains("ZoË ÅngstrÖm"));
        assert!(out.contains("Zoë ångström"));
        assert!(out.iter().all(|v| v.starts_with("Zo") && v.contains("ngstr")));
    }

    #[test]
    fn uncased_characters_are_fixed() {
        assert_eq!(variable_positions("東京 №5"), 0);
        assert_eq!(expand_terms(&["東京"], 1).unwrap().len(), 1);
    }

    #[test]
    fn duplicates_and_overlaps_collapse() {
        let out = expand_terms(&["Ω", "ω", "Ω"], 12).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn ceiling_rejects_large_terms() {
        let err = expand_terms(&["ÄÖÜ"], 2).unwrap_err();
        assert!(err.message().contains("at most 2"));
        assert!(expand_terms(&["ÄÖÜ"], 3).is_ok());
    }

    #[test]
    fn ceiling_above_hard_limit_is_capped() {
        let term: String = std::iter::repeat('Ä').take(64).collect();
        let err = expand_terms(&[term.as_str()], 64).unwrap_err();
        assert!(err.message().contains("at most 20"));
        let err = expand_terms(&[term.as_str()], u32::MAX).unwrap_err();
        assert!(err.message().contains("at most 20"));
    }

    // Capital letters with a one-to-one lower-case partner. Σ is left out:
    // `str::to_lowercase` maps it to ς at the end of a word.
    fn cased_letter() -> impl Strategy<Value = char> {
        prop_oneof![
            (0x0391u32..=0x03A9).prop_filter_map("greek capital", |c| {
                char::from_u32(c).filter(|c| c.is_uppercase() && *c != 'Σ')
            }),
            (0x0410u32..=0x042F).prop_filter_map("cyrillic capital", char::from_u32),
        ]
    }

    proptest! {
        #[test]
        fn yields_two_to_the_k(letters in proptest::collection::vec(cased_letter(), 0..6), ascii in "[a-z ]{0,4}") {
            let term: String = letters.iter().collect::<String>() + &ascii;
            let k = variable_positions(&term);
            prop_assert_eq!(k, letters.len());

            let out = expand_terms(&[term.as_str()], 12).unwrap();
            prop_assert_eq!(out.len(), 1usize << k);
            for variant in &out {
                prop_assert!(variant.ends_with(&ascii));
                prop_assert_eq!(variant.to_lowercase(), term.to_lowercase());
            }
        }

        #[test]
        fn ascii_only_is_identity(term in "[ -~]{1,24}") {
            let out = expand_terms(&[term.as_str()], 12).unwrap();
            prop_assert_eq!(out.len(), 1);
            prop_assert!(out.contains(&term));
        }
    }
}
