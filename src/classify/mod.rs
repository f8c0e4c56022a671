//! Deterministic rule stage of the classification pipeline.
//!
//! Everything here is a pure function of the text and the keyword tables:
//! running a rule twice on the same input yields the same answer.
//!
//! # Submodules
//!
//! - [`card`]: product identity, collection-time outcome, relevance window
//! - [`fields`]: income, credit score and credit limit extraction
//! - [`confidence`]: title outcome label and rule confidence score
//! - [`features`]: binary text features for modeling

pub mod card;
pub mod confidence;
pub mod features;
pub mod fields;

pub use card::CardClassifier;
pub use fields::FieldKind;

use regex::Regex;

/// Compile a list of literal phrases into one whole-word alternation.
///
/// Longer phrases are tried first so `chase freedom unlimited` wins over
/// `freedom`. Returns `None` for an empty list, which matches nothing.
pub(crate) fn phrase_regex<S: AsRef<str>>(terms: &[S]) -> Result<Option<Regex>, regex::Error> {
    let mut escaped: Vec<String> = terms
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| regex::escape(&t))
        .collect();
    if escaped.is_empty() {
        return Ok(None);
    }
    escaped.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    escaped.dedup();
    Regex::new(&format!(r"\b(?:{})\b", escaped.join("|"))).map(Some)
}

/// Compile a constant phrase list; for the built-in tables only.
pub(crate) fn static_phrases(terms: &[&str]) -> Regex {
    phrase_regex(terms)
        .expect("built-in phrase table compiles")
        .expect("built-in phrase table is not empty")
}

pub(crate) fn matches(re: &Option<Regex>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phrase_regex_whole_words() {
        let re = phrase_regex(&["ink", "cfu"]).unwrap().unwrap();
        assert!(re.is_match("chase ink preferred"));
        assert!(re.is_match("got my cfu!"));
        assert!(!re.is_match("i think so"));
        assert!(!re.is_match("cfus"));
    }

    #[test]
    fn test_phrase_regex_escapes_and_prefers_longest() {
        let re = phrase_regex(&["freedom", "chase freedom unlimited", "pre-approval"])
            .unwrap()
            .unwrap();
        let m = re.find("the chase freedom unlimited card").unwrap();
        assert_eq!(m.as_str(), "chase freedom unlimited");
        assert!(re.is_match("a pre-approval letter"));
    }

    #[test]
    fn test_phrase_regex_empty_matches_nothing() {
        let none: Option<Regex> = phrase_regex::<&str>(&[]).unwrap();
        assert!(none.is_none());
        assert!(!matches(&none, "anything"));
    }
}
