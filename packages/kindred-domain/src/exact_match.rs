use regex::{Regex, RegexBuilder};

/// Verbatim-presence test for one facet, compiled once and reused across figures.
///
/// Single-word facets match on word boundaries so "Bolivian" does not match inside "Bolivians".
/// Multi-word facets match as plain substrings.
#[derive(Debug, Clone)]
pub struct FacetPattern {
	regex: Option<Regex>,
}
impl FacetPattern {
	pub fn new(facet: &str, case_sensitive: bool) -> Self {
		if facet.trim().is_empty() {
			return Self { regex: None };
		}

		let facet = facet.trim();
		let escaped = regex::escape(facet);
		let pattern = if facet.split_whitespace().count() == 1 {
			// `\b` only anchors next to word characters, so "C++" gets a leading boundary only.
			let lead = if facet.starts_with(is_word_char) { r"\b" } else { "" };
			let trail = if facet.ends_with(is_word_char) { r"\b" } else { "" };

			format!("{lead}{escaped}{trail}")
		} else {
			escaped
		};
		let regex = RegexBuilder::new(&pattern).case_insensitive(!case_sensitive).build().ok();

		Self { regex }
	}

	pub fn is_match(&self, text: &str) -> bool {
		match &self.regex {
			Some(regex) => !text.is_empty() && regex.is_match(text),
			None => false,
		}
	}
}

fn is_word_char(c: char) -> bool {
	c.is_alphanumeric() || c == '_'
}

/// One-off check of whether `facet` appears in `text`.
pub fn facet_appears_in(facet: &str, text: &str, case_sensitive: bool) -> bool {
	FacetPattern::new(facet, case_sensitive).is_match(text)
}
