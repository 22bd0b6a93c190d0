use regex::Regex;

use crate::config::CommentMode;
use crate::error::JsppError;
use crate::error::JsppResult;

/// Filters selectable by name, with the pattern a kept comment must match.
pub const NAMED_FILTERS: [(&str, &str); 5] = [
	("license", r"@license\b"),
	("jsdoc", r"/\*\*[^@]*@[A-Za-z]"),
	("jslint", r"/[*/](?:jslint|global|property)\b"),
	("jshint", r"/[*/]\s*(?:jshint|globals|exported)\s"),
	("eslint", r"/[*/]\s*(?:eslint(?:\s|-[ed])|global\s)"),
];

/// Expand the `all` shorthand and drop duplicates, keeping the order of
/// first appearance.
pub fn expand_filter_names(names: &[String]) -> JsppResult<Vec<&'static str>> {
	let mut expanded: Vec<&'static str> = Vec::new();

	for name in names.iter().flat_map(|name| name.split(',')).map(str::trim) {
		if name.is_empty() {
			continue;
		}

		let selected: Vec<&'static str> = if name == "all" {
			NAMED_FILTERS.iter().map(|(name, _)| *name).collect()
		} else {
			let known = NAMED_FILTERS
				.iter()
				.find(|(known, _)| *known == name)
				.ok_or_else(|| JsppError::invalid_option("filter", format!("unknown filter `{name}`")))?;
			vec![known.0]
		};

		for name in selected {
			if !expanded.contains(&name) {
				expanded.push(name);
			}
		}
	}

	Ok(expanded)
}

/// Decides which comments reach the output.
#[derive(Debug, Clone)]
pub struct CommentFilter {
	mode: CommentMode,
	patterns: Vec<Regex>,
}

impl CommentFilter {
	pub fn new(mode: CommentMode, filters: &[String], custom_filters: &[String]) -> JsppResult<Self> {
		let mut patterns = Vec::new();

		for name in expand_filter_names(filters)? {
			let source = NAMED_FILTERS
				.iter()
				.find_map(|(known, source)| (*known == name).then_some(*source))
				.unwrap_or_default();
			let pattern = Regex::new(source).map_err(|error| JsppError::invalid_option("filter", error.to_string()))?;
			patterns.push(pattern);
		}

		for source in custom_filters {
			let pattern = Regex::new(source).map_err(|error| {
				JsppError::invalid_option("custom-filter", format!("`{source}`: {error}"))
			})?;
			patterns.push(pattern);
		}

		Ok(Self { mode, patterns })
	}

	pub fn keep(&self, comment: &str) -> bool {
		match self.mode {
			CommentMode::All => true,
			CommentMode::None => false,
			CommentMode::Filter => self.patterns.iter().any(|pattern| pattern.is_match(comment)),
		}
	}

	/// The text that replaces `comment` in the output: the comment itself
	/// when kept, otherwise a single space for block comments (so the code
	/// around it doesn't merge) and nothing for line comments.
	pub fn apply<'a>(&self, comment: &'a str) -> &'a str {
		if self.keep(comment) {
			comment
		} else if comment.starts_with("/*") {
			" "
		} else {
			""
		}
	}
}
