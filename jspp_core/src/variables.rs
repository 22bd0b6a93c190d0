use std::borrow::Cow;
use std::collections::BTreeMap;

use derive_more::Deref;

use crate::error::JsppError;
use crate::error::JsppResult;
use crate::expression::evaluate;

/// The reserved name that expands to the path of the file being processed.
pub const FILE_VARIABLE: &str = "__FILE";

/// Prefix of the variables that are also replaced in emitted code.
pub const CODE_VARIABLE_PREFIX: &str = "$_";

/// `[$_A-Z][_0-9A-Z]*`
pub fn is_variable_name(name: &str) -> bool {
	let mut chars = name.chars();
	chars
		.next()
		.is_some_and(|first| first == '$' || first == '_' || first.is_ascii_uppercase())
		&& chars.all(|ch| ch == '_' || ch.is_ascii_digit() || ch.is_ascii_uppercase())
}

fn validate(name: &str) -> JsppResult<()> {
	if is_variable_name(name) {
		Ok(())
	} else {
		Err(JsppError::InvalidIdentifier {
			name: name.to_string(),
		})
	}
}

/// Defined variables, each holding the serialized literal of its value.
///
/// The set lives for a whole run and is shared by every included file.
#[derive(Debug, Clone, Default, Deref)]
pub struct VariableSet {
	#[deref]
	values: BTreeMap<String, String>,
	/// Display path of the current file.
	current_file: String,
	/// `current_file` as a string literal.
	current_file_literal: String,
}

impl VariableSet {
	pub fn new() -> Self {
		let mut variables = Self::default();
		variables.set_current_file("");
		variables
	}

	/// Define `name`. An empty expression stores `1`, anything else is
	/// evaluated and the serialized result is stored. When the evaluation
	/// fails the variable is still defined as `0` and the error is returned.
	pub fn define(&mut self, name: &str, expression: &str) -> JsppResult<&str> {
		validate(name)?;

		let expression = expression.trim();
		let (literal, result) = if expression.is_empty() {
			("1".to_string(), Ok(()))
		} else {
			match evaluate(expression, self) {
				Ok(value) => (value.to_literal(), Ok(())),
				Err(error) => ("0".to_string(), Err(error)),
			}
		};

		tracing::debug!(name, value = literal.as_str(), "define variable");
		self.values.insert(name.to_string(), literal);
		result?;

		Ok(self.values.get(name).map_or("", String::as_str))
	}

	/// Remove `name`. Returns whether it was defined.
	pub fn undefine(&mut self, name: &str) -> JsppResult<bool> {
		validate(name)?;
		tracing::debug!(name, "undefine variable");
		Ok(self.values.remove(name).is_some())
	}

	pub fn is_defined(&self, name: &str) -> bool {
		name == FILE_VARIABLE || self.values.contains_key(name)
	}

	/// The stored literal of `name`. `__FILE` is the quoted display path of
	/// the current file.
	pub fn get(&self, name: &str) -> Option<&str> {
		if name == FILE_VARIABLE {
			return Some(&self.current_file_literal);
		}
		self.values.get(name).map(String::as_str)
	}

	#[cfg(test)]
	pub(crate) fn current_file(&self) -> &str {
		&self.current_file
	}

	pub fn set_current_file(&mut self, display_path: &str) {
		self.current_file = display_path.to_string();
		self.current_file_literal =
			serde_json::to_string(display_path).unwrap_or_else(|_| format!("{display_path:?}"));
	}

	/// Replace `__FILE` with the raw display path and, when `code` is set,
	/// every defined `$_` variable with its literal. Undefined names are left
	/// untouched.
	pub fn expand_text<'a>(&self, text: &'a str, code: bool) -> Cow<'a, str> {
		replace_words(text, |word| {
			if word == FILE_VARIABLE {
				Some(self.current_file.as_str())
			} else if code && word.starts_with(CODE_VARIABLE_PREFIX) {
				self.values.get(word).map(String::as_str)
			} else {
				None
			}
		})
	}
}

fn is_word_char(ch: char) -> bool {
	ch == '$' || ch == '_' || ch.is_ascii_alphanumeric()
}

/// Call `replacement` for every whole word of `text`. Nothing is allocated
/// when no word is replaced.
fn replace_words<'a, 'r>(text: &'a str, replacement: impl Fn(&str) -> Option<&'r str>) -> Cow<'a, str> {
	let mut output: Option<String> = None;
	let mut last = 0;
	let mut rest = text;
	let mut offset = 0;

	while let Some(start) = rest.find(is_word_char) {
		let word_start = offset + start;
		let length = text[word_start..]
			.find(|ch: char| !is_word_char(ch))
			.unwrap_or(text.len() - word_start);
		let word_end = word_start + length;
		let word = &text[word_start..word_end];

		if let Some(value) = replacement(word) {
			let buffer = output.get_or_insert_with(|| String::with_capacity(text.len()));
			buffer.push_str(&text[last..word_start]);
			buffer.push_str(value);
			last = word_end;
		}

		offset = word_end;
		rest = &text[word_end..];
	}

	match output {
		Some(mut buffer) => {
			buffer.push_str(&text[last..]);
			Cow::Owned(buffer)
		}
		None => Cow::Borrowed(text),
	}
}
