use std::fmt;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

#[derive(Debug, MietteDiagnostic, Error)]
#[non_exhaustive]
pub enum JsppError {
	#[error(transparent)]
	#[diagnostic(code(jspp::io_error))]
	Io(#[from] std::io::Error),

	#[error("cannot read `{path}`: {source}")]
	#[diagnostic(
		code(jspp::read_file),
		help("check the path of the `#include` directive or the input file")
	)]
	ReadFile {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid identifier `{name}`")]
	#[diagnostic(
		code(jspp::invalid_identifier),
		help("names must start with `$`, `_` or an uppercase letter followed by `_`, digits or uppercase letters")
	)]
	InvalidIdentifier { name: String },

	#[error("expected expression for #{directive}")]
	#[diagnostic(code(jspp::missing_expression))]
	MissingExpression { directive: String },

	#[error("unexpected expression after #{directive}")]
	#[diagnostic(
		code(jspp::unexpected_expression),
		help("`#else` and `#endif` do not take an expression")
	)]
	UnexpectedExpression { directive: String },

	#[error("unexpected #{directive}")]
	#[diagnostic(
		code(jspp::unexpected_directive),
		help("`#elif`, `#else` and `#endif` must follow an open `#if`, `#ifdef` or `#ifndef`")
	)]
	UnexpectedDirective { directive: String },

	#[error("unclosed conditional block in `{file}`")]
	#[diagnostic(
		code(jspp::unclosed_block),
		help("every file has to close its own blocks with `//#endif`")
	)]
	UnclosedBlock { file: String },

	#[error("expected filename to include")]
	#[diagnostic(code(jspp::missing_filename))]
	MissingFilename,

	#[error("can't evaluate `{expression}` (`{substituted}`): {reason}")]
	#[diagnostic(code(jspp::evaluation))]
	Evaluation {
		expression: String,
		substituted: String,
		reason: String,
	},

	#[error("invalid option `{option}`: {reason}")]
	#[diagnostic(code(jspp::invalid_option))]
	InvalidOption { option: String, reason: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(jspp::config_parse),
		help("check that jspp.toml is valid TOML")
	)]
	ConfigParse(String),
}

impl JsppError {
	pub(crate) fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::InvalidOption {
			option: option.into(),
			reason: reason.into(),
		}
	}

	/// Errors that stop the whole run regardless of the error policy.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			Self::Io(_) | Self::ReadFile { .. } | Self::UnclosedBlock { .. } | Self::ConfigParse(_)
		)
	}
}

/// A recovered error together with the place it was found.
#[derive(Debug)]
pub struct Diagnostic {
	/// Display path of the file, empty for in-memory sources.
	pub file: String,
	/// 1-indexed line of the directive that produced the error, `0` for
	/// errors in the options.
	pub line: usize,
	pub error: JsppError,
}

impl fmt::Display for Diagnostic {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.line == 0 {
			write!(f, "{}", self.error)
		} else if self.file.is_empty() {
			write!(f, "line {}: {}", self.line, self.error)
		} else {
			write!(f, "{}:{}: {}", self.file, self.line, self.error)
		}
	}
}

pub type JsppResult<T> = Result<T, JsppError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
