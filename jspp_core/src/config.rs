use std::borrow::Cow;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::comments::CommentFilter;
use crate::error::JsppError;
use crate::error::JsppResult;
use crate::variables::is_variable_name;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["jspp.toml", ".jspp.toml", ".config/jspp.toml"];

/// Header inserted before every included file.
pub const DEFAULT_HEADERS: &str = "\n//// __FILE\n\n";

/// Line terminator written to the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EolType {
	/// `\n`
	#[default]
	Unix,
	/// `\r\n`
	Win,
	/// `\r`
	Mac,
}

impl EolType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Unix => "\n",
			Self::Win => "\r\n",
			Self::Mac => "\r",
		}
	}
}

impl FromStr for EolType {
	type Err = JsppError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"unix" => Ok(Self::Unix),
			"win" => Ok(Self::Win),
			"mac" => Ok(Self::Mac),
			other => {
				Err(JsppError::invalid_option(
					"eol-type",
					format!("`{other}` is not one of unix, win or mac"),
				))
			}
		}
	}
}

/// Which comments are kept in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentMode {
	All,
	None,
	/// Keep only comments matching one of the filters.
	#[default]
	Filter,
}

impl FromStr for CommentMode {
	type Err = JsppError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value {
			"all" => Ok(Self::All),
			"none" => Ok(Self::None),
			"filter" => Ok(Self::Filter),
			other => {
				Err(JsppError::invalid_option(
					"comments",
					format!("`{other}` is not one of all, none or filter"),
				))
			}
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndentUnit {
	#[default]
	Space,
	Tab,
}

/// Indentation added per nesting level, written as `<count>[s|t]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndentSpec {
	pub width: usize,
	pub unit: IndentUnit,
}

impl IndentSpec {
	/// The indentation string for files included `level` levels deep.
	pub fn for_level(self, level: usize) -> String {
		let unit = match self.unit {
			IndentUnit::Space => " ",
			IndentUnit::Tab => "\t",
		};
		unit.repeat(level * self.width)
	}
}

impl FromStr for IndentSpec {
	type Err = JsppError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		let value = value.trim();
		if value.is_empty() {
			return Ok(Self::default());
		}

		let invalid = || {
			JsppError::invalid_option(
				"indent",
				format!("`{value}` doesn't match `<count>[s|t]`, e.g. `2`, `2s` or `1t`"),
			)
		};

		let digits = value.bytes().take_while(u8::is_ascii_digit).count();
		let width = value[..digits].parse::<usize>().map_err(|_| invalid())?;
		let unit = match value[digits..].trim_start().to_ascii_lowercase().as_str() {
			"" | "s" => IndentUnit::Space,
			"t" => IndentUnit::Tab,
			_ => return Err(invalid()),
		};

		Ok(Self { width, unit })
	}
}

/// Options of a preprocessing run, loaded from a `jspp.toml` file and/or
/// command line flags.
///
/// ```toml
/// header1 = "// built by jspp^"
/// headers = "^//// __FILE^^"
/// indent = "2s"
/// eol_type = "unix"
/// empty_lines = 1
/// comments = "filter"
/// filter = ["license", "jsdoc"]
/// custom_filter = ["@module"]
/// define = ["DEBUG", "VERSION='1.0.0'"]
/// undef = ["TRACE"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
	/// Text inserted before the top level source.
	pub header1: String,
	/// Text inserted before every included file.
	pub headers: String,
	/// Indentation per nesting level of included files.
	pub indent: String,
	pub eol_type: EolType,
	/// Maximum number of consecutive empty lines, `-1` to keep them all.
	pub empty_lines: i64,
	pub comments: CommentMode,
	/// Names of the filters used when `comments` is `filter`.
	pub filter: Vec<String>,
	/// Regular expressions; a comment matching any of them is kept.
	pub custom_filter: Vec<String>,
	/// Initial definitions: `NAME`, `NAME=EXPR` or `NAME EXPR`.
	pub define: Vec<String>,
	/// Names removed after `define` is applied.
	pub undef: Vec<String>,
	/// Extension appended to included file names without one.
	pub default_extension: String,
	/// Stop at the first recovered error.
	pub strict: bool,
}

impl Default for Options {
	fn default() -> Self {
		Self {
			header1: String::new(),
			headers: DEFAULT_HEADERS.to_string(),
			indent: String::new(),
			eol_type: EolType::Unix,
			empty_lines: 1,
			comments: CommentMode::Filter,
			filter: vec!["license".to_string()],
			custom_filter: Vec::new(),
			define: Vec::new(),
			undef: Vec::new(),
			default_extension: "js".to_string(),
			strict: false,
		}
	}
}

impl Options {
	/// Check every option before processing starts.
	pub fn validate(&self) -> JsppResult<()> {
		self.indent_spec()?;
		self.comment_filter()?;
		self.definitions()?;

		for name in &self.undef {
			if !is_variable_name(name.trim()) {
				return Err(JsppError::invalid_option(
					"undef",
					format!("invalid name `{name}`"),
				));
			}
		}

		Ok(())
	}

	pub fn indent_spec(&self) -> JsppResult<IndentSpec> {
		self.indent.parse()
	}

	pub fn comment_filter(&self) -> JsppResult<CommentFilter> {
		CommentFilter::new(self.comments, &self.filter, &self.custom_filter)
	}

	/// The empty line budget, `None` when unlimited. Values below `-1` count
	/// as `-1`.
	pub fn empty_line_budget(&self) -> Option<usize> {
		usize::try_from(self.empty_lines).ok()
	}

	/// Parse `define` into name and expression pairs.
	pub fn definitions(&self) -> JsppResult<Vec<(String, String)>> {
		self.define.iter().map(|entry| parse_definition(entry)).collect()
	}

	/// The extension without a leading dot.
	pub fn extension(&self) -> &str {
		self.default_extension.trim_start_matches('.')
	}

	/// Path of the first config file found in `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the options from the first discovered config file at `root`.
	/// Returns `None` if there is no config file.
	pub fn load(root: &Path) -> JsppResult<Option<Options>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		Self::load_file(&config_path).map(Some)
	}

	pub fn load_file(path: &Path) -> JsppResult<Options> {
		let content = std::fs::read_to_string(path).map_err(|source| {
			JsppError::ReadFile {
				path: path.display().to_string(),
				source,
			}
		})?;
		let options: Options =
			toml::from_str(&content).map_err(|e| JsppError::ConfigParse(e.to_string()))?;

		tracing::debug!(path = %path.display(), "loaded config file");
		Ok(options)
	}
}

/// Split `NAME=EXPR`, `NAME EXPR` or `NAME` into the name and its
/// (possibly empty) expression.
pub fn parse_definition(entry: &str) -> JsppResult<(String, String)> {
	let entry = entry.trim();
	let name_end = entry
		.find(|ch: char| ch == '=' || ch.is_whitespace())
		.unwrap_or(entry.len());
	let (name, rest) = entry.split_at(name_end);
	let expression = rest.trim_start().strip_prefix('=').unwrap_or(rest).trim();

	if !is_variable_name(name) {
		return Err(JsppError::invalid_option(
			"define",
			format!("invalid name in `{entry}`"),
		));
	}

	Ok((name.to_string(), expression.to_string()))
}

/// Expand the caret shorthand of header options: `^^` is a literal caret
/// and a single `^` a line feed. Carriage returns are normalized to line
/// feeds.
pub fn translate_header(text: &str) -> String {
	let text = normalize_eols(text);
	let mut output = String::with_capacity(text.len());
	let mut chars = text.chars().peekable();

	while let Some(ch) = chars.next() {
		if ch != '^' {
			output.push(ch);
		} else if chars.peek() == Some(&'^') {
			chars.next();
			output.push('^');
		} else {
			output.push('\n');
		}
	}

	output
}

/// Convert `\r\n` and lone `\r` to `\n`.
pub fn normalize_eols(text: &str) -> Cow<'_, str> {
	if text.contains('\r') {
		Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
	} else {
		Cow::Borrowed(text)
	}
}
