use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use clap::ValueEnum;
use jspp_core::CommentMode;
use jspp_core::EolType;
use jspp_core::JsppResult;
use jspp_core::Options;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Conditional compilation, defines and includes for JavaScript sources.",
	long_about = "jspp is a C-style preprocessor for JavaScript. Directives live in comments, so \
	              the source stays valid JavaScript:\n\n  //#define DEBUG\n  //#if DEBUG && \
	              $_LEVEL > 1\n  console.log(\"debug\")\n  //#endif\n  //#include \
	              \"lib/utils\"\n\nThe result is written to stdout. Options are read from \
	              `jspp.toml`, `.jspp.toml` or `.config/jspp.toml` in the working directory and \
	              overridden by the flags below."
)]
#[allow(clippy::struct_excessive_bools)]
pub struct JsppCli {
	/// Files to process in order. Standard input is read when none is given.
	pub files: Vec<PathBuf>,

	/// Define a variable as `NAME`, `NAME=EXPR` or `NAME EXPR`. Can be
	/// repeated.
	#[arg(long, short = 'D', alias = "set", value_name = "DEFINITION")]
	pub define: Vec<String>,

	/// Remove a variable after the definitions were applied. Can be repeated.
	#[arg(long, short = 'U', alias = "unset", value_name = "NAME")]
	pub undef: Vec<String>,

	/// Header written before the top level source. `^` is a line break and
	/// `^^` a caret.
	#[arg(long, value_name = "TEXT", allow_hyphen_values = true)]
	pub header1: Option<String>,

	/// Header written before every included file. `__FILE` expands to the
	/// file name.
	#[arg(long, value_name = "TEXT", allow_hyphen_values = true)]
	pub headers: Option<String>,

	/// Indentation per include level, e.g. `2`, `4s` or `1t`.
	#[arg(long, value_name = "SPEC")]
	pub indent: Option<String>,

	/// Line terminator of the output.
	#[arg(long, value_enum)]
	pub eol_type: Option<EolArg>,

	/// Maximum number of consecutive empty lines, `-1` keeps them all.
	#[arg(long, value_name = "COUNT", allow_hyphen_values = true)]
	pub empty_lines: Option<i64>,

	/// Which comments are kept.
	#[arg(long, short = 'C', value_enum)]
	pub comments: Option<CommentsArg>,

	/// Named comment filters (license, jsdoc, jslint, jshint, eslint, all),
	/// comma separated. Replaces the configured filters.
	#[arg(long, short = 'F', value_name = "NAMES")]
	pub filter: Vec<String>,

	/// Keep comments matching this regular expression. Can be repeated.
	#[arg(long, value_name = "REGEX")]
	pub custom_filter: Vec<String>,

	/// Extension appended to included file names without one.
	#[arg(long, value_name = "EXT")]
	pub default_extension: Option<String>,

	/// Stop at the first error instead of reporting it and continuing.
	#[arg(long, default_value_t = false)]
	pub strict: bool,

	/// Read options from this file instead of discovering `jspp.toml`.
	#[arg(long, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// Print the merged options as JSON and exit.
	#[arg(long, default_value_t = false)]
	pub showme: bool,

	/// Enable debug logging on stderr.
	#[arg(long, short, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, default_value_t = false)]
	pub no_color: bool,
}

impl JsppCli {
	/// The options of the run: the config file (explicit or discovered in
	/// `root`) overridden by the flags.
	pub fn options(&self, root: &Path) -> JsppResult<Options> {
		let base = match &self.config {
			Some(path) => Options::load_file(path)?,
			None => Options::load(root)?.unwrap_or_default(),
		};

		Ok(self.merge(base))
	}

	/// Apply the flags on top of `options`.
	pub fn merge(&self, mut options: Options) -> Options {
		if let Some(header1) = &self.header1 {
			options.header1.clone_from(header1);
		}
		if let Some(headers) = &self.headers {
			options.headers.clone_from(headers);
		}
		if let Some(indent) = &self.indent {
			options.indent.clone_from(indent);
		}
		if let Some(eol_type) = self.eol_type {
			options.eol_type = eol_type.into();
		}
		if let Some(empty_lines) = self.empty_lines {
			options.empty_lines = empty_lines;
		}
		if let Some(comments) = self.comments {
			options.comments = comments.into();
		}
		if !self.filter.is_empty() {
			options.filter.clone_from(&self.filter);
		}
		if let Some(extension) = &self.default_extension {
			options.default_extension.clone_from(extension);
		}

		options.custom_filter.extend(self.custom_filter.iter().cloned());
		options.define.extend(self.define.iter().cloned());
		options.undef.extend(self.undef.iter().cloned());
		options.strict |= self.strict;

		options
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EolArg {
	/// `\n`
	Unix,
	/// `\r\n`
	Win,
	/// `\r`
	Mac,
}

impl From<EolArg> for EolType {
	fn from(value: EolArg) -> Self {
		match value {
			EolArg::Unix => Self::Unix,
			EolArg::Win => Self::Win,
			EolArg::Mac => Self::Mac,
		}
	}
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CommentsArg {
	/// Keep every comment.
	All,
	/// Remove every comment.
	None,
	/// Keep the comments matching `--filter` or `--custom-filter`.
	Filter,
}

impl From<CommentsArg> for CommentMode {
	fn from(value: CommentsArg) -> Self {
		match value {
			CommentsArg::All => Self::All,
			CommentsArg::None => Self::None,
			CommentsArg::Filter => Self::Filter,
		}
	}
}
