use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::comments::CommentFilter;
use crate::compactor::Compactor;
use crate::conditional::BlockKind;
use crate::conditional::BlockState;
use crate::conditional::ConditionalStack;
use crate::config::IndentSpec;
use crate::config::Options;
use crate::config::normalize_eols;
use crate::config::translate_header;
use crate::error::Diagnostic;
use crate::error::JsppError;
use crate::error::JsppResult;
use crate::expression::evaluate;
use crate::lexer::Scanner;
use crate::resolver::ContextStack;
use crate::resolver::FileContext;
use crate::resolver::InclusionRegistry;
use crate::resolver::display_path;
use crate::resolver::normalize;
use crate::resolver::resolve_path;
use crate::tokens::Directive;
use crate::tokens::DirectiveKind;
use crate::tokens::Segment;
use crate::variables::VariableSet;
use crate::variables::is_variable_name;

/// The input of a run.
pub enum Source {
	File(PathBuf),
	/// Processed as if every file was the target of an `#include`.
	Files(Vec<PathBuf>),
	Reader(Box<dyn Read>),
	Text(String),
}

impl std::fmt::Debug for Source {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::File(path) => f.debug_tuple("File").field(path).finish(),
			Self::Files(paths) => f.debug_tuple("Files").field(paths).finish(),
			Self::Reader(_) => f.write_str("Reader"),
			Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
		}
	}
}

/// Summary of a finished run.
#[derive(Debug, Default)]
pub struct Report {
	/// Recovered errors in the order they were found.
	pub diagnostics: Vec<Diagnostic>,
}

impl Report {
	pub fn has_diagnostics(&self) -> bool {
		!self.diagnostics.is_empty()
	}
}

/// Output of [`preprocess_str`].
#[derive(Debug, Default)]
pub struct Output {
	pub text: String,
	pub diagnostics: Vec<Diagnostic>,
}

/// Preprocess `source` and write the result to `output`.
pub fn preprocess<W: Write>(source: Source, options: &Options, output: &mut W) -> JsppResult<Report> {
	let cwd = normalize(&std::env::current_dir()?);
	Preprocessor::new(options, cwd, output)?.run(source)
}

/// Preprocess in-memory text. Includes are resolved against the working
/// directory.
pub fn preprocess_str(text: &str, options: &Options) -> JsppResult<Output> {
	let mut buffer: Vec<u8> = Vec::new();
	let report = preprocess(Source::Text(text.to_string()), options, &mut buffer)?;

	Ok(Output {
		text: String::from_utf8_lossy(&buffer).into_owned(),
		diagnostics: report.diagnostics,
	})
}

/// Drives one run: scans the active file, routes directives and streams the
/// emitted text through the compactor into the sink.
pub struct Preprocessor<'w, W: Write> {
	options: &'w Options,
	cwd: PathBuf,
	variables: VariableSet,
	registry: InclusionRegistry,
	contexts: ContextStack,
	comments: CommentFilter,
	compactor: Compactor,
	indent: IndentSpec,
	/// Text collected since the last flush.
	chunk: String,
	diagnostics: Vec<Diagnostic>,
	output: &'w mut W,
}

impl<'w, W: Write> Preprocessor<'w, W> {
	/// Validate `options` and apply the initial definitions.
	pub fn new(options: &'w Options, cwd: PathBuf, output: &'w mut W) -> JsppResult<Self> {
		options.validate()?;

		let mut preprocessor = Self {
			options,
			cwd,
			variables: VariableSet::new(),
			registry: InclusionRegistry::default(),
			contexts: ContextStack::default(),
			comments: options.comment_filter()?,
			compactor: Compactor::new(options.eol_type, options.empty_line_budget()),
			indent: options.indent_spec()?,
			chunk: String::new(),
			diagnostics: Vec::new(),
			output,
		};

		for (name, expression) in options.definitions()? {
			if let Err(error) = preprocessor.variables.define(&name, &expression) {
				preprocessor.report(error, 0)?;
			}
		}
		for name in &options.undef {
			if let Err(error) = preprocessor.variables.undefine(name.trim()) {
				preprocessor.report(error, 0)?;
			}
		}

		Ok(preprocessor)
	}

	/// Process `source` to the end.
	pub fn run(mut self, source: Source) -> JsppResult<Report> {
		let top = match source {
			Source::File(path) => self.read_context(&path, 0)?,
			Source::Files(paths) if paths.len() == 1 => self.read_context(&paths[0], 0)?,
			Source::Files(paths) => {
				let text: String = paths
					.iter()
					.map(|path| format!("//#include \"{}\"\n", path.display()))
					.collect();
				FileContext::new(text, None, String::new(), 0)
			}
			Source::Reader(mut reader) => {
				let mut text = String::new();
				reader.read_to_string(&mut text)?;
				FileContext::new(normalize_eols(&text).into_owned(), None, String::new(), 0)
			}
			Source::Text(text) => FileContext::new(normalize_eols(&text).into_owned(), None, String::new(), 0),
		};

		self.enter(top)?;
		self.process()?;
		self.compactor.finish();
		self.output.flush()?;

		Ok(Report {
			diagnostics: self.diagnostics,
		})
	}

	fn read_context(&self, path: &Path, level: usize) -> JsppResult<FileContext> {
		let resolved = resolve_path(&path.to_string_lossy(), &self.cwd, self.options.extension())?;
		let display = display_path(&resolved.location, &self.cwd);
		let text = std::fs::read_to_string(&resolved.location).map_err(|source| {
			JsppError::ReadFile {
				path: display.clone(),
				source,
			}
		})?;

		Ok(FileContext::new(
			normalize_eols(&text).into_owned(),
			Some(resolved),
			display,
			level,
		))
	}

	/// Make `context` the active file and write its header.
	fn enter(&mut self, context: FileContext) -> JsppResult<()> {
		let header = if context.level == 0 {
			&self.options.header1
		} else {
			&self.options.headers
		};
		let header = translate_header(header);

		self.variables.set_current_file(&context.display_path);
		let level = context.level;
		self.contexts.push(context);

		if !header.is_empty() {
			self.swap(level)?;
			let header = self.variables.expand_text(&header, true).into_owned();
			self.chunk.push_str(&header);
			self.flush()?;
		}

		Ok(())
	}

	fn swap(&mut self, level: usize) -> JsppResult<()> {
		let forced = self.compactor.swap(self.indent.for_level(level));
		self.output.write_all(forced.as_bytes())?;
		Ok(())
	}

	fn flush(&mut self) -> JsppResult<()> {
		if self.chunk.is_empty() {
			return Ok(());
		}

		let compacted = self.compactor.write(&self.chunk);
		self.chunk.clear();
		self.output.write_all(compacted.as_bytes())?;
		Ok(())
	}

	fn process(&mut self) -> JsppResult<()> {
		'contexts: while let Some(context) = self.contexts.active() {
			let source = Rc::clone(&context.source);
			let level = context.level;
			let cursor = context.cursor;

			if context.has_remaining_text() {
				self.swap(level)?;
			}

			let mut scanner = Scanner::with_offset(&source, cursor);
			while let Some(segment) = scanner.next() {
				let directive = match segment {
					Segment::Directive(directive) => directive,
					other => {
						if self.is_working() {
							self.emit(&other);
						}
						continue;
					}
				};

				self.flush()?;
				let included = self.directive(&directive)?;
				if let Some(context) = self.contexts.active_mut() {
					context.cursor = scanner.offset();
				}

				if let Some(included) = included {
					self.enter(included)?;
					continue 'contexts;
				}
			}

			self.flush()?;
			self.leave()?;
		}

		Ok(())
	}

	/// The active file reached its end.
	fn leave(&mut self) -> JsppResult<()> {
		let Some(context) = self.contexts.pop() else {
			return Ok(());
		};

		if !context.conditionals.is_balanced() {
			let file = if context.display_path.is_empty() {
				"<input>".to_string()
			} else {
				context.display_path
			};
			self.report(JsppError::UnclosedBlock { file }, 0)?;
		}

		if let Some(parent) = self.contexts.active() {
			let display = parent.display_path.clone();
			self.variables.set_current_file(&display);
		}

		Ok(())
	}

	fn is_working(&self) -> bool {
		self.contexts
			.active()
			.is_some_and(|context| context.conditionals.is_working())
	}

	fn emit(&mut self, segment: &Segment<'_>) {
		let text = match segment {
			Segment::Directive(_) => return,
			Segment::Text(text) => {
				let expanded = self.variables.expand_text(text, true);
				self.chunk.push_str(&expanded);
				return;
			}
			Segment::BlockComment(text) | Segment::LineComment(text) => self.comments.apply(text),
			Segment::String(text) | Segment::Regex(text) | Segment::Division(text) => text,
		};

		let expanded = self.variables.expand_text(text, false);
		self.chunk.push_str(&expanded);
	}

	/// Record a recovered error. Terminal errors, and every error when
	/// running in strict mode, are returned instead.
	fn report(&mut self, error: JsppError, line: usize) -> JsppResult<()> {
		if self.options.strict || error.is_terminal() {
			return Err(error);
		}

		let file = self
			.contexts
			.active()
			.map(|context| context.display_path.clone())
			.unwrap_or_default();

		tracing::warn!(file = file.as_str(), line, "{error}");

		self.diagnostics.push(Diagnostic { file, line, error });
		Ok(())
	}

	/// Apply one directive. Returns the file to include, if any.
	fn directive(&mut self, directive: &Directive<'_>) -> JsppResult<Option<FileContext>> {
		let kind = directive.kind;
		let expression = directive.expression();
		let line = self
			.contexts
			.active_mut()
			.map_or(0, |context| context.line_at(directive.offset));

		tracing::trace!(directive = kind.as_str(), expression, line, "directive");

		if kind.takes_expression() && expression.is_empty() {
			if kind.is_conditional() || self.is_working() {
				self.report(
					JsppError::MissingExpression {
						directive: kind.to_string(),
					},
					line,
				)?;
			}
		} else if !kind.takes_expression() && !expression.is_empty() {
			self.report(
				JsppError::UnexpectedExpression {
					directive: kind.to_string(),
				},
				line,
			)?;
		}

		match kind {
			DirectiveKind::If | DirectiveKind::Ifdef | DirectiveKind::Ifndef => {
				let value = self.is_working() && self.condition(kind, expression, line)?;
				self.conditionals_mut(|conditionals| {
					conditionals.open(|| value);
					Ok(())
				})?;
			}
			DirectiveKind::Elif => {
				let top = self
					.contexts
					.active()
					.map(|context| context.conditionals.top());
				let testing = top.is_some_and(|frame| frame.kind == BlockKind::If && frame.state == BlockState::Testing);
				let value = testing && self.condition(kind, expression, line)?;
				if let Err(error) = self.conditionals_mut(|conditionals| conditionals.elif(|| value)) {
					self.report(error, line)?;
				}
			}
			DirectiveKind::Else => {
				if let Err(error) = self.conditionals_mut(|conditionals| conditionals.otherwise()) {
					self.report(error, line)?;
				}
			}
			DirectiveKind::Endif => {
				if let Err(error) = self.conditionals_mut(|conditionals| conditionals.close()) {
					self.report(error, line)?;
				}
			}
			_ if !self.is_working() || expression.is_empty() => {}
			DirectiveKind::Define | DirectiveKind::Set => {
				let (name, value) = split_definition(expression);
				if let Err(error) = self.variables.define(name, value) {
					self.report(error, line)?;
				}
			}
			DirectiveKind::Undef | DirectiveKind::Unset => {
				if let Err(error) = self.variables.undefine(expression) {
					self.report(error, line)?;
				}
			}
			DirectiveKind::Include | DirectiveKind::IncludeOnce => {
				return self.include(expression, kind == DirectiveKind::IncludeOnce, line);
			}
			DirectiveKind::Indent => {
				match expression.parse::<IndentSpec>() {
					Ok(indent) => self.indent = indent,
					Err(error) => self.report(error, line)?,
				}
			}
		}

		Ok(None)
	}

	fn conditionals_mut(
		&mut self,
		apply: impl FnOnce(&mut ConditionalStack) -> JsppResult<()>,
	) -> JsppResult<()> {
		match self.contexts.active_mut() {
			Some(context) => apply(&mut context.conditionals),
			None => Ok(()),
		}
	}

	/// The truth value of a conditional directive. Failures are reported and
	/// count as false.
	fn condition(&mut self, kind: DirectiveKind, expression: &str, line: usize) -> JsppResult<bool> {
		if expression.is_empty() {
			return Ok(false);
		}

		match kind {
			DirectiveKind::Ifdef | DirectiveKind::Ifndef => {
				if !is_variable_name(expression) {
					self.report(
						JsppError::InvalidIdentifier {
							name: expression.to_string(),
						},
						line,
					)?;
					return Ok(false);
				}
				let defined = self.variables.is_defined(expression);
				Ok(if kind == DirectiveKind::Ifdef { defined } else { !defined })
			}
			_ => {
				match evaluate(expression, &self.variables) {
					Ok(value) => Ok(value.is_truthy()),
					Err(error) => {
						self.report(error, line)?;
						Ok(false)
					}
				}
			}
		}
	}

	fn include(&mut self, target: &str, once: bool, line: usize) -> JsppResult<Option<FileContext>> {
		let (base, level) = match self.contexts.active() {
			Some(context) => {
				(
					context.directory().map_or_else(|| self.cwd.clone(), Path::to_path_buf),
					context.level + 1,
				)
			}
			None => (self.cwd.clone(), 1),
		};

		let resolved = match resolve_path(target, &base, self.options.extension()) {
			Ok(resolved) => resolved,
			Err(error) => {
				self.report(error, line)?;
				return Ok(None);
			}
		};
		let shown = display_path(&resolved.location, &self.cwd);

		if !self.registry.admit(&resolved.canonical, once) {
			tracing::debug!(file = shown.as_str(), once, "skip file already included");
			return Ok(None);
		}

		if self.contains(&resolved.canonical) {
			tracing::debug!(file = shown.as_str(), "skip recursive include");
			self.chunk.push_str(&format!("// ignored {shown}\n"));
			self.flush()?;
			return Ok(None);
		}

		let text = match std::fs::read_to_string(&resolved.location) {
			Ok(text) => text,
			Err(source) => {
				self.report(JsppError::ReadFile { path: shown, source }, line)?;
				return Ok(None);
			}
		};

		Ok(Some(FileContext::new(
			normalize_eols(&text).into_owned(),
			Some(resolved),
			shown,
			level,
		)))
	}

	fn contains(&self, canonical: &Path) -> bool {
		self.contexts.contains(canonical)
	}
}

/// Split the argument of `#define NAME EXPR` into the name and the
/// expression.
fn split_definition(argument: &str) -> (&str, &str) {
	let end = argument
		.find(|ch: char| ch.is_whitespace() || ch == '=' || ch == '(')
		.unwrap_or(argument.len());
	let (name, rest) = argument.split_at(end);
	let rest = rest.trim_start();
	let rest = rest.strip_prefix('=').unwrap_or(rest);
	(name, rest.trim())
}
