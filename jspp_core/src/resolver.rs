use std::collections::HashMap;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::rc::Rc;

use crate::conditional::ConditionalStack;
use crate::error::JsppError;
use crate::error::JsppResult;

/// How a file entered the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
	/// By `#include`; later plain includes still proceed.
	Included,
	/// By `#include_once`; the file is never included again.
	IncludedOnce,
}

/// Files included during a run, keyed by canonical path.
#[derive(Debug, Default)]
pub struct InclusionRegistry {
	entries: HashMap<PathBuf, Inclusion>,
}

impl InclusionRegistry {
	pub fn status(&self, path: &Path) -> Option<Inclusion> {
		self.entries.get(path).copied()
	}

	/// Decide whether `path` may be included and record the request.
	///
	/// A file marked once is always skipped. A file included before in any
	/// way is skipped by `#include_once`.
	pub fn admit(&mut self, path: &Path, once: bool) -> bool {
		match (self.status(path), once) {
			(Some(Inclusion::IncludedOnce), _) | (Some(Inclusion::Included), true) => false,
			(Some(Inclusion::Included), false) => true,
			(None, _) => {
				let inclusion = if once {
					Inclusion::IncludedOnce
				} else {
					Inclusion::Included
				};
				self.entries.insert(path.to_path_buf(), inclusion);
				true
			}
		}
	}
}

/// A file name resolved for inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
	/// Absolute path with `.` and `..` removed, used to locate relative
	/// includes and to build the display path.
	pub location: PathBuf,
	/// The canonical path, the key for cycle and once detection.
	pub canonical: PathBuf,
}

/// Remove one pair of matching quotes around `target`.
pub fn strip_quotes(target: &str) -> &str {
	let target = target.trim();
	for quote in ['"', '\''] {
		if let Some(inner) = target
			.strip_prefix(quote)
			.and_then(|rest| rest.strip_suffix(quote))
		{
			return inner.trim();
		}
	}
	target
}

/// Resolve the target of an include directive.
///
/// `base` is the directory of the including file or the working directory
/// at the top level. An `extension` is appended to names that have none.
pub fn resolve_path(target: &str, base: &Path, extension: &str) -> JsppResult<ResolvedPath> {
	let name = strip_quotes(target);
	if name.is_empty() {
		return Err(JsppError::MissingFilename);
	}

	let mut path = PathBuf::from(name);
	if path.extension().is_none() && !extension.is_empty() {
		path = PathBuf::from(format!("{name}.{extension}"));
	}

	let location = normalize(&base.join(path));
	let canonical = std::fs::canonicalize(&location).unwrap_or_else(|_| location.clone());

	Ok(ResolvedPath {
		location,
		canonical,
	})
}

/// Lexically remove `.` and `..` components.
pub fn normalize(path: &Path) -> PathBuf {
	let mut normalized = PathBuf::new();

	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				if normalized.file_name().is_some() {
					normalized.pop();
				} else if !normalized.has_root() {
					normalized.push("..");
				}
			}
			other => normalized.push(other.as_os_str()),
		}
	}

	normalized
}

/// `path` relative to `base` with forward slashes, or the path itself when
/// there is no relative form.
pub fn display_path(path: &Path, base: &Path) -> String {
	let relative = relative_to(path, base).unwrap_or_else(|| path.to_path_buf());
	relative.to_string_lossy().replace('\\', "/")
}

fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
	if path.is_absolute() != base.is_absolute() {
		return None;
	}

	let path_components: Vec<Component> = path.components().collect();
	let base_components: Vec<Component> = base.components().collect();
	let common = path_components
		.iter()
		.zip(&base_components)
		.take_while(|(left, right)| left == right)
		.count();

	if common == 0 && path.has_root() {
		return None;
	}

	let mut relative = PathBuf::new();
	for _ in common..base_components.len() {
		relative.push("..");
	}
	for component in &path_components[common..] {
		relative.push(component.as_os_str());
	}

	Some(relative)
}

/// One file being processed.
#[derive(Debug)]
pub struct FileContext {
	/// Full text with line terminators normalized to `\n`.
	pub source: Rc<str>,
	/// Byte offset where processing continues.
	pub cursor: usize,
	/// Resolved path, `None` for text that didn't come from a file.
	pub path: Option<ResolvedPath>,
	/// Path relative to the working directory, empty without a file.
	pub display_path: String,
	/// Number of includes between this file and the top level.
	pub level: usize,
	pub conditionals: ConditionalStack,
	/// Last offset passed to `line_at` and its line.
	line_mark: (usize, usize),
}

impl FileContext {
	pub fn new(source: impl Into<Rc<str>>, path: Option<ResolvedPath>, display_path: String, level: usize) -> Self {
		Self {
			source: source.into(),
			cursor: 0,
			path,
			display_path,
			level,
			conditionals: ConditionalStack::new(),
			line_mark: (0, 1),
		}
	}

	/// Directory used to resolve the includes of this file.
	pub fn directory(&self) -> Option<&Path> {
		self.path.as_ref().and_then(|path| path.location.parent())
	}

	/// 1-indexed line of byte `offset`. Counting continues from the
	/// previous call when `offset` didn't move backwards.
	pub fn line_at(&mut self, offset: usize) -> usize {
		let end = offset.min(self.source.len());
		let (start, line) = if end >= self.line_mark.0 { self.line_mark } else { (0, 1) };
		let line = line
			+ self.source.as_bytes()[start..end]
				.iter()
				.filter(|byte| **byte == b'\n')
				.count();

		self.line_mark = (end, line);
		line
	}

	pub fn has_remaining_text(&self) -> bool {
		self.cursor < self.source.len()
	}
}

/// The active file and the suspended files that included it, innermost
/// last.
#[derive(Debug, Default)]
pub struct ContextStack {
	contexts: Vec<FileContext>,
}

impl ContextStack {
	pub fn push(&mut self, context: FileContext) {
		tracing::debug!(file = context.display_path.as_str(), level = context.level, "enter file");
		self.contexts.push(context);
	}

	pub fn pop(&mut self) -> Option<FileContext> {
		let context = self.contexts.pop()?;
		tracing::debug!(file = context.display_path.as_str(), level = context.level, "leave file");
		Some(context)
	}

	pub fn active(&self) -> Option<&FileContext> {
		self.contexts.last()
	}

	pub fn active_mut(&mut self) -> Option<&mut FileContext> {
		self.contexts.last_mut()
	}

	/// Whether `canonical` is the active file or one of its ancestors.
	pub fn contains(&self, canonical: &Path) -> bool {
		self.contexts.iter().any(|context| {
			context
				.path
				.as_ref()
				.is_some_and(|path| path.canonical == canonical)
		})
	}
}
