use crate::config::EolType;

/// State carried between chunks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactorState {
	/// Line feeds seen since the last character of content, emitted or not.
	pub newline_run: usize,
	/// Horizontal whitespace held back until it is known not to be trailing.
	pub pending_space: String,
	/// The last character written, line terminators reported as `\n`.
	pub last_char: Option<char>,
	/// Whether anything other than line terminators was written.
	pub has_content: bool,
	/// Indentation prefixed to every non-empty line.
	pub indent: String,
}

/// Streaming line normalizer.
///
/// Removes trailing whitespace, limits runs of empty lines to the configured
/// budget, converts line feeds to the configured end of line and indents
/// every non-empty line. The budget is enforced across chunk boundaries:
/// the count of line feeds at the end of one chunk continues into the next.
/// At the start of the output up to `budget` empty lines are kept, after
/// content at most `budget + 1` consecutive line feeds.
#[derive(Debug, Clone)]
pub struct Compactor {
	eol: EolType,
	/// `None` keeps every empty line.
	budget: Option<usize>,
	state: CompactorState,
}

impl Compactor {
	pub fn new(eol: EolType, budget: Option<usize>) -> Self {
		Self {
			eol,
			budget,
			state: CompactorState::default(),
		}
	}

	pub fn state(&self) -> &CompactorState {
		&self.state
	}

	pub fn last_char(&self) -> Option<char> {
		self.state.last_char
	}

	/// Switch to another nesting level. When something was written and the
	/// output doesn't end with a line terminator one is forced, so files
	/// don't run together.
	pub fn swap(&mut self, indent: String) -> String {
		let mut output = String::new();
		if self.state.last_char.is_some_and(|last| last != '\n') {
			self.state.pending_space.clear();
			self.newline(&mut output);
		}
		self.state.indent = indent;
		output
	}

	fn newline_limit(&self) -> Option<usize> {
		let budget = self.budget?;
		Some(if self.state.has_content { budget + 1 } else { budget })
	}

	fn newline(&mut self, output: &mut String) {
		self.state.newline_run += 1;
		if self.newline_limit().is_none_or(|limit| self.state.newline_run <= limit) {
			output.push_str(self.eol.as_str());
			self.state.last_char = Some('\n');
		}
	}

	/// Normalize `chunk` and return the text to write.
	pub fn write(&mut self, chunk: &str) -> String {
		let mut output = String::with_capacity(chunk.len());

		for ch in chunk.chars() {
			match ch {
				'\n' => {
					self.state.pending_space.clear();
					self.newline(&mut output);
				}
				' ' | '\t' => self.state.pending_space.push(ch),
				_ => {
					if self.state.newline_run > 0 || self.state.last_char.is_none() {
						output.push_str(&self.state.indent);
					}
					output.push_str(&self.state.pending_space);
					output.push(ch);
					self.state.pending_space.clear();
					self.state.newline_run = 0;
					self.state.last_char = Some(ch);
					self.state.has_content = true;
				}
			}
		}

		output
	}

	/// End of the output: whitespace still held back is trailing and is
	/// dropped.
	pub fn finish(&mut self) {
		self.state.pending_space.clear();
	}
}

/// Compact a whole text in one go.
pub fn compact(text: &str, eol: EolType, budget: Option<usize>) -> String {
	let mut compactor = Compactor::new(eol, budget);
	let output = compactor.write(text);
	compactor.finish();
	output
}
