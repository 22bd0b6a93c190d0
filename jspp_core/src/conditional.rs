use crate::error::JsppError;
use crate::error::JsppResult;
use crate::tokens::DirectiveKind;

/// The directive family that opened a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
	/// The implicit frame at the bottom of every file.
	None,
	/// `#if`, `#ifdef`, `#ifndef` and any following `#elif`.
	If,
	/// After `#else`.
	Else,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
	/// Text is emitted.
	Working,
	/// Text is suppressed while waiting for a true branch.
	Testing,
	/// Text is suppressed and no later sibling can become active.
	Ending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalFrame {
	pub kind: BlockKind,
	pub state: BlockState,
}

impl ConditionalFrame {
	const ROOT: Self = Self {
		kind: BlockKind::None,
		state: BlockState::Working,
	};
}

/// The conditional blocks open in one file.
///
/// The stack is never empty: the bottom frame is `{None, Working}` and can't
/// be closed. Conditions are passed as closures and only evaluated when the
/// result can change the state, so expressions in suppressed blocks never
/// report errors.
#[derive(Debug, Clone)]
pub struct ConditionalStack {
	frames: Vec<ConditionalFrame>,
}

impl Default for ConditionalStack {
	fn default() -> Self {
		Self::new()
	}
}

impl ConditionalStack {
	pub fn new() -> Self {
		Self {
			frames: vec![ConditionalFrame::ROOT],
		}
	}

	pub fn top(&self) -> ConditionalFrame {
		self.frames.last().copied().unwrap_or(ConditionalFrame::ROOT)
	}

	fn top_mut(&mut self) -> &mut ConditionalFrame {
		if self.frames.is_empty() {
			self.frames.push(ConditionalFrame::ROOT);
		}
		let last = self.frames.len() - 1;
		&mut self.frames[last]
	}

	/// Whether text at the current position is emitted.
	pub fn is_working(&self) -> bool {
		self.top().state == BlockState::Working
	}

	/// Number of frames including the bottom one.
	pub fn depth(&self) -> usize {
		self.frames.len()
	}

	/// `true` when every opened block was closed.
	pub fn is_balanced(&self) -> bool {
		self.depth() == 1
	}

	/// `#if`, `#ifdef` and `#ifndef`.
	pub fn open(&mut self, condition: impl FnOnce() -> bool) {
		let state = if !self.is_working() {
			BlockState::Ending
		} else if condition() {
			BlockState::Working
		} else {
			BlockState::Testing
		};

		self.frames.push(ConditionalFrame {
			kind: BlockKind::If,
			state,
		});
	}

	/// `#elif`.
	pub fn elif(&mut self, condition: impl FnOnce() -> bool) -> JsppResult<()> {
		let top = self.top_mut();
		if top.kind != BlockKind::If {
			return Err(unexpected(DirectiveKind::Elif));
		}

		match top.state {
			BlockState::Testing => {
				if condition() {
					top.state = BlockState::Working;
				}
			}
			BlockState::Working => top.state = BlockState::Ending,
			BlockState::Ending => {}
		}

		Ok(())
	}

	/// `#else`.
	pub fn otherwise(&mut self) -> JsppResult<()> {
		let top = self.top_mut();
		if top.kind != BlockKind::If {
			return Err(unexpected(DirectiveKind::Else));
		}

		top.kind = BlockKind::Else;
		top.state = if top.state == BlockState::Testing {
			BlockState::Working
		} else {
			BlockState::Ending
		};

		Ok(())
	}

	/// `#endif`.
	pub fn close(&mut self) -> JsppResult<()> {
		if self.top().kind == BlockKind::None || self.frames.len() < 2 {
			return Err(unexpected(DirectiveKind::Endif));
		}

		self.frames.pop();
		Ok(())
	}
}

fn unexpected(directive: DirectiveKind) -> JsppError {
	JsppError::UnexpectedDirective {
		directive: directive.to_string(),
	}
}
