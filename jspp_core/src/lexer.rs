use std::ops::Range;

use logos::Lexer;
use logos::Logos;

use crate::tokens::Directive;
use crate::tokens::DirectiveKind;
use crate::tokens::DirectiveStyle;
use crate::tokens::Segment;

/// Raw tokens produced by logos for flat tokenization of the source text.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
	#[regex(r"/\*[^*]*\*+(?:[^*/][^*]*\*+)*/")]
	BlockComment,
	#[regex(r"//[^\n]*", allow_greedy = true)]
	LineComment,
	#[regex(r#""(?:[^"\\\n]|\\(?:.|\n))*""#)]
	#[regex(r"'(?:[^'\\\n]|\\(?:.|\n))*'")]
	String,
	#[token("/")]
	Slash,
	#[token("\n")]
	Newline,
	#[regex(r"[ \t\r\x0B\x0C]+")]
	Whitespace,
	#[regex(r"[$0-9A-Za-z_]+")]
	Word,
	#[token(")")]
	#[token("]")]
	Closing,
	#[token("++")]
	#[token("--")]
	Step,
	#[regex(r#"[^\s$0-9A-Za-z_/"'\])]"#)]
	Punct,
}

type RawItem = (Result<RawToken, ()>, Range<usize>);

/// Keywords after which a `/` starts a regular expression, not a division.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
	"return",
	"typeof",
	"instanceof",
	"in",
	"of",
	"new",
	"delete",
	"void",
	"throw",
	"case",
	"do",
	"else",
	"yield",
	"await",
];

/// Walks the logos token stream and groups it into [`Segment`]s.
///
/// The scanner keeps two bits of context: whether only horizontal whitespace
/// has been seen since the last line terminator (directives are recognized
/// only there) and whether the previous significant token allows a regular
/// expression literal to start.
pub struct Scanner<'a> {
	source: &'a str,
	lexer: Lexer<'a, RawToken>,
	peeked: Option<RawItem>,
	line_start: bool,
	regex_allowed: bool,
}

impl<'a> Scanner<'a> {
	pub fn new(source: &'a str) -> Self {
		Self::with_offset(source, 0)
	}

	/// Resume scanning `source` at byte `offset`, which must be the start of
	/// a line (or the value returned by [`Scanner::offset`] after a
	/// directive).
	pub fn with_offset(source: &'a str, offset: usize) -> Self {
		let mut lexer = RawToken::lexer(source);
		lexer.bump(offset.min(source.len()));

		Self {
			source,
			lexer,
			peeked: None,
			line_start: true,
			regex_allowed: true,
		}
	}

	/// Byte offset of the first character not yet returned.
	pub fn offset(&self) -> usize {
		match &self.peeked {
			Some((_, span)) => span.start,
			None => self.lexer.span().end,
		}
	}

	fn peek(&mut self) -> Option<&RawItem> {
		if self.peeked.is_none() {
			self.peeked = self.lexer.next().map(|token| (token, self.lexer.span()));
		}
		self.peeked.as_ref()
	}

	fn bump(&mut self) -> Option<RawItem> {
		self.peeked
			.take()
			.or_else(|| self.lexer.next().map(|token| (token, self.lexer.span())))
	}

	/// Update the line and regex context after consuming `token`.
	fn observe(&mut self, token: Result<RawToken, ()>, span: &Range<usize>) {
		match token {
			Ok(RawToken::Newline) => {
				self.line_start = true;
			}
			Ok(RawToken::Whitespace | RawToken::LineComment) => {}
			Ok(RawToken::BlockComment) => {
				self.line_start = false;
			}
			Ok(RawToken::Word) => {
				let word = &self.source[span.clone()];
				self.line_start = false;
				self.regex_allowed = REGEX_PREFIX_KEYWORDS.contains(&word);
			}
			Ok(RawToken::Closing | RawToken::Step | RawToken::String) => {
				self.line_start = false;
				self.regex_allowed = false;
			}
			Ok(RawToken::Slash | RawToken::Punct) | Err(()) => {
				self.line_start = false;
				self.regex_allowed = true;
			}
		}
	}

	/// Try to read a directive from a comment token that starts a line.
	/// `start` is where the directive (including its indentation) begins.
	fn directive(&mut self, comment: &Range<usize>, start: usize) -> Option<Directive<'a>> {
		let text = &self.source[comment.clone()];
		let (kind, argument, style) = parse_directive(text)?;

		// Swallow the line terminator so the directive leaves no empty line.
		if style == DirectiveStyle::Block
			&& matches!(self.peek(), Some((Ok(RawToken::Whitespace), _)))
		{
			self.bump();
		}
		if matches!(self.peek(), Some((Ok(RawToken::Newline), _))) {
			self.bump();
		}

		self.line_start = true;
		self.regex_allowed = true;

		Some(Directive {
			kind,
			argument,
			style,
			offset: start,
		})
	}

	/// Consume plain tokens up to and including the next line terminator.
	fn text_run(&mut self, start: usize, mut end: usize) -> Segment<'a> {
		loop {
			let Some((token, span)) = self.peek() else {
				break;
			};
			if !is_plain(*token) {
				break;
			}
			let (token, span) = (*token, span.clone());
			self.bump();
			self.observe(token, &span);
			end = span.end;

			if token == Ok(RawToken::Newline) {
				break;
			}
		}

		Segment::Text(&self.source[start..end])
	}

	fn slash(&mut self, span: Range<usize>) -> Segment<'a> {
		if !self.regex_allowed {
			self.observe(Ok(RawToken::Slash), &span);
			return Segment::Division(&self.source[span]);
		}

		// A slash that can't start a valid regex is plain text.
		let Some(length) = regex_literal_len(self.lexer.remainder()) else {
			self.observe(Ok(RawToken::Slash), &span);
			return Segment::Text(&self.source[span]);
		};

		self.lexer.bump(length);
		self.line_start = false;
		self.regex_allowed = false;
		Segment::Regex(&self.source[span.start..span.end + length])
	}
}

impl<'a> Iterator for Scanner<'a> {
	type Item = Segment<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let (token, span) = self.bump()?;

		match token {
			Ok(RawToken::Whitespace) if self.line_start => {
				let next_comment = match self.peek() {
					Some((Ok(RawToken::LineComment | RawToken::BlockComment), comment)) => {
						Some(comment.clone())
					}
					_ => None,
				};
				if let Some(comment) = next_comment {
					let saved = self.peeked.take();
					if let Some(directive) = self.directive(&comment, span.start) {
						return Some(Segment::Directive(directive));
					}
					self.peeked = saved;
				}
				Some(self.text_run(span.start, span.end))
			}
			Ok(RawToken::LineComment | RawToken::BlockComment) => {
				if self.line_start {
					if let Some(directive) = self.directive(&span, span.start) {
						return Some(Segment::Directive(directive));
					}
				}
				self.observe(token, &span);
				let text = &self.source[span];
				Some(if token == Ok(RawToken::LineComment) {
					Segment::LineComment(text)
				} else {
					Segment::BlockComment(text)
				})
			}
			Ok(RawToken::String) => {
				self.observe(token, &span);
				Some(Segment::String(&self.source[span]))
			}
			Ok(RawToken::Slash) => Some(self.slash(span)),
			_ => {
				self.observe(token, &span);
				if token == Ok(RawToken::Newline) {
					return Some(Segment::Text(&self.source[span]));
				}
				Some(self.text_run(span.start, span.end))
			}
		}
	}
}

fn is_plain(token: Result<RawToken, ()>) -> bool {
	matches!(
		token,
		Ok(RawToken::Word
			| RawToken::Whitespace
			| RawToken::Newline
			| RawToken::Closing
			| RawToken::Step
			| RawToken::Punct)
			| Err(())
	)
}

/// Recognize `//#keyword rest` and `/*#keyword rest*/`.
fn parse_directive(comment: &str) -> Option<(DirectiveKind, &str, DirectiveStyle)> {
	let (body, style) = if let Some(rest) = comment.strip_prefix("//#") {
		(rest, DirectiveStyle::Line)
	} else if let Some(rest) = comment.strip_prefix("/*#") {
		if comment.contains('\n') {
			return None;
		}
		(rest.strip_suffix("*/")?, DirectiveStyle::Block)
	} else {
		return None;
	};

	let body = body.trim_start_matches([' ', '\t']);
	let kind = DirectiveKind::ALL.into_iter().find(|kind| {
		body.strip_prefix(kind.as_str())
			.is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t', '(']))
	})?;

	if style == DirectiveStyle::Block && !kind.is_conditional() {
		return None;
	}

	Some((kind, &body[kind.as_str().len()..], style))
}

/// Length of the regular expression literal starting right after an opening
/// `/`, including the closing slash and flags. Returns `None` when the text
/// can't be a regex (empty body, unterminated, or spanning a line break).
pub(crate) fn regex_literal_len(rest: &str) -> Option<usize> {
	let mut chars = rest.char_indices();
	let mut in_class = false;

	match rest.chars().next() {
		None | Some('*' | '/' | '\n') => return None,
		_ => {}
	}

	while let Some((index, ch)) = chars.next() {
		match ch {
			'\n' => return None,
			'\\' => {
				match chars.next() {
					None | Some((_, '\n')) => return None,
					Some(_) => {}
				}
			}
			'[' => in_class = true,
			']' => in_class = false,
			'/' if !in_class => {
				let body_end = index + 1;
				let flags = rest[body_end..]
					.chars()
					.take_while(|ch| matches!(ch, 'g' | 'i' | 'm' | 's' | 'u' | 'y'))
					.count();
				return Some(body_end + flags);
			}
			_ => {}
		}
	}

	None
}

/// Scan the full text into segments.
pub fn scan(source: &str) -> Vec<Segment<'_>> {
	Scanner::new(source).collect()
}
