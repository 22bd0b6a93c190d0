use std::fmt::Display;

/// The keywords accepted after the `//#` directive marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
	If,
	Ifdef,
	Ifndef,
	Elif,
	Else,
	Endif,
	Define,
	Undef,
	Set,
	Unset,
	Include,
	IncludeOnce,
	Indent,
}

impl DirectiveKind {
	pub const ALL: [DirectiveKind; 13] = [
		Self::If,
		Self::Ifdef,
		Self::Ifndef,
		Self::Elif,
		Self::Else,
		Self::Endif,
		Self::Define,
		Self::Undef,
		Self::Set,
		Self::Unset,
		Self::Include,
		Self::IncludeOnce,
		Self::Indent,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::If => "if",
			Self::Ifdef => "ifdef",
			Self::Ifndef => "ifndef",
			Self::Elif => "elif",
			Self::Else => "else",
			Self::Endif => "endif",
			Self::Define => "define",
			Self::Undef => "undef",
			Self::Set => "set",
			Self::Unset => "unset",
			Self::Include => "include",
			Self::IncludeOnce => "include_once",
			Self::Indent => "indent",
		}
	}

	/// Keywords that drive the conditional state machine. Only these are
	/// recognized in the `/*#...*/` block comment form.
	pub fn is_conditional(self) -> bool {
		matches!(
			self,
			Self::If | Self::Ifdef | Self::Ifndef | Self::Elif | Self::Else | Self::Endif
		)
	}

	/// `#else` and `#endif` are the only directives without an expression.
	pub fn takes_expression(self) -> bool {
		!matches!(self, Self::Else | Self::Endif)
	}
}

impl Display for DirectiveKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// Which comment form carried the directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveStyle {
	/// `//#keyword ...`
	Line,
	/// `/*#keyword ...*/`
	Block,
}

/// A directive line recognized by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive<'a> {
	pub kind: DirectiveKind,
	/// Everything after the keyword up to the end of the line, untrimmed.
	pub argument: &'a str,
	pub style: DirectiveStyle,
	/// Byte offset of the directive within the scanned text.
	pub offset: usize,
}

impl Directive<'_> {
	/// The argument with any trailing `//` comment removed and whitespace
	/// trimmed. Quoted text is skipped so `"http://..."` survives.
	pub fn expression(&self) -> &str {
		let bytes = self.argument.as_bytes();
		let mut quote: Option<u8> = None;
		let mut end = bytes.len();
		let mut index = 0;

		while index < bytes.len() {
			let byte = bytes[index];
			match quote {
				Some(_) if byte == b'\\' => index += 1,
				Some(delimiter) if byte == delimiter => quote = None,
				Some(_) => {}
				None if byte == b'"' || byte == b'\'' => quote = Some(byte),
				None if byte == b'/' && bytes.get(index + 1) == Some(&b'/') => {
					end = index;
					break;
				}
				None => {}
			}
			index += 1;
		}

		self.argument[..end].trim()
	}
}

/// The next interesting piece of source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
	Directive(Directive<'a>),
	/// `/* ... */`
	BlockComment(&'a str),
	/// `// ...` without the line terminator.
	LineComment(&'a str),
	/// A single or double quoted string literal.
	String(&'a str),
	/// A regular expression literal including its flags.
	Regex(&'a str),
	/// A `/` used as the division operator.
	Division(&'a str),
	/// Code, whitespace and line terminators with no special meaning.
	Text(&'a str),
}
