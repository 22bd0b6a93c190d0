use std::cmp::Ordering;
use std::ops::Range;

use regex::Regex;
use regex::RegexBuilder;

use crate::error::JsppError;
use crate::error::JsppResult;
use crate::lexer::regex_literal_len;
use crate::value::DateValue;
use crate::value::RegexValue;
use crate::value::Value;
use crate::value::string_to_number;
use crate::variables::VariableSet;
use crate::variables::is_variable_name;

/// Evaluate the expression of a directive.
///
/// Variable references are first replaced by their stored literals (or `0`
/// when undefined) and `defined(NAME)` by `1` or `0`. The resulting text is
/// parsed and evaluated by a small expression interpreter that understands
/// javascript literals, operators, `typeof`, `new Date(...)`, regular
/// expressions and a handful of built-in functions. Infinite results are
/// normalized to `0`.
pub fn evaluate(expression: &str, variables: &VariableSet) -> JsppResult<Value> {
	let failure = |substituted: &str, reason: String| {
		JsppError::Evaluation {
			expression: expression.to_string(),
			substituted: substituted.to_string(),
			reason,
		}
	};

	let substituted = substitute(expression, variables).map_err(|reason| failure(expression, reason))?;
	let value = Parser::parse(&substituted)
		.and_then(|expr| eval(&expr))
		.map_err(|reason| failure(&substituted, reason))?;

	Ok(value.normalize_infinity())
}

/// Replace `defined(NAME)` and variable references in `expression`.
/// Text inside string and regex literals and property names after a `.` are
/// left alone.
pub fn substitute(expression: &str, variables: &VariableSet) -> Result<String, String> {
	let tokens = tokenize(expression)?;
	let mut output = String::with_capacity(expression.len());
	let mut last = 0;
	let mut index = 0;

	while index < tokens.len() {
		let token = &tokens[index];
		output.push_str(&expression[last..token.span.start]);
		last = token.span.end;
		index += 1;

		if token.kind != TokenKind::Identifier {
			output.push_str(&expression[token.span.clone()]);
			continue;
		}

		let name = &expression[token.span.clone()];
		let after_dot = index > 1 && tokens[index - 2].is_punct(".");
		if after_dot {
			output.push_str(name);
			continue;
		}

		if name == "defined" {
			if let Some(tested) = defined_argument(&tokens[index..], expression) {
				output.push(if variables.is_defined(tested) { '1' } else { '0' });
				last = tokens[index + 2].span.end;
				index += 3;
				continue;
			}
		}

		match variables.get(name) {
			Some(literal) => output.push_str(literal),
			None if is_variable_name(name) && !GLOBALS.contains(&name) => output.push('0'),
			None => output.push_str(name),
		}
	}

	output.push_str(&expression[last..]);
	Ok(output)
}

/// Matches the `( NAME )` following `defined`.
fn defined_argument<'a>(tokens: &[Token], source: &'a str) -> Option<&'a str> {
	match tokens {
		[open, name, close, ..]
			if open.is_punct("(") && name.kind == TokenKind::Identifier && close.is_punct(")") =>
		{
			Some(&source[name.span.clone()])
		}
		_ => None,
	}
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
	Number(f64),
	String(String),
	Regex(RegexValue),
	Identifier,
	Punct(&'static str),
}

#[derive(Debug, Clone)]
struct Token {
	kind: TokenKind,
	span: Range<usize>,
}

impl Token {
	fn is_punct(&self, punct: &str) -> bool {
		matches!(self.kind, TokenKind::Punct(value) if value == punct)
	}
}

/// Longest first.
const PUNCTUATORS: &[&str] = &[
	"===", "!==", ">>>", "==", "!=", "<=", ">=", "&&", "||", "??", "<<", ">>", "**", "+", "-",
	"*", "/", "%", "<", ">", "!", "~", "&", "|", "^", "?", ":", "(", ")", "[", "]", ",", ".",
];

/// Identifiers after which a `/` starts a regular expression.
const OPERATOR_KEYWORDS: &[&str] = &["typeof", "void", "instanceof", "in", "new"];

fn is_identifier_start(ch: char) -> bool {
	ch == '$' || ch == '_' || ch.is_ascii_alphabetic()
}

fn is_identifier_char(ch: char) -> bool {
	is_identifier_start(ch) || ch.is_ascii_digit()
}

fn tokenize(text: &str) -> Result<Vec<Token>, String> {
	let mut tokens: Vec<Token> = Vec::new();
	let mut position = 0;

	while let Some(ch) = text[position..].chars().next() {
		if ch.is_whitespace() {
			position += ch.len_utf8();
			continue;
		}

		let start = position;
		let kind = if ch.is_ascii_digit()
			|| (ch == '.' && text[position + 1..].starts_with(|next: char| next.is_ascii_digit()))
		{
			let (value, length) = read_number(&text[position..])?;
			position += length;
			TokenKind::Number(value)
		} else if ch == '"' || ch == '\'' {
			let (value, length) = read_string(&text[position..], ch)?;
			position += length;
			TokenKind::String(value)
		} else if is_identifier_start(ch) {
			position += text[position..]
				.find(|next: char| !is_identifier_char(next))
				.unwrap_or(text.len() - position);
			TokenKind::Identifier
		} else if ch == '/' && regex_allowed(tokens.last(), text) {
			let body = &text[position + 1..];
			let length = regex_literal_len(body).ok_or("invalid regular expression literal")?;
			let literal = &body[..length];
			let (source, flags) = literal.rsplit_once('/').unwrap_or((literal, ""));
			position += length + 1;
			TokenKind::Regex(RegexValue {
				source: source.to_string(),
				flags: flags.to_string(),
			})
		} else {
			let punct = PUNCTUATORS
				.iter()
				.copied()
				.find(|punct| text[position..].starts_with(*punct))
				.ok_or_else(|| format!("unexpected character `{ch}`"))?;
			position += punct.len();
			TokenKind::Punct(punct)
		};

		tokens.push(Token {
			kind,
			span: start..position,
		});
	}

	Ok(tokens)
}

fn regex_allowed(previous: Option<&Token>, text: &str) -> bool {
	match previous {
		None => true,
		Some(token) => {
			match &token.kind {
				TokenKind::Punct(punct) => !matches!(*punct, ")" | "]"),
				TokenKind::Identifier => OPERATOR_KEYWORDS.contains(&&text[token.span.clone()]),
				_ => false,
			}
		}
	}
}

fn read_number(text: &str) -> Result<(f64, usize), String> {
	let bytes = text.as_bytes();

	if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
		let digits = hex.bytes().take_while(u8::is_ascii_hexdigit).count();
		let value = u64::from_str_radix(&hex[..digits], 16).map_err(|error| error.to_string())?;
		return finish_number(text, value as f64, digits + 2);
	}

	let mut end = bytes.iter().take_while(|byte| byte.is_ascii_digit()).count();
	if bytes.get(end) == Some(&b'.') {
		end += 1;
		end += bytes[end..].iter().take_while(|byte| byte.is_ascii_digit()).count();
	}
	if matches!(bytes.get(end), Some(b'e' | b'E')) {
		let mut exponent = end + 1;
		if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
			exponent += 1;
		}
		let digits = bytes[exponent..].iter().take_while(|byte| byte.is_ascii_digit()).count();
		if digits == 0 {
			return Err("invalid number".to_string());
		}
		end = exponent + digits;
	}

	let value = text[..end].parse::<f64>().map_err(|error| error.to_string())?;
	finish_number(text, value, end)
}

fn finish_number(text: &str, value: f64, length: usize) -> Result<(f64, usize), String> {
	if text[length..].starts_with(is_identifier_char) {
		return Err(format!("invalid number `{}`", &text[..=length]));
	}
	Ok((value, length))
}

/// Read a quoted string starting at the opening quote. Raw line breaks are
/// kept as part of the value.
fn read_string(text: &str, quote: char) -> Result<(String, usize), String> {
	let mut value = String::new();
	let mut chars = text.char_indices().skip(1).peekable();

	while let Some((index, ch)) = chars.next() {
		if ch == quote {
			return Ok((value, index + 1));
		}
		if ch != '\\' {
			value.push(ch);
			continue;
		}

		let Some((_, escaped)) = chars.next() else {
			break;
		};
		match escaped {
			'n' => value.push('\n'),
			'r' => value.push('\r'),
			't' => value.push('\t'),
			'b' => value.push('\u{8}'),
			'f' => value.push('\u{c}'),
			'v' => value.push('\u{b}'),
			'0' => value.push('\0'),
			'\n' => {}
			'\r' => {
				if chars.peek().is_some_and(|(_, next)| *next == '\n') {
					chars.next();
				}
			}
			'x' | 'u' => {
				let braced = escaped == 'u' && chars.peek().is_some_and(|(_, next)| *next == '{');
				if braced {
					chars.next();
				}
				let width = if escaped == 'x' { 2 } else { 4 };
				let mut hex = String::new();
				while let Some((_, next)) = chars.peek() {
					if braced && *next == '}' {
						chars.next();
						break;
					}
					if !braced && hex.len() == width {
						break;
					}
					hex.push(*next);
					chars.next();
				}
				let code = u32::from_str_radix(&hex, 16)
					.ok()
					.and_then(char::from_u32)
					.ok_or_else(|| format!("invalid escape sequence `\\{escaped}{hex}`"))?;
				value.push(code);
			}
			other => value.push(other),
		}
	}

	Err("unterminated string literal".to_string())
}

#[derive(Debug, Clone)]
enum Expr {
	Literal(Value),
	Identifier(String),
	Unary(&'static str, Box<Expr>),
	Binary(&'static str, Box<Expr>, Box<Expr>),
	Logical(&'static str, Box<Expr>, Box<Expr>),
	Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
	Member(Box<Expr>, String),
	Index(Box<Expr>, Box<Expr>),
	Call(Box<Expr>, Vec<Expr>),
	New(String, Vec<Expr>),
}

/// Binary operators from the loosest to the tightest binding.
const BINARY_LEVELS: &[&[&str]] = &[
	&["||", "??"],
	&["&&"],
	&["|"],
	&["^"],
	&["&"],
	&["===", "!==", "==", "!="],
	&["<=", ">=", "<", ">", "instanceof"],
	&["<<", ">>>", ">>"],
	&["+", "-"],
	&["*", "/", "%"],
];

/// Deepest nesting of parentheses, calls and unary operators.
const MAX_NESTING: usize = 48;
/// Longest expression, in tokens. Bounds the depth of operator chains.
const MAX_TOKENS: usize = 512;
/// Longest string a method may build, in characters.
const MAX_STRING_LENGTH: usize = 1 << 29;

struct Parser<'a> {
	source: &'a str,
	tokens: Vec<Token>,
	position: usize,
	depth: usize,
}

impl<'a> Parser<'a> {
	fn parse(source: &'a str) -> Result<Expr, String> {
		let mut parser = Self {
			source,
			tokens: tokenize(source)?,
			position: 0,
			depth: 0,
		};

		if parser.tokens.is_empty() {
			return Err("empty expression".to_string());
		}
		if parser.tokens.len() > MAX_TOKENS {
			return Err(format!("expression longer than {MAX_TOKENS} tokens"));
		}

		let expr = parser.conditional()?;
		match parser.tokens.get(parser.position) {
			Some(token) => Err(format!("unexpected token `{}`", parser.text(token))),
			None => Ok(expr),
		}
	}

	fn text(&self, token: &Token) -> &'a str {
		&self.source[token.span.clone()]
	}

	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.position)
	}

	fn eat(&mut self, punct: &str) -> bool {
		let matched = self.peek().is_some_and(|token| token.is_punct(punct));
		if matched {
			self.position += 1;
		}
		matched
	}

	fn expect(&mut self, punct: &str) -> Result<(), String> {
		if self.eat(punct) {
			return Ok(());
		}
		match self.peek() {
			Some(token) => Err(format!("expected `{punct}` but found `{}`", self.text(token))),
			None => Err(format!("expected `{punct}` but reached the end")),
		}
	}

	fn identifier(&mut self) -> Result<&'a str, String> {
		match self.peek() {
			Some(token) if token.kind == TokenKind::Identifier => {
				let name = self.text(token);
				self.position += 1;
				Ok(name)
			}
			Some(token) => Err(format!("expected a name but found `{}`", self.text(token))),
			None => Err("expected a name but reached the end".to_string()),
		}
	}

	/// Run `parse` one nesting level deeper.
	fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, String>) -> Result<T, String> {
		if self.depth == MAX_NESTING {
			return Err(format!("expression nested deeper than {MAX_NESTING} levels"));
		}

		self.depth += 1;
		let parsed = parse(self)?;
		self.depth -= 1;
		Ok(parsed)
	}

	fn conditional(&mut self) -> Result<Expr, String> {
		self.nested(Self::ternary)
	}

	fn ternary(&mut self) -> Result<Expr, String> {
		let test = self.binary(0)?;
		if !self.eat("?") {
			return Ok(test);
		}

		let consequent = self.conditional()?;
		self.expect(":")?;
		let alternate = self.conditional()?;
		Ok(Expr::Conditional(
			Box::new(test),
			Box::new(consequent),
			Box::new(alternate),
		))
	}

	fn binary_operator(&self, level: usize) -> Option<&'static str> {
		let token = self.peek()?;
		let text = self.text(token);
		let is_operator = match token.kind {
			TokenKind::Punct(_) => true,
			TokenKind::Identifier => text == "instanceof",
			_ => false,
		};
		if !is_operator {
			return None;
		}
		BINARY_LEVELS[level].iter().copied().find(|operator| *operator == text)
	}

	fn binary(&mut self, level: usize) -> Result<Expr, String> {
		if level == BINARY_LEVELS.len() {
			return self.exponent();
		}

		let mut left = self.binary(level + 1)?;
		while let Some(operator) = self.binary_operator(level) {
			self.position += 1;
			let right = self.binary(level + 1)?;
			left = if matches!(operator, "||" | "&&" | "??") {
				Expr::Logical(operator, Box::new(left), Box::new(right))
			} else {
				Expr::Binary(operator, Box::new(left), Box::new(right))
			};
		}

		Ok(left)
	}

	fn exponent(&mut self) -> Result<Expr, String> {
		let base = self.unary()?;
		if self.eat("**") {
			let power = self.nested(Self::exponent)?;
			return Ok(Expr::Binary("**", Box::new(base), Box::new(power)));
		}
		Ok(base)
	}

	fn unary(&mut self) -> Result<Expr, String> {
		let operator = match self.peek() {
			Some(token) => {
				match (&token.kind, self.text(token)) {
					(TokenKind::Punct(punct @ ("!" | "-" | "+" | "~")), _) => Some(*punct),
					(TokenKind::Identifier, "typeof") => Some("typeof"),
					(TokenKind::Identifier, "void") => Some("void"),
					_ => None,
				}
			}
			None => None,
		};

		match operator {
			Some(operator) => {
				self.position += 1;
				Ok(Expr::Unary(operator, Box::new(self.nested(Self::unary)?)))
			}
			None => self.postfix(),
		}
	}

	fn arguments(&mut self) -> Result<Vec<Expr>, String> {
		let mut arguments = Vec::new();
		if self.eat(")") {
			return Ok(arguments);
		}

		loop {
			arguments.push(self.conditional()?);
			if self.eat(")") {
				return Ok(arguments);
			}
			self.expect(",")?;
		}
	}

	fn postfix(&mut self) -> Result<Expr, String> {
		let mut expr = self.primary()?;

		loop {
			if self.eat(".") {
				let name = self.identifier()?;
				expr = Expr::Member(Box::new(expr), name.to_string());
			} else if self.eat("[") {
				let index = self.conditional()?;
				self.expect("]")?;
				expr = Expr::Index(Box::new(expr), Box::new(index));
			} else if self.eat("(") {
				let arguments = self.arguments()?;
				expr = Expr::Call(Box::new(expr), arguments);
			} else {
				return Ok(expr);
			}
		}
	}

	fn primary(&mut self) -> Result<Expr, String> {
		let Some(token) = self.peek().cloned() else {
			return Err("unexpected end of expression".to_string());
		};
		self.position += 1;

		let expr = match token.kind {
			TokenKind::Number(value) => Expr::Literal(Value::Number(value)),
			TokenKind::String(value) => Expr::Literal(Value::String(value)),
			TokenKind::Regex(value) => Expr::Literal(Value::Regex(value)),
			TokenKind::Punct("(") => {
				let inner = self.conditional()?;
				self.expect(")")?;
				inner
			}
			TokenKind::Punct(_) => {
				return Err(format!("unexpected token `{}`", self.text(&token)));
			}
			TokenKind::Identifier => {
				match self.text(&token) {
					"true" => Expr::Literal(Value::Boolean(true)),
					"false" => Expr::Literal(Value::Boolean(false)),
					"null" => Expr::Literal(Value::Null),
					"undefined" => Expr::Literal(Value::Undefined),
					"NaN" => Expr::Literal(Value::Number(f64::NAN)),
					"Infinity" => Expr::Literal(Value::Number(f64::INFINITY)),
					"new" => {
						let constructor = self.identifier()?;
						let arguments = if self.eat("(") {
							self.arguments()?
						} else {
							Vec::new()
						};
						Expr::New(constructor.to_string(), arguments)
					}
					name => Expr::Identifier(name.to_string()),
				}
			}
		};

		Ok(expr)
	}
}

/// Built-in names that can be called or have members read.
const GLOBALS: &[&str] = &[
	"Math",
	"Date",
	"Number",
	"String",
	"Boolean",
	"RegExp",
	"JSON",
	"parseInt",
	"parseFloat",
	"isNaN",
	"isFinite",
];

fn eval(expr: &Expr) -> Result<Value, String> {
	match expr {
		Expr::Literal(value) => Ok(value.clone()),
		Expr::Identifier(name) => Err(format!("{name} is not defined")),
		Expr::Unary(operator, operand) => unary(operator, operand),
		Expr::Binary(operator, left, right) => {
			if *operator == "instanceof" {
				return instance_of(&eval(left)?, right);
			}
			binary(operator, &eval(left)?, &eval(right)?)
		}
		Expr::Logical(operator, left, right) => {
			let left = eval(left)?;
			let short_circuit = match *operator {
				"&&" => !left.is_truthy(),
				"||" => left.is_truthy(),
				_ => !matches!(left, Value::Null | Value::Undefined),
			};
			if short_circuit { Ok(left) } else { eval(right) }
		}
		Expr::Conditional(test, consequent, alternate) => {
			if eval(test)?.is_truthy() {
				eval(consequent)
			} else {
				eval(alternate)
			}
		}
		Expr::Member(object, property) => {
			if let Expr::Identifier(name) = object.as_ref() {
				return static_member(name, property);
			}
			member(&eval(object)?, property)
		}
		Expr::Index(object, index) => {
			let object = eval(object)?;
			let index = eval(index)?;
			match (&object, &index) {
				(Value::Null | Value::Undefined, _) => {
					Err(format!("cannot read properties of {}", object.to_js_string()))
				}
				(Value::String(text), Value::Number(position)) => {
					let character = (position.fract() == 0.0 && *position >= 0.0)
						.then(|| text.chars().nth(*position as usize))
						.flatten();
					Ok(character.map_or(Value::Undefined, |ch| Value::String(ch.to_string())))
				}
				_ => member(&object, &index.to_js_string()),
			}
		}
		Expr::Call(callee, arguments) => {
			let arguments = arguments.iter().map(eval).collect::<Result<Vec<_>, _>>()?;
			match callee.as_ref() {
				Expr::Identifier(name) => call_global(name, &arguments),
				Expr::Member(object, method) => {
					if let Expr::Identifier(name) = object.as_ref() {
						return call_static(name, method, &arguments);
					}
					call_method(&eval(object)?, method, &arguments)
				}
				_ => Err("expression is not a function".to_string()),
			}
		}
		Expr::New(constructor, arguments) => {
			let arguments = arguments.iter().map(eval).collect::<Result<Vec<_>, _>>()?;
			match constructor.as_str() {
				"Date" => Ok(Value::Date(construct_date(&arguments))),
				"RegExp" | "String" | "Number" | "Boolean" => call_global(constructor, &arguments),
				other => Err(format!("{other} is not a constructor")),
			}
		}
	}
}

fn unary(operator: &str, operand: &Expr) -> Result<Value, String> {
	if operator == "typeof" {
		if let Expr::Identifier(name) = operand {
			let kind = if GLOBALS.contains(&name.as_str()) {
				if matches!(name.as_str(), "Math" | "JSON") { "object" } else { "function" }
			} else {
				"undefined"
			};
			return Ok(Value::String(kind.to_string()));
		}
		return Ok(Value::String(eval(operand)?.type_of().to_string()));
	}

	let value = eval(operand)?;
	Ok(match operator {
		"!" => Value::Boolean(!value.is_truthy()),
		"-" => Value::Number(-value.to_number()),
		"+" => Value::Number(value.to_number()),
		"~" => Value::Number(f64::from(!to_int32(value.to_number()))),
		_ => Value::Undefined,
	})
}

fn binary(operator: &str, left: &Value, right: &Value) -> Result<Value, String> {
	let numbers = || (left.to_number(), right.to_number());

	let value = match operator {
		"+" => {
			let (left, right) = (left.to_primitive(), right.to_primitive());
			if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
				Value::String(left.to_js_string() + &right.to_js_string())
			} else {
				Value::Number(left.to_number() + right.to_number())
			}
		}
		"-" => Value::Number(numbers().0 - numbers().1),
		"*" => Value::Number(numbers().0 * numbers().1),
		"/" => Value::Number(numbers().0 / numbers().1),
		"%" => Value::Number(numbers().0 % numbers().1),
		"**" => Value::Number(numbers().0.powf(numbers().1)),
		"==" => Value::Boolean(loose_equals(left, right)),
		"!=" => Value::Boolean(!loose_equals(left, right)),
		"===" => Value::Boolean(strict_equals(left, right)),
		"!==" => Value::Boolean(!strict_equals(left, right)),
		"<" => Value::Boolean(compare(left, right) == Some(Ordering::Less)),
		">" => Value::Boolean(compare(left, right) == Some(Ordering::Greater)),
		"<=" => Value::Boolean(matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal))),
		">=" => {
			Value::Boolean(matches!(
				compare(left, right),
				Some(Ordering::Greater | Ordering::Equal)
			))
		}
		"&" => Value::Number(f64::from(to_int32(numbers().0) & to_int32(numbers().1))),
		"|" => Value::Number(f64::from(to_int32(numbers().0) | to_int32(numbers().1))),
		"^" => Value::Number(f64::from(to_int32(numbers().0) ^ to_int32(numbers().1))),
		"<<" => Value::Number(f64::from(to_int32(numbers().0) << (to_uint32(numbers().1) & 31))),
		">>" => Value::Number(f64::from(to_int32(numbers().0) >> (to_uint32(numbers().1) & 31))),
		">>>" => Value::Number(f64::from(to_uint32(numbers().0) >> (to_uint32(numbers().1) & 31))),
		other => return Err(format!("unsupported operator `{other}`")),
	};

	Ok(value)
}

fn instance_of(value: &Value, constructor: &Expr) -> Result<Value, String> {
	let Expr::Identifier(name) = constructor else {
		return Err("right-hand side of instanceof is not callable".to_string());
	};
	match name.as_str() {
		"Date" => Ok(Value::Boolean(matches!(value, Value::Date(_)))),
		"RegExp" => Ok(Value::Boolean(matches!(value, Value::Regex(_)))),
		"Object" => Ok(Value::Boolean(value.is_object())),
		"Number" | "String" | "Boolean" => Ok(Value::Boolean(false)),
		other => Err(format!("{other} is not defined")),
	}
}

fn strict_equals(left: &Value, right: &Value) -> bool {
	match (left, right) {
		(Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
		(Value::Number(left), Value::Number(right)) => left == right,
		(Value::String(left), Value::String(right)) => left == right,
		(Value::Boolean(left), Value::Boolean(right)) => left == right,
		_ => false,
	}
}

fn loose_equals(left: &Value, right: &Value) -> bool {
	match (left, right) {
		(Value::Null | Value::Undefined, Value::Null | Value::Undefined) => true,
		(Value::Null | Value::Undefined, _) | (_, Value::Null | Value::Undefined) => false,
		(left, right) if left.is_object() && right.is_object() => false,
		(left, right) if left.is_object() || right.is_object() => {
			loose_equals(&left.to_primitive(), &right.to_primitive())
		}
		(Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
			loose_equals(
				&Value::Number(left.to_number()),
				&Value::Number(right.to_number()),
			)
		}
		(Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
			left.to_number() == right.to_number()
		}
		_ => strict_equals(left, right),
	}
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
	match (left.to_primitive(), right.to_primitive()) {
		(Value::String(left), Value::String(right)) => Some(left.cmp(&right)),
		(left, right) => left.to_number().partial_cmp(&right.to_number()),
	}
}

fn to_uint32(value: f64) -> u32 {
	if !value.is_finite() {
		return 0;
	}
	value.trunc().rem_euclid(4_294_967_296.0) as u32
}

fn to_int32(value: f64) -> i32 {
	to_uint32(value) as i32
}

fn static_member(object: &str, property: &str) -> Result<Value, String> {
	let value = match (object, property) {
		("Math", "PI") => std::f64::consts::PI,
		("Math", "E") => std::f64::consts::E,
		("Math", "LN2") => std::f64::consts::LN_2,
		("Math", "LN10") => std::f64::consts::LN_10,
		("Math", "SQRT2") => std::f64::consts::SQRT_2,
		("Number", "MAX_SAFE_INTEGER") => 9_007_199_254_740_991.0,
		("Number", "MIN_SAFE_INTEGER") => -9_007_199_254_740_991.0,
		("Number", "EPSILON") => f64::EPSILON,
		("Number", "MAX_VALUE") => f64::MAX,
		("Number", "NaN") => f64::NAN,
		(name, _) if GLOBALS.contains(&name) => return Ok(Value::Undefined),
		(name, _) => return Err(format!("{name} is not defined")),
	};
	Ok(Value::Number(value))
}

fn member(value: &Value, property: &str) -> Result<Value, String> {
	let result = match (value, property) {
		(Value::Null | Value::Undefined, _) => {
			return Err(format!(
				"cannot read properties of {} (reading '{property}')",
				value.to_js_string()
			));
		}
		(Value::String(text), "length") => Value::Number(text.encode_utf16().count() as f64),
		(Value::Regex(regex), "source") => Value::String(regex.source.clone()),
		(Value::Regex(regex), "flags") => Value::String(regex.flags.clone()),
		(Value::Regex(regex), "global") => Value::Boolean(regex.flags.contains('g')),
		(Value::Regex(regex), "ignoreCase") => Value::Boolean(regex.flags.contains('i')),
		(Value::Regex(regex), "multiline") => Value::Boolean(regex.flags.contains('m')),
		_ => Value::Undefined,
	};
	Ok(result)
}

fn argument(arguments: &[Value], index: usize) -> Value {
	arguments.get(index).cloned().unwrap_or(Value::Undefined)
}

fn number_argument(arguments: &[Value], index: usize) -> f64 {
	argument(arguments, index).to_number()
}

fn string_argument(arguments: &[Value], index: usize) -> String {
	argument(arguments, index).to_js_string()
}

fn call_global(name: &str, arguments: &[Value]) -> Result<Value, String> {
	let value = match name {
		"parseInt" => {
			let radix = arguments.get(1).map(Value::to_number);
			Value::Number(parse_int(&string_argument(arguments, 0), radix))
		}
		"parseFloat" => Value::Number(parse_float(&string_argument(arguments, 0))),
		"isNaN" => Value::Boolean(number_argument(arguments, 0).is_nan()),
		"isFinite" => Value::Boolean(number_argument(arguments, 0).is_finite()),
		"String" => {
			Value::String(if arguments.is_empty() {
				String::new()
			} else {
				string_argument(arguments, 0)
			})
		}
		"Number" => {
			Value::Number(if arguments.is_empty() {
				0.0
			} else {
				number_argument(arguments, 0)
			})
		}
		"Boolean" => Value::Boolean(argument(arguments, 0).is_truthy()),
		"Date" => Value::String(Value::Date(DateValue::now()).to_js_string()),
		"RegExp" => {
			let regex = match argument(arguments, 0) {
				Value::Regex(regex) => regex,
				Value::Undefined => RegexValue {
					source: "(?:)".to_string(),
					flags: String::new(),
				},
				other => RegexValue {
					source: other.to_js_string(),
					flags: String::new(),
				},
			};
			let flags = match arguments.get(1) {
				Some(flags) => flags.to_js_string(),
				None => regex.flags,
			};
			let regex = RegexValue {
				source: regex.source,
				flags,
			};
			compile(&regex)?;
			Value::Regex(regex)
		}
		other => return Err(format!("{other} is not a function")),
	};

	Ok(value)
}

fn call_static(object: &str, method: &str, arguments: &[Value]) -> Result<Value, String> {
	let number = |index: usize| number_argument(arguments, index);

	let value = match (object, method) {
		("Math", "floor") => number(0).floor(),
		("Math", "ceil") => number(0).ceil(),
		("Math", "round") => (number(0) + 0.5).floor(),
		("Math", "trunc") => number(0).trunc(),
		("Math", "abs") => number(0).abs(),
		("Math", "sqrt") => number(0).sqrt(),
		("Math", "cbrt") => number(0).cbrt(),
		("Math", "exp") => number(0).exp(),
		("Math", "log") => number(0).ln(),
		("Math", "log2") => number(0).log2(),
		("Math", "log10") => number(0).log10(),
		("Math", "sign") => {
			let value = number(0);
			if value == 0.0 || value.is_nan() { value } else { value.signum() }
		}
		("Math", "pow") => number(0).powf(number(1)),
		("Math", "min") => {
			arguments
				.iter()
				.map(Value::to_number)
				.fold(f64::INFINITY, |min, value| if min.is_nan() || value.is_nan() { f64::NAN } else { min.min(value) })
		}
		("Math", "max") => {
			arguments
				.iter()
				.map(Value::to_number)
				.fold(f64::NEG_INFINITY, |max, value| if max.is_nan() || value.is_nan() { f64::NAN } else { max.max(value) })
		}
		("Date", "now") => DateValue::now().0,
		("Date", "UTC") => DateValue::from_parts(&arguments.iter().map(Value::to_number).collect::<Vec<_>>()).0,
		("Date", "parse") => DateValue::parse(&string_argument(arguments, 0)).0,
		("Number", "isInteger") => {
			let value = argument(arguments, 0);
			return Ok(Value::Boolean(matches!(value, Value::Number(value) if value.is_finite() && value.fract() == 0.0)));
		}
		("Number", "isNaN") => {
			return Ok(Value::Boolean(matches!(argument(arguments, 0), Value::Number(value) if value.is_nan())));
		}
		("Number", "parseInt") => return call_global("parseInt", arguments),
		("Number", "parseFloat") => return call_global("parseFloat", arguments),
		("String", "fromCharCode") => {
			let text: String = arguments
				.iter()
				.filter_map(|value| char::from_u32(to_uint32(value.to_number()) & 0xFFFF))
				.collect();
			return Ok(Value::String(text));
		}
		("JSON", "stringify") => return Ok(json_stringify(&argument(arguments, 0))),
		(name, _) if GLOBALS.contains(&name) => {
			return Err(format!("{name}.{method} is not a function"));
		}
		(name, _) => return Err(format!("{name} is not defined")),
	};

	Ok(Value::Number(value))
}

fn json_stringify(value: &Value) -> Value {
	match value {
		Value::Undefined => Value::Undefined,
		Value::Number(number) if !number.is_finite() => Value::String("null".to_string()),
		Value::Regex(_) => Value::String("{}".to_string()),
		Value::Date(date) => {
			Value::String(
				date.to_iso_string()
					.map_or_else(|| "null".to_string(), |iso| format!("\"{iso}\"")),
			)
		}
		other => Value::String(other.to_literal()),
	}
}

fn call_method(value: &Value, method: &str, arguments: &[Value]) -> Result<Value, String> {
	if matches!(value, Value::Null | Value::Undefined) {
		return Err(format!(
			"cannot read properties of {} (reading '{method}')",
			value.to_js_string()
		));
	}

	match (value, method) {
		(Value::String(text), _) => {
			if let Some(result) = string_method(text, method, arguments)? {
				return Ok(result);
			}
		}
		(Value::Regex(regex), "test") => {
			let compiled = compile(regex)?;
			return Ok(Value::Boolean(compiled.is_match(&string_argument(arguments, 0))));
		}
		(Value::Number(number), "toFixed") => {
			let digits = number_argument(arguments, 0);
			let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
			return Ok(Value::String(format!("{number:.digits$}")));
		}
		(Value::Date(date), "toISOString" | "toJSON") => {
			return match date.to_iso_string() {
				Some(iso) => Ok(Value::String(iso)),
				None if method == "toJSON" => Ok(Value::Null),
				None => Err("invalid time value".to_string()),
			};
		}
		(Value::Date(_), "getTimezoneOffset") => return Ok(Value::Number(0.0)),
		(Value::Date(date), _) => {
			if let Some(component) = date.component(method) {
				return Ok(Value::Number(component));
			}
		}
		_ => {}
	}

	match method {
		"toString" => Ok(Value::String(value.to_js_string())),
		"valueOf" => Ok(value.clone()),
		_ => Err(format!("{method} is not a function")),
	}
}

/// Resolve a possibly negative relative position against `length`.
fn relative_index(position: f64, length: usize) -> usize {
	if position.is_nan() {
		return 0;
	}
	let position = position.trunc();
	if position < 0.0 {
		length.saturating_sub((-position) as usize)
	} else {
		(position as usize).min(length)
	}
}

fn string_method(text: &str, method: &str, arguments: &[Value]) -> Result<Option<Value>, String> {
	let chars: Vec<char> = text.chars().collect();
	let search = || string_argument(arguments, 0);
	let char_index = |byte: usize| text[..byte].chars().count() as f64;
	let substring = |start: usize, end: usize| Value::String(chars[start..end.max(start)].iter().collect());

	let value = match method {
		"trim" => Value::String(text.trim().to_string()),
		"trimStart" | "trimLeft" => Value::String(text.trim_start().to_string()),
		"trimEnd" | "trimRight" => Value::String(text.trim_end().to_string()),
		"toUpperCase" | "toLocaleUpperCase" => Value::String(text.to_uppercase()),
		"toLowerCase" | "toLocaleLowerCase" => Value::String(text.to_lowercase()),
		"indexOf" => Value::Number(text.find(&search()).map_or(-1.0, char_index)),
		"lastIndexOf" => Value::Number(text.rfind(&search()).map_or(-1.0, char_index)),
		"includes" => Value::Boolean(text.contains(&search())),
		"startsWith" => Value::Boolean(text.starts_with(&search())),
		"endsWith" => Value::Boolean(text.ends_with(&search())),
		"charAt" => {
			let position = number_argument(arguments, 0);
			let position = if position.is_nan() { 0.0 } else { position.trunc() };
			let character = (position >= 0.0).then(|| chars.get(position as usize)).flatten();
			Value::String(character.map(ToString::to_string).unwrap_or_default())
		}
		"charCodeAt" => {
			let position = number_argument(arguments, 0);
			let position = if position.is_nan() { 0.0 } else { position.trunc() };
			let character = (position >= 0.0).then(|| chars.get(position as usize)).flatten();
			Value::Number(character.map_or(f64::NAN, |ch| f64::from(u32::from(*ch))))
		}
		"slice" => {
			let start = relative_index(number_argument(arguments, 0), chars.len());
			let end = match arguments.get(1) {
				Some(Value::Undefined) | None => chars.len(),
				Some(end) => relative_index(end.to_number(), chars.len()),
			};
			substring(start, end)
		}
		"substring" => {
			let clamp = |value: f64| if value.is_nan() { 0 } else { value.clamp(0.0, chars.len() as f64) as usize };
			let start = clamp(number_argument(arguments, 0));
			let end = match arguments.get(1) {
				Some(Value::Undefined) | None => chars.len(),
				Some(end) => clamp(end.to_number()),
			};
			substring(start.min(end), start.max(end))
		}
		"repeat" => {
			let count = number_argument(arguments, 0);
			if count < 0.0 || count.is_infinite() {
				return Err("invalid count value".to_string());
			}
			let count = if count.is_nan() || text.is_empty() { 0.0 } else { count.trunc() };
			if count * chars.len() as f64 > MAX_STRING_LENGTH as f64 {
				return Err("invalid string length".to_string());
			}
			Value::String(text.repeat(count as usize))
		}
		"concat" => {
			Value::String(arguments.iter().fold(text.to_string(), |mut joined, value| {
				joined.push_str(&value.to_js_string());
				joined
			}))
		}
		"padStart" | "padEnd" => {
			let target = number_argument(arguments, 0);
			let filler = match arguments.get(1) {
				Some(Value::Undefined) | None => " ".to_string(),
				Some(filler) => filler.to_js_string(),
			};
			let target = if target.is_nan() { 0.0 } else { target.trunc() };
			if target > MAX_STRING_LENGTH as f64 && !filler.is_empty() {
				return Err("invalid string length".to_string());
			}
			let missing = (target as usize).saturating_sub(chars.len());
			let padding: String = filler.chars().cycle().take(if filler.is_empty() { 0 } else { missing }).collect();
			if method == "padStart" {
				Value::String(padding + text)
			} else {
				Value::String(text.to_string() + &padding)
			}
		}
		"replace" => {
			let replacement = string_argument(arguments, 1);
			match argument(arguments, 0) {
				Value::Regex(regex) => {
					let compiled = compile(&regex)?;
					let replacement = replacement.replace("$&", "${0}");
					let replaced = if regex.flags.contains('g') {
						compiled.replace_all(text, replacement.as_str())
					} else {
						compiled.replace(text, replacement.as_str())
					};
					Value::String(replaced.into_owned())
				}
				pattern => Value::String(text.replacen(&pattern.to_js_string(), &replacement, 1)),
			}
		}
		_ => return Ok(None),
	};

	Ok(Some(value))
}

/// Compile a regex literal with the `regex` crate. The `g`, `u` and `y` flags
/// have no effect on matching.
fn compile(regex: &RegexValue) -> Result<Regex, String> {
	RegexBuilder::new(&regex.source)
		.case_insensitive(regex.flags.contains('i'))
		.multi_line(regex.flags.contains('m'))
		.dot_matches_new_line(regex.flags.contains('s'))
		.build()
		.map_err(|error| format!("invalid regular expression /{}/: {error}", regex.source))
}

fn construct_date(arguments: &[Value]) -> DateValue {
	match arguments {
		[] => DateValue::now(),
		[Value::Date(date)] => *date,
		[Value::String(text)] => DateValue::parse(text),
		[single] => {
			let time = single.to_number();
			if time.is_finite() && time.abs() <= 8.64e15 {
				DateValue(time.trunc())
			} else {
				DateValue(f64::NAN)
			}
		}
		parts => DateValue::from_parts(&parts.iter().map(Value::to_number).collect::<Vec<_>>()),
	}
}

fn parse_int(text: &str, radix: Option<f64>) -> f64 {
	let text = text.trim_start();
	let (sign, mut digits) = match text.strip_prefix('-') {
		Some(rest) => (-1.0, rest),
		None => (1.0, text.strip_prefix('+').unwrap_or(text)),
	};

	let mut radix = radix.map_or(0, to_int32);
	let hex_prefix = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X"));
	if radix == 0 || radix == 16 {
		if let Some(rest) = hex_prefix {
			digits = rest;
			radix = 16;
		}
	}
	if radix == 0 {
		radix = 10;
	}
	if !(2..=36).contains(&radix) {
		return f64::NAN;
	}

	let radix = radix.unsigned_abs();
	let mut value = 0.0;
	let mut any = false;
	for digit in digits.chars().map_while(|ch| ch.to_digit(radix)) {
		value = value * f64::from(radix) + f64::from(digit);
		any = true;
	}

	if any { sign * value } else { f64::NAN }
}

fn parse_float(text: &str) -> f64 {
	let text = text.trim_start();
	let bytes = text.as_bytes();
	let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

	if text[end..].starts_with("Infinity") {
		return string_to_number(&text[..end + "Infinity".len()]);
	}

	let digits_start = end;
	let count_digits = |from: usize| bytes[from..].iter().take_while(|byte| byte.is_ascii_digit()).count();
	end += count_digits(end);
	if bytes.get(end) == Some(&b'.') {
		end += 1 + count_digits(end + 1);
	}
	if !text[digits_start..end].bytes().any(|byte| byte.is_ascii_digit()) {
		return f64::NAN;
	}
	if matches!(bytes.get(end), Some(b'e' | b'E')) {
		let mut exponent = end + 1;
		if matches!(bytes.get(exponent), Some(b'+' | b'-')) {
			exponent += 1;
		}
		let digits = count_digits(exponent);
		if digits > 0 {
			end = exponent + digits;
		}
	}

	text[..end].parse::<f64>().unwrap_or(f64::NAN)
}
