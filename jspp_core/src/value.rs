use std::fmt::Display;

use chrono::DateTime;
use chrono::Datelike;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeDelta;
use chrono::Timelike;
use chrono::Utc;
use float_cmp::approx_eq;

/// The result of evaluating an expression.
#[derive(Debug, Clone)]
pub enum Value {
	Undefined,
	Null,
	Boolean(bool),
	Number(f64),
	String(String),
	Regex(RegexValue),
	Date(DateValue),
}

/// A regular expression literal, kept as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexValue {
	pub source: String,
	pub flags: String,
}

/// Milliseconds since the unix epoch, `NaN` for an invalid date. Dates are
/// always interpreted in UTC.
#[derive(Debug, Clone, Copy)]
pub struct DateValue(pub f64);

impl Value {
	/// The `typeof` operator.
	pub fn type_of(&self) -> &'static str {
		match self {
			Value::Undefined => "undefined",
			Value::Boolean(_) => "boolean",
			Value::Number(_) => "number",
			Value::String(_) => "string",
			Value::Null | Value::Regex(_) | Value::Date(_) => "object",
		}
	}

	pub fn is_truthy(&self) -> bool {
		match self {
			Value::Undefined | Value::Null => false,
			Value::Boolean(value) => *value,
			Value::Number(value) => *value != 0.0 && !value.is_nan(),
			Value::String(value) => !value.is_empty(),
			Value::Regex(_) | Value::Date(_) => true,
		}
	}

	pub fn is_object(&self) -> bool {
		matches!(self, Value::Regex(_) | Value::Date(_))
	}

	pub fn to_number(&self) -> f64 {
		match self {
			Value::Undefined | Value::Regex(_) => f64::NAN,
			Value::Null => 0.0,
			Value::Boolean(value) => f64::from(u8::from(*value)),
			Value::Number(value) => *value,
			Value::String(value) => string_to_number(value),
			Value::Date(date) => date.0,
		}
	}

	/// Converts objects to a primitive the way `+` and `==` do.
	pub fn to_primitive(&self) -> Value {
		match self {
			Value::Regex(_) | Value::Date(_) => Value::String(self.to_js_string()),
			other => other.clone(),
		}
	}

	/// The string conversion used by concatenation and `String(value)`.
	pub fn to_js_string(&self) -> String {
		match self {
			Value::Undefined => "undefined".to_string(),
			Value::Null => "null".to_string(),
			Value::Boolean(value) => value.to_string(),
			Value::Number(value) => format_number(*value),
			Value::String(value) => value.clone(),
			Value::Regex(regex) => regex.to_string(),
			Value::Date(date) => date.to_display_string(),
		}
	}

	/// Serialize the value as source text that evaluates back to it. This is
	/// the form stored for defined variables and substituted into code.
	pub fn to_literal(&self) -> String {
		match self {
			Value::Number(value) if value.is_infinite() => "0".to_string(),
			Value::String(value) => {
				serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
			}
			Value::Date(date) => {
				if date.0.is_nan() {
					"new Date(NaN)".to_string()
				} else {
					format!("new Date({})", format_number(date.0))
				}
			}
			other => other.to_js_string(),
		}
	}

	/// Replace `Infinity` and `-Infinity` with `0`.
	#[must_use]
	pub fn normalize_infinity(self) -> Self {
		match self {
			Value::Number(value) if value.is_infinite() => Value::Number(0.0),
			other => other,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
			(Value::Boolean(value), Value::Boolean(other_value)) => value == other_value,
			(Value::Number(value), Value::Number(other_value)) => {
				(value.is_nan() && other_value.is_nan())
					|| approx_eq!(f64, *value, *other_value, ulps = 2)
			}
			(Value::String(value), Value::String(other_value)) => value == other_value,
			(Value::Regex(value), Value::Regex(other_value)) => value == other_value,
			(Value::Date(value), Value::Date(other_value)) => {
				(value.0.is_nan() && other_value.0.is_nan()) || value.0 == other_value.0
			}
			_ => false,
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.to_literal())
	}
}

impl Display for RegexValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "/{}/{}", self.source, self.flags)
	}
}

impl DateValue {
	pub fn now() -> Self {
		Self(Utc::now().timestamp_millis() as f64)
	}

	/// `new Date(year, month, day, hours, minutes, seconds, ms)` with the
	/// month counted from zero. Out of range parts carry over like in
	/// javascript.
	pub fn from_parts(parts: &[f64]) -> Self {
		if parts.iter().any(|part| !part.is_finite()) {
			return Self(f64::NAN);
		}

		let part = |index: usize, default: f64| parts.get(index).copied().unwrap_or(default).trunc();
		let mut year = part(0, 1970.0) as i64;
		if (0..=99).contains(&year) {
			year += 1900;
		}
		let month = part(1, 0.0) as i64;
		year += month.div_euclid(12);

		let Some(first) = i32::try_from(year)
			.ok()
			.and_then(|year| NaiveDate::from_ymd_opt(year, month.rem_euclid(12) as u32 + 1, 1))
		else {
			return Self(f64::NAN);
		};

		let offset = (part(2, 1.0) - 1.0) * 86_400_000.0
			+ part(3, 0.0) * 3_600_000.0
			+ part(4, 0.0) * 60_000.0
			+ part(5, 0.0) * 1_000.0
			+ part(6, 0.0);

		let Some(delta) = TimeDelta::try_milliseconds(offset as i64) else {
			return Self(f64::NAN);
		};
		let midnight = first.and_hms_opt(0, 0, 0).unwrap_or_default();

		match midnight.checked_add_signed(delta) {
			Some(datetime) => Self(datetime.and_utc().timestamp_millis() as f64),
			None => Self(f64::NAN),
		}
	}

	/// Parse the ISO-like formats accepted by `new Date("...")`.
	pub fn parse(text: &str) -> Self {
		let text = text.trim();

		if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
			return Self(datetime.timestamp_millis() as f64);
		}

		for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
			if let Ok(datetime) = NaiveDateTime::parse_from_str(text, format) {
				return Self(datetime.and_utc().timestamp_millis() as f64);
			}
		}

		match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
			Ok(date) => Self(
				date.and_hms_opt(0, 0, 0)
					.map_or(f64::NAN, |datetime| datetime.and_utc().timestamp_millis() as f64),
			),
			Err(_) => Self(f64::NAN),
		}
	}

	fn datetime(self) -> Option<DateTime<Utc>> {
		if self.0.is_nan() {
			return None;
		}
		DateTime::from_timestamp_millis(self.0 as i64)
	}

	/// Value of a `get*` accessor such as `getFullYear`, `None` if the
	/// method doesn't exist.
	pub fn component(self, method: &str) -> Option<f64> {
		let Some(datetime) = self.datetime() else {
			return matches!(
				method,
				"getFullYear"
					| "getMonth" | "getDate"
					| "getDay" | "getHours"
					| "getMinutes" | "getSeconds"
					| "getMilliseconds" | "getTime"
					| "valueOf"
			)
			.then_some(f64::NAN);
		};

		let value = match method {
			"getFullYear" | "getUTCFullYear" => f64::from(datetime.year()),
			"getMonth" | "getUTCMonth" => f64::from(datetime.month0()),
			"getDate" | "getUTCDate" => f64::from(datetime.day()),
			"getDay" | "getUTCDay" => f64::from(datetime.weekday().num_days_from_sunday()),
			"getHours" | "getUTCHours" => f64::from(datetime.hour()),
			"getMinutes" | "getUTCMinutes" => f64::from(datetime.minute()),
			"getSeconds" | "getUTCSeconds" => f64::from(datetime.second()),
			"getMilliseconds" | "getUTCMilliseconds" => f64::from(datetime.timestamp_subsec_millis()),
			"getTime" | "valueOf" => self.0,
			_ => return None,
		};

		Some(value)
	}

	pub fn to_iso_string(self) -> Option<String> {
		self.datetime()
			.map(|datetime| datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
	}

	fn to_display_string(self) -> String {
		match self.datetime() {
			Some(datetime) => datetime.format("%a %b %d %Y %H:%M:%S GMT+0000").to_string(),
			None => "Invalid Date".to_string(),
		}
	}
}

/// Format a number the way javascript prints it.
pub fn format_number(value: f64) -> String {
	if value.is_nan() {
		return "NaN".to_string();
	}
	if value.is_infinite() {
		return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
	}
	if value == 0.0 {
		return "0".to_string();
	}
	if value.abs() >= 1e21 {
		let formatted = format!("{value:e}");
		return match formatted.split_once('e') {
			Some((mantissa, exponent)) if !exponent.starts_with('-') => {
				format!("{mantissa}e+{exponent}")
			}
			_ => formatted,
		};
	}

	format!("{value}")
}

/// `Number("...")` conversion.
pub fn string_to_number(text: &str) -> f64 {
	let text = text.trim();
	if text.is_empty() {
		return 0.0;
	}

	let (sign, unsigned) = match text.as_bytes()[0] {
		b'-' => (-1.0, &text[1..]),
		b'+' => (1.0, &text[1..]),
		_ => (1.0, text),
	};

	if unsigned == "Infinity" {
		return sign * f64::INFINITY;
	}

	let radix = match unsigned.get(..2) {
		Some("0x" | "0X") => Some(16),
		Some("0o" | "0O") => Some(8),
		Some("0b" | "0B") => Some(2),
		_ => None,
	};
	if let Some(radix) = radix {
		// Signed hex, octal and binary strings are not numbers.
		if sign < 0.0 || text.starts_with('+') {
			return f64::NAN;
		}
		return u64::from_str_radix(&unsigned[2..], radix).map_or(f64::NAN, |value| value as f64);
	}

	let valid = unsigned
		.bytes()
		.all(|byte| byte.is_ascii_digit() || matches!(byte, b'.' | b'e' | b'E' | b'+' | b'-'));
	if !valid || unsigned.starts_with(['e', 'E']) {
		return f64::NAN;
	}

	unsigned.parse::<f64>().map_or(f64::NAN, |value| sign * value)
}
