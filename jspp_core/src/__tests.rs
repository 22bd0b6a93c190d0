use std::cell::Cell;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::__fixtures::*;
use super::*;
use crate::expression::substitute;
use crate::lexer::scan;
use crate::resolver::FileContext;
use crate::resolver::InclusionRegistry;
use crate::resolver::display_path;
use crate::resolver::normalize;
use crate::resolver::strip_quotes;

fn run(text: &str) -> Output {
	preprocess_str(text, &Options::default()).unwrap_or_else(|e| panic!("preprocessing failed: {e}"))
}

fn run_with(text: &str, options: &Options) -> Output {
	preprocess_str(text, options).unwrap_or_else(|e| panic!("preprocessing failed: {e}"))
}

fn directive(kind: DirectiveKind, argument: &str, offset: usize) -> Segment<'_> {
	Segment::Directive(Directive {
		kind,
		argument,
		style: DirectiveStyle::Line,
		offset,
	})
}

#[rstest]
#[case::division(
	"a = b / c / d",
	vec![
		Segment::Text("a = b "),
		Segment::Division("/"),
		Segment::Text(" c "),
		Segment::Division("/"),
		Segment::Text(" d"),
	]
)]
#[case::regex_after_operator(
	"x = /ab+c/g.test(y)",
	vec![Segment::Text("x = "), Segment::Regex("/ab+c/g"), Segment::Text(".test(y)")]
)]
#[case::regex_after_return(
	"return /[/]x/",
	vec![Segment::Text("return "), Segment::Regex("/[/]x/")]
)]
#[case::division_after_paren(
	"(a)/2",
	vec![Segment::Text("(a)"), Segment::Division("/"), Segment::Text("2")]
)]
#[case::unterminated_regex(
	"x = / 2\n",
	vec![Segment::Text("x = "), Segment::Text("/"), Segment::Text(" 2\n")]
)]
#[case::string_with_comment(
	r#"a = "it's // not a comment""#,
	vec![Segment::Text("a = "), Segment::String(r#""it's // not a comment""#)]
)]
#[case::escaped_quote(
	r"'a\'b'",
	vec![Segment::String(r"'a\'b'")]
)]
#[case::comments(
	"x /* c */ y // d",
	vec![
		Segment::Text("x "),
		Segment::BlockComment("/* c */"),
		Segment::Text(" y "),
		Segment::LineComment("// d"),
	]
)]
#[case::directive(
	"//#if A\nfoo\n",
	vec![directive(DirectiveKind::If, " A", 0), Segment::Text("foo\n")]
)]
#[case::indented_directive(
	"a\n  //#endif\nb",
	vec![Segment::Text("a\n"), directive(DirectiveKind::Endif, "", 2), Segment::Text("b")]
)]
#[case::space_before_hash(
	"// #if A\n",
	vec![Segment::LineComment("// #if A"), Segment::Text("\n")]
)]
#[case::keyword_boundary(
	"//#ifxyz\n",
	vec![Segment::LineComment("//#ifxyz"), Segment::Text("\n")]
)]
#[case::not_at_line_start(
	"x //#if A\n",
	vec![Segment::Text("x "), Segment::LineComment("//#if A"), Segment::Text("\n")]
)]
#[case::include_once(
	"//#include_once \"a\"\n",
	vec![directive(DirectiveKind::IncludeOnce, " \"a\"", 0)]
)]
#[case::block_directive_not_conditional(
	"/*#define X*/\n",
	vec![Segment::BlockComment("/*#define X*/"), Segment::Text("\n")]
)]
fn scan_segments(#[case] input: &str, #[case] expected: Vec<Segment<'_>>) {
	assert_eq!(scan(input), expected);
}

#[test]
fn scan_block_directive() {
	let segments = scan("/*#if DEBUG*/ code\n");
	assert_eq!(
		segments,
		vec![
			Segment::Directive(Directive {
				kind: DirectiveKind::If,
				argument: " DEBUG",
				style: DirectiveStyle::Block,
				offset: 0,
			}),
			Segment::Text("code\n"),
		]
	);
}

#[rstest]
#[case::plain(" A ", "A")]
#[case::trailing_comment(" A && B // why", "A && B")]
#[case::quoted_slashes(r#" "http://example.com" // url"#, r#""http://example.com""#)]
fn directive_expression(#[case] argument: &str, #[case] expected: &str) {
	let directive = Directive {
		kind: DirectiveKind::If,
		argument,
		style: DirectiveStyle::Line,
		offset: 0,
	};
	assert_eq!(directive.expression(), expected);
}

#[rstest]
#[case::addition("1 + 2", Value::Number(3.0))]
#[case::concatenation("'a' + 1", Value::String("a1".into()))]
#[case::division_by_zero("5/0", Value::Number(0.0))]
#[case::negative_infinity("-5/0", Value::Number(0.0))]
#[case::not_a_number("0/0", Value::Number(f64::NAN))]
#[case::double_negation("2--1", Value::Number(3.0))]
#[case::typeof_number("typeof 1", Value::String("number".into()))]
#[case::typeof_undefined("typeof undefined", Value::String("undefined".into()))]
#[case::typeof_unknown("typeof foo", Value::String("undefined".into()))]
#[case::not("!0", Value::Boolean(true))]
#[case::and("1 < 2 && 'b' > 'a'", Value::Boolean(true))]
#[case::or("0 || 'x'", Value::String("x".into()))]
#[case::nullish("null ?? 4", Value::Number(4.0))]
#[case::ternary("1 ? 'y' : 'n'", Value::String("y".into()))]
#[case::exponent("2 ** 3 ** 2", Value::Number(512.0))]
#[case::remainder("7 % 3", Value::Number(1.0))]
#[case::bitwise("1 << 4 | 1", Value::Number(17.0))]
#[case::unsigned_shift("-1 >>> 28", Value::Number(15.0))]
#[case::hex("0x1F", Value::Number(31.0))]
#[case::exponent_literal("1.5e2", Value::Number(150.0))]
#[case::length("'abc'.length", Value::Number(3.0))]
#[case::trim("'  x '.trim()", Value::String("x".into()))]
#[case::index_of("'abc'.indexOf('c')", Value::Number(2.0))]
#[case::slice("'abcdef'.slice(1, -2)", Value::String("bcd".into()))]
#[case::regex_test("/a+/i.test('AAA')", Value::Boolean(true))]
#[case::loose_equality("'1' == 1", Value::Boolean(true))]
#[case::strict_equality("'1' === 1", Value::Boolean(false))]
#[case::null_undefined("null == undefined", Value::Boolean(true))]
#[case::nan_inequality("NaN == NaN", Value::Boolean(false))]
#[case::parse_int("parseInt('42px')", Value::Number(42.0))]
#[case::parse_int_radix("parseInt('ff', 16)", Value::Number(255.0))]
#[case::parse_float("parseFloat('3.5e1x')", Value::Number(35.0))]
#[case::math("Math.max(1, 5, 3) + Math.floor(1.7)", Value::Number(6.0))]
#[case::string_call("String(12.5)", Value::String("12.5".into()))]
#[case::date_year("new Date(2015, 9, 10).getFullYear()", Value::Number(2015.0))]
#[case::date_month_overflow("new Date(2015, 12, 1).getFullYear()", Value::Number(2016.0))]
#[case::date_time("new Date(0).getTime()", Value::Number(0.0))]
#[case::date_parse("new Date('2015-10-10').getDate()", Value::Number(10.0))]
#[case::typeof_date("typeof new Date(0)", Value::String("object".into()))]
#[case::instanceof("new Date(0) instanceof Date", Value::Boolean(true))]
#[case::undefined_variable("UNDEFINED_NAME + 1", Value::Number(1.0))]
#[case::not_defined("defined(FOO)", Value::Number(0.0))]
#[case::to_fixed("(1.005).toFixed(1)", Value::String("1.0".into()))]
#[case::json("JSON.stringify('a\"b')", Value::String(r#""a\"b""#.into()))]
#[case::repeat_empty_string("''.repeat(1e20)", Value::String(String::new()))]
#[case::pad_with_empty_filler("'a'.padStart(1e20, '')", Value::String("a".into()))]
fn evaluate_expressions(#[case] expression: &str, #[case] expected: Value) -> JsppResult<()> {
	let variables = VariableSet::new();
	assert_eq!(evaluate(expression, &variables)?, expected);

	Ok(())
}

#[rstest]
#[case::incomplete("1 +")]
#[case::unknown_identifier("foo")]
#[case::unterminated_string("'abc")]
#[case::unknown_method("'a'.nope()")]
#[case::null_member("null.length")]
#[case::empty("  ")]
#[case::huge_repeat("'a'.repeat(1e20)")]
#[case::huge_pad_start("'a'.padStart(1e20, 'b')")]
#[case::huge_pad_end("'a'.padEnd(2e9)")]
fn evaluate_failures(#[case] expression: &str) {
	let variables = VariableSet::new();
	let result = evaluate(expression, &variables);
	assert!(
		matches!(result, Err(JsppError::Evaluation { .. })),
		"expected an evaluation error for `{expression}`, got {result:?}"
	);
}

#[test]
fn nesting_within_the_limit() -> JsppResult<()> {
	let variables = VariableSet::new();
	let parenthesized = format!("{}1{}", "(".repeat(40), ")".repeat(40));
	assert_eq!(evaluate(&parenthesized, &variables)?, Value::Number(1.0));
	let negated = format!("{}1", "!".repeat(40));
	assert_eq!(evaluate(&negated, &variables)?, Value::Boolean(true));

	Ok(())
}

#[rstest]
#[case::parentheses(format!("{}1{}", "(".repeat(100), ")".repeat(100)))]
#[case::many_parentheses(format!("{}1{}", "(".repeat(5000), ")".repeat(5000)))]
#[case::negations(format!("{}1", "!".repeat(100)))]
#[case::calls(format!("{}1{}", "Math.abs(".repeat(100), ")".repeat(100)))]
#[case::operator_chain(format!("1{}", " + 1".repeat(1000)))]
fn deeply_nested_conditions_are_recovered(#[case] expression: String) {
	let output = run(&format!("//#if {expression}\nyes\n//#endif\nafter\n"));
	assert_eq!(output.text, "after\n");
	assert_eq!(output.diagnostics.len(), 1);
	assert!(matches!(
		output.diagnostics[0].error,
		JsppError::Evaluation { .. }
	));
}

#[test]
fn huge_strings_are_recovered() {
	let output = run("//#define $_S 'a'.repeat(1e20)\n//#if 'a'.padStart(1e20)\nyes\n//#endif\n$_S\n");
	assert_eq!(output.text, "0\n");
	assert_eq!(output.diagnostics.len(), 2);
	assert!(
		output
			.diagnostics
			.iter()
			.all(|diagnostic| diagnostic.error.to_string().contains("invalid string length"))
	);
}

#[test]
fn evaluation_error_names_both_texts() {
	let mut variables = VariableSet::new();
	variables
		.define("FOO", "2")
		.unwrap_or_else(|e| panic!("define failed: {e}"));

	let (expression, substituted) = match evaluate("FOO +", &variables) {
		Err(JsppError::Evaluation {
			expression,
			substituted,
			..
		}) => (expression, substituted),
		other => panic!("expected an evaluation error, got {other:?}"),
	};

	assert_eq!(expression, "FOO +");
	assert_eq!(substituted, "2 +");
}

#[rstest]
#[case::defined("FOO * 2 + defined(FOO) + defined(BAR)", "2 * 2 + 1 + 0")]
#[case::strings(r#""FOO" + FOO"#, r#""FOO" + 2"#)]
#[case::member("Math.FOO", "Math.FOO")]
#[case::regex("/FOO/.test(FOO)", "/FOO/.test(2)")]
#[case::undefined("BAR", "0")]
#[case::lowercase("foo", "foo")]
#[case::globals("JSON.stringify(FOO)", "JSON.stringify(2)")]
fn substitute_variables(#[case] expression: &str, #[case] expected: &str) -> JsppResult<()> {
	let mut variables = VariableSet::new();
	variables.define("FOO", "2")?;
	let substituted = substitute(expression, &variables).unwrap_or_else(|e| panic!("{e}"));
	assert_eq!(substituted, expected);

	Ok(())
}

#[rstest]
#[case::empty("", "1")]
#[case::number("2 * 3", "6")]
#[case::string("'a' + 'b'", r#""ab""#)]
#[case::quotes(r#"'say "hi"'"#, r#""say \"hi\"""#)]
#[case::regex(r"/\n+/", r"/\n+/")]
#[case::date("new Date(0)", "new Date(0)")]
#[case::null("null", "null")]
#[case::undefined("undefined", "undefined")]
#[case::not_a_number("NaN", "NaN")]
#[case::infinity("1/0", "0")]
#[case::boolean("1 > 0", "true")]
fn define_stores_literals(#[case] expression: &str, #[case] expected: &str) -> JsppResult<()> {
	let mut variables = VariableSet::new();
	variables.define("NAME", expression)?;
	assert_eq!(variables.get("NAME"), Some(expected));

	Ok(())
}

#[rstest]
#[case::lowercase("lower")]
#[case::leading_digit("1ABC")]
#[case::dash("A-B")]
#[case::empty("")]
fn define_rejects_invalid_names(#[case] name: &str) {
	let mut variables = VariableSet::new();
	let result = variables.define(name, "1");
	assert!(matches!(result, Err(JsppError::InvalidIdentifier { .. })));
	assert!(matches!(
		variables.undefine(name),
		Err(JsppError::InvalidIdentifier { .. })
	));
}

#[test]
fn define_with_failing_expression_stores_zero() {
	let mut variables = VariableSet::new();
	let result = variables.define("BROKEN", "1 +");
	assert!(matches!(result, Err(JsppError::Evaluation { .. })));
	assert_eq!(variables.get("BROKEN"), Some("0"));
}

#[test]
fn variable_round_trip() -> JsppResult<()> {
	let mut variables = VariableSet::new();
	variables.define("$_A", "'x'")?;
	assert!(variables.is_defined("$_A"));
	assert_eq!(evaluate("$_A + $_A", &variables)?, Value::String("xx".into()));

	assert!(variables.undefine("$_A")?);
	assert!(!variables.undefine("$_A")?);
	assert!(!variables.is_defined("$_A"));
	assert_eq!(evaluate("$_A", &variables)?, Value::Number(0.0));

	Ok(())
}

#[test]
fn current_file_variable() -> JsppResult<()> {
	let mut variables = VariableSet::new();
	variables.set_current_file("lib/a.js");
	assert_eq!(variables.current_file(), "lib/a.js");
	assert_eq!(variables.get("__FILE"), Some(r#""lib/a.js""#));
	assert_eq!(evaluate("__FILE + '!'", &variables)?, Value::String("lib/a.js!".into()));
	assert_eq!(variables.expand_text("// __FILE, __FILENAME", false), "// lib/a.js, __FILENAME");

	Ok(())
}

#[rstest]
#[case::code("log($_A, $_B)", true, r#"log("a", $_B)"#)]
#[case::not_code("log($_A)", false, "log($_A)")]
#[case::word_boundary("x$_A $_AB", true, "x$_A $_AB")]
fn expand_text(#[case] text: &str, #[case] code: bool, #[case] expected: &str) -> JsppResult<()> {
	let mut variables = VariableSet::new();
	variables.define("$_A", "'a'")?;
	assert_eq!(variables.expand_text(text, code), expected);

	Ok(())
}

#[test]
fn conditional_transitions() -> JsppResult<()> {
	let mut stack = ConditionalStack::new();
	assert!(stack.is_working());
	assert!(stack.is_balanced());

	stack.open(|| false);
	assert_eq!(stack.top().state, BlockState::Testing);
	stack.elif(|| false)?;
	assert_eq!(stack.top().state, BlockState::Testing);
	stack.elif(|| true)?;
	assert_eq!(stack.top().state, BlockState::Working);
	stack.elif(|| true)?;
	assert_eq!(stack.top().state, BlockState::Ending);
	stack.otherwise()?;
	assert_eq!(
		stack.top(),
		ConditionalFrame {
			kind: BlockKind::Else,
			state: BlockState::Ending,
		}
	);
	stack.close()?;
	assert!(stack.is_balanced());

	stack.open(|| false);
	stack.otherwise()?;
	assert!(stack.is_working());
	stack.close()?;

	Ok(())
}

#[test]
fn conditional_nested_in_suppressed_block() -> JsppResult<()> {
	let evaluated = Cell::new(false);
	let mut stack = ConditionalStack::new();

	stack.open(|| false);
	stack.open(|| {
		evaluated.set(true);
		true
	});
	assert_eq!(stack.top().state, BlockState::Ending);
	stack.elif(|| {
		evaluated.set(true);
		true
	})?;
	stack.otherwise()?;
	assert!(!stack.is_working());
	assert!(!evaluated.get());
	assert_eq!(stack.depth(), 3);

	stack.close()?;
	stack.close()?;
	assert!(stack.is_balanced());

	Ok(())
}

#[test]
fn conditional_precondition_violations() {
	let mut stack = ConditionalStack::new();
	assert!(matches!(
		stack.close(),
		Err(JsppError::UnexpectedDirective { directive }) if directive == "endif"
	));
	assert!(matches!(
		stack.elif(|| true),
		Err(JsppError::UnexpectedDirective { directive }) if directive == "elif"
	));
	assert!(matches!(
		stack.otherwise(),
		Err(JsppError::UnexpectedDirective { directive }) if directive == "else"
	));
	assert!(stack.is_balanced());

	stack.open(|| true);
	assert!(stack.otherwise().is_ok());
	assert!(stack.otherwise().is_err());
	assert!(stack.elif(|| true).is_err());
	assert_eq!(
		stack.top(),
		ConditionalFrame {
			kind: BlockKind::Else,
			state: BlockState::Ending,
		}
	);
}

#[rstest]
#[case::scenario_define_ifdef("//#define FOO\n//#ifdef FOO\n1\n//#endif", "1\n")]
#[case::scenario_quoted_substitution("//#define $_FOO \"foo\"\nlog($_FOO)", "log(\"foo\")")]
#[case::scenario_division_by_zero("//#if 5/0\nno\n//#else\nyes\n//#endif", "yes\n")]
#[case::elif_chain(
	"//#define V 2\n//#if V == 1\none\n//#elif V == 2\ntwo\n//#elif V == 2\nagain\n//#else\nother\n//#endif\n",
	"two\n"
)]
#[case::ifndef("//#ifndef X\nx\n//#endif\n", "x\n")]
#[case::nested_false_parent("//#if 0\n//#if 1\na\n//#endif\n//#else\nb\n//#endif\n", "b\n")]
#[case::indented_nested("//#if 1\n  //#if 1\n  a\n  //#endif\n//#endif\n", "  a\n")]
#[case::undef("//#define A\n//#undef A\n//#ifdef A\nyes\n//#endif\nno\n", "no\n")]
#[case::set_unset("//#set A 1\n//#unset A\n//#if !defined(A)\nunset\n//#endif\n", "unset\n")]
#[case::undefined_code_variable("log($_FOO)", "log($_FOO)")]
#[case::directive_in_string("s = \"//#if 0\"\nok\n", "s = \"//#if 0\"\nok\n")]
#[case::space_before_hash("// #if 0\nok\n", "\nok\n")]
#[case::block_directive("/*#if 0*/ hidden\n/*#endif*/ shown\n", "shown\n")]
#[case::regex_variable("//#set $_RE /a+/\n//#set $_T $_RE.test('baa')\n($_T, $_RE)", "(true, /a+/)")]
#[case::date_variable("//#set $_D new Date(2015, 9, 10)\n//#set $_Y $_D.getFullYear()\n$_Y", "2015")]
#[case::concatenation("//#set $_A 'A'\n//#set $_B $_A + '.' + $_A + '.' + $_A\n$_B", "\"A.A.A\"")]
#[case::null_undefined_nan(
	"//#set $_X null\n//#set $_U undefined\n//#set $_N NaN\n($_X,$_U,$_N)",
	"(null,undefined,NaN)"
)]
#[case::infinities("//#set $_I 1/0\n//#set $_J -1/0\n$_I-$_J", "0-0")]
#[case::sum("//#set $_V 1 + 2\n$_V", "3")]
#[case::code_variable_after_dot("//#set $_V 1\nobj.$_V", "obj.1")]
#[case::crlf("a\r\nb\r\n", "a\nb\n")]
#[case::trailing_whitespace("a  \nb\t\n", "a\nb\n")]
#[case::empty_lines("a\n\n\n\nb\n", "a\n\nb\n")]
fn preprocess_text(#[case] input: &str, #[case] expected: &str) {
	let output = run(input);
	assert_eq!(output.text, expected);
	assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
}

#[rstest]
#[case::all(CommentMode::All, "/* @license MIT */\n/* drop */x // tail\ny\n")]
#[case::filter(CommentMode::Filter, "/* @license MIT */\n x\ny\n")]
#[case::none(CommentMode::None, "\n x\ny\n")]
fn comment_modes(#[case] mode: CommentMode, #[case] expected: &str) {
	let options = Options {
		comments: mode,
		..Options::default()
	};
	let output = run_with("/* @license MIT */\n/* drop */x // tail\ny\n", &options);
	assert_eq!(output.text, expected);
}

#[test]
fn directive_lines_never_reach_the_output() {
	let options = Options {
		comments: CommentMode::All,
		..Options::default()
	};
	let output = run_with("//#define A\n// kept\n//#ifdef A\na\n//#endif\n", &options);
	assert_eq!(output.text, "// kept\na\n");
}

#[rstest]
#[case::unlimited(-1, "a\n\n\n\nb\n")]
#[case::below_unlimited(-7, "a\n\n\n\nb\n")]
#[case::none(0, "a\nb\n")]
#[case::two(2, "a\n\n\nb\n")]
fn empty_line_budget(#[case] empty_lines: i64, #[case] expected: &str) {
	let options = Options {
		empty_lines,
		..Options::default()
	};
	assert_eq!(run_with("a\n\n\n\nb\n", &options).text, expected);
}

#[test]
fn windows_line_endings() {
	let options = Options {
		eol_type: EolType::Win,
		..Options::default()
	};
	assert_eq!(run_with("a\n\n\nb\n", &options).text, "a\r\n\r\nb\r\n");
}

#[test]
fn header_for_the_top_level_source() {
	let options = Options {
		header1: "// generated^".to_string(),
		..Options::default()
	};
	assert_eq!(run_with("code\n", &options).text, "// generated\ncode\n");
}

#[test]
fn recovered_diagnostics_carry_lines() {
	let output = run("x\n//#endif\n//#if\ny\n//#endif\n//#define lower 1\n//#if 1 +\nz\n//#endif\nw\n");
	assert_eq!(output.text, "x\nw\n");

	let found: Vec<(usize, &'static str)> = output
		.diagnostics
		.iter()
		.map(|diagnostic| {
			let kind = match diagnostic.error {
				JsppError::UnexpectedDirective { .. } => "unexpected",
				JsppError::MissingExpression { .. } => "missing",
				JsppError::InvalidIdentifier { .. } => "identifier",
				JsppError::Evaluation { .. } => "evaluation",
				_ => "other",
			};
			(diagnostic.line, kind)
		})
		.collect();

	assert_eq!(
		found,
		vec![
			(2, "unexpected"),
			(3, "missing"),
			(6, "identifier"),
			(7, "evaluation"),
		]
	);
}

#[test]
fn unexpected_expression_is_reported_and_applied() {
	let output = run("//#if 1\na\n//#else junk\nb\n//#endif\n");
	assert_eq!(output.text, "a\n");
	assert_eq!(output.diagnostics.len(), 1);
	assert!(matches!(
		output.diagnostics[0].error,
		JsppError::UnexpectedExpression { .. }
	));
}

#[test]
fn unclosed_block_is_terminal() {
	let result = preprocess_str("//#if 1\na\n", &Options::default());
	assert!(matches!(result, Err(JsppError::UnclosedBlock { .. })));
}

#[test]
fn strict_mode_stops_at_the_first_error() {
	let options = Options {
		strict: true,
		..Options::default()
	};
	let result = preprocess_str("a\n//#endif\nb\n", &options);
	assert!(matches!(result, Err(JsppError::UnexpectedDirective { .. })));
}

#[test]
fn initial_definitions() {
	let options = Options {
		define: vec!["A".into(), "$_B='b'".into(), "C 1 + 1".into()],
		undef: vec!["A".into()],
		..Options::default()
	};
	let output = run_with("//#ifndef A\n$_B\n//#endif\n//#if C == 2\nc\n//#endif\n", &options);
	assert_eq!(output.text, "\"b\"\nc\n");
}

#[test]
fn invalid_options_fail_before_processing() {
	let options = Options {
		filter: vec!["nope".into()],
		..Options::default()
	};
	assert!(matches!(
		preprocess_str("a", &options),
		Err(JsppError::InvalidOption { .. })
	));
}

#[test]
fn include_without_trailing_newlines() -> JsppResult<()> {
	let output = run_main(
		&[
			("main.js", "hi\n//#include a\nbye\n//#include noeol"),
			("a.js", "A"),
			("noeol.js", "noEol"),
		],
		&bare_options(),
	)?;
	assert_eq!(output.text, "hi\nA\nbye\nnoEol");

	Ok(())
}

#[test]
fn consecutive_includes_are_separated() -> JsppResult<()> {
	let options = Options {
		empty_lines: 0,
		..bare_options()
	};
	let output = run_main(
		&[
			("main.js", "//#include a\n//#include b\nok"),
			("a.js", "noEol"),
			("b.js", "noEol"),
		],
		&options,
	)?;
	assert_eq!(output.text, "noEol\nnoEol\nok");

	Ok(())
}

#[test]
#[traced_test]
fn recursive_include_is_ignored() {
	let output = run_main(
		&[
			("main.js", "//#include a\nend\n"),
			("a.js", "//#include \"a.js\"\nA\n"),
		],
		&bare_options(),
	)
	.unwrap_or_else(|e| panic!("preprocessing failed: {e}"));
	assert_eq!(output.text, "// ignored a.js\nA\nend\n");
	assert!(logs_contain("skip recursive include"));
}

#[rstest]
#[case::once_twice("//#include_once a\n//#include_once a\n//#include a\n", "A\n")]
#[case::plain_then_once("//#include a\n//#include_once a\n//#include a\n", "A\nA\n")]
fn include_registry(#[case] main: &str, #[case] expected: &str) -> JsppResult<()> {
	let output = run_main(&[("main.js", main), ("a.js", "A\n")], &bare_options())?;
	assert_eq!(output.text, expected);

	Ok(())
}

#[test]
fn include_headers() -> JsppResult<()> {
	let output = run_main(
		&[("main.js", "x\n//#include a\n"), ("a.js", "A\n")],
		&Options::default(),
	)?;
	assert_eq!(output.text, "x\n\n//// a.js\n\nA\n");

	Ok(())
}

#[test]
fn include_indentation() -> JsppResult<()> {
	let options = Options {
		indent: "2".to_string(),
		..bare_options()
	};
	let output = run_main(
		&[("main.js", "x\n//#include a\ny\n"), ("a.js", "A\nB\n")],
		&options,
	)?;
	assert_eq!(output.text, "x\n  A\n  B\ny\n");

	Ok(())
}

#[test]
fn indent_directive() -> JsppResult<()> {
	let output = run_main(
		&[("main.js", "//#indent 1t\n//#include a\n"), ("a.js", "A\n")],
		&bare_options(),
	)?;
	assert_eq!(output.text, "\tA\n");

	Ok(())
}

#[test]
fn includes_resolve_against_the_including_file() -> JsppResult<()> {
	let output = run_main(
		&[
			("main.js", "//#include lib/a\n"),
			("lib/a.js", "//#include \"b\"\n"),
			("lib/b.js", "B __FILE\n"),
		],
		&bare_options(),
	)?;
	assert_eq!(output.text, "B lib/b.js\n");

	Ok(())
}

#[test]
fn file_name_in_strings_and_comments() -> JsppResult<()> {
	let options = Options {
		comments: CommentMode::All,
		..bare_options()
	};
	let output = run_main(&[("main.js", "f = '__FILE' // __FILE\n")], &options)?;
	assert_eq!(output.text, "f = 'main.js' // main.js\n");

	Ok(())
}

#[test]
fn variables_cross_include_boundaries() -> JsppResult<()> {
	let output = run_main(
		&[
			("main.js", "//#include defs\n//#if LEVEL > 1\n$_NAME\n//#endif\n"),
			("defs.js", "//#define LEVEL 2\n//#define $_NAME 'jspp'\n"),
		],
		&bare_options(),
	)?;
	assert_eq!(output.text, "\"jspp\"\n");

	Ok(())
}

#[test]
fn missing_include_file_is_terminal() {
	let result = run_main(&[("main.js", "a\n//#include nope\nb\n")], &bare_options());
	assert!(matches!(result, Err(JsppError::ReadFile { .. })));
}

#[test]
fn missing_top_level_file_uses_the_display_path() {
	let dir = fixture_dir(&[]);
	let result = run_in(dir.path(), Source::File(dir.path().join("nope.js")), &bare_options());
	match result {
		Err(JsppError::ReadFile { path, .. }) => assert_eq!(path, "nope.js"),
		other => panic!("expected a read error, got {other:?}"),
	}
}

#[test]
fn top_level_file_gets_the_default_extension() -> JsppResult<()> {
	let dir = fixture_dir(&[("main.js", "m\n")]);
	let output = run_in(dir.path(), Source::File("main".into()), &bare_options())?;
	assert_eq!(output.text, "m\n");

	Ok(())
}

#[test]
fn empty_lines_across_include_boundaries() -> JsppResult<()> {
	let options = Options {
		empty_lines: 1,
		..bare_options()
	};
	let output = run_main(
		&[
			("main.js", "x\n\n\n//#include a\n\n\n\ny\n"),
			("a.js", "\n\n\nA\n\n\n\n"),
		],
		&options,
	)?;
	assert_eq!(output.text, "x\n\nA\n\ny\n");

	Ok(())
}

#[test]
fn missing_filename_is_recovered() -> JsppResult<()> {
	let output = run_main(&[("main.js", "//#include \"\"\na\n")], &bare_options())?;
	assert_eq!(output.text, "a\n");
	assert!(matches!(output.diagnostics[0].error, JsppError::MissingFilename));

	Ok(())
}

#[test]
fn unclosed_block_in_included_file() {
	let result = run_main(
		&[("main.js", "//#include a\n"), ("a.js", "//#if 1\n")],
		&bare_options(),
	);
	assert!(matches!(
		result,
		Err(JsppError::UnclosedBlock { file }) if file == "a.js"
	));
}

#[test]
fn blocks_do_not_cross_file_boundaries() -> JsppResult<()> {
	let output = run_main(
		&[
			("main.js", "//#if 1\n//#include a\n//#endif\n"),
			("a.js", "//#endif\nA\n"),
		],
		&bare_options(),
	)?;
	assert_eq!(output.text, "A\n");
	assert!(matches!(
		output.diagnostics[0].error,
		JsppError::UnexpectedDirective { .. }
	));
	assert_eq!(output.diagnostics[0].file, "a.js");

	Ok(())
}

#[test]
fn multiple_files() -> JsppResult<()> {
	let dir = fixture_dir(&[("a.js", "A\n"), ("b.js", "B\n")]);
	let source = Source::Files(vec![dir.path().join("a.js"), dir.path().join("b.js")]);
	let output = run_in(dir.path(), source, &bare_options())?;
	assert_eq!(output.text, "A\nB\n");

	Ok(())
}

#[test]
fn reader_source() -> JsppResult<()> {
	let dir = fixture_dir(&[]);
	let reader = std::io::Cursor::new(b"//#define A\n//#ifdef A\nr\n//#endif\n".to_vec());
	let output = run_in(dir.path(), Source::Reader(Box::new(reader)), &bare_options())?;
	assert_eq!(output.text, "r\n");

	Ok(())
}

#[rstest]
#[case::budget_one(Some(1), &["a\n\n", "\n\nb"], "a\n\nb")]
#[case::budget_zero(Some(0), &["a\n", "\n", "\nb\n"], "a\nb\n")]
#[case::unlimited(None, &["a\n\n", "\n\nb"], "a\n\n\n\nb")]
#[case::leading(Some(2), &["\n\n\n\n1\n\n\n\n2\n\n\n\n"], "\n\n1\n\n\n2\n\n\n")]
#[case::unchanged(Some(2), &["\n1\n\n2\n\n"], "\n1\n\n2\n\n")]
#[case::leading_across_chunks(Some(1), &["\n", "\n\n", "a\n"], "\na\n")]
#[case::leading_without_budget(Some(0), &["\n\n", "a"], "a")]
#[case::whitespace_across_chunks(Some(1), &["a ", "b  ", "\n"], "a b\n")]
fn compactor_chunks(#[case] budget: Option<usize>, #[case] chunks: &[&str], #[case] expected: &str) {
	let mut compactor = Compactor::new(EolType::Unix, budget);
	let mut output = String::new();
	for chunk in chunks {
		output.push_str(&compactor.write(chunk));
	}
	compactor.finish();
	assert_eq!(output, expected);
}

#[rstest]
#[case(Some(0), "a\nb\nc\n")]
#[case(Some(1), "a\n\nb\nc\n\n")]
#[case(Some(3), "\na\n\n\n\nb\n")]
#[case(None, "\n\n\na\n\n\n\n\n\nb")]
fn compaction_is_idempotent(#[case] budget: Option<usize>, #[case] text: &str) {
	let once = compact(text, EolType::Unix, budget);
	assert_eq!(once, text);
	assert_eq!(compact(&once, EolType::Unix, budget), once);
}

#[test]
fn compactor_forces_line_end_on_swap() {
	let mut compactor = Compactor::new(EolType::Win, Some(0));
	assert_eq!(compactor.swap(String::new()), "");
	assert_eq!(compactor.write("x"), "x");
	assert_eq!(compactor.swap("  ".into()), "\r\n");
	assert_eq!(compactor.swap("  ".into()), "");
	assert_eq!(compactor.write("y\n\n"), "  y\r\n");
	assert_eq!(compactor.last_char(), Some('\n'));
	assert_eq!(compactor.state().newline_run, 2);
}

#[test]
fn compact_mac_line_endings() {
	assert_eq!(compact("a\n\n\nb", EolType::Mac, Some(1)), "a\r\rb");
}

#[rstest]
#[case::license("/* @license MIT */", true)]
#[case::jsdoc("/** @param x */", false)]
#[case::plain("// hello", false)]
fn default_comment_filter(#[case] comment: &str, #[case] kept: bool) -> JsppResult<()> {
	let filter = Options::default().comment_filter()?;
	assert_eq!(filter.keep(comment), kept);

	Ok(())
}

#[rstest]
#[case::jsdoc("jsdoc", "/** @param x */")]
#[case::jslint("jslint", "/*jslint node: true */")]
#[case::jshint("jshint", "/* jshint strict: true */")]
#[case::eslint("eslint", "// eslint-disable-line")]
#[case::all("all", "/* global window */")]
fn named_comment_filters(#[case] name: &str, #[case] comment: &str) -> JsppResult<()> {
	let filter = CommentFilter::new(CommentMode::Filter, &[name.to_string()], &[])?;
	assert!(filter.keep(comment));
	assert!(!filter.keep("/* nothing special */"));

	Ok(())
}

#[test]
fn comment_filter_names() -> JsppResult<()> {
	let names = expand_filter_names(&["jsdoc,license".to_string(), "all".to_string()])?;
	assert_eq!(names, vec!["jsdoc", "license", "jslint", "jshint", "eslint"]);
	assert!(matches!(
		expand_filter_names(&["nope".to_string()]),
		Err(JsppError::InvalidOption { .. })
	));

	Ok(())
}

#[test]
fn custom_comment_filters() -> JsppResult<()> {
	let filter = CommentFilter::new(CommentMode::Filter, &[], &["@module".to_string()])?;
	assert_eq!(filter.apply("/* @module x */"), "/* @module x */");
	assert_eq!(filter.apply("/* other */"), " ");
	assert_eq!(filter.apply("// other"), "");
	assert!(matches!(
		CommentFilter::new(CommentMode::Filter, &[], &["(".to_string()]),
		Err(JsppError::InvalidOption { .. })
	));

	Ok(())
}

#[rstest]
#[case::spaces("2", IndentSpec { width: 2, unit: IndentUnit::Space })]
#[case::explicit_spaces("3 s", IndentSpec { width: 3, unit: IndentUnit::Space })]
#[case::tabs("1t", IndentSpec { width: 1, unit: IndentUnit::Tab })]
#[case::empty("", IndentSpec::default())]
fn indent_specs(#[case] input: &str, #[case] expected: IndentSpec) -> JsppResult<()> {
	assert_eq!(input.parse::<IndentSpec>()?, expected);

	Ok(())
}

#[rstest]
#[case::word("x")]
#[case::unit_only("t")]
#[case::unknown_unit("2x")]
fn invalid_indent_specs(#[case] input: &str) {
	assert!(matches!(
		input.parse::<IndentSpec>(),
		Err(JsppError::InvalidOption { .. })
	));
}

#[test]
fn indent_for_level() {
	let spec = IndentSpec {
		width: 2,
		unit: IndentUnit::Tab,
	};
	assert_eq!(spec.for_level(0), "");
	assert_eq!(spec.for_level(2), "\t\t\t\t");
}

#[rstest]
#[case::equals("A=1", ("A", "1"))]
#[case::space("B 'x y'", ("B", "'x y'"))]
#[case::spaced_equals("C = 2", ("C", "2"))]
#[case::name_only("D", ("D", ""))]
fn definitions(#[case] entry: &str, #[case] expected: (&str, &str)) -> JsppResult<()> {
	let (name, expression) = parse_definition(entry)?;
	assert_eq!((name.as_str(), expression.as_str()), expected);

	Ok(())
}

#[test]
fn invalid_definition() {
	assert!(matches!(
		parse_definition("bad=1"),
		Err(JsppError::InvalidOption { .. })
	));
}

#[rstest]
#[case::caret("a^b^^c", "a\nb^c")]
#[case::crlf("a\r\nb\rc", "a\nb\nc")]
#[case::plain("// __FILE", "// __FILE")]
fn header_translation(#[case] input: &str, #[case] expected: &str) {
	assert_eq!(translate_header(input), expected);
}

#[test]
fn options_defaults() -> JsppResult<()> {
	let options = Options::default();
	options.validate()?;
	assert_eq!(options.headers, "\n//// __FILE\n\n");
	assert_eq!(options.empty_line_budget(), Some(1));
	assert_eq!(options.filter, vec!["license".to_string()]);
	assert_eq!(options.extension(), "js");

	let unlimited = Options {
		empty_lines: -3,
		..Options::default()
	};
	assert_eq!(unlimited.empty_line_budget(), None);

	Ok(())
}

#[test]
fn load_config_file() -> JsppResult<()> {
	let dir = fixture_dir(&[(
		".config/jspp.toml",
		"empty_lines = 3\nfilter = [\"jsdoc\"]\neol_type = \"win\"\n",
	)]);
	let options = Options::load(dir.path())?.unwrap_or_else(|| panic!("config not found"));
	assert_eq!(options.empty_lines, 3);
	assert_eq!(options.filter, vec!["jsdoc".to_string()]);
	assert_eq!(options.eol_type, EolType::Win);
	assert_eq!(options.comments, CommentMode::Filter);

	let empty = fixture_dir(&[]);
	assert!(Options::load(empty.path())?.is_none());

	Ok(())
}

#[test]
fn invalid_config_file() {
	let dir = fixture_dir(&[("jspp.toml", "empty_lines = \"many\"\n")]);
	assert!(matches!(
		Options::load(dir.path()),
		Err(JsppError::ConfigParse(_))
	));
}

#[test]
fn inclusion_registry_marks() {
	let mut registry = InclusionRegistry::default();
	let path = std::path::Path::new("/tmp/a.js");

	assert!(registry.admit(path, false));
	assert!(registry.admit(path, false));
	assert!(!registry.admit(path, true));

	let once = std::path::Path::new("/tmp/b.js");
	assert!(registry.admit(once, true));
	assert!(!registry.admit(once, false));
	assert!(!registry.admit(once, true));
}

#[rstest]
#[case::double("\"a.js\"", "a.js")]
#[case::single("'lib/b'", "lib/b")]
#[case::bare(" c ", "c")]
#[case::mismatched("\"d'", "\"d'")]
fn include_targets(#[case] target: &str, #[case] expected: &str) {
	assert_eq!(strip_quotes(target), expected);
}

#[test]
fn paths_are_normalized_and_displayed() {
	let base = std::path::Path::new("/work/project");
	assert_eq!(
		normalize(std::path::Path::new("/work/project/lib/../src/./a.js")),
		std::path::PathBuf::from("/work/project/src/a.js")
	);
	assert_eq!(
		display_path(std::path::Path::new("/work/project/src/a.js"), base),
		"src/a.js"
	);
	assert_eq!(
		display_path(std::path::Path::new("/work/other/a.js"), base),
		"../other/a.js"
	);
}

#[rstest]
#[case(0.0, "0")]
#[case(-0.0, "0")]
#[case(123.0, "123")]
#[case(0.5, "0.5")]
#[case(1e21, "1e+21")]
#[case(f64::NAN, "NaN")]
fn number_formatting(#[case] value: f64, #[case] expected: &str) {
	assert_eq!(format_number(value), expected);
}

#[test]
fn line_numbers_follow_offsets() {
	let mut context = FileContext::new("a\nb\nc\nd\n", None, String::new(), 0);
	assert_eq!(context.line_at(0), 1);
	assert_eq!(context.line_at(4), 3);
	assert_eq!(context.line_at(6), 4);
	assert_eq!(context.line_at(2), 2);
	assert_eq!(context.line_at(100), 5);
}

#[rstest]
#[case::unclosed_block(JsppError::UnclosedBlock { file: "a.js".into() }, true)]
#[case::read_file(
	JsppError::ReadFile {
		path: "a.js".into(),
		source: std::io::Error::from(std::io::ErrorKind::NotFound),
	},
	true
)]
#[case::missing_filename(JsppError::MissingFilename, false)]
#[case::invalid_identifier(JsppError::InvalidIdentifier { name: "x".into() }, false)]
fn terminal_errors(#[case] error: JsppError, #[case] terminal: bool) {
	assert_eq!(error.is_terminal(), terminal);
}
