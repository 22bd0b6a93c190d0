mod common;

use clap::Parser;
use jspp_cli::JsppCli;
use jspp_core::AnyEmptyResult;
use jspp_core::CommentMode;
use jspp_core::EolType;
use jspp_core::Options;
use predicates::prelude::PredicateBooleanExt;

#[test]
fn reads_standard_input() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.write_stdin("//#define A\n//#ifdef A\nyes\n//#else\nno\n//#endif\n")
		.assert()
		.success()
		.stdout("yes\n");

	Ok(())
}

#[test]
fn define_flag_substitutes_code_variables() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.arg("-D")
		.arg("$_VERSION='1.0'")
		.arg("--set")
		.arg("DEBUG")
		.write_stdin("v = $_VERSION;\n//#if DEBUG\ndebug();\n//#endif\n")
		.assert()
		.success()
		.stdout("v = \"1.0\";\ndebug();\n");

	Ok(())
}

#[test]
fn processes_files_with_include_headers() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("main.js"), "x\n//#include a\n")?;
	std::fs::write(tmp.path().join("a.js"), "A\n")?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.arg("main.js")
		.assert()
		.success()
		.stdout("x\n\n//// a.js\n\nA\n");

	Ok(())
}

#[test]
fn concatenates_multiple_files() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("a.js"), "A\n")?;
	std::fs::write(tmp.path().join("b.js"), "//#include_once a\nB\n")?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.arg("--headers=")
		.arg("a.js")
		.arg("b.js")
		.assert()
		.success()
		.stdout("A\nB\n");

	Ok(())
}

#[test]
fn recovered_errors_exit_with_one() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.write_stdin("//#endif\nok\n")
		.assert()
		.code(1)
		.stdout("ok\n")
		.stderr(
			predicates::str::contains("warning: line 1: unexpected #endif")
				.and(predicates::str::contains("jspp::unexpected_directive")),
		);

	Ok(())
}

#[test]
fn strict_mode_exits_with_two() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.arg("--strict")
		.write_stdin("//#endif\nok\n")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("unexpected #endif"));

	Ok(())
}

#[test]
fn unclosed_block_exits_with_two() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.write_stdin("//#if 1\na\n")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("unclosed conditional block"));

	Ok(())
}

#[test]
fn missing_input_file_exits_with_two() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.arg("nope.js")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("cannot read"));

	Ok(())
}

#[test]
fn invalid_indent_exits_with_two() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.arg("--indent")
		.arg("x")
		.write_stdin("a\n")
		.assert()
		.code(2)
		.stderr(predicates::str::contains("invalid option"));

	Ok(())
}

#[test]
fn windows_line_endings() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.arg("--eol-type")
		.arg("win")
		.write_stdin("a\n\n\n\nb\n")
		.assert()
		.success()
		.stdout("a\r\n\r\nb\r\n");

	Ok(())
}

#[test]
fn showme_prints_merged_options() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("jspp.toml"), "indent = \"2t\"\n")?;

	common::jspp_cmd()
		.current_dir(tmp.path())
		.arg("--showme")
		.arg("--empty-lines=-1")
		.arg("-D")
		.arg("A=1")
		.assert()
		.success()
		.stdout(
			predicates::str::contains("\"empty_lines\": -1")
				.and(predicates::str::contains("\"indent\": \"2t\""))
				.and(predicates::str::contains("\"A=1\"")),
		);

	Ok(())
}

#[test]
fn parse_and_merge_flags() {
	let cli = JsppCli::parse_from([
		"jspp",
		"-D",
		"A=1",
		"--set",
		"B",
		"--empty-lines=-1",
		"-C",
		"none",
		"-F",
		"jsdoc",
		"--eol-type",
		"mac",
		"a.js",
	]);
	assert_eq!(cli.files, vec![std::path::PathBuf::from("a.js")]);

	let base = Options {
		define: vec!["X".to_string()],
		strict: true,
		..Options::default()
	};
	let options = cli.merge(base);

	assert_eq!(options.define, vec!["X", "A=1", "B"]);
	assert_eq!(options.empty_lines, -1);
	assert_eq!(options.comments, CommentMode::None);
	assert_eq!(options.filter, vec!["jsdoc"]);
	assert_eq!(options.eol_type, EolType::Mac);
	assert!(options.strict);
	assert_eq!(options.headers, Options::default().headers);
}
