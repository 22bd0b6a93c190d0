use std::path::Path;

use tempfile::TempDir;

use crate::Options;
use crate::Output;
use crate::Preprocessor;
use crate::Source;
use crate::error::JsppResult;
use crate::resolver::normalize;

/// Create a temporary directory holding `files`.
pub(crate) fn fixture_dir(files: &[(&str, &str)]) -> TempDir {
	let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("failed to create tempdir: {e}"));

	for (name, content) in files {
		let path = dir.path().join(name);
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)
				.unwrap_or_else(|e| panic!("failed to create {}: {e}", parent.display()));
		}
		std::fs::write(&path, content).unwrap_or_else(|e| panic!("failed to write {name}: {e}"));
	}

	dir
}

/// Run the preprocessor with `dir` as the working directory.
pub(crate) fn run_in(dir: &Path, source: Source, options: &Options) -> JsppResult<Output> {
	let mut buffer: Vec<u8> = Vec::new();
	let report = Preprocessor::new(options, normalize(dir), &mut buffer)?.run(source)?;

	Ok(Output {
		text: String::from_utf8_lossy(&buffer).into_owned(),
		diagnostics: report.diagnostics,
	})
}

/// Process `main.js` of a fixture directory.
pub(crate) fn run_main(files: &[(&str, &str)], options: &Options) -> JsppResult<Output> {
	let dir = fixture_dir(files);
	run_in(dir.path(), Source::File(dir.path().join("main.js")), options)
}

/// Default options without include headers.
pub(crate) fn bare_options() -> Options {
	Options {
		headers: String::new(),
		..Options::default()
	}
}
