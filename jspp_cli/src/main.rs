use std::io::BufWriter;
use std::process;

use clap::Parser;
use jspp_cli::JsppCli;
use jspp_core::AnyResult;
use jspp_core::Diagnostic;
use jspp_core::Source;
use jspp_core::preprocess;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
}

/// Exit code when recovered errors were reported.
const EXIT_DIAGNOSTICS: i32 = 1;
/// Exit code when the run stopped.
const EXIT_FAILURE: i32 = 2;

fn main() {
	let args = JsppCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_tracing(args.verbose, use_color);

	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	match run(&args) {
		Ok(true) => process::exit(EXIT_DIAGNOSTICS),
		Ok(false) => {}
		Err(e) => {
			// Render through miette for error codes and help text.
			match e.downcast::<jspp_core::JsppError>() {
				Ok(jspp_err) => {
					let report: miette::Report = (*jspp_err).into();
					eprintln!("{report:?}");
				}
				Err(e) => {
					eprintln!("{} {e}", colored!("error:", red));
				}
			}
			process::exit(EXIT_FAILURE);
		}
	}
}

/// Logs go to stderr so they never mix with the preprocessed output.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "debug" } else { "error" };
	let filter = EnvFilter::try_from_env("JSPP_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.init();
}

/// Returns whether recovered errors were reported.
fn run(args: &JsppCli) -> AnyResult<bool> {
	let root = std::env::current_dir()?;
	let options = args.options(&root)?;

	if args.showme {
		println!("{}", serde_json::to_string_pretty(&options)?);
		return Ok(false);
	}

	tracing::debug!(files = args.files.len(), strict = options.strict, "start run");
	let source = match args.files.as_slice() {
		[] => Source::Reader(Box::new(std::io::stdin())),
		[file] => Source::File(file.clone()),
		files => Source::Files(files.to_vec()),
	};

	let stdout = std::io::stdout();
	let mut output = BufWriter::new(stdout.lock());
	let report = preprocess(source, &options, &mut output)?;

	for diagnostic in &report.diagnostics {
		eprintln!("{}", diagnostic_to_report(diagnostic));
	}

	Ok(report.has_diagnostics())
}

/// Format a recovered error with its location, error code and help text.
fn diagnostic_to_report(diagnostic: &Diagnostic) -> String {
	let code = miette::Diagnostic::code(&diagnostic.error)
		.map(|code| format!(" [{code}]"))
		.unwrap_or_default();
	let help = miette::Diagnostic::help(&diagnostic.error)
		.map(|help| format!("\n  help: {help}"))
		.unwrap_or_default();

	format!(
		"{} {diagnostic}{code}{help}",
		colored!("warning:", yellow)
	)
}
