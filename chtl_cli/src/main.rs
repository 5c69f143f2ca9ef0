use std::path::Path;
use std::path::PathBuf;
use std::process;

use chtl_cli::ChtlCli;
use chtl_cli::Commands;
use chtl_cli::OutputFormat;
use chtl_core::ChtlConfig;
use chtl_core::CompileOptions;
use chtl_core::Fragment;
use chtl_core::StrictConfig;
use chtl_core::Warning;
use chtl_core::compile_file;
use clap::Parser;
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
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
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
	($text:expr,dimmed) => {
		if color_enabled() {
			format!("{}", $text.dimmed())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = ChtlCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	init_tracing(args.verbose, use_color);

	let result = match &args.command {
		Some(Commands::Compile {
			input,
			output,
			strict,
		}) => run_compile(&args, input, output.as_deref(), *strict),
		Some(Commands::Fragments { input, format }) => run_fragments(input, *format),
		None => {
			eprintln!("No subcommand specified. Run `chtl --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<chtl_core::ChtlError>() {
			Ok(chtl_err) => {
				let report: miette::Report = (*chtl_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `CHTL_LOG` takes any `EnvFilter` directive and wins over
/// `--verbose`. Warnings are printed from the compile output, so the default
/// filter only lets errors through.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_level = if verbose { "chtl_core=debug" } else { "error" };
	let filter =
		EnvFilter::try_from_env("CHTL_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.without_time()
		.init();
}

fn resolve_root(args: &ChtlCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

fn compile_options(
	args: &ChtlCli,
	strict: bool,
) -> Result<CompileOptions, Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = ChtlConfig::load(&root)?.unwrap_or_default();
	let options = CompileOptions::from_config(&config);

	if strict {
		return Ok(options.with_strict(StrictConfig::strict()));
	}

	Ok(options)
}

fn run_compile(
	args: &ChtlCli,
	input: &Path,
	output: Option<&Path>,
	strict: bool,
) -> Result<(), Box<dyn std::error::Error>> {
	let options = compile_options(args, strict)?;
	let compiled = compile_file(input, &options)?;

	print_warnings(&compiled.warnings, input);

	match output {
		Some(path) => {
			std::fs::write(path, &compiled.html)?;
			if args.verbose {
				eprintln!(
					"{} {} {}",
					colored!("Compiled", green),
					input.display(),
					colored!(format!("-> {}", path.display()), dimmed),
				);
			}
		}
		None => println!("{}", compiled.html),
	}

	Ok(())
}

fn run_fragments(input: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
	let source = std::fs::read_to_string(input)?;
	let fragments = chtl_core::fragments(&source)?;

	match format {
		OutputFormat::Json => {
			let output = serde_json::json!({
				"file": input.display().to_string(),
				"fragments": fragments,
			});
			println!("{output}");
		}
		OutputFormat::Text => {
			for fragment in &fragments {
				println!("{}", fragment_line(fragment));
			}
		}
	}

	Ok(())
}

fn fragment_line(fragment: &Fragment) -> String {
	let preview: String = fragment
		.content
		.split_whitespace()
		.collect::<Vec<_>>()
		.join(" ");
	let preview = match preview.char_indices().nth(40) {
		Some((end, _)) => format!("{}...", &preview[..end]),
		None => preview,
	};

	format!(
		"{:<12} {:<8} {}",
		fragment.kind.to_string(),
		fragment.position.to_string(),
		colored!(preview, dimmed),
	)
}

fn print_warnings(warnings: &[Warning], input: &Path) {
	for warning in warnings {
		eprintln!(
			"{} {}: {warning}",
			colored!("warning:", yellow),
			input.display(),
		);
	}
}
