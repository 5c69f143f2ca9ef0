use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Compile CHTL documents into HTML.",
	long_about = "chtl compiles CHTL, a templated superset of HTML with embedded style blocks \
	              and a style-value expression language, into a single HTML document.\n\nQuick \
	              start:\n  chtl compile page.chtl          Print the document\n  chtl compile \
	              page.chtl -o out.html  Write it to a file\n  chtl fragments page.chtl        \
	              Show how the source is split"
)]
pub struct ChtlCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Directory searched for `chtl.toml`. Defaults to the current directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Compile a CHTL file into an HTML document.
	///
	/// Imports are resolved relative to the input file. The document is
	/// printed to stdout unless `--output` is given. Warnings for skipped
	/// input are printed to stderr.
	Compile {
		/// The CHTL file to compile.
		input: PathBuf,

		/// Write the document to this file instead of stdout.
		#[arg(long, short)]
		output: Option<PathBuf>,

		/// Treat every recoverable problem as an error, overriding
		/// `chtl.toml`.
		#[arg(long, default_value_t = false)]
		strict: bool,
	},
	/// Print the fragments a CHTL file is split into.
	///
	/// Lists global style blocks, global and local script blocks, and the
	/// CHTL source around them along with their positions.
	Fragments {
		/// The CHTL file to scan.
		input: PathBuf,

		/// Output format. Use `text` for one line per fragment or `json` for
		/// programmatic consumption.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
