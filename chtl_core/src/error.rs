use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum ChtlError {
	#[error(transparent)]
	#[diagnostic(code(chtl::io_error))]
	Io(#[from] std::io::Error),

	#[error("{message} at line {line}, column {column}")]
	#[diagnostic(code(chtl::parse))]
	Parse {
		message: String,
		line: usize,
		column: usize,
	},

	#[error("unexpected end of input while parsing {0}")]
	#[diagnostic(
		code(chtl::unexpected_eof),
		help("check that every `{{` has a matching `}}` and every statement ends with `;`")
	)]
	UnexpectedEof(String),

	#[error("unterminated {what} starting at line {line}, column {column}")]
	#[diagnostic(
		code(chtl::unterminated_block),
		help("the input ended before the closing delimiter was found")
	)]
	UnterminatedBlock {
		what: String,
		line: usize,
		column: usize,
	},

	#[error("unknown character `{ch}` at line {line}, column {column}")]
	#[diagnostic(
		code(chtl::unknown_character),
		help("set `strict.unknown_characters = \"warn\"` in chtl.toml to skip these instead")
	)]
	UnknownCharacter { ch: char, line: usize, column: usize },

	#[error("failed to import `{path}`: {reason}")]
	#[diagnostic(code(chtl::import_load))]
	ImportLoad { path: String, reason: String },

	#[error("import cycle detected at `{path}`")]
	#[diagnostic(
		code(chtl::import_cycle),
		help("a file must not import itself, directly or through other files")
	)]
	ImportCycle { path: String },

	#[error("unsupported import type `@{0}`")]
	#[diagnostic(code(chtl::unsupported_import), help("only `[Import] @Chtl from \"path\";` is supported"))]
	UnsupportedImport(String),

	#[error("no {kind} definition named `{name}` in namespace `{namespace}`")]
	#[diagnostic(
		code(chtl::unresolved_definition),
		help("define it with `[Template]` or `[Custom]`, or import the file that does")
	)]
	UnresolvedDefinition {
		kind: String,
		name: String,
		namespace: String,
	},

	#[error("template `{name}` expands into itself")]
	#[diagnostic(code(chtl::recursive_template))]
	RecursiveTemplate { name: String },

	#[error("incompatible units `{left}` and `{right}`")]
	#[diagnostic(
		code(chtl::unit_mismatch),
		help("both operands must use the same unit, or one of them must be unitless")
	)]
	UnitMismatch { left: String, right: String },

	#[error("division by zero")]
	#[diagnostic(code(chtl::division_by_zero))]
	DivisionByZero,

	#[error("unresolved property reference `{reference}`")]
	#[diagnostic(
		code(chtl::unresolved_reference),
		help("the referenced element must exist and declare the property")
	)]
	UnresolvedReference { reference: String },

	#[error("property reference cycle involving `{property}`")]
	#[diagnostic(
		code(chtl::reference_cycle),
		help("style properties must not depend on themselves, directly or transitively")
	)]
	ReferenceCycle { property: String },

	#[error("failed to evaluate style expression: {0}")]
	#[diagnostic(code(chtl::evaluation))]
	Evaluation(String),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(chtl::config_parse),
		help("check that chtl.toml is valid TOML with [strict] and/or [output] sections")
	)]
	ConfigParse(String),
}

impl ChtlError {
	pub(crate) fn parse(message: impl Into<String>, line: usize, column: usize) -> Self {
		Self::Parse {
			message: message.into(),
			line,
			column,
		}
	}
}

pub type ChtlResult<T> = Result<T, ChtlError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
