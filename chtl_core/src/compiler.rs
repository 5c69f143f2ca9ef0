use std::path::Path;
use std::path::PathBuf;

use crate::ChtlConfig;
use crate::ChtlResult;
use crate::CompileContext;
use crate::CssCompiler;
use crate::Fragment;
use crate::FsLoader;
use crate::ImportGraph;
use crate::Loader;
use crate::OutputConfig;
use crate::PassThrough;
use crate::ScriptCompiler;
use crate::SourceConfiguration;
use crate::StrictConfig;
use crate::Warning;
use crate::expand::expand;
use crate::generate;
use crate::merge;
use crate::parser::parse;
use crate::registry::DEFAULT_NAMESPACE;
use crate::resolve_styles;
use crate::scanner::chtl_view;
use crate::scanner::scan;
use crate::tokens::KeywordTable;

/// Everything a compilation needs besides the source text.
pub struct CompileOptions {
	/// Path of the source being compiled. Imports resolve against its
	/// directory, or the working directory when absent.
	pub entry: Option<PathBuf>,
	pub strict: StrictConfig,
	pub output: OutputConfig,
	pub loader: Box<dyn Loader>,
	pub css: Box<dyn CssCompiler>,
	pub script: Box<dyn ScriptCompiler>,
}

impl Default for CompileOptions {
	fn default() -> Self {
		Self {
			entry: None,
			strict: StrictConfig::default(),
			output: OutputConfig::default(),
			loader: Box::new(FsLoader),
			css: Box::new(PassThrough),
			script: Box::new(PassThrough),
		}
	}
}

impl CompileOptions {
	pub fn from_config(config: &ChtlConfig) -> Self {
		Self {
			strict: config.strict,
			output: config.output,
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_entry(mut self, entry: impl Into<PathBuf>) -> Self {
		self.entry = Some(entry.into());
		self
	}

	#[must_use]
	pub fn with_loader(mut self, loader: impl Loader + 'static) -> Self {
		self.loader = Box::new(loader);
		self
	}

	#[must_use]
	pub fn with_strict(mut self, strict: StrictConfig) -> Self {
		self.strict = strict;
		self
	}
}

/// The result of compiling one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
	/// The complete document.
	pub html: String,
	/// The rendered elements without stylesheet or scripts.
	pub body: String,
	/// Global CSS followed by the rules collected from style blocks.
	pub stylesheet: String,
	pub scripts: Vec<String>,
	pub fragments: Vec<Fragment>,
	/// Problems skipped under a lenient policy.
	pub warnings: Vec<Warning>,
}

/// Compile a CHTL source string.
pub fn compile(source: &str, options: &CompileOptions) -> ChtlResult<CompileOutput> {
	compile_with_entry(source, options.entry.as_deref(), options)
}

/// Read and compile a CHTL file. Imports resolve against the file's
/// directory.
pub fn compile_file(path: &Path, options: &CompileOptions) -> ChtlResult<CompileOutput> {
	let source = std::fs::read_to_string(path)?;
	compile_with_entry(&source, Some(path), options)
}

fn compile_with_entry(
	source: &str,
	entry: Option<&Path>,
	options: &CompileOptions,
) -> ChtlResult<CompileOutput> {
	let (source_config, fragments) = configure(source)?;
	let view = chtl_view(&fragments);
	let mut context = CompileContext::new(options.strict);

	let units = ImportGraph::build(
		source,
		entry,
		&source_config.keywords,
		options.loader.as_ref(),
	)?
	.into_ordered_units()?;

	for unit in units {
		let unit_view = chtl_view(&scan(&unit.source, &unit.config.keywords)?);
		tracing::debug!(path = %unit.path.display(), namespace = %unit.namespace, "parsing import");
		context.namespace = unit.namespace;
		context.source_config = unit.config;
		parse(&unit_view, &mut context)?;
	}

	context.namespace = DEFAULT_NAMESPACE.to_string();
	context.source_config = source_config;
	let nodes = parse(&view, &mut context)?;
	if context.source_config.debug {
		tracing::debug!(definitions = context.registry.len(), ?nodes, "parsed document");
	}

	let nodes = expand(nodes, &mut context)?;
	let (nodes, sheet) = resolve_styles(nodes, &mut context)?;
	let generated = generate(&nodes, &sheet);
	let merged = merge(
		&generated,
		&fragments,
		options.css.as_ref(),
		options.script.as_ref(),
		options.output.doctype,
	)?;

	Ok(CompileOutput {
		html: merged.html,
		body: generated.body,
		stylesheet: merged.stylesheet,
		scripts: merged.scripts,
		fragments,
		warnings: context.warnings,
	})
}

/// Read the source's `[Configuration]` blocks and scan it with the keyword
/// spellings they declare.
fn configure(source: &str) -> ChtlResult<(SourceConfiguration, Vec<Fragment>)> {
	let default_keywords = KeywordTable::default();
	let fragments = scan(source, &default_keywords)?;
	let config = SourceConfiguration::prescan(&chtl_view(&fragments))?;

	if config.keywords.is_default() {
		return Ok((config, fragments));
	}

	tracing::debug!("rescanning with configured keywords");
	let fragments = scan(source, &config.keywords)?;
	Ok((config, fragments))
}

/// Split a source into fragments, honouring its keyword configuration.
pub fn fragments(source: &str) -> ChtlResult<Vec<Fragment>> {
	configure(source).map(|(_, fragments)| fragments)
}
