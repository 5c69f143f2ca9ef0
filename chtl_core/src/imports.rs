use std::collections::HashMap;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;

use crate::ChtlError;
use crate::ChtlResult;
use crate::SourceConfiguration;
use crate::lexer::prescan;
use crate::scanner::chtl_view;
use crate::scanner::scan;
use crate::tokens::Keyword;
use crate::tokens::KeywordTable;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// Extension appended to import paths that have none.
pub const CHTL_EXTENSION: &str = "chtl";

/// Reads imported source files.
pub trait Loader {
	/// Read the source at `path`.
	fn load(&self, path: &Path) -> ChtlResult<String>;
	/// Reduce `path` to a canonical identity so that two spellings of the
	/// same file become one node of the import graph.
	fn canonicalize(&self, path: &Path) -> ChtlResult<PathBuf>;
}

/// Loads imports from the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLoader;

impl Loader for FsLoader {
	fn load(&self, path: &Path) -> ChtlResult<String> {
		std::fs::read_to_string(path).map_err(|e| {
			ChtlError::ImportLoad {
				path: path.display().to_string(),
				reason: e.to_string(),
			}
		})
	}

	fn canonicalize(&self, path: &Path) -> ChtlResult<PathBuf> {
		std::fs::canonicalize(path).map_err(|e| {
			ChtlError::ImportLoad {
				path: path.display().to_string(),
				reason: e.to_string(),
			}
		})
	}
}

/// Serves imports from an in-memory map of path to source.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
	files: HashMap<PathBuf, String>,
}

impl MemoryLoader {
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_file(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
		self.insert(path, source);
		self
	}

	pub fn insert(&mut self, path: impl AsRef<Path>, source: impl Into<String>) {
		self.files
			.insert(normalize(path.as_ref()), source.into());
	}
}

impl Loader for MemoryLoader {
	fn load(&self, path: &Path) -> ChtlResult<String> {
		self.files.get(&normalize(path)).cloned().ok_or_else(|| {
			ChtlError::ImportLoad {
				path: path.display().to_string(),
				reason: "no such file".into(),
			}
		})
	}

	fn canonicalize(&self, path: &Path) -> ChtlResult<PathBuf> {
		let normalized = normalize(path);
		if self.files.contains_key(&normalized) {
			Ok(normalized)
		} else {
			Err(ChtlError::ImportLoad {
				path: path.display().to_string(),
				reason: "no such file".into(),
			})
		}
	}
}

/// Resolve `.` and `..` components without touching the file system.
fn normalize(path: &Path) -> PathBuf {
	let mut normalized = PathBuf::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				normalized.pop();
			}
			other => normalized.push(other),
		}
	}
	normalized
}

/// Resolve an import path against the directory of the importing file, or
/// the working directory when the importer has no path.
pub fn resolve_import_path(importer: Option<&Path>, raw: &str) -> PathBuf {
	let mut path = PathBuf::from(raw);
	if path.extension().is_none() {
		path.set_extension(CHTL_EXTENSION);
	}
	if path.is_absolute() {
		return path;
	}

	let base = importer
		.and_then(Path::parent)
		.map(Path::to_path_buf)
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());
	base.join(path)
}

/// An `[Import] @Chtl` statement found by the pre-scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
	pub path: String,
	pub alias: Option<String>,
}

/// Find the import statements of a unit without parsing it.
pub fn find_imports(tokens: &[Token]) -> ChtlResult<Vec<ImportStatement>> {
	let mut imports = vec![];

	for (index, window) in tokens.windows(3).enumerate() {
		let is_import = window[0].is(TokenKind::LeftBracket)
			&& window[1].is_keyword(Keyword::Import)
			&& window[2].is(TokenKind::RightBracket);
		if !is_import {
			continue;
		}

		let rest = &tokens[index + 3..];
		let kind = match rest {
			[at, kind, ..] if at.is(TokenKind::At) && kind.is_name() => kind,
			_ => continue,
		};
		if kind.text != "Chtl" {
			return Err(ChtlError::UnsupportedImport(kind.text.clone()));
		}

		let Some(path) = rest
			.get(3)
			.filter(|_| rest.get(2).is_some_and(|from| from.is_keyword(Keyword::From)))
		else {
			continue;
		};

		let alias = match rest.get(4..6) {
			Some([as_token, alias]) if as_token.is_keyword(Keyword::As) => Some(alias.text.clone()),
			_ => None,
		};

		imports.push(ImportStatement {
			path: path.text.clone(),
			alias,
		});
	}

	Ok(imports)
}

/// An imported source file, ready to be parsed.
#[derive(Debug, Clone)]
pub struct SourceUnit {
	pub path: PathBuf,
	/// Namespace its definitions are registered under: the import alias,
	/// or the file stem.
	pub namespace: String,
	pub source: String,
	pub config: SourceConfiguration,
}

/// Every file reachable from the root through `[Import] @Chtl`, with edges
/// from each dependency to the units that import it.
#[derive(Debug, Default)]
pub struct ImportGraph {
	graph: DiGraph<PathBuf, ()>,
	indices: HashMap<PathBuf, NodeIndex>,
	units: HashMap<NodeIndex, SourceUnit>,
	root: Option<NodeIndex>,
}

impl ImportGraph {
	/// Walk the imports of `root_source` transitively. Every reachable file
	/// is loaded and pre-scanned once.
	pub fn build(
		root_source: &str,
		root_path: Option<&Path>,
		root_keywords: &KeywordTable,
		loader: &dyn Loader,
	) -> ChtlResult<Self> {
		let mut graph = Self::default();
		let root_id = match root_path {
			Some(path) => loader.canonicalize(path).unwrap_or_else(|_| path.to_path_buf()),
			None => PathBuf::from("<input>"),
		};
		let root = graph.node(&root_id);
		graph.root = Some(root);

		let root_view = chtl_view(&scan(root_source, root_keywords)?);
		let root_imports = find_imports(&prescan(&root_view, root_keywords)?)?;
		let mut pending = vec![(root, root_path.map(Path::to_path_buf), root_imports)];

		while let Some((importer, importer_path, imports)) = pending.pop() {
			for import in imports {
				let resolved = resolve_import_path(importer_path.as_deref(), &import.path);
				let canonical = loader.canonicalize(&resolved)?;
				let known = graph.indices.contains_key(&canonical);
				let dependency = graph.node(&canonical);
				graph.graph.update_edge(dependency, importer, ());

				if known {
					continue;
				}

				let source = loader.load(&canonical)?;
				let config = unit_configuration(&source)?;
				let view = chtl_view(&scan(&source, &config.keywords)?);
				let nested = find_imports(&prescan(&view, &config.keywords)?)?;
				let namespace = import.alias.clone().unwrap_or_else(|| {
					canonical
						.file_stem()
						.map(|stem| stem.to_string_lossy().into_owned())
						.unwrap_or_default()
				});

				tracing::debug!(path = %canonical.display(), %namespace, "discovered import");
				graph.units.insert(
					dependency,
					SourceUnit {
						path: canonical.clone(),
						namespace,
						source,
						config,
					},
				);
				pending.push((dependency, Some(canonical), nested));
			}
		}

		Ok(graph)
	}

	fn node(&mut self, path: &Path) -> NodeIndex {
		if let Some(index) = self.indices.get(path) {
			return *index;
		}
		let index = self.graph.add_node(path.to_path_buf());
		self.indices.insert(path.to_path_buf(), index);
		index
	}

	/// Number of imported units, excluding the root.
	pub fn len(&self) -> usize {
		self.units.len()
	}

	pub fn is_empty(&self) -> bool {
		self.units.is_empty()
	}

	/// Imported units ordered so that every unit comes after the units it
	/// imports. Fails with [`ChtlError::ImportCycle`] if the imports form a
	/// cycle.
	pub fn into_ordered_units(mut self) -> ChtlResult<Vec<SourceUnit>> {
		let order = toposort(&self.graph, None).map_err(|cycle| {
			ChtlError::ImportCycle {
				path: self.graph[cycle.node_id()].display().to_string(),
			}
		})?;

		let units: Vec<SourceUnit> = order
			.into_iter()
			.filter(|index| Some(*index) != self.root)
			.filter_map(|index| self.units.remove(&index))
			.collect();

		tracing::debug!(
			order = ?units.iter().map(|unit| unit.path.display().to_string()).collect::<Vec<_>>(),
			"resolved import order"
		);
		Ok(units)
	}
}

/// Keyword and index settings of an imported unit, read from its own
/// `[Configuration]` blocks.
fn unit_configuration(source: &str) -> ChtlResult<SourceConfiguration> {
	let default_view = chtl_view(&scan(source, &KeywordTable::default())?);
	SourceConfiguration::prescan(&default_view)
}
