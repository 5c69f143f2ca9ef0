use std::collections::HashMap;

use derive_more::Display;

use crate::ast::ElementDef;
use crate::ast::OriginDef;
use crate::ast::StyleDef;
use crate::ast::VarDef;

/// The namespace that exists before any source is parsed. Every lookup
/// falls back to it.
pub const DEFAULT_NAMESPACE: &str = "";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum DefinitionKind {
	#[display("@Style")]
	Style,
	#[display("@Element")]
	Element,
	#[display("@Var")]
	Var,
	#[display("[Origin]")]
	Origin,
}

/// A registered, immutable definition. Usages always work on a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Definition {
	StyleTemplate(StyleDef),
	CustomStyle(StyleDef),
	ElementTemplate(ElementDef),
	CustomElement(ElementDef),
	VarTemplate(VarDef),
	CustomVar(VarDef),
	Origin(OriginDef),
}

impl Definition {
	pub fn kind(&self) -> DefinitionKind {
		match self {
			Self::StyleTemplate(_) | Self::CustomStyle(_) => DefinitionKind::Style,
			Self::ElementTemplate(_) | Self::CustomElement(_) => DefinitionKind::Element,
			Self::VarTemplate(_) | Self::CustomVar(_) => DefinitionKind::Var,
			Self::Origin(_) => DefinitionKind::Origin,
		}
	}

	pub fn name(&self) -> &str {
		match self {
			Self::StyleTemplate(def) | Self::CustomStyle(def) => &def.name,
			Self::ElementTemplate(def) | Self::CustomElement(def) => &def.name,
			Self::VarTemplate(def) | Self::CustomVar(def) => &def.name,
			Self::Origin(def) => &def.name,
		}
	}

	pub fn as_style(&self) -> Option<&StyleDef> {
		match self {
			Self::StyleTemplate(def) | Self::CustomStyle(def) => Some(def),
			_ => None,
		}
	}

	pub fn as_element(&self) -> Option<&ElementDef> {
		match self {
			Self::ElementTemplate(def) | Self::CustomElement(def) => Some(def),
			_ => None,
		}
	}

	pub fn as_var(&self) -> Option<&VarDef> {
		match self {
			Self::VarTemplate(def) | Self::CustomVar(def) => Some(def),
			_ => None,
		}
	}

	pub fn as_origin(&self) -> Option<&OriginDef> {
		match self {
			Self::Origin(def) => Some(def),
			_ => None,
		}
	}
}

/// A definition found by [`Registry::lookup`], together with the namespace
/// it was actually found in.
#[derive(Debug, Clone, Copy)]
pub struct Found<'a> {
	pub namespace: &'a str,
	pub definition: &'a Definition,
}

/// Namespaced store of template and custom definitions, keyed by
/// `(namespace, kind, name)`.
#[derive(Debug, Clone, Default)]
pub struct Registry {
	namespaces: HashMap<String, HashMap<(DefinitionKind, String), Definition>>,
}

impl Registry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Insert a definition. A later registration for the same key replaces
	/// the earlier one.
	pub fn register(&mut self, namespace: &str, definition: Definition) {
		let key = (definition.kind(), definition.name().to_string());
		tracing::trace!(namespace, kind = %key.0, name = %key.1, "registered definition");

		if let Some(previous) = self
			.namespaces
			.entry(namespace.to_string())
			.or_default()
			.insert(key, definition)
		{
			tracing::debug!(
				namespace,
				name = previous.name(),
				"definition replaced by a later registration"
			);
		}
	}

	/// Find a definition in `namespace`, falling back to the default
	/// namespace. The fallback applies to explicit `from` namespaces too.
	pub fn lookup(&self, namespace: &str, kind: DefinitionKind, name: &str) -> Option<Found<'_>> {
		let key = (kind, name.to_string());
		[namespace, DEFAULT_NAMESPACE]
			.into_iter()
			.find_map(|candidate| {
				let (stored, definitions) = self.namespaces.get_key_value(candidate)?;
				let definition = definitions.get(&key)?;
				Some(Found {
					namespace: stored.as_str(),
					definition,
				})
			})
	}

	pub fn contains_namespace(&self, namespace: &str) -> bool {
		self.namespaces.contains_key(namespace)
	}

	/// Number of definitions across all namespaces.
	pub fn len(&self) -> usize {
		self.namespaces.values().map(HashMap::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
