use indexmap::IndexMap;

/// Ordered `name -> raw value` map used for attributes and style
/// properties. Insertion order is emission order.
pub type PropertyMap = IndexMap<String, String>;

/// A node of the CHTL document tree.
///
/// The parser produces every variant. After expansion only `Element`,
/// `Text`, `Comment`, `Origin` and `Use` remain, and after style resolution
/// no `StyleBlock` remains either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
	Element {
		tag: String,
		attributes: PropertyMap,
		children: Vec<Node>,
	},
	Text(String),
	/// A `--` generator comment, rendered as an HTML comment.
	Comment(String),
	/// Raw content emitted unmodified.
	Origin {
		subtype: String,
		content: String,
	},
	/// `[Origin] @Type name [from ns];`
	OriginUsage {
		subtype: String,
		name: String,
		namespace: Option<String>,
	},
	/// `[Origin] @Type name { raw }`
	OriginDef(OriginDef),
	StyleBlock(StyleBlock),
	StyleTemplate(StyleDef),
	CustomStyle(StyleDef),
	ElementTemplate(ElementDef),
	CustomElement(ElementDef),
	VarTemplate(VarDef),
	CustomVar(VarDef),
	/// `@Element Name [from ns] [{ instructions }]`
	ElementUsage(ElementUsage),
	/// `[Import] @Chtl from "path" [as alias];`
	Import {
		path: String,
		alias: Option<String>,
	},
	/// `[Configuration] { ... }`
	Configuration {
		settings: PropertyMap,
		keywords: IndexMap<String, Vec<String>>,
	},
	/// `use target;`
	Use(String),
}

impl Node {
	/// Convenience constructor for an element without attributes.
	pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
		Self::Element {
			tag: tag.into(),
			attributes: PropertyMap::new(),
			children,
		}
	}

	pub fn text(content: impl Into<String>) -> Self {
		Self::Text(content.into())
	}

	/// The tag of an element node.
	pub fn tag(&self) -> Option<&str> {
		match self {
			Self::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}

	/// True for nodes that only exist to define or configure something and
	/// never render.
	pub fn is_definition(&self) -> bool {
		matches!(
			self,
			Self::OriginDef(_)
				| Self::StyleTemplate(_)
				| Self::CustomStyle(_)
				| Self::ElementTemplate(_)
				| Self::CustomElement(_)
				| Self::VarTemplate(_)
				| Self::CustomVar(_)
				| Self::Import { .. }
				| Self::Configuration { .. }
		)
	}
}

/// A reference to a definition by name, optionally in an explicit
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
	pub name: String,
	pub namespace: Option<String>,
}

impl Reference {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			namespace: None,
		}
	}
}

/// `style { }` as it appears inside an element or at the top level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleBlock {
	pub properties: PropertyMap,
	pub rules: Vec<SelectorRule>,
	pub usages: Vec<StyleTemplateUsage>,
}

/// `selector { property: value; }` inside a style block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRule {
	pub selector: String,
	pub properties: PropertyMap,
}

/// The body of a `[Template] @Style` or `[Custom] @Style` definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleDef {
	pub name: String,
	pub properties: PropertyMap,
	/// Properties declared without a value (`[Custom]` only), filled at the
	/// usage site.
	pub valueless: Vec<String>,
	/// Inherited templates in declaration order.
	pub parents: Vec<Reference>,
}

/// The body of a `[Template] @Element` or `[Custom] @Element` definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementDef {
	pub name: String,
	pub children: Vec<Node>,
}

/// The body of a `[Template] @Var` or `[Custom] @Var` definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarDef {
	pub name: String,
	pub variables: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginDef {
	pub subtype: String,
	pub name: String,
	pub content: String,
}

/// `@Style Name [from ns] [{ overrides; delete a, b; }]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleTemplateUsage {
	pub reference: Reference,
	pub overrides: PropertyMap,
	pub deletions: Vec<String>,
}

/// `@Element Name [from ns] [{ instructions }]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementUsage {
	pub reference: Reference,
	pub instructions: Vec<Instruction>,
}

/// A specialization applied to an expanded element template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
	Delete(DeleteInstruction),
	Insert(InsertInstruction),
}

/// `delete tag;` or `delete tag[n];`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteInstruction {
	pub selector: TagSelector,
}

/// `insert <mode> [selector] { body }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertInstruction {
	pub mode: InsertMode,
	/// Absent for `at top` and `at bottom`.
	pub target: Option<TagSelector>,
	pub body: Vec<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
	Before,
	After,
	Replace,
	AtTop,
	AtBottom,
}

/// `tag` or `tag[n]`. The index is stored zero-based regardless of the
/// configured `INDEX_INITIAL_COUNT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSelector {
	pub tag: String,
	pub index: Option<usize>,
}

impl TagSelector {
	/// Position in `nodes` of the element this selector picks: the n-th
	/// element with a matching tag, or the first when no index is given.
	pub fn find(&self, nodes: &[Node]) -> Option<usize> {
		let wanted = self.index.unwrap_or(0);
		nodes
			.iter()
			.enumerate()
			.filter(|(_, node)| node.tag() == Some(self.tag.as_str()))
			.nth(wanted)
			.map(|(position, _)| position)
	}
}

impl std::fmt::Display for TagSelector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.index {
			Some(index) => write!(f, "{}[{index}]", self.tag),
			None => write!(f, "{}", self.tag),
		}
	}
}
