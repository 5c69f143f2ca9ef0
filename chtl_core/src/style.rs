use crate::ChtlError;
use crate::ChtlResult;
use crate::CompileContext;
use crate::ast::Node;
use crate::ast::PropertyMap;
use crate::ast::Reference;
use crate::ast::SelectorRule;
use crate::ast::StyleBlock;
use crate::ast::StyleTemplateUsage;
use crate::expression::StyleOwner;
use crate::expression::evaluate_properties;
use crate::registry::DEFAULT_NAMESPACE;
use crate::registry::DefinitionKind;

/// One entry of the document stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetEntry {
	Rule(SelectorRule),
	/// Emitted as a CSS comment, e.g. for a `&` rule with no selector to
	/// stand in for.
	Comment(String),
}

/// Remove every style block from the tree. Element-level properties end up
/// in the element's `style` attribute, selector rules in the returned
/// stylesheet.
pub fn resolve_styles(
	nodes: Vec<Node>,
	context: &mut CompileContext,
) -> ChtlResult<(Vec<Node>, Vec<SheetEntry>)> {
	let mut resolver = Resolver {
		context,
		elements: vec![],
		rules: vec![],
		sheet: vec![],
	};
	let mut nodes = resolver.walk(nodes, None)?;

	let Resolver {
		context,
		elements,
		rules,
		sheet,
	} = resolver;
	let evaluated = evaluate_properties(&elements, &rules, &context.registry)?;

	let mut element_styles = evaluated.elements.into_iter();
	apply_inline_styles(&mut nodes, &mut element_styles);

	let mut rule_properties = evaluated.rules.into_iter();
	let sheet = sheet
		.into_iter()
		.map(|entry| {
			match entry {
				PendingEntry::Rule(selector) => {
					SheetEntry::Rule(SelectorRule {
						selector,
						properties: rule_properties.next().unwrap_or_default(),
					})
				}
				PendingEntry::Comment(comment) => SheetEntry::Comment(comment),
			}
		})
		.collect();

	Ok((nodes, sheet))
}

/// A stylesheet entry whose properties are still unevaluated. Rules take
/// their properties from `Resolver::rules` in order.
enum PendingEntry {
	Rule(String),
	Comment(String),
}

struct Resolver<'c> {
	context: &'c mut CompileContext,
	/// One entry per element, in document order.
	elements: Vec<StyleOwner>,
	rules: Vec<StyleOwner>,
	sheet: Vec<PendingEntry>,
}

/// The element whose children are being walked.
struct Parent<'p> {
	tag: &'p str,
	attributes: &'p mut PropertyMap,
}

impl Resolver<'_> {
	fn walk(&mut self, nodes: Vec<Node>, mut parent: Option<Parent<'_>>) -> ChtlResult<Vec<Node>> {
		let mut blocks = vec![];
		let mut kept = Vec::with_capacity(nodes.len());

		for node in nodes {
			match node {
				Node::StyleBlock(block) => blocks.push(block),
				node => kept.push(node),
			}
		}

		match parent.as_mut() {
			Some(parent) => self.element_styles(parent, blocks)?,
			None => {
				for block in blocks {
					self.global_block(block);
				}
			}
		}

		let mut walked = Vec::with_capacity(kept.len());
		for node in kept {
			match node {
				Node::Element {
					tag,
					mut attributes,
					children,
				} => {
					let children = self.walk(
						children,
						Some(Parent {
							tag: &tag,
							attributes: &mut attributes,
						}),
					)?;
					walked.push(Node::Element {
						tag,
						attributes,
						children,
					});
				}
				node => walked.push(node),
			}
		}

		Ok(walked)
	}

	/// A style block outside any element only contributes its rules, unchanged.
	fn global_block(&mut self, block: StyleBlock) {
		if !block.properties.is_empty() || !block.usages.is_empty() {
			tracing::debug!("ignoring properties of a style block outside any element");
		}

		for rule in block.rules {
			self.push_rule(rule);
		}
	}

	fn push_rule(&mut self, rule: SelectorRule) {
		self.sheet.push(PendingEntry::Rule(rule.selector.clone()));
		self.rules.push(StyleOwner {
			label: rule.selector,
			properties: rule.properties,
			..StyleOwner::default()
		});
	}

	/// Resolve the style blocks of one element and record the element for
	/// expression evaluation. Must run before the element's children are
	/// walked so that elements are recorded in document order.
	fn element_styles(&mut self, parent: &mut Parent<'_>, blocks: Vec<StyleBlock>) -> ChtlResult<()> {
		let mut properties = PropertyMap::new();

		for block in blocks {
			for usage in &block.usages {
				if let Some(resolved) = self.resolve_usage(usage)? {
					properties.extend(resolved);
				}
			}
			properties.extend(block.properties);

			let primary = primary_selector(&block.rules, parent.attributes);
			for rule in block.rules {
				self.element_rule(parent, primary.as_deref(), rule);
			}
		}

		let id = parent.attributes.get("id").cloned();
		let classes = class_tokens(parent.attributes);
		let label = match (&id, classes.first()) {
			(Some(id), _) => format!("#{id}"),
			(None, Some(class)) => format!(".{class}"),
			(None, None) => parent.tag.to_string(),
		};

		self.elements.push(StyleOwner {
			label,
			id,
			classes,
			attributes: parent.attributes.clone(),
			properties,
		});

		Ok(())
	}

	fn element_rule(&mut self, parent: &mut Parent<'_>, primary: Option<&str>, rule: SelectorRule) {
		let SelectorRule {
			selector,
			properties,
		} = rule;

		if selector.starts_with('&') {
			let Some(primary) = primary else {
				self.sheet.push(PendingEntry::Comment(format!(
					"no class or id on <{}> to replace `&` in `{selector}`",
					parent.tag
				)));
				return;
			};
			self.push_rule(SelectorRule {
				selector: selector.replace('&', primary),
				properties,
			});
			return;
		}

		if let Some(class) = selector.strip_prefix('.').map(leading_name) {
			add_class(parent.attributes, class);
		} else if let Some(id) = selector.strip_prefix('#').map(leading_name) {
			parent.attributes.insert("id".into(), id.to_string());
		}

		self.push_rule(SelectorRule {
			selector,
			properties,
		});
	}

	/// Flatten a `@Style` usage into a property map. `None` when the usage
	/// names no definition and the policy allows skipping it.
	fn resolve_usage(&mut self, usage: &StyleTemplateUsage) -> ChtlResult<Option<PropertyMap>> {
		let Some(mut properties) = self.flatten(&usage.reference, &mut vec![])? else {
			return Ok(None);
		};

		properties.extend(usage.overrides.clone());
		for deleted in &usage.deletions {
			properties.shift_remove(deleted);
		}

		Ok(Some(properties))
	}

	/// A template's own properties, overlaid by each parent in declaration
	/// order, overlaid by its own properties again. Custom valueless
	/// properties are absent until a usage supplies them.
	fn flatten(
		&mut self,
		reference: &Reference,
		stack: &mut Vec<String>,
	) -> ChtlResult<Option<PropertyMap>> {
		let namespace = reference.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
		let def = self
			.context
			.registry
			.lookup(namespace, DefinitionKind::Style, &reference.name)
			.and_then(|found| found.definition.as_style().cloned());

		let Some(def) = def else {
			self.context.unresolved(DefinitionKind::Style, reference)?;
			return Ok(None);
		};

		if stack.contains(&def.name) {
			return Err(ChtlError::RecursiveTemplate { name: def.name });
		}
		stack.push(def.name.clone());

		let mut properties = def.properties.clone();
		for parent in &def.parents {
			if let Some(inherited) = self.flatten(parent, stack)? {
				properties.extend(inherited);
			}
		}
		properties.extend(def.properties);

		stack.pop();
		Ok(Some(properties))
	}
}

/// The selector `&` stands for: the block's first class rule without a
/// pseudo-class, else the element's first class, else the block's first id
/// rule without a pseudo-class, else the element's id. A rule selector is cut
/// at its first space, so `.a.b` stays whole and `.a .b` becomes `.a`.
fn primary_selector(rules: &[SelectorRule], attributes: &PropertyMap) -> Option<String> {
	let bare = |prefix: char| {
		rules
			.iter()
			.map(|rule| rule.selector.trim())
			.find(|selector| {
				selector.len() > 1 && selector.starts_with(prefix) && !selector.contains(':')
			})
			.and_then(|selector| selector.split_whitespace().next())
			.map(str::to_string)
	};

	bare('.')
		.or_else(|| class_tokens(attributes).first().map(|class| format!(".{class}")))
		.or_else(|| bare('#'))
		.or_else(|| attributes.get("id").map(|id| format!("#{id}")))
}

/// The identifier at the start of a selector fragment: `box` in
/// `box:hover`.
fn leading_name(selector: &str) -> &str {
	let end = selector
		.find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'))
		.unwrap_or(selector.len());
	&selector[..end]
}

fn class_tokens(attributes: &PropertyMap) -> Vec<String> {
	attributes
		.get("class")
		.map(|classes| classes.split_whitespace().map(str::to_string).collect())
		.unwrap_or_default()
}

fn add_class(attributes: &mut PropertyMap, class: &str) {
	if class.is_empty() {
		return;
	}

	match attributes.get_mut("class") {
		Some(existing) => {
			if !existing.split_whitespace().any(|token| token == class) {
				if !existing.trim().is_empty() {
					existing.push(' ');
				}
				existing.push_str(class);
			}
		}
		None => {
			attributes.insert("class".into(), class.to_string());
		}
	}
}

/// Append evaluated properties to each element's `style` attribute, taking
/// one map per element in document order.
fn apply_inline_styles(nodes: &mut [Node], styles: &mut impl Iterator<Item = PropertyMap>) {
	for node in nodes {
		let Node::Element {
			attributes,
			children,
			..
		} = node
		else {
			continue;
		};

		let properties = styles.next().unwrap_or_default();
		if !properties.is_empty() {
			let declarations: String = properties
				.iter()
				.map(|(name, value)| format!("{name}:{value};"))
				.collect();

			let style = attributes.entry("style".to_string()).or_default();
			if !style.trim().is_empty() && !style.trim_end().ends_with(';') {
				style.push(';');
			}
			style.push_str(&declarations);
		}

		apply_inline_styles(children, styles);
	}
}
