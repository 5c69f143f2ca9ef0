use std::collections::HashMap;
use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;

use super::eval::Scope;
use super::eval::evaluate;
use super::parser::Expr;
use super::parser::StyleValue;
use super::parser::analyze;
use super::value::Value;
use crate::ChtlError;
use crate::ChtlResult;
use crate::ast::PropertyMap;
use crate::registry::DEFAULT_NAMESPACE;
use crate::registry::DefinitionKind;
use crate::registry::Registry;

/// What owns a style property: an element (by document order) or a
/// stylesheet rule. `Attribute` keys an element's attribute when another
/// property reads it through `#id.name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
	Element(usize),
	Rule(usize),
	Attribute(usize),
}

impl Owner {
	/// The owner whose properties bare identifiers resolve against.
	fn context(self) -> Self {
		match self {
			Self::Attribute(index) => Self::Element(index),
			owner => owner,
		}
	}
}

/// Identity of one property for dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyKey {
	pub owner: Owner,
	pub name: String,
}

/// The evaluator's view of something that declares style properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleOwner {
	/// Used in error messages, e.g. `#box` or `.card:hover`.
	pub label: String,
	pub id: Option<String>,
	pub classes: Vec<String>,
	pub attributes: PropertyMap,
	pub properties: PropertyMap,
}

impl StyleOwner {
	fn matches(&self, selector: &str) -> bool {
		if let Some(id) = selector.strip_prefix('#') {
			return self.id.as_deref() == Some(id);
		}
		if let Some(class) = selector.strip_prefix('.') {
			return self.classes.iter().any(|existing| existing == class);
		}
		false
	}
}

/// Evaluated properties, in the same order as the inputs. Properties that
/// evaluate to nothing are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluated {
	pub elements: Vec<PropertyMap>,
	pub rules: Vec<PropertyMap>,
}

/// Evaluate every property of every owner.
///
/// Plain CSS values are kept as written. Expressions are evaluated once each
/// in dependency order, so a property can read another property (on the
/// same owner, or on an element found by `#id`/`.class`) regardless of
/// where it is declared. A reference to an element attribute evaluates the
/// attribute's text as an expression in that element's context. A
/// dependency cycle fails with [`ChtlError::ReferenceCycle`].
pub fn evaluate_properties(
	elements: &[StyleOwner],
	rules: &[StyleOwner],
	registry: &Registry,
) -> ChtlResult<Evaluated> {
	let sheet = Sheet {
		elements,
		rules,
		registry,
	};
	let is_var = |name: &str| sheet.var_raw(name, None).is_some();

	let mut values: HashMap<PropertyKey, StyleValue> = HashMap::new();
	let mut graph: DiGraph<PropertyKey, ()> = DiGraph::new();
	let mut indices: HashMap<PropertyKey, NodeIndex> = HashMap::new();

	for (owner, style_owner) in sheet.owners() {
		for (name, raw) in &style_owner.properties {
			let key = PropertyKey {
				owner,
				name: name.clone(),
			};
			indices.insert(key.clone(), graph.add_node(key.clone()));
			values.insert(key, analyze(raw, &is_var));
		}
	}

	let mut pending: Vec<PropertyKey> = values.keys().cloned().collect();
	while let Some(key) = pending.pop() {
		let Some(StyleValue::Expression(expr)) = values.get(&key) else {
			continue;
		};

		let mut dependencies = HashSet::new();
		sheet.dependencies(key.owner.context(), expr, &mut HashSet::new(), &mut dependencies);
		for dependency in dependencies {
			if let Owner::Attribute(target) = dependency.owner
				&& !indices.contains_key(&dependency)
			{
				let raw = sheet.elements[target]
					.attributes
					.get(&dependency.name)
					.map_or("", String::as_str);
				indices.insert(dependency.clone(), graph.add_node(dependency.clone()));
				values.insert(dependency.clone(), analyze(raw, &is_var));
				pending.push(dependency.clone());
			}
			if let (Some(from), Some(to)) = (indices.get(&dependency), indices.get(&key)) {
				graph.update_edge(*from, *to, ());
			}
		}
	}

	let order = toposort(&graph, None).map_err(|cycle| {
		ChtlError::ReferenceCycle {
			property: sheet.describe(&graph[cycle.node_id()]),
		}
	})?;

	let mut memo: HashMap<PropertyKey, Value> = HashMap::new();
	for index in order {
		let key = &graph[index];
		let value = match &values[key] {
			StyleValue::Literal(raw) => Value::from_literal(raw),
			StyleValue::Expression(expr) => {
				let mut scope = GraphScope {
					sheet: &sheet,
					owner: key.owner.context(),
					memo: &memo,
					var_stack: vec![],
				};
				let value = evaluate(expr, &mut scope)?;
				tracing::trace!(property = %sheet.describe(key), %value, "evaluated style expression");
				value
			}
		};
		memo.insert(key.clone(), value);
	}

	let output = |owner: Owner, style_owner: &StyleOwner| {
		let mut properties = PropertyMap::new();
		for (name, raw) in &style_owner.properties {
			let key = PropertyKey {
				owner,
				name: name.clone(),
			};
			match (&values[&key], memo.get(&key)) {
				(StyleValue::Literal(_), _) => {
					properties.insert(name.clone(), raw.clone());
				}
				(StyleValue::Expression(_), Some(Value::Empty) | None) => {}
				(StyleValue::Expression(_), Some(value)) => {
					properties.insert(name.clone(), value.to_string());
				}
			}
		}
		properties
	};

	Ok(Evaluated {
		elements: elements
			.iter()
			.enumerate()
			.map(|(index, owner)| output(Owner::Element(index), owner))
			.collect(),
		rules: rules
			.iter()
			.enumerate()
			.map(|(index, owner)| output(Owner::Rule(index), owner))
			.collect(),
	})
}

struct Sheet<'s> {
	elements: &'s [StyleOwner],
	rules: &'s [StyleOwner],
	registry: &'s Registry,
}

impl<'s> Sheet<'s> {
	fn owners(&self) -> impl Iterator<Item = (Owner, &'s StyleOwner)> {
		let elements = self
			.elements
			.iter()
			.enumerate()
			.map(|(index, owner)| (Owner::Element(index), owner));
		let rules = self
			.rules
			.iter()
			.enumerate()
			.map(|(index, owner)| (Owner::Rule(index), owner));
		elements.chain(rules)
	}

	fn owner(&self, owner: Owner) -> &'s StyleOwner {
		match owner {
			Owner::Element(index) | Owner::Attribute(index) => &self.elements[index],
			Owner::Rule(index) => &self.rules[index],
		}
	}

	/// First element in document order matching `#id` or `.class`.
	fn find_element(&self, selector: &str) -> Option<usize> {
		self.elements.iter().position(|owner| owner.matches(selector))
	}

	fn describe(&self, key: &PropertyKey) -> String {
		format!("{}.{}", self.owner(key.owner).label, key.name)
	}

	/// Raw value of a Var template variable, or of any variable at all when
	/// `variable` is `None`.
	fn var_raw(&self, template: &str, variable: Option<&str>) -> Option<&'s str> {
		let found = self
			.registry
			.lookup(DEFAULT_NAMESPACE, DefinitionKind::Var, template)?;
		let def = found.definition.as_var()?;
		match variable {
			Some(variable) => def.variables.get(variable).map(String::as_str),
			None => Some(""),
		}
	}

	/// Collect the properties `expr` reads when evaluated for `owner`.
	fn dependencies(
		&self,
		owner: Owner,
		expr: &Expr,
		visited_vars: &mut HashSet<(String, String)>,
		out: &mut HashSet<PropertyKey>,
	) {
		let is_var = |name: &str| self.var_raw(name, None).is_some();

		expr.walk(&mut |node| {
			match node {
				Expr::Identifier(name) if self.owner(owner).properties.contains_key(name) => {
					out.insert(PropertyKey {
						owner,
						name: name.clone(),
					});
				}
				Expr::Reference { selector, property } => {
					let Some(target) = self.find_element(selector) else {
						return;
					};
					let element = &self.elements[target];
					let owner = if element.properties.contains_key(property) {
						Owner::Element(target)
					} else if element.attributes.contains_key(property) {
						Owner::Attribute(target)
					} else {
						return;
					};
					out.insert(PropertyKey {
						owner,
						name: property.clone(),
					});
				}
				Expr::Call { .. } => {
					let Some((template, variable)) = node.as_var_call() else {
						return;
					};
					if !visited_vars.insert((template.to_string(), variable.to_string())) {
						return;
					}
					if let Some(raw) = self.var_raw(template, Some(variable))
						&& let StyleValue::Expression(inner) = analyze(raw, &is_var)
					{
						self.dependencies(owner, &inner, visited_vars, out);
					}
				}
				_ => {}
			}
		});
	}
}

struct GraphScope<'g, 's> {
	sheet: &'g Sheet<'s>,
	owner: Owner,
	memo: &'g HashMap<PropertyKey, Value>,
	var_stack: Vec<(String, String)>,
}

impl Scope for GraphScope<'_, '_> {
	fn local(&mut self, name: &str) -> Option<Value> {
		self.memo
			.get(&PropertyKey {
				owner: self.owner,
				name: name.to_string(),
			})
			.cloned()
	}

	fn remote(&mut self, selector: &str, property: &str) -> ChtlResult<Value> {
		let unresolved = || {
			ChtlError::UnresolvedReference {
				reference: format!("{selector}.{property}"),
			}
		};

		let target = self.sheet.find_element(selector).ok_or_else(unresolved)?;
		[Owner::Element(target), Owner::Attribute(target)]
			.into_iter()
			.find_map(|owner| {
				self.memo.get(&PropertyKey {
					owner,
					name: property.to_string(),
				})
			})
			.cloned()
			.ok_or_else(unresolved)
	}

	fn var(&mut self, template: &str, variable: &str) -> ChtlResult<Value> {
		let Some(raw) = self.sheet.var_raw(template, Some(variable)) else {
			return Err(ChtlError::Evaluation(format!(
				"Var template `{template}` has no variable `{variable}`"
			)));
		};

		let key = (template.to_string(), variable.to_string());
		if self.var_stack.contains(&key) {
			return Err(ChtlError::Evaluation(format!(
				"`{template}({variable})` refers to itself"
			)));
		}

		let sheet = self.sheet;
		let is_var = |name: &str| sheet.var_raw(name, None).is_some();
		match analyze(raw, &is_var) {
			StyleValue::Literal(raw) => Ok(Value::from_literal(&raw)),
			StyleValue::Expression(expr) => {
				self.var_stack.push(key);
				let result = evaluate(&expr, self);
				self.var_stack.pop();
				result
			}
		}
	}
}
