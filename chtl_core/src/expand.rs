use crate::ChtlError;
use crate::ChtlResult;
use crate::CompileContext;
use crate::ast::ElementUsage;
use crate::ast::InsertMode;
use crate::ast::Instruction;
use crate::ast::Node;
use crate::ast::Reference;
use crate::registry::DEFAULT_NAMESPACE;
use crate::registry::DefinitionKind;

/// Replace every element-template and origin usage with the content it
/// names, and drop definition nodes.
///
/// A usage is replaced by a clone of the template's children. Its
/// specialization instructions are applied to that clone first, then usages
/// left in the result are expanded until none remain. Instructions only see
/// the template's own children, never nodes produced by nested usages. The
/// registered definition is never modified. Running this again on its own
/// output changes nothing.
pub fn expand(nodes: Vec<Node>, context: &mut CompileContext) -> ChtlResult<Vec<Node>> {
	let mut expander = Expander {
		context,
		stack: vec![],
	};
	expander.expand_list(nodes)
}

struct Expander<'c> {
	context: &'c mut CompileContext,
	/// `(namespace, name)` of every template currently being expanded.
	stack: Vec<(String, String)>,
}

impl Expander<'_> {
	fn expand_list(&mut self, nodes: Vec<Node>) -> ChtlResult<Vec<Node>> {
		let mut expanded = Vec::with_capacity(nodes.len());

		for node in nodes {
			match node {
				Node::ElementUsage(usage) => {
					expanded.extend(self.expand_usage(usage)?);
				}
				Node::OriginUsage {
					subtype,
					name,
					namespace,
				} => {
					let reference = Reference { name, namespace };
					let lookup_namespace = reference.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
					let origin = self
						.context
						.registry
						.lookup(lookup_namespace, DefinitionKind::Origin, &reference.name)
						.and_then(|found| found.definition.as_origin().cloned());

					match origin {
						Some(def) => {
							if def.subtype != subtype {
								tracing::debug!(
									name = %reference.name,
									expected = %subtype,
									found = %def.subtype,
									"origin usage type differs from its definition"
								);
							}
							expanded.push(Node::Origin {
								subtype: def.subtype,
								content: def.content,
							});
						}
						None => self.context.unresolved(DefinitionKind::Origin, &reference)?,
					}
				}
				Node::Element {
					tag,
					attributes,
					children,
				} => {
					let children = self.expand_list(children)?;
					expanded.push(Node::Element {
						tag,
						attributes,
						children,
					});
				}
				node if node.is_definition() => {}
				node => expanded.push(node),
			}
		}

		Ok(expanded)
	}

	fn expand_usage(&mut self, usage: ElementUsage) -> ChtlResult<Vec<Node>> {
		let ElementUsage {
			reference,
			instructions,
		} = usage;
		let lookup_namespace = reference.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);

		let Some(found) = self
			.context
			.registry
			.lookup(lookup_namespace, DefinitionKind::Element, &reference.name)
		else {
			self.context.unresolved(DefinitionKind::Element, &reference)?;
			return Ok(vec![]);
		};

		let key = (found.namespace.to_string(), reference.name.clone());
		let Some(def) = found.definition.as_element() else {
			return Ok(vec![]);
		};
		let mut children = def.children.clone();

		if self.stack.contains(&key) {
			return Err(ChtlError::RecursiveTemplate {
				name: reference.name,
			});
		}

		for instruction in instructions {
			self.apply(&mut children, instruction)?;
		}

		tracing::trace!(name = %reference.name, namespace = %key.0, "expanding element template");
		self.stack.push(key);
		let result = self.expand_list(children);
		self.stack.pop();
		result
	}

	fn apply(&mut self, children: &mut Vec<Node>, instruction: Instruction) -> ChtlResult<()> {
		match instruction {
			Instruction::Delete(delete) => {
				let selector = delete.selector;
				match selector.index {
					Some(_) => {
						if let Some(position) = selector.find(children) {
							children.remove(position);
						} else {
							tracing::debug!(%selector, "delete target not found");
						}
					}
					None => {
						children.retain(|child| child.tag() != Some(selector.tag.as_str()));
					}
				}
			}
			Instruction::Insert(insert) => {
				let body = self.expand_list(insert.body)?;
				let position = match (insert.mode, &insert.target) {
					(InsertMode::AtTop, _) => Some(0..0),
					(InsertMode::AtBottom, _) => Some(children.len()..children.len()),
					(mode, Some(target)) => {
						target.find(children).map(|found| {
							match mode {
								InsertMode::Before => found..found,
								InsertMode::Replace => found..found + 1,
								_ => found + 1..found + 1,
							}
						})
					}
					(_, None) => None,
				};

				match position {
					Some(range) => {
						children.splice(range, body);
					}
					None => tracing::debug!(mode = ?insert.mode, "insert target not found"),
				}
			}
		}

		Ok(())
	}
}
