use crate::SheetEntry;
use crate::ast::Node;

/// Elements that never have a closing tag.
pub const VOID_ELEMENTS: [&str; 14] = [
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
	"track", "wbr",
];

/// The rendered document before it is merged with global CSS and scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generated {
	/// Set by a top-level `use html5;`.
	pub doctype: bool,
	pub body: String,
	/// Serialized stylesheet rules, without a `<style>` wrapper.
	pub stylesheet: String,
}

/// Render a fully expanded and style-resolved tree.
pub fn generate(nodes: &[Node], sheet: &[SheetEntry]) -> Generated {
	let doctype = nodes
		.iter()
		.any(|node| matches!(node, Node::Use(target) if target.eq_ignore_ascii_case("html5")));

	let mut body = String::new();
	for node in nodes {
		render_node(node, &mut body);
	}

	Generated {
		doctype,
		body,
		stylesheet: render_stylesheet(sheet),
	}
}

fn render_node(node: &Node, out: &mut String) {
	match node {
		Node::Element {
			tag,
			attributes,
			children,
		} => {
			out.push('<');
			out.push_str(tag);
			for (name, value) in attributes {
				out.push(' ');
				out.push_str(name);
				out.push_str("=\"");
				out.push_str(&value.replace('"', "&quot;"));
				out.push('"');
			}
			out.push('>');

			if children.is_empty() && VOID_ELEMENTS.contains(&tag.as_str()) {
				return;
			}

			for child in children {
				render_node(child, out);
			}
			out.push_str("</");
			out.push_str(tag);
			out.push('>');
		}
		Node::Text(text) => out.push_str(text),
		Node::Comment(text) => {
			out.push_str("<!-- ");
			out.push_str(text);
			out.push_str(" -->");
		}
		Node::Origin { content, .. } => out.push_str(content),
		Node::Use(_) => {}
		other => tracing::debug!(node = ?other, "skipping unresolved node during generation"),
	}
}

/// Render stylesheet entries one per line, e.g. `.greet { color: green; }`.
pub fn render_stylesheet(sheet: &[SheetEntry]) -> String {
	sheet
		.iter()
		.map(|entry| {
			match entry {
				SheetEntry::Rule(rule) => {
					let declarations: String = rule
						.properties
						.iter()
						.map(|(name, value)| format!(" {name}: {value};"))
						.collect();
					format!("{} {{{declarations} }}", rule.selector)
				}
				SheetEntry::Comment(comment) => format!("/* {comment} */"),
			}
		})
		.collect::<Vec<_>>()
		.join("\n")
}
