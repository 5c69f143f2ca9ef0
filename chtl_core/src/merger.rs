use crate::ChtlResult;
use crate::Fragment;
use crate::FragmentKind;
use crate::Generated;

/// Turns a global `style { }` fragment into CSS.
pub trait CssCompiler {
	fn compile_css(&self, fragment: &Fragment) -> ChtlResult<String>;
}

/// Turns a `script { }` fragment into JavaScript.
pub trait ScriptCompiler {
	fn compile_script(&self, fragment: &Fragment) -> ChtlResult<String>;
}

/// Returns fragment bodies unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl CssCompiler for PassThrough {
	fn compile_css(&self, fragment: &Fragment) -> ChtlResult<String> {
		Ok(fragment.content.clone())
	}
}

impl ScriptCompiler for PassThrough {
	fn compile_script(&self, fragment: &Fragment) -> ChtlResult<String> {
		Ok(fragment.content.clone())
	}
}

/// The final document and the pieces it was assembled from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Merged {
	pub html: String,
	/// Global CSS followed by the generated rules.
	pub stylesheet: String,
	pub scripts: Vec<String>,
}

/// Assemble the document: the stylesheet goes into `<head>` (or a minimal
/// skeleton when there is none) and scripts go before `</body>`.
pub fn merge(
	generated: &Generated,
	fragments: &[Fragment],
	css: &dyn CssCompiler,
	script: &dyn ScriptCompiler,
	force_doctype: bool,
) -> ChtlResult<Merged> {
	let mut styles = vec![];
	let mut scripts = vec![];

	for fragment in fragments {
		match fragment.kind {
			FragmentKind::Chtl => {}
			FragmentKind::GlobalCss => styles.push(css.compile_css(fragment)?.trim().to_string()),
			FragmentKind::GlobalJs | FragmentKind::LocalScript => {
				scripts.push(script.compile_script(fragment)?.trim().to_string());
			}
		}
	}
	if !generated.stylesheet.is_empty() {
		styles.push(generated.stylesheet.clone());
	}
	styles.retain(|style| !style.is_empty());
	scripts.retain(|script| !script.is_empty());

	let stylesheet = styles.join("\n");
	let style_block = if stylesheet.is_empty() {
		String::new()
	} else {
		format!("<style>{stylesheet}</style>")
	};
	let script_block = if scripts.is_empty() {
		String::new()
	} else {
		format!("<script>{}</script>", scripts.join("\n"))
	};

	let body = &generated.body;
	let mut html = if style_block.is_empty() && script_block.is_empty() {
		body.clone()
	} else if let Some(head_end) = body.find("</head>") {
		let mut html = body.clone();
		html.insert_str(head_end, &style_block);
		match html.rfind("</body>") {
			Some(body_end) => html.insert_str(body_end, &script_block),
			None => html.push_str(&script_block),
		}
		html
	} else {
		format!("<html><head>{style_block}</head><body>{body}{script_block}</body></html>")
	};

	if generated.doctype || force_doctype {
		html.insert_str(0, "<!DOCTYPE html>");
	}

	Ok(Merged {
		html,
		stylesheet,
		scripts,
	})
}
