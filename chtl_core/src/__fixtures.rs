use crate::ChtlError;
use crate::ChtlResult;
use crate::CompileContext;
use crate::CompileOptions;
use crate::CompileOutput;
use crate::MemoryLoader;
use crate::StrictConfig;
use crate::ast::Node;
use crate::ast::PropertyMap;
use crate::compile;
use crate::expand::expand;
use crate::expression::Scope;
use crate::expression::StyleOwner;
use crate::expression::Value;
use crate::expression::evaluate;
use crate::expression::parse as parse_expression;
use crate::expression::tokenize as tokenize_expression;
use crate::lexer::Lexer;
use crate::parser::parse;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// Entry path used by every in-memory import test.
pub(crate) const MAIN_PATH: &str = "/project/main.chtl";

pub(crate) const PAIR_TEMPLATE: &str = r#"
[Template] @Element Pair {
	span { text { "first" } }
	span { text { "second" } }
	div { }
}
"#;

pub(crate) fn compile_str(source: &str) -> ChtlResult<CompileOutput> {
	compile(source, &CompileOptions::default())
}

pub(crate) fn compile_strict(source: &str) -> ChtlResult<CompileOutput> {
	compile(
		source,
		&CompileOptions::default().with_strict(StrictConfig::strict()),
	)
}

pub(crate) fn compile_with_loader(source: &str, loader: MemoryLoader) -> ChtlResult<CompileOutput> {
	let options = CompileOptions::default()
		.with_entry(MAIN_PATH)
		.with_loader(loader);
	compile(source, &options)
}

pub(crate) fn expect_error<T: std::fmt::Debug>(result: ChtlResult<T>) -> ChtlError {
	match result {
		Ok(value) => panic!("expected an error, got {value:?}"),
		Err(error) => error,
	}
}

/// Parse a single unit into a fresh context.
pub(crate) fn parse_str(source: &str) -> ChtlResult<(Vec<Node>, CompileContext)> {
	let mut context = CompileContext::new(StrictConfig::default());
	let nodes = parse(source, &mut context)?;
	Ok((nodes, context))
}

pub(crate) fn expand_str(source: &str) -> ChtlResult<Vec<Node>> {
	let (nodes, mut context) = parse_str(source)?;
	expand(nodes, &mut context)
}

pub(crate) fn lex_all(lexer: &mut Lexer<'_>) -> ChtlResult<Vec<Token>> {
	let mut tokens = vec![];
	loop {
		let token = lexer.next_token()?;
		if token.is(TokenKind::Eof) {
			return Ok(tokens);
		}
		tokens.push(token);
	}
}

/// A scope with no properties and no Var templates.
pub(crate) struct EmptyScope;

impl Scope for EmptyScope {
	fn local(&mut self, _name: &str) -> Option<Value> {
		None
	}

	fn remote(&mut self, selector: &str, property: &str) -> ChtlResult<Value> {
		Err(ChtlError::UnresolvedReference {
			reference: format!("{selector}.{property}"),
		})
	}

	fn var(&mut self, template: &str, _variable: &str) -> ChtlResult<Value> {
		Err(ChtlError::Evaluation(format!("no Var template `{template}`")))
	}
}

pub(crate) fn eval_str(input: &str) -> ChtlResult<Value> {
	let tokens = tokenize_expression(input)
		.ok_or_else(|| ChtlError::Evaluation(format!("cannot tokenize `{input}`")))?;
	let expr = parse_expression(&tokens)
		.ok_or_else(|| ChtlError::Evaluation(format!("cannot parse `{input}`")))?;
	evaluate(&expr, &mut EmptyScope)
}

pub(crate) fn property_map(pairs: &[(&str, &str)]) -> PropertyMap {
	pairs
		.iter()
		.map(|(name, value)| ((*name).to_string(), (*value).to_string()))
		.collect()
}

pub(crate) fn element_owner(id: Option<&str>, properties: &[(&str, &str)]) -> StyleOwner {
	StyleOwner {
		label: id.map_or_else(|| "div".to_string(), |id| format!("#{id}")),
		id: id.map(str::to_string),
		properties: property_map(properties),
		..StyleOwner::default()
	}
}

/// The element with the given tag, searching depth first.
pub(crate) fn find_element<'n>(nodes: &'n [Node], wanted: &str) -> Option<&'n Node> {
	nodes.iter().find_map(|node| {
		match node {
			Node::Element { tag, children, .. } => {
				if tag == wanted {
					Some(node)
				} else {
					find_element(children, wanted)
				}
			}
			_ => None,
		}
	})
}
