use std::path::Path;

use rstest::rstest;
use similar_asserts::assert_eq;
use tracing_test::traced_test;

use super::__fixtures::*;
use super::*;
use crate::ast::InsertMode;
use crate::ast::Instruction;
use crate::ast::Node;
use crate::ast::StyleDef;
use crate::ast::TagSelector;
use crate::expand::expand;
use crate::expression::StyleValue;
use crate::expression::Value;
use crate::expression::analyze;
use crate::expression::evaluate_properties;
use crate::lexer::Lexer;
use crate::lexer::tokenize;
use crate::registry::DEFAULT_NAMESPACE;
use crate::registry::Definition;
use crate::registry::DefinitionKind;
use crate::registry::Registry;
use crate::tokens::Keyword;
use crate::tokens::KeywordTable;
use crate::tokens::TokenKind;

#[rstest]
#[case::symbols("{ } [ ] : = ; , . @ # &", vec![
	(TokenKind::LeftBrace, "{"),
	(TokenKind::RightBrace, "}"),
	(TokenKind::LeftBracket, "["),
	(TokenKind::RightBracket, "]"),
	(TokenKind::Colon, ":"),
	(TokenKind::Equals, "="),
	(TokenKind::Semicolon, ";"),
	(TokenKind::Comma, ","),
	(TokenKind::Dot, "."),
	(TokenKind::At, "@"),
	(TokenKind::Hash, "#"),
	(TokenKind::Ampersand, "&"),
])]
#[case::numbers_with_units("100px 50% 1.5em 3", vec![
	(TokenKind::Number, "100px"),
	(TokenKind::Number, "50%"),
	(TokenKind::Number, "1.5em"),
	(TokenKind::Number, "3"),
])]
#[case::generator_comment("-- hello there\ndiv", vec![
	(TokenKind::GeneratorComment, "hello there"),
	(TokenKind::Identifier, "div"),
])]
#[case::strings(r#""double" 'single' "esc\"aped""#, vec![
	(TokenKind::String, "double"),
	(TokenKind::String, "single"),
	(TokenKind::String, "esc\"aped"),
])]
#[case::keywords("text style Template inherit use from", vec![
	(TokenKind::Keyword(Keyword::Text), "text"),
	(TokenKind::Keyword(Keyword::Style), "style"),
	(TokenKind::Keyword(Keyword::Template), "Template"),
	(TokenKind::Keyword(Keyword::Inherit), "inherit"),
	(TokenKind::Keyword(Keyword::Use), "use"),
	(TokenKind::Keyword(Keyword::From), "from"),
])]
#[case::comments_skipped("// line\n/* block\n comment */ div", vec![
	(TokenKind::Identifier, "div"),
])]
#[case::hyphenated_identifier("font-size my_class", vec![
	(TokenKind::Identifier, "font-size"),
	(TokenKind::Identifier, "my_class"),
])]
fn lex_tokens(#[case] input: &str, #[case] expected: Vec<(TokenKind, &str)>) -> ChtlResult<()> {
	let tokens = tokenize(input, &KeywordTable::default())?;
	let actual: Vec<(TokenKind, &str)> = tokens
		.iter()
		.map(|token| (token.kind, token.text.as_str()))
		.collect();
	assert_eq!(actual, expected);

	Ok(())
}

#[test]
fn lex_token_positions() -> ChtlResult<()> {
	let tokens = tokenize("div {\n  span\n}", &KeywordTable::default())?;
	let positions: Vec<Position> = tokens.iter().map(|token| token.position).collect();
	assert_eq!(
		positions,
		vec![
			Position::new(1, 1, 0),
			Position::new(1, 5, 4),
			Position::new(2, 3, 8),
			Position::new(3, 1, 13),
		]
	);

	Ok(())
}

#[test]
fn lex_remapped_keyword() -> ChtlResult<()> {
	let mut keywords = KeywordTable::default();
	keywords.remap(Keyword::Text, &["txt".to_string()]);

	let tokens = tokenize("txt text", &keywords)?;
	let kinds: Vec<TokenKind> = tokens.iter().map(|token| token.kind).collect();
	assert_eq!(
		kinds,
		vec![TokenKind::Keyword(Keyword::Text), TokenKind::Identifier]
	);
	assert_eq!(keywords.spellings(Keyword::Text), vec!["txt"]);
	assert!(!keywords.is_default());

	Ok(())
}

#[test]
fn lex_unknown_character_is_skipped_with_warning() -> ChtlResult<()> {
	let mut lexer = Lexer::new("div ~ span", &KeywordTable::default());
	let tokens = lex_all(&mut lexer)?;

	let texts: Vec<&str> = tokens.iter().map(|token| token.text.as_str()).collect();
	assert_eq!(texts, vec!["div", "span"]);
	assert_eq!(
		lexer.warnings(),
		&[Warning::UnknownCharacter {
			ch: '~',
			position: Position::new(1, 5, 4),
		}]
	);

	Ok(())
}

#[test]
fn lex_unknown_character_errors_under_strict_policy() {
	let mut lexer = Lexer::new("div ~ span", &KeywordTable::default()).with_policy(Policy::Error);
	let error = expect_error(lex_all(&mut lexer));

	assert!(
		matches!(
			error,
			ChtlError::UnknownCharacter {
				ch: '~',
				line: 1,
				column: 5
			}
		),
		"{error:?}"
	);
}

#[test]
fn lex_unterminated_block_comment() {
	let error = expect_error(tokenize("div /* never closed", &KeywordTable::default()));
	assert!(
		matches!(error, ChtlError::UnterminatedBlock { ref what, .. } if what == "block comment"),
		"{error:?}"
	);
}

#[rstest]
#[case::double(r#""quoted""#, Some("quoted"))]
#[case::single("'quoted'", Some("quoted"))]
#[case::padded(r#"  "padded"  "#, Some("padded"))]
#[case::bare("bare", None)]
#[case::two_strings(r#""a" "b""#, None)]
#[case::empty(r#""""#, Some(""))]
#[case::escaped(r#""say \"hi\"""#, Some("say \"hi\""))]
fn unquote_values(#[case] raw: &str, #[case] expected: Option<&str>) {
	assert_eq!(lexer::unquote(raw).as_deref(), expected);
}

#[test]
fn prescan_returns_raw_bodies() -> ChtlResult<()> {
	let source = "[Origin] @Html { <b>don't</b> } text { it's raw }";
	let tokens = lexer::prescan(source, &KeywordTable::default())?;
	let raw: Vec<&str> = tokens
		.iter()
		.filter(|token| token.is(TokenKind::RawBlock))
		.map(|token| token.text.as_str())
		.collect();
	assert_eq!(raw, vec![" <b>don't</b> ", " it's raw "]);

	Ok(())
}

#[rstest]
#[case::chtl_only("div { span { } }", vec![FragmentKind::Chtl])]
#[case::global_style(
	"style { body { margin: 0; } } div { }",
	vec![FragmentKind::GlobalCss, FragmentKind::Chtl]
)]
#[case::nested_style_stays(
	"div { style { color: red; } }",
	vec![FragmentKind::Chtl]
)]
#[case::global_and_local_script(
	"script { let a = 1; } div { script { go(); } }",
	vec![
		FragmentKind::GlobalJs,
		FragmentKind::Chtl,
		FragmentKind::LocalScript,
		FragmentKind::Chtl,
	]
)]
#[case::origin_braces_ignored(
	"[Origin] @Style { .a { color: red; } } script { run(); }",
	vec![FragmentKind::Chtl, FragmentKind::GlobalJs]
)]
#[case::keyword_in_string(
	r#"div { title: "style { x }"; }"#,
	vec![FragmentKind::Chtl]
)]
fn scan_fragment_kinds(#[case] source: &str, #[case] expected: Vec<FragmentKind>) -> ChtlResult<()> {
	let fragments = scan(source, &KeywordTable::default())?;
	let kinds: Vec<FragmentKind> = fragments.iter().map(|fragment| fragment.kind).collect();
	assert_eq!(kinds, expected);

	let rebuilt: String = fragments.iter().map(|fragment| fragment.text.as_str()).collect();
	assert_eq!(rebuilt, source);
	assert_eq!(chtl_view(&fragments).len(), source.len());

	Ok(())
}

#[test]
fn scan_global_style_content() -> ChtlResult<()> {
	let source = "div { }\nstyle {\n  body { margin: 0; }\n}";
	let fragments = scan(source, &KeywordTable::default())?;

	let css = &fragments[1];
	assert_eq!(css.kind, FragmentKind::GlobalCss);
	assert_eq!(css.content.trim(), "body { margin: 0; }");
	assert_eq!(css.position, Position::new(2, 1, 8));
	assert_eq!(css.span, 8..source.len());

	let view = chtl_view(&fragments);
	assert_eq!(view.lines().count(), source.lines().count());
	assert!(view.trim_end().ends_with("div { }"));

	Ok(())
}

#[test]
fn scan_unterminated_style_block() {
	let error = expect_error(scan("style { color: red;", &KeywordTable::default()));
	assert!(
		matches!(
			error,
			ChtlError::UnterminatedBlock {
				ref what,
				line: 1,
				column: 7
			} if what == "style block"
		),
		"{error:?}"
	);
}

#[test]
fn registry_falls_back_to_default_namespace() {
	let mut registry = Registry::new();
	registry.register(
		DEFAULT_NAMESPACE,
		Definition::StyleTemplate(StyleDef {
			name: "Base".into(),
			..StyleDef::default()
		}),
	);
	registry.register(
		"ui",
		Definition::StyleTemplate(StyleDef {
			name: "Accent".into(),
			..StyleDef::default()
		}),
	);

	let found = registry.lookup("ui", DefinitionKind::Style, "Base");
	assert_eq!(found.map(|found| found.namespace), Some(DEFAULT_NAMESPACE));

	let found = registry.lookup("ui", DefinitionKind::Style, "Accent");
	assert_eq!(found.map(|found| found.namespace), Some("ui"));

	assert!(registry.lookup(DEFAULT_NAMESPACE, DefinitionKind::Style, "Accent").is_none());
	assert!(registry.lookup("ui", DefinitionKind::Element, "Base").is_none());
	assert!(registry.contains_namespace("ui"));
	assert_eq!(registry.len(), 2);
}

#[test]
fn registry_later_registration_wins() {
	let mut registry = Registry::new();
	for color in ["red", "blue"] {
		let mut def = StyleDef {
			name: "Theme".into(),
			..StyleDef::default()
		};
		def.properties.insert("color".into(), color.into());
		registry.register(DEFAULT_NAMESPACE, Definition::StyleTemplate(def));
	}

	let color = registry
		.lookup(DEFAULT_NAMESPACE, DefinitionKind::Style, "Theme")
		.and_then(|found| found.definition.as_style())
		.and_then(|def| def.properties.get("color").cloned());
	assert_eq!(color.as_deref(), Some("blue"));
	assert_eq!(registry.len(), 1);
}

#[test]
fn parse_element_attributes_and_children() -> ChtlResult<()> {
	let (nodes, _) = parse_str(r#"div { id: main; class = "a b"; text: "hi"; span { } }"#)?;

	let expected = Node::Element {
		tag: "div".into(),
		attributes: property_map(&[("id", "main"), ("class", "a b")]),
		children: vec![
			Node::Text("hi".into()),
			Node::Element {
				tag: "span".into(),
				attributes: property_map(&[]),
				children: vec![],
			},
		],
	};
	assert_eq!(nodes, vec![expected]);

	Ok(())
}

#[test]
fn parse_registers_definitions_immediately() -> ChtlResult<()> {
	let (nodes, context) = parse_str(
		"[Template] @Style Base { color: red; }\n[Custom] @Style Box { color, width; height: 1px; }",
	)?;

	assert_eq!(nodes.len(), 2);
	assert_eq!(context.registry.len(), 2);

	let custom = context
		.registry
		.lookup(DEFAULT_NAMESPACE, DefinitionKind::Style, "Box")
		.and_then(|found| found.definition.as_style().cloned())
		.unwrap_or_else(|| panic!("custom style was not registered"));
	assert_eq!(custom.valueless, vec!["color", "width"]);
	assert_eq!(custom.properties, property_map(&[("height", "1px")]));

	Ok(())
}

#[test]
fn parse_valueless_property_requires_custom() {
	let error = expect_error(parse_str("[Template] @Style Base { color; }"));
	assert!(matches!(error, ChtlError::Parse { line: 1, .. }), "{error:?}");
}

#[test]
fn parse_specialization_instructions() -> ChtlResult<()> {
	let (nodes, _) = parse_str(
		"body { @Element Card { delete span[1], hr; insert after div { p { } } insert at top { \
		 br { } } } }",
	)?;
	let Some(Node::Element { children, .. }) = nodes.first() else {
		panic!("expected a body element, got {nodes:?}");
	};
	let [Node::ElementUsage(usage)] = children.as_slice() else {
		panic!("expected one usage, got {children:?}");
	};

	assert_eq!(usage.reference.name, "Card");
	assert_eq!(usage.instructions.len(), 4);
	let Instruction::Delete(first) = &usage.instructions[0] else {
		panic!("expected a delete");
	};
	assert_eq!(
		first.selector,
		TagSelector {
			tag: "span".into(),
			index: Some(1),
		}
	);
	let modes: Vec<InsertMode> = usage
		.instructions
		.iter()
		.filter_map(|instruction| {
			match instruction {
				Instruction::Insert(insert) => Some(insert.mode),
				Instruction::Delete(_) => None,
			}
		})
		.collect();
	assert_eq!(modes, vec![InsertMode::After, InsertMode::AtTop]);

	Ok(())
}

#[test]
fn parse_error_reports_position() {
	let error = expect_error(parse_str("div {\n  ; }"));
	assert!(
		matches!(error, ChtlError::Parse { line: 2, column: 3, .. }),
		"{error:?}"
	);
}

#[rstest]
#[case::open_element("div {")]
#[case::missing_value("div { id:")]
#[case::open_usage("body { @Element Card {")]
fn parse_unexpected_eof(#[case] source: &str) {
	let error = expect_error(parse_str(source));
	assert!(matches!(error, ChtlError::UnexpectedEof(_)), "{error:?}");
}

#[test]
fn parse_unterminated_text_block() {
	let error = expect_error(parse_str("div { text { hi "));
	assert!(
		matches!(error, ChtlError::UnterminatedBlock { ref what, .. } if what == "text block"),
		"{error:?}"
	);
}

#[test]
fn parse_rejects_non_chtl_import() {
	let error = expect_error(parse_str(r#"[Import] @Html from "page.html";"#));
	assert!(
		matches!(error, ChtlError::UnsupportedImport(ref kind) if kind == "Html"),
		"{error:?}"
	);
}

#[test]
fn parse_nested_namespaces() -> ChtlResult<()> {
	let (_, context) = parse_str(
		"[Namespace] ui { [Namespace] forms { [Template] @Element Field { input { } } } }",
	)?;
	let found = context
		.registry
		.lookup("ui.forms", DefinitionKind::Element, "Field")
		.map(|found| found.namespace);
	assert_eq!(found, Some("ui.forms"));
	assert!(context.in_default_namespace());

	Ok(())
}

#[test]
fn expanded_template_equals_definition() -> ChtlResult<()> {
	let (nodes, mut context) = parse_str(&format!("{PAIR_TEMPLATE}\nbody {{ @Element Pair; }}"))?;
	let template = context
		.registry
		.lookup(DEFAULT_NAMESPACE, DefinitionKind::Element, "Pair")
		.and_then(|found| found.definition.as_element().cloned())
		.unwrap_or_else(|| panic!("template was not registered"));

	let expanded = expand(nodes, &mut context)?;
	assert_eq!(expanded.len(), 1, "definitions are dropped");
	let Some(Node::Element { children, .. }) = find_element(&expanded, "body") else {
		panic!("no body in {expanded:?}");
	};
	assert_eq!(children, &template.children);

	Ok(())
}

#[test]
fn specialization_does_not_touch_definition() -> ChtlResult<()> {
	let source = format!("{PAIR_TEMPLATE}\nbody {{ @Element Pair {{ delete span; }} }}");
	let (nodes, mut context) = parse_str(&source)?;
	expand(nodes, &mut context)?;

	let children = context
		.registry
		.lookup(DEFAULT_NAMESPACE, DefinitionKind::Element, "Pair")
		.and_then(|found| found.definition.as_element())
		.map(|def| def.children.len());
	assert_eq!(children, Some(3));

	Ok(())
}

#[test]
fn expansion_is_idempotent() -> ChtlResult<()> {
	let source = format!(
		"{PAIR_TEMPLATE}\n[Origin] @Html banner {{ <b>x</b> }}\nbody {{ @Element Pair {{ insert \
		 at top {{ hr {{ }} }} }} [Origin] @Html banner; }}"
	);
	let (nodes, mut context) = parse_str(&source)?;

	let once = expand(nodes, &mut context)?;
	let twice = expand(once.clone(), &mut context)?;
	assert_eq!(twice, once);

	Ok(())
}

#[test]
fn nested_templates_expand_inside_clone() -> ChtlResult<()> {
	let source = r#"
		[Template] @Element Icon { i { text { "*" } } }
		[Template] @Element Button { button { @Element Icon; text { "Go" } } }
		body { @Element Button; }
	"#;
	let output = compile_str(source)?;
	assert_eq!(output.body, "<body><button><i>*</i>Go</button></body>");

	Ok(())
}

#[test]
fn specialization_only_sees_template_children() -> ChtlResult<()> {
	let source = r#"
		[Template] @Element Inner { span { text { "nested" } } }
		[Template] @Element Outer { @Element Inner; span { text { "own" } } div { } }
		body { @Element Outer { delete span; } }
	"#;
	let output = compile_str(source)?;
	assert_eq!(output.body, "<body><span>nested</span><div></div></body>");

	Ok(())
}

#[rstest]
#[case::delete_all_matches("delete span;", "<div></div>")]
#[case::delete_indexed("delete span[1];", "<span>first</span><div></div>")]
#[case::delete_list("delete span[0], div;", "<span>second</span>")]
#[case::insert_before(
	"insert before div { hr { } }",
	"<span>first</span><span>second</span><hr><div></div>"
)]
#[case::insert_after(
	"insert after span[0] { p { } }",
	"<span>first</span><p></p><span>second</span><div></div>"
)]
#[case::insert_replace(
	"insert replace span[1] { em { } }",
	"<span>first</span><em></em><div></div>"
)]
#[case::insert_at_top(
	"insert at top { hr { } }",
	"<hr><span>first</span><span>second</span><div></div>"
)]
#[case::insert_at_bottom(
	"insert at bottom { p { } }",
	"<span>first</span><span>second</span><div></div><p></p>"
)]
#[case::missing_target_is_ignored(
	"insert after table { p { } } delete ul;",
	"<span>first</span><span>second</span><div></div>"
)]
fn specialize_element_template(#[case] instructions: &str, #[case] expected: &str) -> ChtlResult<()> {
	let source = format!("{PAIR_TEMPLATE}\nbody {{ @Element Pair {{ {instructions} }} }}");
	let output = compile_str(&source)?;
	assert_eq!(output.body, format!("<body>{expected}</body>"));

	Ok(())
}

#[test]
fn recursive_element_template_fails() {
	let source = "[Template] @Element Loop { div { @Element Loop; } }\nbody { @Element Loop; }";
	let error = expect_error(compile_str(source));
	assert!(
		matches!(error, ChtlError::RecursiveTemplate { ref name } if name == "Loop"),
		"{error:?}"
	);
}

#[test]
fn namespaced_usage() -> ChtlResult<()> {
	let source = r#"
		[Namespace] ui { [Template] @Element Button { button { text { "Go" } } } }
		body { @Element Button from ui; }
	"#;
	assert_eq!(compile_str(source)?.body, "<body><button>Go</button></body>");

	Ok(())
}

#[test]
fn namespaced_usage_falls_back_to_default() -> ChtlResult<()> {
	let source = r"
		[Template] @Element Card { section { } }
		[Namespace] ui { [Template] @Element Other { p { } } }
		body { @Element Card from ui; }
	";
	assert_eq!(compile_str(source)?.body, "<body><section></section></body>");

	Ok(())
}

#[test]
#[traced_test]
fn unresolved_usage_is_skipped_when_lenient() -> ChtlResult<()> {
	let output = compile_str("body { @Element Missing; div { } }")?;

	assert_eq!(output.body, "<body><div></div></body>");
	assert_eq!(
		output.warnings,
		vec![Warning::UnresolvedDefinition {
			kind: "@Element".into(),
			name: "Missing".into(),
			namespace: String::new(),
		}]
	);
	assert!(logs_contain("skipping unresolved usage"));

	Ok(())
}

#[test]
fn unresolved_usage_fails_when_strict() {
	let error = expect_error(compile_strict("body { div { style { @Style Missing; } } }"));
	assert!(
		matches!(
			error,
			ChtlError::UnresolvedDefinition { ref kind, ref name, .. }
				if kind == "@Style" && name == "Missing"
		),
		"{error:?}"
	);
}

#[test]
fn unknown_character_policies() -> ChtlResult<()> {
	let output = compile_str("div { ~ }")?;
	assert_eq!(output.body, "<div></div>");
	assert_eq!(
		output.warnings,
		vec![Warning::UnknownCharacter {
			ch: '~',
			position: Position::new(1, 7, 6),
		}]
	);

	let error = expect_error(compile_strict("div { ~ }"));
	assert!(
		matches!(
			error,
			ChtlError::UnknownCharacter {
				ch: '~',
				line: 1,
				column: 7
			}
		),
		"{error:?}"
	);

	Ok(())
}

#[test]
fn named_and_anonymous_origin() -> ChtlResult<()> {
	let source = "[Origin] @Html banner { <b>hi</b> }\ndiv { [Origin] @Html banner; [Origin] @Html { \
	              <i>x</i> } }";
	let output = compile_str(source)?;
	assert_eq!(output.body, "<div> <b>hi</b>  <i>x</i> </div>");

	Ok(())
}

#[rstest]
#[case::own_overrides_inherited("@Style B;", r#"<div style="x:2;"></div>"#)]
#[case::usage_override_wins("@Style B { x: 3; }", r#"<div style="x:3;"></div>"#)]
#[case::deletion_removes("@Style B { delete x, y; }", "<div></div>")]
#[case::inline_after_usage("@Style B; x: 4;", r#"<div style="x:4;"></div>"#)]
fn style_template_precedence(#[case] block: &str, #[case] expected: &str) -> ChtlResult<()> {
	let source = format!(
		"[Template] @Style A {{ x: 1; y: 1; }}\n[Template] @Style B {{ inherit @Style A; x: 2; \
		 }}\ndiv {{ style {{ {block} }} }}"
	);
	let output = compile_str(&source)?;
	assert_eq!(output.body.replace("y:1;", ""), expected);

	Ok(())
}

#[test]
fn custom_style_valueless_properties() -> ChtlResult<()> {
	let source = "[Custom] @Style Box { color, width; height: 1px; }\ndiv { style { @Style Box { \
	              color: red; } } }";
	let output = compile_str(source)?;
	assert_eq!(output.body, r#"<div style="height:1px;color:red;"></div>"#);

	Ok(())
}

#[test]
fn recursive_style_template_fails() {
	let source = "[Template] @Style A { inherit @Style B; }\n[Template] @Style B { inherit @Style \
	              A; }\ndiv { style { @Style A; } }";
	let error = expect_error(compile_str(source));
	assert!(matches!(error, ChtlError::RecursiveTemplate { .. }), "{error:?}");
}

#[test]
fn ampersand_uses_first_class_rule() -> ChtlResult<()> {
	let output = compile_str("div { style { .box { color: red; } &:hover { color: blue; } } }")?;

	assert_eq!(output.body, r#"<div class="box"></div>"#);
	assert_eq!(
		output.stylesheet,
		".box { color: red; }\n.box:hover { color: blue; }"
	);

	Ok(())
}

#[rstest]
#[case::existing_class("div { class: card; style { &:hover { color: blue; } } }", ".card:hover")]
#[case::existing_id("div { id: main; style { &:hover { color: blue; } } }", "#main:hover")]
#[case::id_rule("div { style { #hero { color: red; } &:focus { color: blue; } } }", "#hero:focus")]
#[case::compound_class(
	"div { style { .a.b { color: red; } &:hover { color: blue; } } }",
	".a.b:hover"
)]
#[case::descendant_rule(
	"div { style { .card .title { color: red; } &:hover { color: blue; } } }",
	".card:hover"
)]
#[case::pseudo_class_skipped(
	"div { style { .x:hover { color: red; } .y { color: green; } &:focus { color: blue; } } }",
	".y:focus"
)]
fn ampersand_primary_selector(#[case] source: &str, #[case] expected: &str) -> ChtlResult<()> {
	let output = compile_str(source)?;
	assert!(
		output
			.stylesheet
			.lines()
			.any(|line| line.starts_with(&format!("{expected} {{"))),
		"{}",
		output.stylesheet
	);

	Ok(())
}

#[test]
fn ampersand_without_selector_becomes_comment() -> ChtlResult<()> {
	let output = compile_str("div { style { &:hover { color: blue; } } }")?;
	assert_eq!(
		output.stylesheet,
		"/* no class or id on <div> to replace `&` in `&:hover` */"
	);

	Ok(())
}

#[test]
fn global_style_rules_are_kept_verbatim() -> ChtlResult<()> {
	let output =
		compile_str("[Namespace] ui { style { &:hover { color: red; } .x { color: blue; } } }")?;
	assert_eq!(
		output.stylesheet,
		"&:hover { color: red; }\n.x { color: blue; }"
	);

	Ok(())
}

#[test]
fn id_rule_sets_element_id() -> ChtlResult<()> {
	let output = compile_str("div { id: old; style { #fresh { color: red; } } }")?;
	assert_eq!(output.body, r#"<div id="fresh"></div>"#);

	Ok(())
}

#[test]
fn inline_style_appends_to_attribute() -> ChtlResult<()> {
	let output = compile_str(r#"div { style: "color:red"; style { width: 10px; } }"#)?;
	assert_eq!(output.body, r#"<div style="color:red;width:10px;"></div>"#);

	Ok(())
}

#[rstest]
#[case::add_lengths("10px + 5px", "15px")]
#[case::grouping("2 * (3 + 4)", "14")]
#[case::unit_carries("10px * 2", "20px")]
#[case::power("2 ** 3 ** 2", "512")]
#[case::fraction("1 / 4", "0.25")]
#[case::modulo("10 % 3", "1")]
#[case::negation("-5px + 10px", "5px")]
#[case::comparison("5px > 3px", "true")]
#[case::equality("1em == 1em", "true")]
#[case::string_equality(r#""a" != "b""#, "true")]
#[case::logical("1 && 0", "false")]
#[case::ternary("1 ? 2px : 3px", "2px")]
#[case::ternary_else("0 ? 2px : 3px", "3px")]
#[case::keyword_branch("2 > 1 ? block : none", "block")]
fn evaluate_expressions(#[case] input: &str, #[case] expected: &str) -> ChtlResult<()> {
	assert_eq!(eval_str(input)?.to_string(), expected);

	Ok(())
}

#[test]
fn evaluate_fractional_sum() -> ChtlResult<()> {
	let value = eval_str("0.1 + 0.2")?;
	assert_eq!(value, Value::number(0.3, ""));
	assert_eq!(value.to_string(), "0.3");

	Ok(())
}

#[test]
fn evaluate_unit_mismatch() {
	let error = expect_error(eval_str("10px + 5em"));
	assert!(
		matches!(
			error,
			ChtlError::UnitMismatch { ref left, ref right } if left == "px" && right == "em"
		),
		"{error:?}"
	);
}

#[rstest]
#[case::divide("1px / 0")]
#[case::modulo("4 % 0")]
fn evaluate_division_by_zero(#[case] input: &str) {
	let error = expect_error(eval_str(input));
	assert!(matches!(error, ChtlError::DivisionByZero), "{error:?}");
}

#[rstest]
#[case::shorthand("1px solid red")]
#[case::color("#fff")]
#[case::keyword("red")]
#[case::number("10px")]
#[case::css_function("rgba(0, 0, 0, 0.5)")]
#[case::url("url(a.png)")]
#[case::quoted(r#""Helvetica Neue""#)]
fn analyze_keeps_plain_css(#[case] raw: &str) {
	assert_eq!(analyze(raw, &|_| false), StyleValue::Literal(raw.to_string()));
}

#[rstest]
#[case::arithmetic("10px + 5px")]
#[case::reference("#box.width * 2")]
#[case::conditional("width > 10px ? red : blue")]
fn analyze_detects_expressions(#[case] raw: &str) {
	assert!(
		matches!(analyze(raw, &|_| false), StyleValue::Expression(_)),
		"{raw}"
	);
}

#[test]
fn same_element_comparison() -> ChtlResult<()> {
	let elements = vec![element_owner(None, &[
		("width", "20px"),
		("wide", "width > 10px"),
	])];
	let evaluated = evaluate_properties(&elements, &[], &Registry::new())?;

	assert_eq!(
		evaluated.elements,
		vec![property_map(&[("width", "20px"), ("wide", "true")])]
	);

	Ok(())
}

#[test]
fn reference_evaluated_regardless_of_order() -> ChtlResult<()> {
	let elements = vec![
		element_owner(None, &[("width", "#late.width * 2")]),
		element_owner(Some("late"), &[("width", "5px + 1px")]),
	];
	let evaluated = evaluate_properties(&elements, &[], &Registry::new())?;

	assert_eq!(
		evaluated.elements,
		vec![
			property_map(&[("width", "12px")]),
			property_map(&[("width", "6px")]),
		]
	);

	Ok(())
}

#[test]
fn cross_element_reference() -> ChtlResult<()> {
	let source = "div { id: box; style { width: 100px; } }\ndiv { style { width: #box.width + 20px; \
	              } }";
	let output = compile_str(source)?;
	assert_eq!(
		output.body,
		r#"<div id="box" style="width:100px;"></div><div style="width:120px;"></div>"#
	);

	Ok(())
}

#[test]
fn reference_falls_back_to_attribute() -> ChtlResult<()> {
	let source = "img { id: logo; width: 40; }\ndiv { style { width: #logo.width * 2px; } }";
	let output = compile_str(source)?;
	assert_eq!(
		output.body,
		r#"<img id="logo" width="40"><div style="width:80px;"></div>"#
	);

	Ok(())
}

#[test]
fn attribute_reference_is_evaluated() -> ChtlResult<()> {
	let source = "div { id: a; width: \"10px + 5px\"; }\ndiv { style { width: #a.width * 2; } }";
	let output = compile_str(source)?;
	assert_eq!(
		output.body,
		r#"<div id="a" width="10px + 5px"></div><div style="width:30px;"></div>"#
	);

	Ok(())
}

#[test]
fn attribute_expression_reads_its_own_element() -> ChtlResult<()> {
	let source = "div { id: a; height: \"gap * 3\"; style { gap: 4px; } }\ndiv { style { height: \
	              #a.height; } }";
	let output = compile_str(source)?;
	assert_eq!(
		output.body,
		r#"<div id="a" height="gap * 3" style="gap:4px;"></div><div style="height:12px;"></div>"#
	);

	Ok(())
}

#[rstest]
#[case::mutual(
	"div { id: a; style { width: #b.width + 1px; } }\ndiv { id: b; style { width: #a.width + \
	 1px; } }"
)]
#[case::self_reference("div { style { width: width + 1px; } }")]
#[case::through_attribute(
	"div { id: a; width: \"#b.width\"; }\ndiv { id: b; style { width: #a.width + 1px; } }"
)]
fn reference_cycle_fails(#[case] source: &str) {
	let error = expect_error(compile_str(source));
	assert!(matches!(error, ChtlError::ReferenceCycle { .. }), "{error:?}");
}

#[test]
fn self_reference_names_property() {
	let error = expect_error(compile_str("div { style { width: width + 1px; } }"));
	assert!(
		matches!(error, ChtlError::ReferenceCycle { ref property } if property == "div.width"),
		"{error:?}"
	);
}

#[test]
fn unresolved_reference_fails() {
	let error = expect_error(compile_str("div { style { width: #nope.width + 1px; } }"));
	assert!(
		matches!(error, ChtlError::UnresolvedReference { ref reference } if reference == "#nope.width"),
		"{error:?}"
	);
}

#[rstest]
#[case::false_without_else("width > 20px ? red", r#"<div style="width:10px;"></div>"#)]
#[case::true_branch(
	"width < 20px ? red : blue",
	r#"<div style="width:10px;color:red;"></div>"#
)]
fn conditional_property(#[case] expression: &str, #[case] expected: &str) -> ChtlResult<()> {
	let source = format!("div {{ style {{ width: 10px; color: {expression}; }} }}");
	assert_eq!(compile_str(&source)?.body, expected);

	Ok(())
}

#[test]
fn rule_properties_are_evaluated() -> ChtlResult<()> {
	let output = compile_str("div { style { .card { width: 10px * 3; margin: 0 auto; } } }")?;
	assert_eq!(output.stylesheet, ".card { width: 30px; margin: 0 auto; }");

	Ok(())
}

#[test]
fn var_template_in_expression() -> ChtlResult<()> {
	let source = r#"
		[Template] @Var Theme { primary: "rgb(255, 0, 0)"; size: 10px; }
		div { style { color: Theme(primary); width: Theme(size) * 2; } }
	"#;
	let output = compile_str(source)?;
	assert_eq!(
		output.body,
		r#"<div style="color:rgb(255, 0, 0);width:20px;"></div>"#
	);

	Ok(())
}

#[test]
fn end_to_end_greeting() -> ChtlResult<()> {
	let output = compile_str(r#"div { style { .greet { color: green; } } text { "hi" } }"#)?;

	assert_eq!(output.body, r#"<div class="greet">hi</div>"#);
	assert_eq!(output.stylesheet, ".greet { color: green; }");
	assert_eq!(
		output.html,
		r#"<html><head><style>.greet { color: green; }</style></head><body><div class="greet">hi</div></body></html>"#
	);

	Ok(())
}

#[test]
fn full_document_snapshot() -> ChtlResult<()> {
	let source = r#"
use html5;
[Template] @Style Card { padding: 4px; border: 1px solid black; }
html {
	head { title { text { "Demo" } } }
	body {
		div {
			class: card;
			style { @Style Card; &:hover { padding: 8px; } }
			text { "Hello" }
		}
	}
}
"#;
	let output = compile_str(source)?;
	insta::assert_snapshot!(output.html, @r#"<!DOCTYPE html><html><head><title>Demo</title><style>.card:hover { padding: 8px; }</style></head><body><div class="card" style="padding:4px;border:1px solid black;">Hello</div></body></html>"#);

	Ok(())
}

#[rstest]
#[case::void_elements(r#"img { src: "a.png"; } br { }"#, r#"<img src="a.png"><br>"#)]
#[case::generator_comment("-- note\ndiv { }", "<!-- note --><div></div>")]
#[case::escaped_quotes(
	r#"div { title: 'say "hi"'; }"#,
	r#"<div title="say &quot;hi&quot;"></div>"#
)]
#[case::unquoted_text("p { text { hello world } }", "<p>hello world</p>")]
fn generate_html(#[case] source: &str, #[case] expected: &str) -> ChtlResult<()> {
	assert_eq!(compile_str(source)?.body, expected);

	Ok(())
}

#[test]
fn use_html5_adds_doctype() -> ChtlResult<()> {
	let output = compile_str("use html5;\ndiv { }")?;
	assert_eq!(output.html, "<!DOCTYPE html><div></div>");

	Ok(())
}

#[test]
fn merge_inserts_into_existing_head() -> ChtlResult<()> {
	let output = compile_str(
		"style { body { margin: 0; } }\nhtml { head { } body { div { script { go(); } } } }",
	)?;
	assert_eq!(
		output.html,
		"<html><head><style>body { margin: 0; }</style></head><body><div></div><script>go();</\
		 script></body></html>"
	);
	assert_eq!(output.scripts, vec!["go();"]);

	Ok(())
}

#[test]
fn merge_wraps_bare_body() -> ChtlResult<()> {
	let generated = Generated {
		doctype: false,
		body: "<p></p>".into(),
		stylesheet: ".a { color: red; }".into(),
	};
	let merged = merge(&generated, &[], &PassThrough, &PassThrough, true)?;
	assert_eq!(
		merged.html,
		"<!DOCTYPE html><html><head><style>.a { color: red; }</style></head><body><p></p></body></html>"
	);

	Ok(())
}

struct Shout;

impl CssCompiler for Shout {
	fn compile_css(&self, fragment: &Fragment) -> ChtlResult<String> {
		Ok(fragment.content.to_uppercase())
	}
}

#[test]
fn custom_css_compiler() -> ChtlResult<()> {
	let options = CompileOptions {
		css: Box::new(Shout),
		..CompileOptions::default()
	};
	let output = compile("style { a { color: red; } }\ndiv { }", &options)?;
	assert_eq!(output.stylesheet, "A { COLOR: RED; }");

	Ok(())
}

#[test]
fn fragments_follow_configured_keywords() -> ChtlResult<()> {
	let source = r#"[Configuration] { [Name] { KEYWORD_STYLE = "css"; } } css { a { } } style { }"#;
	let kinds: Vec<FragmentKind> = fragments(source)?
		.iter()
		.map(|fragment| fragment.kind)
		.collect();
	assert_eq!(
		kinds,
		vec![FragmentKind::Chtl, FragmentKind::GlobalCss, FragmentKind::Chtl]
	);

	Ok(())
}

#[test]
fn source_configuration_prescan() -> ChtlResult<()> {
	let source = r#"
		[Configuration] {
			INDEX_INITIAL_COUNT = 1;
			DEBUG_MODE = true;
			[Name] {
				KEYWORD_TEXT = "txt";
				KEYWORD_STYLE = ["css", "style"];
			}
		}
	"#;
	let config = SourceConfiguration::prescan(source)?;

	assert_eq!(config.index_base, 1);
	assert!(config.debug);
	assert_eq!(config.keywords.lookup("txt"), Some(Keyword::Text));
	assert_eq!(config.keywords.lookup("text"), None);
	assert_eq!(config.keywords.spellings(Keyword::Style), vec!["css", "style"]);

	Ok(())
}

#[test]
fn configured_keyword_spelling() -> ChtlResult<()> {
	let source = r#"[Configuration] { [Name] { KEYWORD_TEXT = "txt"; } } div { txt { "hi" } }"#;
	assert_eq!(compile_str(source)?.body, "<div>hi</div>");

	Ok(())
}

#[test]
fn configured_index_base() -> ChtlResult<()> {
	let source = format!(
		"[Configuration] {{ INDEX_INITIAL_COUNT = 1; }}\n{PAIR_TEMPLATE}\nbody {{ @Element Pair \
		 {{ delete span[1]; }} }}"
	);
	assert_eq!(
		compile_str(&source)?.body,
		"<body><span>second</span><div></div></body>"
	);

	Ok(())
}

#[test]
fn index_below_base_is_rejected() {
	let source = format!(
		"[Configuration] {{ INDEX_INITIAL_COUNT = 1; }}\n{PAIR_TEMPLATE}\nbody {{ @Element Pair \
		 {{ delete span[0]; }} }}"
	);
	let error = expect_error(compile_str(&source));
	assert!(matches!(error, ChtlError::Parse { .. }), "{error:?}");
}

#[test]
fn import_registers_under_file_stem() -> ChtlResult<()> {
	let loader = MemoryLoader::new().with_file(
		"/project/lib/theme.chtl",
		"[Template] @Style Accent { color: red; }",
	);
	let source = r#"[Import] @Chtl from "lib/theme"; div { style { @Style Accent from theme; } }"#;

	let output = compile_with_loader(source, loader)?;
	assert_eq!(output.body, r#"<div style="color:red;"></div>"#);
	assert!(output.warnings.is_empty());

	Ok(())
}

#[test]
fn import_alias_names_namespace() -> ChtlResult<()> {
	let loader = MemoryLoader::new().with_file(
		"/project/lib/theme.chtl",
		"[Template] @Element Badge { span { text { \"new\" } } }",
	);
	let source = r#"[Import] @Chtl from "./lib/theme.chtl" as ui; body { @Element Badge from ui; }"#;

	let output = compile_with_loader(source, loader)?;
	assert_eq!(output.body, "<body><span>new</span></body>");

	Ok(())
}

#[test]
fn import_definitions_are_namespaced() -> ChtlResult<()> {
	let loader = MemoryLoader::new().with_file(
		"/project/theme.chtl",
		"[Template] @Element Badge { span { } }",
	);
	let source = r#"[Import] @Chtl from "theme"; body { @Element Badge; }"#;

	let output = compile_with_loader(source, loader)?;
	assert_eq!(output.body, "<body></body>");
	assert_eq!(output.warnings.len(), 1);

	Ok(())
}

#[test]
fn import_order_is_dependencies_first() -> ChtlResult<()> {
	let loader = MemoryLoader::new()
		.with_file("/project/a.chtl", r#"[Import] @Chtl from "b";"#)
		.with_file("/project/b.chtl", "[Template] @Element B { hr { } }");
	let graph = ImportGraph::build(
		r#"[Import] @Chtl from "a";"#,
		Some(Path::new(MAIN_PATH)),
		&KeywordTable::default(),
		&loader,
	)?;
	assert_eq!(graph.len(), 2);

	let namespaces: Vec<String> = graph
		.into_ordered_units()?
		.into_iter()
		.map(|unit| unit.namespace)
		.collect();
	assert_eq!(namespaces, vec!["b", "a"]);

	Ok(())
}

#[rstest]
#[case::mutual(&[
	("/project/a.chtl", r#"[Import] @Chtl from "b";"#),
	("/project/b.chtl", r#"[Import] @Chtl from "a";"#),
])]
#[case::self_import(&[("/project/a.chtl", r#"[Import] @Chtl from "a";"#)])]
fn import_cycle_fails(#[case] files: &[(&str, &str)]) {
	let mut loader = MemoryLoader::new();
	for (path, source) in files {
		loader.insert(path, *source);
	}

	let error = expect_error(compile_with_loader(r#"[Import] @Chtl from "a";"#, loader));
	assert!(matches!(error, ChtlError::ImportCycle { .. }), "{error:?}");
}

#[test]
fn import_missing_file_fails() {
	let error = expect_error(compile_with_loader(
		r#"[Import] @Chtl from "nowhere";"#,
		MemoryLoader::new(),
	));
	assert!(
		matches!(error, ChtlError::ImportLoad { ref path, .. } if path.ends_with("nowhere.chtl")),
		"{error:?}"
	);
}

#[test]
fn import_unsupported_kind_fails() {
	let error = expect_error(compile_str(r#"[Import] @Style from "site.css";"#));
	assert!(
		matches!(error, ChtlError::UnsupportedImport(ref kind) if kind == "Style"),
		"{error:?}"
	);
}

#[test]
fn import_from_file_system() -> ChtlResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	std::fs::create_dir_all(tmp.path().join("parts"))?;
	std::fs::write(
		tmp.path().join("parts/header.chtl"),
		"[Template] @Element Header { header { text { \"Top\" } } }",
	)?;
	let main = tmp.path().join("main.chtl");
	std::fs::write(
		&main,
		"[Import] @Chtl from \"parts/header\";\nbody { @Element Header from header; }",
	)?;

	let output = compile_file(&main, &CompileOptions::default())?;
	assert_eq!(output.body, "<body><header>Top</header></body>");

	Ok(())
}

#[test]
fn resolve_import_path_adds_extension() {
	let resolved = resolve_import_path(Some(Path::new("/site/pages/index.chtl")), "../lib/nav");
	assert_eq!(resolved, Path::new("/site/pages/../lib/nav.chtl"));

	let absolute = resolve_import_path(None, "/abs/theme.chtl");
	assert_eq!(absolute, Path::new("/abs/theme.chtl"));
}

#[test]
fn load_config_from_file() -> ChtlResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	std::fs::write(
		tmp.path().join("chtl.toml"),
		"[strict]\nunresolved_usage = \"error\"\n\n[output]\ndoctype = true\n",
	)?;

	let config = ChtlConfig::load(tmp.path())?.unwrap_or_else(|| panic!("config not found"));
	assert_eq!(config.strict.unresolved_usage, Policy::Error);
	assert_eq!(config.strict.unknown_characters, Policy::Warn);
	assert!(config.output.doctype);

	let output = compile("div { }", &CompileOptions::from_config(&config))?;
	assert_eq!(output.html, "<!DOCTYPE html><div></div>");

	Ok(())
}

#[test]
fn load_config_from_nested_candidate() -> ChtlResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	std::fs::create_dir_all(tmp.path().join(".config"))?;
	std::fs::write(
		tmp.path().join(".config/chtl.toml"),
		"[strict]\nunknown_characters = \"error\"\n",
	)?;

	assert_eq!(
		ChtlConfig::resolve_path(tmp.path()),
		Some(tmp.path().join(".config/chtl.toml"))
	);
	let config = ChtlConfig::load(tmp.path())?.unwrap_or_else(|| panic!("config not found"));
	assert_eq!(config.strict.unknown_characters, Policy::Error);
	assert_eq!(config.output, OutputConfig::default());

	Ok(())
}

#[test]
fn load_config_missing_returns_none() -> ChtlResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	assert!(ChtlConfig::load(tmp.path())?.is_none());

	Ok(())
}

#[test]
fn load_config_rejects_unknown_policy() -> ChtlResult<()> {
	let tmp = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
	std::fs::write(
		tmp.path().join("chtl.toml"),
		"[strict]\nunresolved_usage = \"sometimes\"\n",
	)?;

	let error = expect_error(ChtlConfig::load(tmp.path()));
	assert!(matches!(error, ChtlError::ConfigParse(_)), "{error:?}");

	Ok(())
}
