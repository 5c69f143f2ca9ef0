use std::collections::VecDeque;

use crate::ChtlError;
use crate::ChtlResult;
use crate::CompileContext;
use crate::ast::DeleteInstruction;
use crate::ast::ElementDef;
use crate::ast::ElementUsage;
use crate::ast::InsertInstruction;
use crate::ast::InsertMode;
use crate::ast::Instruction;
use crate::ast::Node;
use crate::ast::OriginDef;
use crate::ast::PropertyMap;
use crate::ast::Reference;
use crate::ast::SelectorRule;
use crate::ast::StyleBlock;
use crate::ast::StyleDef;
use crate::ast::StyleTemplateUsage;
use crate::ast::TagSelector;
use crate::ast::VarDef;
use crate::config::parse_configuration_body;
use crate::lexer::Lexer;
use crate::lexer::unquote;
use crate::registry::Definition;
use crate::tokens::Keyword;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// Parse one CHTL source unit.
///
/// Template and custom definitions are registered into `context.registry`
/// as soon as they are parsed, under `context.namespace`. Imports are not
/// followed here; the import graph has already loaded and parsed them.
pub fn parse(source: &str, context: &mut CompileContext) -> ChtlResult<Vec<Node>> {
	let lexer = Lexer::new(source, &context.source_config.keywords)
		.with_policy(context.policies.unknown_characters);
	let mut parser = Parser {
		lexer,
		lookahead: VecDeque::new(),
		last_end: 0,
		context,
	};

	let nodes = parser.program()?;
	let Parser { lexer, context, .. } = parser;
	for warning in lexer.into_warnings() {
		tracing::warn!(%warning, "lenient parse");
		context.warnings.push(warning);
	}

	Ok(nodes)
}

struct Parser<'a, 'c> {
	lexer: Lexer<'a>,
	lookahead: VecDeque<Token>,
	/// End offset of the most recently consumed token.
	last_end: usize,
	context: &'c mut CompileContext,
}

impl Parser<'_, '_> {
	fn peek_nth(&mut self, n: usize) -> ChtlResult<&Token> {
		while self.lookahead.len() <= n {
			let token = self.lexer.next_token()?;
			let done = token.is(TokenKind::Eof);
			self.lookahead.push_back(token);
			if done {
				break;
			}
		}

		let index = n.min(self.lookahead.len() - 1);
		Ok(&self.lookahead[index])
	}

	fn peek(&mut self) -> ChtlResult<&Token> {
		self.peek_nth(0)
	}

	fn check(&mut self, kind: TokenKind) -> ChtlResult<bool> {
		Ok(self.peek()?.is(kind))
	}

	fn check_keyword(&mut self, keyword: Keyword) -> ChtlResult<bool> {
		Ok(self.peek()?.is_keyword(keyword))
	}

	fn advance(&mut self) -> ChtlResult<Token> {
		let token = match self.lookahead.pop_front() {
			Some(token) => token,
			None => self.lexer.next_token()?,
		};
		if !token.is(TokenKind::Eof) {
			self.last_end = token.span.end;
		}
		Ok(token)
	}

	/// Consume the next token if it has the given kind.
	fn eat(&mut self, kind: TokenKind) -> ChtlResult<bool> {
		if self.check(kind)? {
			self.advance()?;
			return Ok(true);
		}
		Ok(false)
	}

	fn expect(&mut self, kind: TokenKind, context: &str) -> ChtlResult<Token> {
		let token = self.advance()?;
		if token.is(kind) {
			return Ok(token);
		}
		Err(unexpected(&token, &format!("expected {kind} {context}")))
	}

	fn expect_name(&mut self, context: &str) -> ChtlResult<Token> {
		let token = self.advance()?;
		if token.is_name() {
			return Ok(token);
		}
		Err(unexpected(&token, &format!("expected a name {context}")))
	}

	fn expect_word(&mut self, word: &str) -> ChtlResult<Token> {
		let token = self.advance()?;
		if token.is_word(word) {
			return Ok(token);
		}
		Err(unexpected(&token, &format!("expected `{word}`")))
	}

	/// Capture the raw value that follows the last consumed token.
	fn raw_value(&mut self) -> ChtlResult<String> {
		self.lookahead.clear();
		self.lexer.raw_value(self.last_end)
	}

	/// Capture the raw body of the block opened by `open`.
	fn raw_block(&mut self, open: &Token, what: &str) -> ChtlResult<String> {
		self.lookahead.clear();
		let body = self.lexer.raw_block(open.span.end, what)?;
		self.last_end = open.span.end + body.len() + 1;
		Ok(body)
	}

	fn program(&mut self) -> ChtlResult<Vec<Node>> {
		let mut nodes = vec![];

		if self.check_keyword(Keyword::Use)? {
			self.advance()?;
			let target = self.expect_name("after `use`")?;
			self.expect(TokenKind::Semicolon, "after `use` target")?;
			nodes.push(Node::Use(target.text));
		}

		while !self.check(TokenKind::Eof)? {
			self.declaration(&mut nodes)?;
		}

		Ok(nodes)
	}

	/// Parse one declaration and append whatever it produces to `out`.
	fn declaration(&mut self, out: &mut Vec<Node>) -> ChtlResult<()> {
		let token = self.peek()?.clone();

		match token.kind {
			TokenKind::LeftBracket => self.bracket_block(out),
			TokenKind::At => {
				let usage = self.element_usage()?;
				out.push(Node::ElementUsage(usage));
				Ok(())
			}
			TokenKind::GeneratorComment => {
				self.advance()?;
				out.push(Node::Comment(token.text));
				Ok(())
			}
			TokenKind::Keyword(Keyword::Text) => {
				let text = self.text_block()?;
				out.push(Node::Text(text));
				Ok(())
			}
			TokenKind::Keyword(Keyword::Style) => {
				let block = self.style_block()?;
				out.push(Node::StyleBlock(block));
				Ok(())
			}
			TokenKind::Keyword(Keyword::Script) => {
				// Script blocks are normally lifted out by the scanner.
				self.advance()?;
				let open = self.expect(TokenKind::LeftBrace, "after `script`")?;
				self.raw_block(&open, "script block")?;
				Ok(())
			}
			TokenKind::Identifier => {
				let element = self.element()?;
				out.push(element);
				Ok(())
			}
			_ => Err(unexpected(&token, "expected a declaration")),
		}
	}

	fn bracket_block(&mut self, out: &mut Vec<Node>) -> ChtlResult<()> {
		self.expect(TokenKind::LeftBracket, "")?;
		let word = self.expect_name("inside `[ ]`")?;
		self.expect(TokenKind::RightBracket, "after block name")?;

		if word.is_keyword(Keyword::Template) {
			return self.definition(false, out);
		}
		if word.is_keyword(Keyword::Custom) {
			return self.definition(true, out);
		}
		if word.is_keyword(Keyword::Import) {
			let import = self.import()?;
			out.push(import);
			return Ok(());
		}

		match word.text.as_str() {
			"Origin" => {
				let origin = self.origin()?;
				out.push(origin);
				Ok(())
			}
			"Configuration" => {
				let configuration = self.configuration()?;
				out.push(configuration);
				Ok(())
			}
			"Namespace" => self.namespace(out),
			_ => Err(unexpected(&word, "unknown block type")),
		}
	}

	/// `[Template|Custom] @Style|@Element|@Var Name { ... }`
	fn definition(&mut self, custom: bool, out: &mut Vec<Node>) -> ChtlResult<()> {
		self.expect(TokenKind::At, "before definition type")?;
		let kind = self.expect_name("as definition type")?;
		let name = self.expect_name("for definition")?.text;
		self.expect(TokenKind::LeftBrace, "to open definition body")?;

		let (definition, node) = match kind.text.as_str() {
			"Style" => {
				let def = self.style_def_body(name, custom)?;
				if custom {
					(Definition::CustomStyle(def.clone()), Node::CustomStyle(def))
				} else {
					(Definition::StyleTemplate(def.clone()), Node::StyleTemplate(def))
				}
			}
			"Element" => {
				let mut children = vec![];
				while !self.check(TokenKind::RightBrace)? {
					self.declaration(&mut children)?;
				}
				let def = ElementDef { name, children };
				if custom {
					(Definition::CustomElement(def.clone()), Node::CustomElement(def))
				} else {
					(Definition::ElementTemplate(def.clone()), Node::ElementTemplate(def))
				}
			}
			"Var" => {
				let def = self.var_def_body(name)?;
				if custom {
					(Definition::CustomVar(def.clone()), Node::CustomVar(def))
				} else {
					(Definition::VarTemplate(def.clone()), Node::VarTemplate(def))
				}
			}
			_ => return Err(unexpected(&kind, "expected `Style`, `Element` or `Var`")),
		};
		self.expect(TokenKind::RightBrace, "to close definition body")?;

		tracing::debug!(
			namespace = %self.context.namespace,
			kind = %definition.kind(),
			name = definition.name(),
			custom,
			"registering definition"
		);
		self.context
			.registry
			.register(&self.context.namespace, definition);
		out.push(node);

		Ok(())
	}

	fn style_def_body(&mut self, name: String, custom: bool) -> ChtlResult<StyleDef> {
		let mut def = StyleDef {
			name,
			..StyleDef::default()
		};

		while !self.check(TokenKind::RightBrace)? {
			if self.check_keyword(Keyword::Inherit)? {
				self.advance()?;
			}

			if self.check(TokenKind::At)? {
				self.advance()?;
				self.expect_word("Style")?;
				def.parents.push(self.reference()?);
				self.expect(TokenKind::Semicolon, "after inherited template")?;
				continue;
			}

			let property = self.expect_name("as property name")?;
			let separator = self.advance()?;
			match separator.kind {
				TokenKind::Colon | TokenKind::Equals => {
					let value = self.raw_value()?;
					def.properties.insert(property.text, value);
				}
				TokenKind::Comma | TokenKind::Semicolon if custom => {
					def.valueless.push(property.text);
				}
				_ => {
					return Err(unexpected(
						&separator,
						&format!("expected `:` after property `{}`", property.text),
					));
				}
			}
		}

		Ok(def)
	}

	fn var_def_body(&mut self, name: String) -> ChtlResult<VarDef> {
		let mut variables = PropertyMap::new();

		while !self.check(TokenKind::RightBrace)? {
			let variable = self.expect_name("as variable name")?;
			let separator = self.advance()?;
			if !matches!(separator.kind, TokenKind::Colon | TokenKind::Equals) {
				return Err(unexpected(&separator, "expected `:` after variable name"));
			}
			let raw = self.raw_value()?;
			variables.insert(variable.text, unquote(&raw).unwrap_or(raw));
		}

		Ok(VarDef { name, variables })
	}

	/// `Name [from a.b]`. Without `from`, a usage inside a named namespace
	/// looks there first.
	fn reference(&mut self) -> ChtlResult<Reference> {
		let name = self.expect_name("for reference")?.text;

		let namespace = if self.check_keyword(Keyword::From)? {
			self.advance()?;
			let mut path = self.expect_name("after `from`")?.text;
			while self.eat(TokenKind::Dot)? {
				path.push('.');
				path.push_str(&self.expect_name("in namespace path")?.text);
			}
			Some(path)
		} else if self.context.in_default_namespace() {
			None
		} else {
			Some(self.context.namespace.clone())
		};

		Ok(Reference { name, namespace })
	}

	/// `@Element Name [from ns] (; | { instructions })`
	fn element_usage(&mut self) -> ChtlResult<ElementUsage> {
		self.expect(TokenKind::At, "")?;
		self.expect_word("Element")?;
		let reference = self.reference()?;
		let mut instructions = vec![];

		if self.eat(TokenKind::LeftBrace)? {
			while !self.check(TokenKind::RightBrace)? {
				self.instruction(&mut instructions)?;
			}
			self.expect(TokenKind::RightBrace, "to close specialization")?;
			self.eat(TokenKind::Semicolon)?;
		} else {
			self.expect(TokenKind::Semicolon, "after element usage")?;
		}

		Ok(ElementUsage {
			reference,
			instructions,
		})
	}

	fn instruction(&mut self, out: &mut Vec<Instruction>) -> ChtlResult<()> {
		let token = self.advance()?;

		if token.is_keyword(Keyword::Delete) {
			loop {
				let selector = self.tag_selector()?;
				out.push(Instruction::Delete(DeleteInstruction { selector }));
				if !self.eat(TokenKind::Comma)? {
					break;
				}
			}
			self.expect(TokenKind::Semicolon, "after `delete`")?;
			return Ok(());
		}

		if !token.is_keyword(Keyword::Insert) {
			return Err(unexpected(&token, "expected `delete` or `insert`"));
		}

		let mode_token = self.advance()?;
		let (mode, target) = match mode_token.kind {
			TokenKind::Keyword(Keyword::Before) => (InsertMode::Before, Some(self.tag_selector()?)),
			TokenKind::Keyword(Keyword::After) => (InsertMode::After, Some(self.tag_selector()?)),
			TokenKind::Keyword(Keyword::Replace) => {
				(InsertMode::Replace, Some(self.tag_selector()?))
			}
			_ if mode_token.is_word("at") => {
				let side = self.expect_name("after `insert at`")?;
				match side.text.as_str() {
					"top" => (InsertMode::AtTop, None),
					"bottom" => (InsertMode::AtBottom, None),
					_ => return Err(unexpected(&side, "expected `top` or `bottom`")),
				}
			}
			_ => {
				return Err(unexpected(
					&mode_token,
					"expected `before`, `after`, `replace` or `at`",
				));
			}
		};

		self.expect(TokenKind::LeftBrace, "to open insert body")?;
		let mut body = vec![];
		while !self.check(TokenKind::RightBrace)? {
			self.declaration(&mut body)?;
		}
		self.expect(TokenKind::RightBrace, "to close insert body")?;

		out.push(Instruction::Insert(InsertInstruction { mode, target, body }));
		Ok(())
	}

	/// `tag` or `tag[n]`, with `n` counted from `INDEX_INITIAL_COUNT`.
	fn tag_selector(&mut self) -> ChtlResult<TagSelector> {
		let tag = self.expect_name("as tag selector")?.text;
		if !self.eat(TokenKind::LeftBracket)? {
			return Ok(TagSelector { tag, index: None });
		}

		let number = self.expect(TokenKind::Number, "as selector index")?;
		let base = self.context.source_config.index_base;
		let index = number
			.text
			.parse::<usize>()
			.ok()
			.and_then(|index| index.checked_sub(base))
			.ok_or_else(|| {
				unexpected(
					&number,
					&format!("expected an index of at least {base}"),
				)
			})?;
		self.expect(TokenKind::RightBracket, "after selector index")?;

		Ok(TagSelector {
			tag,
			index: Some(index),
		})
	}

	/// `tag { attributes and children }`
	fn element(&mut self) -> ChtlResult<Node> {
		let tag = self.advance()?.text;
		self.expect(TokenKind::LeftBrace, &format!("after element `{tag}`"))?;

		let mut attributes = PropertyMap::new();
		let mut children = vec![];

		while !self.check(TokenKind::RightBrace)? {
			let is_attribute = self.peek()?.is_name()
				&& matches!(self.peek_nth(1)?.kind, TokenKind::Colon | TokenKind::Equals);

			if !is_attribute {
				self.declaration(&mut children)?;
				continue;
			}

			let key = self.advance()?;
			self.advance()?;
			let raw = self.raw_value()?;
			let value = unquote(&raw).unwrap_or(raw);

			if key.is_keyword(Keyword::Text) {
				children.push(Node::Text(value));
			} else {
				attributes.insert(key.text, value);
			}
		}
		self.expect(TokenKind::RightBrace, &format!("to close element `{tag}`"))?;

		Ok(Node::Element {
			tag,
			attributes,
			children,
		})
	}

	/// `text { raw or "quoted" }`
	fn text_block(&mut self) -> ChtlResult<String> {
		self.advance()?;
		let open = self.expect(TokenKind::LeftBrace, "after `text`")?;
		let body = self.raw_block(&open, "text block")?;
		let trimmed = body.trim();

		Ok(unquote(trimmed).unwrap_or_else(|| trimmed.to_string()))
	}

	fn style_block(&mut self) -> ChtlResult<StyleBlock> {
		self.advance()?;
		self.expect(TokenKind::LeftBrace, "after `style`")?;
		let mut block = StyleBlock::default();

		while !self.check(TokenKind::RightBrace)? {
			let token = self.peek()?.clone();
			match token.kind {
				TokenKind::Dot | TokenKind::Hash | TokenKind::Ampersand => {
					self.lookahead.clear();
					let selector = self.lexer.raw_selector(token.span.start)?;
					let properties = self.property_list()?;
					self.expect(TokenKind::RightBrace, "to close selector rule")?;
					block.rules.push(SelectorRule {
						selector,
						properties,
					});
				}
				TokenKind::At | TokenKind::Keyword(Keyword::Inherit) => {
					let usage = self.style_usage()?;
					block.usages.push(usage);
				}
				_ if token.is_name() => {
					let property = self.advance()?;
					let separator = self.advance()?;
					if !matches!(separator.kind, TokenKind::Colon | TokenKind::Equals) {
						return Err(unexpected(
							&separator,
							&format!("expected `:` after property `{}`", property.text),
						));
					}
					let value = self.raw_value()?;
					block.properties.insert(property.text, value);
				}
				_ => return Err(unexpected(&token, "expected a property, rule or `@Style`")),
			}
		}
		self.expect(TokenKind::RightBrace, "to close style block")?;

		Ok(block)
	}

	/// `property: value;` pairs up to (not including) the closing brace.
	fn property_list(&mut self) -> ChtlResult<PropertyMap> {
		let mut properties = PropertyMap::new();

		while !self.check(TokenKind::RightBrace)? {
			let property = self.expect_name("as property name")?;
			let separator = self.advance()?;
			if !matches!(separator.kind, TokenKind::Colon | TokenKind::Equals) {
				return Err(unexpected(
					&separator,
					&format!("expected `:` after property `{}`", property.text),
				));
			}
			let value = self.raw_value()?;
			properties.insert(property.text, value);
		}

		Ok(properties)
	}

	/// `[inherit] @Style Name [from ns] (; | { overrides; delete a, b; })`
	fn style_usage(&mut self) -> ChtlResult<StyleTemplateUsage> {
		if self.check_keyword(Keyword::Inherit)? {
			self.advance()?;
		}
		self.expect(TokenKind::At, "before `Style`")?;
		self.expect_word("Style")?;
		let reference = self.reference()?;
		let mut overrides = PropertyMap::new();
		let mut deletions = vec![];

		if self.eat(TokenKind::LeftBrace)? {
			while !self.check(TokenKind::RightBrace)? {
				if self.check_keyword(Keyword::Delete)? {
					self.advance()?;
					loop {
						deletions.push(self.expect_name("after `delete`")?.text);
						if !self.eat(TokenKind::Comma)? {
							break;
						}
					}
					self.expect(TokenKind::Semicolon, "after deleted properties")?;
					continue;
				}

				let property = self.expect_name("as property name")?;
				let separator = self.advance()?;
				if !matches!(separator.kind, TokenKind::Colon | TokenKind::Equals) {
					return Err(unexpected(&separator, "expected `:` in style specialization"));
				}
				let value = self.raw_value()?;
				overrides.insert(property.text, value);
			}
			self.expect(TokenKind::RightBrace, "to close style specialization")?;
			self.eat(TokenKind::Semicolon)?;
		} else {
			self.expect(TokenKind::Semicolon, "after style usage")?;
		}

		Ok(StyleTemplateUsage {
			reference,
			overrides,
			deletions,
		})
	}

	/// `@Chtl from "path" [as alias];`
	fn import(&mut self) -> ChtlResult<Node> {
		self.expect(TokenKind::At, "before import type")?;
		let kind = self.expect_name("as import type")?;
		if kind.text != "Chtl" {
			return Err(ChtlError::UnsupportedImport(kind.text));
		}

		let from = self.advance()?;
		if !from.is_keyword(Keyword::From) {
			return Err(unexpected(&from, "expected `from`"));
		}

		let path = self.advance()?;
		if !matches!(path.kind, TokenKind::String | TokenKind::Identifier) {
			return Err(unexpected(&path, "expected an import path"));
		}

		let alias = if self.check_keyword(Keyword::As)? {
			self.advance()?;
			Some(self.expect_name("after `as`")?.text)
		} else {
			None
		};
		self.expect(TokenKind::Semicolon, "after import")?;

		Ok(Node::Import {
			path: path.text,
			alias,
		})
	}

	/// `@Type [name] { raw }` or `@Type name [from ns];`
	fn origin(&mut self) -> ChtlResult<Node> {
		self.expect(TokenKind::At, "before origin type")?;
		let subtype = self.expect_name("as origin type")?.text;
		let name = if self.peek()?.is_name() && !self.check_keyword(Keyword::From)? {
			Some(self.advance()?.text)
		} else {
			None
		};

		if self.check(TokenKind::LeftBrace)? {
			let open = self.advance()?;
			let content = self.raw_block(&open, "origin block")?;

			let Some(name) = name else {
				return Ok(Node::Origin { subtype, content });
			};

			let def = OriginDef {
				subtype,
				name,
				content,
			};
			self.context
				.registry
				.register(&self.context.namespace, Definition::Origin(def.clone()));
			return Ok(Node::OriginDef(def));
		}

		let token = self.peek()?.clone();
		let Some(name) = name else {
			return Err(unexpected(&token, "expected `{` or an origin name"));
		};

		let namespace = if self.check_keyword(Keyword::From)? {
			self.advance()?;
			Some(self.expect_name("after `from`")?.text)
		} else if self.context.in_default_namespace() {
			None
		} else {
			Some(self.context.namespace.clone())
		};
		self.expect(TokenKind::Semicolon, "after origin usage")?;

		Ok(Node::OriginUsage {
			subtype,
			name,
			namespace,
		})
	}

	/// `[Configuration] [name] { ... }`. The settings have already been
	/// applied by the pre-scan; the node only records them.
	fn configuration(&mut self) -> ChtlResult<Node> {
		if self.check(TokenKind::Identifier)? {
			self.advance()?;
		}
		let open = self.expect(TokenKind::LeftBrace, "after `[Configuration]`")?;
		let body = self.raw_block(&open, "configuration block")?;
		let (settings, keywords) = parse_configuration_body(&body)?;

		Ok(Node::Configuration { settings, keywords })
	}

	/// `[Namespace] name { ... }` or `[Namespace] name;`
	fn namespace(&mut self, out: &mut Vec<Node>) -> ChtlResult<()> {
		let name = self.expect_name("after `[Namespace]`")?.text;

		if self.eat(TokenKind::Semicolon)? {
			tracing::debug!(namespace = %name, "switching namespace");
			self.context.namespace = name;
			return Ok(());
		}

		self.expect(TokenKind::LeftBrace, "to open namespace body")?;
		let name = if self.context.in_default_namespace() {
			name
		} else {
			format!("{}.{name}", self.context.namespace)
		};
		let outer = std::mem::replace(&mut self.context.namespace, name);

		let mut result = Ok(());
		while result.is_ok() && !self.check(TokenKind::RightBrace)? {
			result = self.declaration(out);
		}
		self.context.namespace = outer;
		result?;

		self.expect(TokenKind::RightBrace, "to close namespace body")?;
		Ok(())
	}
}

fn unexpected(token: &Token, message: &str) -> ChtlError {
	if token.is(TokenKind::Eof) {
		return ChtlError::UnexpectedEof(message.trim_start_matches("expected ").to_string());
	}

	ChtlError::parse(
		format!("{message}, found {token}"),
		token.position.line,
		token.position.column,
	)
}
