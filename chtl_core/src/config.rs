use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

use crate::ChtlError;
use crate::ChtlResult;
use crate::ast::PropertyMap;
use crate::lexer::prescan;
use crate::lexer::tokenize;
use crate::tokens::Keyword;
use crate::tokens::KeywordTable;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["chtl.toml", ".chtl.toml", ".config/chtl.toml"];

/// How a recoverable problem in the source is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
	/// Skip the offending input, log it and record a warning.
	#[default]
	Warn,
	/// Abort compilation.
	Error,
}

/// Configuration loaded from a `chtl.toml` file.
///
/// ```toml
/// [strict]
/// unresolved_usage = "error"
/// unknown_characters = "warn"
///
/// [output]
/// doctype = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChtlConfig {
	#[serde(default)]
	pub strict: StrictConfig,
	#[serde(default)]
	pub output: OutputConfig,
}

/// Whether lenient-mode gaps become errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct StrictConfig {
	/// A `@Style`, `@Element` or `[Origin]` usage that names no definition.
	#[serde(default)]
	pub unresolved_usage: Policy,
	/// A character the lexer has no token for.
	#[serde(default)]
	pub unknown_characters: Policy,
}

impl StrictConfig {
	/// Every policy set to [`Policy::Error`].
	pub fn strict() -> Self {
		Self {
			unresolved_usage: Policy::Error,
			unknown_characters: Policy::Error,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
	/// Prefix the document with `<!DOCTYPE html>` even without `use html5;`.
	#[serde(default)]
	pub doctype: bool,
}

impl ChtlConfig {
	/// Returns the first config file path that exists under `root`.
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> ChtlResult<Option<ChtlConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config: ChtlConfig =
			toml::from_str(&content).map_err(|e| ChtlError::ConfigParse(e.to_string()))?;

		tracing::debug!(path = %config_path.display(), "loaded config");
		Ok(Some(config))
	}
}

/// Settings declared in the source itself with `[Configuration]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfiguration {
	pub keywords: KeywordTable,
	/// `INDEX_INITIAL_COUNT`: the number that names the first match in a
	/// `tag[n]` selector.
	pub index_base: usize,
	/// `DEBUG_MODE`
	pub debug: bool,
}

impl Default for SourceConfiguration {
	fn default() -> Self {
		Self {
			keywords: KeywordTable::default(),
			index_base: 0,
			debug: false,
		}
	}
}

impl SourceConfiguration {
	/// Collect every `[Configuration]` block in `source`. Blocks are applied
	/// in order, so later settings win.
	pub fn prescan(source: &str) -> ChtlResult<Self> {
		let tokens = prescan(source, &KeywordTable::default())?;
		let mut config = Self::default();

		for (index, token) in tokens.iter().enumerate() {
			if !token.is(TokenKind::RawBlock) || !is_configuration_body(&tokens[..index]) {
				continue;
			}

			let (settings, keywords) = parse_configuration_body(&token.text)?;
			config.apply(&settings, &keywords);
		}

		Ok(config)
	}

	fn apply(&mut self, settings: &PropertyMap, keywords: &IndexMap<String, Vec<String>>) {
		for (key, value) in settings {
			match key.as_str() {
				"INDEX_INITIAL_COUNT" => {
					match value.parse() {
						Ok(base) => self.index_base = base,
						Err(_) => tracing::warn!(%value, "ignoring non-numeric INDEX_INITIAL_COUNT"),
					}
				}
				"DEBUG_MODE" => self.debug = value.eq_ignore_ascii_case("true"),
				_ => tracing::debug!(%key, "ignoring unrecognised configuration setting"),
			}
		}

		for (key, aliases) in keywords {
			match Keyword::from_config_key(key) {
				Some(keyword) => self.keywords.remap(keyword, aliases),
				None => tracing::warn!(%key, "ignoring unknown keyword in [Name] block"),
			}
		}
	}
}

/// Whether the raw block after `preceding` belongs to `[Configuration]`.
fn is_configuration_body(preceding: &[Token]) -> bool {
	let mut rest = preceding.iter().rev();
	if !rest.next().is_some_and(|token| token.is(TokenKind::LeftBrace)) {
		return false;
	}

	let mut next = rest.next();
	if next.is_some_and(|token| token.kind == TokenKind::Identifier) {
		next = rest.next();
	}

	next.is_some_and(|token| token.is(TokenKind::RightBracket))
		&& rest.next().is_some_and(|token| token.is_word("Configuration"))
		&& rest.next().is_some_and(|token| token.is(TokenKind::LeftBracket))
}

/// Parse the body of a `[Configuration]` block into plain settings and
/// `[Name]` keyword aliases.
///
/// ```text
/// INDEX_INITIAL_COUNT = 1;
/// [Name] {
///     KEYWORD_TEXT = "txt";
///     KEYWORD_STYLE = ["css", "style"];
/// }
/// ```
pub fn parse_configuration_body(
	body: &str,
) -> ChtlResult<(PropertyMap, IndexMap<String, Vec<String>>)> {
	let tokens = tokenize(body, &KeywordTable::default())?;
	let mut cursor = ConfigCursor {
		tokens: &tokens,
		index: 0,
	};
	let mut settings = PropertyMap::new();
	let mut keywords = IndexMap::new();

	while let Some(token) = cursor.peek() {
		if token.is(TokenKind::LeftBracket) {
			cursor.expect(TokenKind::LeftBracket)?;
			let section = cursor.name()?;
			cursor.expect(TokenKind::RightBracket)?;
			cursor.expect(TokenKind::LeftBrace)?;

			while cursor.peek().is_some_and(|token| !token.is(TokenKind::RightBrace)) {
				let (key, values) = cursor.entry()?;
				if section == "Name" {
					keywords.insert(key, values);
				} else {
					tracing::debug!(%section, %key, "ignoring setting in unsupported section");
				}
			}
			cursor.expect(TokenKind::RightBrace)?;
		} else {
			let (key, values) = cursor.entry()?;
			settings.insert(key, values.join(","));
		}
	}

	Ok((settings, keywords))
}

struct ConfigCursor<'a> {
	tokens: &'a [Token],
	index: usize,
}

impl ConfigCursor<'_> {
	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.index)
	}

	fn advance(&mut self) -> ChtlResult<&Token> {
		let token = self
			.tokens
			.get(self.index)
			.ok_or_else(|| ChtlError::UnexpectedEof("a configuration block".into()))?;
		self.index += 1;
		Ok(token)
	}

	fn expect(&mut self, kind: TokenKind) -> ChtlResult<()> {
		let token = self.advance()?;
		if token.is(kind) {
			Ok(())
		} else {
			Err(ChtlError::parse(
				format!("expected {kind} in configuration, found {token}"),
				token.position.line,
				token.position.column,
			))
		}
	}

	fn name(&mut self) -> ChtlResult<String> {
		let token = self.advance()?;
		if token.is_name() {
			Ok(token.text.clone())
		} else {
			Err(ChtlError::parse(
				format!("expected a setting name, found {token}"),
				token.position.line,
				token.position.column,
			))
		}
	}

	/// `KEY = value;` or `KEY = [a, b];` where `:` may stand in for `=`.
	fn entry(&mut self) -> ChtlResult<(String, Vec<String>)> {
		let key = self.name()?;
		let separator = self.advance()?;
		if !matches!(separator.kind, TokenKind::Equals | TokenKind::Colon) {
			return Err(ChtlError::parse(
				format!("expected `=` after `{key}`, found {separator}"),
				separator.position.line,
				separator.position.column,
			));
		}

		let mut values = vec![];
		if self.peek().is_some_and(|token| token.is(TokenKind::LeftBracket)) {
			self.advance()?;
			loop {
				let token = self.advance()?;
				match token.kind {
					TokenKind::RightBracket => break,
					TokenKind::Comma => {}
					_ => values.push(token.text.clone()),
				}
			}
		} else {
			values.push(self.advance()?.text.clone());
		}

		if self.peek().is_some_and(|token| token.is(TokenKind::Semicolon)) {
			self.advance()?;
		}

		Ok((key, values))
	}
}
