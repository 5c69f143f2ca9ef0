use std::collections::HashMap;
use std::fmt::Display;
use std::ops::Range;

use crate::Position;

/// Reserved words of the CHTL surface syntax. Their spellings live in a
/// [`KeywordTable`] so that a `[Configuration]` block can rename them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
	Text,
	Style,
	Script,
	Template,
	Custom,
	Inherit,
	Delete,
	Insert,
	After,
	Before,
	Replace,
	Import,
	From,
	As,
	Use,
}

impl Keyword {
	pub const ALL: [Keyword; 15] = [
		Keyword::Text,
		Keyword::Style,
		Keyword::Script,
		Keyword::Template,
		Keyword::Custom,
		Keyword::Inherit,
		Keyword::Delete,
		Keyword::Insert,
		Keyword::After,
		Keyword::Before,
		Keyword::Replace,
		Keyword::Import,
		Keyword::From,
		Keyword::As,
		Keyword::Use,
	];

	/// The spelling used when no configuration overrides it.
	pub fn default_spelling(self) -> &'static str {
		match self {
			Self::Text => "text",
			Self::Style => "style",
			Self::Script => "script",
			Self::Template => "Template",
			Self::Custom => "Custom",
			Self::Inherit => "inherit",
			Self::Delete => "delete",
			Self::Insert => "insert",
			Self::After => "after",
			Self::Before => "before",
			Self::Replace => "replace",
			Self::Import => "Import",
			Self::From => "from",
			Self::As => "as",
			Self::Use => "use",
		}
	}

	/// The `[Name]` configuration key that renames this keyword, e.g.
	/// `KEYWORD_TEXT`.
	pub fn config_key(self) -> &'static str {
		match self {
			Self::Text => "KEYWORD_TEXT",
			Self::Style => "KEYWORD_STYLE",
			Self::Script => "KEYWORD_SCRIPT",
			Self::Template => "KEYWORD_TEMPLATE",
			Self::Custom => "KEYWORD_CUSTOM",
			Self::Inherit => "KEYWORD_INHERIT",
			Self::Delete => "KEYWORD_DELETE",
			Self::Insert => "KEYWORD_INSERT",
			Self::After => "KEYWORD_AFTER",
			Self::Before => "KEYWORD_BEFORE",
			Self::Replace => "KEYWORD_REPLACE",
			Self::Import => "KEYWORD_IMPORT",
			Self::From => "KEYWORD_FROM",
			Self::As => "KEYWORD_AS",
			Self::Use => "KEYWORD_USE",
		}
	}

	pub fn from_config_key(key: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|keyword| keyword.config_key() == key)
	}
}

/// Maps identifier spellings to keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTable {
	spellings: HashMap<String, Keyword>,
}

impl Default for KeywordTable {
	fn default() -> Self {
		let spellings = Keyword::ALL
			.into_iter()
			.map(|keyword| (keyword.default_spelling().to_string(), keyword))
			.collect();

		Self { spellings }
	}
}

impl KeywordTable {
	pub fn lookup(&self, ident: &str) -> Option<Keyword> {
		self.spellings.get(ident).copied()
	}

	/// Replace every spelling of `keyword` with `aliases`. An empty alias list
	/// leaves the table untouched.
	pub fn remap(&mut self, keyword: Keyword, aliases: &[String]) {
		if aliases.is_empty() {
			return;
		}

		self.spellings.retain(|_, existing| *existing != keyword);
		for alias in aliases {
			self.spellings.insert(alias.clone(), keyword);
		}
	}

	/// All spellings currently recognised for `keyword`.
	pub fn spellings(&self, keyword: Keyword) -> Vec<&str> {
		let mut spellings: Vec<&str> = self
			.spellings
			.iter()
			.filter(|(_, existing)| **existing == keyword)
			.map(|(spelling, _)| spelling.as_str())
			.collect();
		spellings.sort_unstable();
		spellings
	}

	pub fn is_default(&self) -> bool {
		*self == Self::default()
	}
}

/// The kinds of token produced by the CHTL lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
	/// `{`
	LeftBrace,
	/// `}`
	RightBrace,
	/// `[`
	LeftBracket,
	/// `]`
	RightBracket,
	/// `:`
	Colon,
	/// `=`
	Equals,
	/// `;`
	Semicolon,
	/// `,`
	Comma,
	/// `.`
	Dot,
	/// `@`
	At,
	/// `#`
	Hash,
	/// `&`
	Ampersand,
	/// `-- text` up to the end of the line. The token text is the comment body.
	GeneratorComment,
	/// A single or double quoted string. The token text is the unescaped body.
	String,
	/// A number with an optional unit suffix, e.g. `100px` or `50%`.
	Number,
	Identifier,
	Keyword(Keyword),
	/// The brace-balanced body of an `[Origin]` or `[Configuration]` block,
	/// only produced by the pre-scan.
	RawBlock,
	Eof,
}

impl Display for TokenKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::LeftBrace => write!(f, "`{{`"),
			Self::RightBrace => write!(f, "`}}`"),
			Self::LeftBracket => write!(f, "`[`"),
			Self::RightBracket => write!(f, "`]`"),
			Self::Colon => write!(f, "`:`"),
			Self::Equals => write!(f, "`=`"),
			Self::Semicolon => write!(f, "`;`"),
			Self::Comma => write!(f, "`,`"),
			Self::Dot => write!(f, "`.`"),
			Self::At => write!(f, "`@`"),
			Self::Hash => write!(f, "`#`"),
			Self::Ampersand => write!(f, "`&`"),
			Self::GeneratorComment => write!(f, "generator comment"),
			Self::String => write!(f, "string"),
			Self::Number => write!(f, "number"),
			Self::Identifier => write!(f, "identifier"),
			Self::Keyword(keyword) => write!(f, "keyword `{}`", keyword.default_spelling()),
			Self::RawBlock => write!(f, "raw block"),
			Self::Eof => write!(f, "end of input"),
		}
	}
}

/// A single lexed token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	pub kind: TokenKind,
	/// The literal text. For strings and generator comments this is the
	/// processed body rather than the raw slice.
	pub text: String,
	/// Line and column of the first byte.
	pub position: Position,
	/// Byte range in the lexed source.
	pub span: Range<usize>,
}

impl Token {
	pub fn is(&self, kind: TokenKind) -> bool {
		self.kind == kind
	}

	pub fn is_keyword(&self, keyword: Keyword) -> bool {
		self.kind == TokenKind::Keyword(keyword)
	}

	/// True for identifiers and keywords with the given spelling. Bracketed
	/// block names such as `Origin` are matched this way.
	pub fn is_word(&self, word: &str) -> bool {
		matches!(self.kind, TokenKind::Identifier | TokenKind::Keyword(_)) && self.text == word
	}

	/// Identifiers and keywords both name things in attribute and property
	/// position (`style: ...`, `text: ...`).
	pub fn is_name(&self) -> bool {
		matches!(self.kind, TokenKind::Identifier | TokenKind::Keyword(_))
	}
}

impl Display for Token {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self.kind {
			TokenKind::Eof => write!(f, "end of input"),
			TokenKind::String => write!(f, "\"{}\"", self.text),
			_ => write!(f, "`{}`", self.text),
		}
	}
}
