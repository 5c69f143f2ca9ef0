use logos::Logos;
use snailquote::unescape;

use crate::ChtlError;
use crate::ChtlResult;
use crate::LineTable;
use crate::Policy;
use crate::Warning;
use crate::tokens::Keyword;
use crate::tokens::KeywordTable;
use crate::tokens::Token;
use crate::tokens::TokenKind;

/// Raw tokens produced by logos. The [`Lexer`] turns these into [`Token`]s,
/// resolving keywords and string bodies.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
enum RawToken {
	#[token("{")]
	LeftBrace,
	#[token("}")]
	RightBrace,
	#[token("[")]
	LeftBracket,
	#[token("]")]
	RightBracket,
	#[token(":")]
	Colon,
	#[token("=")]
	Equals,
	#[token(";")]
	Semicolon,
	#[token(",")]
	Comma,
	#[token(".")]
	Dot,
	#[token("@")]
	At,
	#[token("#")]
	Hash,
	#[token("&")]
	Ampersand,
	#[regex(r"--[^\n]*", allow_greedy = true)]
	GeneratorComment,
	#[regex(r#""([^"\\]|\\.)*""#)]
	DoubleQuotedString,
	#[regex(r"'([^'\\]|\\.)*'")]
	SingleQuotedString,
	#[regex(r"[0-9]+(\.[0-9]+)?[a-zA-Z%]*")]
	Number,
	#[regex(r"[a-zA-Z_][a-zA-Z0-9_-]*")]
	Ident,
	/// Only matches when no terminated comment does.
	#[token("/*")]
	UnterminatedComment,
	#[token("\"")]
	UnterminatedDoubleQuote,
	#[token("'")]
	UnterminatedSingleQuote,
}

/// Pull-based CHTL tokenizer.
///
/// The parser asks for one token at a time. When it reaches a region whose
/// content must not be tokenized (an origin body, a property value, a selector)
/// it asks for the raw text instead and the lexer resumes after it.
pub struct Lexer<'a> {
	source: &'a str,
	inner: logos::Lexer<'a, RawToken>,
	/// Offset of `inner`'s slice within `source`.
	base: usize,
	keywords: KeywordTable,
	lines: LineTable,
	policy: Policy,
	warnings: Vec<Warning>,
}

impl<'a> Lexer<'a> {
	pub fn new(source: &'a str, keywords: &KeywordTable) -> Self {
		Self {
			source,
			inner: RawToken::lexer(source),
			base: 0,
			keywords: keywords.clone(),
			lines: LineTable::new(source),
			policy: Policy::Warn,
			warnings: vec![],
		}
	}

	/// Set how unknown characters are handled.
	#[must_use]
	pub fn with_policy(mut self, policy: Policy) -> Self {
		self.policy = policy;
		self
	}

	pub fn source(&self) -> &'a str {
		self.source
	}

	pub fn lines(&self) -> &LineTable {
		&self.lines
	}

	pub fn warnings(&self) -> &[Warning] {
		&self.warnings
	}

	pub fn into_warnings(self) -> Vec<Warning> {
		self.warnings
	}

	/// Produce the next token, or an `Eof` token once the input is exhausted.
	pub fn next_token(&mut self) -> ChtlResult<Token> {
		loop {
			let Some(result) = self.inner.next() else {
				let end = self.source.len();
				return Ok(Token {
					kind: TokenKind::Eof,
					text: String::new(),
					position: self.lines.position(end),
					span: end..end,
				});
			};

			let span = self.inner.span();
			let span = (span.start + self.base)..(span.end + self.base);

			match result {
				Ok(raw) => return self.make_token(raw, span),
				Err(()) => self.skip_unknown(span.start)?,
			}
		}
	}

	fn make_token(&self, raw: RawToken, span: std::ops::Range<usize>) -> ChtlResult<Token> {
		let slice = &self.source[span.clone()];
		let position = self.lines.position(span.start);

		let (kind, text) = match raw {
			RawToken::LeftBrace => (TokenKind::LeftBrace, slice.to_string()),
			RawToken::RightBrace => (TokenKind::RightBrace, slice.to_string()),
			RawToken::LeftBracket => (TokenKind::LeftBracket, slice.to_string()),
			RawToken::RightBracket => (TokenKind::RightBracket, slice.to_string()),
			RawToken::Colon => (TokenKind::Colon, slice.to_string()),
			RawToken::Equals => (TokenKind::Equals, slice.to_string()),
			RawToken::Semicolon => (TokenKind::Semicolon, slice.to_string()),
			RawToken::Comma => (TokenKind::Comma, slice.to_string()),
			RawToken::Dot => (TokenKind::Dot, slice.to_string()),
			RawToken::At => (TokenKind::At, slice.to_string()),
			RawToken::Hash => (TokenKind::Hash, slice.to_string()),
			RawToken::Ampersand => (TokenKind::Ampersand, slice.to_string()),
			RawToken::GeneratorComment => {
				(TokenKind::GeneratorComment, slice[2..].trim().to_string())
			}
			RawToken::DoubleQuotedString | RawToken::SingleQuotedString => {
				(TokenKind::String, unquote_body(&slice[1..slice.len() - 1]))
			}
			RawToken::Number => (TokenKind::Number, slice.to_string()),
			RawToken::Ident => {
				match self.keywords.lookup(slice) {
					Some(keyword) => (TokenKind::Keyword(keyword), slice.to_string()),
					None => (TokenKind::Identifier, slice.to_string()),
				}
			}
			RawToken::UnterminatedComment => {
				return Err(ChtlError::UnterminatedBlock {
					what: "block comment".into(),
					line: position.line,
					column: position.column,
				});
			}
			RawToken::UnterminatedDoubleQuote | RawToken::UnterminatedSingleQuote => {
				return Err(ChtlError::UnterminatedBlock {
					what: "string literal".into(),
					line: position.line,
					column: position.column,
				});
			}
		};

		Ok(Token {
			kind,
			text,
			position,
			span,
		})
	}

	fn skip_unknown(&mut self, offset: usize) -> ChtlResult<()> {
		let ch = self.source[offset..].chars().next().unwrap_or('\u{fffd}');
		let position = self.lines.position(offset);

		match self.policy {
			Policy::Error => {
				Err(ChtlError::UnknownCharacter {
					ch,
					line: position.line,
					column: position.column,
				})
			}
			Policy::Warn => {
				self.warnings.push(Warning::UnknownCharacter { ch, position });
				Ok(())
			}
		}
	}

	/// Restart tokenization at `offset`. Warnings recorded at or after the
	/// offset came from tokens that are being discarded.
	fn reset_to(&mut self, offset: usize) {
		self.inner = RawToken::lexer(&self.source[offset..]);
		self.base = offset;
		self.warnings
			.retain(|warning| warning.offset().is_none_or(|at| at < offset));
	}

	/// Capture the body of a brace block whose `{` ends at `open_end`. Braces
	/// are balanced without regard to quotes, so the body may hold arbitrary
	/// HTML, CSS or JavaScript. Tokenization resumes after the closing `}`.
	pub fn raw_block(&mut self, open_end: usize, what: &str) -> ChtlResult<String> {
		let bytes = self.source.as_bytes();
		let mut depth = 1usize;
		let mut index = open_end;

		while index < bytes.len() {
			match bytes[index] {
				b'{' => depth += 1,
				b'}' => {
					depth -= 1;
					if depth == 0 {
						let body = self.source[open_end..index].to_string();
						self.reset_to(index + 1);
						return Ok(body);
					}
				}
				_ => {}
			}
			index += 1;
		}

		let position = self.lines.position(open_end.saturating_sub(1));
		Err(ChtlError::UnterminatedBlock {
			what: what.to_string(),
			line: position.line,
			column: position.column,
		})
	}

	/// Capture a property or attribute value starting at `start`. The value
	/// ends at the first `;` (consumed) or `}` (left for the parser) that is
	/// outside quotes and parentheses. The result is trimmed.
	pub fn raw_value(&mut self, start: usize) -> ChtlResult<String> {
		let bytes = self.source.as_bytes();
		let mut quote: Option<u8> = None;
		let mut depth = 0usize;
		let mut index = start;

		while index < bytes.len() {
			let byte = bytes[index];
			if let Some(open) = quote {
				if byte == b'\\' {
					index += 1;
				} else if byte == open {
					quote = None;
				}
				index += 1;
				continue;
			}

			match byte {
				b'"' | b'\'' => quote = Some(byte),
				b'(' | b'[' => depth += 1,
				b')' | b']' => depth = depth.saturating_sub(1),
				b';' if depth == 0 => {
					let value = self.source[start..index].trim().to_string();
					self.reset_to(index + 1);
					return Ok(value);
				}
				b'}' if depth == 0 => {
					let value = self.source[start..index].trim().to_string();
					self.reset_to(index);
					return Ok(value);
				}
				_ => {}
			}
			index += 1;
		}

		Err(ChtlError::UnexpectedEof("a property value".into()))
	}

	/// Capture a selector starting at `start` up to (and consuming) the next
	/// `{` outside quotes. The result is trimmed.
	pub fn raw_selector(&mut self, start: usize) -> ChtlResult<String> {
		let bytes = self.source.as_bytes();
		let mut quote: Option<u8> = None;
		let mut index = start;

		while index < bytes.len() {
			let byte = bytes[index];
			match quote {
				Some(open) if byte == open => quote = None,
				Some(_) => {}
				None if byte == b'"' || byte == b'\'' => quote = Some(byte),
				None if byte == b'{' => {
					let selector = self.source[start..index].trim().to_string();
					self.reset_to(index + 1);
					return Ok(selector);
				}
				None if byte == b'}' || byte == b';' => break,
				None => {}
			}
			index += 1;
		}

		let position = self.lines.position(start);
		Err(ChtlError::parse(
			"expected `{` after selector",
			position.line,
			position.column,
		))
	}
}

/// Strip escapes from the body of a quoted string.
fn unquote_body(inner: &str) -> String {
	if inner.contains('\\') {
		unescape(inner).unwrap_or_else(|_| inner.to_string())
	} else {
		inner.to_string()
	}
}

/// If `raw` is exactly one quoted string, return its unescaped body.
pub fn unquote(raw: &str) -> Option<String> {
	let mut lexer = RawToken::lexer(raw.trim());
	let token = lexer.next()?;
	let slice = lexer.slice();
	if lexer.next().is_some() {
		return None;
	}

	match token {
		Ok(RawToken::DoubleQuotedString | RawToken::SingleQuotedString) => {
			Some(unquote_body(&slice[1..slice.len() - 1]))
		}
		_ => None,
	}
}

/// Tokenize a whole source. Unknown characters are skipped.
pub fn tokenize(source: &str, keywords: &KeywordTable) -> ChtlResult<Vec<Token>> {
	let mut lexer = Lexer::new(source, keywords);
	let mut tokens = vec![];

	loop {
		let token = lexer.next_token()?;
		if token.is(TokenKind::Eof) {
			break;
		}
		tokens.push(token);
	}

	Ok(tokens)
}

/// Tokenize a whole source for the configuration and import pre-scans. The
/// bodies of `[Origin]`, `[Configuration]` and `text` blocks are returned as
/// single `RawBlock` tokens so that their content is never tokenized.
pub fn prescan(source: &str, keywords: &KeywordTable) -> ChtlResult<Vec<Token>> {
	let mut lexer = Lexer::new(source, keywords);
	let mut tokens: Vec<Token> = vec![];
	let mut raw_pending = false;

	loop {
		let token = lexer.next_token()?;
		match token.kind {
			TokenKind::Eof => break,
			TokenKind::LeftBrace if raw_pending => {
				raw_pending = false;
				let start = token.span.end;
				let position = token.position;
				tokens.push(token);
				let body = lexer.raw_block(start, "raw block")?;
				let end = start + body.len();
				tokens.push(Token {
					kind: TokenKind::RawBlock,
					text: body,
					position,
					span: start..end,
				});
				continue;
			}
			TokenKind::RightBracket => {
				let len = tokens.len();
				raw_pending = len >= 2
					&& tokens[len - 2].is(TokenKind::LeftBracket)
					&& (tokens[len - 1].is_word("Origin") || tokens[len - 1].is_word("Configuration"));
			}
			TokenKind::Keyword(Keyword::Text) => raw_pending = true,
			TokenKind::Semicolon | TokenKind::Colon | TokenKind::Equals => raw_pending = false,
			_ => {}
		}
		tokens.push(token);
	}

	Ok(tokens)
}
