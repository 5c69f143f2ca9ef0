use std::ops::Range;

use logos::Logos;

/// Token kinds of the style-value expression language.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum ExprTokenKind {
	/// A number with an optional unit: `10`, `1.5em`, `.5`, `50%`.
	#[regex(r"[0-9]*\.?[0-9]+[a-zA-Z%]*")]
	Number,
	#[regex(r#""([^"\\]|\\.)*""#)]
	#[regex(r"'([^'\\]|\\.)*'")]
	String,
	/// `#name`
	#[regex(r"#[a-zA-Z0-9_-]+")]
	IdSelector,
	/// `.name`, also used for the property part of `#box.width`.
	#[regex(r"\.[a-zA-Z_-][a-zA-Z0-9_-]*")]
	ClassSelector,
	#[regex(r"-?[a-zA-Z_][a-zA-Z0-9_-]*")]
	Identifier,
	#[token("?")]
	Question,
	#[token(":")]
	Colon,
	#[token("||")]
	Or,
	#[token("&&")]
	And,
	#[token(">")]
	Greater,
	#[token(">=")]
	GreaterEqual,
	#[token("<")]
	Less,
	#[token("<=")]
	LessEqual,
	#[token("==")]
	Equal,
	#[token("!=")]
	NotEqual,
	#[token("+")]
	Plus,
	#[token("-")]
	Minus,
	#[token("*")]
	Star,
	#[token("/")]
	Slash,
	#[token("%")]
	Percent,
	#[token("**")]
	Power,
	#[token("(")]
	LeftParen,
	#[token(")")]
	RightParen,
	#[token(",")]
	Comma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprToken {
	pub kind: ExprTokenKind,
	pub text: String,
	pub span: Range<usize>,
}

/// Tokenize a style value. Returns `None` when the value contains anything
/// the expression language has no token for, in which case the value is
/// plain CSS.
pub fn tokenize(input: &str) -> Option<Vec<ExprToken>> {
	let mut lexer = ExprTokenKind::lexer(input);
	let mut tokens = vec![];

	while let Some(result) = lexer.next() {
		let kind = result.ok()?;
		tokens.push(ExprToken {
			kind,
			text: lexer.slice().to_string(),
			span: lexer.span(),
		});
	}

	Some(tokens)
}
