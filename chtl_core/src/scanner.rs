use std::ops::Range;

use derive_more::Display;
use serde::Serialize;

use crate::ChtlError;
use crate::ChtlResult;
use crate::LineTable;
use crate::Position;
use crate::tokens::Keyword;
use crate::tokens::KeywordTable;

/// The sub-language a [`Fragment`] is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
	#[display("chtl")]
	Chtl,
	/// A top-level `style { }` block.
	#[display("global_css")]
	GlobalCss,
	/// A top-level `script { }` block.
	#[display("global_js")]
	GlobalJs,
	/// A `script { }` block nested inside an element.
	#[display("local_script")]
	LocalScript,
}

/// A contiguous slice of the source in one sub-language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
	pub kind: FragmentKind,
	/// The full source slice, including the `style {`/`script {` wrapper for
	/// lifted blocks.
	pub text: String,
	/// For lifted blocks the body between the braces, otherwise the same as
	/// `text`.
	pub content: String,
	pub position: Position,
	pub span: Range<usize>,
}

/// Split `source` into ordered fragments with no gaps or overlaps.
///
/// `style` blocks at brace depth zero become [`FragmentKind::GlobalCss`];
/// `script` blocks become [`FragmentKind::GlobalJs`] at depth zero and
/// [`FragmentKind::LocalScript`] anywhere else. Everything in between is
/// CHTL. Nested `style` blocks stay in the CHTL fragment so the parser can
/// resolve their template usages.
pub fn scan(source: &str, keywords: &KeywordTable) -> ChtlResult<Vec<Fragment>> {
	let mut scanner = Scanner {
		source,
		bytes: source.as_bytes(),
		keywords,
		lines: LineTable::new(source),
		fragments: vec![],
		chtl_start: 0,
	};
	scanner.run()?;

	tracing::debug!(count = scanner.fragments.len(), "scanned source fragments");
	Ok(scanner.fragments)
}

/// Rebuild a source in which every non-CHTL fragment is blanked out.
/// Newlines are kept so that line and column numbers still match the
/// original source.
pub fn chtl_view(fragments: &[Fragment]) -> String {
	let mut view = String::new();
	for fragment in fragments {
		if fragment.kind == FragmentKind::Chtl {
			view.push_str(&fragment.text);
		} else {
			view.extend(
				fragment
					.text
					.chars()
					.map(|ch| if ch == '\n' { '\n' } else { ' ' }),
			);
		}
	}
	view
}

struct Scanner<'a> {
	source: &'a str,
	bytes: &'a [u8],
	keywords: &'a KeywordTable,
	lines: LineTable,
	fragments: Vec<Fragment>,
	chtl_start: usize,
}

impl Scanner<'_> {
	fn run(&mut self) -> ChtlResult<()> {
		let mut depth = 0usize;
		let mut index = 0;

		while index < self.bytes.len() {
			let byte = self.bytes[index];
			match byte {
				b'"' | b'\'' => index = skip_string(self.bytes, index),
				b'/' if self.peek(index + 1) == Some(b'/') => index = skip_line(self.bytes, index),
				b'/' if self.peek(index + 1) == Some(b'*') => {
					index = skip_block_comment(self.bytes, index);
				}
				b'-' if self.peek(index + 1) == Some(b'-') => index = skip_line(self.bytes, index),
				b'{' => {
					depth += 1;
					index += 1;
				}
				b'}' => {
					depth = depth.saturating_sub(1);
					index += 1;
				}
				b'[' => index = self.skip_origin(index)?,
				_ if is_ident_start(byte) => index = self.word(index, depth)?,
				_ => index += 1,
			}
		}

		self.flush_chtl(self.bytes.len());
		Ok(())
	}

	fn peek(&self, index: usize) -> Option<u8> {
		self.bytes.get(index).copied()
	}

	/// Handle the identifier starting at `start`. Returns the index to resume
	/// scanning from.
	fn word(&mut self, start: usize, depth: usize) -> ChtlResult<usize> {
		let mut end = start;
		while end < self.bytes.len() && is_ident_continue(self.bytes[end]) {
			end += 1;
		}

		let keyword = self.keywords.lookup(&self.source[start..end]);
		let kind = match keyword {
			Some(Keyword::Style) if depth == 0 => Some(FragmentKind::GlobalCss),
			Some(Keyword::Script) if depth == 0 => Some(FragmentKind::GlobalJs),
			Some(Keyword::Script) => Some(FragmentKind::LocalScript),
			Some(Keyword::Text) => None,
			_ => return Ok(end),
		};

		let Some(open) = self.open_brace_after(end) else {
			return Ok(end);
		};

		let Some(kind) = kind else {
			// Unquoted text bodies may hold stray quotes, so step over them
			// without looking inside.
			return self.raw_end(open, "text block");
		};

		let what = match kind {
			FragmentKind::GlobalCss => "style block",
			_ => "script block",
		};
		let close = self.balanced_end(open, what, kind != FragmentKind::GlobalCss)?;

		self.flush_chtl(start);
		self.fragments.push(Fragment {
			kind,
			text: self.source[start..close].to_string(),
			content: self.source[open + 1..close - 1].to_string(),
			position: self.lines.position(start),
			span: start..close,
		});
		self.chtl_start = close;

		Ok(close)
	}

	/// Index of the `{` that follows `from` after optional whitespace.
	fn open_brace_after(&self, from: usize) -> Option<usize> {
		let mut index = from;
		while index < self.bytes.len() && self.bytes[index].is_ascii_whitespace() {
			index += 1;
		}
		(self.peek(index) == Some(b'{')).then_some(index)
	}

	/// Find the end (exclusive, after `}`) of the block opened at `open`.
	/// Quotes and block comments are stepped over; `//` comments only when
	/// `line_comments` is set since `//` is legal inside CSS values.
	fn balanced_end(&self, open: usize, what: &str, line_comments: bool) -> ChtlResult<usize> {
		let mut depth = 0usize;
		let mut index = open;

		while index < self.bytes.len() {
			match self.bytes[index] {
				b'{' => depth += 1,
				b'}' => {
					depth -= 1;
					if depth == 0 {
						return Ok(index + 1);
					}
				}
				b'"' | b'\'' | b'`' => {
					index = skip_string(self.bytes, index);
					continue;
				}
				b'/' if self.peek(index + 1) == Some(b'*') => {
					index = skip_block_comment(self.bytes, index);
					continue;
				}
				b'/' if line_comments && self.peek(index + 1) == Some(b'/') => {
					index = skip_line(self.bytes, index);
					continue;
				}
				_ => {}
			}
			index += 1;
		}

		let position = self.lines.position(open);
		Err(ChtlError::UnterminatedBlock {
			what: what.to_string(),
			line: position.line,
			column: position.column,
		})
	}

	/// Step over `[Origin] ... { raw }` without counting its braces. Any
	/// other bracket is consumed as a single byte.
	fn skip_origin(&self, start: usize) -> ChtlResult<usize> {
		let Some(rest) = self.source.get(start + 1..) else {
			return Ok(start + 1);
		};
		let trimmed = rest.trim_start();
		let Some(after) = trimmed.strip_prefix("Origin") else {
			return Ok(start + 1);
		};
		let Some(after) = after.trim_start().strip_prefix(']') else {
			return Ok(start + 1);
		};

		let header_end = self.source.len() - after.len();
		let mut index = header_end;
		while index < self.bytes.len() {
			match self.bytes[index] {
				b';' => return Ok(index + 1),
				b'{' => {
					return self.raw_end(index, "origin block");
				}
				_ => index += 1,
			}
		}

		Ok(index)
	}

	/// Like [`Self::balanced_end`] but blind to quotes and comments.
	fn raw_end(&self, open: usize, what: &str) -> ChtlResult<usize> {
		let mut depth = 0usize;
		for (index, byte) in self.bytes.iter().enumerate().skip(open) {
			match byte {
				b'{' => depth += 1,
				b'}' => {
					depth -= 1;
					if depth == 0 {
						return Ok(index + 1);
					}
				}
				_ => {}
			}
		}

		let position = self.lines.position(open);
		Err(ChtlError::UnterminatedBlock {
			what: what.to_string(),
			line: position.line,
			column: position.column,
		})
	}

	fn flush_chtl(&mut self, end: usize) {
		if end <= self.chtl_start {
			return;
		}

		let text = self.source[self.chtl_start..end].to_string();
		self.fragments.push(Fragment {
			kind: FragmentKind::Chtl,
			content: text.clone(),
			text,
			position: self.lines.position(self.chtl_start),
			span: self.chtl_start..end,
		});
		self.chtl_start = end;
	}
}

fn is_ident_start(byte: u8) -> bool {
	byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_continue(byte: u8) -> bool {
	byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
}

/// Index just past the string starting at `start`, or the end of input.
fn skip_string(bytes: &[u8], start: usize) -> usize {
	let quote = bytes[start];
	let mut index = start + 1;
	while index < bytes.len() {
		match bytes[index] {
			b'\\' => index += 2,
			byte if byte == quote => return index + 1,
			_ => index += 1,
		}
	}
	bytes.len()
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
	bytes[start..]
		.iter()
		.position(|byte| *byte == b'\n')
		.map_or(bytes.len(), |newline| start + newline + 1)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
	let mut index = start + 2;
	while index + 1 < bytes.len() {
		if bytes[index] == b'*' && bytes[index + 1] == b'/' {
			return index + 2;
		}
		index += 1;
	}
	bytes.len()
}
