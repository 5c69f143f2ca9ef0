use serde::Deserialize;
use serde::Serialize;

/// A 1-indexed line/column location together with the byte offset it was
/// computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
	pub line: usize,
	pub column: usize,
	pub offset: usize,
}

impl Position {
	pub fn new(line: usize, column: usize, offset: usize) -> Self {
		Self {
			line,
			column,
			offset,
		}
	}
}

impl std::fmt::Display for Position {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.line, self.column)
	}
}

/// Pre-computed table of line-start byte offsets for offset-to-position
/// conversion. Built once per source in O(n); each lookup is a binary search.
#[derive(Debug, Clone)]
pub struct LineTable {
	/// Byte offsets of the start of each line. `line_starts[0]` is always 0.
	line_starts: Vec<usize>,
}

impl LineTable {
	pub fn new(content: &str) -> Self {
		let mut line_starts = vec![0];
		for (i, byte) in content.bytes().enumerate() {
			if byte == b'\n' {
				line_starts.push(i + 1);
			}
		}
		Self { line_starts }
	}

	pub fn position(&self, offset: usize) -> Position {
		let line_idx = match self.line_starts.binary_search(&offset) {
			Ok(exact) => exact,
			Err(insert) => insert.saturating_sub(1),
		};

		Position {
			line: line_idx + 1,
			column: offset - self.line_starts[line_idx] + 1,
			offset,
		}
	}
}
