use serde::Serialize;

use crate::Position;

/// A problem that did not stop compilation. In lenient mode these stand in
/// for errors that strict mode would raise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum Warning {
	/// A character the lexer has no token for was skipped.
	UnknownCharacter { ch: char, position: Position },
	/// A usage named a definition that no namespace provides. The usage was
	/// dropped.
	UnresolvedDefinition {
		kind: String,
		name: String,
		namespace: String,
	},
}

impl Warning {
	pub(crate) fn offset(&self) -> Option<usize> {
		match self {
			Self::UnknownCharacter { position, .. } => Some(position.offset),
			Self::UnresolvedDefinition { .. } => None,
		}
	}
}

impl std::fmt::Display for Warning {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::UnknownCharacter { ch, position } => {
				write!(f, "skipped unknown character `{ch}` at {position}")
			}
			Self::UnresolvedDefinition {
				kind,
				name,
				namespace,
			} => {
				write!(
					f,
					"skipped usage of unknown {kind} `{name}` (namespace `{namespace}`)"
				)
			}
		}
	}
}
