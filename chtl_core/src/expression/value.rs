use std::fmt::Display;

use float_cmp::approx_eq;

/// The result of evaluating a style expression.
#[derive(Debug, Clone)]
pub enum Value {
	/// A number with a possibly empty unit, e.g. `15px` or `2`.
	Number { value: f64, unit: String },
	Str(String),
	/// Any bare CSS word.
	Keyword(String),
	Bool(bool),
	/// What a false conditional without an else branch produces. Properties
	/// with this value are not emitted.
	Empty,
}

impl Value {
	pub fn number(value: f64, unit: impl Into<String>) -> Self {
		Self::Number {
			value,
			unit: unit.into(),
		}
	}

	/// Parse `10`, `-1.5em`, `.5`, `50%` into a number. The unit must be
	/// letters or `%` only.
	pub fn parse_number(text: &str) -> Option<Self> {
		let text = text.trim();
		let digits_end = text
			.char_indices()
			.find(|(index, ch)| !(ch.is_ascii_digit() || *ch == '.' || (*index == 0 && *ch == '-')))
			.map_or(text.len(), |(index, _)| index);
		let (number, unit) = text.split_at(digits_end);

		if !number.bytes().any(|byte| byte.is_ascii_digit()) {
			return None;
		}
		if !unit.chars().all(|ch| ch.is_ascii_alphabetic() || ch == '%') {
			return None;
		}

		let value = number.parse::<f64>().ok()?;
		Some(Self::number(value, unit))
	}

	/// Interpret a raw, unevaluated property value.
	pub fn from_literal(raw: &str) -> Self {
		let raw = raw.trim();
		if let Some(number) = Self::parse_number(raw) {
			return number;
		}

		for quote in ['"', '\''] {
			if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
				return Self::Str(raw[1..raw.len() - 1].to_string());
			}
		}

		match raw {
			"" => Self::Empty,
			"true" => Self::Bool(true),
			"false" => Self::Bool(false),
			_ => Self::Keyword(raw.to_string()),
		}
	}

	/// The number and unit this value stands for in arithmetic, if any.
	pub fn as_number(&self) -> Option<(f64, &str)> {
		match self {
			Self::Number { value, unit } => Some((*value, unit.as_str())),
			Self::Str(text) | Self::Keyword(text) => {
				let Self::Number { value, .. } = Self::parse_number(text)? else {
					return None;
				};
				let unit_start = text.trim().len()
					- text
						.trim()
						.chars()
						.rev()
						.take_while(|ch| ch.is_ascii_alphabetic() || *ch == '%')
						.count();
				Some((value, &text.trim()[unit_start..]))
			}
			Self::Bool(_) | Self::Empty => None,
		}
	}

	pub fn is_truthy(&self) -> bool {
		match self {
			Self::Number { value, .. } => *value != 0.0,
			Self::Str(text) => !text.is_empty(),
			Self::Keyword(text) => !text.is_empty() && text != "false",
			Self::Bool(value) => *value,
			Self::Empty => false,
		}
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(
				Self::Number { value, unit },
				Self::Number {
					value: other_value,
					unit: other_unit,
				},
			) => approx_eq!(f64, *value, *other_value, ulps = 2) && unit == other_unit,
			(Self::Str(value), Self::Str(other_value))
			| (Self::Keyword(value), Self::Keyword(other_value)) => value == other_value,
			(Self::Bool(value), Self::Bool(other_value)) => value == other_value,
			(Self::Empty, Self::Empty) => true,
			_ => false,
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Number { value, unit } => write!(f, "{}{unit}", format_number(*value)),
			Self::Str(text) => write!(f, "\"{text}\""),
			Self::Keyword(text) => write!(f, "{text}"),
			Self::Bool(value) => write!(f, "{value}"),
			Self::Empty => Ok(()),
		}
	}
}

/// Whole numbers print without a fraction; others with at most four
/// decimal places and no trailing zeros.
pub fn format_number(value: f64) -> String {
	if value.fract() == 0.0 && value.abs() < 1e15 {
		return format!("{}", value as i64);
	}

	let formatted = format!("{value:.4}");
	formatted
		.trim_end_matches('0')
		.trim_end_matches('.')
		.to_string()
}
