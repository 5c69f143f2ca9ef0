use super::lexer::ExprToken;
use super::lexer::ExprTokenKind;
use super::lexer::tokenize;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
	Or,
	And,
	Greater,
	GreaterEqual,
	Less,
	LessEqual,
	Equal,
	NotEqual,
	Add,
	Subtract,
	Multiply,
	Divide,
	Modulo,
	Power,
}

impl BinaryOp {
	fn from_token(kind: ExprTokenKind) -> Option<Self> {
		let op = match kind {
			ExprTokenKind::Or => Self::Or,
			ExprTokenKind::And => Self::And,
			ExprTokenKind::Greater => Self::Greater,
			ExprTokenKind::GreaterEqual => Self::GreaterEqual,
			ExprTokenKind::Less => Self::Less,
			ExprTokenKind::LessEqual => Self::LessEqual,
			ExprTokenKind::Equal => Self::Equal,
			ExprTokenKind::NotEqual => Self::NotEqual,
			ExprTokenKind::Plus => Self::Add,
			ExprTokenKind::Minus => Self::Subtract,
			ExprTokenKind::Star => Self::Multiply,
			ExprTokenKind::Slash => Self::Divide,
			ExprTokenKind::Percent => Self::Modulo,
			ExprTokenKind::Power => Self::Power,
			_ => return None,
		};
		Some(op)
	}

	/// Binding strength; higher binds tighter.
	fn precedence(self) -> u8 {
		match self {
			Self::Or => 1,
			Self::And => 2,
			Self::Greater
			| Self::GreaterEqual
			| Self::Less
			| Self::LessEqual
			| Self::Equal
			| Self::NotEqual => 3,
			Self::Add | Self::Subtract => 4,
			Self::Multiply | Self::Divide | Self::Modulo => 5,
			Self::Power => 6,
		}
	}
}

impl std::fmt::Display for BinaryOp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let symbol = match self {
			Self::Or => "||",
			Self::And => "&&",
			Self::Greater => ">",
			Self::GreaterEqual => ">=",
			Self::Less => "<",
			Self::LessEqual => "<=",
			Self::Equal => "==",
			Self::NotEqual => "!=",
			Self::Add => "+",
			Self::Subtract => "-",
			Self::Multiply => "*",
			Self::Divide => "/",
			Self::Modulo => "%",
			Self::Power => "**",
		};
		write!(f, "{symbol}")
	}
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Literal(Value),
	/// A bare identifier. Inside an element that declares a property of this
	/// name it reads that property; otherwise it is a CSS keyword.
	Identifier(String),
	/// `#id` or `.class` on its own.
	Selector(String),
	/// `#id.property` or `.class.property`
	Reference {
		selector: String,
		property: String,
	},
	/// `Template(variable)`, or any other function-call shaped value.
	Call {
		name: String,
		args: Vec<Expr>,
	},
	Negate(Box<Expr>),
	Binary {
		op: BinaryOp,
		left: Box<Expr>,
		right: Box<Expr>,
	},
	Conditional {
		condition: Box<Expr>,
		then: Box<Expr>,
		otherwise: Option<Box<Expr>>,
	},
}

impl Expr {
	/// Visit this expression and every sub-expression.
	pub fn walk<'e>(&'e self, visit: &mut impl FnMut(&'e Expr)) {
		visit(self);
		match self {
			Self::Call { args, .. } => args.iter().for_each(|arg| arg.walk(visit)),
			Self::Negate(inner) => inner.walk(visit),
			Self::Binary { left, right, .. } => {
				left.walk(visit);
				right.walk(visit);
			}
			Self::Conditional {
				condition,
				then,
				otherwise,
			} => {
				condition.walk(visit);
				then.walk(visit);
				if let Some(otherwise) = otherwise {
					otherwise.walk(visit);
				}
			}
			Self::Literal(_) | Self::Identifier(_) | Self::Selector(_) | Self::Reference { .. } => {}
		}
	}

	/// If this is a single-argument call with a bare identifier argument,
	/// the `(template, variable)` it names.
	pub fn as_var_call(&self) -> Option<(&str, &str)> {
		match self {
			Self::Call { name, args } => {
				match args.as_slice() {
					[Self::Identifier(variable)] => Some((name, variable)),
					_ => None,
				}
			}
			_ => None,
		}
	}
}

/// How a raw style value should be treated.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
	/// Emitted exactly as written.
	Literal(String),
	Expression(Expr),
}

/// Decide whether `raw` is an expression and parse it if so.
///
/// A value is plain CSS when it does not tokenize or parse completely, when
/// it is a single literal, keyword or selector, or when it calls a function
/// that `is_var` does not recognise as a Var template.
pub fn analyze(raw: &str, is_var: &dyn Fn(&str) -> bool) -> StyleValue {
	let literal = || StyleValue::Literal(raw.to_string());

	let Some(tokens) = tokenize(raw) else {
		return literal();
	};
	let Some(expr) = parse(&tokens) else {
		return literal();
	};

	if matches!(
		expr,
		Expr::Literal(_) | Expr::Identifier(_) | Expr::Selector(_)
	) {
		return literal();
	}

	let mut plain_call = false;
	expr.walk(&mut |node| {
		if let Expr::Call { name, .. } = node {
			if node.as_var_call().is_none() || !is_var(name) {
				plain_call = true;
			}
		}
	});
	if plain_call {
		return literal();
	}

	StyleValue::Expression(expr)
}

/// Parse a complete token list. Returns `None` if the tokens do not form
/// exactly one expression.
pub fn parse(tokens: &[ExprToken]) -> Option<Expr> {
	if tokens.is_empty() {
		return None;
	}

	let mut parser = ExprParser { tokens, index: 0 };
	let expr = parser.ternary()?;
	(parser.index == tokens.len()).then_some(expr)
}

struct ExprParser<'t> {
	tokens: &'t [ExprToken],
	index: usize,
}

impl ExprParser<'_> {
	fn peek(&self) -> Option<&ExprToken> {
		self.tokens.get(self.index)
	}

	fn peek_kind(&self) -> Option<ExprTokenKind> {
		self.peek().map(|token| token.kind)
	}

	fn advance(&mut self) -> Option<&ExprToken> {
		let token = self.tokens.get(self.index)?;
		self.index += 1;
		Some(token)
	}

	fn eat(&mut self, kind: ExprTokenKind) -> bool {
		if self.peek_kind() == Some(kind) {
			self.index += 1;
			return true;
		}
		false
	}

	/// `condition ? then [: otherwise]`
	fn ternary(&mut self) -> Option<Expr> {
		let condition = self.binary(1)?;
		if !self.eat(ExprTokenKind::Question) {
			return Some(condition);
		}

		let then = self.ternary()?;
		let otherwise = if self.eat(ExprTokenKind::Colon) {
			Some(Box::new(self.ternary()?))
		} else {
			None
		};

		Some(Expr::Conditional {
			condition: Box::new(condition),
			then: Box::new(then),
			otherwise,
		})
	}

	/// Precedence climbing over the binary operators. `**` is right
	/// associative, everything else left associative.
	fn binary(&mut self, min_precedence: u8) -> Option<Expr> {
		let mut left = self.unary()?;

		while let Some(op) = self.peek_kind().and_then(BinaryOp::from_token) {
			let precedence = op.precedence();
			if precedence < min_precedence {
				break;
			}
			self.index += 1;

			let next = if op == BinaryOp::Power {
				precedence
			} else {
				precedence + 1
			};
			let right = self.binary(next)?;
			left = Expr::Binary {
				op,
				left: Box::new(left),
				right: Box::new(right),
			};
		}

		Some(left)
	}

	fn unary(&mut self) -> Option<Expr> {
		if self.eat(ExprTokenKind::Minus) {
			return Some(Expr::Negate(Box::new(self.unary()?)));
		}
		self.primary()
	}

	fn primary(&mut self) -> Option<Expr> {
		let token = self.advance()?.clone();

		match token.kind {
			ExprTokenKind::Number => Value::parse_number(&token.text).map(Expr::Literal),
			ExprTokenKind::String => {
				let body = &token.text[1..token.text.len() - 1];
				Some(Expr::Literal(Value::Str(body.to_string())))
			}
			ExprTokenKind::IdSelector | ExprTokenKind::ClassSelector => {
				let property = self
					.peek()
					.filter(|next| {
						next.kind == ExprTokenKind::ClassSelector && next.span.start == token.span.end
					})
					.map(|next| next.text[1..].to_string());

				match property {
					Some(property) => {
						self.index += 1;
						Some(Expr::Reference {
							selector: token.text,
							property,
						})
					}
					None => Some(Expr::Selector(token.text)),
				}
			}
			ExprTokenKind::Identifier => {
				if !self.eat(ExprTokenKind::LeftParen) {
					return Some(Expr::Identifier(token.text));
				}

				let mut args = vec![];
				if !self.eat(ExprTokenKind::RightParen) {
					loop {
						args.push(self.ternary()?);
						if self.eat(ExprTokenKind::RightParen) {
							break;
						}
						if !self.eat(ExprTokenKind::Comma) {
							return None;
						}
					}
				}

				Some(Expr::Call {
					name: token.text,
					args,
				})
			}
			ExprTokenKind::LeftParen => {
				let inner = self.ternary()?;
				self.eat(ExprTokenKind::RightParen).then_some(inner)
			}
			_ => None,
		}
	}
}
