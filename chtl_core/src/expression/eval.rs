use float_cmp::approx_eq;

use super::parser::BinaryOp;
use super::parser::Expr;
use super::value::Value;
use crate::ChtlError;
use crate::ChtlResult;

/// Where an expression reads property values from.
pub trait Scope {
	/// The value of `name` on the owner being evaluated, if it declares one.
	fn local(&mut self, name: &str) -> Option<Value>;
	/// The value of `property` on the first element matching `selector`.
	fn remote(&mut self, selector: &str, property: &str) -> ChtlResult<Value>;
	/// The value of `variable` in the Var template `template`.
	fn var(&mut self, template: &str, variable: &str) -> ChtlResult<Value>;
}

/// Evaluate an expression against a scope.
pub fn evaluate(expr: &Expr, scope: &mut dyn Scope) -> ChtlResult<Value> {
	match expr {
		Expr::Literal(value) => Ok(value.clone()),
		Expr::Identifier(name) => {
			Ok(scope
				.local(name)
				.unwrap_or_else(|| Value::Keyword(name.clone())))
		}
		Expr::Selector(selector) => Ok(Value::Keyword(selector.clone())),
		Expr::Reference { selector, property } => scope.remote(selector, property),
		Expr::Call { name, .. } => {
			let Some((template, variable)) = expr.as_var_call() else {
				return Err(ChtlError::Evaluation(format!(
					"`{name}(...)` is not a Var template call"
				)));
			};
			scope.var(template, variable)
		}
		Expr::Negate(inner) => {
			let value = evaluate(inner, scope)?;
			let (number, unit) = operand(&value)?;
			Ok(Value::number(-number, unit))
		}
		Expr::Binary { op, left, right } => {
			let left = evaluate(left, scope)?;
			match op {
				BinaryOp::Or if left.is_truthy() => return Ok(Value::Bool(true)),
				BinaryOp::And if !left.is_truthy() => return Ok(Value::Bool(false)),
				_ => {}
			}
			let right = evaluate(right, scope)?;
			binary(*op, &left, &right)
		}
		Expr::Conditional {
			condition,
			then,
			otherwise,
		} => {
			if evaluate(condition, scope)?.is_truthy() {
				evaluate(then, scope)
			} else {
				match otherwise {
					Some(otherwise) => evaluate(otherwise, scope),
					None => Ok(Value::Empty),
				}
			}
		}
	}
}

fn operand(value: &Value) -> ChtlResult<(f64, &str)> {
	value
		.as_number()
		.ok_or_else(|| ChtlError::Evaluation(format!("`{value}` is not a number")))
}

/// The unit of a result: both units must agree unless one is empty.
fn combine_units<'u>(left: &'u str, right: &'u str) -> ChtlResult<&'u str> {
	match (left.is_empty(), right.is_empty()) {
		(true, _) => Ok(right),
		(_, true) => Ok(left),
		_ if left == right => Ok(left),
		_ => {
			Err(ChtlError::UnitMismatch {
				left: left.to_string(),
				right: right.to_string(),
			})
		}
	}
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> ChtlResult<Value> {
	match op {
		BinaryOp::Or | BinaryOp::And => Ok(Value::Bool(right.is_truthy())),
		BinaryOp::Equal => equals(left, right).map(Value::Bool),
		BinaryOp::NotEqual => equals(left, right).map(|equal| Value::Bool(!equal)),
		BinaryOp::Greater => compare(left, right, |a, b| a > b),
		BinaryOp::GreaterEqual => compare(left, right, |a, b| a >= b),
		BinaryOp::Less => compare(left, right, |a, b| a < b),
		BinaryOp::LessEqual => compare(left, right, |a, b| a <= b),
		BinaryOp::Add => arithmetic(left, right, |a, b| Ok(a + b)),
		BinaryOp::Subtract => arithmetic(left, right, |a, b| Ok(a - b)),
		BinaryOp::Multiply => arithmetic(left, right, |a, b| Ok(a * b)),
		BinaryOp::Divide => arithmetic(left, right, |a, b| checked(b).map(|b| a / b)),
		BinaryOp::Modulo => arithmetic(left, right, |a, b| checked(b).map(|b| a % b)),
		BinaryOp::Power => arithmetic(left, right, |a, b| Ok(a.powf(b))),
	}
}

fn checked(divisor: f64) -> ChtlResult<f64> {
	if divisor == 0.0 {
		Err(ChtlError::DivisionByZero)
	} else {
		Ok(divisor)
	}
}

/// Numbers compare by value (units must agree); anything else by its
/// printed form.
fn equals(left: &Value, right: &Value) -> ChtlResult<bool> {
	match (left.as_number(), right.as_number()) {
		(Some((a, left_unit)), Some((b, right_unit))) => {
			combine_units(left_unit, right_unit)?;
			Ok(approx_eq!(f64, a, b, ulps = 2))
		}
		_ => Ok(left.to_string() == right.to_string()),
	}
}

fn compare(left: &Value, right: &Value, test: impl Fn(f64, f64) -> bool) -> ChtlResult<Value> {
	let (a, left_unit) = operand(left)?;
	let (b, right_unit) = operand(right)?;
	combine_units(left_unit, right_unit)?;
	Ok(Value::Bool(test(a, b)))
}

fn arithmetic(
	left: &Value,
	right: &Value,
	apply: impl Fn(f64, f64) -> ChtlResult<f64>,
) -> ChtlResult<Value> {
	let (a, left_unit) = operand(left)?;
	let (b, right_unit) = operand(right)?;
	let unit = combine_units(left_unit, right_unit)?;
	Ok(Value::number(apply(a, b)?, unit))
}
