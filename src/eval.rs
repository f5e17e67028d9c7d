//! Evaluates a typed expression tree against one row positioned by a
//! schema, for the physical filter/project/aggregate operators. Expression
//! nodes have already passed type checking by the time anything here runs,
//! so the only failures left are missing fields (a plan/schema bug) and
//! operand shapes the type checker should have ruled out.
use crate::ast::expr::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use crate::err::Error;
use crate::types::Type;
use crate::value::{Row, Value};
use std::cmp::Ordering;

pub fn eval(expr: &Expr, schema: &[(String, Type)], row: &Row) -> Result<Value, Error> {
	match &expr.kind {
		ExprKind::Constant(lit) => Ok(literal_value(lit)),
		ExprKind::Identifier {
			qualifier,
			name,
		} => {
			let key = match qualifier {
				Some(q) => format!("{q}.{name}"),
				None => name.clone(),
			};
			schema
				.iter()
				.position(|(n, _)| n == &key)
				.map(|i| row[i].clone())
				.ok_or_else(|| Error::RuntimeError {
					operator: "eval".into(),
					message: format!("unknown field {key} in row schema"),
				})
		}
		ExprKind::Binary {
			op,
			left,
			right,
		} => {
			let lv = eval(left, schema, row)?;
			let rv = eval(right, schema, row)?;
			eval_binary(*op, lv, rv, expr.ty())
		}
		ExprKind::Unary {
			op,
			operand,
		} => eval_unary(*op, eval(operand, schema, row)?),
		ExprKind::Call {
			name,
			args,
		} => {
			let values = args.iter().map(|a| eval(a, schema, row)).collect::<Result<Vec<_>, _>>()?;
			eval_call(name, &values)
		}
	}
}

fn literal_value(lit: &Literal) -> Value {
	match lit {
		Literal::Boolean(b) => Value::Boolean(*b),
		Literal::Int(v) => Value::Int(*v),
		Literal::BigInt(v) => Value::BigInt(*v),
		Literal::Float(v) => Value::Float(*v),
		Literal::Double(v) => Value::Double(*v),
		Literal::String(v) => Value::String(v.clone()),
		Literal::Null => Value::Null,
	}
}

fn as_bool_or_null(v: &Value, op: &str) -> Result<Option<bool>, Error> {
	match v {
		Value::Null => Ok(None),
		Value::Boolean(b) => Ok(Some(*b)),
		other => Err(Error::RuntimeError {
			operator: op.into(),
			message: format!("expected BOOLEAN, got {other}"),
		}),
	}
}

fn eval_unary(op: UnaryOp, v: Value) -> Result<Value, Error> {
	match op {
		UnaryOp::IsNull => Ok(Value::Boolean(v.is_null())),
		UnaryOp::IsNotNull => Ok(Value::Boolean(!v.is_null())),
		UnaryOp::Not => match v {
			Value::Null => Ok(Value::Null),
			Value::Boolean(b) => Ok(Value::Boolean(!b)),
			other => Err(Error::RuntimeError {
				operator: "NOT".into(),
				message: format!("expected BOOLEAN, got {other}"),
			}),
		},
		UnaryOp::Neg => match v {
			Value::Null => Ok(Value::Null),
			Value::Int(n) => Ok(Value::Int(-n)),
			Value::BigInt(n) => Ok(Value::BigInt(-n)),
			Value::Float(n) => Ok(Value::Float(-n)),
			Value::Double(n) => Ok(Value::Double(-n)),
			other => Err(Error::RuntimeError {
				operator: "NEG".into(),
				message: format!("expected a numeric operand, got {other}"),
			}),
		},
	}
}

fn eval_binary(op: BinaryOp, lv: Value, rv: Value, result_ty: &Type) -> Result<Value, Error> {
	if op.is_logical() {
		let l = as_bool_or_null(&lv, &op.to_string())?;
		let r = as_bool_or_null(&rv, &op.to_string())?;
		return Ok(match op {
			BinaryOp::And => match (l, r) {
				(Some(false), _) | (_, Some(false)) => Value::Boolean(false),
				(Some(true), Some(true)) => Value::Boolean(true),
				_ => Value::Null,
			},
			BinaryOp::Or => match (l, r) {
				(Some(true), _) | (_, Some(true)) => Value::Boolean(true),
				(Some(false), Some(false)) => Value::Boolean(false),
				_ => Value::Null,
			},
			_ => unreachable!("is_logical only matches AND/OR"),
		});
	}

	if lv.is_null() || rv.is_null() {
		return Ok(Value::Null);
	}

	if op.is_comparison() {
		let ord = compare(&lv, &rv, &op.to_string())?;
		let b = match op {
			BinaryOp::Eq => ord == Ordering::Equal,
			BinaryOp::Ne => ord != Ordering::Equal,
			BinaryOp::Lt => ord == Ordering::Less,
			BinaryOp::Le => ord != Ordering::Greater,
			BinaryOp::Gt => ord == Ordering::Greater,
			BinaryOp::Ge => ord != Ordering::Less,
			_ => unreachable!("is_comparison covers exactly these ops"),
		};
		return Ok(Value::Boolean(b));
	}

	let op_name = op.to_string();
	let l = lv.as_f64().ok_or_else(|| Error::RuntimeError {
		operator: op_name.clone(),
		message: format!("expected a numeric operand, got {lv}"),
	})?;
	let r = rv.as_f64().ok_or_else(|| Error::RuntimeError {
		operator: op_name.clone(),
		message: format!("expected a numeric operand, got {rv}"),
	})?;
	let result = match op {
		BinaryOp::Add => l + r,
		BinaryOp::Sub => l - r,
		BinaryOp::Mul => l * r,
		BinaryOp::Div => l / r,
		_ => unreachable!("remaining BinaryOp variants are logical or comparison"),
	};
	Ok(cast_numeric(result, result_ty))
}

fn compare(lv: &Value, rv: &Value, op: &str) -> Result<Ordering, Error> {
	match (lv, rv) {
		(Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
		(Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
		(Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
		_ => {
			let (a, b) = (lv.as_f64(), rv.as_f64());
			match (a, b) {
				(Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| Error::RuntimeError {
					operator: op.into(),
					message: "NaN is not orderable".into(),
				}),
				_ => Err(Error::RuntimeError {
					operator: op.into(),
					message: format!("cannot compare {lv} and {rv}"),
				}),
			}
		}
	}
}

fn unwrap_nullable(ty: &Type) -> &Type {
	match ty {
		Type::Nullable(inner) => unwrap_nullable(inner),
		other => other,
	}
}

fn cast_numeric(v: f64, result_ty: &Type) -> Value {
	match unwrap_nullable(result_ty) {
		Type::Int => Value::Int(v as i32),
		Type::BigInt => Value::BigInt(v as i64),
		Type::Float => Value::Float(v as f32),
		_ => Value::Double(v),
	}
}

fn eval_call(name: &str, args: &[Value]) -> Result<Value, Error> {
	match name {
		"NOT" => eval_unary(UnaryOp::Not, args[0].clone()),
		"LEN" => match &args[0] {
			Value::Null => Ok(Value::Null),
			Value::String(s) => Ok(Value::Int(s.chars().count() as i32)),
			other => Err(Error::RuntimeError {
				operator: "LEN".into(),
				message: format!("expected STRING, got {other}"),
			}),
		},
		"UPPER" => match &args[0] {
			Value::Null => Ok(Value::Null),
			Value::String(s) => Ok(Value::String(s.to_uppercase())),
			other => Err(Error::RuntimeError {
				operator: "UPPER".into(),
				message: format!("expected STRING, got {other}"),
			}),
		},
		"ABS" => match &args[0] {
			Value::Null => Ok(Value::Null),
			Value::Int(n) => Ok(Value::Int(n.abs())),
			Value::BigInt(n) => Ok(Value::BigInt(n.abs())),
			Value::Float(n) => Ok(Value::Float(n.abs())),
			Value::Double(n) => Ok(Value::Double(n.abs())),
			other => Err(Error::RuntimeError {
				operator: "ABS".into(),
				message: format!("expected a numeric operand, got {other}"),
			}),
		},
		"COALESCE" => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
		"GREATEST" => {
			if args.iter().any(|v| v.is_null()) {
				return Ok(Value::Null);
			}
			let mut best = args[0].clone();
			for v in &args[1..] {
				if compare(v, &best, "GREATEST")? == Ordering::Greater {
					best = v.clone();
				}
			}
			Ok(best)
		}
		other => Err(Error::RuntimeError {
			operator: other.into(),
			message: "unknown function".into(),
		}),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::expr::{Expr, UnaryOp};

	fn schema() -> Vec<(String, Type)> {
		vec![("a".into(), Type::Int.nullable())]
	}

	#[test]
	fn not_of_false_is_true() {
		let e = Expr::unary(UnaryOp::Not, Expr::constant(Literal::Boolean(false)));
		assert_eq!(eval(&e, &schema(), &vec![Value::Null]).unwrap(), Value::Boolean(true));
	}

	#[test]
	fn not_of_null_is_null() {
		let e = Expr::unary(UnaryOp::Not, Expr::constant(Literal::Null));
		assert_eq!(eval(&e, &schema(), &vec![Value::Null]).unwrap(), Value::Null);
	}

	#[test]
	fn neg_int() {
		let e = Expr::unary(UnaryOp::Neg, Expr::constant(Literal::Int(10)));
		assert_eq!(eval(&e, &schema(), &vec![Value::Null]).unwrap(), Value::Int(-10));
	}

	#[test]
	fn is_null_on_nullable_field() {
		let e = Expr::unary(UnaryOp::IsNull, Expr::identifier("a"));
		assert_eq!(eval(&e, &schema(), &vec![Value::Null]).unwrap(), Value::Boolean(true));
		assert_eq!(eval(&e, &schema(), &vec![Value::Int(10)]).unwrap(), Value::Boolean(false));
	}

	#[test]
	fn is_not_null_on_non_nullable_field() {
		let non_nullable = vec![("a".to_string(), Type::Int)];
		let e = Expr::unary(UnaryOp::IsNotNull, Expr::identifier("a"));
		assert_eq!(eval(&e, &non_nullable, &vec![Value::Int(10)]).unwrap(), Value::Boolean(true));
		let is_null = Expr::unary(UnaryOp::IsNull, Expr::identifier("a"));
		assert_eq!(eval(&is_null, &non_nullable, &vec![Value::Int(10)]).unwrap(), Value::Boolean(false));
	}

	#[test]
	fn not_of_true_is_false() {
		let e = Expr::unary(UnaryOp::Not, Expr::constant(Literal::Boolean(true)));
		assert_eq!(eval(&e, &schema(), &vec![Value::Null]).unwrap(), Value::Boolean(false));
	}

	#[test]
	fn neg_bigint() {
		let e = Expr::unary(UnaryOp::Neg, Expr::constant(Literal::BigInt(-42)));
		assert_eq!(eval(&e, &schema(), &vec![Value::Null]).unwrap(), Value::BigInt(42));
	}

	#[test]
	fn neg_float() {
		let e = Expr::unary(UnaryOp::Neg, Expr::constant(Literal::Float(-42.0)));
		assert_eq!(eval(&e, &schema(), &vec![Value::Null]).unwrap(), Value::Float(42.0));
	}

	#[test]
	fn neg_double_null_is_null() {
		let e = Expr::unary(UnaryOp::Neg, Expr::constant(Literal::Null));
		assert_eq!(eval(&e, &schema(), &vec![Value::Null]).unwrap(), Value::Null);
	}

	#[test]
	fn neg_string_is_a_runtime_error() {
		let e = Expr::unary(UnaryOp::Neg, Expr::constant(Literal::String("hi".into())));
		assert!(eval(&e, &schema(), &vec![Value::Null]).is_err());
	}
}
