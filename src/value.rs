//! Runtime values flowing through an open flow. Each [`Value`] corresponds
//! to one of the engine's primitive [`Type`]s; a row is simply an ordered
//! list of values positioned against a node's output schema.
use crate::types::Type;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
	Boolean(bool),
	Int(i32),
	BigInt(i64),
	Float(f32),
	Double(f64),
	String(String),
	Timestamp(DateTime<Utc>),
	/// Milliseconds.
	Timespan(i64),
	Null,
}

impl Value {
	pub fn ty(&self) -> Type {
		match self {
			Value::Boolean(_) => Type::Boolean,
			Value::Int(_) => Type::Int,
			Value::BigInt(_) => Type::BigInt,
			Value::Float(_) => Type::Float,
			Value::Double(_) => Type::Double,
			Value::String(_) => Type::String,
			Value::Timestamp(_) => Type::Timestamp,
			Value::Timespan(_) => Type::Timespan,
			Value::Null => Type::Null,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Boolean(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Int(v) => Some(*v as f64),
			Value::BigInt(v) => Some(*v as f64),
			Value::Float(v) => Some(*v as f64),
			Value::Double(v) => Some(*v),
			_ => None,
		}
	}
}

impl fmt::Display for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Value::Boolean(b) => write!(f, "{b}"),
			Value::Int(v) => write!(f, "{v}"),
			Value::BigInt(v) => write!(f, "{v}"),
			Value::Float(v) => write!(f, "{v}"),
			Value::Double(v) => write!(f, "{v}"),
			Value::String(v) => write!(f, "{v}"),
			Value::Timestamp(v) => write!(f, "{v}"),
			Value::Timespan(v) => write!(f, "{v}ms"),
			Value::Null => write!(f, "NULL"),
		}
	}
}

/// An ordered row of values, positioned against whatever schema its
/// producing operator carries.
pub type Row = Vec<Value>;
