use crate::types::Type;
use std::fmt;

/// A literal value as written in the query text. The type checker maps
/// each variant to its declared [`Type`] (§4.2, visitor 2: constants adopt
/// their declared type).
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
	Boolean(bool),
	Int(i32),
	BigInt(i64),
	Float(f32),
	Double(f64),
	String(String),
	Null,
}

impl Literal {
	pub fn declared_type(&self) -> Type {
		match self {
			Literal::Boolean(_) => Type::Boolean,
			Literal::Int(_) => Type::Int,
			Literal::BigInt(_) => Type::BigInt,
			Literal::Float(_) => Type::Float,
			Literal::Double(_) => Type::Double,
			Literal::String(_) => Type::String,
			Literal::Null => Type::Null,
		}
	}
}

impl fmt::Display for Literal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Literal::Boolean(b) => write!(f, "{b}"),
			Literal::Int(v) => write!(f, "{v}"),
			Literal::BigInt(v) => write!(f, "{v}"),
			Literal::Float(v) => write!(f, "{v}"),
			Literal::Double(v) => write!(f, "{v}"),
			Literal::String(v) => write!(f, "{v:?}"),
			Literal::Null => write!(f, "NULL"),
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	And,
	Or,
	Add,
	Sub,
	Mul,
	Div,
}

impl fmt::Display for BinaryOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			BinaryOp::Eq => "=",
			BinaryOp::Ne => "!=",
			BinaryOp::Lt => "<",
			BinaryOp::Le => "<=",
			BinaryOp::Gt => ">",
			BinaryOp::Ge => ">=",
			BinaryOp::And => "AND",
			BinaryOp::Or => "OR",
			BinaryOp::Add => "+",
			BinaryOp::Sub => "-",
			BinaryOp::Mul => "*",
			BinaryOp::Div => "/",
		};
		write!(f, "{s}")
	}
}

impl BinaryOp {
	pub fn is_equality(&self) -> bool {
		matches!(self, BinaryOp::Eq)
	}

	pub fn is_comparison(&self) -> bool {
		matches!(
			self,
			BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
		)
	}

	pub fn is_logical(&self) -> bool {
		matches!(self, BinaryOp::And | BinaryOp::Or)
	}

	pub fn is_arithmetic(&self) -> bool {
		matches!(self, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
	Not,
	Neg,
	IsNull,
	IsNotNull,
}

impl fmt::Display for UnaryOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			UnaryOp::Not => "NOT",
			UnaryOp::Neg => "-",
			UnaryOp::IsNull => "IS NULL",
			UnaryOp::IsNotNull => "IS NOT NULL",
		};
		write!(f, "{s}")
	}
}

/// A single node in an expression tree. Every node carries a mutable type
/// slot (`ty`), initially `None`, filled in by the type checker (§3, §4.2).
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
	pub kind: ExprKind,
	pub ty: Option<Type>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
	Constant(Literal),
	/// A field reference. `qualifier` is `None` until [`JoinNameVisitor`]
	/// rewrites it in a post-join scope (§4.2, visitor 4).
	///
	/// [`JoinNameVisitor`]: crate::ast::visit::joinname::JoinNameVisitor
	Identifier {
		qualifier: Option<String>,
		name: String,
	},
	Binary {
		op: BinaryOp,
		left: Box<Expr>,
		right: Box<Expr>,
	},
	Unary {
		op: UnaryOp,
		operand: Box<Expr>,
	},
	Call {
		name: String,
		args: Vec<Expr>,
	},
}

impl Expr {
	pub fn constant(lit: Literal) -> Self {
		Expr {
			kind: ExprKind::Constant(lit),
			ty: None,
		}
	}

	pub fn identifier(name: impl Into<String>) -> Self {
		Expr {
			kind: ExprKind::Identifier {
				qualifier: None,
				name: name.into(),
			},
			ty: None,
		}
	}

	pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
		Expr {
			kind: ExprKind::Identifier {
				qualifier: Some(qualifier.into()),
				name: name.into(),
			},
			ty: None,
		}
	}

	pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
		Expr {
			kind: ExprKind::Binary {
				op,
				left: Box::new(left),
				right: Box::new(right),
			},
			ty: None,
		}
	}

	pub fn unary(op: UnaryOp, operand: Expr) -> Self {
		Expr {
			kind: ExprKind::Unary {
				op,
				operand: Box::new(operand),
			},
			ty: None,
		}
	}

	pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
		Expr {
			kind: ExprKind::Call {
				name: name.into(),
				args,
			},
			ty: None,
		}
	}

	/// The resolved type of this expression. Panics if called before type
	/// checking has run; every caller past the front end may rely on this.
	pub fn ty(&self) -> &Type {
		self.ty.as_ref().expect("expression was evaluated before type checking")
	}
}

impl fmt::Display for Expr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.kind {
			ExprKind::Constant(lit) => write!(f, "{lit}"),
			ExprKind::Identifier {
				qualifier: Some(q),
				name,
			} => write!(f, "{q}.{name}"),
			ExprKind::Identifier {
				qualifier: None,
				name,
			} => write!(f, "{name}"),
			ExprKind::Binary {
				op,
				left,
				right,
			} => write!(f, "({left} {op} {right})"),
			ExprKind::Unary {
				op: op @ (UnaryOp::IsNull | UnaryOp::IsNotNull),
				operand,
			} => write!(f, "({operand} {op})"),
			ExprKind::Unary {
				op,
				operand,
			} => write!(f, "({op} {operand})"),
			ExprKind::Call {
				name,
				args,
			} => {
				write!(f, "{name}(")?;
				for (i, a) in args.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{a}")?;
				}
				write!(f, ")")
			}
		}
	}
}
