use crate::ast::expr::Expr;
use crate::types::Type;
use std::fmt;

/// One item in a SELECT's projection list. `label` is filled in by
/// [`AssignFieldLabels`](crate::ast::visit::label::AssignFieldLabels) -
/// either the user-supplied alias or an auto-generated one - and becomes
/// the field's name in the node's output schema.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectItem {
	pub expr: Expr,
	pub alias: Option<String>,
	pub label: Option<String>,
}

impl SelectItem {
	pub fn new(expr: Expr, alias: Option<String>) -> Self {
		SelectItem {
			expr,
			alias,
			label: None,
		}
	}
}

/// A single source in a FROM clause: a declared stream, optionally given a
/// local alias (`FROM orders AS o`).
#[derive(Clone, Debug, PartialEq)]
pub struct SourceRef {
	pub stream: String,
	pub alias: Option<String>,
}

impl SourceRef {
	pub fn new(stream: impl Into<String>, alias: Option<String>) -> Self {
		SourceRef {
			stream: stream.into(),
			alias,
		}
	}

	/// The name this source is addressed by inside the statement: its
	/// alias if one was given, otherwise the stream name itself.
	pub fn scope_name(&self) -> &str {
		self.alias.as_deref().unwrap_or(&self.stream)
	}
}

/// A structured join key: one equality predicate pairing a field on the
/// left input with a field on the right input. Filled in by
/// [`JoinKeyVisitor`](crate::ast::visit::joinkey::JoinKeyVisitor).
#[derive(Clone, Debug, PartialEq)]
pub struct JoinKey {
	pub left_field: String,
	pub right_field: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinClause {
	pub right: SourceRef,
	pub on: Expr,
	pub keys: Vec<JoinKey>,
}

/// `FROM primary [JOIN right ON predicate]`.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceClause {
	pub primary: SourceRef,
	pub join: Option<JoinClause>,
}

/// `WINDOW TUMBLING (size)` — minimal: the engine only needs to carry the
/// window's size expression through to the physical aggregate operator
/// (§4.3); richer window kinds are not part of this engine's scope.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowClause {
	pub size: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SinkClause {
	Console,
	Memory(String),
}

impl fmt::Display for SinkClause {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SinkClause::Console => write!(f, "CONSOLE"),
			SinkClause::Memory(name) => write!(f, "MEMORY {name}"),
		}
	}
}

/// An ordered (name, type) pair as used in a schema or a `CREATE STREAM`
/// column list.
pub type Column = (String, Type);
