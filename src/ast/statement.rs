use crate::ast::clause::{Column, SinkClause, SourceClause, WindowClause};
use crate::ast::expr::Expr;
use crate::ast::SelectItem;

#[derive(Clone, Debug, PartialEq)]
pub struct SelectStatement {
	pub projection: Vec<SelectItem>,
	pub source: SourceClause,
	pub filter: Option<Expr>,
	pub group_by: Vec<Expr>,
	pub having: Option<Expr>,
	pub window: Option<WindowClause>,
	pub sink: SinkClause,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateStreamStatement {
	pub name: String,
	pub columns: Vec<Column>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DropStatement {
	pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DescribeStatement {
	pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ShowKind {
	Streams,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShowStatement {
	pub kind: ShowKind,
}

/// The top-level statement variants the parser can emit (§3). `Explain`
/// wraps another statement and runs the identical pipeline, only flagging
/// the result context so the caller stringifies the plan instead of
/// deploying it (§4.3).
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
	Select(SelectStatement),
	CreateStream(CreateStreamStatement),
	Drop(DropStatement),
	Explain(Box<Statement>),
	Describe(DescribeStatement),
	Show(ShowStatement),
}

impl Statement {
	/// DDL statements (and by extension an `EXPLAIN` of one) mutate the
	/// root symbol table and produce no flow; deployable statements
	/// describe a dataflow and need to survive to the plan builder.
	pub fn is_deployable(&self) -> bool {
		match self {
			Statement::Select(_) => true,
			Statement::Explain(inner) => inner.is_deployable(),
			_ => false,
		}
	}

	pub fn is_explain(&self) -> bool {
		matches!(self, Statement::Explain(_))
	}
}
