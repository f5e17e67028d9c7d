//! The statement and expression trees the parser produces, and the visitor
//! pipeline that elaborates them (§3, §4.2).
pub mod clause;
pub mod expr;
pub mod statement;
pub mod visit;

pub use clause::{Column, JoinClause, JoinKey, SelectItem, SinkClause, SourceClause, SourceRef, WindowClause};
pub use expr::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
pub use statement::{CreateStreamStatement, DescribeStatement, DropStatement, SelectStatement, ShowKind, ShowStatement, Statement};
