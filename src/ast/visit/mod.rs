//! The four-pass elaboration pipeline run over every parsed statement, in
//! the fixed order named in §4.2: field labels, then type checking, then
//! join-key extraction, then join-name qualification. Each pass may raise
//! a single failure; the caller surfaces the first one.
pub mod joinkey;
pub mod joinname;
pub mod label;
pub mod typecheck;

use crate::ast::expr::Expr;
use crate::ast::statement::Statement;
use crate::err::Error;
use crate::symbol::SymbolTable;

/// Runs the full elaboration pipeline over `stmt`. DDL statements have no
/// expression tree to elaborate and pass through untouched; `EXPLAIN`
/// recurses into the wrapped statement.
pub fn elaborate(stmt: &mut Statement, root: &SymbolTable) -> Result<(), Error> {
	match stmt {
		Statement::Select(sel) => {
			label::assign_field_labels(sel);
			typecheck::check_select(sel, root)?;
			joinkey::build_join_keys(sel, root)?;
			joinname::qualify_names(sel, root)?;
			Ok(())
		}
		Statement::Explain(inner) => elaborate(inner, root),
		Statement::CreateStream(_) | Statement::Drop(_) | Statement::Describe(_) | Statement::Show(_) => Ok(()),
	}
}

/// Shared post-order traversal over an expression tree, used by every
/// visitor that needs to inspect or rewrite nodes uniformly rather than
/// re-implementing tree recursion per pass (§9 design notes).
pub(crate) fn walk_mut(expr: &mut Expr, f: &mut impl FnMut(&mut Expr) -> Result<(), Error>) -> Result<(), Error> {
	use crate::ast::expr::ExprKind;
	match &mut expr.kind {
		ExprKind::Constant(_) | ExprKind::Identifier { .. } => {}
		ExprKind::Binary {
			left,
			right,
			..
		} => {
			walk_mut(left, f)?;
			walk_mut(right, f)?;
		}
		ExprKind::Unary {
			operand, ..
		} => walk_mut(operand, f)?,
		ExprKind::Call {
			args, ..
		} => {
			for a in args {
				walk_mut(a, f)?;
			}
		}
	}
	f(expr)
}
