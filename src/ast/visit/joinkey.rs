//! Visitor 3: splits a join's `ON` predicate into its `AND`-conjuncts and
//! extracts the structured equality pairs between the two sides, so the
//! plan builder can hand the physical join operator a hash key instead of
//! re-evaluating an arbitrary boolean expression per candidate pair (§4.2,
//! visitor 3).
use crate::ast::expr::{BinaryOp, Expr, ExprKind};
use crate::ast::statement::SelectStatement;
use crate::ast::visit::typecheck::source_fields;
use crate::ast::JoinKey;
use crate::err::Error;
use crate::symbol::SymbolTable;
use crate::types::Type;

enum Side {
	Left,
	Right,
}

fn side_of(
	expr: &Expr,
	primary_name: &str,
	primary_fields: &[(String, Type)],
	right_name: &str,
	right_fields: &[(String, Type)],
) -> Option<(Side, String)> {
	let ExprKind::Identifier {
		qualifier,
		name,
	} = &expr.kind
	else {
		return None;
	};
	match qualifier {
		Some(q) if q == primary_name => Some((Side::Left, name.clone())),
		Some(q) if q == right_name => Some((Side::Right, name.clone())),
		Some(_) => None,
		None => {
			let in_primary = primary_fields.iter().any(|(n, _)| n == name);
			let in_right = right_fields.iter().any(|(n, _)| n == name);
			match (in_primary, in_right) {
				(true, false) => Some((Side::Left, name.clone())),
				(false, true) => Some((Side::Right, name.clone())),
				_ => None,
			}
		}
	}
}

/// Flattens a conjunction into its top-level conjuncts; a non-`AND`
/// expression is its own single conjunct.
fn split_and(expr: &Expr) -> Vec<&Expr> {
	match &expr.kind {
		ExprKind::Binary {
			op: BinaryOp::And,
			left,
			right,
		} => {
			let mut conjuncts = split_and(left);
			conjuncts.extend(split_and(right));
			conjuncts
		}
		_ => vec![expr],
	}
}

pub fn build_join_keys(sel: &mut SelectStatement, root: &SymbolTable) -> Result<(), Error> {
	let crate::ast::clause::SourceClause {
		primary,
		join,
	} = &mut sel.source;
	let Some(join) = join.as_mut() else {
		return Ok(());
	};

	let primary_name = primary.scope_name().to_string();
	let primary_fields = source_fields(&primary.stream, root)?;
	let right_name = join.right.scope_name().to_string();
	let right_fields = source_fields(&join.right.stream, root)?;

	let mut keys = Vec::new();
	for conjunct in split_and(&join.on) {
		let ExprKind::Binary {
			op: BinaryOp::Eq,
			left,
			right,
		} = &conjunct.kind
		else {
			continue;
		};
		let ls = side_of(left, &primary_name, &primary_fields, &right_name, &right_fields);
		let rs = side_of(right, &primary_name, &primary_fields, &right_name, &right_fields);
		match (ls, rs) {
			(Some((Side::Left, lf)), Some((Side::Right, rf))) => keys.push(JoinKey {
				left_field: lf,
				right_field: rf,
			}),
			(Some((Side::Right, rf)), Some((Side::Left, lf))) => keys.push(JoinKey {
				left_field: lf,
				right_field: rf,
			}),
			_ => {}
		}
	}

	if keys.is_empty() {
		return Err(Error::plan("join condition must equate at least one field from each side"));
	}
	join.keys = keys;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::clause::{JoinClause, SinkClause, SourceClause, SourceRef};
	use crate::ast::visit::typecheck::check_select;
	use crate::ast::{BinaryOp, Expr, SelectItem};
	use crate::symbol::Symbol;

	fn root_with_streams() -> SymbolTable {
		let mut root = SymbolTable::root();
		root.define(Symbol::Stream {
			name: "orders".into(),
			fields: vec![("id".into(), Type::Int), ("amount".into(), Type::Double)],
		});
		root.define(Symbol::Stream {
			name: "shipments".into(),
			fields: vec![("order_id".into(), Type::Int), ("carrier".into(), Type::String)],
		});
		root
	}

	fn joined_select(on: Expr) -> SelectStatement {
		SelectStatement {
			projection: vec![SelectItem::new(Expr::qualified("orders", "amount"), None)],
			source: SourceClause {
				primary: SourceRef::new("orders", None),
				join: Some(JoinClause {
					right: SourceRef::new("shipments", None),
					on,
					keys: vec![],
				}),
			},
			filter: None,
			group_by: vec![],
			having: None,
			window: None,
			sink: SinkClause::Console,
		}
	}

	#[test]
	fn extracts_single_equality_key() {
		let root = root_with_streams();
		let on = Expr::binary(BinaryOp::Eq, Expr::qualified("orders", "id"), Expr::qualified("shipments", "order_id"));
		let mut sel = joined_select(on);
		check_select(&mut sel, &root).unwrap();
		build_join_keys(&mut sel, &root).unwrap();
		let keys = &sel.source.join.as_ref().unwrap().keys;
		assert_eq!(keys.len(), 1);
		assert_eq!(keys[0].left_field, "id");
		assert_eq!(keys[0].right_field, "order_id");
	}

	#[test]
	fn reversed_sides_still_resolve_to_left_right() {
		let root = root_with_streams();
		let on = Expr::binary(BinaryOp::Eq, Expr::qualified("shipments", "order_id"), Expr::qualified("orders", "id"));
		let mut sel = joined_select(on);
		check_select(&mut sel, &root).unwrap();
		build_join_keys(&mut sel, &root).unwrap();
		let keys = &sel.source.join.as_ref().unwrap().keys;
		assert_eq!(keys[0].left_field, "id");
		assert_eq!(keys[0].right_field, "order_id");
	}

	#[test]
	fn non_equi_condition_errors() {
		let root = root_with_streams();
		let on = Expr::binary(BinaryOp::Lt, Expr::qualified("orders", "id"), Expr::qualified("shipments", "order_id"));
		let mut sel = joined_select(on);
		check_select(&mut sel, &root).unwrap();
		assert!(matches!(build_join_keys(&mut sel, &root), Err(Error::PlanError(_))));
	}
}
