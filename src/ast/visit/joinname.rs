//! Visitor 4: rewrites every unqualified field reference that survived type
//! checking into its qualified `alias.field` form. By the time this pass
//! runs, a bare reference that could have meant either side of a join has
//! already failed type checking (§4.2, visitor 2), so every remaining bare
//! reference belongs to exactly one source; qualifying it here gives the
//! plan builder an unambiguous field provenance to carry into the physical
//! operators (§4.2, visitor 4).
use super::walk_mut;
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::visit::typecheck::source_fields;
use crate::ast::SelectStatement;
use crate::err::Error;
use crate::symbol::SymbolTable;
use crate::types::Type;

pub fn qualify_names(sel: &mut SelectStatement, root: &SymbolTable) -> Result<(), Error> {
	let primary_name = sel.source.primary.scope_name().to_string();
	let primary_fields = source_fields(&sel.source.primary.stream, root)?;
	let right = match &sel.source.join {
		Some(join) => Some((join.right.scope_name().to_string(), source_fields(&join.right.stream, root)?)),
		None => None,
	};

	qualify_expr_list(sel.projection.iter_mut().map(|item| &mut item.expr), &primary_name, &primary_fields, &right)?;
	if let Some(filter) = sel.filter.as_mut() {
		qualify_one(filter, &primary_name, &primary_fields, &right)?;
	}
	qualify_expr_list(sel.group_by.iter_mut(), &primary_name, &primary_fields, &right)?;
	if let Some(having) = sel.having.as_mut() {
		qualify_one(having, &primary_name, &primary_fields, &right)?;
	}
	Ok(())
}

fn qualify_expr_list<'a>(
	exprs: impl Iterator<Item = &'a mut Expr>,
	primary_name: &str,
	primary_fields: &[(String, Type)],
	right: &Option<(String, Vec<(String, Type)>)>,
) -> Result<(), Error> {
	for expr in exprs {
		qualify_one(expr, primary_name, primary_fields, right)?;
	}
	Ok(())
}

fn qualify_one(expr: &mut Expr, primary_name: &str, primary_fields: &[(String, Type)], right: &Option<(String, Vec<(String, Type)>)>) -> Result<(), Error> {
	walk_mut(expr, &mut |node| {
		if let ExprKind::Identifier {
			qualifier,
			name,
		} = &mut node.kind
		{
			if qualifier.is_none() {
				if primary_fields.iter().any(|(n, _)| n == name) {
					*qualifier = Some(primary_name.to_string());
				} else if let Some((right_name, right_fields)) = right {
					if right_fields.iter().any(|(n, _)| n == name) {
						*qualifier = Some(right_name.clone());
					}
				}
			}
		}
		Ok(())
	})
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

	#[test]
	fn bare_field_on_single_source_gets_qualified() {
		let root = root_with_streams();
		let mut sel = SelectStatement {
			projection: vec![SelectItem::new(Expr::identifier("amount"), None)],
			source: SourceClause {
				primary: SourceRef::new("orders", None),
				join: None,
			},
			filter: None,
			group_by: vec![],
			having: None,
			window: None,
			sink: SinkClause::Console,
		};
		check_select(&mut sel, &root).unwrap();
		qualify_names(&mut sel, &root).unwrap();
		assert_eq!(
			sel.projection[0].expr.kind,
			ExprKind::Identifier {
				qualifier: Some("orders".into()),
				name: "amount".into(),
			}
		);
	}

	#[test]
	fn bare_field_in_join_gets_qualified_to_owning_side() {
		let root = root_with_streams();
		let on = Expr::binary(BinaryOp::Eq, Expr::qualified("orders", "id"), Expr::qualified("shipments", "order_id"));
		let mut sel = SelectStatement {
			projection: vec![SelectItem::new(Expr::identifier("carrier"), None)],
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
		};
		check_select(&mut sel, &root).unwrap();
		qualify_names(&mut sel, &root).unwrap();
		assert_eq!(
			sel.projection[0].expr.kind,
			ExprKind::Identifier {
				qualifier: Some("shipments".into()),
				name: "carrier".into(),
			}
		);
	}
}
