use crate::ast::expr::ExprKind;
use crate::ast::statement::SelectStatement;
use std::collections::HashMap;

/// Assigns a canonical label to every item in a SELECT's projection list:
/// the user-supplied alias if there is one, otherwise an auto-generated
/// name (the bare field name for a plain identifier, `expr_N` for anything
/// else). Labels must be unique within the projection; collisions are
/// broken by suffixing `_2`, `_3`, ... in declaration order (§4.2, pass 1).
pub fn assign_field_labels(sel: &mut SelectStatement) {
	let mut seen: HashMap<String, usize> = HashMap::new();
	for (idx, item) in sel.projection.iter_mut().enumerate() {
		let base = match &item.alias {
			Some(alias) => alias.clone(),
			None => default_label(item, idx),
		};
		let count = seen.entry(base.clone()).or_insert(0);
		*count += 1;
		item.label = Some(if *count == 1 {
			base
		} else {
			format!("{base}_{count}")
		});
	}
}

fn default_label(item: &crate::ast::SelectItem, idx: usize) -> String {
	match &item.expr.kind {
		ExprKind::Identifier {
			name, ..
		} => name.clone(),
		_ => format!("expr_{}", idx + 1),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::clause::{SinkClause, SourceClause, SourceRef};
	use crate::ast::expr::{BinaryOp, Expr, Literal};
	use crate::ast::SelectItem;

	fn stmt(items: Vec<SelectItem>) -> SelectStatement {
		SelectStatement {
			projection: items,
			source: SourceClause {
				primary: SourceRef::new("s", None),
				join: None,
			},
			filter: None,
			group_by: vec![],
			having: None,
			window: None,
			sink: SinkClause::Console,
		}
	}

	#[test]
	fn bare_identifier_labels_itself() {
		let mut sel = stmt(vec![SelectItem::new(Expr::identifier("a"), None)]);
		assign_field_labels(&mut sel);
		assert_eq!(sel.projection[0].label.as_deref(), Some("a"));
	}

	#[test]
	fn expression_gets_positional_label() {
		let expr = Expr::binary(BinaryOp::Add, Expr::identifier("a"), Expr::constant(Literal::Int(1)));
		let mut sel = stmt(vec![SelectItem::new(expr, None)]);
		assign_field_labels(&mut sel);
		assert_eq!(sel.projection[0].label.as_deref(), Some("expr_1"));
	}

	#[test]
	fn duplicate_labels_get_suffixed() {
		let mut sel = stmt(vec![
			SelectItem::new(Expr::identifier("a"), None),
			SelectItem::new(Expr::identifier("b"), Some("a".into())),
			SelectItem::new(Expr::identifier("c"), Some("a".into())),
		]);
		assign_field_labels(&mut sel);
		let labels: Vec<_> = sel.projection.iter().map(|i| i.label.clone().unwrap()).collect();
		assert_eq!(labels, vec!["a", "a_2", "a_3"]);
	}
}
