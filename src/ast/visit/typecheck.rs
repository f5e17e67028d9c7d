//! Visitor 2: resolves every identifier against a scope built from the
//! statement's source clause, assigns a concrete [`Type`] to every
//! expression node, and resolves universal-typed function calls against
//! their actual argument types (§4.1, §4.2).
use crate::ast::clause::SelectItem;
use crate::ast::expr::{BinaryOp, Expr, ExprKind, Literal, UnaryOp};
use crate::ast::statement::SelectStatement;
use crate::err::Error;
use crate::symbol::{Symbol, SymbolTable};
use crate::types::{Substitution, Type};
use std::collections::HashSet;
use std::sync::Arc;

/// Looks up a declared stream's field list in `root`. Shared with the join
/// visitors, which need the same per-side field sets to split `ON`
/// predicates and qualify ambiguous references.
pub(crate) fn source_fields(stream: &str, root: &SymbolTable) -> Result<Vec<(String, Type)>, Error> {
	match root.lookup(stream) {
		Some(Symbol::Stream {
			fields, ..
		}) => Ok(fields.clone()),
		_ => Err(Error::UnknownSymbol(stream.to_string())),
	}
}

/// Builds the expression scope for `sel`: every field on every source,
/// always reachable through its qualified `alias.field` form, and reachable
/// bare only when its name doesn't collide with a field of the same name on
/// the other side of a join. A bare reference to a name present on both
/// sides of a join therefore fails lookup as an unknown identifier rather
/// than silently picking a side.
fn build_scope(sel: &SelectStatement, root: &SymbolTable) -> Result<SymbolTable, Error> {
	let mut scope = SymbolTable::child(Arc::new(root.clone()));
	let primary_name = sel.source.primary.scope_name().to_string();
	let primary_fields = source_fields(&sel.source.primary.stream, root)?;

	for (name, ty) in &primary_fields {
		scope.define(Symbol::Field {
			name: format!("{primary_name}.{name}"),
			ty: ty.clone(),
		});
	}

	match &sel.source.join {
		None => {
			for (name, ty) in &primary_fields {
				scope.define(Symbol::Field {
					name: name.clone(),
					ty: ty.clone(),
				});
			}
		}
		Some(join) => {
			let right_name = join.right.scope_name().to_string();
			let right_fields = source_fields(&join.right.stream, root)?;
			for (name, ty) in &right_fields {
				scope.define(Symbol::Field {
					name: format!("{right_name}.{name}"),
					ty: ty.clone(),
				});
			}
			let primary_names: HashSet<&str> = primary_fields.iter().map(|(n, _)| n.as_str()).collect();
			let right_names: HashSet<&str> = right_fields.iter().map(|(n, _)| n.as_str()).collect();
			for (name, ty) in &primary_fields {
				if !right_names.contains(name.as_str()) {
					scope.define(Symbol::Field {
						name: name.clone(),
						ty: ty.clone(),
					});
				}
			}
			for (name, ty) in &right_fields {
				if !primary_names.contains(name.as_str()) {
					scope.define(Symbol::Field {
						name: name.clone(),
						ty: ty.clone(),
					});
				}
			}
		}
	}

	Ok(scope)
}

/// A lone unqualified `*` stands for every field of every source, in
/// `FROM` order, qualified by each source's scope name. The parser has no
/// symbol table to expand it against, so expansion happens here, the
/// first pass that does.
fn expand_wildcard(sel: &mut SelectStatement, root: &SymbolTable) -> Result<(), Error> {
	let is_wildcard = matches!(sel.projection.as_slice(), [item] if matches!(&item.expr.kind, ExprKind::Identifier { qualifier: None, name } if name == "*"));
	if !is_wildcard {
		return Ok(());
	}

	let primary_name = sel.source.primary.scope_name().to_string();
	let mut items: Vec<SelectItem> = source_fields(&sel.source.primary.stream, root)?
		.into_iter()
		.map(|(name, _)| {
			let mut item = SelectItem::new(Expr::qualified(primary_name.clone(), name.clone()), None);
			item.label = Some(name);
			item
		})
		.collect();

	if let Some(join) = &sel.source.join {
		let right_name = join.right.scope_name().to_string();
		for (name, _) in source_fields(&join.right.stream, root)? {
			let mut item = SelectItem::new(Expr::qualified(right_name.clone(), name.clone()), None);
			item.label = Some(name);
			items.push(item);
		}
	}

	sel.projection = items;
	Ok(())
}

pub fn check_select(sel: &mut SelectStatement, root: &SymbolTable) -> Result<(), Error> {
	expand_wildcard(sel, root)?;
	let scope = build_scope(sel, root)?;

	for item in sel.projection.iter_mut() {
		check_expr(&mut item.expr, &scope)?;
	}
	if let Some(filter) = sel.filter.as_mut() {
		check_expr(filter, &scope)?;
		require_boolean(filter)?;
	}
	for key in sel.group_by.iter_mut() {
		check_expr(key, &scope)?;
	}
	if let Some(having) = sel.having.as_mut() {
		check_expr(having, &scope)?;
		require_boolean(having)?;
	}
	if let Some(window) = sel.window.as_mut() {
		check_expr(&mut window.size, &scope)?;
		if !window.size.ty().is_numeric() {
			return Err(Error::TypeError {
				node: "WINDOW".into(),
				message: format!("window size must be numeric, got {}", window.size.ty()),
			});
		}
	}
	if let Some(join) = sel.source.join.as_mut() {
		check_expr(&mut join.on, &scope)?;
		require_boolean(&join.on)?;
	}
	Ok(())
}

fn require_boolean(expr: &Expr) -> Result<(), Error> {
	if expr.ty().promotes_to(&Type::Boolean) {
		Ok(())
	} else {
		Err(Error::TypeError {
			node: expr.to_string(),
			message: format!("expected BOOLEAN, got {}", expr.ty()),
		})
	}
}

fn check_expr(expr: &mut Expr, scope: &SymbolTable) -> Result<(), Error> {
	let ty = match &mut expr.kind {
		ExprKind::Constant(lit) => declared_type(lit),
		ExprKind::Identifier {
			qualifier,
			name,
		} => {
			let key = match qualifier {
				Some(q) => format!("{q}.{name}"),
				None => name.clone(),
			};
			match scope.lookup(&key) {
				Some(Symbol::Field {
					ty, ..
				}) => ty.clone(),
				_ => return Err(Error::UnknownSymbol(key)),
			}
		}
		ExprKind::Binary {
			op,
			left,
			right,
		} => {
			check_expr(left, scope)?;
			check_expr(right, scope)?;
			check_binary(*op, left, right)?
		}
		ExprKind::Unary {
			op,
			operand,
		} => {
			check_expr(operand, scope)?;
			check_unary(*op, operand)?
		}
		ExprKind::Call {
			name,
			args,
		} => {
			for a in args.iter_mut() {
				check_expr(a, scope)?;
			}
			check_call(name, args, scope)?
		}
	};
	expr.ty = Some(ty);
	Ok(())
}

fn declared_type(lit: &Literal) -> Type {
	lit.declared_type()
}

fn check_binary(op: BinaryOp, left: &Expr, right: &Expr) -> Result<Type, Error> {
	let (lt, rt) = (left.ty(), right.ty());
	if op.is_logical() {
		if !lt.promotes_to(&Type::Boolean) || !rt.promotes_to(&Type::Boolean) {
			return Err(Error::TypeError {
				node: format!("{left} {op} {right}"),
				message: "logical operators require BOOLEAN operands".into(),
			});
		}
		return Ok(Type::Boolean);
	}
	if op.is_comparison() {
		Type::meet(lt, rt).ok_or_else(|| Error::TypeError {
			node: format!("{left} {op} {right}"),
			message: format!("no common type for {lt} and {rt}"),
		})?;
		return Ok(Type::Boolean);
	}
	// arithmetic
	let meet = Type::meet(lt, rt).ok_or_else(|| Error::TypeError {
		node: format!("{left} {op} {right}"),
		message: format!("no common type for {lt} and {rt}"),
	})?;
	if !meet.is_numeric() {
		return Err(Error::TypeError {
			node: format!("{left} {op} {right}"),
			message: format!("arithmetic requires numeric operands, got {meet}"),
		});
	}
	Ok(meet)
}

fn check_unary(op: UnaryOp, operand: &Expr) -> Result<Type, Error> {
	let ty = operand.ty();
	match op {
		UnaryOp::Not => {
			if !ty.promotes_to(&Type::Boolean) {
				return Err(Error::TypeError {
					node: format!("{op} {operand}"),
					message: format!("NOT requires BOOLEAN, got {ty}"),
				});
			}
			Ok(Type::Boolean)
		}
		UnaryOp::Neg => {
			if !ty.is_numeric() {
				return Err(Error::TypeError {
					node: format!("{op} {operand}"),
					message: format!("unary minus requires a numeric operand, got {ty}"),
				});
			}
			Ok(ty.clone())
		}
		UnaryOp::IsNull | UnaryOp::IsNotNull => Ok(Type::Boolean),
	}
}

fn check_call(name: &str, args: &[Expr], scope: &SymbolTable) -> Result<Type, Error> {
	let signature = match scope.lookup(name) {
		Some(Symbol::Function {
			signature, ..
		}) => signature.clone(),
		_ => return Err(Error::UnknownSymbol(name.to_string())),
	};
	if signature.params.len() != args.len() {
		return Err(Error::TypeError {
			node: name.to_string(),
			message: format!("expected {} argument(s), got {}", signature.params.len(), args.len()),
		});
	}

	let mut sub = Substitution::new();
	for universal in signature.universals() {
		let actuals: Vec<Type> = signature
			.params
			.iter()
			.zip(args.iter())
			.filter_map(|(p, a)| match p {
				Type::Universal(u) if *u == universal => Some(a.ty().clone()),
				_ => None,
			})
			.collect();
		let resolved = universal.resolve(&actuals)?;
		sub.bind(&universal, resolved);
	}

	for (param, arg) in signature.params.iter().zip(args.iter()) {
		let expected = sub.replace_in(param)?;
		if !arg.ty().promotes_to(&expected) {
			return Err(Error::TypeError {
				node: name.to_string(),
				message: format!("argument {} expected {expected}, got {}", arg, arg.ty()),
			});
		}
	}

	sub.replace_in(&signature.return_type)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::clause::{JoinClause, JoinKey, SinkClause, SourceClause, SourceRef};
	use crate::ast::{Expr, SelectItem};

	fn root_with_streams() -> SymbolTable {
		let mut root = SymbolTable::root();
		root.define(Symbol::Stream {
			name: "orders".into(),
			fields: vec![("id".into(), Type::Int), ("amount".into(), Type::Double), ("status".into(), Type::String)],
		});
		root.define(Symbol::Stream {
			name: "shipments".into(),
			fields: vec![("id".into(), Type::Int), ("status".into(), Type::String)],
		});
		root
	}

	fn select(projection: Vec<SelectItem>, source: SourceClause, filter: Option<Expr>) -> SelectStatement {
		SelectStatement {
			projection,
			source,
			filter,
			group_by: vec![],
			having: None,
			window: None,
			sink: SinkClause::Console,
		}
	}

	#[test]
	fn resolves_bare_field_on_single_source() {
		let root = root_with_streams();
		let mut sel = select(
			vec![SelectItem::new(Expr::identifier("amount"), None)],
			SourceClause {
				primary: SourceRef::new("orders", None),
				join: None,
			},
			None,
		);
		check_select(&mut sel, &root).unwrap();
		assert_eq!(*sel.projection[0].expr.ty(), Type::Double);
	}

	#[test]
	fn unknown_field_errors() {
		let root = root_with_streams();
		let mut sel = select(
			vec![SelectItem::new(Expr::identifier("nope"), None)],
			SourceClause {
				primary: SourceRef::new("orders", None),
				join: None,
			},
			None,
		);
		assert!(matches!(check_select(&mut sel, &root), Err(Error::UnknownSymbol(_))));
	}

	#[test]
	fn ambiguous_bare_field_in_join_fails() {
		let root = root_with_streams();
		let on = Expr::binary(BinaryOp::Eq, Expr::qualified("orders", "id"), Expr::qualified("shipments", "id"));
		let mut sel = select(
			vec![SelectItem::new(Expr::identifier("status"), None)],
			SourceClause {
				primary: SourceRef::new("orders", None),
				join: Some(JoinClause {
					right: SourceRef::new("shipments", None),
					on,
					keys: vec![JoinKey {
						left_field: "id".into(),
						right_field: "id".into(),
					}],
				}),
			},
			None,
		);
		assert!(matches!(check_select(&mut sel, &root), Err(Error::UnknownSymbol(_))));
	}

	#[test]
	fn qualified_field_in_join_resolves() {
		let root = root_with_streams();
		let on = Expr::binary(BinaryOp::Eq, Expr::qualified("orders", "id"), Expr::qualified("shipments", "id"));
		let mut sel = select(
			vec![SelectItem::new(Expr::qualified("orders", "status"), None)],
			SourceClause {
				primary: SourceRef::new("orders", None),
				join: Some(JoinClause {
					right: SourceRef::new("shipments", None),
					on,
					keys: vec![],
				}),
			},
			None,
		);
		check_select(&mut sel, &root).unwrap();
		assert_eq!(*sel.projection[0].expr.ty(), Type::String);
	}

	#[test]
	fn filter_must_be_boolean() {
		let root = root_with_streams();
		let mut sel = select(
			vec![SelectItem::new(Expr::identifier("amount"), None)],
			SourceClause {
				primary: SourceRef::new("orders", None),
				join: None,
			},
			Some(Expr::identifier("amount")),
		);
		assert!(matches!(check_select(&mut sel, &root), Err(Error::TypeError { .. })));
	}

	#[test]
	fn arithmetic_promotes_to_double() {
		let root = root_with_streams();
		let expr = Expr::binary(BinaryOp::Add, Expr::identifier("id"), Expr::identifier("amount"));
		let mut sel = select(
			vec![SelectItem::new(expr, None)],
			SourceClause {
				primary: SourceRef::new("orders", None),
				join: None,
			},
			None,
		);
		check_select(&mut sel, &root).unwrap();
		assert_eq!(*sel.projection[0].expr.ty(), Type::Double);
	}

	#[test]
	fn wildcard_expands_to_every_source_field() {
		let root = root_with_streams();
		let mut sel = select(
			vec![SelectItem::new(Expr::identifier("*"), None)],
			SourceClause {
				primary: SourceRef::new("orders", None),
				join: None,
			},
			None,
		);
		check_select(&mut sel, &root).unwrap();
		assert_eq!(sel.projection.len(), 3);
		assert_eq!(sel.projection[0].label.as_deref(), Some("id"));
	}

	#[test]
	fn not_of_a_non_boolean_fails_type_checking() {
		let root = root_with_streams();
		let expr = Expr::unary(UnaryOp::Not, Expr::constant(Literal::Int(42)));
		let mut sel = select(
			vec![SelectItem::new(expr, None)],
			SourceClause {
				primary: SourceRef::new("orders", None),
				join: None,
			},
			None,
		);
		assert!(matches!(check_select(&mut sel, &root), Err(Error::TypeError { .. })));
	}

	#[test]
	fn builtin_call_resolves_universal() {
		let root = root_with_streams();
		let expr = Expr::call("ABS", vec![Expr::identifier("amount")]);
		let mut sel = select(
			vec![SelectItem::new(expr, None)],
			SourceClause {
				primary: SourceRef::new("orders", None),
				join: None,
			},
			None,
		);
		check_select(&mut sel, &root).unwrap();
		assert_eq!(*sel.projection[0].expr.ty(), Type::Double);
	}
}
