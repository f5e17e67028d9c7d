use crate::ast::clause::Column;
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::visit::typecheck::source_fields;
use crate::err::Error;
use crate::plan::spec::{FlowSpecification, PlanNodeKind};
use crate::symbol::SymbolTable;

/// Walks a flow spec top-down, computing each node's output schema from its
/// input schema (the concatenation of its predecessors' output schemas)
/// and its own parameters. A node whose parameters reference a field
/// missing from its input schema fails the whole statement (§4.3).
pub fn propagate_schemas(spec: &mut FlowSpecification, root: &SymbolTable) -> Result<(), Error> {
	let roots = spec.dag.roots();
	let order = spec.dag.bfs(&roots);
	for id in order {
		let input_schema: Vec<Column> = spec.dag.predecessors(id).iter().flat_map(|p| spec.dag.node(*p).output_schema.clone()).collect();
		let output_schema = {
			let node = spec.dag.node(id);
			compute_output_schema(&node.kind, &input_schema, root)?
		};
		let node = spec.dag.node_mut(id);
		node.input_schema = input_schema;
		node.output_schema = output_schema;
	}
	Ok(())
}

fn compute_output_schema(kind: &PlanNodeKind, input: &[Column], root: &SymbolTable) -> Result<Vec<Column>, Error> {
	match kind {
		PlanNodeKind::SourceStream {
			name,
			alias,
		} => {
			let fields = source_fields(name, root)?;
			Ok(fields.into_iter().map(|(n, t)| (format!("{alias}.{n}"), t)).collect())
		}
		PlanNodeKind::Filter {
			predicate,
		} => {
			validate_fields(predicate, input)?;
			Ok(input.to_vec())
		}
		PlanNodeKind::Join {
			..
		} => Ok(input.to_vec()),
		PlanNodeKind::Aggregate {
			group_by,
			having,
			window,
		} => {
			for key in group_by {
				validate_fields(key, input)?;
			}
			if let Some(having) = having {
				validate_fields(having, input)?;
			}
			if let Some(window) = window {
				validate_fields(&window.size, input)?;
			}
			Ok(input.to_vec())
		}
		PlanNodeKind::Project {
			items,
		} => {
			let mut output = Vec::with_capacity(items.len());
			for item in items {
				validate_fields(&item.expr, input)?;
				let label = item.label.clone().unwrap_or_else(|| item.expr.to_string());
				output.push((label, item.expr.ty().clone()));
			}
			Ok(output)
		}
		PlanNodeKind::ConsoleOutput | PlanNodeKind::MemoryOutput {
			..
		} => Ok(input.to_vec()),
	}
}

fn validate_fields(expr: &Expr, schema: &[Column]) -> Result<(), Error> {
	match &expr.kind {
		ExprKind::Constant(_) => Ok(()),
		ExprKind::Identifier {
			qualifier,
			name,
		} => {
			let key = match qualifier {
				Some(q) => format!("{q}.{name}"),
				None => name.clone(),
			};
			if schema.iter().any(|(n, _)| n == &key) {
				Ok(())
			} else {
				Err(Error::plan(format!("field `{key}` is not present in the input schema")))
			}
		}
		ExprKind::Binary {
			left,
			right,
			..
		} => {
			validate_fields(left, schema)?;
			validate_fields(right, schema)
		}
		ExprKind::Unary {
			operand, ..
		} => validate_fields(operand, schema),
		ExprKind::Call {
			args, ..
		} => {
			for a in args {
				validate_fields(a, schema)?;
			}
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use crate::ast::clause::{SinkClause, SourceClause, SourceRef};
	use crate::ast::statement::{SelectStatement, Statement};
	use crate::ast::visit::elaborate;
	use crate::ast::{Expr, SelectItem};
	use crate::plan::builder::create_exec_plan;
	use crate::symbol::{Symbol, SymbolTable};
	use crate::types::Type;

	fn root_with_orders() -> SymbolTable {
		let mut root = SymbolTable::root();
		root.define(Symbol::Stream {
			name: "orders".into(),
			fields: vec![("id".into(), Type::Int), ("amount".into(), Type::Double)],
		});
		root
	}

	#[test]
	fn project_schema_reflects_typed_labels() {
		let root = root_with_orders();
		let mut stmt = Statement::Select(SelectStatement {
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
		});
		elaborate(&mut stmt, &root).unwrap();
		let spec = create_exec_plan(&stmt, &root).unwrap();
		let sinks = spec.dag.sinks();
		assert_eq!(sinks.len(), 1);
		let sink_schema = &spec.dag.node(sinks[0]).output_schema;
		assert_eq!(sink_schema, &vec![("amount".to_string(), Type::Double)]);
	}

	#[test]
	fn unknown_field_in_filter_is_caught_by_typecheck_before_planning() {
		let root = root_with_orders();
		let mut stmt = Statement::Select(SelectStatement {
			projection: vec![SelectItem::new(Expr::identifier("amount"), None)],
			source: SourceClause {
				primary: SourceRef::new("orders", None),
				join: None,
			},
			filter: Some(Expr::identifier("nonexistent")),
			group_by: vec![],
			having: None,
			window: None,
			sink: SinkClause::Console,
		});
		assert!(elaborate(&mut stmt, &root).is_err());
	}
}
