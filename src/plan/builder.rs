use crate::ast::clause::SinkClause;
use crate::ast::statement::{SelectStatement, Statement};
use crate::ast::visit::typecheck::source_fields;
use crate::dag::NodeId;
use crate::err::Error;
use crate::plan::schema::propagate_schemas;
use crate::plan::spec::{FlowSpecification, PlanNode, PlanNodeKind};
use crate::symbol::SymbolTable;

/// Dispatches per statement variant (§4.3). SELECT lowers to a source →
/// filter → join → aggregate → project → sink chain; EXPLAIN lowers its
/// wrapped statement identically (the caller decides whether to stringify
/// or deploy the result); DDL statements have no dataflow and lower to an
/// empty spec.
pub fn create_exec_plan(stmt: &Statement, root: &SymbolTable) -> Result<FlowSpecification, Error> {
	match stmt {
		Statement::Select(sel) => build_select(sel, root),
		Statement::Explain(inner) => create_exec_plan(inner, root),
		Statement::CreateStream(_) | Statement::Drop(_) | Statement::Describe(_) | Statement::Show(_) => Ok(FlowSpecification::empty()),
	}
}

fn build_select(sel: &SelectStatement, root: &SymbolTable) -> Result<FlowSpecification, Error> {
	let mut spec = FlowSpecification::empty();

	source_fields(&sel.source.primary.stream, root)?;
	let primary_alias = sel.source.primary.scope_name().to_string();
	let mut upstream: NodeId = spec.dag.add_node(PlanNode::new(PlanNodeKind::SourceStream {
		name: sel.source.primary.stream.clone(),
		alias: primary_alias,
	}));

	if let Some(join) = &sel.source.join {
		source_fields(&join.right.stream, root)?;
		let right_alias = join.right.scope_name().to_string();
		let right_node = spec.dag.add_node(PlanNode::new(PlanNodeKind::SourceStream {
			name: join.right.stream.clone(),
			alias: right_alias,
		}));
		let join_node = spec.dag.add_node(PlanNode::new(PlanNodeKind::Join {
			keys: join.keys.clone(),
		}));
		spec.dag.add_edge(upstream, join_node);
		spec.dag.add_edge(right_node, join_node);
		upstream = join_node;
	}

	if let Some(filter) = &sel.filter {
		let node = spec.dag.add_node(PlanNode::new(PlanNodeKind::Filter {
			predicate: filter.clone(),
		}));
		spec.dag.add_edge(upstream, node);
		upstream = node;
	}

	if sel.window.is_some() || !sel.group_by.is_empty() {
		let node = spec.dag.add_node(PlanNode::new(PlanNodeKind::Aggregate {
			group_by: sel.group_by.clone(),
			having: sel.having.clone(),
			window: sel.window.clone(),
		}));
		spec.dag.add_edge(upstream, node);
		upstream = node;
	}

	let project_node = spec.dag.add_node(PlanNode::new(PlanNodeKind::Project {
		items: sel.projection.clone(),
	}));
	spec.dag.add_edge(upstream, project_node);
	upstream = project_node;

	let sink_kind = match &sel.sink {
		SinkClause::Console => PlanNodeKind::ConsoleOutput,
		SinkClause::Memory(name) => PlanNodeKind::MemoryOutput {
			name: name.clone(),
		},
	};
	let sink_node = spec.dag.add_node(PlanNode::new(sink_kind));
	spec.dag.add_edge(upstream, sink_node);

	propagate_schemas(&mut spec, root)?;
	Ok(spec)
}
