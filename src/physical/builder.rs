//! Lowers a [`FlowSpecification`] into a [`LocalFlow`] of concrete
//! operators (§4.4). Operators are built sink-to-source, so that by the
//! time an upstream node is instantiated its downstream already has an
//! arena index to route to — the same order the scheduler later opens
//! operators in.
use crate::cnf;
use crate::dag::{Dag, NodeId};
use crate::err::Error;
use crate::flow::LocalFlow;
use crate::physical::context::RoutingKind;
use crate::physical::ops::{AggregateOperator, ConsoleSinkOperator, FilterOperator, JoinOperator, MemorySinkOperator, ProjectOperator, SourceOperator};
use crate::physical::operator::Operator;
use crate::plan::{FlowSpecification, PlanNode, PlanNodeKind};
use crate::session::SessionId;
use crate::value::Row;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub struct PhysicalResources {
	pub subscribers: Arc<Mutex<HashSet<SessionId>>>,
	pub session_consoles: Arc<Mutex<HashMap<SessionId, Arc<Mutex<Vec<Row>>>>>>,
	pub memory_store: Arc<Mutex<HashMap<String, Vec<Row>>>>,
}

/// Builds the runtime operator DAG for `spec`, along with the flow's own
/// console log (every row a `ConsoleOutput` node has ever emitted,
/// independent of who is currently subscribed).
pub fn build_physical(spec: &FlowSpecification, resources: &PhysicalResources) -> Result<(LocalFlow, Arc<Mutex<Vec<Row>>>), Error> {
	let flow_log: Arc<Mutex<Vec<Row>>> = Arc::new(Mutex::new(Vec::new()));
	let mut dag: Dag<RefCell<Box<dyn Operator>>> = Dag::new();
	let mut id_map: HashMap<NodeId, NodeId> = HashMap::new();

	for plan_id in spec.dag.reverse_bfs(&spec.dag.sinks()) {
		let node = spec.dag.node(plan_id);
		let operator = instantiate(node, spec, plan_id, resources, &flow_log)?;
		let local_id = dag.add_node(RefCell::new(operator));
		id_map.insert(plan_id, local_id);
	}

	let mut routing = vec![RoutingKind::Sink; dag.len()];
	for plan_id in spec.dag.bfs(&spec.dag.roots()) {
		let local_id = id_map[&plan_id];
		let succs = spec.dag.successors(plan_id);
		routing[local_id.0] = match succs {
			[] => RoutingKind::Sink,
			[only] => {
				dag.add_edge(local_id, id_map[only]);
				let port = spec.dag.predecessors(*only).iter().position(|p| p == &plan_id).unwrap_or(0);
				RoutingKind::DirectCoupled {
					downstream: id_map[only].0,
					port,
				}
			}
			multiple => {
				// This engine's grammar only ever produces chains with a
				// single two-input fan-in at Join, never fan-out, so this
				// branch exists for contract completeness but is never
				// exercised by a statement the parser can build.
				let downstream = multiple[0];
				dag.add_edge(local_id, id_map[&downstream]);
				let port = spec.dag.predecessors(downstream).iter().position(|p| p == &plan_id).unwrap_or(0);
				let (sender, _receiver) = crossbeam_channel::bounded(*cnf::DEFAULT_QUEUE_CAPACITY);
				RoutingKind::QueueBacked {
					downstream: id_map[&downstream].0,
					port,
					queue: sender,
				}
			}
		};
	}

	Ok((
		LocalFlow {
			dag,
			routing,
		},
		flow_log,
	))
}

fn instantiate(node: &PlanNode, spec: &FlowSpecification, plan_id: NodeId, resources: &PhysicalResources, flow_log: &Arc<Mutex<Vec<Row>>>) -> Result<Box<dyn Operator>, Error> {
	let op: Box<dyn Operator> = match &node.kind {
		PlanNodeKind::SourceStream {
			alias, ..
		} => Box::new(SourceOperator::new(alias.clone())),
		PlanNodeKind::Filter {
			predicate,
		} => Box::new(FilterOperator::new(predicate.clone(), node.input_schema.clone())),
		PlanNodeKind::Join {
			keys,
		} => {
			let preds = spec.dag.predecessors(plan_id);
			let left_schema = preds.first().map(|id| spec.dag.node(*id).output_schema.clone()).unwrap_or_default();
			let right_schema = preds.get(1).map(|id| spec.dag.node(*id).output_schema.clone()).unwrap_or_default();
			Box::new(JoinOperator::new(keys.clone(), left_schema, right_schema))
		}
		PlanNodeKind::Aggregate {
			group_by,
			having,
			window,
		} => Box::new(AggregateOperator::new(group_by.clone(), having.clone(), window.clone(), node.input_schema.clone())?),
		PlanNodeKind::Project {
			items,
		} => Box::new(ProjectOperator::new(items.clone(), node.input_schema.clone())),
		PlanNodeKind::ConsoleOutput => Box::new(ConsoleSinkOperator::new(flow_log.clone(), resources.subscribers.clone(), resources.session_consoles.clone())),
		PlanNodeKind::MemoryOutput {
			name,
		} => Box::new(MemorySinkOperator::new(name.clone(), resources.memory_store.clone())),
	};
	Ok(op)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::clause::{SinkClause, SourceClause, SourceRef};
	use crate::ast::statement::{SelectStatement, Statement};
	use crate::ast::visit::elaborate;
	use crate::ast::{Expr, SelectItem};
	use crate::plan::create_exec_plan;
	use crate::symbol::{Symbol, SymbolTable};
	use crate::types::Type;

	fn root_with_orders() -> SymbolTable {
		let mut root = SymbolTable::root();
		root.define(Symbol::Stream {
			name: "orders".into(),
			fields: vec![("amount".into(), Type::Double)],
		});
		root
	}

	fn test_resources() -> PhysicalResources {
		PhysicalResources {
			subscribers: Arc::new(Mutex::new(HashSet::new())),
			session_consoles: Arc::new(Mutex::new(HashMap::new())),
			memory_store: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	#[test]
	fn builds_a_linear_chain_with_direct_coupled_routing() {
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
		let resources = test_resources();
		let (flow, _log) = build_physical(&spec, &resources).unwrap();
		assert_eq!(flow.sinks().len(), 1);
		assert!(!flow.roots().is_empty());
		for r in &flow.routing {
			match r {
				RoutingKind::DirectCoupled {
					..
				}
				| RoutingKind::Sink => {}
				RoutingKind::QueueBacked {
					..
				} => panic!("linear chain should never need a queue-backed edge"),
			}
		}
	}
}
