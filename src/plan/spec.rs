use crate::ast::clause::{Column, JoinKey, SelectItem, WindowClause};
use crate::ast::expr::Expr;
use crate::dag::Dag;
use std::fmt;

/// One node of a logical flow: the operation it performs, plus the input
/// and output schemas [`crate::plan::propagate_schemas`] fills in.
#[derive(Clone, Debug)]
pub struct PlanNode {
	pub kind: PlanNodeKind,
	pub input_schema: Vec<Column>,
	pub output_schema: Vec<Column>,
}

impl PlanNode {
	pub fn new(kind: PlanNodeKind) -> Self {
		PlanNode {
			kind,
			input_schema: Vec::new(),
			output_schema: Vec::new(),
		}
	}
}

#[derive(Clone, Debug)]
pub enum PlanNodeKind {
	SourceStream {
		name: String,
		alias: String,
	},
	Filter {
		predicate: Expr,
	},
	Join {
		keys: Vec<JoinKey>,
	},
	Aggregate {
		group_by: Vec<Expr>,
		having: Option<Expr>,
		window: Option<WindowClause>,
	},
	Project {
		items: Vec<SelectItem>,
	},
	ConsoleOutput,
	MemoryOutput {
		name: String,
	},
}

impl fmt::Display for PlanNodeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PlanNodeKind::SourceStream {
				name,
				alias,
			} => write!(f, "SourceStream({name} AS {alias})"),
			PlanNodeKind::Filter {
				predicate,
			} => write!(f, "Filter({predicate})"),
			PlanNodeKind::Join {
				keys,
			} => {
				write!(f, "Join(")?;
				for (i, k) in keys.iter().enumerate() {
					if i > 0 {
						write!(f, " AND ")?;
					}
					write!(f, "{}={}", k.left_field, k.right_field)?;
				}
				write!(f, ")")
			}
			PlanNodeKind::Aggregate {
				group_by,
				..
			} => write!(f, "Aggregate(group_by={})", group_by.len()),
			PlanNodeKind::Project {
				items,
			} => {
				write!(f, "Project(")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{}", item.label.as_deref().unwrap_or("?"))?;
				}
				write!(f, ")")
			}
			PlanNodeKind::ConsoleOutput => write!(f, "ConsoleOutput"),
			PlanNodeKind::MemoryOutput {
				name,
			} => write!(f, "MemoryOutput({name})"),
		}
	}
}

/// A DAG of [`PlanNode`]s: the logical description of one SELECT statement
/// before physical wiring. DDL statements lower to an empty spec.
#[derive(Default)]
pub struct FlowSpecification {
	pub dag: Dag<PlanNode>,
}

impl FlowSpecification {
	pub fn empty() -> Self {
		FlowSpecification {
			dag: Dag::new(),
		}
	}
}

impl fmt::Display for FlowSpecification {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let roots = self.dag.roots();
		for id in self.dag.bfs(&roots) {
			let node = self.dag.node(id);
			writeln!(f, "  {} -> {:?}", node.kind, node.output_schema.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>())?;
		}
		Ok(())
	}
}
