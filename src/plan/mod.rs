//! Lowers a typed, elaborated statement into a [`FlowSpecification`]: a DAG
//! of logical plan nodes with schemas propagated top-down (§4.3).
mod builder;
mod schema;
mod spec;

pub use builder::create_exec_plan;
pub use schema::propagate_schemas;
pub use spec::{FlowSpecification, PlanNode, PlanNodeKind};
