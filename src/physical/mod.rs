//! Physical operators and the runtime DAG they're wired into (§4.4, §4.6).
pub mod builder;
pub mod context;
pub(crate) mod ops;
pub mod operator;

pub use builder::{build_physical, PhysicalResources};
pub use context::RoutingKind;
pub use operator::Operator;
