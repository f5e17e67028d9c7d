//! The control-plane/data-plane worker that owns every active flow (§4.5).
mod control;
mod registry;
mod worker;

pub use control::{AddFlowRequest, ControlOp, FlowInfo, ResultSlot, WatchRequest};
pub use registry::{IngestionSubsystem, NullIngestion, SinkRegistry};
pub use worker::{spawn, SchedulerHandle};
