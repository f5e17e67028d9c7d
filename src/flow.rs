//! Flow identity, the runtime operator DAG, and a flow's live record
//! inside the scheduler (§3: LocalFlow, ActiveFlowData).
use crate::dag::{Dag, NodeId};
use crate::physical::context::RoutingKind;
use crate::physical::operator::Operator;
use crate::session::SessionId;
use crossbeam_channel::Sender;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use ulid::Ulid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlowId(pub Ulid);

impl FlowId {
	pub fn new() -> Self {
		FlowId(Ulid::new())
	}
}

impl Default for FlowId {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Display for FlowId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// The runtime DAG for one deployed statement. Operators live in an arena
/// (`dag`) addressed by index rather than by direct reference to one
/// another, so routing decisions (`routing`, keyed by the same index) are
/// the only thing that knows how one operator's output reaches the next
/// (§9 design notes: breaking the operator/flow reference cycle).
pub struct LocalFlow {
	pub dag: Dag<RefCell<Box<dyn Operator>>>,
	pub routing: Vec<RoutingKind>,
}

impl LocalFlow {
	pub fn roots(&self) -> Vec<NodeId> {
		self.dag.roots()
	}

	pub fn sinks(&self) -> Vec<NodeId> {
		self.dag.sinks()
	}

	/// Sink-to-source order: the order operators must open in (§4.5).
	pub fn open_order(&self) -> Vec<NodeId> {
		self.dag.reverse_bfs(&self.dag.sinks())
	}

	/// Source-to-sink order: the order operators must close in, so an
	/// upstream operator stops emitting before its downstream closes.
	pub fn close_order(&self) -> Vec<NodeId> {
		self.dag.bfs(&self.dag.roots())
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
	Deploying,
	Running,
	Canceling,
	Closed,
}

/// A flow's live record inside the scheduler (§3). Subscribers and
/// join-waiters are mutated only by the control thread.
pub struct ActiveFlowData {
	pub id: FlowId,
	pub flow: LocalFlow,
	pub state: FlowState,
	pub subscribers: Arc<Mutex<HashSet<SessionId>>>,
	pub join_waiters: Vec<Sender<()>>,
}

impl ActiveFlowData {
	pub fn new(id: FlowId, flow: LocalFlow, subscribers: Arc<Mutex<HashSet<SessionId>>>) -> Self {
		ActiveFlowData {
			id,
			flow,
			state: FlowState::Deploying,
			subscribers,
			join_waiters: Vec::new(),
		}
	}

	/// Signals every registered join-waiter; a waiter that has already
	/// given up (receiver dropped) is simply skipped.
	pub fn signal_waiters(&mut self) {
		for waiter in self.join_waiters.drain(..) {
			let _ = waiter.send(());
		}
	}
}
