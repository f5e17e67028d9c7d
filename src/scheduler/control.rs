//! The control queue's message types, and the caller-provided-container
//! pattern ([`ResultSlot`]) used to deliver `ListFlows`/`GetWatchList`
//! results back across the control thread boundary (§4.5, §5).
use crate::dag::NodeId;
use crate::err::Error;
use crate::flow::{FlowId, FlowState, LocalFlow};
use crate::session::SessionId;
use crossbeam_channel::Sender;
use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

/// A value the worker writes once and a caller blocks on, under a mutex
/// the caller already holds when it enqueues the request (§5 shared
/// resource policy). Kept generic rather than one struct per control op
/// that needs it.
pub struct ResultSlot<T> {
	inner: Mutex<Option<T>>,
	cond: Condvar,
}

impl<T> ResultSlot<T> {
	pub fn new() -> Arc<Self> {
		Arc::new(ResultSlot {
			inner: Mutex::new(None),
			cond: Condvar::new(),
		})
	}

	pub fn set(&self, value: T) {
		let mut guard = self.inner.lock().expect("result slot mutex poisoned");
		*guard = Some(value);
		self.cond.notify_all();
	}

	pub fn wait(&self) -> T {
		let mut guard = self.inner.lock().expect("result slot mutex poisoned");
		loop {
			if let Some(value) = guard.take() {
				return value;
			}
			guard = self.cond.wait(guard).expect("result slot mutex poisoned");
		}
	}

	/// Returns `None` if `timeout` elapses with no value set.
	pub fn wait_timeout(&self, timeout: Duration) -> Option<T> {
		let mut guard = self.inner.lock().expect("result slot mutex poisoned");
		let deadline = Instant::now() + timeout;
		loop {
			if let Some(value) = guard.take() {
				return Some(value);
			}
			let now = Instant::now();
			if now >= deadline {
				return None;
			}
			let (next, _timeout_result) = self.cond.wait_timeout(guard, deadline - now).expect("result slot mutex poisoned");
			guard = next;
		}
	}
}

/// A snapshot of one active flow, as returned by `ListFlows`.
#[derive(Clone, Debug)]
pub struct FlowInfo {
	pub id: FlowId,
	pub state: FlowState,
}

pub struct AddFlowRequest {
	pub id: FlowId,
	pub flow: LocalFlow,
	pub subscribers: Arc<Mutex<HashSet<SessionId>>>,
	pub result: Arc<ResultSlot<Result<(), Error>>>,
}

pub struct WatchRequest {
	pub session: SessionId,
	pub flow: FlowId,
	pub result: Arc<ResultSlot<Result<(), Error>>>,
}

/// Every tagged operation the control queue carries (§4.5).
pub enum ControlOp {
	AddFlow(AddFlowRequest),
	CancelFlow(FlowId),
	CancelAll,
	ShutdownThread,
	Noop,
	/// An operator at `node` in `flow` has run to natural end.
	ElementComplete {
		flow: FlowId,
		node: NodeId,
	},
	Join(FlowId, Sender<()>),
	ListFlows(Arc<ResultSlot<Vec<FlowInfo>>>),
	WatchFlow(WatchRequest),
	UnwatchFlow(WatchRequest),
	GetWatchList(SessionId, Arc<ResultSlot<Vec<FlowId>>>),
}
