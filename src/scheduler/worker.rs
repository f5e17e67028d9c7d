//! The single worker thread: drains the control queue, dispatches each
//! op, then runs a bounded burst of data work before waiting again (§4.5).
use crate::cnf;
use crate::dag::NodeId;
use crate::err::Error;
use crate::flow::{ActiveFlowData, FlowId, FlowState, LocalFlow};
use crate::physical::RoutingKind;
use crate::scheduler::control::{AddFlowRequest, ControlOp, FlowInfo};
use crate::scheduler::registry::{IngestionSubsystem, SinkRegistry};
use crate::session::SessionId;
use crate::value::Row;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::JoinHandle;

struct ActiveQueue {
	flow: FlowId,
	node: NodeId,
	port: usize,
	receiver: Receiver<Row>,
}

/// Owns every active flow and the queues feeding them; lives entirely on
/// the worker thread, touched by no one else.
struct Scheduler {
	flows: HashMap<FlowId, ActiveFlowData>,
	active_queues: Vec<ActiveQueue>,
	registry: Arc<SinkRegistry>,
	ingestion: Box<dyn IngestionSubsystem>,
}

/// Recursively hands `row` to `node`'s `take_event`, then routes whatever
/// it emits onward — each `RefCell` borrow is scoped to one `drive` frame
/// and released before recursing into the downstream frame, so a chain of
/// `DirectCoupled` operators never double-borrows the same cell (§9).
fn drive(flow: &LocalFlow, node: NodeId, port: usize, row: Row) -> Result<(), Error> {
	let mut out = Vec::new();
	{
		let mut op = flow.dag.node(node).borrow_mut();
		op.take_event(port, row, &mut out)?;
	}
	route_rows(flow, node, out)
}

fn drive_complete_window(flow: &LocalFlow, node: NodeId) -> Result<(), Error> {
	let mut out = Vec::new();
	{
		let mut op = flow.dag.node(node).borrow_mut();
		op.complete_window(&mut out)?;
	}
	route_rows(flow, node, out)
}

fn route_rows(flow: &LocalFlow, node: NodeId, rows: Vec<Row>) -> Result<(), Error> {
	match &flow.routing[node.0] {
		RoutingKind::DirectCoupled {
			downstream,
			port,
		} => {
			for row in rows {
				drive(flow, NodeId(*downstream), *port, row)?;
			}
		}
		RoutingKind::QueueBacked {
			queue, ..
		} => {
			for row in rows {
				if queue.try_send(row).is_err() {
					tracing::warn!(?node, "queue-backed edge full or disconnected, dropping row");
				}
			}
		}
		RoutingKind::Sink => {
			// The sink operator already delivered the row during its own
			// `take_event`; there is nowhere further to route.
		}
	}
	Ok(())
}

impl Scheduler {
	fn new(registry: Arc<SinkRegistry>, ingestion: Box<dyn IngestionSubsystem>) -> Self {
		Scheduler {
			flows: HashMap::new(),
			active_queues: Vec::new(),
			registry,
			ingestion,
		}
	}

	fn dispatch(&mut self, op: ControlOp) -> bool {
		match op {
			ControlOp::Noop => {}
			ControlOp::AddFlow(req) => self.handle_add_flow(req),
			ControlOp::CancelFlow(id) => self.handle_cancel_flow(id),
			ControlOp::CancelAll => {
				for id in self.flows.keys().cloned().collect::<Vec<_>>() {
					self.handle_cancel_flow(id);
				}
			}
			ControlOp::ElementComplete {
				flow,
				node,
			} => self.handle_element_complete(flow, node),
			ControlOp::Join(id, waiter) => match self.flows.get_mut(&id) {
				Some(active) => active.join_waiters.push(waiter),
				None => {
					let _ = waiter.send(());
				}
			},
			ControlOp::ListFlows(out) => {
				let infos = self
					.flows
					.values()
					.map(|a| FlowInfo {
						id: a.id,
						state: a.state,
					})
					.collect();
				out.set(infos);
			}
			ControlOp::WatchFlow(req) => {
				let result = match self.flows.get(&req.flow) {
					Some(active) => {
						active.subscribers.lock().expect("subscriber set mutex poisoned").insert(req.session);
						Ok(())
					}
					None => {
						tracing::debug!(flow = %req.flow, "watch requested for unknown flow");
						Err(Error::UnknownFlow(req.flow))
					}
				};
				req.result.set(result);
			}
			ControlOp::UnwatchFlow(req) => {
				if let Some(active) = self.flows.get(&req.flow) {
					active.subscribers.lock().expect("subscriber set mutex poisoned").remove(&req.session);
				}
				req.result.set(Ok(()));
			}
			ControlOp::GetWatchList(session, out) => {
				let ids = self
					.flows
					.values()
					.filter(|a| a.subscribers.lock().expect("subscriber set mutex poisoned").contains(&session))
					.map(|a| a.id)
					.collect();
				out.set(ids);
			}
			ControlOp::ShutdownThread => {
				self.ingestion.stop();
				return true;
			}
		}
		false
	}

	fn handle_add_flow(&mut self, req: AddFlowRequest) {
		let AddFlowRequest {
			id,
			mut flow,
			subscribers,
			result,
		} = req;

		if flow.dag.is_empty() {
			result.set(Ok(()));
			return;
		}

		let mut opened = Vec::new();
		let mut open_err = None;
		for node in flow.open_order() {
			match flow.dag.node(node).borrow_mut().open() {
				Ok(()) => opened.push(node),
				Err(e) => {
					open_err = Some(e);
					break;
				}
			}
		}

		if let Some(e) = open_err {
			for node in opened.iter().rev() {
				if let Err(close_err) = flow.dag.node(*node).borrow_mut().close() {
					tracing::warn!(flow = %id, error = %close_err, "error closing operator after failed open");
				}
			}
			result.set(Err(e));
			return;
		}

		let was_empty = self.flows.is_empty();
		let mut queues = Vec::new();
		for node in flow.roots() {
			let name = flow.dag.node(node).borrow().name().to_string();
			let (tx, rx) = crossbeam_channel::bounded(*cnf::DEFAULT_QUEUE_CAPACITY);
			self.registry.bind(&name, tx);
			queues.push(ActiveQueue {
				flow: id,
				node,
				port: 0,
				receiver: rx,
			});
		}
		self.active_queues.extend(queues);

		let mut active = ActiveFlowData::new(id, flow, subscribers);
		active.state = FlowState::Running;
		self.flows.insert(id, active);
		if was_empty {
			self.ingestion.start();
		}
		result.set(Ok(()));
	}

	fn handle_cancel_flow(&mut self, id: FlowId) {
		let Some(mut active) = self.flows.remove(&id) else {
			tracing::debug!(flow = %id, "cancel of unknown flow ignored");
			return;
		};
		active.state = FlowState::Canceling;
		for node in active.flow.close_order() {
			if let Err(e) = active.flow.dag.node(node).borrow_mut().close() {
				tracing::warn!(flow = %id, error = %e, "error closing operator during cancel");
			}
		}
		for root in active.flow.roots() {
			let name = active.flow.dag.node(root).borrow().name().to_string();
			self.registry.drop_sink(&name);
		}
		self.active_queues.retain(|q| q.flow != id);
		active.state = FlowState::Closed;
		active.signal_waiters();
	}

	fn handle_element_complete(&mut self, flow_id: FlowId, node: NodeId) {
		self.active_queues.retain(|q| !(q.flow == flow_id && q.node == node));
		let routing = match self.flows.get(&flow_id) {
			Some(active) => active.flow.routing[node.0].clone(),
			None => return,
		};
		match routing {
			RoutingKind::DirectCoupled {
				downstream,
				..
			} => {
				let downstream = NodeId(downstream);
				if let Some(active) = self.flows.get(&flow_id) {
					if let Err(e) = active.flow.dag.node(downstream).borrow_mut().close_upstream() {
						tracing::warn!(flow = %flow_id, error = %e, "error signaling close_upstream");
					}
					if let Err(e) = drive_complete_window(&active.flow, downstream) {
						tracing::warn!(flow = %flow_id, error = %e, "error draining complete_window");
					}
				}
			}
			RoutingKind::QueueBacked {
				..
			} => {}
			RoutingKind::Sink => self.handle_cancel_flow(flow_id),
		}
	}

	/// Drains every active queue in bounded bursts, yielding back to the
	/// control queue either when data is exhausted or when the step budget
	/// is spent and control traffic is waiting (§4.5 main-loop pseudocode).
	fn drain_data(&mut self, control_rx: &Receiver<ControlOp>) {
		loop {
			let mut steps = 0usize;
			let mut any_progress = false;
			let mut i = 0;
			while i < self.active_queues.len() {
				let mut disconnected = false;
				loop {
					let event = self.active_queues[i].receiver.try_recv();
					match event {
						Ok(row) => {
							any_progress = true;
							steps += 1;
							let (flow_id, node, port) = (self.active_queues[i].flow, self.active_queues[i].node, self.active_queues[i].port);
							if let Some(active) = self.flows.get(&flow_id) {
								if let Err(e) = drive(&active.flow, node, port, row) {
									tracing::warn!(flow = %flow_id, error = %e, "runtime error processing event, dropping it");
								}
							}
							if steps > *cnf::MAX_STEPS {
								if !control_rx.is_empty() {
									return;
								}
								steps = 0;
							}
						}
						Err(TryRecvError::Empty) => break,
						Err(TryRecvError::Disconnected) => {
							disconnected = true;
							break;
						}
					}
				}
				if disconnected {
					self.active_queues.remove(i);
				} else {
					i += 1;
				}
			}
			if !any_progress {
				break;
			}
		}
	}
}

/// The client-facing handle: a sender onto the bounded control queue, plus
/// the sink-binding registry external ingestion would use.
#[derive(Clone)]
pub struct SchedulerHandle {
	pub control_tx: Sender<ControlOp>,
	pub registry: Arc<SinkRegistry>,
}

impl SchedulerHandle {
	pub fn send(&self, op: ControlOp) -> Result<(), Error> {
		self.control_tx.send(op).map_err(|_| Error::SchedulerShutdown)
	}
}

/// Spawns the worker thread and returns a handle to it. `ingestion` stands
/// in for the external event-ingestion subsystem (§6); tests and the
/// default engine configuration pass [`crate::scheduler::registry::NullIngestion`].
pub fn spawn(ingestion: Box<dyn IngestionSubsystem>) -> (SchedulerHandle, JoinHandle<()>) {
	let (control_tx, control_rx) = crossbeam_channel::bounded(*cnf::CONTROL_QUEUE_CAPACITY);
	let registry = Arc::new(SinkRegistry::new());
	let handle = SchedulerHandle {
		control_tx,
		registry: registry.clone(),
	};
	let join = std::thread::Builder::new()
		.name("rtengine-scheduler".into())
		.spawn(move || {
			let mut scheduler = Scheduler::new(registry, ingestion);
			loop {
				let op = match control_rx.recv() {
					Ok(op) => op,
					Err(_) => break,
				};
				let shutdown = scheduler.dispatch(op);
				if shutdown {
					break;
				}
				scheduler.drain_data(&control_rx);
			}
		})
		.expect("failed to spawn scheduler thread");
	(handle, join)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::dag::Dag;
	use crate::physical::ops::{ConsoleSinkOperator, SourceOperator};
	use crate::scheduler::control::WatchRequest;
	use std::cell::RefCell;
	use std::collections::{HashMap as StdHashMap, HashSet};
	use std::sync::Mutex;
	use std::time::Duration;

	fn linear_source_to_console_flow() -> (LocalFlow, Arc<Mutex<Vec<Row>>>) {
		let flow_log = Arc::new(Mutex::new(Vec::new()));
		let subscribers = Arc::new(Mutex::new(HashSet::new()));
		let session_consoles = Arc::new(Mutex::new(StdHashMap::new()));
		let mut dag: Dag<RefCell<Box<dyn crate::physical::Operator>>> = Dag::new();
		let source = dag.add_node(RefCell::new(Box::new(SourceOperator::new("orders".into())) as Box<dyn crate::physical::Operator>));
		let sink = dag.add_node(RefCell::new(Box::new(ConsoleSinkOperator::new(flow_log.clone(), subscribers, session_consoles)) as Box<dyn crate::physical::Operator>));
		dag.add_edge(source, sink);
		let routing = vec![
			RoutingKind::DirectCoupled {
				downstream: sink.0,
				port: 0,
			},
			RoutingKind::Sink,
		];
		(
			LocalFlow {
				dag,
				routing,
			},
			flow_log,
		)
	}

	#[test]
	fn add_flow_then_inject_event_reaches_console() {
		let (handle, _join) = spawn(Box::new(crate::scheduler::registry::NullIngestion));
		let (flow, flow_log) = linear_source_to_console_flow();
		let id = FlowId::new();
		let result = crate::scheduler::control::ResultSlot::new();
		handle
			.send(ControlOp::AddFlow(AddFlowRequest {
				id,
				flow,
				subscribers: Arc::new(Mutex::new(HashSet::new())),
				result: result.clone(),
			}))
			.unwrap();
		assert!(result.wait().is_ok());

		let sender = handle.registry.lookup("orders").expect("root operator registers its queue on AddFlow");
		sender.send(vec![crate::value::Value::Int(1)]).unwrap();
		std::thread::sleep(Duration::from_millis(50));
		assert_eq!(flow_log.lock().unwrap().len(), 1);
		handle.send(ControlOp::CancelFlow(id)).unwrap();
	}

	#[test]
	fn watch_then_unwatch_round_trips_subscriber_set() {
		let (handle, _join) = spawn(Box::new(crate::scheduler::registry::NullIngestion));
		let (flow, _log) = linear_source_to_console_flow();
		let id = FlowId::new();
		let result = crate::scheduler::control::ResultSlot::new();
		handle
			.send(ControlOp::AddFlow(AddFlowRequest {
				id,
				flow,
				subscribers: Arc::new(Mutex::new(HashSet::new())),
				result: result.clone(),
			}))
			.unwrap();
		result.wait().unwrap();

		let session = SessionId::next();
		let watch_result = crate::scheduler::control::ResultSlot::new();
		handle
			.send(ControlOp::WatchFlow(WatchRequest {
				session,
				flow: id,
				result: watch_result.clone(),
			}))
			.unwrap();
		watch_result.wait().unwrap();

		let list_result = crate::scheduler::control::ResultSlot::new();
		handle.send(ControlOp::GetWatchList(session, list_result.clone())).unwrap();
		assert_eq!(list_result.wait(), vec![id]);

		let unwatch_result = crate::scheduler::control::ResultSlot::new();
		handle
			.send(ControlOp::UnwatchFlow(WatchRequest {
				session,
				flow: id,
				result: unwatch_result.clone(),
			}))
			.unwrap();
		unwatch_result.wait().unwrap();

		let list_result2 = crate::scheduler::control::ResultSlot::new();
		handle.send(ControlOp::GetWatchList(session, list_result2.clone())).unwrap();
		assert!(list_result2.wait().is_empty());
		handle.send(ControlOp::CancelFlow(id)).unwrap();
	}
}
