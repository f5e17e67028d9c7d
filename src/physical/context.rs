use crate::value::Row;
use crossbeam_channel::Sender;

/// How a node's emitted rows reach their downstream consumer (§3, §4.4).
/// Stored alongside the flow's operator arena rather than inside the
/// operator itself, so routing never requires an operator to hold a
/// reference to another — only an index the scheduler resolves.
#[derive(Clone)]
pub enum RoutingKind {
	/// Synchronous handoff: the scheduler calls `downstream.take_event`
	/// inline, on the `port` input of the operator at `downstream`.
	DirectCoupled {
		downstream: usize,
		port: usize,
	},
	/// Appends to the downstream operator's own bounded pending-event
	/// queue; the scheduler's main loop drains it in its own turn.
	QueueBacked {
		downstream: usize,
		port: usize,
		queue: Sender<Row>,
	},
	/// Terminal: routes to the owning flow's console subscribers or named
	/// memory output rather than to another operator.
	Sink,
}
