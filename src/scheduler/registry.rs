//! The process-wide sink-binding registry (§9 design notes): the narrow
//! interface the out-of-scope event-ingestion subsystem uses to find the
//! queue feeding a given source name. `bind`/`drop_sink`/`lookup` is all it
//! is specified to do; internal synchronization is its only job.
use crate::value::Row;
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct SinkRegistry {
	sinks: Mutex<HashMap<String, Sender<Row>>>,
}

impl SinkRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn bind(&self, name: &str, sender: Sender<Row>) {
		self.sinks.lock().expect("sink registry mutex poisoned").insert(name.to_string(), sender);
	}

	pub fn drop_sink(&self, name: &str) {
		self.sinks.lock().expect("sink registry mutex poisoned").remove(name);
	}

	pub fn lookup(&self, name: &str) -> Option<Sender<Row>> {
		self.sinks.lock().expect("sink registry mutex poisoned").get(name).cloned()
	}
}

/// The ingestion subsystem's start/stop contract (§6): the engine only
/// needs to know when to call these, never what they do internally.
pub trait IngestionSubsystem: Send {
	fn start(&mut self);
	fn stop(&mut self);
}

/// The ingestion subsystem proper is out of scope; this satisfies the
/// contract with no external process to manage.
#[derive(Default)]
pub struct NullIngestion;

impl IngestionSubsystem for NullIngestion {
	fn start(&mut self) {
		tracing::debug!("ingestion subsystem start (no-op stand-in)");
	}

	fn stop(&mut self) {
		tracing::debug!("ingestion subsystem stop (no-op stand-in)");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bind_then_lookup_then_drop() {
		let registry = SinkRegistry::new();
		let (tx, _rx) = crossbeam_channel::unbounded();
		registry.bind("orders", tx);
		assert!(registry.lookup("orders").is_some());
		registry.drop_sink("orders");
		assert!(registry.lookup("orders").is_none());
	}
}
