//! Session identity and watch plumbing (§4.7). A session outlives any
//! particular flow; it carries an output console and a set of flows it
//! currently watches. Session state is mutated only by the scheduler
//! thread, same as flow state (§5).
use crate::value::Row;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

static NEXT_SESSION_ID: AtomicI64 = AtomicI64::new(1);

impl SessionId {
	pub fn next() -> Self {
		SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
	Connected,
	Disconnected,
}

/// A client's identity plus its console: a buffer of rows forwarded from
/// every flow it watches, in arrival order.
pub struct Session {
	pub id: SessionId,
	pub state: SessionState,
	pub console: Arc<Mutex<Vec<Row>>>,
}

impl Session {
	pub fn new(id: SessionId) -> Self {
		Session {
			id,
			state: SessionState::Connected,
			console: Arc::new(Mutex::new(Vec::new())),
		}
	}

	pub fn disconnect(&mut self) {
		self.state = SessionState::Disconnected;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_session_is_connected_with_empty_console() {
		let s = Session::new(SessionId::next());
		assert_eq!(s.state, SessionState::Connected);
		assert!(s.console.lock().unwrap().is_empty());
	}
}
