//! The engine's public surface (§6): submit a statement, manage the flows
//! it deploys, and read back what's running. One [`Engine`] owns one
//! scheduler thread and the root symbol table DDL mutates.
use crate::ast::statement::Statement;
use crate::ast::visit::elaborate;
use crate::cnf;
use crate::err::Error;
use crate::flow::FlowId;
use crate::parser::parse_statement;
use crate::physical::{build_physical, PhysicalResources};
use crate::plan::create_exec_plan;
use crate::scheduler::{spawn, AddFlowRequest, ControlOp, FlowInfo, IngestionSubsystem, NullIngestion, ResultSlot, SchedulerHandle, WatchRequest};
use crate::session::{Session, SessionId};
use crate::symbol::{Symbol, SymbolTable};
use crate::value::Row;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Keys recognized in a `submit` options map (§6). Non-exhaustive by
/// design — unrecognized keys are ignored rather than rejected.
pub const OPT_AUTOWATCH: &str = "rtengine.flow.autowatch";
pub const OPT_SUBMITTER_SESSION_ID: &str = "rtengine.query.submitter.session.id";

#[derive(Clone, Debug, Default)]
pub struct SubmitOptions {
	pub autowatch: Option<bool>,
	pub submitter_session: Option<SessionId>,
}

impl SubmitOptions {
	pub fn from_map(options: &HashMap<String, String>) -> Self {
		let autowatch = options.get(OPT_AUTOWATCH).and_then(|v| v.parse::<bool>().ok());
		let submitter_session = options.get(OPT_SUBMITTER_SESSION_ID).and_then(|v| v.parse::<i64>().ok()).map(SessionId);
		SubmitOptions {
			autowatch,
			submitter_session,
		}
	}
}

/// The result of a `submit` call: whatever diagnostic text accumulated
/// (parse/type/plan errors, or EXPLAIN output) and the deployed flow's id,
/// if one was deployed.
#[derive(Clone, Debug, Default)]
pub struct SubmitResult {
	pub messages: Vec<String>,
	pub flow_id: Option<FlowId>,
}

pub struct Engine {
	handle: SchedulerHandle,
	join: Mutex<Option<JoinHandle<()>>>,
	root: Mutex<SymbolTable>,
	memory_store: Arc<Mutex<HashMap<String, Vec<Row>>>>,
	session_consoles: Arc<Mutex<HashMap<SessionId, Arc<Mutex<Vec<Row>>>>>>,
	sessions: Mutex<HashMap<SessionId, Session>>,
}

impl Default for Engine {
	fn default() -> Self {
		Engine::new()
	}
}

impl Engine {
	pub fn new() -> Self {
		Engine::with_ingestion(Box::new(NullIngestion))
	}

	pub fn with_ingestion(ingestion: Box<dyn IngestionSubsystem>) -> Self {
		let (handle, join) = spawn(ingestion);
		Engine {
			handle,
			join: Mutex::new(Some(join)),
			root: Mutex::new(SymbolTable::root()),
			memory_store: Arc::new(Mutex::new(HashMap::new())),
			session_consoles: Arc::new(Mutex::new(HashMap::new())),
			sessions: Mutex::new(HashMap::new()),
		}
	}

	/// Registers a fresh session and returns its id. Submitters that rely
	/// on autowatch must register first and pass the id back through
	/// [`OPT_SUBMITTER_SESSION_ID`].
	pub fn new_session(&self) -> SessionId {
		let id = SessionId::next();
		let session = Session::new(id);
		self.session_consoles.lock().expect("session console map poisoned").insert(id, session.console.clone());
		self.sessions.lock().expect("session map poisoned").insert(id, session);
		id
	}

	/// Parses, elaborates, plans and - for a SELECT - deploys `query`. DDL
	/// statements mutate the root symbol table directly and deploy nothing;
	/// `EXPLAIN` stringifies the parse tree and execution plan instead of
	/// deploying (§4.3, §8 scenario 2).
	#[tracing::instrument(skip(self, options))]
	pub fn submit(&self, query: &str, options: &HashMap<String, String>) -> SubmitResult {
		let opts = SubmitOptions::from_map(options);
		let mut stmt = match parse_statement(query) {
			Ok(stmt) => stmt,
			Err(e) => {
				return SubmitResult {
					messages: vec![e.to_string()],
					flow_id: None,
				}
			}
		};

		let mut messages = Vec::new();
		let is_explain = stmt.is_explain();
		if is_explain {
			messages.push(format!("Parse tree: {stmt:?}"));
		}

		{
			let mut root = self.root.lock().expect("symbol table mutex poisoned");
			if let Err(e) = elaborate(&mut stmt, &root) {
				messages.push(e.to_string());
				return SubmitResult {
					messages,
					flow_id: None,
				};
			}
			if let Err(e) = self.apply_ddl(&stmt, &mut root) {
				messages.push(e.to_string());
				return SubmitResult {
					messages,
					flow_id: None,
				};
			}
		}

		if !stmt.is_deployable() {
			return SubmitResult {
				messages,
				flow_id: None,
			};
		}

		let spec = {
			let root = self.root.lock().expect("symbol table mutex poisoned");
			match create_exec_plan(&stmt, &root) {
				Ok(spec) => spec,
				Err(e) => {
					messages.push(e.to_string());
					return SubmitResult {
						messages,
						flow_id: None,
					};
				}
			}
		};

		if is_explain {
			messages.push(format!("Execution plan:\n{spec}"));
			return SubmitResult {
				messages,
				flow_id: None,
			};
		}

		let subscribers = Arc::new(Mutex::new(HashSet::new()));
		let resources = PhysicalResources {
			subscribers: subscribers.clone(),
			session_consoles: self.session_consoles.clone(),
			memory_store: self.memory_store.clone(),
		};
		let (flow, _flow_log) = match build_physical(&spec, &resources) {
			Ok(pair) => pair,
			Err(e) => {
				messages.push(e.to_string());
				return SubmitResult {
					messages,
					flow_id: None,
				};
			}
		};

		let autowatch = opts.autowatch.unwrap_or(*cnf::DEFAULT_AUTOWATCH);
		if autowatch {
			if let Some(session) = opts.submitter_session {
				subscribers.lock().expect("subscriber set mutex poisoned").insert(session);
			}
		}

		let id = FlowId::new();
		match self.add_flow(id, flow, subscribers) {
			Ok(()) => SubmitResult {
				messages,
				flow_id: Some(id),
			},
			Err(e) => {
				messages.push(e.to_string());
				SubmitResult {
					messages,
					flow_id: None,
				}
			}
		}
	}

	fn apply_ddl(&self, stmt: &Statement, root: &mut SymbolTable) -> Result<(), Error> {
		match stmt {
			Statement::CreateStream(cs) => {
				let mut seen = HashSet::new();
				for (name, _) in &cs.columns {
					if !seen.insert(name.clone()) {
						return Err(Error::DuplicateName(name.clone()));
					}
				}
				root.define(Symbol::Stream {
					name: cs.name.clone(),
					fields: cs.columns.clone(),
				});
				Ok(())
			}
			Statement::Drop(_) => {
				// the symbol table has no removal primitive; dropping a
				// stream is out of scope beyond accepting the statement
				// (§1 durable state is explicitly excluded).
				Ok(())
			}
			Statement::Describe(_) | Statement::Show(_) => Ok(()),
			Statement::Explain(inner) => self.apply_ddl(inner, root),
			Statement::Select(_) => Ok(()),
		}
	}

	/// Renders a stream's declared schema, or `None` if it isn't a stream.
	pub fn describe(&self, name: &str) -> Option<Vec<(String, crate::types::Type)>> {
		let root = self.root.lock().expect("symbol table mutex poisoned");
		match root.lookup(name) {
			Some(Symbol::Stream {
				fields, ..
			}) => Some(fields.clone()),
			_ => None,
		}
	}

	/// Every stream name declared so far, for `SHOW STREAMS`.
	pub fn show_streams(&self) -> Vec<String> {
		let root = self.root.lock().expect("symbol table mutex poisoned");
		root.local_names().map(|s| s.to_string()).collect()
	}

	/// A snapshot of a named memory output's accumulated rows (§6, §9
	/// supplemented accessor).
	pub fn memory_output(&self, name: &str) -> Vec<Row> {
		self.memory_store.lock().expect("memory store mutex poisoned").get(name).cloned().unwrap_or_default()
	}

	fn add_flow(&self, id: FlowId, flow: crate::flow::LocalFlow, subscribers: Arc<Mutex<HashSet<SessionId>>>) -> Result<(), Error> {
		let result = ResultSlot::new();
		self.handle.send(ControlOp::AddFlow(AddFlowRequest {
			id,
			flow,
			subscribers,
			result: result.clone(),
		}))?;
		result.wait()
	}

	pub fn cancel_flow(&self, id: FlowId) -> Result<(), Error> {
		self.handle.send(ControlOp::CancelFlow(id))
	}

	pub fn cancel_all(&self) -> Result<(), Error> {
		self.handle.send(ControlOp::CancelAll)
	}

	/// Blocks until `id` closes, or `timeout` elapses. A missing flow (not
	/// currently active) returns `true` immediately (§7 control error
	/// policy: join on a missing flow succeeds).
	pub fn join_flow(&self, id: FlowId, timeout: Option<Duration>) -> bool {
		let (tx, rx) = crossbeam_channel::bounded(1);
		if self.handle.send(ControlOp::Join(id, tx)).is_err() {
			return true;
		}
		match timeout {
			Some(d) => rx.recv_timeout(d).is_ok(),
			None => rx.recv().is_ok(),
		}
	}

	pub fn list_flows(&self) -> Vec<FlowInfo> {
		let result = ResultSlot::new();
		if self.handle.send(ControlOp::ListFlows(result.clone())).is_err() {
			return Vec::new();
		}
		result.wait()
	}

	pub fn watch_flow(&self, session: SessionId, flow: FlowId) -> Result<(), Error> {
		let result = ResultSlot::new();
		self.handle.send(ControlOp::WatchFlow(WatchRequest {
			session,
			flow,
			result: result.clone(),
		}))?;
		result.wait()
	}

	pub fn unwatch_flow(&self, session: SessionId, flow: FlowId) -> Result<(), Error> {
		let result = ResultSlot::new();
		self.handle.send(ControlOp::UnwatchFlow(WatchRequest {
			session,
			flow,
			result: result.clone(),
		}))?;
		result.wait()
	}

	pub fn list_watched(&self, session: SessionId) -> Vec<FlowId> {
		let result = ResultSlot::new();
		if self.handle.send(ControlOp::GetWatchList(session, result.clone())).is_err() {
			return Vec::new();
		}
		result.wait()
	}

	/// Stops the scheduler thread. Idempotent: a second call observes the
	/// control queue already closed and returns without blocking.
	pub fn shutdown(&self) {
		let _ = self.handle.send(ControlOp::ShutdownThread);
		if let Some(join) = self.join.lock().expect("join handle mutex poisoned").take() {
			let _ = join.join();
		}
	}
}

impl Drop for Engine {
	fn drop(&mut self) {
		self.shutdown();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn declare_stream_s(engine: &Engine) {
		let result = engine.submit("CREATE STREAM s (a INT)", &HashMap::new());
		assert!(result.flow_id.is_none());
	}

	#[test]
	fn parse_failure_surfaces_a_message_and_no_flow() {
		let engine = Engine::new();
		let result = engine.submit("SELEKT 1", &HashMap::new());
		assert!(result.flow_id.is_none());
		assert!(!result.messages.is_empty());
	}

	#[test]
	fn explain_reports_parse_tree_and_plan_without_deploying() {
		let engine = Engine::new();
		declare_stream_s(&engine);
		let result = engine.submit("EXPLAIN SELECT a FROM s", &HashMap::new());
		assert!(result.flow_id.is_none());
		assert!(result.messages.iter().any(|m| m.starts_with("Parse tree:")));
		assert!(result.messages.iter().any(|m| m.starts_with("Execution plan:")));
		assert!(engine.list_flows().is_empty());
	}

	#[test]
	fn lifecycle_join_then_cancel_then_list_omits_it() {
		let engine = Engine::new();
		declare_stream_s(&engine);
		let mut options = HashMap::new();
		options.insert(OPT_AUTOWATCH.to_string(), "false".to_string());
		let result = engine.submit("SELECT * FROM s", &options);
		let id = result.flow_id.expect("a valid SELECT deploys a flow");

		assert!(!engine.join_flow(id, Some(Duration::from_millis(50))));
		engine.cancel_flow(id).unwrap();
		assert!(engine.join_flow(id, None));
		assert!(!engine.list_flows().iter().any(|info| info.id == id));
	}

	#[test]
	fn describe_and_show_streams_reflect_ddl() {
		let engine = Engine::new();
		declare_stream_s(&engine);
		let fields = engine.describe("s").expect("s was declared");
		assert_eq!(fields.len(), 1);
		assert!(engine.show_streams().contains(&"s".to_string()));
	}
}
