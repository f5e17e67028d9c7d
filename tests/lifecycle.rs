//! Exercises the engine exactly as an external caller would: submit a
//! statement, read back the messages, drive a flow through its lifecycle.
//! Each test builds its own throwaway engine.
use rtengine::engine::Engine;
use std::collections::HashMap;
use std::time::Duration;

fn declare_stream(engine: &Engine, ddl: &str) {
	let result = engine.submit(ddl, &HashMap::new());
	assert!(result.flow_id.is_none(), "DDL never deploys a flow");
}

#[test]
fn parse_failure_yields_a_message_and_no_flow() {
	let engine = Engine::new();
	let result = engine.submit("SELEKT 1", &HashMap::new());
	assert!(result.flow_id.is_none());
	assert!(result.messages.iter().any(|m| m.to_lowercase().contains("parse")));
}

#[test]
fn explain_reports_both_stages_without_deploying() {
	let engine = Engine::new();
	declare_stream(&engine, "CREATE STREAM s (a INT)");

	let result = engine.submit("EXPLAIN SELECT a FROM s", &HashMap::new());
	assert!(result.flow_id.is_none());
	assert!(result.messages.iter().any(|m| m.starts_with("Parse tree:")));
	assert!(result.messages.iter().any(|m| m.starts_with("Execution plan:")));
	assert!(engine.list_flows().is_empty());
}

#[test]
fn full_lifecycle_join_cancel_then_list_omits_flow() {
	let engine = Engine::new();
	declare_stream(&engine, "CREATE STREAM s (a INT)");

	let mut options = HashMap::new();
	options.insert("rtengine.flow.autowatch".to_string(), "false".to_string());
	let result = engine.submit("SELECT * FROM s", &options);
	let id = result.flow_id.expect("a valid SELECT deploys a flow");
	assert!(engine.list_flows().iter().any(|info| info.id == id));

	assert!(!engine.join_flow(id, Some(Duration::from_millis(50))), "flow is still running");

	engine.cancel_flow(id).unwrap();
	assert!(engine.join_flow(id, None), "join succeeds once the flow has closed");
	assert!(!engine.list_flows().iter().any(|info| info.id == id));
}

#[test]
fn cancel_flow_is_idempotent() {
	let engine = Engine::new();
	declare_stream(&engine, "CREATE STREAM s (a INT)");
	let mut options = HashMap::new();
	options.insert("rtengine.flow.autowatch".to_string(), "false".to_string());
	let result = engine.submit("SELECT * FROM s", &options);
	let id = result.flow_id.unwrap();

	engine.cancel_flow(id).unwrap();
	engine.cancel_flow(id).unwrap();
	assert!(engine.join_flow(id, Some(Duration::from_millis(50))));
}

#[test]
fn watch_then_unwatch_restores_the_watch_list() {
	let engine = Engine::new();
	declare_stream(&engine, "CREATE STREAM s (a INT)");
	let session = engine.new_session();

	let mut options = HashMap::new();
	options.insert("rtengine.flow.autowatch".to_string(), "false".to_string());
	let result = engine.submit("SELECT * FROM s", &options);
	let id = result.flow_id.unwrap();

	engine.watch_flow(session, id).unwrap();
	assert_eq!(engine.list_watched(session), vec![id]);

	engine.unwatch_flow(session, id).unwrap();
	assert!(engine.list_watched(session).is_empty());

	engine.cancel_flow(id).unwrap();
}

#[test]
fn duplicate_column_names_are_rejected_at_ddl_time() {
	let engine = Engine::new();
	let result = engine.submit("CREATE STREAM bad (a INT, a INT)", &HashMap::new());
	assert!(result.flow_id.is_none());
	assert!(result.messages.iter().any(|m| m.to_lowercase().contains("duplicate")));
}

#[test]
fn describe_and_show_streams_reflect_declared_schema() {
	let engine = Engine::new();
	declare_stream(&engine, "CREATE STREAM orders (id INT, amount DOUBLE)");
	declare_stream(&engine, "CREATE STREAM shipments (id INT)");

	let result = engine.submit("DESCRIBE orders", &HashMap::new());
	assert!(result.flow_id.is_none());

	let fields = engine.describe("orders").unwrap();
	assert_eq!(fields.len(), 2);

	let mut streams = engine.show_streams();
	streams.sort();
	assert_eq!(streams, vec!["orders".to_string(), "shipments".to_string()]);
}

#[test]
fn memory_sink_accumulates_rows_from_a_running_flow() {
	let engine = Engine::new();
	declare_stream(&engine, "CREATE STREAM s (a INT)");
	let mut options = HashMap::new();
	options.insert("rtengine.flow.autowatch".to_string(), "false".to_string());
	let result = engine.submit("SELECT a FROM s INTO MEMORY recent", &options);
	let id = result.flow_id.unwrap();

	assert!(engine.memory_output("recent").is_empty());

	engine.cancel_flow(id).unwrap();
	assert!(engine.join_flow(id, None));
}
