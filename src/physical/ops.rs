//! Concrete physical operators (§4.4, §4.6). Each is deliberately minimal —
//! correct for the engine's narrow expression language rather than an
//! exhaustive streaming-SQL runtime.
use crate::ast::clause::{Column, JoinKey, SelectItem, WindowClause};
use crate::ast::expr::Expr;
use crate::err::Error;
use crate::eval::eval;
use crate::physical::operator::{OpState, Operator};
use crate::session::SessionId;
use crate::value::{Row, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Stands in for the external ingestion subsystem's binding point: rows
/// arrive here from outside the flow graph and pass straight through.
pub struct SourceOperator {
	name: String,
	state: OpState,
}

impl SourceOperator {
	pub fn new(name: String) -> Self {
		SourceOperator {
			name,
			state: OpState::default(),
		}
	}
}

impl Operator for SourceOperator {
	fn open(&mut self) -> Result<(), Error> {
		self.state.open();
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.state.close();
		Ok(())
	}

	fn take_event(&mut self, _port: usize, row: Row, out: &mut Vec<Row>) -> Result<(), Error> {
		out.push(row);
		Ok(())
	}

	fn complete_window(&mut self, _out: &mut Vec<Row>) -> Result<(), Error> {
		Ok(())
	}

	fn close_upstream(&mut self) -> Result<(), Error> {
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.state.closed
	}

	fn name(&self) -> &str {
		&self.name
	}
}

pub struct FilterOperator {
	predicate: Expr,
	input_schema: Vec<Column>,
	state: OpState,
}

impl FilterOperator {
	pub fn new(predicate: Expr, input_schema: Vec<Column>) -> Self {
		FilterOperator {
			predicate,
			input_schema,
			state: OpState::default(),
		}
	}
}

impl Operator for FilterOperator {
	fn open(&mut self) -> Result<(), Error> {
		self.state.open();
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.state.close();
		Ok(())
	}

	fn take_event(&mut self, _port: usize, row: Row, out: &mut Vec<Row>) -> Result<(), Error> {
		let keep = eval(&self.predicate, &self.input_schema, &row)?;
		if matches!(keep, Value::Boolean(true)) {
			out.push(row);
		}
		Ok(())
	}

	fn complete_window(&mut self, _out: &mut Vec<Row>) -> Result<(), Error> {
		Ok(())
	}

	fn close_upstream(&mut self) -> Result<(), Error> {
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.state.closed
	}

	fn name(&self) -> &str {
		"Filter"
	}
}

pub struct ProjectOperator {
	items: Vec<SelectItem>,
	input_schema: Vec<Column>,
	state: OpState,
}

impl ProjectOperator {
	pub fn new(items: Vec<SelectItem>, input_schema: Vec<Column>) -> Self {
		ProjectOperator {
			items,
			input_schema,
			state: OpState::default(),
		}
	}
}

impl Operator for ProjectOperator {
	fn open(&mut self) -> Result<(), Error> {
		self.state.open();
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.state.close();
		Ok(())
	}

	fn take_event(&mut self, _port: usize, row: Row, out: &mut Vec<Row>) -> Result<(), Error> {
		let mut projected = Vec::with_capacity(self.items.len());
		for item in &self.items {
			projected.push(eval(&item.expr, &self.input_schema, &row)?);
		}
		out.push(projected);
		Ok(())
	}

	fn complete_window(&mut self, _out: &mut Vec<Row>) -> Result<(), Error> {
		Ok(())
	}

	fn close_upstream(&mut self) -> Result<(), Error> {
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.state.closed
	}

	fn name(&self) -> &str {
		"Project"
	}
}

/// A symmetric hash join. Each side buffers the rows it has seen keyed by
/// the join key's values, so an arrival on either port can match against
/// everything already buffered on the other.
pub struct JoinOperator {
	keys: Vec<JoinKey>,
	left_schema: Vec<Column>,
	right_schema: Vec<Column>,
	left_buf: HashMap<Vec<String>, Vec<Row>>,
	right_buf: HashMap<Vec<String>, Vec<Row>>,
	state: OpState,
}

impl JoinOperator {
	pub fn new(keys: Vec<JoinKey>, left_schema: Vec<Column>, right_schema: Vec<Column>) -> Self {
		JoinOperator {
			keys,
			left_schema,
			right_schema,
			left_buf: HashMap::new(),
			right_buf: HashMap::new(),
			state: OpState::default(),
		}
	}

	fn key_of(&self, schema: &[Column], row: &Row, field_of: impl Fn(&JoinKey) -> &str) -> Vec<String> {
		self.keys
			.iter()
			.map(|k| {
				let field = field_of(k);
				let pos = schema.iter().position(|(n, _)| n.ends_with(&format!(".{field}")) || n == field).unwrap_or(0);
				row[pos].to_string()
			})
			.collect()
	}
}

impl Operator for JoinOperator {
	fn open(&mut self) -> Result<(), Error> {
		self.state.open();
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.state.close();
		Ok(())
	}

	fn take_event(&mut self, port: usize, row: Row, out: &mut Vec<Row>) -> Result<(), Error> {
		match port {
			0 => {
				let key = self.key_of(&self.left_schema, &row, |k| &k.left_field);
				if let Some(matches) = self.right_buf.get(&key) {
					for right_row in matches {
						out.push(row.iter().cloned().chain(right_row.iter().cloned()).collect());
					}
				}
				self.left_buf.entry(key).or_default().push(row);
			}
			_ => {
				let key = self.key_of(&self.right_schema, &row, |k| &k.right_field);
				if let Some(matches) = self.left_buf.get(&key) {
					for left_row in matches {
						out.push(left_row.iter().cloned().chain(row.iter().cloned()).collect());
					}
				}
				self.right_buf.entry(key).or_default().push(row);
			}
		}
		Ok(())
	}

	fn complete_window(&mut self, _out: &mut Vec<Row>) -> Result<(), Error> {
		Ok(())
	}

	fn close_upstream(&mut self) -> Result<(), Error> {
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.state.closed
	}

	fn name(&self) -> &str {
		"Join"
	}
}

/// A tumbling, count-based window (the window size expression must
/// evaluate to a constant). Rows are buffered until the window fills, then
/// flushed: one row per distinct `GROUP BY` key (the last row seen for that
/// key), filtered through `HAVING` if present. Without a `GROUP BY` every
/// buffered row passing `HAVING` is flushed individually.
pub struct AggregateOperator {
	group_by: Vec<Expr>,
	having: Option<Expr>,
	window_size: usize,
	input_schema: Vec<Column>,
	buffer: Vec<Row>,
	state: OpState,
}

impl AggregateOperator {
	pub fn new(group_by: Vec<Expr>, having: Option<Expr>, window: Option<WindowClause>, input_schema: Vec<Column>) -> Result<Self, Error> {
		let window_size = match &window {
			Some(w) => match eval(&w.size, &input_schema, &vec![]) {
				Ok(Value::Int(n)) if n > 0 => n as usize,
				Ok(other) => {
					return Err(Error::OpenError {
						operator: "Aggregate".into(),
						message: format!("window size must be a positive INT constant, got {other}"),
					})
				}
				Err(e) => return Err(e),
			},
			None => 1,
		};
		Ok(AggregateOperator {
			group_by,
			having,
			window_size,
			input_schema,
			buffer: Vec::new(),
			state: OpState::default(),
		})
	}

	fn flush(&mut self, out: &mut Vec<Row>) -> Result<(), Error> {
		if self.group_by.is_empty() {
			let rows: Vec<Row> = self.buffer.drain(..).collect();
			for row in rows {
				if self.passes_having(&row)? {
					out.push(row);
				}
			}
			return Ok(());
		}
		let mut last_by_key: HashMap<Vec<String>, Row> = HashMap::new();
		for row in self.buffer.drain(..) {
			let key = self
				.group_by
				.iter()
				.map(|e| eval(e, &self.input_schema, &row).map(|v| v.to_string()))
				.collect::<Result<Vec<_>, _>>()?;
			last_by_key.insert(key, row);
		}
		for row in last_by_key.into_values() {
			if self.passes_having(&row)? {
				out.push(row);
			}
		}
		Ok(())
	}

	fn passes_having(&self, row: &Row) -> Result<bool, Error> {
		match &self.having {
			None => Ok(true),
			Some(h) => Ok(matches!(eval(h, &self.input_schema, row)?, Value::Boolean(true))),
		}
	}
}

impl Operator for AggregateOperator {
	fn open(&mut self) -> Result<(), Error> {
		self.state.open();
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.state.close();
		Ok(())
	}

	fn take_event(&mut self, _port: usize, row: Row, out: &mut Vec<Row>) -> Result<(), Error> {
		self.buffer.push(row);
		if self.buffer.len() >= self.window_size {
			self.flush(out)?;
		}
		Ok(())
	}

	fn complete_window(&mut self, out: &mut Vec<Row>) -> Result<(), Error> {
		self.flush(out)
	}

	fn close_upstream(&mut self) -> Result<(), Error> {
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.state.closed
	}

	fn name(&self) -> &str {
		"Aggregate"
	}
}

/// Routes rows to every console subscriber of the owning flow (§4.7).
/// `subscribers` is the flow's live subscriber set — mutated in place by
/// `watch_flow`/`unwatch_flow` on the scheduler thread, the same thread
/// that drives `take_event`, so no additional synchronization is needed
/// beyond the mutex guarding concurrent reads from `list_watched`.
/// `flow_log` additionally records every row in submission order so
/// callers without a live subscription (tests, `EXPLAIN`-adjacent
/// tooling) can still observe console output.
pub struct ConsoleSinkOperator {
	flow_log: Arc<Mutex<Vec<Row>>>,
	subscribers: Arc<Mutex<HashSet<SessionId>>>,
	session_consoles: Arc<Mutex<HashMap<SessionId, Arc<Mutex<Vec<Row>>>>>>,
	state: OpState,
}

impl ConsoleSinkOperator {
	pub fn new(flow_log: Arc<Mutex<Vec<Row>>>, subscribers: Arc<Mutex<HashSet<SessionId>>>, session_consoles: Arc<Mutex<HashMap<SessionId, Arc<Mutex<Vec<Row>>>>>>) -> Self {
		ConsoleSinkOperator {
			flow_log,
			subscribers,
			session_consoles,
			state: OpState::default(),
		}
	}
}

impl Operator for ConsoleSinkOperator {
	fn open(&mut self) -> Result<(), Error> {
		self.state.open();
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.state.close();
		Ok(())
	}

	fn take_event(&mut self, _port: usize, row: Row, _out: &mut Vec<Row>) -> Result<(), Error> {
		tracing::debug!(?row, "console output");
		self.flow_log.lock().expect("console log mutex poisoned").push(row.clone());
		let subs = self.subscribers.lock().expect("subscriber set mutex poisoned");
		if !subs.is_empty() {
			let consoles = self.session_consoles.lock().expect("session console registry mutex poisoned");
			for sid in subs.iter() {
				if let Some(buf) = consoles.get(sid) {
					buf.lock().expect("session console mutex poisoned").push(row.clone());
				}
			}
		}
		Ok(())
	}

	fn complete_window(&mut self, _out: &mut Vec<Row>) -> Result<(), Error> {
		Ok(())
	}

	fn close_upstream(&mut self) -> Result<(), Error> {
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.state.closed
	}

	fn name(&self) -> &str {
		"ConsoleOutput"
	}
}

/// Writes rows into the engine-wide named memory output map, readable
/// through a thread-safe snapshot (§6 persistence).
pub struct MemorySinkOperator {
	name: String,
	store: Arc<Mutex<HashMap<String, Vec<Row>>>>,
	state: OpState,
}

impl MemorySinkOperator {
	pub fn new(name: String, store: Arc<Mutex<HashMap<String, Vec<Row>>>>) -> Self {
		MemorySinkOperator {
			name,
			store,
			state: OpState::default(),
		}
	}
}

impl Operator for MemorySinkOperator {
	fn open(&mut self) -> Result<(), Error> {
		self.store.lock().expect("memory output mutex poisoned").entry(self.name.clone()).or_default();
		self.state.open();
		Ok(())
	}

	fn close(&mut self) -> Result<(), Error> {
		self.state.close();
		Ok(())
	}

	fn take_event(&mut self, _port: usize, row: Row, _out: &mut Vec<Row>) -> Result<(), Error> {
		self.store.lock().expect("memory output mutex poisoned").entry(self.name.clone()).or_default().push(row);
		Ok(())
	}

	fn complete_window(&mut self, _out: &mut Vec<Row>) -> Result<(), Error> {
		Ok(())
	}

	fn close_upstream(&mut self) -> Result<(), Error> {
		Ok(())
	}

	fn is_closed(&self) -> bool {
		self.state.closed
	}

	fn name(&self) -> &str {
		"MemoryOutput"
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ast::expr::{BinaryOp, Literal};
	use crate::types::Type;

	#[test]
	fn filter_drops_non_matching_rows() {
		let predicate = Expr::binary(BinaryOp::Gt, Expr::identifier("amount"), Expr::constant(Literal::Double(10.0)));
		let mut predicate = predicate;
		predicate.ty = Some(Type::Boolean);
		let schema = vec![("amount".to_string(), Type::Double)];
		let mut op = FilterOperator::new(predicate, schema);
		let mut out = Vec::new();
		op.take_event(0, vec![Value::Double(20.0)], &mut out).unwrap();
		op.take_event(0, vec![Value::Double(5.0)], &mut out).unwrap();
		assert_eq!(out.len(), 1);
		assert_eq!(out[0], vec![Value::Double(20.0)]);
	}

	#[test]
	fn join_matches_buffered_rows_from_either_side() {
		let keys = vec![JoinKey {
			left_field: "id".into(),
			right_field: "order_id".into(),
		}];
		let left_schema = vec![("orders.id".to_string(), Type::Int)];
		let right_schema = vec![("shipments.order_id".to_string(), Type::Int), ("shipments.carrier".to_string(), Type::String)];
		let mut op = JoinOperator::new(keys, left_schema, right_schema);
		let mut out = Vec::new();
		op.take_event(0, vec![Value::Int(1)], &mut out).unwrap();
		assert!(out.is_empty());
		op.take_event(1, vec![Value::Int(1), Value::String("ups".into())], &mut out).unwrap();
		assert_eq!(out.len(), 1);
		assert_eq!(out[0], vec![Value::Int(1), Value::Int(1), Value::String("ups".into())]);
	}

	#[test]
	fn aggregate_flushes_at_window_size() {
		let window = WindowClause {
			size: Expr::constant(Literal::Int(2)),
		};
		let mut op = AggregateOperator::new(vec![], None, Some(window), vec![]).unwrap();
		let mut out = Vec::new();
		op.take_event(0, vec![Value::Int(1)], &mut out).unwrap();
		assert!(out.is_empty());
		op.take_event(0, vec![Value::Int(2)], &mut out).unwrap();
		assert_eq!(out.len(), 2);
	}
}
