use crate::types::Type;
use std::fmt;
use thiserror::Error;

/// The unified error type for the engine. Every public entry point returns
/// `Result<T, Error>`; the variants line up with the error kinds named by the
/// engine's error-handling design: parse, type, plan, open, runtime and
/// control errors.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
	/// A syntactic error while parsing a statement. Carries the byte offset
	/// the parser had reached when it gave up.
	#[error("Parse error at position {position}: {message}")]
	ParseError {
		position: usize,
		message: String,
	},

	/// A semantic error raised by one of the AST visitors. Carries a
	/// human-readable description of the offending node.
	#[error("Type error in `{node}`: {message}")]
	TypeError {
		node: String,
		message: String,
	},

	/// A universal type failed to resolve against its declared constraints.
	#[error("Could not resolve universal type '{alias} as {candidate}: does not satisfy constraint {constraint}")]
	UnresolvedUniversal {
		alias: String,
		candidate: Type,
		constraint: Type,
	},

	/// A universal type alias was referenced but never bound in the
	/// substitution map used while type-checking a single call.
	#[error("Universal type '{0} was never bound")]
	UnboundUniversal(String),

	/// An identifier could not be resolved against the symbol table.
	#[error("Unknown identifier: {0}")]
	UnknownSymbol(String),

	/// A name was declared twice where uniqueness was required (duplicate
	/// projection label, duplicate stream field).
	#[error("Duplicate name: {0}")]
	DuplicateName(String),

	/// Failure while lowering a typed statement to a flow specification, or
	/// while propagating schemas through it.
	#[error("Plan error: {0}")]
	PlanError(String),

	/// A runtime setup failure while opening a physical operator.
	#[error("Failed to open operator `{operator}`: {message}")]
	OpenError {
		operator: String,
		message: String,
	},

	/// A per-event processing failure. Per policy this is logged and the
	/// event is dropped; it never aborts the owning flow.
	#[error("Runtime error in operator `{operator}`: {message}")]
	RuntimeError {
		operator: String,
		message: String,
	},

	/// The referenced flow does not exist in the active-flows map.
	#[error("Unknown flow: {0}")]
	UnknownFlow(crate::flow::FlowId),

	/// The referenced session does not exist.
	#[error("Unknown session: {0}")]
	UnknownSession(crate::session::SessionId),

	/// A caller-supplied wait timed out before the worker produced a result.
	#[error("Timed out waiting for a response from the scheduler")]
	Timeout,

	/// The scheduler has already shut down and can no longer accept control
	/// operations.
	#[error("The scheduler has shut down")]
	SchedulerShutdown,

	/// An invariant of the engine was violated; reaching this indicates a
	/// bug rather than a user error.
	#[error("Unreachable: {0}")]
	Unreachable(String),
}

impl Error {
	pub fn plan(msg: impl fmt::Display) -> Self {
		Error::PlanError(msg.to_string())
	}
}
