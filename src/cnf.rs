//! Tunable constants for the scheduler and physical builder. Grouped here,
//! in the spirit of the reference engine's `cnf` module, rather than spread
//! through the call sites that use them. Each `Lazy` value may be overridden
//! by its environment variable for experimentation; none of this is a
//! general configuration-file format, which remains out of scope (§1).
use once_cell::sync::Lazy;

/// Capacity of the bounded control queue. Submission blocks the client when
/// full (§3 invariants, §5 backpressure).
pub static CONTROL_QUEUE_CAPACITY: Lazy<usize> =
	crate::lazy_env_parse!("RTENGINE_CONTROL_QUEUE_CAPACITY", usize, 100);

/// Maximum number of `take_event` calls the worker performs between two
/// inspections of the control queue (§4.5, §8).
pub static MAX_STEPS: Lazy<usize> = crate::lazy_env_parse!("RTENGINE_MAX_STEPS", usize, 250);

/// Default capacity of a queue-backed operator context's pending-event
/// queue (§4.4 physical builder wiring policy).
pub static DEFAULT_QUEUE_CAPACITY: Lazy<usize> =
	crate::lazy_env_parse!("RTENGINE_DEFAULT_QUEUE_CAPACITY", usize, 1024);

/// Default value of the `rtengine.flow.autowatch` submission option (§6).
pub static DEFAULT_AUTOWATCH: Lazy<bool> =
	crate::lazy_env_parse!("RTENGINE_DEFAULT_AUTOWATCH", bool, true);
