#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

#[doc(hidden)]
pub mod cnf;
pub mod err;

pub mod types;
pub mod symbol;
pub mod ast;
pub mod dag;
pub mod value;
pub mod eval;
pub mod plan;
pub mod physical;
pub mod flow;
pub mod session;
pub mod scheduler;
pub mod parser;
pub mod engine;

pub use engine::Engine;
pub use err::Error;
