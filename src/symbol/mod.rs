//! Symbols and the nested symbol table they live in (§3). Lookups walk
//! outward from the innermost scope to the built-in table, which holds the
//! engine's SQL functions and sits at the bottom of every chain.
mod builtin;

pub use builtin::builtin_table;

use crate::types::{Type, UniversalType};
use std::collections::HashMap;
use std::sync::Arc;

/// The declared shape of a built-in function: a fixed list of parameter
/// types (which may themselves be [`Type::Universal`]) and a return type
/// that may reference the same universal, resolved per call site (§4.1).
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionSignature {
	pub params: Vec<Type>,
	pub return_type: Type,
}

impl FunctionSignature {
	pub fn new(params: Vec<Type>, return_type: Type) -> Self {
		FunctionSignature {
			params,
			return_type,
		}
	}

	/// The distinct universals mentioned anywhere in this signature, in
	/// first-appearance order.
	pub fn universals(&self) -> Vec<UniversalType> {
		let mut out: Vec<UniversalType> = Vec::new();
		let mut note = |t: &Type| {
			if let Type::Universal(u) = t {
				if !out.contains(u) {
					out.push(u.clone());
				}
			}
		};
		for p in &self.params {
			note(p);
		}
		note(&self.return_type);
		out
	}
}

/// A named entity resolvable through a [`SymbolTable`].
#[derive(Clone, Debug)]
pub enum Symbol {
	/// A declared event stream: an ordered list of (field name, type).
	Stream {
		name: String,
		fields: Vec<(String, Type)>,
	},
	/// A single field, as seen from inside an expression scope (e.g. once a
	/// stream's fields have been brought into scope by a source clause).
	Field {
		name: String,
		ty: Type,
	},
	/// A callable built-in SQL function.
	Function {
		name: String,
		signature: FunctionSignature,
	},
}

impl Symbol {
	pub fn name(&self) -> &str {
		match self {
			Symbol::Stream {
				name, ..
			} => name,
			Symbol::Field {
				name, ..
			} => name,
			Symbol::Function {
				name, ..
			} => name,
		}
	}
}

/// A nested mapping from identifier to [`Symbol`]. Lookups check the local
/// scope first, then walk outward through parents; the built-in table is
/// the bottommost parent of every chain (§3).
#[derive(Clone, Debug)]
pub struct SymbolTable {
	parent: Option<Arc<SymbolTable>>,
	entries: HashMap<String, Symbol>,
}

impl SymbolTable {
	pub fn root() -> Self {
		SymbolTable {
			parent: Some(Arc::new(builtin_table())),
			entries: HashMap::new(),
		}
	}

	pub fn empty() -> Self {
		SymbolTable {
			parent: None,
			entries: HashMap::new(),
		}
	}

	pub fn child(parent: Arc<SymbolTable>) -> Self {
		SymbolTable {
			parent: Some(parent),
			entries: HashMap::new(),
		}
	}

	pub fn define(&mut self, symbol: Symbol) {
		self.entries.insert(symbol.name().to_string(), symbol);
	}

	pub fn lookup(&self, name: &str) -> Option<&Symbol> {
		match self.entries.get(name) {
			Some(s) => Some(s),
			None => self.parent.as_ref().and_then(|p| p.lookup(name)),
		}
	}

	/// True if `name` is defined in this scope without considering parents.
	pub fn defined_locally(&self, name: &str) -> bool {
		self.entries.contains_key(name)
	}

	pub fn local_names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(|s| s.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lookup_walks_outward_to_builtins() {
		let root = SymbolTable::root();
		assert!(root.lookup("NOT").is_some());
		assert!(root.lookup("nonexistent").is_none());
	}

	#[test]
	fn local_shadows_parent() {
		let mut child = SymbolTable::child(Arc::new(SymbolTable::root()));
		child.define(Symbol::Field {
			name: "a".into(),
			ty: Type::Int,
		});
		assert!(matches!(child.lookup("a"), Some(Symbol::Field { .. })));
	}
}
