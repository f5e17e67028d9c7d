use super::{FunctionSignature, Symbol, SymbolTable};
use crate::types::{Type, Typeclass, UniversalType};

/// The bottommost table in every lookup chain: the engine's built-in SQL
/// functions (§3). A handful of these are generic over a universal type to
/// exercise unification (§4.1); most are fixed-signature.
pub fn builtin_table() -> SymbolTable {
	let mut table = SymbolTable::empty();

	table.define(Symbol::Function {
		name: "NOT".into(),
		signature: FunctionSignature::new(vec![Type::Boolean], Type::Boolean),
	});

	table.define(Symbol::Function {
		name: "LEN".into(),
		signature: FunctionSignature::new(vec![Type::String], Type::Int),
	});

	table.define(Symbol::Function {
		name: "UPPER".into(),
		signature: FunctionSignature::new(vec![Type::String], Type::String),
	});

	let numeric = UniversalType::new("a", vec![Type::Typeclass(Typeclass::Numeric)]);
	table.define(Symbol::Function {
		name: "ABS".into(),
		signature: FunctionSignature::new(
			vec![Type::Universal(numeric.clone())],
			Type::Universal(numeric),
		),
	});

	let any = UniversalType::new("b", vec![Type::Typeclass(Typeclass::Any)]);
	table.define(Symbol::Function {
		name: "COALESCE".into(),
		signature: FunctionSignature::new(
			vec![Type::Universal(any.clone()), Type::Universal(any.clone())],
			Type::Universal(any),
		),
	});

	let comparable = UniversalType::new("c", vec![Type::Typeclass(Typeclass::Comparable)]);
	table.define(Symbol::Function {
		name: "GREATEST".into(),
		signature: FunctionSignature::new(
			vec![Type::Universal(comparable.clone()), Type::Universal(comparable.clone())],
			Type::Universal(comparable),
		),
	});

	table
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn not_is_registered() {
		let table = builtin_table();
		assert!(matches!(table.lookup("NOT"), Some(Symbol::Function { .. })));
	}
}
