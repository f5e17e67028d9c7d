use super::Type;
use crate::err::Error;
use std::collections::HashMap;
use std::fmt;

/// A named type variable, unified against actual argument types at a call
/// site (§3, §4.1). Two universals are equal iff their alias and declared
/// constraint list are both equal; universals with different aliases are
/// independent even when their constraints coincide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct UniversalType {
	alias: String,
	constraints: Vec<Type>,
}

impl UniversalType {
	pub fn new(alias: impl Into<String>, constraints: Vec<Type>) -> Self {
		UniversalType {
			alias: alias.into(),
			constraints,
		}
	}

	pub fn alias(&self) -> &str {
		&self.alias
	}

	pub fn constraints(&self) -> &[Type] {
		&self.constraints
	}

	/// Resolves this universal against the list of actual argument types
	/// bound to it at one call site. Computes `candidate = meet(actuals)`,
	/// coerces a bare NULL candidate to `NULLABLE(NULL)`, and checks the
	/// candidate is concrete and satisfies every declared constraint.
	pub fn resolve(&self, actuals: &[Type]) -> Result<Type, Error> {
		let mut actuals = actuals.iter();
		let first = actuals.next().ok_or_else(|| Error::UnboundUniversal(self.alias.clone()))?;
		let mut candidate = first.clone();
		for actual in actuals {
			candidate = Type::meet(&candidate, actual).ok_or_else(|| Error::TypeError {
				node: format!("'{}", self.alias),
				message: format!("no common type for {candidate} and {actual}"),
			})?;
		}
		if candidate == Type::Null {
			candidate = Type::Null.nullable();
		}
		if !candidate.is_concrete() {
			return Err(Error::TypeError {
				node: format!("'{}", self.alias),
				message: format!("resolved to non-concrete type {candidate}"),
			});
		}
		for constraint in &self.constraints {
			if !candidate.promotes_to(constraint) {
				return Err(Error::UnresolvedUniversal {
					alias: self.alias.clone(),
					candidate,
					constraint: constraint.clone(),
				});
			}
		}
		Ok(candidate)
	}
}

impl fmt::Display for UniversalType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "'{}", self.alias)
	}
}

/// A per-expression (really, per call-site) substitution environment
/// threaded through type checking, mapping each universal encountered to
/// the concrete type it resolved to. Never mutates a [`UniversalType`] in
/// place (§9 design notes): resolution produces a new binding instead.
#[derive(Clone, Debug, Default)]
pub struct Substitution {
	bindings: HashMap<String, Type>,
}

impl Substitution {
	pub fn new() -> Self {
		Substitution::default()
	}

	pub fn bind(&mut self, universal: &UniversalType, concrete: Type) {
		self.bindings.insert(universal.alias().to_string(), concrete);
	}

	pub fn get(&self, universal: &UniversalType) -> Option<&Type> {
		self.bindings.get(universal.alias())
	}

	/// Substitutes a universal for its bound concrete type, or errors if
	/// the alias has no binding in this substitution.
	pub fn replace_universal(&self, universal: &UniversalType) -> Result<Type, Error> {
		self.get(universal).cloned().ok_or_else(|| Error::UnboundUniversal(universal.alias().to_string()))
	}

	/// Walks `ty`, replacing any [`Type::Universal`] it contains (including
	/// nested inside `NULLABLE`) with its bound concrete type.
	pub fn replace_in(&self, ty: &Type) -> Result<Type, Error> {
		match ty {
			Type::Universal(u) => self.replace_universal(u),
			Type::Nullable(inner) => Ok(self.replace_in(inner)?.nullable()),
			other => Ok(other.clone()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Typeclass;

	#[test]
	fn resolve_single_actual_returns_it() {
		let u = UniversalType::new("a", vec![Type::Typeclass(Typeclass::Any)]);
		assert_eq!(u.resolve(&[Type::Int]).unwrap(), Type::Int);
	}

	#[test]
	fn resolve_coerces_bare_null() {
		let u = UniversalType::new("a", vec![Type::Typeclass(Typeclass::Any)]);
		assert_eq!(u.resolve(&[Type::Null]).unwrap(), Type::Null.nullable());
	}

	#[test]
	fn resolve_fails_unsatisfied_constraint() {
		let u = UniversalType::new("a", vec![Type::Typeclass(Typeclass::Numeric)]);
		let err = u.resolve(&[Type::String]).unwrap_err();
		assert!(matches!(err, Error::UnresolvedUniversal { .. }));
	}

	#[test]
	fn different_aliases_independent_even_with_same_constraints() {
		let a = UniversalType::new("a", vec![Type::Typeclass(Typeclass::Numeric)]);
		let b = UniversalType::new("b", vec![Type::Typeclass(Typeclass::Numeric)]);
		assert_ne!(a, b);
	}

	#[test]
	fn same_alias_and_constraints_are_equal() {
		let a = UniversalType::new("a", vec![Type::Typeclass(Typeclass::Numeric)]);
		let b = UniversalType::new("a", vec![Type::Typeclass(Typeclass::Numeric)]);
		assert_eq!(a, b);
	}

	#[test]
	fn substitution_round_trip() {
		let u = UniversalType::new("a", vec![]);
		let mut sub = Substitution::new();
		sub.bind(&u, Type::Int);
		assert_eq!(sub.replace_universal(&u).unwrap(), Type::Int);
	}

	#[test]
	fn substitution_missing_alias_errors() {
		let u = UniversalType::new("a", vec![]);
		let sub = Substitution::new();
		assert!(matches!(sub.replace_universal(&u), Err(Error::UnboundUniversal(_))));
	}
}
