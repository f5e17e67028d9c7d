//! The type system: a closed set of primitive types, a `NULLABLE` wrapper,
//! a fixed promotion lattice, and the abstract typeclasses used only as
//! constraints on [`UniversalType`]s (§3, §4.1).
mod universal;

pub use universal::{Substitution, UniversalType};

use std::fmt;

/// An abstract constraint on a [`UniversalType`]. Typeclasses are sinks in
/// the promotion lattice: every concrete type promotes to the typeclasses it
/// satisfies, but a typeclass never promotes to anything and is never itself
/// instantiated as the type of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Typeclass {
	Numeric,
	Comparable,
	Any,
}

impl fmt::Display for Typeclass {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Typeclass::Numeric => write!(f, "TYPECLASS_NUMERIC"),
			Typeclass::Comparable => write!(f, "TYPECLASS_COMPARABLE"),
			Typeclass::Any => write!(f, "TYPECLASS_ANY"),
		}
	}
}

/// A type in the engine's expression language. Every expression node's
/// mutable type slot (§3) holds one of these; before type-checking finishes
/// it may hold [`Type::Universal`], which the checker replaces with a
/// concrete type or fails on (§4.1).
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum Type {
	Boolean,
	Int,
	BigInt,
	Float,
	Double,
	String,
	Timestamp,
	Timespan,
	Null,
	Nullable(Box<Type>),
	Typeclass(Typeclass),
	Universal(UniversalType),
}

impl fmt::Display for Type {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Type::Boolean => write!(f, "BOOLEAN"),
			Type::Int => write!(f, "INT"),
			Type::BigInt => write!(f, "BIGINT"),
			Type::Float => write!(f, "FLOAT"),
			Type::Double => write!(f, "DOUBLE"),
			Type::String => write!(f, "STRING"),
			Type::Timestamp => write!(f, "TIMESTAMP"),
			Type::Timespan => write!(f, "TIMESPAN"),
			Type::Null => write!(f, "NULL"),
			Type::Nullable(t) => write!(f, "NULLABLE({t})"),
			Type::Typeclass(t) => write!(f, "{t}"),
			Type::Universal(u) => write!(f, "'{}", u.alias()),
		}
	}
}

impl Type {
	pub fn nullable(self) -> Type {
		match self {
			// Nullable(Nullable(T)) collapses to Nullable(T): the wrapper is
			// idempotent, there's no reason to track nesting depth.
			Type::Nullable(_) => self,
			t => Type::Nullable(Box::new(t)),
		}
	}

	/// True for the nine primitive type names, including NULL.
	pub fn is_primitive(&self) -> bool {
		matches!(
			self,
			Type::Boolean
				| Type::Int | Type::BigInt
				| Type::Float | Type::Double
				| Type::String
				| Type::Timestamp
				| Type::Timespan
				| Type::Null
		)
	}

	/// True for INT, BIGINT, FLOAT, DOUBLE, and NULLABLE wrappers of them.
	pub fn is_numeric(&self) -> bool {
		match self {
			Type::Int | Type::BigInt | Type::Float | Type::Double => true,
			Type::Nullable(inner) => inner.is_numeric(),
			_ => false,
		}
	}

	pub fn is_nullable(&self) -> bool {
		matches!(self, Type::Nullable(_))
	}

	/// True if this type is neither a typeclass nor an unresolved universal.
	/// A universal must resolve to a concrete type before expression
	/// evaluation (§3 invariants).
	pub fn is_concrete(&self) -> bool {
		match self {
			Type::Typeclass(_) | Type::Universal(_) => false,
			Type::Nullable(inner) => inner.is_concrete(),
			_ => true,
		}
	}

	/// Direct upper neighbours of this type in the promotion lattice, not
	/// including typeclass membership (handled separately in
	/// [`Type::promotes_to`]) and not including `self`.
	fn direct_promotions(&self) -> Vec<Type> {
		match self {
			Type::Int => vec![Type::BigInt, Type::Int.nullable()],
			Type::BigInt => vec![Type::Double, Type::BigInt.nullable()],
			Type::Float => vec![Type::Double, Type::Float.nullable()],
			Type::Double => vec![Type::Double.nullable()],
			Type::Boolean => vec![Type::Boolean.nullable()],
			Type::String => vec![Type::String.nullable()],
			Type::Timestamp => vec![Type::Timestamp.nullable()],
			Type::Timespan => vec![Type::Timespan.nullable()],
			// NULL promotes to NULLABLE(T) for every concrete primitive T.
			Type::Null => ALL_PRIMITIVES
				.iter()
				.filter(|t| **t != Type::Null)
				.map(|t| t.clone().nullable())
				.collect(),
			Type::Nullable(inner) => {
				// Lifted promotion: if T promotes to U then NULLABLE(T)
				// promotes to NULLABLE(U).
				inner.direct_promotions().into_iter().map(Type::nullable).collect()
			}
			Type::Typeclass(_) | Type::Universal(_) => vec![],
		}
	}

	/// The reflexive-transitive closure of [`Type::direct_promotions`]:
	/// every type `self` can promote to, including itself.
	fn promotion_closure(&self) -> Vec<Type> {
		let mut seen = vec![self.clone()];
		let mut frontier = vec![self.clone()];
		while let Some(next) = frontier.pop() {
			for candidate in next.direct_promotions() {
				if !seen.contains(&candidate) {
					seen.push(candidate.clone());
					frontier.push(candidate);
				}
			}
		}
		seen
	}

	/// Whether a value of type `self` may be used where `other` is expected.
	/// A partial order: reflexive, antisymmetric and transitive across
	/// primitives, with typeclasses as additional sinks reachable only
	/// through constraint satisfaction rather than the promotion graph.
	pub fn promotes_to(&self, other: &Type) -> bool {
		if self == other {
			return true;
		}
		match other {
			Type::Typeclass(Typeclass::Any) => true,
			Type::Typeclass(Typeclass::Numeric) => self.is_numeric(),
			Type::Typeclass(Typeclass::Comparable) => self.is_concrete(),
			_ => self.promotion_closure().contains(other),
		}
	}

	/// The least upper bound of `a` and `b` in the promotion lattice, or
	/// `None` if they have no common concrete upper bound. Commutative and
	/// associative on concrete primitives (§8).
	pub fn meet(a: &Type, b: &Type) -> Option<Type> {
		if a == b {
			return Some(a.clone());
		}
		let ca = a.promotion_closure();
		let cb = b.promotion_closure();
		let common: Vec<&Type> = ca.iter().filter(|t| cb.contains(t)).collect();
		// The meet is the element of the intersection that every other
		// element of the intersection is reachable from - the tightest
		// common upper bound.
		common
			.iter()
			.find(|candidate| common.iter().all(|other| candidate.promotes_to(other)))
			.map(|t| (*t).clone())
	}
}

const ALL_PRIMITIVES: [Type; 9] = [
	Type::Boolean,
	Type::Int,
	Type::BigInt,
	Type::Float,
	Type::Double,
	Type::String,
	Type::Timestamp,
	Type::Timespan,
	Type::Null,
];
