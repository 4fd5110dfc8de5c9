//! Filter predicates
//!
//! `P` tests a single value. Equality is numeric-aware: a `Long` 29 equals a
//! `Double` 29.0. Ordering predicates only hold between comparable values;
//! comparing a string with a number is simply false.

use std::cmp::Ordering;
use std::fmt;

use factgraph_core::Value;

/// A predicate over property, id or label values
#[derive(Debug, Clone, PartialEq)]
pub enum P {
    /// Equal to
    Eq(Value),
    /// Not equal to
    Neq(Value),
    /// Less than
    Lt(Value),
    /// Less than or equal to
    Lte(Value),
    /// Greater than
    Gt(Value),
    /// Greater than or equal to
    Gte(Value),
    /// Equal to one of
    Within(Vec<Value>),
    /// Equal to none of
    Without(Vec<Value>),
    /// Both hold
    And(Box<P>, Box<P>),
    /// Either holds
    Or(Box<P>, Box<P>),
    /// Negation
    Not(Box<P>),
}

fn equal(a: &Value, b: &Value) -> bool {
    a == b || a.compare(b) == Some(Ordering::Equal)
}

impl P {
    /// Shorthand for `P::Eq`
    pub fn eq(value: impl Into<Value>) -> Self {
        P::Eq(value.into())
    }

    /// Shorthand for `P::Gt`
    pub fn gt(value: impl Into<Value>) -> Self {
        P::Gt(value.into())
    }

    /// Shorthand for `P::Lt`
    pub fn lt(value: impl Into<Value>) -> Self {
        P::Lt(value.into())
    }

    /// Shorthand for `P::Within`
    pub fn within<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        P::Within(values.into_iter().map(Into::into).collect())
    }

    /// Conjunction with `other`
    pub fn and(self, other: P) -> Self {
        P::And(Box::new(self), Box::new(other))
    }

    /// Disjunction with `other`
    pub fn or(self, other: P) -> Self {
        P::Or(Box::new(self), Box::new(other))
    }

    /// Negation
    pub fn negate(self) -> Self {
        P::Not(Box::new(self))
    }

    /// Evaluate against a value
    pub fn test(&self, value: &Value) -> bool {
        let ordered = |bound: &Value, accept: fn(Ordering) -> bool| {
            value.compare(bound).map_or(false, accept)
        };
        match self {
            P::Eq(v) => equal(value, v),
            P::Neq(v) => !equal(value, v),
            P::Lt(v) => ordered(v, Ordering::is_lt),
            P::Lte(v) => ordered(v, Ordering::is_le),
            P::Gt(v) => ordered(v, Ordering::is_gt),
            P::Gte(v) => ordered(v, Ordering::is_ge),
            P::Within(vs) => vs.iter().any(|v| equal(value, v)),
            P::Without(vs) => !vs.iter().any(|v| equal(value, v)),
            P::And(a, b) => a.test(value) && b.test(value),
            P::Or(a, b) => a.test(value) || b.test(value),
            P::Not(p) => !p.test(value),
        }
    }

    /// The value of an exact equality, if this is one
    pub fn as_eq(&self) -> Option<&Value> {
        match self {
            P::Eq(v) => Some(v),
            _ => None,
        }
    }

    /// Split top-level conjunctions into their parts
    pub fn conjuncts(self) -> Vec<P> {
        match self {
            P::And(a, b) => {
                let mut parts = a.conjuncts();
                parts.extend(b.conjuncts());
                parts
            }
            p => vec![p],
        }
    }
}

macro_rules! eq_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for P {
                fn from(value: $ty) -> Self {
                    P::Eq(value.into())
                }
            }
        )*
    };
}

// a bare value in `has(key, value)` means equality
eq_from!(Value, &str, String, bool, i32, i64, f64, uuid::Uuid);

impl fmt::Display for P {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |vs: &[Value]| {
            vs.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            P::Eq(v) => write!(f, "eq({})", v),
            P::Neq(v) => write!(f, "neq({})", v),
            P::Lt(v) => write!(f, "lt({})", v),
            P::Lte(v) => write!(f, "lte({})", v),
            P::Gt(v) => write!(f, "gt({})", v),
            P::Gte(v) => write!(f, "gte({})", v),
            P::Within(vs) => write!(f, "within([{}])", list(vs)),
            P::Without(vs) => write!(f, "without([{}])", list(vs)),
            P::And(a, b) => write!(f, "and({}, {})", a, b),
            P::Or(a, b) => write!(f, "or({}, {})", a, b),
            P::Not(p) => write!(f, "not({})", p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_equality_across_types() {
        assert!(P::eq(29i64).test(&Value::Double(29.0)));
        assert!(!P::eq(29i64).test(&Value::from("29")));
        assert!(P::Neq(Value::from("a")).test(&Value::from("b")));
    }

    #[test]
    fn test_ranges() {
        assert!(P::gt(30i64).test(&Value::Long(32)));
        assert!(!P::gt(32i64).test(&Value::Long(32)));
        assert!(P::Gte(Value::Long(32)).test(&Value::Long(32)));
        assert!(P::lt(1.5f64).test(&Value::Long(1)));
        // incomparable types never match an ordering predicate
        assert!(!P::lt(10i64).test(&Value::from("a")));
    }

    #[test]
    fn test_membership_and_connectives() {
        let p = P::within(["java", "rust"]);
        assert!(p.test(&Value::from("rust")));
        assert!(!P::Without(vec![Value::from("rust")]).test(&Value::from("rust")));

        let range = P::gt(10i64).and(P::lt(20i64));
        assert!(range.test(&Value::Long(15)));
        assert!(!range.test(&Value::Long(25)));
        assert!(P::eq(1i64).or(P::eq(2i64)).test(&Value::Long(2)));
        assert!(P::eq(1i64).negate().test(&Value::Long(2)));
    }

    #[test]
    fn test_conjuncts() {
        let p = P::gt(31i64).and(P::lt(10i64)).and(P::eq(5i64));
        assert_eq!(
            p.conjuncts(),
            vec![P::gt(31i64), P::lt(10i64), P::eq(5i64)]
        );
        assert_eq!(P::gt(1i64).or(P::lt(0i64)).conjuncts().len(), 1);
    }

    #[test]
    fn test_bare_value_is_equality() {
        assert_eq!(P::from("marko"), P::eq("marko"));
        assert_eq!(P::from(29i64), P::Eq(Value::Long(29)));
    }

    #[test]
    fn test_display() {
        assert_eq!(P::within([1i64, 2]).to_string(), "within([1, 2])");
        assert_eq!(P::eq("marko").negate().to_string(), "not(eq(\"marko\"))");
    }
}
