//! Value Type Inference
//!
//! Classifies attribute values and element text into a small join
//! semilattice and widens the classification as more values are observed.
//!
//! ```text
//!            String
//!           /      \
//!      Decimal    Boolean
//!         |          |
//!      Integer       |
//!           \       /
//!            Unknown
//! ```
//!
//! `Unknown` is the state of a slot that has only seen empty values. The
//! join is commutative and associative, so folding `classify` over any
//! permutation of the same values gives the same result.

use serde::{Deserialize, Serialize};

/// Classification of a value slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Nothing but empty values seen so far
    #[default]
    Unknown,
    Boolean,
    Integer,
    Decimal,
    String,
}

impl ValueType {
    /// Most specific type accepting a single, already trimmed, non-empty value
    pub fn of(value: &str) -> ValueType {
        if value.is_empty() {
            return ValueType::Unknown;
        }
        if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
            return ValueType::Boolean;
        }
        if !looks_numeric(value) || has_leading_zero(value) {
            return ValueType::String;
        }
        if value.parse::<i64>().is_ok() {
            return ValueType::Integer;
        }
        match value.parse::<f64>() {
            Ok(v) if v.is_finite() => ValueType::Decimal,
            _ => ValueType::String,
        }
    }

    /// Least upper bound of two classifications
    pub fn join(self, other: ValueType) -> ValueType {
        use ValueType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Unknown, x) | (x, Unknown) => x,
            (String, _) | (_, String) => String,
            (Integer, Decimal) | (Decimal, Integer) => Decimal,
            // Boolean against either numeric type: nothing below String holds both
            _ => String,
        }
    }

    /// Type used when rendering: a slot that never held a value is a string
    pub fn resolved(self) -> ValueType {
        match self {
            ValueType::Unknown => ValueType::String,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Unknown => "unknown",
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Decimal => "decimal",
            ValueType::String => "string",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifier applying the configured inference mode
#[derive(Debug, Clone, Copy)]
pub struct TypeInference {
    use_types: bool,
}

impl TypeInference {
    pub fn new(use_types: bool) -> Self {
        Self { use_types }
    }

    /// Classifier that types everything as a string
    pub fn strings_only() -> Self {
        Self::new(false)
    }

    pub fn uses_types(&self) -> bool {
        self.use_types
    }

    /// Widen `current` so it also accepts `value`
    pub fn classify(&self, current: ValueType, value: &str) -> ValueType {
        if !self.use_types {
            return ValueType::String;
        }
        let value = value.trim();
        if value.is_empty() {
            return current;
        }
        current.join(ValueType::of(value))
    }

    /// Fold a sequence of observations starting from `Unknown`
    pub fn classify_all<'a, I>(&self, values: I) -> ValueType
    where
        I: IntoIterator<Item = &'a str>,
    {
        values
            .into_iter()
            .fold(ValueType::Unknown, |acc, v| self.classify(acc, v))
    }
}

fn looks_numeric(value: &str) -> bool {
    value.bytes().any(|b| b.is_ascii_digit())
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}

/// `01`, `-007` and `00.5` read as identifiers (zip codes and the like)
fn has_leading_zero(value: &str) -> bool {
    let unsigned = value.trim_start_matches(['+', '-']);
    let integer_part = unsigned
        .split(['.', 'e', 'E'])
        .next()
        .unwrap_or_default();
    integer_part.len() > 1 && integer_part.starts_with('0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed() -> TypeInference {
        TypeInference::new(true)
    }

    #[test]
    fn test_single_value_classification() {
        assert_eq!(ValueType::of("true"), ValueType::Boolean);
        assert_eq!(ValueType::of("FALSE"), ValueType::Boolean);
        assert_eq!(ValueType::of("42"), ValueType::Integer);
        assert_eq!(ValueType::of("-7"), ValueType::Integer);
        assert_eq!(ValueType::of("0"), ValueType::Integer);
        assert_eq!(ValueType::of("3.25"), ValueType::Decimal);
        assert_eq!(ValueType::of("0.5"), ValueType::Decimal);
        assert_eq!(ValueType::of("1e3"), ValueType::Decimal);
        assert_eq!(ValueType::of("hello"), ValueType::String);
        assert_eq!(ValueType::of("1.2.3"), ValueType::String);
        assert_eq!(ValueType::of("--1"), ValueType::String);
    }

    #[test]
    fn test_leading_zero_is_string() {
        assert_eq!(ValueType::of("01"), ValueType::String);
        assert_eq!(ValueType::of("-007"), ValueType::String);
        assert_eq!(ValueType::of("00.5"), ValueType::String);
        assert_eq!(ValueType::of("02134"), ValueType::String);
    }

    #[test]
    fn test_integer_overflow_widens_to_decimal() {
        assert_eq!(ValueType::of("99999999999999999999"), ValueType::Decimal);
    }

    #[test]
    fn test_widening_never_narrows() {
        let inf = typed();
        let t = inf.classify(ValueType::Unknown, "12");
        assert_eq!(t, ValueType::Integer);
        let t = inf.classify(t, "abc");
        assert_eq!(t, ValueType::String);
        let t = inf.classify(t, "13");
        assert_eq!(t, ValueType::String);
    }

    #[test]
    fn test_integer_then_decimal() {
        let inf = typed();
        assert_eq!(inf.classify_all(["1", "2.5", "3"]), ValueType::Decimal);
    }

    #[test]
    fn test_boolean_and_numbers_join_to_string() {
        let inf = typed();
        assert_eq!(inf.classify_all(["true", "5"]), ValueType::String);
        assert_eq!(inf.classify_all(["5", "true"]), ValueType::String);
    }

    #[test]
    fn test_empty_values_do_not_promote() {
        let inf = typed();
        assert_eq!(inf.classify_all(["", "  ", "4"]), ValueType::Integer);
        assert_eq!(inf.classify(ValueType::Boolean, ""), ValueType::Boolean);
        assert_eq!(inf.classify_all([""]), ValueType::Unknown);
        assert_eq!(ValueType::Unknown.resolved(), ValueType::String);
    }

    #[test]
    fn test_strings_only_mode() {
        let inf = TypeInference::strings_only();
        assert_eq!(inf.classify(ValueType::Unknown, "1"), ValueType::String);
        assert_eq!(inf.classify(ValueType::Unknown, ""), ValueType::String);
    }

    #[test]
    fn test_order_independence() {
        let inf = typed();
        let values = ["1", "", "2.5", "7", "-3"];
        let expected = inf.classify_all(values);

        // Every rotation and the reverse of the sequence
        for shift in 0..values.len() {
            let mut rotated = values.to_vec();
            rotated.rotate_left(shift);
            assert_eq!(inf.classify_all(rotated.iter().copied()), expected);
            rotated.reverse();
            assert_eq!(inf.classify_all(rotated.iter().copied()), expected);
        }
    }

    #[test]
    fn test_join_is_commutative_and_associative() {
        use ValueType::*;
        let all = [Unknown, Boolean, Integer, Decimal, String];
        for a in all {
            for b in all {
                assert_eq!(a.join(b), b.join(a));
                for c in all {
                    assert_eq!(a.join(b).join(c), a.join(b.join(c)));
                }
            }
        }
    }
}
