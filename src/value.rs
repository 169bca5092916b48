//! Typed field values.
//!
//! Fields arrive as strings and are coerced once into a [`Value`]. Two
//! coercion rules exist and they deliberately differ:
//!
//! - [`Value::coerce`] is used for projection, sorting and selection. Digit
//!   strings (optionally with a leading `-`) become integers, anything else
//!   that parses as a float becomes a float, the rest stays a string.
//! - [`Value::parse_stat`] is used by the statistics accumulator. A field
//!   containing `.` must parse as a float, any other field must parse as an
//!   integer; otherwise the field is not numeric.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl Value {
    /// Coerce a raw field for projection and comparison.
    pub fn coerce(raw: &str) -> Value {
        if is_integer_literal(raw)
            && let Ok(i) = raw.parse::<i64>()
        {
            return Value::Int(i);
        }
        match raw.trim().parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => Value::Str(raw.to_string()),
        }
    }

    /// Classify a raw field for the running column sums.
    ///
    /// Returns `None` when the field breaks the column's numeric run.
    pub fn parse_stat(raw: &str) -> Option<Value> {
        let trimmed = raw.trim();
        if trimmed.contains('.') {
            trimmed.parse::<f64>().ok().map(Value::Float)
        } else {
            trimmed.parse::<i64>().ok().map(Value::Int)
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Value::Str(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(_) => None,
        }
    }

    /// Numeric addition; integers stay integers until a float joins in.
    ///
    /// Returns `None` if either side is a string.
    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(
                a.checked_add(*b)
                    .map(Value::Int)
                    .unwrap_or(Value::Float(*a as f64 + *b as f64)),
            ),
            _ => Some(Value::Float(self.as_f64()? + other.as_f64()?)),
        }
    }

    /// Total order used for sort keys.
    ///
    /// Numbers compare numerically and sort before strings; strings compare
    /// lexicographically.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Str(_), _) => Ordering::Greater,
            (_, Value::Str(_)) => Ordering::Less,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            _ => {
                let a = self.as_f64().unwrap_or_default();
                let b = other.as_f64().unwrap_or_default();
                a.total_cmp(&b)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => f.write_str(&format_float(*x)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

/// `123` or `-123`, nothing else.
fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Floats always carry a decimal point so they read back as floats.
pub fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_integers() {
        assert_eq!(Value::coerce("42"), Value::Int(42));
        assert_eq!(Value::coerce("-7"), Value::Int(-7));
        assert_eq!(Value::coerce("007"), Value::Int(7));
    }

    #[test]
    fn test_coerce_floats_and_strings() {
        assert_eq!(Value::coerce("2.5"), Value::Float(2.5));
        assert_eq!(Value::coerce("1e3"), Value::Float(1000.0));
        assert_eq!(Value::coerce("abc"), Value::Str("abc".to_string()));
        assert_eq!(Value::coerce(""), Value::Str(String::new()));
        assert_eq!(Value::coerce("-"), Value::Str("-".to_string()));
    }

    #[test]
    fn test_parse_stat_rules() {
        assert_eq!(Value::parse_stat("3"), Some(Value::Int(3)));
        assert_eq!(Value::parse_stat("3.5"), Some(Value::Float(3.5)));
        // Scientific notation without a dot is not an integer.
        assert_eq!(Value::parse_stat("1e3"), None);
        assert_eq!(Value::parse_stat("x"), None);
        assert_eq!(Value::parse_stat("1.2.3"), None);
    }

    #[test]
    fn test_checked_add_promotes() {
        let sum = Value::Int(2).checked_add(&Value::Int(3)).unwrap();
        assert_eq!(sum, Value::Int(5));
        let sum = Value::Int(2).checked_add(&Value::Float(0.5)).unwrap();
        assert_eq!(sum, Value::Float(2.5));
        assert!(Value::Int(1).checked_add(&Value::from("a")).is_none());
    }

    #[test]
    fn test_sort_cmp_numbers_before_strings() {
        assert_eq!(Value::Int(10).sort_cmp(&Value::Int(9)), Ordering::Greater);
        assert_eq!(Value::Int(1).sort_cmp(&Value::Float(1.5)), Ordering::Less);
        assert_eq!(Value::Float(3.0).sort_cmp(&Value::from("a")), Ordering::Less);
        assert_eq!(Value::from("b").sort_cmp(&Value::from("a")), Ordering::Greater);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Int(-4).to_string(), "-4");
        assert_eq!(Value::from("x").to_string(), "x");
    }
}
