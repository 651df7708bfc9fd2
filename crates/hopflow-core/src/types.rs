//! Row values. A `Row` is a fixed-arity sequence of `Value`s interpreted
//! against the `RowSchema` active on the hop it travels through.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::ValueType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Number(f64),
    /// Milliseconds since the Unix epoch (UTC).
    Date(i64),
    Boolean(bool),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type this value carries, or `None` for `Null`.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(ValueType::String),
            Value::Integer(_) => Some(ValueType::Integer),
            Value::Number(_) => Some(ValueType::Number),
            Value::Date(_) => Some(ValueType::Date),
            Value::Boolean(_) => Some(ValueType::Boolean),
            Value::Binary(_) => Some(ValueType::Binary),
        }
    }

    /// True when this value may sit in a field of type `ty`.
    pub fn fits(&self, ty: ValueType) -> bool {
        self.value_type().map_or(true, |t| t == ty)
    }

    /// Parse text into a value of the given type. Empty text becomes `Null`.
    pub fn parse_as(ty: ValueType, text: &str) -> Result<Value, String> {
        if text.is_empty() {
            return Ok(Value::Null);
        }
        let t = text.trim();
        match ty {
            ValueType::String => Ok(Value::String(text.to_string())),
            ValueType::Integer => t
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| format!("cannot parse '{text}' as Integer")),
            ValueType::Number => t
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| format!("cannot parse '{text}' as Number")),
            ValueType::Date => t
                .parse::<i64>()
                .map(Value::Date)
                .map_err(|_| format!("cannot parse '{text}' as Date (epoch millis)")),
            ValueType::Boolean => match t.to_ascii_lowercase().as_str() {
                "true" | "y" | "yes" | "1" => Ok(Value::Boolean(true)),
                "false" | "n" | "no" | "0" => Ok(Value::Boolean(false)),
                _ => Err(format!("cannot parse '{text}' as Boolean")),
            },
            ValueType::Binary => Ok(Value::Binary(text.as_bytes().to_vec())),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) | Value::Date(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Binary(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// One row of data. Owned by exactly one step unit at a time; ownership moves
/// into a row queue on `put` and out again on `get`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn nulls(len: usize) -> Self {
        Self(vec![Value::Null; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    pub fn set(&mut self, idx: usize, value: Value) -> bool {
        match self.0.get_mut(idx) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&mut self, value: Value) {
        self.0.push(value);
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    /// Resize to `len`, padding with `Null` or truncating.
    pub fn resized(mut self, len: usize) -> Self {
        self.0.resize(len, Value::Null);
        self
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Compare two values for sorting and predicate evaluation.
///
/// Nulls are sorted first, Integer and Number compare numerically, other
/// mixed types order by type.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    use Value::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,
        (Boolean(x), Boolean(y)) => x.cmp(y),
        (Integer(x), Integer(y)) => x.cmp(y),
        (Date(x), Date(y)) => x.cmp(y),
        (Number(x), Number(y)) => cmp_f64(*x, *y),
        (Integer(x), Number(y)) => cmp_f64(*x as f64, *y),
        (Number(x), Integer(y)) => cmp_f64(*x, *y as f64),
        (String(x), String(y)) => x.cmp(y),
        (Binary(x), Binary(y)) => x.cmp(y),
        _ => type_order(a).cmp(&type_order(b)),
    }
}

fn cmp_f64(x: f64, y: f64) -> Ordering {
    if x.is_nan() && y.is_nan() {
        Ordering::Equal
    } else if x.is_nan() {
        Ordering::Greater
    } else if y.is_nan() {
        Ordering::Less
    } else {
        x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
}

/// Assign a numeric order to value types for mixed-type comparisons and hashing.
fn type_order(v: &Value) -> u8 {
    use Value::*;
    match v {
        Null => 0,
        Boolean(_) => 1,
        Integer(_) => 2,
        Number(_) => 3,
        Date(_) => 4,
        String(_) => 5,
        Binary(_) => 6,
    }
}

/// Feed a value into a hasher. Type discriminant first, then the payload.
pub fn hash_value(value: &Value, hasher: &mut blake3::Hasher) {
    use Value::*;

    hasher.update(&[type_order(value)]);

    match value {
        Null => {}
        Boolean(b) => {
            hasher.update(&[*b as u8]);
        }
        Integer(i) | Date(i) => {
            hasher.update(&i.to_le_bytes());
        }
        Number(f) => {
            hasher.update(&f.to_bits().to_le_bytes());
        }
        String(s) => {
            // Length prefix keeps ("ab","c") and ("a","bc") apart.
            hasher.update(&(s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        Binary(b) => {
            hasher.update(&(b.len() as u64).to_le_bytes());
            hasher.update(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_as_handles_empty_and_bad_input() {
        assert_eq!(Value::parse_as(ValueType::Integer, ""), Ok(Value::Null));
        assert_eq!(
            Value::parse_as(ValueType::Integer, " 42 "),
            Ok(Value::Integer(42))
        );
        assert!(Value::parse_as(ValueType::Number, "x1").is_err());
        assert_eq!(
            Value::parse_as(ValueType::Boolean, "Yes"),
            Ok(Value::Boolean(true))
        );
    }

    #[test]
    fn nulls_sort_first_and_numbers_mix() {
        assert_eq!(
            compare_values(&Value::Null, &Value::Integer(0)),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&Value::Integer(2), &Value::Number(1.5)),
            Ordering::Greater
        );
    }

    #[test]
    fn null_fits_any_type() {
        assert!(Value::Null.fits(ValueType::Date));
        assert!(!Value::Integer(1).fits(ValueType::String));
    }
}
