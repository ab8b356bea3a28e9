use crate::error::Error;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// An item as the application sees it: attribute name to native value.
pub type Item = HashMap<String, Value>;

/// Exponents beyond this are far outside what the service stores.
const MAX_EXPONENT: i64 = 1000;

/// A decimal number kept as canonical decimal text.
///
/// Precision is whatever the text carries, so values that do not fit a
/// machine double survive a round trip unchanged. Numerically equal inputs
/// such as `1`, `1.0` and `1e0` become the same number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Number(String);

impl Number {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Lossy for values with more precision than a double.
    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }

    /// Canonical text of a decimal literal, or `None` if it is not one.
    ///
    /// The exponent is folded into the digits, leading integer zeros and
    /// trailing fraction zeros are dropped, and zero carries no sign. Equal
    /// values therefore have equal text.
    fn canonical(text: &str) -> Option<String> {
        let (negative, unsigned) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };
        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(at) => (&unsigned[..at], Some(&unsigned[at + 1..])),
            None => (unsigned, None),
        };
        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));

        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if int_part.len() + frac_part.len() == 0 || !all_digits(int_part) || !all_digits(frac_part) {
            return None;
        }
        let exponent: i64 = match exponent {
            Some(e) => {
                let digits = e.strip_prefix(['+', '-']).unwrap_or(e);
                if digits.is_empty() || !all_digits(digits) {
                    return None;
                }
                e.parse().ok().filter(|e: &i64| e.abs() <= MAX_EXPONENT)?
            }
            None => 0,
        };

        let digits = [int_part, frac_part].concat();
        let Some(first) = digits.bytes().position(|b| b != b'0') else {
            return Some("0".to_string());
        };
        let last = digits.bytes().rposition(|b| b != b'0').map_or(first, |p| p) + 1;
        let significant = &digits[first..last];
        // decimal point position relative to the first significant digit
        let point = int_part.len() as i64 + exponent - first as i64;

        let mut out = String::with_capacity(significant.len() + 4);
        if negative {
            out.push('-');
        }
        if point <= 0 {
            out.push_str("0.");
            out.extend(std::iter::repeat('0').take(point.unsigned_abs() as usize));
            out.push_str(significant);
        } else if point as usize >= significant.len() {
            out.push_str(significant);
            out.extend(std::iter::repeat('0').take(point as usize - significant.len()));
        } else {
            let (int_digits, frac_digits) = significant.split_at(point as usize);
            out.push_str(int_digits);
            out.push('.');
            out.push_str(frac_digits);
        }
        Some(out)
    }
}

impl FromStr for Number {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::canonical(s.trim())
            .map(Self)
            .ok_or_else(|| Error::serialization(format!("'{s}' is not a decimal number")))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! number_from_integer {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Number {
                fn from(n: $t) -> Self {
                    Number(n.to_string())
                }
            }

            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(Number::from(n))
                }
            }
        )*
    };
}

number_from_integer!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl TryFrom<f64> for Number {
    type Error = Error;

    /// Uses the shortest representation that reads back as the same double,
    /// so `0.1` becomes `"0.1"` rather than its binary expansion.
    fn try_from(n: f64) -> Result<Self, Self::Error> {
        if n.is_finite() {
            n.to_string().parse()
        } else {
            Err(Error::serialization(format!("{n} cannot be represented as a number attribute")))
        }
    }
}

impl TryFrom<f32> for Number {
    type Error = Error;

    fn try_from(n: f32) -> Result<Self, Self::Error> {
        if n.is_finite() {
            n.to_string().parse()
        } else {
            Err(Error::serialization(format!("{n} cannot be represented as a number attribute")))
        }
    }
}

/// Native attribute value.
///
/// Sets are typed, so a set can only ever hold one element kind. Use
/// [`Value::set_of`] to build a set from loosely typed values; it rejects
/// mixed kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Number(Number),
    Binary(Vec<u8>),
    Bool(bool),
    Null,
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    StringSet(BTreeSet<String>),
    NumberSet(BTreeSet<Number>),
    BinarySet(BTreeSet<Vec<u8>>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Binary(_) => "binary",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::StringSet(_) => "string set",
            Value::NumberSet(_) => "number set",
            Value::BinarySet(_) => "binary set",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Build a homogeneous set from scalar values.
    ///
    /// All elements must be strings, all numbers, or all binary. Mixed kinds,
    /// nulls, non-scalars and empty input are rejected.
    pub fn set_of<I>(values: I) -> Result<Value, Error>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut values = values.into_iter();
        let first = values
            .next()
            .ok_or_else(|| Error::serialization("a set must contain at least one element"))?;

        let mixed = |expected: &str, found: &Value| {
            Error::serialization(format!(
                "set elements must share one kind: expected {expected}, found {}",
                found.type_name()
            ))
        };

        match first {
            Value::String(s) => {
                let mut set = BTreeSet::from([s]);
                for v in values {
                    match v {
                        Value::String(s) => {
                            set.insert(s);
                        }
                        other => return Err(mixed("string", &other)),
                    }
                }
                Ok(Value::StringSet(set))
            }
            Value::Number(n) => {
                let mut set = BTreeSet::from([n]);
                for v in values {
                    match v {
                        Value::Number(n) => {
                            set.insert(n);
                        }
                        other => return Err(mixed("number", &other)),
                    }
                }
                Ok(Value::NumberSet(set))
            }
            Value::Binary(b) => {
                let mut set = BTreeSet::from([b]);
                for v in values {
                    match v {
                        Value::Binary(b) => {
                            set.insert(b);
                        }
                        other => return Err(mixed("binary", &other)),
                    }
                }
                Ok(Value::BinarySet(set))
            }
            other => Err(Error::serialization(format!(
                "{} values cannot be members of a set",
                other.type_name()
            ))),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Binary(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::List(values)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<BTreeSet<String>> for Value {
    fn from(set: BTreeSet<String>) -> Self {
        Value::StringSet(set)
    }
}

impl From<BTreeSet<Number>> for Value {
    fn from(set: BTreeSet<Number>) -> Self {
        Value::NumberSet(set)
    }
}

impl From<BTreeSet<Vec<u8>>> for Value {
    fn from(set: BTreeSet<Vec<u8>>) -> Self {
        Value::BinarySet(set)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
