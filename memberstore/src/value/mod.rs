use crate::error::{Result, StoreError};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::ToSql;
use serde::Serialize;
use std::fmt;

/// The tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Null,
    Text,
    Integer,
    Real,
    Boolean,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Null => "null",
            ValueType::Text => "text",
            ValueType::Integer => "integer",
            ValueType::Real => "real",
            ValueType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A scalar crossing the boundary between typed application code and the
/// engine. Statement parameters go in as values and columns come out as values.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Text(_) => ValueType::Text,
            Value::Integer(_) => ValueType::Integer,
            Value::Real(_) => ValueType::Real,
            Value::Boolean(_) => ValueType::Boolean,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Result<&str> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(other.mismatch(ValueType::Text)),
        }
    }

    /// Read as an integer. Booleans read as 0 or 1.
    pub fn as_integer(&self) -> Result<i64> {
        match self {
            Value::Integer(n) => Ok(*n),
            Value::Boolean(b) => Ok(i64::from(*b)),
            other => Err(other.mismatch(ValueType::Integer)),
        }
    }

    /// Read as a real. Integers are not widened; use [`Value::as_integer`].
    pub fn as_real(&self) -> Result<f64> {
        match self {
            Value::Real(f) => Ok(*f),
            other => Err(other.mismatch(ValueType::Real)),
        }
    }

    /// Read as a boolean. Integers read as `true` when non-zero.
    pub fn as_boolean(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Integer(n) => Ok(*n != 0),
            other => Err(other.mismatch(ValueType::Boolean)),
        }
    }

    fn mismatch(&self, expected: ValueType) -> StoreError {
        StoreError::TypeMismatch {
            expected,
            actual: self.value_type(),
        }
    }

    /// Convert a value stored by the engine into the requested type.
    ///
    /// Engine NULL always yields [`Value::Null`]. Otherwise the conversion
    /// follows SQLite's column accessor rules: numbers cast between integer
    /// and real, text is parsed as a number (0 when it does not parse),
    /// numbers render as text, and a boolean is any non-zero integer.
    pub(crate) fn from_engine(stored: &SqlValue, expected: ValueType) -> Value {
        if matches!(stored, SqlValue::Null) {
            return Value::Null;
        }
        match expected {
            ValueType::Null => Value::Null,
            ValueType::Text => Value::Text(engine_text(stored)),
            ValueType::Integer => Value::Integer(engine_integer(stored)),
            ValueType::Real => Value::Real(engine_real(stored)),
            ValueType::Boolean => Value::Boolean(engine_integer(stored) != 0),
        }
    }

    /// Convert a stored value using only its storage class, with an optional
    /// type hint from the column's declared type.
    pub(crate) fn from_stored(stored: ValueRef<'_>, hint: Option<ValueType>) -> Value {
        let owned = SqlValue::from(stored);
        match (&owned, hint) {
            (SqlValue::Null, _) => Value::Null,
            (_, Some(expected)) => Value::from_engine(&owned, expected),
            (SqlValue::Integer(n), None) => Value::Integer(*n),
            (SqlValue::Real(f), None) => Value::Real(*f),
            (SqlValue::Text(s), None) => Value::Text(s.clone()),
            (SqlValue::Blob(_), None) => Value::Text(engine_text(&owned)),
        }
    }
}

fn engine_text(stored: &SqlValue) -> String {
    match stored {
        SqlValue::Null => String::new(),
        SqlValue::Integer(n) => n.to_string(),
        SqlValue::Real(f) => format_real(*f),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

fn engine_integer(stored: &SqlValue) -> i64 {
    match stored {
        SqlValue::Null | SqlValue::Blob(_) => 0,
        SqlValue::Integer(n) => *n,
        SqlValue::Real(f) => *f as i64,
        SqlValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| parse_number(s).map(|f| f as i64))
            .unwrap_or(0),
    }
}

fn engine_real(stored: &SqlValue) -> f64 {
    match stored {
        SqlValue::Null | SqlValue::Blob(_) => 0.0,
        SqlValue::Integer(n) => *n as f64,
        SqlValue::Real(f) => *f,
        SqlValue::Text(s) => parse_number(s).unwrap_or(0.0),
    }
}

/// Parse the longest numeric prefix of `s`, the way SQLite reads text as a number.
fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim_start();
    let mut best = None;
    for (i, c) in trimmed.char_indices() {
        if !c.is_ascii_digit() && !matches!(c, '+' | '-' | '.' | 'e' | 'E') {
            break;
        }
        if let Ok(f) = trimmed[..i + 1].parse::<f64>() {
            best = Some(f);
        }
    }
    best
}

/// Render a real the way the engine casts one to text: `%!.15g`, i.e. 15
/// significant digits, exponent form outside 1e-4..1e15, and always at
/// least one digit after the decimal point.
fn format_real(f: f64) -> String {
    if f.is_infinite() {
        return if f > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if f == 0.0 || f.is_nan() {
        return "0.0".to_string();
    }

    // Rounding to 15 digits first decides the exponent, as printf does.
    let scientific = format!("{f:.14e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };

    if (-4..15).contains(&exponent) {
        let decimals = usize::try_from(14 - exponent).unwrap_or_default();
        with_fraction(&format!("{f:.decimals$}"))
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", with_fraction(mantissa), exponent.abs())
    }
}

/// Drop trailing zeros after the decimal point, keeping at least one digit.
fn with_fraction(number: &str) -> String {
    match number.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            let fraction = if fraction.is_empty() { "0" } else { fraction };
            format!("{whole}.{fraction}")
        }
        None => format!("{number}.0"),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Integer(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
        };
        Ok(output)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Real(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl TryFrom<Value> for String {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(other.mismatch(ValueType::Text)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self> {
        value.as_integer()
    }
}

impl TryFrom<Value> for f64 {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self> {
        value.as_real()
    }
}

impl TryFrom<Value> for bool {
    type Error = StoreError;

    fn try_from(value: Value) -> Result<Self> {
        value.as_boolean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_pick_the_right_tag() {
        assert_eq!(Value::from("bar").value_type(), ValueType::Text);
        assert_eq!(Value::from(42).value_type(), ValueType::Integer);
        assert_eq!(Value::from(4.321).value_type(), ValueType::Real);
        assert_eq!(Value::from(true).value_type(), ValueType::Boolean);
        assert_eq!(Value::from(None::<i64>).value_type(), ValueType::Null);
        assert_eq!(Value::default(), Value::Null);
    }

    #[test]
    fn test_integer_and_boolean_are_interchangeable() {
        assert_eq!(Value::Boolean(true).as_integer().unwrap(), 1);
        assert_eq!(Value::Boolean(false).as_integer().unwrap(), 0);
        assert!(Value::Integer(7).as_boolean().unwrap());
        assert!(!Value::Integer(0).as_boolean().unwrap());
    }

    #[test]
    fn test_mismatched_access_is_a_typed_error() {
        let err = Value::from("bar").as_integer().unwrap_err();
        match err {
            StoreError::TypeMismatch { expected, actual } => {
                assert_eq!(expected, ValueType::Integer);
                assert_eq!(actual, ValueType::Text);
            }
            other => panic!("Expected TypeMismatch, got {other:?}"),
        }

        assert!(Value::Null.as_text().is_err());
        assert!(Value::Null.as_boolean().is_err());
        assert!(Value::Integer(1).as_real().is_err());
        assert!(Value::Real(1.0).as_integer().is_err());
    }

    #[test]
    fn test_try_from_delegates_to_accessors() {
        let s: String = Value::from("world").try_into().unwrap();
        assert_eq!(s, "world");
        let n: i64 = Value::Boolean(true).try_into().unwrap();
        assert_eq!(n, 1);
        let r: Result<f64> = Value::Null.try_into();
        assert!(r.is_err());
    }

    #[test]
    fn test_from_engine_null_ignores_expected_type() {
        for expected in [
            ValueType::Text,
            ValueType::Integer,
            ValueType::Real,
            ValueType::Boolean,
        ] {
            assert_eq!(Value::from_engine(&SqlValue::Null, expected), Value::Null);
        }
    }

    #[test]
    fn test_from_engine_coerces_like_sqlite() {
        assert_eq!(
            Value::from_engine(&SqlValue::Real(4.9), ValueType::Integer),
            Value::Integer(4)
        );
        assert_eq!(
            Value::from_engine(&SqlValue::Integer(3), ValueType::Real),
            Value::Real(3.0)
        );
        assert_eq!(
            Value::from_engine(&SqlValue::Text("12abc".into()), ValueType::Integer),
            Value::Integer(12)
        );
        assert_eq!(
            Value::from_engine(&SqlValue::Text("abc".into()), ValueType::Real),
            Value::Real(0.0)
        );
        assert_eq!(
            Value::from_engine(&SqlValue::Integer(43), ValueType::Text),
            Value::Text("43".into())
        );
        assert_eq!(
            Value::from_engine(&SqlValue::Real(2.0), ValueType::Text),
            Value::Text("2.0".into())
        );
        assert_eq!(
            Value::from_engine(&SqlValue::Integer(2), ValueType::Boolean),
            Value::Boolean(true)
        );
    }

    #[test]
    fn test_real_renders_as_the_engine_casts_it() {
        let text = |f: f64| Value::from_engine(&SqlValue::Real(f), ValueType::Text);

        assert_eq!(text(0.1 + 0.2), Value::from("0.3"));
        assert_eq!(text(1e20), Value::from("1.0e+20"));
        assert_eq!(text(1e15), Value::from("1.0e+15"));
        assert_eq!(text(1e14), Value::from("100000000000000.0"));
        assert_eq!(text(4.321), Value::from("4.321"));
        assert_eq!(text(-2.5), Value::from("-2.5"));
        assert_eq!(text(0.0001), Value::from("0.0001"));
        assert_eq!(text(0.00001), Value::from("1.0e-05"));
        assert_eq!(text(1.5e-7), Value::from("1.5e-07"));
        assert_eq!(text(123456789.125), Value::from("123456789.125"));
        assert_eq!(text(f64::INFINITY), Value::from("Inf"));
    }

    #[test]
    fn test_real_rendering_matches_the_engine() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        for f in [0.1 + 0.2, 1e20, 1e15, 1e-5, 2.0, 4.321, -1234.5678, 1.0 / 3.0] {
            let engine: String = conn
                .query_row("SELECT CAST(?1 AS TEXT)", [f], |row| row.get(0))
                .unwrap();
            assert_eq!(
                Value::from_engine(&SqlValue::Real(f), ValueType::Text),
                Value::Text(engine),
                "rendering {f}"
            );
        }
    }

    #[test]
    fn test_serializes_as_plain_scalars() {
        assert_eq!(serde_yaml::to_string(&Value::Integer(5)).unwrap().trim(), "5");
        assert_eq!(serde_yaml::to_string(&Value::Null).unwrap().trim(), "null");
        assert_eq!(serde_yaml::to_string(&Value::from("x")).unwrap().trim(), "x");
    }
}
