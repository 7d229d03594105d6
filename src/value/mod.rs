//! Leaf values
//!
//! A leaf holds a scalar, a rectangular n-dimensional array, a string (or
//! list of strings), or an uncertain scalar/array. Uncertain values never
//! reach storage directly: the container splits them into a nominal leaf and
//! an `_error_upper` sibling (see [`uncertain`]).

pub mod uncertain;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OdsError, OdsResult};
use crate::schema::DataType;

pub use uncertain::{UArray, UFloat, combine, split};

/// Sentinel used by external databases for "no data" floats
pub const EMPTY_FLOAT: f64 = -9e40;

/// Sentinel used by external databases for "no data" integers
pub const EMPTY_INT: i64 = -999_999_999;

/// Rectangular n-dimensional array stored in row-major order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NdArray<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> NdArray<T> {
    pub fn new(shape: Vec<usize>, data: Vec<T>) -> OdsResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(OdsError::value_error(
                "",
                format!(
                    "shape {:?} needs {} elements, got {}",
                    shape,
                    expected,
                    data.len()
                ),
            ));
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional array
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> NdArray<U> {
        NdArray {
            shape: self.shape.clone(),
            data: self.data.iter().map(f).collect(),
        }
    }
}

/// Data held by a leaf node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    IntArray(NdArray<i64>),
    FloatArray(NdArray<f64>),
    StrArray(Vec<String>),
    Uncertain(UFloat),
    UncertainArray(UArray),
}

impl Value {
    /// Human readable name of the variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::IntArray(_) => "integer array",
            Value::FloatArray(_) => "float array",
            Value::StrArray(_) => "string array",
            Value::Uncertain(_) => "uncertain float",
            Value::UncertainArray(_) => "uncertain array",
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            Value::Int(_) | Value::Float(_) | Value::Str(_) | Value::Uncertain(_) => 0,
            Value::IntArray(a) => a.ndim(),
            Value::FloatArray(a) => a.ndim(),
            Value::StrArray(_) => 1,
            Value::UncertainArray(a) => a.nominal.ndim(),
        }
    }

    pub fn is_uncertain(&self) -> bool {
        matches!(self, Value::Uncertain(_) | Value::UncertainArray(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Flat float view of a numeric array
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Value::FloatArray(a) => Some(a.data().to_vec()),
            Value::IntArray(a) => Some(a.data().iter().map(|i| *i as f64).collect()),
            _ => None,
        }
    }

    /// Promote integers to floats, leaving everything else untouched
    pub fn into_float(self) -> Value {
        match self {
            Value::Int(i) => Value::Float(i as f64),
            Value::IntArray(a) => Value::FloatArray(a.map(|i| *i as f64)),
            other => other,
        }
    }

    /// True for values external databases use to mean "nothing stored"
    pub fn is_empty_sentinel(&self) -> bool {
        match self {
            Value::Int(i) => *i == EMPTY_INT,
            Value::Float(f) => *f == EMPTY_FLOAT || *f == EMPTY_INT as f64,
            Value::Str(s) => s.is_empty(),
            Value::IntArray(a) => a.is_empty(),
            Value::FloatArray(a) => a.is_empty(),
            Value::StrArray(a) => a.is_empty(),
            Value::Uncertain(_) => false,
            Value::UncertainArray(a) => a.is_empty(),
        }
    }

    /// Convert to the storage type a schema location expects
    ///
    /// Integers are promoted for floating point locations, integral floats are
    /// accepted for integer locations, and the number of dimensions must
    /// match the location's declared dimensionality.
    pub fn coerce(self, data_type: DataType, path: &str) -> OdsResult<Value> {
        let expected = match data_type.ndim() {
            Some(n) => n as usize,
            None => {
                return Err(OdsError::type_error(
                    path,
                    format!("a {} location cannot hold a value", data_type),
                ));
            }
        };

        let value = match (data_type, self) {
            (DataType::Float(_), v @ (Value::Float(_) | Value::FloatArray(_))) => v,
            (DataType::Float(_), Value::Int(i)) => Value::Float(i as f64),
            (DataType::Float(_), Value::IntArray(a)) => Value::FloatArray(a.map(|i| *i as f64)),
            (DataType::Int(_), v @ (Value::Int(_) | Value::IntArray(_))) => v,
            (DataType::Int(_), Value::Float(f)) if is_integral(f) => Value::Int(f as i64),
            (DataType::Int(_), Value::FloatArray(a)) if a.data().iter().all(|f| is_integral(*f)) => {
                Value::IntArray(a.map(|f| *f as i64))
            }
            (DataType::Str(_), v @ (Value::Str(_) | Value::StrArray(_))) => v,
            (dt, v) => {
                return Err(OdsError::type_error(
                    path,
                    format!("cannot store {} in a {} location", v.kind_name(), dt),
                ));
            }
        };

        if value.ndim() != expected {
            return Err(OdsError::type_error(
                path,
                format!(
                    "{} location expects {}-dimensional data, got {} dimensions",
                    data_type,
                    expected,
                    value.ndim()
                ),
            ));
        }
        Ok(value)
    }

    /// Multiply numeric data by a constant factor
    ///
    /// Standard deviations scale with the magnitude of the factor.
    pub fn scale(self, factor: f64) -> Value {
        if factor == 1.0 {
            return self;
        }
        match self.into_float() {
            Value::Float(f) => Value::Float(f * factor),
            Value::FloatArray(a) => Value::FloatArray(a.map(|f| f * factor)),
            Value::Uncertain(u) => {
                Value::Uncertain(UFloat::new(u.nominal * factor, u.std_dev * factor.abs()))
            }
            Value::UncertainArray(u) => Value::UncertainArray(UArray {
                nominal: u.nominal.map(|f| f * factor),
                std_dev: u.std_dev.map(|f| f * factor.abs()),
            }),
            other => other,
        }
    }

    /// Stack per-element values of a slice read into one value, aligned by index
    pub fn stack(values: Vec<Value>, path: &str) -> OdsResult<Value> {
        let n = values.len();
        if n == 0 {
            return Ok(Value::FloatArray(NdArray::from_vec(Vec::new())));
        }

        let mismatch = || {
            OdsError::value_error(
                path,
                "slice elements have different types or shapes and cannot be stacked",
            )
        };

        if values.iter().all(|v| matches!(v, Value::Int(_))) {
            let data = values.iter().filter_map(Value::as_i64).collect();
            return Ok(Value::IntArray(NdArray::from_vec(data)));
        }
        if values.iter().all(|v| matches!(v, Value::Int(_) | Value::Float(_))) {
            let data = values.iter().filter_map(Value::as_f64).collect();
            return Ok(Value::FloatArray(NdArray::from_vec(data)));
        }
        if values.iter().all(|v| matches!(v, Value::Str(_))) {
            let data = values
                .into_iter()
                .filter_map(|v| match v {
                    Value::Str(s) => Some(s),
                    _ => None,
                })
                .collect();
            return Ok(Value::StrArray(data));
        }
        if values.iter().all(|v| matches!(v, Value::Uncertain(_))) {
            let pairs: Vec<(f64, f64)> = values
                .iter()
                .filter_map(|v| match v {
                    Value::Uncertain(u) => Some((u.nominal, u.std_dev)),
                    _ => None,
                })
                .collect();
            return Ok(Value::UncertainArray(UArray::from_pairs(&pairs)));
        }

        let first_shape = match &values[0] {
            Value::IntArray(a) => a.shape().to_vec(),
            Value::FloatArray(a) => a.shape().to_vec(),
            Value::UncertainArray(a) => a.nominal.shape().to_vec(),
            _ => return Err(mismatch()),
        };
        let mut shape = vec![n];
        shape.extend(first_shape.iter().copied());

        if values.iter().all(|v| matches!(v, Value::IntArray(a) if a.shape() == first_shape)) {
            let data = values
                .into_iter()
                .filter_map(|v| match v {
                    Value::IntArray(a) => Some(a.into_data()),
                    _ => None,
                })
                .flatten()
                .collect();
            return Ok(Value::IntArray(NdArray::new(shape, data)?));
        }
        if values.iter().all(|v| {
            matches!(v, Value::IntArray(a) if a.shape() == first_shape)
                || matches!(v, Value::FloatArray(a) if a.shape() == first_shape)
        }) {
            let data = values
                .into_iter()
                .filter_map(|v| v.to_f64_vec())
                .flatten()
                .collect();
            return Ok(Value::FloatArray(NdArray::new(shape, data)?));
        }
        if values
            .iter()
            .all(|v| matches!(v, Value::UncertainArray(a) if a.nominal.shape() == first_shape))
        {
            let mut nominal = Vec::new();
            let mut std_dev = Vec::new();
            for v in values {
                if let Value::UncertainArray(a) = v {
                    nominal.extend(a.nominal.into_data());
                    std_dev.extend(a.std_dev.into_data());
                }
            }
            return Ok(Value::UncertainArray(UArray::new(
                NdArray::new(shape.clone(), nominal)?,
                NdArray::new(shape, std_dev)?,
            )?));
        }

        Err(mismatch())
    }

    /// Plain JSON form: numbers, strings and nested arrays
    ///
    /// Uncertain values are split before export, so they only appear here
    /// when rendering for display; they become `{"nominal": .., "std_dev": ..}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => float_to_json(*f),
            Value::Str(s) => serde_json::Value::from(s.as_str()),
            Value::IntArray(a) => nest(a.shape(), a.data(), &|i| serde_json::Value::from(*i)),
            Value::FloatArray(a) => nest(a.shape(), a.data(), &|f| float_to_json(*f)),
            Value::StrArray(a) => {
                serde_json::Value::Array(a.iter().map(|s| serde_json::Value::from(s.as_str())).collect())
            }
            Value::Uncertain(u) => serde_json::json!({
                "nominal": float_to_json(u.nominal),
                "std_dev": float_to_json(u.std_dev),
            }),
            Value::UncertainArray(u) => serde_json::json!({
                "nominal": Value::FloatArray(u.nominal.clone()).to_json(),
                "std_dev": Value::FloatArray(u.std_dev.clone()).to_json(),
            }),
        }
    }

    /// Interpret a plain JSON value as leaf data
    ///
    /// Returns `None` for objects and arrays that contain objects, which
    /// describe structure rather than data.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Array(_) => array_from_json(json),
            other => scalar_from_json(other),
        }
    }
}

fn float_to_json(f: f64) -> serde_json::Value {
    serde_json::Number::from_f64(f)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn nest<T>(
    shape: &[usize],
    data: &[T],
    leaf: &dyn Fn(&T) -> serde_json::Value,
) -> serde_json::Value {
    match shape.split_first() {
        None => data.first().map(leaf).unwrap_or(serde_json::Value::Null),
        Some((_, [])) => serde_json::Value::Array(data.iter().map(leaf).collect()),
        Some((&n, rest)) => {
            let stride: usize = rest.iter().product();
            serde_json::Value::Array(
                (0..n)
                    .map(|i| nest(rest, &data[i * stride..(i + 1) * stride], leaf))
                    .collect(),
            )
        }
    }
}

fn scalar_from_json(json: &serde_json::Value) -> Option<Value> {
    match json {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Value::Int(i)),
            None => n.as_f64().map(Value::Float),
        },
        serde_json::Value::String(s) => Some(Value::Str(s.clone())),
        serde_json::Value::Null => Some(Value::Float(f64::NAN)),
        serde_json::Value::Bool(b) => Some(Value::Int(*b as i64)),
        _ => None,
    }
}

fn flatten_json<'a>(
    json: &'a serde_json::Value,
    depth: usize,
    shape: &mut Vec<usize>,
    out: &mut Vec<&'a serde_json::Value>,
) -> bool {
    match json {
        serde_json::Value::Array(items) => {
            if depth == shape.len() {
                if !out.is_empty() {
                    return false;
                }
                shape.push(items.len());
            } else if depth > shape.len() || shape[depth] != items.len() {
                return false;
            }
            items
                .iter()
                .all(|item| flatten_json(item, depth + 1, shape, out))
        }
        serde_json::Value::Object(_) => false,
        scalar => {
            if depth != shape.len() {
                return false;
            }
            out.push(scalar);
            true
        }
    }
}

fn array_from_json(json: &serde_json::Value) -> Option<Value> {
    let mut shape = Vec::new();
    let mut leaves = Vec::new();
    if !flatten_json(json, 0, &mut shape, &mut leaves) {
        return None;
    }
    if leaves.is_empty() {
        return NdArray::new(shape, Vec::new()).ok().map(Value::FloatArray);
    }
    if leaves.iter().all(|l| l.is_i64()) {
        let data = leaves.iter().filter_map(|l| l.as_i64()).collect();
        return NdArray::new(shape, data).ok().map(Value::IntArray);
    }
    if leaves.iter().all(|l| l.is_number() || l.is_null()) {
        let data = leaves
            .iter()
            .map(|l| l.as_f64().unwrap_or(f64::NAN))
            .collect();
        return NdArray::new(shape, data).ok().map(Value::FloatArray);
    }
    if shape.len() == 1 && leaves.iter().all(|l| l.is_string()) {
        let data = leaves
            .iter()
            .filter_map(|l| l.as_str().map(str::to_string))
            .collect();
        return Some(Value::StrArray(data));
    }
    None
}

/// Whole number that converts to `i64` without saturating
fn is_integral(f: f64) -> bool {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64
}

/// Interpret a textual literal: integer, float, list of numbers, or string
pub fn parse_literal_str(text: &str) -> Value {
    let text = text.trim();
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        return Value::Float(f);
    }

    for quote in ['\'', '"'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return Value::Str(text[1..text.len() - 1].to_string());
        }
    }

    let inner = text
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .unwrap_or(text);
    let items: Vec<&str> = inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if items.len() > 1 || inner.len() != text.len() {
        if let Ok(ints) = items.iter().map(|s| s.parse::<i64>()).collect::<Result<Vec<_>, _>>() {
            return Value::IntArray(NdArray::from_vec(ints));
        }
        if let Ok(floats) = items.iter().map(|s| s.parse::<f64>()).collect::<Result<Vec<_>, _>>() {
            return Value::FloatArray(NdArray::from_vec(floats));
        }
    }

    Value::Str(text.to_string())
}

/// Input processing function turning string literals into numbers
///
/// Non-string values pass through unchanged.
pub fn parse_literal(value: Value) -> Value {
    match value {
        Value::Str(s) => parse_literal_str(&s),
        other => other,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Uncertain(u) => write!(f, "{}+/-{}", u.nominal, u.std_dev),
            Value::UncertainArray(u) => {
                let items: Vec<String> = u
                    .values()
                    .iter()
                    .map(|v| format!("{}+/-{}", v.nominal, v.std_dev))
                    .collect();
                write!(f, "[{}]", items.join(", "))
            }
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::FloatArray(NdArray::from_vec(v))
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::IntArray(NdArray::from_vec(v))
    }
}

impl From<Vec<i32>> for Value {
    fn from(v: Vec<i32>) -> Self {
        Value::IntArray(NdArray::from_vec(v.into_iter().map(i64::from).collect()))
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StrArray(v)
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::StrArray(v.into_iter().map(str::to_string).collect())
    }
}

impl From<NdArray<f64>> for Value {
    fn from(v: NdArray<f64>) -> Self {
        Value::FloatArray(v)
    }
}

impl From<NdArray<i64>> for Value {
    fn from(v: NdArray<i64>) -> Self {
        Value::IntArray(v)
    }
}

impl From<UFloat> for Value {
    fn from(v: UFloat) -> Self {
        Value::Uncertain(v)
    }
}

impl From<UArray> for Value {
    fn from(v: UArray) -> Self {
        Value::UncertainArray(v)
    }
}

impl From<Vec<UFloat>> for Value {
    fn from(v: Vec<UFloat>) -> Self {
        let pairs: Vec<(f64, f64)> = v.iter().map(|u| (u.nominal, u.std_dev)).collect();
        Value::UncertainArray(UArray::from_pairs(&pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_float_location() {
        assert_eq!(
            Value::Int(2).coerce(DataType::Float(0), "x").unwrap(),
            Value::Float(2.0)
        );
        assert_eq!(
            Value::from(vec![1i64, 2]).coerce(DataType::Float(1), "x").unwrap(),
            Value::from(vec![1.0, 2.0])
        );
        assert!(matches!(
            Value::from("a").coerce(DataType::Float(0), "x"),
            Err(OdsError::Type { .. })
        ));
        assert!(matches!(
            Value::Float(1.0).coerce(DataType::Float(1), "x"),
            Err(OdsError::Type { .. })
        ));
    }

    #[test]
    fn test_coerce_int_location() {
        assert_eq!(
            Value::Float(3.0).coerce(DataType::Int(0), "x").unwrap(),
            Value::Int(3)
        );
        assert!(Value::Float(3.5).coerce(DataType::Int(0), "x").is_err());
        assert!(Value::Int(1).coerce(DataType::Str(0), "x").is_err());
    }

    #[test]
    fn test_coerce_int_out_of_range() {
        assert!(matches!(
            Value::Float(1e30).coerce(DataType::Int(0), "x"),
            Err(OdsError::Type { .. })
        ));
        assert!(Value::from(vec![1.0, -1e30]).coerce(DataType::Int(1), "x").is_err());
        assert!(Value::Float(f64::NAN).coerce(DataType::Int(0), "x").is_err());
        assert_eq!(
            Value::Float(-9.0e15).coerce(DataType::Int(0), "x").unwrap(),
            Value::Int(-9_000_000_000_000_000)
        );
    }

    #[test]
    fn test_stack_scalars() {
        let stacked = Value::stack(
            vec![Value::Float(1.5), Value::Float(2.0), Value::Int(1)],
            "x",
        )
        .unwrap();
        assert_eq!(stacked, Value::from(vec![1.5, 2.0, 1.0]));
    }

    #[test]
    fn test_stack_arrays() {
        let stacked = Value::stack(
            vec![Value::from(vec![1.0, 2.0]), Value::from(vec![3.0, 4.0])],
            "x",
        )
        .unwrap();
        match stacked {
            Value::FloatArray(a) => {
                assert_eq!(a.shape(), &[2, 2]);
                assert_eq!(a.data(), &[1.0, 2.0, 3.0, 4.0]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(Value::stack(vec![Value::from(vec![1.0]), Value::from(vec![1.0, 2.0])], "x").is_err());
    }

    #[test]
    fn test_json_nested() {
        let value = Value::FloatArray(NdArray::new(vec![2, 2], vec![1.0, 2.5, 3.0, 4.0]).unwrap());
        let json = value.to_json();
        assert_eq!(json, serde_json::json!([[1.0, 2.5], [3.0, 4.0]]));
        assert_eq!(Value::from_json(&json), Some(value));
        assert!(Value::from_json(&serde_json::json!([[1], [2, 3]])).is_none());
        assert!(Value::from_json(&serde_json::json!([{"a": 1}])).is_none());
        assert_eq!(
            Value::from_json(&serde_json::json!([1, 2])),
            Some(Value::from(vec![1i64, 2]))
        );
    }

    #[test]
    fn test_parse_literal() {
        assert_eq!(parse_literal_str("3"), Value::Int(3));
        assert_eq!(parse_literal_str(" 2.5 "), Value::Float(2.5));
        assert_eq!(parse_literal_str("'abc'"), Value::from("abc"));
        assert_eq!(parse_literal_str("1 2 3"), Value::from(vec![1i64, 2, 3]));
        assert_eq!(parse_literal_str("[1.0, 2]"), Value::from(vec![1.0, 2.0]));
        assert_eq!(parse_literal_str("hello world"), Value::from("hello world"));
        assert_eq!(parse_literal(Value::Int(4)), Value::Int(4));
    }

    #[test]
    fn test_sentinels() {
        assert!(Value::Float(EMPTY_FLOAT).is_empty_sentinel());
        assert!(Value::Int(EMPTY_INT).is_empty_sentinel());
        assert!(Value::from("").is_empty_sentinel());
        assert!(Value::from(Vec::<f64>::new()).is_empty_sentinel());
        assert!(!Value::Float(0.0).is_empty_sentinel());
    }

    #[test]
    fn test_scale_uncertain() {
        let scaled = Value::Uncertain(UFloat::new(2.0, 0.5)).scale(-2.0);
        assert_eq!(scaled, Value::Uncertain(UFloat::new(-4.0, 1.0)));
    }
}
