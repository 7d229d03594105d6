//! Uncertainty-aware values
//!
//! An uncertain quantity is stored as two sibling leaves: `<name>` holds the
//! nominal value and `<name>_error_upper` the standard deviation. [`split`]
//! and [`combine`] convert between the paired storage form and the single
//! value handed to callers.

use serde::{Deserialize, Serialize};

use crate::error::{OdsError, OdsResult};

use super::{NdArray, Value};

/// Scalar with a standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UFloat {
    pub nominal: f64,
    pub std_dev: f64,
}

impl UFloat {
    pub fn new(nominal: f64, std_dev: f64) -> Self {
        Self { nominal, std_dev }
    }
}

/// Array with element-wise standard deviations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UArray {
    pub nominal: NdArray<f64>,
    pub std_dev: NdArray<f64>,
}

impl UArray {
    pub fn new(nominal: NdArray<f64>, std_dev: NdArray<f64>) -> OdsResult<Self> {
        if nominal.shape() != std_dev.shape() {
            return Err(OdsError::value_error(
                "",
                format!(
                    "nominal shape {:?} does not match standard deviation shape {:?}",
                    nominal.shape(),
                    std_dev.shape()
                ),
            ));
        }
        Ok(Self { nominal, std_dev })
    }

    /// One-dimensional array from `(nominal, std_dev)` pairs
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            nominal: NdArray::from_vec(pairs.iter().map(|(n, _)| *n).collect()),
            std_dev: NdArray::from_vec(pairs.iter().map(|(_, s)| *s).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.nominal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nominal.is_empty()
    }

    /// Element-wise view as scalars
    pub fn values(&self) -> Vec<UFloat> {
        self.nominal
            .data()
            .iter()
            .zip(self.std_dev.data())
            .map(|(n, s)| UFloat::new(*n, *s))
            .collect()
    }
}

/// Separate a value into its nominal part and its standard deviation, if any
pub fn split(value: Value) -> (Value, Option<Value>) {
    match value {
        Value::Uncertain(u) => (Value::Float(u.nominal), Some(Value::Float(u.std_dev))),
        Value::UncertainArray(u) => (
            Value::FloatArray(u.nominal),
            Some(Value::FloatArray(u.std_dev)),
        ),
        other => (other, None),
    }
}

/// Reject negative standard deviations, naming the offending path
pub fn validate_std_dev(std_dev: &Value, path: &str) -> OdsResult<()> {
    let negative = match std_dev {
        Value::Float(s) => *s < 0.0,
        Value::Int(s) => *s < 0,
        Value::FloatArray(a) => a.data().iter().any(|s| *s < 0.0),
        Value::IntArray(a) => a.data().iter().any(|s| *s < 0),
        _ => {
            return Err(OdsError::value_error(
                path,
                format!("standard deviation must be numeric, got {}", std_dev.kind_name()),
            ));
        }
    };
    if negative {
        return Err(OdsError::value_error(
            path,
            "standard deviation must be non-negative",
        ));
    }
    Ok(())
}

/// Pair a nominal value with its standard deviation
pub fn combine(nominal: Value, std_dev: Value, path: &str) -> OdsResult<Value> {
    validate_std_dev(&std_dev, path)?;
    match (nominal.into_float(), std_dev.into_float()) {
        (Value::Float(n), Value::Float(s)) => Ok(Value::Uncertain(UFloat::new(n, s))),
        (Value::FloatArray(n), Value::FloatArray(s)) => UArray::new(n, s)
            .map(Value::UncertainArray)
            .map_err(|e| match e {
                OdsError::Value { reason, .. } => OdsError::value_error(path, reason),
                other => other,
            }),
        (n, s) => Err(OdsError::value_error(
            path,
            format!(
                "cannot pair {} with a {} standard deviation",
                n.kind_name(),
                s.kind_name()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_scalar() {
        let (nominal, std_dev) = split(Value::Uncertain(UFloat::new(3.0, 0.1)));
        assert_eq!(nominal, Value::Float(3.0));
        assert_eq!(std_dev, Some(Value::Float(0.1)));

        let (nominal, std_dev) = split(Value::Int(3));
        assert_eq!(nominal, Value::Int(3));
        assert!(std_dev.is_none());
    }

    #[test]
    fn test_combine_array() {
        let value = combine(
            Value::from(vec![1.0, 2.0]),
            Value::from(vec![0.1, 0.2]),
            "x",
        )
        .unwrap();
        match value {
            Value::UncertainArray(u) => {
                assert_eq!(u.values()[1], UFloat::new(2.0, 0.2));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_combine_int_nominal() {
        assert_eq!(
            combine(Value::Int(2), Value::Float(0.5), "x").unwrap(),
            Value::Uncertain(UFloat::new(2.0, 0.5))
        );
    }

    #[test]
    fn test_negative_std_dev() {
        let err = combine(Value::Float(1.0), Value::Float(-0.1), "a.b").unwrap_err();
        match err {
            OdsError::Value { path, .. } => assert_eq!(path, "a.b"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_shape_mismatch() {
        assert!(combine(Value::from(vec![1.0, 2.0]), Value::from(vec![0.1]), "x").is_err());
        assert!(combine(Value::Float(1.0), Value::from(vec![0.1]), "x").is_err());
    }
}
