//! Typed scalar values that are sent to and received from an instrument.

use std::fmt::{self, Display};

use crate::ScpiError;

/// A scalar value: an argument of an outgoing command or a token of a parsed response.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// An integer value.
    Int(i64),
    /// A real number.
    Real(f64),
    /// Text, e.g., a command mnemonic or an `"ON"`/`"OFF"` reply.
    Text(String),
}

impl Value {
    /// Return the value as a float if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(val) => Some(*val as f64),
            Value::Real(val) => Some(*val),
            Value::Text(_) => None,
        }
    }

    /// Return the value as an integer if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(val) => Some(*val),
            _ => None,
        }
    }

    /// Return the text if the value is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(val) => Some(val.as_str()),
            _ => None,
        }
    }
}

/// Renders the canonical text form that is sent over the wire.
///
/// Reals always carry a fractional part or an exponent, i.e., `5.0` and not `5`, such that the
/// instrument does not mistake them for integers.
impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(val) => write!(f, "{val}"),
            Value::Real(val) => write!(f, "{val:?}"),
            Value::Text(val) => write!(f, "{val}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// A parsed, non-empty response.
///
/// A reply with exactly one token is a [`Response::Single`] value and never a list with one
/// element. Drivers rely on this, e.g., when they select the second element of a reply that is
/// expected to contain two values.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// Exactly one value.
    Single(Value),
    /// Two or more values in the order they were received.
    List(Vec<Value>),
}

impl Response {
    /// Collapse a sequence of values: nothing, one bare value, or a list.
    pub fn collapse(mut values: Vec<Value>) -> Option<Response> {
        match values.len() {
            0 => None,
            1 => values.pop().map(Response::Single),
            _ => Some(Response::List(values)),
        }
    }

    /// Get the value at a given index.
    ///
    /// A single value is available at index zero.
    pub fn get(&self, idx: usize) -> Option<&Value> {
        match self {
            Response::Single(val) if idx == 0 => Some(val),
            Response::Single(_) => None,
            Response::List(vals) => vals.get(idx),
        }
    }

    /// Number of values in this response.
    pub fn len(&self) -> usize {
        match self {
            Response::Single(_) => 1,
            Response::List(vals) => vals.len(),
        }
    }

    /// Always `false`: a response holds at least one value.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Return the bare value if this is a single value response.
    pub fn as_single(&self) -> Option<&Value> {
        match self {
            Response::Single(val) => Some(val),
            Response::List(_) => None,
        }
    }

    /// Interpret the response as one integer.
    pub fn to_i64(&self) -> Result<i64, ScpiError> {
        self.as_single()
            .and_then(Value::as_i64)
            .ok_or_else(|| ScpiError::ResponseParseError(self.to_string()))
    }

    /// Interpret the response as one number.
    pub fn to_f64(&self) -> Result<f64, ScpiError> {
        self.as_single()
            .and_then(Value::as_f64)
            .ok_or_else(|| ScpiError::ResponseParseError(self.to_string()))
    }

    /// Interpret the value at `idx` as a number.
    ///
    /// Fails if the response does not have that many values.
    pub fn f64_at(&self, idx: usize) -> Result<f64, ScpiError> {
        self.get(idx)
            .and_then(Value::as_f64)
            .ok_or_else(|| ScpiError::ResponseParseError(self.to_string()))
    }

    /// Check if the response is the single text `"ON"`.
    ///
    /// Anything else, including `"OFF"`, counts as off.
    pub fn is_on(&self) -> bool {
        self.as_single().and_then(Value::as_str) == Some("ON")
    }

    /// Consume the response and return all values in order.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Response::Single(val) => vec![val],
            Response::List(vals) => vals,
        }
    }
}

/// Renders the values separated by commas.
impl Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Single(val) => write!(f, "{val}"),
            Response::List(vals) => {
                let mut first = true;
                for val in vals {
                    if !first {
                        write!(f, ",")?;
                    }
                    write!(f, "{val}")?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_keeps_fraction() {
        assert_eq!(Value::Real(5.0).to_string(), "5.0");
        assert_eq!(Value::Real(1.2).to_string(), "1.2");
        assert_eq!(Value::Int(5).to_string(), "5");
    }

    #[test]
    fn test_collapse() {
        assert_eq!(Response::collapse(vec![]), None);
        assert_eq!(
            Response::collapse(vec![Value::Int(3)]),
            Some(Response::Single(Value::Int(3)))
        );
        let resp = Response::collapse(vec![Value::Real(5.0), Value::Real(1.2)]).unwrap();
        assert_eq!(resp.len(), 2);
        assert_eq!(resp.get(1), Some(&Value::Real(1.2)));
        assert_eq!(resp.to_string(), "5.0,1.2");
    }

    #[test]
    fn test_single_indexing() {
        let resp = Response::Single(Value::Text("ON".to_string()));
        assert!(resp.get(0).is_some());
        assert!(resp.get(1).is_none());
        assert_eq!(resp.as_single().and_then(Value::as_str), Some("ON"));
        assert!(resp.is_on());
        assert!(resp.f64_at(0).is_err());
    }

    #[test]
    fn test_numeric_accessors() {
        let resp = Response::List(vec![Value::Real(5.0), Value::Int(1)]);
        assert_eq!(resp.f64_at(0).unwrap(), 5.0);
        assert_eq!(resp.f64_at(1).unwrap(), 1.0);
        assert!(resp.f64_at(2).is_err());
        assert!(resp.to_f64().is_err());

        let resp = Response::Single(Value::Int(32));
        assert_eq!(resp.to_i64().unwrap(), 32);
        assert_eq!(resp.to_f64().unwrap(), 32.0);
        assert!(!resp.is_on());
    }
}
