//! Tokenizing and type inference of received lines.

use crate::{Response, Value};

/// Characters that separate the tokens of a response line.
const DELIMITERS: [char; 7] = [',', ' ', ';', '#', '!', ':', '?'];

/// Parse one received line into typed values.
///
/// The line is decoded as Latin-1 and stripped of surrounding whitespace. It is then split at
/// every run of delimiters (`, ;#!:?` and space). Each token is sanitized by dropping everything
/// that is not a digit, comma, or period, and classified as integer, else as real. If neither
/// parses, the original, unsanitized token is kept as text. This keeps replies like `"ON"` or
/// unit suffixes intact.
///
/// Returns `None` if there are no tokens, a single value for one token, and a list otherwise. A
/// blank line results in a single empty text value.
///
/// ```
/// use scpirs::{parse, Response, Value};
///
/// assert_eq!(parse(b"42\n"), Some(Response::Single(Value::Int(42))));
/// assert_eq!(
///     parse(b"5.0,1.2\n"),
///     Some(Response::List(vec![Value::Real(5.0), Value::Real(1.2)]))
/// );
/// ```
pub fn parse(line: &[u8]) -> Option<Response> {
    let decoded: String = line.iter().map(|&b| b as char).collect();
    let text = decoded.trim();

    if text.is_empty() {
        return Some(Response::Single(Value::Text(String::new())));
    }

    let values = text
        .split(DELIMITERS)
        .filter(|token| !token.is_empty())
        .map(classify)
        .collect();

    Response::collapse(values)
}

/// Classify one token as integer, real, or text.
fn classify(token: &str) -> Value {
    let sanitized: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if let Ok(val) = sanitized.parse::<i64>() {
        Value::Int(val)
    } else if let Ok(val) = sanitized.parse::<f64>() {
        Value::Real(val)
    } else {
        Value::Text(token.to_string())
    }
}
