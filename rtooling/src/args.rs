//! JSON argument parsing helpers for tools.
//!
//! ```rust
//! use rtooling::{optional_string, parse_arguments, required_string};
//!
//! let args = parse_arguments(r#"{"query":"rust"}"#).expect("object should parse");
//! assert_eq!(required_string(&args, "query").unwrap(), "rust");
//! assert_eq!(optional_string(&args, "lang", "en"), "en");
//! ```

use serde_json::{Map, Value};

use crate::ToolError;

pub type Arguments = Map<String, Value>;

/// Parses a model-supplied argument string. Blank input is treated as `{}`, which some
/// models send for parameterless tools.
pub fn parse_arguments(args_json: &str) -> Result<Arguments, ToolError> {
    if args_json.trim().is_empty() {
        return Ok(Arguments::new());
    }

    let value: Value = serde_json::from_str(args_json).map_err(|error| {
        ToolError::invalid_arguments(format!("failed to parse tool arguments: {error}"))
    })?;

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ToolError::invalid_arguments(
            "expected JSON object arguments",
        )),
    }
}

/// A required string argument; absent, null, or non-string values are all "missing".
pub fn required_string(args: &Arguments, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::missing_argument(key))
}

pub fn optional_string(args: &Arguments, key: &str, default: &str) -> String {
    args.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// Accepts integers or floats (JSON numbers from models are often `5.0`), truncating
/// toward zero.
pub fn optional_count(args: &Arguments, key: &str, default: usize) -> usize {
    match args.get(key) {
        Some(Value::Number(number)) => number
            .as_u64()
            .map(|value| value as usize)
            .or_else(|| number.as_f64().filter(|value| *value >= 0.0).map(|value| value as usize))
            .unwrap_or(default),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolErrorKind;

    #[test]
    fn blank_arguments_parse_as_empty_object() {
        assert!(parse_arguments("").expect("blank is ok").is_empty());
        assert!(parse_arguments("  ").expect("blank is ok").is_empty());
    }

    #[test]
    fn non_object_or_malformed_arguments_are_invalid() {
        let error = parse_arguments("[1,2]").expect_err("arrays are not objects");
        assert_eq!(error.kind, ToolErrorKind::InvalidArguments);

        let error = parse_arguments("{").expect_err("json should fail");
        assert_eq!(error.kind, ToolErrorKind::InvalidArguments);
    }

    #[test]
    fn required_string_rejects_wrong_types() {
        let args = parse_arguments(r#"{"query": 42}"#).expect("object");
        let error = required_string(&args, "query").expect_err("number is not a string");
        assert_eq!(error.kind, ToolErrorKind::MissingArgument);
        assert_eq!(error.argument.as_deref(), Some("query"));
    }

    #[test]
    fn optional_count_accepts_float_numbers() {
        let args = parse_arguments(r#"{"a": 3, "b": 2.0, "c": -1, "d": "x"}"#).expect("object");
        assert_eq!(optional_count(&args, "a", 5), 3);
        assert_eq!(optional_count(&args, "b", 5), 2);
        assert_eq!(optional_count(&args, "c", 5), 5);
        assert_eq!(optional_count(&args, "d", 5), 5);
        assert_eq!(optional_count(&args, "missing", 5), 5);
    }
}
