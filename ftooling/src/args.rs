//! Argument decoding and output coercion for function handlers.
//!
//! ```rust
//! use serde_json::json;
//! use ftooling::{coerce_output, parse_arguments, required_string};
//!
//! let args = parse_arguments(r#"{"location":"Zipolite"}"#);
//! assert_eq!(required_string(&args, "location").expect("present"), "Zipolite");
//!
//! assert!(parse_arguments("not json").is_empty());
//! assert_eq!(coerce_output(&json!("sunny")), "sunny");
//! assert_eq!(coerce_output(&json!({"temp": 30})), r#"{"temp":30}"#);
//! ```

use serde_json::{Map, Value};

use crate::ToolError;

pub fn parse_json_object(args_json: &str) -> Result<Map<String, Value>, ToolError> {
    let value: Value = serde_json::from_str(args_json)
        .map_err(|err| ToolError::invalid_arguments(format!("invalid JSON arguments: {err}")))?;
    match value {
        Value::Object(fields) => Ok(fields),
        _ => Err(ToolError::invalid_arguments("expected JSON object arguments")),
    }
}

/// Lenient decoding used by the dispatch loop: anything that is not a JSON
/// object becomes an empty argument map.
pub fn parse_arguments(args_json: &str) -> Map<String, Value> {
    if args_json.trim().is_empty() {
        return Map::new();
    }

    parse_json_object(args_json).unwrap_or_else(|error| {
        tracing::warn!(error = %error, "function arguments are not a JSON object, using {{}}");
        Map::new()
    })
}

pub fn required_string(args: &Map<String, Value>, key: &str) -> Result<String, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing required string: '{key}'")))
}

/// Text form of a handler result: strings verbatim, everything else as JSON.
pub fn coerce_output(output: &Value) -> String {
    match output {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn strict_parse_rejects_non_objects() {
        let error = parse_json_object("[1,2]").expect_err("array should fail");
        assert_eq!(error.kind, crate::ToolErrorKind::InvalidArguments);
        assert!(parse_json_object("{").is_err());
    }

    #[test]
    fn lenient_parse_falls_back_to_empty_object() {
        assert!(parse_arguments("").is_empty());
        assert!(parse_arguments("{oops").is_empty());
        assert!(parse_arguments("42").is_empty());
        assert_eq!(parse_arguments("{\"a\":1}").get("a"), Some(&json!(1)));
    }

    #[test]
    fn coerce_output_unwraps_strings_and_serializes_other_values() {
        assert_eq!(coerce_output(&json!("plain")), "plain");
        assert_eq!(coerce_output(&json!(7)), "7");
        assert_eq!(coerce_output(&json!(null)), "null");
        assert_eq!(coerce_output(&json!([1, "x"])), "[1,\"x\"]");
    }
}
