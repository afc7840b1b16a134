//! Decoding of MCP tool arguments
//!
//! Tool arguments arrive as an untyped JSON object. They are decoded into
//! [`QueryArgs`] before anything else happens, so a bad call never reaches
//! the network.

use serde_json::{Map as JsonObject, Value};

use crate::error::ArgumentError;

/// Name of the single tool argument
pub const QUERY_ARG: &str = "query";

/// Validated arguments of the query tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryArgs {
    /// Native statement to run
    pub query: String,
}

impl QueryArgs {
    /// Decode the arguments of a `tools/call` request
    pub fn from_arguments(
        arguments: Option<&JsonObject<String, Value>>,
    ) -> Result<Self, ArgumentError> {
        let arguments = arguments.ok_or(ArgumentError::NotAnObject)?;

        match arguments.get(QUERY_ARG) {
            None | Some(Value::Null) => Err(ArgumentError::MissingQuery),
            Some(Value::String(query)) if query.is_empty() => Err(ArgumentError::EmptyQuery),
            Some(Value::String(query)) => Ok(Self {
                query: query.clone(),
            }),
            Some(other) => Err(ArgumentError::NotAString {
                found: json_type_name(other),
            }),
        }
    }

    /// Decode from an arbitrary JSON value
    pub fn from_value(value: &Value) -> Result<Self, ArgumentError> {
        match value {
            Value::Object(map) => Self::from_arguments(Some(map)),
            _ => Err(ArgumentError::NotAnObject),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_query() {
        let args = QueryArgs::from_value(&json!({"query": "SELECT 1"})).unwrap();
        assert_eq!(args.query, "SELECT 1");
    }

    #[test]
    fn test_extra_keys_ignored() {
        let args = QueryArgs::from_value(&json!({"query": "SELECT 1", "limit": 5})).unwrap();
        assert_eq!(args.query, "SELECT 1");
    }

    #[test]
    fn test_whitespace_query_is_kept() {
        // Only the empty string is rejected; Metabase reports anything else
        let args = QueryArgs::from_value(&json!({"query": "  "})).unwrap();
        assert_eq!(args.query, "  ");
    }

    #[test]
    fn test_missing_arguments() {
        assert_eq!(
            QueryArgs::from_arguments(None),
            Err(ArgumentError::NotAnObject)
        );
        assert_eq!(
            QueryArgs::from_value(&json!("SELECT 1")),
            Err(ArgumentError::NotAnObject)
        );
        assert_eq!(
            QueryArgs::from_value(&json!({})),
            Err(ArgumentError::MissingQuery)
        );
        assert_eq!(
            QueryArgs::from_value(&json!({"query": null})),
            Err(ArgumentError::MissingQuery)
        );
    }

    #[test]
    fn test_wrong_types() {
        assert_eq!(
            QueryArgs::from_value(&json!({"query": 42})),
            Err(ArgumentError::NotAString { found: "number" })
        );
        assert_eq!(
            QueryArgs::from_value(&json!({"query": ["SELECT 1"]})),
            Err(ArgumentError::NotAString { found: "array" })
        );
        assert_eq!(
            QueryArgs::from_value(&json!({"query": true})),
            Err(ArgumentError::NotAString { found: "boolean" })
        );
    }

    #[test]
    fn test_empty_query() {
        assert_eq!(
            QueryArgs::from_value(&json!({"query": ""})),
            Err(ArgumentError::EmptyQuery)
        );
    }
}
