//! Tool groups served by the MCP endpoint
//!
//! Each group is a plain `Vec<ToolDefinition>` built from the service it
//! wraps; [`build_registry`] concatenates them in a fixed order. Handlers
//! deserialize their own arguments, so a malformed `arguments` object is an
//! application fault ("Invalid arguments: ...") rather than a protocol fault.

pub mod search_tools;
pub mod user_tools;

use crate::error::ToolError;
use crate::mcp::registry::{RegistryError, ToolRegistry};
use crate::services::search_service::SearchService;
use crate::services::user_service::UserService;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// User tools first, then search tools
pub fn build_registry(
    users: Arc<UserService>,
    search: Arc<SearchService>,
) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::from_groups([user_tools::tools(users), search_tools::tools(search)])
}

/// Reads a tool's `arguments`; a missing object counts as `{}`
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    Ok(serde_json::from_value(args)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase", deny_unknown_fields)]
    struct Args {
        user_id: i64,
        #[serde(default)]
        verbose: bool,
    }

    #[test]
    fn test_parse_args_reports_invalid_arguments() {
        let args: Args = parse_args(json!({"userId": 3})).expect("valid");
        assert_eq!(args.user_id, 3);
        assert!(!args.verbose);

        let err = parse_args::<Args>(json!({"userId": "three"})).expect_err("wrong type");
        assert!(err.wire_message().starts_with("Invalid arguments:"));

        let err = parse_args::<Args>(json!({"userId": 3, "extra": 1})).expect_err("unknown field");
        assert!(matches!(err, ToolError::InvalidArguments(_)));

        let err = parse_args::<Args>(Value::Null).expect_err("missing field");
        assert!(err.wire_message().contains("userId"));
    }
}
