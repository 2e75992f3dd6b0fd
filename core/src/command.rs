//! Command: the typed interface for every parameter store operation.
//!
//! Every operation `Sys::execute()` can dispatch is a variant of the
//! `Command` enum. The enum doubles as the JSON form of a command, used by
//! scripts that drive the store without going through the argument parser.
//!
//! # Wire Format
//!
//! Commands are serialized as JSON objects with a `"command"` discriminant:
//!
//! ```json
//! {"command": "set", "kind": "environment", "path": "prompt", "value": ">"}
//! {"command": "scope.push"}
//! {"command": "group.clear", "group": "addon.prompt"}
//! ```
//!
//! # Command Groups
//!
//! | Group | Commands |
//! |-------|----------|
//! | Top-level | `status`, `help`, `run` |
//! | Values | `set`, `get`, `has`, `unset`, `list` |
//! | Groups | `owner`, `group.nodes`, `group.clear` |
//! | Scope | `scope.push`, `scope.pop`, `scope.flush` |

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::namespace::ParameterKind;


/// A typed command for the parameter store.
///
/// Flags default to `false` so JSON commands only spell out what they turn
/// on. Paths are dotted strings and resolved by the target manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command")]
pub enum Command {
    // -----------------------------------------------------------------
    // Top-level commands
    // -----------------------------------------------------------------

    /// Node counts per family and current frame depth.
    #[serde(rename = "status")]
    Status {
        /// Output format: "json" for JSON, omit for one-liner.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    /// Show help text.
    #[serde(rename = "help")]
    Help {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
    },

    /// Execute a script, one command per line.
    #[serde(rename = "run")]
    Run { path: String },

    // -----------------------------------------------------------------
    // Value commands
    // -----------------------------------------------------------------

    #[serde(rename = "set")]
    Set {
        kind: ParameterKind,
        path: String,
        value: Value,
        /// Store in the shared slot instead of the caller's scope.
        #[serde(default)]
        global: bool,
        /// Owning group of a global value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        #[serde(default)]
        freeze: bool,
        #[serde(default)]
        read_only: bool,
        /// Refuse unsets without `force`.
        #[serde(default)]
        fixed: bool,
        #[serde(default)]
        transient: bool,
    },

    #[serde(rename = "get")]
    Get {
        kind: ParameterKind,
        path: String,
        #[serde(default)]
        global: bool,
        #[serde(default)]
        exact: bool,
        #[serde(default)]
        scope_only: bool,
    },

    #[serde(rename = "has")]
    Has {
        kind: ParameterKind,
        path: String,
        #[serde(default)]
        global: bool,
        #[serde(default)]
        exact: bool,
        #[serde(default)]
        scope_only: bool,
    },

    #[serde(rename = "unset")]
    Unset {
        kind: ParameterKind,
        path: String,
        #[serde(default)]
        global: bool,
        #[serde(default)]
        scope_only: bool,
        #[serde(default)]
        force: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        #[serde(default)]
        unfreeze: bool,
    },

    /// Every value under a path prefix.
    #[serde(rename = "list")]
    List {
        kind: ParameterKind,
        #[serde(default)]
        prefix: String,
        #[serde(default)]
        global: bool,
        #[serde(default)]
        scope_only: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    // -----------------------------------------------------------------
    // Group commands
    // -----------------------------------------------------------------

    #[serde(rename = "owner")]
    Owner { kind: ParameterKind, path: String },

    #[serde(rename = "group.nodes")]
    GroupNodes { kind: ParameterKind, group: String },

    /// Release every freeze a group holds, across all families.
    #[serde(rename = "group.clear")]
    GroupClear { group: String },

    // -----------------------------------------------------------------
    // Scope commands
    // -----------------------------------------------------------------

    #[serde(rename = "scope.push")]
    ScopePush,

    #[serde(rename = "scope.pop")]
    ScopePop,

    #[serde(rename = "scope.flush")]
    ScopeFlush,
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_from_minimal_json() {
        let cmd: Command = serde_json::from_value(json!({
            "command": "set",
            "kind": "variable",
            "path": "a.b",
            "value": 3
        }))
        .unwrap();
        match cmd {
            Command::Set { kind, path, value, global, freeze, .. } => {
                assert_eq!(kind, ParameterKind::Variable);
                assert_eq!(path, "a.b");
                assert_eq!(value, json!(3));
                assert!(!global);
                assert!(!freeze);
            }
            other => panic!("expected Set, got {:?}", other),
        }
    }

    #[test]
    fn unit_variant_tag() {
        let json = serde_json::to_string(&Command::ScopePush).unwrap();
        assert_eq!(json, r#"{"command":"scope.push"}"#);
    }

    #[test]
    fn unknown_kind_rejected() {
        let res: Result<Command, _> = serde_json::from_value(json!({
            "command": "get",
            "kind": "alias",
            "path": "x"
        }));
        assert!(res.is_err());
    }
}
