//! Parameter values and their capability settings.
//!
//! A `Parameter` is a JSON value tagged with the family it belongs to and a
//! `Settings` block. Settings take a local shape while the parameter sits in
//! a scope slot and a global shape while it sits in the shared slot; moving
//! across the boundary keeps `read_only` and `removable`.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;


/// The closed set of parameter families the shell stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Environment values (`prompt`, `history.size`, ...).
    Environment,
    /// Shell variables.
    Variable,
    /// Context values, shared execution settings.
    Context,
    /// Cryptographic keys.
    Key,
    /// Procedure definitions, a command line or a list of them.
    Procedure,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::Environment => "environment",
            ParameterKind::Variable => "variable",
            ParameterKind::Context => "context",
            ParameterKind::Key => "key",
            ParameterKind::Procedure => "procedure",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterKind {
    type Err = String;

    /// Accepts the full family name or its short form (`env`, `var`,
    /// `ctx`, `proc`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "environment" | "env" => Ok(ParameterKind::Environment),
            "variable" | "var" => Ok(ParameterKind::Variable),
            "context" | "ctx" => Ok(ParameterKind::Context),
            "key" => Ok(ParameterKind::Key),
            "procedure" | "proc" => Ok(ParameterKind::Procedure),
            other => Err(format!("unknown parameter kind '{}'", other)),
        }
    }
}


/// Settings of a parameter held in a scope slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSettings {
    pub read_only: bool,
    pub removable: bool,
}

impl Default for LocalSettings {
    fn default() -> Self {
        LocalSettings {
            read_only: false,
            removable: true,
        }
    }
}


/// Settings of a parameter held in the shared slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub read_only: bool,
    pub removable: bool,
    /// Transient values are never handed back to loaders for saving.
    pub transient: bool,
    /// Identity hash recorded when the value was stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_hash: Option<u64>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        GlobalSettings {
            read_only: false,
            removable: true,
            transient: false,
            starting_hash: None,
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Settings {
    Local(LocalSettings),
    Global(GlobalSettings),
}

impl Settings {
    pub fn read_only(&self) -> bool {
        match self {
            Settings::Local(s) => s.read_only,
            Settings::Global(s) => s.read_only,
        }
    }

    pub fn removable(&self) -> bool {
        match self {
            Settings::Local(s) => s.removable,
            Settings::Global(s) => s.removable,
        }
    }

    fn to_local(self) -> Settings {
        match self {
            Settings::Local(_) => self,
            Settings::Global(s) => Settings::Local(LocalSettings {
                read_only: s.read_only,
                removable: s.removable,
            }),
        }
    }

    fn to_global(self) -> Settings {
        match self {
            Settings::Global(_) => self,
            Settings::Local(s) => Settings::Global(GlobalSettings {
                read_only: s.read_only,
                removable: s.removable,
                ..GlobalSettings::default()
            }),
        }
    }
}


/// A stored value with its family and settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    kind: ParameterKind,
    value: Value,
    settings: Settings,
}

impl Parameter {
    /// A removable, writable parameter in local shape.
    pub fn new(kind: ParameterKind, value: Value) -> Self {
        Parameter {
            kind,
            value,
            settings: Settings::Local(LocalSettings::default()),
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        match &mut self.settings {
            Settings::Local(s) => s.read_only = read_only,
            Settings::Global(s) => s.read_only = read_only,
        }
        self
    }

    pub fn with_removable(mut self, removable: bool) -> Self {
        match &mut self.settings {
            Settings::Local(s) => s.removable = removable,
            Settings::Global(s) => s.removable = removable,
        }
        self
    }

    /// Mark the parameter transient. Switches it to global shape, the only
    /// shape that carries the flag.
    pub fn with_transient(mut self, transient: bool) -> Self {
        self.settings = self.settings.to_global();
        if let Settings::Global(s) = &mut self.settings {
            s.transient = transient;
        }
        self
    }

    pub fn kind(&self) -> ParameterKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_read_only(&self) -> bool {
        self.settings.read_only()
    }

    pub fn is_removable(&self) -> bool {
        self.settings.removable()
    }

    pub fn is_transient(&self) -> bool {
        matches!(self.settings, Settings::Global(GlobalSettings { transient: true, .. }))
    }

    pub fn is_global(&self) -> bool {
        matches!(self.settings, Settings::Global(_))
    }

    pub fn to_local(mut self) -> Self {
        self.settings = self.settings.to_local();
        self
    }

    pub fn to_global(mut self) -> Self {
        self.settings = self.settings.to_global();
        self
    }

    /// Hash over kind, canonical value and capability flags. The starting
    /// hash itself is not part of the identity.
    pub fn identity_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.kind.hash(&mut hasher);
        self.value.to_string().hash(&mut hasher);
        self.settings.read_only().hash(&mut hasher);
        self.settings.removable().hash(&mut hasher);
        self.is_transient().hash(&mut hasher);
        hasher.finish()
    }

    pub fn starting_hash(&self) -> Option<u64> {
        match self.settings {
            Settings::Global(s) => s.starting_hash,
            Settings::Local(_) => None,
        }
    }

    /// Pin the starting hash. Only meaningful in global shape.
    pub(crate) fn set_starting_hash(&mut self, hash: u64) {
        if let Settings::Global(s) = &mut self.settings {
            s.starting_hash = Some(hash);
        }
    }

    /// True when the value is unchanged since its starting hash was taken.
    pub fn is_equal_to_starting_hash(&self) -> bool {
        self.starting_hash() == Some(self.identity_hash())
    }
}


/// What callers hand to `set_parameter`: either a raw value the manager
/// wraps in its own family, or a ready-made parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterInput {
    Raw(Value),
    Param(Parameter),
}

impl From<Value> for ParameterInput {
    fn from(value: Value) -> Self {
        ParameterInput::Raw(value)
    }
}

impl From<Parameter> for ParameterInput {
    fn from(param: Parameter) -> Self {
        ParameterInput::Param(param)
    }
}

impl From<&str> for ParameterInput {
    fn from(value: &str) -> Self {
        ParameterInput::Raw(Value::String(value.to_string()))
    }
}

impl From<String> for ParameterInput {
    fn from(value: String) -> Self {
        ParameterInput::Raw(Value::String(value))
    }
}

impl From<i64> for ParameterInput {
    fn from(value: i64) -> Self {
        ParameterInput::Raw(Value::from(value))
    }
}

impl From<bool> for ParameterInput {
    fn from(value: bool) -> Self {
        ParameterInput::Raw(Value::Bool(value))
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_parameter_is_local_and_removable() {
        let p = Parameter::new(ParameterKind::Variable, json!("x"));
        assert!(!p.is_global());
        assert!(p.is_removable());
        assert!(!p.is_read_only());
        assert!(!p.is_transient());
    }

    #[test]
    fn shape_conversion_keeps_flags() {
        let p = Parameter::new(ParameterKind::Environment, json!(1))
            .with_read_only(true)
            .with_removable(false);
        let g = p.to_global();
        assert!(g.is_global());
        assert!(g.is_read_only());
        assert!(!g.is_removable());
        let l = g.to_local();
        assert!(!l.is_global());
        assert!(l.is_read_only());
        assert!(!l.is_removable());
    }

    #[test]
    fn transient_forces_global_shape() {
        let p = Parameter::new(ParameterKind::Context, json!(true)).with_transient(true);
        assert!(p.is_global());
        assert!(p.is_transient());
        assert!(!p.to_local().is_transient());
    }

    #[test]
    fn identity_hash_tracks_value() {
        let a = Parameter::new(ParameterKind::Variable, json!("x"));
        let b = Parameter::new(ParameterKind::Variable, json!("x"));
        let c = Parameter::new(ParameterKind::Variable, json!("y"));
        assert_eq!(a.identity_hash(), b.identity_hash());
        assert_ne!(a.identity_hash(), c.identity_hash());
    }

    #[test]
    fn identity_hash_tracks_kind_and_flags() {
        let a = Parameter::new(ParameterKind::Variable, json!("x"));
        let k = Parameter::new(ParameterKind::Key, json!("x"));
        let ro = a.clone().with_read_only(true);
        assert_ne!(a.identity_hash(), k.identity_hash());
        assert_ne!(a.identity_hash(), ro.identity_hash());
    }

    #[test]
    fn starting_hash_comparison() {
        let mut p = Parameter::new(ParameterKind::Variable, json!("x")).to_global();
        assert!(!p.is_equal_to_starting_hash());
        let h = p.identity_hash();
        p.set_starting_hash(h);
        assert!(p.is_equal_to_starting_hash());
        p.set_starting_hash(h.wrapping_add(1));
        assert!(!p.is_equal_to_starting_hash());
    }

    #[test]
    fn starting_hash_ignored_in_local_shape() {
        let mut p = Parameter::new(ParameterKind::Variable, json!("x"));
        p.set_starting_hash(42);
        assert_eq!(p.starting_hash(), None);
    }

    #[test]
    fn kind_from_short_names() {
        assert_eq!("env".parse::<ParameterKind>().unwrap(), ParameterKind::Environment);
        assert_eq!("procedure".parse::<ParameterKind>().unwrap(), ParameterKind::Procedure);
        assert!("alias".parse::<ParameterKind>().is_err());
    }

    #[test]
    fn input_conversions() {
        assert_eq!(ParameterInput::from("a"), ParameterInput::Raw(json!("a")));
        assert_eq!(ParameterInput::from(3i64), ParameterInput::Raw(json!(3)));
        assert_eq!(ParameterInput::from(true), ParameterInput::Raw(json!(true)));
    }
}
