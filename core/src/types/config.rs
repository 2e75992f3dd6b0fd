use serde::{Deserialize, Serialize};

/// How the shell derives the scope key of a caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    /// One local scope per thread.
    Thread,
    /// One local scope per call frame of each thread.
    ThreadAndFrame,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    /// Group that owns global writes naming no group.
    pub default_group: String,
    pub scope_mode: ScopeMode,
    /// Maximum tracing level: error, warn, info, debug or trace.
    pub log_level: String,
    /// Groups allowed to write globals without registering first.
    pub trusted_groups: Vec<String>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            default_group: "shell".into(),
            scope_mode: ScopeMode::ThreadAndFrame,
            log_level: "warn".into(),
            trusted_groups: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip() {
        let settings = StoreSettings {
            default_group: "core".into(),
            scope_mode: ScopeMode::Thread,
            log_level: "debug".into(),
            trusted_groups: vec!["addon.ssh".into()],
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: StoreSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn scope_mode_serde() {
        let json = serde_json::to_string(&ScopeMode::ThreadAndFrame).unwrap();
        assert_eq!(json, "\"thread_and_frame\"");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let s: StoreSettings = serde_json::from_str("{\"log_level\": \"info\"}").unwrap();
        assert_eq!(s.log_level, "info");
        assert_eq!(s.default_group, "shell");
        assert_eq!(s.scope_mode, ScopeMode::ThreadAndFrame);
    }
}
