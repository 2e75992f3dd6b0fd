//! Failures raised by the parameter store.

use super::parameter::ParameterKind;

/// Every way a store operation can fail.
///
/// All variants are synchronous, local failures. The store never retries;
/// callers decide whether to log, abort, or roll back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("ambiguous token '{token}' after '{prefix}', candidates: {}", .candidates.join(", "))]
    AmbiguousPath {
        token: String,
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("unknown path, token '{token}' not found after '{existing}'")]
    UnknownPath { token: String, existing: String },

    #[error("manager '{manager}' does not accept {found} parameters")]
    TypeMismatch { manager: String, found: ParameterKind },

    #[error("invalid value for {kind} parameter: {reason}")]
    InvalidValue { kind: ParameterKind, reason: String },

    #[error("parameter '{path}' is read only")]
    ReadOnlyViolation { path: String },

    #[error("parameter '{path}' is not removable")]
    NotRemovable { path: String },

    #[error("parameter '{path}' is already frozen")]
    AlreadyFrozen { path: String },

    #[error("group '{given}' does not own '{path}' (owner: {owner})")]
    WrongGroup {
        path: String,
        given: String,
        owner: String,
    },

    #[error("parameter '{path}' belongs to group '{owner}', group '{requested}' cannot take it")]
    OwnershipConflict {
        path: String,
        owner: String,
        requested: String,
    },

    #[error("invalid origin group for '{path}': group name is empty")]
    InvalidGroup { path: String },

    #[error("{0}")]
    ScopeMismatch(String),

    #[error("invalid collaborator: expected a parent manager, got {0}")]
    InvalidCollaborator(String),

    #[error("group '{group}' is not allowed to alter {manager} parameters")]
    Unauthorized { group: String, manager: String },

    #[error("no call frame to leave")]
    ScopeUnderflow,
}

impl StoreError {
    /// Short machine-readable name of the failure, used by the command surface.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::InvalidPath { .. } => "invalid_path",
            StoreError::AmbiguousPath { .. } => "ambiguous_path",
            StoreError::UnknownPath { .. } => "unknown_path",
            StoreError::TypeMismatch { .. } | StoreError::InvalidValue { .. } => "type_mismatch",
            StoreError::ReadOnlyViolation { .. } => "read_only",
            StoreError::NotRemovable { .. } => "not_removable",
            StoreError::AlreadyFrozen { .. } => "already_frozen",
            StoreError::WrongGroup { .. } => "wrong_group",
            StoreError::OwnershipConflict { .. } => "ownership_conflict",
            StoreError::InvalidGroup { .. } => "invalid_group",
            StoreError::ScopeMismatch(_) => "scope_mismatch",
            StoreError::InvalidCollaborator(_) => "invalid_collaborator",
            StoreError::Unauthorized { .. } => "unauthorized",
            StoreError::ScopeUnderflow => "scope_underflow",
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_message_lists_candidates() {
        let err = StoreError::AmbiguousPath {
            token: "en".into(),
            prefix: "shell".into(),
            candidates: vec!["enable".into(), "env".into()],
        };
        assert_eq!(
            err.to_string(),
            "ambiguous token 'en' after 'shell', candidates: enable, env"
        );
        assert_eq!(err.code(), "ambiguous_path");
    }

    #[test]
    fn type_mismatch_names_kind() {
        let err = StoreError::TypeMismatch {
            manager: "variable".into(),
            found: ParameterKind::Key,
        };
        assert!(err.to_string().contains("key"));
    }
}
