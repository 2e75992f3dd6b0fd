//! Scope and ownership identities, and the parent-manager seam.

use std::fmt;
use std::sync::Arc;
use std::thread::ThreadId;

use serde::{Deserialize, Serialize};

use super::error::StoreError;


/// Identity of the execution context that owns local values.
///
/// In practice the calling thread, optionally refined by call-frame depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    thread: ThreadId,
    frame: usize,
}

impl ScopeKey {
    pub fn new(thread: ThreadId, frame: usize) -> Self {
        ScopeKey { thread, frame }
    }

    /// Base frame of the calling thread.
    pub fn current_thread() -> Self {
        Self::new(std::thread::current().id(), 0)
    }

    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    pub fn frame(&self) -> usize {
        self.frame
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.thread, self.frame)
    }
}


/// Name of the subsystem (usually a loader) that owns a global value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(String);

impl GroupId {
    pub fn new(name: impl Into<String>) -> Self {
        GroupId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(name: &str) -> Self {
        GroupId::new(name)
    }
}

impl From<String> for GroupId {
    fn from(name: String) -> Self {
        GroupId(name)
    }
}


/// What a manager needs from the shell that owns it.
///
/// The check hooks run while the manager holds its lock. They must never
/// call back into the same manager.
pub trait ParentManager: Send + Sync {
    /// Scope of the caller, used to partition local values.
    fn current_id(&self) -> ScopeKey;

    /// Group used for global writes that name no group.
    fn default_group_name(&self) -> GroupId;

    fn check_for_set_global_parameter(
        &self,
        group: &GroupId,
        manager_name: &str,
    ) -> Result<(), StoreError>;

    fn check_for_unset_global_parameter(
        &self,
        group: &GroupId,
        manager_name: &str,
    ) -> Result<(), StoreError>;
}


/// Type-erased carrier for a parent manager, for collaborators handed
/// around as `dyn Any` (addon contexts).
#[derive(Clone)]
pub struct ParentHandle(pub Arc<dyn ParentManager>);

impl fmt::Debug for ParentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParentHandle")
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_keys_differ_by_frame() {
        let base = ScopeKey::current_thread();
        let inner = ScopeKey::new(base.thread(), 1);
        assert_ne!(base, inner);
        assert_eq!(base.frame(), 0);
    }

    #[test]
    fn scope_keys_differ_by_thread() {
        let here = ScopeKey::current_thread();
        let there = std::thread::spawn(ScopeKey::current_thread).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn group_id_display_and_serde() {
        let g = GroupId::from("loader.ini");
        assert_eq!(g.to_string(), "loader.ini");
        assert_eq!(serde_json::to_string(&g).unwrap(), "\"loader.ini\"");
        assert!(GroupId::new("").is_empty());
    }
}
