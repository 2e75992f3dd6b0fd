//! Loader side of the freeze protocol.
//!
//! A loader owns a group. Everything it loads is stored as a frozen global
//! value, so on unload it can tell which entries the user changed (their
//! identity hash no longer matches the starting hash) and which ones the
//! user deleted (frozen placeholders without a value).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::container::{ParameterContainer, ScopedStore};
use super::error::StoreError;
use super::parameter::{Parameter, ParameterInput, ParameterKind};
use super::scope::GroupId;
use super::store::{LookupOptions, SetOptions, UnsetOptions};


/// Dotted path to raw value, as read from or written to a loader's source.
pub type Snapshot = BTreeMap<String, Value>;


/// What an unload leaves for the loader to persist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnloadReport {
    /// Entries whose value changed since they were loaded.
    pub changed: Snapshot,
    /// Entries that were loaded and later unset.
    pub removed: Vec<String>,
}


#[derive(Debug, Clone)]
pub struct GroupLoader {
    group: GroupId,
    kind: ParameterKind,
}

impl GroupLoader {
    pub fn new(group: impl Into<GroupId>, kind: ParameterKind) -> Self {
        GroupLoader {
            group: group.into(),
            kind,
        }
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    /// Store every entry as a frozen global owned by this loader's group.
    ///
    /// All or nothing: when one entry fails, the entries already written are
    /// taken back and the values they replaced restored.
    pub fn load(&self, container: &ParameterContainer, snapshot: &Snapshot) -> Result<usize, StoreError> {
        let registered = container.registry().register_group(&self.group);
        let manager = container.manager(self.kind);
        let mut written = Vec::with_capacity(snapshot.len());
        for (path, value) in snapshot {
            if let Err(err) = self.load_entry(manager, path, value, &mut written) {
                self.roll_back(manager, written);
                if registered {
                    container.registry().unregister_group(&self.group);
                }
                warn!(group = %self.group, manager = manager.name(), path = %path, error = %err, "snapshot load failed");
                return Err(err);
            }
        }
        info!(group = %self.group, manager = manager.name(), entries = snapshot.len(), "snapshot loaded");
        Ok(snapshot.len())
    }

    fn load_entry<'a>(
        &self,
        manager: &dyn ScopedStore,
        path: &'a str,
        value: &Value,
        written: &mut Vec<(&'a str, Option<Parameter>)>,
    ) -> Result<(), StoreError> {
        let previous = manager.get(path, LookupOptions::global().exact().scope_only())?;
        manager.set(
            path,
            ParameterInput::Raw(value.clone()),
            SetOptions::global().group(self.group.clone()).frozen(),
        )?;
        written.push((path, previous));
        Ok(())
    }

    fn roll_back(&self, manager: &dyn ScopedStore, written: Vec<(&str, Option<Parameter>)>) {
        for (path, previous) in written.into_iter().rev() {
            let taken = manager.unset(
                path,
                UnsetOptions::global()
                    .scope_only()
                    .forced()
                    .unfreezing()
                    .group(self.group.clone()),
            );
            let restored = match (taken, previous) {
                (Ok(_), Some(previous)) => manager
                    .set(path, ParameterInput::Param(previous), SetOptions::global().group(self.group.clone()))
                    .map(|_| ()),
                (taken, _) => taken.map(|_| ()),
            };
            if let Err(err) = restored {
                warn!(group = %self.group, path, error = %err, "rollback incomplete");
            }
        }
    }

    /// Entries changed or unset since the last load, without touching the
    /// store.
    pub fn pending(&self, container: &ParameterContainer) -> Result<UnloadReport, StoreError> {
        let manager = container.manager(self.kind);
        let mut report = UnloadReport::default();
        for path in manager.group_nodes(&self.group) {
            let dotted = path.to_dotted();
            let lookup = LookupOptions::global().exact().scope_only();
            match manager.get(&dotted, lookup)? {
                None => report.removed.push(dotted),
                Some(param) => {
                    if !param.is_equal_to_starting_hash() && !param.is_transient() {
                        report.changed.insert(dotted, param.into_value());
                    }
                }
            }
        }
        Ok(report)
    }

    /// Give back everything this loader placed in the store.
    ///
    /// Untouched entries are removed. Changed entries stay, unfrozen, and are
    /// reported with the deleted ones so the caller can persist them.
    pub fn unload(&self, container: &ParameterContainer) -> Result<UnloadReport, StoreError> {
        let report = self.pending(container)?;
        let manager = container.manager(self.kind);
        for path in manager.group_nodes(&self.group) {
            let dotted = path.to_dotted();
            if report.changed.contains_key(&dotted) || report.removed.contains(&dotted) {
                continue;
            }
            manager.unset(
                &dotted,
                UnsetOptions::global()
                    .scope_only()
                    .forced()
                    .unfreezing()
                    .group(self.group.clone()),
            )?;
        }
        manager.clear_frozen(&self.group)?;
        container.registry().unregister_group(&self.group);
        info!(
            group = %self.group,
            changed = report.changed.len(),
            removed = report.removed.len(),
            "loader unloaded"
        );
        Ok(report)
    }

    /// Apply a fresh snapshot: drop the previous freezes (and the
    /// placeholders nobody refilled), then load again.
    pub fn reload(&self, container: &ParameterContainer, snapshot: &Snapshot) -> Result<usize, StoreError> {
        container.manager(self.kind).clear_frozen(&self.group)?;
        self.load(container, snapshot)
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
