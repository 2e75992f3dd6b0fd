//! One entry of the store: a shared slot, per-scope slots, and the
//! ownership/freeze metadata loaders rely on.

use std::collections::HashMap;

use super::error::StoreError;
use super::parameter::Parameter;
use super::path::ParameterPath;
use super::scope::{GroupId, ScopeKey};


/// The value stored at one trie path.
///
/// Invariants:
/// - removable iff no global value, no local value and not frozen;
/// - `origin_group` is set whenever a global value or a starting hash is;
/// - the starting hash only changes through `unfreeze` by the owning group.
#[derive(Debug, Clone)]
pub struct ParameterNode {
    path: ParameterPath,
    global_var: Option<Parameter>,
    local_var: HashMap<ScopeKey, Parameter>,
    origin_group: Option<GroupId>,
    starting_hash: Option<u64>,
}

impl ParameterNode {
    pub fn new(path: ParameterPath) -> Self {
        ParameterNode {
            path,
            global_var: None,
            local_var: HashMap::new(),
            origin_group: None,
            starting_hash: None,
        }
    }

    pub fn path(&self) -> &ParameterPath {
        &self.path
    }

    pub fn origin_group(&self) -> Option<&GroupId> {
        self.origin_group.as_ref()
    }

    pub fn starting_hash(&self) -> Option<u64> {
        self.starting_hash
    }

    pub fn global_var(&self) -> Option<&Parameter> {
        self.global_var.as_ref()
    }

    pub fn local_var(&self, key: &ScopeKey) -> Option<&Parameter> {
        self.local_var.get(key)
    }

    pub fn is_removable(&self) -> bool {
        self.global_var.is_none() && self.local_var.is_empty() && self.starting_hash.is_none()
    }

    pub fn is_frozen(&self) -> bool {
        self.starting_hash.is_some()
    }

    /// Store `param` in the slot of `key`.
    ///
    /// Only a read-only entry blocks the overwrite. Non-removable entries
    /// can still be replaced; removability gates deletion.
    pub fn set_local_var(&mut self, key: ScopeKey, param: Parameter) -> Result<&Parameter, StoreError> {
        if let Some(existing) = self.local_var.get(&key) {
            if existing.is_read_only() {
                return Err(StoreError::ReadOnlyViolation {
                    path: self.path.to_dotted(),
                });
            }
        }
        self.local_var.insert(key, param.to_local());
        Ok(&self.local_var[&key])
    }

    /// Store `param` in the shared slot on behalf of `origin_group`.
    ///
    /// On a frozen node the stored parameter carries the frozen hash, so
    /// the owner can later tell whether someone changed the value.
    pub fn set_global_var(
        &mut self,
        param: Parameter,
        origin_group: &GroupId,
        freeze: bool,
    ) -> Result<&Parameter, StoreError> {
        if self.global_var.as_ref().map_or(false, Parameter::is_read_only) {
            return Err(StoreError::ReadOnlyViolation {
                path: self.path.to_dotted(),
            });
        }
        if freeze && self.is_frozen() {
            return Err(StoreError::AlreadyFrozen {
                path: self.path.to_dotted(),
            });
        }
        if origin_group.is_empty() {
            return Err(StoreError::InvalidGroup {
                path: self.path.to_dotted(),
            });
        }
        if let Some(owner) = &self.origin_group {
            if owner != origin_group {
                return Err(StoreError::OwnershipConflict {
                    path: self.path.to_dotted(),
                    owner: owner.to_string(),
                    requested: origin_group.to_string(),
                });
            }
        }

        let mut param = param.to_global();
        match self.starting_hash {
            Some(frozen) => param.set_starting_hash(frozen),
            None => {
                let hash = param.identity_hash();
                param.set_starting_hash(hash);
                if freeze {
                    self.starting_hash = Some(hash);
                }
            }
        }
        self.origin_group = Some(origin_group.clone());
        Ok(self.global_var.insert(param))
    }

    /// Clear the shared slot. The owner stays bound while the node is frozen.
    pub fn unset_global_var(&mut self, force: bool) -> Result<Option<Parameter>, StoreError> {
        if let Some(existing) = &self.global_var {
            if !force && !existing.is_removable() {
                return Err(StoreError::NotRemovable {
                    path: self.path.to_dotted(),
                });
            }
        }
        let removed = self.global_var.take();
        if !self.is_frozen() {
            self.origin_group = None;
        }
        Ok(removed)
    }

    pub fn unset_local_var(&mut self, key: &ScopeKey, force: bool) -> Result<Option<Parameter>, StoreError> {
        if let Some(existing) = self.local_var.get(key) {
            if !force && !existing.is_removable() {
                return Err(StoreError::NotRemovable {
                    path: self.path.to_dotted(),
                });
            }
        }
        Ok(self.local_var.remove(key))
    }

    /// Drop the slot of `key` unconditionally. Used when a scope ends.
    pub fn clear_local_var(&mut self, key: &ScopeKey) -> Option<Parameter> {
        self.local_var.remove(key)
    }

    /// Release the freeze held by `origin_group`. No-op on a node that is
    /// not frozen.
    pub fn unfreeze(&mut self, origin_group: &GroupId) -> Result<(), StoreError> {
        if !self.is_frozen() {
            return Ok(());
        }
        if self.origin_group.as_ref() != Some(origin_group) {
            return Err(StoreError::WrongGroup {
                path: self.path.to_dotted(),
                given: origin_group.to_string(),
                owner: self.owner_label(),
            });
        }
        self.starting_hash = None;
        if self.global_var.is_none() {
            self.origin_group = None;
        }
        Ok(())
    }

    pub(crate) fn owner_label(&self) -> String {
        self.origin_group
            .as_ref()
            .map(GroupId::to_string)
            .unwrap_or_else(|| "<none>".to_string())
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::parameter::ParameterKind;
    use serde_json::json;

    fn node() -> ParameterNode {
        ParameterNode::new(ParameterPath::parse("a.b").unwrap())
    }

    fn var(v: serde_json::Value) -> Parameter {
        Parameter::new(ParameterKind::Variable, v)
    }

    fn scope(frame: usize) -> ScopeKey {
        ScopeKey::new(std::thread::current().id(), frame)
    }

    #[test]
    fn fresh_node_is_removable() {
        let n = node();
        assert!(n.is_removable());
        assert!(!n.is_frozen());
    }

    #[test]
    fn local_set_converts_shape() {
        let mut n = node();
        let stored = n.set_local_var(scope(0), var(json!(1)).to_global()).unwrap();
        assert!(!stored.is_global());
        assert!(!n.is_removable());
    }

    #[test]
    fn read_only_local_blocks_overwrite() {
        let mut n = node();
        n.set_local_var(scope(0), var(json!(1)).with_read_only(true)).unwrap();
        assert!(matches!(
            n.set_local_var(scope(0), var(json!(2))),
            Err(StoreError::ReadOnlyViolation { .. })
        ));
        // Other scopes are unaffected.
        assert!(n.set_local_var(scope(1), var(json!(3))).is_ok());
    }

    #[test]
    fn non_removable_local_can_be_replaced_but_not_unset() {
        let mut n = node();
        n.set_local_var(scope(0), var(json!(1)).with_removable(false)).unwrap();
        n.set_local_var(scope(0), var(json!(2))).unwrap();
        assert_eq!(n.local_var(&scope(0)).unwrap().value(), &json!(2));

        n.set_local_var(scope(0), var(json!(3)).with_removable(false)).unwrap();
        assert!(matches!(
            n.unset_local_var(&scope(0), false),
            Err(StoreError::NotRemovable { .. })
        ));
        assert!(n.unset_local_var(&scope(0), true).unwrap().is_some());
        assert!(n.is_removable());
    }

    #[test]
    fn global_set_binds_group() {
        let mut n = node();
        n.set_global_var(var(json!(1)), &GroupId::from("sys"), false).unwrap();
        assert_eq!(n.origin_group(), Some(&GroupId::from("sys")));
        assert!(!n.is_frozen());
        assert!(n.global_var().unwrap().is_equal_to_starting_hash());
    }

    #[test]
    fn global_set_rejects_other_group() {
        let mut n = node();
        n.set_global_var(var(json!(1)), &GroupId::from("a"), false).unwrap();
        match n.set_global_var(var(json!(2)), &GroupId::from("b"), false) {
            Err(StoreError::OwnershipConflict { owner, requested, .. }) => {
                assert_eq!(owner, "a");
                assert_eq!(requested, "b");
            }
            other => panic!("expected OwnershipConflict, got {:?}", other),
        }
        assert_eq!(n.global_var().unwrap().value(), &json!(1));
    }

    #[test]
    fn global_set_rejects_empty_group() {
        let mut n = node();
        assert!(matches!(
            n.set_global_var(var(json!(1)), &GroupId::new(""), false),
            Err(StoreError::InvalidGroup { .. })
        ));
        assert!(n.is_removable());
    }

    #[test]
    fn read_only_global_blocks_overwrite() {
        let mut n = node();
        n.set_global_var(var(json!(1)).with_read_only(true), &GroupId::from("a"), false)
            .unwrap();
        assert!(matches!(
            n.set_global_var(var(json!(2)), &GroupId::from("a"), false),
            Err(StoreError::ReadOnlyViolation { .. })
        ));
    }

    #[test]
    fn freeze_pins_starting_hash() {
        let mut n = node();
        let g = GroupId::from("loader");
        n.set_global_var(var(json!("orig")), &g, true).unwrap();
        let frozen = n.starting_hash().unwrap();
        assert!(n.is_frozen());

        let stored = n.set_global_var(var(json!("changed")), &g, false).unwrap();
        assert_eq!(stored.starting_hash(), Some(frozen));
        assert!(!stored.is_equal_to_starting_hash());

        let stored = n.set_global_var(var(json!("orig")), &g, false).unwrap();
        assert!(stored.is_equal_to_starting_hash());
    }

    #[test]
    fn freezing_twice_fails() {
        let mut n = node();
        let g = GroupId::from("loader");
        n.set_global_var(var(json!(1)), &g, true).unwrap();
        assert!(matches!(
            n.set_global_var(var(json!(1)), &g, true),
            Err(StoreError::AlreadyFrozen { .. })
        ));
    }

    #[test]
    fn unset_global_keeps_owner_while_frozen() {
        let mut n = node();
        let g = GroupId::from("loader");
        n.set_global_var(var(json!(1)), &g, true).unwrap();
        n.unset_global_var(false).unwrap();
        assert_eq!(n.origin_group(), Some(&g));
        assert!(!n.is_removable());

        assert!(matches!(
            n.unfreeze(&GroupId::from("other")),
            Err(StoreError::WrongGroup { .. })
        ));
        n.unfreeze(&g).unwrap();
        assert_eq!(n.origin_group(), None);
        assert!(n.is_removable());
    }

    #[test]
    fn unset_global_clears_owner_when_not_frozen() {
        let mut n = node();
        n.set_global_var(var(json!(1)), &GroupId::from("a"), false).unwrap();
        let removed = n.unset_global_var(false).unwrap();
        assert_eq!(removed.unwrap().value(), &json!(1));
        assert_eq!(n.origin_group(), None);
        assert!(n.is_removable());
    }

    #[test]
    fn non_removable_global_needs_force() {
        let mut n = node();
        n.set_global_var(var(json!(1)).with_removable(false), &GroupId::from("a"), false)
            .unwrap();
        assert!(n.unset_global_var(false).is_err());
        assert!(n.unset_global_var(true).unwrap().is_some());
    }

    #[test]
    fn unfreeze_keeps_owner_with_global_value() {
        let mut n = node();
        let g = GroupId::from("loader");
        n.set_global_var(var(json!(1)), &g, true).unwrap();
        n.unfreeze(&g).unwrap();
        assert!(!n.is_frozen());
        assert_eq!(n.origin_group(), Some(&g));
    }

    #[test]
    fn unfreeze_on_unfrozen_node_is_noop() {
        let mut n = node();
        assert!(n.unfreeze(&GroupId::from("any")).is_ok());
    }
}
