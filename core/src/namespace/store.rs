//! Scoped parameter manager.
//!
//! Nodes live in an arena keyed by `NodeId`. The trie maps paths to ids and
//! two reverse indices map scopes and owner groups to the ids they touch.
//! Every public operation holds the manager lock for its whole duration.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace, warn};

use super::error::StoreError;
use super::family::ParameterFamily;
use super::node::ParameterNode;
use super::parameter::{Parameter, ParameterInput};
use super::path::{split_prefix, ParameterPath};
use super::scope::{GroupId, ParentHandle, ParentManager, ScopeKey};
use super::trie::{MultiLevelTrie, SearchResult};


/// Stable arena index of a node. Never reused within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);


/// Options for `set_parameter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetOptions {
    pub local: bool,
    pub origin_group: Option<GroupId>,
    pub freeze: bool,
}

impl Default for SetOptions {
    fn default() -> Self {
        SetOptions {
            local: true,
            origin_group: None,
            freeze: false,
        }
    }
}

impl SetOptions {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn global() -> Self {
        SetOptions {
            local: false,
            ..Self::default()
        }
    }

    pub fn group(mut self, group: impl Into<GroupId>) -> Self {
        self.origin_group = Some(group.into());
        self
    }

    pub fn frozen(mut self) -> Self {
        self.freeze = true;
        self
    }
}


/// Options for `get_parameter` and `has_parameter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupOptions {
    /// Require every token to equal a key, no abbreviation.
    pub perfect_match: bool,
    pub local: bool,
    /// Fall back to the other scope when the requested one is empty.
    pub explore_other_scope: bool,
    pub raise_if_ambiguous: bool,
}

impl Default for LookupOptions {
    fn default() -> Self {
        LookupOptions {
            perfect_match: false,
            local: true,
            explore_other_scope: true,
            raise_if_ambiguous: true,
        }
    }
}

impl LookupOptions {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn global() -> Self {
        LookupOptions {
            local: false,
            ..Self::default()
        }
    }

    pub fn exact(mut self) -> Self {
        self.perfect_match = true;
        self
    }

    pub fn scope_only(mut self) -> Self {
        self.explore_other_scope = false;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.raise_if_ambiguous = false;
        self
    }
}


/// Options for `unset_parameter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsetOptions {
    pub local: bool,
    pub explore_other_scope: bool,
    pub force: bool,
    pub origin_group: Option<GroupId>,
    pub unfreeze: bool,
}

impl Default for UnsetOptions {
    fn default() -> Self {
        UnsetOptions {
            local: true,
            explore_other_scope: true,
            force: false,
            origin_group: None,
            unfreeze: false,
        }
    }
}

impl UnsetOptions {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn global() -> Self {
        UnsetOptions {
            local: false,
            ..Self::default()
        }
    }

    pub fn group(mut self, group: impl Into<GroupId>) -> Self {
        self.origin_group = Some(group.into());
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn unfreezing(mut self) -> Self {
        self.unfreeze = true;
        self
    }

    pub fn scope_only(mut self) -> Self {
        self.explore_other_scope = false;
        self
    }
}


#[derive(Debug, Default)]
struct StoreState {
    trie: MultiLevelTrie<NodeId>,
    nodes: HashMap<NodeId, ParameterNode>,
    next_id: u64,
    thread_local_var: HashMap<ScopeKey, HashSet<NodeId>>,
    group_global_var: HashMap<GroupId, HashSet<NodeId>>,
}

impl StoreState {
    /// Give a brand-new node an id and make it reachable.
    fn attach(&mut self, node: ParameterNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.trie.insert(node.path().tokens(), id);
        self.nodes.insert(id, node);
        id
    }

    /// Drop the node from the trie and the arena once it holds nothing.
    fn detach_if_removable(&mut self, id: NodeId) {
        let removable = self.nodes.get(&id).map_or(false, ParameterNode::is_removable);
        if !removable {
            return;
        }
        if let Some(node) = self.nodes.remove(&id) {
            self.trie.remove(node.path().tokens());
            trace!(path = %node.path(), "node removed");
        }
    }

    fn unregister_scope(&mut self, key: &ScopeKey, id: NodeId) {
        if let Some(ids) = self.thread_local_var.get_mut(key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.thread_local_var.remove(key);
            }
        }
    }

    fn unregister_group(&mut self, group: &GroupId, id: NodeId) {
        if let Some(ids) = self.group_global_var.get_mut(group) {
            ids.remove(&id);
            if ids.is_empty() {
                self.group_global_var.remove(group);
            }
        }
    }

    /// Run `write` against the node at `existing`, or against a fresh node
    /// that is attached only if `write` succeeds.
    fn write_node<T>(
        &mut self,
        existing: Option<NodeId>,
        path: &ParameterPath,
        write: impl FnOnce(&mut ParameterNode) -> Result<T, StoreError>,
    ) -> Result<(NodeId, T), StoreError> {
        if let Some(id) = existing {
            if let Some(node) = self.nodes.get_mut(&id) {
                let out = write(node)?;
                return Ok((id, out));
            }
        }
        let mut node = ParameterNode::new(path.clone());
        let out = write(&mut node)?;
        Ok((self.attach(node), out))
    }

    fn sorted_paths(&self, ids: Option<&HashSet<NodeId>>) -> Vec<ParameterPath> {
        let mut paths: Vec<ParameterPath> = ids
            .into_iter()
            .flatten()
            .filter_map(|id| self.nodes.get(id).map(|n| n.path().clone()))
            .collect();
        paths.sort();
        paths
    }
}


/// Hierarchical, path-addressed store for one parameter family.
pub struct ParameterManager<F: ParameterFamily> {
    parent: Arc<dyn ParentManager>,
    state: Mutex<StoreState>,
    family: PhantomData<F>,
}

impl<F: ParameterFamily> ParameterManager<F> {
    pub fn new(parent: Arc<dyn ParentManager>) -> Self {
        ParameterManager {
            parent,
            state: Mutex::new(StoreState::default()),
            family: PhantomData,
        }
    }

    /// Build a manager from a type-erased collaborator, which must be a
    /// `ParentHandle`.
    pub fn from_collaborator(collaborator: &dyn Any) -> Result<Self, StoreError> {
        match collaborator.downcast_ref::<ParentHandle>() {
            Some(handle) => Ok(Self::new(Arc::clone(&handle.0))),
            None => Err(StoreError::InvalidCollaborator(format!(
                "{:?}",
                collaborator.type_id()
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        F::NAME
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parse `path` and walk it down the trie, raising on ambiguity or on a
    /// missing node as requested.
    fn advance(
        &self,
        state: &StoreState,
        path: &str,
        perfect_match: bool,
        raise_if_ambiguous: bool,
        raise_if_not_found: bool,
    ) -> Result<(ParameterPath, SearchResult<NodeId>), StoreError> {
        let parsed = ParameterPath::parse(path)?;
        let tokens = parsed.tokens();
        let result = state.trie.search(tokens, perfect_match);
        let next_token = || {
            tokens
                .get(result.matched_token_count)
                .or_else(|| tokens.last())
                .cloned()
                .unwrap_or_default()
        };

        if raise_if_ambiguous && result.ambiguous {
            return Err(StoreError::AmbiguousPath {
                token: next_token(),
                prefix: result.matched_path.join("."),
                candidates: result.candidates,
            });
        }
        if raise_if_not_found && !result.found {
            return Err(StoreError::UnknownPath {
                token: next_token(),
                existing: result.matched_path.join("."),
            });
        }
        Ok((parsed, result))
    }

    fn select<'a>(
        node: &'a ParameterNode,
        key: &ScopeKey,
        local: bool,
        explore_other_scope: bool,
    ) -> Option<&'a Parameter> {
        let pick = |local: bool| {
            if local {
                node.local_var(key)
            } else {
                node.global_var()
            }
        };
        pick(local).or_else(|| {
            if explore_other_scope {
                pick(!local)
            } else {
                None
            }
        })
    }

    // -------------------------------------------------------------------
    // Writes
    // -------------------------------------------------------------------

    /// Store `value` at `path`, in the caller's scope or in the shared slot.
    ///
    /// A failed write on a new path leaves the store untouched; a failed
    /// write on an existing path keeps the previous value.
    pub fn set_parameter(
        &self,
        path: &str,
        value: impl Into<ParameterInput>,
        options: SetOptions,
    ) -> Result<Parameter, StoreError> {
        let param = F::coerce(value.into())?;
        if options.local && options.freeze {
            return Err(StoreError::ScopeMismatch(
                "a local parameter cannot be frozen".into(),
            ));
        }
        let path = ParameterPath::parse(path)?;

        let mut state = self.lock();
        let existing = state.trie.get(path.tokens()).copied();

        if options.local {
            let key = self.parent.current_id();
            let (id, stored) = state.write_node(existing, &path, |node| {
                node.set_local_var(key, param).cloned()
            })?;
            state.thread_local_var.entry(key).or_default().insert(id);
            debug!(manager = F::NAME, path = %path, scope = %key, "local parameter set");
            return Ok(stored);
        }

        let group = options
            .origin_group
            .unwrap_or_else(|| self.parent.default_group_name());
        self.parent.check_for_set_global_parameter(&group, F::NAME)?;

        let (id, (stored, previous_owner)) = state.write_node(existing, &path, |node| {
            let previous_owner = node.origin_group().cloned();
            let stored = node.set_global_var(param, &group, options.freeze)?.clone();
            Ok((stored, previous_owner))
        })?;
        state.group_global_var.entry(group.clone()).or_default().insert(id);
        if let Some(previous) = previous_owner {
            if previous != group {
                state.unregister_group(&previous, id);
            }
        }
        debug!(
            manager = F::NAME,
            path = %path,
            group = %group,
            freeze = options.freeze,
            "global parameter set"
        );
        Ok(stored)
    }

    /// Remove the value at exactly `path` and return it.
    ///
    /// Returns `None` only when a frozen placeholder without a global value
    /// is released with `unfreeze`.
    pub fn unset_parameter(
        &self,
        path: &str,
        options: UnsetOptions,
    ) -> Result<Option<Parameter>, StoreError> {
        if options.local && options.unfreeze {
            return Err(StoreError::ScopeMismatch(
                "unfreeze only applies to global parameters".into(),
            ));
        }

        let mut state = self.lock();
        let (parsed, result) = self.advance(&state, path, true, true, true)?;
        let unknown = || StoreError::UnknownPath {
            token: parsed.tokens().last().cloned().unwrap_or_default(),
            existing: parsed.to_dotted(),
        };
        let id = result.value.ok_or_else(unknown)?;
        let key = self.parent.current_id();

        let local = {
            let node = state.nodes.get(&id).ok_or_else(unknown)?;
            let has_local = node.local_var(&key).is_some();
            let has_global = node.global_var().is_some();
            let (wanted, other) = if options.local {
                (has_local, has_global)
            } else {
                (has_global, has_local)
            };
            if wanted {
                options.local
            } else if !options.local && options.unfreeze && node.is_frozen() {
                false
            } else if options.explore_other_scope && other && !options.unfreeze {
                !options.local
            } else {
                return Err(unknown());
            }
        };

        let removed = if local {
            self.unset_local(&mut state, id, &key, options.force)?
        } else {
            self.unset_global(&mut state, id, &options)?
        };
        state.detach_if_removable(id);
        Ok(removed)
    }

    fn unset_local(
        &self,
        state: &mut StoreState,
        id: NodeId,
        key: &ScopeKey,
        force: bool,
    ) -> Result<Option<Parameter>, StoreError> {
        let Some(node) = state.nodes.get_mut(&id) else {
            return Ok(None);
        };
        let removed = node.unset_local_var(key, force)?;
        debug!(manager = F::NAME, path = %node.path(), scope = %key, "local parameter unset");
        state.unregister_scope(key, id);
        Ok(removed)
    }

    fn unset_global(
        &self,
        state: &mut StoreState,
        id: NodeId,
        options: &UnsetOptions,
    ) -> Result<Option<Parameter>, StoreError> {
        let group = options
            .origin_group
            .clone()
            .unwrap_or_else(|| self.parent.default_group_name());
        self.parent.check_for_unset_global_parameter(&group, F::NAME)?;

        let Some(node) = state.nodes.get_mut(&id) else {
            return Ok(None);
        };
        if options.unfreeze && node.origin_group() != Some(&group) {
            return Err(StoreError::WrongGroup {
                path: node.path().to_dotted(),
                given: group.to_string(),
                owner: node.owner_label(),
            });
        }

        let bound = node.origin_group().cloned();
        let removed = node.unset_global_var(options.force)?;
        if options.unfreeze {
            node.unfreeze(&group)?;
        }
        let still_frozen = node.is_frozen();
        debug!(
            manager = F::NAME,
            path = %node.path(),
            group = %group,
            unfreeze = options.unfreeze,
            "global parameter unset"
        );
        if !still_frozen {
            if let Some(bound) = bound {
                state.unregister_group(&bound, id);
            }
        }
        Ok(removed)
    }

    /// Drop every local value of the caller's scope. Always succeeds and
    /// returns how many values were dropped.
    pub fn flush(&self) -> usize {
        let key = self.parent.current_id();
        let mut state = self.lock();
        let ids = state.thread_local_var.remove(&key).unwrap_or_default();
        let mut dropped = 0;
        for id in ids {
            if let Some(node) = state.nodes.get_mut(&id) {
                if node.clear_local_var(&key).is_some() {
                    dropped += 1;
                }
            }
            state.detach_if_removable(id);
        }
        if dropped > 0 {
            debug!(manager = F::NAME, scope = %key, dropped, "scope flushed");
        }
        dropped
    }

    /// Release every freeze held by `group`. Placeholders the group never
    /// refilled disappear; values it still holds stay, unfrozen.
    pub fn clear_frozen_node(&self, group: &GroupId) -> Result<usize, StoreError> {
        let mut state = self.lock();
        let ids: Vec<NodeId> = match state.group_global_var.get(group) {
            Some(ids) => ids.iter().copied().collect(),
            None => return Ok(0),
        };
        let mut released = 0;
        for id in ids {
            let Some(node) = state.nodes.get_mut(&id) else {
                state.unregister_group(group, id);
                continue;
            };
            if node.is_frozen() {
                node.unfreeze(group)?;
                released += 1;
            }
            if node.global_var().is_none() {
                state.unregister_group(group, id);
            }
            state.detach_if_removable(id);
        }
        if released > 0 {
            warn!(manager = F::NAME, group = %group, released, "frozen nodes released");
        }
        Ok(released)
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Resolve `path` and return the value visible to the caller.
    pub fn get_parameter(
        &self,
        path: &str,
        options: LookupOptions,
    ) -> Result<Option<Parameter>, StoreError> {
        let state = self.lock();
        let (_, result) = self.advance(
            &state,
            path,
            options.perfect_match,
            options.raise_if_ambiguous,
            false,
        )?;
        let Some(node) = result.value.and_then(|id| state.nodes.get(&id)) else {
            trace!(manager = F::NAME, path, "no node");
            return Ok(None);
        };
        let key = self.parent.current_id();
        Ok(Self::select(node, &key, options.local, options.explore_other_scope).cloned())
    }

    pub fn has_parameter(&self, path: &str, options: LookupOptions) -> Result<bool, StoreError> {
        Ok(self.get_parameter(path, options)?.is_some())
    }

    /// Every entry under `prefix` that resolves for the caller, keyed by
    /// dotted path.
    ///
    /// Prefix tokens abbreviate like lookups do. A prefix that matches
    /// nothing yields an empty map; one that abbreviates several keys is
    /// `AmbiguousPath`.
    pub fn build_dictionnary(
        &self,
        prefix: &str,
        local: bool,
        explore_other_scope: bool,
    ) -> Result<BTreeMap<String, Parameter>, StoreError> {
        let tokens = split_prefix(prefix)?;
        let key = self.parent.current_id();
        let state = self.lock();
        let result = state.trie.search(&tokens, false);
        if result.ambiguous {
            return Err(StoreError::AmbiguousPath {
                token: tokens[result.matched_token_count].clone(),
                prefix: result.matched_path.join("."),
                candidates: result.candidates,
            });
        }
        let mut out = BTreeMap::new();
        if result.matched_token_count < tokens.len() {
            return Ok(out);
        }
        for (_, id) in state.trie.enumerate_prefix(&result.matched_path) {
            let Some(node) = state.nodes.get(&id) else {
                continue;
            };
            if let Some(param) = Self::select(node, &key, local, explore_other_scope) {
                out.insert(node.path().to_dotted(), param.clone());
            }
        }
        Ok(out)
    }

    /// Group that owns the node at exactly `path`, if any.
    pub fn get_associated_group(&self, path: &str) -> Result<Option<GroupId>, StoreError> {
        let state = self.lock();
        let (_, result) = self.advance(&state, path, true, true, true)?;
        Ok(result
            .value
            .and_then(|id| state.nodes.get(&id))
            .and_then(|node| node.origin_group().cloned()))
    }

    /// Paths registered under `group`, sorted.
    pub fn get_group_nodes(&self, group: &GroupId) -> Vec<ParameterPath> {
        let state = self.lock();
        state.sorted_paths(state.group_global_var.get(group))
    }

    /// Paths holding a local value for `key`, sorted.
    pub fn scope_nodes(&self, key: &ScopeKey) -> Vec<ParameterPath> {
        let state = self.lock();
        state.sorted_paths(state.thread_local_var.get(key))
    }

    pub fn has_scope(&self, key: &ScopeKey) -> bool {
        self.lock().thread_local_var.contains_key(key)
    }

    pub fn groups(&self) -> Vec<GroupId> {
        let mut groups: Vec<GroupId> = self.lock().group_global_var.keys().cloned().collect();
        groups.sort();
        groups
    }

    /// Whether the node at exactly `path` is frozen.
    pub fn is_frozen(&self, path: &str) -> Result<bool, StoreError> {
        let state = self.lock();
        let (_, result) = self.advance(&state, path, true, true, true)?;
        Ok(result
            .value
            .and_then(|id| state.nodes.get(&id))
            .map_or(false, ParameterNode::is_frozen))
    }

    /// Every path with a node, whatever scope holds it.
    pub fn paths(&self) -> Vec<ParameterPath> {
        let state = self.lock();
        let mut paths: Vec<ParameterPath> = state.nodes.values().map(|n| n.path().clone()).collect();
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
