//! The shell side of the store: scope tracking, group authorization, and
//! one manager per parameter family.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::ThreadId;

use tracing::{debug, warn};

use super::error::StoreError;
use super::family::{Context, Environment, Key, ParameterFamily, Procedure, Variable};
use super::parameter::{Parameter, ParameterInput, ParameterKind};
use super::path::ParameterPath;
use super::scope::{GroupId, ParentManager, ScopeKey};
use super::store::{LookupOptions, ParameterManager, SetOptions, UnsetOptions};
use crate::types::config::{ScopeMode, StoreSettings};


/// Concrete parent manager: hands out scope keys per thread (and call
/// frame) and decides which groups may touch global values.
#[derive(Debug)]
pub struct ScopeRegistry {
    default_group: GroupId,
    mode: ScopeMode,
    frames: Mutex<HashMap<ThreadId, usize>>,
    trusted: HashSet<GroupId>,
    groups: RwLock<HashSet<GroupId>>,
}

impl ScopeRegistry {
    pub fn new(settings: &StoreSettings) -> Self {
        let trusted = settings
            .trusted_groups
            .iter()
            .map(|g| GroupId::new(g.as_str()))
            .collect();
        ScopeRegistry {
            default_group: GroupId::new(settings.default_group.as_str()),
            mode: settings.scope_mode,
            frames: Mutex::new(HashMap::new()),
            trusted,
            groups: RwLock::new(HashSet::new()),
        }
    }

    /// Allow `group` to write global values. Returns false when it already
    /// could.
    pub fn register_group(&self, group: &GroupId) -> bool {
        if self.is_authorized(group) {
            return false;
        }
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let added = groups.insert(group.clone());
        if added {
            debug!(group = %group, "group registered");
        }
        added
    }

    /// Withdraw a registration. Trusted groups and the default group stay
    /// authorized.
    pub fn unregister_group(&self, group: &GroupId) {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        if groups.remove(group) {
            debug!(group = %group, "group unregistered");
        }
    }

    pub fn is_authorized(&self, group: &GroupId) -> bool {
        *group == self.default_group
            || self.trusted.contains(group)
            || self
                .groups
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(group)
    }

    /// Call-frame depth of the calling thread.
    pub fn depth(&self) -> usize {
        let frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        frames.get(&std::thread::current().id()).copied().unwrap_or(0)
    }

    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    fn push_frame(&self) -> usize {
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        let depth = frames.entry(std::thread::current().id()).or_insert(0);
        *depth += 1;
        *depth
    }

    fn pop_frame(&self) -> Result<usize, StoreError> {
        let thread = std::thread::current().id();
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        match frames.get(&thread).copied() {
            None | Some(0) => Err(StoreError::ScopeUnderflow),
            Some(1) => {
                frames.remove(&thread);
                Ok(0)
            }
            Some(depth) => {
                frames.insert(thread, depth - 1);
                Ok(depth - 1)
            }
        }
    }

    fn authorize(&self, group: &GroupId, manager_name: &str, action: &str) -> Result<(), StoreError> {
        if self.is_authorized(group) {
            return Ok(());
        }
        warn!(group = %group, manager = manager_name, action, "global write refused");
        Err(StoreError::Unauthorized {
            group: group.to_string(),
            manager: manager_name.to_string(),
        })
    }
}

impl ParentManager for ScopeRegistry {
    fn current_id(&self) -> ScopeKey {
        let thread = std::thread::current().id();
        match self.mode {
            ScopeMode::Thread => ScopeKey::new(thread, 0),
            ScopeMode::ThreadAndFrame => ScopeKey::new(thread, self.depth()),
        }
    }

    fn default_group_name(&self) -> GroupId {
        self.default_group.clone()
    }

    fn check_for_set_global_parameter(&self, group: &GroupId, manager_name: &str) -> Result<(), StoreError> {
        self.authorize(group, manager_name, "set")
    }

    fn check_for_unset_global_parameter(&self, group: &GroupId, manager_name: &str) -> Result<(), StoreError> {
        self.authorize(group, manager_name, "unset")
    }
}


/// Family-erased view of a manager, for callers that pick the family at
/// run time (the command surface, loaders).
pub trait ScopedStore: Send + Sync {
    fn name(&self) -> &'static str;
    fn set(&self, path: &str, value: ParameterInput, options: SetOptions) -> Result<Parameter, StoreError>;
    fn get(&self, path: &str, options: LookupOptions) -> Result<Option<Parameter>, StoreError>;
    fn has(&self, path: &str, options: LookupOptions) -> Result<bool, StoreError>;
    fn unset(&self, path: &str, options: UnsetOptions) -> Result<Option<Parameter>, StoreError>;
    fn dictionary(&self, prefix: &str, local: bool, explore_other_scope: bool)
        -> Result<BTreeMap<String, Parameter>, StoreError>;
    fn owner(&self, path: &str) -> Result<Option<GroupId>, StoreError>;
    fn group_nodes(&self, group: &GroupId) -> Vec<ParameterPath>;
    fn flush_scope(&self) -> usize;
    fn clear_frozen(&self, group: &GroupId) -> Result<usize, StoreError>;
    fn node_count(&self) -> usize;
}

impl<F: ParameterFamily> ScopedStore for ParameterManager<F> {
    fn name(&self) -> &'static str {
        F::NAME
    }

    fn set(&self, path: &str, value: ParameterInput, options: SetOptions) -> Result<Parameter, StoreError> {
        self.set_parameter(path, value, options)
    }

    fn get(&self, path: &str, options: LookupOptions) -> Result<Option<Parameter>, StoreError> {
        self.get_parameter(path, options)
    }

    fn has(&self, path: &str, options: LookupOptions) -> Result<bool, StoreError> {
        self.has_parameter(path, options)
    }

    fn unset(&self, path: &str, options: UnsetOptions) -> Result<Option<Parameter>, StoreError> {
        self.unset_parameter(path, options)
    }

    fn dictionary(
        &self,
        prefix: &str,
        local: bool,
        explore_other_scope: bool,
    ) -> Result<BTreeMap<String, Parameter>, StoreError> {
        self.build_dictionnary(prefix, local, explore_other_scope)
    }

    fn owner(&self, path: &str) -> Result<Option<GroupId>, StoreError> {
        self.get_associated_group(path)
    }

    fn group_nodes(&self, group: &GroupId) -> Vec<ParameterPath> {
        self.get_group_nodes(group)
    }

    fn flush_scope(&self) -> usize {
        self.flush()
    }

    fn clear_frozen(&self, group: &GroupId) -> Result<usize, StoreError> {
        self.clear_frozen_node(group)
    }

    fn node_count(&self) -> usize {
        self.len()
    }
}


/// Every parameter family of the shell, sharing one scope registry.
pub struct ParameterContainer {
    registry: Arc<ScopeRegistry>,
    pub environment: ParameterManager<Environment>,
    pub variable: ParameterManager<Variable>,
    pub context: ParameterManager<Context>,
    pub key: ParameterManager<Key>,
    pub procedure: ParameterManager<Procedure>,
}

impl ParameterContainer {
    pub fn new(settings: &StoreSettings) -> Self {
        let registry = Arc::new(ScopeRegistry::new(settings));
        let parent: Arc<dyn ParentManager> = registry.clone();
        ParameterContainer {
            environment: ParameterManager::new(Arc::clone(&parent)),
            variable: ParameterManager::new(Arc::clone(&parent)),
            context: ParameterManager::new(Arc::clone(&parent)),
            key: ParameterManager::new(Arc::clone(&parent)),
            procedure: ParameterManager::new(parent),
            registry,
        }
    }

    pub fn registry(&self) -> &ScopeRegistry {
        &self.registry
    }

    pub fn manager(&self, kind: ParameterKind) -> &dyn ScopedStore {
        match kind {
            ParameterKind::Environment => &self.environment,
            ParameterKind::Variable => &self.variable,
            ParameterKind::Context => &self.context,
            ParameterKind::Key => &self.key,
            ParameterKind::Procedure => &self.procedure,
        }
    }

    pub fn managers(&self) -> [&dyn ScopedStore; 5] {
        [
            &self.environment,
            &self.variable,
            &self.context,
            &self.key,
            &self.procedure,
        ]
    }

    /// Enter a call frame. Returns the new depth.
    pub fn push_frame(&self) -> usize {
        self.registry.push_frame()
    }

    /// Leave the current call frame. In `thread_and_frame` mode the frame's
    /// local values are dropped from every family first.
    pub fn pop_frame(&self) -> Result<usize, StoreError> {
        if self.registry.depth() == 0 {
            return Err(StoreError::ScopeUnderflow);
        }
        if self.registry.mode() == ScopeMode::ThreadAndFrame {
            self.flush();
        }
        self.registry.pop_frame()
    }

    /// Drop the caller's local values in every family.
    pub fn flush(&self) -> usize {
        self.managers().iter().map(|m| m.flush_scope()).sum()
    }

    /// Release every freeze held by `group` in every family.
    pub fn clear_frozen(&self, group: &GroupId) -> Result<usize, StoreError> {
        let mut released = 0;
        for manager in self.managers() {
            released += manager.clear_frozen(group)?;
        }
        Ok(released)
    }

    pub fn node_count(&self) -> usize {
        self.managers().iter().map(|m| m.node_count()).sum()
    }
}

impl Default for ParameterContainer {
    fn default() -> Self {
        Self::new(&StoreSettings::default())
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
