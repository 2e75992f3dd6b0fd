//! Scoped parameter store.
//!
//! Dotted paths (`prompt.left`) resolve through a multi-level trie to
//! nodes holding one shared global value and one local value per scope.
//! Global values belong to a group and can be frozen so their owner can
//! later tell what the user changed or removed.

pub mod container;
pub mod error;
pub mod family;
pub mod loader;
pub mod node;
pub mod parameter;
pub mod path;
pub mod scope;
pub mod store;
pub mod trie;

pub use container::{ParameterContainer, ScopeRegistry, ScopedStore};
pub use error::StoreError;
pub use family::ParameterFamily;
pub use loader::{GroupLoader, Snapshot, UnloadReport};
pub use node::ParameterNode;
pub use parameter::{GlobalSettings, LocalSettings, Parameter, ParameterInput, ParameterKind, Settings};
pub use path::ParameterPath;
pub use scope::{GroupId, ParentHandle, ParentManager, ScopeKey};
pub use store::{LookupOptions, NodeId, ParameterManager, SetOptions, UnsetOptions};
pub use trie::{MultiLevelTrie, SearchResult};
