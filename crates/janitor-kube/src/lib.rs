//! Janitor Kube - cluster integration for kube-janitor
//!
//! This crate contains everything that talks to (or reasons about) the
//! Kubernetes API:
//! - `discovery`: enumerate every namespaced, deletable resource kind
//! - `resource`: dynamic view of a single API object
//! - `context`: derived facts for rule queries (`_context`), e.g. whether
//!   a PersistentVolumeClaim is still mounted
//! - `hooks`: registry of user-selectable context hooks
//! - `effects`: audit events, notified annotations, and cascading deletes,
//!   all gated behind dry-run
//! - `janitor`: the TTL/expiry decision engine and the clean-up cycle

pub mod annotations;
pub mod context;
pub mod counter;
pub mod discovery;
pub mod effects;
pub mod error;
pub mod hooks;
pub mod janitor;
pub mod resource;

pub use context::{get_resource_context, ContextCache};
pub use counter::Counter;
pub use discovery::discover_resource_types;
pub use effects::{ClusterEffects, Effects};
pub use error::JanitorError;
pub use hooks::{resolve_hook, ContextHook};
pub use janitor::{matches_resource_filter, utcnow, Janitor, JanitorConfig};
pub use resource::Resource;
