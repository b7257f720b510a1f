//! Janitor Core - rule model and TTL codec for kube-janitor
//!
//! This crate holds the cluster-independent parts of the janitor:
//! - `duration`: TTL strings (`60s`, `5m`, `8h`, `7d`, `2w`, `forever`),
//!   expiry timestamps, and human-readable duration formatting
//! - `rules`: TTL rules loaded from a YAML file and matched against
//!   resources via JMESPath queries

pub mod duration;
pub mod error;
pub mod rules;

pub use duration::{format_duration, format_timestamp, parse_expiry, parse_ttl, TTL_FOREVER};
pub use error::{CoreError, RulesError};
pub use rules::{load_rules_from_file, Rule};
