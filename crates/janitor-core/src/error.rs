//! Error types for janitor-core

use thiserror::Error;

/// Errors from TTL/expiry parsing and single-rule validation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// TTL string does not match `<number><unit>` or `forever`
    #[error("TTL value \"{0}\" does not match format (e.g. 60s, 5m, 8h, 7d, 2w)")]
    InvalidTtl(String),

    /// Expiry timestamp matches none of the accepted formats
    #[error("expiry value \"{0}\" does not match any supported format (e.g. 2019-02-25T09:26:14Z)")]
    InvalidExpiry(String),

    /// Rule ID violates the identifier pattern
    #[error("invalid rule ID \"{0}\": it has to match ^[a-z][a-z0-9-]*$")]
    InvalidRuleId(String),

    /// JMESPath expression failed to compile
    #[error("invalid JMESPath expression \"{expression}\": {source}")]
    InvalidQuery {
        expression: String,
        #[source]
        source: jmespath::JmespathError,
    },

    /// Rule entry is not a mapping
    #[error("rule must be a mapping")]
    RuleNotAMapping,

    /// Rule entry lacks one of the required keys
    #[error("rule is missing required key \"{0}\"")]
    RuleMissingKey(&'static str),

    /// Rule field has the wrong shape
    #[error("rule field \"{field}\" must be {expected}")]
    RuleFieldInvalid {
        field: &'static str,
        expected: &'static str,
    },
}

/// Errors raised while loading a rules file. These are fatal at startup.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RulesError {
    /// Rules file could not be read
    #[error("could not read rules file: {0}")]
    Io(#[from] std::io::Error),

    /// Rules file is not valid YAML
    #[error("could not parse rules file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Top-level document is missing the `rules` sequence
    #[error("the rules file must have a top-level mapping with the key \"rules\"")]
    MissingRulesKey,

    /// A single rule entry failed to load, identified by its position
    #[error("failed to load rule #{index}: {source}")]
    Entry {
        index: usize,
        #[source]
        source: CoreError,
    },
}
