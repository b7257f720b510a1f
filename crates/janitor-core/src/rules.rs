//! TTL rules loaded from a YAML file
//!
//! A rule applies a TTL to every resource whose endpoint is in the rule's
//! resource set (or `*`) and whose object tree satisfies the rule's
//! JMESPath query. Queries are compiled once at load time and evaluated
//! over the resource object merged with the synthesised `_context` entry.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use jmespath::Expression;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::duration::parse_ttl;
use crate::error::{CoreError, RulesError};

static RULE_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").unwrap());

const REQUIRED_KEYS: [&str; 4] = ["id", "resources", "jmespath", "ttl"];

/// A single TTL rule: which endpoints it covers, which objects it
/// selects, and the TTL it applies.
pub struct Rule {
    /// Rule identifier (`^[a-z][a-z0-9-]*$`), used in counters and events
    pub id: String,
    /// Plural endpoint names the rule covers, or the literal `*`
    pub resources: BTreeSet<String>,
    /// TTL string applied on match (validated at load time)
    pub ttl: String,
    query: Expression<'static>,
}

impl Rule {
    /// Build and validate a rule from a decoded YAML/JSON entry.
    ///
    /// The entry must be a mapping with exactly the required keys `id`,
    /// `resources`, `jmespath`, and `ttl`; the ID must match the
    /// identifier pattern and the TTL must parse.
    pub fn from_entry(entry: &Value) -> Result<Self, CoreError> {
        let map = entry.as_object().ok_or(CoreError::RuleNotAMapping)?;
        for key in REQUIRED_KEYS {
            if !map.contains_key(key) {
                return Err(CoreError::RuleMissingKey(key));
            }
        }

        let id = map["id"]
            .as_str()
            .ok_or(CoreError::RuleFieldInvalid {
                field: "id",
                expected: "a string",
            })?;
        if !RULE_ID_PATTERN.is_match(id) {
            return Err(CoreError::InvalidRuleId(id.to_string()));
        }

        let resources = map["resources"]
            .as_array()
            .ok_or(CoreError::RuleFieldInvalid {
                field: "resources",
                expected: "a sequence of endpoint names",
            })?
            .iter()
            .map(|entry| {
                entry
                    .as_str()
                    .map(str::to_owned)
                    .ok_or(CoreError::RuleFieldInvalid {
                        field: "resources",
                        expected: "a sequence of endpoint names",
                    })
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let expression = map["jmespath"]
            .as_str()
            .ok_or(CoreError::RuleFieldInvalid {
                field: "jmespath",
                expected: "a string",
            })?;
        let query = jmespath::compile(expression).map_err(|source| CoreError::InvalidQuery {
            expression: expression.to_string(),
            source,
        })?;

        let ttl = map["ttl"]
            .as_str()
            .ok_or(CoreError::RuleFieldInvalid {
                field: "ttl",
                expected: "a string",
            })?;
        parse_ttl(ttl)?;

        Ok(Rule {
            id: id.to_string(),
            resources,
            ttl: ttl.to_string(),
            query,
        })
    }

    /// The JMESPath source text of the rule's query
    pub fn query(&self) -> &str {
        self.query.as_str()
    }

    /// Whether the rule covers the given endpoint at all
    pub fn applies_to(&self, endpoint: &str) -> bool {
        self.resources.contains(endpoint) || self.resources.contains("*")
    }

    /// Evaluate the rule against a resource.
    ///
    /// The query runs over `{"_context": context}` merged with the
    /// resource's raw object tree; the truthiness of the query result
    /// decides the match. Evaluation errors count as no match.
    pub fn matches(&self, endpoint: &str, resource_obj: &Value, context: &Value) -> bool {
        if !self.applies_to(endpoint) {
            return false;
        }

        let mut doc = serde_json::Map::new();
        doc.insert("_context".to_string(), context.clone());
        if let Value::Object(fields) = resource_obj {
            for (key, value) in fields {
                doc.insert(key.clone(), value.clone());
            }
        }

        match self.query.search(Value::Object(doc)) {
            Ok(result) => result.is_truthy(),
            Err(_) => false,
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("resources", &self.resources)
            .field("jmespath", &self.query.as_str())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Load rules from a YAML file.
///
/// The document must be a mapping with a top-level `rules` sequence.
/// Per-entry failures are reported with the entry's zero-based index.
pub fn load_rules_from_file(path: impl AsRef<Path>) -> Result<Vec<Rule>, RulesError> {
    let text = std::fs::read_to_string(path)?;
    let data: Value = serde_yaml::from_str(&text)?;

    let entries = data
        .get("rules")
        .and_then(Value::as_array)
        .ok_or(RulesError::MissingRulesKey)?;

    let mut rules = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let rule = Rule::from_entry(entry).map_err(|source| RulesError::Entry { index, source })?;
        rules.push(rule);
    }
    Ok(rules)
}
