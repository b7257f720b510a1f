//! Dynamic view of a namespaced API object
//!
//! The janitor has no compile-time knowledge of the kinds it reconciles;
//! every object is handled through [`Resource`], which pairs the type
//! information from discovery with the metadata the decision engine needs
//! and the full raw object tree rule queries run over.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use serde_json::Value;

use crate::error::JanitorError;

/// A single API object of a dynamically discovered kind.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Type information (kind, apiVersion, plural endpoint name)
    pub api_resource: ApiResource,
    /// Namespace the object lives in (None for Namespace objects)
    pub namespace: Option<String>,
    pub name: String,
    pub annotations: BTreeMap<String, String>,
    /// Naive-UTC creation timestamp, if the server reported one
    pub creation_timestamp: Option<NaiveDateTime>,
    pub resource_version: Option<String>,
    pub uid: Option<String>,
    /// Complete object tree as returned by the API server
    pub raw: Value,
}

impl Resource {
    /// Build from a listed [`DynamicObject`] of the given type.
    pub fn from_dynamic(
        api_resource: &ApiResource,
        obj: &DynamicObject,
    ) -> Result<Self, JanitorError> {
        let name = obj.metadata.name.clone().ok_or(JanitorError::MissingName)?;
        let raw =
            serde_json::to_value(obj).map_err(|e| JanitorError::InvalidObject(e.to_string()))?;

        Ok(Resource {
            api_resource: api_resource.clone(),
            namespace: obj.metadata.namespace.clone(),
            name,
            annotations: obj.metadata.annotations.clone().unwrap_or_default(),
            creation_timestamp: obj
                .metadata
                .creation_timestamp
                .as_ref()
                .map(|time| time.0.naive_utc()),
            resource_version: obj.metadata.resource_version.clone(),
            uid: obj.metadata.uid.clone(),
            raw,
        })
    }

    /// PascalCase kind, e.g. `Deployment`
    pub fn kind(&self) -> &str {
        &self.api_resource.kind
    }

    /// apiVersion string, e.g. `apps/v1`
    pub fn api_version(&self) -> &str {
        &self.api_resource.api_version
    }

    /// Plural endpoint name used to address the kind, e.g. `deployments`
    pub fn endpoint(&self) -> &str {
        &self.api_resource.plural
    }

    pub fn is_namespace(&self) -> bool {
        self.api_resource.kind == "Namespace"
    }

    /// Namespace used for filtering, event emission, and log output.
    ///
    /// A Namespace object stands in its own namespace slot; any other
    /// object without a namespace yields None and is never reconciled.
    pub fn effective_namespace(&self) -> Option<&str> {
        if self.is_namespace() {
            Some(&self.name)
        } else {
            self.namespace.as_deref().filter(|ns| !ns.is_empty())
        }
    }

    /// `namespace/name` label for log output (bare name for namespaces)
    pub fn display(&self) -> String {
        match (self.is_namespace(), self.namespace.as_deref()) {
            (false, Some(namespace)) => format!("{namespace}/{}", self.name),
            _ => self.name.clone(),
        }
    }
}
