//! Side effects against the cluster
//!
//! Every mutating API call goes through the [`Effects`] trait so the
//! decision engine can be exercised without a cluster. The live
//! implementation gates each mutation behind dry-run and absorbs API
//! failures: a failed event or delete is logged, the resource stays, and
//! the next cycle retries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::{Event, EventSource, ObjectReference};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use tracing::{error, info};

use crate::annotations;
use crate::resource::Resource;

/// Event source component name
const COMPONENT: &str = "kube-janitor";
/// generateName prefix for audit events
const EVENT_NAME_PREFIX: &str = "kube-janitor-";

/// Mutations the decision engine may request.
#[async_trait]
pub trait Effects: Send + Sync {
    /// Emit an audit event for the resource. Failures are absorbed; a
    /// failed event never blocks the delete that follows it.
    async fn create_event(&self, resource: &Resource, message: &str, reason: &str);

    /// Delete the resource with background cascade. Failures are absorbed.
    async fn delete(&self, resource: &Resource);

    /// Persist `janitor/notified=yes` on the resource and mirror it on
    /// the in-memory copy so later paths in the same cycle see it.
    async fn mark_notified(&self, resource: &mut Resource);
}

/// Live implementation talking to the API server.
pub struct ClusterEffects {
    client: Client,
    dry_run: bool,
    /// Seconds to pause after each actual delete (0 disables)
    wait_after_delete: u64,
}

impl ClusterEffects {
    pub fn new(client: Client, dry_run: bool, wait_after_delete: u64) -> Self {
        Self {
            client,
            dry_run,
            wait_after_delete,
        }
    }

    fn api_for(&self, resource: &Resource) -> Api<DynamicObject> {
        match (resource.is_namespace(), resource.namespace.as_deref()) {
            (false, Some(namespace)) => {
                Api::namespaced_with(self.client.clone(), namespace, &resource.api_resource)
            }
            _ => Api::all_with(self.client.clone(), &resource.api_resource),
        }
    }

    /// Build the audit event: generated name, Normal type, identical
    /// first/last timestamps, kube-janitor source component.
    fn build_event(resource: &Resource, message: &str, reason: &str) -> Event {
        let timestamp = Time(Utc::now());
        Event {
            metadata: ObjectMeta {
                namespace: resource.effective_namespace().map(str::to_string),
                generate_name: Some(EVENT_NAME_PREFIX.to_string()),
                ..Default::default()
            },
            type_: Some("Normal".to_string()),
            count: Some(1),
            first_timestamp: Some(timestamp.clone()),
            last_timestamp: Some(timestamp),
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            involved_object: ObjectReference {
                api_version: Some(resource.api_version().to_string()),
                kind: Some(resource.kind().to_string()),
                name: Some(resource.name.clone()),
                namespace: resource.effective_namespace().map(str::to_string),
                resource_version: resource.resource_version.clone(),
                uid: resource.uid.clone(),
                ..Default::default()
            },
            source: Some(EventSource {
                component: Some(COMPONENT.to_string()),
                host: None,
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl Effects for ClusterEffects {
    async fn create_event(&self, resource: &Resource, message: &str, reason: &str) {
        let event = Self::build_event(resource, message, reason);
        if self.dry_run {
            return;
        }

        let namespace = resource.effective_namespace().unwrap_or("default");
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        if let Err(e) = api.create(&PostParams::default(), &event).await {
            error!(
                "Could not create event for {} {}: {e}",
                resource.kind(),
                resource.display()
            );
        }
    }

    async fn delete(&self, resource: &Resource) {
        if self.dry_run {
            info!(
                "**DRY-RUN**: would delete {} {}",
                resource.kind(),
                resource.display()
            );
            return;
        }

        info!("Deleting {} {}..", resource.kind(), resource.display());
        // Background cascade works uniformly across older API versions
        // and custom resources
        let params = DeleteParams::background();
        match self.api_for(resource).delete(&resource.name, &params).await {
            Ok(_) => {
                if self.wait_after_delete > 0 {
                    tokio::time::sleep(Duration::from_secs(self.wait_after_delete)).await;
                }
            }
            Err(e) => error!(
                "Could not delete {} {}: {e}",
                resource.kind(),
                resource.display()
            ),
        }
    }

    async fn mark_notified(&self, resource: &mut Resource) {
        if self.dry_run {
            info!(
                "**DRY-RUN**: would annotate {} {} with {}={}",
                resource.kind(),
                resource.display(),
                annotations::NOTIFIED,
                annotations::NOTIFIED_VALUE
            );
            return;
        }

        resource.annotations.insert(
            annotations::NOTIFIED.to_string(),
            annotations::NOTIFIED_VALUE.to_string(),
        );
        let patch = json!({
            "metadata": {
                "annotations": {
                    annotations::NOTIFIED: annotations::NOTIFIED_VALUE,
                }
            }
        });
        if let Err(e) = self
            .api_for(resource)
            .patch(&resource.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            error!(
                "Could not annotate {} {}: {e}",
                resource.kind(),
                resource.display()
            );
        }
    }
}
