//! Additional per-resource context for rule queries
//!
//! Builds the `_context` document rules can query. For
//! PersistentVolumeClaims this answers whether the claim is still mounted
//! by a Pod or referenced by a workload, so rules like "delete when not
//! mounted and not referenced" stay readable. Auxiliary listings are
//! memoised per cycle, keyed `<namespace>/<endpoint>`.

use std::collections::BTreeMap;

use kube::api::{Api, DynamicObject, ListParams};
use kube::discovery::ApiResource;
use kube::Client;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::hooks::ContextHook;
use crate::resource::Resource;

/// Per-cycle cache owned by the orchestrator: auxiliary listings plus
/// scratch space shared between hook invocations.
#[derive(Debug, Default)]
pub struct ContextCache {
    listings: BTreeMap<String, Vec<Value>>,
    /// Scratch space for context hooks, shared across the cycle
    pub hook_data: BTreeMap<String, Value>,
}

fn core_type(kind: &str, plural: &str) -> ApiResource {
    ApiResource {
        group: String::new(),
        version: "v1".to_string(),
        api_version: "v1".to_string(),
        kind: kind.to_string(),
        plural: plural.to_string(),
    }
}

fn group_type(group: &str, kind: &str, plural: &str) -> ApiResource {
    ApiResource {
        group: group.to_string(),
        version: "v1".to_string(),
        api_version: format!("{group}/v1"),
        kind: kind.to_string(),
        plural: plural.to_string(),
    }
}

/// List objects of an auxiliary type in a namespace, memoised in the
/// cycle cache. Listing failures degrade to an empty result.
async fn list_cached(
    client: &Client,
    cache: &mut ContextCache,
    namespace: &str,
    api_resource: &ApiResource,
) -> Vec<Value> {
    let key = format!("{namespace}/{}", api_resource.plural);
    if let Some(items) = cache.listings.get(&key) {
        return items.clone();
    }

    let api: Api<DynamicObject> = Api::namespaced_with(client.clone(), namespace, api_resource);
    let items = match api.list(&ListParams::default()).await {
        Ok(listing) => listing
            .items
            .iter()
            .filter_map(|obj| serde_json::to_value(obj).ok())
            .collect(),
        Err(e) => {
            warn!(
                "Could not list {} in namespace {namespace}: {e}",
                api_resource.plural
            );
            Vec::new()
        }
    };
    cache.listings.insert(key, items.clone());
    items
}

/// Whether a `volumes` list (if any) contains a persistentVolumeClaim
/// entry with the given claim name.
fn volumes_claim(volumes: Option<&Value>, claim_name: &str) -> bool {
    volumes
        .and_then(Value::as_array)
        .is_some_and(|volumes| {
            volumes.iter().any(|volume| {
                volume
                    .pointer("/persistentVolumeClaim/claimName")
                    .and_then(Value::as_str)
                    == Some(claim_name)
            })
        })
}

/// StatefulSet claim templates produce claims named
/// `<template>-<statefulset>-<ordinal>`.
fn claim_template_matches(template_name: &str, sts_name: &str, claim_name: &str) -> bool {
    let pattern = format!(
        "^{}-{}-[0-9]+$",
        regex::escape(template_name),
        regex::escape(sts_name)
    );
    Regex::new(&pattern)
        .map(|re| re.is_match(claim_name))
        .unwrap_or(false)
}

/// Context for a PersistentVolumeClaim: whether it is currently mounted
/// by a Pod and whether anything in the namespace still references it.
///
/// The properties are negated so rule queries read naturally:
/// `_context.pvc_is_not_mounted && _context.pvc_is_not_referenced`.
async fn persistent_volume_claim_context(
    client: &Client,
    pvc: &Resource,
    cache: &mut ContextCache,
) -> Map<String, Value> {
    let namespace = pvc.effective_namespace().unwrap_or("default").to_string();

    let mut mounted = false;
    let pods = list_cached(client, cache, &namespace, &core_type("Pod", "pods")).await;
    for pod in &pods {
        if volumes_claim(pod.pointer("/spec/volumes"), &pvc.name) {
            debug!(
                "PersistentVolumeClaim {} is mounted by Pod {}",
                pvc.display(),
                pod.pointer("/metadata/name").and_then(serde_json::Value::as_str).unwrap_or("?")
            );
            mounted = true;
            break;
        }
    }

    // workloads referencing the claim through their (possibly nested) pod template
    let template_paths: [(ApiResource, &str); 4] = [
        (core_type("Pod", "pods"), "/spec/volumes"),
        (
            group_type("batch", "Job", "jobs"),
            "/spec/template/spec/volumes",
        ),
        (
            group_type("batch", "CronJob", "cronjobs"),
            "/spec/jobTemplate/spec/template/spec/volumes",
        ),
        (
            group_type("apps", "Deployment", "deployments"),
            "/spec/template/spec/volumes",
        ),
    ];

    let mut referenced = false;
    for (api_resource, volumes_path) in &template_paths {
        let items = list_cached(client, cache, &namespace, api_resource).await;
        if items
            .iter()
            .any(|item| volumes_claim(item.pointer(volumes_path), &pvc.name))
        {
            debug!(
                "PersistentVolumeClaim {} is referenced by a {}",
                pvc.display(),
                api_resource.kind
            );
            referenced = true;
            break;
        }
    }

    if !referenced {
        let statefulsets = list_cached(
            client,
            cache,
            &namespace,
            &group_type("apps", "StatefulSet", "statefulsets"),
        )
        .await;
        'sts: for sts in &statefulsets {
            let sts_name = sts
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let templates = sts
                .pointer("/spec/volumeClaimTemplates")
                .and_then(Value::as_array);
            for template in templates.into_iter().flatten() {
                let template_name = template
                    .pointer("/metadata/name")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if claim_template_matches(template_name, sts_name, &pvc.name) {
                    debug!(
                        "PersistentVolumeClaim {} is referenced by StatefulSet {sts_name}",
                        pvc.display()
                    );
                    referenced = true;
                    break 'sts;
                }
            }
        }
    }

    let mut context = Map::new();
    context.insert("pvc_is_not_mounted".to_string(), Value::Bool(!mounted));
    context.insert("pvc_is_not_referenced".to_string(), Value::Bool(!referenced));
    context
}

/// Build the `_context` document for a single resource.
///
/// PersistentVolumeClaims get the mounted/referenced facts; a configured
/// hook may merge in additional entries. Hook failures are logged and
/// swallowed.
pub async fn get_resource_context(
    client: &Client,
    resource: &Resource,
    hook: Option<ContextHook>,
    cache: &mut ContextCache,
) -> Value {
    let mut context = Map::new();

    if resource.kind() == "PersistentVolumeClaim" {
        context.extend(persistent_volume_claim_context(client, resource, cache).await);
    }

    if let Some(hook) = hook {
        match hook(resource, &mut cache.hook_data) {
            Ok(extra) => context.extend(extra),
            Err(e) => warn!(
                "Resource context hook failed for {} {}: {e}",
                resource.kind(),
                resource.display()
            ),
        }
    }

    Value::Object(context)
}
