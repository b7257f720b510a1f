//! Discovery of namespaced, deletable resource kinds
//!
//! Walks the core `v1` resource list and every group in the `/apis`
//! index. Within a group the preferred version is listed first; other
//! versions only contribute endpoints the preferred version does not
//! serve, so each logical kind is reconciled exactly once per cycle.
//! A groupVersion that fails to list is skipped with a warning: one
//! broken aggregated API must not stop the janitor.

use std::collections::BTreeSet;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResource;
use kube::discovery::ApiResource;
use kube::Client;
use tracing::{debug, warn};

use crate::error::Result;

/// Whether a discovered API resource is in scope: namespaced, deletable,
/// and not a subresource like `pods/log`.
fn in_scope(resource: &APIResource) -> bool {
    resource.namespaced
        && resource.verbs.iter().any(|verb| verb == "delete")
        && !resource.name.contains('/')
}

fn to_api_resource(group_version: &str, resource: &APIResource) -> ApiResource {
    let (group, version) = match group_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), group_version.to_string()),
    };
    ApiResource {
        group,
        version,
        api_version: group_version.to_string(),
        kind: resource.kind.clone(),
        plural: resource.name.clone(),
    }
}

/// Enumerate every namespaced resource kind that supports deletion.
///
/// Failures to fetch a single groupVersion's resource list are logged
/// and skipped; failures reading the core version or the group index
/// abort the cycle (the run loop retries next interval).
pub async fn discover_resource_types(client: &Client) -> Result<Vec<ApiResource>> {
    let mut types = Vec::new();

    let core = client.list_core_api_resources("v1").await?;
    for resource in core.resources.iter().filter(|r| in_scope(r)) {
        types.push(to_api_resource("v1", resource));
    }

    let index = client.list_api_groups().await?;
    let mut groups = index.groups;
    groups.sort_by(|a, b| a.name.cmp(&b.name));

    for group in &groups {
        let preferred = group
            .preferred_version
            .as_ref()
            .map(|version| version.group_version.clone())
            .or_else(|| {
                group
                    .versions
                    .first()
                    .map(|version| version.group_version.clone())
            });
        let Some(preferred) = preferred else { continue };

        let mut versions: Vec<String> = group
            .versions
            .iter()
            .map(|version| version.group_version.clone())
            .filter(|group_version| *group_version != preferred)
            .collect();
        versions.sort();
        versions.insert(0, preferred);

        let mut yielded: BTreeSet<String> = BTreeSet::new();
        for group_version in &versions {
            debug!("Collecting resources in API group {group_version}..");
            let listing = match client.list_api_group_resources(group_version).await {
                Ok(listing) => listing,
                Err(e) => {
                    warn!("Could not collect resources in API group {group_version}: {e}");
                    continue;
                }
            };
            for resource in listing.resources.iter().filter(|r| in_scope(r)) {
                if yielded.insert(resource.name.clone()) {
                    types.push(to_api_resource(group_version, resource));
                }
            }
        }
    }

    Ok(types)
}
