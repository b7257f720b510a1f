//! TTL/expiry decision engine and the clean-up cycle
//!
//! Each candidate resource runs through two independent paths: the TTL
//! path (annotation or first matching rule, age against TTL) and the
//! expiry path (absolute `janitor/expires` timestamp). Both may fire in
//! the same cycle. The cycle orchestrator feeds namespaces first, then
//! every discovered resource kind, deduplicated by (kind, namespace,
//! name).

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDateTime, Utc};
use kube::api::{Api, DynamicObject, ListParams};
use kube::discovery::ApiResource;
use kube::Client;
use tracing::{debug, error, info, warn};

use janitor_core::{format_duration, format_timestamp, parse_expiry, parse_ttl, Rule};

use crate::annotations;
use crate::context::{get_resource_context, ContextCache};
use crate::counter::Counter;
use crate::discovery::discover_resource_types;
use crate::effects::Effects;
use crate::error::Result;
use crate::hooks::ContextHook;
use crate::resource::Resource;

/// Replaceable time source returning naive UTC; tests inject a fixed
/// clock instead of the wall clock.
pub type NowFn = fn() -> NaiveDateTime;

/// Current wall-clock time as naive UTC
pub fn utcnow() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Configuration of one janitor instance (derived from CLI options)
#[derive(Debug, Clone, Default)]
pub struct JanitorConfig {
    /// Endpoint names to consider, or the literal `all`
    pub include_resources: BTreeSet<String>,
    /// Endpoint names to skip entirely
    pub exclude_resources: BTreeSet<String>,
    /// Namespace names to consider, or the literal `all`
    pub include_namespaces: BTreeSet<String>,
    /// Namespace names to skip
    pub exclude_namespaces: BTreeSet<String>,
    /// Seconds before deletion at which to emit a DeleteNotification
    /// event; None (or a non-positive value) disables notifications
    pub delete_notification: Option<i64>,
    /// Annotation overriding the creation timestamp when strictly later
    pub deployment_time_annotation: Option<String>,
    /// Optional context hook enriching `_context` for rule queries
    pub resource_context_hook: Option<ContextHook>,
    pub dry_run: bool,
}

/// A resource passes the filter iff its endpoint and namespace are both
/// included and not excluded; objects without a namespace never pass
/// (a Namespace counts as living in itself).
pub fn matches_resource_filter(resource: &Resource, config: &JanitorConfig) -> bool {
    let endpoint = resource.endpoint();
    let Some(namespace) = resource.effective_namespace() else {
        return false;
    };

    let resource_included = config.include_resources.contains("all")
        || config.include_resources.contains(endpoint);
    let namespace_included = config.include_namespaces.contains("all")
        || config.include_namespaces.contains(namespace);
    let resource_excluded = config.exclude_resources.contains(endpoint);
    let namespace_excluded = config.exclude_namespaces.contains(namespace);

    resource_included && !resource_excluded && namespace_included && !namespace_excluded
}

/// Whether a delete notification was already sent for this resource
pub fn was_notified(resource: &Resource) -> bool {
    resource.annotations.contains_key(annotations::NOTIFIED)
}

fn namespaces_type() -> ApiResource {
    ApiResource {
        group: String::new(),
        version: "v1".to_string(),
        api_version: "v1".to_string(),
        kind: "Namespace".to_string(),
        plural: "namespaces".to_string(),
    }
}

/// One janitor instance: client, configuration, rules, and the
/// side-effect sink.
pub struct Janitor {
    client: Client,
    config: JanitorConfig,
    rules: Vec<Rule>,
    effects: Box<dyn Effects>,
    now: NowFn,
}

impl Janitor {
    pub fn new(
        client: Client,
        config: JanitorConfig,
        rules: Vec<Rule>,
        effects: Box<dyn Effects>,
    ) -> Self {
        Self::with_clock(client, config, rules, effects, utcnow)
    }

    /// Like [`Janitor::new`] with an explicit time source (test seam)
    pub fn with_clock(
        client: Client,
        config: JanitorConfig,
        rules: Vec<Rule>,
        effects: Box<dyn Effects>,
        now: NowFn,
    ) -> Self {
        Self {
            client,
            config,
            rules,
            effects,
            now,
        }
    }

    /// Determine the TTL string and the human-readable reason it applies:
    /// the `janitor/ttl` annotation strictly wins, otherwise the first
    /// matching rule in declaration order.
    async fn ttl_source(
        &self,
        resource: &Resource,
        cache: &mut ContextCache,
        counter: &mut Counter,
    ) -> Option<(String, String)> {
        if let Some(ttl) = resource.annotations.get(annotations::TTL) {
            return Some((ttl.clone(), format!("annotation {} is set", annotations::TTL)));
        }
        if self.rules.is_empty() {
            return None;
        }

        let context = get_resource_context(
            &self.client,
            resource,
            self.config.resource_context_hook,
            cache,
        )
        .await;

        for rule in &self.rules {
            let matched = rule.matches(resource.endpoint(), &resource.raw, &context);
            debug!(
                "Rule {} with JMESPath \"{}\" evaluated for {} {}: {matched}",
                rule.id,
                rule.query(),
                resource.kind(),
                resource.display()
            );
            if matched {
                debug!(
                    "Rule {} applies {} TTL to {} {}",
                    rule.id,
                    rule.ttl,
                    resource.kind(),
                    resource.display()
                );
                counter.bump(format!("rule-{}-matches", rule.id));
                return Some((rule.ttl.clone(), format!("rule {} matches", rule.id)));
            }
        }
        None
    }

    /// Effective start of the resource's TTL window: the creation
    /// timestamp, or the deployment-time annotation when configured,
    /// present, parseable, and strictly later.
    fn deployment_time(&self, resource: &Resource) -> Option<NaiveDateTime> {
        let creation = resource.creation_timestamp?;
        let Some(annotation) = &self.config.deployment_time_annotation else {
            return Some(creation);
        };
        let Some(value) = resource.annotations.get(annotation) else {
            return Some(creation);
        };
        match parse_expiry(value) {
            Ok(deployed) => Some(creation.max(deployed)),
            Err(_) => {
                warn!(
                    "Invalid {annotation} annotation on {} {}: \"{value}\" matches no supported timestamp format",
                    resource.kind(),
                    resource.name
                );
                Some(creation)
            }
        }
    }

    /// Emit a DeleteNotification once the notification window has opened,
    /// unless the resource was already notified.
    async fn maybe_notify(
        &self,
        resource: &mut Resource,
        expiry_time: NaiveDateTime,
        delete_notification: i64,
        reason: &str,
    ) {
        let notification_time = expiry_time - Duration::seconds(delete_notification);
        if (self.now)() > notification_time && !was_notified(resource) {
            let message = format!(
                "{} {} will be deleted at {} ({reason})",
                resource.kind(),
                resource.name,
                format_timestamp(expiry_time)
            );
            info!("{message}");
            self.effects
                .create_event(resource, &message, "DeleteNotification")
                .await;
            self.effects.mark_notified(resource).await;
        }
    }

    /// TTL path: delete the resource once its age exceeds the TTL from
    /// the annotation or the first matching rule.
    pub async fn handle_resource_on_ttl(
        &self,
        resource: &mut Resource,
        cache: &mut ContextCache,
    ) -> Counter {
        let mut counter = Counter::new();
        counter.bump("resources-processed");

        let Some((ttl, reason)) = self.ttl_source(resource, cache, &mut counter).await else {
            return counter;
        };

        let ttl_seconds = match parse_ttl(&ttl) {
            Ok(seconds) => seconds,
            Err(e) => {
                info!(
                    "Ignoring invalid TTL on {} {}: {e}",
                    resource.kind(),
                    resource.name
                );
                return counter;
            }
        };
        if ttl_seconds < 0 {
            // `forever`: the resource never expires
            return counter;
        }

        counter.bump(format!("{}-with-ttl", resource.endpoint()));

        let Some(deployment_time) = self.deployment_time(resource) else {
            warn!(
                "{} {} has no creation timestamp, skipping TTL check",
                resource.kind(),
                resource.name
            );
            return counter;
        };

        let age = (self.now)() - deployment_time;
        let age_formatted = format_duration(age.num_seconds());
        debug!(
            "{} {} with {ttl} TTL is {age_formatted} old",
            resource.kind(),
            resource.name
        );

        if age.num_seconds() > ttl_seconds {
            let message = format!(
                "{} {} with {ttl} TTL is {age_formatted} old and will be deleted ({reason})",
                resource.kind(),
                resource.name
            );
            info!("{message}");
            self.effects
                .create_event(resource, &message, "TimeToLiveExpired")
                .await;
            self.effects.delete(resource).await;
            counter.bump(format!("{}-deleted", resource.endpoint()));
        } else if let Some(delete_notification) =
            self.config.delete_notification.filter(|seconds| *seconds > 0)
        {
            let expiry_time = deployment_time + Duration::seconds(ttl_seconds);
            self.maybe_notify(resource, expiry_time, delete_notification, &reason)
                .await;
        }

        counter
    }

    /// Expiry path: delete the resource once the absolute
    /// `janitor/expires` timestamp has passed.
    pub async fn handle_resource_on_expiry(&self, resource: &mut Resource) -> Counter {
        let mut counter = Counter::new();

        let Some(expiry) = resource.annotations.get(annotations::EXPIRES).cloned() else {
            return counter;
        };
        let reason = format!("annotation {} is set", annotations::EXPIRES);

        let expiry_timestamp = match parse_expiry(&expiry) {
            Ok(timestamp) => timestamp,
            Err(e) => {
                info!(
                    "Ignoring invalid expiry on {} {}: {e}",
                    resource.kind(),
                    resource.name
                );
                return counter;
            }
        };

        counter.bump(format!("{}-with-expiry", resource.endpoint()));

        if (self.now)() > expiry_timestamp {
            let message = format!(
                "{} {} expired on {expiry} and will be deleted ({reason})",
                resource.kind(),
                resource.name
            );
            info!("{message}");
            self.effects
                .create_event(resource, &message, "ExpiryTimeReached")
                .await;
            self.effects.delete(resource).await;
            counter.bump(format!("{}-deleted", resource.endpoint()));
        } else if let Some(delete_notification) =
            self.config.delete_notification.filter(|seconds| *seconds > 0)
        {
            self.maybe_notify(resource, expiry_timestamp, delete_notification, &reason)
                .await;
        }

        counter
    }

    /// Run the TTL path, then the expiry path, for one resource.
    pub async fn handle_resource(
        &self,
        resource: &mut Resource,
        cache: &mut ContextCache,
    ) -> Counter {
        let mut counter = self.handle_resource_on_ttl(resource, cache).await;
        counter.merge(self.handle_resource_on_expiry(resource).await);
        counter
    }

    /// One clean-up cycle over all matching resources.
    ///
    /// Namespaces are processed first, then every discovered resource
    /// kind not excluded by configuration. Objects served by multiple
    /// API versions are processed only once per cycle.
    pub async fn clean_up(&self) -> Result<Counter> {
        let mut counter = Counter::new();
        let mut cache = ContextCache::default();

        let namespaces = namespaces_type();
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &namespaces);
        for obj in api.list(&ListParams::default()).await?.items {
            let mut resource = match Resource::from_dynamic(&namespaces, &obj) {
                Ok(resource) => resource,
                Err(e) => {
                    warn!("Skipping malformed Namespace object: {e}");
                    continue;
                }
            };
            if matches_resource_filter(&resource, &self.config) {
                counter.merge(self.handle_resource(&mut resource, &mut cache).await);
            } else {
                debug!("Skipping {} {}", resource.kind(), resource.display());
            }
        }

        let mut already_seen: BTreeSet<(String, String, String)> = BTreeSet::new();
        let mut filtered: Vec<Resource> = Vec::new();

        for resource_type in discover_resource_types(&self.client).await? {
            if self.config.exclude_resources.contains(&resource_type.plural) {
                continue;
            }
            let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource_type);
            let listing = match api.list(&ListParams::default()).await {
                Ok(listing) => listing,
                Err(e) => {
                    error!("Could not list {} objects: {e}", resource_type.kind);
                    continue;
                }
            };
            for obj in listing.items {
                let resource = match Resource::from_dynamic(&resource_type, &obj) {
                    Ok(resource) => resource,
                    Err(e) => {
                        warn!("Skipping malformed {} object: {e}", resource_type.kind);
                        continue;
                    }
                };
                // objects may be served by multiple API versions
                // (e.g. deployments via apps/v1 and a legacy group):
                // process each (kind, namespace, name) only once
                let object_id = (
                    resource.kind().to_string(),
                    resource.namespace.clone().unwrap_or_default(),
                    resource.name.clone(),
                );
                if !already_seen.insert(object_id) {
                    continue;
                }
                if matches_resource_filter(&resource, &self.config) {
                    filtered.push(resource);
                } else {
                    debug!("Skipping {} {}", resource.kind(), resource.display());
                }
            }
        }

        for mut resource in filtered {
            counter.merge(self.handle_resource(&mut resource, &mut cache).await);
        }

        info!("Clean up run completed: {}", counter.summary());
        Ok(counter)
    }
}
