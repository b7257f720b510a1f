//! Shared helpers for integration tests against a mock API server
#![allow(dead_code)]

use chrono::NaiveDateTime;
use kube::Client;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Kubernetes client pointed at the mock server
pub fn client_for(server: &MockServer) -> Client {
    let uri = server.uri().parse::<http::Uri>().unwrap();
    Client::try_from(kube::Config::new(uri)).unwrap()
}

/// The fixed clock all scenario tests run under
pub fn fixed_now() -> NaiveDateTime {
    janitor_core::parse_expiry("2019-03-11T11:13:09Z").unwrap()
}

/// Mount a GET returning an object list with the given items
pub async fn mock_list(server: &MockServer, url_path: &str, kind: &str, items: Value) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "apiVersion": "v1",
            "kind": kind,
            "metadata": {"resourceVersion": "1"},
            "items": items,
        })))
        .mount(server)
        .await;
}

/// Mount the core `/api/v1` resource list
pub async fn mock_core_v1(server: &MockServer, resources: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "APIResourceList",
            "groupVersion": "v1",
            "resources": resources,
        })))
        .mount(server)
        .await;
}

/// Mount the `/apis` group index
pub async fn mock_api_groups(server: &MockServer, groups: Value) {
    Mock::given(method("GET"))
        .and(path("/apis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "APIGroupList",
            "apiVersion": "v1",
            "groups": groups,
        })))
        .mount(server)
        .await;
}

/// Mount the resource list of one groupVersion
pub async fn mock_group_resources(server: &MockServer, group_version: &str, resources: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/apis/{group_version}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "APIResourceList",
            "groupVersion": group_version,
            "resources": resources,
        })))
        .mount(server)
        .await;
}

/// Discovery entry for a namespaced, deletable custom resource
pub fn deletable_resource(kind: &str, plural: &str) -> Value {
    json!({
        "kind": kind,
        "name": plural,
        "singularName": kind.to_lowercase(),
        "namespaced": true,
        "verbs": ["delete", "deletecollection", "get", "list", "patch", "create", "update", "watch"],
    })
}
