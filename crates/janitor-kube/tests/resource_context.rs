//! PersistentVolumeClaim context tests against a mock API server

mod common;

use std::collections::BTreeMap;

use janitor_kube::{get_resource_context, ContextCache, Resource};
use kube::discovery::ApiResource;
use serde_json::{json, Value};
use wiremock::MockServer;

use common::{client_for, mock_list};

const JOB_WITH_VOLUME: &str = r#"
apiVersion: batch/v1
kind: Job
metadata:
  name: pi
spec:
  template:
    spec:
      containers:
      - name: pi
        image: my-image
        volumeMounts:
          - mountPath: "/data"
            name: "job-data"
      volumes:
        - name: "foobar-data"
          persistentVolumeClaim:
            claimName: "job-data"
"#;

const CRONJOB_WITH_VOLUME: &str = r#"
apiVersion: batch/v1
kind: CronJob
metadata:
  name: "foobar"
spec:
  schedule: "0 23 * * *"
  jobTemplate:
    spec:
      template:
        spec:
          restartPolicy: Never
          containers:
            - name: cont
              image: "my-docker-image"
              volumeMounts:
                - mountPath: "/data"
                  name: "foobar-data"
          volumes:
            - name: "foobar-data"
              persistentVolumeClaim:
                claimName: "foobar-data"
"#;

const DEPLOYMENT_WITH_VOLUME: &str = r#"
apiVersion: apps/v1
kind: Deployment
metadata:
  name: redis
spec:
  replicas: 1
  template:
    spec:
      containers:
      - name: redis
        image: redis:3.2.5
        volumeMounts:
        - mountPath: /data
          name: redis-data
      volumes:
        - name: redis-data
          persistentVolumeClaim:
            claimName: redis-data
"#;

fn yaml(document: &str) -> Value {
    serde_yaml::from_str(document).unwrap()
}

fn pvc(name: &str) -> Resource {
    Resource {
        api_resource: ApiResource {
            group: String::new(),
            version: "v1".to_string(),
            api_version: "v1".to_string(),
            kind: "PersistentVolumeClaim".to_string(),
            plural: "persistentvolumeclaims".to_string(),
        },
        namespace: Some("default".to_string()),
        name: name.to_string(),
        annotations: BTreeMap::new(),
        creation_timestamp: None,
        resource_version: None,
        uid: None,
        raw: json!({"metadata": {"name": name, "namespace": "default"}}),
    }
}

/// Mount empty listings for every auxiliary endpoint the PVC context
/// inspects; individual tests override the interesting one first.
async fn mock_empty_aux(server: &MockServer) {
    mock_list(server, "/api/v1/namespaces/default/pods", "PodList", json!([])).await;
    mock_list(server, "/apis/batch/v1/namespaces/default/jobs", "JobList", json!([])).await;
    mock_list(server, "/apis/batch/v1/namespaces/default/cronjobs", "CronJobList", json!([])).await;
    mock_list(server, "/apis/apps/v1/namespaces/default/deployments", "DeploymentList", json!([])).await;
    mock_list(server, "/apis/apps/v1/namespaces/default/statefulsets", "StatefulSetList", json!([])).await;
}

#[tokio::test]
async fn test_pvc_not_mounted_not_referenced() {
    let server = MockServer::start().await;
    mock_list(&server, "/api/v1/namespaces/default/pods", "PodList", json!([
        {"metadata": {"name": "my-pod"}},
    ]))
    .await;
    mock_empty_aux(&server).await;

    let client = client_for(&server);
    let mut cache = ContextCache::default();
    let context = get_resource_context(&client, &pvc("my-pvc"), None, &mut cache).await;

    assert_eq!(context["pvc_is_not_mounted"], json!(true));
    assert_eq!(context["pvc_is_not_referenced"], json!(true));
}

#[tokio::test]
async fn test_pvc_mounted_by_pod() {
    let server = MockServer::start().await;
    mock_list(&server, "/api/v1/namespaces/default/pods", "PodList", json!([
        {
            "metadata": {"name": "my-pod"},
            "spec": {
                "volumes": [
                    {"name": "data", "persistentVolumeClaim": {"claimName": "my-pvc"}},
                ],
            },
        },
    ]))
    .await;
    mock_empty_aux(&server).await;

    let client = client_for(&server);
    let mut cache = ContextCache::default();
    let context = get_resource_context(&client, &pvc("my-pvc"), None, &mut cache).await;

    assert_eq!(context["pvc_is_not_mounted"], json!(false));
    // a mounting pod also counts as a reference
    assert_eq!(context["pvc_is_not_referenced"], json!(false));
}

#[tokio::test]
async fn test_pvc_referenced_by_statefulset() {
    let server = MockServer::start().await;
    mock_list(&server, "/apis/apps/v1/namespaces/default/statefulsets", "StatefulSetList", json!([
        {
            "metadata": {"name": "my-sts"},
            "spec": {
                "volumeClaimTemplates": [{"metadata": {"name": "data"}}],
            },
        },
    ]))
    .await;
    mock_empty_aux(&server).await;

    let client = client_for(&server);
    let mut cache = ContextCache::default();
    let context = get_resource_context(&client, &pvc("data-my-sts-0"), None, &mut cache).await;

    assert_eq!(context["pvc_is_not_mounted"], json!(true));
    assert_eq!(context["pvc_is_not_referenced"], json!(false));
}

#[tokio::test]
async fn test_pvc_referenced_by_job() {
    let server = MockServer::start().await;
    mock_list(&server, "/apis/batch/v1/namespaces/default/jobs", "JobList", json!([yaml(JOB_WITH_VOLUME)])).await;
    mock_empty_aux(&server).await;

    let client = client_for(&server);
    let mut cache = ContextCache::default();
    let context = get_resource_context(&client, &pvc("job-data"), None, &mut cache).await;

    assert_eq!(context["pvc_is_not_referenced"], json!(false));
}

#[tokio::test]
async fn test_pvc_referenced_by_cronjob() {
    let server = MockServer::start().await;
    mock_list(&server, "/apis/batch/v1/namespaces/default/cronjobs", "CronJobList", json!([yaml(CRONJOB_WITH_VOLUME)])).await;
    mock_empty_aux(&server).await;

    let client = client_for(&server);
    let mut cache = ContextCache::default();
    let context = get_resource_context(&client, &pvc("foobar-data"), None, &mut cache).await;

    assert_eq!(context["pvc_is_not_referenced"], json!(false));
}

#[tokio::test]
async fn test_pvc_referenced_by_deployment() {
    let server = MockServer::start().await;
    mock_list(&server, "/apis/apps/v1/namespaces/default/deployments", "DeploymentList", json!([yaml(DEPLOYMENT_WITH_VOLUME)])).await;
    mock_empty_aux(&server).await;

    let client = client_for(&server);
    let mut cache = ContextCache::default();
    let context = get_resource_context(&client, &pvc("redis-data"), None, &mut cache).await;

    assert_eq!(context["pvc_is_not_referenced"], json!(false));
}

#[tokio::test]
async fn test_aux_listings_are_memoised_per_cycle() {
    let server = MockServer::start().await;
    mock_empty_aux(&server).await;

    let client = client_for(&server);
    let mut cache = ContextCache::default();
    get_resource_context(&client, &pvc("pvc-a"), None, &mut cache).await;
    get_resource_context(&client, &pvc("pvc-b"), None, &mut cache).await;

    // five auxiliary endpoints, each listed exactly once for both PVCs
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
}

#[tokio::test]
async fn test_non_pvc_gets_hook_context_only() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let resource = Resource {
        api_resource: ApiResource {
            group: String::new(),
            version: "v1".to_string(),
            api_version: "v1".to_string(),
            kind: "Namespace".to_string(),
            plural: "namespaces".to_string(),
        },
        namespace: None,
        name: "my-ns".to_string(),
        annotations: BTreeMap::new(),
        creation_timestamp: None,
        resource_version: None,
        uid: None,
        raw: json!({"metadata": {"name": "my-ns"}}),
    };

    let mut cache = ContextCache::default();
    let hook = janitor_kube::resolve_hook("random-dice").unwrap();
    let context = get_resource_context(&client, &resource, Some(hook), &mut cache).await;

    let value = context["random_dice"].as_i64().unwrap();
    assert!((1..=6).contains(&value));

    // the dice is rolled once per cycle
    let again = get_resource_context(&client, &resource, Some(hook), &mut cache).await;
    assert_eq!(again["random_dice"].as_i64().unwrap(), value);

    // no API traffic for non-PVC kinds
    assert!(server.received_requests().await.unwrap().is_empty());
}
