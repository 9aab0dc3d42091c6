//! Kubernetes API interaction tests against a mock API server.
//!
//! Tests cover:
//! - Server-side apply request shape of the Secret mirror
//! - Apply failures surfacing as PublishError::Apply
//! - Reading the mirror back through a Secret GET
//! - The ConfigMap watch loop feeding the controller channel
//! - Relisting after the API server rejects an expired resourceVersion

use std::time::Duration;

use base64::Engine;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use todolist_core::config::KubernetesConfig;
use todolist_core::controller::{self, ControllerMessage};
use todolist_core::engine::LifecyclePhase;
use todolist_core::kube::{KubeClient, Secret};
use todolist_core::model::{StoreMap, TodoItem};
use todolist_core::publish::{PublishError, Publisher, SecretApplyPublisher};
use todolist_core::watch::ConfigMapWatcher;

const SECRET_PATH: &str = "/api/v1/namespaces/todolist/secrets/todos";

fn sample_map() -> StoreMap {
    [TodoItem::new("dishes", "todo"), TodoItem::new("laundry", "done")]
        .into_iter()
        .collect()
}

#[tokio::test]
async fn test_secret_apply_request_shape() {
    let server = MockServer::start().await;
    let map = sample_map();

    Mock::given(method("PATCH"))
        .and(path(SECRET_PATH))
        .and(query_param("fieldManager", "todolist-agent"))
        .and(query_param("force", "true"))
        .and(header("content-type", "application/apply-patch+yaml"))
        .and(header("authorization", "Bearer t0ken"))
        .and(body_json(json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {"name": "todos", "namespace": "todolist"},
            "stringData": {"list": map.to_json().unwrap()},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"kind": "Secret"})))
        .expect(2)
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), Some("t0ken")).unwrap();
    let publisher = SecretApplyPublisher::new(client, "todolist", &KubernetesConfig::default());

    publisher.publish(&map).await.unwrap();
    // Re-applying the same map is accepted.
    publisher.publish(&map).await.unwrap();
}

#[tokio::test]
async fn test_secret_apply_failure_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path(SECRET_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), None).unwrap();
    let publisher = SecretApplyPublisher::new(client, "todolist", &KubernetesConfig::default());

    match publisher.publish(&sample_map()).await {
        Err(PublishError::Apply { kind, namespace, name, .. }) => {
            assert_eq!(kind, "Secret");
            assert_eq!(namespace, "todolist");
            assert_eq!(name, "todos");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_read_mirror_from_secret() {
    let server = MockServer::start().await;
    let payload = sample_map().to_json().unwrap();
    let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);

    Mock::given(method("GET"))
        .and(path(SECRET_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metadata": {"name": "todos", "namespace": "todolist"},
            "data": {"list": encoded},
        })))
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), None).unwrap();
    let secret: Secret = client.get_json(SECRET_PATH).await.unwrap();
    let decoded = secret.decoded("list").unwrap();

    assert_eq!(
        StoreMap::from_json(decoded.as_deref()).unwrap(),
        sample_map()
    );
}

#[tokio::test]
async fn test_watch_forwards_todo_events() {
    let server = MockServer::start().await;
    let body = [
        r#"{"type":"ADDED","object":{"metadata":{"name":"cm-a","resourceVersion":"1"},"data":{"task":"dishes","status":"todo"}}}"#,
        r#"{"type":"ADDED","object":{"metadata":{"name":"kube-root-ca.crt","resourceVersion":"2"},"data":{"ca.crt":"..."}}}"#,
        r#"{"type":"BOOKMARK","object":{"metadata":{"resourceVersion":"3"}}}"#,
        r#"{"type":"DELETED","object":{"metadata":{"name":"cm-a","resourceVersion":"4"},"data":{"task":"dishes","status":"todo"}}}"#,
    ]
    .join("\n");

    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/todolist/configmaps"))
        .and(query_param("watch", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), None).unwrap();
    let watcher = ConfigMapWatcher::new(client, "todolist", Duration::from_millis(50));
    let (tx, mut rx) = controller::channel(4);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(tx, shutdown.clone()));

    let mut phases = Vec::new();
    for _ in 0..2 {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(ControllerMessage::Event(event))) => {
                assert_eq!(event.item, TodoItem::new("dishes", "todo"));
                phases.push(event.phase);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
    assert_eq!(phases, vec![LifecyclePhase::Created, LifecyclePhase::Deleted]);

    shutdown.cancel();
    drop(rx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_watch_retries_after_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/todolist/configmaps"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/todolist/configmaps"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"type":"MODIFIED","object":{"metadata":{"name":"cm-b","resourceVersion":"9"},"data":{"task":"laundry"}}}"#,
        ))
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), None).unwrap();
    let watcher = ConfigMapWatcher::new(client, "todolist", Duration::from_millis(20));
    let (tx, mut rx) = controller::channel(4);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(tx, shutdown.clone()));

    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
        Ok(Some(ControllerMessage::Event(event))) => {
            assert_eq!(event.phase, LifecyclePhase::Updated);
            assert_eq!(event.item, TodoItem::new("laundry", ""));
        }
        other => panic!("unexpected message: {other:?}"),
    }

    shutdown.cancel();
    drop(rx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_watch_relists_after_expired_resource_version() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/todolist/configmaps"))
        .and(query_param("resourceVersion", "5"))
        .respond_with(ResponseTemplate::new(410).set_body_string("too old resource version"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/todolist/configmaps"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"type":"ADDED","object":{"metadata":{"name":"cm-a","resourceVersion":"5"},"data":{"task":"dishes","status":"todo"}}}"#,
        ))
        .mount(&server)
        .await;

    let client = KubeClient::new(&server.uri(), None).unwrap();
    let watcher = ConfigMapWatcher::new(client, "todolist", Duration::from_millis(20));
    let (tx, mut rx) = controller::channel(4);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(watcher.run(tx, shutdown.clone()));

    for _ in 0..2 {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(ControllerMessage::Event(event))) => {
                assert_eq!(event.item, TodoItem::new("dishes", "todo"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    shutdown.cancel();
    drop(rx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    let versions: Vec<Option<String>> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|req| {
            req.url
                .query_pairs()
                .find(|(key, _)| key == "resourceVersion")
                .map(|(_, value)| value.into_owned())
        })
        .collect();
    assert!(versions.len() >= 3);
    assert_eq!(versions[0], None);
    assert_eq!(versions[1].as_deref(), Some("5"));
    assert_eq!(versions[2], None);
}
