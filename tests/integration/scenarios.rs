//! End-to-end flows through the library with an in-memory origin

use bundlegate::audit;
use bundlegate::gateway::{Collaborators, Gateway};
use bundlegate::integrity::{HashAlgorithm, HashIndex};
use bundlegate::testing::{manifest_for, StaticProbe, StaticVersionClient, TestEnvironment};
use bundlegate::transport::{HttpResponse, HttpTransport};
use bundlegate::version::{MemoryKeyValueStore, NetworkProbe, ResolveOrigin, VersionApiClient};
use std::collections::HashMap;
use std::sync::Arc;

fn gateway_for(env: &TestEnvironment, client: StaticVersionClient) -> Gateway {
    Gateway::with_collaborators(
        &env.config(),
        Collaborators {
            transport: Arc::clone(&env.transport) as Arc<dyn HttpTransport>,
            client: Arc::new(client),
            probe: Arc::new(StaticProbe::new(true)),
            state: Arc::new(MemoryKeyValueStore::new()),
            audit: Arc::clone(&env.audit),
        },
    )
}

#[tokio::test]
async fn miss_then_hit() {
    for namespace in ["h5_v1", "20250101/v1"] {
        miss_then_hit_in(namespace).await;
    }
}

async fn miss_then_hit_in(namespace: &str) {
    let env = TestEnvironment::new(namespace).await;
    env.publish("build/main.js", b"console.log(1)");
    let server = env.server();

    let first = server.intercept("/build/main.js", None).await;
    assert_eq!(first.status, 200);
    assert_eq!(first.header("X-Cache"), Some("MISS"));
    assert_eq!(first.header("X-Integrity"), Some("VALID"));
    assert_eq!(first.mime_type, "application/javascript");

    let second = server.intercept("/build/main.js", None).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.header("X-Cache"), Some("HIT"));
    assert_eq!(second.header("X-Integrity"), Some("VALID"));
    assert_eq!(second.body, b"console.log(1)");
    assert_eq!(second.header("X-Resource-Path"), Some(namespace));
    assert_eq!(env.transport.calls(&env.resource_url("build/main.js")), 1);
}

fn md5(bytes: &[u8]) -> String {
    HashAlgorithm::Md5.hex_digest(bytes)
}

#[tokio::test]
async fn separator_keyed_manifest_is_enforced() {
    let env = TestEnvironment::new("h5_v1").await;
    let records = HashMap::from([
        (md5(b"/build/main.js"), md5(b"console.log(1)")),
        (md5(b"/build/app.css"), md5(b"body{}")),
    ]);
    let doc = HashIndex::new(HashAlgorithm::Md5, records).to_json().unwrap();
    env.transport.route(&env.hashes_url(), HttpResponse::ok(doc));
    env.tamper("build/main.js", b"console.log(1)");
    env.tamper("build/app.css", b"body{background:red}");
    let server = env.server();

    let good = server.intercept("/build/main.js", None).await;
    assert_eq!(good.status, 200);
    assert_eq!(good.header("X-Integrity"), Some("VALID"));

    let bad = server.intercept("/build/app.css", None).await;
    assert_eq!(bad.status, 500);
    assert_eq!(bad.header("X-Integrity"), Some("FAILED"));
    assert!(!env.cache().contains(&env.namespace(), "build/app.css").await);
}

#[tokio::test]
async fn concurrent_requests_share_failed_hash_load() {
    let env = TestEnvironment::new("h5_v1").await;
    env.transport
        .route(&env.hashes_url(), HttpResponse::status(503));
    for i in 0..8 {
        let path = format!("chunk{i}.js");
        env.tamper(&path, path.as_bytes());
    }
    let server = Arc::new(env.server());

    let mut tasks = Vec::new();
    for i in 0..8 {
        let server = Arc::clone(&server);
        tasks.push(tokio::spawn(async move {
            server.intercept(&format!("/chunk{i}.js"), None).await
        }));
    }
    for task in tasks {
        let response = task.await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("X-Integrity"), Some("UNVERIFIED"));
    }

    assert_eq!(env.transport.calls(&env.hashes_url()), 1);
    assert!(!env.cache().contains(&env.namespace(), "chunk0.js").await);
}

#[tokio::test]
async fn tampered_origin_is_refused_and_not_cached() {
    let env = TestEnvironment::new("h5_v1").await;
    env.publish("build/app.css", b"body{}");
    env.tamper("build/app.css", b"body{background:red}");
    let server = env.server();

    let response = server.intercept("/build/app.css", None).await;
    assert_eq!(response.status, 500);
    assert_eq!(response.header("X-Integrity"), Some("FAILED"));
    assert!(env
        .cache()
        .get(&env.namespace(), "build/app.css")
        .await
        .unwrap()
        .is_none());
    assert!(env
        .audit_events()
        .contains(&audit::INTEGRITY_MISMATCH.to_string()));

    // Origin recovers; the next request fetches again and succeeds
    env.publish("build/app.css", b"body{}");
    let retry = server.intercept("/build/app.css", None).await;
    assert_eq!(retry.status, 200);
    assert_eq!(retry.header("X-Cache"), Some("MISS"));
    assert_eq!(env.transport.calls(&env.resource_url("build/app.css")), 2);
}

#[tokio::test]
async fn stale_cached_entry_is_evicted_and_refetched() {
    let env = TestEnvironment::new("h5_v1").await;
    env.publish("assets/logo.svg", b"<svg/>");
    let server = env.server();
    assert_eq!(server.intercept("/assets/logo.svg", None).await.status, 200);

    // New hash manifest that no longer matches the cached bytes
    env.publish("assets/logo.svg", b"<svg version=\"2\"/>");
    let replacement = HashIndex::from_contents(
        HashAlgorithm::Md5,
        [("assets/logo.svg", b"<svg version=\"2\"/>".as_slice())],
    );
    env.hashes
        .replace(&env.namespace(), replacement)
        .await
        .unwrap();

    let response = server.intercept("/assets/logo.svg", None).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("X-Cache"), Some("MISS"));
    assert_eq!(response.body, b"<svg version=\"2\"/>");
    assert!(env
        .audit_events()
        .contains(&audit::ENTRY_EVICTED.to_string()));
    assert_eq!(env.transport.calls(&env.resource_url("assets/logo.svg")), 2);
}

#[tokio::test]
async fn evicted_namespace_reads_as_absent() {
    let env = TestEnvironment::new("h5_v1").await;
    env.publish("build/main.js", b"x");
    env.server().intercept("/build/main.js", None).await;

    assert!(env.lifecycle.evict(&env.namespace()).await.unwrap());
    assert!(env
        .cache()
        .get(&env.namespace(), "build/main.js")
        .await
        .unwrap()
        .is_none());
    assert_eq!(env.lifecycle.active().await, None);
}

#[tokio::test]
async fn concurrent_hash_loads_fetch_once() {
    let env = TestEnvironment::new("h5_v1").await;
    env.publish("a.js", b"a");

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let hashes = Arc::clone(&env.hashes);
        let namespace = env.namespace();
        tasks.push(tokio::spawn(async move { hashes.load_for(&namespace).await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().len(), 1);
    }
    assert_eq!(env.transport.calls(&env.hashes_url()), 1);
}

#[tokio::test]
async fn traversal_never_reaches_origin() {
    let env = TestEnvironment::new("h5_v1").await;
    let server = env.server();

    for path in ["/../secret", "/build/../../etc/passwd", "/C:/windows"] {
        let response = server.intercept(path, None).await;
        assert_eq!(response.status, 400, "{path}");
    }
    assert_eq!(env.transport.total_calls(), 0);
}

#[tokio::test]
async fn gateway_falls_back_to_persisted_manifest() {
    let env = TestEnvironment::uninitialized().await;
    let client = Arc::new(StaticVersionClient::returning(manifest_for("v1")));
    let gateway = Gateway::with_collaborators(
        &env.config(),
        Collaborators {
            transport: Arc::clone(&env.transport) as Arc<dyn HttpTransport>,
            client: Arc::clone(&client) as Arc<dyn VersionApiClient>,
            probe: Arc::new(StaticProbe::new(true)),
            state: Arc::new(MemoryKeyValueStore::new()),
            audit: Arc::clone(&env.audit),
        },
    );

    let first = gateway.initialize().await.unwrap();
    assert_eq!(first.origin, ResolveOrigin::Fresh);

    client.set_failing();
    let second = gateway.initialize().await.unwrap();
    assert_eq!(second.origin, ResolveOrigin::CachedFallback);
    assert_eq!(second.namespace.as_str(), "v1");
}

#[tokio::test]
async fn failed_resolution_without_history_errors() {
    let env = TestEnvironment::uninitialized().await;
    let gateway = gateway_for(&env, StaticVersionClient::failing_unavailable());

    assert!(gateway.initialize().await.is_err());
    assert_eq!(gateway.intercept("/build/main.js", None).await.status, 503);
}

#[tokio::test]
async fn offline_probe_serves_cached_manifest() {
    let env = TestEnvironment::uninitialized().await;
    let client = StaticVersionClient::returning(manifest_for("v1"));
    let probe = Arc::new(StaticProbe::new(true));
    let gateway = Gateway::with_collaborators(
        &env.config(),
        Collaborators {
            transport: Arc::clone(&env.transport) as Arc<dyn HttpTransport>,
            client: Arc::new(client),
            probe: Arc::clone(&probe) as Arc<dyn NetworkProbe>,
            state: Arc::new(MemoryKeyValueStore::new()),
            audit: Arc::clone(&env.audit),
        },
    );

    gateway.initialize().await.unwrap();
    probe.set_online(false);
    let again = gateway.initialize().await.unwrap();

    assert_eq!(again.origin, ResolveOrigin::CachedFallback);
    assert_eq!(again.namespace.as_str(), "v1");
    assert!(env
        .audit_events()
        .contains(&audit::MANIFEST_FALLBACK.to_string()));
}

#[tokio::test]
async fn unlisted_path_is_served_unverified() {
    let env = TestEnvironment::new("h5_v1").await;
    env.publish("listed.js", b"1");
    env.tamper("extra/readme.txt", b"hello");

    let response = env.server().intercept("/extra/readme.txt", None).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("X-Integrity"), Some("UNVERIFIED"));
}
