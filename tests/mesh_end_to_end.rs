mod common;

use common::{bind, serve_on, spawn_app};
use leaky_mesh::config::{MeshConfig, Peer, Role};
use leaky_mesh::services::build_router;
use leaky_mesh::AttackSummary;
use std::sync::Arc;

struct RunningMesh {
    config: Arc<MeshConfig>,
    intruder: String,
    http: reqwest::Client,
}

impl RunningMesh {
    fn peer(&self, peer: Peer) -> &str {
        self.config.peer(peer).unwrap()
    }
}

/// All five services and the intruder, each with its own stores and stub identity
async fn start_mesh() -> RunningMesh {
    let roles = [
        (Role::Website, Peer::Website),
        (Role::Order, Peer::Order),
        (Role::Payment, Peer::Payment),
        (Role::Number, Peer::Number),
        (Role::Print, Peer::Print),
    ];

    let mut config = MeshConfig::default();
    let mut listeners = Vec::new();
    for (role, peer) in roles {
        let (listener, url) = bind().await;
        config.peers.insert(peer, url);
        listeners.push((role, listener));
    }
    let config = Arc::new(config);

    for (role, listener) in listeners {
        let tokens = config.token_source(role.service_name());
        let app = build_router(role, config.clone(), tokens, None).unwrap();
        serve_on(listener, app);
    }

    let tokens = config.token_source(Role::Intruder.service_name());
    let intruder = spawn_app(build_router(Role::Intruder, config.clone(), tokens, None).unwrap()).await;

    RunningMesh {
        config,
        intruder,
        http: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_intruder_discovers_every_service() {
    let mesh = start_mesh().await;

    let catalog: serde_json::Value = mesh
        .http
        .get(format!("{}/attacks", mesh.intruder))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let mut ids: Vec<u32> = catalog
        .as_object()
        .unwrap()
        .keys()
        .map(|k| k.parse().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(
        ids,
        vec![1, 2, 3, 4, 5, 6, 7, 101, 102, 201, 202, 301, 302, 401]
    );
    assert_eq!(catalog["401"]["component"], "print-service");
}

#[tokio::test]
async fn test_every_attack_succeeds() {
    let mesh = start_mesh().await;

    let summary: AttackSummary = mesh
        .http
        .post(format!("{}/attacks", mesh.intruder))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    for result in &summary.attack_results {
        assert!(result.points > 0, "{:?}", result);
        assert!(result.log.is_none(), "{:?}", result);
    }
    assert_eq!(summary.attack_results.len(), 14);
    assert_eq!(summary.score, 6530);

    let long_chain = summary
        .attack_results
        .iter()
        .find(|r| r.explanation.contains("distant invoice"))
        .unwrap();
    assert_eq!(long_chain.points, 1000);
    assert_eq!(long_chain.loot[0].key, "invoice");
}

#[tokio::test]
async fn test_single_attack_by_global_id() {
    let mesh = start_mesh().await;

    let summary: AttackSummary = mesh
        .http
        .post(format!("{}/attacks/401", mesh.intruder))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(summary.score, 100);
    assert_eq!(summary.attack_results[0].loot[0].key, "happy-little-file.txt");
}

#[tokio::test]
async fn test_normal_flow() {
    let mesh = start_mesh().await;

    let response = mesh
        .http
        .get(format!("{}/tests/normal", mesh.intruder))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Success");
}

#[tokio::test]
async fn test_business_endpoints() {
    let mesh = start_mesh().await;
    let website = mesh.peer(Peer::Website);

    let order: serde_json::Value = mesh
        .http
        .post(format!("{}/orders", website))
        .json(&serde_json::json!({"customer": "c", "name": "tulips", "quantity": 2}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let order_number = order["orderNumber"].as_u64().unwrap();
    assert!(order_number >= 1);

    let stored = mesh
        .http
        .head(format!("{}/orders/{}", mesh.peer(Peer::Order), order_number))
        .send()
        .await
        .unwrap();
    assert_eq!(stored.status(), 200);

    let unpaid = mesh
        .http
        .post(format!("{}/payments", website))
        .json(&serde_json::json!({"orderNumber": 9999}))
        .send()
        .await
        .unwrap();
    assert_eq!(unpaid.status(), 404);

    let garbage = mesh
        .http
        .post(format!("{}/orders", mesh.peer(Peer::Order)))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), 400);
}

#[tokio::test]
async fn test_role_surfaces() {
    let mesh = start_mesh().await;
    let order = mesh.peer(Peer::Order);

    let listing = mesh
        .http
        .get(format!("{}/attacks", order))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(listing, "1,2");

    let missing_url = mesh
        .http
        .get(format!("{}/leaks/id-token", order))
        .send()
        .await
        .unwrap();
    assert_eq!(missing_url.status(), 400);

    let leaked = mesh
        .http
        .get(format!("{}/leaks/id-token", order))
        .query(&[("url", "http://anywhere/at/all")])
        .send()
        .await
        .unwrap();
    assert_eq!(leaked.status(), 200);
    assert!(!leaked.text().await.unwrap().is_empty());

    let unknown = mesh
        .http
        .post(format!("{}/attacks/9", order))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);

    let first = mesh
        .http
        .get(format!("{}/ranges/test", mesh.peer(Peer::Number)))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(first, "1");
}

#[test]
fn test_missing_required_peer_refuses_to_start() {
    let config = Arc::new(MeshConfig::default());
    let tokens = config.token_source(Role::Website.service_name());
    let err = build_router(Role::Website, config, tokens, None).unwrap_err();
    assert!(err.to_string().contains("ORDER_SERVICE"));
}

#[test]
fn test_intruder_needs_website() {
    let config = Arc::new(MeshConfig::default());
    let tokens = config.token_source(Role::Intruder.service_name());
    let err = build_router(Role::Intruder, config, tokens, None).unwrap_err();
    assert!(err.to_string().contains("WEBSITE_SERVICE"));
}
