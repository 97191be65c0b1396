mod common;

use common::{spawn_app, MockBehavior, MockService};
use leaky_mesh::attacks::{AttackDispatcher, CatalogCache, MeshDiscovery};
use leaky_mesh::identity::StubTokenSource;
use leaky_mesh::config::Peer;
use leaky_mesh::services::build_router;
use leaky_mesh::{
    AttackSummary, AuthClient, ChainResolver, Error, MeshConfig, Role, ServiceIdentity, Topology,
};
use std::sync::Arc;
use std::time::Duration;

struct Mesh {
    website: MockService,
    order: MockService,
    topology: Topology,
}

/// website {0: 10, 1: 100} and order {0: 1000, 1: 0}, order reached via website
async fn small_mesh() -> Mesh {
    let website = MockService::spawn(
        "website",
        MockBehavior::listing("0,1").with_points(0, 10).with_points(1, 100),
    )
    .await;
    let order = MockService::spawn(
        "order",
        MockBehavior::listing("0,1").with_points(0, 1000).with_points(1, 0),
    )
    .await;

    let topology = Topology::new(
        vec![
            ServiceIdentity {
                name: "website-service".into(),
                base_url: website.url.clone(),
                offset: 0,
                route: vec![],
            },
            ServiceIdentity {
                name: "order-service".into(),
                base_url: order.url.clone(),
                offset: 100,
                route: vec![website.url.clone()],
            },
        ],
        100,
    )
    .unwrap();

    Mesh {
        website,
        order,
        topology,
    }
}

async fn dispatcher(topology: Topology) -> AttackDispatcher {
    let topology = Arc::new(topology);
    let resolver = ChainResolver::new(AuthClient::new(Arc::new(StubTokenSource::new(
        "intruder-service",
    ))));
    let discovery = Arc::new(MeshDiscovery::new(topology.clone(), resolver.clone()));
    let cache = Arc::new(CatalogCache::new(discovery, Duration::from_secs(60)));
    cache.refresh_if_stale().await;
    AttackDispatcher::new(cache, topology, resolver)
}

#[tokio::test]
async fn test_launch_all_sums_points() {
    let mesh = small_mesh().await;
    let dispatcher = dispatcher(mesh.topology).await;

    let summary = dispatcher.launch_all().await;

    assert_eq!(summary.score, 1110);
    assert_eq!(summary.attack_results.len(), 4);
    assert!(summary.failures.is_empty());
    // order attacks carry the token website leaked for them
    assert!(mesh
        .order
        .attack_bearers()
        .iter()
        .all(|bearer| *bearer == mesh.website.leaked_token()));
}

#[tokio::test]
async fn test_unknown_attack_id() {
    let mesh = small_mesh().await;
    let dispatcher = dispatcher(mesh.topology).await;
    assert_eq!(
        dispatcher.list_attacks().keys().copied().collect::<Vec<_>>(),
        vec![0, 1, 100, 101]
    );

    assert!(matches!(
        dispatcher.launch(999).await,
        Err(Error::UnknownAttack(999))
    ));
    assert!(matches!(
        dispatcher.launch_one(999).await,
        Err(Error::UnknownAttack(999))
    ));
}

#[tokio::test]
async fn test_failing_attack_still_reported() {
    let website = MockService::spawn(
        "website",
        MockBehavior::listing("0,1,2").with_points(0, 10).with_points(2, 1000),
    )
    .await;
    let topology = Topology::new(
        vec![ServiceIdentity {
            name: "website-service".into(),
            base_url: website.url.clone(),
            offset: 0,
            route: vec![],
        }],
        100,
    )
    .unwrap();
    let dispatcher = dispatcher(topology).await;

    let summary = dispatcher.launch_all().await;
    assert_eq!(summary.score, 1010);
    assert_eq!(summary.attack_results.len(), 3);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].id, 1);
    assert!(summary.attack_results[1]
        .explanation
        .starts_with("error on attack 1:"));

    let single = dispatcher.launch_one(1).await.unwrap();
    assert_eq!(single.score, 0);
    assert_eq!(single.failures.len(), 1);
}

#[tokio::test]
async fn test_intruder_http_surface() {
    let mesh = small_mesh().await;
    let mut config = MeshConfig::default();
    config.peers.insert(Peer::Website, mesh.website.url.clone());
    let config = Arc::new(config);
    let tokens = config.token_source(Role::Intruder.service_name());
    let app = build_router(Role::Intruder, config, tokens, Some(mesh.topology)).unwrap();
    let intruder = spawn_app(app).await;
    let http = reqwest::Client::new();

    let catalog: serde_json::Value = http
        .get(format!("{}/attacks", intruder))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(catalog.as_object().unwrap().len(), 4);
    assert_eq!(catalog["101"]["component"], "order-service");
    assert_eq!(catalog["101"]["local"], 1);

    let summary: AttackSummary = http
        .post(format!("{}/attacks", intruder))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary.score, 1110);

    let summary: AttackSummary = http
        .post(format!("{}/attacks/100", intruder))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary.score, 1000);

    let response = http
        .post(format!("{}/attacks/999", intruder))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = http
        .post(format!("{}/attacks/lots", intruder))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let health = http.get(format!("{}/healthz", intruder)).send().await.unwrap();
    assert_eq!(health.text().await.unwrap(), "OK");
}
