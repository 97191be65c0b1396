//! The attacker: discovers every service's attacks and launches them

use super::common::expect_success;
use super::model::{Order, Payment};
use super::MeshState;
use crate::attacks::{AttackDispatcher, CatalogCache, MeshDiscovery};
use crate::config::Peer;
use crate::error::{Error, Result};
use crate::identity::IdToken;
use crate::topology::Topology;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

#[derive(Clone)]
pub struct IntruderState {
    pub mesh: MeshState,
    pub dispatcher: Arc<AttackDispatcher>,
}

impl IntruderState {
    pub fn new(mesh: MeshState, topology: Arc<Topology>) -> Self {
        let discovery = Arc::new(MeshDiscovery::new(topology.clone(), mesh.resolver.clone()));
        let cache = Arc::new(CatalogCache::new(discovery, mesh.config.catalog_ttl));
        let dispatcher = Arc::new(AttackDispatcher::new(cache, topology, mesh.resolver.clone()));
        Self { mesh, dispatcher }
    }

    pub fn cache(&self) -> &Arc<CatalogCache> {
        self.dispatcher.cache()
    }
}

pub fn routes(state: IntruderState) -> Router {
    let attacks = Router::new()
        .route("/attacks", get(list_attacks).post(launch_all))
        .route("/attacks/:id", post(launch_one))
        .route_layer(middleware::from_fn_with_state(state.clone(), refresh_catalog));

    Router::new()
        .merge(attacks)
        .route("/tests/normal", get(normal_flow))
        .with_state(state)
}

/// Bring the catalog up to date before any attack request is handled
async fn refresh_catalog(State(state): State<IntruderState>, request: Request, next: Next) -> Response {
    state.cache().refresh_if_stale().await;
    next.run(request).await
}

async fn list_attacks(State(state): State<IntruderState>) -> Response {
    Json(state.dispatcher.list_attacks()).into_response()
}

async fn launch_all(State(state): State<IntruderState>) -> Response {
    Json(state.dispatcher.launch_all().await).into_response()
}

async fn launch_one(State(state): State<IntruderState>, Path(raw): Path<String>) -> Response {
    let id: u32 = match raw.parse() {
        Ok(id) => id,
        Err(_) => return Error::MalformedInput(format!("invalid attack name {}", raw)).into_response(),
    };

    match state.dispatcher.launch_one(id).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Place and pay an order through the website, the way a customer would
async fn normal_flow(State(state): State<IntruderState>) -> Response {
    match place_and_pay(&state.mesh).await {
        Ok(order_number) => {
            log::info!("normal flow completed with order {}", order_number);
            "Success".into_response()
        }
        Err(e) => {
            log::error!("normal flow failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn place_and_pay(mesh: &MeshState) -> Result<u64> {
    let website = mesh.peer(Peer::Website)?;
    let client = mesh.client();

    let order = Order::new("regular customer", "flowers", 3);
    let url = format!("{}/orders", website);
    let response = expect_success(client.post_json_with_auth(&url, &order, &IdToken::empty()).await?)?;
    let order: Order = response.json().await?;

    let payment = Payment {
        order_number: order.order_number,
        payment_number: 0,
    };
    let url = format!("{}/payments", website);
    expect_success(client.post_json_with_auth(&url, &payment, &IdToken::empty()).await?)?;

    Ok(order.order_number)
}
