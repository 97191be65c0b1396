//! Order intake and lookup

use super::common;
use super::model::Order;
use super::MeshState;
use crate::error::{Error, Result};
use crate::store::ORDERS;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

const ATTACKS: &[(u32, &str)] = &[
    (1, "order-service updates the order store"),
    (2, "order-service reads from the order store"),
];

pub fn routes(state: MeshState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:number", get(get_order))
        .route("/leaks/data", get(common::leak_data))
        .route("/attacks", get(|| async { common::listing(ATTACKS) }))
        .route("/attacks/:n", get(attack).post(attack))
        .with_state(state)
}

async fn create_order(State(state): State<MeshState>, body: axum::body::Bytes) -> Response {
    match place_order(&state, &body).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn place_order(state: &MeshState, body: &[u8]) -> Result<Order> {
    let mut order: Order = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedInput(format!("invalid order: {}", e)))?;
    order.order_number = common::next_number(state, "order").await?;

    state
        .store
        .documents
        .set(ORDERS, &order.order_number.to_string(), serde_json::to_value(&order)?)
        .await?;
    log::info!("created order {} for {}", order.order_number, order.customer);
    Ok(order)
}

/// Also answers `HEAD`, which payment uses as an existence check
async fn get_order(State(state): State<MeshState>, Path(raw): Path<String>) -> Response {
    let lookup = async {
        let number: u64 = raw
            .parse()
            .map_err(|_| Error::MalformedInput(format!("invalid order number {}", raw)))?;
        state.store.documents.get(ORDERS, &number.to_string()).await
    };

    match lookup.await {
        Ok(Some(order)) => Json(order).into_response(),
        Ok(None) => (
            axum::http::StatusCode::NOT_FOUND,
            Json(common::ErrorBody {
                message: "unknown order number".to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn attack(State(state): State<MeshState>, Path(raw): Path<String>) -> Response {
    let (n, base) = match common::lookup_attack(ATTACKS, &raw) {
        Ok(found) => found,
        Err(e) => return e.into_response(),
    };

    let outcome = match n {
        1 => common::write_documents(&state, base.clone()).await,
        2 => common::read_documents(&state, base.clone()).await,
        _ => return Error::UnknownAttack(n).into_response(),
    };
    common::finish(&state, base, outcome).into_response()
}
