//! Payments for existing orders

use super::common::{self, ErrorBody};
use super::model::Payment;
use super::MeshState;
use crate::attacks::AttackResult;
use crate::config::Peer;
use crate::error::{Error, Result};
use crate::identity::IdToken;
use crate::store::PAYMENTS_BUCKET;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

const ATTACKS: &[(u32, &str)] = &[
    (1, "payment-service explores payments bucket"),
    (2, "payment-service writes to payments bucket"),
];

pub fn routes(state: MeshState) -> Router {
    Router::new()
        .route("/payments", post(create_payment))
        .route("/attacks", get(|| async { common::listing(ATTACKS) }))
        .route("/attacks/:n", get(attack).post(attack))
        .with_state(state)
}

async fn create_payment(State(state): State<MeshState>, body: axum::body::Bytes) -> Response {
    let payment: Payment = match serde_json::from_slice(&body) {
        Ok(payment) => payment,
        Err(e) => return Error::MalformedInput(format!("invalid payment: {}", e)).into_response(),
    };

    match order_exists(&state, payment.order_number).await {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorBody {
                    message: format!("unknown order number {}", payment.order_number),
                }),
            )
                .into_response()
        }
        Err(e) => return e.into_response(),
    }

    match record_payment(&state, payment).await {
        Ok(payment) => Json(payment).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn order_exists(state: &MeshState, order_number: u64) -> Result<bool> {
    let url = format!("{}/orders/{}", state.peer(Peer::Order)?, order_number);
    let response = state.client().head_with_auth(&url, &IdToken::empty()).await?;
    Ok(response.status().is_success())
}

async fn record_payment(state: &MeshState, mut payment: Payment) -> Result<Payment> {
    payment.payment_number = common::next_number(state, "payment").await?;
    let name = format!("payment-{}", payment.payment_number);
    state
        .store
        .objects
        .put(PAYMENTS_BUCKET, &name, serde_json::to_vec(&payment)?)
        .await?;
    log::info!("order {} paid with {}", payment.order_number, name);
    Ok(payment)
}

async fn attack(State(state): State<MeshState>, Path(raw): Path<String>) -> Response {
    let (n, base) = match common::lookup_attack(ATTACKS, &raw) {
        Ok(found) => found,
        Err(e) => return e.into_response(),
    };

    let outcome = match n {
        1 => list_bucket(&state, base.clone()).await,
        2 => write_bucket(&state, base.clone()).await,
        _ => return Error::UnknownAttack(n).into_response(),
    };
    common::finish(&state, base, outcome).into_response()
}

async fn list_bucket(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    let names = state.store.objects.list(PAYMENTS_BUCKET).await?;
    let mut result = base.succeed(10);
    if let Some(first) = names.first() {
        result = result.with_loot("object", first.clone());
    }
    Ok(result)
}

async fn write_bucket(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    state
        .store
        .objects
        .put(PAYMENTS_BUCKET, "hacker-payment", b"{\"paid\":true}".to_vec())
        .await?;
    Ok(base.succeed(1000))
}
