//! Public front end: proxies orders and payments with its own identity

use super::common::{self, expect_success};
use super::model::Order;
use super::MeshState;
use crate::attacks::AttackResult;
use crate::config::Peer;
use crate::error::{Error, Result};
use crate::identity::IdToken;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header::CONTENT_TYPE, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use reqwest::Method;

const ATTACKS: &[(u32, &str)] = &[
    (1, "website-service updates the order store"),
    (2, "website-service reads from the order store"),
    (3, "website-service reaches deeper services"),
    (4, "website-service abuses leaked id token"),
    (5, "website-service abuses leaked id token and gets data"),
    (6, "website-service chains leaked id tokens and writes invoice data"),
    (7, "website-service chains leaked id tokens and writes distant invoice data"),
];

pub fn routes(state: MeshState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/payments", post(create_payment))
        .route("/attacks", get(|| async { common::listing(ATTACKS) }))
        .route("/attacks/:n", get(attack).post(attack))
        .with_state(state)
}

async fn create_order(State(state): State<MeshState>, headers: HeaderMap, body: Bytes) -> Response {
    forward(&state, Peer::Order, "/orders", &headers, body).await
}

async fn create_payment(State(state): State<MeshState>, headers: HeaderMap, body: Bytes) -> Response {
    forward(&state, Peer::Payment, "/payments", &headers, body).await
}

/// Relay a browser request to a backend, authenticated as the website
async fn forward(state: &MeshState, peer: Peer, path: &str, headers: &HeaderMap, body: Bytes) -> Response {
    let relayed = async {
        let url = format!("{}{}", state.peer(peer)?, path);
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json");
        let response = state
            .client()
            .do_authenticated(Method::POST, &url, Some((body.to_vec(), content_type)), &IdToken::empty())
            .await?;

        let status = response.status();
        let content_type = response.headers().get(CONTENT_TYPE).cloned();
        let bytes = response.bytes().await?;
        Ok::<_, Error>((status, content_type, bytes))
    }
    .await;

    match relayed {
        Ok((status, content_type, bytes)) => {
            let mut response = (status, bytes).into_response();
            if let Some(content_type) = content_type {
                response.headers_mut().insert(CONTENT_TYPE, content_type);
            }
            response
        }
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
        3 => reach_number_service(&state, base.clone()).await,
        4 => impersonate_payment(&state, base.clone()).await,
        5 => impersonate_payment_for_data(&state, base.clone()).await,
        6 => short_chain_to_print(&state, base.clone()).await,
        7 => long_chain_to_print(&state, base.clone()).await,
        _ => return Error::UnknownAttack(n).into_response(),
    };
    common::finish(&state, base, outcome).into_response()
}

/// The website itself is allowed to call the number service
async fn reach_number_service(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    let url = format!("{}/ranges/payment", state.peer(Peer::Number)?);
    expect_success(state.client().get_with_auth(&url, &IdToken::empty()).await?)?;
    Ok(base.succeed(10))
}

async fn impersonate_payment(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    let target = format!("{}/ranges/payment", state.peer(Peer::Number)?);
    let token = state
        .resolver
        .leak_token(state.peer(Peer::Payment)?, &target, &IdToken::empty())
        .await?;
    expect_success(state.client().get_with_auth(&target, &token).await?)?;
    Ok(base.succeed(10))
}

async fn impersonate_payment_for_data(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    let target = format!("{}/leaks/data", state.peer(Peer::Order)?);
    let token = state
        .resolver
        .leak_token(state.peer(Peer::Payment)?, &target, &IdToken::empty())
        .await?;
    let response = expect_success(state.client().get_with_auth(&target, &token).await?)?;
    let data = response.text().await?;
    Ok(base.succeed(100).with_loot("data", data))
}

async fn short_chain_to_print(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    let target = format!("{}/invoices", state.peer(Peer::Print)?);
    let route = [state.peer(Peer::Order)?.to_string()];
    print_invoice(state, base, &route, &target).await
}

async fn long_chain_to_print(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    let target = format!("{}/invoices", state.peer(Peer::Print)?);
    let route = [
        state.peer(Peer::Payment)?.to_string(),
        state.peer(Peer::Order)?.to_string(),
    ];
    print_invoice(state, base, &route, &target).await
}

async fn print_invoice(
    state: &MeshState,
    base: AttackResult,
    route: &[String],
    target: &str,
) -> Result<AttackResult> {
    let token = state.resolver.resolve(route, target).await?;
    let response = expect_success(
        state
            .client()
            .post_json_with_auth(target, &Order::planted(), &token)
            .await?,
    )?;
    let invoice = response.text().await?;
    Ok(base.succeed(1000).with_loot("invoice", invoice))
}
