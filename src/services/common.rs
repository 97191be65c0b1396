//! Endpoints and helpers every mesh role shares

use super::model::Order;
use super::MeshState;
use crate::attacks::{format_attack_listing, AttackResult};
use crate::config::Peer;
use crate::error::{Error, ErrorKind, Result};
use crate::identity::IdToken;
use crate::store::{ORDERS, SECRETS};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

/// Message for failures caused by deployment rather than by the attack
pub const SETUP_ERROR: &str = "error in exercise code or setup";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }
        (
            status,
            Json(ErrorBody {
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// `/healthz` and `/leaks/id-token`, served by every role
pub fn routes(state: MeshState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(crate::chain::LEAK_TOKEN_PATH, get(leak_id_token))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "OK"
}

#[derive(Deserialize)]
struct LeakQuery {
    url: Option<String>,
}

/// Mint a token for whatever audience the caller names, no questions asked
async fn leak_id_token(State(state): State<MeshState>, Query(query): Query<LeakQuery>) -> Response {
    let Some(target) = query.url.filter(|u| !u.is_empty()) else {
        return Error::MalformedInput("missing url parameter".to_string()).into_response();
    };

    match state.client().token_source().mint(&target).await {
        Ok(token) => {
            log::info!("[leak] handing out id token for {}", target);
            token.into_inner().into_response()
        }
        Err(e) => {
            log::error!("[leak] could not get id token: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    message: SETUP_ERROR.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// `/leaks/data`: some secret document, handed to anyone
pub async fn leak_data(State(state): State<MeshState>) -> Response {
    match state.store.documents.first(SECRETS).await {
        Ok(doc) => Json(doc.unwrap_or_default()).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Plain-text body for a role's `GET /attacks`
pub fn listing(attacks: &[(u32, &str)]) -> String {
    let locals: Vec<u32> = attacks.iter().map(|(n, _)| *n).collect();
    format_attack_listing(&locals)
}

/// Resolve a `/attacks/{n}` path segment against a role's attack table
pub fn lookup_attack(attacks: &[(u32, &str)], raw: &str) -> Result<(u32, AttackResult)> {
    let n: u32 = raw
        .parse()
        .map_err(|_| Error::MalformedInput(format!("invalid attack name {}", raw)))?;
    attacks
        .iter()
        .find(|(local, _)| *local == n)
        .map(|(local, explanation)| (*local, AttackResult::new(*explanation)))
        .ok_or(Error::UnknownAttack(n))
}

/// Turn an attack outcome into the 200 response attack endpoints always give
pub fn finish(state: &MeshState, base: AttackResult, outcome: Result<AttackResult>) -> Json<AttackResult> {
    let role = state.role.service_name();
    match outcome {
        Ok(result) => {
            log::info!("[attack] {}: {} successful", role, result.explanation);
            Json(result)
        }
        Err(e) => {
            log::info!("[attack] {}: {} failed: {}", role, base.explanation, e);
            let message = (e.kind() == ErrorKind::Configuration).then_some(SETUP_ERROR);
            Json(base.fail(message))
        }
    }
}

/// Fail on anything but a success status
pub fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(Error::unexpected_status(response.url().as_str(), response.status()))
    }
}

/// Next number for `key` from the number service
pub async fn next_number(state: &MeshState, key: &str) -> Result<u64> {
    let url = format!("{}/ranges/{}", state.peer(Peer::Number)?, key);
    let response = expect_success(state.client().get_with_auth(&url, &IdToken::empty()).await?)?;
    let body = response.text().await?;
    body.trim().parse().map_err(|_| Error::Upstream {
        url,
        reason: format!("not a number: {:?}", body),
    })
}

/// Plant an order in the document store, which nobody should allow
pub async fn write_documents(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    let order = Order::planted();
    state
        .store
        .documents
        .create(ORDERS, &order.order_number.to_string(), serde_json::to_value(&order)?)
        .await?;
    Ok(base.succeed(1000))
}

/// Read someone's order from the document store
pub async fn read_documents(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    let doc = state
        .store
        .documents
        .first(ORDERS)
        .await?
        .ok_or_else(|| Error::Store("no orders to read".to_string()))?;
    Ok(base.succeed(100).with_loot("document", doc.to_string()))
}
