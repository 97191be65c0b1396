//! Invoice printing

use super::common;
use super::model::{Invoice, Order};
use super::MeshState;
use crate::attacks::AttackResult;
use crate::error::{Error, Result};
use crate::store::{HAPPY_FILE, INVOICES_BUCKET, PAYMENTS_BUCKET};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

const ATTACKS: &[(u32, &str)] = &[(1, "print-service reads from payments bucket")];

pub fn routes(state: MeshState) -> Router {
    Router::new()
        .route("/invoices", post(create_invoice))
        .route("/leaks/data", get(common::leak_data))
        .route("/attacks", get(|| async { common::listing(ATTACKS) }))
        .route("/attacks/:n", get(attack).post(attack))
        .with_state(state)
}

async fn create_invoice(State(state): State<MeshState>, body: axum::body::Bytes) -> Response {
    match print_invoice(&state, &body).await {
        Ok(invoice) => Json(invoice).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn print_invoice(state: &MeshState, body: &[u8]) -> Result<Invoice> {
    let order: Order = serde_json::from_slice(body)
        .map_err(|e| Error::MalformedInput(format!("invalid order: {}", e)))?;
    let invoice = Invoice::for_order(&order, common::next_number(state, "invoice").await?);

    let name = format!("invoice-{}", invoice.invoice_number);
    state
        .store
        .objects
        .put(INVOICES_BUCKET, &name, serde_json::to_vec(&invoice)?)
        .await?;
    log::info!("printed {} for {}", name, invoice.customer);
    Ok(invoice)
}

async fn attack(State(state): State<MeshState>, Path(raw): Path<String>) -> Response {
    let (n, base) = match common::lookup_attack(ATTACKS, &raw) {
        Ok(found) => found,
        Err(e) => return e.into_response(),
    };

    let outcome = match n {
        1 => read_payments_file(&state, base.clone()).await,
        _ => return Error::UnknownAttack(n).into_response(),
    };
    common::finish(&state, base, outcome).into_response()
}

/// Ten points for finding the file, ninety more for reading it
async fn read_payments_file(state: &MeshState, base: AttackResult) -> Result<AttackResult> {
    let contents = state
        .store
        .objects
        .get(PAYMENTS_BUCKET, HAPPY_FILE)
        .await?
        .ok_or_else(|| Error::Config(format!("{} missing from {}", HAPPY_FILE, PAYMENTS_BUCKET)))?;

    let mut result = base.succeed(10);
    if let Ok(text) = String::from_utf8(contents) {
        result.points += 90;
        result = result.with_loot(HAPPY_FILE, text);
    }
    Ok(result)
}
