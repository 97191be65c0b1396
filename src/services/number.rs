//! Sequence numbers for orders, payments and invoices

use super::common;
use super::MeshState;
use crate::error::Error;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

const ATTACKS: &[(u32, &str)] = &[
    (1, "number-service updates the order store"),
    (2, "number-service reads from the order store"),
];

/// Per-key counters; the first number handed out for a key is 1
#[derive(Default)]
pub struct NumberRanges {
    counters: Mutex<HashMap<String, u64>>,
}

impl NumberRanges {
    pub fn next(&self, key: &str) -> u64 {
        let mut counters = self.counters.lock();
        let counter = counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}

pub fn routes(state: MeshState) -> Router {
    let ranges = Router::new()
        .route("/ranges/:key", get(next_in_range))
        .with_state(Arc::new(NumberRanges::default()));

    Router::new()
        .route("/attacks", get(|| async { common::listing(ATTACKS) }))
        .route("/attacks/:n", get(attack).post(attack))
        .with_state(state)
        .merge(ranges)
}

async fn next_in_range(State(ranges): State<Arc<NumberRanges>>, Path(key): Path<String>) -> String {
    ranges.next(&key).to_string()
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
