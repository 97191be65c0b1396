#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use leaky_mesh::identity::bearer_token;
use leaky_mesh::AttackResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind an ephemeral local port, returning the listener and its base URL
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

pub fn serve_on(listener: TcpListener, app: Router) {
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
}

pub async fn spawn_app(app: Router) -> String {
    let (listener, url) = bind().await;
    serve_on(listener, app);
    url
}

/// A base URL nothing is listening on
pub async fn dead_url() -> String {
    let (listener, url) = bind().await;
    drop(listener);
    url
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeakRequest {
    pub bearer: String,
    pub target: String,
}

/// How a mock mesh service answers
#[derive(Clone)]
pub struct MockBehavior {
    pub leak_status: StatusCode,
    /// Body of `GET /attacks`; `None` answers 500
    pub listing: Option<String>,
    /// Points per local attack; absent attacks answer 500
    pub points: HashMap<u32, u32>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            leak_status: StatusCode::OK,
            listing: Some(String::new()),
            points: HashMap::new(),
        }
    }
}

impl MockBehavior {
    pub fn listing(listing: &str) -> Self {
        Self {
            listing: Some(listing.to_string()),
            ..Default::default()
        }
    }

    pub fn with_points(mut self, local: u32, points: u32) -> Self {
        self.points.insert(local, points);
        self
    }
}

#[derive(Clone)]
struct MockState {
    name: String,
    behavior: MockBehavior,
    leaks: Arc<Mutex<Vec<LeakRequest>>>,
    attack_bearers: Arc<Mutex<Vec<String>>>,
}

/// A stand-in mesh service that records what it is asked
pub struct MockService {
    pub name: String,
    pub url: String,
    leaks: Arc<Mutex<Vec<LeakRequest>>>,
    attack_bearers: Arc<Mutex<Vec<String>>>,
}

impl MockService {
    pub async fn spawn(name: &str, behavior: MockBehavior) -> Self {
        let state = MockState {
            name: name.to_string(),
            behavior,
            leaks: Arc::new(Mutex::new(Vec::new())),
            attack_bearers: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/leaks/id-token", get(mock_leak))
            .route("/attacks", get(mock_listing))
            .route("/attacks/:n", get(mock_attack))
            .with_state(state.clone());

        Self {
            name: name.to_string(),
            url: spawn_app(app).await,
            leaks: state.leaks,
            attack_bearers: state.attack_bearers,
        }
    }

    pub fn leaks(&self) -> Vec<LeakRequest> {
        self.leaks.lock().clone()
    }

    pub fn attack_bearers(&self) -> Vec<String> {
        self.attack_bearers.lock().clone()
    }

    /// Token this mock hands out from its leak endpoint
    pub fn leaked_token(&self) -> String {
        format!("token-from-{}", self.name)
    }
}

async fn mock_leak(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.leaks.lock().push(LeakRequest {
        bearer: bearer_token(&headers).unwrap_or_default().to_string(),
        target: query.get("url").cloned().unwrap_or_default(),
    });

    if state.behavior.leak_status != StatusCode::OK {
        return state.behavior.leak_status.into_response();
    }
    format!("token-from-{}", state.name).into_response()
}

async fn mock_listing(State(state): State<MockState>) -> Response {
    match &state.behavior.listing {
        Some(listing) => listing.clone().into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

async fn mock_attack(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(n): Path<u32>,
) -> Response {
    state
        .attack_bearers
        .lock()
        .push(bearer_token(&headers).unwrap_or_default().to_string());

    match state.behavior.points.get(&n) {
        Some(points) => Json(
            AttackResult::new(format!("{} attack {}", state.name, n)).succeed(*points),
        )
        .into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
