//! Mesh roles as axum services
//!
//! One binary plays any role. Every role serves `/healthz` and the token
//! leak, plus its own business and attack endpoints.

pub mod common;
pub mod intruder;
pub mod model;
pub mod number;
pub mod order;
pub mod payment;
pub mod print;
pub mod website;

pub use intruder::IntruderState;

use crate::chain::ChainResolver;
use crate::client::AuthClient;
use crate::config::{MeshConfig, Peer, Role};
use crate::error::Result;
use crate::identity::{identify_caller, IdTokenSource};
use crate::store::MeshStore;
use crate::topology::Topology;
use axum::extract::{ConnectInfo, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::catch_panic::CatchPanicLayer;

/// Shared by every handler of a role
#[derive(Clone)]
pub struct MeshState {
    pub role: Role,
    pub config: Arc<MeshConfig>,
    pub resolver: ChainResolver,
    pub store: MeshStore,
}

impl MeshState {
    pub fn new(role: Role, config: Arc<MeshConfig>, tokens: Arc<dyn IdTokenSource>) -> Self {
        Self {
            role,
            config,
            resolver: ChainResolver::new(AuthClient::new(tokens)),
            store: MeshStore::in_memory(),
        }
    }

    pub fn client(&self) -> &AuthClient {
        self.resolver.client()
    }

    pub fn peer(&self, peer: Peer) -> Result<&str> {
        self.config.require(peer)
    }
}

/// Build the full router for `role`.
///
/// Fails if a peer the role needs is not configured. The intruder uses
/// `topology` when given, otherwise the standard mesh over configured peers.
pub fn build_router(
    role: Role,
    config: Arc<MeshConfig>,
    tokens: Arc<dyn IdTokenSource>,
    topology: Option<Topology>,
) -> Result<Router> {
    config.check_required(role)?;
    let state = MeshState::new(role, config.clone(), tokens);

    let app = match role {
        Role::Website => website::routes(state.clone()),
        Role::Order => order::routes(state.clone()),
        Role::Payment => payment::routes(state.clone()),
        Role::Number => number::routes(state.clone()),
        Role::Print => print::routes(state.clone()),
        Role::Intruder => {
            let topology = match topology {
                Some(topology) => topology,
                None => Topology::from_config(&config)?,
            };
            log::info!("intruder targets {} services", topology.services().len());
            intruder::routes(IntruderState::new(state.clone(), Arc::new(topology)))
        }
    };

    Ok(app
        .merge(common::routes(state))
        .layer(middleware::from_fn(log_request))
        .layer(CatchPanicLayer::custom(handle_panic)))
}

/// Serve `app` on all interfaces until the process is stopped
pub async fn serve(app: Router, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("could not listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let caller = identify_caller(request.headers(), remote);

    let start = Instant::now();
    let response = next.run(request).await;
    log::info!(
        "{} {} from {} -> {} ({}ms)",
        method,
        path,
        caller,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    log::error!("handler panicked: {}", details);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(common::ErrorBody {
            message: "internal error".to_string(),
        }),
    )
        .into_response()
}
