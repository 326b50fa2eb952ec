// HTTP trigger - any request runs one metafield definition migration
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::{migration::MigrationEngine, schema_client::GraphqlTransport};

pub struct AppState<T> {
    pub engine: Arc<MigrationEngine<T>>,
    /// Rejects overlapping runs for the same tenant pair when present
    pub guard: Option<Arc<RunGuard>>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            guard: self.guard.clone(),
        }
    }
}

impl<T> AppState<T> {
    pub fn new(engine: MigrationEngine<T>) -> Self {
        Self {
            engine: Arc::new(engine),
            guard: None,
        }
    }

    pub fn with_guard(mut self) -> Self {
        self.guard = Some(Arc::new(RunGuard::default()));
        self
    }
}

/// Tracks which (source, target) store pairs have a run in flight
#[derive(Debug, Default)]
pub struct RunGuard {
    in_flight: Mutex<HashSet<(String, String)>>,
}

/// Held for the duration of a run; releases the pair on drop
#[derive(Debug)]
pub struct RunPermit {
    guard: Arc<RunGuard>,
    key: (String, String),
}

impl RunGuard {
    pub fn try_acquire(self: &Arc<Self>, source: &str, target: &str) -> Option<RunPermit> {
        let key = (source.to_string(), target.to_string());
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(key.clone()) {
            return None;
        }
        Some(RunPermit {
            guard: Arc::clone(self),
            key,
        })
    }

    pub fn is_running(&self, source: &str, target: &str) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.contains(&(source.to_string(), target.to_string()))
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        let mut in_flight = self.guard.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.key);
    }
}

/// Every method and path lands on the migration trigger
pub fn create_app<T: GraphqlTransport + 'static>(state: AppState<T>) -> Router {
    Router::new()
        .fallback(trigger_migration::<T>)
        .with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    info!("Server listening on {}", addr);
    info!("- Any request to http://{}/ triggers a metafield definition migration", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn trigger_migration<T: GraphqlTransport + 'static>(
    State(state): State<AppState<T>>,
) -> Response {
    let engine = &state.engine;
    let source = &engine.source().store_name;
    let target = &engine.target().store_name;

    let _permit = match &state.guard {
        Some(guard) => match guard.try_acquire(source, target) {
            Some(permit) => Some(permit),
            None => {
                warn!("Rejected trigger: {} -> {} is already migrating", source, target);
                return (
                    StatusCode::CONFLICT,
                    Json(json!({
                        "error": format!("a migration from {} to {} is already running", source, target)
                    })),
                )
                    .into_response();
            }
        },
        None => None,
    };

    info!("Received migration trigger");
    match engine.migrate_attribute_definitions().await {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(e) => {
            error!("Migration failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
