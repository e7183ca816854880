use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use log::{error, info};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;

use crate::config::{ServerConfig, SolverConfig};
use crate::data::{SchedulingInput, SchedulingOutput};
use crate::error::SchedulingError;
use crate::orchestrator;

pub fn status_for(err: &SchedulingError) -> StatusCode {
    match err {
        SchedulingError::Configuration(_) => StatusCode::BAD_REQUEST,
        SchedulingError::Infeasible { .. } | SchedulingError::SolveTimeout { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SchedulingError::Solver { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn solve_handler(
    State(config): State<Arc<SolverConfig>>,
    Json(input): Json<SchedulingInput>,
) -> Result<Json<SchedulingOutput>, (StatusCode, String)> {
    info!(
        "Received request: {} workers over {} days",
        input.workers.len(),
        input.calendar.num_days
    );
    let config = SolverConfig::clone(&config);
    // the solve blocks for up to two time budgets
    let result = tokio::task::spawn_blocking(move || orchestrator::solve(&input, config))
        .await
        .map_err(|e| {
            error!("solver task panicked: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "solver task failed".to_string(),
            )
        })?;
    match result {
        Ok(output) => Ok(Json(output)),
        Err(e) => Err((status_for(&e), e.to_string())),
    }
}

/// One solve at a time: HiGHS already uses the configured threads.
pub fn router(config: SolverConfig) -> Router {
    Router::new()
        .route("/v1/schedule/solve", post(solve_handler))
        .layer(ConcurrencyLimitLayer::new(1))
        .with_state(Arc::new(config))
}

pub async fn run_server(server: ServerConfig, solver: SolverConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&server.bind).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router(solver)).await
}
