use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use shared::{
    domain::{Resource, Todo, TodoId},
    error::{ApiError, ErrorCode},
    protocol::{
        TodosResponse, UpdateDoneRequest, UpdateOrderRequest, UpdateOrderResponse,
        TODOS_ORDER_ROUTE, TODOS_ROUTE, TODO_ROUTE,
    },
};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

mod app_state;
mod config;
mod hazard;
mod store;

use app_state::AppState;
use config::load_settings;
use store::TodoStore;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings()?;
    let state = AppState::new(TodoStore::seeded(), settings.hazard_policy());
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(
        %addr,
        normal_ms = settings.normal_latency_ms,
        long_ms = settings.long_latency_ms,
        window_ms = settings.hazard_window_ms,
        "server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(TODOS_ROUTE, get(list_todos))
        .route(TODOS_ORDER_ROUTE, put(update_order))
        .route(TODO_ROUTE, put(update_done))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_todos(State(state): State<Arc<AppState>>) -> Json<TodosResponse> {
    tokio::time::sleep(state.hazards.read_latency()).await;
    let snapshot = state.store.lock().await.snapshot();
    Json(snapshot)
}

async fn update_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateOrderRequest>,
) -> ApiResult<UpdateOrderResponse> {
    let ticket = {
        let mut store = state.store.lock().await;
        store.set_order(req.order).map_err(|e| {
            warn!(message = %e.message, "rejected order update");
            (StatusCode::BAD_REQUEST, Json(e))
        })?;
        state.hazards.begin_write(Resource::Order)
    };
    let delay = ticket.delay();
    ticket.hold().await;
    debug!(
        long = delay.is_long(),
        state = ?state.hazards.state_of(Resource::Order),
        "order write answered"
    );

    // A newer write may have landed while this response was held.
    let order = state.store.lock().await.order().clone();
    Ok(Json(UpdateOrderResponse { order }))
}

async fn update_done(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    Json(req): Json<UpdateDoneRequest>,
) -> ApiResult<Todo> {
    let Path(id) = id.map_err(|rejection| {
        warn!(error = %rejection, "rejected todo id");
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                ErrorCode::Validation,
                format!("invalid todo id: {}", rejection.body_text()),
            )),
        )
    })?;
    let id = TodoId(id);
    let (todo, ticket) = {
        let mut store = state.store.lock().await;
        let todo = store.set_done(id, req.done).ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                Json(ApiError::new(
                    ErrorCode::NotFound,
                    format!("todo {id} not found"),
                )),
            )
        })?;
        (todo, state.hazards.begin_write(Resource::Done(id)))
    };

    let delay = ticket.delay();
    ticket.hold().await;
    debug!(
        %id,
        long = delay.is_long(),
        state = ?state.hazards.state_of(Resource::Done(id)),
        "done write answered"
    );
    Ok(Json(todo))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
