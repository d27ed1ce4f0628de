use std::time::Duration;

use super::*;
use axum::{body, body::Body, http::Request, response::Response};
use shared::domain::TodoOrder;
use tokio::time::Instant;
use tower::ServiceExt;

use crate::config::Settings;

fn test_app() -> Router {
    let state = AppState::new(TodoStore::seeded(), Settings::default().hazard_policy());
    build_router(Arc::new(state))
}

async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

fn put_order(ids: &[i64]) -> Request<Body> {
    Request::put(TODOS_ORDER_ROUTE)
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "order": ids }).to_string(),
        ))
        .expect("request")
}

fn put_done(id: i64, done: bool) -> Request<Body> {
    Request::put(format!("/todos/{id}"))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "done": done }).to_string()))
        .expect("request")
}

fn reversed() -> Vec<i64> {
    (1..=10).rev().collect()
}

#[tokio::test(start_paused = true)]
async fn healthz_reports_ok() {
    let response = test_app()
        .oneshot(Request::get("/healthz").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(body.as_ref(), b"ok");
}

#[tokio::test(start_paused = true)]
async fn list_todos_returns_seed_after_base_latency() {
    let started = Instant::now();
    let response = test_app()
        .oneshot(Request::get(TODOS_ROUTE).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() >= Duration::from_millis(1000));

    let todos: TodosResponse = json_body(response).await;
    assert_eq!(todos.todos.len(), 10);
    assert_eq!(todos.order, TodoOrder::from((1..=10).collect::<Vec<i64>>()));
}

#[tokio::test(start_paused = true)]
async fn update_done_echoes_the_written_todo() {
    let app = test_app();
    let response = app.clone().oneshot(put_done(3, true)).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let todo: Todo = json_body(response).await;
    assert_eq!(todo.id, TodoId(3));
    assert!(todo.done);

    let response = app
        .oneshot(Request::get(TODOS_ROUTE).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    let todos: TodosResponse = json_body(response).await;
    let done: Vec<TodoId> = todos
        .todos
        .iter()
        .filter(|todo| todo.done)
        .map(|todo| todo.id)
        .collect();
    assert_eq!(done, vec![TodoId(3)]);
}

#[tokio::test(start_paused = true)]
async fn update_done_for_unknown_id_is_not_found_without_delay() {
    let started = Instant::now();
    let response = test_app()
        .oneshot(put_done(999, true))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(started.elapsed() < Duration::from_millis(1000));

    let error: ApiError = json_body(response).await;
    assert_eq!(error.code, ErrorCode::NotFound);
}

#[tokio::test(start_paused = true)]
async fn update_done_with_non_numeric_id_is_a_json_validation_error() {
    let request = Request::put("/todos/three")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "done": true }).to_string()))
        .expect("request");
    let response = test_app().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let error: ApiError = json_body(response).await;
    assert_eq!(error.code, ErrorCode::Validation);
    assert!(error.message.starts_with("invalid todo id"));
}

#[tokio::test(start_paused = true)]
async fn update_order_rejects_non_permutation() {
    let response = test_app()
        .oneshot(put_order(&[1, 2, 2]))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ApiError = json_body(response).await;
    assert_eq!(error.code, ErrorCode::Validation);
}

#[tokio::test(start_paused = true)]
async fn rapid_second_write_is_held_for_the_long_delay() {
    let app = test_app();

    let started = Instant::now();
    let response = app.clone().oneshot(put_done(1, true)).await.expect("first");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() < Duration::from_millis(4000));

    let started = Instant::now();
    let response = app.oneshot(put_done(1, false)).await.expect("second");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() >= Duration::from_millis(4000));
}

#[tokio::test(start_paused = true)]
async fn reads_are_not_delayed_by_a_held_write() {
    let app = test_app();
    app.clone().oneshot(put_order(&reversed())).await.expect("warm up");

    let held = tokio::spawn(app.clone().oneshot(put_order(&reversed())));
    tokio::time::sleep(Duration::from_millis(10)).await;

    let started = Instant::now();
    let response = app
        .oneshot(Request::get(TODOS_ROUTE).body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(started.elapsed() < Duration::from_millis(2000));

    let response = held.await.expect("join").expect("held response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(start_paused = true)]
async fn held_order_write_answers_with_the_newer_order() {
    let app = test_app();
    app.clone().oneshot(put_order(&reversed())).await.expect("warm up");

    let a: Vec<i64> = vec![2, 1, 3, 4, 5, 6, 7, 8, 9, 10];
    let b: Vec<i64> = vec![3, 2, 1, 4, 5, 6, 7, 8, 9, 10];

    let first = tokio::spawn(app.clone().oneshot(put_order(&a)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = tokio::spawn(app.clone().oneshot(put_order(&b)));

    let second = second.await.expect("join").expect("second");
    assert!(!first.is_finished());
    let second: UpdateOrderResponse = json_body(second).await;
    assert_eq!(second.order, TodoOrder::from(b.clone()));

    let first = first.await.expect("join").expect("first");
    let first: UpdateOrderResponse = json_body(first).await;
    assert_eq!(first.order, TodoOrder::from(b));
}
