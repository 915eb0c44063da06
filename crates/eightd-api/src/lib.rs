//! JSON REST API for the 8D problem solving service.
//!
//! Exposes an axum [`Router`] backed by any implementation of the
//! [`eightd_core::store`] repository traits. Every response is wrapped in the
//! envelope described in [`envelope`]. CORS, tracing and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", eightd_api::api_router(store.clone()))
//! ```

pub mod envelope;
pub mod error;
pub mod health;
pub mod problems;
pub mod root_causes;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use eightd_core::store::{ProblemRepository, RootCauseRepository};

pub use envelope::Envelope;
pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ProblemRepository + RootCauseRepository + 'static,
{
  Router::new()
    .route("/health", get(health::handler::<S>))
    // Problems
    .route("/problems", get(problems::list::<S>).post(problems::create::<S>))
    .route("/problems/statistics", get(problems::statistics::<S>))
    .route(
      "/problems/{id}",
      get(problems::get_one::<S>)
        .put(problems::update::<S>)
        .delete(problems::delete_one::<S>),
    )
    // Root causes
    .route("/problems/{problem_id}/root-causes", get(root_causes::tree::<S>))
    .route(
      "/problems/{problem_id}/root-causes/{id}/mark",
      post(root_causes::mark::<S>),
    )
    .route("/root-causes", post(root_causes::create::<S>))
    .route(
      "/root-causes/{id}",
      get(root_causes::get_one::<S>)
        .put(root_causes::update::<S>)
        .delete(root_causes::delete_one::<S>),
    )
    .method_not_allowed_fallback(endpoint_not_found)
    .fallback(endpoint_not_found)
    .with_state(store)
}

async fn endpoint_not_found() -> ApiError {
  ApiError::NotFound("API endpoint not found".into())
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use eightd_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  async fn app() -> Router {
    let store = SqliteStore::open_in_memory().await.unwrap();
    api_router(Arc::new(store))
  }

  async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };
    let resp = app
      .clone()
      .oneshot(builder.body(body).unwrap())
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
  }

  async fn new_problem(app: &Router) -> i64 {
    let (status, body) = send(
      app,
      "POST",
      "/problems",
      Some(json!({ "title": "A", "description": "B", "responsible_team": "C" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
  }

  async fn new_cause(app: &Router, problem_id: i64, parent_id: Option<i64>) -> i64 {
    let (status, body) = send(
      app,
      "POST",
      "/root-causes",
      Some(json!({
        "problem_id": problem_id,
        "parent_id":  parent_id,
        "cause_text": "why?",
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["id"].as_i64().unwrap()
  }

  // ── Health ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_reports_connected_database() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["database"], "connected");
  }

  #[tokio::test]
  async fn unknown_route_returns_404_envelope() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "API endpoint not found");
  }

  #[tokio::test]
  async fn wrong_method_on_known_path_returns_404_envelope() {
    let app = app().await;
    let (status, body) = send(&app, "PATCH", "/problems", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "API endpoint not found");
  }

  // ── Problems ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_problem_defaults_to_open() {
    let app = app().await;
    let (status, body) = send(
      &app,
      "POST",
      "/problems",
      Some(json!({ "title": "A", "description": "B", "responsible_team": "C" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Problem created successfully");
    assert_eq!(body["data"]["status"], "open");
    assert_eq!(body["data"]["title"], "A");
  }

  #[tokio::test]
  async fn create_problem_with_empty_title_is_422() {
    let app = app().await;
    let (status, body) = send(
      &app,
      "POST",
      "/problems",
      Some(json!({ "title": "", "description": "B", "responsible_team": "C" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"]["title"], "Title is required");
    assert!(body["errors"].get("description").is_none());
  }

  #[tokio::test]
  async fn malformed_json_is_400() {
    let app = app().await;
    let req = Request::builder()
      .method("POST")
      .uri("/problems")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from("{not json"))
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn list_filters_and_counts() {
    let app = app().await;
    let first = new_problem(&app).await;
    new_problem(&app).await;
    let (status, _) = send(
      &app,
      "PUT",
      &format!("/problems/{first}"),
      Some(json!({ "status": "closed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, "GET", "/problems", None).await;
    assert_eq!(body["data"]["count"], 2);

    let (_, body) = send(&app, "GET", "/problems?status=closed&team=C", None).await;
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(body["data"]["problems"][0]["id"], first);

    let (status, body) = send(&app, "GET", "/problems?status=pending", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["status"], eightd_core::problem::INVALID_STATUS);

    let (_, body) = send(&app, "GET", "/problems/statistics", None).await;
    assert_eq!(body["data"], json!({ "total": 2, "open_count": 1, "closed_count": 1 }));
  }

  #[tokio::test]
  async fn problem_crud_not_found_paths() {
    let app = app().await;
    let (status, _) = send(&app, "GET", "/problems/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) =
      send(&app, "PUT", "/problems/9", Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", "/problems/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", "/problems/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn empty_problem_update_is_400() {
    let app = app().await;
    let id = new_problem(&app).await;
    let (status, body) = send(&app, "PUT", &format!("/problems/{id}"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
  }

  // ── Root causes ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn tree_payload_matches_scenario() {
    let app = app().await;
    let p = new_problem(&app).await;
    let n1 = new_cause(&app, p, None).await;
    let n2 = new_cause(&app, p, Some(n1)).await;
    let n3 = new_cause(&app, p, Some(n1)).await;
    let n4 = new_cause(&app, p, Some(n2)).await;

    let (status, body) = send(&app, "GET", &format!("/problems/{p}/root-causes"), None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["problem_id"], p);
    assert_eq!(data["max_depth"], 2);
    assert_eq!(data["total_causes"], 4);
    assert_eq!(data["root_cause"], Value::Null);

    let tree = data["tree"].as_array().unwrap();
    assert_eq!(tree.len(), 1);
    assert_eq!(tree[0]["id"], n1);
    assert_eq!(tree[0]["children"][0]["id"], n2);
    assert_eq!(tree[0]["children"][1]["id"], n3);
    assert_eq!(tree[0]["children"][0]["children"][0]["id"], n4);
    assert_eq!(tree[0]["children"][0]["children"][0]["level"], 2);
    assert_eq!(tree[0]["children"][1]["children"], json!([]));
  }

  #[tokio::test]
  async fn tree_for_missing_problem_is_404() {
    let app = app().await;
    let (status, body) = send(&app, "GET", "/problems/3/root-causes", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Problem not found");
  }

  #[tokio::test]
  async fn create_cause_validation_and_reference_errors() {
    let app = app().await;
    let p1 = new_problem(&app).await;
    let p2 = new_problem(&app).await;
    let foreign = new_cause(&app, p1, None).await;

    let (status, body) = send(
      &app,
      "POST",
      "/root-causes",
      Some(json!({ "problem_id": "abc", "cause_text": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["problem_id"], "Problem ID must be numeric");
    assert_eq!(body["errors"]["cause_text"], "Cause text is required");

    let (status, body) = send(
      &app,
      "POST",
      "/root-causes",
      Some(json!({ "problem_id": p1, "cause_text": "x", "is_root_cause": true })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["action_plan"].is_string());

    let (status, _) = send(
      &app,
      "POST",
      "/root-causes",
      Some(json!({ "problem_id": 999, "cause_text": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
      &app,
      "POST",
      "/root-causes",
      Some(json!({ "problem_id": p1, "parent_id": 999, "cause_text": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
      &app,
      "POST",
      "/root-causes",
      Some(json!({ "problem_id": p2, "parent_id": foreign, "cause_text": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn wrongly_typed_cause_fields_are_422() {
    let app = app().await;
    let p = new_problem(&app).await;

    let (status, body) = send(
      &app,
      "POST",
      "/root-causes",
      Some(json!({ "problem_id": p, "cause_text": "x", "is_root_cause": "yes" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["is_root_cause"], "is_root_cause must be boolean");

    for bad in [json!(true), json!([1]), json!(1.5)] {
      let (status, body) = send(
        &app,
        "POST",
        "/root-causes",
        Some(json!({ "problem_id": bad, "cause_text": "x" })),
      )
      .await;
      assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
      assert_eq!(body["errors"]["problem_id"], "Problem ID must be numeric");
    }
  }

  #[tokio::test]
  async fn zero_ids_are_treated_as_absent() {
    let app = app().await;
    let p = new_problem(&app).await;

    let (status, body) = send(
      &app,
      "POST",
      "/root-causes",
      Some(json!({ "problem_id": 0, "cause_text": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["problem_id"], "Problem ID is required");

    let (status, body) = send(
      &app,
      "POST",
      "/root-causes",
      Some(json!({ "problem_id": p, "parent_id": 0, "cause_text": "x" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["parent_id"], Value::Null);
    assert_eq!(body["data"]["level"], 0);
  }

  #[tokio::test]
  async fn marking_via_update_moves_the_flag() {
    let app = app().await;
    let p = new_problem(&app).await;
    let n1 = new_cause(&app, p, None).await;
    let n2 = new_cause(&app, p, Some(n1)).await;
    let n3 = new_cause(&app, p, Some(n1)).await;

    let (status, _) = send(
      &app,
      "PUT",
      &format!("/root-causes/{n2}"),
      Some(json!({ "is_root_cause": true, "action_plan": "Old plan" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
      &app,
      "PUT",
      &format!("/root-causes/{n3}"),
      Some(json!({ "is_root_cause": true, "action_plan": "Fix it" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_root_cause"], true);
    assert_eq!(body["data"]["action_plan"], "Fix it");

    let (_, body) = send(&app, "GET", &format!("/root-causes/{n2}"), None).await;
    assert_eq!(body["data"]["is_root_cause"], false);
    assert_eq!(body["data"]["action_plan"], Value::Null);

    let (_, body) = send(&app, "GET", &format!("/problems/{p}/root-causes"), None).await;
    assert_eq!(body["data"]["root_cause"]["id"], n3);
  }

  #[tokio::test]
  async fn mark_endpoint_requires_action_plan() {
    let app = app().await;
    let p = new_problem(&app).await;
    let n = new_cause(&app, p, None).await;
    let uri = format!("/problems/{p}/root-causes/{n}/mark");

    let (status, body) = send(&app, "POST", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["action_plan"].is_string());

    let (status, body) =
      send(&app, "POST", &uri, Some(json!({ "action_plan": "Fix it" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_root_cause"], true);
  }

  #[tokio::test]
  async fn empty_cause_update_is_400_and_unchanged() {
    let app = app().await;
    let p = new_problem(&app).await;
    let n = new_cause(&app, p, None).await;

    let (status, _) = send(&app, "PUT", &format!("/root-causes/{n}"), Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", &format!("/root-causes/{n}"), None).await;
    assert_eq!(body["data"]["cause_text"], "why?");
  }

  #[tokio::test]
  async fn deleting_a_cause_removes_its_subtree() {
    let app = app().await;
    let p = new_problem(&app).await;
    let n1 = new_cause(&app, p, None).await;
    let n2 = new_cause(&app, p, Some(n1)).await;
    let n3 = new_cause(&app, p, Some(n2)).await;

    let (status, body) = send(&app, "DELETE", &format!("/root-causes/{n1}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], Value::Null);

    for id in [n1, n2, n3] {
      let (status, _) = send(&app, "GET", &format!("/root-causes/{id}"), None).await;
      assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (status, _) = send(&app, "DELETE", &format!("/root-causes/{n1}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", &format!("/problems/{p}/root-causes"), None).await;
    assert_eq!(body["data"]["total_causes"], 0);
  }

  #[tokio::test]
  async fn deleting_a_problem_removes_its_causes() {
    let app = app().await;
    let p = new_problem(&app).await;
    let n = new_cause(&app, p, None).await;

    let (status, _) = send(&app, "DELETE", &format!("/problems/{p}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/root-causes/{n}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
