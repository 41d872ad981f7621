//! Tests for HTTP request handlers.

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::model::{DependencyEdge, Service};
    use crate::server::create_router;
    use crate::server::state::AppState;
    use crate::store::MemoryStore;
    use crate::testing::{RecordingController, ScriptedChecker};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct TestApp {
        state: Arc<AppState>,
        controller: Arc<RecordingController>,
    }

    /// cache -> registry, hard and health-gated.
    fn create_test_app() -> TestApp {
        let store = MemoryStore::new()
            .with_service(Service::new("registry", 1))
            .with_service(Service::new("cache", 2))
            .with_edge(
                DependencyEdge::hard("cache", "registry")
                    .health_gated()
                    .with_timing(5, 1),
            )
            .with_profile("dev", None);
        create_app_with_store(store)
    }

    fn create_app_with_store(store: MemoryStore) -> TestApp {
        let checker = ScriptedChecker::new();
        let controller = Arc::new(RecordingController::new(checker.clone()));
        let state = Arc::new(AppState::with_parts(
            Arc::new(Config::default()),
            Arc::new(store),
            controller.clone(),
            checker,
        ));

        TestApp { state, controller }
    }

    fn router(app: &TestApp) -> Router {
        create_router(app.state.clone())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response = router(app).oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let (status, body) = send(&app, get("/api/v1/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let app = create_test_app();

        let (status, body) = send(&app, get("/api/v1/status")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["server"]["port"], 7878);
        assert!(body["data"]["operation"].is_null());
        assert_eq!(body["data"]["profiles"], serde_json::json!(["dev"]));
        assert_eq!(body["data"]["summary"], "0 started, 0 failed, 0 skipped");
    }

    #[tokio::test]
    async fn test_plan_endpoint() {
        let app = create_test_app();

        let (status, body) = send(&app, get("/api/v1/plan")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"]["order"],
            serde_json::json!(["registry", "cache"])
        );
    }

    #[tokio::test]
    async fn test_plan_unknown_profile() {
        let app = create_test_app();

        let (status, body) = send(&app, get("/api/v1/plan?profile=nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["code"], "E003");
    }

    #[tokio::test]
    async fn test_plan_cycle_is_unprocessable() {
        let store = MemoryStore::new()
            .with_service(Service::new("a", 1))
            .with_service(Service::new("b", 2))
            .with_edge(DependencyEdge::hard("a", "b"))
            .with_edge(DependencyEdge::hard("b", "a"));
        let app = create_app_with_store(store);

        let (status, body) = send(&app, get("/api/v1/plan")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "E004");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_all_endpoint() {
        let app = create_test_app();

        let (status, body) = send(&app, post("/api/v1/start")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["message"], "2 started, 0 failed, 0 skipped");
        assert_eq!(app.controller.launches(), vec!["registry", "cache"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_all_without_wait_is_accepted() {
        let app = create_test_app();

        let (status, body) = send(&app, post("/api/v1/start?wait=false")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["data"]["operation"], "start");
        assert!(body["data"]["request_id"].is_string());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_endpoint() {
        let app = create_test_app();
        send(&app, post("/api/v1/start")).await;

        let (status, body) = send(&app, post("/api/v1/stop")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"]["stopped"],
            serde_json::json!(["cache", "registry"])
        );
        assert_eq!(app.controller.terminations(), vec!["cache", "registry"]);
    }

    #[tokio::test]
    async fn test_list_services_endpoint() {
        let app = create_test_app();

        let (status, body) = send(&app, get("/api/v1/services")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["services"][1]["name"], "cache");
        assert_eq!(body["data"]["services"][1]["position"], 2);
        assert_eq!(
            body["data"]["services"][1]["depends_on"],
            serde_json::json!(["registry"])
        );
        assert_eq!(
            body["data"]["services"][0]["required_by"],
            serde_json::json!(["cache"])
        );
    }

    #[tokio::test]
    async fn test_list_services_pagination() {
        let app = create_test_app();

        let (status, body) = send(&app, get("/api/v1/services?limit=1&offset=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["services"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["services"][0]["name"], "cache");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_service_endpoint() {
        let app = create_test_app();

        let (status, body) = send(&app, post("/api/v1/services/registry/start")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], true);
        assert_eq!(body["data"]["current_state"]["state"], "started");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_service_dependency_timeout() {
        let app = create_test_app();

        // registry was never launched, so cache gives up after 5s.
        let (status, body) = send(&app, post("/api/v1/services/cache/start")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], false);
        assert_eq!(body["data"]["current_state"]["state"], "skipped");
        assert!(app.controller.launches().is_empty());
    }

    #[tokio::test]
    async fn test_service_not_found() {
        let app = create_test_app();

        let (status, body) = send(&app, post("/api/v1/services/nonexistent/start")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "E002");
    }

    #[tokio::test]
    async fn test_stop_service_endpoint() {
        let app = create_test_app();

        let (status, body) = send(&app, post("/api/v1/services/cache/stop")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["current_state"]["state"], "stopped");
        assert_eq!(app.controller.terminations(), vec!["cache"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_service_endpoint() {
        let app = create_test_app();

        let (status, body) = send(&app, post("/api/v1/services/registry/restart")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["action"], "restart");
        assert_eq!(body["data"]["success"], true);
        assert_eq!(app.controller.terminations(), vec!["registry"]);
        assert_eq!(app.controller.launches(), vec!["registry"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_endpoint() {
        let app = create_test_app();
        send(&app, post("/api/v1/start")).await;

        let (status, body) = send(&app, get("/api/v1/events?service=cache")).await;
        assert_eq!(status, StatusCode::OK);

        let events = body["data"]["events"].as_array().unwrap();
        assert!(events.iter().all(|e| e["service_id"] == "cache"));
        assert_eq!(events.last().unwrap()["to"]["state"], "started");
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_limit_keeps_most_recent() {
        let app = create_test_app();
        send(&app, post("/api/v1/start")).await;

        let (_, all) = send(&app, get("/api/v1/events")).await;
        let (status, body) = send(&app, get("/api/v1/events?limit=1")).await;
        assert_eq!(status, StatusCode::OK);

        let events = body["data"]["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(body["data"]["total"], all["data"]["total"]);
        assert_eq!(events[0]["to"]["state"], "started");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_counted() {
        let app = create_test_app();
        send(&app, get("/api/v1/health")).await;
        send(&app, post("/api/v1/services/nonexistent/stop")).await;

        let snapshot = app.state.stats.snapshot();
        assert_eq!(snapshot.requests_total, 2);
        assert_eq!(snapshot.requests_success, 1);
        assert_eq!(snapshot.requests_failed, 1);
    }
}
