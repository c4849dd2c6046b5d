//! End-to-end tests through the full router, gate included

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::routing::get;
use axum::{middleware, Router};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use warden_config::Settings;
use warden_core::{Error, Result, Secret, TaskDefinition};
use warden_host::containers::{ContainerActionResult, ContainerInfo, LogOptions};
use warden_host::services::{ServiceActionResult, ServiceInfo};
use warden_host::{ContainerRuntime, ServiceAction, ServiceManager};
use warden_security::{SessionTokens, TokenService};
use warden_server::{router, AppState};
use warden_task::{TaskExecutor, TaskResult};

const KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef";

#[derive(Default)]
struct FakeServices {
    actions: Mutex<Vec<(String, ServiceAction)>>,
}

#[async_trait]
impl ServiceManager for FakeServices {
    async fn list(&self) -> Result<Vec<ServiceInfo>> {
        Ok(["nginx", "test-service", "mysql"]
            .iter()
            .map(|name| ServiceInfo {
                name: (*name).to_string(),
                active_state: "active".to_string(),
                ..ServiceInfo::default()
            })
            .collect())
    }

    async fn get(&self, name: &str) -> Result<ServiceInfo> {
        Ok(ServiceInfo {
            name: name.to_string(),
            active_state: "active".to_string(),
            sub_state: "running".to_string(),
            ..ServiceInfo::default()
        })
    }

    async fn act(&self, name: &str, action: ServiceAction) -> Result<ServiceActionResult> {
        self.actions.lock().push((name.to_string(), action));
        Ok(ServiceActionResult {
            name: name.to_string(),
            action: action.to_string(),
            success: true,
            message: "done".to_string(),
        })
    }
}

struct FakeContainers;

#[async_trait]
impl ContainerRuntime for FakeContainers {
    async fn list(&self, _all: bool) -> Result<Vec<ContainerInfo>> {
        Ok(vec![ContainerInfo {
            id: "abc123".to_string(),
            name: "web".to_string(),
            ..ContainerInfo::default()
        }])
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInfo> {
        Err(Error::not_found(id, format!("container '{id}' not found")))
    }

    async fn act(&self, id: &str, action: ServiceAction) -> Result<ContainerActionResult> {
        Ok(ContainerActionResult {
            id: id.to_string(),
            action: action.to_string(),
            success: true,
            message: "ok".to_string(),
        })
    }

    async fn logs(&self, _id: &str, _options: &LogOptions) -> Result<Vec<String>> {
        Ok(vec!["line".to_string()])
    }
}

#[derive(Default)]
struct FakeTasks {
    ran: Mutex<Vec<String>>,
}

#[async_trait]
impl TaskExecutor for FakeTasks {
    async fn run(&self, task: &TaskDefinition) -> Result<TaskResult> {
        self.ran.lock().push(task.name.clone());
        Ok(TaskResult {
            name: task.name.clone(),
            command: task.command.clone(),
            output: "ok".to_string(),
            exit_code: 0,
            success: true,
            error: None,
            started_at: Utc::now(),
            duration_ms: 1,
        })
    }
}

struct Harness {
    app: Router,
    state: AppState,
    services: Arc<FakeServices>,
    tasks: Arc<FakeTasks>,
    dir: TempDir,
}

fn settings(dir: &TempDir) -> Settings {
    let mut settings = Settings::for_tests();
    settings.api_key = Some(Secret::new(KEY));
    settings.jwt_secret = None;
    settings.env_file = dir.path().join(".env");
    settings
}

fn harness_with(configure: impl FnOnce(&mut Settings)) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut settings = settings(&dir);
    configure(&mut settings);

    let services = Arc::new(FakeServices::default());
    let tasks = Arc::new(FakeTasks::default());
    let state = AppState::new(settings)
        .with_service_manager(services.clone())
        .with_container_runtime(Arc::new(FakeContainers))
        .with_task_executor(tasks.clone());

    Harness {
        app: router(state.clone()),
        state,
        services,
        tasks,
        dir,
    }
}

fn harness() -> Harness {
    harness_with(|_| {})
}

fn request(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder().method(method).uri(uri)
}

fn authed(method: Method, uri: &str) -> axum::http::request::Builder {
    request(method, uri).header(header::AUTHORIZATION, format!("Bearer {KEY}"))
}

fn with_json(builder: axum::http::request::Builder, body: &Value) -> Request<Body> {
    builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send_from(app: &Router, mut req: Request<Body>, peer: &str) -> (StatusCode, HeaderMap, Value) {
    let addr: SocketAddr = peer.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    send_from(app, req, "192.0.2.10:40000").await
}

fn empty(builder: axum::http::request::Builder) -> Request<Body> {
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_needs_no_credentials() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(request(Method::GET, "/health"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["setup_mode"], false);
}

#[tokio::test]
async fn test_allowed_service_with_bearer_secret() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(authed(Method::GET, "/api/services/test-service"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "test-service");
}

#[tokio::test]
async fn test_unlisted_service_is_forbidden() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(authed(Method::POST, "/api/services/mysql/restart"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("mysql"));
    assert!(h.services.actions.lock().is_empty());
}

#[tokio::test]
async fn test_service_action_reaches_manager() {
    let h = harness();
    let (status, _, body) =
        send(&h.app, empty(authed(Method::POST, "/api/services/test-service.service/restart"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(
        h.services.actions.lock().as_slice(),
        &[("test-service.service".to_string(), ServiceAction::Restart)]
    );
}

#[tokio::test]
async fn test_unknown_service_action_is_bad_request() {
    let h = harness();
    let (status, _, _) = send(&h.app, empty(authed(Method::POST, "/api/services/test-service/enable"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_service_list_is_filtered() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(authed(Method::GET, "/api/services"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["services"][0]["name"], "test-service");
}

#[tokio::test]
async fn test_missing_credentials() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(request(Method::GET, "/api/services/test-service"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "missing authentication token" }));
}

#[tokio::test]
async fn test_wrong_credentials() {
    let h = harness();
    let req = request(Method::GET, "/api/tasks").header(header::AUTHORIZATION, "Bearer not-the-key");
    let (status, _, body) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "invalid authentication token" }));
}

#[tokio::test]
async fn test_query_token_is_accepted() {
    let h = harness();
    let uri = format!("/api/tasks?token={KEY}");
    let (status, _, _) = send(&h.app, empty(request(Method::GET, &uri))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_sixth_rapid_request_is_limited() {
    let h = harness_with(|s| s.rate_limit_rps = 5);
    for _ in 0..5 {
        let (status, _, _) = send(&h.app, empty(authed(Method::GET, "/api/tasks"))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _, body) = send(&h.app, empty(authed(Method::GET, "/api/tasks"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "rate limit exceeded");

    let (status, _, _) =
        send_from(&h.app, empty(authed(Method::GET, "/api/tasks")), "192.0.2.99:40000").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_precedes_auth() {
    let h = harness_with(|s| s.rate_limit_rps = 1);
    let (status, _, _) = send(&h.app, empty(request(Method::GET, "/api/tasks"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = send(&h.app, empty(request(Method::GET, "/api/tasks"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_cors_wildcard() {
    let h = harness();
    let req = request(Method::GET, "/health").header(header::ORIGIN, "https://dash.example");
    let (_, headers, _) = send(&h.app, empty(req)).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_cors_specific_origins() {
    let h = harness_with(|s| s.allowed_origins = vec!["https://dash.example".to_string()]);

    let req = request(Method::GET, "/health").header(header::ORIGIN, "https://dash.example");
    let (_, headers, _) = send(&h.app, empty(req)).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://dash.example");

    let req = request(Method::GET, "/health").header(header::ORIGIN, "https://evil.example");
    let (_, headers, _) = send(&h.app, empty(req)).await;
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_preflight_skips_auth() {
    let h = harness();
    let req = request(Method::OPTIONS, "/api/services").header(header::ORIGIN, "https://dash.example");
    let (status, headers, body) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
}

#[tokio::test]
async fn test_rejections_carry_cors_headers() {
    let h = harness();
    let req = request(Method::GET, "/api/tasks").header(header::ORIGIN, "https://dash.example");
    let (status, headers, _) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_session_token_flow() {
    let h = harness();
    let (status, _, body) = send(
        &h.app,
        with_json(
            authed(Method::POST, "/api/auth/token"),
            &json!({ "role": "viewer", "ttl_seconds": 600 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "viewer");
    let token = body["token"].as_str().unwrap().to_string();

    let req = request(Method::GET, "/api/tasks").header(header::AUTHORIZATION, format!("Bearer {token}"));
    let (status, _, _) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::OK);

    // a session cannot mint further sessions
    let req = request(Method::POST, "/api/auth/token").header(header::AUTHORIZATION, format!("Bearer {token}"));
    let (status, _, _) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_token_ttl_is_bounded() {
    let h = harness();
    let (status, _, _) = send(
        &h.app,
        with_json(authed(Method::POST, "/api/auth/token"), &json!({ "ttl_seconds": -5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_docker_disabled() {
    let h = harness_with(|s| s.docker_enabled = false);
    let (status, _, body) = send(&h.app, empty(authed(Method::GET, "/api/docker/containers"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("docker"));
}

#[tokio::test]
async fn test_docker_enabled() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(authed(Method::GET, "/api/docker/containers?all=true"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, _, _) = send(&h.app, empty(authed(Method::GET, "/api/docker/containers/nope"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = send(&h.app, empty(authed(Method::GET, "/api/docker/containers/web/logs"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["logs"], json!(["line"]));
}

#[tokio::test]
async fn test_dangerous_task_requires_confirmation() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(authed(Method::POST, "/api/tasks/reboot/run"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("confirm=true"));
    assert!(h.tasks.ran.lock().is_empty());

    let (status, _, body) = send(&h.app, empty(authed(Method::POST, "/api/tasks/reboot/run?confirm=true"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "reboot");
    assert_eq!(h.tasks.ran.lock().as_slice(), &["reboot".to_string()]);
}

#[tokio::test]
async fn test_unknown_task() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(authed(Method::POST, "/api/tasks/rm-rf/run"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "task 'rm-rf' not found");
}

#[tokio::test]
async fn test_task_list() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(authed(Method::GET, "/api/tasks"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["name"] == "reboot" && t["dangerous"] == true));
}

#[tokio::test]
async fn test_path_outside_allow_list() {
    let h = harness();
    let (status, _, body) =
        send(&h.app, empty(authed(Method::GET, "/api/files?path=/tmp/../root/.ssh"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("/root/.ssh"));

    let (status, _, _) = send(&h.app, empty(authed(Method::GET, "/api/files"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_file_content_inside_allow_list() {
    let h = harness_with(|s| s.allowed_paths = vec![]);
    let dir = TempDir::new_in("/tmp").unwrap();
    let file = dir.path().join("note.txt");
    std::fs::write(&file, "hello").unwrap();

    let uri = format!("/api/files/content?path={}", file.display());
    let (status, _, body) = send(&h.app, empty(authed(Method::GET, &uri))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "hello");
}

#[tokio::test]
async fn test_logs_for_unlisted_unit_are_forbidden() {
    let h = harness();
    let (status, _, _) = send(&h.app, empty(authed(Method::GET, "/api/logs/mysql"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, _) = send(&h.app, empty(authed(Method::GET, "/api/logs/query?unit=mysql"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_init_cannot_be_killed() {
    let h = harness();
    let (status, _, _) = send(
        &h.app,
        with_json(authed(Method::POST, "/api/processes/1/kill"), &json!({ "signal": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(&h.app, empty(authed(Method::POST, "/api/processes/abc/kill"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_settings_never_expose_secrets() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(authed(Method::GET, "/api/settings"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_key_configured"], true);
    assert!(!body.to_string().contains(KEY));
}

#[tokio::test]
async fn test_settings_update_swaps_allow_list() {
    let h = harness();
    let (status, _, _) = send(&h.app, empty(authed(Method::GET, "/api/services/nginx"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(
        &h.app,
        with_json(
            authed(Method::PUT, "/api/settings"),
            &json!({ "allowed_services": ["nginx", " "] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["allowed_services"], json!(["nginx"]));

    let (status, _, _) = send(&h.app, empty(authed(Method::GET, "/api/services/nginx"))).await;
    assert_eq!(status, StatusCode::OK);

    let env = std::fs::read_to_string(h.dir.path().join(".env")).unwrap();
    assert!(env.contains("ALLOWED_SERVICES=nginx"));
}

#[tokio::test]
async fn test_rotate_key() {
    let h = harness();
    let (status, _, _) = send(
        &h.app,
        with_json(authed(Method::POST, "/api/settings/api-key"), &json!({ "api_key": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let new_key = "f".repeat(40);
    let (status, _, _) = send(
        &h.app,
        with_json(authed(Method::POST, "/api/settings/api-key"), &json!({ "api_key": new_key })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&h.app, empty(authed(Method::GET, "/api/tasks"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = request(Method::GET, "/api/tasks").header(header::AUTHORIZATION, format!("Bearer {new_key}"));
    let (status, _, _) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rotation_rekeys_session_tokens() {
    let h = harness();
    let new_key = "e".repeat(48);
    let (status, _, _) = send(
        &h.app,
        with_json(authed(Method::POST, "/api/settings/api-key"), &json!({ "api_key": new_key })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let forged = TokenService::new(KEY.as_bytes())
        .issue("admin", chrono::Duration::days(3650))
        .unwrap();
    let req = request(Method::GET, "/api/tasks").header(header::AUTHORIZATION, format!("Bearer {forged}"));
    let (status, _, body) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "invalid authentication token" }));

    let signed = TokenService::new(new_key.as_bytes())
        .issue("viewer", chrono::Duration::hours(1))
        .unwrap();
    let req = request(Method::GET, "/api/tasks").header(header::AUTHORIZATION, format!("Bearer {signed}"));
    let (status, _, _) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_distinct_signing_secret_survives_rotation() {
    let h = harness_with(|s| s.jwt_secret = Some(Secret::new("separate-signing-secret")));
    let (status, _, _) = send(
        &h.app,
        with_json(
            authed(Method::POST, "/api/settings/api-key"),
            &json!({ "api_key": "d".repeat(48) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let token = TokenService::new(b"separate-signing-secret")
        .issue("viewer", chrono::Duration::hours(1))
        .unwrap();
    let req = request(Method::GET, "/api/tasks").header(header::AUTHORIZATION, format!("Bearer {token}"));
    let (status, _, _) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_settings_updates_both_land() {
    let h = harness();
    let paths = send(
        &h.app,
        with_json(authed(Method::PUT, "/api/settings"), &json!({ "allowed_paths": ["/srv"] })),
    );
    let services = send(
        &h.app,
        with_json(
            authed(Method::PUT, "/api/settings"),
            &json!({ "allowed_services": ["nginx"] }),
        ),
    );
    let ((paths_status, _, _), (services_status, _, _)) = tokio::join!(paths, services);
    assert_eq!(paths_status, StatusCode::OK);
    assert_eq!(services_status, StatusCode::OK);

    let settings = h.state.settings();
    assert_eq!(settings.allowed_paths, vec!["/srv"]);
    assert_eq!(settings.allowed_services, vec!["nginx"]);

    let env = std::fs::read_to_string(h.dir.path().join(".env")).unwrap();
    assert!(env.contains("ALLOWED_PATHS=/srv"));
    assert!(env.contains("ALLOWED_SERVICES=nginx"));
}

async fn explode() -> &'static str {
    panic!("db password is hunter2");
}

#[tokio::test]
async fn test_handler_panic_is_contained() {
    let h = harness();
    let app = Router::new()
        .route("/api/explode", get(explode))
        .layer(middleware::from_fn_with_state(
            h.state.clone(),
            warden_server::middleware::gate,
        ))
        .with_state(h.state.clone());

    let req = authed(Method::GET, "/api/explode").header(header::ORIGIN, "https://dash.example");
    let (status, headers, body) = send(&app, empty(req)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "internal server error" }));
    assert!(!body.to_string().contains("hunter2"));
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(h.state.in_flight.count(), 0);

    // the agent keeps serving afterwards
    let (status, _, _) = send(&app, empty(authed(Method::GET, "/api/explode"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_generate_key() {
    let h = harness();
    let (status, _, body) = send(&h.app, empty(authed(Method::POST, "/api/settings/generate-key"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api_key"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_setup_flow() {
    let h = harness_with(|s| s.api_key = None);
    assert!(!h.state.credentials.is_configured());

    let (status, _, body) = send(&h.app, empty(request(Method::GET, "/setup/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["setup_mode"], true);

    // nothing under /api works yet
    let req = request(Method::GET, "/api/tasks").header(header::AUTHORIZATION, "Bearer anything");
    let (status, _, _) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = send(&h.app, empty(request(Method::POST, "/setup/generate"))).await;
    assert_eq!(status, StatusCode::OK);
    let generated = body["api_key"].as_str().unwrap().to_string();

    let (status, _, _) = send(
        &h.app,
        with_json(request(Method::POST, "/setup/save"), &json!({ "api_key": generated })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let req = request(Method::GET, "/api/tasks").header(header::AUTHORIZATION, format!("Bearer {generated}"));
    let (status, _, _) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::OK);

    // sessions minted after setup verify
    let req = request(Method::POST, "/api/auth/token").header(header::AUTHORIZATION, format!("Bearer {generated}"));
    let (status, _, body) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    let req = request(Method::GET, "/api/tasks").header(header::AUTHORIZATION, format!("Bearer {token}"));
    let (status, _, _) = send(&h.app, empty(req)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &h.app,
        with_json(request(Method::POST, "/setup/save"), &json!({ "api_key": "x".repeat(40) })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _, _) = send(&h.app, empty(request(Method::POST, "/setup/generate"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let env = std::fs::read_to_string(h.dir.path().join(".env")).unwrap();
    assert!(env.contains(&format!("API_KEY={generated}")));
}

#[tokio::test]
async fn test_setup_save_requires_key() {
    let h = harness_with(|s| s.api_key = None);
    let (status, _, body) =
        send(&h.app, with_json(request(Method::POST, "/setup/save"), &json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("api_key"));
}

#[tokio::test]
async fn test_in_flight_returns_to_zero() {
    let h = harness();
    send(&h.app, empty(request(Method::GET, "/health"))).await;
    assert_eq!(h.state.in_flight.count(), 0);
}
