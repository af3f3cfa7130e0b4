//! End-to-end tests against a fake `fail2ban-client` shell script.
//!
//! The real `ProcessRunner` spawns the script, so argument passing, exit
//! codes, output parsing and deadline kills are all exercised.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use fail2rest::{build_router, AppState, Config};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "integration-secret-0123456789abcdef";
const API_KEY: &str = "integration-key";

const FAKE_CLIENT: &str = r#"#!/bin/sh
DIR="__DIR__"
echo "$*" >> "$DIR/calls.log"
case "$1" in
  ping)
    echo "Server replied: pong"
    ;;
  status)
    case "$2" in
      "")
        printf 'Status\n|- Number of jail:\t2\n`- Jail list:\tsshd, recidive\n'
        ;;
      sshd)
        printf 'Status for the jail: sshd\n|- Filter\n|  |- Currently failed:\t0\n|  `- Total failed:\t4\n`- Actions\n   |- Currently banned:\t1\n   |- Total banned:\t3\n   `- Banned IP list:\t192.0.2.44\n'
        ;;
      hang)
        echo $$ > "$DIR/hang.pid"
        exec sleep 30
        ;;
      *)
        echo "Sorry but the jail '$2' does not exist" >&2
        exit 255
        ;;
    esac
    ;;
  get)
    printf '192.0.2.44\n'
    ;;
  set)
    echo 1
    ;;
  stop)
    echo "ERROR Permission denied to socket: /var/run/fail2ban/fail2ban.sock" >&2
    exit 255
    ;;
  *)
    echo "Jail $2 $1 ok"
    ;;
esac
"#;

/// One script shared by every test so it is written before any spawn
static FIXTURE: Lazy<Fixture> = Lazy::new(Fixture::create);

struct Fixture {
    dir: TempDir,
    script: PathBuf,
}

impl Fixture {
    fn create() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail2ban-client");
        let body = FAKE_CLIENT.replace("__DIR__", &dir.path().display().to_string());
        std::fs::write(&script, body).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir, script }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn config(timeout_secs: u64) -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.auth.api_keys = vec![API_KEY.to_string()];
    config.fail2ban.client_path = FIXTURE.script.clone();
    config.server.request_timeout_secs = timeout_secs;
    config.validate().unwrap();
    config
}

fn app(config: &Config) -> Router {
    build_router(AppState::from_config(config).unwrap())
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn login(app: &Router) -> String {
    let (status, body) = call(app, "POST", "/api/v1/auth/login", None, Some(json!({ "api_key": API_KEY }))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["token"].as_str().unwrap().to_string()
}

fn process_exists(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

#[tokio::test]
async fn health_reports_reachable_tool() {
    let app = app(&config(10));
    let (status, body) = call(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
}

#[tokio::test]
async fn login_then_read_status_and_jails() {
    let app = app(&config(10));
    let token = login(&app).await;

    let (status, body) = call(&app, "GET", "/api/v1/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"]["jails"], json!(["sshd", "recidive"]));

    let (_, body) = call(&app, "GET", "/api/v1/jails", Some(&token), None).await;
    assert_eq!(body["data"][1]["name"], "recidive");

    let (_, body) = call(&app, "GET", "/api/v1/jails/sshd", Some(&token), None).await;
    assert_eq!(body["data"]["status"]["Total failed"], "4");
    assert_eq!(body["data"]["banned_ips"], json!(["192.0.2.44"]));

    let (_, body) = call(&app, "GET", "/api/v1/jails/sshd/banned", Some(&token), None).await;
    assert_eq!(body["data"]["banned_ips"], json!(["192.0.2.44"]));
}

#[tokio::test]
async fn stats_skip_missing_jail() {
    let app = app(&config(10));
    let token = login(&app).await;

    // recidive is listed but the script says it does not exist
    let (status, body) = call(&app, "GET", "/api/v1/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["jail_count"], 2);
    assert_eq!(body["data"]["total_banned_ips"], 1);
    assert!(body["data"]["jail_details"]["sshd"].is_object());
    assert!(body["data"]["jail_details"].get("recidive").is_none());

    let (status, _) = call(&app, "GET", "/api/v1/jails/recidive/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ban_passes_argument_vector() {
    let app = app(&config(10));
    let token = login(&app).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/jails/sshd/ban",
        Some(&token),
        Some(json!({ "ip": "2001:db8::dead:beef" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/jails/sshd/unban",
        Some(&token),
        Some(json!({ "ip": "$(touch /tmp/pwned)" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let calls = std::fs::read_to_string(FIXTURE.path("calls.log")).unwrap();
    assert!(calls.lines().any(|l| l == "set sshd banip 2001:db8::dead:beef"));
    assert!(!calls.contains("pwned"));
}

#[tokio::test]
async fn permission_failure_has_hint() {
    let app = app(&config(10));
    let token = login(&app).await;

    let (status, body) = call(&app, "POST", "/api/v1/jails/sshd/stop", Some(&token), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("use_sudo = true"));

    let (status, body) = call(&app, "POST", "/api/v1/jails/sshd/reload", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Jail reloaded successfully");
}

#[tokio::test]
async fn timed_out_request_kills_child() {
    let app = app(&config(1));
    let token = login(&app).await;

    let started = std::time::Instant::now();
    let (status, body) = call(&app, "GET", "/api/v1/jails/hang/status", Some(&token), None).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["error"], "Request timeout");
    assert!(started.elapsed() < Duration::from_secs(5));

    let pid: u32 = std::fs::read_to_string(FIXTURE.path("hang.pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();

    let mut gone = false;
    for _ in 0..20 {
        if !process_exists(pid) {
            gone = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(gone, "fail2ban-client child {} still running", pid);
}

#[tokio::test]
async fn served_over_tcp_with_client_address() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let app = app(&config(10));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let body = format!(r#"{{"api_key":"{}"}}"#, API_KEY);
    let request = format!(
        "POST /api/v1/auth/login HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).await.unwrap();
    let lower = raw.to_ascii_lowercase();

    assert!(raw.starts_with("HTTP/1.1 200"), "{}", raw);
    assert!(lower.contains("x-ratelimit-remaining: 9"));
    assert!(lower.contains("x-request-id: "));
    assert!(lower.contains("content-security-policy: default-src 'none'"));

    server.abort();
}
