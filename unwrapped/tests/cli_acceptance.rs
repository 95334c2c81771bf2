use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn cache_path(&self) -> PathBuf {
        self.xdg_data.join("unwrapped/reports.db")
    }
}

fn run_cli(env: &CliTestEnv, gateway: Option<&str>, args: &[&str]) -> Output {
    let mut command = Command::new(assert_cmd::cargo::cargo_bin!("unwrapped"));

    command
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("UNWRAPPED_CONFIG")
        .env_remove("UNWRAPPED_GATEWAY_URL")
        .env_remove("UNWRAPPED_GATEWAY_TOKEN")
        .env_remove("RUST_LOG");
    if let Some(url) = gateway {
        command.env("UNWRAPPED_GATEWAY_URL", url);
    }

    command
        .output()
        .unwrap_or_else(|e| panic!("failed to execute unwrapped: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "unwrapped {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

// ============================================
// Fake history gateway
// ============================================

#[derive(Clone)]
struct Gateway {
    history: Arc<Vec<Value>>,
    history_calls: Arc<AtomicUsize>,
}

fn post(id: i64, day: u32, views: u64) -> Value {
    let date = Utc
        .with_ymd_and_hms(2025, 1, day, 12, 0, 0)
        .unwrap()
        .timestamp();
    json!({
        "id": id,
        "date": date,
        "views": views,
        "replies": 1,
        "reactions": [{ "reaction": { "type": "emoji", "emoticon": "🔥" }, "count": 2 }]
    })
}

/// Serve a three-post channel on a loopback port from a background thread.
fn spawn_gateway() -> (String, Arc<AtomicUsize>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("failed to bind gateway");
    listener
        .set_nonblocking(true)
        .expect("failed to set nonblocking");
    let addr = listener.local_addr().expect("missing gateway addr");

    let history_calls = Arc::new(AtomicUsize::new(0));
    let gateway = Gateway {
        // Newest first
        history: Arc::new(vec![post(3, 6, 50), post(2, 4, 20), post(1, 3, 10)]),
        history_calls: history_calls.clone(),
    };

    let app = Router::new()
        .route("/v1/session", get(|| async { Json(json!({ "authorized": true })) }))
        .route("/v1/channels/:key", get(resolve))
        .route("/v1/channels/:key/history", get(history))
        .with_state(gateway);

    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("failed to start gateway runtime");
        runtime.block_on(async move {
            let listener =
                tokio::net::TcpListener::from_std(listener).expect("failed to adopt listener");
            axum::serve(listener, app).await.expect("gateway stopped");
        });
    });

    (format!("http://{}", addr), history_calls)
}

async fn resolve(Path(username): Path<String>) -> Response {
    match username.as_str() {
        "rustlang" => Json(json!({
            "id": 1001,
            "access_hash": 5,
            "title": "Rust Language",
            "username": "rustlang",
            "kind": "channel",
            "has_photo": false
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn history(
    State(gateway): State<Gateway>,
    Path(_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    gateway.history_calls.fetch_add(1, Ordering::SeqCst);
    let param = |name: &str| {
        params
            .get(name)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0)
    };
    let (offset_date, offset_id, limit) = (param("offset_date"), param("offset_id"), param("limit"));

    let messages: Vec<Value> = gateway
        .history
        .iter()
        .filter(|m| {
            let date = m["date"].as_i64().unwrap_or(0);
            let id = m["id"].as_i64().unwrap_or(0);
            if offset_id == 0 {
                date < offset_date
            } else {
                (date, id) < (offset_date, offset_id)
            }
        })
        .take(limit as usize)
        .cloned()
        .collect();
    Json(json!({ "messages": messages }))
}

// ============================================
// Tests
// ============================================

#[test]
fn json_report_for_channel() {
    let env = CliTestEnv::new();
    let (gateway, _) = spawn_gateway();

    let args = ["@rustlang", "--json"];
    let output = run_cli(&env, Some(&gateway), &args);
    assert_success(&args, &output);

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["channel_name"], "Rust Language");
    assert_eq!(report["totals"]["total_posts"], 3);
    assert_eq!(report["totals"]["total_views"], 80);
    assert_eq!(report["totals"]["total_reactions"], 6);
    assert_eq!(report["highlights"]["most_viewed"]["id"], 3);
    assert_eq!(report["highlights"]["reactions_by_type"]["🔥"], 6);
    assert_eq!(report["trends"]["longest_posting_streak"], 2);
}

#[test]
fn terminal_report_in_fanout_mode() {
    let env = CliTestEnv::new();
    let (gateway, _) = spawn_gateway();

    let args = ["rustlang", "--mode", "fanout", "--no-cache"];
    let output = run_cli(&env, Some(&gateway), &args);
    assert_success(&args, &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("RUST LANGUAGE UNWRAPPED"), "got:\n{stdout}");
    assert!(stdout.contains("Posts:     3"), "got:\n{stdout}");
    assert!(stdout.contains("2025-January"), "got:\n{stdout}");
    assert!(!env.cache_path().exists(), "--no-cache must not create the cache");
}

#[test]
fn second_run_is_served_from_cache() {
    let env = CliTestEnv::new();
    let (gateway, history_calls) = spawn_gateway();
    let args = ["rustlang", "--json"];

    assert_success(&args, &run_cli(&env, Some(&gateway), &args));
    let calls = history_calls.load(Ordering::SeqCst);
    assert!(calls > 0);
    assert!(env.cache_path().exists());

    assert_success(&args, &run_cli(&env, Some(&gateway), &args));
    assert_eq!(history_calls.load(Ordering::SeqCst), calls);

    let refresh = ["rustlang", "--json", "--refresh"];
    assert_success(&refresh, &run_cli(&env, Some(&gateway), &refresh));
    assert!(history_calls.load(Ordering::SeqCst) > calls);
}

#[test]
fn changing_the_window_skips_the_cached_report() {
    let env = CliTestEnv::new();
    let (gateway, history_calls) = spawn_gateway();

    let args = ["rustlang", "--json"];
    assert_success(&args, &run_cli(&env, Some(&gateway), &args));
    let calls = history_calls.load(Ordering::SeqCst);

    let since = ["rustlang", "--json", "--since", "2025-01-05"];
    let output = run_cli(&env, Some(&gateway), &since);
    assert_success(&since, &output);
    assert!(history_calls.load(Ordering::SeqCst) > calls);

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout should be JSON");
    assert_eq!(report["totals"]["total_posts"], 1);
    assert_eq!(report["window_start"], "2025-01-05T00:00:00Z");
}

#[test]
fn missing_gateway_url_is_a_config_error() {
    let env = CliTestEnv::new();
    let output = run_cli(&env, None, &["rustlang"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("gateway.base_url"), "got:\n{stderr}");
}

#[test]
fn unknown_channel_fails_with_context() {
    let env = CliTestEnv::new();
    let (gateway, _) = spawn_gateway();
    let output = run_cli(&env, Some(&gateway), &["nobody", "--no-cache"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("channel not found: nobody"), "got:\n{stderr}");
}

#[test]
fn invalid_username_is_rejected() {
    let env = CliTestEnv::new();
    let (gateway, history_calls) = spawn_gateway();
    let output = run_cli(&env, Some(&gateway), &["not valid!", "--no-cache"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid channel username"), "got:\n{stderr}");
    assert_eq!(history_calls.load(Ordering::SeqCst), 0);
}
