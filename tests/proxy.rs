//! Integration tests: the service proxy driven against an in-process
//! JSON-RPC server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use serde_json::json;
use tokio::sync::mpsc;

use torrentd_rpc::{
    CallHandlers, DaemonClient, ProxyOptions, RpcError, ServiceProxy, Value, blocking,
};

#[derive(Default)]
struct ServerState {
    /// RPC requests handled, including introspection.
    requests: AtomicUsize,
    /// `system.listMethods` calls specifically.
    introspections: AtomicUsize,
    /// Expected `Authorization` header; `None` disables the check.
    auth: Option<String>,
}

impl ServerState {
    fn with_basic_auth(username: &str, password: &str) -> Self {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{username}:{password}"));
        Self {
            auth: Some(format!("Basic {token}")),
            ..Self::default()
        }
    }
}

async fn rpc_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Json(request): Json<serde_json::Value>,
) -> Response {
    if let Some(expected) = &state.auth {
        let supplied = headers
            .get("authorization")
            .and_then(|value| value.to_str().ok());
        if supplied != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    state.requests.fetch_add(1, Ordering::SeqCst);

    let id = request.get("id").cloned().unwrap_or(json!(null));
    let method = request
        .get("method")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    let params = request.get("params").cloned().unwrap_or(json!([]));

    let outcome: Result<serde_json::Value, serde_json::Value> = match method {
        "system.listMethods" => {
            state.introspections.fetch_add(1, Ordering::SeqCst);
            Ok(json!([
                "core.get_session_state",
                "core.get_torrent_status",
                "daemon.info",
                "echo",
                "slow_echo",
                "fail",
            ]))
        }
        "echo" | "slow_echo" => {
            if method == "slow_echo" {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            Ok(params.get(0).cloned().unwrap_or(json!(null)))
        }
        "fail" => Err(json!({"number": 4, "message": "no such torrent"})),
        "daemon.info" => Ok(json!("2.1.1")),
        "core.get_session_state" => Ok(json!(["ab12cd", "ef56ab"])),
        "core.get_torrent_status" => Ok(json!({
            "name": "linux.iso",
            "state": "Seeding",
            "progress": 100.0,
            "time_added": "2024-03-01T10:30:00",
        })),
        other => Err(json!({"number": 2, "message": format!("unknown method: {other}")})),
    };

    let body = match outcome {
        Ok(result) => json!({"version": "1.1", "id": id, "result": result}),
        Err(error) => json!({"version": "1.1", "id": id, "error": error}),
    };
    Json(body).into_response()
}

async fn start_server(state: Arc<ServerState>) -> SocketAddr {
    let app = Router::new()
        .route("/json", post(rpc_handler))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    addr
}

async fn connect(state: Arc<ServerState>) -> ServiceProxy {
    let addr = start_server(state).await;
    ServiceProxy::connect(ProxyOptions::new(format!("http://{addr}/json")))
        .await
        .expect("connect")
}

#[tokio::test]
async fn introspects_and_calls() {
    let proxy = connect(Arc::default()).await;

    assert!(proxy.has_method("echo"));
    assert!(proxy.has_method("system.listMethods"));
    assert!(proxy.has_method("system.describe"));

    let result = proxy.call("echo", &[Value::from("hello")]).await.unwrap();
    assert_eq!(result, Value::from("hello"));
}

#[tokio::test]
async fn server_fault_surfaces_with_code() {
    let proxy = connect(Arc::default()).await;

    let err = proxy.call("fail", &[]).await.unwrap_err();
    assert!(matches!(err, RpcError::Server(_)));
    assert_eq!(err.fault_code(), Some(4));
    assert!(err.to_string().contains("no such torrent"));
}

#[tokio::test]
async fn unknown_method_short_circuits_without_io() {
    let state = Arc::new(ServerState::default());
    let proxy = connect(Arc::clone(&state)).await;
    let after_connect = state.requests.load(Ordering::SeqCst);

    let err = proxy.call("core.not_a_method", &[]).await.unwrap_err();
    assert!(matches!(err, RpcError::UnknownMethod(_)));
    assert_eq!(state.requests.load(Ordering::SeqCst), after_connect);
}

#[tokio::test]
async fn illegal_method_names_are_rejected() {
    let proxy = connect(Arc::default()).await;

    for name in ["", "_hidden", "core._hidden", "has space"] {
        let err = proxy.call(name, &[]).await.unwrap_err();
        assert!(
            matches!(err, RpcError::IllegalMethodName(_)),
            "{name:?} should be illegal"
        );
    }
}

#[tokio::test]
async fn supplied_method_list_skips_introspection() {
    let state = Arc::new(ServerState::default());
    let addr = start_server(Arc::clone(&state)).await;

    let proxy = ServiceProxy::connect(
        ProxyOptions::new(format!("http://{addr}/json")).methods(["echo"]),
    )
    .await
    .unwrap();

    assert_eq!(state.introspections.load(Ordering::SeqCst), 0);
    let result = proxy.call("echo", &[Value::Int(3)]).await.unwrap();
    assert_eq!(result, Value::Int(3));
}

#[tokio::test]
async fn basic_auth_round_trip() {
    let state = Arc::new(ServerState::with_basic_auth("web", "torrents"));
    let addr = start_server(state).await;
    let url = format!("http://{addr}/json");

    // Wrong password is rejected at the HTTP layer.
    let err = ServiceProxy::connect(
        ProxyOptions::new(url.clone()).credentials("web", "wrong".into()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RpcError::Http { status: 401 }));

    let proxy = ServiceProxy::connect(
        ProxyOptions::new(url).credentials("web", "torrents".into()),
    )
    .await
    .unwrap();
    let result = proxy.call("echo", &[Value::from("in")]).await.unwrap();
    assert_eq!(result, Value::from("in"));
}

#[tokio::test]
async fn out_of_order_completion_routes_by_id() {
    let proxy = connect(Arc::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let slow_tx = tx.clone();
    let slow_id = proxy
        .call_with(
            "slow_echo",
            vec![Value::from("slow")],
            CallHandlers::new().on_success(move |value| {
                slow_tx.send(("slow", value)).unwrap();
            }),
        )
        .unwrap();

    let fast_tx = tx.clone();
    let fast_id = proxy
        .call_with(
            "echo",
            vec![Value::from("fast")],
            CallHandlers::new().on_success(move |value| {
                fast_tx.send(("fast", value)).unwrap();
            }),
        )
        .unwrap();

    assert_ne!(slow_id, fast_id);

    // The later request finishes first; each caller still gets its own value.
    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first, ("fast", Value::from("fast")));
    assert_eq!(second, ("slow", Value::from("slow")));
    assert_eq!(proxy.pending_calls(), 0);
}

#[tokio::test]
async fn exception_and_complete_handlers_run() {
    let proxy = connect(Arc::default()).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let exception_tx = tx.clone();
    let complete_tx = tx.clone();
    proxy
        .call_with(
            "fail",
            vec![],
            CallHandlers::new()
                .on_exception(move |error| {
                    exception_tx.send(format!("caught: {error}")).unwrap();
                    true
                })
                .on_complete(move || complete_tx.send("complete".to_string()).unwrap()),
        )
        .unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert!(first.starts_with("caught: server fault 4"));
    assert_eq!(second, "complete");
}

#[tokio::test]
async fn namespace_prefixes_calls() {
    let proxy = connect(Arc::default()).await;
    let core = proxy.namespace("core");

    assert!(core.has_method("get_session_state"));
    let state = core.call("get_session_state", &[]).await.unwrap();
    assert_eq!(
        state,
        Value::Array(vec![Value::from("ab12cd"), Value::from("ef56ab")])
    );
}

#[tokio::test]
async fn daemon_facade_and_date_upgrade() {
    let state = Arc::new(ServerState::default());
    let addr = start_server(state).await;
    let client = DaemonClient::connect(ProxyOptions::new(format!("http://{addr}/json")))
        .await
        .unwrap();

    assert_eq!(client.daemon_version().await.unwrap(), "2.1.1");
    assert_eq!(
        client.session_state().await.unwrap(),
        vec!["ab12cd".to_string(), "ef56ab".to_string()]
    );

    let status = client
        .torrent_status("ab12cd", &["name", "time_added"])
        .await
        .unwrap();
    let members = status.as_struct().unwrap();
    assert_eq!(members["name"], Value::from("linux.iso"));
    // ISO8601 strings in replies come back as typed datetimes.
    assert!(matches!(members["time_added"], Value::DateTime(_)));
}

#[test]
fn blocking_facade_calls() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let addr = runtime.block_on(start_server(Arc::default()));

    let proxy =
        blocking::ServiceProxy::connect(ProxyOptions::new(format!("http://{addr}/json")))
            .unwrap();
    assert!(proxy.has_method("echo"));

    let result = proxy.call("echo", &[Value::from("hi")]).unwrap();
    assert_eq!(result, Value::from("hi"));
}
