use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, HeaderName, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{AppendHeaders, Html, IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What the server saw for a request to `/echo`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Lowercased header names; repeated headers are joined with ", ".
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Number of requests served, excluding `/hits` itself.
pub type Hits = Arc<AtomicU64>;

pub const HTML_PAGE: &str = "<html><body><h1>hello</h1></body></html>";

pub fn app() -> Router {
    app_with_hits(Hits::default())
}

pub fn app_with_hits(hits: Hits) -> Router {
    Router::new()
        .route("/json", get(json_ok))
        .route("/html", get(html_page))
        .route("/garbage", get(garbage))
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/slow/{ms}", get(slow))
        .route("/cookies", get(read_cookies))
        .route("/cookies/set", get(set_session_cookies))
        .route("/cookies/set-persistent", get(set_persistent_cookies))
        .route("/login", any(login))
        .route("/moved/{code}", any(moved))
        .route("/loop", get(redirect_loop))
        .layer(middleware::from_fn_with_state(hits.clone(), count_hits))
        .route("/hits", get(read_hits))
        .with_state(hits)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_hits(listener, Hits::default()).await
}

pub async fn run_with_hits(listener: TcpListener, hits: Hits) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_hits(hits)).await
}

async fn count_hits(State(hits): State<Hits>, request: Request, next: Next) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    tracing::debug!(method = %request.method(), uri = %request.uri(), "request");
    next.run(request).await
}

async fn read_hits(State(hits): State<Hits>) -> Json<u64> {
    Json(hits.load(Ordering::SeqCst))
}

async fn json_ok() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn html_page() -> Html<&'static str> {
    Html(HTML_PAGE)
}

async fn garbage() -> &'static str {
    "not json {"
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Echo> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in &headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        seen.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body,
    })
}

async fn status(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {}", status.as_u16()))
}

async fn slow(Path(ms): Path<u64>) -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(serde_json::json!({ "slept_ms": ms }))
}

async fn read_cookies(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    let mut cookies = BTreeMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                cookies.insert(name.to_string(), value.to_string());
            }
        }
    }
    Json(cookies)
}

async fn set_session_cookies(Query(params): Query<BTreeMap<String, String>>) -> impl IntoResponse {
    set_cookies(params, "")
}

async fn set_persistent_cookies(Query(params): Query<BTreeMap<String, String>>) -> impl IntoResponse {
    set_cookies(params, "; Max-Age=3600")
}

/// Starts a session on the redirect hop itself, then sends the client on.
async fn login() -> impl IntoResponse {
    (
        StatusCode::FOUND,
        [
            (header::SET_COOKIE, "sid=abc; Path=/"),
            (header::LOCATION, "/json"),
        ],
    )
}

/// Redirect to `/echo` with the requested 3xx status.
async fn moved(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) if status.is_redirection() => {
            (status, [(header::LOCATION, "/echo")]).into_response()
        }
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn redirect_loop() -> impl IntoResponse {
    (StatusCode::FOUND, [(header::LOCATION, "/loop")])
}

fn set_cookies(
    params: BTreeMap<String, String>,
    attributes: &str,
) -> (AppendHeaders<Vec<(HeaderName, String)>>, Json<Vec<String>>) {
    let names = params.keys().cloned().collect();
    let headers = params
        .into_iter()
        .map(|(name, value)| (header::SET_COOKIE, format!("{name}={value}; Path=/{attributes}")))
        .collect();
    (AppendHeaders(headers), Json(names))
}
