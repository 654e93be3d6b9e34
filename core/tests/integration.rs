//! End-to-end behaviour over real HTTP.
//!
//! # Design
//! Starts the mock server on a random port, then drives a `RequestClient`
//! on the default ureq transport against it. Covers what the stub-based
//! tests cannot: wire encoding of each option group, cookie round-trips and
//! the `http-errors` switch.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use mock_server::{Echo, Hits, HTML_PAGE};
use reqkit::options::HTTP_ERRORS;
use reqkit::{ClientConfig, Outcome, RawResult, RequestClient, RequestParams, TransportError};
use serde_json::{json, Value};

/// Spawn the mock server on its own runtime thread.
fn start_server() -> (SocketAddr, Hits) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();
    let hits = Hits::default();
    let server_hits = hits.clone();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with_hits(listener, server_hits).await
        })
        .unwrap();
    });

    (addr, hits)
}

fn client(cookie_dir: &std::path::Path) -> RequestClient {
    RequestClient::with_config(ClientConfig::new(true, true).with_cookie_dir(cookie_dir)).unwrap()
}

fn params(value: Value) -> RequestParams {
    match value {
        Value::Object(map) => map,
        other => panic!("params must be an object, got {other}"),
    }
}

fn none() -> RequestParams {
    RequestParams::new()
}

fn echo(outcome: Outcome<Value>) -> Echo {
    serde_json::from_value(outcome.into_option().expect("echo should decode")).unwrap()
}

#[test]
fn json_and_html_round_trip() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    let base = format!("http://{addr}");

    let decoded = c.make_request("GET", &format!("{base}/json"), &none(), true).unwrap();
    assert_eq!(decoded, Outcome::Value(json!({"ok": true})));

    let page = c.make_html_request("GET", &format!("{base}/html"), &none(), true, false);
    assert_eq!(
        page,
        Outcome::Value(RawResult::Page {
            code: 200,
            html: HTML_PAGE.to_string()
        })
    );

    let garbage = c.make_request("GET", &format!("{base}/garbage"), &none(), true).unwrap();
    assert!(garbage.is_failed());
}

#[test]
fn invalid_method_never_reaches_the_server() {
    let (addr, hits) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    let target = format!("http://{addr}/json");

    assert!(c.make_request("PATCH", &target, &none(), true).unwrap().is_failed());
    assert!(c.make_html_request("get", &target, &none(), true, true).is_failed());
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let _ = c.make_request("GET", &target, &none(), true).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn headers_query_and_encoded_body_reach_the_server() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    c.add_headers([("X-Api-Key", "secret"), ("Content-Type", "application/json")]);

    let outcome = c
        .make_request(
            "POST",
            &format!("http://{addr}/echo"),
            &params(json!({"query": {"page": 2, "q": "a b"}, "body": {"name": "ann"}})),
            true,
        )
        .unwrap();
    let seen = echo(outcome);

    assert_eq!(seen.method, "POST");
    assert_eq!(seen.query.as_deref(), Some("page=2&q=a+b"));
    assert_eq!(seen.headers.get("x-api-key").map(String::as_str), Some("secret"));
    assert_eq!(seen.headers.get("content-type").map(String::as_str), Some("application/json"));
    assert_eq!(seen.body, r#"{"name":"ann"}"#);
}

#[test]
fn form_fields_are_url_encoded() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());

    let outcome = c
        .make_request(
            "PUT",
            &format!("http://{addr}/echo"),
            &params(json!({"form-fields": {"user": "ann", "tags": ["x", "y"]}})),
            true,
        )
        .unwrap();
    let seen = echo(outcome);

    assert_eq!(seen.method, "PUT");
    assert_eq!(seen.body, "user=ann&tags%5B0%5D=x&tags%5B1%5D=y");
    assert!(seen.headers["content-type"].starts_with("application/x-www-form-urlencoded"));
}

#[test]
fn hidden_headers_are_not_sent() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    let target = format!("http://{addr}/echo");
    c.add_headers([("X-Trace", "on")]);

    let seen = echo(c.make_request("GET", &target, &none(), true).unwrap());
    assert!(seen.headers.contains_key("x-trace"));

    c.hide_headers();
    let seen = echo(c.make_request("GET", &target, &none(), true).unwrap());
    assert!(!seen.headers.contains_key("x-trace"));
    let seen = echo(c.make_request("DELETE", &target, &none(), true).unwrap());
    assert!(!seen.headers.contains_key("x-trace"));
}

#[test]
fn session_cookies_persist_across_requests_until_reset() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    let base = format!("http://{addr}");

    let _ = c.make_request("GET", &format!("{base}/cookies/set?sid=abc"), &none(), true).unwrap();
    let _ = c
        .make_request("GET", &format!("{base}/cookies/set-persistent?remember=yes"), &none(), true)
        .unwrap();

    let cookies: BTreeMap<String, String> = serde_json::from_value(
        c.make_request("GET", &format!("{base}/cookies"), &none(), true)
            .unwrap()
            .into_option()
            .unwrap(),
    )
    .unwrap();
    assert_eq!(cookies.get("sid").map(String::as_str), Some("abc"));
    assert_eq!(cookies.get("remember").map(String::as_str), Some("yes"));

    c.set_cookies().unwrap();
    let cookies: BTreeMap<String, String> = serde_json::from_value(
        c.make_request("GET", &format!("{base}/cookies"), &none(), true)
            .unwrap()
            .into_option()
            .unwrap(),
    )
    .unwrap();
    assert!(!cookies.contains_key("sid"));
    assert_eq!(cookies.get("remember").map(String::as_str), Some("yes"));
}

#[test]
fn cookies_set_on_a_redirect_hop_are_kept() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    let base = format!("http://{addr}");

    let landed = c.make_request("GET", &format!("{base}/login"), &none(), true).unwrap();
    assert_eq!(landed, Outcome::Value(json!({"ok": true})));

    let cookies = c.make_request("GET", &format!("{base}/cookies"), &none(), true).unwrap();
    assert_eq!(cookies, Outcome::Value(json!({"sid": "abc"})));
}

#[test]
fn redirects_keep_or_drop_the_body_by_status() {
    let (addr, hits) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    let body = params(json!({"body": "payload"}));

    let seen = echo(c.make_request("POST", &format!("http://{addr}/moved/307"), &body, true).unwrap());
    assert_eq!((seen.method.as_str(), seen.body.as_str()), ("POST", "payload"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    let seen = echo(c.make_request("POST", &format!("http://{addr}/moved/303"), &body, true).unwrap());
    assert_eq!((seen.method.as_str(), seen.body.as_str()), ("GET", ""));
}

#[test]
fn redirect_loops_are_cut_off() {
    let (addr, hits) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());

    let target = format!("http://{addr}/loop");
    assert!(c.make_request("GET", &target, &none(), true).is_err());
    assert!(c.make_html_request("GET", &target, &none(), true, false).is_failed());
    assert_eq!(hits.load(Ordering::SeqCst), 12);
}

#[test]
fn query_option_replaces_the_target_query() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());

    let target = format!("http://{addr}/echo?lang=en");
    let query = params(json!({"query": {"page": 2}}));
    let seen = echo(c.make_request("GET", &target, &query, true).unwrap());
    assert_eq!(seen.query.as_deref(), Some("page=2"));
}

#[test]
fn cookie_file_is_removed_with_the_client() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    let path = c.cookie_path().unwrap().to_path_buf();

    let _ = c
        .make_request("GET", &format!("http://{addr}/cookies/set-persistent?a=1"), &none(), true)
        .unwrap();
    assert!(std::fs::metadata(&path).unwrap().len() > 0);

    drop(c);
    assert!(!path.exists());
}

#[test]
fn error_statuses_follow_each_failure_policy() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    let target = format!("http://{addr}/status/500");

    let err = c.make_request("GET", &target, &none(), true).unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 500, .. }));
    assert!(c.make_html_request("GET", &target, &none(), true, false).is_failed());

    c.set_option(HTTP_ERRORS, false);
    assert_eq!(
        c.make_html_request("GET", &target, &none(), true, false),
        Outcome::Value(RawResult::Page {
            code: 500,
            html: "status 500".to_string()
        })
    );
    assert!(c.make_request("GET", &target, &none(), true).unwrap().is_failed());
}

#[test]
fn unreachable_host_policies() {
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let target = format!("http://{addr}/json");

    c.set_timeout(2, 2);
    assert!(c.make_request("GET", &target, &none(), true).is_err());
    assert!(c.make_html_request("GET", &target, &none(), true, true).is_failed());
}

#[test]
fn total_timeout_is_enforced() {
    let (addr, _) = start_server();
    let dir = tempfile::tempdir().unwrap();
    let mut c = client(dir.path());
    c.set_timeout(1, 1);

    let target = format!("http://{addr}/slow/2500");
    assert!(c.make_request("GET", &target, &none(), true).is_err());
    assert!(c.make_html_request("GET", &target, &none(), true, false).is_failed());
}
