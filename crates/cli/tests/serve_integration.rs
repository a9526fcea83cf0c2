//! Integration tests for the `provisioner serve` HTTP API.
//!
//! Each test starts the server as a child process in dry-run mode on a
//! unique port, makes HTTP requests, and verifies the responses.

use std::io::Read;
use std::net::TcpStream;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

const ORIGIN: &str = "https://app.example.com";

/// Atomic port counter to avoid port conflicts between parallel tests.
/// Base port is derived from process ID so separate test binaries don't
/// collide on the same port range.
static NEXT_PORT: AtomicU16 = AtomicU16::new(0);
static PORT_INIT: std::sync::Once = std::sync::Once::new();

fn next_port() -> u16 {
    PORT_INIT.call_once(|| {
        let base = 20000 + (std::process::id() as u16 % 20000);
        NEXT_PORT.store(base, Ordering::SeqCst);
    });
    NEXT_PORT.fetch_add(1, Ordering::SeqCst)
}

/// Helper: start `provisioner serve --dry-run` on the given port.
fn start_server(port: u16, extra_env: &[(&str, &str)]) -> Child {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_provisioner"));
    cmd.arg("serve")
        .arg("--dry-run")
        .arg("--port")
        .arg(port.to_string())
        .arg("--allowed-origin")
        .arg(ORIGIN);
    cmd.env_remove("PROVISIONER_API_KEY_SECRET")
        .env_remove("PROVISIONER_CONFIG");
    for (k, v) in extra_env {
        cmd.env(k, v);
    }
    // Redirect stdout/stderr to avoid blocking
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());

    let child = cmd.spawn().expect("failed to start provisioner serve");
    // Wait for server to be ready by polling the port
    for _ in 0..50 {
        if TcpStream::connect(format!("127.0.0.1:{}", port)).is_ok() {
            return child;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    child
}

/// Helper: send a raw HTTP/1.1 request and return (status, headers, body).
fn http_request(
    port: u16,
    method: &str,
    path: &str,
    extra_headers: &[(&str, &str)],
    body: &str,
) -> (u16, String, String) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{}", port)).expect("failed to connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(10)))
        .unwrap();

    let mut header_lines = String::new();
    for (name, value) in extra_headers {
        header_lines.push_str(&format!("{}: {}\r\n", name, value));
    }
    if !body.is_empty() {
        header_lines.push_str("Content-Type: application/json\r\n");
    }

    let request = format!(
        "{} {} HTTP/1.1\r\nHost: localhost:{}\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        method,
        path,
        port,
        header_lines,
        body.len(),
        body
    );
    std::io::Write::write_all(&mut stream, request.as_bytes()).expect("failed to write");

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);

    parse_http_response_full(&response)
}

fn http_post(port: u16, path: &str, body: &str) -> (u16, String, String) {
    http_request(port, "POST", path, &[], body)
}

/// Extract a header value from raw headers string.
fn extract_header<'a>(headers: &'a str, name: &str) -> Option<&'a str> {
    let name_lower = name.to_lowercase();
    for line in headers.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().to_lowercase() == name_lower {
                return Some(value.trim());
            }
        }
    }
    None
}

fn assert_cors_headers(headers: &str) {
    assert_eq!(
        extract_header(headers, "access-control-allow-origin"),
        Some(ORIGIN)
    );
    assert_eq!(
        extract_header(headers, "access-control-allow-headers"),
        Some("Content-Type")
    );
    assert_eq!(
        extract_header(headers, "access-control-allow-methods"),
        Some("OPTIONS,POST")
    );
}

/// Parse an HTTP response into (status_code, headers_string, body).
fn parse_http_response_full(response: &str) -> (u16, String, String) {
    let parts: Vec<&str> = response.splitn(2, "\r\n\r\n").collect();
    let headers = parts.first().unwrap_or(&"").to_string();
    let body = parts.get(1).unwrap_or(&"").to_string();

    let status_line = headers.lines().next().unwrap_or("");
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);

    // Handle chunked transfer encoding
    let body = if headers.to_lowercase().contains("transfer-encoding: chunked") {
        decode_chunked(&body)
    } else {
        body
    };

    (status, headers, body)
}

/// Decode chunked transfer encoding.
fn decode_chunked(data: &str) -> String {
    let mut result = String::new();
    let mut remaining = data;

    while let Some(line_end) = remaining.find("\r\n") {
        let size = match usize::from_str_radix(remaining[..line_end].trim(), 16) {
            Ok(s) => s,
            Err(_) => break,
        };
        if size == 0 {
            break;
        }
        let chunk_start = line_end + 2;
        let chunk_end = chunk_start + size;
        if chunk_end > remaining.len() {
            result.push_str(&remaining[chunk_start..]);
            break;
        }
        result.push_str(&remaining[chunk_start..chunk_end]);
        remaining = if chunk_end + 2 <= remaining.len() {
            &remaining[chunk_end + 2..]
        } else {
            ""
        };
    }

    result
}

fn stop(mut child: Child) {
    child.kill().ok();
    child.wait().ok();
}

#[test]
fn health_returns_200_with_version() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, _, body) = http_request(port, "GET", "/health", &[], "");
    stop(child);

    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[test]
fn submit_object_store_returns_request_id_and_bucket() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, headers, body) = http_post(port, "/submit", r#"{"services":["object-store"]}"#);
    stop(child);

    assert_eq!(status, 200);
    assert_cors_headers(&headers);
    let json: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
    let request_id = json["requestId"].as_str().expect("requestId");
    assert_eq!(json["s3Bucket"], format!("demo-bucket-{}", request_id));
    assert!(json.get("errors").is_none());
}

#[test]
fn submit_mixed_tags_reports_partial_failure() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, _, body) = http_post(
        port,
        "/submit",
        r#"{"services":["apigateway","quantum-db"],"owner":"team-a"}"#,
    );
    stop(child);

    assert_eq!(status, 200);
    let json: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
    let request_id = json["requestId"].as_str().expect("requestId");
    assert_eq!(json["apiName"], format!("API-{}", request_id));
    assert_eq!(json["errors"]["quantum-db"], "unsupported service tag");
}

#[test]
fn submit_empty_services_returns_400() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, headers, body) = http_post(port, "/submit", r#"{"services":[]}"#);
    stop(child);

    assert_eq!(status, 400);
    assert_cors_headers(&headers);
    let json: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
    assert!(json["error"].as_str().unwrap().contains("services"));
}

#[test]
fn submit_malformed_json_returns_400() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, _, body) = http_post(port, "/submit", "{not json");
    stop(child);

    assert_eq!(status, 400);
    let json: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
    assert!(json["error"].is_string());
}

#[test]
fn preflight_returns_cors_headers() {
    let port = next_port();
    let child = start_server(port, &[]);

    let (status, headers, _) = http_request(
        port,
        "OPTIONS",
        "/submit",
        &[
            ("Origin", ORIGIN),
            ("Access-Control-Request-Method", "POST"),
            ("Access-Control-Request-Headers", "content-type"),
        ],
        "",
    );
    stop(child);

    assert!(status == 200 || status == 204, "status {}", status);
    assert_cors_headers(&headers);
}

#[test]
fn api_key_from_secret_source_is_enforced() {
    let port = next_port();
    let child = start_server(
        port,
        &[
            ("PROVISIONER_API_KEY_SECRET", "it-api-key"),
            ("PROVISIONER_SECRET_IT_API_KEY", "k-integration"),
        ],
    );

    let (missing, _, _) = http_post(port, "/submit", r#"{"services":["s3"]}"#);
    let (wrong, _, _) = http_request(
        port,
        "POST",
        "/submit",
        &[("X-API-Key", "wrong")],
        r#"{"services":["s3"]}"#,
    );
    let (ok, _, _) = http_request(
        port,
        "POST",
        "/submit",
        &[("Authorization", "Bearer k-integration")],
        r#"{"services":["s3"]}"#,
    );
    let (health, _, _) = http_request(port, "GET", "/health", &[], "");
    stop(child);

    assert_eq!(missing, 401);
    assert_eq!(wrong, 403);
    assert_eq!(ok, 200);
    assert_eq!(health, 200);
}

#[test]
fn concurrent_submissions_get_distinct_request_ids() {
    let port = next_port();
    let child = start_server(port, &[]);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            std::thread::spawn(move || {
                let (status, _, body) =
                    http_post(port, "/submit", r#"{"services":["object-store"]}"#);
                assert_eq!(status, 200);
                let json: serde_json::Value = serde_json::from_str(&body).expect("valid JSON");
                json["requestId"].as_str().expect("requestId").to_string()
            })
        })
        .collect();
    let ids: std::collections::HashSet<String> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    stop(child);

    assert_eq!(ids.len(), 8);
}
