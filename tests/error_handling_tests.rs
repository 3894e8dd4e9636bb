//! Malformed-request handling against a real listener: these exercise the
//! wire-level paths in [`originhttpd::request::Request::read`] that the
//! unit tests next to it can't reach without a socket.

use std::collections::HashMap;
use std::net::SocketAddr;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use originhttpd::config::{Configuration, LocationConfig};
use originhttpd::listener::Listener;

async fn spawn_server(root: &std::path::Path) -> SocketAddr {
    let mut locations = HashMap::new();
    locations.insert("/".to_string(), LocationConfig { root: root.to_path_buf() });

    let config = Configuration {
        port: 0,
        host: "127.0.0.1".to_string(),
        max_connections: 16,
        timeout_secs: 5,
        default_type: "application/octet-stream".to_string(),
        charset: "utf-8".to_string(),
        gzip: true,
        index: vec!["index.html".to_string()],
        locations,
        error_pages: HashMap::new(),
    };

    let bound = Listener::new(config).bind().await.expect("bind ephemeral port");
    let addr = bound.local_addr().expect("local addr");
    tokio::spawn(bound.serve());
    addr
}

async fn send(addr: SocketAddr, raw: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(raw).await.expect("write");
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read");
    String::from_utf8_lossy(&response).into_owned()
}

#[tokio::test]
async fn garbage_start_line_is_400() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_server(dir.path()).await;

    let response = send(addr, b"not a request\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400"));
}

#[tokio::test]
async fn lowercase_method_is_rejected() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_server(dir.path()).await;

    let response = send(addr, b"get / HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400"));
}

#[tokio::test]
async fn path_traversal_is_rejected() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_server(dir.path()).await;

    let response = send(addr, b"GET /../secret HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.contains("Path traversal"));
}

#[tokio::test]
async fn invalid_content_length_is_400() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_server(dir.path()).await;

    let request = b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: not-a-number\r\nConnection: close\r\n\r\n";
    let response = send(addr, request).await;
    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.contains("Invalid Content-Length"));
}

#[tokio::test]
async fn oversized_head_is_413() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_server(dir.path()).await;

    let mut request = String::from("GET / HTTP/1.1\r\nHost: localhost\r\n");
    request.push_str(&format!("X-Padding: {}\r\n", "a".repeat(70 * 1024)));
    request.push_str("\r\n");

    let response = send(addr, request.as_bytes()).await;
    assert!(response.starts_with("HTTP/1.1 413"));
}

#[tokio::test]
async fn empty_connection_closes_without_response() {
    let dir = TempDir::new().unwrap();
    let addr = spawn_server(dir.path()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    drop(stream.shutdown().await);

    let mut response = Vec::new();
    let _ = stream.read_to_end(&mut response).await;
    assert!(response.is_empty());
}
