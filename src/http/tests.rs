use super::client::HttpClient;
use super::config::HttpConfig;
use crate::common::spawn_test_server;
use http::Method;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn test_config() -> HttpConfig {
    HttpConfig {
        max_connections: 16,
        read_timeout: Duration::from_secs(5),
        write_timeout: Duration::from_secs(5),
        request_timeout: Duration::from_secs(10),
        max_delay: Duration::from_secs(3),
        ..HttpConfig::default()
    }
}

async fn wait_for_active(server: &super::HttpServer, expected: usize) -> bool {
    for _ in 0..50 {
        if server.metrics().active_connections == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_keep_alive_serves_multiple_requests() {
    let server = spawn_test_server(test_config()).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    for path in ["/get", "/ip", "/uuid", "/json"] {
        let response = client.get(path).await.unwrap();
        assert_eq!(response.status, 200, "{path}");
        assert_eq!(response.header("connection"), Some("keep-alive"));
    }
    assert_eq!(server.server.metrics().total_connections, 1);
}

#[tokio::test]
async fn test_connection_close_is_honoured() {
    let server = spawn_test_server(test_config()).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    let response = client
        .request(Method::GET, "/get", &[("Connection", "close")], &[])
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.header("connection"), Some("close"));
    assert!(client.closed_by_server().await.unwrap());
}

#[tokio::test]
async fn test_pipelined_requests_answered_in_order() {
    let server = spawn_test_server(test_config()).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    client
        .send_raw(
            b"GET /delay/0.2 HTTP/1.1\r\nHost: x\r\n\r\n\
              GET /status/201 HTTP/1.1\r\nHost: x\r\n\r\n\
              GET /xml HTTP/1.1\r\nHost: x\r\n\r\n",
        )
        .await
        .unwrap();

    let first = client.read_response(false).await.unwrap();
    assert_eq!(first.status, 200);
    assert!(first.text().contains("\"delay\""));
    let second = client.read_response(false).await.unwrap();
    assert_eq!(second.status, 201);
    let third = client.read_response(false).await.unwrap();
    assert!(third.text().starts_with("<?xml"));
}

#[tokio::test]
async fn test_malformed_request_gets_400_and_close() {
    let server = spawn_test_server(test_config()).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    client.send_raw(b"this is not http\r\n\r\n").await.unwrap();
    let response = client.read_response(false).await.unwrap();
    assert_eq!(response.status, 400);
    assert_eq!(response.content_type(), "application/json");
    assert_eq!(response.json().unwrap()["error"], "malformed request");
    assert!(client.closed_by_server().await.unwrap());

    // The listener keeps serving other clients.
    let mut other = HttpClient::connect(server.addr).await.unwrap();
    assert_eq!(other.get("/get").await.unwrap().status, 200);
}

#[tokio::test]
async fn test_oversized_body_gets_413() {
    let config = HttpConfig {
        max_request_size: 16,
        ..test_config()
    };
    let server = spawn_test_server(config).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    let response = client
        .request(Method::POST, "/post", &[], &[b'x'; 64])
        .await
        .unwrap();
    assert_eq!(response.status, 413);
    assert_eq!(response.json().unwrap()["error"], "payload too large");
}

#[tokio::test]
async fn test_chunked_request_body() {
    let server = spawn_test_server(test_config()).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    client
        .send_raw(
            b"POST /post HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\
              Content-Type: application/json\r\n\r\n\
              7\r\n{\"key\":\r\n8\r\n\"value\"}\r\n0\r\n\r\n",
        )
        .await
        .unwrap();
    let response = client.read_response(false).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.json().unwrap()["json"]["key"], "value");
}

#[tokio::test]
async fn test_informational_status_closes_connection() {
    let server = spawn_test_server(test_config()).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    let response = client.get("/status/102").await.unwrap();
    assert_eq!(response.status, 102);
    assert!(response.header("content-length").is_none());
    assert!(client.closed_by_server().await.unwrap());
}

#[tokio::test]
async fn test_delay_does_not_block_other_requests() {
    let server = spawn_test_server(test_config()).await.unwrap();
    let addr = server.addr;

    let slow = tokio::spawn(async move {
        let mut client = HttpClient::connect(addr).await.unwrap();
        let started = Instant::now();
        let response = client.get("/delay/1").await.unwrap();
        (response.status, started.elapsed())
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let mut fast = HttpClient::connect(addr).await.unwrap();
    let started = Instant::now();
    assert_eq!(fast.get("/get").await.unwrap().status, 200);
    assert!(started.elapsed() < Duration::from_millis(500));

    let (status, elapsed) = slow.await.unwrap();
    assert_eq!(status, 200);
    assert!(elapsed >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_disconnect_during_delay_releases_connection() {
    let server = spawn_test_server(test_config()).await.unwrap();

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /delay/3 HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    assert!(wait_for_active(&server.server, 1).await);

    let started = Instant::now();
    drop(stream);
    assert!(wait_for_active(&server.server, 0).await);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_connection_limit_rejects_excess() {
    let config = HttpConfig {
        max_connections: 1,
        ..test_config()
    };
    let server = spawn_test_server(config).await.unwrap();

    let mut first = HttpClient::connect(server.addr).await.unwrap();
    assert_eq!(first.get("/get").await.unwrap().status, 200);

    let mut second = TcpStream::connect(server.addr).await.unwrap();
    second
        .write_all(b"GET /get HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    let mut buf = [0u8; 64];
    let n = tokio::time::timeout(Duration::from_secs(2), second.read(&mut buf))
        .await
        .unwrap()
        .unwrap_or(0);
    assert_eq!(n, 0);
}

#[tokio::test]
async fn test_head_request_has_no_body() {
    let server = spawn_test_server(test_config()).await.unwrap();
    let mut client = HttpClient::connect(server.addr).await.unwrap();

    let response = client.request(Method::HEAD, "/get", &[], &[]).await.unwrap();
    assert_eq!(response.status, 404);
    // The connection is still in sync for the next request.
    assert_eq!(client.get("/get").await.unwrap().status, 200);
}

#[tokio::test]
async fn test_shutdown_signal_stops_server() {
    let server = spawn_test_server(test_config()).await.unwrap();
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_half_closed_client_still_gets_response() {
    let server = spawn_test_server(test_config()).await.unwrap();

    for path in ["/get", "/uuid", "/status/201"] {
        for _ in 0..20 {
            let mut stream = TcpStream::connect(server.addr).await.unwrap();
            let request =
                format!("GET {path} HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");
            stream.write_all(request.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();

            let mut raw = Vec::new();
            tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw))
                .await
                .unwrap()
                .unwrap();
            let text = String::from_utf8_lossy(&raw);
            let expected = if path == "/status/201" {
                "HTTP/1.1 201 Created\r\n"
            } else {
                "HTTP/1.1 200 OK\r\n"
            };
            assert!(text.starts_with(expected), "{path}: {text:?}");
        }
    }
}

#[tokio::test]
async fn test_half_close_during_delay_abandons_response() {
    let server = spawn_test_server(test_config()).await.unwrap();

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream
        .write_all(b"GET /delay/3 HTTP/1.1\r\nHost: x\r\n\r\n")
        .await
        .unwrap();
    assert!(wait_for_active(&server.server, 1).await);

    let started = Instant::now();
    stream.shutdown().await.unwrap();
    let mut raw = Vec::new();
    let _ = stream.read_to_end(&mut raw).await;
    assert!(raw.is_empty());
    assert!(started.elapsed() < Duration::from_secs(2));
}
