use bytes::{Bytes, BytesMut};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use echobin::common::spawn_test_server;
use echobin::http::{Headers, HttpCodec};
use echobin::{Dispatcher, Entropy, HttpClient, HttpConfig, IncomingRequest};
use http::{Method, Version};
use tokio::runtime::Runtime;
use tokio_util::codec::Decoder;

fn request(method: Method, target: &str, body: Bytes) -> IncomingRequest {
    let mut headers = Headers::new();
    headers.push("Host", "localhost:8080");
    headers.push("User-Agent", "criterion");
    headers.push("Content-Type", "application/json");
    IncomingRequest::new(
        method,
        Version::HTTP_11,
        target,
        headers,
        body,
        "127.0.0.1:40000".parse().unwrap(),
        "127.0.0.1:8080".parse().unwrap(),
    )
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_decode");

    for size in [0usize, 256, 4096, 65536] {
        let mut raw = format!(
            "POST /post?a=1&b=2 HTTP/1.1\r\nHost: localhost\r\nUser-Agent: criterion\r\n\
             Content-Length: {size}\r\n\r\n"
        )
        .into_bytes();
        raw.extend(std::iter::repeat_n(b'x', size));
        group.throughput(Throughput::Bytes(raw.len() as u64));

        group.bench_with_input(BenchmarkId::new("request", size), &raw, |b, raw| {
            b.iter(|| {
                let mut codec = HttpCodec::new(
                    "127.0.0.1:40000".parse().unwrap(),
                    "127.0.0.1:8080".parse().unwrap(),
                    16 * 1024,
                    1024 * 1024,
                );
                let mut buf = BytesMut::from(&raw[..]);
                black_box(codec.decode(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dispatcher = Dispatcher::new(&HttpConfig::default()).with_entropy(Entropy::seeded(1));

    let mut group = c.benchmark_group("dispatch");
    let cases = [
        ("get", request(Method::GET, "/get?x=1&y=2&y=3", Bytes::new())),
        (
            "post_json",
            request(Method::POST, "/post", Bytes::from_static(br#"{"key":"value","n":[1,2,3]}"#)),
        ),
        ("headers", request(Method::GET, "/headers", Bytes::new())),
        ("status", request(Method::GET, "/status/418", Bytes::new())),
        ("uuid", request(Method::GET, "/uuid", Bytes::new())),
        ("base64", request(Method::GET, "/base64/aGVsbG8gd29ybGQ=", Bytes::new())),
        ("html", request(Method::GET, "/html", Bytes::new())),
        ("not_found", request(Method::GET, "/nope", Bytes::new())),
    ];

    for (name, req) in &cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), req, |b, req| {
            b.to_async(&rt)
                .iter(|| async { black_box(dispatcher.dispatch(black_box(req)).await) });
        });
    }

    group.finish();
}

fn bench_round_trip(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (server, client) = rt.block_on(async {
        let server = spawn_test_server(HttpConfig::default()).await.unwrap();
        let client = HttpClient::connect(server.addr).await.unwrap();
        (server, client)
    });
    let client = tokio::sync::Mutex::new(client);

    let mut group = c.benchmark_group("round_trip");
    for path in ["/get", "/json", "/bytes/1024"] {
        group.bench_function(BenchmarkId::from_parameter(path), |b| {
            b.to_async(&rt).iter(|| async {
                let response = client.lock().await.get(path).await.unwrap();
                assert_eq!(response.status, 200);
                response
            });
        });
    }
    group.finish();

    drop(server);
}

criterion_group!(benches, bench_decode, bench_dispatch, bench_round_trip);
criterion_main!(benches);
