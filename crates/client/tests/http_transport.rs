//! End-to-end tests of the reqwest transport against a local mock server.

use std::io::Write;

use batchfetch_client::{Exchange, FetchSession, FileCookieJar, HttpTransport, Transport, decode_body, header_channel};
use batchfetch_core::{Error, FetchResult, RequestEntry, RequestSpec, SessionConfig, Token};
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::tempdir;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn transport(dir: &std::path::Path) -> HttpTransport {
    HttpTransport::new(&SessionConfig::default(), &dir.join("cookies.txt")).unwrap()
}

fn exchange(server: &MockServer, route: &str, body: Option<&str>) -> Exchange {
    let url: url::Url = format!("{}{route}", server.uri()).parse().unwrap();
    Exchange { token: Token::new(1), referer: url.to_string(), url, body: body.map(str::to_string) }
}

#[tokio::test]
async fn test_exchange_sends_baseline_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .and(header("accept-encoding", "gzip"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let (sink, _capture) = header_channel(Token::new(1), false);
    let raw = transport(dir.path())
        .exchange(exchange(&server, "/ok", None), sink)
        .await
        .unwrap();

    assert_eq!(raw.status, 200);
    assert_eq!(&raw.body[..], b"hello");
}

#[tokio::test]
async fn test_exchange_reports_header_lines() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/headers"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Served-By", "edge-7"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let (sink, capture) = header_channel(Token::new(1), true);
    transport(dir.path())
        .exchange(exchange(&server, "/headers", None), sink)
        .await
        .unwrap();

    let headers = capture.finish();
    assert_eq!(headers.get("x-served-by").map(String::as_str), Some("edge-7"));
}

#[tokio::test]
async fn test_exchange_keeps_gzip_body_raw() {
    let server = MockServer::start().await;
    let compressed = gzip(b"compressed page");
    Mock::given(method("GET"))
        .and(path("/gz"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .set_body_bytes(compressed.clone()),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let (sink, _capture) = header_channel(Token::new(1), false);
    let raw = transport(dir.path())
        .exchange(exchange(&server, "/gz", None), sink)
        .await
        .unwrap();

    assert_eq!(&raw.body[..], compressed.as_slice());
    assert_eq!(raw.content_encoding.as_deref(), Some("gzip"));
    assert_eq!(decode_body(&raw.body, raw.content_encoding.as_deref()).unwrap(), b"compressed page");
}

#[tokio::test]
async fn test_exchange_posts_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/form"))
        .and(body_string("name=value"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let (sink, _capture) = header_channel(Token::new(1), false);
    let raw = transport(dir.path())
        .exchange(exchange(&server, "/form", Some("name=value")), sink)
        .await
        .unwrap();

    assert_eq!(raw.status, 201);
}

#[tokio::test]
async fn test_exchange_connection_failure() {
    let dir = tempdir().unwrap();
    let url: url::Url = "http://127.0.0.1:1/".parse().unwrap();
    let exchange = Exchange { token: Token::new(1), referer: url.to_string(), url, body: None };
    let (sink, _capture) = header_channel(Token::new(1), false);

    let failure = transport(dir.path()).exchange(exchange, sink).await.unwrap_err();

    assert!(!failure.message.is_empty());
    assert_eq!(failure.status, None);
}

#[tokio::test]
async fn test_redirects_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/target"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/target"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(&server)
        .await;

    let mut config = SessionConfig::default();
    config.set_max_redirects(0).unwrap();
    let no_redirects = FetchSession::new(config).unwrap();
    let following = FetchSession::new(SessionConfig::default()).unwrap();
    let spec = RequestSpec::new(format!("{}/moved", server.uri()));

    let stopped = no_redirects.fetch(&spec, false).await.unwrap();
    assert_eq!(stopped.status(), Some(302));

    let followed = following.fetch(&spec, false).await.unwrap();
    assert_eq!(followed.status(), Some(200));
    assert_eq!(followed.body(), b"landed");
}

#[tokio::test]
async fn test_cookies_persist_between_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let session = FetchSession::new(SessionConfig::cached(dir.path(), 60)).unwrap();

    session
        .fetch(&RequestSpec::new(format!("{}/login", server.uri())), true)
        .await
        .unwrap();
    let account = session
        .fetch(&RequestSpec::new(format!("{}/account", server.uri())), true)
        .await
        .unwrap();

    assert_eq!(account.status(), Some(200));
    assert_eq!(session.transport().cookies().get("127.0.0.1", "session").as_deref(), Some("abc"));

    let reopened = FileCookieJar::open(dir.path().join("cookies.txt"));
    assert_eq!(reopened.get("127.0.0.1", "session").as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_session_caches_between_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let session = FetchSession::new(SessionConfig::cached(dir.path(), 60)).unwrap();
    let spec = RequestSpec::new(format!("{}/ok", server.uri()));

    let first = session.fetch(&spec, false).await.unwrap();
    let second = session.fetch(&spec, false).await.unwrap();

    assert_eq!(first.status(), Some(200));
    assert_eq!(second, FetchResult::Cached { body: b"hello".to_vec() });
}

#[tokio::test]
async fn test_batch_over_http() {
    let server = MockServer::start().await;
    for (route, status, body) in [("/a", 200, "A"), ("/b", 404, "B"), ("/c", 200, "C")] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let session = FetchSession::new(SessionConfig::default()).unwrap();
    let results = session
        .fetch_all(vec!["a", "b", "c"], &server.uri(), 2)
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results["b"].status(), Some(404));
    assert_eq!(results["b"].error(), Some(""));
    assert_eq!(results["a"].body(), b"A");
    assert_eq!(results["a"].headers().unwrap().get("content-length").map(String::as_str), Some("1"));
}

#[tokio::test]
async fn test_batch_records_connection_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/up"))
        .respond_with(ResponseTemplate::new(200).set_body_string("up"))
        .mount(&server)
        .await;

    let session = FetchSession::new(SessionConfig::default()).unwrap();
    let up = format!("{}/up", server.uri());
    let entries: Vec<RequestEntry> = vec![up.clone().into(), "http://127.0.0.1:1/down".into()];

    let results = session.fetch_all(entries, "", 2).await.unwrap();

    assert_eq!(results[&up].body(), b"up");
    assert!(results["http://127.0.0.1:1/down"].is_failure());
}

#[tokio::test]
async fn test_single_fetch_transport_error() {
    let session = FetchSession::new(SessionConfig::default()).unwrap();
    let result = session.fetch(&RequestSpec::new("http://127.0.0.1:1/"), false).await;
    assert!(matches!(result, Err(Error::Transport(_))));
}

#[tokio::test]
async fn test_binary_body_without_encoding_survives_cache() {
    let server = MockServer::start().await;
    let blob = vec![0x1f, 0x8b, 0x00, 0x01, b'x'];
    for route in ["/blob", "/page"] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(blob.clone()))
            .expect(1)
            .mount(&server)
            .await;
    }

    let dir = tempdir().unwrap();
    let session = FetchSession::new(SessionConfig::cached(dir.path(), 60)).unwrap();

    let first = session.fetch_all(vec!["blob", "page"], &server.uri(), 2).await.unwrap();
    assert_eq!(first["blob"].error(), Some(""));
    assert_eq!(first["blob"].body(), blob.as_slice());

    let second = session.fetch_all(vec!["blob", "page"], &server.uri(), 2).await.unwrap();
    assert_eq!(second["blob"], FetchResult::Cached { body: blob.clone() });

    let single = session
        .fetch(&RequestSpec::new(format!("{}/blob", server.uri())), false)
        .await
        .unwrap();
    assert_eq!(single.body(), blob.as_slice());
}
