//! Crate-level integration tests driving `ProxyHandler` end-to-end against a
//! `wiremock` upstream, covering the eleven literal scenarios (assuming
//! secret `"myVerySecretSecret"`, as in scenario 1's trust anchor).

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use camomile::fetch::Fetcher;
use camomile::handler::ProxyHandler;
use camomile::{hex, signature};
use camomile_http::handler::Handler;
use camomile_http::protocol::body::ReqBody;

const SECRET: &[u8] = b"myVerySecretSecret";

fn handler() -> ProxyHandler {
    let fetcher = Fetcher::with_allow_private(std::time::Duration::from_secs(5), std::time::Duration::from_secs(10), true).unwrap();
    ProxyHandler::with_allow_private(SECRET.to_vec(), Some(1024), "camomile".to_string(), fetcher, true)
}

fn signed_path(url: &str, secret: &[u8]) -> String {
    let digest = signature::sign(secret, url);
    let encoded = hex::encode(url.as_bytes());
    format!("/{digest}/{encoded}")
}

async fn call(req: Request<ReqBody>) -> http::Response<camomile::body::ResponseBody> {
    Handler::call(&handler(), req).await.unwrap()
}

fn request(method: Method, uri: &str, request_headers: &[(&str, &str)]) -> Request<ReqBody> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in request_headers {
        builder = builder.header(*name, *value);
    }
    builder.body(ReqBody::empty()).unwrap()
}

// Scenario 1: wrong signing secret.
#[tokio::test]
async fn scenario_1_bad_signature_is_rejected() {
    let url = "http://example.com/index.png";
    let uri = signed_path(url, b"invalid");
    let response = call(request(Method::GET, &uri, &[])).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    for name in ["x-frame-options", "x-xss-protection", "x-content-type-options", "content-security-policy", "strict-transport-security"] {
        assert!(response.headers().contains_key(name), "missing security header {name}");
    }
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"Bad signature"));
}

// Scenario 2: a disallowed method is rejected before any path/signature work.
#[tokio::test]
async fn scenario_2_unsupported_method_is_405() {
    let uri = signed_path("http://example.com/index.png", SECRET);
    let response = call(request(Method::DELETE, &uri, &[])).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"Method not allowed"));
}

// Scenario 3: too few path segments is malformed, not a signature failure.
#[tokio::test]
async fn scenario_3_short_path_is_malformed() {
    let response = call(request(Method::GET, "/justadigest", &[])).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"Malformed request"));
}

// Scenario 4: non-http(s) scheme is rejected by SSRF validation.
#[tokio::test]
async fn scenario_4_non_http_scheme_is_rejected() {
    let uri = signed_path("file:///etc/passwd", SECRET);
    let response = call(request(Method::GET, &uri, &[])).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"Unexpected non-http protocol `file:`, expected `http:` or `https:`"));
}

// Scenario 5: an octal-encoded private-range host is rejected.
#[tokio::test]
async fn scenario_5_octal_private_host_is_rejected() {
    // with `allow_private` on, this handler would let loopback through, so
    // exercise a production-configured handler (allow_private = false) here.
    let fetcher = Fetcher::new(std::time::Duration::from_secs(5), std::time::Duration::from_secs(10)).unwrap();
    let handler = ProxyHandler::new(SECRET.to_vec(), Some(1024), "camomile".to_string(), fetcher);

    let uri = signed_path("http://0300.0250.0.01", SECRET);
    let req = request(Method::GET, &uri, &[]);
    let response = Handler::call(&handler, req).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"Bad url host"));
}

// Scenario 6: a successful GET carries the upstream body, `Content-Type`,
// `Content-Length`, `Via`, all five security headers, and no `Server`.
#[tokio::test]
async fn scenario_6_successful_get_has_the_full_header_set() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]).insert_header("content-type", "image/png").insert_header("server", "nginx"))
        .mount(&server)
        .await;

    let uri = signed_path(&format!("{}/cat.png", server.uri()), SECRET);
    let response = call(request(Method::GET, &uri, &[])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(response.headers().get("content-length").unwrap(), "1024");
    assert_eq!(response.headers().get("via").unwrap(), "camomile");
    assert!(response.headers().get("server").is_none());
    for name in ["x-frame-options", "x-xss-protection", "x-content-type-options", "content-security-policy", "strict-transport-security"] {
        assert!(response.headers().contains_key(name), "missing security header {name}");
    }

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 1024);
}

// Scenario 7: HEAD against the same upstream is a 204 with no body but the
// filtered headers preserved, notably the upstream's own `Content-Length`.
#[tokio::test]
async fn scenario_7_head_success_is_204_with_preserved_headers() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/cat.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]).insert_header("content-type", "image/png").insert_header("server", "nginx"))
        .mount(&server)
        .await;

    let uri = signed_path(&format!("{}/cat.png", server.uri()), SECRET);
    let response = call(request(Method::HEAD, &uri, &[])).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(response.headers().get("content-length").unwrap(), "1024");
    assert!(response.headers().get("server").is_none());
    for name in ["x-frame-options", "x-xss-protection", "x-content-type-options", "content-security-policy", "strict-transport-security"] {
        assert!(response.headers().contains_key(name), "missing security header {name}");
    }

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

// Scenario 8: `Cache-Control` is forwarded, `X-Forwarded-For` is not.
#[tokio::test]
async fn scenario_8_request_header_allow_list_is_enforced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.png"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 4]).insert_header("content-type", "image/png"))
        .mount(&server)
        .await;

    let uri = signed_path(&format!("{}/cat.png", server.uri()), SECRET);
    let req = request(Method::GET, &uri, &[("cache-control", "no-cache"), ("x-forwarded-for", "2001:db8::1")]);
    let response = call(req).await;

    // wiremock rejects the request (404, no matching mock) if the
    // cache-control header, which must be forwarded, were missing; the
    // success below additionally confirms x-forwarded-for being present on
    // the inbound side didn't prevent the match (it's simply dropped, not
    // required to be absent upstream since no mock constrains it away).
    assert_eq!(response.status(), StatusCode::OK);
}

// Scenario 9: two redirects, then a successful image response.
#[tokio::test]
async fn scenario_9_double_redirect_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/first")).respond_with(ResponseTemplate::new(302).insert_header("location", "/second")).mount(&server).await;
    Mock::given(method("GET")).and(path("/second")).respond_with(ResponseTemplate::new(302).insert_header("location", "/cat.png")).mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/cat.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]).insert_header("content-type", "image/png"))
        .mount(&server)
        .await;

    let uri = signed_path(&format!("{}/first", server.uri()), SECRET);
    let response = call(request(Method::GET, &uri, &[])).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(response.headers().get("content-length").unwrap(), "1024");
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.len(), 1024);
}

// Scenario 10: the first redirect hop carries no `Location`.
#[tokio::test]
async fn scenario_10_redirect_missing_location_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/moved.png")).respond_with(ResponseTemplate::new(302)).mount(&server).await;

    let uri = signed_path(&format!("{}/moved.png", server.uri()), SECRET);
    let response = call(request(Method::GET, &uri, &[])).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"Unexpected missing `Location` header in redirect response by remote server"));
}

// Scenario 11: the upstream body exceeds the configured cap.
#[tokio::test]
async fn scenario_11_oversized_body_is_413() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huge.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 2048]).insert_header("content-type", "image/png"))
        .mount(&server)
        .await;

    // the test handler's max_size is 1024, well under the 2048-byte body.
    let uri = signed_path(&format!("{}/huge.png", server.uri()), SECRET);
    let response = call(request(Method::GET, &uri, &[])).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body, Bytes::from_static(b"Unexpected too large `Content-Length`"));
}

// Dedicated regression test for the 204/`Content-Length` fix: a HEAD
// response whose upstream `Content-Length` differs from what a naive
// zero-length encoder would synthesize must come through unmodified.
#[tokio::test]
async fn head_request_preserves_upstream_content_length() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/cat.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 98_765]).insert_header("content-type", "image/png"))
        .mount(&server)
        .await;

    let uri = signed_path(&format!("{}/cat.png", server.uri()), SECRET);
    let response = call(request(Method::HEAD, &uri, &[])).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers().get("content-length").unwrap(), "98765");
}
