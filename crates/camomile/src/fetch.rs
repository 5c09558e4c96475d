//! Safe fetcher: manual redirect following with per-hop SSRF re-validation,
//! content-type enforcement, and a streamed size cap (`spec.md` §4.5).

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use http::header::{CONTENT_TYPE, LOCATION};
use http::{HeaderMap, Method, StatusCode};
use url::Url;

use crate::error::ProxyError;
use crate::headers;
use crate::ssrf;

/// Hard cap on redirect hops followed before a redirect response is treated
/// as terminal (`spec.md` §4.5, §9 — "not explicitly documented... treat it
/// as a hard contract here").
const MAX_REDIRECTS: u32 = 3;

/// Result of a successful fetch. `body` is `None` only for a `HEAD` request.
pub struct FetchResult {
    pub body: Option<Bytes>,
    pub headers: HeaderMap,
}

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    allow_private: bool,
}

impl Fetcher {
    pub fn new(connect_timeout: std::time::Duration, total_timeout: std::time::Duration) -> Result<Self, reqwest::Error> {
        Self::with_allow_private(connect_timeout, total_timeout, false)
    }

    /// Like [`Fetcher::new`], but `allow_private` skips the unicast check on
    /// every redirect hop. Only ever `true` in tests driving a loopback
    /// `wiremock` server (see [`crate::config::Config::allow_private_targets`]).
    pub fn with_allow_private(
        connect_timeout: std::time::Duration,
        total_timeout: std::time::Duration,
        allow_private: bool,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(connect_timeout)
            .timeout(total_timeout)
            .user_agent(format!("camomile/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, allow_private })
    }

    /// Fetches `url`, following up to [`MAX_REDIRECTS`] hops (each
    /// re-validated through [`ssrf::validate`]), then enforces the MIME and
    /// size caps on the terminal response.
    pub async fn fetch(&self, method: Method, mut url: Url, request_headers: HeaderMap, max_size: Option<u64>) -> Result<FetchResult, ProxyError> {
        let mut redirects = 0u32;

        let response = loop {
            let response = self
                .client
                .request(method.clone(), url.clone())
                .headers(request_headers.clone())
                .send()
                .await
                .map_err(|e| {
                    tracing::warn!(cause = %e, url = %url, "upstream transport failure");
                    ProxyError::client_visible(StatusCode::BAD_REQUEST, "Bad gateway")
                })?;

            let status = response.status();
            let is_redirect = matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308);

            if is_redirect && redirects < MAX_REDIRECTS {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        ProxyError::client_visible(
                            StatusCode::BAD_REQUEST,
                            "Unexpected missing `Location` header in redirect response by remote server",
                        )
                    })?;

                let next_url = url.join(location).map_err(|e| {
                    ProxyError::client_visible(StatusCode::BAD_REQUEST, format!("Unexpected malformed `Location` header: {e}"))
                })?;

                url = ssrf::validate(next_url.as_str(), self.allow_private).await?;
                redirects += 1;
                continue;
            }

            break response;
        };

        let content_type = match headers::content_type_of(response.headers()) {
            None | Some("") => {
                return Err(ProxyError::client_visible(
                    StatusCode::BAD_REQUEST,
                    "Unexpected missing `Content-type` header in remote server response",
                ));
            }
            Some(ct) => ct.to_string(),
        };

        if !headers::is_allowed_mime(&content_type) {
            return Err(ProxyError::client_visible(
                StatusCode::BAD_REQUEST,
                "Unexpected non-image `Content-type` in remote server response, this might not be an image or it might not be supported by camomile",
            ));
        }

        let response_headers = response.headers().clone();

        if method == Method::HEAD {
            return Ok(FetchResult { body: None, headers: response_headers });
        }

        let body = read_body_capped(response, max_size).await?;
        Ok(FetchResult { body: Some(body), headers: response_headers })
    }
}

async fn read_body_capped(response: reqwest::Response, max_size: Option<u64>) -> Result<Bytes, ProxyError> {
    let mut stream = response.bytes_stream();
    let mut buf = BytesMut::new();
    let mut total: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::warn!(cause = %e, "upstream body streaming failure");
            ProxyError::client_visible(StatusCode::BAD_REQUEST, "Bad gateway")
        })?;

        total += chunk.len() as u64;
        if let Some(max) = max_size {
            if total > max {
                return Err(ProxyError::client_visible(StatusCode::PAYLOAD_TOO_LARGE, "Unexpected too large `Content-Length`"));
            }
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}
