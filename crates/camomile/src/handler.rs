//! The request pipeline: `START → method check → path split → HMAC verify
//! → SSRF check → fetch → emit` (`spec.md` §4.6).

use std::convert::Infallible;
use std::sync::Arc;

use http::{HeaderMap, Method, Request, Response, StatusCode};

use camomile_http::handler::Handler;
use camomile_http::protocol::body::ReqBody;

use crate::body::ResponseBody;
use crate::error::ProxyError;
use crate::fetch::Fetcher;
use crate::headers;
use crate::signature;
use crate::ssrf;

/// Everything the pipeline needs that isn't carried on the request itself.
pub struct ProxyHandler {
    secret: Vec<u8>,
    max_size: Option<u64>,
    server_name: String,
    fetcher: Fetcher,
    allow_private: bool,
}

impl ProxyHandler {
    pub fn new(secret: Vec<u8>, max_size: Option<u64>, server_name: String, fetcher: Fetcher) -> Self {
        Self::with_allow_private(secret, max_size, server_name, fetcher, false)
    }

    /// Like [`ProxyHandler::new`], but skips the unicast check on the
    /// initial signed target too. Only ever `true` in tests, mirroring
    /// [`Fetcher::with_allow_private`].
    pub fn with_allow_private(secret: Vec<u8>, max_size: Option<u64>, server_name: String, fetcher: Fetcher, allow_private: bool) -> Self {
        Self { secret, max_size, server_name, fetcher, allow_private }
    }
}

impl Handler for ProxyHandler {
    type RespBody = ResponseBody;
    type Error = Infallible;

    async fn call(&self, req: Request<ReqBody>) -> Result<Response<Self::RespBody>, Self::Error> {
        Ok(self.run(req).await)
    }
}

impl ProxyHandler {
    async fn run(&self, req: Request<ReqBody>) -> Response<ResponseBody> {
        let method = req.method().clone();

        match self.pipeline(&method, req).await {
            Ok((status, body, upstream_headers)) => self.emit_success(status, body, upstream_headers),
            Err(err) => self.emit_error(err),
        }
    }

    /// Runs the state machine up to and including the fetch, leaving only
    /// response assembly to the caller.
    async fn pipeline(&self, method: &Method, req: Request<ReqBody>) -> Result<(StatusCode, Option<bytes::Bytes>, HeaderMap), ProxyError> {
        if method != Method::GET && method != Method::HEAD {
            return Err(ProxyError::client_visible(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed"));
        }

        let path = req.uri().path().to_owned();
        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 3 {
            return Err(ProxyError::client_visible(StatusCode::NOT_FOUND, "Malformed request"));
        }
        let digest = segments[1];
        let encoded_url = segments[2];

        let target = signature::verify(&self.secret, digest, encoded_url)?;

        let validated = ssrf::validate(&target, self.allow_private).await?;

        let request_headers = headers::filter_request_headers(req.headers());

        let result = self.fetcher.fetch(method.clone(), validated, request_headers, self.max_size).await?;

        let status = if *method == Method::HEAD { StatusCode::NO_CONTENT } else { StatusCode::OK };
        Ok((status, result.body, result.headers))
    }

    fn emit_success(&self, status: StatusCode, body: Option<bytes::Bytes>, upstream_headers: HeaderMap) -> Response<ResponseBody> {
        let mut response_headers = headers::security_headers();
        response_headers.extend(headers::filter_response_headers(&upstream_headers));
        response_headers.insert(
            http::HeaderName::from_static(headers::VIA_HEADER),
            http::HeaderValue::from_str(&self.server_name).unwrap_or_else(|_| http::HeaderValue::from_static("camomile")),
        );

        let mut builder = Response::builder().status(status);
        *builder.headers_mut().unwrap() = response_headers;
        builder.body(ResponseBody::from(body)).expect("response headers were constructed from valid HeaderMap values")
    }

    fn emit_error(&self, err: ProxyError) -> Response<ResponseBody> {
        let (status, message) = err.response_parts();
        if !matches!(err, ProxyError::Internal(_)) {
            tracing::debug!(%status, %message, "rejecting request");
        } else {
            tracing::error!(cause = %err, "internal error handling request");
        }

        let body = ResponseBody::from(message.to_owned().into_bytes());
        let mut response_headers = headers::security_headers();
        response_headers.insert(http::header::CONTENT_LENGTH, http::HeaderValue::from(message.len()));

        let mut builder = Response::builder().status(status);
        *builder.headers_mut().unwrap() = response_headers;
        builder.body(body).expect("error response headers were constructed from valid HeaderMap values")
    }
}
