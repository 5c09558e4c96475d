//! Process-wide, immutable header and MIME allow-lists (`spec.md` §6).
//!
//! These tables never change after process start; they are plain `const`
//! arrays rather than `once_cell`/`lazy_static` statics because nothing here
//! needs runtime computation.

use http::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_CHARSET, ACCEPT_LANGUAGE, ACCEPT_RANGES, CACHE_CONTROL, CONTENT_ENCODING,
    CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, EXPIRES, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, RANGE,
    TRANSFER_ENCODING,
};

/// Inbound request headers forwarded to the upstream. `Accept-Encoding` and
/// `X-Forwarded-For` are deliberately absent (`spec.md` §6.2).
pub const REQUEST_ALLOW_LIST: &[HeaderName] =
    &[ACCEPT, ACCEPT_CHARSET, ACCEPT_LANGUAGE, CACHE_CONTROL, IF_NONE_MATCH, IF_MODIFIED_SINCE, RANGE];

/// Outbound upstream response headers forwarded to the client. `Server` is
/// deliberately absent (`spec.md` §6.3).
pub const RESPONSE_ALLOW_LIST: &[HeaderName] = &[
    ACCEPT_RANGES,
    CACHE_CONTROL,
    CONTENT_LENGTH,
    CONTENT_ENCODING,
    CONTENT_RANGE,
    CONTENT_TYPE,
    ETAG,
    EXPIRES,
    LAST_MODIFIED,
    TRANSFER_ENCODING,
];

/// Security headers emitted on every response the proxy itself originates (`spec.md` §6.4).
pub fn security_headers() -> HeaderMap {
    let mut map = HeaderMap::with_capacity(5);
    map.insert(HeaderName::from_static("x-frame-options"), HeaderValue::from_static("deny"));
    map.insert(HeaderName::from_static("x-xss-protection"), HeaderValue::from_static("1; mode=block"));
    map.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
    map.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static("default-src 'none'; img-src data:; style-src 'unsafe-inline'"),
    );
    map.insert(
        HeaderName::from_static("strict-transport-security"),
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    map
}

pub const VIA_HEADER: &str = "via";

/// Exact-match lowercase media types this proxy will relay (`spec.md` §6.5).
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/bmp",
    "image/cgm",
    "image/g3fax",
    "image/gif",
    "image/ief",
    "image/jp2",
    "image/jpeg",
    "image/jpg",
    "image/pict",
    "image/png",
    "image/prs.btif",
    "image/svg+xml",
    "image/tiff",
    "image/vnd.adobe.photoshop",
    "image/vnd.djvu",
    "image/vnd.dwg",
    "image/vnd.dxf",
    "image/vnd.fastbidsheet",
    "image/vnd.fpx",
    "image/vnd.fst",
    "image/vnd.fujixerox.edmics-mmr",
    "image/vnd.fujixerox.edmics-rlc",
    "image/vnd.microsoft.icon",
    "image/vnd.ms-modi",
    "image/vnd.net-fpx",
    "image/vnd.wap.wbmp",
    "image/vnd.xiff",
    "image/webp",
    "image/x-cmu-raster",
    "image/x-cmx",
    "image/x-icon",
    "image/x-macpaint",
    "image/x-pcx",
    "image/x-pict",
    "image/x-portable-anymap",
    "image/x-portable-bitmap",
    "image/x-portable-graymap",
    "image/x-portable-pixmap",
    "image/x-quicktime",
    "image/x-rgb",
    "image/x-xbitmap",
    "image/x-xpixmap",
    "image/x-xwindowdump",
];

/// Returns whether `content_type` is an exact (no parameter stripping) match
/// against [`ALLOWED_MIME_TYPES`].
pub fn is_allowed_mime(content_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&content_type)
}

/// Copies every header in `source` whose name is in `allow_list` into a fresh
/// map, keyed by the allow-list's own `HeaderName` value and carrying the
/// source's value verbatim. Headers outside the allow-list never appear in
/// the output (`spec.md` §4.3).
pub fn filter(source: &HeaderMap, allow_list: &[HeaderName]) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(allow_list.len());
    for name in allow_list {
        if let Some(value) = source.get(name) {
            out.insert(name.clone(), value.clone());
        }
    }
    out
}

/// Builds the response header filter used on a successful fetch: the
/// response allow-list, minus `Transfer-Encoding` (the proxy always buffers
/// the full body before responding, so it never re-frames the response with
/// chunked transfer itself — see `SPEC_FULL.md` §9).
pub fn filter_response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut out = filter(upstream, RESPONSE_ALLOW_LIST);
    out.remove(TRANSFER_ENCODING);
    out
}

/// Builds the outbound request headers: the request allow-list from the
/// inbound client headers.
pub fn filter_request_headers(inbound: &HeaderMap) -> HeaderMap {
    filter(inbound, REQUEST_ALLOW_LIST)
}

pub(crate) fn content_type_of(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}
