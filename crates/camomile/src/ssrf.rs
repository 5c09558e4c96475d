//! SSRF defenses: parse, scheme-check, resolve, and classify (`spec.md` §4.4).

use thiserror::Error;
use url::Url;

use crate::ipclass;

/// Every way a candidate fetch target can fail SSRF validation.
///
/// Each variant's `Display` is the exact client-facing message from
/// `spec.md` §6.6.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SsrfRejection {
    #[error("{0}")]
    Parse(String),

    #[error("Unexpected non-http protocol `{0}`, expected `http:` or `https:`")]
    Scheme(String),

    #[error("Could not look up host `{0}`")]
    Lookup(String),

    #[error("Bad url host")]
    BadHost,
}

/// Validates `url_str` per `spec.md` §4.4, resolving the host through the
/// platform DNS resolver and rejecting anything that doesn't classify as a
/// [`ipclass::Range::Unicast`] address. Returns the parsed URL on success.
///
/// `allow_private` exists solely so integration tests can point the fetcher
/// at a loopback-bound `wiremock` server; production callers must always
/// pass `false` (see [`crate::config::Config::allow_private_targets`]).
pub async fn validate(url_str: &str, allow_private: bool) -> Result<Url, SsrfRejection> {
    let url = Url::parse(url_str).map_err(|e| SsrfRejection::Parse(e.to_string()))?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(SsrfRejection::Scheme(format!("{scheme}:")));
    }

    let host = url.host_str().ok_or_else(|| SsrfRejection::Lookup(String::new()))?;
    let port = url.port_or_known_default().unwrap_or(80);

    let ip = resolve_one(host, port).await.map_err(|_| SsrfRejection::Lookup(host.to_string()))?;

    if !allow_private && !ipclass::is_unicast(ip) {
        return Err(SsrfRejection::BadHost);
    }

    Ok(url)
}

async fn resolve_one(host: &str, port: u16) -> std::io::Result<std::net::IpAddr> {
    let mut addrs = tokio::net::lookup_host((host, port)).await?;
    addrs.next().map(|addr| addr.ip()).ok_or_else(|| std::io::Error::other("no addresses returned"))
}
