//! URL validation for outbound metadata fetches.
//!
//! Pasted links can point anywhere, so there is no domain allowlist. What
//! is enforced:
//! - the URL parses and uses `http` or `https`
//! - the URL has a host
//! - optionally, the host does not resolve to an internal address
//!   (loopback, private ranges, link-local), which keeps the endpoint
//!   from being used to probe the server's own network
//!
//! The last check is repeated on every redirect hop and on the addresses
//! a connection actually resolves to.

use hyper::client::connect::dns::Name;
use reqwest::dns::{Addrs, Resolve, Resolving};
use reqwest::redirect::{Attempt, Policy};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use url::{Host, Url};

const MAX_REDIRECTS: usize = 10;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone)]
pub enum UrlValidationError {
    /// URL is malformed or cannot be parsed
    InvalidUrl(String),
    /// URL uses a scheme other than http/https
    UnsupportedScheme(String),
    /// Resolved IP is a private/internal address
    InternalIpAddress(String),
    /// DNS resolution failed
    DnsResolutionFailed(String),
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UrlValidationError::InvalidUrl(msg) => write!(f, "Invalid URL: {}", msg),
            UrlValidationError::UnsupportedScheme(scheme) => {
                write!(f, "Only http and https URLs are allowed, got {}", scheme)
            }
            UrlValidationError::InternalIpAddress(ip) => {
                write!(f, "Internal IP addresses are not allowed: {}", ip)
            }
            UrlValidationError::DnsResolutionFailed(msg) => {
                write!(f, "DNS resolution failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for UrlValidationError {}

fn is_internal_ipv4(ip: &Ipv4Addr) -> bool {
    let o = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_unspecified()
        // Shared address space (100.64.0.0/10)
        || (o[0] == 100 && (o[1] & 0xC0) == 64)
        // IETF protocol assignments (192.0.0.0/24)
        || (o[0] == 192 && o[1] == 0 && o[2] == 0)
}

fn is_internal_ipv6(ip: &Ipv6Addr) -> bool {
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.to_ipv4_mapped().map(|v4| is_internal_ipv4(&v4)).unwrap_or(false)
        // Unique local (fc00::/7)
        || (ip.segments()[0] & 0xFE00) == 0xFC00
        // Link-local (fe80::/10)
        || (ip.segments()[0] & 0xFFC0) == 0xFE80
}

pub fn is_internal_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_internal_ipv4(v4),
        IpAddr::V6(v6) => is_internal_ipv6(v6),
    }
}

/// Parse a URL and check its scheme and host. Does no network I/O.
pub fn parse_fetch_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())
        .map_err(|e| UrlValidationError::InvalidUrl(e.to_string()))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_string()));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(UrlValidationError::InvalidUrl("No host in URL".to_string()));
    }

    Ok(url)
}

/// Reject hosts written as internal IP literals. Domain names pass; they
/// are checked when resolved.
fn check_ip_literal(url: &Url) -> Result<(), UrlValidationError> {
    match url.host() {
        Some(Host::Ipv4(v4)) if is_internal_ipv4(&v4) => {
            Err(UrlValidationError::InternalIpAddress(v4.to_string()))
        }
        Some(Host::Ipv6(v6)) if is_internal_ipv6(&v6) => {
            Err(UrlValidationError::InternalIpAddress(v6.to_string()))
        }
        Some(_) => Ok(()),
        None => Err(UrlValidationError::InvalidUrl("No host in URL".to_string())),
    }
}

/// Validate a URL for fetching.
///
/// With `allow_private` set, only the syntactic checks run. Otherwise the
/// host is resolved and every address must be public.
pub async fn validate_url(url_str: &str, allow_private: bool) -> Result<Url, UrlValidationError> {
    let url = parse_fetch_url(url_str)?;
    if allow_private {
        return Ok(url);
    }

    check_ip_literal(&url)?;
    if let Some(Host::Domain(domain)) = url.host() {
        let port = url.port_or_known_default().unwrap_or(443);
        let addrs = tokio::net::lookup_host((domain, port))
            .await
            .map_err(|e| UrlValidationError::DnsResolutionFailed(e.to_string()))?;
        for addr in addrs {
            if is_internal_ip(&addr.ip()) {
                return Err(UrlValidationError::InternalIpAddress(addr.ip().to_string()));
            }
        }
    }

    Ok(url)
}

/// Checks applied to every redirect hop: scheme, host and IP literals.
pub fn check_redirect_target(url: &Url) -> Result<(), UrlValidationError> {
    let url = parse_fetch_url(url.as_str())?;
    check_ip_literal(&url)
}

/// Redirect policy for clients that must stay off internal networks.
pub fn public_redirect_policy() -> Policy {
    Policy::custom(|attempt: Attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        match check_redirect_target(attempt.url()) {
            Ok(()) => attempt.follow(),
            Err(e) => {
                tracing::warn!(url = %attempt.url(), error = %e, "redirect refused");
                attempt.error(e)
            }
        }
    })
}

/// DNS resolver that refuses names resolving to internal addresses.
///
/// The check runs on the addresses the connection will actually use, so a
/// name cannot pass [`validate_url`] and then resolve elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublicResolver;

impl Resolve for PublicResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_public(name.as_str().to_string()))
    }
}

async fn resolve_public(host: String) -> Result<Addrs, BoxError> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0))
        .await
        .map_err(|e| UrlValidationError::DnsResolutionFailed(e.to_string()))?
        .collect();

    if let Some(internal) = addrs.iter().find(|a| is_internal_ip(&a.ip())) {
        return Err(UrlValidationError::InternalIpAddress(internal.ip().to_string()).into());
    }
    if addrs.is_empty() {
        return Err(UrlValidationError::DnsResolutionFailed(host).into());
    }

    Ok(Box::new(addrs.into_iter()))
}
