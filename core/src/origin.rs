//! Decides whether a request originates from the server host itself.
//!
//! A reverse proxy may connect over loopback and make every client look
//! local, so any forwarding header disqualifies the request regardless of
//! the addresses involved.

use std::io;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

use thiserror::Error;

/// Headers (lowercase) whose presence means the request went through a proxy.
pub const FORWARDING_HEADERS: &[&str] = &["x-forwarded-for", "forwarded"];

#[derive(Debug, Error)]
#[error("failed to resolve host {host:?}")]
pub struct HostResolutionError {
    host: String,
    #[source]
    source: io::Error,
}

impl HostResolutionError {
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// True iff both addresses are loopback or unspecified and no forwarding
/// header was seen.
pub fn is_local(
    remote_addr: &str,
    local_addr: &str,
    forwarding_header_present: bool,
) -> Result<bool, HostResolutionError> {
    let remote = resolve(remote_addr)?;
    let local = resolve(local_addr)?;
    tracing::debug!(
        %remote,
        %local,
        forwarded = forwarding_header_present,
        "Classifying welcome page request origin"
    );

    Ok(is_local_address(remote) && is_local_address(local) && !forwarding_header_present)
}

/// Loopback or the unspecified ("any") address, including IPv4-mapped forms.
#[must_use]
pub fn is_local_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || v6
                    .to_ipv4_mapped()
                    .is_some_and(|v4| v4.is_loopback() || v4.is_unspecified())
        }
    }
}

/// Resolve an address string: IP literal, `ip:port`, bracketed IPv6, or a
/// host name (first resolved address wins).
fn resolve(raw: &str) -> Result<IpAddr, HostResolutionError> {
    let host = raw.trim();
    let fail = |source: io::Error| HostResolutionError {
        host: raw.to_string(),
        source,
    };

    if host.is_empty() {
        return Err(fail(io::Error::new(
            io::ErrorKind::InvalidInput,
            "empty address",
        )));
    }
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(addr.ip());
    }
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if let Ok(ip) = unbracketed.parse::<IpAddr>() {
        return Ok(ip);
    }

    (unbracketed, 0)
        .to_socket_addrs()
        .map_err(fail)?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| {
            fail(io::Error::new(
                io::ErrorKind::NotFound,
                "lookup returned no addresses",
            ))
        })
}
