//! TCP endpoint addressing.
//!
//! A thin, `Display`/`FromStr` wrapper around `SocketAddr` used for the
//! `remote_endpoint` captured at connect-request time and the
//! `local_endpoint`/`remote_endpoint` captured once a session reaches
//! *Running*.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// A resolved TCP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    /// Wrap an already-resolved socket address.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Parse `host:port` (or `[ipv6]:port`) into an endpoint.
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }

    /// The underlying socket address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>()
            .map(Self)
            .map_err(|_| EndpointError::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors raised while parsing an [`Endpoint`].
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid TCP address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ipv4() {
        let ep = Endpoint::parse("127.0.0.1:5555").unwrap();
        assert_eq!(ep.to_string(), "127.0.0.1:5555");
    }

    #[test]
    fn parses_ipv6() {
        let ep = Endpoint::parse("[::1]:5555").unwrap();
        assert_eq!(ep.addr().port(), 5555);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Endpoint::parse("not-an-address").is_err());
    }
}
