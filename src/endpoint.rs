//! Backend addresses.
//!
//! Accepted forms:
//!
//! | address                   | network | dial/listen address |
//! |---------------------------|---------|---------------------|
//! | `localhost:2020`          | TCP     | `localhost:2020`    |
//! | `tcp://10.0.0.1:2020`     | TCP     | `10.0.0.1:2020`     |
//! | `tcp6://[::1]:2020`       | TCP     | `[::1]:2020`        |
//! | `unix:///tmp/xrpc.sock`   | Unix    | `/tmp/xrpc.sock`    |
//! | `udp://10.0.0.1:2020`     | `udp`   | `10.0.0.1:2020`     |
//!
//! Parsing never fails: an address that is not a valid URL is taken as a
//! plain TCP `host:port`.

use std::fmt;

use tracing::warn;
use url::Url;

/// Network family of an [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Network {
    /// `tcp`, `tcp4`, `tcp6` or no scheme.
    Tcp,
    /// `unix` domain socket.
    Unix,
    /// Any other scheme. Transports reject these.
    Other(String),
}

impl Network {
    /// Scheme name as written in an address.
    pub fn scheme(&self) -> &str {
        match self {
            Network::Tcp => "tcp",
            Network::Unix => "unix",
            Network::Other(scheme) => scheme,
        }
    }
}

/// Parsed backend address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    network: Network,
    address: String,
}

impl Endpoint {
    /// Parse an address. See the module docs for the accepted forms.
    pub fn parse(raw: &str) -> Self {
        if !raw.contains("://") {
            return Self::tcp(raw);
        }

        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                warn!("Cannot parse endpoint '{}' ({}), using it as a TCP address", raw, e);
                return Self::tcp(raw);
            }
        };

        match url.scheme() {
            "tcp" | "tcp4" | "tcp6" => Self::tcp(host_port(&url)),
            "unix" => {
                let path = raw.split_once("://").map(|(_, rest)| rest).unwrap_or(raw);
                Self::unix(path)
            }
            other => Self {
                network: Network::Other(other.to_string()),
                address: host_port(&url),
            },
        }
    }

    /// TCP endpoint for `host:port`.
    pub fn tcp(address: impl Into<String>) -> Self {
        Self {
            network: Network::Tcp,
            address: address.into(),
        }
    }

    /// Unix socket endpoint for `path`.
    pub fn unix(path: impl Into<String>) -> Self {
        Self {
            network: Network::Unix,
            address: path.into(),
        }
    }

    /// Network family.
    #[inline]
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Dial/listen address without the scheme.
    #[inline]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl From<&str> for Endpoint {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.network.scheme(), self.address)
    }
}

fn host_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}
