//! Endpoint address parsing: `scheme://authority` for `inproc`/`ipc`/`tcp`/`ws`.
//!
//! An `Endpoint`/`FromStr` shape extended with the `ws` scheme, the
//! `[local_iface;]host:port` form, and the `*` wildcard interface per the
//! address syntax this crate's wire protocol specifies.

use crate::hostname;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

/// A resolved or to-be-resolved TCP/WS host: either a literal address or a
/// DNS name validated per `hostname::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Host {
    Ip(IpAddr),
    Name(String),
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(ip) => write!(f, "{ip}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// A stream-transport address: an optional bind interface, a host, and a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamAddr {
    /// `None` means "any interface" (`*`).
    pub iface: Option<Host>,
    pub host: Host,
    pub port: u16,
}

impl fmt::Display for StreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(iface) = &self.iface {
            write!(f, "{iface};")?;
        }
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl StreamAddr {
    /// Resolve to a concrete [`SocketAddr`] if the host is already a literal
    /// IP. DNS names require an async resolver at the transport layer.
    #[must_use]
    pub fn as_socket_addr(&self) -> Option<SocketAddr> {
        match &self.host {
            Host::Ip(ip) => Some(SocketAddr::new(*ip, self.port)),
            Host::Name(_) => None,
        }
    }
}

/// Transport endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `tcp://[iface;]host:port`
    Tcp(StreamAddr),
    /// `ws://[iface;]host:port`
    Ws(StreamAddr),
    /// `ipc:///path/to/socket` (Unix domain socket)
    #[cfg(unix)]
    Ipc(PathBuf),
    /// `inproc://label`
    Inproc(String),
}

impl Endpoint {
    /// Parse an endpoint from a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use sproto_core::endpoint::Endpoint;
    ///
    /// assert!(Endpoint::parse("tcp://127.0.0.1:5555").unwrap().is_tcp());
    /// assert!(Endpoint::parse("tcp://*:5555").unwrap().is_tcp());
    /// assert!(Endpoint::parse("ws://example.com:8080").unwrap().is_ws());
    /// assert!(Endpoint::parse("inproc://my-endpoint").unwrap().is_inproc());
    /// ```
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        s.parse()
    }

    #[must_use]
    pub const fn is_tcp(&self) -> bool {
        matches!(self, Self::Tcp(_))
    }

    #[must_use]
    pub const fn is_ws(&self) -> bool {
        matches!(self, Self::Ws(_))
    }

    #[cfg(unix)]
    #[must_use]
    pub const fn is_ipc(&self) -> bool {
        matches!(self, Self::Ipc(_))
    }

    #[must_use]
    pub const fn is_inproc(&self) -> bool {
        matches!(self, Self::Inproc(_))
    }
}

fn parse_stream_authority(authority: &str) -> Result<StreamAddr, EndpointError> {
    let (iface_part, rest) = match authority.split_once(';') {
        Some((iface, rest)) => (Some(iface), rest),
        None => (None, authority),
    };

    let (host_part, port_part) = rest
        .rsplit_once(':')
        .ok_or_else(|| EndpointError::InvalidAddress(authority.to_string()))?;

    let port: u16 = port_part
        .parse()
        .map_err(|_| EndpointError::InvalidAddress(authority.to_string()))?;

    let host = parse_host(host_part)?;
    let iface = match iface_part {
        None | Some("*") => None,
        Some(i) => Some(parse_host(i)?),
    };

    Ok(StreamAddr { iface, host, port })
}

fn parse_host(s: &str) -> Result<Host, EndpointError> {
    let stripped = s.strip_prefix('[').and_then(|s| s.strip_suffix(']'));
    let literal = stripped.unwrap_or(s);
    if let Ok(ip) = literal.parse::<IpAddr>() {
        return Ok(Host::Ip(ip));
    }
    hostname::validate(literal)
        .map(|()| Host::Name(literal.to_string()))
        .map_err(|_| EndpointError::InvalidAddress(s.to_string()))
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(authority) = s.strip_prefix("tcp://") {
            Ok(Self::Tcp(parse_stream_authority(authority)?))
        } else if let Some(authority) = s.strip_prefix("ws://") {
            Ok(Self::Ws(parse_stream_authority(authority)?))
        } else if let Some(path) = s.strip_prefix("ipc://") {
            #[cfg(unix)]
            {
                if path.is_empty() {
                    return Err(EndpointError::InvalidAddress(s.to_string()));
                }
                Ok(Self::Ipc(PathBuf::from(path)))
            }
            #[cfg(not(unix))]
            {
                let _ = path;
                Err(EndpointError::IpcNotSupported)
            }
        } else if let Some(name) = s.strip_prefix("inproc://") {
            if name.is_empty() || name.len() > 127 {
                Err(EndpointError::InvalidAddress(s.to_string()))
            } else {
                Ok(Self::Inproc(name.to_string()))
            }
        } else {
            Err(EndpointError::InvalidScheme(s.to_string()))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Ws(addr) => write!(f, "ws://{addr}"),
            #[cfg(unix)]
            Self::Ipc(path) => write!(f, "ipc://{}", path.display()),
            Self::Inproc(name) => write!(f, "inproc://{name}"),
        }
    }
}

/// Errors parsing or using an endpoint address. Maps onto `error::Error`'s
/// `InvalidArgument`/`AddressInUse`/`NoDevice` variants at the socket-core
/// boundary.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("invalid scheme in endpoint: {0} (expected tcp://, ws://, ipc://, or inproc://)")]
    InvalidScheme(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("IPC transport not supported on this platform")]
    IpcNotSupported,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<EndpointError> for crate::error::Error {
    fn from(e: EndpointError) -> Self {
        match e {
            EndpointError::IpcNotSupported => {
                Self::NotSupported("ipc transport".to_string())
            }
            other => Self::invalid_argument(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tcp_ipv4() {
        let ep = Endpoint::parse("tcp://127.0.0.1:5555").unwrap();
        assert!(ep.is_tcp());
        assert_eq!(ep.to_string(), "tcp://127.0.0.1:5555");
    }

    #[test]
    fn parse_tcp_ipv6() {
        let ep = Endpoint::parse("tcp://[::1]:5555").unwrap();
        assert!(ep.is_tcp());
    }

    #[test]
    fn parse_tcp_wildcard_interface() {
        let ep = Endpoint::parse("tcp://*:5555").unwrap();
        match ep {
            Endpoint::Tcp(addr) => assert!(addr.iface.is_none()),
            _ => panic!("expected tcp"),
        }
    }

    #[test]
    fn parse_tcp_with_explicit_interface() {
        let ep = Endpoint::parse("tcp://127.0.0.1;example.com:80").unwrap();
        match ep {
            Endpoint::Tcp(addr) => {
                assert_eq!(addr.iface, Some(Host::Ip("127.0.0.1".parse().unwrap())));
                assert_eq!(addr.host, Host::Name("example.com".to_string()));
            }
            _ => panic!("expected tcp"),
        }
    }

    #[test]
    fn parse_ws() {
        let ep = Endpoint::parse("ws://example.com:8080").unwrap();
        assert!(ep.is_ws());
    }

    #[cfg(unix)]
    #[test]
    fn parse_ipc() {
        let ep = Endpoint::parse("ipc:///tmp/test.sock").unwrap();
        assert!(ep.is_ipc());
        assert_eq!(ep.to_string(), "ipc:///tmp/test.sock");
    }

    #[test]
    fn parse_inproc() {
        let ep = Endpoint::parse("inproc://my-endpoint").unwrap();
        assert!(ep.is_inproc());
        assert_eq!(ep.to_string(), "inproc://my-endpoint");
    }

    #[test]
    fn invalid_scheme_rejected() {
        let err = Endpoint::parse("http://127.0.0.1:5555").unwrap_err();
        assert!(matches!(err, EndpointError::InvalidScheme(_)));
    }

    #[test]
    fn invalid_tcp_address_rejected() {
        let err = Endpoint::parse("tcp://invalid:not-a-port").unwrap_err();
        assert!(matches!(err, EndpointError::InvalidAddress(_)));
    }

    #[test]
    fn empty_inproc_name_rejected() {
        assert!(Endpoint::parse("inproc://").is_err());
    }
}
