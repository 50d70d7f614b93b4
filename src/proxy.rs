use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyType {
    Http,
    Https,
    Socks5,
}

impl ProxyType {
    pub fn scheme(&self) -> &'static str {
        match self {
            ProxyType::Http => "http",
            ProxyType::Https => "https",
            ProxyType::Socks5 => "socks5",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "HTTP"),
            ProxyType::Https => write!(f, "HTTPS"),
            ProxyType::Socks5 => write!(f, "SOCKS5"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseProxyError {
    #[error("unsupported proxy scheme `{0}`")]
    Scheme(String),
    #[error("missing port in `{0}`")]
    MissingPort(String),
    #[error("invalid port in `{0}`")]
    Port(String),
    #[error("empty host in `{0}`")]
    Host(String),
}

/// A forwarding endpoint written as `scheme://host:port`.
///
/// Two proxies are the same proxy when their string forms are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Proxy {
    kind: ProxyType,
    host: String,
    port: u16,
}

impl Proxy {
    pub fn new(kind: ProxyType, host: impl Into<String>, port: u16) -> Self {
        Self {
            kind,
            host: host.into(),
            port,
        }
    }

    pub fn kind(&self) -> ProxyType {
        self.kind
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` without the scheme. IPv6 hosts are bracketed.
    pub fn addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind.scheme(), self.addr())
    }
}

impl FromStr for Proxy {
    type Err = ParseProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, rest) = match s.split_once("://") {
            Some((scheme, rest)) => {
                let kind = match scheme.to_ascii_lowercase().as_str() {
                    "http" => ProxyType::Http,
                    "https" => ProxyType::Https,
                    "socks5" => ProxyType::Socks5,
                    _ => return Err(ParseProxyError::Scheme(scheme.to_string())),
                };
                (kind, rest)
            }
            None => (ProxyType::Http, s),
        };

        let rest = rest.trim_end_matches('/');
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| ParseProxyError::MissingPort(s.to_string()))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(ParseProxyError::Host(s.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| ParseProxyError::Port(s.to_string()))?;

        Ok(Proxy::new(kind, host, port))
    }
}

impl TryFrom<String> for Proxy {
    type Error = ParseProxyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Proxy> for String {
    fn from(proxy: Proxy) -> Self {
        proxy.to_string()
    }
}
