//! Engine connection configuration

use crate::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the engine endpoint
pub const DOCKER_HOST: &str = "DOCKER_HOST";
/// Environment variable naming the client certificate directory
pub const DOCKER_CERT_PATH: &str = "DOCKER_CERT_PATH";
/// Fallback key for the endpoint, used when `DOCKER_HOST` is unset
pub const DOCKYARD_DOCKER_HOST: &str = "DOCKYARD_DOCKER_HOST";
/// Fallback key for the certificate directory
pub const DOCKYARD_DOCKER_CERT_PATH: &str = "DOCKYARD_DOCKER_CERT_PATH";

/// Default per-request client timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Engine connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Endpoint URI (`unix://`, `tcp://`, `http://` or `https://`)
    pub endpoint: String,
    /// Directory holding `key.pem`, `cert.pem` and `ca.pem`
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    /// Client request timeout
    #[serde(default = "default_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

impl EngineConfig {
    /// Create a configuration for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            cert_path: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the client certificate directory
    pub fn with_cert_path(mut self, cert_path: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(cert_path.into());
        self
    }

    /// Set the client request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the configuration from the process environment
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the configuration from an arbitrary key lookup.
    ///
    /// `DOCKER_HOST`/`DOCKER_CERT_PATH` win over the `DOCKYARD_` keys. Host
    /// and cert path always come from the same pair.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, EngineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        for (host_key, cert_key) in [
            (DOCKER_HOST, DOCKER_CERT_PATH),
            (DOCKYARD_DOCKER_HOST, DOCKYARD_DOCKER_CERT_PATH),
        ] {
            match (get(host_key), get(cert_key)) {
                (Some(host), cert) => {
                    let mut config = Self::new(host);
                    config.cert_path = cert.map(PathBuf::from);
                    return Ok(config);
                }
                (None, Some(_)) => {
                    return Err(EngineError::Configuration(format!(
                        "{} is set but {} is not",
                        cert_key, host_key
                    )));
                }
                (None, None) => continue,
            }
        }

        Err(EngineError::Configuration(format!(
            "Can't find docker connection configuration. Set {} (and optionally {}), or {} (and optionally {})",
            DOCKER_HOST, DOCKER_CERT_PATH, DOCKYARD_DOCKER_HOST, DOCKYARD_DOCKER_CERT_PATH
        )))
    }

    /// Parse the endpoint into a connectable form
    pub fn endpoint(&self) -> Result<Endpoint, EngineError> {
        Endpoint::parse(&self.endpoint, self.cert_path.as_deref())
    }
}

/// A parsed engine endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local unix socket
    Unix(PathBuf),
    /// Plain HTTP over TCP
    Http {
        /// `http://host:port` address
        address: String,
        /// Host part of the address
        host: String,
    },
    /// HTTPS with client certificates
    Https {
        /// `https://host:port` address
        address: String,
        /// Host part of the address
        host: String,
        /// Certificate directory
        cert_path: PathBuf,
    },
}

impl Endpoint {
    /// Parse an endpoint URI. `tcp://` becomes HTTPS when a certificate
    /// directory is supplied, plain HTTP otherwise.
    pub fn parse(uri: &str, cert_path: Option<&Path>) -> Result<Self, EngineError> {
        let uri = uri.trim();
        let (scheme, rest) = uri.split_once("://").ok_or_else(|| {
            EngineError::Configuration(format!("Endpoint '{}' has no scheme", uri))
        })?;

        if scheme == "unix" {
            if rest.is_empty() {
                return Err(EngineError::Configuration("Empty unix socket path".to_string()));
            }
            return Ok(Self::Unix(PathBuf::from(rest)));
        }

        let host = Self::parse_host(rest)
            .ok_or_else(|| EngineError::Configuration(format!("Endpoint '{}' has no host", uri)))?;
        let authority = rest.split('/').next().unwrap_or(rest);

        match (scheme, cert_path) {
            ("tcp" | "https", Some(cert_path)) => Ok(Self::Https {
                address: format!("https://{}", authority),
                host,
                cert_path: cert_path.to_path_buf(),
            }),
            ("https", None) => Err(EngineError::Configuration(format!(
                "Endpoint '{}' needs a certificate directory",
                uri
            ))),
            ("tcp" | "http", _) => Ok(Self::Http {
                address: format!("http://{}", authority),
                host,
            }),
            (other, _) => Err(EngineError::Configuration(format!(
                "Unsupported endpoint scheme '{}'",
                other
            ))),
        }
    }

    /// Extract the host from `host[:port][/path]`, unwrapping IPv6 brackets
    fn parse_host(rest: &str) -> Option<String> {
        let authority = rest.split('/').next()?;
        let host = if let Some(bracketed) = authority.strip_prefix('[') {
            bracketed.split(']').next()?
        } else {
            authority.rsplit_once(':').map_or(authority, |(host, _)| host)
        };

        if host.is_empty() {
            None
        } else {
            Some(host.to_string())
        }
    }

    /// Host on which published container ports are reachable
    pub fn host(&self) -> &str {
        match self {
            Self::Unix(_) => "127.0.0.1",
            Self::Http { host, .. } | Self::Https { host, .. } => host,
        }
    }
}
