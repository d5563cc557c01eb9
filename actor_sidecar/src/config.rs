use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, anyhow};

/// Port the sidecar serves its gRPC API on when nothing else is configured.
pub const DEFAULT_GRPC_PORT: u16 = 50001;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_LISTEN_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
    9001,
);
pub const DEFAULT_HANDLER_DELAY: Duration = Duration::from_secs(2);
/// Hosted actors without an invocation for this long are deactivated.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_REPLY: &[u8] = b"pong";

pub const ENV_GRPC_ENDPOINT: &str = "DAPR_GRPC_ENDPOINT";
pub const ENV_GRPC_PORT: &str = "DAPR_GRPC_PORT";
pub const ENV_API_TOKEN: &str = "DAPR_API_TOKEN";
pub const ENV_CLIENT_TIMEOUT_SECONDS: &str = "DAPR_CLIENT_TIMEOUT_SECONDS";

// -------------------------------------------------------------------------------------------------------

/// Where the sidecar is and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarConfig {
    /// gRPC endpoint, always with a scheme (e.g. `http://127.0.0.1:50001`)
    pub endpoint: String,
    /// sent as `dapr-api-token` on every call when set
    pub api_token: Option<String>,
    /// how long to wait for the sidecar to accept a connection
    pub connect_timeout: Duration,
}

impl SidecarConfig {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: with_scheme(endpoint),
            api_token: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Discovers the sidecar from the process environment.
    ///
    /// `DAPR_GRPC_ENDPOINT` wins over `DAPR_GRPC_PORT`; with neither set the sidecar is
    /// expected on `127.0.0.1:50001`.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SidecarConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let endpoint = match (var(ENV_GRPC_ENDPOINT), var(ENV_GRPC_PORT)) {
            (Some(endpoint), _) => with_scheme(endpoint.trim()),
            (None, Some(port)) => {
                let port: u16 = port
                    .trim()
                    .parse()
                    .with_context(|| format!("{ENV_GRPC_PORT} is not a valid port: {port:?}"))?;
                format!("http://127.0.0.1:{port}")
            }
            (None, None) => format!("http://127.0.0.1:{DEFAULT_GRPC_PORT}"),
        };

        let connect_timeout = match var(ENV_CLIENT_TIMEOUT_SECONDS) {
            Some(seconds) => {
                let parsed: u64 = seconds.trim().parse().with_context(|| {
                    format!("{ENV_CLIENT_TIMEOUT_SECONDS} is not a number of seconds: {seconds:?}")
                })?;
                if parsed == 0 {
                    return Err(anyhow!(
                        "{ENV_CLIENT_TIMEOUT_SECONDS} must be a positive number of seconds: {seconds:?}"
                    ));
                }
                Duration::from_secs(parsed)
            }
            None => DEFAULT_CONNECT_TIMEOUT,
        };

        Ok(Self {
            endpoint,
            api_token: var(ENV_API_TOKEN),
            connect_timeout,
        })
    }
}

fn with_scheme(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

// -------------------------------------------------------------------------------------------------------

/// Settings for the callback listener and the actors behind it.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub listen_addr: SocketAddr,
    pub handler: HandlerConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR,
            handler: HandlerConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// simulated processing time per invocation
    pub delay: Duration,
    /// payload returned for every invocation
    pub reply: Vec<u8>,
    /// an actor without invocations for this long deactivates itself
    pub idle_timeout: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_HANDLER_DELAY,
            reply: DEFAULT_REPLY.to_vec(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

// -------------------------------------------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------------------------------------------
