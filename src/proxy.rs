use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::common::ProxyError;

/// How many times the reachability probe is attempted before giving up.
const PROBE_ATTEMPTS: usize = 3;

/// Fixed delay between probe attempts.
const PROBE_DELAY: Duration = Duration::from_secs(5);

/// Connect timeout applied to each probe attempt.
const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection parameters for an outbound proxy, parsed from the compact
/// `user:pass@host:port` descriptor form.
///
/// Parsing is positional: split on `@`, then on `:` within each half. Values
/// containing `:` or `@` are unsupported input and fail the parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    /// Username for proxy authentication.
    pub user: String,
    /// Password for proxy authentication.
    pub pass: String,
    /// Proxy host, an IP address or hostname.
    pub host: String,
    /// Proxy port.
    pub port: u16,
}

impl ProxyDescriptor {
    /// The `host:port` part of the descriptor, safe to log.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The proxy endpoint as an HTTP URL, without credentials.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl FromStr for ProxyDescriptor {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ProxyError::Malformed(s.to_string());

        let (credentials, address) = s.split_once('@').ok_or_else(malformed)?;
        let (user, pass) = credentials.split_once(':').ok_or_else(malformed)?;
        let (host, port) = address.split_once(':').ok_or_else(malformed)?;
        let port = port.parse().map_err(|_| malformed())?;

        Ok(Self { user: user.to_string(), pass: pass.to_string(), host: host.to_string(), port })
    }
}

impl fmt::Display for ProxyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}:{}", self.user, self.pass, self.host, self.port)
    }
}

/// Bounded reachability probe for parsed proxy descriptors.
///
/// Ordinary network failures never surface as errors here; the probe answers
/// reachable or unreachable. Only a descriptor the HTTP client itself rejects
/// is reported as an error.
#[derive(Debug, Clone)]
pub struct ProxyProber {
    target: Url,
}

impl ProxyProber {
    /// Create a prober that fetches the given target URL through each proxy.
    pub fn new(target: Url) -> Self {
        Self { target }
    }

    /// Probe the target through the given proxy, with up to three attempts
    /// spaced five seconds apart.
    pub async fn reachable(&self, proxy: &ProxyDescriptor) -> Result<bool, ProxyError> {
        let upstream =
            reqwest::Proxy::all(proxy.endpoint())?.basic_auth(&proxy.user, &proxy.pass);
        let client = reqwest::Client::builder()
            .proxy(upstream)
            .connect_timeout(PROBE_CONNECT_TIMEOUT)
            .build()?;

        for attempt in 1..=PROBE_ATTEMPTS {
            match client.get(self.target.clone()).send().await {
                Ok(response) => {
                    debug!(
                        proxy = %proxy.authority(),
                        status = response.status().as_u16(),
                        "Proxy probe succeeded"
                    );
                    return Ok(true);
                }
                Err(err) => {
                    warn!(proxy = %proxy.authority(), attempt, error = %err, "Proxy probe failed");
                }
            }

            if attempt < PROBE_ATTEMPTS {
                tokio::time::sleep(PROBE_DELAY).await;
            }
        }

        Ok(false)
    }
}
