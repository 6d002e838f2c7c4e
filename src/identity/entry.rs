use anyhow::{Result, Context};
use std::fmt;
use url::Url;

use super::pool::PoolEntry;

/// Proxy the worker routes its requests through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEndpoint(Url);

impl ProxyEndpoint {
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Build the reqwest proxy applying to every scheme
    pub fn to_proxy(&self) -> reqwest::Result<reqwest::Proxy> {
        reqwest::Proxy::all(self.0.as_str())
    }
}

impl PoolEntry for ProxyEndpoint {
    /// Records are usually bare `host:port`, which are taken as HTTP proxies
    fn from_record(field: &str) -> Result<Self> {
        let raw = field.trim();
        let candidate = if raw.contains("://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };

        let url = Url::parse(&candidate)
            .context(format!("Invalid proxy address: {}", raw))?;

        Ok(Self(url))
    }
}

impl fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let url = self.url();
        match url.port() {
            Some(port) => write!(f, "{}:{}", url.host_str().unwrap_or_default(), port),
            None => write!(f, "{}", url.host_str().unwrap_or_default()),
        }
    }
}

/// User agent header value sent with every request of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent(String);

impl UserAgent {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PoolEntry for UserAgent {
    fn from_record(field: &str) -> Result<Self> {
        Ok(Self(field.to_string()))
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
