pub mod entry;
pub mod pool;

// Re-export common types
pub use entry::{ProxyEndpoint, UserAgent};
pub use pool::{IdentityPool, PoolEntry};

use anyhow::Result;
use tracing::info;

use crate::cli::config::IdentitySettings;

/// Proxies and user agents shared by every worker
#[derive(Debug)]
pub struct Identities {
    proxies: IdentityPool<ProxyEndpoint>,
    user_agents: IdentityPool<UserAgent>,
}

impl Identities {
    /// Pair two pools, refusing empty ones
    pub fn new(proxies: IdentityPool<ProxyEndpoint>, user_agents: IdentityPool<UserAgent>) -> Result<Self> {
        if proxies.is_empty() {
            anyhow::bail!("No proxies configured");
        }

        if user_agents.is_empty() {
            anyhow::bail!("No user agents configured");
        }

        Ok(Self { proxies, user_agents })
    }

    /// Load both pools from the configured list files
    pub fn load(settings: &IdentitySettings) -> Result<Self> {
        let proxies = IdentityPool::from_file(&settings.proxies)?;
        let user_agents = IdentityPool::from_file(&settings.user_agents)?;

        info!("Loaded {} proxies and {} user agents", proxies.len(), user_agents.len());

        Self::new(proxies, user_agents)
    }

    pub fn proxies(&self) -> &IdentityPool<ProxyEndpoint> {
        &self.proxies
    }

    pub fn user_agents(&self) -> &IdentityPool<UserAgent> {
        &self.user_agents
    }
}
