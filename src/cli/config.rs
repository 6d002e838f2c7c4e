use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use tracing::{info, debug};

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HarvesterConfig {
    pub harvest: HarvestSettings,
    pub identity: IdentitySettings,
    pub storage: StorageSettings,
}

/// Range and pipeline settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HarvestSettings {
    pub index_starting: u64,
    pub index_final: u64,
    pub worker_count: usize,
    pub page_base_url: String,
    pub request_timeout_secs: u64,
}

/// Identity list files
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IdentitySettings {
    pub proxies: PathBuf,
    pub user_agents: PathBuf,
}

/// Where downloaded images go
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StorageSettings {
    pub images: PathBuf,
}

/// Values given on the command line, applied over the loaded file
#[derive(Debug, Default, Clone)]
pub struct HarvestOverrides {
    pub index_starting: Option<u64>,
    pub index_final: Option<u64>,
    pub worker_count: Option<usize>,
    pub images: Option<PathBuf>,
    pub proxies: Option<PathBuf>,
    pub user_agents: Option<PathBuf>,
}

impl HarvestOverrides {
    pub fn apply(self, config: &mut HarvesterConfig) {
        if let Some(start) = self.index_starting {
            config.harvest.index_starting = start;
        }

        if let Some(end) = self.index_final {
            config.harvest.index_final = end;
        }

        if let Some(workers) = self.worker_count {
            config.harvest.worker_count = workers;
        }

        if let Some(images) = self.images {
            config.storage.images = images;
        }

        if let Some(proxies) = self.proxies {
            config.identity.proxies = proxies;
        }

        if let Some(user_agents) = self.user_agents {
            config.identity.user_agents = user_agents;
        }
    }
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            harvest: HarvestSettings {
                index_starting: 1355412729,
                index_final: 1355412729,
                worker_count: 10,
                page_base_url: "https://prnt.sc/".to_string(),
                request_timeout_secs: 120,
            },
            identity: IdentitySettings {
                proxies: PathBuf::from("proxies.csv"),
                user_agents: PathBuf::from("user-agents.csv"),
            },
            storage: StorageSettings {
                images: PathBuf::from("images"),
            },
        }
    }
}

impl HarvesterConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "shot-harvester", "shot-harvester") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        }
    }

    /// Location of the default configuration file
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Load the default configuration file, or built-in defaults when absent
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_path();

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("No configuration at {}, using built-in defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Reject settings no run could use
    pub fn validate(&self) -> Result<()> {
        if self.harvest.worker_count == 0 {
            anyhow::bail!("worker_count must be at least 1");
        }

        if self.harvest.index_final < self.harvest.index_starting {
            anyhow::bail!(
                "index_final ({}) is below index_starting ({})",
                self.harvest.index_final,
                self.harvest.index_starting
            );
        }

        if self.harvest.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }

        Ok(())
    }
}
