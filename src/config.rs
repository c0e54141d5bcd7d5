use std::{fs::read_to_string, net::SocketAddr, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::cache::scheduler::RefreshIntervals;
use crate::osm::download::{DEFAULT_OVERPASS_QUERY, DEFAULT_OVERPASS_URL};
use crate::pota::download::DEFAULT_CSV_URL;

/// Service configuration, read from a YAML file. Every field is optional.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub listen_address: SocketAddr,
    pub csv_url: String,
    pub overpass_url: String,
    pub overpass_query: String,
    pub csv_refresh_interval_secs: u64,
    pub osm_refresh_interval_secs: u64,
    /// Timeout of upstream requests. Without it, a hung upstream stalls only its refresh job.
    pub request_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 5005)),
            csv_url: DEFAULT_CSV_URL.to_string(),
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            overpass_query: DEFAULT_OVERPASS_QUERY.to_string(),
            csv_refresh_interval_secs: 60 * 60,
            osm_refresh_interval_secs: 5 * 60,
            request_timeout_secs: None,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    pub fn from_file(filepath: &Path) -> anyhow::Result<Self> {
        if !filepath.exists() {
            return Err(anyhow!("Config file {:?} not found", filepath));
        }
        let config_contents = read_to_string(filepath)
            .with_context(|| format!("Reading config file {:?}", filepath))?;
        let config: Config = serde_yaml::from_str(&config_contents)
            .with_context(|| format!("Parsing config file {:?}", filepath))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.csv_refresh_interval_secs == 0 || self.osm_refresh_interval_secs == 0 {
            return Err(anyhow!("Refresh intervals must be at least one second"));
        }
        Ok(())
    }

    pub fn refresh_intervals(&self) -> RefreshIntervals {
        RefreshIntervals {
            parks: Duration::from_secs(self.csv_refresh_interval_secs),
            osm: Duration::from_secs(self.osm_refresh_interval_secs),
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
