use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::session::SwitchId;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub redirect: Option<RedirectConfig>,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub api: Option<ApiConfig>,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClassifierConfig {
    /// TCP destination port identifying video-relevant traffic.
    #[serde(default = "default_video_port")]
    pub video_port: u16,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            video_port: default_video_port(),
        }
    }
}

fn default_video_port() -> u16 {
    80
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedirectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub central_server: Ipv4Addr,
    pub edge_server: Ipv4Addr,
    /// Switch datapath id (as a string key) to edge-facing port number.
    #[serde(default)]
    pub edge_ports: HashMap<String, u32>,
}

fn default_true() -> bool {
    true
}

impl RedirectConfig {
    /// Edge ports keyed by parsed switch id.
    pub fn resolved_edge_ports(&self) -> Result<HashMap<SwitchId, u32>> {
        self.edge_ports
            .iter()
            .map(|(dpid, port)| {
                let id: u64 = dpid
                    .parse()
                    .with_context(|| format!("Invalid switch id in edge_ports: {:?}", dpid))?;
                Ok((SwitchId(id), *port))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_listen")]
    pub listen: SocketAddr,
}

fn default_api_listen() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub port: u16,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.stats.poll_interval_secs == 0 {
            anyhow::bail!("stats.poll_interval_secs must be at least 1");
        }

        if let Some(ref redirect) = self.redirect {
            if redirect.central_server == redirect.edge_server {
                anyhow::bail!("central_server and edge_server must differ");
            }
            // Fail early on unparsable switch ids rather than at first packet.
            redirect.resolved_edge_ports()?;
        }

        Ok(())
    }
}
