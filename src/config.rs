use serde::Deserialize;

use crate::models::Upstream;

/// Environment variable holding the comma-separated upstream URL list.
pub const SERVERS_ENV: &str = "DHCPDS";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub hub: HubSettings,
    pub monitoring: MonitoringConfig,
    pub assets: AssetsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Upstream status URLs. Overridden by `DHCPDS` when that is set.
    pub servers: Vec<String>,
    pub interval_ms: u64,
    /// Per-request bound for a single probe.
    pub timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            interval_ms: 3000,
            timeout_ms: 4000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// Capacity of the record and command channels feeding the hub.
    pub command_capacity: usize,
    pub send_timeout_ms: u64,
    pub ping_interval_secs: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            command_capacity: 64,
            send_timeout_ms: 10_000,
            ping_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// How often to log app stats (clients, servers, merges) at INFO level.
    pub stats_log_interval_secs: u64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            stats_log_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Directory served for every GET that is not an API or WebSocket route.
    pub dir: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            dir: "public".into(),
        }
    }
}

impl AppConfig {
    /// Load `CONFIG_FILE` (default `config.toml`; a missing default file means built-in
    /// defaults), apply `DHCPDS`, then validate.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var("CONFIG_FILE").ok();
        let path = explicit.clone().unwrap_or_else(|| "config.toml".into());
        let mut config: AppConfig = match std::fs::read_to_string(&path) {
            Ok(s) => toml::from_str(&s)?,
            Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
                AppConfig::default()
            }
            Err(e) => return Err(anyhow::anyhow!("reading {}: {}", path, e)),
        };
        if let Ok(list) = std::env::var(SERVERS_ENV) {
            config.set_servers_from_list(&list);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Replace the upstream list with a comma-separated one; blank entries are dropped.
    pub fn set_servers_from_list(&mut self, list: &str) {
        self.polling.servers = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }

    /// Parsed upstreams, in configured order.
    pub fn upstreams(&self) -> anyhow::Result<Vec<Upstream>> {
        self.polling
            .servers
            .iter()
            .map(|s| Upstream::parse(s))
            .collect()
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.polling.servers.is_empty(),
            "polling.servers is empty; set {} to a comma-separated list of dhcpd status URLs",
            SERVERS_ENV
        );
        if let Err(e) = self.upstreams() {
            anyhow::bail!("polling.servers contains an invalid URL: {}", e);
        }
        anyhow::ensure!(
            self.polling.interval_ms > 0,
            "polling.interval_ms must be > 0, got {}",
            self.polling.interval_ms
        );
        anyhow::ensure!(
            self.polling.timeout_ms > 0,
            "polling.timeout_ms must be > 0, got {}",
            self.polling.timeout_ms
        );
        anyhow::ensure!(
            self.hub.command_capacity > 0,
            "hub.command_capacity must be > 0, got {}",
            self.hub.command_capacity
        );
        anyhow::ensure!(
            self.hub.send_timeout_ms > 0,
            "hub.send_timeout_ms must be > 0, got {}",
            self.hub.send_timeout_ms
        );
        anyhow::ensure!(
            self.hub.ping_interval_secs > 0,
            "hub.ping_interval_secs must be > 0, got {}",
            self.hub.ping_interval_secs
        );
        anyhow::ensure!(
            self.monitoring.stats_log_interval_secs > 0,
            "monitoring.stats_log_interval_secs must be > 0, got {}",
            self.monitoring.stats_log_interval_secs
        );
        Ok(())
    }

    pub fn hub_config(&self) -> crate::hub::HubConfig {
        use std::time::Duration;
        crate::hub::HubConfig {
            command_capacity: self.hub.command_capacity,
            send_timeout: Duration::from_millis(self.hub.send_timeout_ms),
            ping_interval: Duration::from_secs(self.hub.ping_interval_secs),
            stats_log_interval: Duration::from_secs(self.monitoring.stats_log_interval_secs),
        }
    }
}
