use std::net::Ipv4Addr;
use std::path::Path;

use anyhow::{Context, Result, bail};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_address")]
    pub listen_address: Ipv4Addr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// CIDR range the pool hands addresses out of.
    #[serde(default = "default_pool")]
    pub pool: String,
    /// CIDR of the served subnet; the pool must sit inside it.
    #[serde(default = "default_subnet")]
    pub subnet: String,
    #[serde(default = "default_gateway")]
    pub gateway: Ipv4Addr,
    #[serde(default = "default_dns")]
    pub dns: Ipv4Addr,
    #[serde(default = "default_server_ip")]
    pub server_ip: Ipv4Addr,
}

fn default_listen_address() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_port() -> u16 {
    67
}

fn default_pool() -> String {
    "192.168.1.64/26".to_string()
}

fn default_subnet() -> String {
    "192.168.1.0/24".to_string()
}

fn default_gateway() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, 1)
}

fn default_dns() -> Ipv4Addr {
    Ipv4Addr::new(8, 8, 8, 8)
}

fn default_server_ip() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 1, 1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            port: default_port(),
            pool: default_pool(),
            subnet: default_subnet(),
            gateway: default_gateway(),
            dns: default_dns(),
            server_ip: default_server_ip(),
        }
    }
}

impl Config {
    /// Load from a JSON file; a missing file means defaults, a malformed
    /// one is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config from {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse config from {}", path.display()))
        } else {
            info!("no config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn pool_net(&self) -> Result<Ipv4Net> {
        self.pool
            .parse()
            .with_context(|| format!("invalid pool CIDR {:?}", self.pool))
    }

    pub fn subnet_net(&self) -> Result<Ipv4Net> {
        self.subnet
            .parse()
            .with_context(|| format!("invalid subnet CIDR {:?}", self.subnet))
    }

    /// Startup sanity checks; failures here terminate before serving begins.
    pub fn validate(&self) -> Result<()> {
        let pool = self.pool_net()?;
        let subnet = self.subnet_net()?;

        if !subnet.contains(&pool) {
            bail!("pool {} is not inside subnet {}", pool, subnet);
        }
        if pool.contains(&self.server_ip) {
            bail!("server_ip {} must not be inside the pool range", self.server_ip);
        }
        if pool.contains(&self.gateway) {
            bail!("gateway {} must not be inside the pool range", self.gateway);
        }
        if !subnet.contains(&self.gateway) {
            bail!("gateway {} is outside subnet {}", self.gateway, subnet);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, 67);
        assert_eq!(config.pool, "192.168.1.64/26");
    }

    #[test]
    fn test_default_matches_empty_json() {
        let from_json: Config = serde_json::from_str("{}").unwrap();
        let default = Config::default();
        assert_eq!(default.listen_address, from_json.listen_address);
        assert_eq!(default.port, from_json.port);
        assert_eq!(default.pool, from_json.pool);
        assert_eq!(default.subnet, from_json.subnet);
        assert_eq!(default.gateway, from_json.gateway);
        assert_eq!(default.dns, from_json.dns);
        assert_eq!(default.server_ip, from_json.server_ip);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "pool": "10.0.0.64/26",
            "subnet": "10.0.0.0/24",
            "gateway": "10.0.0.1",
            "server_ip": "10.0.0.1"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.pool, "10.0.0.64/26");
        assert_eq!(config.port, 67);
        assert_eq!(config.dns, Ipv4Addr::new(8, 8, 8, 8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_cidr_fails_validation() {
        let config = Config {
            pool: "not-a-cidr".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_outside_subnet_fails_validation() {
        let config = Config {
            pool: "172.16.0.0/26".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_server_inside_pool_fails_validation() {
        let config = Config {
            server_ip: Ipv4Addr::new(192, 168, 1, 70),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
