//! TOML configuration loading (spec.md §10.3/§11): bind address, named data
//! sources, and an optional routing table — the Rust-native counterpart of
//! the reference prototype's `DataSourceFactory` JSON config
//! (`demo/server/data_sources/factory.py`).

use std::path::Path;

use anyhow::{Context, Result};
use i3x_datasource::mqtt::MqttConfig;
use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Declaration order is preserved (an `IndexMap`, not a `HashMap`) so a
    /// config with no `data_source_routing.primary` still has a
    /// deterministic fallback order (spec.md §9 resolution 2).
    pub sources: IndexMap<String, SourceConfig>,
    #[serde(default)]
    pub data_source_routing: Option<i3x_manager::RoutingTable>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceConfig {
    Mock,
    CncMock,
    Mqtt(MqttConfig),
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        if config.sources.is_empty() {
            anyhow::bail!("config must declare at least one [sources.*] table");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_mock_source_parses() {
        let raw = r#"
            bind_addr = "0.0.0.0:9000"

            [sources.mock]
            type = "mock"
        "#;
        let config: ServerConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert!(matches!(config.sources["mock"], SourceConfig::Mock));
        assert!(config.data_source_routing.is_none());
    }

    #[test]
    fn multi_source_with_routing_parses() {
        let raw = r#"
            [sources.mock]
            type = "mock"

            [sources.plant-mqtt]
            type = "mqtt"
            host = "broker.local"
            topics = ["plant/#"]

            [data_source_routing]
            primary = "mock"
            get_instance = "plant-mqtt"
        "#;
        let config: ServerConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.sources.len(), 2);
        let routing = config.data_source_routing.unwrap();
        assert_eq!(routing.primary(), Some("mock".to_string()));
        assert_eq!(routing.preferred_for("get_instance"), Some("plant-mqtt".to_string()));
    }

    #[test]
    fn missing_sources_table_is_rejected() {
        let raw = "bind_addr = \"127.0.0.1:8080\"\n";
        assert!(toml::from_str::<ServerConfig>(raw).is_err());
    }
}
