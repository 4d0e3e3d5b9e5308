use serde::{Deserialize, Serialize};

use crate::{common::types::AnyResult, configs::*};

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn load() -> AnyResult<Self> {
        let config_path = if std::path::Path::new("config.toml").exists() {
            "config.toml"
        } else if std::path::Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err("config.toml or config.default.toml not found".into());
        };

        crate::log_println!("Loading configuration from: {}", config_path);

        let config_str = std::fs::read_to_string(config_path)?;
        Self::parse(&config_str).map_err(|e| format!("{}: {}", config_path, e).into())
    }

    pub fn parse(config_str: &str) -> AnyResult<Self> {
        if config_str.trim().is_empty() {
            return Err("configuration is empty".into());
        }
        Ok(toml::from_str(config_str)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fills_section_defaults() {
        let config = Config::parse("[server]\nhost = \"127.0.0.1\"\nport = 9000\n")
            .expect("config should parse");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.bridge.desktop_url, "ws://localhost:5672");
        assert_eq!(config.catalog.search_limit, 2);
        assert!((config.player.default_volume - 0.6).abs() < f32::EPSILON);
        assert!(config.logging.is_none());
    }

    #[test]
    fn test_parse_rejects_empty_input() {
        assert!(Config::parse("   \n").is_err());
    }

    #[test]
    fn test_parse_logging_file_section() {
        let config = Config::parse(
            "[logging]\nlevel = \"debug\"\n[logging.file]\npath = \"logs/player.log\"\n",
        )
        .expect("config should parse");

        let file = config.logging.and_then(|l| l.file).expect("file section");
        assert_eq!(file.path, "logs/player.log");
        assert_eq!(file.max_lines, 10_000);
    }
}
