//! Configuration schema and loader for the storage container manager.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScmConfig {
    /// gRPC listen address.
    pub listen: SocketAddr,

    /// Container registry settings.
    #[serde(default)]
    pub containers: ContainerConfig,

    /// Optional Prometheus metrics HTTP port.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Id handed to the first allocated container.
    #[serde(default = "default_first_container_id")]
    pub first_container_id: i64,

    /// Most containers returned by a single list request.
    #[serde(default = "default_max_list_count")]
    pub max_list_count: u32,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            first_container_id: default_first_container_id(),
            max_list_count: default_max_list_count(),
        }
    }
}

// --- Defaults ---

fn default_first_container_id() -> i64 {
    1
}
fn default_max_list_count() -> u32 {
    1000
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ScmConfig {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.containers.first_container_id < 0 {
            return Err(ConfigError::Invalid(format!(
                "containers.first_container_id ({}) must be >= 0",
                self.containers.first_container_id
            )));
        }
        if self.containers.max_list_count == 0 {
            return Err(ConfigError::Invalid(
                "containers.max_list_count must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load a `ScmConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<ScmConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load a `ScmConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<ScmConfig, ConfigError> {
    let config: ScmConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
listen: "127.0.0.1:9860"
"#;
        let config = load_from_str(yaml).unwrap();
        assert_eq!(config.listen.port(), 9860);
        assert_eq!(config.containers.first_container_id, 1);
        assert_eq!(config.containers.max_list_count, 1000);
        assert_eq!(config.metrics_port, None);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listen: "0.0.0.0:9860"
metrics_port: 9877
containers:
  first_container_id: 500
  max_list_count: 25
"#;
        let config = load_from_str(yaml).unwrap();
        assert_eq!(config.metrics_port, Some(9877));
        assert_eq!(config.containers.first_container_id, 500);
        assert_eq!(config.containers.max_list_count, 25);
    }

    #[test]
    fn test_roundtrip_yaml() {
        let config = load_from_str("listen: \"127.0.0.1:9000\"\n").unwrap();
        let serialized = serde_yaml::to_string(&config).unwrap();
        let config2 = load_from_str(&serialized).unwrap();
        assert_eq!(config.listen, config2.listen);
        assert_eq!(
            config.containers.max_list_count,
            config2.containers.max_list_count
        );
    }

    #[test]
    fn test_rejects_negative_first_id() {
        let yaml = r#"
listen: "127.0.0.1:9860"
containers:
  first_container_id: -1
"#;
        let err = load_from_str(yaml).unwrap_err().to_string();
        assert!(
            err.contains("first_container_id"),
            "error should mention first_container_id: {}",
            err
        );
    }

    #[test]
    fn test_rejects_zero_list_count() {
        let yaml = r#"
listen: "127.0.0.1:9860"
containers:
  max_list_count: 0
"#;
        let err = load_from_str(yaml).unwrap_err().to_string();
        assert!(err.contains("max_list_count"), "got: {}", err);
    }

    #[test]
    fn test_rejects_bad_listen_address() {
        let result = load_from_str("listen: \"nowhere\"\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "listen: \"127.0.0.1:9861\"").unwrap();
        let config = load_from_file(file.path()).unwrap();
        assert_eq!(config.listen.port(), 9861);

        let missing = load_from_file(std::path::Path::new("/nonexistent/scm.yaml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}
