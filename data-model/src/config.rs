//! Data model configuration format.

use crate::{common::*, load::DefaultLoader};

/// The data model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub loader: LoaderConfig,
    /// The device records are moved to by default.
    #[serde(with = "tch_serde::serde_device", default = "default_device")]
    pub device: Device,
}

impl Config {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let text = std::fs::read_to_string(path)?;
        let config = json5::from_str(&text)?;
        Ok(config)
    }

    /// Builds the content loader described by the configuration.
    pub fn loader(&self) -> DefaultLoader {
        DefaultLoader::new(self.loader.clone())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loader: LoaderConfig::default(),
            device: default_device(),
        }
    }
}

/// Options of the default content loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// The directory relative file paths are resolved against.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Whether http and https locations may be fetched.
    #[serde(default = "default_allow_remote")]
    pub allow_remote: bool,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            allow_remote: default_allow_remote(),
            http_timeout_secs: default_http_timeout_secs(),
            user_agent: None,
        }
    }
}

/// Parses `cpu`, `cuda` or `cuda:N`.
pub fn parse_device(text: &str) -> Result<Device> {
    let device = match text.trim() {
        "cpu" => Device::Cpu,
        "cuda" => Device::Cuda(0),
        text => {
            let index = text
                .strip_prefix("cuda:")
                .and_then(|index| index.parse::<usize>().ok())
                .ok_or_else(|| {
                    DataModelError::validation("device", format!("invalid device '{}'", text))
                })?;
            Device::Cuda(index)
        }
    };
    Ok(device)
}

fn default_device() -> Device {
    Device::Cpu
}

fn default_allow_remote() -> bool {
    true
}

fn default_http_timeout_secs() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn open_json5_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                // resolved against relative paths
                loader: {{
                    data_dir: "/data/docs",
                    allow_remote: false,
                }},
            }}"#
        )
        .unwrap();

        let config = Config::open(file.path()).unwrap();
        assert_eq!(config.loader.data_dir, Some(PathBuf::from("/data/docs")));
        assert!(!config.loader.allow_remote);
        assert_eq!(config.loader.http_timeout_secs, 30);
        assert_eq!(config.device, Device::Cpu);
    }

    #[test]
    fn device_round_trip() {
        let config = Config {
            device: Device::Cuda(1),
            ..Config::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        let restored: Config = serde_json::from_str(&text).unwrap();
        assert_eq!(restored.device, Device::Cuda(1));
    }

    #[test]
    fn parse_device_strings() {
        assert_eq!(parse_device("cpu").unwrap(), Device::Cpu);
        assert_eq!(parse_device("cuda").unwrap(), Device::Cuda(0));
        assert_eq!(parse_device("cuda:2").unwrap(), Device::Cuda(2));
        assert!(parse_device("tpu").is_err());
        assert!(parse_device("cuda:x").is_err());
    }
}
