use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::BridgeError;
use crate::events::DEFAULT_SAMPLES;

/// Configuration file structure for the bridge.
///
/// Holds connection settings for both ends of the bridge plus engine tuning.
/// Command-line flags override whatever is loaded from here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GoCD server connection
    #[serde(default)]
    pub gocd: GoCdConfig,

    /// Octane connection
    #[serde(default)]
    pub octane: OctaneConfig,

    /// Event correlation parameters
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GoCdConfig {
    /// GoCD server base URL (without `/go`)
    #[serde(default = "default_gocd_base_url")]
    pub base_url: String,

    /// User for basic authentication
    pub username: Option<String>,

    /// Password or access token for basic authentication
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct OctaneConfig {
    /// Octane UI URL including the `p=<shared space>/<workspace>` parameter
    pub server_url: Option<String>,

    /// API access client ID
    pub client_id: Option<String>,

    /// API access client secret
    pub client_secret: Option<String>,

    /// Identifier this GoCD instance reports itself under
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventsConfig {
    /// Number of recent successful runs used for duration estimates
    #[serde(default = "default_estimate_samples")]
    pub estimate_samples: usize,
}

impl Default for GoCdConfig {
    fn default() -> Self {
        Self {
            base_url: default_gocd_base_url(),
            username: None,
            password: None,
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            estimate_samples: default_estimate_samples(),
        }
    }
}

fn default_gocd_base_url() -> String {
    "http://localhost:8153".to_string()
}

fn default_estimate_samples() -> usize {
    DEFAULT_SAMPLES
}

/// Where to reach the Octane API, derived from its UI URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OctaneEndpoint {
    pub base_url: String,
    pub shared_space: String,
}

impl OctaneConfig {
    /// Derives the API base URL and shared space ID from `server_url`.
    ///
    /// `https://octane.example.com/ui/?p=1001/1002` yields base URL
    /// `https://octane.example.com` and shared space `1001`.
    pub fn endpoint(&self) -> crate::error::Result<OctaneEndpoint> {
        let server_url = self
            .server_url
            .as_deref()
            .ok_or_else(|| BridgeError::Config("Octane server URL is not set".to_string()))?;

        let context_end = server_url.find("/ui").ok_or_else(|| {
            BridgeError::Config(format!(
                "Octane URL '{server_url}' does not contain the '/ui' path"
            ))
        })?;
        let base_url = server_url[..context_end].to_string();

        let url = Url::parse(server_url)
            .map_err(|e| BridgeError::Config(format!("Could not parse Octane URL '{server_url}': {e}")))?;

        let spaces = url
            .query_pairs()
            .find(|(key, _)| key == "p")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| {
                BridgeError::Config(
                    "Octane URL must contain parameter p with IDs for shared space and workspace"
                        .to_string(),
                )
            })?;

        let shared_space = spaces.split('/').next().unwrap_or_default();
        if shared_space.is_empty() {
            return Err(BridgeError::Config(
                "Shared space ID must be present in parameter p".to_string(),
            ));
        }

        Ok(OctaneEndpoint {
            base_url,
            shared_space: shared_space.to_string(),
        })
    }
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./gocd-octane.toml
    /// 3. ./gocd-octane.json
    /// 4. ./gocd-octane.yaml
    /// 5. ./gocd-octane.yml
    /// 6. `<user config dir>/gocd-octane/config.toml`
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = [
            "gocd-octane.toml",
            "gocd-octane.json",
            "gocd-octane.yaml",
            "gocd-octane.yml",
        ];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(path) = user_config_path().filter(|p| p.exists()) {
            return Self::load_from_path(&path);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("gocd-octane").join("config.toml"))
}
