use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: u32,
    pub store: StoreConfig,
    /// Absent section means fingerprints stay generator placeholders.
    pub content_store: Option<ContentStoreConfig>,
    pub http: HttpConfig,
    pub public_endpoint: PublicEndpoint,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.to_string_lossy()))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }
}

/// Directory owned by one certificate store.
///
/// Holds the `tracks.json` index and the `certificates/` snapshot directory.
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentStoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

/// Base url under which certificates are reachable from outside
#[derive(Debug, Deserialize, Clone)]
pub struct PublicEndpoint {
    pub base_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_parse_config_toml() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[store]
dir = "/var/lib/trackvault"

[content_store]
path = "/var/lib/trackvault/blobs"

[http]
bind_addr = "127.0.0.1"
port = 4000
max_upload_bytes = 1024

[public_endpoint]
base_url = "http://localhost:4000"
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.store.dir, PathBuf::from("/var/lib/trackvault"));
        assert_eq!(
            cfg.content_store.map(|c| c.path),
            Some(PathBuf::from("/var/lib/trackvault/blobs"))
        );
        assert_eq!(cfg.http.port, 4000);
        assert_eq!(cfg.http.max_upload_bytes, 1024);
        assert_eq!(cfg.public_endpoint.base_url, "http://localhost:4000");

        Ok(())
    }

    #[test]
    fn test_parse_config_without_content_store() -> anyhow::Result<()> {
        let toml_str = r#"
version = 1

[store]
dir = "vault"

[http]
bind_addr = "0.0.0.0"
port = 8080

[public_endpoint]
base_url = "http://vault.local:8080/"
"#;

        let cfg: Config = toml::from_str(toml_str)?;

        assert!(cfg.content_store.is_none());
        assert_eq!(cfg.http.max_upload_bytes, default_max_upload_bytes());
        assert_eq!(cfg.store.dir, PathBuf::from("vault"));

        Ok(())
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
