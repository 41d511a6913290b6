use crate::p2p::retry::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS};
use crate::p2p::{Backoff, PeerDirectory, PeerRecord, RetryPolicy};
use crate::Result;

use config::{Config, File, FileFormat};

use std::path::Path;
use std::time::Duration;

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL.as_millis() as u64
}

/// Optional `retry` section of the configuration file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub backoff: Backoff,
}

/// The shared cluster configuration. Files ending in `.json` are read as JSON, any other
/// path as YAML:
///
/// ```yaml
/// servers:
///   - serverId: 0
///     host: 127.0.0.1
///     port: "8000"
///   - serverId: 1
///     host: 127.0.0.1
///     port: "8001"
/// retry:
///   max_attempts: 100
///   interval_ms: 100
///   backoff: fixed
/// ```
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub servers: Vec<PeerRecord>,
    #[serde(default)]
    pub retry: Option<RetrySettings>,
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => FileFormat::Json,
            _ => FileFormat::Yaml,
        };
        let settings = Config::builder().add_source(File::from(path).format(format)).build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn directory(&self) -> Result<PeerDirectory> {
        PeerDirectory::from_records(self.servers.clone())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            Some(retry) => RetryPolicy::new(
                retry.max_attempts,
                Duration::from_millis(retry.interval_ms),
                retry.backoff,
            ),
            None => RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    fn load_named(name: &str, contents: &str) -> Settings {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::File::create(&path).unwrap().write_all(contents.as_bytes()).unwrap();
        Settings::load(&path).unwrap()
    }

    fn load(contents: &str) -> Settings {
        load_named("cluster.yaml", contents)
    }

    #[test]
    fn test_any_extension_is_yaml() {
        let contents = "servers:\n  - serverId: 4\n    host: localhost\n    port: \"8004\"\n";
        for name in ["cluster", "cluster.conf", "cluster.yml"].iter() {
            let settings = load_named(name, contents);
            assert_eq!(settings.servers, vec![PeerRecord::new(4, "localhost", 8004)]);
        }
    }

    #[test]
    fn test_json_extension() {
        let settings =
            load_named("cluster.JSON", r#"{"servers": [{"serverId": 1, "host": "h", "port": 1}]}"#);
        assert_eq!(settings.servers, vec![PeerRecord::new(1, "h", 1)]);
    }

    #[test]
    fn test_default_retry_policy() {
        let settings = load("servers:\n  - serverId: 0\n    host: localhost\n    port: 8000\n");
        assert_eq!(settings.retry, None);
        assert_eq!(settings.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_retry_section() {
        let settings = load(
            r#"
servers:
  - serverId: 0
    host: localhost
    port: 8000
retry:
  max_attempts: 5
  interval_ms: 20
  backoff: linear
"#,
        );
        assert_eq!(settings.retry_policy(), RetryPolicy::linear(5, Duration::from_millis(20)));
    }

    #[test]
    fn test_partial_retry_section() {
        let settings = load(
            "servers:\n  - serverId: 0\n    host: localhost\n    port: 8000\nretry:\n  max_attempts: 7\n",
        );
        assert_eq!(settings.retry_policy(), RetryPolicy::fixed(7, DEFAULT_INTERVAL));
    }
}
