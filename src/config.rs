//! Configuration file for amtctl
//!
//! Host profiles and defaults are read from TOML files, checked in order:
//! - Explicit path (`--config` or `AMTCTL_CONFIG`), used alone when given
//! - System configuration (/etc/amtctl/amtctl.toml)
//! - User configuration (<config dir>/amtctl/amtctl.toml)
//! - Project configuration (./amtctl.toml)
//!
//! Later files override earlier ones. Command-line credentials override both.
//!
//! ```toml
//! [defaults]
//! username = "admin"
//! timeout = "30s"
//! wakeup_interval = "60s"
//! insecure = false
//!
//! [hosts.lab1]
//! host = "https://10.0.0.5:16993"
//! password = "secret"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::wsman::ConnectionConfig;

/// File name looked up in each configuration directory
pub const CONFIG_FILE_NAME: &str = "amtctl.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Settings applied to every host
    pub defaults: Defaults,

    /// Named host profiles
    pub hosts: BTreeMap<String, HostProfile>,
}

/// Settings applied to every host unless a profile overrides them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Defaults {
    /// Login name
    pub username: Option<String>,

    /// Password
    pub password: Option<String>,

    /// HTTP request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Idle time after which a host is probed before the next request
    #[serde(with = "humantime_serde")]
    pub wakeup_interval: Option<Duration>,

    /// Accept self-signed TLS certificates
    pub insecure: Option<bool>,
}

/// A named host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostProfile {
    /// `[scheme://]host[:port]`
    pub host: String,

    /// Login name
    #[serde(default)]
    pub username: Option<String>,

    /// Password
    #[serde(default)]
    pub password: Option<String>,

    /// Accept self-signed TLS certificates
    #[serde(default)]
    pub insecure: Option<bool>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--username`
    pub username: Option<String>,
    /// `--password`
    pub password: Option<String>,
    /// `--insecure`
    pub insecure: bool,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Config::default().merge_from_file(path);
        }

        let mut config = Config::default();
        for path in Self::search_paths() {
            if path.is_file() {
                config = config.merge_from_file(&path)?;
            }
        }
        Ok(config)
    }

    /// Standard locations, lowest precedence first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/amtctl").join(CONFIG_FILE_NAME)];

        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("amtctl").join(CONFIG_FILE_NAME));
        }

        paths.push(PathBuf::from(CONFIG_FILE_NAME));
        paths
    }

    /// Parse a configuration document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    fn merge_from_file(self, path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration file");
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let file_config = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        Ok(self.merge(file_config))
    }

    /// Merge another config into this one, `other` taking precedence
    pub fn merge(self, other: Config) -> Config {
        let mut hosts = self.hosts;
        hosts.extend(other.hosts);

        Config {
            defaults: Defaults {
                username: other.defaults.username.or(self.defaults.username),
                password: other.defaults.password.or(self.defaults.password),
                timeout: other.defaults.timeout.or(self.defaults.timeout),
                wakeup_interval: other
                    .defaults
                    .wakeup_interval
                    .or(self.defaults.wakeup_interval),
                insecure: other.defaults.insecure.or(self.defaults.insecure),
            },
            hosts,
        }
    }

    /// Build the connection for `target`.
    ///
    /// `target` is a profile name, `@name` to insist on a profile, or a
    /// `[scheme://]host[:port]` spec.
    pub fn resolve(&self, target: &str, overrides: &Overrides) -> Result<ConnectionConfig> {
        let profile = match target.strip_prefix('@') {
            Some(name) => Some(
                self.hosts
                    .get(name)
                    .ok_or_else(|| Error::UnknownProfile(name.to_string()))?,
            ),
            None => self.hosts.get(target),
        };

        let spec = profile.map_or(target, |p| p.host.as_str());

        let username = overrides
            .username
            .clone()
            .or_else(|| profile.and_then(|p| p.username.clone()))
            .or_else(|| self.defaults.username.clone())
            .ok_or_else(|| Error::Config(format!("no username configured for '{}'", target)))?;
        let password = overrides
            .password
            .clone()
            .or_else(|| profile.and_then(|p| p.password.clone()))
            .or_else(|| self.defaults.password.clone())
            .ok_or_else(|| Error::Config(format!("no password configured for '{}'", target)))?;

        let insecure = overrides.insecure
            || profile
                .and_then(|p| p.insecure)
                .or(self.defaults.insecure)
                .unwrap_or(false);

        let mut config =
            ConnectionConfig::parse(spec, &username, &password)?.with_accept_invalid_certs(insecure);
        if let Some(timeout) = self.defaults.timeout {
            config = config.with_request_timeout(timeout);
        }
        if let Some(interval) = self.defaults.wakeup_interval {
            config = config.with_wakeup_interval(interval);
        }

        debug!(host = target, endpoint = %config.endpoint(), profile = profile.is_some(), "Resolved host");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wsman::Scheme;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const SAMPLE: &str = r#"
[defaults]
username = "admin"
timeout = "10s"
wakeup_interval = "2m"

[hosts.lab1]
host = "https://10.0.0.5:16993"
password = "secret"
insecure = true

[hosts.lab2]
host = "10.0.0.6"
username = "operator"
password = "hunter2"
"#;

    fn creds(username: Option<&str>, password: Option<&str>) -> Overrides {
        Overrides {
            username: username.map(str::to_string),
            password: password.map(str::to_string),
            insecure: false,
        }
    }

    #[test]
    fn test_parse_sample() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(config.defaults.username.as_deref(), Some("admin"));
        assert_eq!(config.defaults.timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.defaults.wakeup_interval, Some(Duration::from_secs(120)));
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.hosts["lab1"].insecure, Some(true));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Config::from_toml("[defaults]\nuser = \"admin\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_resolve_profile() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let conn = config.resolve("lab1", &Overrides::default()).unwrap();

        assert_eq!(conn.host, "10.0.0.5");
        assert_eq!(conn.port, 16993);
        assert_eq!(conn.scheme, Scheme::Https);
        assert_eq!(conn.username, "admin");
        assert_eq!(conn.password, "secret");
        assert!(conn.accept_invalid_certs);
        assert_eq!(conn.request_timeout, Duration::from_secs(10));
        assert_eq!(conn.wakeup_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_credential_precedence() {
        let config = Config::from_toml(SAMPLE).unwrap();

        let conn = config.resolve("lab2", &Overrides::default()).unwrap();
        assert_eq!(conn.username, "operator");

        let conn = config
            .resolve("lab2", &creds(Some("root"), Some("pw")))
            .unwrap();
        assert_eq!(conn.username, "root");
        assert_eq!(conn.password, "pw");
    }

    #[test]
    fn test_resolve_plain_host_spec() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let conn = config
            .resolve("192.168.1.20", &creds(None, Some("pw")))
            .unwrap();

        assert_eq!(conn.host, "192.168.1.20");
        assert_eq!(conn.port, 16992);
        assert_eq!(conn.username, "admin");
        assert!(!conn.accept_invalid_certs);
    }

    #[test]
    fn test_resolve_missing_credentials() {
        let config = Config::default();
        let err = config
            .resolve("192.168.1.20", &creds(None, Some("pw")))
            .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("username")));

        let err = config
            .resolve("192.168.1.20", &creds(Some("admin"), None))
            .unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("password")));
    }

    #[test]
    fn test_resolve_explicit_unknown_profile() {
        let config = Config::from_toml(SAMPLE).unwrap();
        assert_eq!(
            config.resolve("@lab9", &Overrides::default()).unwrap_err(),
            Error::UnknownProfile("lab9".to_string())
        );
    }

    #[test]
    fn test_merge_prefers_later() {
        let base = Config::from_toml(SAMPLE).unwrap();
        let other = Config::from_toml(
            "[defaults]\nusername = \"root\"\n\n[hosts.lab1]\nhost = \"10.0.0.50\"\n",
        )
        .unwrap();

        let merged = base.merge(other);
        assert_eq!(merged.defaults.username.as_deref(), Some("root"));
        assert_eq!(merged.defaults.timeout, Some(Duration::from_secs(10)));
        assert_eq!(merged.hosts["lab1"].host, "10.0.0.50");
        assert!(merged.hosts.contains_key("lab2"));
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert!(config.hosts.contains_key("lab1"));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("failed to read")));
    }
}
