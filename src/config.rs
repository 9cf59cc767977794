//! The `ftp.*` configuration keys and their defaults.

use crate::options::{self, PassiveHost};
use serde::{Deserialize, Serialize};
use std::{fs, ops::RangeInclusive, path::Path, path::PathBuf, time::Duration};
use thiserror::Error;

/// Error returned when configuration can not be read or does not make sense.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("could not read configuration")]
    Io(#[from] std::io::Error),
    /// The configuration is not valid JSON or has values of the wrong type.
    #[error("could not parse configuration")]
    Parse(#[from] serde_json::Error),
    /// A URL key does not hold an `ftp://host:port` URL.
    #[error("{key} is not a valid ftp URL: '{url}'")]
    InvalidUrl {
        /// The offending key
        key: &'static str,
        /// Its value
        url: String,
    },
    /// `ftp.hostname` is set but there is nowhere to get its certificate from.
    #[error("ftp.hostname is '{hostname}' but no certificate resolver was given")]
    NoCertificateResolver {
        /// The configured hostname
        hostname: String,
    },
    /// `ftp.pasv_min` is above `ftp.pasv_max`.
    #[error("passive port range {min}-{max} is empty")]
    PassiveRange {
        /// Lower bound
        min: u16,
        /// Upper bound
        max: u16,
    },
}

/// Server configuration, read from the dotted `ftp.*` keys.
///
/// ```
/// let config = ftpgate::Config::from_json(r#"{"ftp.url": "ftp://0.0.0.0:2121", "ftp.hostname": "ftp.example.com"}"#).unwrap();
/// assert_eq!(config.pasv_min, 30000);
/// assert_eq!(config.bind_address().unwrap(), "0.0.0.0:2121");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the control connection listens
    #[serde(rename = "ftp.url")]
    pub url: String,
    /// The host advertised for passive data connections
    #[serde(rename = "ftp.pasv_url")]
    pub pasv_url: String,
    /// Lowest passive port
    #[serde(rename = "ftp.pasv_min")]
    pub pasv_min: u16,
    /// Highest passive port
    #[serde(rename = "ftp.pasv_max")]
    pub pasv_max: u16,
    /// Sent to clients after connecting
    #[serde(rename = "ftp.greeting")]
    pub greeting: String,
    /// Whether anonymous logins are allowed
    #[serde(rename = "ftp.anonymous")]
    pub anonymous: bool,
    /// Hostname certificate material is resolved for. Without it the server runs plaintext.
    #[serde(rename = "ftp.hostname")]
    pub hostname: Option<String>,
    /// Seconds a login may take before it counts as failed
    #[serde(rename = "ftp.login_timeout")]
    pub login_timeout: u64,
    /// Milliseconds every failed login is delayed by
    #[serde(rename = "ftp.failed_login_delay_ms")]
    pub failed_login_delay_ms: u64,
    /// Seconds an idle session is kept open by the protocol engine
    #[serde(rename = "ftp.idle_session_timeout")]
    pub idle_session_timeout: u64,
    /// Seconds each certificate authority round-trip may take
    #[serde(rename = "ftp.certificate_timeout")]
    pub certificate_timeout: u64,
    /// Directory that provisioned home directories are created under
    #[serde(rename = "ftp.provision_root")]
    pub provision_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            url: options::DEFAULT_URL.to_string(),
            pasv_url: options::DEFAULT_PASV_URL.to_string(),
            pasv_min: options::DEFAULT_PASV_MIN,
            pasv_max: options::DEFAULT_PASV_MAX,
            greeting: options::DEFAULT_GREETING.to_string(),
            anonymous: false,
            hostname: None,
            login_timeout: options::DEFAULT_LOGIN_TIMEOUT_SECS,
            failed_login_delay_ms: options::DEFAULT_FAILED_LOGIN_DELAY_MS,
            idle_session_timeout: options::DEFAULT_IDLE_SESSION_TIMEOUT_SECS,
            certificate_timeout: options::DEFAULT_CERTIFICATE_TIMEOUT_SECS,
            provision_root: PathBuf::from(options::DEFAULT_PROVISION_ROOT),
        }
    }
}

impl Config {
    /// Reads configuration from a JSON file. Absent keys take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        Config::from_json(&fs::read_to_string(path)?)
    }

    /// Reads configuration from a JSON object. Absent keys take their defaults.
    pub fn from_json(json: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values that serde can not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pasv_min > self.pasv_max {
            return Err(ConfigError::PassiveRange {
                min: self.pasv_min,
                max: self.pasv_max,
            });
        }
        split_url("ftp.url", &self.url)?;
        split_url("ftp.pasv_url", &self.pasv_url)?;
        Ok(())
    }

    /// The `host:port` the control listener binds to.
    pub fn bind_address(&self) -> Result<String, ConfigError> {
        let (host, port) = split_url("ftp.url", &self.url)?;
        Ok(format!("{host}:{port}"))
    }

    /// How the passive address is advertised, from the host part of `ftp.pasv_url`.
    pub fn passive_host(&self) -> Result<PassiveHost, ConfigError> {
        let (host, _) = split_url("ftp.pasv_url", &self.pasv_url)?;
        Ok(PassiveHost::from(host.trim_start_matches('[').trim_end_matches(']')))
    }

    /// The passive port range, both ends included.
    pub fn passive_ports(&self) -> RangeInclusive<u16> {
        self.pasv_min..=self.pasv_max
    }

    /// Login round-trip timeout.
    pub fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout)
    }

    /// Delay applied to every failed login.
    pub fn failed_login_delay(&self) -> Duration {
        Duration::from_millis(self.failed_login_delay_ms)
    }

    /// Idle timeout passed on to the protocol engine.
    pub fn idle_session_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_session_timeout)
    }

    /// Certificate authority round-trip timeout.
    pub fn certificate_timeout(&self) -> Duration {
        Duration::from_secs(self.certificate_timeout)
    }
}

// Splits `ftp://host:port/` into its host and port. The port defaults to 21.
fn split_url(key: &'static str, url: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::InvalidUrl { key, url: url.to_string() };
    let rest = url.strip_prefix("ftp://").or_else(|| url.strip_prefix("ftps://")).ok_or_else(invalid)?;
    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() {
        return Err(invalid());
    }
    match authority.rsplit_once(':') {
        // A colon inside brackets belongs to an IPv6 literal without a port.
        Some((host, port)) if !port.ends_with(']') => {
            let port = port.parse::<u16>().map_err(|_| invalid())?;
            if host.is_empty() {
                return Err(invalid());
            }
            Ok((host.to_string(), port))
        }
        _ => Ok((authority.to_string(), 21)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.url, "ftp://localhost:21");
        assert_eq!(config.pasv_url, "ftp://localhost:30000");
        assert_eq!(config.passive_ports(), 30000..=30009);
        assert_eq!(config.greeting, "Welcome to FTP server");
        assert!(!config.anonymous);
        assert_eq!(config.hostname, None);
        assert_eq!(config.provision_root, PathBuf::from("/mnt"));
    }

    #[test]
    fn dotted_keys() {
        let config = Config::from_json(
            r#"{
                "ftp.url": "ftp://0.0.0.0:2121",
                "ftp.pasv_url": "ftp://203.0.113.7:40000",
                "ftp.pasv_min": 40000,
                "ftp.pasv_max": 40100,
                "ftp.greeting": "hi",
                "ftp.anonymous": true,
                "ftp.hostname": "ftp.example.com"
            }"#,
        )
        .unwrap();
        assert_eq!(config.bind_address().unwrap(), "0.0.0.0:2121");
        assert_eq!(config.passive_host().unwrap(), PassiveHost::Ip("203.0.113.7".parse().unwrap()));
        assert_eq!(config.hostname.as_deref(), Some("ftp.example.com"));
        assert!(config.anonymous);
    }

    #[test]
    fn inverted_passive_range_rejected() {
        let err = Config::from_json(r#"{"ftp.pasv_min": 30010, "ftp.pasv_max": 30000}"#).unwrap_err();
        assert!(matches!(err, ConfigError::PassiveRange { min: 30010, max: 30000 }));
    }

    #[test]
    fn url_parsing() {
        assert_eq!(split_url("k", "ftp://localhost").unwrap(), ("localhost".to_string(), 21));
        assert_eq!(split_url("k", "ftps://[::1]:990/").unwrap(), ("[::1]".to_string(), 990));
        assert_eq!(split_url("k", "ftp://[::1]").unwrap(), ("[::1]".to_string(), 21));
        assert!(split_url("k", "http://localhost:21").is_err());
        assert!(split_url("k", "ftp://localhost:port").is_err());
        assert!(split_url("k", "ftp://").is_err());
    }

    #[test]
    fn dns_passive_host() {
        let config = Config::default();
        assert_eq!(config.passive_host().unwrap(), PassiveHost::Dns("localhost".to_string()));
    }
}
