use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::error_handling::types::ConfigError;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_RECORD_FILE: &str = "client_data.txt";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://timezone.db?mode=rwc";
pub const DEFAULT_AUDIT_LOG: &str = "server.log";

/// Command-line arguments of the server binary.
///
/// Every flag can also come from the environment; when present it overrides the
/// matching value of the configuration file.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "tzserver")]
#[command(version)]
#[command(about = "Collects timezone reports from line-oriented TCP clients")]
pub struct Args {
    /// Optional TOML configuration file
    #[arg(long, short, env = "TZSERVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// IP address to listen on
    #[arg(long, env = "TZSERVER_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// TCP port to listen on
    #[arg(long, short, env = "TZSERVER_PORT")]
    pub port: Option<u16>,

    /// Append-only file receiving one line per accepted report
    #[arg(long, env = "TZSERVER_RECORD_FILE")]
    pub record_file: Option<PathBuf>,

    /// Connection string of the structured store
    #[arg(long, env = "TZSERVER_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Audit log file
    #[arg(long, env = "TZSERVER_AUDIT_LOG")]
    pub audit_log: Option<PathBuf>,
}

/// Runtime configuration of the server.
///
/// Every field has a default, so an empty TOML file (or none at all) is a valid
/// configuration:
///
/// ```toml
/// bind_address = "0.0.0.0"
/// port = 8080
/// record_file = "client_data.txt"
/// database_url = "sqlite://timezone.db?mode=rwc"
/// audit_log = "server.log"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub record_file: PathBuf,
    pub database_url: String,
    pub audit_log: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            record_file: PathBuf::from(DEFAULT_RECORD_FILE),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            audit_log: PathBuf::from(DEFAULT_AUDIT_LOG),
        }
    }
}

impl Config {
    /// Builds the configuration from the optional file named in `args`, then applies
    /// the remaining flags on top and validates the result.
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    fn apply_args(&mut self, args: &Args) {
        if let Some(ref bind_address) = args.bind_address {
            self.bind_address = bind_address.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(ref record_file) = args.record_file {
            self.record_file = record_file.clone();
        }
        if let Some(ref database_url) = args.database_url {
            self.database_url = database_url.clone();
        }
        if let Some(ref audit_log) = args.audit_log {
            self.audit_log = audit_log.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.record_file.as_os_str().is_empty() {
            return Err(ConfigError::NotInRange("record_file must not be empty".into()));
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::NotInRange("database_url must not be empty".into()));
        }
        if self.audit_log.as_os_str().is_empty() {
            return Err(ConfigError::NotInRange("audit_log must not be empty".into()));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.bind_address.trim().parse().map_err(|_| {
            ConfigError::NotInRange(format!("bind_address {:?} is not an IP address", self.bind_address))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn args_under_test(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec!["tzserver"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.listen_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.record_file, PathBuf::from("client_data.txt"));
        assert_eq!(config.audit_log, PathBuf::from("server.log"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("port = 9000\naudit_log = \"/tmp/tz.log\"\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.audit_log, PathBuf::from("/tmp/tz.log"));
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn test_unknown_or_bad_toml_is_rejected() {
        assert!(matches!(
            Config::from_toml_str("prot = 9000"),
            Err(ConfigError::TomlError(_))
        ));
        assert!(matches!(
            Config::from_toml_str("port = 70000"),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn test_bad_bind_address_is_rejected() {
        let config = Config {
            bind_address: "localhost-ish".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));
    }

    #[test]
    #[serial]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "port = 9000\nbind_address = \"127.0.0.1\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = args_under_test(&["--config", path.as_str(), "--port", "9100"]).unwrap();
        let config = Config::load(&args).unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.bind_address, "127.0.0.1");
    }

    #[test]
    #[serial]
    fn test_missing_config_file_is_io_error() {
        let args = args_under_test(&["--config", "/definitely/not/here.toml"]).unwrap();
        assert!(matches!(Config::load(&args), Err(ConfigError::IoError(_))));
    }

    #[test]
    #[serial]
    fn test_port_from_environment() {
        std::env::set_var("TZSERVER_PORT", "8181");
        let args = args_under_test(&[]);
        std::env::remove_var("TZSERVER_PORT");

        let config = Config::load(&args.unwrap()).unwrap();
        assert_eq!(config.port, 8181);
    }
}
