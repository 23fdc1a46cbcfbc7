use std::{
    env,
    net::{SocketAddr, ToSocketAddrs},
    path::{Path, PathBuf},
};

use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::store::{DataDir, DataDirError};

pub const DEFAULT_BIND: &str = "0.0.0.0:8092";
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Config files tried in order when `--config` is not given. `~` is `$HOME`.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["/etc/espotad/espotad.json", "~/.config/espotad.json"];

#[derive(Debug, Clone, Parser)]
#[command(name = "espotad", version, about = "ESP8266 & ESP32 Firmware OTA server")]
pub struct Args {
    /// Address the HTTP server listens on: `host:port`, `[v6]:port`, or `:port` for all IPv4
    /// interfaces. Host names are resolved at startup.
    ///
    /// Environment variable: `EOBIND`.
    #[arg(short = 's', long, env = "EOBIND", value_parser = parse_bind)]
    pub bind: Option<String>,

    /// Root directory holding `<project>/<file>` firmware images.
    ///
    /// Environment variable: `EODATADIR`.
    #[arg(short = 'd', long, env = "EODATADIR")]
    pub data_dir: Option<PathBuf>,

    /// Enable the Prometheus `/metrics` endpoint.
    ///
    /// Environment variable: `EOPROMETHEUS`.
    #[arg(short = 'm', long, env = "EOPROMETHEUS", overrides_with = "no_prometheus")]
    pub prometheus: bool,

    /// Disable the Prometheus `/metrics` endpoint.
    #[arg(long, overrides_with = "prometheus")]
    pub no_prometheus: bool,

    /// Log filter (tracing-subscriber EnvFilter syntax).
    ///
    /// Environment variable: `ESPOTA_LOG_LEVEL`.
    #[arg(long, env = "ESPOTA_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format.
    ///
    /// Environment variable: `ESPOTA_LOG_FORMAT`.
    #[arg(long, env = "ESPOTA_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormat>,

    /// JSON config file. Values given on the command line or in the environment take precedence.
    ///
    /// Environment variable: `ESPOTA_CONFIG`.
    #[arg(short = 'c', long, env = "ESPOTA_CONFIG")]
    pub config: Option<PathBuf>,
}

impl Args {
    fn prometheus(&self) -> Option<bool> {
        if self.prometheus {
            Some(true)
        } else if self.no_prometheus {
            Some(false)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Contents of a JSON config file. Keys mirror the long flag names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub prometheus: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    pub fn parse_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_str(&raw).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the first existing file from [`DEFAULT_CONFIG_PATHS`], or an empty config.
    pub fn discover() -> Result<Self, ConfigError> {
        for candidate in DEFAULT_CONFIG_PATHS {
            let Some(path) = expand_home(candidate) else {
                continue;
            };
            if path.is_file() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }
}

fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => env::var_os("HOME").map(|home| PathBuf::from(home).join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read config file {path:?}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parse config file {path:?}: {source}")]
    ParseFile {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid bind address {value:?}")]
    InvalidBind { value: String },
    #[error("resolve bind address {value:?}: {source}")]
    ResolveBind {
        value: String,
        source: std::io::Error,
    },
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("missing required data-dir (--data-dir or EODATADIR)")]
    MissingDataDir,
    #[error(transparent)]
    DataDir(#[from] DataDirError),
}

/// Secondary environment variables, consulted after the CLI and its primary `EO*` variables
/// but before the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackEnv {
    pub bind: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub prometheus: Option<String>,
    pub rust_log: Option<String>,
}

impl FallbackEnv {
    pub fn from_process() -> Self {
        Self {
            bind: env::var("ESPOTA_BIND").ok(),
            data_dir: env::var_os("ESPOTA_DATA_DIR").map(PathBuf::from),
            prometheus: env::var("ESPOTA_PROMETHEUS").ok(),
            rust_log: env::var("RUST_LOG").ok(),
        }
    }
}

/// Process configuration after merging CLI, environment, and config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Normalized `host:port`, resolved by [`Config::validate`].
    pub bind: String,
    pub data_dir: PathBuf,
    pub prometheus: bool,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(Args::parse())
    }

    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::discover()?,
        };
        Self::merge(args, FallbackEnv::from_process(), file)
    }

    /// Merge with precedence: CLI/environment, then config file, then defaults.
    pub fn merge(args: Args, env: FallbackEnv, file: FileConfig) -> Result<Self, ConfigError> {
        let prometheus = match args.prometheus() {
            Some(enabled) => enabled,
            None => match env.prometheus {
                Some(value) => parse_bool(&value).ok_or_else(|| ConfigError::InvalidEnv {
                    var: "ESPOTA_PROMETHEUS",
                    value: value.clone(),
                })?,
                None => file.prometheus.unwrap_or(false),
            },
        };

        let bind = match args.bind {
            Some(bind) => bind,
            None => env
                .bind
                .or(file.bind)
                .map(|value| parse_bind(&value).map_err(|_| ConfigError::InvalidBind { value }))
                .transpose()?
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
        };

        let data_dir = args
            .data_dir
            .or(env.data_dir)
            .or(file.data_dir)
            .ok_or(ConfigError::MissingDataDir)?;

        let log_level = args
            .log_level
            .or(env.rust_log)
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let log_format = args.log_format.or(file.log_format).unwrap_or_default();

        Ok(Self {
            bind,
            data_dir,
            prometheus,
            log_level,
            log_format,
        })
    }

    /// Resolve the bind address, check the data directory, and freeze the settings the server
    /// needs.
    pub fn validate(&self) -> Result<ServerConfig, ConfigError> {
        Ok(ServerConfig {
            bind_addr: resolve_bind(&self.bind)?,
            data_dir: DataDir::new(&self.data_dir)?,
            prometheus: self.prometheus,
        })
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: DataDir,
    pub prometheus: bool,
}

/// Accepts `host:port`, `[v6]:port`, or Go-style `:port`, which binds all IPv4 interfaces.
///
/// Only the shape is checked here. Host names are looked up by [`Config::validate`].
pub fn parse_bind(value: &str) -> Result<String, String> {
    let value = value.trim();
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("invalid bind address {value:?}: missing port"))?;
    port.parse::<u16>()
        .map_err(|err| format!("invalid bind address {value:?}: {err}"))?;

    if host.is_empty() {
        return Ok(format!("0.0.0.0:{port}"));
    }
    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(format!(
            "invalid bind address {value:?}: IPv6 hosts must be bracketed"
        ));
    }
    Ok(value.to_string())
}

fn resolve_bind(value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .to_socket_addrs()
        .map_err(|source| ConfigError::ResolveBind {
            value: value.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| ConfigError::InvalidBind {
            value: value.to_string(),
        })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
