use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::net::ip_filter::IpFilter;
use crate::server::EngineKind;

pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_MAX_REQUEST_BODY: usize = 64 * 1024;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

fn default_name() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|os| os.into_string().ok())
        .filter(|s| !s.is_empty())
        .unwrap_or_default();
    if host.is_empty() {
        "mediafront".to_string()
    } else {
        format!("mediafront@{}", host)
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

#[derive(Deserialize, Default, Debug)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub network_interface: Option<String>,
    pub engine_v2: Option<bool>,
    pub ip_filter: Option<String>,
    pub control_allow: Option<String>,
    pub max_request_body: Option<usize>,
    pub web_control: Option<bool>,
    pub worker_threads: Option<usize>,
    pub shutdown_grace_secs: Option<u64>,
}

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub name: String,
    pub paths: Vec<PathBuf>,
    pub hostname: Option<String>,
    pub network_interface: Option<String>,
    pub engine: EngineKind,
    pub ip_filter: String,
    pub control_allow: String,
    pub max_request_body: usize,
    pub web_control: bool,
    pub worker_threads: usize,
    pub shutdown_grace: Duration,
}

impl Config {
    pub fn resolve(file: Option<FileConfig>, args: &crate::cli::Args) -> Self {
        let file = file.unwrap_or_default();
        let engine_v2 = args.engine_v2 || file.engine_v2.unwrap_or(false);
        Config {
            port: args.port.or(file.port).unwrap_or(DEFAULT_PORT),
            name: args.name.clone().or(file.name).unwrap_or_else(default_name),
            paths: args.paths.clone(),
            hostname: args.hostname.clone().or(file.hostname),
            network_interface: args.network_interface.clone().or(file.network_interface),
            engine: if engine_v2 { EngineKind::Evented } else { EngineKind::Blocking },
            ip_filter: args.ip_filter.clone().or(file.ip_filter).unwrap_or_default(),
            control_allow: file.control_allow.unwrap_or_default(),
            max_request_body: file.max_request_body.unwrap_or(DEFAULT_MAX_REQUEST_BODY),
            web_control: args.web_control || file.web_control.unwrap_or(false),
            worker_threads: file.worker_threads.filter(|&n| n > 0).unwrap_or_else(default_worker_threads),
            shutdown_grace: Duration::from_secs(
                file.shutdown_grace_secs.unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
            ),
        }
    }

    /// The listener settings, frozen for the lifetime of one server.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            port: self.port,
            hostname: self.hostname.clone(),
            network_interface: self.network_interface.clone(),
            engine: self.engine,
            ip_filter: Arc::new(IpFilter::parse(&self.ip_filter)),
            max_request_body: self.max_request_body,
            worker_threads: self.worker_threads,
            shutdown_grace: self.shutdown_grace,
        }
    }
}

/// Immutable listener configuration consumed by [`HttpServer`](crate::server::HttpServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub hostname: Option<String>,
    pub network_interface: Option<String>,
    pub engine: EngineKind,
    pub ip_filter: Arc<IpFilter>,
    /// Largest request body the event-driven engine aggregates.
    pub max_request_body: usize,
    pub worker_threads: usize,
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// Engine V1 on `port` with no forced address and an open allow-list.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            hostname: None,
            network_interface: None,
            engine: EngineKind::Blocking,
            ip_filter: Arc::new(IpFilter::allow_all()),
            max_request_body: DEFAULT_MAX_REQUEST_BODY,
            worker_threads: 2,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    let cwd_config = PathBuf::from("mediafront.toml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let xdg_config = config_dir.join("mediafront").join("config.toml");
        if xdg_config.exists() {
            return Some(xdg_config);
        }
    }
    None
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;
    Ok(config)
}
