//! Startup configuration read from the process environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";
pub const DEFAULT_METRICS_URL: &str = "http://localhost:5000/api/metrics/batch";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("environment variable `{0}` must be set")]
    Missing(&'static str),
    #[error("environment variable `{name}` has invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host_id: String,
    pub docker_socket: PathBuf,
    pub redis_url: String,
    pub poll_interval: Duration,
    pub alert_interval: Duration,
    pub metrics_url: String,
    pub api_key: String,
    /// `None` disables alert delivery.
    pub discord_webhook_url: Option<String>,
    pub http_timeout: Duration,
    /// Zero means unbounded.
    pub alert_queue_capacity: usize,
    pub events_reconnect: bool,
    /// `None` disables the status endpoint.
    pub status_addr: Option<SocketAddr>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Empty values are treated like unset ones.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let host_id = var("HOST_ID").ok_or(Error::Missing("HOST_ID"))?;

        let redis_url = match var("REDIS_URL") {
            Some(url) => url,
            None => {
                let host = var("REDIS_HOST").unwrap_or_else(|| "localhost".to_owned());
                let port: u16 = parse(&var, "REDIS_PORT", 6379)?;
                format!("redis://{host}:{port}/")
            }
        };

        Ok(Self {
            host_id,
            docker_socket: var("DOCKER_SOCKET")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCKER_SOCKET)),
            redis_url,
            poll_interval: seconds(&var, "POLL_INTERVAL", 30)?,
            alert_interval: seconds(&var, "ALERT_INTERVAL", 300)?,
            metrics_url: var("METRICS_URL").unwrap_or_else(|| DEFAULT_METRICS_URL.to_owned()),
            api_key: var("API_KEY").unwrap_or_default(),
            discord_webhook_url: var("DISCORD_WEBHOOK_URL"),
            http_timeout: seconds(&var, "HTTP_TIMEOUT", 5)?,
            alert_queue_capacity: parse(&var, "ALERT_QUEUE_CAPACITY", 1000)?,
            events_reconnect: boolean(&var, "EVENTS_RECONNECT", true)?,
            status_addr: var("STATUS_ADDR")
                .map(|value| {
                    SocketAddr::from_str(&value).map_err(|err| Error::Invalid {
                        name: "STATUS_ADDR",
                        value,
                        reason: err.to_string(),
                    })
                })
                .transpose()?,
        })
    }
}

fn parse<T>(var: impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|err: T::Err| Error::Invalid {
            name,
            reason: err.to_string(),
            value,
        }),
    }
}

/// Positive whole seconds.
fn seconds(
    var: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: u64,
) -> Result<Duration> {
    match parse(&var, name, default)? {
        0 => Err(Error::Invalid {
            name,
            value: "0".to_owned(),
            reason: "must be greater than zero".to_owned(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn boolean(
    var: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool> {
    let Some(value) = var(name) else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Invalid {
            name,
            value,
            reason: "expected a boolean".to_owned(),
        }),
    }
}
