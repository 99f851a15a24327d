use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::endpoint::{self, ApiBase};
use crate::feed::{MAX_EVENTS, MAX_TELEMETRY_EVENTS};
use crate::session::{FALLBACK_DELAY, FALLBACK_PORT, RECONNECT_DELAY};

const DEFAULT_ORIGIN: &str = "http://127.0.0.1:5173";

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    api_url: Option<String>,
    origin: Option<String>,
    stream: Option<StreamConfigFile>,
    feeds: Option<FeedConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    path: Option<String>,
    fallback_port: Option<u16>,
    fallback_delay_ms: Option<u64>,
    reconnect_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct FeedConfigFile {
    max_events: Option<usize>,
    max_telemetry: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub api_base: ApiBase,
    pub stream: StreamSettings,
    pub feeds: FeedSettings,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub path: String,
    pub fallback_port: u16,
    pub fallback_delay: Duration,
    pub reconnect_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub max_events: usize,
    pub max_telemetry: usize,
}

/// Raw values before URL resolution; env overrides apply here.
struct Unresolved {
    api_url: Option<String>,
    origin: String,
    stream: StreamSettings,
    feeds: FeedSettings,
}

impl WatchConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ZENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut raw = Unresolved::from_file(file_cfg.unwrap_or_default());
        raw.apply_env()?;
        raw.resolve()
    }

    pub fn stream_url(&self) -> Result<String> {
        Ok(self.api_base.ws_url(&self.stream.path)?)
    }

    pub fn fallback_url(&self) -> Result<String> {
        let primary = self.stream_url()?;
        Ok(endpoint::with_port(&primary, self.stream.fallback_port)?)
    }
}

impl Unresolved {
    fn from_file(file: WatchConfigFile) -> Self {
        let stream = file.stream.unwrap_or_default();
        let feeds = file.feeds.unwrap_or_default();
        Self {
            api_url: file.api_url,
            origin: file.origin.unwrap_or_else(|| DEFAULT_ORIGIN.to_string()),
            stream: StreamSettings {
                path: stream
                    .path
                    .unwrap_or_else(|| crate::STREAM_PATH.to_string()),
                fallback_port: stream.fallback_port.unwrap_or(FALLBACK_PORT),
                fallback_delay: stream
                    .fallback_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(FALLBACK_DELAY),
                reconnect_delay: stream
                    .reconnect_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(RECONNECT_DELAY),
            },
            feeds: FeedSettings {
                max_events: feeds.max_events.unwrap_or(MAX_EVENTS),
                max_telemetry: feeds.max_telemetry.unwrap_or(MAX_TELEMETRY_EVENTS),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("ZENTINEL_API_URL") {
            // Set-but-empty means same-origin, matching an unset build variable.
            self.api_url = Some(url);
        }
        if let Ok(origin) = std::env::var("ZENTINEL_ORIGIN") {
            if !origin.trim().is_empty() {
                self.origin = origin;
            }
        }
        if let Ok(path) = std::env::var("ZENTINEL_WS_PATH") {
            if !path.trim().is_empty() {
                self.stream.path = path;
            }
        }
        if let Ok(port) = std::env::var("ZENTINEL_FALLBACK_PORT") {
            self.stream.fallback_port = port
                .trim()
                .parse()
                .map_err(|_| anyhow!("ZENTINEL_FALLBACK_PORT must be a port number"))?;
        }
        if let Ok(delay) = std::env::var("ZENTINEL_RECONNECT_MS") {
            let ms: u64 = delay.trim().parse().map_err(|_| {
                anyhow!("ZENTINEL_RECONNECT_MS must be an integer number of milliseconds")
            })?;
            self.stream.reconnect_delay = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn resolve(self) -> Result<WatchConfig> {
        if self.stream.fallback_port == 0 {
            return Err(anyhow!("fallback port must be greater than zero"));
        }
        if self.stream.fallback_delay.is_zero() {
            return Err(anyhow!("fallback delay must be greater than zero"));
        }
        if self.stream.reconnect_delay.is_zero() {
            return Err(anyhow!("reconnect delay must be greater than zero"));
        }
        if self.feeds.max_events == 0 || self.feeds.max_telemetry == 0 {
            return Err(anyhow!("feed caps must be greater than zero"));
        }
        let api_base = ApiBase::from_env_value(self.api_url.as_deref(), &self.origin)
            .context("invalid API endpoint configuration")?;
        let cfg = WatchConfig {
            api_base,
            stream: self.stream,
            feeds: self.feeds,
        };
        cfg.stream_url()?;
        Ok(cfg)
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
