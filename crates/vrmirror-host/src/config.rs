//! Harness configuration: which source to run and how fast to drive it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use vrmirror_core::{CaptureSettings, SOURCE_NAME};

/// Environment variable naming the config file when no CLI argument is given.
pub const CONFIG_ENV: &str = "VRMIRROR_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    #[serde(alias = "sourceName")]
    pub source_name:          String,
    pub settings:             CaptureSettings,
    /// Host tick rate (liveness polling, opportunistic retries).
    #[serde(alias = "tickHz")]
    pub tick_hz:              u32,
    #[serde(alias = "renderFps")]
    pub render_fps:           u32,
    #[serde(alias = "statusIntervalSecs")]
    pub status_interval_secs: u64,
    /// Stop after this many seconds; run until Ctrl-C when absent.
    #[serde(alias = "runSeconds")]
    pub run_seconds:          Option<u64>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            source_name:          SOURCE_NAME.to_owned(),
            settings:             CaptureSettings::default(),
            tick_hz:              60,
            render_fps:           90,
            status_interval_secs: 5,
            run_seconds:          None,
        }
    }
}

impl HostConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("parse host config")?;
        Ok(config.sanitized())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read host config {}", path.display()))?;
        Self::from_json_str(&text)
    }

    /// First CLI argument, else `VRMIRROR_CONFIG`, else defaults.
    pub fn from_args_or_env() -> Result<(Self, Option<PathBuf>)> {
        let path = std::env::args_os()
            .nth(1)
            .map(PathBuf::from)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match path {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    fn sanitized(mut self) -> Self {
        self.settings = self.settings.sanitized();
        self.tick_hz = self.tick_hz.clamp(1, 1000);
        self.render_fps = self.render_fps.clamp(1, 1000);
        self.status_interval_secs = self.status_interval_secs.max(1);
        self
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz as f64)
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.render_fps as f64)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn run_duration(&self) -> Option<Duration> {
        self.run_seconds.map(Duration::from_secs)
    }
}
