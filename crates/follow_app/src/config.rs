//! Tuning from an optional RON file, credentials from the environment.
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use engine_logging::engine_info;
use follow_core::{CooldownSettings, DelayRange, HarvestSettings, RateSignalMonitor};
use follow_engine::{Credentials, ExecutorSettings, WebSettings};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "follow_sync.ron";

/// Every field is optional; absent ones keep the engine defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub cooldown_secs: Option<(u64, u64)>,
    pub quota_cap: Option<u32>,
    pub quota_window_secs: Option<u64>,
    pub pace_after_mutation_secs: Option<(u64, u64)>,
    pub pace_after_error_secs: Option<(u64, u64)>,
    pub pace_brief_ms: Option<(u64, u64)>,
    pub sever_attempts: Option<u32>,
    pub harvest_max_rounds: Option<u32>,
    pub harvest_stale_threshold: Option<u32>,
    pub harvest_max_retries: Option<u32>,
    pub completeness_ratio: Option<f64>,
    pub page_size: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    /// Replaces the built-in rate-limit phrases.
    pub markers: Option<Vec<String>>,
}

/// Engine settings after the file has been applied over the defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub harvest: HarvestSettings,
    pub cooldown: CooldownSettings,
    pub executor: ExecutorSettings,
    pub web: WebSettings,
    pub monitor: RateSignalMonitor,
}

impl FileConfig {
    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Path::new(DEFAULT_CONFIG_PATH),
            None => return Ok(Self::default()),
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("could not read config {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        engine_info!("Loaded settings from {:?}", path);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = ron::from_str(content)?;
        if let Some(ratio) = config.completeness_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                bail!("completeness_ratio must be within 0..=1, got {ratio}");
            }
        }
        if config.quota_cap == Some(0) {
            bail!("quota_cap must be at least 1");
        }
        if config.sever_attempts == Some(0) {
            bail!("sever_attempts must be at least 1");
        }
        if let Some(markers) = &config.markers {
            let kept = RateSignalMonitor::with_markers(markers);
            if kept.markers().is_empty() {
                bail!("markers must hold at least one phrase of two or more words");
            }
            if kept.markers().len() < markers.len() {
                let dropped: Vec<&str> = markers
                    .iter()
                    .map(|m| m.trim())
                    .filter(|m| m.split_whitespace().count() < 2)
                    .collect();
                bail!("single-word markers match ordinary pages: {dropped:?}");
            }
        }
        Ok(config)
    }

    pub fn into_settings(self) -> Settings {
        let mut harvest = HarvestSettings::default();
        let mut cooldown = CooldownSettings::default();
        let mut executor = ExecutorSettings::default();
        let mut web = WebSettings::default();

        if let Some((min, max)) = self.cooldown_secs {
            cooldown.min = Duration::from_secs(min);
            cooldown.max = Duration::from_secs(max);
        }
        if let Some(cap) = self.quota_cap {
            executor.quota.cap = cap;
        }
        if let Some(secs) = self.quota_window_secs {
            executor.quota.window = Duration::from_secs(secs);
        }
        if let Some((min, max)) = self.pace_after_mutation_secs {
            executor.pace.after_mutation = DelayRange::from_secs(min, max);
        }
        if let Some((min, max)) = self.pace_after_error_secs {
            executor.pace.after_error = DelayRange::from_secs(min, max);
        }
        if let Some((min, max)) = self.pace_brief_ms {
            executor.pace.brief = DelayRange::from_millis(min, max);
        }
        if let Some(attempts) = self.sever_attempts {
            executor.sever_attempts = attempts;
        }
        if let Some(rounds) = self.harvest_max_rounds {
            harvest.max_rounds = rounds;
        }
        if let Some(threshold) = self.harvest_stale_threshold {
            harvest.stale_threshold = threshold;
        }
        if let Some(retries) = self.harvest_max_retries {
            harvest.max_retries = retries;
        }
        if let Some(ratio) = self.completeness_ratio {
            harvest.completeness_ratio = ratio;
        }
        if let Some(size) = self.page_size {
            web.page_size = size;
        }
        if let Some(secs) = self.request_timeout_secs {
            web.request_timeout = Duration::from_secs(secs);
        }
        let monitor = match self.markers {
            Some(markers) => RateSignalMonitor::with_markers(markers),
            None => RateSignalMonitor::default(),
        };

        Settings {
            harvest,
            cooldown,
            executor,
            web,
            monitor,
        }
    }
}

/// What the environment (or `.env`) supplies.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub credentials: Credentials,
    pub base_url: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .with_context(|| format!("{key} is not set (export it or add it to .env)"))
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            credentials: Credentials {
                username: required("IG_USERNAME")?,
                session_id: required("IG_SESSIONID")?,
                csrf_token: optional("IG_CSRFTOKEN"),
            },
            base_url: optional("FOLLOW_SYNC_BASE_URL"),
        })
    }
}
