use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::models::{default_rotation, SceneDescriptor};
use crate::source::HttpSourceConfig;
use crate::trends::FeedConfig;

const DEFAULT_REFRESH_MS: u64 = 10_000;

/// Everything the display reads at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplaySettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub milestone_poll_ms: u64,
    pub feed_refresh_ms: u64,
    pub scene_refresh_ms: u64,
    pub ticker_limit: usize,
    pub leaderboard_limit: usize,
    pub time_window: String,
    pub celebration_dwell_ms: u64,
    pub reduced_motion_dwell_ms: u64,
    pub reduced_motion: bool,
    /// Rotation shown until the backend's scene list arrives.
    pub scenes: Vec<SceneDescriptor>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".into(),
            request_timeout_secs: 10,
            milestone_poll_ms: DEFAULT_REFRESH_MS,
            feed_refresh_ms: DEFAULT_REFRESH_MS,
            scene_refresh_ms: DEFAULT_REFRESH_MS,
            ticker_limit: 50,
            leaderboard_limit: 10,
            time_window: "all".into(),
            celebration_dwell_ms: 6_000,
            reduced_motion_dwell_ms: 3_000,
            reduced_motion: false,
            scenes: default_rotation(),
        }
    }
}

impl DisplaySettings {
    /// Replaces zero intervals, timeouts, limits and dwells with their
    /// defaults and drops zero-length scenes. Timer loops require non-zero
    /// periods.
    pub fn sanitize(&mut self) {
        let defaults = DisplaySettings::default();

        let positive = |key: &str, value: &mut u64, default: u64| {
            if *value == 0 {
                warn!("{key} must be positive; using {default}");
                *value = default;
            }
        };
        positive("request_timeout_secs", &mut self.request_timeout_secs, defaults.request_timeout_secs);
        positive("milestone_poll_ms", &mut self.milestone_poll_ms, defaults.milestone_poll_ms);
        positive("feed_refresh_ms", &mut self.feed_refresh_ms, defaults.feed_refresh_ms);
        positive("scene_refresh_ms", &mut self.scene_refresh_ms, defaults.scene_refresh_ms);
        positive("celebration_dwell_ms", &mut self.celebration_dwell_ms, defaults.celebration_dwell_ms);
        positive(
            "reduced_motion_dwell_ms",
            &mut self.reduced_motion_dwell_ms,
            defaults.reduced_motion_dwell_ms,
        );

        if self.ticker_limit == 0 {
            warn!("ticker_limit must be positive; using {}", defaults.ticker_limit);
            self.ticker_limit = defaults.ticker_limit;
        }
        if self.leaderboard_limit == 0 {
            warn!("leaderboard_limit must be positive; using {}", defaults.leaderboard_limit);
            self.leaderboard_limit = defaults.leaderboard_limit;
        }

        self.scenes.retain(|scene| {
            if scene.duration_ms == 0 {
                warn!("dropping scene '{}' with zero duration", scene.id);
            }
            scene.duration_ms > 0
        });
    }

    /// Applies `VENUE_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("VENUE_API_BASE_URL").filter(|url| !url.trim().is_empty()) {
            self.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(window) = lookup("VENUE_TIME_WINDOW") {
            self.time_window = window;
        }
        if let Some(flag) = lookup("VENUE_REDUCED_MOTION") {
            self.reduced_motion = flag == "1" || flag.eq_ignore_ascii_case("true");
        }

        let numeric = |key: &str, target: &mut u64| {
            if let Some(raw) = lookup(key) {
                match raw.trim().parse() {
                    Ok(value) if value > 0 => *target = value,
                    _ => warn!("ignoring invalid {key}={raw}"),
                }
            }
        };
        numeric("VENUE_REQUEST_TIMEOUT_SECS", &mut self.request_timeout_secs);
        numeric("VENUE_MILESTONE_POLL_MS", &mut self.milestone_poll_ms);
        numeric("VENUE_FEED_REFRESH_MS", &mut self.feed_refresh_ms);
        numeric("VENUE_SCENE_REFRESH_MS", &mut self.scene_refresh_ms);
    }

    pub fn source_config(&self) -> HttpSourceConfig {
        HttpSourceConfig::default()
            .with_base_url(self.api_base_url.clone())
            .with_timeout(self.request_timeout())
    }

    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig {
            refresh_interval: Duration::from_millis(self.feed_refresh_ms),
            ticker_limit: self.ticker_limit,
            leaderboard_limit: self.leaderboard_limit,
            time_window: self.time_window.clone(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn milestone_poll_interval(&self) -> Duration {
        Duration::from_millis(self.milestone_poll_ms)
    }

    pub fn scene_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.scene_refresh_ms)
    }

    /// How long a celebration stays up under the given motion preference.
    pub fn celebration_dwell_ms(&self, reduced_motion: bool) -> u64 {
        if reduced_motion {
            self.reduced_motion_dwell_ms
        } else {
            self.celebration_dwell_ms
        }
    }

    pub fn celebration_dwell(&self, reduced_motion: bool) -> Duration {
        Duration::from_millis(self.celebration_dwell_ms(reduced_motion))
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<DisplaySettings>,
}

impl SettingsStore {
    /// Reads the settings file, falling back to defaults when it is missing
    /// or unreadable, replaces out-of-range values, then applies environment
    /// overrides.
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("invalid settings in {}: {err}; using defaults", path.display());
                DisplaySettings::default()
            })
        } else {
            DisplaySettings::default()
        };
        data.sanitize();
        data.apply_env();

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> DisplaySettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn update_reduced_motion(&self, reduced_motion: bool) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.reduced_motion = reduced_motion;
        self.persist(&guard)
    }

    fn persist(&self, data: &DisplaySettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
