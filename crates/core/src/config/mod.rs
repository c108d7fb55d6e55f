use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::terminal::{ColorPolicy, NeonColor};

/// Lower bound for the inter-frame delay, in seconds.
pub const MIN_FRAME_DELAY: f64 = 0.005;
/// Upper bound for the inter-frame delay, in seconds.
pub const MAX_FRAME_DELAY: f64 = 3600.0;
/// Lower bound for the auto-cycle interval, in seconds.
pub const MIN_AUTO_INTERVAL: u64 = 1;
/// Upper bound for the auto-cycle interval, in seconds (one day).
pub const MAX_AUTO_INTERVAL: u64 = 86_400;
/// Widest frame any animation will draw.
pub const MAX_FRAME_WIDTH: usize = 100;
/// Width used when the terminal cannot be queried.
pub const FALLBACK_WIDTH: usize = 80;

/// Top-level configuration structure for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub playback: PlaybackDefaults,
    pub timing: TimingConfig,
    pub preset_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackDefaults::default(),
            timing: TimingConfig::default(),
            preset_path: PathBuf::from("presets.json"),
        }
    }
}

impl EngineConfig {
    /// Defaults with a custom preset file location.
    pub fn with_preset_path(path: impl Into<PathBuf>) -> Self {
        Self {
            preset_path: path.into(),
            ..Self::default()
        }
    }
}

/// Tunable values the shared playback state starts from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackDefaults {
    pub mode: String,
    pub frame_delay: f64,
    pub color_policy: ColorPolicy,
    pub single_color: NeonColor,
    pub sound: bool,
    pub auto_interval: u64,
    pub auto_random: bool,
}

impl Default for PlaybackDefaults {
    fn default() -> Self {
        Self {
            mode: "Wave".to_string(),
            frame_delay: 0.06,
            color_policy: ColorPolicy::Cycle,
            single_color: NeonColor::Cyan,
            sound: true,
            auto_interval: 8,
            auto_random: true,
        }
    }
}

/// Bounded waits used by the cooperative loops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How long `stop()` waits for the render task to exit.
    pub stop_grace: Duration,
    /// Idle recheck period while paused.
    pub pause_poll: Duration,
    /// Longest single wait inside the auto-cycle interval.
    pub auto_poll: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            stop_grace: Duration::from_secs(1),
            pause_poll: Duration::from_millis(100),
            auto_poll: Duration::from_millis(500),
        }
    }
}

/// Clamps a frame delay to the supported range.
///
/// Non-finite input is rejected by callers before it gets here; anything
/// below [`MIN_FRAME_DELAY`] (zero and negatives included) becomes the minimum.
pub fn clamp_frame_delay(seconds: f64) -> f64 {
    seconds.clamp(MIN_FRAME_DELAY, MAX_FRAME_DELAY)
}

pub fn clamp_auto_interval(seconds: u64) -> u64 {
    seconds.clamp(MIN_AUTO_INTERVAL, MAX_AUTO_INTERVAL)
}

/// Converts seconds to a `Duration`, saturating instead of panicking on
/// values a `Duration` cannot hold.
pub fn saturating_secs(seconds: f64) -> Duration {
    if seconds.is_nan() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}
