use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    config::{clamp_auto_interval, clamp_frame_delay},
    state::PlaybackState,
    terminal::{ColorPolicy, NeonColor},
    AnimationError, Result,
};

/// Named copy of the tunable playback fields.
///
/// Every field is optional so that files written by older versions, which
/// lack some keys, still load; absent fields leave the live value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, rename = "speed", skip_serializing_if = "Option::is_none")]
    pub frame_delay: Option<f64>,
    #[serde(default, rename = "color_mode", skip_serializing_if = "Option::is_none")]
    pub color_policy: Option<ColorPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_color: Option<NeonColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_random: Option<bool>,
}

impl PresetSnapshot {
    /// Reads the tunable fields out of `state`.
    pub fn capture(state: &PlaybackState) -> Self {
        Self {
            mode: Some(state.mode.clone()),
            frame_delay: Some(state.frame_delay),
            color_policy: Some(state.color_policy),
            single_color: Some(state.single_color),
            sound: Some(state.sound),
            auto_interval: Some(state.auto_interval),
            auto_random: Some(state.auto_random),
        }
    }

    /// Writes every present field into `state`.
    ///
    /// Run-state flags are never touched; a new mode takes effect on the
    /// next start.
    pub fn apply(&self, state: &mut PlaybackState) {
        if let Some(mode) = &self.mode {
            state.mode = mode.clone();
        }
        if let Some(delay) = self.frame_delay.filter(|d| d.is_finite()) {
            state.frame_delay = clamp_frame_delay(delay);
        }
        if let Some(policy) = self.color_policy {
            state.color_policy = policy;
        }
        if let Some(color) = self.single_color {
            state.single_color = color;
        }
        if let Some(sound) = self.sound {
            state.sound = sound;
        }
        if let Some(interval) = self.auto_interval {
            state.auto_interval = clamp_auto_interval(interval);
        }
        if let Some(random) = self.auto_random {
            state.auto_random = random;
        }
    }
}

/// File-backed map of preset name to snapshot.
///
/// The whole file is read once on open and rewritten on every change.
#[derive(Debug)]
pub struct PresetStore {
    path: PathBuf,
    presets: BTreeMap<String, PresetSnapshot>,
}

impl PresetStore {
    /// Loads `path`, falling back to an empty map when the file is missing
    /// or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let presets = match read_presets(&path) {
            Ok(presets) => presets,
            Err(AnimationError::Io(err)) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no preset file yet");
                BTreeMap::new()
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "ignoring unreadable preset file"
                );
                BTreeMap::new()
            }
        };
        Self { path, presets }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, name: &str) -> Result<&PresetSnapshot> {
        self.presets
            .get(name)
            .ok_or_else(|| AnimationError::PresetNotFound(name.to_string()))
    }

    /// Stores `snapshot` under `name` and rewrites the file.
    ///
    /// On a write failure the in-memory map is rolled back.
    pub fn save(&mut self, name: &str, snapshot: PresetSnapshot) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AnimationError::EmptyPresetName);
        }
        let previous = self.presets.insert(name.to_string(), snapshot);
        if let Err(err) = self.persist() {
            match previous {
                Some(previous) => self.presets.insert(name.to_string(), previous),
                None => self.presets.remove(name),
            };
            return Err(err);
        }
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let removed = self
            .presets
            .remove(name)
            .ok_or_else(|| AnimationError::PresetNotFound(name.to_string()))?;
        if let Err(err) = self.persist() {
            self.presets.insert(name.to_string(), removed);
            return Err(err);
        }
        Ok(())
    }

    /// Preset names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.presets)?;
        fs::write(&self.path, json)?;
        tracing::debug!(
            path = %self.path.display(),
            count = self.presets.len(),
            "presets written"
        );
        Ok(())
    }
}

fn read_presets(path: &Path) -> Result<BTreeMap<String, PresetSnapshot>> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
