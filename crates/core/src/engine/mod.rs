use std::{fmt, sync::Arc};

use parking_lot::Mutex;

use crate::{
    autocycle::AutoCycle,
    config::{clamp_auto_interval, clamp_frame_delay, EngineConfig, TimingConfig},
    playback::PlaybackController,
    preset::{PresetSnapshot, PresetStore},
    render::RendererSet,
    state::{PlaybackState, SharedState, TaskExit},
    terminal::{AnsiTerminal, ColorPolicy, NeonColor, Terminal},
    AnimationError, Result,
};

/// Control surface over the whole player.
///
/// Every operation validates its input before writing, so a rejected call
/// leaves the shared state exactly as it was.
#[derive(Debug)]
pub struct Engine {
    state: SharedState,
    controller: Arc<PlaybackController>,
    auto: AutoCycle,
    presets: Mutex<PresetStore>,
    timing: TimingConfig,
}

impl Engine {
    /// Engine drawing to the real terminal with the built-in modes.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_parts(config, RendererSet::builtin(), Arc::new(AnsiTerminal))
    }

    pub fn with_parts(
        config: EngineConfig,
        renderers: RendererSet,
        terminal: Arc<dyn Terminal>,
    ) -> Self {
        let state = SharedState::from_defaults(&config.playback);
        let controller = Arc::new(PlaybackController::new(
            state.clone(),
            Arc::new(renderers),
            terminal,
            config.timing.clone(),
        ));
        let auto = AutoCycle::new(Arc::clone(&controller), config.timing.auto_poll);
        let presets = PresetStore::open(&config.preset_path);

        Self {
            state,
            controller,
            auto,
            presets: Mutex::new(presets),
            timing: config.timing,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn modes(&self) -> Vec<&'static str> {
        self.controller.renderers().names()
    }

    pub fn start(&self, mode: Option<&str>) -> Result<bool> {
        self.controller.start(mode)
    }

    pub fn stop(&self) {
        self.controller.stop();
    }

    pub fn pause(&self) -> bool {
        self.controller.pause()
    }

    pub fn resume(&self) -> bool {
        self.controller.resume()
    }

    pub fn toggle_pause(&self) -> Option<bool> {
        self.controller.toggle_pause()
    }

    /// Selects the mode used by the next start.
    pub fn set_mode(&self, name: &str) -> Result<&'static str> {
        let mode = self.controller.renderers().resolve(name)?;
        self.state.update(|s| s.mode = mode.to_string());
        Ok(mode)
    }

    /// Sets the frame delay, clamped to the minimum; returns the stored value.
    pub fn set_speed(&self, seconds: f64) -> Result<f64> {
        if !seconds.is_finite() {
            return Err(AnimationError::InvalidSpeed(seconds.to_string()));
        }
        let delay = clamp_frame_delay(seconds);
        self.state.update(|s| s.frame_delay = delay);
        Ok(delay)
    }

    /// Changes the colour policy, optionally with a new single colour.
    pub fn set_color_policy(&self, policy: ColorPolicy, color: Option<NeonColor>) {
        self.state.update(|s| {
            s.color_policy = policy;
            if let Some(color) = color {
                s.single_color = color;
            }
        });
    }

    /// Picks a palette entry by index (wrapping) and switches to single
    /// colour mode.
    pub fn set_single_color(&self, index: i64) -> Result<NeonColor> {
        let index = usize::try_from(index)
            .map_err(|_| AnimationError::InvalidColorIndex(index.to_string()))?;
        let color = NeonColor::from_index(index);
        self.set_color_policy(ColorPolicy::Single, Some(color));
        Ok(color)
    }

    /// Flips the sound flag; returns the new value.
    pub fn toggle_sound(&self) -> bool {
        self.state.update(|s| {
            s.sound = !s.sound;
            s.sound
        })
    }

    pub fn start_auto_cycle(&self) -> Result<bool> {
        self.auto.start()
    }

    pub fn stop_auto_cycle(&self) {
        self.auto.stop();
    }

    pub fn auto_cycle_enabled(&self) -> bool {
        self.auto.is_enabled()
    }

    /// Updates interval and order; takes effect at the next switch.
    pub fn set_auto_cycle_settings(&self, interval: u64, random: bool) -> u64 {
        let interval = clamp_auto_interval(interval);
        self.state.update(|s| {
            s.auto_interval = interval;
            s.auto_random = random;
        });
        interval
    }

    pub fn save_preset(&self, name: &str) -> Result<()> {
        let snapshot = self.state.read(PresetSnapshot::capture);
        self.presets.lock().save(name, snapshot)?;
        tracing::info!(preset = name.trim(), "preset saved");
        Ok(())
    }

    /// Copies a stored preset into the live state.
    ///
    /// A preset naming an unregistered mode is rejected as a whole.
    pub fn load_preset(&self, name: &str) -> Result<()> {
        let mut snapshot = self.presets.lock().get(name)?.clone();
        if let Some(mode) = &snapshot.mode {
            snapshot.mode = Some(self.controller.renderers().resolve(mode)?.to_string());
        }
        self.state.update(|s| snapshot.apply(s));
        tracing::info!(preset = name, "preset loaded");
        Ok(())
    }

    pub fn delete_preset(&self, name: &str) -> Result<()> {
        self.presets.lock().delete(name)?;
        tracing::info!(preset = name, "preset deleted");
        Ok(())
    }

    pub fn list_presets(&self) -> Vec<String> {
        self.presets.lock().names()
    }

    pub fn status(&self) -> Status {
        Status(self.state.snapshot())
    }

    /// Stops auto-cycling, waits for its loop, then stops playback.
    pub fn shutdown(&self) {
        self.stop_auto_cycle();
        if !self.auto.wait_idle(self.timing.stop_grace) {
            tracing::warn!("auto-cycle loop still running at shutdown");
        }
        self.stop();
    }
}

/// Printable summary of the playback parameters.
#[derive(Debug, Clone)]
pub struct Status(pub PlaybackState);

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.0;
        let on_off = |flag: bool| if flag { "ON" } else { "OFF" };
        let playback = match (s.running, s.paused) {
            (true, true) => "paused",
            (true, false) => "playing",
            (false, _) => "stopped",
        };
        writeln!(
            f,
            " Mode: {} ({playback}) | Speed: {:.3}s/frame | ColorMode: {} | Sound: {}",
            s.mode,
            s.frame_delay,
            s.color_policy,
            on_off(s.sound)
        )?;
        write!(
            f,
            " Auto: {} (Interval {}s, Random {})",
            on_off(s.auto_enabled),
            s.auto_interval,
            s.auto_random
        )?;
        if let Some(TaskExit::Failed(reason)) = &s.last_exit {
            write!(f, "\n Last render error: {reason}")?;
        }
        Ok(())
    }
}
