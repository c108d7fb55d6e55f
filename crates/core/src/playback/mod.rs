use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    config::TimingConfig,
    render::{spawn_render_task, RendererSet, TaskHandle, TaskSpec},
    state::SharedState,
    terminal::{Terminal, Tone},
    AnimationError, Result,
};

/// Owns the single active render task and drives its lifecycle.
///
/// `start` is the only place a render task is created. The check of
/// `running` and the bump of `generation` happen in one locked update, so
/// concurrent callers can never launch two tasks.
pub struct PlaybackController {
    state: SharedState,
    renderers: Arc<RendererSet>,
    terminal: Arc<dyn Terminal>,
    timing: TimingConfig,
    active: Mutex<Option<TaskHandle>>,
}

impl PlaybackController {
    pub fn new(
        state: SharedState,
        renderers: Arc<RendererSet>,
        terminal: Arc<dyn Terminal>,
        timing: TimingConfig,
    ) -> Self {
        Self {
            state,
            renderers,
            terminal,
            timing,
            active: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn renderers(&self) -> &RendererSet {
        &self.renderers
    }

    /// Starts rendering, optionally switching mode first.
    ///
    /// Returns `Ok(false)` without touching the state when a task is already
    /// running. Unknown modes are rejected before anything is written.
    pub fn start(&self, mode: Option<&str>) -> Result<bool> {
        let requested = mode.map(|name| self.renderers.resolve(name)).transpose()?;

        let mut active = self.active.lock();
        let launch = self.state.update(|s| {
            if s.running {
                return None;
            }
            if let Some(name) = requested {
                s.mode = name.to_string();
            }
            s.running = true;
            s.paused = false;
            s.generation += 1;
            s.frames = 0;
            s.last_exit = None;
            Some((s.generation, s.mode.clone(), s.sound))
        });
        let Some((generation, mode, sound)) = launch else {
            tracing::debug!("start ignored, a render task is already running");
            return Ok(false);
        };

        let Some(animation) = self.renderers.get(&mode) else {
            self.abort_launch(generation);
            return Err(AnimationError::UnknownMode(mode));
        };
        let spec = TaskSpec {
            generation,
            animation,
            output: self.terminal.writer(),
            width: self.terminal.width(),
            pause_poll: self.timing.pause_poll,
        };
        let handle = match spawn_render_task(self.state.clone(), spec) {
            Ok(handle) => handle,
            Err(err) => {
                self.abort_launch(generation);
                return Err(err);
            }
        };

        if let Some(orphan) = active.replace(handle) {
            tracing::debug!(
                generation = orphan.generation(),
                "replacing handle of a render task that already finished or was abandoned"
            );
        }
        drop(active);

        tracing::info!(%mode, generation, "playback started");
        if sound {
            self.terminal.beep(Tone::Short);
        }
        Ok(true)
    }

    /// Clears `running` and waits up to the grace period for the task.
    ///
    /// Safe to call when nothing is running.
    pub fn stop(&self) {
        let mut active = self.active.lock();
        let sound = self.state.update(|s| {
            s.running = false;
            s.paused = false;
            s.sound
        });

        if let Some(handle) = active.take() {
            let generation = handle.generation();
            let mode = handle.mode();
            if handle.join_within(self.timing.stop_grace) {
                tracing::info!(mode, generation, "playback stopped");
            } else {
                tracing::warn!(
                    mode,
                    generation,
                    grace = ?self.timing.stop_grace,
                    "render task still busy after grace period, leaving it to exit on its own"
                );
            }
        }
        drop(active);

        if sound {
            self.terminal.beep(Tone::Long);
        }
    }

    /// Returns whether the pause flag changed.
    pub fn pause(&self) -> bool {
        self.state.update(|s| {
            let changed = s.running && !s.paused;
            if changed {
                s.paused = true;
            }
            changed
        })
    }

    pub fn resume(&self) -> bool {
        self.state.update(|s| {
            let changed = s.running && s.paused;
            if changed {
                s.paused = false;
            }
            changed
        })
    }

    /// Flips `paused` while running; returns the new value.
    pub fn toggle_pause(&self) -> Option<bool> {
        self.state.update(|s| {
            if s.running {
                s.paused = !s.paused;
                Some(s.paused)
            } else {
                None
            }
        })
    }

    pub fn is_running(&self) -> bool {
        self.state.read(|s| s.running)
    }

    fn abort_launch(&self, generation: u64) {
        self.state.update(|s| {
            if s.generation == generation {
                s.running = false;
            }
        });
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("renderers", &self.renderers)
            .field("timing", &self.timing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{state::PlaybackState, terminal::MemoryTerminal};

    fn controller() -> (PlaybackController, MemoryTerminal) {
        let terminal = MemoryTerminal::new(60);
        let state = SharedState::new(PlaybackState {
            frame_delay: 0.01,
            ..PlaybackState::default()
        });
        let controller = PlaybackController::new(
            state,
            Arc::new(RendererSet::builtin()),
            Arc::new(terminal.clone()),
            TimingConfig {
                pause_poll: Duration::from_millis(10),
                ..TimingConfig::default()
            },
        );
        (controller, terminal)
    }

    #[test]
    fn repeated_start_keeps_a_single_task() {
        let (controller, _terminal) = controller();
        assert!(controller.start(None).unwrap());
        for _ in 0..5 {
            assert!(!controller.start(None).unwrap());
        }

        let state = controller.state().snapshot();
        assert_eq!(state.generation, 1);
        assert_eq!(state.live_tasks, 1);

        controller.stop();
        assert_eq!(controller.state().read(|s| s.live_tasks), 0);
    }

    #[test]
    fn start_while_running_does_not_switch_mode() {
        let (controller, _terminal) = controller();
        assert!(controller.start(Some("Wave")).unwrap());
        assert!(!controller.start(Some("Matrix")).unwrap());

        let state = controller.state().snapshot();
        assert_eq!(state.mode, "Wave");
        assert_eq!(state.live_tasks, 1);
        controller.stop();
    }

    #[test]
    fn stop_clears_running_and_pause() {
        let (controller, _terminal) = controller();
        controller.start(Some("Matrix")).unwrap();
        assert!(controller.pause());
        controller.stop();

        let state = controller.state().snapshot();
        assert!(!state.running);
        assert!(!state.paused);
    }

    #[test]
    fn stop_without_task_still_acknowledges() {
        let (controller, terminal) = controller();
        controller.stop();
        controller.stop();
        assert_eq!(terminal.beeps(), 2);
    }

    #[test]
    fn pause_and_resume_are_noops_when_idle() {
        let (controller, _terminal) = controller();
        assert!(!controller.pause());
        assert!(!controller.resume());
        assert_eq!(controller.toggle_pause(), None);
        assert!(!controller.state().read(|s| s.paused));
    }

    #[test]
    fn pause_keeps_task_and_frame_counter() {
        let (controller, _terminal) = controller();
        controller.start(Some("Loading")).unwrap();
        let state = controller.state().clone();
        assert!(state.wait_for(Duration::from_secs(2), |s| s.frames >= 2));

        assert!(controller.pause());
        std::thread::sleep(Duration::from_millis(50));
        let frozen = state.read(|s| s.frames);
        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(state.read(|s| s.frames), frozen);

        assert!(controller.resume());
        assert!(state.wait_for(Duration::from_secs(2), |s| s.frames > frozen));
        let resumed = state.snapshot();
        assert!(resumed.running);
        assert_eq!(resumed.generation, 1);

        controller.stop();
    }

    #[test]
    fn unknown_mode_is_rejected_without_side_effects() {
        let (controller, terminal) = controller();
        let err = controller.start(Some("Plasma")).unwrap_err();
        assert!(matches!(err, AnimationError::UnknownMode(_)));

        let state = controller.state().snapshot();
        assert!(!state.running);
        assert_eq!(state.mode, "Wave");
        assert_eq!(terminal.beeps(), 0);
    }

    #[test]
    fn silent_when_sound_disabled() {
        let (controller, terminal) = controller();
        controller.state().update(|s| s.sound = false);
        controller.start(None).unwrap();
        controller.stop();
        assert_eq!(terminal.beeps(), 0);
    }
}
