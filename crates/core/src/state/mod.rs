use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use crate::{
    config::{clamp_auto_interval, clamp_frame_delay, saturating_secs, PlaybackDefaults},
    terminal::{ColorPolicy, NeonColor, Palette},
};

/// Why a render task stopped producing frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
    /// `running` was cleared or the task was superseded.
    Stopped,
    /// The frame generator failed; carries the reported reason.
    Failed(String),
}

/// The parameter block shared by the controller, the auto-cycle
/// supervisor and the active render task.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub running: bool,
    pub paused: bool,
    /// Generation of the most recently started render task.
    pub generation: u64,
    pub mode: String,
    /// Seconds between frames; always at least `MIN_FRAME_DELAY`.
    pub frame_delay: f64,
    pub color_policy: ColorPolicy,
    pub single_color: NeonColor,
    pub sound: bool,
    pub auto_enabled: bool,
    pub auto_interval: u64,
    pub auto_random: bool,
    /// Set while an auto-cycle loop thread is alive.
    pub auto_loop_active: bool,
    /// Frames produced by the current render task.
    pub frames: u64,
    /// Render task threads that have not returned yet.
    pub live_tasks: usize,
    /// Exit reason of the most recent task of `generation`.
    pub last_exit: Option<TaskExit>,
}

impl PlaybackState {
    pub fn new(defaults: &PlaybackDefaults) -> Self {
        Self {
            running: false,
            paused: false,
            generation: 0,
            mode: defaults.mode.clone(),
            frame_delay: clamp_frame_delay(defaults.frame_delay),
            color_policy: defaults.color_policy,
            single_color: defaults.single_color,
            sound: defaults.sound,
            auto_enabled: false,
            auto_interval: clamp_auto_interval(defaults.auto_interval),
            auto_random: defaults.auto_random,
            auto_loop_active: false,
            frames: 0,
            live_tasks: 0,
            last_exit: None,
        }
    }

    /// True while the task of `generation` is allowed to keep rendering.
    pub fn is_current(&self, generation: u64) -> bool {
        self.running && self.generation == generation
    }

    pub fn frame_delay(&self) -> Duration {
        saturating_secs(self.frame_delay)
    }

    pub fn palette(&self) -> Palette {
        Palette {
            policy: self.color_policy,
            single: self.single_color,
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new(&PlaybackDefaults::default())
    }
}

struct Inner {
    state: Mutex<PlaybackState>,
    changed: Condvar,
}

/// Cloneable handle to one [`PlaybackState`] guarded by a single mutex.
///
/// Every mutation made through [`SharedState::update`] wakes all waiters, so
/// cooperative loops blocked in [`SharedState::wait_for`] observe flag changes
/// without polling.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Inner>,
}

impl SharedState {
    pub fn new(state: PlaybackState) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn from_defaults(defaults: &PlaybackDefaults) -> Self {
        Self::new(PlaybackState::new(defaults))
    }

    /// Applies `f` under the lock and notifies waiters.
    pub fn update<R>(&self, f: impl FnOnce(&mut PlaybackState) -> R) -> R {
        let result = {
            let mut guard = self.inner.state.lock();
            f(&mut *guard)
        };
        self.inner.changed.notify_all();
        result
    }

    /// Reads under the lock without notifying anyone.
    pub fn read<R>(&self, f: impl FnOnce(&PlaybackState) -> R) -> R {
        f(&*self.inner.state.lock())
    }

    /// Copy of the whole block, for display.
    pub fn snapshot(&self) -> PlaybackState {
        self.inner.state.lock().clone()
    }

    /// Blocks until `until` holds or `timeout` elapses.
    ///
    /// Returns the final value of the predicate. A timeout too large to
    /// express as an `Instant` waits without a deadline.
    pub fn wait_for(
        &self,
        timeout: Duration,
        mut until: impl FnMut(&PlaybackState) -> bool,
    ) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut guard = self.inner.state.lock();
        loop {
            if until(&*guard) {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .inner
                        .changed
                        .wait_until(&mut guard, deadline)
                        .timed_out()
                    {
                        return until(&*guard);
                    }
                }
                None => self.inner.changed.wait(&mut guard),
            }
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(PlaybackState::default())
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::config::MIN_FRAME_DELAY;

    #[test]
    fn defaults_are_clamped_on_construction() {
        let defaults = PlaybackDefaults {
            frame_delay: 0.0,
            auto_interval: 0,
            ..PlaybackDefaults::default()
        };
        let state = PlaybackState::new(&defaults);
        assert_eq!(state.frame_delay, MIN_FRAME_DELAY);
        assert_eq!(state.auto_interval, 1);
        assert!(!state.running);
    }

    #[test]
    fn superseded_generation_is_not_current() {
        let mut state = PlaybackState::default();
        state.running = true;
        state.generation = 2;
        assert!(state.is_current(2));
        assert!(!state.is_current(1));
        state.running = false;
        assert!(!state.is_current(2));
    }

    #[test]
    fn waiters_wake_on_update() {
        let shared = SharedState::default();
        shared.update(|s| s.running = true);

        let waker = shared.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            waker.update(|s| s.running = false);
        });

        let started = Instant::now();
        assert!(shared.wait_for(Duration::from_secs(5), |s| !s.running));
        assert!(started.elapsed() < Duration::from_secs(2));
        handle.join().unwrap();
    }

    #[test]
    fn unbounded_wait_still_wakes_on_update() {
        let shared = SharedState::default();
        let waker = shared.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            waker.update(|s| s.paused = true);
        });

        assert!(shared.wait_for(Duration::MAX, |s| s.paused));
        handle.join().unwrap();
    }

    #[test]
    fn oversized_frame_delay_saturates() {
        let state = PlaybackState {
            frame_delay: 1e20,
            ..PlaybackState::default()
        };
        assert_eq!(state.frame_delay(), Duration::MAX);
    }

    #[test]
    fn wait_times_out_with_false_predicate() {
        let shared = SharedState::default();
        assert!(!shared.wait_for(Duration::from_millis(10), |s| s.running));
    }
}
