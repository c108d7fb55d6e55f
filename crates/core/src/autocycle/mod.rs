//! Timed switching between modes without operator input.

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use rand::{seq::SliceRandom, Rng};

use crate::{
    playback::PlaybackController,
    state::{PlaybackState, SharedState, TaskExit},
    Result,
};

/// Picks the next mode to play.
#[derive(Debug, Clone)]
pub struct ModeSequence {
    names: Vec<&'static str>,
    cursor: usize,
}

impl ModeSequence {
    pub fn new(names: Vec<&'static str>) -> Self {
        Self { names, cursor: 0 }
    }

    /// Next mode in round-robin order, or a uniform pick when `random`.
    pub fn next<R: Rng + ?Sized>(&mut self, random: bool, rng: &mut R) -> Option<&'static str> {
        if random {
            return self.names.choose(rng).copied();
        }
        let name = self.names.get(self.cursor % self.names.len().max(1)).copied();
        self.cursor = self.cursor.wrapping_add(1);
        name
    }
}

/// How an interval wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    Elapsed,
    Disabled,
    RenderFailed,
}

/// Launches and signals the auto-cycle loop.
///
/// At most one loop thread exists at a time; `auto_loop_active` in the shared
/// state is set by [`AutoCycle::start`] and cleared by the loop itself in the
/// same locked step that observes `auto_enabled == false`.
#[derive(Debug, Clone)]
pub struct AutoCycle {
    controller: Arc<PlaybackController>,
    poll: Duration,
}

impl AutoCycle {
    pub fn new(controller: Arc<PlaybackController>, poll: Duration) -> Self {
        Self { controller, poll }
    }

    /// Enables auto-cycling; returns `true` if a new loop thread was launched.
    pub fn start(&self) -> Result<bool> {
        let state = self.controller.state().clone();
        let launch = state.update(|s| {
            s.auto_enabled = true;
            if s.auto_loop_active {
                false
            } else {
                s.auto_loop_active = true;
                true
            }
        });
        if !launch {
            return Ok(false);
        }

        let controller = Arc::clone(&self.controller);
        let poll = self.poll;
        let spawned = thread::Builder::new()
            .name("auto-cycle".to_string())
            .spawn(move || run_loop(&controller, poll));
        if let Err(err) = spawned {
            state.update(|s| {
                s.auto_enabled = false;
                s.auto_loop_active = false;
            });
            return Err(err.into());
        }
        tracing::info!("auto-cycle started");
        Ok(true)
    }

    /// Asks the loop to finish; the current mode keeps playing.
    pub fn stop(&self) {
        let was_enabled = self.controller.state().update(|s| {
            let was = s.auto_enabled;
            s.auto_enabled = false;
            was
        });
        if was_enabled {
            tracing::info!("auto-cycle stopping");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.controller.state().read(|s| s.auto_enabled)
    }

    /// Waits up to `timeout` for the loop thread to return.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.controller
            .state()
            .wait_for(timeout, |s| !s.auto_loop_active)
    }
}

/// Releases the loop slot if the loop thread unwinds.
struct LoopGuard<'a>(&'a SharedState);

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::warn!("auto-cycle loop panicked");
            self.0.update(|s| {
                s.auto_enabled = false;
                s.auto_loop_active = false;
            });
        }
    }
}

fn run_loop(controller: &PlaybackController, poll: Duration) {
    let state = controller.state();
    let _guard = LoopGuard(state);
    let mut sequence = ModeSequence::new(controller.renderers().names());
    let mut rng = rand::thread_rng();

    loop {
        let settings = state.update(|s| {
            if s.auto_enabled {
                Some((s.auto_random, s.auto_interval))
            } else {
                s.auto_loop_active = false;
                None
            }
        });
        let Some((random, interval)) = settings else {
            break;
        };
        let Some(next) = sequence.next(random, &mut rng) else {
            tracing::warn!("auto-cycle has no modes to play");
            state.update(|s| {
                s.auto_enabled = false;
                s.auto_loop_active = false;
            });
            break;
        };

        controller.stop();
        if let Err(err) = controller.start(Some(next)) {
            tracing::warn!(mode = next, error = %err, "auto-cycle could not start mode");
        }
        let generation = state.read(|s| s.generation);
        tracing::debug!(mode = next, generation, interval, "auto-cycle switched mode");

        match wait_interval(state, generation, Duration::from_secs(interval), poll) {
            WaitOutcome::RenderFailed => {
                tracing::warn!(mode = next, "renderer failed, advancing auto-cycle early");
            }
            WaitOutcome::Elapsed | WaitOutcome::Disabled => {}
        }
    }
    tracing::info!("auto-cycle stopped");
}

fn render_failed(s: &PlaybackState, generation: u64) -> bool {
    s.generation == generation && matches!(s.last_exit, Some(TaskExit::Failed(_)))
}

fn wait_interval(
    state: &SharedState,
    generation: u64,
    interval: Duration,
    poll: Duration,
) -> WaitOutcome {
    let deadline = Instant::now().checked_add(interval);
    loop {
        let slice = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return WaitOutcome::Elapsed;
                }
                (deadline - now).min(poll)
            }
            None => poll,
        };
        state.wait_for(slice, |s| !s.auto_enabled || render_failed(s, generation));

        let (enabled, failed) = state.read(|s| (s.auto_enabled, render_failed(s, generation)));
        if !enabled {
            return WaitOutcome::Disabled;
        }
        if failed {
            return WaitOutcome::RenderFailed;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, RngCore, SeedableRng};

    use super::*;
    use crate::{
        config::TimingConfig,
        render::{Animation, FrameContext, RendererSet},
        terminal::MemoryTerminal,
        AnimationError,
    };

    const NAMES: [&str; 4] = ["Wave", "Matrix", "Particles", "Loading"];

    struct Failing(&'static str);

    impl Animation for Failing {
        fn name(&self) -> &'static str {
            self.0
        }

        fn draw(
            &self,
            _ctx: &FrameContext,
            _rng: &mut dyn RngCore,
            _out: &mut String,
        ) -> crate::Result<()> {
            Err(AnimationError::render(self.0, "broken on purpose"))
        }
    }

    fn auto_cycle(renderers: RendererSet, interval: u64) -> AutoCycle {
        let state = SharedState::new(PlaybackState {
            frame_delay: 0.01,
            auto_interval: interval,
            auto_random: false,
            sound: false,
            ..PlaybackState::default()
        });
        let controller = PlaybackController::new(
            state,
            Arc::new(renderers),
            Arc::new(MemoryTerminal::new(40)),
            TimingConfig::default(),
        );
        AutoCycle::new(Arc::new(controller), Duration::from_millis(50))
    }

    #[test]
    fn round_robin_visits_every_mode_once_before_repeating() {
        let mut sequence = ModeSequence::new(NAMES.to_vec());
        let mut rng = StdRng::seed_from_u64(3);

        let first_pass: Vec<_> = (0..NAMES.len())
            .map(|_| sequence.next(false, &mut rng).unwrap())
            .collect();
        assert_eq!(first_pass, NAMES.to_vec());
        assert_eq!(sequence.next(false, &mut rng), Some("Wave"));
    }

    #[test]
    fn random_order_only_picks_registered_names() {
        let mut sequence = ModeSequence::new(NAMES.to_vec());
        let mut rng = StdRng::seed_from_u64(11);
        let known: HashSet<_> = NAMES.into_iter().collect();
        for _ in 0..50 {
            assert!(known.contains(sequence.next(true, &mut rng).unwrap()));
        }
    }

    #[test]
    fn empty_sequence_yields_nothing() {
        let mut sequence = ModeSequence::new(Vec::new());
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(sequence.next(false, &mut rng), None);
        assert_eq!(sequence.next(true, &mut rng), None);
    }

    #[test]
    fn disabling_exits_loop_and_keeps_last_mode_playing() {
        let auto = auto_cycle(RendererSet::builtin(), 60);
        let state = auto.controller.state().clone();

        assert!(auto.start().unwrap());
        assert!(!auto.start().unwrap());
        assert!(state.wait_for(Duration::from_secs(2), |s| s.running));
        assert_eq!(state.read(|s| s.mode.clone()), "Wave");

        auto.stop();
        assert!(auto.wait_idle(Duration::from_secs(2)));
        assert!(state.read(|s| s.running));

        auto.controller.stop();
    }

    #[test]
    fn huge_interval_can_be_stopped_and_restarted() {
        let auto = auto_cycle(RendererSet::builtin(), 60);
        let state = auto.controller.state().clone();
        state.update(|s| s.auto_interval = u64::MAX);

        assert!(auto.start().unwrap());
        assert!(state.wait_for(Duration::from_secs(2), |s| s.running));
        auto.stop();
        assert!(auto.wait_idle(Duration::from_secs(2)));

        assert!(auto.start().unwrap());
        auto.stop();
        assert!(auto.wait_idle(Duration::from_secs(2)));
        auto.controller.stop();
    }

    #[test]
    fn interval_wait_without_deadline_ends_when_disabled() {
        let state = SharedState::new(PlaybackState {
            auto_enabled: true,
            ..PlaybackState::default()
        });
        let switch = state.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            switch.update(|s| s.auto_enabled = false);
        });

        let outcome = wait_interval(&state, 0, Duration::MAX, Duration::from_millis(10));
        assert_eq!(outcome, WaitOutcome::Disabled);
        handle.join().unwrap();
    }

    #[test]
    fn panicking_loop_releases_its_slot() {
        let state = SharedState::new(PlaybackState {
            auto_enabled: true,
            auto_loop_active: true,
            ..PlaybackState::default()
        });
        let inner = state.clone();
        let result = thread::spawn(move || {
            let _guard = LoopGuard(&inner);
            panic!("loop body failed");
        })
        .join();

        assert!(result.is_err());
        let after = state.snapshot();
        assert!(!after.auto_loop_active);
        assert!(!after.auto_enabled);
    }

    #[test]
    fn renderer_failure_advances_without_waiting_for_interval() {
        let mut renderers = RendererSet::new();
        renderers.register(Arc::new(Failing("First")));
        renderers.register(Arc::new(Failing("Second")));
        let auto = auto_cycle(renderers, 60);
        let state = auto.controller.state().clone();

        auto.start().unwrap();
        assert!(state.wait_for(Duration::from_secs(5), |s| s.generation >= 3));
        auto.stop();
        assert!(auto.wait_idle(Duration::from_secs(2)));
        auto.controller.stop();
    }
}
