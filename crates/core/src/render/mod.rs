//! Animation registry and the cooperative render loop shared by every mode.

mod modes;

use std::{
    any::Any,
    io::Write,
    panic::{self, AssertUnwindSafe},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

use rand::{rngs::StdRng, RngCore, SeedableRng};

pub use modes::{Equalizer, Flames, Glitch, Loading, Matrix, Particles, Spiral, Wave};

use crate::{
    state::{SharedState, TaskExit},
    terminal::{clear_screen, Palette},
    AnimationError, Result,
};

/// Inputs available to a frame generator.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    /// Monotonic frame counter, starting at zero for each task.
    pub frame: u64,
    /// Terminal width captured when the task started.
    pub width: usize,
    pub palette: Palette,
}

/// One animation style.
///
/// Implementations are stateless: a frame is a function of the context and
/// the randomness source only.
pub trait Animation: Send + Sync {
    fn name(&self) -> &'static str;

    /// Appends one frame of text to `out`.
    fn draw(&self, ctx: &FrameContext, rng: &mut dyn RngCore, out: &mut String) -> Result<()>;

    /// Pause after a frame, given the configured frame delay.
    fn pace(&self, delay: Duration, _rng: &mut dyn RngCore) -> Duration {
        delay
    }
}

/// Ordered registry of animations keyed by name.
#[derive(Clone, Default)]
pub struct RendererSet {
    animations: Vec<Arc<dyn Animation>>,
}

impl RendererSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The eight built-in modes in menu order.
    pub fn builtin() -> Self {
        let mut set = Self::new();
        set.register(Arc::new(Wave));
        set.register(Arc::new(Matrix));
        set.register(Arc::new(Particles));
        set.register(Arc::new(Loading));
        set.register(Arc::new(Spiral));
        set.register(Arc::new(Flames));
        set.register(Arc::new(Equalizer));
        set.register(Arc::new(Glitch));
        set
    }

    /// Adds an animation, replacing any existing one with the same name.
    pub fn register(&mut self, animation: Arc<dyn Animation>) {
        match self
            .animations
            .iter()
            .position(|existing| existing.name() == animation.name())
        {
            Some(index) => self.animations[index] = animation,
            None => self.animations.push(animation),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Animation>> {
        self.animations
            .iter()
            .find(|animation| animation.name() == name)
            .cloned()
    }

    /// Canonical name for user input, ignoring case and surrounding space.
    pub fn resolve(&self, name: &str) -> Result<&'static str> {
        let wanted = name.trim();
        self.animations
            .iter()
            .map(|animation| animation.name())
            .find(|candidate| candidate.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| AnimationError::UnknownMode(wanted.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.animations.iter().map(|animation| animation.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

impl std::fmt::Debug for RendererSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererSet")
            .field("modes", &self.names())
            .finish()
    }
}

/// Everything a render task needs at launch.
pub struct TaskSpec {
    pub generation: u64,
    pub animation: Arc<dyn Animation>,
    pub output: Box<dyn Write + Send>,
    pub width: usize,
    pub pause_poll: Duration,
}

/// Ownership token for a running render task.
#[derive(Debug)]
pub struct TaskHandle {
    generation: u64,
    mode: &'static str,
    done: mpsc::Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mode(&self) -> &'static str {
        self.mode
    }

    /// Waits up to `grace` for the task to return.
    ///
    /// Returns `false` when the grace period ran out. The task is left to
    /// notice the cleared flag on its own.
    pub fn join_within(mut self, grace: Duration) -> bool {
        match self.done.recv_timeout(grace) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if let Some(thread) = self.thread.take() {
                    let _ = thread.join();
                }
                true
            }
            Err(mpsc::RecvTimeoutError::Timeout) => false,
        }
    }
}

/// Launches the render loop for `spec` on its own thread.
///
/// The caller must already have set `running` and bumped `generation` under
/// the state lock.
pub fn spawn_render_task(state: SharedState, spec: TaskSpec) -> Result<TaskHandle> {
    let generation = spec.generation;
    let mode = spec.animation.name();
    let (done_tx, done_rx) = mpsc::channel();

    state.update(|s| s.live_tasks += 1);
    let task_state = state.clone();
    let spawned = thread::Builder::new()
        .name(format!("render-{mode}"))
        .spawn(move || {
            let exit = run_guarded(&task_state, spec);
            task_state.update(|s| {
                s.live_tasks = s.live_tasks.saturating_sub(1);
                if s.generation == generation {
                    s.running = false;
                    s.paused = false;
                    s.last_exit = Some(exit);
                }
            });
            let _ = done_tx.send(());
        });

    match spawned {
        Ok(thread) => Ok(TaskHandle {
            generation,
            mode,
            done: done_rx,
            thread: Some(thread),
        }),
        Err(err) => {
            state.update(|s| s.live_tasks = s.live_tasks.saturating_sub(1));
            Err(err.into())
        }
    }
}

/// Runs the frame loop, turning errors and panics into a [`TaskExit`].
fn run_guarded(state: &SharedState, spec: TaskSpec) -> TaskExit {
    let mode = spec.animation.name();
    let generation = spec.generation;
    tracing::debug!(mode, generation, "render task started");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| render_frames(state, spec)));
    let exit = match outcome {
        Ok(Ok(())) => TaskExit::Stopped,
        Ok(Err(err)) => TaskExit::Failed(err.to_string()),
        Err(payload) => TaskExit::Failed(panic_message(payload.as_ref())),
    };

    match &exit {
        TaskExit::Stopped => tracing::debug!(mode, generation, "render task finished"),
        TaskExit::Failed(reason) => {
            tracing::warn!(mode, generation, %reason, "render task failed")
        }
    }
    exit
}

fn render_frames(state: &SharedState, spec: TaskSpec) -> Result<()> {
    let TaskSpec {
        generation,
        animation,
        mut output,
        width,
        pause_poll,
    } = spec;
    let mut rng = StdRng::from_entropy();
    let mut frame = 0u64;
    let mut text = String::new();

    loop {
        let (current, paused, delay, palette) = state.read(|s| {
            (
                s.is_current(generation),
                s.paused,
                s.frame_delay(),
                s.palette(),
            )
        });
        if !current {
            return Ok(());
        }
        if paused {
            state.wait_for(pause_poll, |s| !s.is_current(generation) || !s.paused);
            continue;
        }

        let ctx = FrameContext {
            frame,
            width,
            palette,
        };
        text.clear();
        animation.draw(&ctx, &mut rng, &mut text)?;
        clear_screen(&mut output)?;
        output.write_all(text.as_bytes())?;
        output.flush()?;

        frame += 1;
        state.update(|s| {
            if s.generation == generation {
                s.frames = frame;
            }
        });

        let pause = animation.pace(delay, &mut rng);
        state.wait_for(pause, |s| !s.is_current(generation));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "render task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        state::PlaybackState,
        terminal::{MemoryTerminal, Terminal},
    };

    struct Broken;

    impl Animation for Broken {
        fn name(&self) -> &'static str {
            "Broken"
        }

        fn draw(
            &self,
            _ctx: &FrameContext,
            _rng: &mut dyn RngCore,
            _out: &mut String,
        ) -> Result<()> {
            Err(AnimationError::render("Broken", "no frames today"))
        }
    }

    struct Panicky;

    impl Animation for Panicky {
        fn name(&self) -> &'static str {
            "Panicky"
        }

        fn draw(
            &self,
            _ctx: &FrameContext,
            _rng: &mut dyn RngCore,
            _out: &mut String,
        ) -> Result<()> {
            panic!("frame generator exploded")
        }
    }

    fn launch(
        state: &SharedState,
        animation: Arc<dyn Animation>,
        terminal: &MemoryTerminal,
    ) -> TaskHandle {
        let generation = state.update(|s| {
            s.running = true;
            s.generation += 1;
            s.generation
        });
        spawn_render_task(
            state.clone(),
            TaskSpec {
                generation,
                animation,
                output: terminal.writer(),
                width: terminal.width(),
                pause_poll: Duration::from_millis(10),
            },
        )
        .unwrap()
    }

    #[test]
    fn builtin_set_lists_modes_in_menu_order() {
        let set = RendererSet::builtin();
        assert_eq!(
            set.names(),
            vec![
                "Wave",
                "Matrix",
                "Particles",
                "Loading",
                "Spiral",
                "Flames",
                "Equalizer",
                "Glitch"
            ]
        );
    }

    #[test]
    fn resolves_names_case_insensitively_and_rejects_unknown() {
        let set = RendererSet::builtin();
        assert_eq!(set.resolve(" matrix ").unwrap(), "Matrix");
        let err = set.resolve("Plasma").unwrap_err();
        assert!(matches!(err, AnimationError::UnknownMode(name) if name == "Plasma"));
    }

    #[test]
    fn registering_same_name_replaces_entry() {
        let mut set = RendererSet::builtin();
        set.register(Arc::new(Wave));
        assert_eq!(set.len(), 8);
    }

    #[test]
    fn render_task_produces_frames_until_stopped() {
        let state = SharedState::new(PlaybackState {
            frame_delay: 0.005,
            ..PlaybackState::default()
        });
        let terminal = MemoryTerminal::new(40);
        let handle = launch(&state, Arc::new(Loading), &terminal);

        assert!(state.wait_for(Duration::from_secs(2), |s| s.frames >= 3));
        state.update(|s| s.running = false);
        assert!(handle.join_within(Duration::from_secs(1)));

        let final_state = state.snapshot();
        assert_eq!(final_state.live_tasks, 0);
        assert_eq!(final_state.last_exit, Some(TaskExit::Stopped));
        assert!(terminal.contents().contains("Loading"));
    }

    #[test]
    fn draw_error_clears_running_and_records_failure() {
        let state = SharedState::default();
        let terminal = MemoryTerminal::default();
        let handle = launch(&state, Arc::new(Broken), &terminal);

        assert!(handle.join_within(Duration::from_secs(1)));
        let final_state = state.snapshot();
        assert!(!final_state.running);
        assert!(matches!(
            final_state.last_exit,
            Some(TaskExit::Failed(reason)) if reason.contains("no frames today")
        ));
    }

    #[test]
    fn panic_in_generator_is_contained() {
        let state = SharedState::default();
        let terminal = MemoryTerminal::default();
        let handle = launch(&state, Arc::new(Panicky), &terminal);

        assert!(handle.join_within(Duration::from_secs(1)));
        let final_state = state.snapshot();
        assert!(!final_state.running);
        assert!(matches!(
            final_state.last_exit,
            Some(TaskExit::Failed(reason)) if reason.contains("exploded")
        ));
    }

    #[test]
    fn superseded_task_exits_without_touching_running() {
        let state = SharedState::default();
        let terminal = MemoryTerminal::default();
        let old = launch(&state, Arc::new(Loading), &terminal);
        // A newer generation takes over while `running` stays set.
        let new = launch(&state, Arc::new(Loading), &terminal);

        assert!(old.join_within(Duration::from_secs(1)));
        assert!(state.read(|s| s.running));

        state.update(|s| s.running = false);
        assert!(new.join_within(Duration::from_secs(1)));
    }
}
