//! Core library for the Console Animation player.
//!
//! The crate owns the animation execution and control engine: a registry of
//! procedural ANSI animations, the controller that keeps at most one render
//! task alive, the auto-cycle supervisor that switches modes on a timer, and
//! the preset snapshots that capture and restore the tunable parameters. All
//! of them share one [`SharedState`] handle instead of process-wide globals,
//! so several engines can coexist in tests.

pub mod autocycle;
pub mod config;
pub mod engine;
pub mod error;
pub mod playback;
pub mod preset;
pub mod render;
pub mod state;
pub mod terminal;

pub use autocycle::{AutoCycle, ModeSequence};
pub use config::{
    EngineConfig, PlaybackDefaults, TimingConfig, MAX_AUTO_INTERVAL, MAX_FRAME_DELAY,
    MIN_FRAME_DELAY,
};
pub use engine::{Engine, Status};
pub use error::{AnimationError, Result};
pub use playback::PlaybackController;
pub use preset::{PresetSnapshot, PresetStore};
pub use render::{Animation, FrameContext, RendererSet, TaskHandle};
pub use state::{PlaybackState, SharedState, TaskExit};
pub use terminal::{AnsiTerminal, ColorPolicy, MemoryTerminal, NeonColor, Palette, Terminal, Tone};
