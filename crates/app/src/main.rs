mod menu;

use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use clap::{Parser, Subcommand};
use console_animation_core::{Engine, EngineConfig, PresetStore, RendererSet};
use tracing_subscriber::EnvFilter;

use crate::menu::Menu;

fn main() -> console_animation_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Menu { preset: None }) {
        Commands::Menu { preset } => run_menu(cli.presets, preset.as_deref()),
        Commands::Play {
            mode,
            seconds,
            speed,
            auto,
            no_sound,
            preset,
        } => run_play(
            cli.presets,
            PlayOptions {
                mode,
                seconds,
                speed,
                auto,
                no_sound,
                preset,
            },
        ),
        Commands::Modes => {
            for name in RendererSet::builtin().names() {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Presets => {
            let store = PresetStore::open(cli.presets);
            if store.is_empty() {
                println!("[no presets saved in {}]", store.path().display());
            }
            for name in store.names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn run_menu(presets: PathBuf, preset: Option<&str>) -> console_animation_core::Result<()> {
    tracing::info!(presets = %presets.display(), preset, "starting interactive menu");

    let engine = Arc::new(Engine::new(EngineConfig::with_preset_path(presets)));
    if let Some(name) = preset {
        if let Err(err) = engine.load_preset(name) {
            eprintln!("{err}");
        }
    }
    install_interrupt_handler(&engine);

    let stdin = io::stdin();
    let mut menu = Menu::new(&engine, stdin.lock(), io::stdout());
    menu.run()
}

struct PlayOptions {
    mode: Option<String>,
    seconds: u64,
    speed: Option<f64>,
    auto: bool,
    no_sound: bool,
    preset: Option<String>,
}

fn run_play(presets: PathBuf, options: PlayOptions) -> console_animation_core::Result<()> {
    tracing::info!(mode = ?options.mode, seconds = options.seconds, "starting headless playback");

    let mut config = EngineConfig::with_preset_path(presets);
    config.playback.sound = !options.no_sound;
    let engine = Arc::new(Engine::new(config));
    install_interrupt_handler(&engine);

    if let Some(name) = &options.preset {
        engine.load_preset(name)?;
    }
    if let Some(speed) = options.speed {
        engine.set_speed(speed)?;
    }
    if options.auto {
        engine.start_auto_cycle()?;
    } else {
        engine.start(options.mode.as_deref())?;
    }

    // Returns early if the renderer gives up on its own.
    let deadline = Duration::from_secs(options.seconds);
    engine
        .state()
        .wait_for(deadline, |s| !s.running && !s.auto_enabled);

    engine.shutdown();
    let mut out = io::stdout();
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Ctrl-C runs the same orderly shutdown as the exit command.
fn install_interrupt_handler(engine: &Arc<Engine>) {
    let engine = Arc::clone(engine);
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Stopping...");
        engine.shutdown();
        eprintln!("Goodbye.");
        std::process::exit(130);
    }) {
        tracing::warn!(error = %err, "failed to install Ctrl-C handler");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Neon ANSI animations for your terminal", long_about = None)]
struct Cli {
    /// Preset file to read and write.
    #[arg(long, global = true, default_value = "presets.json")]
    presets: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the interactive menu (the default).
    Menu {
        /// Preset to load on startup.
        #[arg(short, long)]
        preset: Option<String>,
    },
    /// Play without the menu for a fixed number of seconds.
    Play {
        /// Mode to play; defaults to Wave.
        mode: Option<String>,
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
        /// Seconds per frame.
        #[arg(long)]
        speed: Option<f64>,
        /// Cycle through modes instead of playing one.
        #[arg(long)]
        auto: bool,
        #[arg(long)]
        no_sound: bool,
        /// Preset to apply before playing.
        #[arg(short, long)]
        preset: Option<String>,
    },
    /// List the available animation modes.
    Modes,
    /// List saved presets.
    Presets,
}
