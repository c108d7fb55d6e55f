//! Numbered text menu driving the engine from stdin.

use std::{
    io::{BufRead, Write},
    thread,
    time::Duration,
};

use console_animation_core::{
    terminal::clear_screen, AnimationError, ColorPolicy, Engine, NeonColor, Result,
};

const TITLE: &str = "\x1b[95m=== CONSOLE ANIMATION PRO v2 ===\x1b[0m";

const OPTIONS: &[&str] = &[
    "1) Start Mode",
    "2) Stop",
    "3) Pause",
    "4) Resume",
    "5) Choose Mode",
    "6) Toggle Sound",
    "7) Color Mode (cycle/random/single)",
    "8) Set Single Color (ANSI code index 0..5)",
    "9) Speed (seconds per frame)",
    "10) Auto Mode Start/Stop",
    "11) Auto settings (interval/random)",
    "12) Preset: Save",
    "13) Preset: Load",
    "14) Preset: Delete",
    "15) Preset: List",
    "16) Toggle Pause While Running",
    "0) Exit",
];

enum Flow {
    Continue,
    Exit,
}

pub struct Menu<'a, R, W> {
    engine: &'a Engine,
    input: R,
    output: W,
    /// Pause after a message so it stays readable before the redraw.
    settle: Duration,
    clear: bool,
}

impl<'a, R: BufRead, W: Write> Menu<'a, R, W> {
    pub fn new(engine: &'a Engine, input: R, output: W) -> Self {
        Self {
            engine,
            input,
            output,
            settle: Duration::from_millis(600),
            clear: true,
        }
    }

    /// Runs until the operator exits or input ends, then shuts the engine
    /// down.
    pub fn run(&mut self) -> Result<()> {
        let outcome = self.run_loop();
        let farewell = writeln!(self.output, "Exiting...");
        self.engine.shutdown();
        farewell?;
        writeln!(self.output, "Goodbye.")?;
        self.output.flush()?;
        outcome
    }

    fn run_loop(&mut self) -> Result<()> {
        loop {
            self.draw()?;
            let Some(choice) = self.prompt("\nSelect > ")? else {
                return Ok(());
            };
            if let Flow::Exit = self.dispatch(&choice)? {
                return Ok(());
            }
        }
    }

    fn draw(&mut self) -> Result<()> {
        if self.clear {
            clear_screen(&mut self.output)?;
        }
        writeln!(self.output, "{TITLE}")?;
        writeln!(self.output, "{}", self.engine.status())?;
        writeln!(self.output)?;
        for option in OPTIONS {
            writeln!(self.output, "{option}")?;
        }
        writeln!(
            self.output,
            "\nAvailable Modes: {}",
            self.engine.modes().join(", ")
        )?;
        Ok(())
    }

    /// Prints `label` and reads one trimmed line; `None` at end of input.
    fn prompt(&mut self, label: &str) -> Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn dispatch(&mut self, choice: &str) -> Result<Flow> {
        let outcome = match choice {
            "1" => self.engine.start(None).map(|_| ()),
            "2" => {
                self.engine.stop();
                Ok(())
            }
            "3" => {
                self.engine.pause();
                Ok(())
            }
            "4" => {
                self.engine.resume();
                Ok(())
            }
            "5" => self.choose_mode(),
            "6" => {
                let sound = self.engine.toggle_sound();
                self.say(&format!("Sound set to {}", if sound { "ON" } else { "OFF" }))
            }
            "7" => self.choose_color_policy(),
            "8" => self.choose_single_color(),
            "9" => self.choose_speed(),
            "10" => self.toggle_auto_cycle(),
            "11" => self.choose_auto_settings(),
            "12" => self.with_preset_name("Preset name to save: ", |engine, name| {
                engine.save_preset(name)?;
                Ok(format!("Preset '{name}' saved."))
            }),
            "13" => self.with_preset_name("Preset name to load: ", |engine, name| {
                engine.load_preset(name)?;
                Ok(format!("Preset '{name}' loaded."))
            }),
            "14" => self.with_preset_name("Preset name to delete: ", |engine, name| {
                engine.delete_preset(name)?;
                Ok(format!("Preset '{name}' deleted."))
            }),
            "15" => self.list_presets(),
            "16" => {
                self.engine.toggle_pause();
                Ok(())
            }
            "0" => return Ok(Flow::Exit),
            _ => self.say("Unknown choice."),
        };

        match outcome {
            Ok(()) => Ok(Flow::Continue),
            Err(AnimationError::Io(err)) => Err(AnimationError::Io(err)),
            // Operator mistakes are reported and the menu carries on.
            Err(err) => {
                tracing::debug!(error = %err, "menu command rejected");
                self.say(&err.to_string())?;
                Ok(Flow::Continue)
            }
        }
    }

    fn choose_mode(&mut self) -> Result<()> {
        let modes = self.engine.modes().join(", ");
        writeln!(self.output, "Modes: {modes}")?;
        let Some(name) = self.prompt("Enter mode name: ")? else {
            return Ok(());
        };
        let mode = self.engine.set_mode(&name)?;
        if !self.engine.start(None)? {
            self.say(&format!("{mode} will play after the current mode is stopped."))?;
        }
        Ok(())
    }

    fn choose_color_policy(&mut self) -> Result<()> {
        let Some(raw) = self.prompt("Enter color mode (cycle/random/single): ")? else {
            return Ok(());
        };
        let policy: ColorPolicy = raw.parse()?;
        self.engine.set_color_policy(policy, None);
        self.say(&format!("Color mode set to {policy}."))
    }

    fn choose_single_color(&mut self) -> Result<()> {
        writeln!(self.output, "Pick single color index:")?;
        for (index, color) in NeonColor::ALL.iter().enumerate() {
            writeln!(self.output, "{index} {}███\x1b[0m {color}", color.ansi())?;
        }
        let Some(raw) = self.prompt("index> ")? else {
            return Ok(());
        };
        let color = self.engine.set_single_color(parse_color_index(&raw)?)?;
        self.say(&format!("Single color set to {color}."))
    }

    fn choose_speed(&mut self) -> Result<()> {
        let Some(raw) = self.prompt("Enter speed (seconds per frame, e.g. 0.05): ")? else {
            return Ok(());
        };
        let delay = self.engine.set_speed(parse_speed(&raw)?)?;
        self.say(&format!("Speed set to {delay:.3}s/frame."))
    }

    fn toggle_auto_cycle(&mut self) -> Result<()> {
        if self.engine.auto_cycle_enabled() {
            self.engine.stop_auto_cycle();
            self.say("Auto mode stopped.")
        } else {
            self.engine.start_auto_cycle()?;
            self.say("Auto mode started.")
        }
    }

    fn choose_auto_settings(&mut self) -> Result<()> {
        let Some(raw) = self.prompt("Auto interval seconds (>1): ")? else {
            return Ok(());
        };
        let interval = parse_interval(&raw)?;
        let Some(answer) = self.prompt("Random order? (y/n): ")? else {
            return Ok(());
        };
        let random = answer.eq_ignore_ascii_case("y");
        let interval = self.engine.set_auto_cycle_settings(interval, random);
        self.say(&format!("Auto interval {interval}s, random {random}."))
    }

    fn with_preset_name(
        &mut self,
        label: &str,
        action: impl FnOnce(&Engine, &str) -> Result<String>,
    ) -> Result<()> {
        let Some(name) = self.prompt(label)? else {
            return Ok(());
        };
        if name.is_empty() {
            return Ok(());
        }
        let message = action(self.engine, &name)?;
        self.say(&message)
    }

    fn list_presets(&mut self) -> Result<()> {
        let names = self.engine.list_presets();
        if names.is_empty() {
            writeln!(self.output, "[no presets saved]")?;
        } else {
            writeln!(self.output, "Saved presets:")?;
            for name in names {
                writeln!(self.output, " - {name}")?;
            }
        }
        self.prompt("Press ENTER...")?;
        Ok(())
    }

    fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{message}")?;
        self.output.flush()?;
        thread::sleep(self.settle);
        Ok(())
    }
}

fn parse_speed(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| AnimationError::InvalidSpeed(raw.to_string()))
}

fn parse_color_index(raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AnimationError::InvalidColorIndex(raw.to_string()))
}

/// Whole seconds; anything below one is raised to one by the engine.
fn parse_interval(raw: &str) -> Result<u64> {
    let seconds = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AnimationError::InvalidInterval(raw.to_string()))?;
    Ok(seconds.max(0) as u64)
}
