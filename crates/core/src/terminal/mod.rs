//! Terminal primitives: palette, screen clearing, the bell and width queries.
//!
//! Everything that touches the real terminal goes through [`Terminal`] so the
//! engine can be driven against an in-memory [`MemoryTerminal`] in tests.

use std::{
    fmt,
    io::{self, Write},
    str::FromStr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crossterm::{
    cursor::MoveTo,
    queue,
    terminal::{self as term, Clear, ClearType},
};
use parking_lot::Mutex;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::{config::FALLBACK_WIDTH, AnimationError};

pub const RESET: &str = "\x1b[0m";

/// Reds and yellows used by the flame field.
pub const FLAME_PALETTE: [&str; 4] = ["\x1b[91m", "\x1b[93m", "\x1b[95m", "\x1b[33m"];

/// Bright ANSI colours used by every animation.
///
/// Serialized by name; the raw escape sequence is accepted on input so
/// preset files that stored the code itself still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NeonColor {
    #[serde(alias = "\x1b[95m")]
    Magenta,
    #[serde(alias = "\x1b[96m")]
    Cyan,
    #[serde(alias = "\x1b[92m")]
    Green,
    #[serde(alias = "\x1b[93m")]
    Yellow,
    #[serde(alias = "\x1b[91m")]
    Red,
    #[serde(alias = "\x1b[94m")]
    Blue,
}

impl NeonColor {
    pub const ALL: [NeonColor; 6] = [
        NeonColor::Magenta,
        NeonColor::Cyan,
        NeonColor::Green,
        NeonColor::Yellow,
        NeonColor::Red,
        NeonColor::Blue,
    ];

    /// Palette entry for an arbitrary index, wrapping around.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn ansi(self) -> &'static str {
        match self {
            NeonColor::Magenta => "\x1b[95m",
            NeonColor::Cyan => "\x1b[96m",
            NeonColor::Green => "\x1b[92m",
            NeonColor::Yellow => "\x1b[93m",
            NeonColor::Red => "\x1b[91m",
            NeonColor::Blue => "\x1b[94m",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NeonColor::Magenta => "magenta",
            NeonColor::Cyan => "cyan",
            NeonColor::Green => "green",
            NeonColor::Yellow => "yellow",
            NeonColor::Red => "red",
            NeonColor::Blue => "blue",
        }
    }
}

impl fmt::Display for NeonColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How each frame picks its colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPolicy {
    /// Step through the palette with the frame counter.
    Cycle,
    /// Pick a palette entry at random for every coloured span.
    Random,
    /// Always use the configured single colour.
    Single,
}

impl ColorPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            ColorPolicy::Cycle => "cycle",
            ColorPolicy::Random => "random",
            ColorPolicy::Single => "single",
        }
    }
}

impl fmt::Display for ColorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColorPolicy {
    type Err = AnimationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cycle" => Ok(ColorPolicy::Cycle),
            "random" => Ok(ColorPolicy::Random),
            "single" => Ok(ColorPolicy::Single),
            _ => Err(AnimationError::InvalidColorPolicy(value.to_string())),
        }
    }
}

/// Resolved colour settings for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub policy: ColorPolicy,
    pub single: NeonColor,
}

impl Palette {
    /// Escape sequence for the span drawn at `index`.
    pub fn pick<R: Rng + ?Sized>(&self, index: u64, rng: &mut R) -> &'static str {
        match self.policy {
            ColorPolicy::Single => self.single.ansi(),
            ColorPolicy::Random => NeonColor::ALL
                .choose(rng)
                .copied()
                .unwrap_or(self.single)
                .ansi(),
            ColorPolicy::Cycle => NeonColor::from_index(index as usize).ansi(),
        }
    }

    /// Wraps `text` in a colour and a trailing reset.
    pub fn paint<R: Rng + ?Sized>(&self, text: &str, index: u64, rng: &mut R) -> String {
        format!("{}{text}{RESET}", self.pick(index, rng))
    }
}

/// Acknowledgment tones played on start and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Short,
    Long,
}

/// Output surface the engine renders into.
pub trait Terminal: Send + Sync {
    /// A fresh writer for one render task.
    fn writer(&self) -> Box<dyn Write + Send>;

    /// Current width in columns.
    fn width(&self) -> usize;

    fn beep(&self, tone: Tone);
}

/// Moves the cursor home and wipes the screen.
pub fn clear_screen<W: Write>(out: &mut W) -> io::Result<()> {
    queue!(out, Clear(ClearType::All), MoveTo(0, 0))
}

/// The process's real terminal on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnsiTerminal;

impl Terminal for AnsiTerminal {
    fn writer(&self) -> Box<dyn Write + Send> {
        Box::new(io::stdout())
    }

    fn width(&self) -> usize {
        term::size()
            .map(|(cols, _)| cols as usize)
            .unwrap_or(FALLBACK_WIDTH)
    }

    fn beep(&self, tone: Tone) {
        let mut out = io::stdout();
        // A long tone is two bells; terminals have no pitch control.
        let bells = match tone {
            Tone::Short => "\x07",
            Tone::Long => "\x07\x07",
        };
        let _ = out.write_all(bells.as_bytes());
        let _ = out.flush();
    }
}

/// In-memory terminal used by tests and headless runs.
#[derive(Debug, Clone)]
pub struct MemoryTerminal {
    buffer: Arc<Mutex<Vec<u8>>>,
    width: usize,
    beeps: Arc<AtomicUsize>,
}

impl MemoryTerminal {
    pub fn new(width: usize) -> Self {
        Self {
            buffer: Arc::new(Mutex::new(Vec::new())),
            width,
            beeps: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn beeps(&self) -> usize {
        self.beeps.load(Ordering::SeqCst)
    }
}

impl Default for MemoryTerminal {
    fn default() -> Self {
        Self::new(FALLBACK_WIDTH)
    }
}

impl Terminal for MemoryTerminal {
    fn writer(&self) -> Box<dyn Write + Send> {
        Box::new(MemoryWriter {
            buffer: Arc::clone(&self.buffer),
        })
    }

    fn width(&self) -> usize {
        self.width
    }

    fn beep(&self, _tone: Tone) {
        self.beeps.fetch_add(1, Ordering::SeqCst);
    }
}

struct MemoryWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn parses_colour_policies_case_insensitively() {
        assert_eq!("Cycle".parse::<ColorPolicy>().unwrap(), ColorPolicy::Cycle);
        assert_eq!(" single ".parse::<ColorPolicy>().unwrap(), ColorPolicy::Single);
        let err = "rainbow".parse::<ColorPolicy>().unwrap_err();
        assert!(format!("{err}").contains("rainbow"));
    }

    #[test]
    fn cycle_policy_steps_through_palette() {
        let palette = Palette {
            policy: ColorPolicy::Cycle,
            single: NeonColor::Red,
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(palette.pick(0, &mut rng), NeonColor::Magenta.ansi());
        assert_eq!(palette.pick(7, &mut rng), NeonColor::Cyan.ansi());
    }

    #[test]
    fn single_policy_ignores_index() {
        let palette = Palette {
            policy: ColorPolicy::Single,
            single: NeonColor::Green,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let painted = palette.paint("x", 3, &mut rng);
        assert_eq!(painted, format!("{}x{RESET}", NeonColor::Green.ansi()));
    }

    #[test]
    fn colours_accept_names_and_escape_codes() {
        let by_name: NeonColor = serde_json::from_str("\"cyan\"").unwrap();
        let by_code: NeonColor = serde_json::from_str("\"\\u001b[96m\"").unwrap();
        assert_eq!(by_name, NeonColor::Cyan);
        assert_eq!(by_code, NeonColor::Cyan);
        assert_eq!(serde_json::to_string(&NeonColor::Cyan).unwrap(), "\"cyan\"");
    }

    #[test]
    fn memory_terminal_collects_output_and_beeps() {
        let terminal = MemoryTerminal::new(40);
        let mut out = terminal.writer();
        out.write_all(b"frame").unwrap();
        terminal.beep(Tone::Short);

        assert_eq!(terminal.contents(), "frame");
        assert_eq!(terminal.beeps(), 1);
        assert_eq!(terminal.width(), 40);
    }
}
