use std::time::Duration;

use rand::{seq::SliceRandom, Rng, RngCore};

use super::{Animation, FrameContext};
use crate::{
    config::{saturating_secs, MAX_FRAME_WIDTH},
    terminal::{ColorPolicy, FLAME_PALETTE, RESET},
    Result,
};

const MATRIX_CHARS: &[u8] = b"01ABCDEFGHIJKLMNOPQRSTUVWXYZ@#%&*";
const GLITCH_CHARS: &[u8] = b"@#$%^&*()_-=+[]{}<>?/\\|~`   ";
const PARTICLE_GLYPHS: [char; 4] = ['*', '+', '.', '•'];
const FLAME_GLYPHS: [char; 5] = ['^', '~', '*', '.', ' '];
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

fn random_line(rng: &mut dyn RngCore, alphabet: &[u8], width: usize) -> String {
    (0..width)
        .map(|_| *alphabet.choose(rng).unwrap_or(&b' ') as char)
        .collect()
}

/// A horizontal bar whose length follows a sine wave.
#[derive(Debug, Default, Clone, Copy)]
pub struct Wave;

impl Animation for Wave {
    fn name(&self) -> &'static str {
        "Wave"
    }

    fn draw(&self, ctx: &FrameContext, rng: &mut dyn RngCore, out: &mut String) -> Result<()> {
        let phase = ctx.frame as f64 * 0.25;
        let length = ((phase.sin() + 1.0) * 20.0) as usize;
        out.push_str(&ctx.palette.paint(&"-".repeat(length), ctx.frame, rng));
        out.push('\n');
        Ok(())
    }
}

/// Ten rows of dense random characters.
#[derive(Debug, Default, Clone, Copy)]
pub struct Matrix;

impl Animation for Matrix {
    fn name(&self) -> &'static str {
        "Matrix"
    }

    fn draw(&self, ctx: &FrameContext, rng: &mut dyn RngCore, out: &mut String) -> Result<()> {
        let width = ctx.width.min(MAX_FRAME_WIDTH);
        for _ in 0..10 {
            let line = random_line(rng, MATRIX_CHARS, width);
            out.push_str(&ctx.palette.paint(&line, ctx.frame, rng));
            out.push('\n');
        }
        Ok(())
    }
}

/// Sparse glyphs scattered over twenty rows.
#[derive(Debug, Default, Clone, Copy)]
pub struct Particles;

impl Animation for Particles {
    fn name(&self) -> &'static str {
        "Particles"
    }

    fn draw(&self, ctx: &FrameContext, rng: &mut dyn RngCore, out: &mut String) -> Result<()> {
        let width = ctx.width.min(MAX_FRAME_WIDTH);
        for _ in 0..20 {
            let line: String = (0..width)
                .map(|_| {
                    if rng.gen_bool(0.04) {
                        *PARTICLE_GLYPHS.choose(rng).unwrap_or(&'*')
                    } else {
                        ' '
                    }
                })
                .collect();
            out.push_str(&ctx.palette.paint(&line, ctx.frame, rng));
            out.push('\n');
        }
        Ok(())
    }
}

/// A rotating spinner next to a label.
#[derive(Debug, Default, Clone, Copy)]
pub struct Loading;

impl Animation for Loading {
    fn name(&self) -> &'static str {
        "Loading"
    }

    fn draw(&self, ctx: &FrameContext, rng: &mut dyn RngCore, out: &mut String) -> Result<()> {
        let glyph = SPINNER[(ctx.frame % SPINNER.len() as u64) as usize];
        out.push_str(&ctx.palette.paint(&format!("Loading {glyph}"), ctx.frame, rng));
        out.push('\n');
        Ok(())
    }
}

/// A column of stars swinging on a phase-shifted sine.
#[derive(Debug, Default, Clone, Copy)]
pub struct Spiral;

impl Animation for Spiral {
    fn name(&self) -> &'static str {
        "Spiral"
    }

    fn draw(&self, ctx: &FrameContext, rng: &mut dyn RngCore, out: &mut String) -> Result<()> {
        const SIZE: i64 = 12;
        let t = ctx.frame as f64 * 0.35;
        for row in 0..SIZE {
            let offset = (SIZE as f64 * (t + row as f64 / 2.0).sin()) as i64;
            let spacing = (offset + SIZE).max(0) as usize;
            out.push_str(&" ".repeat(spacing));
            out.push_str(&ctx.palette.paint("*", ctx.frame, rng));
            out.push('\n');
        }
        Ok(())
    }
}

/// Noise that thickens towards the bottom rows, in flame colours.
#[derive(Debug, Default, Clone, Copy)]
pub struct Flames;

impl Animation for Flames {
    fn name(&self) -> &'static str {
        "Flames"
    }

    fn draw(&self, ctx: &FrameContext, rng: &mut dyn RngCore, out: &mut String) -> Result<()> {
        const HEIGHT: usize = 18;
        let width = ctx.width.min(80);
        for row in 0..HEIGHT {
            let depth = row as f64 / HEIGHT as f64;
            let color = match ctx.palette.policy {
                ColorPolicy::Single => ctx.palette.single.ansi(),
                _ => FLAME_PALETTE[(depth * (FLAME_PALETTE.len() - 1) as f64) as usize],
            };
            for _ in 0..width {
                if rng.gen::<f64>() < 0.12 + depth * 0.18 {
                    let glyph = *FLAME_GLYPHS.choose(rng).unwrap_or(&'^');
                    out.push_str(color);
                    out.push(glyph);
                    out.push_str(RESET);
                } else {
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        Ok(())
    }

    fn pace(&self, delay: Duration, _rng: &mut dyn RngCore) -> Duration {
        saturating_secs(delay.as_secs_f64() * 0.8).max(Duration::from_millis(20))
    }
}

/// A bank of bar meters at random levels.
#[derive(Debug, Default, Clone, Copy)]
pub struct Equalizer;

impl Animation for Equalizer {
    fn name(&self) -> &'static str {
        "Equalizer"
    }

    fn draw(&self, ctx: &FrameContext, rng: &mut dyn RngCore, out: &mut String) -> Result<()> {
        const BARS: usize = 10;
        const MAX_LEVEL: u32 = 16;
        let levels: Vec<u32> = (0..BARS).map(|_| rng.gen_range(1..=MAX_LEVEL)).collect();
        for level in (1..=MAX_LEVEL).rev() {
            for &bar in &levels {
                let cell = if bar >= level { " █ " } else { "   " };
                out.push_str(&ctx.palette.paint(cell, ctx.frame, rng));
            }
            out.push('\n');
        }
        Ok(())
    }
}

/// A flickering header over a block of high-entropy symbols.
#[derive(Debug, Default, Clone, Copy)]
pub struct Glitch;

impl Animation for Glitch {
    fn name(&self) -> &'static str {
        "Glitch"
    }

    fn draw(&self, ctx: &FrameContext, rng: &mut dyn RngCore, out: &mut String) -> Result<()> {
        let header = if rng.gen_bool(0.4) {
            "ACCESS GRANTED"
        } else {
            "!!! GLITCH !!!"
        };
        out.push_str(&ctx.palette.paint(header, ctx.frame, rng));
        out.push('\n');

        let width = ctx.width.min(MAX_FRAME_WIDTH) / 2;
        for _ in 0..12 {
            let line = random_line(rng, GLITCH_CHARS, width);
            out.push_str(&ctx.palette.paint(&line, ctx.frame, rng));
            out.push('\n');
        }
        Ok(())
    }

    fn pace(&self, delay: Duration, rng: &mut dyn RngCore) -> Duration {
        let jitter = rng.gen_range(0.6..1.4);
        saturating_secs(delay.as_secs_f64() * jitter).max(Duration::from_millis(30))
    }
}
