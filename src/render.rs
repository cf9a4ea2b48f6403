//! Counter-derived presentation inputs.
//!
//! The core does not render anything; it supplies the external renderer with
//! a color derived from the message sequence and the signoff line to append.

use rand::seq::SliceRandom;

use crate::config::{DEFAULT_SIGNOFFS, GuildConfig};

/// Map a message sequence number to an `0xRRGGBB` display color.
///
/// A triangle wave over the sequence sweeps the hue up and back, producing a
/// rainbow that repeats every 180 messages at full saturation and value.
pub fn color_for(sequence: u64) -> u32 {
    let m = (sequence % 180) as i64;
    let triangle = 90 - (m - 90).abs();
    let hue = triangle as f64 / 90.0;
    let (r, g, b) = hsv_to_rgb(hue, 1.0, 1.0);
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Standard HSV to RGB conversion. `h`, `s`, `v` are all in `[0, 1]`.
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (u8, u8, u8) {
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - f * s);
    let t = v * (1.0 - (1.0 - f) * s);

    let (r, g, b) = match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

/// The signoff to append: the guild's configured text, or a random pick from
/// the fixed fallback list when unset or empty.
pub fn pick_signoff(config: &GuildConfig) -> String {
    match config.signoff.as_deref() {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => DEFAULT_SIGNOFFS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("- Anonymous")
            .to_string(),
    }
}
