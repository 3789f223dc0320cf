//! Hue-rotation color generator for the idle indicator LED.

use crate::device::ColorSample;

/// Seconds for one full trip around the color wheel.
pub const PERIOD_SECS: f64 = 6.0;

/// Fully saturated color for `seconds` of elapsed time.
///
/// Sweeps red, yellow, green, cyan, blue, magenta and back to red once per
/// [`PERIOD_SECS`]. Channels are truncated, so `hue_rotate(1.5)` is
/// `(127, 255, 0)`. Non-finite input yields black.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn hue_rotate(seconds: f64) -> ColorSample {
    if !seconds.is_finite() {
        return ColorSample::BLACK;
    }
    let hue = seconds.rem_euclid(PERIOD_SECS);
    let x = 1.0 - ((hue % 2.0) - 1.0).abs();

    // rem_euclid of a tiny negative value can round up to exactly 6.0.
    let (r, g, b) = match hue as u8 {
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        5 => (1.0, 0.0, x),
        _ => (1.0, x, 0.0),
    };
    ColorSample::new(channel(r), channel(g), channel(b))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel(level: f64) -> u8 {
    (level * 255.0) as u8
}
