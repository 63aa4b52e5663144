//! New-message chime synthesis.

use std::f32::consts::PI;

/// Two rising notes, in Hz.
const NOTES: [f32; 2] = [880.0, 1318.5];
const NOTE_SECS: f32 = 0.12;
/// Fade in/out length per note, to avoid clicks.
const FADE_SECS: f32 = 0.01;

/// Render the chime as mono f32 samples in `[-volume, volume]`.
pub fn render_chime(sample_rate: u32, volume: f32) -> Vec<f32> {
    let volume = volume.clamp(0.0, 1.0);
    let rate = sample_rate as f32;
    let per_note = (rate * NOTE_SECS) as usize;
    let fade = ((rate * FADE_SECS) as usize).max(1);
    if per_note == 0 {
        return Vec::new();
    }

    let mut samples = Vec::with_capacity(per_note * NOTES.len());
    for freq in NOTES {
        let step = 2.0 * PI * freq / rate;
        for i in 0..per_note {
            let edge = i.min(per_note - 1 - i);
            let envelope = (edge as f32 / fade as f32).min(1.0);
            samples.push((i as f32 * step).sin() * volume * envelope);
        }
    }
    samples
}
