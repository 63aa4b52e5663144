//! Audible new-message cue.

#[cfg(feature = "audio")]
pub mod audio;
#[cfg(any(feature = "audio", test))]
pub mod tone;

use std::io::Write;

pub trait Notifier: Send + Sync {
    /// Play the cue at `volume` (0.0 - 1.0). Never blocks and never fails.
    fn notify(&self, volume: f32);
}

/// Rings the terminal bell. Volume is up to the terminal; zero mutes.
pub struct TerminalBell;

impl Notifier for TerminalBell {
    fn notify(&self, volume: f32) {
        if volume <= 0.0 {
            return;
        }
        let mut out = std::io::stdout();
        if let Err(e) = out.write_all(b"\x07").and_then(|_| out.flush()) {
            tracing::debug!("Terminal bell failed: {}", e);
        }
    }
}

/// The chime when built with `audio` and a device exists, else the bell.
pub fn default_notifier() -> Box<dyn Notifier> {
    #[cfg(feature = "audio")]
    if let Some(player) = audio::ChimePlayer::open_default() {
        return Box::new(player);
    }
    Box::new(TerminalBell)
}
