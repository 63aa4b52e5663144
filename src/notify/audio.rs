//! Chime playback using cpal.
//!
//! Gated behind `#[cfg(feature = "audio")]`. The stream lives on its own
//! OS thread for the length of the chime, so callers never block.

use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use super::tone::render_chime;
use super::Notifier;

pub struct ChimePlayer;

impl ChimePlayer {
    /// Returns None (with a warning log) if there is no output device.
    pub fn open_default() -> Option<Self> {
        match cpal::default_host().default_output_device() {
            Some(_) => Some(ChimePlayer),
            None => {
                tracing::warn!("No audio output device found, falling back to terminal bell");
                None
            }
        }
    }
}

impl Notifier for ChimePlayer {
    fn notify(&self, volume: f32) {
        if volume <= 0.0 {
            return;
        }
        thread::spawn(move || {
            if let Err(e) = play(volume) {
                tracing::warn!("Failed to play chime: {}", e);
            }
        });
    }
}

fn play(volume: f32) -> Result<(), String> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or("no output device")?;
    let supported = device.default_output_config().map_err(|e| e.to_string())?;
    let format = supported.sample_format();
    let config = supported.config();
    let channels = config.channels as usize;

    let samples = render_chime(config.sample_rate.0, volume);
    let duration = Duration::from_secs_f32(samples.len() as f32 / config.sample_rate.0 as f32);
    let mut cursor = 0usize;
    let mut next = move || {
        let s = samples.get(cursor).copied().unwrap_or(0.0);
        cursor += 1;
        s
    };

    let on_error = |err: cpal::StreamError| tracing::warn!("Audio output stream error: {}", err);
    let stream = match format {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let s = next();
                    frame.iter_mut().for_each(|out| *out = s);
                }
            },
            on_error,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let s = (next() * i16::MAX as f32) as i16;
                    frame.iter_mut().for_each(|out| *out = s);
                }
            },
            on_error,
            None,
        ),
        other => return Err(format!("unsupported sample format {:?}", other)),
    }
    .map_err(|e| e.to_string())?;

    stream.play().map_err(|e| e.to_string())?;
    thread::sleep(duration + Duration::from_millis(50));
    Ok(())
}
