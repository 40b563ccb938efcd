use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Sample, StreamConfig,
};
use tracing::{debug, error, info};

use crate::error::AudioError;
use crate::theory::SpecificNote;

const VOICE_GAIN: f32 = 0.2;
const RELEASE_SECS: f32 = 0.05;

#[derive(Debug)]
struct Voice {
    frequency: f32,
    phase: f32,
    remaining: f32,
}

/// Voices currently sounding, mixed by the output stream.
#[derive(Debug, Default)]
pub struct Synth {
    voices: Mutex<Vec<Voice>>,
    running: AtomicBool,
    stop: AtomicBool,
}

impl Synth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sounds every note for `seconds`.
    pub fn play(
        &self,
        notes: impl IntoIterator<Item = SpecificNote>,
        seconds: f32,
    ) -> Result<(), AudioError> {
        if !self.is_running() {
            return Err(AudioError::Unavailable);
        }
        let mut voices = self.voices.lock().unwrap_or_else(PoisonError::into_inner);
        for note in notes {
            debug!(%note, seconds, "voice on");
            voices.push(Voice {
                frequency: note.frequency(),
                phase: 0.0,
                remaining: seconds,
            });
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Asks the output worker to close its stream.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    fn active_voices(&self) -> usize {
        self.voices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Runs the audio output until [`Synth::stop`] is called. Failures are
/// logged and leave the synth unavailable.
pub async fn run_audio_output(synth: Arc<Synth>) {
    let result = tokio::task::spawn_blocking(move || {
        let stream = match open_stream(synth.clone()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("Audio output unavailable: {}", e);
                return;
            }
        };

        info!("Starting audio stream...");
        if let Err(e) = stream.play() {
            error!("Failed to play audio stream: {}", e);
            return;
        }
        synth.running.store(true, Ordering::Release);

        // The stream lives on this thread until shutdown
        while !synth.stop.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(100));
        }
        synth.running.store(false, Ordering::Release);
        info!(active = synth.active_voices(), "audio stream stopped");
    })
    .await;

    if let Err(e) = result {
        error!("Audio worker failed: {}", e);
    }
}

fn open_stream(synth: Arc<Synth>) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    info!(
        "Default output device found: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );

    let supported_config = device.default_output_config()?;
    let config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    info!("Audio stream configuration: {:?}", config);

    let sample_rate = config.sample_rate.0 as f32;
    let channels = config.channels as usize;
    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            process_audio_data(data, &synth, sample_rate, channels);
        },
        |err| {
            error!("An error occurred on the audio stream: {}", err);
        },
        None,
    )?;
    Ok(stream)
}

fn process_audio_data(data: &mut [f32], synth: &Synth, sample_rate: f32, channels: usize) {
    let mut voices = synth.voices.lock().unwrap_or_else(PoisonError::into_inner);
    let dt = 1.0 / sample_rate;

    for frame in data.chunks_mut(channels.max(1)) {
        let mut sample_value = 0.0;
        for voice in voices.iter_mut().filter(|v| v.remaining > 0.0) {
            voice.phase = (voice.phase + voice.frequency * dt) % 1.0;
            voice.remaining -= dt;
            sample_value += voice_sample(voice.phase) * envelope(voice.remaining) * VOICE_GAIN;
        }
        let sample_value = sample_value.clamp(-1.0, 1.0);
        for sample in frame.iter_mut() {
            *sample = Sample::from_sample(sample_value);
        }
    }

    voices.retain(|v| v.remaining > 0.0);
}

/// Sine with a little square and triangle for a brighter tone.
fn voice_sample(phase: f32) -> f32 {
    let sine = (2.0 * std::f32::consts::PI * phase).sin();
    let square = if phase < 0.5 { 1.0 } else { -1.0 };
    let triangle = (2.0 * phase - 1.0).abs() * 2.0 - 1.0;
    0.6 * sine + 0.2 * square + 0.2 * triangle
}

fn envelope(remaining: f32) -> f32 {
    (remaining / RELEASE_SECS).clamp(0.0, 1.0)
}
