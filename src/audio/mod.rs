/// Audio output using cpal - mixes one-shot drum samples
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rand::rngs::ThreadRng;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::fractal::NoteDigit;
use crate::sequencer::playback::NoteSink;

pub mod kit;
pub mod library;

pub use kit::DrumKit;
pub use library::{KitSource, LibraryState, SampleLibrary};

/// Voices beyond this are dropped, oldest first.
const MAX_VOICES: usize = 32;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("no decodable audio track")]
    NoTrack,

    #[error("kit has no {0} samples")]
    IncompleteKit(&'static str),

    #[error("no audio output device")]
    NoDevice,

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("could not query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("could not build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("could not start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Mono audio shared between the kit and the voices playing it.
#[derive(Debug, Clone)]
pub struct Sample {
    frames: Arc<[f32]>,
    sample_rate: u32,
}

impl Sample {
    pub fn new(frames: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            frames: frames.into(),
            sample_rate,
        }
    }

    pub fn frames(&self) -> &[f32] {
        &self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

struct Voice {
    sample: Sample,
    position: f64,
    step: f64,
}

impl Voice {
    fn next(&mut self) -> Option<f32> {
        let frame = self.sample.frames.get(self.position as usize).copied();
        self.position += self.step;
        frame
    }
}

pub struct AudioOutput {
    _stream: Option<cpal::Stream>,
    voices: Arc<Mutex<Vec<Voice>>>,
    sample_rate: u32,
}

impl AudioOutput {
    pub fn new() -> Result<Self, AudioError> {
        let voices = Arc::new(Mutex::new(Vec::new()));
        let (stream, sample_rate) = Self::setup_audio_stream(Arc::clone(&voices))?;

        Ok(Self {
            _stream: Some(stream),
            voices,
            sample_rate,
        })
    }

    /// Output that accepts triggers but never makes a sound.
    pub fn silent() -> Self {
        Self {
            _stream: None,
            voices: Arc::new(Mutex::new(Vec::new())),
            sample_rate: 48_000,
        }
    }

    fn setup_audio_stream(
        voices: Arc<Mutex<Vec<Voice>>>,
    ) -> Result<(cpal::Stream, u32), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels() as usize;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut voices) = voices.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for frame in data.chunks_mut(channels) {
                        let mut mixed = 0.0;
                        voices.retain_mut(|voice| match voice.next() {
                            Some(value) => {
                                mixed += value;
                                true
                            }
                            None => false,
                        });
                        frame.fill(mixed.clamp(-1.0, 1.0));
                    }
                },
                |err| log::error!("Audio stream error: {}", err),
                None,
            )?,
            other => return Err(AudioError::UnsupportedFormat(other)),
        };

        stream.play()?;
        log::info!("Audio output running at {} Hz, {} channels", sample_rate, channels);
        Ok((stream, sample_rate))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn is_active(&self) -> bool {
        self._stream.is_some()
    }

    pub fn trigger(&self, sample: &Sample) {
        let Ok(mut voices) = self.voices.lock() else {
            return;
        };
        if voices.len() >= MAX_VOICES {
            voices.remove(0);
        }
        voices.push(Voice {
            sample: sample.clone(),
            position: 0.0,
            step: sample.sample_rate() as f64 / self.sample_rate as f64,
        });
    }

    pub fn voice_count(&self) -> usize {
        self.voices.lock().map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            log::warn!("Audio output unavailable, playing silently: {}", e);
            Self::silent()
        })
    }
}

/// Plays kit samples for note digits once the library is ready.
pub struct SamplePlayer {
    output: AudioOutput,
    library: SampleLibrary,
    rng: ThreadRng,
}

impl SamplePlayer {
    pub fn new(output: AudioOutput, library: SampleLibrary) -> Self {
        Self {
            output,
            library,
            rng: rand::rng(),
        }
    }

    pub fn output(&self) -> &AudioOutput {
        &self.output
    }

    pub fn library(&self) -> &SampleLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut SampleLibrary {
        &mut self.library
    }
}

impl NoteSink for SamplePlayer {
    /// Silent until the kit has loaded; rests never sound.
    fn play_note(&mut self, digit: NoteDigit) {
        let Some(kit) = self.library.kit() else {
            return;
        };
        if let Some(sample) = kit.pick(digit, &mut self.rng) {
            self.output.trigger(sample);
        }
    }
}
