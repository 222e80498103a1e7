//! Microphone recorder (cpal)
//!
//! Captures mono audio from the default input device between `start` and
//! `stop`. Any failure while opening the device leaves the recorder idle.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, PlayStreamError, SampleFormat, Stream, StreamConfig};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::voice_input::samples_to_wav;

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Not capturing
    Idle,
    /// Capturing from the microphone
    Recording,
}

/// Captures speech for voice input
pub struct VoiceRecorder {
    sample_rate: u32,
    max_samples: usize,
    state: RecorderState,
    stream: Option<Stream>,
    samples: Arc<Mutex<Vec<f32>>>,
    started_at: Option<Instant>,
}

impl VoiceRecorder {
    /// Recorder capturing at `sample_rate` for at most `max_secs`
    #[must_use]
    pub fn new(sample_rate: u32, max_secs: u64) -> Self {
        Self {
            sample_rate,
            max_samples: (sample_rate as usize).saturating_mul(max_secs as usize),
            state: RecorderState::Idle,
            stream: None,
            samples: Arc::new(Mutex::new(Vec::new())),
            started_at: None,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Start capturing
    pub fn start(&mut self) -> Result<()> {
        if self.state == RecorderState::Recording {
            return Err(Error::AudioStream("already recording".to_string()));
        }

        match self.open_stream() {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = RecorderState::Recording;
                self.started_at = Some(Instant::now());
                info!(sample_rate = self.sample_rate, "Voice recording started");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Voice recording could not start");
                self.reset();
                Err(e)
            }
        }
    }

    /// Stop capturing and return the recording as WAV
    pub fn stop(&mut self) -> Result<Vec<u8>> {
        if self.state != RecorderState::Recording {
            return Err(Error::AudioStream("not recording".to_string()));
        }

        let elapsed = self.started_at.map(|t| t.elapsed());
        self.stream = None;
        let samples = std::mem::take(
            &mut *self.samples.lock().unwrap_or_else(PoisonError::into_inner),
        );
        self.reset();

        info!(samples = samples.len(), elapsed = ?elapsed, "Voice recording stopped");
        samples_to_wav(&samples, self.sample_rate)
    }

    /// Abandon the current recording
    pub fn cancel(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.stream = None;
        self.state = RecorderState::Idle;
        self.started_at = None;
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn open_stream(&self) -> Result<Stream> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::AudioDevice("No input device found".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        debug!(device = %device_name, "Using input device");

        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::AudioDevice(format!("Failed to get configs: {}", e)))?
            .find(|c| {
                c.min_sample_rate().0 <= self.sample_rate
                    && c.max_sample_rate().0 >= self.sample_rate
                    && c.sample_format() == SampleFormat::F32
            })
            .ok_or_else(|| {
                Error::AudioDevice(format!("No config supports {}Hz F32", self.sample_rate))
            })?
            .with_sample_rate(cpal::SampleRate(self.sample_rate));
        let config: StreamConfig = supported.into();

        let channels = config.channels as usize;
        let samples = self.samples.clone();
        let max_samples = self.max_samples;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let mut buffer = samples.lock().unwrap_or_else(PoisonError::into_inner);
                    if buffer.len() >= max_samples {
                        return;
                    }
                    if channels > 1 {
                        buffer.extend(
                            data.chunks(channels)
                                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                        );
                    } else {
                        buffer.extend_from_slice(data);
                    }
                },
                move |err| {
                    error!(error = %err, "Audio input error");
                },
                None,
            )
            .map_err(map_build_error)?;

        stream.play().map_err(map_play_error)?;
        Ok(stream)
    }
}

fn map_build_error(err: BuildStreamError) -> Error {
    match err {
        BuildStreamError::DeviceNotAvailable => {
            Error::PermissionDenied("input device not available".to_string())
        }
        BuildStreamError::BackendSpecific { err } => {
            Error::PermissionDenied(err.description)
        }
        other => Error::AudioStream(format!("Failed to build stream: {}", other)),
    }
}

fn map_play_error(err: PlayStreamError) -> Error {
    match err {
        PlayStreamError::DeviceNotAvailable => {
            Error::PermissionDenied("input device not available".to_string())
        }
        other => Error::AudioStream(format!("Failed to start stream: {}", other)),
    }
}
