//! Microphone capture and per-frame spectral analysis.
//!
//! A cpal input stream accumulates mono samples into a shared buffer; the
//! per-frame `tick()` windows the newest samples, runs an FFT, splits the
//! spectrum into low/mid/high bands and pushes the gated, sensitivity-scaled
//! band energies through an asymmetric envelope follower.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

use crate::params::{snapshot_of, AnalysisConfig, ParamsSnapshot, SharedParams};

/// Sample buffer cap, in analysis windows. Bounds memory if the render loop
/// stalls while the capture callback keeps producing.
const BUFFER_WINDOWS: usize = 8;

/// Smoothed per-band energies, the analyzer's per-tick output.
///
/// All fields stay in [0,1]; `amplitude` is always the max of the three
/// band energies. Read (never mutated) by the animator.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VoiceData {
    pub amplitude: f32,
    pub low_energy: f32,
    pub mid_energy: f32,
    pub high_energy: f32,
}

/// Available input device snapshot.
///
/// cpal identifies devices by name, so the id doubles as the label.
#[derive(Clone, Debug)]
pub struct MicDevice {
    pub device_id: String,
    pub label: String,
}

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("invalid analysis config: {0}")]
    InvalidConfig(String),

    #[error("no input device available")]
    NoDevice,

    #[error("input device '{0}' not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    DeviceEnumeration(#[from] cpal::DevicesError),

    #[error("unsupported input configuration: {0}")]
    UnsupportedConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    StreamBuild(#[from] cpal::BuildStreamError),

    #[error("failed to start input stream: {0}")]
    StreamPlay(#[from] cpal::PlayStreamError),
}

/// Microphone analyzer: capture stream + spectral band extraction.
pub struct AudioAnalyzer {
    config: AnalysisConfig,
    params: SharedParams,
    voice: VoiceData,

    /// Mono samples shared with the capture callback
    samples: Arc<Mutex<Vec<f32>>>,

    /// Active capture stream (kept alive; dropping cancels the callback)
    stream: Option<cpal::Stream>,
    current_device: Option<String>,

    fft: Arc<dyn Fft<f32>>,
    fft_input: Vec<Complex<f32>>,
    spectrum: Vec<f32>,
}

impl AudioAnalyzer {
    /// Create an analyzer; capture does not start until [`start`](Self::start).
    pub fn new(config: AnalysisConfig, params: SharedParams) -> Result<Self, AnalyzerError> {
        config.validate().map_err(AnalyzerError::InvalidConfig)?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        let fft_input = vec![Complex::new(0.0, 0.0); config.fft_size];
        let spectrum = vec![0.0; config.bins()];

        Ok(Self {
            config,
            params,
            voice: VoiceData::default(),
            samples: Arc::new(Mutex::new(Vec::new())),
            stream: None,
            current_device: None,
            fft,
            fft_input,
            spectrum,
        })
    }

    /// Enumerate available input devices
    pub fn devices() -> Result<Vec<MicDevice>, AnalyzerError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()?
            .map(|device| {
                let name = device.name().unwrap_or_else(|_| "unknown".to_string());
                MicDevice {
                    device_id: name.clone(),
                    label: name,
                }
            })
            .collect();
        Ok(devices)
    }

    /// Open a capture stream on the given device (or the default input).
    ///
    /// The target device and its config are resolved before any running
    /// stream is torn down, so a bad device id cannot kill a working
    /// session. A stream that fails to open after teardown leaves the
    /// analyzer cleanly stopped.
    pub fn start(&mut self, device_id: Option<&str>) -> Result<(), AnalyzerError> {
        let host = cpal::default_host();
        let device = match device_id {
            Some(id) => host
                .input_devices()?
                .find(|d| d.name().map(|name| name == id).unwrap_or(false))
                .ok_or_else(|| AnalyzerError::DeviceNotFound(id.to_string()))?,
            None => host.default_input_device().ok_or(AnalyzerError::NoDevice)?,
        };
        let supported = device.default_input_config()?;
        let channels = (supported.channels() as usize).max(1);
        let label = device.name().unwrap_or_else(|_| "unknown".to_string());

        // Previous stream/graph fully torn down before the new one opens
        self.stop();

        let samples = Arc::clone(&self.samples);
        let max_buffered = self.config.fft_size * BUFFER_WINDOWS;

        let stream = device.build_input_stream(
            &supported.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mut buf = samples.lock().unwrap();
                for frame in data.chunks(channels) {
                    let mono = frame.iter().sum::<f32>() / channels as f32;
                    buf.push(mono);
                }
                if buf.len() > max_buffered {
                    let overflow = buf.len() - max_buffered;
                    buf.drain(0..overflow);
                }
            },
            |err| warn!("input stream error: {err}"),
            None,
        )?;
        stream.play()?;

        self.stream = Some(stream);
        self.current_device = Some(label.clone());
        info!(device = %label, "listening");
        Ok(())
    }

    /// Release the capture stream and reset output to silence.
    ///
    /// Safe to call when nothing is running.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!("stopped listening");
        }
        self.samples.lock().unwrap().clear();
        self.voice = VoiceData::default();
        self.current_device = None;
    }

    /// Stop, then start on the named device
    pub fn switch_device(&mut self, device_id: &str) -> Result<(), AnalyzerError> {
        self.start(Some(device_id))
    }

    pub fn is_listening(&self) -> bool {
        self.stream.is_some()
    }

    pub fn current_device(&self) -> Option<&str> {
        self.current_device.as_deref()
    }

    /// Current smoothed band energies
    pub fn voice(&self) -> VoiceData {
        self.voice
    }

    /// Run one analysis tick. Called once per render frame.
    ///
    /// While muted, analysis is skipped and all energies fade by the mute
    /// decay ratio instead, so the visual settles rather than snapping.
    /// Without a full window of samples the previous values are kept.
    pub fn tick(&mut self) {
        let snap = snapshot_of(&self.params);

        if snap.muted {
            // Buffered audio is dropped so unmuting does not replay stale input
            self.samples.lock().unwrap().clear();
            let decay = self.config.mute_decay;
            self.voice.low_energy *= decay;
            self.voice.mid_energy *= decay;
            self.voice.high_energy *= decay;
            self.voice.amplitude *= decay;
            return;
        }

        let n = self.config.fft_size;
        {
            let mut buf = self.samples.lock().unwrap();
            if buf.len() < n {
                return;
            }
            for (i, sample) in buf[..n].iter().enumerate() {
                self.fft_input[i] = Complex::new(sample * hann_window(i, n), 0.0);
            }
            // 50% overlap between consecutive windows
            buf.drain(0..n / 2);
        }

        self.fft.process(&mut self.fft_input);

        for k in 0..self.config.bins() {
            let value = self.normalize_magnitude(self.fft_input[k].norm());
            self.spectrum[k] = value;
        }

        let (low, mid, high) = self.config.band_ranges();
        let raw = [
            band_mean(&self.spectrum[low]),
            band_mean(&self.spectrum[mid]),
            band_mean(&self.spectrum[high]),
        ];
        self.update_from_raw(raw, &snap);
    }

    /// Gate, scale and smooth raw band averages into the voice record
    fn update_from_raw(&mut self, raw: [f32; 3], snap: &ParamsSnapshot) {
        let mut bands = [
            self.voice.low_energy,
            self.voice.mid_energy,
            self.voice.high_energy,
        ];

        for i in 0..3 {
            let gated = apply_gate(raw[i], snap.noise_gate);
            let target = (gated * snap.sensitivity * self.config.band_weights[i]).min(1.0);
            let next = envelope_step(bands[i], target, self.config.attack, self.config.release);
            bands[i] = if next.is_finite() {
                next.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }

        self.voice.low_energy = bands[0];
        self.voice.mid_energy = bands[1];
        self.voice.high_energy = bands[2];
        self.voice.amplitude = bands[0].max(bands[1]).max(bands[2]);
    }

    /// Map an FFT magnitude to [0,1] over the configured decibel range
    fn normalize_magnitude(&self, norm: f32) -> f32 {
        let amplitude = 2.0 * norm / self.config.fft_size as f32;
        if amplitude <= 0.0 {
            return 0.0;
        }
        let db = 20.0 * amplitude.log10();
        ((db - self.config.min_db) / (self.config.max_db - self.config.min_db)).clamp(0.0, 1.0)
    }
}

/// Noise gate with the post-gate range remapped back to [0,1].
///
/// Output is 0 at or below the gate; above it, `(raw - gate) / (1 - gate)`,
/// so raising the gate never introduces a discontinuity at the threshold.
pub fn apply_gate(raw: f32, gate: f32) -> f32 {
    if !raw.is_finite() || raw <= gate {
        return 0.0;
    }
    ((raw - gate) / (1.0 - gate)).min(1.0)
}

/// Asymmetric envelope follower step: fast rise, slow geometric decay
pub fn envelope_step(current: f32, target: f32, attack: f32, release: f32) -> f32 {
    if target > current {
        current + (target - current) * attack
    } else {
        current * release
    }
}

/// Hann window function for FFT analysis
fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}

fn band_mean(bins: &[f32]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    bins.iter().sum::<f32>() / bins.len() as f32
}
