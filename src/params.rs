//! Parameter definitions with documented ranges and semantics.
//!
//! Two kinds of state live here:
//! - `TuningParams`: the user-tunable knobs, shared between the control
//!   surface (writer) and the analyzer/animator (per-frame readers).
//! - Static tuning structs (`AnalysisConfig`, `AnimatorTuning`, ...) with
//!   documented defaults, fixed for the lifetime of the app.

use glam::{Mat4, Vec3};
use std::ops::Range;
use std::sync::{Arc, Mutex};

/// Valid range for the sensitivity multiplier
pub const SENSITIVITY_RANGE: (f32, f32) = (0.2, 5.0);

/// Valid range for the noise gate threshold
pub const NOISE_GATE_RANGE: (f32, f32) = (0.0, 0.3);

/// Valid range for the animation speed multiplier
pub const ANIMATION_SPEED_RANGE: (f32, f32) = (0.1, 5.0);

/// User-tunable parameters, written by the control surface and polled
/// every frame by the analyzer and the animator.
///
/// The store itself performs no validation; readers go through
/// [`TuningParams::snapshot`], which clamps to the documented ranges.
#[derive(Debug, Clone)]
pub struct TuningParams {
    /// Gain applied to gated band energies (dimensionless)
    pub sensitivity: f32,

    /// Band energy below this threshold is treated as silence
    pub noise_gate: f32,

    /// Global speed multiplier for all animation clocks and rotation
    pub animation_speed: f32,

    /// While muted the analyzer fades to silence instead of analyzing
    pub muted: bool,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            noise_gate: 0.05,
            animation_speed: 1.0,
            muted: false,
        }
    }
}

/// Shared handle to the tunable parameters.
///
/// The control surface and the per-frame consumers hold clones of the same
/// handle; writes are last-write-wins, reads happen at point of use.
pub type SharedParams = Arc<Mutex<TuningParams>>;

/// Wrap tuning parameters in a shared handle
pub fn shared(params: TuningParams) -> SharedParams {
    Arc::new(Mutex::new(params))
}

/// Clamped copy of the tunable parameters, taken once per frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamsSnapshot {
    pub sensitivity: f32,
    pub noise_gate: f32,
    pub animation_speed: f32,
    pub muted: bool,
}

impl Default for ParamsSnapshot {
    fn default() -> Self {
        TuningParams::default().snapshot()
    }
}

impl TuningParams {
    /// Take a defensively clamped snapshot for per-frame use.
    ///
    /// The UI keeps values in range already; clamping here means a stray
    /// write can never destabilize the analysis or animation stages.
    pub fn snapshot(&self) -> ParamsSnapshot {
        ParamsSnapshot {
            sensitivity: self.sensitivity.clamp(SENSITIVITY_RANGE.0, SENSITIVITY_RANGE.1),
            noise_gate: self.noise_gate.clamp(NOISE_GATE_RANGE.0, NOISE_GATE_RANGE.1),
            animation_speed: self
                .animation_speed
                .clamp(ANIMATION_SPEED_RANGE.0, ANIMATION_SPEED_RANGE.1),
            muted: self.muted,
        }
    }
}

/// Take a clamped snapshot from a shared handle
pub fn snapshot_of(params: &SharedParams) -> ParamsSnapshot {
    params.lock().unwrap().snapshot()
}

/// Spectral analysis configuration
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// FFT window size in samples (must be a power of 2, >= 256).
    /// 256 samples yield 128 spectrum bins, the minimum band resolution.
    pub fft_size: usize,

    /// Low band upper boundary as a fraction of the bin count.
    /// 6/128 of the spectrum: the rumble/fundamental region.
    pub low_split: f32,

    /// Mid band upper boundary as a fraction of the bin count.
    /// 50/128 of the spectrum: voice presence lives below this.
    pub mid_split: f32,

    /// Per-band gain weights (low, mid, high). Mid-weighted because voice
    /// energy concentrates there; highs are de-emphasized to tame sibilance.
    pub band_weights: [f32; 3],

    /// Envelope follower rise rate per tick (fraction of remaining distance)
    pub attack: f32,

    /// Envelope follower decay ratio per tick
    pub release: f32,

    /// Magnitude mapped to 0.0 at this level (dBFS)
    pub min_db: f32,

    /// Magnitude mapped to 1.0 at this level (dBFS)
    pub max_db: f32,

    /// Per-tick decay ratio applied to all energies while muted
    pub mute_decay: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            low_split: 6.0 / 128.0,
            mid_split: 50.0 / 128.0,
            band_weights: [1.0, 1.2, 0.8],
            attack: 0.025,
            release: 0.992,
            min_db: -100.0,
            max_db: -30.0,
            mute_decay: 0.9,
        }
    }
}

impl AnalysisConfig {
    /// Number of usable spectrum bins
    pub fn bins(&self) -> usize {
        self.fft_size / 2
    }

    /// Bin ranges for the low, mid and high bands.
    ///
    /// Boundaries are expressed as fractions of the bin count so the split
    /// scales with the FFT size instead of hard-coding bin indices.
    pub fn band_ranges(&self) -> (Range<usize>, Range<usize>, Range<usize>) {
        let bins = self.bins();
        let low_end = ((bins as f32 * self.low_split).round() as usize).clamp(1, bins - 2);
        let mid_end = ((bins as f32 * self.mid_split).round() as usize).clamp(low_end + 1, bins - 1);
        (0..low_end, low_end..mid_end, mid_end..bins)
    }

    /// Validate configuration (FFT size must be a power of 2, etc.)
    pub fn validate(&self) -> Result<(), String> {
        if !self.fft_size.is_power_of_two() {
            return Err(format!(
                "FFT size must be power of 2, got {}",
                self.fft_size
            ));
        }
        if self.fft_size < 256 {
            return Err(format!(
                "FFT size must be >= 256 (128 bins), got {}",
                self.fft_size
            ));
        }
        if !(0.0 < self.low_split && self.low_split < self.mid_split && self.mid_split < 1.0) {
            return Err("band splits must satisfy 0 < low < mid < 1".to_string());
        }
        Ok(())
    }
}

/// Shape parameter tuple the animator interpolates between
#[derive(Debug, Clone, Copy)]
pub struct ShapeTargets {
    /// Large-scale goo displacement strength
    pub distort: f32,

    /// Animation clock rate (pre animation-speed multiplier)
    pub speed: f32,

    /// Ridge/wave displacement strength
    pub surface_distort: f32,

    /// Surface clock rate (pre animation-speed multiplier)
    pub surface_speed: f32,

    /// Overall surface scale (breathing size)
    pub scale: f32,
}

/// Surface animator tuning
#[derive(Debug, Clone)]
pub struct AnimatorTuning {
    /// Shape at silence
    pub idle: ShapeTargets,

    /// Shape at full amplitude
    pub active: ShapeTargets,

    /// Shape parameter rise rate per frame (fraction of remaining distance)
    pub shape_attack: f32,

    /// Shape parameter fall rate per frame
    pub shape_release: f32,

    /// Scale rise rate per frame
    pub scale_attack: f32,

    /// Scale fall rate per frame
    pub scale_release: f32,

    /// Passive rotation rate about the vertical axis (rad/s)
    pub rotation_rate_y: f32,

    /// Passive rotation rate about the horizontal axis (rad/s)
    pub rotation_rate_x: f32,

    /// Fade-in progress rate (1/s); full opacity after ~1.5 s
    pub fade_rate: f32,

    /// Upper bound on per-frame elapsed time (seconds). Avoids large
    /// animation jumps after tab-suspend or debugger pauses.
    pub max_dt: f32,
}

impl Default for AnimatorTuning {
    fn default() -> Self {
        Self {
            idle: ShapeTargets {
                distort: 0.6,
                speed: 0.5,
                surface_distort: 1.4,
                surface_speed: 0.4,
                scale: 0.64,
            },
            active: ShapeTargets {
                distort: 0.70,
                speed: 0.58,
                surface_distort: 1.7,
                surface_speed: 0.48,
                scale: 0.96,
            },
            shape_attack: 0.02,
            shape_release: 0.008,
            scale_attack: 0.06,
            scale_release: 0.03,
            rotation_rate_y: 0.08,
            rotation_rate_x: 0.03,
            fade_rate: 0.7,
            max_dt: 0.1,
        }
    }
}

/// Pointer interaction and telemetry cadence tuning
#[derive(Debug, Clone)]
pub struct InteractionTuning {
    /// Raycast every Nth frame (cost control, not correctness)
    pub raycast_interval: u64,

    /// Publish band telemetry every Nth frame (~10 Hz at 60 fps)
    pub telemetry_interval: u64,

    /// Exponential smoothing factor for the hit point (per evaluated frame)
    pub hit_smoothing: f32,

    /// Interaction strength ceiling
    pub max_strength: f32,

    /// Strength ramp rate toward the ceiling (per evaluated frame)
    pub strength_ramp: f32,

    /// Strength decay ratio on pointer miss (per evaluated frame)
    pub miss_decay: f32,

    /// Radius of the pointer push bump (local-space units)
    pub hit_radius: f32,
}

impl Default for InteractionTuning {
    fn default() -> Self {
        Self {
            raycast_interval: 3,
            telemetry_interval: 6,
            hit_smoothing: 0.12,
            max_strength: 0.4,
            strength_ramp: 0.12,
            miss_decay: 0.92,
            hit_radius: 0.35,
        }
    }
}

/// Static displacement/color field tuning
#[derive(Debug, Clone)]
pub struct FieldTuning {
    /// Spatial scale divisor for the goo noise term
    pub frequency: f32,

    /// Spatial scale divisor for the ridge noise term
    pub surface_frequency: f32,

    /// Ridge wave count around the pole axis
    pub number_of_waves: f32,

    /// How much the goo term is attenuated at the poles (0 = bypass, 1 = full)
    pub goo_pole_amount: f32,

    /// How much the ridge term is attenuated at the poles
    pub surface_pole_amount: f32,

    /// Gradient noise seed
    pub noise_seed: u32,
}

impl Default for FieldTuning {
    fn default() -> Self {
        Self {
            frequency: 1.2,
            surface_frequency: 1.4,
            number_of_waves: 4.0,
            goo_pole_amount: 1.0,
            surface_pole_amount: 1.0,
            noise_seed: 42,
        }
    }
}

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Window width (pixels)
    pub window_width: u32,

    /// Window height (pixels)
    pub window_height: u32,

    /// Field of view (degrees)
    pub fov_degrees: f32,

    /// Camera position (world units; the surface sits at the origin)
    pub eye: [f32; 3],

    /// Near clipping plane
    pub near_plane: f32,

    /// Far clipping plane
    pub far_plane: f32,

    /// Base sphere subdivision: segments around the equator
    pub mesh_segments: usize,

    /// Base sphere subdivision: rings pole to pole
    pub mesh_rings: usize,

    /// Base sphere radius (world units, pre scale)
    pub sphere_radius: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            fov_degrees: 45.0,
            eye: [0.0, 0.0, 2.6],
            near_plane: 0.1,
            far_plane: 100.0,
            mesh_segments: 128,
            mesh_rings: 64,
            sphere_radius: 1.0,
        }
    }
}

impl RenderConfig {
    /// View-projection matrix for the given viewport aspect ratio
    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        let eye = Vec3::from_array(self.eye);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            aspect,
            self.near_plane,
            self.far_plane,
        );
        proj * view
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.window_width as f32 / self.window_height as f32
    }
}
