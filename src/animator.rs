//! Per-frame surface animation driver.
//!
//! Reads the analyzer's voice record and the shared parameters once per
//! render frame, smooths shape targets with asymmetric attack/release,
//! advances the animation clocks and passive rotation, maintains the
//! pointer-interaction state via (throttled) ray intersection against the
//! undisplaced base sphere, and publishes throttled band telemetry.

use glam::{EulerRot, Mat4, Quat, Vec3};

use crate::analyzer::VoiceData;
use crate::field::FieldParams;
use crate::geometry::{ray_sphere, Ray};
use crate::params::{AnimatorTuning, FieldTuning, InteractionTuning, ParamsSnapshot};
use crate::telemetry::{BandLevels, TelemetryChannel};

/// Per-frame animation driver owning the live field parameters
pub struct SurfaceAnimator {
    tuning: AnimatorTuning,
    interaction: InteractionTuning,

    field: FieldParams,
    scale: f32,
    rotation_x: f32,
    rotation_y: f32,

    /// Fade-in progress in [0,1]; displayed opacity is its square
    fade_progress: f32,

    frame_count: u64,
    base_radius: f32,
    telemetry: TelemetryChannel,
}

impl SurfaceAnimator {
    pub fn new(
        tuning: AnimatorTuning,
        interaction: InteractionTuning,
        field_tuning: &FieldTuning,
        base_radius: f32,
        telemetry: TelemetryChannel,
    ) -> Self {
        let field = FieldParams::initial(field_tuning, &interaction, &tuning.idle);
        let scale = tuning.idle.scale;

        Self {
            tuning,
            interaction,
            field,
            scale,
            rotation_x: 0.0,
            rotation_y: 0.0,
            fade_progress: 0.0,
            frame_count: 0,
            base_radius,
            telemetry,
        }
    }

    /// Advance one frame.
    ///
    /// `dt` is clamped to the tuned maximum so a suspended window does not
    /// produce a large animation jump on resume. `pointer` is the current
    /// picking ray, if the cursor is over the viewport.
    pub fn update(
        &mut self,
        dt: f32,
        voice: &VoiceData,
        snap: &ParamsSnapshot,
        pointer: Option<&Ray>,
    ) {
        let dt = dt.clamp(0.0, self.tuning.max_dt);
        self.frame_count += 1;

        if self.fade_progress < 1.0 {
            self.fade_progress = (self.fade_progress + dt * self.tuning.fade_rate).min(1.0);
        }

        // Interpolate shape targets between the idle and active tuples.
        // Overall shape follows amplitude; the surface ripple follows the
        // voice-presence bands.
        let t_shape = voice.amplitude.clamp(0.0, 1.0);
        let t_surface = voice.mid_energy.max(voice.high_energy).clamp(0.0, 1.0);
        let idle = self.tuning.idle;
        let active = self.tuning.active;

        let target_distort = lerp(idle.distort, active.distort, t_shape);
        let target_speed = lerp(idle.speed, active.speed, t_shape) * snap.animation_speed;
        let target_surface_distort = lerp(idle.surface_distort, active.surface_distort, t_surface);
        let target_surface_speed =
            lerp(idle.surface_speed, active.surface_speed, t_surface) * snap.animation_speed;
        let target_scale = lerp(idle.scale, active.scale, t_shape);

        // Rising responds faster than falling: breathing, not jitter
        let (attack, release) = (self.tuning.shape_attack, self.tuning.shape_release);
        self.field.distort = approach(self.field.distort, target_distort, attack, release);
        self.field.speed = approach(self.field.speed, target_speed, attack, release);
        self.field.surface_distort =
            approach(self.field.surface_distort, target_surface_distort, attack, release);
        self.field.surface_speed =
            approach(self.field.surface_speed, target_surface_speed, attack, release);
        self.scale = approach(
            self.scale,
            target_scale,
            self.tuning.scale_attack,
            self.tuning.scale_release,
        );

        // Two independent monotonic clocks; the field loops its noise
        // sampling, the clocks themselves never wrap
        self.field.time += dt * self.field.speed;
        self.field.surface_time += dt * self.field.surface_speed;

        // Passive rotation keeps the surface alive in silence
        self.rotation_y += dt * self.tuning.rotation_rate_y * snap.animation_speed;
        self.rotation_x += dt * self.tuning.rotation_rate_x * snap.animation_speed;

        if self.frame_count % self.interaction.raycast_interval == 0 {
            self.update_interaction(pointer);
        }

        if self.frame_count % self.interaction.telemetry_interval == 0 {
            self.telemetry.publish(BandLevels {
                low: voice.low_energy,
                mid: voice.mid_energy,
                high: voice.high_energy,
            });
        }
    }

    /// Raycast against the undisplaced base sphere and glide the
    /// interaction state toward the result
    fn update_interaction(&mut self, pointer: Option<&Ray>) {
        let hit = pointer.and_then(|ray| {
            ray_sphere(ray, Vec3::ZERO, self.base_radius * self.scale)
                .map(|t| ray.origin + ray.dir * t)
        });

        match hit {
            Some(world) => {
                let local = self.model_matrix().inverse().transform_point3(world);
                self.field.hit_point = self
                    .field
                    .hit_point
                    .lerp(local, self.interaction.hit_smoothing);
                self.field.hit_strength += (self.interaction.max_strength
                    - self.field.hit_strength)
                    * self.interaction.strength_ramp;
            }
            None => {
                self.field.hit_strength *= self.interaction.miss_decay;
            }
        }
    }

    /// Live field parameters for this frame
    pub fn field(&self) -> &FieldParams {
        &self.field
    }

    /// Current breathing scale
    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Model transform: breathing scale + passive rotation, origin-centered
    pub fn model_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(EulerRot::YXZ, self.rotation_y, self.rotation_x, 0.0);
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), rotation, Vec3::ZERO)
    }

    /// Fade-in opacity (ease-in: progress squared)
    pub fn opacity(&self) -> f32 {
        self.fade_progress * self.fade_progress
    }

    /// True once the fade-in has completed and blending can be skipped
    pub fn is_opaque(&self) -> bool {
        self.fade_progress >= 1.0
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Move toward the target with different rates for rising and falling
fn approach(current: f32, target: f32, attack: f32, release: f32) -> f32 {
    let rate = if target > current { attack } else { release };
    current + (target - current) * rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{FieldTuning, TuningParams};

    const DT: f32 = 1.0 / 60.0;

    fn still_tuning() -> AnimatorTuning {
        // Rotation frozen so local-space assertions stay deterministic
        AnimatorTuning {
            rotation_rate_x: 0.0,
            rotation_rate_y: 0.0,
            ..AnimatorTuning::default()
        }
    }

    fn test_animator(tuning: AnimatorTuning) -> SurfaceAnimator {
        SurfaceAnimator::new(
            tuning,
            InteractionTuning::default(),
            &FieldTuning::default(),
            1.0,
            TelemetryChannel::new(),
        )
    }

    fn silence() -> VoiceData {
        VoiceData::default()
    }

    fn full_voice() -> VoiceData {
        VoiceData {
            amplitude: 1.0,
            low_energy: 1.0,
            mid_energy: 1.0,
            high_energy: 1.0,
        }
    }

    fn snap() -> ParamsSnapshot {
        TuningParams::default().snapshot()
    }

    #[test]
    fn test_idle_convergence() {
        let mut animator = test_animator(still_tuning());

        // Drive to the active shape, then hold silence until settled
        for _ in 0..600 {
            animator.update(DT, &full_voice(), &snap(), None);
        }
        for _ in 0..4000 {
            animator.update(DT, &silence(), &snap(), None);
        }

        let field = animator.field();
        assert!((field.distort - 0.6).abs() < 1e-3);
        assert!((field.speed - 0.5).abs() < 1e-3);
        assert!((field.surface_distort - 1.4).abs() < 1e-3);
        assert!((field.surface_speed - 0.4).abs() < 1e-3);
        assert!((animator.scale() - 0.64).abs() < 1e-3);
    }

    #[test]
    fn test_peak_convergence() {
        let mut animator = test_animator(still_tuning());

        for _ in 0..800 {
            animator.update(DT, &full_voice(), &snap(), None);
        }

        let field = animator.field();
        assert!((field.distort - 0.70).abs() < 1e-3);
        assert!((field.speed - 0.58).abs() < 1e-3);
        assert!((field.surface_distort - 1.7).abs() < 1e-3);
        assert!((field.surface_speed - 0.48).abs() < 1e-3);
        assert!((animator.scale() - 0.96).abs() < 1e-3);
    }

    #[test]
    fn test_speed_scales_with_animation_speed() {
        let mut animator = test_animator(still_tuning());
        let snap = TuningParams {
            animation_speed: 2.0,
            ..TuningParams::default()
        }
        .snapshot();

        for _ in 0..4000 {
            animator.update(DT, &silence(), &snap, None);
        }
        assert!((animator.field().speed - 1.0).abs() < 1e-3);
        assert!((animator.field().surface_speed - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_dt_is_clamped() {
        let mut animator = test_animator(still_tuning());

        // A huge dt (tab suspend) advances the clock by at most max_dt
        animator.update(10.0, &silence(), &snap(), None);
        let expected = 0.1 * animator.field().speed;
        assert!((animator.field().time - expected).abs() < 1e-6);
    }

    #[test]
    fn test_clocks_advance_monotonically() {
        let mut animator = test_animator(still_tuning());
        let mut last_time = 0.0;
        let mut last_surface = 0.0;

        for _ in 0..100 {
            animator.update(DT, &silence(), &snap(), None);
            assert!(animator.field().time > last_time);
            assert!(animator.field().surface_time > last_surface);
            last_time = animator.field().time;
            last_surface = animator.field().surface_time;
        }
    }

    #[test]
    fn test_fade_in_eases_to_full_opacity() {
        let mut animator = test_animator(still_tuning());
        assert_eq!(animator.opacity(), 0.0);
        assert!(!animator.is_opaque());

        animator.update(0.1, &silence(), &snap(), None);
        // progress = 0.1 * 0.7; opacity = progress^2 (ease-in)
        assert!((animator.opacity() - 0.07f32 * 0.07).abs() < 1e-6);

        let mut previous = animator.opacity();
        for _ in 0..200 {
            animator.update(0.05, &silence(), &snap(), None);
            assert!(animator.opacity() >= previous);
            previous = animator.opacity();
        }
        assert_eq!(animator.opacity(), 1.0);
        assert!(animator.is_opaque());
    }

    #[test]
    fn test_passive_rotation_follows_animation_speed() {
        let mut animator = test_animator(AnimatorTuning::default());

        for _ in 0..60 {
            animator.update(DT, &silence(), &snap(), None);
        }
        // ~1 s elapsed: 0.08 rad about Y, 0.03 rad about X
        assert!((animator.rotation_y - 0.08).abs() < 1e-3);
        assert!((animator.rotation_x - 0.03).abs() < 1e-3);
        assert_ne!(animator.model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_pointer_hit_ramps_strength_toward_max() {
        let mut animator = test_animator(still_tuning());
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 3.0),
            dir: Vec3::new(0.0, 0.0, -1.0),
        };

        let mut previous = 0.0;
        for _ in 0..60 {
            animator.update(DT, &silence(), &snap(), Some(&ray));
            let strength = animator.field().hit_strength;
            assert!(strength >= previous);
            assert!(strength <= 0.4 + 1e-6);
            previous = strength;
        }
        assert!(previous > 0.3, "strength should approach the 0.4 ceiling");

        // Smoothed hit point glides toward the front of the sphere
        assert!(animator.field().hit_point.z > 0.5);
        assert!(animator.field().hit_point.x.abs() < 1e-3);
    }

    #[test]
    fn test_pointer_miss_decays_geometrically() {
        let mut animator = test_animator(still_tuning());
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 3.0),
            dir: Vec3::new(0.0, 0.0, -1.0),
        };
        for _ in 0..120 {
            animator.update(DT, &silence(), &snap(), Some(&ray));
        }
        let start = animator.field().hit_strength;
        assert!(start > 0.3);

        // 30 frames at every-3rd-frame evaluation: 10 decay steps
        for _ in 0..30 {
            animator.update(DT, &silence(), &snap(), None);
        }
        let decayed = animator.field().hit_strength;
        assert!((decayed - start * 0.92f32.powi(10)).abs() < 1e-5);
        assert!(decayed >= 0.0);
    }

    #[test]
    fn test_raycast_is_throttled() {
        let mut animator = test_animator(still_tuning());
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 3.0),
            dir: Vec3::new(0.0, 0.0, -1.0),
        };

        // Frames 1 and 2 skip the raycast; frame 3 evaluates it
        animator.update(DT, &silence(), &snap(), Some(&ray));
        animator.update(DT, &silence(), &snap(), Some(&ray));
        assert_eq!(animator.field().hit_strength, 0.0);

        animator.update(DT, &silence(), &snap(), Some(&ray));
        assert!(animator.field().hit_strength > 0.0);
    }

    #[test]
    fn test_telemetry_published_on_cadence() {
        let telemetry = TelemetryChannel::new();
        let mut animator = SurfaceAnimator::new(
            still_tuning(),
            InteractionTuning::default(),
            &FieldTuning::default(),
            1.0,
            telemetry.clone(),
        );
        let voice = VoiceData {
            amplitude: 0.8,
            low_energy: 0.2,
            mid_energy: 0.8,
            high_energy: 0.4,
        };

        for _ in 0..5 {
            animator.update(DT, &voice, &snap(), None);
        }
        assert_eq!(telemetry.latest(), BandLevels::default());

        animator.update(DT, &voice, &snap(), None);
        let published = telemetry.latest();
        assert_eq!(published.low, 0.2);
        assert_eq!(published.mid, 0.8);
        assert_eq!(published.high, 0.4);
    }
}
