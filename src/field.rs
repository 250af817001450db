//! Displacement and color field for the deformable surface.
//!
//! Pure math: given a surface point and the current `FieldParams`, produce a
//! scalar radial displacement and an RGB color. The render host decides how
//! to execute it; here it runs as a CPU loop over the base mesh
//! (`evaluate_surface`). All time-varying noise goes through
//! [`NoiseField::sample_looped`], so the whole field tiles seamlessly in
//! time with period [`LOOP_PERIOD`].

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use noise::{NoiseFn, Perlin};
use std::f32::consts::PI;

use crate::geometry::SphereMesh;
use crate::params::{AnimatorTuning, FieldTuning, InteractionTuning, ShapeTargets};

/// Time loop period. Matches the lattice period of the permutation-table
/// gradient noise, so wrapping the time offset lands on the same noise
/// values with no seam at the wrap point.
pub const LOOP_PERIOD: f32 = 256.0;

/// Overall gain of the goo displacement term
const GOO_SCALE: f32 = 0.3;

/// Overall gain of the ridge/wave displacement term
const RIDGE_SCALE: f32 = 0.08;

/// Tangential step used to rebuild normals from the displaced surface
const NORMAL_EPSILON: f32 = 1e-3;

/// Noise-space offset decorrelating the ridge sample from the goo sample
const RIDGE_OFFSET: f32 = 31.7;

/// Noise-space offsets decorrelating the two color gradient samples
const COLOR_OFFSET_A: Vec3 = Vec3::new(13.7, 57.1, 29.3);
const COLOR_OFFSET_B: Vec3 = Vec3::new(71.9, 11.3, 47.5);

/// Time offset separating the second color sample from the first
const COLOR_TIME_OFFSET: f32 = 41.0;

/// Saturation multiplier applied after palette blending
const SATURATION_BOOST: f32 = 1.25;

/// Live parameters driving the displacement and color functions.
///
/// Owned by the surface animator, mutated once per frame, read-only during
/// vertex evaluation.
#[derive(Clone, Copy, Debug)]
pub struct FieldParams {
    /// Goo displacement strength (applied squared)
    pub distort: f32,

    /// Animation clock rate (animation-speed multiplier included)
    pub speed: f32,

    /// Ridge displacement strength (applied squared)
    pub surface_distort: f32,

    /// Surface clock rate (animation-speed multiplier included)
    pub surface_speed: f32,

    /// Goo clock (monotonic, unbounded; looped at sampling time)
    pub time: f32,

    /// Ridge clock (independent of the goo clock)
    pub surface_time: f32,

    /// Spatial scale divisor for the goo term
    pub frequency: f32,

    /// Spatial scale divisor for the ridge term
    pub surface_frequency: f32,

    /// Ridge wave count around the pole axis
    pub number_of_waves: f32,

    /// Pole attenuation blend for the goo term (0 = bypass, 1 = full)
    pub goo_pole_amount: f32,

    /// Pole attenuation blend for the ridge term
    pub surface_pole_amount: f32,

    /// Smoothed pointer hit point, local space
    pub hit_point: Vec3,

    /// Radius of the pointer push bump
    pub hit_radius: f32,

    /// Pointer push strength (0 when no interaction is active)
    pub hit_strength: f32,
}

impl FieldParams {
    /// Initial parameter set: static field tuning plus the idle shape tuple
    pub fn initial(
        field: &FieldTuning,
        interaction: &InteractionTuning,
        idle: &ShapeTargets,
    ) -> Self {
        Self {
            distort: idle.distort,
            speed: idle.speed,
            surface_distort: idle.surface_distort,
            surface_speed: idle.surface_speed,
            time: 0.0,
            surface_time: 0.0,
            frequency: field.frequency,
            surface_frequency: field.surface_frequency,
            number_of_waves: field.number_of_waves,
            goo_pole_amount: field.goo_pole_amount,
            surface_pole_amount: field.surface_pole_amount,
            hit_point: Vec3::ZERO,
            hit_radius: interaction.hit_radius,
            hit_strength: 0.0,
        }
    }
}

impl Default for FieldParams {
    fn default() -> Self {
        Self::initial(
            &FieldTuning::default(),
            &InteractionTuning::default(),
            &AnimatorTuning::default().idle,
        )
    }
}

/// Seeded gradient noise with seamless time looping
pub struct NoiseField {
    perlin: Perlin,
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
        }
    }

    /// Sample 3D gradient noise, range [-1, 1]
    pub fn sample(&self, p: Vec3) -> f32 {
        self.perlin.get([p.x as f64, p.y as f64, p.z as f64]) as f32
    }

    /// Sample with a time offset wrapped to [`LOOP_PERIOD`].
    ///
    /// Output at `t` and `t + LOOP_PERIOD` is identical for any fixed point,
    /// and the wrap lands on the noise lattice period, so looping the time
    /// input produces no seam.
    pub fn sample_looped(&self, p: Vec3, t: f32) -> f32 {
        let wrapped = t.rem_euclid(LOOP_PERIOD);
        self.sample(p + Vec3::splat(wrapped))
    }

    /// Scalar radial displacement at a base-surface point.
    ///
    /// Sum of a pole-attenuated large-scale goo term, a pole-attenuated
    /// directional ridge term, and the localized pointer push.
    pub fn displace(&self, p: Vec3, fp: &FieldParams) -> f32 {
        let goo_noise = self.sample_looped(p / fp.frequency.max(1e-3), fp.time);
        // Squaring concentrates sensitivity at the loud end of the range
        let goo =
            goo_noise * fp.distort * fp.distort * GOO_SCALE * pole_mask(p, fp.goo_pole_amount);

        let ripple = self.sample_looped(
            p / fp.surface_frequency.max(1e-3) + Vec3::splat(RIDGE_OFFSET),
            fp.surface_time,
        );
        let angle = p.z.atan2(p.x);
        let wave = (fp.number_of_waves * angle + ripple * 2.0).sin();
        let ridge = wave
            * ripple
            * fp.surface_distort
            * fp.surface_distort
            * RIDGE_SCALE
            * pole_mask(p, fp.surface_pole_amount);

        goo + ridge + pointer_push(p, fp)
    }

    /// Base point displaced radially along its sphere normal
    pub fn displaced_point(&self, p: Vec3, fp: &FieldParams) -> Vec3 {
        let n = p.try_normalize().unwrap_or(Vec3::Y);
        p + n * self.displace(p, fp)
    }

    /// Surface normal rebuilt from the displaced surface.
    ///
    /// The analytic sphere normal is wrong once displacement is applied;
    /// displace two small tangential offsets and cross the tangent deltas.
    pub fn displaced_normal(&self, p: Vec3, fp: &FieldParams) -> Vec3 {
        let n = p.try_normalize().unwrap_or(Vec3::Y);
        let tangent = if n.y.abs() > 0.99 {
            Vec3::X
        } else {
            Vec3::Y.cross(n).normalize()
        };
        let bitangent = n.cross(tangent);

        let radius = p.length();
        let p1 = (p + tangent * NORMAL_EPSILON).normalize() * radius;
        let p2 = (p + bitangent * NORMAL_EPSILON).normalize() * radius;

        let d0 = self.displaced_point(p, fp);
        let d1 = self.displaced_point(p1, fp);
        let d2 = self.displaced_point(p2, fp);

        (d1 - d0).cross(d2 - d0).try_normalize().unwrap_or(n)
    }

    /// Color at a base-surface point.
    ///
    /// A 1D gradient parameter built from two independent looped noise
    /// samples plus a Fresnel edge term selects into the palette; the blend
    /// is saturation-boosted and clamped per channel.
    pub fn color(&self, p: Vec3, normal: Vec3, view_dir: Vec3, fp: &FieldParams) -> Vec3 {
        let g1 = self.sample_looped(p * 0.9 + COLOR_OFFSET_A, fp.time);
        let g2 = self.sample_looped(p * 1.7 + COLOR_OFFSET_B, fp.time + COLOR_TIME_OFFSET);
        let fresnel = (1.0 - normal.dot(view_dir).max(0.0)).powi(2) * 0.5;

        let t = (0.5 + 0.30 * g1 + 0.20 * g2 + fresnel).clamp(0.0, 1.0);
        let rgb = palette_color(t);

        let mean = (rgb.x + rgb.y + rgb.z) / 3.0;
        let boosted = Vec3::splat(mean) + (rgb - Vec3::splat(mean)) * SATURATION_BOOST;
        boosted.clamp(Vec3::ZERO, Vec3::ONE)
    }
}

/// Localized Gaussian push centered at the smoothed pointer hit point
fn pointer_push(p: Vec3, fp: &FieldParams) -> f32 {
    if fp.hit_strength <= 0.0 {
        return 0.0;
    }
    let d2 = p.distance_squared(fp.hit_point);
    fp.hit_strength * (-d2 / (fp.hit_radius * fp.hit_radius).max(1e-6)).exp()
}

/// Displacement gain across the pole axis: 1 at the equator, falling to 0
/// at both poles (smoothstep shoulder into a sine profile), blended toward
/// the bypass value 1 by `1 - amount`. Avoids pinching where the sphere's
/// longitude lines converge.
fn pole_mask(p: Vec3, amount: f32) -> f32 {
    let axis = (p.y / p.length().max(1e-6)).abs();
    let falloff = 1.0 - smoothstep(0.4, 1.0, axis);
    let profile = ((1.0 - axis) * PI * 0.5).sin();
    lerp(1.0, falloff * profile, amount)
}

/// Time-varying procedural gradient palette: one dominant hue with
/// secondary regions and smooth bridging zones, no hard edges.
struct PaletteStop {
    color: Vec3,
    center: f32,
    width: f32,
}

const PALETTE: [PaletteStop; 6] = [
    // midnight
    PaletteStop {
        color: Vec3::new(0.05, 0.05, 0.16),
        center: 0.0,
        width: 0.18,
    },
    // indigo (dominant)
    PaletteStop {
        color: Vec3::new(0.17, 0.12, 0.55),
        center: 0.28,
        width: 0.30,
    },
    // violet
    PaletteStop {
        color: Vec3::new(0.42, 0.20, 0.82),
        center: 0.52,
        width: 0.18,
    },
    // magenta
    PaletteStop {
        color: Vec3::new(0.78, 0.25, 0.72),
        center: 0.68,
        width: 0.14,
    },
    // coral
    PaletteStop {
        color: Vec3::new(0.95, 0.48, 0.40),
        center: 0.82,
        width: 0.12,
    },
    // ice
    PaletteStop {
        color: Vec3::new(0.80, 0.88, 0.98),
        center: 1.0,
        width: 0.16,
    },
];

/// Blend the palette with bell-shaped influence curves around each stop
fn palette_color(t: f32) -> Vec3 {
    let mut acc = Vec3::ZERO;
    let mut weight_sum = 0.0;
    for stop in &PALETTE {
        let delta = t - stop.center;
        let weight = (-(delta * delta) / (2.0 * stop.width * stop.width)).exp();
        acc += stop.color * weight;
        weight_sum += weight;
    }
    acc / weight_sum.max(1e-6)
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Vertex format handed to the render host
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SurfaceVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 4],
}

/// CPU evaluation strategy: map every base vertex through the field.
///
/// `eye_local` is the camera position transformed into the surface's local
/// frame, used for the per-vertex Fresnel view direction. Alpha carries the
/// fade-in opacity.
pub fn evaluate_surface(
    base: &SphereMesh,
    field: &NoiseField,
    fp: &FieldParams,
    eye_local: Vec3,
    opacity: f32,
    out: &mut Vec<SurfaceVertex>,
) {
    out.clear();
    out.reserve(base.vertices.len());

    for vertex in &base.vertices {
        let p = Vec3::from_array(vertex.position);
        let position = field.displaced_point(p, fp);
        let normal = field.displaced_normal(p, fp);
        let view_dir = (eye_local - position).try_normalize().unwrap_or(normal);
        let rgb = field.color(p, normal, view_dir, fp);

        out.push(SurfaceVertex {
            position: position.to_array(),
            normal: normal.to_array(),
            color: [rgb.x, rgb.y, rgb.z, opacity],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_field() -> FieldParams {
        FieldParams {
            distort: 0.0,
            surface_distort: 0.0,
            hit_strength: 0.0,
            ..FieldParams::default()
        }
    }

    #[test]
    fn test_looped_sampling_is_periodic() {
        let field = NoiseField::new(42);
        let points = [
            Vec3::new(0.3, -0.7, 1.1),
            Vec3::new(-2.5, 0.1, 0.9),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        // Dyadic times so t + LOOP_PERIOD is exactly representable
        let times = [0.0, 1.25, 2.5, 100.75, 1000.5];

        for p in points {
            for t in times {
                assert_eq!(
                    field.sample_looped(p, t),
                    field.sample_looped(p, t + LOOP_PERIOD),
                    "seam at p={p:?} t={t}"
                );
            }
        }
    }

    #[test]
    fn test_pole_mask_vanishes_at_poles() {
        let pole = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(pole_mask(pole, 1.0), 0.0);
        assert_eq!(pole_mask(-pole, 1.0), 0.0);

        let equator = Vec3::new(1.0, 0.0, 0.0);
        assert!((pole_mask(equator, 1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pole_mask_bypass() {
        let pole = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(pole_mask(pole, 0.0), 1.0);
    }

    #[test]
    fn test_displacement_vanishes_at_poles_when_attenuated() {
        let field = NoiseField::new(42);
        let fp = FieldParams {
            hit_strength: 0.0,
            goo_pole_amount: 1.0,
            surface_pole_amount: 1.0,
            ..FieldParams::default()
        };

        for pole in [Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, -1.0, 0.0)] {
            assert_eq!(field.displace(pole, &fp), 0.0);
        }
    }

    #[test]
    fn test_pointer_push_peaks_at_hit_point() {
        let field = NoiseField::new(42);
        let hit = Vec3::new(0.0, 0.0, 1.0);
        let fp = FieldParams {
            hit_point: hit,
            hit_strength: 0.4,
            hit_radius: 0.35,
            ..quiet_field()
        };

        // With goo and ridge zeroed the displacement is the push alone
        assert!((field.displace(hit, &fp) - 0.4).abs() < 1e-6);

        let at_radius = Vec3::new(0.35, 0.0, 1.0);
        let expected = 0.4 * (-1.0f32).exp();
        assert!((field.displace(at_radius, &fp) - expected).abs() < 1e-5);

        // Monotone decay with distance from the hit point
        let mut previous = f32::INFINITY;
        for step in 0..10 {
            let p = Vec3::new(step as f32 * 0.2, 0.0, 1.0);
            let push = field.displace(p, &fp);
            assert!(push <= previous);
            previous = push;
        }
    }

    #[test]
    fn test_no_interaction_means_no_push() {
        let field = NoiseField::new(42);
        let fp = quiet_field();
        assert_eq!(field.displace(Vec3::new(0.2, 0.1, 0.9), &fp), 0.0);
    }

    #[test]
    fn test_displaced_normal_matches_sphere_when_undisplaced() {
        let field = NoiseField::new(42);
        let fp = quiet_field();

        for p in [
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.58, 0.58, 0.58),
        ] {
            let n = field.displaced_normal(p, &fp);
            assert!((n.length() - 1.0).abs() < 1e-4);
            assert!(n.dot(p.normalize()) > 0.99, "normal flipped at {p:?}");
        }
    }

    #[test]
    fn test_displaced_normal_is_unit_under_displacement() {
        let field = NoiseField::new(42);
        let fp = FieldParams {
            time: 3.25,
            surface_time: 1.5,
            ..FieldParams::default()
        };

        for i in 0..20 {
            let angle = i as f32 * 0.31;
            let p = Vec3::new(angle.cos() * 0.8, (i as f32 * 0.09) - 0.9, angle.sin() * 0.8)
                .normalize();
            let n = field.displaced_normal(p, &fp);
            assert!(n.is_finite());
            assert!((n.length() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_color_channels_stay_in_range() {
        let field = NoiseField::new(42);
        let fp = FieldParams {
            time: 12.5,
            ..FieldParams::default()
        };

        for i in 0..50 {
            let angle = i as f32 * 0.13;
            let p = Vec3::new(angle.cos(), (i as f32 * 0.04) - 1.0, angle.sin()).normalize();
            let n = p;
            let view = Vec3::new(0.0, 0.0, 1.0);
            let rgb = field.color(p, n, view, &fp);

            for channel in [rgb.x, rgb.y, rgb.z] {
                assert!((0.0..=1.0).contains(&channel), "channel {channel} at {p:?}");
            }
        }
    }

    #[test]
    fn test_palette_blend_has_no_hard_edges() {
        let mut previous = palette_color(0.0);
        for step in 1..=100 {
            let t = step as f32 / 100.0;
            let current = palette_color(t);
            // Neighboring samples stay close: smooth bridging zones
            assert!((current - previous).length() < 0.15, "jump at t={t}");
            previous = current;
        }
    }

    #[test]
    fn test_evaluate_surface_covers_every_vertex() {
        let mesh = SphereMesh::new(16, 8, 1.0);
        let field = NoiseField::new(42);
        let fp = FieldParams::default();
        let mut out = Vec::new();

        evaluate_surface(&mesh, &field, &fp, Vec3::new(0.0, 0.0, 2.6), 0.5, &mut out);

        assert_eq!(out.len(), mesh.vertices.len());
        for v in &out {
            assert!(v.position.iter().all(|c| c.is_finite()));
            assert_eq!(v.color[3], 0.5);
        }
    }
}
