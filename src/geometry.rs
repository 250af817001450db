//! Base sphere geometry and picking rays.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::f32::consts::PI;

/// Vertex data for the base surface (position + outward normal + UV)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Subdivided UV sphere: the closed, pole-having base surface the
/// displacement field deforms.
pub struct SphereMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub radius: f32,
}

impl SphereMesh {
    /// Create a UV sphere with `segments` around the equator and `rings`
    /// from pole to pole.
    pub fn new(segments: usize, rings: usize, radius: f32) -> Self {
        let mut vertices = Vec::with_capacity((rings + 1) * (segments + 1));
        let mut indices = Vec::with_capacity(rings * segments * 6);

        for ring in 0..=rings {
            let theta = PI * ring as f32 / rings as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();

            for seg in 0..=segments {
                let phi = 2.0 * PI * seg as f32 / segments as f32;
                let (sin_phi, cos_phi) = phi.sin_cos();

                let normal = [sin_theta * cos_phi, cos_theta, sin_theta * sin_phi];
                vertices.push(Vertex {
                    position: [normal[0] * radius, normal[1] * radius, normal[2] * radius],
                    normal,
                    uv: [
                        seg as f32 / segments as f32,
                        ring as f32 / rings as f32,
                    ],
                });
            }
        }

        // Triangle indices (counter-clockwise winding, viewed from outside)
        for ring in 0..rings {
            for seg in 0..segments {
                let top_left = (ring * (segments + 1) + seg) as u32;
                let top_right = top_left + 1;
                let bottom_left = ((ring + 1) * (segments + 1) + seg) as u32;
                let bottom_right = bottom_left + 1;

                indices.extend_from_slice(&[
                    top_left,
                    top_right,
                    bottom_left,
                    top_right,
                    bottom_right,
                    bottom_left,
                ]);
            }
        }

        Self {
            vertices,
            indices,
            radius,
        }
    }
}

/// A picking ray in world space. `dir` is unit length.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    /// Unproject a cursor position into a world-space ray.
    ///
    /// `cursor` is in physical pixels, `viewport` the surface size in the
    /// same units, `inv_view_proj` the inverse of the camera matrix
    /// (wgpu depth convention, NDC z in [0,1]).
    pub fn from_screen(
        cursor: (f32, f32),
        viewport: (f32, f32),
        inv_view_proj: Mat4,
    ) -> Option<Ray> {
        if viewport.0 <= 0.0 || viewport.1 <= 0.0 {
            return None;
        }
        let ndc_x = 2.0 * cursor.0 / viewport.0 - 1.0;
        let ndc_y = 1.0 - 2.0 * cursor.1 / viewport.1;

        let near = inv_view_proj.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let far = inv_view_proj.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));

        let dir = (far - near).try_normalize()?;
        if !near.is_finite() {
            return None;
        }
        Some(Ray { origin: near, dir })
    }
}

/// Nearest non-negative intersection parameter of a ray with a sphere.
///
/// Returns the far root when the origin is inside the sphere.
pub fn ray_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let near = -b - sqrt_d;
    if near >= 0.0 {
        return Some(near);
    }
    let far = -b + sqrt_d;
    (far >= 0.0).then_some(far)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_mesh_counts() {
        let mesh = SphereMesh::new(32, 16, 1.0);

        assert_eq!(mesh.vertices.len(), 17 * 33);
        assert_eq!(mesh.indices.len(), 16 * 32 * 6);
    }

    #[test]
    fn test_sphere_vertices_on_radius_with_unit_normals() {
        let radius = 0.75;
        let mesh = SphereMesh::new(16, 8, radius);

        for vertex in &mesh.vertices {
            let p = Vec3::from_array(vertex.position);
            let n = Vec3::from_array(vertex.normal);
            assert!((p.length() - radius).abs() < 1e-5);
            assert!((n.length() - 1.0).abs() < 1e-5);
            assert!(p.normalize().dot(n) > 0.999);
        }
    }

    #[test]
    fn test_sphere_indices_in_range() {
        let mesh = SphereMesh::new(8, 4, 1.0);
        let count = mesh.vertices.len() as u32;
        assert!(mesh.indices.iter().all(|&i| i < count));
    }

    #[test]
    fn test_ray_sphere_hit_from_outside() {
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 3.0),
            dir: Vec3::new(0.0, 0.0, -1.0),
        };
        let t = ray_sphere(&ray, Vec3::ZERO, 1.0).unwrap();
        assert!((t - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_sphere_miss() {
        let ray = Ray {
            origin: Vec3::new(0.0, 2.0, 3.0),
            dir: Vec3::new(0.0, 0.0, -1.0),
        };
        assert!(ray_sphere(&ray, Vec3::ZERO, 1.0).is_none());
    }

    #[test]
    fn test_ray_sphere_from_inside_returns_far_root() {
        let ray = Ray {
            origin: Vec3::ZERO,
            dir: Vec3::new(1.0, 0.0, 0.0),
        };
        let t = ray_sphere(&ray, Vec3::ZERO, 1.0).unwrap();
        assert!((t - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_sphere_behind_origin_is_none() {
        let ray = Ray {
            origin: Vec3::new(0.0, 0.0, 3.0),
            dir: Vec3::new(0.0, 0.0, 1.0),
        };
        assert!(ray_sphere(&ray, Vec3::ZERO, 1.0).is_none());
    }

    #[test]
    fn test_screen_center_ray_passes_through_origin() {
        let config = crate::params::RenderConfig::default();
        let vp = config.view_proj(16.0 / 9.0);
        let ray = Ray::from_screen((640.0, 360.0), (1280.0, 720.0), vp.inverse()).unwrap();

        // From the eye straight down the view axis: hits the unit sphere
        let t = ray_sphere(&ray, Vec3::ZERO, 1.0).expect("center ray should hit");
        let hit = ray.origin + ray.dir * t;
        assert!((hit.length() - 1.0).abs() < 1e-4);
        assert!(hit.x.abs() < 1e-3 && hit.y.abs() < 1e-3);
    }

    #[test]
    fn test_screen_ray_rejects_degenerate_viewport() {
        let vp = crate::params::RenderConfig::default().view_proj(1.0);
        assert!(Ray::from_screen((0.0, 0.0), (0.0, 0.0), vp.inverse()).is_none());
    }
}
