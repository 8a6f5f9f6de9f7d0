//! Surface shading for particle hits and the miss background.

use super::traverse::Hit;
use crate::config::RenderConfig;
use crate::lbvh::Bvh;
use crate::scene::{LightSet, Particle, Ray};
use crate::util::Vec3;

const SPECULAR_POWER: f32 = 48.0;
const SPECULAR_WEIGHT: f32 = 0.35;

// Albedo ramp stops: slow, mid, fast.
const RAMP_COOL: Vec3 = Vec3::new(0.12, 0.32, 0.95);
const RAMP_MID: Vec3 = Vec3::new(0.85, 0.85, 0.9);
const RAMP_HOT: Vec3 = Vec3::new(1.0, 0.42, 0.08);

/// Shading inputs taken from [`RenderConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingParams {
    pub ambient: Vec3,
    pub background_horizon: Vec3,
    pub background_zenith: Vec3,
    pub speed_color_scale: f32,
    pub shadows: bool,
    pub ray_epsilon: f32,
}

impl ShadingParams {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            ambient: config.ambient,
            background_horizon: config.background_horizon,
            background_zenith: config.background_zenith,
            speed_color_scale: config.speed_color_scale,
            shadows: config.shadows,
            ray_epsilon: config.ray_epsilon,
        }
    }
}

impl Default for ShadingParams {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// Albedo from particle speed: cool when resting, hot at `scale` and above.
pub fn speed_albedo(velocity: Vec3, scale: f32) -> Vec3 {
    let s = (velocity.length() / scale).clamp(0.0, 1.0);
    if s < 0.5 {
        RAMP_COOL.lerp(RAMP_MID, s * 2.0)
    } else {
        RAMP_MID.lerp(RAMP_HOT, s * 2.0 - 1.0)
    }
}

/// Vertical gradient, horizon to zenith, for rays that hit nothing.
#[inline]
pub fn background(params: &ShadingParams, direction: Vec3) -> Vec3 {
    let t = direction.y.clamp(0.0, 1.0);
    params.background_horizon.lerp(params.background_zenith, t)
}

/// Linear radiance leaving `hit` toward the ray origin.
pub fn shade_hit(
    params: &ShadingParams,
    bvh: &Bvh,
    particles: &[Particle],
    lights: &LightSet,
    ray: &Ray,
    hit: &Hit,
) -> Vec3 {
    let particle = &particles[hit.particle as usize];
    let albedo = speed_albedo(particle.velocity, params.speed_color_scale);
    let view = -ray.direction;
    let origin = hit.position + hit.normal * params.ray_epsilon;

    let mut radiance = params.ambient * albedo;
    for light in lights.as_slice() {
        let to_light = light.position - hit.position;
        let distance = to_light.length();
        let attenuation = light.attenuation(distance);
        if attenuation <= 0.0 {
            continue;
        }
        let l = to_light / distance;
        let n_dot_l = hit.normal.dot(l);
        if n_dot_l <= 0.0 {
            continue;
        }
        if params.shadows {
            let shadow = Ray::new(origin, l);
            if bvh.occluded(particles, &shadow, params.ray_epsilon, distance - params.ray_epsilon) {
                continue;
            }
        }
        let h = (l + view).normalize_or_zero();
        let spec = hit.normal.dot(h).max(0.0).powf(SPECULAR_POWER) * SPECULAR_WEIGHT;
        let incoming = light.color * (light.intensity * attenuation);
        radiance += incoming * (albedo * n_dot_l + Vec3::splat(spec));
    }
    radiance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneBounds;
    use crate::lbvh::build_bvh;
    use crate::scene::PointLight;

    #[test]
    fn test_albedo_ramp_ends() {
        assert_eq!(speed_albedo(Vec3::ZERO, 2.0), RAMP_COOL);
        assert_eq!(speed_albedo(Vec3::new(0.0, 1.0, 0.0), 2.0), RAMP_MID);
        assert_eq!(speed_albedo(Vec3::new(10.0, 0.0, 0.0), 2.0), RAMP_HOT);
    }

    #[test]
    fn test_background_gradient() {
        let p = ShadingParams::default();
        assert_eq!(background(&p, Vec3::Y), p.background_zenith);
        assert_eq!(background(&p, Vec3::X), p.background_horizon);
        assert_eq!(background(&p, Vec3::NEG_Y), p.background_horizon);
    }

    #[test]
    fn test_lit_vs_shadowed() {
        // a small blocker sits between the light and the front of the lit sphere
        let particles = vec![
            Particle::new(Vec3::ZERO, 0.5, Vec3::ZERO),
            Particle::new(Vec3::new(0.0, 0.0, -1.5), 0.2, Vec3::ZERO),
        ];
        let bvh = build_bvh(&particles, SceneBounds::default()).unwrap();
        let lights = LightSet::new(&[PointLight::new(Vec3::new(0.0, 0.0, -3.0), Vec3::ONE, 4.0, 10.0)]).unwrap();

        // enters sphere 0 exactly at (0, 0, -0.5), clear of the blocker
        let ray = Ray::new(Vec3::new(1.0, 0.0, -1.0), Vec3::new(-1.0, 0.0, 0.5));
        let hit = bvh.intersect_nearest(&particles, &ray, 1e-4, f32::MAX).unwrap();
        assert_eq!(hit.particle, 0);
        assert!((hit.normal - Vec3::NEG_Z).length() < 1e-3);

        let lit = ShadingParams {
            shadows: false,
            ..Default::default()
        };
        let shadowed = ShadingParams {
            shadows: true,
            ..Default::default()
        };
        let a = shade_hit(&lit, &bvh, &particles, &lights, &ray, &hit);
        let b = shade_hit(&shadowed, &bvh, &particles, &lights, &ray, &hit);
        assert_eq!(b, shadowed.ambient * RAMP_COOL);
        assert!(a.z > b.z + 0.1);
    }

    #[test]
    fn test_light_out_of_range_is_ambient_only() {
        let particles = vec![Particle::new(Vec3::ZERO, 0.5, Vec3::ZERO)];
        let bvh = build_bvh(&particles, SceneBounds::default()).unwrap();
        let lights = LightSet::new(&[PointLight::new(Vec3::new(0.0, 0.0, -50.0), Vec3::ONE, 100.0, 5.0)]).unwrap();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        let hit = bvh.intersect_nearest(&particles, &ray, 1e-4, f32::MAX).unwrap();
        let p = ShadingParams::default();
        let c = shade_hit(&p, &bvh, &particles, &lights, &ray, &hit);
        assert_eq!(c, p.ambient * RAMP_COOL);
    }
}
