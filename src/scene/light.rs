//! Point lights consumed by the shading stage.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::util::{Error, Result, Vec3};

/// Maximum number of point lights per frame.
pub const MAX_LIGHTS: usize = 8;

/// Point light, animated outside the pipeline and uploaded verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
    /// Distance at which the contribution reaches zero.
    pub falloff_radius: f32,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, intensity: f32, falloff_radius: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            falloff_radius,
        }
    }

    /// Distance attenuation: inverse square, windowed to zero at the falloff radius.
    #[inline]
    pub fn attenuation(&self, distance: f32) -> f32 {
        if self.falloff_radius <= 0.0 || distance >= self.falloff_radius {
            return 0.0;
        }
        let x = distance / self.falloff_radius;
        let window = (1.0 - x * x * x * x).clamp(0.0, 1.0);
        window * window / (distance * distance + 1.0)
    }
}

/// Up to [`MAX_LIGHTS`] lights for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightSet {
    lights: SmallVec<[PointLight; MAX_LIGHTS]>,
}

impl LightSet {
    pub fn new(lights: &[PointLight]) -> Result<Self> {
        if lights.len() > MAX_LIGHTS {
            return Err(Error::TooManyLights {
                count: lights.len(),
                max: MAX_LIGHTS,
            });
        }
        Ok(Self {
            lights: SmallVec::from_slice(lights),
        })
    }

    #[inline]
    pub fn as_slice(&self) -> &[PointLight] {
        &self.lights
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attenuation_decreases() {
        let l = PointLight::new(Vec3::ZERO, Vec3::ONE, 1.0, 10.0);
        let near = l.attenuation(0.5);
        let mid = l.attenuation(3.0);
        let far = l.attenuation(9.0);
        assert!(near > mid && mid > far && far > 0.0);
        assert_eq!(l.attenuation(10.0), 0.0);
        assert_eq!(l.attenuation(25.0), 0.0);
    }

    #[test]
    fn test_light_limit() {
        let l = PointLight::new(Vec3::ZERO, Vec3::ONE, 1.0, 1.0);
        assert_eq!(LightSet::new(&[l; MAX_LIGHTS]).unwrap().len(), MAX_LIGHTS);
        assert!(matches!(
            LightSet::new(&[l; MAX_LIGHTS + 1]),
            Err(Error::TooManyLights { count: 9, max: 8 })
        ));
    }
}
