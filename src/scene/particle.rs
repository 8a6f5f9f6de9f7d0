//! Particle records and the per-frame scene buffer.

use bytemuck::{Pod, Zeroable};

use crate::util::{Aabb, Error, Result, Vec3};

/// Floats per particle in the simulator's exchange layout.
pub const FLOATS_PER_PARTICLE: usize = 8;

/// One simulated particle (32 bytes, matches the simulator's upload layout).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: Vec3,
    pub radius: f32,
    pub velocity: Vec3,
    pub _pad: f32,
}

impl Particle {
    pub fn new(position: Vec3, radius: f32, velocity: Vec3) -> Self {
        Self {
            position,
            radius,
            velocity,
            _pad: 0.0,
        }
    }

    /// Leaf bounding box: position ± radius.
    #[inline]
    pub fn aabb(&self) -> Aabb {
        Aabb::from_sphere(self.position, self.radius)
    }
}

/// Current-frame particle state.
///
/// Written once per frame by the simulator side, then only read.
/// The particle count is fixed when the buffer is created.
pub struct SceneBuffer {
    particles: Vec<Particle>,
    frame: u64,
}

impl SceneBuffer {
    /// Allocate a buffer for `count` particles.
    pub fn new(count: usize) -> Self {
        Self {
            particles: vec![Particle::zeroed(); count],
            frame: 0,
        }
    }

    /// Replace the particle state with a new frame.
    pub fn upload(&mut self, particles: &[Particle]) -> Result<()> {
        if particles.len() != self.particles.len() {
            return Err(Error::ParticleCountMismatch {
                expected: self.particles.len(),
                actual: particles.len(),
            });
        }
        self.particles.copy_from_slice(particles);
        self.frame += 1;
        Ok(())
    }

    /// Upload from a flat float buffer of 8 floats per particle
    /// (position xyz, radius, velocity xyz, padding).
    pub fn upload_raw(&mut self, raw: &[f32]) -> Result<()> {
        if raw.len() % FLOATS_PER_PARTICLE != 0 {
            return Err(Error::InvalidParticleBuffer(format!(
                "{} floats is not a multiple of {}",
                raw.len(),
                FLOATS_PER_PARTICLE
            )));
        }
        let records: &[Particle] = bytemuck::try_cast_slice(raw)
            .map_err(|e| Error::InvalidParticleBuffer(e.to_string()))?;
        self.upload(records)
    }

    /// Let the caller write the frame in place.
    pub fn write_with(&mut self, write: impl FnOnce(&mut [Particle])) {
        write(&mut self.particles);
        self.frame += 1;
    }

    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Number of frames uploaded so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_layout() {
        assert_eq!(std::mem::size_of::<Particle>(), 32);
        assert_eq!(
            std::mem::size_of::<Particle>(),
            FLOATS_PER_PARTICLE * std::mem::size_of::<f32>()
        );
    }

    #[test]
    fn test_upload_raw() {
        let mut buf = SceneBuffer::new(2);
        let raw = [
            1.0, 2.0, 3.0, 0.5, 0.1, 0.2, 0.3, 0.0, //
            -1.0, -2.0, -3.0, 0.25, 0.0, 0.0, 0.0, 0.0,
        ];
        buf.upload_raw(&raw).unwrap();
        assert_eq!(buf.frame(), 1);
        assert_eq!(buf.particles()[0].position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(buf.particles()[0].radius, 0.5);
        assert_eq!(buf.particles()[0].velocity, Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(buf.particles()[1].radius, 0.25);
    }

    #[test]
    fn test_upload_rejects_bad_input() {
        let mut buf = SceneBuffer::new(2);
        assert!(matches!(
            buf.upload_raw(&[0.0; 9]),
            Err(Error::InvalidParticleBuffer(_))
        ));
        assert!(matches!(
            buf.upload(&[Particle::zeroed(); 3]),
            Err(Error::ParticleCountMismatch { expected: 2, actual: 3 })
        ));
        assert_eq!(buf.frame(), 0);
    }

    #[test]
    fn test_leaf_box() {
        let p = Particle::new(Vec3::new(1.0, 0.0, 0.0), 0.1, Vec3::ZERO);
        let b = p.aabb();
        assert_eq!(b.min, Vec3::new(0.9, -0.1, -0.1));
        assert_eq!(b.max, Vec3::new(1.1, 0.1, 0.1));
    }
}
