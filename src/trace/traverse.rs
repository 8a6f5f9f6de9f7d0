//! Stack-based traversal: nearest hit and any-hit (shadow) queries.

use smallvec::SmallVec;

use crate::lbvh::{Bvh, NodeRef};
use crate::scene::{Particle, Ray};
use crate::util::Vec3;

/// Inline traversal stack depth. Deeper trees spill to the heap.
pub const STACK_CAPACITY: usize = 32;

/// Nearest intersection along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub t: f32,
    /// Original particle index.
    pub particle: u32,
    pub position: Vec3,
    /// Outward unit normal.
    pub normal: Vec3,
}

/// Ray-sphere test. Returns the closest root inside `(t_min, t_max)`.
#[inline]
pub fn intersect_sphere(ray: &Ray, center: Vec3, radius: f32, t_min: f32, t_max: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.length_squared() - radius * radius;
    let disc = b * b - c;
    if !(disc >= 0.0) {
        return None;
    }
    let s = disc.sqrt();
    let t0 = -b - s;
    if t0 > t_min && t0 < t_max {
        return Some(t0);
    }
    let t1 = -b + s;
    (t1 > t_min && t1 < t_max).then_some(t1)
}

type Stack = SmallVec<[(u32, f32); STACK_CAPACITY]>;

impl Bvh {
    /// Nearest particle hit in `(t_min, t_max)`.
    pub fn intersect_nearest(&self, particles: &[Particle], ray: &Ray, t_min: f32, t_max: f32) -> Option<Hit> {
        let (particle, t) = self.walk(particles, ray, t_min, t_max, false)?;
        let p = &particles[particle as usize];
        let position = ray.at(t);
        let normal = (position - p.position).normalize_or(-ray.direction);
        Some(Hit {
            t,
            particle,
            position,
            normal,
        })
    }

    /// True if any particle blocks the ray in `(t_min, t_max)`.
    pub fn occluded(&self, particles: &[Particle], ray: &Ray, t_min: f32, t_max: f32) -> bool {
        self.walk(particles, ray, t_min, t_max, true).is_some()
    }

    fn walk(
        &self,
        particles: &[Particle],
        ray: &Ray,
        t_min: f32,
        mut t_max: f32,
        any_hit: bool,
    ) -> Option<(u32, f32)> {
        let mut best = None;

        let test_leaf = |p: u32, t_max: f32| {
            let particle = &particles[p as usize];
            intersect_sphere(ray, particle.position, particle.radius, t_min, t_max)
        };

        let mut stack = Stack::new();
        match self.root()? {
            NodeRef::Leaf(p) => return test_leaf(p, t_max).map(|t| (p, t)),
            NodeRef::Internal(root) => {
                let t = self.nodes[root as usize]
                    .aabb()
                    .intersect_ray(ray.origin, ray.inv_direction, t_min, t_max)?;
                stack.push((root, t));
            }
        }

        while let Some((node, t_entry)) = stack.pop() {
            // box lies past a hit found after it was pushed
            if t_entry > t_max {
                continue;
            }
            let (left, right) = self.nodes[node as usize].children();

            let mut pending: SmallVec<[(u32, f32); 2]> = SmallVec::new();
            for child in [left, right] {
                match child {
                    NodeRef::Leaf(p) => {
                        if let Some(t) = test_leaf(p, t_max) {
                            t_max = t;
                            best = Some((p, t));
                            if any_hit {
                                return best;
                            }
                        }
                    }
                    NodeRef::Internal(c) => {
                        if let Some(t) = self.nodes[c as usize]
                            .aabb()
                            .intersect_ray(ray.origin, ray.inv_direction, t_min, t_max)
                        {
                            pending.push((c, t));
                        }
                    }
                }
            }

            // far child first so the near one pops next
            if pending.len() == 2 && pending[0].1 < pending[1].1 {
                pending.swap(0, 1);
            }
            stack.extend(pending);
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneBounds;
    use crate::lbvh::build_bvh;

    fn two_spheres() -> Vec<Particle> {
        vec![
            Particle::new(Vec3::new(-1.0, 0.0, 0.0), 0.5, Vec3::ZERO),
            Particle::new(Vec3::new(1.0, 0.0, 0.0), 0.5, Vec3::ZERO),
        ]
    }

    #[test]
    fn test_sphere_roots() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        assert_eq!(intersect_sphere(&ray, Vec3::ZERO, 1.0, 1e-4, f32::MAX), Some(4.0));
        // inside the sphere: far root
        let inside = Ray::new(Vec3::ZERO, Vec3::Z);
        assert_eq!(intersect_sphere(&inside, Vec3::ZERO, 1.0, 1e-4, f32::MAX), Some(1.0));
        // beyond current nearest
        assert_eq!(intersect_sphere(&ray, Vec3::ZERO, 1.0, 1e-4, 3.0), None);
        let miss = Ray::new(Vec3::new(2.0, 0.0, -5.0), Vec3::Z);
        assert_eq!(intersect_sphere(&miss, Vec3::ZERO, 1.0, 1e-4, f32::MAX), None);
    }

    #[test]
    fn test_nearest_of_two() {
        let particles = two_spheres();
        let bvh = build_bvh(&particles, SceneBounds::default()).unwrap();

        let ray = Ray::new(Vec3::new(1.0, 0.0, -5.0), Vec3::Z);
        let hit = bvh.intersect_nearest(&particles, &ray, 1e-4, f32::MAX).unwrap();
        assert_eq!(hit.particle, 1);
        assert!((hit.t - 4.5).abs() < 1e-5);
        assert!((hit.normal - Vec3::NEG_Z).length() < 1e-5);

        // along x the near sphere wins
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        let hit = bvh.intersect_nearest(&particles, &ray, 1e-4, f32::MAX).unwrap();
        assert_eq!(hit.particle, 0);
        assert!((hit.t - 3.5).abs() < 1e-5);

        let miss = Ray::new(Vec3::new(0.0, 3.0, -5.0), Vec3::Z);
        assert!(bvh.intersect_nearest(&particles, &miss, 1e-4, f32::MAX).is_none());
    }

    #[test]
    fn test_occluded() {
        let particles = two_spheres();
        let bvh = build_bvh(&particles, SceneBounds::default()).unwrap();
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::X);
        assert!(bvh.occluded(&particles, &ray, 1e-4, f32::MAX));
        // segment stops short of the first sphere
        assert!(!bvh.occluded(&particles, &ray, 1e-4, 3.0));
    }

    #[test]
    fn test_single_and_empty() {
        let one = vec![Particle::new(Vec3::ZERO, 1.0, Vec3::ZERO)];
        let bvh = build_bvh(&one, SceneBounds::default()).unwrap();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::Z);
        assert_eq!(bvh.intersect_nearest(&one, &ray, 1e-4, f32::MAX).map(|h| h.particle), Some(0));

        let empty = build_bvh(&[], SceneBounds::default()).unwrap();
        assert!(empty.intersect_nearest(&[], &ray, 1e-4, f32::MAX).is_none());
        assert!(!empty.occluded(&[], &ray, 1e-4, f32::MAX));
    }

    #[test]
    fn test_matches_brute_force() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let particles: Vec<Particle> = (0..500)
            .map(|_| {
                let p = Vec3::new(rng.gen_range(-1.5..1.5), rng.gen_range(-1.5..1.5), rng.gen_range(-1.5..1.5));
                Particle::new(p, rng.gen_range(0.01..0.08), Vec3::ZERO)
            })
            .collect();
        let bvh = build_bvh(&particles, SceneBounds::default()).unwrap();

        for _ in 0..200 {
            let origin = Vec3::new(rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0), -4.0);
            let target = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0);
            let ray = Ray::new(origin, target - origin);

            let brute = particles
                .iter()
                .enumerate()
                .filter_map(|(i, p)| intersect_sphere(&ray, p.position, p.radius, 1e-4, f32::MAX).map(|t| (i as u32, t)))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            let hit = bvh.intersect_nearest(&particles, &ray, 1e-4, f32::MAX);

            match (brute, hit) {
                (None, None) => {}
                (Some((_, t)), Some(h)) => assert!((h.t - t).abs() < 1e-5),
                other => panic!("bvh and brute force disagree: {other:?}"),
            }
        }
    }
}
