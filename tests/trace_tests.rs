//! Integration tests for traversal and the per-pixel tracer.

use lbvh_render::lbvh::build_bvh;
use lbvh_render::scene::{Camera, LightSet, Particle, PointLight, Ray};
use lbvh_render::trace::{background, RayTracer, ShadingParams};
use lbvh_render::util::{Vec2, Vec3};
use lbvh_render::{HdrImage, SceneBounds};

const EPS: f32 = 1e-4;

fn two_spheres() -> Vec<Particle> {
    vec![
        Particle::new(Vec3::new(-1.0, 0.5, 0.0), 0.4, Vec3::ZERO),
        Particle::new(Vec3::new(1.0, -0.5, 0.0), 0.6, Vec3::ZERO),
    ]
}

#[test]
fn test_analytic_hit_on_one_of_two() {
    let particles = two_spheres();
    let bvh = build_bvh(&particles, SceneBounds::default()).expect("build");

    // straight down -z through the center of sphere 1
    let ray = Ray::new(Vec3::new(1.0, -0.5, 10.0), Vec3::NEG_Z);
    let hit = bvh.intersect_nearest(&particles, &ray, EPS, f32::MAX).expect("hit");
    assert_eq!(hit.particle, 1);
    assert!((hit.t - 9.4).abs() < 1e-4, "t = {}", hit.t);
    assert!((hit.position - Vec3::new(1.0, -0.5, 0.6)).length() < 1e-4);
    assert!((hit.normal - Vec3::Z).length() < 1e-4);

    // oblique ray onto sphere 0: origin offset along the direction from its surface point
    let dir = Vec3::new(0.3, -0.2, -1.0).normalize();
    let surface = Vec3::new(-1.0, 0.5, 0.4);
    let origin = surface - dir * 5.0;
    let ray = Ray::new(origin, dir);
    let hit = bvh.intersect_nearest(&particles, &ray, EPS, f32::MAX).expect("hit");
    assert_eq!(hit.particle, 0);
    // analytic nearest root
    let oc = origin - particles[0].position;
    let b = oc.dot(dir);
    let t = -b - (b * b - (oc.length_squared() - 0.16)).sqrt();
    assert!((hit.t - t).abs() < 1e-4);
}

#[test]
fn test_miss_reports_nothing() {
    let particles = two_spheres();
    let bvh = build_bvh(&particles, SceneBounds::default()).expect("build");
    for ray in [
        Ray::new(Vec3::new(0.0, 3.0, 10.0), Vec3::NEG_Z),
        Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::Z),
        Ray::new(Vec3::new(-5.0, 2.0, 0.0), Vec3::X),
    ] {
        assert!(bvh.intersect_nearest(&particles, &ray, EPS, f32::MAX).is_none());
        assert!(!bvh.occluded(&particles, &ray, EPS, f32::MAX));
    }
}

#[test]
fn test_hit_limited_by_t_max() {
    let particles = two_spheres();
    let bvh = build_bvh(&particles, SceneBounds::default()).expect("build");
    let ray = Ray::new(Vec3::new(1.0, -0.5, 10.0), Vec3::NEG_Z);
    assert!(bvh.intersect_nearest(&particles, &ray, EPS, 9.0).is_none());
    assert!(bvh.occluded(&particles, &ray, EPS, 9.5));
}

#[test]
fn test_dense_cloud_front_particle_wins() {
    // a row of spheres along z, looked at head on
    let particles: Vec<Particle> = (0..64)
        .map(|i| Particle::new(Vec3::new(0.0, 0.0, i as f32 * 0.05), 0.02, Vec3::ZERO))
        .collect();
    let bvh = build_bvh(&particles, SceneBounds::default()).expect("build");
    let ray = Ray::new(Vec3::new(0.0, 0.0, -1.0), Vec3::Z);
    let hit = bvh.intersect_nearest(&particles, &ray, EPS, f32::MAX).expect("hit");
    assert_eq!(hit.particle, 0);
    assert!((hit.t - 0.98).abs() < 1e-4);

    let back = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
    let hit = bvh.intersect_nearest(&particles, &back, EPS, f32::MAX).expect("hit");
    assert_eq!(hit.particle, 63);
}

#[test]
fn test_render_covers_sphere_silhouette() {
    let particles = vec![Particle::new(Vec3::ZERO, 0.75, Vec3::ZERO)];
    let bvh = build_bvh(&particles, SceneBounds::default()).expect("build");
    let lights = LightSet::new(&[PointLight::new(Vec3::new(0.0, 0.0, -3.0), Vec3::ONE, 10.0, 20.0)]).expect("lights");
    let camera = Camera::look_at(Vec3::new(0.0, 0.0, -3.0), Vec3::ZERO, Vec3::Y, 60f32.to_radians(), 1.0);
    let params = ShadingParams::default();
    let tracer = RayTracer::new(params, false);

    let mut img = HdrImage::new(32, 32);
    tracer.render(&bvh, &particles, &lights, &camera, 0, &mut img);

    let mut covered = 0;
    for y in 0..32 {
        for x in 0..32 {
            let ray = camera.primary_ray(x, y, 32, 32, Vec2::ZERO);
            let bg = background(&params, ray.direction).extend(1.0);
            let hit = bvh.intersect_nearest(&particles, &ray, EPS, f32::MAX).is_some();
            assert_eq!(hit, img.get(x, y) != bg, "pixel ({x}, {y})");
            covered += usize::from(hit);
        }
    }
    assert!(covered > 0 && covered < 32 * 32);
}
