//! Per-frame pipeline: rebuild the tree, trace, accumulate.
//!
//! ## Usage
//! ```ignore
//! let mut pipeline = FramePipeline::new(RenderConfig::default(), particles.len())?;
//! loop {
//!     let frame = FrameInput::new(&particles, &lights, &camera);
//!     let image = pipeline.render(&frame)?;
//!     // hand `image` to tone mapping / display
//! }
//! ```

use std::time::{Duration, Instant};

use crate::config::RenderConfig;
use crate::lbvh::{BuildStats, Bvh, LbvhBuilder};
use crate::output::HdrImage;
use crate::scene::{Camera, LightSet, Particle};
use crate::temporal::TemporalAccumulator;
use crate::trace::{RayTracer, ShadingParams};
use crate::util::{Error, Result};

/// Everything the pipeline reads for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub particles: &'a [Particle],
    pub lights: &'a LightSet,
    pub camera: &'a Camera,
    /// Discard accumulated history (scene cut, teleport).
    pub reset: bool,
}

impl<'a> FrameInput<'a> {
    pub fn new(particles: &'a [Particle], lights: &'a LightSet, camera: &'a Camera) -> Self {
        Self {
            particles,
            lights,
            camera,
            reset: false,
        }
    }

    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }
}

/// Timings for the last rendered frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub frame_index: u64,
    pub build: BuildStats,
    pub trace: Duration,
    pub accumulate: Duration,
    pub total: Duration,
    /// Build passes plus trace and accumulate.
    pub dispatches: usize,
    /// History was discarded this frame.
    pub reset: bool,
}

/// Owns every per-frame buffer for one session. The particle count is fixed;
/// a different count needs a new pipeline.
pub struct FramePipeline {
    config: RenderConfig,
    builder: LbvhBuilder,
    tracer: RayTracer,
    current: HdrImage,
    accumulator: TemporalAccumulator,
    last_camera: Option<Camera>,
    frame_index: u64,
    stats: FrameStats,
}

impl FramePipeline {
    /// Validate `config` and allocate buffers for `particle_count` particles.
    pub fn new(config: RenderConfig, particle_count: usize) -> Result<Self> {
        config.validate()?;
        if particle_count > config.max_particles {
            return Err(Error::CapacityExceeded {
                requested: particle_count,
                limit: config.max_particles,
            });
        }

        let builder = LbvhBuilder::new(particle_count, config.scene_bounds, config.sort_block_size)?;
        let tracer = RayTracer::new(ShadingParams::from_config(&config), config.jitter);
        let accumulator = TemporalAccumulator::new(
            config.width,
            config.height,
            config.temporal_alpha,
            config.progressive_warmup,
        )?;

        tracing::info!(
            particle_count,
            width = config.width,
            height = config.height,
            "frame pipeline created"
        );

        Ok(Self {
            current: HdrImage::new(config.width, config.height),
            config,
            builder,
            tracer,
            accumulator,
            last_camera: None,
            frame_index: 0,
            stats: FrameStats::default(),
        })
    }

    /// Build, trace and accumulate one frame. Returns the accumulated image.
    #[tracing::instrument(skip_all, fields(frame = self.frame_index))]
    pub fn render(&mut self, input: &FrameInput<'_>) -> Result<&HdrImage> {
        let start = Instant::now();

        self.builder.build(input.particles)?;
        let build = *self.builder.last_stats();

        let t = Instant::now();
        self.tracer.render(
            self.builder.bvh(),
            input.particles,
            input.lights,
            input.camera,
            self.frame_index,
            &mut self.current,
        );
        let trace = t.elapsed();

        let mut reset = input.reset;
        if let Some(prev) = &self.last_camera {
            let delta = prev.max_delta(input.camera);
            if delta > self.config.camera_reset_epsilon {
                tracing::info!("camera moved, delta={delta:.2e}, resetting history");
                reset = true;
            }
        }
        self.last_camera = Some(*input.camera);
        // first frame after creation or resize
        reset |= self.accumulator.frames_since_reset() == 0;

        let t = Instant::now();
        self.accumulator.accumulate(&self.current, reset)?;
        let accumulate = t.elapsed();

        let total = start.elapsed();
        self.stats = FrameStats {
            frame_index: self.frame_index,
            build,
            trace,
            accumulate,
            total,
            dispatches: build.dispatches + 2,
            reset,
        };
        self.frame_index += 1;

        let frame_ms = total.as_secs_f64() * 1000.0;
        if frame_ms > self.config.frame_budget_ms as f64 {
            tracing::warn!("SLOW FRAME: {:.1}ms (build {:.1}ms)", frame_ms, build.total().as_secs_f64() * 1000.0);
        }

        Ok(self.accumulator.output())
    }

    /// Change the output resolution. History is discarded.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::config(format!("image size must be non-zero, got {width}x{height}")));
        }
        if (width, height) == self.current.dimensions() {
            return Ok(());
        }
        self.config.width = width;
        self.config.height = height;
        self.current = HdrImage::new(width, height);
        self.accumulator.resize(width, height);
        tracing::debug!(width, height, "pipeline resized");
        Ok(())
    }

    /// Make the next frame start a fresh history.
    pub fn reset_history(&mut self) {
        self.accumulator.reset();
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[inline]
    pub fn particle_count(&self) -> usize {
        self.builder.particle_count()
    }

    /// Tree from the last frame.
    #[inline]
    pub fn bvh(&self) -> &Bvh {
        self.builder.bvh()
    }

    /// This frame's raw radiance, before accumulation.
    #[inline]
    pub fn current_frame(&self) -> &HdrImage {
        &self.current
    }

    /// Accumulated image from the last frame.
    #[inline]
    pub fn output(&self) -> &HdrImage {
        self.accumulator.output()
    }

    /// Frames rendered so far.
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    pub fn last_stats(&self) -> &FrameStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Vec3;

    fn small_config() -> RenderConfig {
        RenderConfig {
            width: 16,
            height: 12,
            jitter: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_capacity_checked() {
        let config = RenderConfig {
            max_particles: 10,
            ..small_config()
        };
        assert!(matches!(
            FramePipeline::new(config, 11),
            Err(Error::CapacityExceeded { requested: 11, limit: 10 })
        ));
    }

    #[test]
    fn test_camera_move_resets() {
        let particles = vec![Particle::new(Vec3::ZERO, 0.5, Vec3::ZERO)];
        let lights = LightSet::default();
        let cam_a = Camera::look_at(Vec3::new(0.0, 0.0, -4.0), Vec3::ZERO, Vec3::Y, 1.0, 16.0 / 12.0);
        let cam_b = Camera::look_at(Vec3::new(0.5, 0.0, -4.0), Vec3::ZERO, Vec3::Y, 1.0, 16.0 / 12.0);

        let mut pipeline = FramePipeline::new(small_config(), 1).unwrap();
        pipeline.render(&FrameInput::new(&particles, &lights, &cam_a)).unwrap();
        assert!(pipeline.last_stats().reset);
        pipeline.render(&FrameInput::new(&particles, &lights, &cam_a)).unwrap();
        assert!(!pipeline.last_stats().reset);
        pipeline.render(&FrameInput::new(&particles, &lights, &cam_b)).unwrap();
        assert!(pipeline.last_stats().reset);
        pipeline
            .render(&FrameInput::new(&particles, &lights, &cam_b).with_reset(true))
            .unwrap();
        assert!(pipeline.last_stats().reset);
        assert_eq!(pipeline.frame_index(), 4);
    }

    #[test]
    fn test_resize_resets() {
        let particles = vec![Particle::new(Vec3::ZERO, 0.5, Vec3::ZERO)];
        let lights = LightSet::default();
        let cam = Camera::look_at(Vec3::new(0.0, 0.0, -4.0), Vec3::ZERO, Vec3::Y, 1.0, 1.0);
        let mut pipeline = FramePipeline::new(small_config(), 1).unwrap();
        pipeline.render(&FrameInput::new(&particles, &lights, &cam)).unwrap();
        pipeline.render(&FrameInput::new(&particles, &lights, &cam)).unwrap();

        pipeline.resize(8, 8).unwrap();
        let out = pipeline.render(&FrameInput::new(&particles, &lights, &cam)).unwrap();
        assert_eq!(out.dimensions(), (8, 8));
        assert!(pipeline.last_stats().reset);
        assert!(pipeline.resize(0, 8).is_err());
    }
}
