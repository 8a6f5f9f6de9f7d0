//! Render configuration, persisted as JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::lbvh::MAX_PARTICLES;
use crate::util::{Aabb, Error, Result, Vec3};

/// Box the Morton codes are quantized against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SceneBounds {
    /// Fixed for the whole session. Particles outside are clamped to the border cells.
    Fixed { min: Vec3, max: Vec3 },
    /// Recomputed every frame from particle positions (one extra reduction pass).
    Dynamic,
}

impl Default for SceneBounds {
    fn default() -> Self {
        Self::Fixed {
            min: Vec3::splat(-2.0),
            max: Vec3::splat(2.0),
        }
    }
}

impl SceneBounds {
    /// Fixed box, if any.
    pub fn fixed_aabb(&self) -> Option<Aabb> {
        match *self {
            Self::Fixed { min, max } => Some(Aabb::new(min, max)),
            Self::Dynamic => None,
        }
    }
}

/// Pipeline settings. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    // Output
    pub width: u32,
    pub height: u32,

    // Build
    pub scene_bounds: SceneBounds,
    pub sort_block_size: usize,
    pub max_particles: usize,

    // Tracing
    pub ray_epsilon: f32,
    pub shadows: bool,
    pub jitter: bool,
    pub ambient: Vec3,
    pub background_horizon: Vec3,
    pub background_zenith: Vec3,
    /// Speed mapped to the hot end of the albedo ramp.
    pub speed_color_scale: f32,

    // Accumulation
    pub temporal_alpha: f32,
    pub progressive_warmup: bool,
    /// Camera change (max abs component delta) that forces a history reset.
    pub camera_reset_epsilon: f32,

    /// Frames slower than this are logged.
    pub frame_budget_ms: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            scene_bounds: SceneBounds::default(),
            sort_block_size: crate::lbvh::sort::DEFAULT_BLOCK_SIZE,
            max_particles: 4 * 1024 * 1024,
            ray_epsilon: 1e-4,
            shadows: true,
            jitter: true,
            ambient: Vec3::splat(0.03),
            background_horizon: Vec3::new(0.05, 0.06, 0.08),
            background_zenith: Vec3::new(0.01, 0.01, 0.025),
            speed_color_scale: 2.0,
            temporal_alpha: 0.1,
            progressive_warmup: false,
            camera_reset_epsilon: 1e-5,
            frame_budget_ms: 16.0,
        }
    }
}

impl RenderConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse and validate JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check every value is in its supported range.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::config(format!(
                "image size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.sort_block_size < 2 || !self.sort_block_size.is_power_of_two() {
            return Err(Error::config(format!(
                "sort_block_size must be a power of two >= 2, got {}",
                self.sort_block_size
            )));
        }
        if self.max_particles > MAX_PARTICLES {
            return Err(Error::config(format!(
                "max_particles {} exceeds the signed child-index limit {}",
                self.max_particles, MAX_PARTICLES
            )));
        }
        if !(self.temporal_alpha > 0.0 && self.temporal_alpha <= 1.0) {
            return Err(Error::config(format!(
                "temporal_alpha must be in (0, 1], got {}",
                self.temporal_alpha
            )));
        }
        if !(self.ray_epsilon >= 0.0 && self.ray_epsilon.is_finite()) {
            return Err(Error::config(format!("ray_epsilon must be >= 0, got {}", self.ray_epsilon)));
        }
        if !(self.speed_color_scale > 0.0) {
            return Err(Error::config("speed_color_scale must be positive"));
        }
        if let SceneBounds::Fixed { min, max } = self.scene_bounds {
            if !(min.is_finite() && max.is_finite()) || min.cmpge(max).any() {
                return Err(Error::config(format!(
                    "fixed scene bounds need min < max on every axis, got {min:?} - {max:?}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let c = RenderConfig::default();
        c.validate().unwrap();
        assert_eq!(c.scene_bounds.fixed_aabb(), Some(Aabb::new(Vec3::splat(-2.0), Vec3::splat(2.0))));
        assert_eq!(c.max_particles, 4_194_304);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let c = RenderConfig::from_json(r#"{ "width": 32, "scene_bounds": { "mode": "dynamic" } }"#).unwrap();
        assert_eq!(c.width, 32);
        assert_eq!(c.height, RenderConfig::default().height);
        assert_eq!(c.scene_bounds, SceneBounds::Dynamic);
    }

    #[test]
    fn test_validation_errors() {
        let bad = [
            r#"{ "width": 0 }"#,
            r#"{ "sort_block_size": 100 }"#,
            r#"{ "sort_block_size": 1 }"#,
            r#"{ "temporal_alpha": 0.0 }"#,
            r#"{ "temporal_alpha": 1.5 }"#,
            r#"{ "scene_bounds": { "mode": "fixed", "min": [1, 0, 0], "max": [0, 1, 1] } }"#,
        ];
        for json in bad {
            assert!(
                matches!(RenderConfig::from_json(json), Err(Error::InvalidConfig(_))),
                "{json} should be rejected"
            );
        }
        assert!(matches!(RenderConfig::from_json("{ nope"), Err(Error::Json(_))));
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("render.json");
        let c = RenderConfig {
            width: 128,
            temporal_alpha: 0.25,
            scene_bounds: SceneBounds::Fixed {
                min: Vec3::splat(-8.0),
                max: Vec3::new(8.0, 4.0, 8.0),
            },
            ..Default::default()
        };
        c.save(&path).unwrap();
        assert_eq!(RenderConfig::load(&path).unwrap(), c);
    }
}
