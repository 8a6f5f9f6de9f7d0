//! Exponential temporal accumulation.
//!
//! `output = history * (1 - alpha) + current * alpha`, with a reset that
//! snaps `output` to `current`. The two buffers ping-pong: each frame's
//! output is the next frame's history.

use rayon::prelude::*;

use crate::output::HdrImage;
use crate::util::{Error, Result};

/// History/output pair with an exponential moving average.
pub struct TemporalAccumulator {
    alpha: f32,
    progressive_warmup: bool,
    history: HdrImage,
    output: HdrImage,
    frames_since_reset: u32,
}

impl TemporalAccumulator {
    /// `alpha` must lie in `(0, 1]`.
    pub fn new(width: u32, height: u32, alpha: f32, progressive_warmup: bool) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::config(format!("temporal alpha must be in (0, 1], got {alpha}")));
        }
        Ok(Self {
            alpha,
            progressive_warmup,
            history: HdrImage::new(width, height),
            output: HdrImage::new(width, height),
            frames_since_reset: 0,
        })
    }

    #[inline]
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Blend factor for the next frame. With warm-up the first frames after
    /// a reset weigh in as a plain running mean until that drops below alpha.
    pub fn effective_alpha(&self) -> f32 {
        if self.progressive_warmup {
            self.alpha.max(1.0 / (self.frames_since_reset + 1) as f32)
        } else {
            self.alpha
        }
    }

    /// Blend `current` into the history. The first frame after creation,
    /// a resize or [`reset`](Self::reset) always snaps.
    #[tracing::instrument(skip_all, fields(reset = reset))]
    pub fn accumulate(&mut self, current: &HdrImage, reset: bool) -> Result<&HdrImage> {
        if current.dimensions() != self.output.dimensions() {
            return Err(Error::ImageSizeMismatch {
                expected: self.output.dimensions(),
                actual: current.dimensions(),
            });
        }

        std::mem::swap(&mut self.history, &mut self.output);

        if reset || self.frames_since_reset == 0 {
            self.output.pixels_mut().copy_from_slice(current.pixels());
            self.frames_since_reset = 1;
            return Ok(&self.output);
        }

        let a = self.effective_alpha();
        let keep = 1.0 - a;
        self.output
            .pixels_mut()
            .par_iter_mut()
            .zip(self.history.pixels().par_iter())
            .zip(current.pixels().par_iter())
            .for_each(|((out, hist), cur)| *out = *hist * keep + *cur * a);
        self.frames_since_reset = self.frames_since_reset.saturating_add(1);
        Ok(&self.output)
    }

    /// Make the next frame snap to its input.
    pub fn reset(&mut self) {
        self.frames_since_reset = 0;
    }

    /// Reallocate both buffers; implies a reset.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.output.dimensions() == (width, height) {
            return;
        }
        self.history = HdrImage::new(width, height);
        self.output = HdrImage::new(width, height);
        self.frames_since_reset = 0;
    }

    #[inline]
    pub fn output(&self) -> &HdrImage {
        &self.output
    }

    #[inline]
    pub fn history(&self) -> &HdrImage {
        &self.history
    }

    #[inline]
    pub fn frames_since_reset(&self) -> u32 {
        self.frames_since_reset
    }
}
