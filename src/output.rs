//! Linear HDR frame handed to the external compositing stage.

use crate::util::Vec4;
#[cfg(feature = "export")]
use crate::util::{Error, Result};

/// Linear-color RGBA image, row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct HdrImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

impl HdrImage {
    /// Black, fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Vec4::ZERO; width as usize * height as usize],
        }
    }

    /// Image filled with one color.
    pub fn filled(width: u32, height: u32, color: Vec4) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.pixels[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, color: Vec4) {
        self.pixels[(y * self.width + x) as usize] = color;
    }

    #[inline]
    pub fn pixels(&self) -> &[Vec4] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [Vec4] {
        &mut self.pixels
    }

    /// Raw RGBA32F bytes for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Mean of all pixels.
    pub fn mean(&self) -> Vec4 {
        if self.pixels.is_empty() {
            return Vec4::ZERO;
        }
        let sum: Vec4 = self.pixels.iter().copied().sum();
        sum / self.pixels.len() as f32
    }

    /// Write as OpenEXR (`.exr`, RGBA) or Radiance (`.hdr`, RGB) by extension.
    #[cfg(feature = "export")]
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        use image::{DynamicImage, ImageBuffer, Rgb, Rgba};

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let img = match ext.as_str() {
            "exr" => {
                let raw: Vec<f32> = bytemuck::cast_slice(&self.pixels).to_vec();
                let buf = ImageBuffer::<Rgba<f32>, Vec<f32>>::from_raw(self.width, self.height, raw)
                    .ok_or_else(|| Error::other("pixel buffer does not match image size"))?;
                DynamicImage::ImageRgba32F(buf)
            }
            "hdr" => {
                let raw: Vec<f32> = self.pixels.iter().flat_map(|p| p.truncate().to_array()).collect();
                let buf = ImageBuffer::<Rgb<f32>, Vec<f32>>::from_raw(self.width, self.height, raw)
                    .ok_or_else(|| Error::other("pixel buffer does not match image size"))?;
                DynamicImage::ImageRgb32F(buf)
            }
            other => {
                return Err(Error::other(format!(
                    "unsupported output format '{other}', expected .exr or .hdr"
                )))
            }
        };
        img.save(path)?;
        tracing::info!("Wrote {}x{} frame to {}", self.width, self.height, path.display());
        Ok(())
    }
}
