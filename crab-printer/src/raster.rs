//! Monochrome rasterisation
//!
//! Thermal heads print 1-bit dots. Captured snapshots arrive as PNG (or any
//! format `image` decodes); this module scales them to the head width and
//! thresholds them into packed rows, MSB = leftmost dot.

use image::{DynamicImage, GenericImageView, imageops::FilterType};
use tracing::debug;

/// Packed 1-bit image, one bit per printer dot, rows padded to whole bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonoBitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl MonoBitmap {
    /// Threshold an image into dots, scaling it to `target_width` dots
    ///
    /// Transparent pixels are blank. When `target_width` is `None` the
    /// source width is kept.
    pub fn from_image(img: &DynamicImage, target_width: Option<u32>) -> Self {
        let (w, h) = img.dimensions();
        let (new_w, new_h) = match target_width {
            Some(tw) if tw > 0 && tw != w && w > 0 => {
                let ratio = tw as f64 / w as f64;
                (tw, ((h as f64 * ratio).round() as u32).max(1))
            }
            _ => (w, h),
        };

        let resized = if (new_w, new_h) == (w, h) {
            img.clone()
        } else {
            img.resize_exact(new_w, new_h, FilterType::Triangle)
        };
        let rgba = resized.to_rgba8();

        let row_bytes = new_w.div_ceil(8);
        let mut data = vec![0u8; (row_bytes * new_h) as usize];

        for y in 0..new_h {
            for x in 0..new_w {
                let p = rgba.get_pixel(x, y);
                if p[3] < 128 {
                    continue;
                }
                let luma = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
                if luma < 128.0 {
                    let idx = (y * row_bytes + x / 8) as usize;
                    data[idx] |= 0x80 >> (x % 8);
                }
            }
        }

        debug!(width = new_w, height = new_h, "rasterised image");
        Self {
            width: new_w,
            height: new_h,
            data,
        }
    }

    /// Width in dots
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in dots
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per packed row
    pub fn row_bytes(&self) -> u32 {
        self.width.div_ceil(8)
    }

    /// Packed rows, 1 = black dot
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Packed rows with inverted bits (TSPL BITMAP treats 0 as black)
    pub fn inverted(&self) -> Vec<u8> {
        self.data.iter().map(|b| !b).collect()
    }

    /// Check a single dot
    pub fn is_black(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let idx = (y * self.row_bytes() + x / 8) as usize;
        self.data[idx] & (0x80 >> (x % 8)) != 0
    }
}
