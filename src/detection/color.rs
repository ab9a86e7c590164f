/// RGB to HSV conversion and color masking
///
/// HSV values follow the common 8-bit convention (hue halved to fit a byte):
/// H in 0..=179, S and V in 0..=255. Color ranges in the config use the same scale,
/// so values measured with other tools in that convention can be pasted directly.
use image::RgbaImage;
use rayon::prelude::*;

use crate::config::ColorRange;

/// Convert one RGB sample to 8-bit HSV
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let rf = r as f32;
    let gf = g as f32;
    let bf = b as f32;

    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    // 360° maps onto 0..180; a rounded 180 wraps back to red
    let h = (h / 2.0).round() as u32 % 180;

    [h as u8, s.round() as u8, v.round() as u8]
}

/// Binary mask of pixels whose HSV value falls inside a color range.
///
/// Stored row-major, one byte per pixel (1 = on, 0 = off).
#[derive(Debug, Clone)]
pub struct ColorMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ColorMask {
    /// Build the mask in parallel by row
    pub fn from_image(image: &RgbaImage, range: &ColorRange) -> Self {
        let (width, height) = image.dimensions();
        let row_size = width as usize;
        let mut data = vec![0u8; row_size * height as usize];

        if row_size > 0 {
            let samples = image.as_raw();
            data.par_chunks_mut(row_size)
                .enumerate()
                .for_each(|(y, row)| {
                    let offset = y * row_size * 4;
                    for (x, out) in row.iter_mut().enumerate() {
                        let px = &samples[offset + x * 4..offset + x * 4 + 3];
                        *out = range.contains(rgb_to_hsv(px[0], px[1], px[2])) as u8;
                    }
                });
        }

        Self {
            width,
            height,
            data,
        }
    }

    /// Build a mask directly from on/off values (row-major)
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn is_on(&self, x: u32, y: u32) -> bool {
        self.data[y as usize * self.width as usize + x as usize] != 0
    }

    pub fn on_count(&self) -> u64 {
        self.data.iter().filter(|&&v| v != 0).count() as u64
    }

    /// Count of on-pixels in row `y` between columns `x0..x0 + w`
    pub fn row_on_count(&self, y: u32, x0: u32, w: u32) -> u32 {
        let start = y as usize * self.width as usize + x0 as usize;
        self.data[start..start + w as usize]
            .iter()
            .filter(|&&v| v != 0)
            .count() as u32
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_rgb_to_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
    }

    #[test]
    fn test_rgb_to_hsv_greys_have_no_saturation() {
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(255, 255, 255), [0, 0, 255]);
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
    }

    #[test]
    fn test_rgb_to_hsv_form_blue() {
        // Bar color of the target form
        assert_eq!(rgb_to_hsv(91, 104, 220), [117, 150, 220]);
    }

    #[test]
    fn test_mask_from_image() {
        let mut image = RgbaImage::from_pixel(4, 3, Rgba([255, 255, 255, 255]));
        image.put_pixel(1, 1, Rgba([91, 104, 220, 255]));
        image.put_pixel(3, 2, Rgba([91, 104, 220, 255]));

        let mask = ColorMask::from_image(&image, &ColorRange::default());
        assert_eq!(mask.on_count(), 2);
        assert!(mask.is_on(1, 1));
        assert!(mask.is_on(3, 2));
        assert!(!mask.is_on(0, 0));
        assert_eq!(mask.row_on_count(2, 0, 4), 1);
        assert_eq!(mask.row_on_count(2, 0, 3), 0);
    }

    #[test]
    fn test_mask_from_raw_checks_length() {
        assert!(ColorMask::from_raw(2, 2, vec![0, 1, 1]).is_none());
        assert!(ColorMask::from_raw(2, 2, vec![0, 1, 1, 0]).is_some());
    }
}
