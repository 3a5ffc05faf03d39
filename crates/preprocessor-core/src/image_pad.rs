//! Resize-with-pad helper shared by preprocessors
//!
//! Images are scaled so their short side matches the requested resolution,
//! then padded on the bottom/right edge to a multiple of 64 by replicating
//! the last row and column. The returned [`PadRemover`] undoes both steps on
//! the preprocessor's output.

use crate::error::PreprocessorError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

/// Spatial alignment required by the downstream control models
const PAD_ALIGN: u32 = 64;

/// Next multiple of [`PAD_ALIGN`], `None` when it does not fit in a `u32`
fn align64(x: u32) -> Option<u32> {
    x.div_ceil(PAD_ALIGN).checked_mul(PAD_ALIGN)
}

/// `len * k` rounded half to even, `None` when it does not fit in a `u32`
fn scale_len(len: u32, k: f64) -> Option<u32> {
    let scaled = (len as f64 * k).round_ties_even();
    if scaled > u32::MAX as f64 {
        return None;
    }
    Some((scaled as u32).max(1))
}

fn filter_for(from: (u32, u32), to: (u32, u32)) -> FilterType {
    if to.0 as u64 * to.1 as u64 > from.0 as u64 * from.1 as u64 {
        FilterType::CatmullRom
    } else {
        FilterType::Triangle
    }
}

/// Reverses [`resize_image_with_pad`] on an image with the padded layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadRemover {
    target_width: u32,
    target_height: u32,
    original_width: u32,
    original_height: u32,
}

impl PadRemover {
    /// Size of the resized content before padding
    pub fn target_size(&self) -> (u32, u32) {
        (self.target_width, self.target_height)
    }

    /// Size of the image originally passed in
    pub fn original_size(&self) -> (u32, u32) {
        (self.original_width, self.original_height)
    }

    /// Strip the padding and scale back to the original input size
    pub fn remove_pad(&self, image: &RgbImage) -> Result<RgbImage, PreprocessorError> {
        let (width, height) = image.dimensions();
        if width < self.target_width || height < self.target_height {
            return Err(PreprocessorError::InvalidInput(format!(
                "cannot remove padding from {}x{} image: content is {}x{}",
                width, height, self.target_width, self.target_height
            )));
        }

        let cropped =
            imageops::crop_imm(image, 0, 0, self.target_width, self.target_height).to_image();

        let original = self.original_size();
        if cropped.dimensions() == original {
            return Ok(cropped);
        }

        Ok(imageops::resize(
            &cropped,
            original.0,
            original.1,
            filter_for(cropped.dimensions(), original),
        ))
    }
}

/// Scale `image` so its short side equals `resolution`, then edge-pad to a multiple of 64
pub fn resize_image_with_pad(
    image: &RgbImage,
    resolution: u32,
) -> Result<(RgbImage, PadRemover), PreprocessorError> {
    let (width_raw, height_raw) = image.dimensions();
    if width_raw == 0 || height_raw == 0 {
        return Err(PreprocessorError::InvalidInput(format!(
            "image has zero size ({}x{})",
            width_raw, height_raw
        )));
    }
    if resolution == 0 {
        return Err(PreprocessorError::InvalidInput(
            "resolution must be positive".to_string(),
        ));
    }

    let k = resolution as f64 / width_raw.min(height_raw) as f64;
    let too_large = || {
        PreprocessorError::InvalidInput(format!(
            "{}x{} image at resolution {} exceeds the maximum image size",
            width_raw, height_raw, resolution
        ))
    };
    let height_target = scale_len(height_raw, k).ok_or_else(too_large)?;
    let width_target = scale_len(width_raw, k).ok_or_else(too_large)?;
    let padded_width = align64(width_target).ok_or_else(too_large)?;
    let padded_height = align64(height_target).ok_or_else(too_large)?;

    let resized = if (width_target, height_target) == (width_raw, height_raw) {
        image.clone()
    } else {
        imageops::resize(
            image,
            width_target,
            height_target,
            filter_for((width_raw, height_raw), (width_target, height_target)),
        )
    };

    debug!(
        "Resize with pad: {}x{} -> {}x{} (padded {}x{})",
        width_raw, height_raw, width_target, height_target, padded_width, padded_height
    );

    let padded = RgbImage::from_fn(padded_width, padded_height, |x, y| {
        *resized.get_pixel(x.min(width_target - 1), y.min(height_target - 1))
    });

    Ok((
        padded,
        PadRemover {
            target_width: width_target,
            target_height: height_target,
            original_width: width_raw,
            original_height: height_raw,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_align64() {
        assert_eq!(align64(64), Some(64));
        assert_eq!(align64(100), Some(128));
        assert_eq!(align64(150), Some(192));
        assert_eq!(align64(768), Some(768));
        assert_eq!(align64(u32::MAX - 10), None);
        assert_eq!(align64(u32::MAX - 63), Some(u32::MAX - 63));
    }

    #[test]
    fn test_scale_len_overflow() {
        assert_eq!(scale_len(30, 100.0 / 30.0), Some(100));
        assert_eq!(scale_len(u32::MAX, 2.0), None);
        assert_eq!(scale_len(3, 0.01), Some(1));
    }

    #[test]
    fn test_extreme_aspect_ratio_is_rejected() {
        // Short side 1 at resolution 2048 scales the long side past u32::MAX
        let image = RgbImage::new(3_000_000, 1);
        assert!(matches!(
            resize_image_with_pad(&image, 2048),
            Err(PreprocessorError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_square_upscale_needs_no_padding() {
        let image = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
        let (padded, remover) = resize_image_with_pad(&image, 768).unwrap();

        assert_eq!(padded.dimensions(), (768, 768));
        assert_eq!(remover.target_size(), (768, 768));
        assert_eq!(remover.original_size(), (64, 64));

        let restored = remover.remove_pad(&padded).unwrap();
        assert_eq!(restored.dimensions(), (64, 64));
        assert!(restored.pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_non_square_padding_replicates_edges() {
        // 45x30 at resolution 100 -> 150x100 content, padded to 192x128
        let image = RgbImage::from_fn(45, 30, |x, _| {
            if x < 40 {
                Rgb([0, 0, 0])
            } else {
                Rgb([200, 10, 10])
            }
        });
        let (padded, remover) = resize_image_with_pad(&image, 100).unwrap();

        assert_eq!(remover.target_size(), (150, 100));
        assert_eq!(padded.dimensions(), (192, 128));

        // Padding columns copy the last content column
        assert_eq!(padded.get_pixel(191, 10), padded.get_pixel(149, 10));
        // Padding rows copy the last content row
        assert_eq!(padded.get_pixel(20, 127), padded.get_pixel(20, 99));

        let restored = remover.remove_pad(&padded).unwrap();
        assert_eq!(restored.dimensions(), (45, 30));
    }

    #[test]
    fn test_downscale() {
        let image = RgbImage::from_pixel(1024, 512, Rgb([10, 20, 30]));
        let (padded, remover) = resize_image_with_pad(&image, 128).unwrap();

        assert_eq!(remover.target_size(), (256, 128));
        assert_eq!(padded.dimensions(), (256, 128));
        assert_eq!(remover.remove_pad(&padded).unwrap().dimensions(), (1024, 512));
    }

    #[test]
    fn test_invalid_inputs() {
        let empty = RgbImage::new(0, 10);
        assert!(matches!(
            resize_image_with_pad(&empty, 512),
            Err(PreprocessorError::InvalidInput(_))
        ));

        let image = RgbImage::new(8, 8);
        assert!(resize_image_with_pad(&image, 0).is_err());

        let (_, remover) = resize_image_with_pad(&image, 128).unwrap();
        let too_small = RgbImage::new(64, 64);
        assert!(remover.remove_pad(&too_small).is_err());
    }
}
