//! Conversions between 8-bit RGB images and pipeline tensors

use crate::MarigoldError;
use image::{Rgb, RgbImage};
use ndarray::{Array4, Axis};

/// Map an RGB image to an NHWC `[1, H, W, 3]` tensor in `[0, 1]`
pub fn numpy_to_pytorch(image: &RgbImage) -> Result<Array4<f32>, MarigoldError> {
    let (width, height) = image.dimensions();
    let data: Vec<f32> = image.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
    Ok(Array4::from_shape_vec(
        (1, height as usize, width as usize, 3),
        data,
    )?)
}

/// NHWC `[0, 1]` -> contiguous NCHW `[-1, 1]`
pub fn to_model_input(nhwc: Array4<f32>) -> Array4<f32> {
    let mut nchw = nhwc
        .permuted_axes([0, 3, 1, 2])
        .as_standard_layout()
        .into_owned();
    nchw.mapv_inplace(|v| v * 2.0 - 1.0);
    nchw
}

/// Turn `[1, 1, H, W]` pipeline depth into a 3-channel 8-bit image
///
/// Depth is rescaled with `0.5 - d * 0.5`, multiplied by 255, clipped and
/// truncated, then broadcast to identical R, G and B channels.
pub fn depth_to_rgb(depth: &Array4<f32>) -> Result<RgbImage, MarigoldError> {
    let shape = depth.shape();
    if shape[0] != 1 || shape[1] != 1 {
        return Err(MarigoldError::InvalidOutputShape(
            shape.iter().map(|&d| d as i64).collect(),
        ));
    }

    let (height, width) = (shape[2], shape[3]);
    let plane = depth.index_axis(Axis(0), 0);
    let plane = plane.index_axis(Axis(0), 0);

    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let d = 0.5 - plane[[y as usize, x as usize]] * 0.5;
        let v = (d * 255.0).clamp(0.0, 255.0) as u8;
        Rgb([v, v, v])
    }))
}
