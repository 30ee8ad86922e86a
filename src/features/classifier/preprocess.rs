//! Image decoding and conversion to network input.

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use ndarray::Array3;

use crate::core::error::AppError;

/// Decode image bytes, reporting undecodable data as a bad request
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, AppError> {
    image::load_from_memory(bytes)
        .map_err(|e| AppError::BadRequest(format!("File is not a readable image: {}", e)))
}

/// File extension for the format detected from the image bytes
pub fn detected_extension(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}

/// Resize to `size` x `size` RGB and scale to `[0, 1]`, channel-first
pub fn to_input(image: &DynamicImage, size: usize) -> Array3<f32> {
    let side = size as u32;
    let rgb = image.resize_exact(side, side, FilterType::Triangle).to_rgb8();

    Array3::from_shape_fn((3, size, size), |(c, y, x)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

/// Decode and convert in one step
pub fn load_input(bytes: &[u8], size: usize) -> Result<Array3<f32>, AppError> {
    Ok(to_input(&decode_image(bytes)?, size))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Cursor;

    /// Encode a solid-colour PNG for tests
    pub(crate) fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb(color));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_to_input_shape_and_scale() {
        let bytes = solid_png(40, 20, [255, 0, 51]);
        let input = load_input(&bytes, 16).unwrap();

        assert_eq!(input.dim(), (3, 16, 16));
        assert!((input[[0, 5, 5]] - 1.0).abs() < 1e-6);
        assert!(input[[1, 5, 5]].abs() < 1e-6);
        assert!((input[[2, 5, 5]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_detected_extension() {
        assert_eq!(detected_extension(&solid_png(2, 2, [0, 0, 0])), Some("png"));
        assert_eq!(detected_extension(b"definitely not an image"), None);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(AppError::BadRequest(_))
        ));
    }
}
