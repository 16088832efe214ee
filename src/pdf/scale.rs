//! Zoom scaling of rendered page rasters

use std::num::NonZeroU32;
use std::sync::Arc;

use fast_image_resize as fir;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage, RgbaImage};
use log::{debug, warn};

use super::zoom::Zoom;

/// Target size for an image of `width`x`height` at `zoom`, never below 1x1
#[must_use]
pub fn scaled_dimensions(width: u32, height: u32, zoom: Zoom) -> (u32, u32) {
    let factor = f64::from(zoom.factor());
    let scale = |dim: u32| ((f64::from(dim) * factor).round() as u32).max(1);
    (scale(width), scale(height))
}

/// Scale `image` to `zoom`.
///
/// Zoom 1.0 hands back the same `Arc` without resampling. Anything else is
/// resampled with Lanczos3.
#[must_use]
pub fn scale_image(image: &Arc<DynamicImage>, zoom: Zoom) -> Arc<DynamicImage> {
    if zoom.is_identity() {
        return Arc::clone(image);
    }

    let (new_width, new_height) = scaled_dimensions(image.width(), image.height(), zoom);
    debug!(
        "Scaling page from {}x{} to {new_width}x{new_height} (zoom {zoom})",
        image.width(),
        image.height()
    );

    let scaled = match fast_resize(image, new_width, new_height) {
        Ok(resized) => resized,
        Err(e) => {
            warn!("Fast resize failed: {e}, falling back to slow resize");
            image.resize_exact(new_width, new_height, FilterType::Lanczos3)
        }
    };

    Arc::new(scaled)
}

fn fast_resize(
    src_image: &DynamicImage,
    new_width: u32,
    new_height: u32,
) -> Result<DynamicImage, Box<dyn std::error::Error>> {
    let src_width = NonZeroU32::new(src_image.width()).ok_or("Invalid width")?;
    let src_height = NonZeroU32::new(src_image.height()).ok_or("Invalid height")?;
    let dst_width = NonZeroU32::new(new_width).ok_or("Invalid target width")?;
    let dst_height = NonZeroU32::new(new_height).ok_or("Invalid target height")?;

    // Rendered pages are RGB; keep them 3-channel instead of widening to RGBA.
    let (buffer, pixel_type) = match src_image {
        DynamicImage::ImageRgb8(rgb) => (rgb.as_raw().clone(), fir::PixelType::U8x3),
        other => (other.to_rgba8().into_raw(), fir::PixelType::U8x4),
    };

    let src = fir::Image::from_vec_u8(src_width, src_height, buffer, pixel_type)?;
    let mut dst = fir::Image::new(dst_width, dst_height, pixel_type);

    let mut resizer = fir::Resizer::new(fir::ResizeAlg::Convolution(fir::FilterType::Lanczos3));
    resizer.resize(&src.view(), &mut dst.view_mut())?;

    let out = dst.into_vec();
    let image = match pixel_type {
        fir::PixelType::U8x3 => RgbImage::from_raw(new_width, new_height, out)
            .map(DynamicImage::ImageRgb8),
        _ => RgbaImage::from_raw(new_width, new_height, out).map(DynamicImage::ImageRgba8),
    };

    image.ok_or_else(|| "Failed to create ImageBuffer".into())
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn page(width: u32, height: u32) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb([200, 120, 40]),
        )))
    }

    #[test]
    fn identity_zoom_returns_same_image() {
        let image = page(40, 60);
        let scaled = scale_image(&image, Zoom::ACTUAL_SIZE);
        assert!(Arc::ptr_eq(&image, &scaled));
    }

    #[test]
    fn dimensions_round_to_nearest_pixel() {
        assert_eq!(scaled_dimensions(100, 50, Zoom::new(1.5)), (150, 75));
        assert_eq!(scaled_dimensions(33, 10, Zoom::new(0.5)), (17, 5));
        assert_eq!(scaled_dimensions(2550, 3300, Zoom::new(2.0)), (5100, 6600));
    }

    #[test]
    fn tiny_output_is_clamped_to_one_pixel() {
        assert_eq!(scaled_dimensions(3, 3, Zoom::new(0.05)), (1, 1));

        let scaled = scale_image(&page(3, 3), Zoom::new(0.05));
        assert_eq!((scaled.width(), scaled.height()), (1, 1));
    }

    #[test]
    fn scaling_keeps_rgb_layout() {
        let scaled = scale_image(&page(40, 60), Zoom::new(2.0));
        assert_eq!((scaled.width(), scaled.height()), (80, 120));
        assert!(matches!(scaled.as_ref(), DynamicImage::ImageRgb8(_)));

        let px = scaled.to_rgb8().get_pixel(40, 60).0;
        assert_eq!(px, [200, 120, 40]);
    }

    #[test]
    fn scaling_rgba_input() {
        let image = Arc::new(DynamicImage::ImageRgba8(RgbaImage::new(10, 20)));
        let scaled = scale_image(&image, Zoom::new(0.5));
        assert_eq!((scaled.width(), scaled.height()), (5, 10));
    }
}
