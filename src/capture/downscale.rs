use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Shrink `image` so its width is at most `max_width`, keeping the aspect ratio.
///
/// Images that already fit are returned untouched. A zero `max_width` or a
/// degenerate image also comes back unchanged.
pub fn downscale_to_width(image: DynamicImage, max_width: u32) -> DynamicImage {
    let (width, height) = image.dimensions();
    if max_width == 0 || width == 0 || height == 0 || width <= max_width {
        return image;
    }

    let scale = f64::from(max_width) / f64::from(width);
    let new_width = ((f64::from(width) * scale) as u32).clamp(1, max_width);
    let new_height = ((f64::from(height) * scale) as u32).max(1);

    image.resize_exact(new_width, new_height, FilterType::Triangle)
}

pub fn maybe_downscale(image: Option<DynamicImage>, max_width: u32) -> Option<DynamicImage> {
    image.map(|image| downscale_to_width(image, max_width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gray(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([128, 128, 128])))
    }

    #[test]
    fn narrow_image_is_returned_as_is() {
        let image = gray(800, 600);
        let out = downscale_to_width(image.clone(), 1400);
        assert_eq!(out.dimensions(), (800, 600));
        assert_eq!(out.as_bytes(), image.as_bytes());
    }

    #[test]
    fn image_at_exact_limit_is_untouched() {
        let out = downscale_to_width(gray(1400, 300), 1400);
        assert_eq!(out.dimensions(), (1400, 300));
    }

    #[test]
    fn wide_image_shrinks_proportionally() {
        let out = downscale_to_width(gray(4000, 1000), 1200);
        let (w, h) = out.dimensions();
        assert!(w <= 1200);
        assert!(h > 0 && h < 1000);
        let ratio_in = 4000.0 / 1000.0;
        let ratio_out = f64::from(w) / f64::from(h);
        assert!((ratio_in - ratio_out).abs() < 0.05);
    }

    #[test]
    fn very_wide_image_still_respects_limit() {
        let out = downscale_to_width(gray(20000, 400), 1000);
        assert!(out.width() <= 1000);
        assert!(out.height() >= 1);
    }

    #[test]
    fn zero_limit_leaves_image_alone() {
        let out = downscale_to_width(gray(300, 200), 0);
        assert_eq!(out.dimensions(), (300, 200));
    }

    #[test]
    fn missing_image_stays_missing() {
        assert!(maybe_downscale(None, 100).is_none());
    }
}
