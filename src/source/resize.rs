//! Aspect-preserving downscale before inference.

use super::Frame;
use image::imageops::FilterType;

/// A frame prepared for inference plus the factor that maps its
/// coordinates back onto the original frame.
#[derive(Debug, Clone)]
pub struct Downscaled {
    /// Possibly resized frame.
    pub frame: Frame,
    /// Multiply inference coordinates by this to get original coordinates.
    pub scale_back: f64,
}

/// Shrink `frame` so its longer side is at most `max_resolution`.
///
/// Frames already within bounds, and `max_resolution == 0`, pass through
/// unchanged with a `scale_back` of 1.
pub fn downscale(frame: Frame, max_resolution: u32) -> Downscaled {
    let (width, height) = (frame.width(), frame.height());
    let longest = width.max(height);

    if max_resolution == 0 || longest <= max_resolution {
        return Downscaled {
            frame,
            scale_back: 1.0,
        };
    }

    let ratio = f64::from(max_resolution) / f64::from(longest);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_width = ((f64::from(width) * ratio).round() as u32).max(1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_height = ((f64::from(height) * ratio).round() as u32).max(1);

    let image = frame
        .image
        .resize_exact(new_width, new_height, FilterType::Triangle);

    Downscaled {
        frame: Frame {
            image,
            captured_at: frame.captured_at,
        },
        scale_back: f64::from(width) / f64::from(new_width),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn frame(width: u32, height: u32) -> Frame {
        Frame::new(DynamicImage::ImageRgb8(RgbImage::new(width, height)))
    }

    #[test]
    fn test_small_frame_untouched() {
        let out = downscale(frame(640, 480), 1920);
        assert_eq!(out.frame.width(), 640);
        assert!((out.scale_back - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_disables() {
        let out = downscale(frame(4000, 3000), 0);
        assert_eq!(out.frame.width(), 4000);
    }

    #[test]
    fn test_landscape_keeps_aspect() {
        let out = downscale(frame(3840, 2160), 1920);
        assert_eq!(out.frame.width(), 1920);
        assert_eq!(out.frame.height(), 1080);
        assert!((out.scale_back - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_portrait_keeps_aspect() {
        let out = downscale(frame(1000, 2000), 500);
        assert_eq!(out.frame.width(), 250);
        assert_eq!(out.frame.height(), 500);
    }
}
