use std::path::Path;

use crate::capture::domain::camera_device::CaptureError;
use crate::shared::frame::Frame;

/// Decodes a still image (JPEG, PNG, ...) into an RGB frame, used for
/// enrolling a face from a photo.
pub fn load_image(path: &Path) -> Result<Frame, CaptureError> {
    let img = image::open(path)
        .map_err(|e| CaptureError::Open {
            device: path.display().to_string(),
            reason: e.to_string(),
        })?
        .to_rgb8();
    let (width, height) = img.dimensions();
    Ok(Frame::new(img.into_raw(), width, height, 3, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_png() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("face.png");
        let mut img = image::RgbImage::new(6, 4);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();

        let frame = load_image(&path).unwrap();
        assert_eq!((frame.width(), frame.height(), frame.channels()), (6, 4, 3));
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_missing_file() {
        let result = load_image(Path::new("/nonexistent/face.jpg"));
        assert!(matches!(result, Err(CaptureError::Open { .. })));
    }
}
