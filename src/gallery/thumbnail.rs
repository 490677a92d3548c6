use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat, ImageOutputFormat};
use thiserror::Error;

use crate::config::THUMBNAIL_WIDTH;

const JPEG_QUALITY: u8 = 90;

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Unrecognised image format")]
    UnknownFormat,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),
}

#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Scale an encoded image to a fixed width, keeping the aspect ratio.
///
/// The output keeps the source format when it can be encoded; anything
/// else is written as PNG.
pub fn make_thumbnail(bytes: &[u8]) -> Result<Thumbnail, ThumbnailError> {
    let format = image::guess_format(bytes).map_err(|_| ThumbnailError::UnknownFormat)?;
    let source = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ThumbnailError::ImageProcessing(e.to_string()))?;

    let (width, height) = source.dimensions();
    if width == 0 || height == 0 {
        return Err(ThumbnailError::ImageProcessing("image has no pixels".into()));
    }
    let new_height = thumbnail_height(width, height, THUMBNAIL_WIDTH);
    let resized = source.resize_exact(THUMBNAIL_WIDTH, new_height, FilterType::Triangle);

    let (output, content_type) = output_format(format);
    let mut encoded = Vec::new();
    resized
        .write_to(&mut encoded, output)
        .map_err(|e| ThumbnailError::ImageProcessing(e.to_string()))?;

    tracing::debug!(
        source_width = width,
        source_height = height,
        thumbnail_height = new_height,
        format = ?format,
        "Thumbnail generated"
    );

    Ok(Thumbnail {
        bytes: encoded,
        content_type,
        width: THUMBNAIL_WIDTH,
        height: new_height,
    })
}

/// `trunc(height / width * target_width)`, never below one pixel.
pub fn thumbnail_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = (1.0 * f64::from(height) / f64::from(width) * f64::from(target_width)) as u32;
    scaled.max(1)
}

fn output_format(format: ImageFormat) -> (ImageOutputFormat, &'static str) {
    match format {
        ImageFormat::Jpeg => (ImageOutputFormat::Jpeg(JPEG_QUALITY), "image/jpeg"),
        ImageFormat::Gif => (ImageOutputFormat::Gif, "image/gif"),
        ImageFormat::Bmp => (ImageOutputFormat::Bmp, "image/bmp"),
        _ => (ImageOutputFormat::Png, "image/png"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn encoded(width: u32, height: u32, format: ImageOutputFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 120, 200])));
        let mut buf = Vec::new();
        img.write_to(&mut buf, format).unwrap();
        buf
    }

    #[test]
    fn height_follows_aspect_ratio() {
        assert_eq!(thumbnail_height(800, 600, 192), 144);
        assert_eq!(thumbnail_height(1000, 333, 192), 63);
        assert_eq!(thumbnail_height(4000, 1, 192), 1);
        assert_eq!(thumbnail_height(100, 200, 192), 384);
    }

    #[test]
    fn png_thumbnail_keeps_format_and_width() {
        let thumb = make_thumbnail(&encoded(400, 300, ImageOutputFormat::Png)).unwrap();
        assert_eq!(thumb.content_type, "image/png");
        assert_eq!((thumb.width, thumb.height), (192, 144));

        let decoded = image::load_from_memory(&thumb.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (192, 144));
        assert_eq!(image::guess_format(&thumb.bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn jpeg_thumbnail_stays_jpeg() {
        let thumb = make_thumbnail(&encoded(96, 96, ImageOutputFormat::Jpeg(80))).unwrap();
        assert_eq!(thumb.content_type, "image/jpeg");
        assert_eq!(thumb.height, 192);
        assert_eq!(image::guess_format(&thumb.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn non_image_bytes_are_rejected() {
        assert!(matches!(
            make_thumbnail(b"definitely not an image"),
            Err(ThumbnailError::UnknownFormat)
        ));
    }

    #[test]
    fn truncated_image_is_a_processing_error() {
        let mut bytes = encoded(50, 50, ImageOutputFormat::Png);
        bytes.truncate(40);
        assert!(matches!(
            make_thumbnail(&bytes),
            Err(ThumbnailError::ImageProcessing(_))
        ));
    }
}
