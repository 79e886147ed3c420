//! JPEG compression of rendered viewpoints

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::types::{RawImage, Viewpoint};
use crate::{BridgeError, Result};

/// Lossy image codec used for every transmitted viewpoint
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    quality: u8,
}

impl JpegCodec {
    /// Create a codec; quality is clamped to 1..=100
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Compress one rendered viewpoint.
    ///
    /// Fails when the pixel buffer does not match the image dimensions or the
    /// encoder rejects the image (e.g. a side longer than 65535 pixels).
    pub fn encode(&self, viewpoint: Viewpoint, image: &RawImage) -> Result<Vec<u8>> {
        if image.width == 0 || image.height == 0 {
            return Err(BridgeError::encoding(viewpoint, "image has zero size"));
        }
        if image.pixels.len() != image.expected_len() {
            return Err(BridgeError::encoding(
                viewpoint,
                format!(
                    "pixel buffer is {} bytes, expected {} for {}x{} RGB",
                    image.pixels.len(),
                    image.expected_len(),
                    image.width,
                    image.height
                ),
            ));
        }

        let mut out = Vec::with_capacity(image.expected_len() / 8);
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(&image.pixels, image.width, image.height, ExtendedColorType::Rgb8)
            .map_err(|e| BridgeError::encoding(viewpoint, e.to_string()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_decodable_jpeg_with_original_dimensions() {
        let codec = JpegCodec::new(40);
        let raw = RawImage::solid(64, 36, [200, 30, 30]);
        let jpeg = codec.encode(Viewpoint::Center, &raw).unwrap();

        // SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 36);
    }

    #[test]
    fn higher_quality_is_not_smaller_for_detailed_images() {
        let mut pixels = Vec::with_capacity(64 * 64 * 3);
        for i in 0..64 * 64u32 {
            pixels.extend_from_slice(&[(i * 7) as u8, (i * 13) as u8, (i * 29) as u8]);
        }
        let raw = RawImage::new(64, 64, pixels);

        let low = JpegCodec::new(10).encode(Viewpoint::Left, &raw).unwrap();
        let high = JpegCodec::new(95).encode(Viewpoint::Left, &raw).unwrap();
        assert!(high.len() > low.len());
    }

    #[test]
    fn rejects_mismatched_buffer() {
        let raw = RawImage::new(10, 10, vec![0; 10]);
        let err = JpegCodec::new(40).encode(Viewpoint::Right, &raw).unwrap_err();
        assert!(matches!(err, BridgeError::Encoding { viewpoint: Viewpoint::Right, .. }));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(JpegCodec::new(0).quality(), 1);
        assert_eq!(JpegCodec::new(250).quality(), 100);
    }
}
