//! Frame types for the outbound camera stream

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::ControlSnapshot;

/// Camera viewpoints, in the order they are transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Viewpoint {
    Center,
    Left,
    Right,
}

impl Viewpoint {
    /// All viewpoints in wire order
    pub const ALL: [Viewpoint; 3] = [Viewpoint::Center, Viewpoint::Left, Viewpoint::Right];

    /// Position of this viewpoint within a frame
    pub fn index(self) -> usize {
        match self {
            Viewpoint::Center => 0,
            Viewpoint::Left => 1,
            Viewpoint::Right => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Viewpoint::Center => "center",
            Viewpoint::Left => "left",
            Viewpoint::Right => "right",
        }
    }
}

impl fmt::Display for Viewpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uncompressed RGB8 pixels rendered by the simulation for one viewpoint.
///
/// Rows are stored top to bottom, three bytes per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RawImage {
    /// Wrap a pixel buffer
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self { width, height, pixels }
    }

    /// Single colour image, mostly useful for tests and placeholder cameras
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb.repeat(width as usize * height as usize);
        Self { width, height, pixels }
    }

    /// Byte length the pixel buffer must have for its dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

/// One capture: three compressed viewpoint images plus the actuator state
/// sampled at the same instant.
///
/// Frames are immutable once built. Image buffers are shared via `Arc` so a
/// frame can be cloned without copying the JPEG data.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic capture counter, starting at 1
    pub sequence: u64,

    /// Compressed images indexed by [`Viewpoint::index`]
    pub images: [Arc<[u8]>; 3],

    /// Actuator state at capture time
    pub controls: ControlSnapshot,

    /// When the capture cycle completed
    pub captured_at: Instant,
}

impl Frame {
    /// Build a frame from encoded images in wire order
    pub fn new(sequence: u64, images: [Vec<u8>; 3], controls: ControlSnapshot) -> Self {
        Self { sequence, images: images.map(Arc::from), controls, captured_at: Instant::now() }
    }

    /// Compressed bytes for a viewpoint
    pub fn image(&self, viewpoint: Viewpoint) -> &[u8] {
        &self.images[viewpoint.index()]
    }

    /// Total number of bytes this frame occupies on the wire
    pub fn wire_len(&self) -> usize {
        let images: usize = self.images.iter().map(|img| 4 + img.len()).sum();
        images + self.controls.to_line().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewpoint_order_is_center_left_right() {
        let names: Vec<_> = Viewpoint::ALL.iter().map(|v| v.as_str()).collect();
        assert_eq!(names, ["center", "left", "right"]);
        for (i, viewpoint) in Viewpoint::ALL.iter().enumerate() {
            assert_eq!(viewpoint.index(), i);
        }
    }

    #[test]
    fn solid_image_has_expected_length() {
        let image = RawImage::solid(4, 3, [10, 20, 30]);
        assert_eq!(image.pixels.len(), image.expected_len());
        assert_eq!(&image.pixels[..6], &[10, 20, 30, 10, 20, 30]);
    }

    #[test]
    fn frame_exposes_images_by_viewpoint() {
        let frame = Frame::new(
            7,
            [vec![1; 10], vec![2; 20], vec![3; 30]],
            ControlSnapshot::new(0.1, 0.2, 0.3),
        );

        assert_eq!(frame.image(Viewpoint::Left), &[2; 20][..]);
        assert_eq!(frame.image(Viewpoint::Right).len(), 30);
        // 3 length prefixes + 60 image bytes + "0.1000,0.2000,0.3000\n"
        assert_eq!(frame.wire_len(), 12 + 60 + 21);
    }
}
