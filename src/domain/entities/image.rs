//! Decoded image representation shared across pipeline stages.

use std::time::Duration;

use image::DynamicImage;

/// A single frame of an animated image together with its display duration.
#[derive(Debug, Clone)]
pub struct AnimationFrame {
    /// Decoded frame pixels.
    pub image: DynamicImage,
    /// How long this frame stays on screen.
    pub duration: Duration,
}

/// A decoded multi-frame image.
#[derive(Debug, Clone)]
pub struct AnimatedImage {
    /// Frames in display order. Never empty.
    pub frames: Vec<AnimationFrame>,
    /// Sum of all frame durations.
    pub total_duration: Duration,
}

impl AnimatedImage {
    /// Assembles an animated image, accumulating the total duration.
    #[must_use]
    pub fn new(frames: Vec<AnimationFrame>) -> Self {
        let total_duration = frames.iter().map(|f| f.duration).sum();
        Self {
            frames,
            total_duration,
        }
    }
}

/// A ready-to-display image.
///
/// The variant is decided once at decode time; later stages operate
/// generically over "one or more frames" instead of re-inspecting bytes.
#[derive(Debug, Clone)]
pub enum ImageData {
    /// A single still image.
    Static(DynamicImage),
    /// A multi-frame animated image with per-frame timing.
    Animated(AnimatedImage),
}

impl ImageData {
    /// Pixel width of the image (first frame for animations).
    #[must_use]
    pub fn pixel_width(&self) -> u32 {
        match self {
            Self::Static(img) => img.width(),
            Self::Animated(anim) => anim.frames.first().map_or(0, |f| f.image.width()),
        }
    }

    /// Pixel height of the image (first frame for animations).
    #[must_use]
    pub fn pixel_height(&self) -> u32 {
        match self {
            Self::Static(img) => img.height(),
            Self::Animated(anim) => anim.frames.first().map_or(0, |f| f.image.height()),
        }
    }

    /// Number of frames; 1 for static images.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        match self {
            Self::Static(_) => 1,
            Self::Animated(anim) => anim.frames.len(),
        }
    }

    /// Returns true for multi-frame images.
    #[must_use]
    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Animated(_))
    }

    /// The still image, if this is not an animation.
    #[must_use]
    pub fn as_static(&self) -> Option<&DynamicImage> {
        match self {
            Self::Static(img) => Some(img),
            Self::Animated(_) => None,
        }
    }
}
