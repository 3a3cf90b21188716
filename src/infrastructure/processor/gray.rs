//! Transform stage: desaturate to grayscale.

use crate::domain::entities::{AnimatedImage, AnimationFrame, ImageData, ProcessorFlags, Request};
use crate::domain::ports::Processor;

/// Desaturates every pixel, preserving frame timing for animations.
#[derive(Debug, Default)]
pub struct GrayProcessor;

impl GrayProcessor {
    /// Creates the processor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Processor for GrayProcessor {
    fn is_valid(&self, request: &Request) -> bool {
        request.processors().contains(ProcessorFlags::GRAYSCALE)
    }

    fn process(&self, _request: &Request, input: ImageData) -> ImageData {
        match input {
            ImageData::Static(img) => ImageData::Static(img.grayscale()),
            ImageData::Animated(anim) => {
                let frames = anim
                    .frames
                    .iter()
                    .map(|frame| AnimationFrame {
                        image: frame.image.grayscale(),
                        duration: frame.duration,
                    })
                    .collect();
                ImageData::Animated(AnimatedImage::new(frames))
            }
        }
    }
}
