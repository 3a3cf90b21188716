//! Transform stage: resize/redraw to the target size per content mode.

use image::DynamicImage;
use image::imageops::FilterType;
use tracing::trace;

use crate::domain::entities::{
    AnimatedImage, AnimationFrame, ContentMode, ImageData, ProcessorFlags, Request,
};
use crate::domain::ports::Processor;

/// Redraws images that exceed the target pixel size.
///
/// `fit` scales down uniformly to fully contain within the target; `fill`
/// scales to fully cover the target, cropped at the anchor point. Neither
/// mode upscales. Frames of an animated image are processed individually;
/// when any single frame cannot be transformed the whole animation falls
/// back to the original so the frame count stays consistent.
#[derive(Debug)]
pub struct ResizeProcessor {
    anchor: (f32, f32),
}

impl Default for ResizeProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResizeProcessor {
    /// Creates a processor anchored at the center.
    #[must_use]
    pub fn new() -> Self {
        Self { anchor: (0.5, 0.5) }
    }

    /// Creates a processor with a custom fill anchor, each axis in `0..=1`.
    #[must_use]
    pub fn with_anchor(x: f32, y: f32) -> Self {
        Self {
            anchor: (x.clamp(0.0, 1.0), y.clamp(0.0, 1.0)),
        }
    }

    /// Resizes one frame, or returns `None` when the frame needs no work
    /// or cannot be transformed.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn resize_one(&self, request: &Request, input: &DynamicImage) -> Option<DynamicImage> {
        let (iw, ih) = (input.width(), input.height());
        if iw == 0 || ih == 0 {
            return None;
        }

        let tw = request.resolved_width();
        let th = request
            .size()
            .height()
            .unwrap_or_else(|| ((u64::from(ih) * u64::from(tw)) / u64::from(iw)).max(1) as u32);
        if tw == 0 || th == 0 || (iw <= tw && ih <= th) {
            return None;
        }

        // Normalize the pixel layout before redrawing.
        let normalized = DynamicImage::ImageRgba8(input.to_rgba8());
        let (iw_f, ih_f) = (iw as f32, ih as f32);
        let (tw_f, th_f) = (tw as f32, th as f32);

        match request.mode() {
            ContentMode::Fit => {
                let scale = (tw_f / iw_f).min(th_f / ih_f).min(1.0);
                let out_w = ((iw_f * scale).round() as u32).max(1);
                let out_h = ((ih_f * scale).round() as u32).max(1);
                Some(normalized.resize_exact(out_w, out_h, FilterType::Lanczos3))
            }
            ContentMode::Fill => {
                // The output never exceeds the target and never exceeds what
                // the source can cover without upscaling.
                let cap = (iw_f / tw_f).min(ih_f / th_f).min(1.0);
                let out_w = ((tw_f * cap).round() as u32).max(1);
                let out_h = ((th_f * cap).round() as u32).max(1);

                let cover = (out_w as f32 / iw_f).max(out_h as f32 / ih_f);
                let scaled_w = ((iw_f * cover).ceil() as u32).max(out_w);
                let scaled_h = ((ih_f * cover).ceil() as u32).max(out_h);
                let scaled = normalized.resize_exact(scaled_w, scaled_h, FilterType::Lanczos3);

                let x = ((scaled_w - out_w) as f32 * self.anchor.0) as u32;
                let y = ((scaled_h - out_h) as f32 * self.anchor.1) as u32;
                Some(scaled.crop_imm(x, y, out_w, out_h))
            }
        }
    }
}

impl Processor for ResizeProcessor {
    fn is_valid(&self, request: &Request) -> bool {
        request.processors().contains(ProcessorFlags::PREDRAWN)
            && matches!(request.mode(), ContentMode::Fit | ContentMode::Fill)
    }

    fn process(&self, request: &Request, input: ImageData) -> ImageData {
        match input {
            ImageData::Static(img) => match self.resize_one(request, &img) {
                Some(resized) => ImageData::Static(resized),
                None => ImageData::Static(img),
            },
            ImageData::Animated(anim) => {
                let mut out = Vec::with_capacity(anim.frames.len());
                for frame in &anim.frames {
                    match self.resize_one(request, &frame.image) {
                        Some(resized) => out.push(AnimationFrame {
                            image: resized,
                            duration: frame.duration,
                        }),
                        None => {
                            // Keep the frame count consistent: one skipped
                            // frame discards the whole transformed result.
                            trace!(key = %request.key(), "frame untouched, keeping original animation");
                            return ImageData::Animated(anim);
                        }
                    }
                }
                ImageData::Animated(AnimatedImage::new(out))
            }
        }
    }
}
