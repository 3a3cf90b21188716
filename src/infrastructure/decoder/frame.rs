//! Decode stage: raw bytes to static or animated images.

use std::io::Cursor;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageFormat};
use tracing::{debug, trace};

use crate::domain::entities::{AnimatedImage, AnimationFrame, ImageData, Request};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::Decoder;

/// Duration used when a frame carries no usable timing hint.
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Timing hints at or below this are too small to be meaningful.
pub const MIN_FRAME_DELAY_MS: u64 = 11;

/// Decoder backed by the `image` crate's native codecs.
///
/// Animated GIF sources decode frame by frame with per-frame timing when
/// the request wants animation; everything else takes the direct
/// whole-image path. A single decoded frame degrades to a static image.
#[derive(Debug, Default)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Creates the decoder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Display duration for a raw per-frame delay in milliseconds.
#[must_use]
pub fn effective_delay(raw_ms: u64) -> Duration {
    if raw_ms > MIN_FRAME_DELAY_MS {
        Duration::from_millis(raw_ms)
    } else {
        DEFAULT_FRAME_DELAY
    }
}

fn decode_animated(data: &[u8]) -> LoadResult<Vec<AnimationFrame>> {
    let decoder =
        GifDecoder::new(Cursor::new(data)).map_err(|_| LoadError::ImageSourceCreate)?;

    let mut frames = Vec::new();
    for frame in decoder.into_frames() {
        // A broken frame mid-stream is skipped, not fatal.
        let Ok(frame) = frame else {
            trace!("skipping undecodable frame");
            continue;
        };
        let (numer, denom) = frame.delay().numer_denom_ms();
        let raw_ms = if denom == 0 {
            0
        } else {
            u64::from(numer / denom)
        };
        frames.push(AnimationFrame {
            image: DynamicImage::ImageRgba8(frame.into_buffer()),
            duration: effective_delay(raw_ms),
        });
    }
    Ok(frames)
}

fn decode_direct(data: &[u8]) -> LoadResult<ImageData> {
    image::load_from_memory(data)
        .map(ImageData::Static)
        .map_err(|_| LoadError::DecoderImageIsNil)
}

impl Decoder for FrameDecoder {
    fn is_valid(&self, _request: &Request) -> bool {
        true
    }

    fn decode(&self, request: &Request, data: &[u8]) -> LoadResult<ImageData> {
        let format = image::guess_format(data).map_err(|_| LoadError::ImageSourceCreate)?;

        if format == ImageFormat::Gif && request.wants_animation() {
            let mut frames = decode_animated(data)?;
            match frames.len() {
                // No usable frames: fall back to a whole-image decode.
                0 => decode_direct(data),
                1 => Ok(ImageData::Static(frames.swap_remove(0).image)),
                count => {
                    debug!(key = %request.key(), frames = count, "decoded animated image");
                    Ok(ImageData::Animated(AnimatedImage::new(frames)))
                }
            }
        } else {
            decode_direct(data)
        }
    }
}
