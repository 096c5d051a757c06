//! GIF frame decomposition and reassembly.
//!
//! Decoding goes through `image`'s [`GifDecoder`], which composites every
//! frame onto the full logical screen. Encoding goes through the `gif` crate
//! directly, since `image`'s encoder gives no control over the per-frame
//! disposal method.

use gif::{DisposalMethod, Encoder, Repeat};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, Frame, ImageDecoder, ImageResult};
use std::io::Cursor;

use crate::pipeline::WashError;

/// NeuQuant speed used when a frame has more than 256 colours (1 = best, 30 = fastest).
const QUANTIZE_SPEED: i32 = 10;

/// A decoded animation: logical screen size plus ordered, composited frames.
pub struct Animation {
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Frame>,
}

impl Animation {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Decode every frame of a GIF held in memory.
pub fn decode_gif(bytes: &[u8]) -> ImageResult<Animation> {
    let decoder = GifDecoder::new(Cursor::new(bytes))?;
    let (width, height) = decoder.dimensions();
    let frames = decoder.into_frames().collect_frames()?;
    Ok(Animation {
        width,
        height,
        frames,
    })
}

/// Display duration of `frame` in milliseconds, or `fallback_ms` when the
/// source left it unspecified (zero).
pub fn frame_delay_ms(frame: &Frame, fallback_ms: u32) -> u32 {
    let (numer, denom) = frame.delay().numer_denom_ms();
    let ms = if denom == 0 {
        0
    } else {
        (numer + denom / 2) / denom
    };
    if ms == 0 { fallback_ms } else { ms }
}

/// GIF delays are stored in hundredths of a second.
fn ms_to_centiseconds(ms: u32) -> u16 {
    u16::try_from(ms.saturating_add(5) / 10).unwrap_or(u16::MAX)
}

fn to_u16(width: u32, height: u32) -> Result<(u16, u16), WashError> {
    match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => Ok((w, h)),
        _ => Err(WashError::FrameTooLarge { width, height }),
    }
}

/// Re-encode `animation` as a looping GIF.
///
/// Every frame keeps its pixels and duration, loops forever, and is disposed
/// to background before the next one is drawn.
pub fn encode_gif(animation: &Animation, fallback_delay_ms: u32) -> Result<Vec<u8>, WashError> {
    if animation.is_empty() {
        return Err(WashError::EmptyAnimation);
    }

    let (screen_w, screen_h) = to_u16(animation.width, animation.height)?;
    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, screen_w, screen_h, &[])?;
        encoder.set_repeat(Repeat::Infinite)?;

        for (index, frame) in animation.frames.iter().enumerate() {
            let buffer = frame.buffer();
            let (w, h) = to_u16(buffer.width(), buffer.height())?;
            let (left, top) = to_u16(frame.left(), frame.top())?;
            let delay_ms = frame_delay_ms(frame, fallback_delay_ms);

            let mut rgba = buffer.as_raw().clone();
            let mut gif_frame = gif::Frame::from_rgba_speed(w, h, &mut rgba, QUANTIZE_SPEED);
            gif_frame.left = left;
            gif_frame.top = top;
            gif_frame.delay = ms_to_centiseconds(delay_ms);
            gif_frame.dispose = DisposalMethod::Background;

            log::trace!("GIF frame {index}: {w}x{h}+{left}+{top}, {delay_ms}ms");
            encoder.write_frame(&gif_frame)?;
        }
        // Encoder writes the trailer on drop
    }

    Ok(out)
}
