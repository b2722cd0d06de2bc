#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod dither;
pub mod error;
pub mod kdtree;
pub mod median_cut;
pub mod octree;
pub mod palette;

pub use dither::{apply_dithering, remap_nearest, DitherMethod};
pub use error::QuantizeError;
pub use kdtree::KdTree;
pub use palette::{Palette, PaletteColor, MAX_PALETTE_COLORS};

/// Palette generation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizeMethod {
    /// Repeatedly split the most variable color group at its population
    /// median along its dominant channel.
    MedianCut,
    /// 8-ary trie over weighted bit-planes with online leaf reduction.
    Octree,
}

/// Generate an optimal palette of up to `max_colors` colors for an image.
///
/// The image is a tightly packed row-major buffer of 3 or 4 interleaved 8-bit
/// channels; a fourth channel is ignored. The caller owns the returned
/// palette.
pub fn generate_optimal_palette(
    image: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    max_colors: u32,
    method: QuantizeMethod,
) -> Result<Palette, QuantizeError> {
    match method {
        QuantizeMethod::MedianCut => {
            median_cut::generate_palette(image, width, height, channels, max_colors)
        }
        QuantizeMethod::Octree => {
            octree::generate_palette(image, width, height, channels, max_colors)
        }
    }
}

pub(crate) fn validate_geometry(
    image: &[u8],
    width: usize,
    height: usize,
    channels: usize,
) -> Result<(), QuantizeError> {
    if width == 0 || height == 0 {
        return Err(QuantizeError::ZeroDimension);
    }
    if channels != 3 && channels != 4 {
        return Err(QuantizeError::UnsupportedChannels(channels));
    }
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels));
    if expected != Some(image.len()) {
        return Err(QuantizeError::DimensionMismatch {
            len: image.len(),
            width,
            height,
            channels,
        });
    }
    Ok(())
}
