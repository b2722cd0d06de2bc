use thiserror::Error;

/// Errors reported by palette generation and dithering entry points.
///
/// Degenerate inputs (uniform images, fewer unique colors than requested)
/// are not errors; they yield a smaller, internally consistent palette.
#[derive(Debug, Error)]
pub enum QuantizeError {
    #[error("image dimensions cannot be zero")]
    ZeroDimension,

    #[error("pixel buffer length {len} does not match {width}x{height} with {channels} channels")]
    DimensionMismatch {
        len: usize,
        width: usize,
        height: usize,
        channels: usize,
    },

    #[error("{0}-channel images are not supported, need 3 or 4")]
    UnsupportedChannels(usize),

    #[error("max_colors must be between 1 and 256, got {0}")]
    InvalidMaxColors(u32),

    #[error("dither amount must be between 0 and 100, got {0}")]
    InvalidAmount(f32),

    #[error("palette has no colors")]
    EmptyPalette,
}
