use alloc::vec;
use alloc::vec::Vec;

use rgb::RGB;

use crate::error::QuantizeError;
use crate::kdtree::KdTree;
use crate::palette::Palette;

/// Dithering method. Methods are mutually exclusive per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitherMethod {
    /// Direct nearest-color remap with no perturbation.
    None,
    Burkes,
    FloydSteinberg,
    Stucki,
    Atkinson,
    Sierra,
    SierraTwoRow,
    SierraLite,
    JarvisJudiceNinke,
    SingleNeighbor,
    /// Ordered dithering with a 4x4 Bayer threshold matrix.
    Bayer4x4,
    /// Ordered dithering with an 8x8 Bayer threshold matrix.
    Bayer8x8,
}

/// An error-diffusion weight grid.
///
/// Row 0 is the current scanline and `origin` is the current pixel's column
/// within the grid, so every nonzero weight targets a not-yet-visited pixel.
/// The weights divided by `divisor` sum to 1 (Atkinson deliberately leaves a
/// quarter of the error undistributed), conserving error energy except where
/// the grid is truncated at image edges.
#[derive(Debug)]
struct DiffusionKernel {
    width: usize,
    height: usize,
    origin: usize,
    weights: &'static [f32],
    divisor: f32,
}

/// A tileable ordered-dither threshold matrix.
#[derive(Debug)]
struct ThresholdMatrix {
    size: usize,
    thresholds: &'static [f32],
}

#[rustfmt::skip]
static FLOYD_STEINBERG: DiffusionKernel = DiffusionKernel {
    width: 3,
    height: 2,
    origin: 1,
    weights: &[
        0.0, 0.0, 7.0,
        3.0, 5.0, 1.0,
    ],
    divisor: 16.0,
};

#[rustfmt::skip]
static BURKES: DiffusionKernel = DiffusionKernel {
    width: 5,
    height: 2,
    origin: 2,
    weights: &[
        0.0, 0.0, 0.0, 8.0, 4.0,
        2.0, 4.0, 8.0, 4.0, 2.0,
    ],
    divisor: 32.0,
};

#[rustfmt::skip]
static STUCKI: DiffusionKernel = DiffusionKernel {
    width: 5,
    height: 3,
    origin: 2,
    weights: &[
        0.0, 0.0, 0.0, 8.0, 4.0,
        2.0, 4.0, 8.0, 4.0, 2.0,
        1.0, 2.0, 4.0, 2.0, 1.0,
    ],
    divisor: 42.0,
};

#[rustfmt::skip]
static ATKINSON: DiffusionKernel = DiffusionKernel {
    width: 4,
    height: 3,
    origin: 1,
    weights: &[
        0.0, 0.0, 1.0, 1.0,
        1.0, 1.0, 1.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
    ],
    divisor: 8.0,
};

#[rustfmt::skip]
static SIERRA: DiffusionKernel = DiffusionKernel {
    width: 5,
    height: 3,
    origin: 2,
    weights: &[
        0.0, 0.0, 0.0, 5.0, 3.0,
        2.0, 4.0, 5.0, 4.0, 2.0,
        0.0, 2.0, 3.0, 2.0, 0.0,
    ],
    divisor: 32.0,
};

#[rustfmt::skip]
static SIERRA_TWO_ROW: DiffusionKernel = DiffusionKernel {
    width: 5,
    height: 2,
    origin: 2,
    weights: &[
        0.0, 0.0, 0.0, 4.0, 3.0,
        1.0, 2.0, 3.0, 2.0, 1.0,
    ],
    divisor: 16.0,
};

#[rustfmt::skip]
static SIERRA_LITE: DiffusionKernel = DiffusionKernel {
    width: 3,
    height: 2,
    origin: 1,
    weights: &[
        0.0, 0.0, 2.0,
        1.0, 1.0, 0.0,
    ],
    divisor: 4.0,
};

#[rustfmt::skip]
static JARVIS_JUDICE_NINKE: DiffusionKernel = DiffusionKernel {
    width: 5,
    height: 3,
    origin: 2,
    weights: &[
        0.0, 0.0, 0.0, 7.0, 5.0,
        3.0, 5.0, 7.0, 5.0, 3.0,
        1.0, 3.0, 5.0, 3.0, 1.0,
    ],
    divisor: 48.0,
};

#[rustfmt::skip]
static SINGLE_NEIGHBOR: DiffusionKernel = DiffusionKernel {
    width: 2,
    height: 1,
    origin: 0,
    weights: &[0.0, 1.0],
    divisor: 1.0,
};

#[rustfmt::skip]
static BAYER_4X4: ThresholdMatrix = ThresholdMatrix {
    size: 4,
    thresholds: &[
         0.0,  8.0,  2.0, 10.0,
        12.0,  4.0, 14.0,  6.0,
         3.0, 11.0,  1.0,  9.0,
        15.0,  7.0, 13.0,  5.0,
    ],
};

#[rustfmt::skip]
static BAYER_8X8: ThresholdMatrix = ThresholdMatrix {
    size: 8,
    thresholds: &[
         0.0, 32.0,  8.0, 40.0,  2.0, 34.0, 10.0, 42.0,
        48.0, 16.0, 56.0, 24.0, 50.0, 18.0, 58.0, 26.0,
        12.0, 44.0,  4.0, 36.0, 14.0, 46.0,  6.0, 38.0,
        60.0, 28.0, 52.0, 20.0, 62.0, 30.0, 54.0, 22.0,
         3.0, 35.0, 11.0, 43.0,  1.0, 33.0,  9.0, 41.0,
        51.0, 19.0, 59.0, 27.0, 49.0, 17.0, 57.0, 25.0,
        15.0, 47.0,  7.0, 39.0, 13.0, 45.0,  5.0, 37.0,
        63.0, 31.0, 55.0, 23.0, 61.0, 29.0, 53.0, 21.0,
    ],
};

enum Mode {
    Remap,
    Diffusion(&'static DiffusionKernel),
    Ordered(&'static ThresholdMatrix),
}

impl DitherMethod {
    fn mode(self) -> Mode {
        match self {
            Self::None => Mode::Remap,
            Self::Burkes => Mode::Diffusion(&BURKES),
            Self::FloydSteinberg => Mode::Diffusion(&FLOYD_STEINBERG),
            Self::Stucki => Mode::Diffusion(&STUCKI),
            Self::Atkinson => Mode::Diffusion(&ATKINSON),
            Self::Sierra => Mode::Diffusion(&SIERRA),
            Self::SierraTwoRow => Mode::Diffusion(&SIERRA_TWO_ROW),
            Self::SierraLite => Mode::Diffusion(&SIERRA_LITE),
            Self::JarvisJudiceNinke => Mode::Diffusion(&JARVIS_JUDICE_NINKE),
            Self::SingleNeighbor => Mode::Diffusion(&SINGLE_NEIGHBOR),
            Self::Bayer4x4 => Mode::Ordered(&BAYER_4X4),
            Self::Bayer8x8 => Mode::Ordered(&BAYER_8X8),
        }
    }
}

fn clamp_channel(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// Remap every pixel to its nearest palette color, dithered by `method`.
///
/// The output has the same geometry as the input; when a fourth channel is
/// present it is copied through unmodified. `amount` scales dither strength
/// and must lie in [0, 100].
pub fn apply_dithering(
    input: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    palette: &Palette,
    method: DitherMethod,
    amount: f32,
) -> Result<Vec<u8>, QuantizeError> {
    crate::validate_geometry(input, width, height, channels)?;
    if !(0.0..=100.0).contains(&amount) {
        return Err(QuantizeError::InvalidAmount(amount));
    }
    let index = KdTree::new(&palette.as_colors()).ok_or(QuantizeError::EmptyPalette)?;

    Ok(match method.mode() {
        Mode::Remap => remap(input, channels, &index),
        Mode::Diffusion(kernel) => {
            error_diffusion(input, width, height, channels, &index, kernel, amount)
        }
        Mode::Ordered(matrix) => ordered(input, width, height, channels, &index, matrix, amount),
    })
}

/// Direct nearest-color remap, no perturbation. Equivalent to
/// [`DitherMethod::None`] but usable without the dithering entry point.
pub fn remap_nearest(
    input: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    palette: &Palette,
) -> Result<Vec<u8>, QuantizeError> {
    crate::validate_geometry(input, width, height, channels)?;
    let index = KdTree::new(&palette.as_colors()).ok_or(QuantizeError::EmptyPalette)?;
    Ok(remap(input, channels, &index))
}

fn remap(input: &[u8], channels: usize, index: &KdTree) -> Vec<u8> {
    let mut output = vec![0u8; input.len()];
    for (src, dst) in input
        .chunks_exact(channels)
        .zip(output.chunks_exact_mut(channels))
    {
        let chosen = index.nearest(RGB {
            r: src[0],
            g: src[1],
            b: src[2],
        });
        dst[0] = chosen.r;
        dst[1] = chosen.g;
        dst[2] = chosen.b;
        if channels == 4 {
            dst[3] = src[3];
        }
    }
    output
}

fn error_diffusion(
    input: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    index: &KdTree,
    kernel: &DiffusionKernel,
    amount: f32,
) -> Vec<u8> {
    let mut output = vec![0u8; input.len()];
    // One accumulator cell per pixel per channel, zero-initialized. Error is
    // stored unscaled and scaled by amount when consumed.
    let mut error = vec![[0.0f32; 3]; width * height];
    let scale = amount / 100.0;

    for y in 0..height {
        for x in 0..width {
            let pos = y * width + x;
            let idx = pos * channels;
            let cell = error[pos];

            let adjusted = RGB {
                r: clamp_channel(input[idx] as f32 + cell[0] * scale),
                g: clamp_channel(input[idx + 1] as f32 + cell[1] * scale),
                b: clamp_channel(input[idx + 2] as f32 + cell[2] * scale),
            };
            let chosen = index.nearest(adjusted);

            let err = [
                adjusted.r as f32 - chosen.r as f32,
                adjusted.g as f32 - chosen.g as f32,
                adjusted.b as f32 - chosen.b as f32,
            ];

            // Distribute to in-bounds neighbors; edge truncation loses that
            // share of the error.
            for my in 0..kernel.height {
                let py = y + my;
                if py >= height {
                    break;
                }
                for mx in 0..kernel.width {
                    let weight = kernel.weights[my * kernel.width + mx];
                    if weight == 0.0 {
                        continue;
                    }
                    let Some(px) = (x + mx).checked_sub(kernel.origin) else {
                        continue;
                    };
                    if px >= width {
                        continue;
                    }
                    let share = weight / kernel.divisor;
                    let target = &mut error[py * width + px];
                    target[0] += err[0] * share;
                    target[1] += err[1] * share;
                    target[2] += err[2] * share;
                }
            }

            output[idx] = chosen.r;
            output[idx + 1] = chosen.g;
            output[idx + 2] = chosen.b;
            if channels == 4 {
                output[idx + 3] = input[idx + 3];
            }
        }
    }

    output
}

fn ordered(
    input: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    index: &KdTree,
    matrix: &ThresholdMatrix,
    amount: f32,
) -> Vec<u8> {
    let mut output = vec![0u8; input.len()];
    let scale = amount / 100.0;

    for y in 0..height {
        for x in 0..width {
            let idx = (y * width + x) * channels;
            let threshold =
                matrix.thresholds[(y % matrix.size) * matrix.size + (x % matrix.size)] * scale;

            let adjusted = RGB {
                r: clamp_channel(input[idx] as f32 + threshold),
                g: clamp_channel(input[idx + 1] as f32 + threshold),
                b: clamp_channel(input[idx + 2] as f32 + threshold),
            };
            let chosen = index.nearest(adjusted);

            output[idx] = chosen.r;
            output[idx + 1] = chosen.g;
            output[idx + 2] = chosen.b;
            if channels == 4 {
                output[idx + 3] = input[idx + 3];
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::PaletteColor;

    fn gray_palette() -> Palette {
        let mut p = Palette::new("grays");
        for v in [0u8, 85, 170, 255] {
            p.push(PaletteColor::new(v, v, v));
        }
        p
    }

    fn all_kernels() -> [&'static DiffusionKernel; 9] {
        [
            &FLOYD_STEINBERG,
            &BURKES,
            &STUCKI,
            &ATKINSON,
            &SIERRA,
            &SIERRA_TWO_ROW,
            &SIERRA_LITE,
            &JARVIS_JUDICE_NINKE,
            &SINGLE_NEIGHBOR,
        ]
    }

    #[test]
    fn kernel_tables_consistent() {
        for kernel in all_kernels() {
            assert_eq!(kernel.weights.len(), kernel.width * kernel.height);
            assert!(kernel.origin < kernel.width);
            // Nothing may target the current pixel or anything left of it
            // on the current row.
            for mx in 0..=kernel.origin {
                assert_eq!(kernel.weights[mx], 0.0, "backward weight in row 0");
            }
            let sum: f32 = kernel.weights.iter().sum();
            let ratio = sum / kernel.divisor;
            if core::ptr::eq(kernel, &ATKINSON) {
                assert!((ratio - 0.75).abs() < 1e-6);
            } else {
                assert!((ratio - 1.0).abs() < 1e-6, "non-conserving kernel");
            }
        }
    }

    #[test]
    fn bayer_matrices_are_permutations() {
        for matrix in [&BAYER_4X4, &BAYER_8X8] {
            let n = matrix.size * matrix.size;
            assert_eq!(matrix.thresholds.len(), n);
            let mut seen = vec![false; n];
            for &t in matrix.thresholds {
                seen[t as usize] = true;
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn remap_to_exact_palette_is_identity() {
        let palette = gray_palette();
        let input = [0u8, 0, 0, 85, 85, 85, 170, 170, 170, 255, 255, 255];
        let output = apply_dithering(&input, 4, 1, 3, &palette, DitherMethod::None, 0.0).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn uniform_exact_color_diffuses_no_error() {
        let palette = gray_palette();
        let input: Vec<u8> = core::iter::repeat(85u8).take(8 * 8 * 3).collect();
        for method in [
            DitherMethod::FloydSteinberg,
            DitherMethod::Atkinson,
            DitherMethod::JarvisJudiceNinke,
        ] {
            let output = apply_dithering(&input, 8, 8, 3, &palette, method, 100.0).unwrap();
            assert_eq!(output, input);
        }
    }

    #[test]
    fn alpha_passes_through() {
        let palette = gray_palette();
        let input = [10u8, 10, 10, 7, 200, 200, 200, 130];
        for method in [
            DitherMethod::None,
            DitherMethod::FloydSteinberg,
            DitherMethod::Bayer4x4,
        ] {
            let output = apply_dithering(&input, 2, 1, 4, &palette, method, 50.0).unwrap();
            assert_eq!(output[3], 7);
            assert_eq!(output[7], 130);
        }
    }

    #[test]
    fn diffusion_dithers_a_midtone() {
        // A flat midtone between two palette levels must come out as a mix
        // of both neighbors when error diffusion is on.
        let palette = gray_palette();
        let input: Vec<u8> = core::iter::repeat(128u8).take(16 * 16 * 3).collect();
        let output =
            apply_dithering(&input, 16, 16, 3, &palette, DitherMethod::FloydSteinberg, 100.0)
                .unwrap();
        let mut used = [false; 256];
        for px in output.chunks_exact(3) {
            used[px[0] as usize] = true;
        }
        assert!(used[85] && used[170], "midtone did not dither to both levels");
    }

    #[test]
    fn invalid_amount_rejected() {
        let palette = gray_palette();
        let input = [0u8, 0, 0];
        for amount in [-1.0f32, 100.5, f32::NAN] {
            assert!(matches!(
                apply_dithering(&input, 1, 1, 3, &palette, DitherMethod::Bayer8x8, amount),
                Err(QuantizeError::InvalidAmount(_))
            ));
        }
    }

    #[test]
    fn empty_palette_rejected() {
        let palette = Palette::new("empty");
        let input = [0u8, 0, 0];
        assert!(matches!(
            apply_dithering(&input, 1, 1, 3, &palette, DitherMethod::None, 0.0),
            Err(QuantizeError::EmptyPalette)
        ));
        assert!(matches!(
            remap_nearest(&input, 1, 1, 3, &palette),
            Err(QuantizeError::EmptyPalette)
        ));
    }
}
