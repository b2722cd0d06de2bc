use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use rgb::RGB;

use crate::error::QuantizeError;
use crate::palette::{Palette, PaletteColor, MAX_PALETTE_COLORS};

/// Human luminance sensitivity per channel (R, G, B). Used to pick the
/// perceptually dominant split axis.
const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// A unique color and the number of pixels carrying it.
#[derive(Debug, Clone, Copy)]
struct ColorCount {
    color: RGB<u8>,
    count: u32,
}

/// A contiguous range of entries in the shared color census.
///
/// Boxes own no color data; they are slice bounds into one array that gets
/// locally re-sorted when a box is split.
#[derive(Debug, Clone, Copy)]
struct ColorBox {
    start: usize,
    len: usize,
    variance: [f64; 3],
}

fn channel(color: RGB<u8>, axis: usize) -> u8 {
    match axis {
        0 => color.r,
        1 => color.g,
        _ => color.b,
    }
}

/// Frequency-weighted per-channel variance over one box.
fn channel_variances(entries: &[ColorCount]) -> [f64; 3] {
    let mut sums = [0.0f64; 3];
    let mut squares = [0.0f64; 3];
    let mut total = 0.0f64;

    for e in entries {
        let count = e.count as f64;
        total += count;
        for axis in 0..3 {
            let v = channel(e.color, axis) as f64;
            sums[axis] += v * count;
            squares[axis] += v * v * count;
        }
    }

    let mut variance = [0.0f64; 3];
    for axis in 0..3 {
        let mean = sums[axis] / total;
        variance[axis] = squares[axis] / total - mean * mean;
    }
    variance
}

/// Axis with the largest luminance-weighted variance.
fn dominant_axis(variance: &[f64; 3]) -> usize {
    let weighted = [
        variance[0] * LUMA_WEIGHTS[0],
        variance[1] * LUMA_WEIGHTS[1],
        variance[2] * LUMA_WEIGHTS[2],
    ];
    if weighted[0] >= weighted[1] && weighted[0] >= weighted[2] {
        0
    } else if weighted[1] >= weighted[2] {
        1
    } else {
        2
    }
}

/// Count unique colors and their pixel frequencies.
///
/// Keyed by the packed 24-bit RGB value; the map distinguishes occupied from
/// absent entries by construction and iterates in deterministic key order.
fn color_census(image: &[u8], channels: usize) -> Vec<ColorCount> {
    let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
    for px in image.chunks_exact(channels) {
        let key = (px[0] as u32) << 16 | (px[1] as u32) << 8 | px[2] as u32;
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(key, count)| ColorCount {
            color: RGB {
                r: (key >> 16) as u8,
                g: (key >> 8) as u8,
                b: key as u8,
            },
            count,
        })
        .collect()
}

/// Frequency-weighted centroid of one box, rounded to the nearest integer
/// per channel.
fn box_centroid(entries: &[ColorCount]) -> PaletteColor {
    let mut sums = [0.0f64; 3];
    let mut total = 0u64;
    for e in entries {
        let count = e.count as u64;
        total += count;
        sums[0] += e.color.r as f64 * count as f64;
        sums[1] += e.color.g as f64 * count as f64;
        sums[2] += e.color.b as f64 * count as f64;
    }
    let total = total as f64;
    PaletteColor::new(
        (sums[0] / total + 0.5) as u8,
        (sums[1] / total + 0.5) as u8,
        (sums[2] / total + 0.5) as u8,
    )
}

/// Generate a palette of up to `max_colors` colors by median-cut subdivision.
///
/// `max_colors` is clamped to [1, 256]. Splitting stops early when no box has
/// nonzero variance, so degenerate images yield fewer colors than requested.
pub fn generate_palette(
    image: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    max_colors: u32,
) -> Result<Palette, QuantizeError> {
    crate::validate_geometry(image, width, height, channels)?;
    let max_colors = (max_colors.clamp(1, MAX_PALETTE_COLORS as u32)) as usize;

    let mut census = color_census(image, channels);

    let mut palette = Palette::new("Median Cut Palette");

    // Fast path: the image already fits the budget.
    if census.len() <= max_colors {
        for e in &census {
            palette.push(PaletteColor::from(e.color));
        }
        return Ok(palette);
    }

    let mut boxes: Vec<ColorBox> = Vec::with_capacity(max_colors);
    boxes.push(ColorBox {
        start: 0,
        len: census.len(),
        variance: [0.0; 3],
    });

    while boxes.len() < max_colors {
        // Pick the box with the largest variance on its own dominant axis.
        let mut best: Option<(usize, usize)> = None;
        let mut max_variance = 0.0f64;

        for i in 0..boxes.len() {
            if boxes[i].len < 2 {
                continue;
            }
            let entries = &census[boxes[i].start..boxes[i].start + boxes[i].len];
            boxes[i].variance = channel_variances(entries);
            let axis = dominant_axis(&boxes[i].variance);
            if boxes[i].variance[axis] > max_variance {
                max_variance = boxes[i].variance[axis];
                best = Some((i, axis));
            }
        }

        // No more meaningful splits possible.
        let Some((idx, axis)) = best else { break };

        let ColorBox { start, len, .. } = boxes[idx];
        let entries = &mut census[start..start + len];
        entries.sort_unstable_by_key(|e| channel(e.color, axis));

        // Split where cumulative pixel frequency first reaches half the
        // box's total, balancing population mass rather than entry count.
        let total: u64 = entries.iter().map(|e| e.count as u64).sum();
        let half = total / 2;
        let mut accumulated = 0u64;
        let mut split = len;
        for (i, e) in entries.iter().enumerate() {
            accumulated += e.count as u64;
            if accumulated >= half {
                split = i + 1;
                break;
            }
        }
        // Keep at least one entry per side.
        let split = split.clamp(1, len - 1);

        boxes.push(ColorBox {
            start: start + split,
            len: len - split,
            variance: [0.0; 3],
        });
        boxes[idx].len = split;
    }

    for b in &boxes {
        palette.push(box_centroid(&census[b.start..b.start + b.len]));
    }

    Ok(palette)
}
