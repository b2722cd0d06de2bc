use alloc::vec;
use alloc::vec::Vec;

use crate::error::QuantizeError;
use crate::palette::{Palette, PaletteColor, MAX_PALETTE_COLORS};

/// Number of trie levels; colors are indexed by 8 successive bit-planes.
const TREE_DEPTH: usize = 8;

const ROOT: usize = 0;

/// One trie node. Every node on an insertion path accumulates pixel count and
/// channel sums, so any internal node can later be collapsed into a valid leaf.
#[derive(Debug, Clone)]
struct OctreeNode {
    is_leaf: bool,
    pixel_count: u64,
    red_sum: u64,
    green_sum: u64,
    blue_sum: u64,
    children: [Option<usize>; 8],
}

impl OctreeNode {
    fn new(level: usize) -> Self {
        Self {
            is_leaf: level == TREE_DEPTH - 1,
            pixel_count: 0,
            red_sum: 0,
            green_sum: 0,
            blue_sum: 0,
            children: [None; 8],
        }
    }
}

/// 8-ary color trie with online leaf-count reduction.
///
/// Nodes live in an arena and refer to each other by index; the per-level
/// reducibility lists hold handles to still-collapsible nodes, pushed and
/// popped LIFO. The whole structure is built and dropped inside one
/// quantization call.
#[derive(Debug)]
struct Octree {
    nodes: Vec<OctreeNode>,
    /// `reducible[l]` holds children of level-`l` nodes.
    reducible: [Vec<usize>; TREE_DEPTH],
    num_leaves: usize,
    max_colors: usize,
}

/// Branch index for a color at a given level, taken from the luminance-weighted
/// channel values rather than the raw bits, so perceptually similar colors
/// cluster in the same subtree.
fn branch_index(r: u8, g: u8, b: u8, level: usize) -> usize {
    let weighted_r = (r as f64 * 0.299) as u8;
    let weighted_g = (g as f64 * 0.587) as u8;
    let weighted_b = (b as f64 * 0.114) as u8;

    let shift = 7 - level;
    (((weighted_r >> shift) & 1) as usize) << 2
        | (((weighted_g >> shift) & 1) as usize) << 1
        | ((weighted_b >> shift) & 1) as usize
}

impl Octree {
    fn new(max_colors: usize) -> Self {
        Self {
            nodes: vec![OctreeNode::new(0)],
            reducible: core::array::from_fn(|_| Vec::new()),
            num_leaves: 0,
            max_colors,
        }
    }

    fn alloc_node(&mut self, level: usize) -> usize {
        self.nodes.push(OctreeNode::new(level));
        self.nodes.len() - 1
    }

    /// Insert one pixel, accumulating sums along the whole path.
    fn insert(&mut self, r: u8, g: u8, b: u8) {
        let mut id = ROOT;
        let mut level = 0;
        loop {
            let node = &mut self.nodes[id];
            node.pixel_count += 1;
            node.red_sum += r as u64;
            node.green_sum += g as u64;
            node.blue_sum += b as u64;

            if level >= TREE_DEPTH - 1 || node.is_leaf {
                node.is_leaf = true;
                if node.pixel_count == 1 {
                    self.num_leaves += 1;
                }
                return;
            }

            let idx = branch_index(r, g, b, level);
            let child = match self.nodes[id].children[idx] {
                Some(child) => child,
                None => {
                    let child = self.alloc_node(level + 1);
                    self.nodes[id].children[idx] = Some(child);
                    self.reducible[level].push(child);
                    child
                }
            };
            id = child;
            level += 1;
        }
    }

    /// Collapse one node from the deepest non-empty reducibility list,
    /// folding its children's sums and counts into it.
    ///
    /// Deepest-first order collapses sparse branches before dense ones and
    /// guarantees a popped node's children have already left every list.
    /// Returns false when no list has entries left.
    fn reduce(&mut self) -> bool {
        let Some(level) = (0..TREE_DEPTH - 1).rev().find(|&l| !self.reducible[l].is_empty())
        else {
            return false;
        };
        let Some(id) = self.reducible[level].pop() else {
            return false;
        };

        let children = self.nodes[id].children;
        let total: u64 = children
            .iter()
            .flatten()
            .map(|&c| self.nodes[c].pixel_count)
            .sum();
        if total == 0 {
            // Childless (a depth-7 leaf popped from list 6): nothing to fold.
            return true;
        }

        let mut pixel_count = 0u64;
        let mut red_sum = 0u64;
        let mut green_sum = 0u64;
        let mut blue_sum = 0u64;
        let mut folded = 0usize;
        for &child in children.iter().flatten() {
            let c = &self.nodes[child];
            pixel_count += c.pixel_count;
            red_sum += c.red_sum;
            green_sum += c.green_sum;
            blue_sum += c.blue_sum;
            folded += 1;
        }

        let node = &mut self.nodes[id];
        node.pixel_count = pixel_count;
        node.red_sum = red_sum;
        node.green_sum = green_sum;
        node.blue_sum = blue_sum;
        node.children = [None; 8];
        node.is_leaf = true;
        self.num_leaves = self.num_leaves - folded + 1;
        true
    }

    /// Collect leaf averages into a palette with an explicit-stack walk.
    fn build_palette(&self) -> Palette {
        let mut palette = Palette::new("Octree Palette");
        let mut stack = vec![ROOT];

        while palette.len() < self.max_colors {
            let Some(id) = stack.pop() else { break };
            let node = &self.nodes[id];
            if node.is_leaf && node.pixel_count > 0 {
                palette.push(PaletteColor::new(
                    (node.red_sum / node.pixel_count) as u8,
                    (node.green_sum / node.pixel_count) as u8,
                    (node.blue_sum / node.pixel_count) as u8,
                ));
            } else {
                for &child in node.children.iter().flatten() {
                    stack.push(child);
                }
            }
        }

        // A degenerate tree with no leaves still yields a usable palette.
        if palette.is_empty() {
            palette.push(PaletteColor::new(0, 0, 0));
        }
        palette
    }
}

/// Generate a palette of up to `max_colors` colors with octree quantization.
///
/// The leaf budget is enforced after every pixel insertion, so peak memory is
/// bounded regardless of image size.
pub fn generate_palette(
    image: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    max_colors: u32,
) -> Result<Palette, QuantizeError> {
    crate::validate_geometry(image, width, height, channels)?;
    if max_colors == 0 {
        return Err(QuantizeError::InvalidMaxColors(max_colors));
    }
    let max_colors = (max_colors as usize).min(MAX_PALETTE_COLORS);

    let mut tree = Octree::new(max_colors);
    for px in image.chunks_exact(channels) {
        tree.insert(px[0], px[1], px[2]);
        while tree.num_leaves > max_colors && tree.num_leaves > 1 {
            if !tree.reduce() {
                break;
            }
        }
    }

    Ok(tree.build_palette())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgb::RGB;

    fn flat_image(colors: &[(u8, u8, u8)], pixels_each: usize) -> Vec<u8> {
        let mut image = Vec::new();
        for &(r, g, b) in colors {
            for _ in 0..pixels_each {
                image.extend_from_slice(&[r, g, b]);
            }
        }
        image
    }

    #[test]
    fn distinct_colors_become_distinct_leaves() {
        // Primaries land in different weighted bit-plane cells.
        let colors = [(0, 0, 0), (255, 0, 0), (0, 255, 0), (0, 0, 255)];
        let image = flat_image(&colors, 4);
        let palette = generate_palette(&image, 4, 4, 3, 16).unwrap();
        assert_eq!(palette.len(), 4);
    }

    #[test]
    fn leaf_budget_enforced() {
        // 256-color gradient reduced online to at most 8 leaves.
        let mut image = Vec::new();
        for i in 0..=255u8 {
            image.extend_from_slice(&[i, i / 2, 255 - i]);
        }
        let palette = generate_palette(&image, 16, 16, 3, 8).unwrap();
        assert!(palette.len() >= 1 && palette.len() <= 8);
    }

    #[test]
    fn single_color_single_leaf() {
        let image = flat_image(&[(42, 180, 90)], 9);
        let palette = generate_palette(&image, 3, 3, 3, 256).unwrap();
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.get(0).unwrap().color, RGB { r: 42, g: 180, b: 90 });
    }

    #[test]
    fn max_colors_one() {
        let mut image = Vec::new();
        for i in 0..=255u8 {
            image.extend_from_slice(&[i, 255 - i, i]);
        }
        let palette = generate_palette(&image, 16, 16, 3, 1).unwrap();
        assert_eq!(palette.len(), 1);
    }

    #[test]
    fn zero_max_colors_rejected() {
        let image = flat_image(&[(0, 0, 0)], 1);
        assert!(matches!(
            generate_palette(&image, 1, 1, 3, 0),
            Err(QuantizeError::InvalidMaxColors(0))
        ));
    }

    #[test]
    fn empty_tree_yields_black_entry() {
        let tree = Octree::new(4);
        let palette = tree.build_palette();
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.get(0).unwrap().color, RGB { r: 0, g: 0, b: 0 });
    }

    #[test]
    fn alpha_ignored() {
        let image = [10, 20, 30, 0, 10, 20, 30, 255];
        let palette = generate_palette(&image, 2, 1, 4, 16).unwrap();
        assert_eq!(palette.len(), 1);
        assert_eq!(palette.get(0).unwrap().color, RGB { r: 10, g: 20, b: 30 });
    }
}
