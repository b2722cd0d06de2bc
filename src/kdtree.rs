use alloc::boxed::Box;

use rgb::RGB;

/// One index node. `depth % 3` selects the split axis, cycling R, G, B.
#[derive(Debug)]
struct KdNode {
    color: RGB<u8>,
    depth: usize,
    left: Option<Box<KdNode>>,
    right: Option<Box<KdNode>>,
}

/// Exact nearest-color index over a palette's colors.
///
/// Built fresh for each dithering call and dropped with it. Construction
/// reorders a scratch copy of the input; the palette's own ordering is never
/// touched. Depth is bounded by log2 of the color count (at most 8 for a
/// 256-color palette).
#[derive(Debug)]
pub struct KdTree {
    root: Box<KdNode>,
}

fn channel(color: RGB<u8>, axis: usize) -> u8 {
    match axis {
        0 => color.r,
        1 => color.g,
        _ => color.b,
    }
}

/// Squared Euclidean RGB distance, unweighted. Remapping compares raw
/// distances, distinct from the perceptual weighting used while quantizing.
fn distance_sq(a: RGB<u8>, b: RGB<u8>) -> i32 {
    let dr = a.r as i32 - b.r as i32;
    let dg = a.g as i32 - b.g as i32;
    let db = a.b as i32 - b.b as i32;
    dr * dr + dg * dg + db * db
}

fn build(colors: &mut [RGB<u8>], depth: usize) -> Option<Box<KdNode>> {
    if colors.is_empty() {
        return None;
    }
    let axis = depth % 3;
    let median = colors.len() / 2;
    // In-place partition: everything below the median lands left of it on
    // this axis, everything above lands right.
    colors.select_nth_unstable_by_key(median, |c| channel(*c, axis));
    let color = colors[median];
    let (lower, upper) = colors.split_at_mut(median);
    Some(Box::new(KdNode {
        color,
        depth,
        left: build(lower, depth + 1),
        right: build(&mut upper[1..], depth + 1),
    }))
}

fn search(node: &KdNode, target: RGB<u8>, best: &mut RGB<u8>, best_dist: &mut i32) {
    let d = distance_sq(target, node.color);
    if d < *best_dist {
        *best_dist = d;
        *best = node.color;
    }

    let axis = node.depth % 3;
    let diff = channel(target, axis) as i32 - channel(node.color, axis) as i32;
    let (near, far) = if diff < 0 {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };

    if let Some(n) = near {
        search(n, target, best, best_dist);
    }
    // Only cross the splitting plane if it could still hold a closer color.
    if diff * diff < *best_dist {
        if let Some(n) = far {
            search(n, target, best, best_dist);
        }
    }
}

impl KdTree {
    /// Build an index over a color set. Returns `None` for an empty set.
    pub fn new(colors: &[RGB<u8>]) -> Option<Self> {
        let mut scratch = colors.to_vec();
        build(&mut scratch, 0).map(|root| Self { root })
    }

    /// The exact nearest color: always equal in distance to a brute-force
    /// linear scan over the same set.
    pub fn nearest(&self, target: RGB<u8>) -> RGB<u8> {
        let mut best = self.root.color;
        let mut best_dist = distance_sq(target, best);
        search(&self.root, target, &mut best, &mut best_dist);
        best
    }
}
