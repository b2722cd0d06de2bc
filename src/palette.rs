use alloc::string::String;
use alloc::vec::Vec;

use rgb::RGB;

/// Hard upper bound on palette size, shared by every builder.
pub const MAX_PALETTE_COLORS: usize = 256;

/// A single palette entry: an sRGB color plus an optional display name.
///
/// Generated palettes leave the name empty; palettes loaded by external
/// file-format importers populate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteColor {
    pub color: RGB<u8>,
    pub name: String,
}

impl PaletteColor {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self {
            color: RGB { r, g, b },
            name: String::new(),
        }
    }

    pub fn named(r: u8, g: u8, b: u8, name: impl Into<String>) -> Self {
        Self {
            color: RGB { r, g, b },
            name: name.into(),
        }
    }
}

impl From<RGB<u8>> for PaletteColor {
    fn from(color: RGB<u8>) -> Self {
        Self {
            color,
            name: String::new(),
        }
    }
}

/// An ordered, bounded set of representative colors.
///
/// The entry list grows geometrically on demand (amortized O(1) append) and
/// never exceeds [`MAX_PALETTE_COLORS`]. The caller owns the palette; builders
/// hand it off by value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette {
    name: String,
    colors: Vec<PaletteColor>,
}

impl Palette {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colors: Vec::new(),
        }
    }

    /// Build a palette from bare colors with empty entry names.
    pub fn from_colors(name: impl Into<String>, colors: impl IntoIterator<Item = RGB<u8>>) -> Self {
        Self {
            name: name.into(),
            colors: colors
                .into_iter()
                .take(MAX_PALETTE_COLORS)
                .map(PaletteColor::from)
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn colors(&self) -> &[PaletteColor] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PaletteColor> {
        self.colors.get(index)
    }

    /// Append an entry. Silently ignored once the palette is full.
    pub fn push(&mut self, entry: PaletteColor) {
        if self.colors.len() < MAX_PALETTE_COLORS {
            self.colors.push(entry);
        }
    }

    /// Export the bare colors as a scratch array.
    ///
    /// Spatial-index construction reorders its input in place, so it works on
    /// this disposable copy rather than the palette's own ordering.
    pub fn as_colors(&self) -> Vec<RGB<u8>> {
        self.colors.iter().map(|e| e.color).collect()
    }
}
