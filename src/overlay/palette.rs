//! Colour palettes for chart layers

use serde::{Deserialize, Serialize};

use super::OverlayError;

/// Category20, the default categorical palette
pub const CATEGORY20: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728", "#ff9896",
    "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2", "#7f7f7f", "#c7c7c7",
    "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];

/// Ordered list of colours; indices past the end wrap around
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Palette {
    colors: Vec<String>,
}

impl Palette {
    /// Create a palette; fails if `colors` is empty
    pub fn new(colors: Vec<String>) -> Result<Self, OverlayError> {
        if colors.is_empty() {
            return Err(OverlayError::EmptyPalette);
        }
        Ok(Self { colors })
    }

    pub fn category20() -> Self {
        Self {
            colors: CATEGORY20.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Colour for series `index`
    pub fn color(&self, index: usize) -> &str {
        &self.colors[index % self.colors.len()]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::category20()
    }
}

impl TryFrom<Vec<String>> for Palette {
    type Error = OverlayError;

    fn try_from(colors: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(colors)
    }
}

impl From<Palette> for Vec<String> {
    fn from(palette: Palette) -> Self {
        palette.colors
    }
}
