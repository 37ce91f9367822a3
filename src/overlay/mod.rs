//! Chart overlays built from replay data
//!
//! The overlay is plain data: a column source plus a list of layers that
//! reference those columns. Rendering is left to whatever consumes the JSON.

mod palette;
mod theo;

pub use palette::{Palette, CATEGORY20};
pub use theo::{build_theo_overlay, Layer, Legend, Overlay, OverlayRow, StepMode};

use thiserror::Error;

/// Errors from overlay configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverlayError {
    /// A palette needs at least one colour
    #[error("Palette must contain at least one colour")]
    EmptyPalette,
}
