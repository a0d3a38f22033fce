// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Colors, skeleton layout and the preview window.

/// Color definitions and palettes.
pub mod color;

/// COCO-17 skeleton edges.
pub mod skeleton;

#[cfg(feature = "visualize")]
pub mod viewer;

pub use color::Color;

#[cfg(feature = "visualize")]
pub use viewer::Viewer;
