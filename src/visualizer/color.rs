// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use image::Rgb;

/// Color type for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const RED: Self = Self(255, 0, 0);
    pub const GREEN: Self = Self(0, 255, 0);
    pub const BLACK: Self = Self(0, 0, 0);
    /// Overlay text color.
    pub const TURQUOISE: Self = Self(208, 224, 64);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(r, g, b)
    }

    /// Get a color from the pose palette by index.
    #[must_use]
    pub const fn from_pose_index(index: usize) -> Self {
        let color = POSE_COLORS[index % POSE_COLORS.len()];
        Self(color[0], color[1], color[2])
    }
}

impl From<Color> for Rgb<u8> {
    fn from(color: Color) -> Self {
        Self([color.0, color.1, color.2])
    }
}

/// Ultralytics Pose Color Palette
pub const POSE_COLORS: [[u8; 3]; 20] = [
    [255, 128, 0],   // #ff8000
    [255, 153, 51],  // #ff9933
    [255, 178, 102], // #ffb266
    [230, 230, 0],   // #e6e600
    [255, 153, 255], // #ff99ff
    [153, 204, 255], // #99ccff
    [255, 102, 255], // #ff66ff
    [255, 51, 255],  // #ff33ff
    [102, 178, 255], // #66b2ff
    [51, 153, 255],  // #3399ff
    [255, 153, 153], // #ff9999
    [255, 102, 102], // #ff6666
    [255, 51, 51],   // #ff3333
    [153, 255, 153], // #99ff99
    [102, 255, 102], // #66ff66
    [51, 255, 51],   // #33ff33
    [0, 255, 0],     // #00ff00
    [0, 0, 255],     // #0000ff
    [255, 0, 0],     // #ff0000
    [255, 255, 255], // #ffffff
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_palette_wraps() {
        assert_eq!(Color::from_pose_index(0), Color(255, 128, 0));
        assert_eq!(Color::from_pose_index(20), Color::from_pose_index(0));
        assert_eq!(Rgb::from(Color::TURQUOISE), Rgb([208, 224, 64]));
    }
}
