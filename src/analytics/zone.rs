use serde::{Deserialize, Serialize};

/// Axis-aligned region of interest in frame-space pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneRegion {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Default for ZoneRegion {
    fn default() -> Self {
        Self {
            x1: 200,
            y1: 100,
            x2: 500,
            y2: 400,
        }
    }
}

impl ZoneRegion {
    /// Strict interior test: points on the boundary are outside.
    pub fn contains(&self, cx: i32, cy: i32) -> bool {
        self.x1 < cx && cx < self.x2 && self.y1 < cy && cy < self.y2
    }

    pub fn is_well_formed(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_point_is_inside() {
        let zone = ZoneRegion::default();
        assert!(zone.contains(300, 200));
    }

    #[test]
    fn boundary_points_are_excluded() {
        let zone = ZoneRegion::default();
        assert!(!zone.contains(200, 200));
        assert!(!zone.contains(500, 200));
        assert!(!zone.contains(300, 100));
        assert!(!zone.contains(300, 400));
        assert!(zone.contains(201, 101));
        assert!(zone.contains(499, 399));
    }

    #[test]
    fn inverted_rectangle_is_rejected() {
        let zone = ZoneRegion {
            x1: 10,
            y1: 10,
            x2: 5,
            y2: 20,
        };
        assert!(!zone.is_well_formed());
        assert!(!zone.contains(7, 15));
    }
}
