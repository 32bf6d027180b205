use serde::{Deserialize, Serialize};

/// Axis-aligned face box in frame pixel coordinates: top-left corner plus size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a box from corner coordinates, rounding to the pixel grid.
    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let x = x1.round() as i32;
        let y = y1.round() as i32;
        Self::new(x, y, x2.round() as i32 - x, y2.round() as i32 - y)
    }

    pub fn area(&self) -> f64 {
        if self.width <= 0 || self.height <= 0 {
            return 0.0;
        }
        self.width as f64 * self.height as f64
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn diagonal(&self) -> f64 {
        (self.width as f64).hypot(self.height as f64)
    }

    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        (ax - bx).hypot(ay - by)
    }

    /// Intersection over union. Zero when the boxes do not overlap or when
    /// either box has zero area.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let area_a = self.area();
        let area_b = other.area();
        if area_a == 0.0 || area_b == 0.0 {
            return 0.0;
        }

        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }
        inter / (area_a + area_b - inter)
    }

    /// Clips the box to a `frame_w` × `frame_h` frame. The result may be
    /// degenerate when the box lies entirely outside the frame.
    pub fn clamp_to(&self, frame_w: u32, frame_h: u32) -> BoundingBox {
        let fw = frame_w as i32;
        let fh = frame_h as i32;
        let x1 = self.x.clamp(0, fw);
        let y1 = self.y.clamp(0, fh);
        let x2 = (self.x + self.width).clamp(0, fw);
        let y2 = (self.y + self.height).clamp(0, fh);
        BoundingBox::new(x1, y1, x2 - x1, y2 - y1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn bbox(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
        BoundingBox::new(x, y, w, h)
    }

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical_boxes() {
        let a = bbox(10, 10, 100, 100);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_no_overlap() {
        assert_relative_eq!(bbox(0, 0, 50, 50).iou(&bbox(100, 100, 50, 50)), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 50*100 = 5000, union 10000 + 10000 - 5000
        let a = bbox(0, 0, 100, 100);
        let b = bbox(50, 0, 100, 100);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[test]
    fn test_iou_contained() {
        let a = bbox(0, 0, 100, 100);
        let b = bbox(25, 25, 50, 50);
        assert_relative_eq!(a.iou(&b), 2500.0 / 10000.0);
    }

    #[test]
    fn test_iou_is_symmetric() {
        let a = bbox(0, 0, 80, 60);
        let b = bbox(30, 10, 70, 90);
        assert_relative_eq!(a.iou(&b), b.iou(&a));
    }

    #[rstest]
    #[case::touching_edges(bbox(0, 0, 50, 50), bbox(50, 0, 50, 50))]
    #[case::zero_width(bbox(0, 0, 0, 100), bbox(0, 0, 50, 50))]
    #[case::zero_height(bbox(0, 0, 100, 0), bbox(0, 0, 50, 50))]
    #[case::negative_width(bbox(10, 10, -5, 20), bbox(0, 0, 50, 50))]
    fn test_iou_is_zero(#[case] a: BoundingBox, #[case] b: BoundingBox) {
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    // ── Geometry ─────────────────────────────────────────────────────

    #[test]
    fn test_from_corners_rounds() {
        assert_eq!(
            BoundingBox::from_corners(10.4, 20.6, 50.5, 60.0),
            bbox(10, 21, 41, 39)
        );
    }

    #[test]
    fn test_center_and_diagonal() {
        let b = bbox(0, 0, 30, 40);
        assert_eq!(b.center(), (15.0, 20.0));
        assert_relative_eq!(b.diagonal(), 50.0);
    }

    #[test]
    fn test_center_distance() {
        assert_relative_eq!(bbox(0, 0, 10, 10).center_distance(&bbox(30, 40, 10, 10)), 50.0);
    }

    // ── Clamping ─────────────────────────────────────────────────────

    #[test]
    fn test_clamp_inside_is_identity() {
        let b = bbox(10, 10, 20, 20);
        assert_eq!(b.clamp_to(100, 100), b);
    }

    #[test]
    fn test_clamp_partially_outside() {
        assert_eq!(bbox(-10, 90, 30, 30).clamp_to(100, 100), bbox(0, 90, 20, 10));
    }

    #[test]
    fn test_clamp_fully_outside_is_degenerate() {
        assert!(bbox(200, 200, 30, 30).clamp_to(100, 100).is_degenerate());
    }
}
