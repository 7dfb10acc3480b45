//! Axis-aligned tile rectangles and the two spatial predicates the pipeline
//! needs: intersection (closed) and touching (boundary contact only).

/// Axis-aligned rectangle in map units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl TileBounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// Closed intersection, shared boundaries included.
    pub fn intersects(&self, other: &TileBounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Interiors overlap with positive area.
    pub fn overlaps_interior(&self, other: &TileBounds) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Boundaries meet while interiors stay disjoint.
    pub fn touches(&self, other: &TileBounds) -> bool {
        self.intersects(other) && !self.overlaps_interior(other)
    }

    /// Envelope of every coordinate pair in a WKT geometry.
    ///
    /// Only the numbers are read, so any polygon or multipolygon yields its
    /// bounding box. Returns `None` when fewer than one pair is present.
    pub fn from_wkt(wkt: &str) -> Option<TileBounds> {
        let numbers: Vec<f64> = wkt
            .split(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == 'e' || c == 'E'))
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect();
        if numbers.len() < 2 {
            return None;
        }
        let mut bounds = TileBounds::new(numbers[0], numbers[1], numbers[0], numbers[1]);
        for pair in numbers.chunks_exact(2) {
            bounds.min_x = bounds.min_x.min(pair[0]);
            bounds.min_y = bounds.min_y.min(pair[1]);
            bounds.max_x = bounds.max_x.max(pair[0]);
            bounds.max_y = bounds.max_y.max(pair[1]);
        }
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(x: f64, y: f64) -> TileBounds {
        TileBounds::new(x, y, x + 1.0, y + 1.0)
    }

    #[test]
    fn test_edge_neighbours_touch() {
        assert!(unit(0.0, 0.0).touches(&unit(1.0, 0.0)));
        assert!(unit(0.0, 0.0).intersects(&unit(1.0, 0.0)));
        assert!(!unit(0.0, 0.0).overlaps_interior(&unit(1.0, 0.0)));
    }

    #[test]
    fn test_corner_neighbours_touch() {
        assert!(unit(0.0, 0.0).touches(&unit(1.0, 1.0)));
    }

    #[test]
    fn test_overlap_is_not_touch() {
        let a = TileBounds::new(0.0, 0.0, 2.0, 2.0);
        let b = TileBounds::new(1.0, 1.0, 3.0, 3.0);
        assert!(a.intersects(&b));
        assert!(!a.touches(&b));
    }

    #[test]
    fn test_disjoint() {
        assert!(!unit(0.0, 0.0).intersects(&unit(5.0, 5.0)));
        assert!(!unit(0.0, 0.0).touches(&unit(5.0, 5.0)));
    }

    #[test]
    fn test_new_orders_corners() {
        assert_eq!(TileBounds::new(2.0, 3.0, 0.0, 1.0), TileBounds::new(0.0, 1.0, 2.0, 3.0));
    }

    #[test]
    fn test_from_wkt_polygon() {
        let b = TileBounds::from_wkt("POLYGON((85000 446000, 90000 446000, 90000 450000, 85000 446000))")
            .unwrap();
        assert_eq!(b, TileBounds::new(85000.0, 446000.0, 90000.0, 450000.0));
    }

    #[test]
    fn test_from_wkt_negative_coordinates() {
        let b = TileBounds::from_wkt("POLYGON((-1.5 -2, 3 -2, 3 4, -1.5 -2))").unwrap();
        assert_eq!(b, TileBounds::new(-1.5, -2.0, 3.0, 4.0));
    }

    #[test]
    fn test_from_wkt_without_coordinates() {
        assert!(TileBounds::from_wkt("POLYGON EMPTY").is_none());
    }
}
