//! Frontier geometry.

use std::cmp::Ordering;

use crate::core::GridCoord;
use crate::grid::OccupancyGrid;

/// Stable identifier of a frontier: its centre cell.
///
/// Used for blacklisting and for deterministic tie-breaking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrontierId(pub GridCoord);

/// A candidate exploration region.
///
/// Ordering puts larger areas first.
#[derive(Clone, Debug)]
pub struct Frontier {
    outline: Vec<GridCoord>,
    area: f64,
    centroid: GridCoord,
    centre: GridCoord,
}

impl Frontier {
    /// Build from an ordered outline. `None` for an empty outline.
    pub fn from_outline(outline: Vec<GridCoord>) -> Option<Self> {
        if outline.is_empty() {
            return None;
        }

        let n = outline.len() as f64;
        let sx: f64 = outline.iter().map(|c| c.x as f64).sum();
        let sy: f64 = outline.iter().map(|c| c.y as f64).sum();
        let centroid = GridCoord::new((sx / n).round() as i32, (sy / n).round() as i32);
        let centre = *outline
            .iter()
            .min_by_key(|c| (c.distance_squared(&centroid), **c))?;

        Some(Self {
            area: lattice_area(&outline),
            outline,
            centroid,
            centre,
        })
    }

    #[inline]
    pub fn id(&self) -> FrontierId {
        FrontierId(self.centre)
    }

    #[inline]
    pub fn outline(&self) -> &[GridCoord] {
        &self.outline
    }

    /// Cells enclosed by the closed outline, boundary included.
    #[inline]
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Mean of the outline cells (may lie off the outline).
    #[inline]
    pub fn centroid(&self) -> GridCoord {
        self.centroid
    }

    /// Outline cell nearest the centroid; the navigation goal.
    #[inline]
    pub fn centre(&self) -> GridCoord {
        self.centre
    }

    /// Whether any outline cell still borders unknown space on `grid`.
    ///
    /// Frontiers from an earlier round may have been explored since.
    pub fn has_unknown_boundary(&self, grid: &OccupancyGrid) -> bool {
        self.outline.iter().any(|&c| grid.frontier_border_cell_at(c))
    }
}

/// Lattice points inside or on the closed polygon (Pick's theorem).
fn lattice_area(outline: &[GridCoord]) -> f64 {
    let n = outline.len();
    let mut twice_area: i64 = 0;
    let mut boundary: i64 = 0;
    for i in 0..n {
        let a = outline[i];
        let b = outline[(i + 1) % n];
        twice_area += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        boundary += gcd((b.x - a.x).unsigned_abs(), (b.y - a.y).unsigned_abs()) as i64;
    }
    twice_area.abs() as f64 / 2.0 + boundary as f64 / 2.0 + 1.0
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .area
            .total_cmp(&self.area)
            .then_with(|| self.id().cmp(&other.id()))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_area_of_straight_run() {
        let outline: Vec<_> = (0..7).map(|x| GridCoord::new(x, 3)).collect();
        let f = Frontier::from_outline(outline).unwrap();
        assert_relative_eq!(f.area(), 7.0);
        assert_eq!(f.centroid(), GridCoord::new(3, 3));
        assert_eq!(f.centre(), GridCoord::new(3, 3));
    }

    #[test]
    fn test_area_of_square_ring() {
        // 4x4 square outline: 12 boundary cells, 4 interior
        let mut outline = Vec::new();
        for x in 0..4 {
            outline.push(GridCoord::new(x, 0));
        }
        for y in 1..4 {
            outline.push(GridCoord::new(3, y));
        }
        for x in (0..3).rev() {
            outline.push(GridCoord::new(x, 3));
        }
        for y in (1..3).rev() {
            outline.push(GridCoord::new(0, y));
        }
        let f = Frontier::from_outline(outline).unwrap();
        assert_relative_eq!(f.area(), 16.0);
    }

    #[test]
    fn test_centre_is_on_outline() {
        // L-shape: centroid falls off the outline
        let outline = vec![
            GridCoord::new(0, 4),
            GridCoord::new(0, 3),
            GridCoord::new(0, 2),
            GridCoord::new(0, 1),
            GridCoord::new(0, 0),
            GridCoord::new(1, 0),
            GridCoord::new(2, 0),
            GridCoord::new(3, 0),
            GridCoord::new(4, 0),
        ];
        let f = Frontier::from_outline(outline).unwrap();
        assert!(f.outline().contains(&f.centre()));
        assert_ne!(f.centroid(), f.centre());
    }

    #[test]
    fn test_ordering_larger_first() {
        let small = Frontier::from_outline(vec![GridCoord::new(0, 0)]).unwrap();
        let large =
            Frontier::from_outline((0..5).map(|x| GridCoord::new(x, 9)).collect()).unwrap();
        let mut list = vec![small.clone(), large.clone()];
        list.sort();
        assert_eq!(list[0].id(), large.id());
        assert!(large < small);
    }

    #[test]
    fn test_has_unknown_boundary_revalidation() {
        let mut grid = OccupancyGrid::new(5, 5);
        for x in 0..5 {
            grid.set_free_space_at(GridCoord::new(x, 2));
        }
        let f = Frontier::from_outline((0..5).map(|x| GridCoord::new(x, 2)).collect()).unwrap();
        assert!(f.has_unknown_boundary(&grid));

        for c in grid.coords().collect::<Vec<_>>() {
            grid.set_free_space_at(c);
        }
        assert!(!f.has_unknown_boundary(&grid));
    }

    #[test]
    fn test_empty_outline() {
        assert!(Frontier::from_outline(Vec::new()).is_none());
    }
}
