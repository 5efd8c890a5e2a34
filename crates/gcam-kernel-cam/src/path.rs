//! Visiting order for point sets.

use gcam_kernel_math::Point2;
use serde::{Deserialize, Serialize};

/// How a point set is sequenced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathMode {
    /// Greedy nearest-neighbor tour starting at the first point.
    #[default]
    Optimal,
    /// Input order.
    AsListed,
}

/// Order in which to visit `points`, as indices into the input.
///
/// In [`PathMode::Optimal`] the tour starts at index 0 and repeatedly
/// moves to the closest unvisited point. Equal distances keep the earlier
/// input index, so the result is deterministic. O(N²).
pub fn plan_order(points: &[Point2], mode: PathMode) -> Vec<usize> {
    if mode == PathMode::AsListed || points.len() < 3 {
        return (0..points.len()).collect();
    }

    let mut remaining: Vec<usize> = (1..points.len()).collect();
    let mut order = Vec::with_capacity(points.len());
    order.push(0);
    let mut current = points[0];

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (slot, &i) in remaining.iter().enumerate() {
            let d = (points[i] - current).norm_squared();
            if d < best_dist {
                best = slot;
                best_dist = d;
            }
        }
        // `remove` keeps `remaining` sorted so ties resolve to the lower index.
        let next = remaining.remove(best);
        current = points[next];
        order.push(next);
    }
    order
}

/// Length of the open tour visiting `points` in `order`.
pub fn tour_length(points: &[Point2], order: &[usize]) -> f64 {
    order
        .windows(2)
        .map(|w| (points[w[1]] - points[w[0]]).norm())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point2> {
        coords.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    #[test]
    fn test_nearest_neighbor_order() {
        let p = pts(&[(0.0, 0.0), (10.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        assert_eq!(plan_order(&p, PathMode::Optimal), vec![0, 2, 3, 1]);
    }

    #[test]
    fn test_as_listed_preserves_input() {
        let p = pts(&[(0.0, 0.0), (10.0, 0.0), (1.0, 0.0)]);
        assert_eq!(plan_order(&p, PathMode::AsListed), vec![0, 1, 2]);
    }

    #[test]
    fn test_ties_keep_earlier_index() {
        // Points 1 and 2 are equidistant from the start.
        let p = pts(&[(0.0, 0.0), (1.0, 0.0), (-1.0, 0.0), (0.0, 5.0)]);
        assert_eq!(plan_order(&p, PathMode::Optimal), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_visits_every_point_once() {
        let p: Vec<Point2> = (0..25)
            .map(|i| Point2::new(((i * 7) % 5) as f64, ((i * 3) % 11) as f64))
            .collect();
        let mut order = plan_order(&p, PathMode::Optimal);
        assert_eq!(order.len(), p.len());
        assert_eq!(order[0], 0);
        order.sort_unstable();
        assert_eq!(order, (0..p.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_deterministic() {
        let p = pts(&[(3.0, 1.0), (0.0, 0.0), (3.0, 1.0), (2.0, 2.0), (5.0, 0.0)]);
        let a = plan_order(&p, PathMode::Optimal);
        let b = plan_order(&p, PathMode::Optimal);
        assert_eq!(a, b);
    }

    #[test]
    fn test_clustered_input_gets_shorter_tour() {
        // Two clusters listed alternately.
        let p = pts(&[
            (0.0, 0.0),
            (100.0, 0.0),
            (1.0, 0.0),
            (101.0, 0.0),
            (2.0, 0.0),
            (102.0, 0.0),
        ]);
        let listed = plan_order(&p, PathMode::AsListed);
        let planned = plan_order(&p, PathMode::Optimal);
        assert!(tour_length(&p, &planned) < tour_length(&p, &listed));
        assert_eq!(planned, vec![0, 2, 4, 1, 3, 5]);
    }

    #[test]
    fn test_small_inputs() {
        assert!(plan_order(&[], PathMode::Optimal).is_empty());
        assert_eq!(plan_order(&pts(&[(1.0, 1.0)]), PathMode::Optimal), vec![0]);
    }
}
