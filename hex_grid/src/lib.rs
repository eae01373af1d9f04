//! Hexagonal grid geometry.
//!
//! Axial coordinates where the six neighbours of `(x, y)` are
//! `(x±1, y)`, `(x, y±1)`, `(x+1, y+1)` and `(x-1, y-1)`.
//! Provides distances, ordered ring enumeration, nearest-tile search and
//! A* path search over a caller-supplied passability predicate.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Offsets to the six neighbours, clockwise from 2 o'clock.
const NEIGHBOR_OFFSETS: [(i32, i32); 6] = [(1, 0), (1, 1), (0, 1), (-1, 0), (-1, -1), (0, -1)];

/// A position on the hex grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HexCoord {
    pub x: i32,
    pub y: i32,
}

impl HexCoord {
    pub const ORIGIN: HexCoord = HexCoord { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn latitude(self) -> i32 {
        self.x + self.y
    }

    pub const fn longitude(self) -> i32 {
        self.x - self.y
    }

    /// Number of steps between two tiles, ignoring terrain.
    pub fn distance_to(self, other: HexCoord) -> u32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        if (dx >= 0) == (dy >= 0) || dx == 0 || dy == 0 {
            dx.unsigned_abs().max(dy.unsigned_abs())
        } else {
            dx.unsigned_abs() + dy.unsigned_abs()
        }
    }

    pub fn neighbors(self) -> [HexCoord; 6] {
        NEIGHBOR_OFFSETS.map(|(dx, dy)| HexCoord::new(self.x + dx, self.y + dy))
    }

    pub fn is_adjacent_to(self, other: HexCoord) -> bool {
        self.distance_to(other) == 1
    }

    /// All tiles at exactly `radius` steps, in a fixed walking order
    /// starting from the 6 o'clock corner.
    pub fn ring(self, radius: u32) -> Vec<HexCoord> {
        if radius == 0 {
            return vec![self];
        }
        let r = radius as i32;
        let mut out = Vec::with_capacity(6 * radius as usize);
        let mut current = HexCoord::new(self.x - r, self.y - r);
        for (dx, dy) in NEIGHBOR_OFFSETS {
            for _ in 0..radius {
                out.push(current);
                current = HexCoord::new(current.x + dx, current.y + dy);
            }
        }
        out
    }

    /// Rings `0..=radius`, nearest first. The order is stable for a given
    /// origin and radius.
    pub fn tiles_in_distance(self, radius: u32) -> Vec<HexCoord> {
        (0..=radius).flat_map(|r| self.ring(r)).collect()
    }
}

impl std::fmt::Display for HexCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Find the nearest tile (by ring) satisfying `accept`, searching out to
/// `max_radius`. Ties within a ring resolve to ring order.
pub fn closest_matching(
    origin: HexCoord,
    max_radius: u32,
    mut accept: impl FnMut(HexCoord) -> bool,
) -> Option<HexCoord> {
    (0..=max_radius)
        .flat_map(|r| origin.ring(r))
        .find(|&tile| accept(tile))
}

/// A* search over uniformly weighted hex steps.
///
/// `passable` is consulted for every tile except `start`; search stops
/// expanding past `max_steps`. Returns the path including both endpoints.
pub fn find_path(
    start: HexCoord,
    goal: HexCoord,
    max_steps: u32,
    passable: impl Fn(HexCoord) -> bool,
) -> Option<Vec<HexCoord>> {
    let mut open_set = BinaryHeap::new();
    let mut came_from: HashMap<HexCoord, HexCoord> = HashMap::new();
    let mut g_score: HashMap<HexCoord, u32> = HashMap::new();
    let mut closed_set: HashSet<HexCoord> = HashSet::new();

    g_score.insert(start, 0);
    open_set.push(Frontier {
        node: start,
        cost: 0,
        priority: start.distance_to(goal),
    });

    while let Some(Frontier { node: current, cost, .. }) = open_set.pop() {
        if !closed_set.insert(current) {
            continue;
        }

        if current == goal {
            let mut path = vec![current];
            let mut curr = current;
            while let Some(&prev) = came_from.get(&curr) {
                path.push(prev);
                curr = prev;
            }
            path.reverse();
            return Some(path);
        }

        if cost >= max_steps {
            continue;
        }

        for neighbor in current.neighbors() {
            if closed_set.contains(&neighbor) || !passable(neighbor) {
                continue;
            }
            let tentative_g = cost + 1;
            if tentative_g < *g_score.get(&neighbor).unwrap_or(&u32::MAX) {
                came_from.insert(neighbor, current);
                g_score.insert(neighbor, tentative_g);
                open_set.push(Frontier {
                    node: neighbor,
                    cost: tentative_g,
                    priority: tentative_g + neighbor.distance_to(goal),
                });
            }
        }
    }

    None
}

#[derive(Copy, Clone, Eq, PartialEq)]
struct Frontier {
    node: HexCoord,
    cost: u32,
    priority: u32,
}

// Min-heap on priority; ties broken by coordinate so that `Ord` agrees with `Eq`.
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| other.node.cmp(&self.node))
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

    #[test]
    fn test_distance_same_sign_axes() {
        let a = HexCoord::new(0, 0);
        assert_eq!(a.distance_to(HexCoord::new(2, 3)), 3);
        assert_eq!(a.distance_to(HexCoord::new(-2, -1)), 2);
    }

    #[test]
    fn test_distance_opposite_sign_axes() {
        let a = HexCoord::new(0, 0);
        assert_eq!(a.distance_to(HexCoord::new(2, -1)), 3);
        assert_eq!(a.distance_to(HexCoord::new(-1, 1)), 2);
    }

    #[test]
    fn test_neighbors_are_adjacent() {
        let origin = HexCoord::new(4, -2);
        for n in origin.neighbors() {
            assert_eq!(origin.distance_to(n), 1);
        }
    }

    #[test]
    fn test_ring_sizes_and_distances() {
        let origin = HexCoord::new(1, 1);
        assert_eq!(origin.ring(0), vec![origin]);
        for r in 1..5 {
            let ring = origin.ring(r);
            assert_eq!(ring.len(), 6 * r as usize);
            assert!(ring.iter().all(|t| origin.distance_to(*t) == r));
            let unique: HashSet<_> = ring.iter().collect();
            assert_eq!(unique.len(), ring.len());
        }
    }

    #[test]
    fn test_tiles_in_distance_count() {
        // 1 + 6 + 12 + 18
        assert_eq!(HexCoord::ORIGIN.tiles_in_distance(3).len(), 37);
        assert_eq!(HexCoord::ORIGIN.tiles_in_distance(3)[0], HexCoord::ORIGIN);
    }

    #[test]
    fn test_latitude_longitude() {
        let c = HexCoord::new(3, 1);
        assert_eq!(c.latitude(), 4);
        assert_eq!(c.longitude(), 2);
    }

    #[test]
    fn test_closest_matching_prefers_nearer_rings() {
        let origin = HexCoord::ORIGIN;
        let found = closest_matching(origin, 5, |t| t.x >= 2);
        let found = found.expect("a tile with x >= 2 exists within 5");
        assert_eq!(origin.distance_to(found), 2);
    }

    #[test]
    fn test_closest_matching_none_in_range() {
        assert!(closest_matching(HexCoord::ORIGIN, 2, |t| t.x > 10).is_none());
    }

    #[test]
    fn test_find_path_straight_line() {
        let start = HexCoord::new(0, 0);
        let goal = HexCoord::new(3, 0);
        let path = find_path(start, goal, 10, |t| t.distance_to(start) <= 5).unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
    }

    #[test]
    fn test_find_path_around_wall() {
        let start = HexCoord::new(0, 0);
        let goal = HexCoord::new(2, 0);
        let wall = HexCoord::new(1, 0);
        let path = find_path(start, goal, 10, |t| t != wall && t.distance_to(start) <= 4).unwrap();
        assert!(!path.contains(&wall));
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn test_find_path_blocked() {
        let start = HexCoord::ORIGIN;
        let goal = HexCoord::new(3, 3);
        assert!(find_path(start, goal, 10, |_| false).is_none());
    }
}
