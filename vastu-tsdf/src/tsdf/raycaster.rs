//! 3D voxel traversal along rays.
//!
//! Uses the Amanatides-Woo grid walk: starting in the voxel that contains
//! the start point, step along whichever axis reaches its next voxel
//! boundary first until the end voxel is reached.
//!
//! ```text
//!  y
//!  2 │        ┌──┬──┐
//!  1 │  ┌──┬──┼──┘  ●  end
//!  0 │ ●┴──┴──┘
//!    └──────────────── x
//!     start
//! ```
//!
//! Every visited voxel is yielded exactly once, with no gaps, and the walk
//! always has `|Δx| + |Δy| + |Δz| + 1` steps.

use crate::core::Point;

use super::voxel::VoxelIndex;

/// Iterator over the global voxel indices crossed by a segment.
pub struct VoxelRay {
    current: VoxelIndex,
    step: [i32; 3],
    t_max: [f32; 3],
    t_delta: [f32; 3],
    remaining: usize,
}

impl VoxelRay {
    /// Walk from `start` to `end` (world coordinates) on a grid of `voxel_size`.
    pub fn new(start: &Point, end: &Point, voxel_size: f32) -> Self {
        let start_scaled = start / voxel_size;
        let end_scaled = end / voxel_size;
        let current = VoxelIndex::new(
            start_scaled.x.floor() as i32,
            start_scaled.y.floor() as i32,
            start_scaled.z.floor() as i32,
        );
        let last = VoxelIndex::new(
            end_scaled.x.floor() as i32,
            end_scaled.y.floor() as i32,
            end_scaled.z.floor() as i32,
        );

        let delta = end_scaled - start_scaled;
        let mut step = [0i32; 3];
        let mut t_max = [f32::INFINITY; 3];
        let mut t_delta = [f32::INFINITY; 3];
        let mut remaining = 1usize;

        for axis in 0..3 {
            remaining += (last.axis(axis) - current.axis(axis)).unsigned_abs() as usize;
            if delta[axis] == 0.0 {
                continue;
            }
            step[axis] = if delta[axis] > 0.0 { 1 } else { -1 };
            let boundary = current.axis(axis) + if step[axis] > 0 { 1 } else { 0 };
            t_max[axis] = (boundary as f32 - start_scaled[axis]) / delta[axis];
            t_delta[axis] = 1.0 / delta[axis].abs();
        }

        Self {
            current,
            step,
            t_max,
            t_delta,
            remaining,
        }
    }
}

impl Iterator for VoxelRay {
    type Item = VoxelIndex;

    fn next(&mut self) -> Option<VoxelIndex> {
        if self.remaining == 0 {
            return None;
        }
        let out = self.current;
        self.remaining -= 1;

        if self.remaining > 0 {
            let mut axis = 0;
            for candidate in 1..3 {
                if self.t_max[candidate] < self.t_max[axis] {
                    axis = candidate;
                }
            }
            if self.step[axis] != 0 {
                *self.current.axis_mut(axis) += self.step[axis];
                self.t_max[axis] += self.t_delta[axis];
            } else {
                self.remaining = 0;
            }
        }
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_aligned_ray() {
        let cells: Vec<_> =
            VoxelRay::new(&Point::new(0.05, 0.05, 0.05), &Point::new(0.95, 0.05, 0.05), 0.1).collect();
        assert_eq!(cells.len(), 10);
        assert_eq!(cells[0], VoxelIndex::new(0, 0, 0));
        assert_eq!(cells[9], VoxelIndex::new(9, 0, 0));
    }

    #[test]
    fn test_single_voxel() {
        let cells: Vec<_> =
            VoxelRay::new(&Point::new(0.01, 0.02, 0.03), &Point::new(0.05, 0.06, 0.07), 0.1).collect();
        assert_eq!(cells, vec![VoxelIndex::new(0, 0, 0)]);
    }

    #[test]
    fn test_negative_direction() {
        let cells: Vec<_> =
            VoxelRay::new(&Point::new(0.05, 0.05, 0.05), &Point::new(-0.25, 0.05, 0.05), 0.1).collect();
        let xs: Vec<i32> = cells.iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![0, -1, -2, -3]);
    }

    #[test]
    fn test_diagonal_has_no_gaps() {
        let cells: Vec<_> =
            VoxelRay::new(&Point::new(0.05, 0.05, 0.05), &Point::new(0.55, 0.35, 0.25), 0.1).collect();
        assert_eq!(cells.len(), 5 + 3 + 2 + 1);
        for pair in cells.windows(2) {
            let d = (pair[1].x - pair[0].x).abs() + (pair[1].y - pair[0].y).abs() + (pair[1].z - pair[0].z).abs();
            assert_eq!(d, 1);
        }
        assert_eq!(*cells.last().unwrap(), VoxelIndex::new(5, 3, 2));
    }
}
