//! Camera-following chunk window with a fixed slot pool.
//!
//! Slots are stable homes for GPU resources. A slot keeps its absolute cell
//! coordinate for as long as that coordinate stays inside the window around
//! the camera, so crossing a cell boundary re-targets only the slots whose
//! cells actually left the window. Re-targeted slots are the caller's signal
//! to rewrite the origin uniform and rerun the generation kernels.

use anyhow::{bail, Result};
use glam::{IVec2, Vec2};

/// Upper bound on pool size; a proxy for per-chunk binding counts.
pub const MAX_GRID_SLOTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotUpdate {
    pub slot: usize,
    pub coord: IVec2,
    /// World-space XZ of the cell's minimum corner.
    pub origin: Vec2,
}

#[derive(Debug)]
pub struct ChunkGrid {
    cell_size: f32,
    radius: i32,
    /// Absolute cell coordinate currently held by each slot.
    slots: Vec<Option<IVec2>>,
}

impl ChunkGrid {
    pub fn new(cell_size: f32, radius: i32) -> Result<Self> {
        if radius < 0 {
            bail!("chunk radius must be non-negative, got {radius}");
        }
        let side = 2 * radius as usize + 1;
        let count = side * side;
        if count > MAX_GRID_SLOTS {
            bail!("chunk radius {radius} needs {count} slots, limit is {MAX_GRID_SLOTS}");
        }
        Ok(Self {
            cell_size,
            radius,
            slots: vec![None; count],
        })
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn origin_of(&self, coord: IVec2) -> Vec2 {
        coord.as_vec2() * self.cell_size
    }

    /// Cell containing a world XZ position.
    pub fn cell_of(&self, pos_xz: Vec2) -> IVec2 {
        (pos_xz / self.cell_size).floor().as_ivec2()
    }

    /// Re-targets slots after camera movement. Returns one update per slot
    /// whose cell changed; a camera move within its current cell returns
    /// nothing.
    pub fn update_active_cells(&mut self, cam_xz: Vec2) -> Vec<SlotUpdate> {
        let center = self.cell_of(cam_xz);
        let in_window = |c: IVec2| {
            (c.x - center.x).abs() <= self.radius && (c.y - center.y).abs() <= self.radius
        };

        // Free every slot whose cell left the window.
        for slot in &mut self.slots {
            if slot.is_some_and(|c| !in_window(c)) {
                *slot = None;
            }
        }

        // Cells in the window not held by any slot, in scan order.
        let mut entering = Vec::new();
        for dz in -self.radius..=self.radius {
            for dx in -self.radius..=self.radius {
                let coord = center + IVec2::new(dx, dz);
                if !self.slots.contains(&Some(coord)) {
                    entering.push(coord);
                }
            }
        }

        let mut updates = Vec::with_capacity(entering.len());
        let mut entering = entering.into_iter();
        for (slot, held) in self.slots.iter_mut().enumerate() {
            if held.is_none() {
                let coord = match entering.next() {
                    Some(c) => c,
                    None => break,
                };
                *held = Some(coord);
                updates.push(SlotUpdate {
                    slot,
                    coord,
                    origin: coord.as_vec2() * self.cell_size,
                });
            }
        }
        debug_assert!(entering.next().is_none());
        updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn coords(grid: &ChunkGrid) -> HashSet<(i32, i32)> {
        grid.slots
            .iter()
            .flatten()
            .map(|c| (c.x, c.y))
            .collect()
    }

    #[test]
    fn first_update_fills_the_window() {
        for radius in [0, 1, 2] {
            let mut grid = ChunkGrid::new(512.0, radius).unwrap();
            let updates = grid.update_active_cells(Vec2::new(10.0, 10.0));
            let side = (2 * radius + 1) as usize;
            assert_eq!(updates.len(), side * side);
            assert_eq!(coords(&grid).len(), side * side);
        }
    }

    #[test]
    fn sub_cell_motion_changes_nothing() {
        let mut grid = ChunkGrid::new(512.0, 1).unwrap();
        grid.update_active_cells(Vec2::new(0.0, 0.0));
        let before = coords(&grid);
        let updates = grid.update_active_cells(Vec2::new(511.0, 500.0));
        assert!(updates.is_empty());
        assert_eq!(coords(&grid), before);
    }

    #[test]
    fn one_cell_step_updates_one_column() {
        let mut grid = ChunkGrid::new(512.0, 2).unwrap();
        grid.update_active_cells(Vec2::new(0.0, 0.0));
        let updates = grid.update_active_cells(Vec2::new(512.0, 0.0));
        // One column of the 5x5 window enters on the +X side.
        assert_eq!(updates.len(), 5);
        assert!(updates.iter().all(|u| u.coord.x == 3));
    }

    #[test]
    fn diagonal_step_updates_an_l_shape() {
        let mut grid = ChunkGrid::new(512.0, 1).unwrap();
        grid.update_active_cells(Vec2::new(0.0, 0.0));
        let updates = grid.update_active_cells(Vec2::new(512.0, 512.0));
        // A row plus a column sharing one corner cell.
        assert_eq!(updates.len(), 2 * 3 - 1);
    }

    #[test]
    fn radius_zero_tracks_the_camera_cell() {
        let mut grid = ChunkGrid::new(512.0, 0).unwrap();
        let first = grid.update_active_cells(Vec2::new(-1.0, -1.0));
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].coord, IVec2::new(-1, -1));
        assert_eq!(first[0].origin, Vec2::new(-512.0, -512.0));

        let step = grid.update_active_cells(Vec2::new(700.0, 0.0));
        assert_eq!(step.len(), 1);
        assert_eq!(step[0].coord, IVec2::new(1, 0));
    }

    #[test]
    fn surviving_cells_keep_their_slots() {
        let mut grid = ChunkGrid::new(512.0, 1).unwrap();
        grid.update_active_cells(Vec2::new(0.0, 0.0));
        let slot_of = |grid: &ChunkGrid, coord: IVec2| {
            grid.slots.iter().position(|&c| c == Some(coord)).unwrap()
        };
        let kept = IVec2::new(1, 0);
        let before = slot_of(&grid, kept);
        grid.update_active_cells(Vec2::new(512.0, 0.0));
        assert_eq!(slot_of(&grid, kept), before);
    }

    #[test]
    fn oversized_radius_is_rejected() {
        assert!(ChunkGrid::new(512.0, 4).is_err());
    }

    #[test]
    fn negative_radius_is_rejected() {
        assert!(ChunkGrid::new(512.0, -1).is_err());
        assert!(ChunkGrid::new(512.0, i32::MIN).is_err());
    }
}
