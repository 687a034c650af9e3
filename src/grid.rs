use epidemic_common::{Bounds, Vec2};

/// Upper limit on cells per axis; very small query radii would otherwise allocate
/// huge, mostly empty grids.
const MAX_CELLS_PER_AXIS: u32 = 256;

/// Uniform bucket grid over one city's bounds.
///
/// Points are counting-sorted by cell: `cell_particle_indices[cell_starts[c]..][..cell_counts[c]]`
/// lists the indices (into the slice passed to [`SpatialGrid::build`]) of every point in cell `c`.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    origin: Vec2,
    inv_cell_size: f32,
    dim_x: u32,
    dim_y: u32,
    positions: Vec<Vec2>,
    cell_counts: Vec<u32>,
    cell_starts: Vec<u32>,
    cell_particle_indices: Vec<u32>,
}

impl SpatialGrid {
    /// Buckets `positions` into cells at least `cell_size` wide. A non-positive
    /// `cell_size` collapses the grid to a single cell.
    pub fn build(bounds: &Bounds, cell_size: f32, positions: Vec<Vec2>) -> Self {
        let (dim_x, dim_y) = if cell_size.is_finite() && cell_size > 0.0 {
            (
                ((bounds.width() / cell_size).floor() as u32).clamp(1, MAX_CELLS_PER_AXIS),
                ((bounds.height() / cell_size).floor() as u32).clamp(1, MAX_CELLS_PER_AXIS),
            )
        } else {
            (1, 1)
        };
        // Cells may end up larger than requested, never smaller.
        let effective_cell_size = (bounds.width() / dim_x as f32).max(bounds.height() / dim_y as f32);
        let num_grid_cells = (dim_x * dim_y) as usize;

        let mut grid = SpatialGrid {
            origin: bounds.lower_left(),
            inv_cell_size: 1.0 / effective_cell_size,
            dim_x,
            dim_y,
            positions: Vec::new(),
            cell_counts: vec![0; num_grid_cells],
            cell_starts: vec![0; num_grid_cells],
            cell_particle_indices: vec![0; positions.len()],
        };

        // Phase 1: count points per cell.
        let particle_grid_indices: Vec<usize> = positions.iter().map(|&p| grid.cell_index(p)).collect();
        for &cell in &particle_grid_indices {
            grid.cell_counts[cell] += 1;
        }

        // Phase 2: prefix sum for cell start offsets.
        let mut total_sum = 0;
        for (start, &count) in grid.cell_starts.iter_mut().zip(&grid.cell_counts) {
            *start = total_sum;
            total_sum += count;
        }

        // Phase 3: scatter point indices into their cell's block.
        let mut write_offsets = vec![0u32; num_grid_cells];
        for (point_idx, &cell) in particle_grid_indices.iter().enumerate() {
            let slot = (grid.cell_starts[cell] + write_offsets[cell]) as usize;
            grid.cell_particle_indices[slot] = point_idx as u32;
            write_offsets[cell] += 1;
        }

        grid.positions = positions;
        grid
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline(always)]
    fn cell_coords(&self, pos: Vec2) -> (i64, i64) {
        let local = (pos - self.origin).scale(self.inv_cell_size);
        // Clamp to grid dimensions to handle points on or just past the edge.
        let x = (local.x.floor() as i64).clamp(0, self.dim_x as i64 - 1);
        let y = (local.y.floor() as i64).clamp(0, self.dim_y as i64 - 1);
        (x, y)
    }

    #[inline(always)]
    fn cell_index(&self, pos: Vec2) -> usize {
        let (x, y) = self.cell_coords(pos);
        (y * self.dim_x as i64 + x) as usize
    }

    /// Calls `f` with the index of every stored point strictly closer than `radius`
    /// to `pos`. Stops early as soon as `f` returns `false`.
    pub fn for_each_within<F>(&self, pos: Vec2, radius: f32, mut f: F)
    where
        F: FnMut(usize) -> bool,
    {
        if self.positions.is_empty() || !(radius > 0.0) {
            return;
        }
        let max_dist_sq = radius * radius;
        let reach = (radius * self.inv_cell_size).ceil() as i64;
        let (center_x, center_y) = self.cell_coords(pos);

        let x_range = (center_x - reach).max(0)..=(center_x + reach).min(self.dim_x as i64 - 1);
        let y_range = (center_y - reach).max(0)..=(center_y + reach).min(self.dim_y as i64 - 1);
        for gy in y_range {
            for gx in x_range.clone() {
                let cell = (gy * self.dim_x as i64 + gx) as usize;
                let start = self.cell_starts[cell] as usize;
                let end = start + self.cell_counts[cell] as usize;
                for &point_idx in &self.cell_particle_indices[start..end] {
                    let neighbor_pos = self.positions[point_idx as usize];
                    if pos.distance_squared(neighbor_pos) < max_dist_sq && !f(point_idx as usize) {
                        return;
                    }
                }
            }
        }
    }

    /// Index of the first stored point within `radius` of `pos` for which `f` returns `true`.
    pub fn find_first_within<F>(&self, pos: Vec2, radius: f32, mut f: F) -> Option<usize>
    where
        F: FnMut(usize) -> bool,
    {
        let mut found = None;
        self.for_each_within(pos, radius, |idx| {
            if f(idx) {
                found = Some(idx);
                false
            } else {
                true
            }
        });
        found
    }
}
