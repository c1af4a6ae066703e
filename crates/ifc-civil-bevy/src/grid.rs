//! Reference grid on the ground plane
//!
//! Drawn every frame with gizmos from [`GridSettings`], so panel edits show
//! up immediately: a fine grid at the primary size and a coarse one at the
//! secondary size, both centred under the camera target.

use crate::camera::CameraController;
use crate::GridSettings;
use bevy::prelude::*;
use std::f32::consts::FRAC_PI_2;

pub struct GridPlugin;

impl Plugin for GridPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, draw_grid);
    }
}

/// Half-width of the area covered by the grid, in metres
const GRID_EXTENT: f32 = 100.0;

/// Upper bound on cells per side, so tiny sizes stay drawable
const MAX_CELLS: u32 = 400;

/// Cells per side and the spacing actually used for a requested cell size.
/// `None` when the size is zero (grid layer hidden).
pub fn grid_layout(size: f32, extent: f32) -> Option<(u32, f32)> {
    if size.is_nan() || size <= 0.0 {
        return None;
    }
    let cells = ((extent * 2.0) / size).ceil() as u32;
    if cells > MAX_CELLS {
        Some((MAX_CELLS, (extent * 2.0) / MAX_CELLS as f32))
    } else {
        Some((cells.max(1), size))
    }
}

fn draw_grid(mut gizmos: Gizmos, settings: Res<GridSettings>, controller: Res<CameraController>) {
    if !settings.visible {
        return;
    }
    let [r, g, b] = settings.color.to_array();

    // Snap the centre to the coarse spacing so lines don't swim while panning
    let snap = settings.secondary_size.max(1.0);
    let center = Vec3::new(
        (controller.target.x / snap).round() * snap,
        0.0,
        (controller.target.z / snap).round() * snap,
    );
    let rotation = Quat::from_rotation_x(FRAC_PI_2);

    if let Some((cells, spacing)) = grid_layout(settings.primary_size, GRID_EXTENT) {
        gizmos.grid(
            Isometry3d::new(center, rotation),
            UVec2::splat(cells),
            Vec2::splat(spacing),
            Color::srgba(r, g, b, 0.35),
        );
    }
    if let Some((cells, spacing)) = grid_layout(settings.secondary_size, GRID_EXTENT) {
        gizmos.grid(
            Isometry3d::new(center, rotation),
            UVec2::splat(cells),
            Vec2::splat(spacing),
            Color::srgb(r, g, b),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_layout() {
        assert_eq!(grid_layout(10.0, 100.0), Some((20, 10.0)));
        assert_eq!(grid_layout(0.0, 100.0), None);
        assert_eq!(grid_layout(f32::NAN, 100.0), None);
        // Capped
        let (cells, spacing) = grid_layout(0.1, 100.0).unwrap();
        assert_eq!(cells, MAX_CELLS);
        assert_eq!(spacing, 0.5);
    }
}
