//! Tunnel scene graph: polygonal walls of staggered brick boxes.
//!
//! Hierarchy: tunnel root (spin around Z) → wall (fixed roll) → row group
//! (translation along Z) → brick box. The tunnel axis is Z; the camera looks
//! down -Z from the origin and rows travel toward it.

use crate::bricks::{BrickTexture, Segment};
use engine_core::{RandomSource, Transform};
use glam::{Mat4, Quat, Vec3};
use std::f32::consts::{PI, TAU};

/// Default maximum brick tilt in radians.
pub const DEFAULT_MAX_TILT: f32 = 0.15;

/// Geometry parameters for the tunnel.
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelParams {
    /// Number of walls (polygon sides).
    pub walls: u32,
    /// Depth rows per wall.
    pub rows: u32,
    /// Units per row.
    pub row_width: u32,
    /// World size of one unit.
    pub unit_size: f32,
    /// Radial height of the shortest brick; the tallest is double.
    pub base_height: f32,
    /// Largest tilt around the wall normal, radians.
    pub max_tilt: f32,
}

impl Default for TunnelParams {
    fn default() -> Self {
        Self {
            walls: 5,
            rows: 24,
            row_width: 6,
            unit_size: 10.0,
            base_height: 3.0,
            max_tilt: DEFAULT_MAX_TILT,
        }
    }
}

impl TunnelParams {
    /// Length of the tunnel along its axis.
    pub fn total_depth(&self) -> f32 {
        self.unit_size * self.rows as f32
    }

    pub fn row_width_world(&self) -> f32 {
        self.row_width as f32 * self.unit_size
    }

    /// Distance from the axis to each wall.
    pub fn wall_distance(&self) -> f32 {
        circumradius(self.row_width_world(), self.walls)
    }

    /// Roll of a wall around the tunnel axis.
    pub fn wall_angle(&self, wall: u32) -> f32 {
        TAU / self.walls as f32 * wall as f32
    }
}

/// Radius of the tunnel for `walls` faces of width `side`: `side / (2·tan(π/walls))`.
pub fn circumradius(side: f32, walls: u32) -> f32 {
    side / (2.0 * (PI / walls as f32).tan())
}

/// Reduce an axial position into `[0, total)`. Non-finite input lands at 0.
pub fn wrap_depth(depth: f32, total: f32) -> f32 {
    if !depth.is_finite() || !total.is_finite() || total <= 0.0 {
        return 0.0;
    }
    let wrapped = depth.rem_euclid(total);
    // rem_euclid can round up to `total` for tiny negative inputs.
    if wrapped >= total {
        0.0
    } else {
        wrapped
    }
}

/// One brick, positioned relative to its row group.
#[derive(Debug, Clone)]
pub struct BrickBox {
    pub segment: Segment,
    /// Position, tilt and size (as scale of a unit cube).
    pub transform: Transform,
    pub tilt: f32,
    pub uv_rect: [f32; 4],
}

impl BrickBox {
    pub fn size(&self) -> Vec3 {
        self.transform.scale
    }
}

/// One depth slice of a wall. Only `depth` changes after construction.
#[derive(Debug, Clone)]
pub struct RowGroup {
    pub row: u32,
    depth: f32,
    pub boxes: Vec<BrickBox>,
}

impl RowGroup {
    pub fn depth(&self) -> f32 {
        self.depth
    }

    fn advance(&mut self, step: f32, total: f32) {
        self.depth = wrap_depth(self.depth + step, total);
    }

    pub fn transform(&self) -> Transform {
        Transform::from_position(Vec3::new(0.0, 0.0, self.depth))
    }
}

/// One face of the polygon.
#[derive(Debug, Clone)]
pub struct Wall {
    pub index: u32,
    pub angle: f32,
    pub rows: Vec<RowGroup>,
}

impl Wall {
    pub fn transform(&self) -> Transform {
        Transform::from_roll(self.angle)
    }
}

/// Flattened per-box data for rendering.
#[derive(Debug, Clone, Copy)]
pub struct BoxInstance {
    pub model: Mat4,
    pub uv_rect: [f32; 4],
}

/// The whole tunnel.
#[derive(Debug, Clone)]
pub struct TunnelScene {
    params: TunnelParams,
    root: Transform,
    spin: f32,
    walls: Vec<Wall>,
}

impl TunnelScene {
    /// Instantiate one box per segment of `texture`. Two draws per box: height, then tilt.
    pub fn build(
        params: &TunnelParams,
        texture: &BrickTexture,
        rng: &mut dyn RandomSource,
    ) -> Self {
        let layout = &texture.layout;
        debug_assert_eq!(layout.walls(), params.walls);
        debug_assert_eq!(layout.rows(), params.rows);
        debug_assert_eq!(layout.row_width(), params.row_width);

        let unit = params.unit_size;
        let radius = params.wall_distance();
        let half_width = params.row_width_world() * 0.5;

        let walls = (0..params.walls)
            .map(|wall| {
                let rows = (0..params.rows)
                    .map(|row| {
                        let shift = texture.offsets.shift_units(row);
                        let mut cursor = shift;
                        let boxes = layout
                            .row(wall, row)
                            .iter()
                            .map(|segment| {
                                let length = segment.length as f32;
                                let centre = (cursor + length * 0.5) * unit - half_width;
                                cursor += length;

                                let height = params.base_height * (1.0 + rng.next_f32());
                                let tilt = rng.range_f32(-params.max_tilt, params.max_tilt);
                                let transform = Transform::from_position_rotation(
                                    Vec3::new(centre, -radius, 0.0),
                                    Quat::from_rotation_y(tilt),
                                )
                                .with_scale(Vec3::new(length * unit, height, unit));

                                BrickBox {
                                    segment: *segment,
                                    transform,
                                    tilt,
                                    uv_rect: texture.uv_rect(segment),
                                }
                            })
                            .collect();

                        RowGroup {
                            row,
                            depth: row as f32 * unit,
                            boxes,
                        }
                    })
                    .collect();

                Wall {
                    index: wall,
                    angle: params.wall_angle(wall),
                    rows,
                }
            })
            .collect();

        let scene = Self {
            params: params.clone(),
            root: Transform::from_position(Vec3::new(0.0, 0.0, -params.total_depth())),
            spin: 0.0,
            walls,
        };

        log::info!(
            "Tunnel built: {} walls x {} rows, {} boxes, radius {:.1}",
            scene.wall_count(),
            params.rows,
            scene.box_count(),
            radius
        );

        scene
    }

    pub fn params(&self) -> &TunnelParams {
        &self.params
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    pub fn wall_count(&self) -> usize {
        self.walls.len()
    }

    pub fn rows_per_wall(&self) -> usize {
        self.params.rows as usize
    }

    pub fn box_count(&self) -> usize {
        self.walls
            .iter()
            .flat_map(|w| &w.rows)
            .map(|r| r.boxes.len())
            .sum()
    }

    pub fn total_depth(&self) -> f32 {
        self.params.total_depth()
    }

    /// Current spin around the tunnel axis.
    pub fn spin(&self) -> f32 {
        self.spin
    }

    /// Set the absolute spin around the tunnel axis.
    pub fn set_spin(&mut self, angle: f32) {
        self.spin = angle;
        self.root.set_roll(angle);
    }

    /// Move every row group along the axis, wrapping at the tunnel length.
    pub fn advance_rows(&mut self, step: f32) {
        let total = self.total_depth();
        for row in self.walls.iter_mut().flat_map(|w| w.rows.iter_mut()) {
            row.advance(step, total);
        }
    }

    pub fn row_depths(&self) -> impl Iterator<Item = f32> + '_ {
        self.walls.iter().flat_map(|w| w.rows.iter().map(RowGroup::depth))
    }

    /// World matrices for every box, wall-major.
    pub fn instances(&self) -> Vec<BoxInstance> {
        let mut out = Vec::with_capacity(self.box_count());
        let root = self.root.to_matrix();
        for wall in &self.walls {
            let wall_matrix = root * wall.transform().to_matrix();
            for row in &wall.rows {
                let row_matrix = wall_matrix * row.transform().to_matrix();
                out.extend(row.boxes.iter().map(|b| BoxInstance {
                    model: row_matrix * b.transform.to_matrix(),
                    uv_rect: b.uv_rect,
                }));
            }
        }
        out
    }
}
