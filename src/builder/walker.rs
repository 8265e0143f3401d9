//! Position and orientation accumulation along the sorted blocks.
//!
//! Both builder passes drive the same walker so objects and track elements
//! land on identical coordinates.

use glam::DVec3;

use crate::model::{Block, RouteData};

/// Orientation and position at the start of one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub position: DVec3,
    /// Forward, including the current gradient.
    pub direction: DVec3,
    pub up: DVec3,
    /// Points to the right of the track.
    pub side: DVec3,
    /// Distance to the next block.
    pub length: f64,
    /// Gradient in per mille.
    pub pitch: f64,
    /// Signed radius, 0 for straight track.
    pub curve_radius: f64,
    pub cant: f64,
    pub height: f64,
    pub accuracy: f64,
    pub adhesion: f64,
}

/// Running state of the walk. Gradient, curve and the other persistent
/// properties carry forward until a block changes them.
#[derive(Debug, Clone)]
pub struct TrackWalker {
    position: DVec3,
    /// Horizontal heading, unit length.
    heading: DVec3,
    /// Horizontal right-hand vector, unit length.
    side: DVec3,
    pitch: f64,
    radius: f64,
    cant: f64,
    height: f64,
    accuracy: f64,
    adhesion: f64,
}

impl Default for TrackWalker {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            heading: DVec3::Z,
            side: DVec3::X,
            pitch: 0.0,
            radius: 0.0,
            cant: 0.0,
            height: 0.0,
            accuracy: 2.0,
            adhesion: 1.0,
        }
    }
}

impl TrackWalker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the block's changes and return the frame at its start.
    pub fn enter(&mut self, block: &Block, length: f64) -> Frame {
        if block.turn != 0.0 {
            self.turn(-block.turn.atan());
        }
        if let Some(pitch) = block.pitch {
            self.pitch = pitch;
        }
        if let Some(curve) = block.curve {
            self.radius = curve.radius;
            self.cant = curve.cant;
        }
        if let Some(height) = block.height {
            self.height = height;
        }
        if let Some(accuracy) = block.accuracy {
            self.accuracy = accuracy;
        }
        if let Some(adhesion) = block.adhesion {
            self.adhesion = adhesion;
        }

        let direction = DVec3::new(self.heading.x, self.pitch * 0.001, self.heading.z).normalize_or_zero();
        Frame {
            position: self.position,
            direction,
            up: direction.cross(self.side).normalize_or_zero(),
            side: self.side,
            length,
            pitch: self.pitch,
            curve_radius: self.radius,
            cant: self.cant,
            height: self.height,
            accuracy: self.accuracy,
            adhesion: self.adhesion,
        }
    }

    /// Move to the start of the next block.
    ///
    /// On a curve the heading turns by half the arc angle, the position moves
    /// along the chord, and the heading turns by the second half.
    pub fn advance(&mut self, length: f64) {
        if self.radius == 0.0 {
            self.position += self.heading * length;
        } else {
            let half = -0.5 * length / self.radius;
            self.turn(half);
            self.position += self.heading * (2.0 * self.radius.abs() * half.abs().sin());
            self.turn(half);
        }
        self.position.y += length * self.pitch * 0.001;
        // Renormalize every block; rounding drift adds up over long routes.
        self.heading = self.heading.normalize_or_zero();
        self.side = self.side.normalize_or_zero();
    }

    fn turn(&mut self, angle: f64) {
        self.heading = rotate_horizontal(self.heading, angle);
        self.side = rotate_horizontal(self.side, angle);
    }
}

/// Rotate a vector about the vertical axis. Negative angles turn right.
pub fn rotate_horizontal(v: DVec3, angle: f64) -> DVec3 {
    let (sin, cos) = angle.sin_cos();
    DVec3::new(cos * v.x - sin * v.z, v.y, sin * v.x + cos * v.z)
}

/// Length of every block: the distance to the next one, or the block
/// interval for the last.
pub fn block_lengths(data: &RouteData) -> Vec<f64> {
    let blocks = data.blocks.as_slice();
    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| {
            blocks
                .get(i + 1)
                .map_or(data.block_interval, |next| {
                    next.starting_track_position - block.starting_track_position
                })
        })
        .collect()
}

/// Walk the sorted blocks, calling `visit(ordinal, block, frame)` for each.
pub fn walk(data: &RouteData, mut visit: impl FnMut(usize, &Block, &Frame)) {
    let mut walker = TrackWalker::new();
    let lengths = block_lengths(data);
    for (ordinal, (block, length)) in data.blocks.iter().zip(lengths).enumerate() {
        let frame = walker.enter(block, length);
        visit(ordinal, block, &frame);
        walker.advance(length);
    }
}
