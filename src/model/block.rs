//! Per-position accumulation of track commands.
//!
//! Every distinct track position named by a route gets exactly one [`Block`].
//! Blocks are appended in source order while parsing, sorted once parsing is
//! done, and then padded so the world builder never has to bridge a long gap.

use serde::Serialize;

use crate::loader::{SoundHandle, TextureHandle};

use super::structure::StructureKind;

/// Largest allowed distance between consecutive blocks after padding.
pub const MAX_BLOCK_GAP: f64 = 25.0;

// ── Block contents ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurveChange {
    /// Signed radius; 0 means straight.
    pub radius: f64,
    pub cant: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RailAction {
    Start,
    Update,
    End,
}

/// `Track.RailStart`, `Track.Rail`, `Track.RailEnd`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RailChange {
    pub rail: usize,
    pub action: RailAction,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub structure: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RepeaterKind {
    Wall,
    Dike,
    Pole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Left,
    Both,
    Right,
}

impl Side {
    /// `-1` left, `0` both, `1` right.
    pub fn from_direction(direction: i32) -> Option<Self> {
        match direction {
            -1 => Some(Side::Left),
            0 => Some(Side::Both),
            1 => Some(Side::Right),
            _ => None,
        }
    }

    pub fn has_left(self) -> bool {
        matches!(self, Side::Left | Side::Both)
    }

    pub fn has_right(self) -> bool {
        matches!(self, Side::Right | Side::Both)
    }
}

/// Start or stop a structure repeated on every block of a rail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RepeaterChange {
    Start {
        kind: RepeaterKind,
        rail: usize,
        side: Side,
        structure: usize,
        /// Poles only: place every `interval` blocks.
        interval: usize,
    },
    End {
        kind: RepeaterKind,
        rail: usize,
    },
}

/// A one-off object at this block, relative to a rail.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObjectPlacement {
    pub kind: StructureKind,
    pub index: usize,
    pub rail: usize,
    pub x: f64,
    pub y: f64,
    /// Distance along the track from the block start.
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SoundKind {
    /// Plays continuously at its location (`Track.Doppler`).
    Looped,
    /// Plays once when the train passes its trigger position (`Track.Announce`).
    OneShot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundPlacement {
    pub sound: Option<SoundHandle>,
    pub kind: SoundKind,
    /// Absolute track position of the trigger or source.
    pub track_position: f64,
    pub x: f64,
    pub y: f64,
    /// Trigger speed in m/s for one-shot sounds; 0 plays at any speed.
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StopMarker {
    pub station: usize,
    /// Relative to the block start, negative is behind the stop point.
    pub start_offset: f64,
    pub end_offset: f64,
    pub cars: u32,
    /// `-1` left, `1` right side of the track.
    pub direction: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SignalKind {
    /// Built-in signal with this many aspects (`Track.Signal`).
    Builtin(u32),
    /// Index into the route's signal table (`Track.SigF`).
    Custom(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalPlacement {
    pub kind: SignalKind,
    /// Section controlled by the signal, relative to the next section.
    pub section: i32,
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BeaconPlacement {
    pub beacon_type: i32,
    pub structure: Option<usize>,
    pub section: i32,
    pub data: i32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FogChange {
    pub start: f64,
    pub end: f64,
    pub color: [u8; 3],
    /// Set when `Options.FogBehavior 1` was active at the command: the fog
    /// blends towards the next change instead of switching at the block.
    pub interpolated: bool,
}

/// Miscellaneous things happening at a block, in source order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BlockMarker {
    Station(usize),
    Section {
        aspects: Vec<i32>,
        /// `Options.SectionBehavior 1` was active at the command.
        simplified: bool,
    },
    Signal(SignalPlacement),
    Beacon(BeaconPlacement),
    Background(i32),
    Fog(FogChange),
    Brightness(f64),
    Lighting(usize),
    Marker {
        texture: Option<TextureHandle>,
        /// Distance over which the marker stays visible.
        distance: f64,
    },
    PointOfInterest {
        rail: usize,
        x: f64,
        y: f64,
        text: String,
    },
    Buffer,
}

// ── Block ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub starting_track_position: f64,
    /// Horizontal turn as a tangent ratio, applied at the block start.
    pub turn: f64,
    pub curve: Option<CurveChange>,
    /// Gradient in per mille, kept until the next change.
    pub pitch: Option<f64>,
    pub height: Option<f64>,
    /// m/s; `f64::INFINITY` lifts the limit. None leaves it unchanged.
    pub speed_limit: Option<f64>,
    pub accuracy: Option<f64>,
    pub adhesion: Option<f64>,
    pub ground: Option<usize>,
    pub rails: Vec<RailChange>,
    /// `(rail, structure)` from `Track.RailType`.
    pub rail_types: Vec<(usize, usize)>,
    pub repeaters: Vec<RepeaterChange>,
    pub objects: Vec<ObjectPlacement>,
    pub sounds: Vec<SoundPlacement>,
    pub stop_marker: Option<StopMarker>,
    pub markers: Vec<BlockMarker>,
}

impl Block {
    pub fn new(starting_track_position: f64) -> Self {
        Self {
            starting_track_position,
            turn: 0.0,
            curve: None,
            pitch: None,
            height: None,
            speed_limit: None,
            accuracy: None,
            adhesion: None,
            ground: None,
            rails: Vec::new(),
            rail_types: Vec::new(),
            repeaters: Vec::new(),
            objects: Vec::new(),
            sounds: Vec::new(),
            stop_marker: None,
            markers: Vec::new(),
        }
    }

    /// Nothing but a position.
    pub fn is_empty(&self) -> bool {
        *self == Block::new(self.starting_track_position)
    }
}

// ── Blocks ─────────────────────────────────────────────────────────

/// The route's blocks. Unsorted while parsing, sorted afterwards.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Blocks {
    blocks: Vec<Block>,
    #[serde(skip)]
    sorted: bool,
    #[serde(skip)]
    padded: bool,
}

impl Blocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the block at exactly `position`, appending one if needed.
    ///
    /// Before sorting this is a linear scan and new blocks go to the end.
    /// After sorting it is a binary search and new blocks are inserted in order.
    pub fn find_block(&mut self, position: f64) -> usize {
        if self.sorted {
            let at = self
                .blocks
                .partition_point(|b| b.starting_track_position < position);
            let exists = self
                .blocks
                .get(at)
                .is_some_and(|b| b.starting_track_position == position);
            if !exists {
                self.blocks.insert(at, Block::new(position));
            }
            return at;
        }
        if let Some(i) = self
            .blocks
            .iter()
            .position(|b| b.starting_track_position == position)
        {
            return i;
        }
        self.blocks.push(Block::new(position));
        self.blocks.len() - 1
    }

    /// Stable sort by position.
    pub fn sort(&mut self) {
        self.blocks
            .sort_by(|a, b| a.starting_track_position.total_cmp(&b.starting_track_position));
        self.sorted = true;
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Insert empty blocks so no gap exceeds [`MAX_BLOCK_GAP`]. Runs once;
    /// later calls return 0. Sorts first if that has not happened yet.
    /// Returns the number of blocks inserted.
    pub fn create_missing_blocks(&mut self) -> usize {
        if self.padded {
            return 0;
        }
        if !self.sorted {
            self.sort();
        }
        self.padded = true;

        let original = std::mem::take(&mut self.blocks);
        let mut padded = Vec::with_capacity(original.len());
        let mut inserted = 0;
        let mut iter = original.into_iter().peekable();
        while let Some(block) = iter.next() {
            let start = block.starting_track_position;
            padded.push(block);
            let Some(next) = iter.peek() else { break };
            let gap = next.starting_track_position - start;
            if gap > MAX_BLOCK_GAP {
                let pieces = (gap / MAX_BLOCK_GAP).ceil() as usize;
                for k in 1..pieces {
                    padded.push(Block::new(start + gap * k as f64 / pieces as f64));
                    inserted += 1;
                }
            }
        }
        self.blocks = padded;
        inserted
    }

    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    pub fn as_slice(&self) -> &[Block] {
        &self.blocks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn positions(blocks: &Blocks) -> Vec<f64> {
        blocks.iter().map(|b| b.starting_track_position).collect()
    }

    #[test]
    fn find_block_is_idempotent_before_sort() {
        let mut blocks = Blocks::new();
        let a = blocks.find_block(100.0);
        let b = blocks.find_block(50.0);
        assert_eq!(blocks.find_block(100.0), a);
        assert_eq!(blocks.find_block(50.0), b);
        assert_ne!(a, b);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn sort_orders_by_position() {
        let mut blocks = Blocks::new();
        for p in [75.0, 0.0, 25.0, 50.0] {
            blocks.find_block(p);
        }
        blocks.sort();
        assert_eq!(positions(&blocks), vec![0.0, 25.0, 50.0, 75.0]);
    }

    #[test]
    fn find_block_after_sort_keeps_order() {
        let mut blocks = Blocks::new();
        blocks.find_block(50.0);
        blocks.find_block(0.0);
        blocks.sort();
        let i = blocks.find_block(25.0);
        assert_eq!(i, 1);
        assert_eq!(blocks.find_block(50.0), 2);
        assert_eq!(positions(&blocks), vec![0.0, 25.0, 50.0]);
    }

    #[test]
    fn padding_bounds_every_gap() {
        let mut blocks = Blocks::new();
        for p in [0.0, 100.0, 110.0, 187.0] {
            blocks.find_block(p);
        }
        blocks.get_mut(1).unwrap().turn = 0.01;
        blocks.sort();
        let inserted = blocks.create_missing_blocks();
        assert_eq!(inserted, 3 + 3);
        let p = positions(&blocks);
        for pair in p.windows(2) {
            assert!(pair[1] - pair[0] <= MAX_BLOCK_GAP, "{pair:?}");
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(p, vec![0.0, 25.0, 50.0, 75.0, 100.0, 110.0, 129.25, 148.5, 167.75, 187.0]);
        // Original content stays on its own block.
        let kept = blocks.iter().find(|b| b.starting_track_position == 100.0).unwrap();
        assert_eq!(kept.turn, 0.01);
    }

    #[test]
    fn padding_bound_holds_for_inexact_positions() {
        let mut blocks = Blocks::new();
        for p in [0.1, 100.1, 1000.3] {
            blocks.find_block(p);
        }
        blocks.create_missing_blocks();
        for pair in positions(&blocks).windows(2) {
            assert!(pair[1] - pair[0] <= MAX_BLOCK_GAP, "{pair:?}");
        }
    }

    #[test]
    fn padding_runs_once() {
        let mut blocks = Blocks::new();
        blocks.find_block(0.0);
        blocks.find_block(60.0);
        assert_eq!(blocks.create_missing_blocks(), 2);
        assert!(blocks.is_sorted());
        assert_eq!(blocks.create_missing_blocks(), 0);
        assert_eq!(blocks.len(), 4);
    }

    #[test]
    fn side_from_direction() {
        assert_eq!(Side::from_direction(-1), Some(Side::Left));
        assert!(Side::Both.has_left() && Side::Both.has_right());
        assert_eq!(Side::from_direction(2), None);
    }

    #[test]
    fn new_block_is_empty() {
        let mut block = Block::new(10.0);
        assert!(block.is_empty());
        block.markers.push(BlockMarker::Buffer);
        assert!(!block.is_empty());
    }
}
