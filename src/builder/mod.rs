//! Turns the sorted blocks of a parsed route into track geometry, placed
//! objects and position-ordered events.
//!
//! Pass 1 instantiates scenery. Pass 2 builds one [`TrackElement`] per block
//! and emits events, then a final sweep closes stations and the track.

pub mod walker;

use std::collections::BTreeMap;

use glam::DVec3;
use serde::Serialize;

use crate::loader::{ObjectHandle, SoundHandle, TextureHandle};
use crate::model::{
    BeaconPlacement, Block, BlockMarker, FogChange, ObjectDictionary, ObjectPlacement, ObjectVisibility,
    RailAction, RepeaterChange, RepeaterKind, RouteData, Side, SignalPlacement, SoundKind, StructureKind,
};

use walker::{walk, Frame};

/// Distance past a station's forward tolerance where its end event fires, metres.
pub const STATION_END_CLEARANCE: f64 = 25.0;

// ── Output types ───────────────────────────────────────────────────

/// Transform of the track at the start of one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackElement {
    pub starting_track_position: f64,
    pub world_position: DVec3,
    pub direction: DVec3,
    pub up: DVec3,
    pub side: DVec3,
    pub length: f64,
    pub pitch: f64,
    pub curve_radius: f64,
    pub cant: f64,
    pub height: f64,
    pub accuracy: f64,
    pub adhesion: f64,
}

impl TrackElement {
    fn from_frame(block: &Block, frame: &Frame) -> Self {
        Self {
            starting_track_position: block.starting_track_position,
            world_position: frame.position,
            direction: frame.direction,
            up: frame.up,
            side: frame.side,
            length: frame.length,
            pitch: frame.pitch,
            curve_radius: frame.curve_radius,
            cant: frame.cant,
            height: frame.height,
            accuracy: frame.accuracy,
            adhesion: frame.adhesion,
        }
    }
}

/// A structure instantiated in world space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedObject {
    pub kind: StructureKind,
    /// Base structure index after cycle resolution.
    pub index: usize,
    pub object: ObjectHandle,
    pub element: usize,
    pub rail: usize,
    pub position: DVec3,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EventKind {
    /// m/s, infinite when the limit is lifted.
    SpeedLimitChange { limit: f64 },
    Sound {
        sound: Option<SoundHandle>,
        kind: SoundKind,
        x: f64,
        y: f64,
        speed: f64,
    },
    StationStart { station: usize },
    StationEnd { station: usize },
    SectionChange { aspects: Vec<i32>, simplified: bool },
    SignalPlaced(SignalPlacement),
    BackgroundChange { index: i32 },
    /// With interpolated fog, `towards` is the next change and the track
    /// position where it is reached.
    FogChange {
        fog: FogChange,
        towards: Option<(f64, FogChange)>,
    },
    BrightnessChange { value: f64 },
    LightingChange { index: usize },
    BeaconPlaced(BeaconPlacement),
    Marker {
        texture: Option<TextureHandle>,
        distance: f64,
    },
    PointOfInterest {
        rail: usize,
        x: f64,
        y: f64,
        text: String,
    },
    Buffer,
    TrackEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEvent {
    pub element: usize,
    pub track_position: f64,
    pub kind: EventKind,
}

/// The world handed to rendering and simulation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct World {
    /// How the renderer disposes of objects behind the camera.
    pub object_visibility: ObjectVisibility,
    pub elements: Vec<TrackElement>,
    pub objects: Vec<PlacedObject>,
    pub events: Vec<TrackEvent>,
}

/// Build the world from a fully parsed route. Blocks must be sorted and
/// padded, which the interpreter guarantees once parsing finished.
pub fn build_world(data: &RouteData) -> World {
    let objects = place_objects(data);
    let (elements, events) = build_track(data);
    log::info!(
        "Built {} track elements, {} objects, {} events",
        elements.len(),
        objects.len(),
        events.len()
    );
    World {
        object_visibility: data.options.object_visibility,
        elements,
        objects,
        events,
    }
}

// ── Pass 1: objects ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct RailState {
    x: f64,
    y: f64,
    structure: usize,
}

#[derive(Debug, Clone, Copy)]
struct Repeater {
    side: Side,
    structure: usize,
    interval: usize,
    started: usize,
}

fn place_objects(data: &RouteData) -> Vec<PlacedObject> {
    let structure = &data.structure;
    let mut objects = Vec::new();
    let mut rails: BTreeMap<usize, RailState> = BTreeMap::new();
    rails.insert(
        0,
        RailState {
            x: 0.0,
            y: 0.0,
            structure: 0,
        },
    );
    let mut ground = 0;
    let mut repeaters: BTreeMap<(usize, RepeaterKind), Repeater> = BTreeMap::new();

    walk(data, |ordinal, block, frame| {
        for change in &block.rails {
            match change.action {
                RailAction::End => {
                    rails.remove(&change.rail);
                }
                RailAction::Start | RailAction::Update => {
                    let state = rails.entry(change.rail).or_insert(RailState {
                        x: 0.0,
                        y: 0.0,
                        structure: 0,
                    });
                    if let Some(x) = change.x {
                        state.x = x;
                    }
                    if let Some(y) = change.y {
                        state.y = y;
                    }
                    if let Some(s) = change.structure {
                        state.structure = s;
                    }
                }
            }
        }
        for &(rail, s) in &block.rail_types {
            if let Some(state) = rails.get_mut(&rail) {
                state.structure = s;
            }
        }
        if let Some(g) = block.ground {
            ground = g;
        }
        for change in &block.repeaters {
            match *change {
                RepeaterChange::Start {
                    kind,
                    rail,
                    side,
                    structure,
                    interval,
                } => {
                    repeaters.insert(
                        (rail, kind),
                        Repeater {
                            side,
                            structure,
                            interval: interval.max(1),
                            started: ordinal,
                        },
                    );
                }
                RepeaterChange::End { kind, rail } => {
                    repeaters.remove(&(rail, kind));
                }
            }
        }

        let mut place = |kind: StructureKind, index: usize, rail: usize, offset: &ObjectPlacement| {
            let Some(object) = structure.dictionary(kind).get(index) else {
                return;
            };
            let (rx, ry) = rails.get(&rail).map_or((0.0, 0.0), |r| (r.x, r.y));
            objects.push(PlacedObject {
                kind,
                index,
                object: object.clone(),
                element: ordinal,
                rail,
                position: frame.position
                    + frame.side * (rx + offset.x)
                    + frame.up * (ry + offset.y)
                    + frame.direction * offset.z,
                yaw: offset.yaw,
                pitch: offset.pitch,
                roll: offset.roll,
            });
        };
        let origin = ObjectPlacement {
            kind: StructureKind::Rail,
            index: 0,
            rail: 0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
        };

        place(StructureKind::Ground, resolve_cycle(&structure.cycles, ground, ordinal), 0, &origin);
        let active: Vec<(usize, usize)> = rails.iter().map(|(&rail, state)| (rail, state.structure)).collect();
        for (rail, s) in active {
            place(StructureKind::Rail, resolve_cycle(&structure.rail_cycles, s, ordinal), rail, &origin);
        }
        let running: Vec<((usize, RepeaterKind), Repeater)> = repeaters.iter().map(|(k, r)| (*k, *r)).collect();
        for ((rail, kind), repeater) in running {
            let (left, right) = match kind {
                RepeaterKind::Wall => (StructureKind::WallLeft, StructureKind::WallRight),
                RepeaterKind::Dike => (StructureKind::DikeLeft, StructureKind::DikeRight),
                RepeaterKind::Pole => {
                    if (ordinal - repeater.started) % repeater.interval == 0 {
                        place(StructureKind::Pole, repeater.structure, rail, &origin);
                    }
                    continue;
                }
            };
            if repeater.side.has_left() {
                place(left, repeater.structure, rail, &origin);
            }
            if repeater.side.has_right() {
                place(right, repeater.structure, rail, &origin);
            }
        }
        for object in &block.objects {
            place(object.kind, object.index, object.rail, object);
        }
    });
    objects
}

/// Map a structure index through its cycle table, if it names a cycle.
fn resolve_cycle(cycles: &ObjectDictionary<crate::model::Cycle>, index: usize, repeat: usize) -> usize {
    cycles.get(index).map_or(index, |cycle| cycle.resolve(repeat))
}

// ── Pass 2: track and events ───────────────────────────────────────

fn build_track(data: &RouteData) -> (Vec<TrackElement>, Vec<TrackEvent>) {
    let mut elements = Vec::with_capacity(data.blocks.len());
    let mut events = Vec::new();
    let mut one_shots = Vec::new();
    let mut limit = f64::INFINITY;
    let fogs = fog_changes(data);

    walk(data, |ordinal, block, frame| {
        elements.push(TrackElement::from_frame(block, frame));
        let position = block.starting_track_position;
        let mut emit = |kind: EventKind| {
            events.push(TrackEvent {
                element: ordinal,
                track_position: position,
                kind,
            });
        };

        if let Some(new_limit) = block.speed_limit {
            if new_limit != limit {
                limit = new_limit;
                emit(EventKind::SpeedLimitChange { limit });
            }
        }
        for sound in &block.sounds {
            let kind = EventKind::Sound {
                sound: sound.sound.clone(),
                kind: sound.kind,
                x: sound.x,
                y: sound.y,
                speed: sound.speed,
            };
            match sound.kind {
                SoundKind::Looped => emit(kind),
                SoundKind::OneShot => one_shots.push((sound.track_position, kind)),
            }
        }
        if let Some(stop) = &block.stop_marker {
            emit(EventKind::StationStart { station: stop.station });
        }
        for marker in &block.markers {
            let kind = match marker {
                BlockMarker::Station(_) => continue,
                BlockMarker::Section { aspects, simplified } => EventKind::SectionChange {
                    aspects: aspects.clone(),
                    simplified: *simplified,
                },
                BlockMarker::Signal(s) => EventKind::SignalPlaced(*s),
                BlockMarker::Beacon(b) => EventKind::BeaconPlaced(*b),
                BlockMarker::Background(index) => EventKind::BackgroundChange { index: *index },
                BlockMarker::Fog(fog) => EventKind::FogChange {
                    fog: *fog,
                    towards: fog.interpolated.then(|| next_fog(&fogs, position)).flatten(),
                },
                BlockMarker::Brightness(value) => EventKind::BrightnessChange { value: *value },
                BlockMarker::Lighting(index) => EventKind::LightingChange { index: *index },
                BlockMarker::Marker { texture, distance } => EventKind::Marker {
                    texture: texture.clone(),
                    distance: *distance,
                },
                BlockMarker::PointOfInterest { rail, x, y, text } => EventKind::PointOfInterest {
                    rail: *rail,
                    x: *x,
                    y: *y,
                    text: text.clone(),
                },
                BlockMarker::Buffer => EventKind::Buffer,
            };
            emit(kind);
        }
    });

    // One-shot sounds fire in the element that contains their trigger.
    for (trigger, kind) in one_shots {
        if let Some(element) = element_containing(&elements, trigger) {
            events.push(TrackEvent {
                element,
                track_position: trigger,
                kind,
            });
        }
    }

    for (index, station) in data.stations.iter().enumerate() {
        let stop = station.stop_position.unwrap_or(station.track_position);
        let threshold = stop + station.forward_tolerance + STATION_END_CLEARANCE;
        let element = elements
            .iter()
            .position(|e| e.starting_track_position > threshold)
            .or_else(|| elements.len().checked_sub(1));
        if let Some(element) = element {
            events.push(TrackEvent {
                element,
                track_position: elements
                    .get(element)
                    .map_or(threshold, |e| e.starting_track_position),
                kind: EventKind::StationEnd { station: index },
            });
        }
    }

    if let Some(last) = elements.last() {
        events.push(TrackEvent {
            element: elements.len() - 1,
            track_position: last.starting_track_position,
            kind: EventKind::TrackEnd,
        });
    }

    events.sort_by_key(|e| e.element);
    (elements, events)
}

/// Every fog change with its track position, in track order.
fn fog_changes(data: &RouteData) -> Vec<(f64, FogChange)> {
    data.blocks
        .iter()
        .flat_map(|block| {
            block.markers.iter().filter_map(move |marker| match marker {
                BlockMarker::Fog(fog) => Some((block.starting_track_position, *fog)),
                _ => None,
            })
        })
        .collect()
}

fn next_fog(fogs: &[(f64, FogChange)], position: f64) -> Option<(f64, FogChange)> {
    let after = fogs.partition_point(|(p, _)| *p <= position);
    fogs.get(after).copied()
}

fn element_containing(elements: &[TrackElement], position: f64) -> Option<usize> {
    let after = elements.partition_point(|e| e.starting_track_position <= position);
    after.checked_sub(1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::loader::ObjectHandle;
    use crate::model::{Cycle, RepeaterChange, Station, StopMarker};

    fn handle(id: u32) -> ObjectHandle {
        ObjectHandle {
            id,
            path: PathBuf::from(format!("/o/{id}.csv")),
            is_static: false,
        }
    }

    fn route(positions: &[f64]) -> RouteData {
        let mut data = RouteData::new();
        for &p in positions {
            data.blocks.find_block(p);
        }
        data.blocks.sort();
        data
    }

    #[test]
    fn straight_blocks_lie_on_a_line() {
        let data = route(&[0.0, 25.0, 50.0]);
        let world = build_world(&data);
        assert_eq!(world.elements.len(), 3);
        for (i, e) in world.elements.iter().enumerate() {
            assert!((e.world_position - DVec3::new(0.0, 0.0, 25.0 * i as f64)).length() < 1e-12);
            assert_eq!(e.direction, DVec3::Z);
        }
        assert!(matches!(world.events.last().unwrap().kind, EventKind::TrackEnd));
    }

    #[test]
    fn cycles_resolve_with_block_ordinal() {
        let mut data = route(&[0.0, 25.0, 50.0]);
        data.structure.ground.add(1, Some(handle(1)), None).unwrap();
        data.structure.ground.add(2, Some(handle(2)), None).unwrap();
        data.structure.cycles.add(0, Cycle::new(vec![1, 2]), None).unwrap();
        let world = build_world(&data);
        let grounds: Vec<usize> = world
            .objects
            .iter()
            .filter(|o| o.kind == StructureKind::Ground)
            .map(|o| o.index)
            .collect();
        assert_eq!(grounds, vec![1, 2, 1]);
    }

    #[test]
    fn rails_carry_forward_until_ended() {
        let mut data = route(&[0.0, 25.0, 50.0]);
        data.structure.rail.add(0, Some(handle(10)), None).unwrap();
        data.blocks.get_mut(0).unwrap().rails.push(crate::model::RailChange {
            rail: 1,
            action: RailAction::Start,
            x: Some(4.0),
            y: None,
            structure: None,
        });
        data.blocks.get_mut(2).unwrap().rails.push(crate::model::RailChange {
            rail: 1,
            action: RailAction::End,
            x: None,
            y: None,
            structure: None,
        });
        let world = build_world(&data);
        let rail1: Vec<&PlacedObject> = world.objects.iter().filter(|o| o.rail == 1).collect();
        assert_eq!(rail1.len(), 2);
        assert!((rail1[1].position - DVec3::new(4.0, 0.0, 25.0)).length() < 1e-12);
    }

    #[test]
    fn poles_follow_their_interval() {
        let mut data = route(&[0.0, 25.0, 50.0, 75.0]);
        data.structure.pole.insert_default(0, handle(20));
        data.blocks.get_mut(0).unwrap().repeaters.push(RepeaterChange::Start {
            kind: RepeaterKind::Pole,
            rail: 0,
            side: Side::Right,
            structure: 0,
            interval: 2,
        });
        let world = build_world(&data);
        let elements: Vec<usize> = world
            .objects
            .iter()
            .filter(|o| o.kind == StructureKind::Pole)
            .map(|o| o.element)
            .collect();
        assert_eq!(elements, vec![0, 2]);
    }

    #[test]
    fn speed_limit_events_only_on_change() {
        let mut data = route(&[0.0, 25.0, 50.0]);
        data.blocks.get_mut(0).unwrap().speed_limit = Some(20.0);
        data.blocks.get_mut(1).unwrap().speed_limit = Some(20.0);
        data.blocks.get_mut(2).unwrap().speed_limit = Some(f64::INFINITY);
        let world = build_world(&data);
        let limits: Vec<f64> = world
            .events
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::SpeedLimitChange { limit } => Some(limit),
                _ => None,
            })
            .collect();
        assert_eq!(limits, vec![20.0, f64::INFINITY]);
    }

    #[test]
    fn station_end_after_clearance() {
        let positions: Vec<f64> = (0..8).map(|i| f64::from(i) * 25.0).collect();
        let mut data = route(&positions);
        let mut station = Station::new("A", 25.0);
        station.stop_position = Some(50.0);
        station.forward_tolerance = 5.0;
        data.stations.push(station);
        data.blocks.get_mut(2).unwrap().stop_marker = Some(StopMarker {
            station: 0,
            start_offset: -5.0,
            end_offset: 5.0,
            cars: 0,
            direction: 1,
        });
        let world = build_world(&data);
        let start = world
            .events
            .iter()
            .find(|e| matches!(e.kind, EventKind::StationStart { station: 0 }))
            .unwrap();
        assert_eq!(start.element, 2);
        let end = world
            .events
            .iter()
            .find(|e| matches!(e.kind, EventKind::StationEnd { station: 0 }))
            .unwrap();
        // 50 + 5 + 25 = 80, first element beyond is at 100.
        assert_eq!(end.element, 4);
    }

    #[test]
    fn one_shot_sound_is_relocated() {
        let mut data = route(&[0.0, 25.0, 50.0]);
        data.blocks.get_mut(0).unwrap().sounds.push(crate::model::SoundPlacement {
            sound: None,
            kind: SoundKind::OneShot,
            track_position: 30.0,
            x: 0.0,
            y: 0.0,
            speed: 0.0,
        });
        let world = build_world(&data);
        let sound = world
            .events
            .iter()
            .find(|e| matches!(e.kind, EventKind::Sound { .. }))
            .unwrap();
        assert_eq!(sound.element, 1);
        assert_eq!(sound.track_position, 30.0);
    }

    fn fog(interpolated: bool) -> FogChange {
        FogChange {
            start: 0.0,
            end: 500.0,
            color: [128, 128, 128],
            interpolated,
        }
    }

    fn fog_targets(world: &World) -> Vec<Option<f64>> {
        world
            .events
            .iter()
            .filter_map(|e| match &e.kind {
                EventKind::FogChange { towards, .. } => Some(towards.map(|(p, _)| p)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn interpolated_fog_points_at_the_next_change() {
        let mut data = route(&[0.0, 25.0, 50.0]);
        data.blocks.get_mut(0).unwrap().markers.push(BlockMarker::Fog(fog(true)));
        data.blocks.get_mut(2).unwrap().markers.push(BlockMarker::Fog(fog(true)));
        let world = build_world(&data);
        assert_eq!(fog_targets(&world), vec![Some(50.0), None]);
    }

    #[test]
    fn block_based_fog_switches_in_place() {
        let mut data = route(&[0.0, 25.0, 50.0]);
        data.blocks.get_mut(0).unwrap().markers.push(BlockMarker::Fog(fog(false)));
        data.blocks.get_mut(2).unwrap().markers.push(BlockMarker::Fog(fog(false)));
        let world = build_world(&data);
        assert_eq!(fog_targets(&world), vec![None, None]);
    }

    #[test]
    fn world_carries_object_visibility() {
        let mut data = route(&[0.0]);
        assert_eq!(build_world(&data).object_visibility, ObjectVisibility::Legacy);
        data.options.object_visibility = ObjectVisibility::TrackBased;
        assert_eq!(build_world(&data).object_visibility, ObjectVisibility::TrackBased);
    }
}
