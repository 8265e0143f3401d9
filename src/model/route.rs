use std::path::PathBuf;

use serde::Serialize;

use crate::loader::{SoundHandle, TextureHandle};

use super::block::Blocks;
use super::objects::ObjectDictionary;
use super::structure::{Backgrounds, SignalDefinition, Structure};

/// km/h → m/s.
pub const KMH_TO_MS: f64 = 1.0 / 3.6;

// ── Options ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ObjectVisibility {
    /// Objects disappear once their block is behind the camera.
    #[default]
    Legacy,
    /// Objects stay until the track position passes their far end.
    TrackBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SectionBehavior {
    #[default]
    Default,
    /// Signals show the most restrictive aspect that is still valid.
    Simplified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CantBehavior {
    /// Cant is always applied towards the inside of the curve.
    #[default]
    Unsigned,
    Signed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum FogBehavior {
    /// Fog changes take effect per block.
    #[default]
    BlockBased,
    /// Fog is interpolated between consecutive `Track.Fog` commands.
    Interpolated,
}

/// Parse-scoped switches from the Options namespace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOptions {
    /// Factors for colon-compound lengths, first one for plain values.
    pub unit_of_length: Vec<f64>,
    /// Multiplier applied to speeds before they are read as km/h.
    pub unit_of_speed: f64,
    pub object_visibility: ObjectVisibility,
    pub section_behavior: SectionBehavior,
    pub cant_behavior: CantBehavior,
    pub fog_behavior: FogBehavior,
    pub enable_hacks: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            unit_of_length: vec![1.0],
            unit_of_speed: 1.0,
            object_visibility: ObjectVisibility::default(),
            section_behavior: SectionBehavior::default(),
            cant_behavior: CantBehavior::default(),
            fog_behavior: FogBehavior::default(),
            enable_hacks: false,
        }
    }
}

// ── Route information ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySpeed {
    pub unit: String,
    /// Conversion factor from km/h.
    pub factor: f64,
}

/// Everything the Route namespace sets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteInfo {
    pub comment: String,
    pub image: Option<PathBuf>,
    pub timetable: String,
    /// Safety system state at the start: -1 on service brake, 0 ATS, 1 ATC.
    pub change_mode: i32,
    /// Metres.
    pub gauge: f64,
    /// m/s per signal aspect.
    pub signal_speeds: Vec<f64>,
    /// m/s².
    pub gravity: f64,
    /// Metres above sea level.
    pub elevation: f64,
    /// Kelvin.
    pub temperature: f64,
    /// kPa.
    pub pressure: f64,
    pub display_speed: Option<DisplaySpeed>,
    pub loading_screen: Option<TextureHandle>,
    /// Seconds since midnight.
    pub start_time: Option<f64>,
    pub ambient_light: [u8; 3],
    pub directional_light: [u8; 3],
    pub light_direction: glam::DVec3,
}

impl Default for RouteInfo {
    fn default() -> Self {
        Self {
            comment: String::new(),
            image: None,
            timetable: String::new(),
            change_mode: 0,
            gauge: 1.435,
            signal_speeds: [0.0, 25.0, 55.0, 75.0, f64::INFINITY, f64::INFINITY]
                .iter()
                .map(|kmh| kmh * KMH_TO_MS)
                .collect(),
            gravity: 9.80665,
            elevation: 0.0,
            temperature: 293.15,
            pressure: 101.325,
            display_speed: None,
            loading_screen: None,
            start_time: None,
            ambient_light: [160, 160, 160],
            directional_light: [160, 160, 160],
            light_direction: super::structure::light_direction(60.0, -26.565_051_177_078),
        }
    }
}

// ── Train ──────────────────────────────────────────────────────────

/// Everything the Train namespace sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrainInfo {
    /// Seconds between preceding AI trains.
    pub intervals: Vec<f64>,
    /// m/s; None = use the route's limits.
    pub velocity: Option<f64>,
    pub folder: Option<PathBuf>,
    /// Sound index per rail type.
    pub run_sounds: Vec<i32>,
    pub flange_sounds: Vec<i32>,
    pub day_timetables: Vec<Option<TextureHandle>>,
    pub night_timetables: Vec<Option<TextureHandle>>,
}

// ── Stations ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StopMode {
    /// The train stops here.
    Stop,
    /// The train passes; the pass alarm may ring.
    Pass,
    /// Only stop when the player's train is the terminal service.
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub name: String,
    pub track_position: f64,
    /// Seconds since midnight.
    pub arrival: Option<f64>,
    pub departure: Option<f64>,
    pub stop_mode: StopMode,
    pub pass_alarm: bool,
    /// `-1` left, `0` none, `1` right, `2` both.
    pub doors: i32,
    pub forced_red_signal: bool,
    pub arrival_sound: Option<SoundHandle>,
    pub departure_sound: Option<SoundHandle>,
    /// Seconds.
    pub stop_duration: f64,
    /// Percent.
    pub passenger_ratio: f64,
    pub timetable_index: Option<usize>,
    /// Absolute position of the first stop marker for this station.
    pub stop_position: Option<f64>,
    pub forward_tolerance: f64,
}

impl Station {
    pub fn new(name: impl Into<String>, track_position: f64) -> Self {
        Self {
            name: name.into(),
            track_position,
            arrival: None,
            departure: None,
            stop_mode: StopMode::Stop,
            pass_alarm: false,
            doors: 0,
            forced_red_signal: false,
            arrival_sound: None,
            departure_sound: None,
            stop_duration: 15.0,
            passenger_ratio: 100.0,
            timetable_index: None,
            stop_position: None,
            forward_tolerance: 5.0,
        }
    }
}

// ── RouteData ──────────────────────────────────────────────────────

/// The parse-time accumulator. Built once by the interpreter and then only read.
#[derive(Debug, Clone, Serialize)]
pub struct RouteData {
    /// Spacing of repeated structures, metres.
    pub block_interval: f64,
    pub options: RouteOptions,
    pub route: RouteInfo,
    pub train: TrainInfo,
    pub structure: Structure,
    pub signals: ObjectDictionary<SignalDefinition>,
    pub backgrounds: Backgrounds,
    pub stations: Vec<Station>,
    pub blocks: Blocks,
}

impl Default for RouteData {
    fn default() -> Self {
        Self {
            block_interval: 25.0,
            options: RouteOptions::default(),
            route: RouteInfo::default(),
            train: TrainInfo::default(),
            structure: Structure::default(),
            signals: ObjectDictionary::new(),
            backgrounds: Backgrounds::new(),
            stations: Vec::new(),
            blocks: Blocks::new(),
        }
    }
}

impl RouteData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a raw speed argument to m/s.
    pub fn speed(&self, raw: f64) -> f64 {
        raw * self.options.unit_of_speed * KMH_TO_MS
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let data = RouteData::new();
        assert_eq!(data.block_interval, 25.0);
        assert_eq!(data.route.gauge, 1.435);
        assert_eq!(data.options.unit_of_length, vec![1.0]);
        assert_eq!(data.route.signal_speeds.len(), 6);
        assert!(data.route.signal_speeds.last().is_some_and(|s| s.is_infinite()));
        assert!(data.blocks.is_empty());
    }

    #[test]
    fn speed_uses_unit() {
        let mut data = RouteData::new();
        assert!((data.speed(36.0) - 10.0).abs() < 1e-12);
        data.options.unit_of_speed = 1.609_344;
        assert!((data.speed(10.0) - 16.093_44 / 3.6).abs() < 1e-12);
    }
}
