use indexmap::IndexMap;
use serde::Serialize;

use crate::loader::{ObjectHandle, TextureHandle};

use super::objects::{Cycle, ObjectDictionary};

/// Which structure table an index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StructureKind {
    Rail,
    Ground,
    Pole,
    WallLeft,
    WallRight,
    DikeLeft,
    DikeRight,
    FormLeft,
    FormRight,
    FormCenterLeft,
    FormCenterRight,
    RoofLeft,
    RoofRight,
    RoofCenterLeft,
    RoofCenterRight,
    CrackLeft,
    CrackRight,
    FreeObject,
    Beacon,
    Weather,
}

impl StructureKind {
    pub fn label(self) -> &'static str {
        match self {
            StructureKind::Rail => "Rail",
            StructureKind::Ground => "Ground",
            StructureKind::Pole => "Pole",
            StructureKind::WallLeft => "WallL",
            StructureKind::WallRight => "WallR",
            StructureKind::DikeLeft => "DikeL",
            StructureKind::DikeRight => "DikeR",
            StructureKind::FormLeft => "FormL",
            StructureKind::FormRight => "FormR",
            StructureKind::FormCenterLeft => "FormCL",
            StructureKind::FormCenterRight => "FormCR",
            StructureKind::RoofLeft => "RoofL",
            StructureKind::RoofRight => "RoofR",
            StructureKind::RoofCenterLeft => "RoofCL",
            StructureKind::RoofCenterRight => "RoofCR",
            StructureKind::CrackLeft => "CrackL",
            StructureKind::CrackRight => "CrackR",
            StructureKind::FreeObject => "FreeObj",
            StructureKind::Beacon => "Beacon",
            StructureKind::Weather => "Weather",
        }
    }

    /// Objects the consumer deforms to fit between rails. These go through
    /// `load_static_object` so their vertices stay editable.
    pub fn is_deformable(self) -> bool {
        matches!(
            self,
            StructureKind::FormCenterLeft
                | StructureKind::FormCenterRight
                | StructureKind::RoofCenterLeft
                | StructureKind::RoofCenterRight
                | StructureKind::CrackLeft
                | StructureKind::CrackRight
        )
    }
}

/// All structure tables of a route.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Structure {
    pub rail: ObjectDictionary,
    pub ground: ObjectDictionary,
    pub pole: ObjectDictionary,
    pub wall_left: ObjectDictionary,
    pub wall_right: ObjectDictionary,
    pub dike_left: ObjectDictionary,
    pub dike_right: ObjectDictionary,
    pub form_left: ObjectDictionary,
    pub form_right: ObjectDictionary,
    pub form_center_left: ObjectDictionary,
    pub form_center_right: ObjectDictionary,
    pub roof_left: ObjectDictionary,
    pub roof_right: ObjectDictionary,
    pub roof_center_left: ObjectDictionary,
    pub roof_center_right: ObjectDictionary,
    pub crack_left: ObjectDictionary,
    pub crack_right: ObjectDictionary,
    pub free_object: ObjectDictionary,
    pub beacon: ObjectDictionary,
    pub weather: ObjectDictionary,
    /// Ground cycles.
    pub cycles: ObjectDictionary<Cycle>,
    pub rail_cycles: ObjectDictionary<Cycle>,
    pub light_definitions: ObjectDictionary<Vec<LightDefinition>>,
}

impl Structure {
    pub fn dictionary(&self, kind: StructureKind) -> &ObjectDictionary {
        match kind {
            StructureKind::Rail => &self.rail,
            StructureKind::Ground => &self.ground,
            StructureKind::Pole => &self.pole,
            StructureKind::WallLeft => &self.wall_left,
            StructureKind::WallRight => &self.wall_right,
            StructureKind::DikeLeft => &self.dike_left,
            StructureKind::DikeRight => &self.dike_right,
            StructureKind::FormLeft => &self.form_left,
            StructureKind::FormRight => &self.form_right,
            StructureKind::FormCenterLeft => &self.form_center_left,
            StructureKind::FormCenterRight => &self.form_center_right,
            StructureKind::RoofLeft => &self.roof_left,
            StructureKind::RoofRight => &self.roof_right,
            StructureKind::RoofCenterLeft => &self.roof_center_left,
            StructureKind::RoofCenterRight => &self.roof_center_right,
            StructureKind::CrackLeft => &self.crack_left,
            StructureKind::CrackRight => &self.crack_right,
            StructureKind::FreeObject => &self.free_object,
            StructureKind::Beacon => &self.beacon,
            StructureKind::Weather => &self.weather,
        }
    }

    pub fn dictionary_mut(&mut self, kind: StructureKind) -> &mut ObjectDictionary {
        match kind {
            StructureKind::Rail => &mut self.rail,
            StructureKind::Ground => &mut self.ground,
            StructureKind::Pole => &mut self.pole,
            StructureKind::WallLeft => &mut self.wall_left,
            StructureKind::WallRight => &mut self.wall_right,
            StructureKind::DikeLeft => &mut self.dike_left,
            StructureKind::DikeRight => &mut self.dike_right,
            StructureKind::FormLeft => &mut self.form_left,
            StructureKind::FormRight => &mut self.form_right,
            StructureKind::FormCenterLeft => &mut self.form_center_left,
            StructureKind::FormCenterRight => &mut self.form_center_right,
            StructureKind::RoofLeft => &mut self.roof_left,
            StructureKind::RoofRight => &mut self.roof_right,
            StructureKind::RoofCenterLeft => &mut self.roof_center_left,
            StructureKind::RoofCenterRight => &mut self.roof_center_right,
            StructureKind::CrackLeft => &mut self.crack_left,
            StructureKind::CrackRight => &mut self.crack_right,
            StructureKind::FreeObject => &mut self.free_object,
            StructureKind::Beacon => &mut self.beacon,
            StructureKind::Weather => &mut self.weather,
        }
    }
}

// ── Signals ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlendMode {
    Additive,
}

/// Falloff of a signal glow with viewing distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GlowAttenuation {
    /// Intensity divides by the fourth power of a normalised distance.
    DivisionExponent4,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalGlow {
    pub object: ObjectHandle,
    pub blend: BlendMode,
    pub attenuation: GlowAttenuation,
}

/// A custom signal declared with `Signal(i)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SignalDefinition {
    /// A pre-authored object that animates its own aspects.
    Animated { object: ObjectHandle },
    /// A static base object with an optional glow overlay.
    Textured {
        base: ObjectHandle,
        glow: Option<SignalGlow>,
    },
}

// ── Backgrounds ────────────────────────────────────────────────────

/// Default number of horizontal texture repetitions around the horizon.
pub const DEFAULT_BACKGROUND_REPETITIONS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransitionMode {
    /// Switch at the layer time.
    None,
    FadeIn,
    FadeOut,
}

/// One time-of-day layer of a dynamic background.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundLayer {
    /// Seconds since midnight.
    pub time: f64,
    pub mode: TransitionMode,
    pub texture: Option<TextureHandle>,
    pub repetitions: u32,
    /// Seconds.
    pub transition_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BackgroundSource {
    /// Declared only through `BackgroundX`/`BackgroundAspect` so far.
    Unset,
    Static { texture: Option<TextureHandle> },
    Dynamic { layers: Vec<BackgroundLayer> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Background {
    pub source: BackgroundSource,
    pub repetitions: u32,
    pub keep_aspect: bool,
}

impl Default for Background {
    fn default() -> Self {
        Self {
            source: BackgroundSource::Unset,
            repetitions: DEFAULT_BACKGROUND_REPETITIONS,
            keep_aspect: false,
        }
    }
}

/// Backgrounds by index, in declaration order.
pub type Backgrounds = IndexMap<i32, Background>;

// ── Lighting ───────────────────────────────────────────────────────

/// One time-of-day light state of a dynamic lighting set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightDefinition {
    /// Seconds since midnight.
    pub time: f64,
    pub ambient: [u8; 3],
    pub directional: [u8; 3],
    /// Unit vector pointing towards the light.
    pub direction: glam::DVec3,
    /// 0 = dark cab, 255 = fully lit.
    pub cab_lighting: u8,
}

/// Convert the `theta;phi` pair used by route files (degrees) to a unit vector.
pub fn light_direction(theta_degrees: f64, phi_degrees: f64) -> glam::DVec3 {
    let theta = theta_degrees.to_radians();
    let phi = phi_degrees.to_radians();
    glam::DVec3::new(theta.cos() * phi.sin(), -theta.sin(), theta.cos() * phi.cos())
}
