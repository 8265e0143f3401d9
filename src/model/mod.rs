pub mod block;
pub mod objects;
pub mod route;
pub mod structure;

// Re-export commonly used types at the model level.
pub use block::{
    BeaconPlacement, Block, BlockMarker, Blocks, CurveChange, FogChange, ObjectPlacement,
    RailAction, RailChange, RepeaterChange, RepeaterKind, Side, SignalKind, SignalPlacement,
    SoundKind, SoundPlacement, StopMarker, MAX_BLOCK_GAP,
};
pub use objects::{AddOutcome, Cycle, ObjectDictionary, SlotError, POLE_GUARD};
pub use route::{
    CantBehavior, DisplaySpeed, FogBehavior, ObjectVisibility, RouteData, RouteInfo,
    RouteOptions, SectionBehavior, Station, StopMode, TrainInfo, KMH_TO_MS,
};
pub use structure::{
    Background, BackgroundLayer, BackgroundSource, Backgrounds, BlendMode, GlowAttenuation,
    LightDefinition, SignalDefinition, SignalGlow, Structure, StructureKind, TransitionMode,
    DEFAULT_BACKGROUND_REPETITIONS,
};
