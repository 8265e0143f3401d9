pub mod execute;
pub mod handlers;
pub mod validation;

use serde::Serialize;

// ── define_namespace! macro ─────────────────────────────────────

/// Single source of truth for one namespace's commands. Generates:
/// 1. the command enum
/// 2. `from_name()`: case-insensitive lookup over every spelling
/// 3. `name()`: the canonical (first) spelling
/// 4. `description()`
/// 5. `all()`
macro_rules! define_namespace {
    (
        $(#[$meta:meta])*
        $enum_name:ident in $ns:literal {
            $(
                $variant:ident [ $($alias:literal),+ ] : $desc:literal ;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum $enum_name {
            $( $variant, )*
        }

        impl $enum_name {
            pub const NAMESPACE: &'static str = $ns;

            pub fn from_name(name: &str) -> Option<Self> {
                $(
                    if [$($alias),+].iter().any(|a| a.eq_ignore_ascii_case(name)) {
                        return Some(Self::$variant);
                    }
                )*
                None
            }

            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => define_namespace!(@first $($alias),+), )*
                }
            }

            pub fn description(self) -> &'static str {
                match self {
                    $( Self::$variant => $desc, )*
                }
            }

            pub fn all() -> &'static [Self] {
                &[ $( Self::$variant, )* ]
            }
        }
    };

    (@first $first:literal $(, $rest:literal)*) => { $first };
}

// ── Namespaces ──────────────────────────────────────────────────

define_namespace! {
    /// Parse-scoped switches.
    OptionsCommand in "Options" {
        UnitOfLength ["UnitOfLength"] : "Factors for lengths, one per colon-separated part";
        UnitOfSpeed ["UnitOfSpeed"] : "Factor applied to speeds before reading them as km/h";
        BlockLength ["BlockLength"] : "Spacing of repeated structures";
        ObjectVisibility ["ObjectVisibility"] : "0 legacy, 1 track-based object disposal";
        SectionBehavior ["SectionBehavior"] : "0 default, 1 simplified signal sections";
        CantBehavior ["CantBehavior"] : "0 unsigned, 1 signed cant";
        FogBehavior ["FogBehavior"] : "0 block-based, 1 interpolated fog";
        EnableBveTsHacks ["EnableBveTsHacks"] : "Enable compatibility fixes for legacy routes";
    }
}

define_namespace! {
    /// Route-wide information.
    RouteCommand in "Route" {
        Comment ["Comment"] : "Route description text";
        Image ["Image"] : "Preview image";
        Timetable ["Timetable"] : "Text shown on the default timetable";
        Change ["Change"] : "Safety system state at the start";
        Gauge ["Gauge"] : "Track gauge in millimetres";
        Signal ["Signal"] : "Speed for a signal aspect";
        RunInterval ["RunInterval"] : "Intervals of preceding trains";
        AccelerationDueToGravity ["AccelerationDueToGravity"] : "Gravity in m/s²";
        Elevation ["Elevation"] : "Height above sea level";
        Temperature ["Temperature"] : "Air temperature in °C";
        Pressure ["Pressure"] : "Air pressure in kPa";
        DisplaySpeed ["DisplaySpeed"] : "Unit name and factor for speed displays";
        LoadingScreen ["LoadingScreen"] : "Image shown while loading";
        StartTime ["StartTime"] : "Time of day when the simulation starts";
        AmbientLight ["AmbientLight"] : "Ambient light colour";
        DirectionalLight ["DirectionalLight"] : "Directional light colour";
        LightDirection ["LightDirection"] : "Directional light angles theta;phi";
        DynamicLight ["DynamicLight"] : "XML file with time-of-day lighting";
    }
}

define_namespace! {
    /// Object declarations.
    StructureCommand in "Structure" {
        Rail ["Rail"] : "Rail object";
        Ground ["Ground"] : "Ground object";
        Pole ["Pole"] : "Pole object";
        WallLeft ["WallL"] : "Left wall object";
        WallRight ["WallR"] : "Right wall object";
        DikeLeft ["DikeL"] : "Left dike object";
        DikeRight ["DikeR"] : "Right dike object";
        FormLeft ["FormL"] : "Left platform edge";
        FormRight ["FormR"] : "Right platform edge";
        FormCenterLeft ["FormCL"] : "Left platform body";
        FormCenterRight ["FormCR"] : "Right platform body";
        RoofLeft ["RoofL"] : "Left roof edge";
        RoofRight ["RoofR"] : "Right roof edge";
        RoofCenterLeft ["RoofCL"] : "Left roof body";
        RoofCenterRight ["RoofCR"] : "Right roof body";
        CrackLeft ["CrackL"] : "Left crack filler";
        CrackRight ["CrackR"] : "Right crack filler";
        FreeObject ["FreeObj"] : "Free-standing object";
        Beacon ["Beacon"] : "Beacon object";
        Weather ["Weather"] : "Weather object";
        Background ["Background", "Back"] : "Background texture or dynamic background XML";
        BackgroundX ["BackgroundX", "BackX"] : "Background repetitions";
        BackgroundAspect ["BackgroundAspect", "BackAspect"] : "Keep background aspect ratio";
    }
}

define_namespace! {
    /// Custom signal declarations.
    SignalCommand in "Signal" {
        Load ["Load", "Signal"] : "Animated signal object, or base and glow objects";
    }
}

define_namespace! {
    /// Preceding trains and train-related resources.
    TrainCommand in "Train" {
        Interval ["Interval", "Intervals"] : "Intervals of preceding trains";
        Velocity ["Velocity"] : "Maximum speed of preceding trains";
        Folder ["Folder", "File"] : "Default train folder";
        Run ["Run", "Rail"] : "Run sound per rail type";
        Flange ["Flange"] : "Flange sound per rail type";
        Timetable ["Timetable"] : "Day or night timetable texture";
        Gauge ["Gauge"] : "Track gauge in millimetres";
    }
}

define_namespace! {
    /// Round-robin structure lists.
    CycleCommand in "Cycle" {
        Ground ["Ground"] : "Ground cycle";
        Rail ["Rail"] : "Rail cycle";
    }
}

define_namespace! {
    /// Commands placed at the current track position.
    TrackCommand in "Track" {
        RailStart ["RailStart"] : "Start a secondary rail";
        Rail ["Rail"] : "Move or start a secondary rail";
        RailType ["RailType"] : "Change a rail's structure";
        RailEnd ["RailEnd"] : "End a secondary rail";
        Pitch ["Pitch"] : "Gradient in per mille";
        Curve ["Curve"] : "Curve radius and cant";
        Turn ["Turn"] : "Instant horizontal turn";
        Height ["Height"] : "Rail height above ground";
        Accuracy ["Accuracy"] : "Track irregularity";
        Adhesion ["Adhesion"] : "Rail adhesion";
        FreeObject ["FreeObj"] : "Place a free object";
        Wall ["Wall"] : "Start a wall";
        WallEnd ["WallEnd"] : "End a wall";
        Dike ["Dike"] : "Start a dike";
        DikeEnd ["DikeEnd"] : "End a dike";
        Pole ["Pole"] : "Start poles";
        PoleEnd ["PoleEnd"] : "End poles";
        Crack ["Crack"] : "Fill between two rails";
        Ground ["Ground"] : "Change the ground";
        Form ["Form"] : "Place a platform";
        Station ["Sta"] : "Start a station";
        Stop ["Stop"] : "Stop marker for the last station";
        Limit ["Limit"] : "Speed limit";
        Section ["Section"] : "Start a signalling section";
        Signal ["Signal", "Sig"] : "Built-in signal";
        SignalCustom ["SigF"] : "Custom signal";
        Beacon ["Beacon"] : "Transponder";
        Background ["Back", "Background"] : "Switch background";
        Fog ["Fog"] : "Fog range and colour";
        Brightness ["Brightness"] : "Brightness level";
        Lighting ["Lighting"] : "Switch dynamic lighting set";
        Announce ["Announce"] : "One-shot sound";
        Doppler ["Doppler"] : "Looped positional sound";
        Marker ["Marker"] : "On-screen marker image";
        PointOfInterest ["PointOfInterest", "POI"] : "Camera point of interest";
        Buffer ["Buffer"] : "Buffer stop";
    }
}

// ── Resolution ──────────────────────────────────────────────────

/// A command resolved to its namespace's typed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Command {
    Options(OptionsCommand),
    Route(RouteCommand),
    Structure(StructureCommand),
    Signal(SignalCommand),
    Train(TrainCommand),
    Cycle(CycleCommand),
    Track(TrackCommand),
}

impl Command {
    /// Map a namespace/command pair (any case, any alias) to its tag.
    pub fn resolve(namespace: &str, command: &str) -> Option<Command> {
        let ns = namespace.to_ascii_lowercase();
        match ns.as_str() {
            "options" => OptionsCommand::from_name(command).map(Command::Options),
            "route" => RouteCommand::from_name(command).map(Command::Route),
            "structure" | "object" => StructureCommand::from_name(command).map(Command::Structure),
            "signal" => SignalCommand::from_name(command).map(Command::Signal),
            "train" => TrainCommand::from_name(command).map(Command::Train),
            "cycle" => CycleCommand::from_name(command).map(Command::Cycle),
            "track" | "railway" => TrackCommand::from_name(command).map(Command::Track),
            _ => None,
        }
    }

    /// `Namespace.Command` in canonical spelling.
    pub fn qualified_name(self) -> String {
        let (ns, name) = match self {
            Command::Options(c) => (OptionsCommand::NAMESPACE, c.name()),
            Command::Route(c) => (RouteCommand::NAMESPACE, c.name()),
            Command::Structure(c) => (StructureCommand::NAMESPACE, c.name()),
            Command::Signal(c) => (SignalCommand::NAMESPACE, c.name()),
            Command::Train(c) => (TrainCommand::NAMESPACE, c.name()),
            Command::Cycle(c) => (CycleCommand::NAMESPACE, c.name()),
            Command::Track(c) => (TrackCommand::NAMESPACE, c.name()),
        };
        format!("{ns}.{name}")
    }

    /// Whether the command contributes to a route summary.
    pub fn applies_in_preview(self) -> bool {
        matches!(
            self,
            Command::Route(
                RouteCommand::Comment
                    | RouteCommand::Image
                    | RouteCommand::Gauge
                    | RouteCommand::Timetable
            ) | Command::Train(TrainCommand::Gauge)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn resolves_case_insensitively() {
        assert_eq!(
            Command::resolve("structure", "RAIL"),
            Some(Command::Structure(StructureCommand::Rail))
        );
        assert_eq!(
            Command::resolve("OPTIONS", "blocklength"),
            Some(Command::Options(OptionsCommand::BlockLength))
        );
    }

    #[test]
    fn aliases_share_a_tag() {
        assert_eq!(
            Command::resolve("Structure", "Back"),
            Command::resolve("Structure", "Background")
        );
        assert_eq!(
            Command::resolve("Structure", "BackX"),
            Some(Command::Structure(StructureCommand::BackgroundX))
        );
        assert_eq!(
            Command::resolve("Track", "Sig"),
            Some(Command::Track(TrackCommand::Signal))
        );
        assert_eq!(
            Command::resolve("Track", "poi"),
            Some(Command::Track(TrackCommand::PointOfInterest))
        );
    }

    #[test]
    fn unknown_pairs_do_not_resolve() {
        assert!(Command::resolve("Track", "Teleport").is_none());
        assert!(Command::resolve("Weather", "Rain").is_none());
        // A Track command is not a Structure command.
        assert!(Command::resolve("Structure", "Pitch").is_none());
    }

    #[test]
    fn canonical_names() {
        assert_eq!(StructureCommand::FreeObject.name(), "FreeObj");
        assert_eq!(
            Command::Structure(StructureCommand::BackgroundAspect).qualified_name(),
            "Structure.BackgroundAspect"
        );
        assert_eq!(TrackCommand::Station.name(), "Sta");
    }

    #[test]
    fn every_name_round_trips() {
        for c in TrackCommand::all() {
            assert_eq!(TrackCommand::from_name(c.name()), Some(*c));
        }
        for c in StructureCommand::all() {
            assert_eq!(StructureCommand::from_name(c.name()), Some(*c));
        }
        for c in RouteCommand::all() {
            assert_eq!(RouteCommand::from_name(c.name()), Some(*c));
        }
    }

    #[test]
    fn preview_subset() {
        assert!(Command::Route(RouteCommand::Gauge).applies_in_preview());
        assert!(Command::Route(RouteCommand::Comment).applies_in_preview());
        assert!(!Command::Structure(StructureCommand::Rail).applies_in_preview());
        assert!(!Command::Track(TrackCommand::Rail).applies_in_preview());
    }
}
