//! Track commands. Each one lands in the [`Block`] at the current position.

use crate::diagnostics::DiagnosticKind;
use crate::dsl::lexer::Expression;
use crate::dsl::numeric::{parse_int_legacy, parse_time};
use crate::error::RouteError;
use crate::loader::TextureParams;
use crate::model::{
    BeaconPlacement, Block, BlockMarker, CantBehavior, CurveChange, FogBehavior, FogChange, ObjectPlacement,
    RailAction, RailChange, RepeaterChange, RepeaterKind, RouteData, SectionBehavior, Side, SignalKind,
    SignalPlacement, SoundKind, SoundPlacement, Station, StopMarker, StopMode, StructureKind,
};
use crate::registry::TrackCommand;

use super::ParseContext;

/// Default distance a train may overshoot or undershoot a stop marker, metres.
const DEFAULT_STOP_TOLERANCE: f64 = 5.0;

pub fn execute(
    ctx: &mut ParseContext<'_>,
    data: &mut RouteData,
    command: TrackCommand,
    expr: &Expression,
) -> Result<(), RouteError> {
    match command {
        TrackCommand::RailStart => rail(ctx, data, expr, RailAction::Start),
        TrackCommand::Rail => rail(ctx, data, expr, RailAction::Update),
        TrackCommand::RailEnd => rail(ctx, data, expr, RailAction::End),
        TrackCommand::RailType => rail_type(ctx, data, expr),
        TrackCommand::Pitch => {
            let rate = ctx.arg_double(expr, 0, "Pitch").unwrap_or(0.0);
            with_block(data, ctx.position, |b| b.pitch = Some(rate));
        }
        TrackCommand::Curve => {
            let radius = ctx
                .arg_length(expr, 0, "Curve radius", &data.options.unit_of_length)
                .unwrap_or(0.0);
            // Cant is given in millimetres.
            let mut cant = ctx.arg_double(expr, 1, "Cant").unwrap_or(0.0) * 0.001;
            if data.options.cant_behavior == CantBehavior::Unsigned {
                cant = cant.abs() * sign(radius);
            }
            with_block(data, ctx.position, |b| b.curve = Some(CurveChange { radius, cant }));
        }
        TrackCommand::Turn => {
            let ratio = ctx.arg_double(expr, 0, "Turn").unwrap_or(0.0);
            with_block(data, ctx.position, |b| b.turn = ratio);
        }
        TrackCommand::Height => {
            let height = ctx
                .arg_length(expr, 0, "Height", &data.options.unit_of_length)
                .unwrap_or(0.0);
            with_block(data, ctx.position, |b| b.height = Some(height));
        }
        TrackCommand::Accuracy => {
            let accuracy = ctx.arg_double(expr, 0, "Accuracy").unwrap_or(2.0).clamp(0.0, 4.0);
            with_block(data, ctx.position, |b| b.accuracy = Some(accuracy));
        }
        TrackCommand::Adhesion => {
            let adhesion = ctx.arg_double(expr, 0, "Adhesion").unwrap_or(100.0);
            if adhesion < 0.0 {
                ctx.error(
                    DiagnosticKind::InvalidArgument,
                    format!("Adhesion {adhesion} must not be negative"),
                    &expr.location,
                );
            } else {
                with_block(data, ctx.position, |b| b.adhesion = Some(adhesion * 0.01));
            }
        }
        TrackCommand::FreeObject => free_object(ctx, data, expr),
        TrackCommand::Wall => wall_or_dike(ctx, data, expr, RepeaterKind::Wall),
        TrackCommand::Dike => wall_or_dike(ctx, data, expr, RepeaterKind::Dike),
        TrackCommand::Pole => pole(ctx, data, expr),
        TrackCommand::WallEnd => repeater_end(ctx, data, expr, RepeaterKind::Wall),
        TrackCommand::DikeEnd => repeater_end(ctx, data, expr, RepeaterKind::Dike),
        TrackCommand::PoleEnd => repeater_end(ctx, data, expr, RepeaterKind::Pole),
        TrackCommand::Crack => crack(ctx, data, expr),
        TrackCommand::Ground => {
            let structure = &data.structure;
            if let Some(ground) = ctx.arg_declared(expr, 0, "Ground", |i| {
                structure.ground.is_declared(i) || structure.cycles.is_declared(i)
            }) {
                with_block(data, ctx.position, |b| b.ground = Some(ground));
            }
        }
        TrackCommand::Form => form(ctx, data, expr),
        TrackCommand::Station => station(ctx, data, expr)?,
        TrackCommand::Stop => stop(ctx, data, expr),
        TrackCommand::Limit => {
            let limit = match ctx.arg_double(expr, 0, "Speed limit") {
                Some(v) if v > 0.0 => data.speed(v),
                _ => f64::INFINITY,
            };
            with_block(data, ctx.position, |b| b.speed_limit = Some(limit));
        }
        TrackCommand::Section => section(ctx, data, expr),
        TrackCommand::Signal => builtin_signal(ctx, data, expr),
        TrackCommand::SignalCustom => custom_signal(ctx, data, expr),
        TrackCommand::Beacon => beacon(ctx, data, expr),
        TrackCommand::Background => {
            let backgrounds = &data.backgrounds;
            if let Some(index) = ctx.arg_declared(expr, 0, "Background", |i| {
                i32::try_from(i).is_ok_and(|i| backgrounds.contains_key(&i))
            }) {
                let index = i32::try_from(index).unwrap_or(0);
                marker(data, ctx.position, BlockMarker::Background(index));
            }
        }
        TrackCommand::Fog => fog(ctx, data, expr),
        TrackCommand::Brightness => {
            let value = ctx.arg_double(expr, 0, "Brightness").unwrap_or(255.0);
            marker(data, ctx.position, BlockMarker::Brightness(value.clamp(0.0, 255.0)));
        }
        TrackCommand::Lighting => {
            let lights = &data.structure.light_definitions;
            if let Some(index) = ctx.arg_declared(expr, 0, "Lighting set", |i| lights.is_declared(i)) {
                marker(data, ctx.position, BlockMarker::Lighting(index));
            }
        }
        TrackCommand::Announce => sound(ctx, data, expr, SoundKind::OneShot)?,
        TrackCommand::Doppler => sound(ctx, data, expr, SoundKind::Looped)?,
        TrackCommand::Marker => {
            if let Some(reference) = ctx.required_text(expr, 0, "Marker image") {
                let folder = ctx.route_folder.clone();
                let texture = ctx.register_texture(&folder, reference, &TextureParams::default(), &expr.location)?;
                let distance = ctx
                    .arg_length(expr, 1, "Marker distance", &data.options.unit_of_length)
                    .unwrap_or(0.0)
                    .abs();
                marker(data, ctx.position, BlockMarker::Marker { texture, distance });
            }
        }
        TrackCommand::PointOfInterest => {
            let rail = ctx.arg_count(expr, 0, "Rail").unwrap_or(0);
            let units = &data.options.unit_of_length;
            let x = ctx.arg_length(expr, 1, "X", units).unwrap_or(0.0);
            let y = ctx.arg_length(expr, 2, "Y", units).unwrap_or(0.0);
            let text = ctx.arg_text(expr, 6).unwrap_or_default().to_string();
            marker(data, ctx.position, BlockMarker::PointOfInterest { rail, x, y, text });
        }
        TrackCommand::Buffer => marker(data, ctx.position, BlockMarker::Buffer),
    }
    Ok(())
}

fn with_block(data: &mut RouteData, position: f64, f: impl FnOnce(&mut Block)) {
    let index = data.blocks.find_block(position);
    if let Some(block) = data.blocks.get_mut(index) {
        f(block);
    }
}

/// Sign that is 0 for 0, unlike `f64::signum`.
fn sign(v: f64) -> f64 {
    if v == 0.0 {
        0.0
    } else {
        v.signum()
    }
}

fn marker(data: &mut RouteData, position: f64, marker: BlockMarker) {
    with_block(data, position, |b| b.markers.push(marker));
}

fn placement(kind: StructureKind, index: usize, rail: usize) -> ObjectPlacement {
    ObjectPlacement {
        kind,
        index,
        rail,
        x: 0.0,
        y: 0.0,
        z: 0.0,
        yaw: 0.0,
        pitch: 0.0,
        roll: 0.0,
    }
}

// ── Rails ──────────────────────────────────────────────────────────

/// `RailStart`/`Rail`/`RailEnd(rail; x; y; type)`.
fn rail(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression, action: RailAction) {
    let Some(rail) = ctx.arg_count(expr, 0, "Rail") else {
        if ctx.arg_text(expr, 0).is_none() {
            ctx.error(DiagnosticKind::InvalidArgument, "Rail index is missing", &expr.location);
        }
        return;
    };
    if rail == 0 && action != RailAction::Update {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            "Rail 0 is the player's rail and cannot be started or ended",
            &expr.location,
        );
        return;
    }
    let units = &data.options.unit_of_length;
    let x = ctx.arg_length(expr, 1, "X", units);
    let y = ctx.arg_length(expr, 2, "Y", units);
    let structure = if action == RailAction::End || ctx.arg_text(expr, 3).is_none() {
        None
    } else {
        let rails = &data.structure.rail;
        let cycles = &data.structure.rail_cycles;
        ctx.arg_declared(expr, 3, "Rail type", |i| rails.is_declared(i) || cycles.is_declared(i))
    };
    with_block(data, ctx.position, |b| {
        b.rails.push(RailChange {
            rail,
            action,
            x,
            y,
            structure,
        });
    });
}

fn rail_type(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let rail = ctx.arg_count(expr, 0, "Rail").unwrap_or(0);
    let rails = &data.structure.rail;
    let cycles = &data.structure.rail_cycles;
    let declared = |i: usize| rails.is_declared(i) || cycles.is_declared(i);
    let structure = if ctx.arg_text(expr, 1).is_some() {
        ctx.arg_declared(expr, 1, "Rail type", declared)
    } else {
        Some(0)
    };
    if let Some(structure) = structure {
        with_block(data, ctx.position, |b| b.rail_types.push((rail, structure)));
    }
}

// ── Scenery ────────────────────────────────────────────────────────

/// `FreeObj(rail; type; x; y; yaw; pitch; roll)`.
fn free_object(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let rail = ctx.arg_count(expr, 0, "Rail").unwrap_or(0);
    let objects = &data.structure.free_object;
    let Some(index) = ctx.arg_declared(expr, 1, "FreeObj", |i| objects.is_declared(i)) else {
        if ctx.arg_text(expr, 1).is_none() {
            ctx.error(DiagnosticKind::InvalidArgument, "FreeObj needs an object index", &expr.location);
        }
        return;
    };
    let units = &data.options.unit_of_length;
    let object = ObjectPlacement {
        x: ctx.arg_length(expr, 2, "X", units).unwrap_or(0.0),
        y: ctx.arg_length(expr, 3, "Y", units).unwrap_or(0.0),
        yaw: ctx.arg_double(expr, 4, "Yaw").unwrap_or(0.0),
        pitch: ctx.arg_double(expr, 5, "Pitch").unwrap_or(0.0),
        roll: ctx.arg_double(expr, 6, "Roll").unwrap_or(0.0),
        ..placement(StructureKind::FreeObject, index, rail)
    };
    with_block(data, ctx.position, |b| b.objects.push(object));
}

/// `Wall(rail; direction; type)` and `Dike(rail; direction; type)`.
fn wall_or_dike(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression, kind: RepeaterKind) {
    let rail = ctx.arg_count(expr, 0, "Rail").unwrap_or(0);
    let Some(side) = side(ctx, expr, 1) else {
        return;
    };
    let (left, right) = match kind {
        RepeaterKind::Dike => (&data.structure.dike_left, &data.structure.dike_right),
        _ => (&data.structure.wall_left, &data.structure.wall_right),
    };
    let declared = |i: usize| (!side.has_left() || left.is_declared(i)) && (!side.has_right() || right.is_declared(i));
    let Some(structure) = ctx.arg_declared(expr, 2, label(kind), declared) else {
        return;
    };
    let change = RepeaterChange::Start {
        kind,
        rail,
        side,
        structure,
        interval: 1,
    };
    with_block(data, ctx.position, |b| b.repeaters.push(change));
}

/// `Pole(rail; additionalRails; direction; interval; type)`.
fn pole(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let rail = ctx.arg_count(expr, 0, "Rail").unwrap_or(0);
    let Some(side) = side(ctx, expr, 2) else {
        return;
    };
    let block_interval = data.block_interval;
    let length = ctx
        .arg_length(expr, 3, "Pole interval", &data.options.unit_of_length)
        .unwrap_or(block_interval);
    let interval = ((length / block_interval).round() as usize).max(1);
    let poles = &data.structure.pole;
    let structure = if ctx.arg_text(expr, 4).is_some() {
        ctx.arg_declared(expr, 4, "Pole", |i| poles.is_declared(i))
    } else {
        Some(0)
    };
    let Some(structure) = structure else {
        return;
    };
    let change = RepeaterChange::Start {
        kind: RepeaterKind::Pole,
        rail,
        side,
        structure,
        interval,
    };
    with_block(data, ctx.position, |b| b.repeaters.push(change));
}

fn repeater_end(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression, kind: RepeaterKind) {
    let rail = ctx.arg_count(expr, 0, "Rail").unwrap_or(0);
    with_block(data, ctx.position, |b| b.repeaters.push(RepeaterChange::End { kind, rail }));
}

fn side(ctx: &mut ParseContext<'_>, expr: &Expression, i: usize) -> Option<Side> {
    let direction = ctx.arg_int(expr, i, "Direction").unwrap_or(0);
    let side = Side::from_direction(direction);
    if side.is_none() {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            format!("Direction must be -1, 0 or 1, not {direction}"),
            &expr.location,
        );
    }
    side
}

fn label(kind: RepeaterKind) -> &'static str {
    match kind {
        RepeaterKind::Wall => "Wall",
        RepeaterKind::Dike => "Dike",
        RepeaterKind::Pole => "Pole",
    }
}

/// `Crack(rail1; rail2; type)`: fills the gap between two rails.
fn crack(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let rail1 = ctx.arg_count(expr, 0, "Rail").unwrap_or(0);
    let rail2 = ctx.arg_count(expr, 1, "Rail").unwrap_or(0);
    let (left, right) = (&data.structure.crack_left, &data.structure.crack_right);
    let Some(index) = ctx.arg_declared(expr, 2, "Crack", |i| left.is_declared(i) && right.is_declared(i)) else {
        return;
    };
    with_block(data, ctx.position, |b| {
        b.objects.push(placement(StructureKind::CrackLeft, index, rail1));
        b.objects.push(placement(StructureKind::CrackRight, index, rail2));
    });
}

/// `Form(rail1; rail2; roof; type)` where `rail2` is `L`, `R` or a rail number.
fn form(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let rail1 = ctx.arg_count(expr, 0, "Rail").unwrap_or(0);
    let roof = ctx.arg_count(expr, 2, "Roof").unwrap_or(0);
    let structure = &data.structure;
    let Some(index) = ctx.arg_declared(expr, 3, "Form", |i| {
        structure.form_left.is_declared(i) || structure.form_right.is_declared(i)
    }) else {
        if ctx.arg_text(expr, 3).is_none() {
            ctx.error(DiagnosticKind::InvalidArgument, "Form needs a platform type", &expr.location);
        }
        return;
    };

    let rail2 = ctx.arg_text(expr, 1).unwrap_or("L");
    let sides: Vec<(bool, usize)> = if rail2.eq_ignore_ascii_case("l") {
        vec![(true, rail1)]
    } else if rail2.eq_ignore_ascii_case("r") {
        vec![(false, rail1)]
    } else {
        match parse_int_legacy(rail2).and_then(|r| usize::try_from(r).ok()) {
            Some(other) => vec![(true, rail1), (false, other)],
            None => {
                ctx.error(
                    DiagnosticKind::InvalidArgument,
                    format!("Form rail '{rail2}' must be L, R or a rail number"),
                    &expr.location,
                );
                return;
            }
        }
    };

    let mut objects = Vec::new();
    for (left, rail) in sides {
        let kinds = if left {
            [StructureKind::FormLeft, StructureKind::FormCenterLeft]
        } else {
            [StructureKind::FormRight, StructureKind::FormCenterRight]
        };
        for kind in kinds {
            if structure.dictionary(kind).is_declared(index) {
                objects.push(placement(kind, index, rail));
            }
        }
        if roof > 0 {
            let roofs = if left {
                [StructureKind::RoofLeft, StructureKind::RoofCenterLeft]
            } else {
                [StructureKind::RoofRight, StructureKind::RoofCenterRight]
            };
            for kind in roofs {
                if structure.dictionary(kind).is_declared(roof) {
                    objects.push(placement(kind, roof, rail));
                }
            }
        }
    }
    with_block(data, ctx.position, |b| b.objects.extend(objects));
}

// ── Stations ───────────────────────────────────────────────────────

/// `Sta(name; arrival; departure; passAlarm; doors; forcedRedSignal; system;
/// arrivalSound; stopDuration; passengerRatio; departureSound; timetableIndex)`.
fn station(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) -> Result<(), RouteError> {
    let name = ctx.arg_text(expr, 0).unwrap_or_default();
    let mut station = Station::new(name, ctx.position);

    match ctx.arg_text(expr, 1) {
        Some(a) if a.eq_ignore_ascii_case("p") || a.eq_ignore_ascii_case("l") => {
            station.stop_mode = StopMode::Pass;
        }
        Some(a) => station.arrival = time(ctx, expr, a),
        None => {}
    }
    match ctx.arg_text(expr, 2) {
        Some(d) if d.eq_ignore_ascii_case("t") || d == "=" => station.stop_mode = StopMode::Terminal,
        Some(d) => station.departure = time(ctx, expr, d),
        None => {}
    }
    station.pass_alarm = ctx.arg_flag(expr, 3, "Pass alarm").unwrap_or(false);
    station.doors = doors(ctx, expr);
    station.forced_red_signal = ctx.arg_flag(expr, 5, "Forced red signal").unwrap_or(false);
    if let Some(reference) = ctx.arg_text(expr, 7) {
        station.arrival_sound = ctx.register_sound(reference, &expr.location)?;
    }
    if let Some(duration) = ctx.arg_double(expr, 8, "Stop duration") {
        station.stop_duration = duration.max(5.0);
    }
    if let Some(ratio) = ctx.arg_double(expr, 9, "Passenger ratio") {
        station.passenger_ratio = ratio.max(0.0);
    }
    if let Some(reference) = ctx.arg_text(expr, 10) {
        station.departure_sound = ctx.register_sound(reference, &expr.location)?;
    }
    station.timetable_index = ctx.arg_count(expr, 11, "Timetable index");

    let index = data.stations.len();
    data.stations.push(station);
    marker(data, ctx.position, BlockMarker::Station(index));
    Ok(())
}

fn time(ctx: &mut ParseContext<'_>, expr: &Expression, text: &str) -> Option<f64> {
    let parsed = parse_time(text);
    if parsed.is_none() {
        ctx.error(
            DiagnosticKind::MalformedLiteral,
            format!("'{text}' is not a valid time"),
            &expr.location,
        );
    }
    parsed
}

fn doors(ctx: &mut ParseContext<'_>, expr: &Expression) -> i32 {
    let Some(text) = ctx.arg_text(expr, 4) else {
        return 0;
    };
    match text.to_ascii_lowercase().as_str() {
        "l" => -1,
        "n" => 0,
        "r" => 1,
        "b" => 2,
        _ => match ctx.arg_int(expr, 4, "Doors") {
            Some(d) if (-1..=2).contains(&d) => d,
            Some(d) => {
                ctx.error(
                    DiagnosticKind::InvalidArgument,
                    format!("Doors must be L, N, R, B or -1..2, not {d}"),
                    &expr.location,
                );
                0
            }
            None => 0,
        },
    }
}

/// `Stop(direction; backwardTolerance; forwardTolerance; cars)` for the last station.
fn stop(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let Some(station_index) = data.stations.len().checked_sub(1) else {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            "Stop appears before any station",
            &expr.location,
        );
        return;
    };
    let direction = ctx.arg_int(expr, 0, "Direction").unwrap_or(0).signum();
    let units = &data.options.unit_of_length;
    let backward = ctx
        .arg_length(expr, 1, "Backward tolerance", units)
        .unwrap_or(DEFAULT_STOP_TOLERANCE)
        .abs();
    let forward = ctx
        .arg_length(expr, 2, "Forward tolerance", units)
        .unwrap_or(DEFAULT_STOP_TOLERANCE)
        .abs();
    let cars = ctx
        .arg_count(expr, 3, "Cars")
        .map_or(0, |c| u32::try_from(c).unwrap_or(u32::MAX));

    let position = ctx.position;
    if let Some(station) = data.stations.get_mut(station_index) {
        if station.stop_position.is_none() {
            station.stop_position = Some(position);
            station.forward_tolerance = forward;
        }
    }
    let stop = StopMarker {
        station: station_index,
        start_offset: -backward,
        end_offset: forward,
        cars,
        direction,
    };
    with_block(data, position, |b| b.stop_marker = Some(stop));
}

// ── Safety ─────────────────────────────────────────────────────────

fn section(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let mut aspects = Vec::with_capacity(expr.arguments.len());
    for i in 0..expr.arguments.len() {
        if let Some(a) = ctx.arg_int(expr, i, "Aspect") {
            aspects.push(a);
        }
    }
    if aspects.is_empty() {
        ctx.error(DiagnosticKind::InvalidArgument, "Section needs at least one aspect", &expr.location);
        return;
    }
    let simplified = data.options.section_behavior == SectionBehavior::Simplified;
    marker(data, ctx.position, BlockMarker::Section { aspects, simplified });
}

/// `Signal(aspects; _; x; y; yaw; pitch; roll)`: a built-in signal head.
fn builtin_signal(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let aspects = ctx.arg_int(expr, 0, "Aspects").unwrap_or(2).unsigned_abs();
    if !(2..=6).contains(&aspects) {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            format!("A built-in signal has 2 to 6 aspects, not {aspects}"),
            &expr.location,
        );
        return;
    }
    let placement = signal_placement(ctx, data, expr, SignalKind::Builtin(aspects), 0, 2);
    marker(data, ctx.position, BlockMarker::Signal(placement));
}

/// `SigF(index; section; x; y; yaw; pitch; roll)`.
fn custom_signal(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let signals = &data.signals;
    let Some(index) = ctx.arg_declared(expr, 0, "Signal", |i| signals.is_declared(i)) else {
        if ctx.arg_text(expr, 0).is_none() {
            ctx.error(DiagnosticKind::InvalidArgument, "SigF needs a signal index", &expr.location);
        }
        return;
    };
    let section = ctx.arg_int(expr, 1, "Section").unwrap_or(0);
    let placement = signal_placement(ctx, data, expr, SignalKind::Custom(index), section, 2);
    marker(data, ctx.position, BlockMarker::Signal(placement));
}

/// Offsets and angles start at argument `first`.
fn signal_placement(
    ctx: &mut ParseContext<'_>,
    data: &RouteData,
    expr: &Expression,
    kind: SignalKind,
    section: i32,
    first: usize,
) -> SignalPlacement {
    let units = &data.options.unit_of_length;
    SignalPlacement {
        kind,
        section,
        x: ctx.arg_length(expr, first, "X", units).unwrap_or(0.0),
        y: ctx.arg_length(expr, first + 1, "Y", units).unwrap_or(0.0),
        yaw: ctx.arg_double(expr, first + 2, "Yaw").unwrap_or(0.0),
        pitch: ctx.arg_double(expr, first + 3, "Pitch").unwrap_or(0.0),
        roll: ctx.arg_double(expr, first + 4, "Roll").unwrap_or(0.0),
    }
}

/// `Beacon(type; structure; section; data; x; y)`. Structure `-1` places no object.
fn beacon(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let Some(beacon_type) = ctx.arg_int(expr, 0, "Beacon type") else {
        if ctx.arg_text(expr, 0).is_none() {
            ctx.error(DiagnosticKind::InvalidArgument, "Beacon needs a type", &expr.location);
        }
        return;
    };
    let structure = match ctx.arg_int(expr, 1, "Beacon structure") {
        None | Some(-1) => None,
        Some(_) => {
            let beacons = &data.structure.beacon;
            match ctx.arg_declared(expr, 1, "Beacon structure", |i| beacons.is_declared(i)) {
                Some(i) => Some(i),
                None => return,
            }
        }
    };
    let units = &data.options.unit_of_length;
    let placement = BeaconPlacement {
        beacon_type,
        structure,
        section: ctx.arg_int(expr, 2, "Section").unwrap_or(0),
        data: ctx.arg_int(expr, 3, "Data").unwrap_or(0),
        x: ctx.arg_length(expr, 4, "X", units).unwrap_or(0.0),
        y: ctx.arg_length(expr, 5, "Y", units).unwrap_or(0.0),
    };
    marker(data, ctx.position, BlockMarker::Beacon(placement));
}

// ── Environment and sound ──────────────────────────────────────────

/// `Fog(start; end; r; g; b)`.
fn fog(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let units = &data.options.unit_of_length;
    let start = ctx.arg_length(expr, 0, "Fog start", units).unwrap_or(0.0);
    let end = ctx.arg_length(expr, 1, "Fog end", units).unwrap_or(0.0);
    let mut color = [128u8; 3];
    for (i, channel) in color.iter_mut().enumerate() {
        if let Some(v) = ctx.arg_int(expr, 2 + i, "Fog colour") {
            *channel = u8::try_from(v.clamp(0, 255)).unwrap_or(u8::MAX);
        }
    }
    let interpolated = data.options.fog_behavior == FogBehavior::Interpolated;
    marker(
        data,
        ctx.position,
        BlockMarker::Fog(FogChange {
            start,
            end,
            color,
            interpolated,
        }),
    );
}

/// `Announce(file; speed)` and `Doppler(file; x; y)`.
fn sound(
    ctx: &mut ParseContext<'_>,
    data: &mut RouteData,
    expr: &Expression,
    kind: SoundKind,
) -> Result<(), RouteError> {
    let Some(reference) = ctx.required_text(expr, 0, "Sound file") else {
        return Ok(());
    };
    let sound = ctx.register_sound(reference, &expr.location)?;
    let units = &data.options.unit_of_length;
    let (x, y, speed) = match kind {
        SoundKind::OneShot => {
            let speed = ctx.arg_double(expr, 1, "Speed").unwrap_or(0.0).max(0.0);
            (0.0, 0.0, data.speed(speed))
        }
        SoundKind::Looped => (
            ctx.arg_length(expr, 1, "X", units).unwrap_or(0.0),
            ctx.arg_length(expr, 2, "Y", units).unwrap_or(0.0),
            0.0,
        ),
    };
    let placement = SoundPlacement {
        sound,
        kind,
        track_position: ctx.position,
        x,
        y,
        speed,
    };
    with_block(data, ctx.position, |b| b.sounds.push(placement));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use crate::diagnostics::DiagnosticKind;
    use crate::model::{BlockMarker, RailAction, RepeaterChange, SignalKind, StopMode, StructureKind};
    use crate::registry::handlers::testing::{expr, Harness};

    fn block(h: &Harness) -> &crate::model::Block {
        h.data.blocks.get(0).unwrap()
    }

    #[test]
    fn commands_share_the_block_at_a_position() {
        let mut h = Harness::new();
        h.position = 100.0;
        h.ok(&expr("Track", "Pitch", &[], &["5"]));
        h.ok(&expr("Track", "Curve", &[], &["600", "105"]));
        assert_eq!(h.data.blocks.len(), 1);
        let b = block(&h);
        assert_eq!(b.starting_track_position, 100.0);
        assert_eq!(b.pitch, Some(5.0));
        let curve = b.curve.unwrap();
        assert_eq!(curve.radius, 600.0);
        assert!((curve.cant - 0.105).abs() < 1e-12);
    }

    fn cant_after(options: &[&str]) -> f64 {
        let mut h = Harness::new();
        for option in options {
            let (name, value) = option.split_once(' ').unwrap();
            h.ok(&expr("Options", name, &[], &[value]));
        }
        h.ok(&expr("Track", "Curve", &[], &["-600", "100"]));
        block(&h).curve.unwrap().cant
    }

    #[test]
    fn unsigned_cant_follows_the_radius() {
        assert!((cant_after(&[]) + 0.1).abs() < 1e-12);
        assert!((cant_after(&["CantBehavior 0"]) + 0.1).abs() < 1e-12);
    }

    #[test]
    fn signed_cant_is_kept_as_written() {
        assert!((cant_after(&["CantBehavior 1"]) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn fog_records_the_behavior_in_effect() {
        let mut h = Harness::new();
        h.ok(&expr("Track", "Fog", &[], &["10", "400"]));
        h.ok(&expr("Options", "FogBehavior", &[], &["1"]));
        h.ok(&expr("Track", "Fog", &[], &["20", "300"]));
        let flags: Vec<bool> = block(&h)
            .markers
            .iter()
            .filter_map(|m| match m {
                BlockMarker::Fog(f) => Some(f.interpolated),
                _ => None,
            })
            .collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn section_records_the_behavior_in_effect() {
        let mut h = Harness::new();
        h.ok(&expr("Track", "Section", &[], &["0", "2"]));
        h.ok(&expr("Options", "SectionBehavior", &[], &["1"]));
        h.ok(&expr("Track", "Section", &[], &["0", "4"]));
        let modes: Vec<bool> = block(&h)
            .markers
            .iter()
            .filter_map(|m| match m {
                BlockMarker::Section { simplified, .. } => Some(*simplified),
                _ => None,
            })
            .collect();
        assert_eq!(modes, vec![false, true]);
    }

    #[test]
    fn rail_zero_cannot_start() {
        let mut h = Harness::new();
        h.run(&expr("Track", "RailStart", &[], &["0", "3"])).unwrap();
        assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::InvalidArgument);
        assert!(h.data.blocks.is_empty());
    }

    #[test]
    fn rail_start_with_type() {
        let mut h = Harness::new();
        h.ok(&expr("Structure", "Rail", &["2"], &["r.csv"]));
        h.ok(&expr("Track", "RailStart", &[], &["1", "3.8", "", "2"]));
        let change = block(&h).rails[0];
        assert_eq!(change.action, RailAction::Start);
        assert_eq!(change.x, Some(3.8));
        assert_eq!(change.y, None);
        assert_eq!(change.structure, Some(2));
    }

    #[test]
    fn undeclared_free_object() {
        let mut h = Harness::new();
        h.run(&expr("Track", "FreeObj", &[], &["0", "7"])).unwrap();
        assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::IndexOutOfRange);
        assert!(h.data.blocks.is_empty());
    }

    #[test]
    fn free_object_placement() {
        let mut h = Harness::new();
        h.ok(&expr("Structure", "FreeObj", &["7"], &["tree.csv"]));
        h.ok(&expr("Track", "FreeObj", &[], &["0", "7", "-4", "0", "90"]));
        let object = block(&h).objects[0];
        assert_eq!(object.kind, StructureKind::FreeObject);
        assert_eq!(object.x, -4.0);
        assert_eq!(object.yaw, 90.0);
    }

    #[test]
    fn limit_zero_lifts_the_limit() {
        let mut h = Harness::new();
        h.ok(&expr("Track", "Limit", &[], &["72"]));
        assert!((block(&h).speed_limit.unwrap() - 20.0).abs() < 1e-12);
        h.ok(&expr("Track", "Limit", &[], &["0"]));
        assert!(block(&h).speed_limit.unwrap().is_infinite());
    }

    #[test]
    fn station_and_stop() {
        let mut h = Harness::new();
        h.position = 500.0;
        h.ok(&expr("Track", "Sta", &[], &["Central", "10.3000", "T", "1", "R"]));
        h.position = 550.0;
        h.ok(&expr("Track", "Stop", &[], &["1", "3", "8", "6"]));
        let station = &h.data.stations[0];
        assert_eq!(station.name, "Central");
        assert_eq!(station.arrival, Some(10.5 * 3600.0));
        assert_eq!(station.stop_mode, StopMode::Terminal);
        assert!(station.pass_alarm);
        assert_eq!(station.doors, 1);
        assert_eq!(station.stop_position, Some(550.0));
        assert_eq!(station.forward_tolerance, 8.0);
        let stop = h.data.blocks.get(1).unwrap().stop_marker.unwrap();
        assert_eq!(stop.start_offset, -3.0);
        assert_eq!(stop.cars, 6);
    }

    #[test]
    fn stop_without_station() {
        let mut h = Harness::new();
        h.run(&expr("Track", "Stop", &[], &["1"])).unwrap();
        assert_eq!(h.sink.len(), 1);
        assert!(h.data.blocks.is_empty());
    }

    #[test]
    fn pass_station() {
        let mut h = Harness::new();
        h.ok(&expr("Track", "Sta", &[], &["Halt", "P"]));
        assert_eq!(h.data.stations[0].stop_mode, StopMode::Pass);
        assert!(matches!(block(&h).markers[0], BlockMarker::Station(0)));
    }

    #[test]
    fn built_in_signal_aspects() {
        let mut h = Harness::new();
        h.ok(&expr("Track", "Signal", &[], &["-4", "", "-3", "1"]));
        let BlockMarker::Signal(signal) = &block(&h).markers[0] else {
            panic!("expected a signal");
        };
        assert_eq!(signal.kind, SignalKind::Builtin(4));
        assert_eq!(signal.x, -3.0);
        h.run(&expr("Track", "Sig", &[], &["9"])).unwrap();
        assert_eq!(h.sink.len(), 1);
    }

    #[test]
    fn custom_signal_must_be_declared() {
        let mut h = Harness::new();
        h.run(&expr("Track", "SigF", &[], &["3", "0"])).unwrap();
        assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::IndexOutOfRange);
        h.sink = crate::diagnostics::Diagnostics::new();
        h.ok(&expr("Signal", "Load", &["3"], &["s.animated"]));
        h.ok(&expr("Track", "SigF", &[], &["3", "1", "2"]));
        assert!(matches!(
            block(&h).markers[0],
            BlockMarker::Signal(s) if s.kind == SignalKind::Custom(3) && s.section == 1
        ));
    }

    #[test]
    fn beacon_without_object() {
        let mut h = Harness::new();
        h.ok(&expr("Track", "Beacon", &[], &["44", "-1", "1", "120"]));
        let BlockMarker::Beacon(beacon) = block(&h).markers[0] else {
            panic!("expected a beacon");
        };
        assert_eq!(beacon.structure, None);
        assert_eq!(beacon.data, 120);
    }

    #[test]
    fn pole_interval_in_blocks() {
        let mut h = Harness::new();
        crate::registry::handlers::structure::install_default_poles(&mut h.data);
        h.ok(&expr("Track", "Pole", &[], &["0", "0", "1", "50", "1"]));
        let RepeaterChange::Start { interval, structure, .. } = block(&h).repeaters[0] else {
            panic!("expected a pole start");
        };
        assert_eq!(interval, 2);
        assert_eq!(structure, 1);
    }

    #[test]
    fn wall_needs_both_sides_declared() {
        let mut h = Harness::new();
        h.ok(&expr("Structure", "WallL", &["0"], &["wl.csv"]));
        h.run(&expr("Track", "Wall", &[], &["0", "0", "0"])).unwrap();
        assert_eq!(h.sink.len(), 1);
        h.sink = crate::diagnostics::Diagnostics::new();
        h.ok(&expr("Track", "Wall", &[], &["0", "-1", "0"]));
        h.ok(&expr("Track", "WallEnd", &[], &["0"]));
        assert_eq!(block(&h).repeaters.len(), 2);
    }

    #[test]
    fn form_on_both_sides() {
        let mut h = Harness::new();
        h.ok(&expr("Structure", "FormL", &["0"], &["fl.csv"]));
        h.ok(&expr("Structure", "FormR", &["0"], &["fr.csv"]));
        h.ok(&expr("Structure", "FormCL", &["0"], &["fcl.csv"]));
        h.ok(&expr("Track", "Form", &[], &["0", "1", "0", "0"]));
        let kinds: Vec<_> = block(&h).objects.iter().map(|o| (o.kind, o.rail)).collect();
        assert_eq!(
            kinds,
            vec![
                (StructureKind::FormLeft, 0),
                (StructureKind::FormCenterLeft, 0),
                (StructureKind::FormRight, 1),
            ]
        );
    }

    #[test]
    fn background_must_be_declared() {
        let mut h = Harness::new();
        h.run(&expr("Track", "Back", &[], &["1"])).unwrap();
        assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::IndexOutOfRange);
        h.sink = crate::diagnostics::Diagnostics::new();
        h.ok(&expr("Structure", "Back", &["1"], &["sky.png"]));
        h.ok(&expr("Track", "Back", &[], &["1"]));
        assert!(matches!(block(&h).markers[0], BlockMarker::Background(1)));
    }

    #[test]
    fn announce_speed_is_converted() {
        let mut h = Harness::new();
        h.position = 40.0;
        h.ok(&expr("Track", "Announce", &[], &["bell.wav", "36"]));
        let sound = &block(&h).sounds[0];
        assert_eq!(sound.track_position, 40.0);
        assert!((sound.speed - 10.0).abs() < 1e-12);
    }
}
