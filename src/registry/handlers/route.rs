use crate::diagnostics::DiagnosticKind;
use crate::dsl::lexer::Expression;
use crate::dsl::numeric::{parse_double_legacy, parse_time};
use crate::error::RouteError;
use crate::import::lighting::parse_light_definitions;
use crate::loader::TextureParams;
use crate::model::structure::light_direction;
use crate::model::{DisplaySpeed, RouteData};
use crate::paths;
use crate::registry::RouteCommand;

use super::{train, ParseContext};

/// Absolute zero in °C.
const ABSOLUTE_ZERO: f64 = -273.15;

pub fn execute(
    ctx: &mut ParseContext<'_>,
    data: &mut RouteData,
    command: RouteCommand,
    expr: &Expression,
) -> Result<(), RouteError> {
    match command {
        RouteCommand::Comment => data.route.comment = expr.argument_text.trim().to_string(),
        RouteCommand::Timetable => data.route.timetable = expr.argument_text.trim().to_string(),
        RouteCommand::Image => image(ctx, data, expr),
        RouteCommand::Change => {
            if let Some(mode) = ctx.arg_int(expr, 0, "Change mode") {
                if (-1..=1).contains(&mode) {
                    data.route.change_mode = mode;
                } else {
                    ctx.error(
                        DiagnosticKind::InvalidArgument,
                        format!("Change mode must be -1, 0 or 1, not {mode}"),
                        &expr.location,
                    );
                }
            }
        }
        RouteCommand::Gauge => gauge(ctx, data, expr),
        RouteCommand::Signal => signal_speed(ctx, data, expr),
        RouteCommand::RunInterval => train::intervals(ctx, data, expr),
        RouteCommand::AccelerationDueToGravity => {
            if let Some(g) = positive(ctx, expr, "AccelerationDueToGravity") {
                data.route.gravity = g;
            }
        }
        RouteCommand::Elevation => {
            let units = data.options.unit_of_length.clone();
            if let Some(h) = ctx.arg_length(expr, 0, "Elevation", &units) {
                data.route.elevation = h;
            }
        }
        RouteCommand::Temperature => {
            if let Some(celsius) = ctx.arg_double(expr, 0, "Temperature") {
                if celsius > ABSOLUTE_ZERO {
                    data.route.temperature = celsius - ABSOLUTE_ZERO;
                } else {
                    ctx.error(
                        DiagnosticKind::InvalidArgument,
                        format!("Temperature {celsius} is below absolute zero"),
                        &expr.location,
                    );
                }
            }
        }
        RouteCommand::Pressure => {
            if let Some(p) = positive(ctx, expr, "Pressure") {
                data.route.pressure = p;
            }
        }
        RouteCommand::DisplaySpeed => display_speed(ctx, data, expr),
        RouteCommand::LoadingScreen => {
            if let Some(reference) = ctx.required_text(expr, 0, "Image file") {
                let folder = ctx.route_folder.clone();
                data.route.loading_screen =
                    ctx.register_texture(&folder, reference, &TextureParams::default(), &expr.location)?;
            }
        }
        RouteCommand::StartTime => {
            if let Some(text) = ctx.required_text(expr, 0, "Start time") {
                match parse_time(text) {
                    Some(t) => data.route.start_time = Some(t),
                    None => ctx.error(
                        DiagnosticKind::MalformedLiteral,
                        format!("Start time '{text}' is not a valid time"),
                        &expr.location,
                    ),
                }
            }
        }
        RouteCommand::AmbientLight => {
            let current = data.route.ambient_light;
            data.route.ambient_light = color(ctx, expr, current);
        }
        RouteCommand::DirectionalLight => {
            let current = data.route.directional_light;
            data.route.directional_light = color(ctx, expr, current);
        }
        RouteCommand::LightDirection => {
            let theta = ctx.arg_double(expr, 0, "Theta").unwrap_or(60.0);
            let phi = ctx.arg_double(expr, 1, "Phi").unwrap_or(-26.565_051_177_078);
            data.route.light_direction = light_direction(theta, phi);
        }
        RouteCommand::DynamicLight => dynamic_light(ctx, data, expr)?,
    }
    Ok(())
}

/// Shared by `Route.Gauge` and `Train.Gauge`. Millimetres in, metres stored.
pub(super) fn gauge(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    if let Some(mm) = positive(ctx, expr, "Gauge") {
        data.route.gauge = mm * 0.001;
    }
}

fn image(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let Some(reference) = ctx.required_text(expr, 0, "Image file") else {
        return;
    };
    let folder = ctx.route_folder.clone();
    match paths::resolve_file(ctx.loader, &[folder.as_path()], reference) {
        Some(path) => data.route.image = Some(path),
        None => ctx.missing(format!("Route image {reference} was not found"), &expr.location),
    }
}

fn signal_speed(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let Some(aspect) = ctx.index_usize(expr, 0, "Signal aspect") else {
        return;
    };
    let Some(speed) = ctx.arg_double(expr, 0, "Signal speed") else {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            format!("Route.Signal({aspect}) needs a speed"),
            &expr.location,
        );
        return;
    };
    if speed < 0.0 {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            format!("Signal speed {speed} must not be negative"),
            &expr.location,
        );
        return;
    }
    let value = data.speed(speed);
    let speeds = &mut data.route.signal_speeds;
    if aspect >= speeds.len() {
        speeds.resize(aspect + 1, f64::INFINITY);
    }
    if let Some(slot) = speeds.get_mut(aspect) {
        *slot = value;
    }
}

fn display_speed(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    // The unit and factor are written as one pair, separated either way.
    let parts: Vec<&str> = expr
        .argument_text
        .split([',', ';'])
        .map(str::trim)
        .collect();
    let (Some(unit), Some(factor)) = (parts.first(), parts.get(1)) else {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            "DisplaySpeed needs a unit name and a conversion factor",
            &expr.location,
        );
        return;
    };
    match parse_double_legacy(factor).filter(|f| *f > 0.0) {
        Some(factor) if !unit.is_empty() => {
            data.route.display_speed = Some(DisplaySpeed {
                unit: (*unit).to_string(),
                factor,
            });
        }
        _ => ctx.error(
            DiagnosticKind::InvalidArgument,
            format!("DisplaySpeed '{}' is not a unit and positive factor", expr.argument_text),
            &expr.location,
        ),
    }
}

fn dynamic_light(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) -> Result<(), RouteError> {
    let Some(index) = ctx.index(expr, 0, "DynamicLight index") else {
        return Ok(());
    };
    let Some(reference) = ctx.required_text(expr, 0, "Lighting file") else {
        return Ok(());
    };
    let Some((xml, _)) = ctx.read_resource(reference, &expr.location)? else {
        return Ok(());
    };
    let states = match parse_light_definitions(&xml) {
        Ok(states) => states,
        Err(e) => {
            ctx.error(
                DiagnosticKind::InvalidArgument,
                format!("Lighting file {reference} is invalid: {e}"),
                &expr.location,
            );
            return Ok(());
        }
    };
    if let Err(e) = data.structure.light_definitions.add(index, Some(states), None) {
        ctx.error(DiagnosticKind::IndexOutOfRange, format!("DynamicLight {e}"), &expr.location);
    }
    Ok(())
}

/// Three byte components. Missing ones keep the current value, out-of-range
/// ones are clamped.
fn color(ctx: &mut ParseContext<'_>, expr: &Expression, current: [u8; 3]) -> [u8; 3] {
    let mut result = current;
    for (i, channel) in result.iter_mut().enumerate() {
        let Some(value) = ctx.arg_int(expr, i, "Colour component") else {
            continue;
        };
        if !(0..=255).contains(&value) {
            ctx.error(
                DiagnosticKind::InvalidArgument,
                format!("Colour component {value} is outside 0..255"),
                &expr.location,
            );
        }
        *channel = u8::try_from(value.clamp(0, 255)).unwrap_or(u8::MAX);
    }
    result
}

fn positive(ctx: &mut ParseContext<'_>, expr: &Expression, what: &str) -> Option<f64> {
    let value = ctx.arg_double(expr, 0, what)?;
    if value > 0.0 {
        Some(value)
    } else {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            format!("{what} must be positive, not {value}"),
            &expr.location,
        );
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use std::path::PathBuf;

    use crate::diagnostics::DiagnosticKind;
    use crate::loader::mock::MockLoader;
    use crate::registry::handlers::testing::{expr, Harness};

    #[test]
    fn gauge_is_converted_to_metres() {
        let mut h = Harness::new();
        h.ok(&expr("Route", "Gauge", &[], &["1000"]));
        assert_eq!(h.data.route.gauge, 1.0);
    }

    #[test]
    fn zero_gauge_is_rejected() {
        let mut h = Harness::new();
        h.run(&expr("Route", "Gauge", &[], &["0"])).unwrap();
        assert_eq!(h.data.route.gauge, 1.435);
        assert_eq!(h.sink.len(), 1);
    }

    #[test]
    fn comment_keeps_full_text() {
        let mut h = Harness::new();
        h.ok(&expr("Route", "Comment", &[], &["A line", " with separators"]));
        assert_eq!(h.data.route.comment, "A line; with separators");
    }

    #[test]
    fn image_must_exist() {
        let mut h = Harness::with_loader(MockLoader::new().with_missing("/route/gone.png"));
        h.ok(&expr("Route", "Image", &[], &["thumb.png"]));
        assert_eq!(h.data.route.image, Some(PathBuf::from("/route/thumb.png")));
        h.run(&expr("Route", "Image", &[], &["gone.png"])).unwrap();
        assert!(h.sink.has_critical());
        assert_eq!(h.data.route.image, Some(PathBuf::from("/route/thumb.png")));
    }

    #[test]
    fn signal_speeds_grow() {
        let mut h = Harness::new();
        h.ok(&expr("Route", "Signal", &["8"], &["36"]));
        let speeds = &h.data.route.signal_speeds;
        assert_eq!(speeds.len(), 9);
        assert!(speeds[7].is_infinite());
        assert!((speeds[8] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn temperature_in_kelvin() {
        let mut h = Harness::new();
        h.ok(&expr("Route", "Temperature", &[], &["0"]));
        assert!((h.data.route.temperature - 273.15).abs() < 1e-9);
        h.run(&expr("Route", "Temperature", &[], &["-300"])).unwrap();
        assert!((h.data.route.temperature - 273.15).abs() < 1e-9);
        assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::InvalidArgument);
    }

    #[test]
    fn display_speed_pair() {
        let mut h = Harness::new();
        h.ok(&expr("Route", "DisplaySpeed", &[], &["mph", "1.609344"]));
        let display = h.data.route.display_speed.unwrap();
        assert_eq!(display.unit, "mph");
        assert_eq!(display.factor, 1.609_344);
    }

    #[test]
    fn start_time() {
        let mut h = Harness::new();
        h.ok(&expr("Route", "StartTime", &[], &["08.3000"]));
        assert_eq!(h.data.route.start_time, Some(8.5 * 3600.0));
        h.run(&expr("Route", "StartTime", &[], &["soon"])).unwrap();
        assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::MalformedLiteral);
    }

    #[test]
    fn colours_are_clamped() {
        let mut h = Harness::new();
        h.run(&expr("Route", "AmbientLight", &[], &["300", "20"])).unwrap();
        assert_eq!(h.data.route.ambient_light, [255, 20, 160]);
        assert_eq!(h.sink.len(), 1);
    }

    #[test]
    fn dynamic_light_from_xml() {
        let xml = "<openBVE><Brightness><Time>06.00</Time><CabLighting>10</CabLighting></Brightness></openBVE>";
        let mut h = Harness::with_loader(MockLoader::new().with_file("/route/light.xml", xml));
        h.ok(&expr("Route", "DynamicLight", &["1"], &["light.xml"]));
        let states = h.data.structure.light_definitions.get(1).unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].cab_lighting, 10);
    }

    #[test]
    fn broken_lighting_file_is_a_diagnostic() {
        let mut h = Harness::with_loader(MockLoader::new().with_file("/route/light.xml", "<a></a>"));
        h.run(&expr("Route", "DynamicLight", &["0"], &["light.xml"])).unwrap();
        assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::InvalidArgument);
        assert!(!h.data.structure.light_definitions.is_declared(0));
    }

    #[test]
    fn preview_skips_everything_but_the_summary() {
        let mut h = Harness::new();
        h.settings.preview_only = true;
        h.ok(&expr("Route", "Gauge", &[], &["1067"]));
        h.ok(&expr("Route", "Elevation", &[], &["120"]));
        assert!((h.data.route.gauge - 1.067).abs() < 1e-12);
        assert_eq!(h.data.route.elevation, 0.0);
    }
}
