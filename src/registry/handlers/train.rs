use crate::diagnostics::DiagnosticKind;
use crate::dsl::lexer::Expression;
use crate::error::RouteError;
use crate::loader::{TextureHandle, TextureParams};
use crate::model::RouteData;
use crate::paths;
use crate::registry::TrainCommand;

use super::{route, ParseContext};

/// Range legacy routes are clamped to when compatibility fixes are enabled, seconds.
const HACK_INTERVAL_RANGE: (f64, f64) = (120.0, 43_200.0);

pub fn execute(
    ctx: &mut ParseContext<'_>,
    data: &mut RouteData,
    command: TrainCommand,
    expr: &Expression,
) -> Result<(), RouteError> {
    match command {
        TrainCommand::Interval => intervals(ctx, data, expr),
        TrainCommand::Velocity => {
            if let Some(v) = ctx.arg_double(expr, 0, "Velocity") {
                data.train.velocity = (v > 0.0).then(|| data.speed(v));
            }
        }
        TrainCommand::Folder => {
            if let Some(reference) = ctx.required_text(expr, 0, "Train folder") {
                let base = ctx.settings.train_folder(&ctx.route_folder).to_path_buf();
                match paths::combine(&base, reference) {
                    Some(folder) => data.train.folder = Some(folder),
                    None => ctx.error(
                        DiagnosticKind::InvalidArgument,
                        format!("Train folder '{reference}' is not a valid path"),
                        &expr.location,
                    ),
                }
            }
        }
        TrainCommand::Run => sound_table(ctx, expr, &mut data.train.run_sounds, "Run"),
        TrainCommand::Flange => sound_table(ctx, expr, &mut data.train.flange_sounds, "Flange"),
        TrainCommand::Timetable => timetable(ctx, data, expr)?,
        TrainCommand::Gauge => route::gauge(ctx, data, expr),
    }
    Ok(())
}

/// Shared by `Train.Interval` and `Route.RunInterval`.
pub(super) fn intervals(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    let mut intervals = Vec::with_capacity(expr.arguments.len());
    for i in 0..expr.arguments.len() {
        let Some(seconds) = ctx.arg_double(expr, i, "Interval") else {
            continue;
        };
        if data.options.enable_hacks {
            let (low, high) = HACK_INTERVAL_RANGE;
            intervals.push(seconds.clamp(low, high));
        } else if seconds > 0.0 {
            intervals.push(seconds);
        } else {
            ctx.error(
                DiagnosticKind::InvalidArgument,
                format!("Interval {seconds} must be positive"),
                &expr.location,
            );
        }
    }
    data.train.intervals = intervals;
}

/// `Train.Run(railType) sound` and `Train.Flange(railType) sound`.
fn sound_table(ctx: &mut ParseContext<'_>, expr: &Expression, table: &mut Vec<i32>, what: &str) {
    let Some(rail_type) = ctx.index_usize(expr, 0, what) else {
        return;
    };
    let Some(sound) = ctx.arg_int(expr, 0, "Sound index") else {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            format!("Train.{what}({rail_type}) needs a sound index"),
            &expr.location,
        );
        return;
    };
    if rail_type >= table.len() {
        table.resize(rail_type + 1, 0);
    }
    if let Some(slot) = table.get_mut(rail_type) {
        *slot = sound;
    }
}

/// `Train.Timetable(i).Day.Load file` or `.Night.Load`; no suffix means day.
fn timetable(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) -> Result<(), RouteError> {
    let Some(index) = ctx.index_usize(expr, 0, "Timetable index") else {
        return Ok(());
    };
    let night = expr
        .suffix
        .as_deref()
        .is_some_and(|s| s.to_ascii_lowercase().starts_with("night"));
    let Some(reference) = ctx.required_text(expr, 0, "Timetable image") else {
        return Ok(());
    };
    let folder = ctx.route_folder.clone();
    let texture = ctx.register_texture(&folder, reference, &TextureParams::default(), &expr.location)?;
    let table = if night {
        &mut data.train.night_timetables
    } else {
        &mut data.train.day_timetables
    };
    store_grown(table, index, texture);
    Ok(())
}

/// Grow by doubling so routes declaring timetables in order stay amortized.
fn store_grown(table: &mut Vec<Option<TextureHandle>>, index: usize, texture: Option<TextureHandle>) {
    if index >= table.len() {
        let mut size = table.len().max(1);
        while size <= index {
            size *= 2;
        }
        table.resize(size, None);
    }
    if let Some(slot) = table.get_mut(index) {
        *slot = texture;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::indexing_slicing)]
mod tests {
    use std::path::PathBuf;

    use crate::dsl::lexer::Expression;
    use crate::registry::handlers::testing::{expr, Harness};

    #[test]
    fn intervals_replace_previous_values() {
        let mut h = Harness::new();
        h.ok(&expr("Train", "Interval", &[], &["300", "600"]));
        assert_eq!(h.data.train.intervals, vec![300.0, 600.0]);
        h.ok(&expr("Route", "RunInterval", &[], &["90"]));
        assert_eq!(h.data.train.intervals, vec![90.0]);
    }

    #[test]
    fn hacks_clamp_intervals() {
        let mut h = Harness::new();
        h.data.options.enable_hacks = true;
        h.ok(&expr("Train", "Interval", &[], &["5", "100000"]));
        assert_eq!(h.data.train.intervals, vec![120.0, 43_200.0]);
    }

    #[test]
    fn velocity_zero_means_unlimited() {
        let mut h = Harness::new();
        h.ok(&expr("Train", "Velocity", &[], &["72"]));
        assert!((h.data.train.velocity.unwrap() - 20.0).abs() < 1e-12);
        h.ok(&expr("Train", "Velocity", &[], &["0"]));
        assert_eq!(h.data.train.velocity, None);
    }

    #[test]
    fn run_sounds_grow_on_demand() {
        let mut h = Harness::new();
        h.ok(&expr("Train", "Run", &["3"], &["7"]));
        assert_eq!(h.data.train.run_sounds, vec![0, 0, 0, 7]);
    }

    #[test]
    fn night_timetable_suffix() {
        let mut h = Harness::new();
        let e = Expression {
            suffix: Some("Night.Load".to_string()),
            ..expr("Train", "Timetable", &["2"], &["tt_night.png"])
        };
        h.ok(&e);
        assert!(h.data.train.day_timetables.is_empty());
        assert_eq!(h.data.train.night_timetables.len(), 4);
        assert_eq!(
            h.data.train.night_timetables[2].as_ref().unwrap().path,
            PathBuf::from("/route/tt_night.png")
        );
    }

    #[test]
    fn train_folder_is_joined() {
        let mut h = Harness::new();
        h.settings.train_folder = Some(PathBuf::from("/trains"));
        h.ok(&expr("Train", "Folder", &[], &["EMU\\100"]));
        assert_eq!(h.data.train.folder, Some(PathBuf::from("/trains/EMU/100")));
    }
}
