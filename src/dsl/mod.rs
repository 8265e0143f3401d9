//! The route language front end: preprocessing, lexing and the statement loop
//! that feeds every command through the registry.

pub mod lexer;
pub mod numeric;
pub mod preprocess;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::builder::{build_world, World};
use crate::diagnostics::{DiagnosticKind, DiagnosticSink};
use crate::error::RouteError;
use crate::loader::ResourceLoader;
use crate::model::RouteData;
use crate::registry::handlers::structure::install_default_poles;
use crate::registry::handlers::ParseContext;
use crate::registry::{execute, Command};
use crate::settings::RouteSettings;

use lexer::{Dialect, Statement};
use numeric::parse_length;
use preprocess::Preprocessor;

/// A fully loaded route: the accumulated data plus, unless only a preview was
/// requested, the built world.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedRoute {
    pub data: RouteData,
    pub world: Option<World>,
}

/// What a route selection screen shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub comment: String,
    pub image: Option<PathBuf>,
    /// Metres.
    pub gauge: f64,
    pub timetable: String,
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Interpret route text. `file_name` is used for diagnostics and its folder
/// is the base for every relative resource reference.
pub fn parse_route_text(
    text: &str,
    file_name: &str,
    dialect: Dialect,
    settings: &RouteSettings,
    loader: &dyn ResourceLoader,
    sink: &mut dyn DiagnosticSink,
    cancel: Option<&AtomicBool>,
) -> Result<RouteData, RouteError> {
    let route_folder = Path::new(file_name)
        .parent()
        .map_or_else(PathBuf::new, Path::to_path_buf);
    log::info!("Parsing {file_name} as {dialect:?}");

    let lines = Preprocessor::new(
        loader,
        &mut *sink,
        dialect,
        &route_folder,
        settings.encoding,
        settings.max_include_depth,
        settings.random_seed,
    )
    .run(text, file_name);
    let statements = lexer::lex(&lines, dialect, &mut *sink);
    log::debug!("{} lines, {} statements", lines.len(), statements.len());

    let mut data = RouteData::new();
    data.options.enable_hacks = settings.enable_hacks;
    if !settings.preview_only {
        install_default_poles(&mut data);
    }

    let mut ctx = ParseContext::new(loader, &mut *sink, settings, &route_folder);
    for statement in &statements {
        if is_cancelled(cancel) {
            log::info!("Parsing {file_name} cancelled");
            return Err(RouteError::Cancelled);
        }
        match statement {
            Statement::Position { location, text } => match parse_length(text, &data.options.unit_of_length) {
                Some(position) => ctx.position = position,
                None => ctx.error(
                    DiagnosticKind::MalformedLiteral,
                    format!("Track position '{text}' is not a valid number"),
                    location,
                ),
            },
            Statement::Command(expr) => match Command::resolve(&expr.namespace, &expr.command) {
                Some(command) => execute::execute(&mut ctx, &mut data, command, expr)?,
                None => ctx.unsupported(expr),
            },
        }
    }

    data.blocks.sort();
    let inserted = data.blocks.create_missing_blocks();
    log::debug!("{} blocks, {inserted} inserted to bound gaps", data.blocks.len());

    if !settings.preview_only && data.blocks.is_empty() {
        return Err(RouteError::NoTrackGeometry {
            file: file_name.to_string(),
        });
    }
    Ok(data)
}

/// Read, detect, interpret and (unless previewing) build a route file.
pub fn load_route(
    path: &Path,
    settings: &RouteSettings,
    loader: &dyn ResourceLoader,
    sink: &mut dyn DiagnosticSink,
    cancel: Option<&AtomicBool>,
) -> Result<LoadedRoute, RouteError> {
    let file_name = path.to_string_lossy().into_owned();
    let text = loader.read_text(path, settings.encoding)?;
    let short_name = path
        .file_name()
        .map_or_else(|| file_name.clone(), |n| n.to_string_lossy().into_owned());
    let dialect = Dialect::detect(&short_name, &text).ok_or_else(|| RouteError::UnrecognizedFormat {
        file: file_name.clone(),
    })?;

    let data = parse_route_text(&text, &file_name, dialect, settings, loader, sink, cancel)?;
    let world = (!settings.preview_only).then(|| build_world(&data));
    Ok(LoadedRoute { data, world })
}

/// Interpret only what a route summary needs, skipping resource loading.
pub fn preview_route(
    path: &Path,
    settings: &RouteSettings,
    loader: &dyn ResourceLoader,
    sink: &mut dyn DiagnosticSink,
    cancel: Option<&AtomicBool>,
) -> Result<RouteSummary, RouteError> {
    let settings = RouteSettings {
        preview_only: true,
        ..settings.clone()
    };
    let loaded = load_route(path, &settings, loader, sink, cancel)?;
    let route = loaded.data.route;
    Ok(RouteSummary {
        comment: route.comment,
        image: route.image,
        gauge: route.gauge,
        timetable: route.timetable,
    })
}
