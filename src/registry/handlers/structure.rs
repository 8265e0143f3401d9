use std::path::PathBuf;

use crate::diagnostics::DiagnosticKind;
use crate::dsl::lexer::Expression;
use crate::error::RouteError;
use crate::import::background::parse_background_layers;
use crate::loader::{ObjectHandle, TextureParams};
use crate::model::{
    AddOutcome, Background, BackgroundLayer, BackgroundSource, RouteData, StructureKind, POLE_GUARD,
};
use crate::paths::{self, XML_EXTENSION};
use crate::registry::StructureCommand;

use super::ParseContext;

/// Install the built-in pole objects every route starts with.
pub fn install_default_poles(data: &mut RouteData) {
    for slot in 0..POLE_GUARD {
        let id = u32::MAX - u32::try_from(slot).unwrap_or(0);
        data.structure.pole.insert_default(
            slot,
            ObjectHandle {
                id,
                path: PathBuf::from(format!("<builtin>/pole_{slot}")),
                is_static: false,
            },
        );
    }
}

pub fn execute(
    ctx: &mut ParseContext<'_>,
    data: &mut RouteData,
    command: StructureCommand,
    expr: &Expression,
) -> Result<(), RouteError> {
    match object_kind(command) {
        Some(kind) => object(ctx, data, kind, expr),
        None => match command {
            StructureCommand::Background => background(ctx, data, expr),
            StructureCommand::BackgroundX => {
                if let Some(index) = background_index(ctx, expr) {
                    if let Some(n) = ctx.arg_int(expr, 0, "Repetitions") {
                        match u32::try_from(n) {
                            Ok(n) if n > 0 => data.backgrounds.entry(index).or_default().repetitions = n,
                            _ => ctx.error(
                                DiagnosticKind::InvalidArgument,
                                format!("BackgroundX repetitions must be positive, not {n}"),
                                &expr.location,
                            ),
                        }
                    }
                }
                Ok(())
            }
            StructureCommand::BackgroundAspect => {
                if let Some(index) = background_index(ctx, expr) {
                    if let Some(keep) = ctx.arg_flag(expr, 0, "BackgroundAspect") {
                        data.backgrounds.entry(index).or_default().keep_aspect = keep;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        },
    }
}

fn object_kind(command: StructureCommand) -> Option<StructureKind> {
    Some(match command {
        StructureCommand::Rail => StructureKind::Rail,
        StructureCommand::Ground => StructureKind::Ground,
        StructureCommand::Pole => StructureKind::Pole,
        StructureCommand::WallLeft => StructureKind::WallLeft,
        StructureCommand::WallRight => StructureKind::WallRight,
        StructureCommand::DikeLeft => StructureKind::DikeLeft,
        StructureCommand::DikeRight => StructureKind::DikeRight,
        StructureCommand::FormLeft => StructureKind::FormLeft,
        StructureCommand::FormRight => StructureKind::FormRight,
        StructureCommand::FormCenterLeft => StructureKind::FormCenterLeft,
        StructureCommand::FormCenterRight => StructureKind::FormCenterRight,
        StructureCommand::RoofLeft => StructureKind::RoofLeft,
        StructureCommand::RoofRight => StructureKind::RoofRight,
        StructureCommand::RoofCenterLeft => StructureKind::RoofCenterLeft,
        StructureCommand::RoofCenterRight => StructureKind::RoofCenterRight,
        StructureCommand::CrackLeft => StructureKind::CrackLeft,
        StructureCommand::CrackRight => StructureKind::CrackRight,
        StructureCommand::FreeObject => StructureKind::FreeObject,
        StructureCommand::Beacon => StructureKind::Beacon,
        StructureCommand::Weather => StructureKind::Weather,
        StructureCommand::Background
        | StructureCommand::BackgroundX
        | StructureCommand::BackgroundAspect => return None,
    })
}

fn object(
    ctx: &mut ParseContext<'_>,
    data: &mut RouteData,
    kind: StructureKind,
    expr: &Expression,
) -> Result<(), RouteError> {
    // `Pole(additionalRails; type)`: the last index names the slot.
    let position = if kind == StructureKind::Pole {
        expr.indices.len().saturating_sub(1)
    } else {
        0
    };
    let Some(index) = ctx.index(expr, position, kind.label()) else {
        return Ok(());
    };
    if index < 0 {
        ctx.error(
            DiagnosticKind::IndexOutOfRange,
            format!("{} index {index} is negative", kind.label()),
            &expr.location,
        );
        return Ok(());
    }
    let Some(reference) = ctx.required_text(expr, 0, "Object file") else {
        return Ok(());
    };
    let handle = ctx.load_structure(reference, kind, &expr.location)?;
    let guard = (kind == StructureKind::Pole).then_some(POLE_GUARD);
    match data.structure.dictionary_mut(kind).add(index, handle, guard) {
        Ok(AddOutcome::Stored) => {}
        Ok(AddOutcome::Kept) => ctx.warning(
            DiagnosticKind::IndexOutOfRange,
            format!("Pole {index} is a built-in default and was not replaced"),
            &expr.location,
        ),
        Err(e) => ctx.error(DiagnosticKind::IndexOutOfRange, format!("{} {e}", kind.label()), &expr.location),
    }
    Ok(())
}

fn background_index(ctx: &mut ParseContext<'_>, expr: &Expression) -> Option<i32> {
    let index = ctx.index(expr, 0, "Background index")?;
    match i32::try_from(index) {
        Ok(i) if i >= 0 => Some(i),
        _ => {
            ctx.error(
                DiagnosticKind::IndexOutOfRange,
                format!("Background index {index} is negative"),
                &expr.location,
            );
            None
        }
    }
}

fn background(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) -> Result<(), RouteError> {
    let Some(index) = background_index(ctx, expr) else {
        return Ok(());
    };
    let Some(reference) = ctx.required_text(expr, 0, "Background file") else {
        return Ok(());
    };
    let params = TextureParams {
        transparent_color: None,
        wrap_horizontal: true,
    };

    let source = if paths::has_extension(reference, XML_EXTENSION) {
        let Some((xml, folder)) = ctx.read_resource(reference, &expr.location)? else {
            return Ok(());
        };
        let specs = match parse_background_layers(&xml) {
            Ok(specs) => specs,
            Err(e) => {
                ctx.error(
                    DiagnosticKind::InvalidArgument,
                    format!("Background file {reference} is invalid: {e}"),
                    &expr.location,
                );
                return Ok(());
            }
        };
        let mut layers = Vec::with_capacity(specs.len());
        for spec in specs {
            let texture = ctx.register_texture(&folder, &spec.texture, &params, &expr.location)?;
            layers.push(BackgroundLayer {
                time: spec.time,
                mode: spec.mode,
                texture,
                repetitions: spec.repetitions,
                transition_time: spec.transition_time,
            });
        }
        BackgroundSource::Dynamic { layers }
    } else {
        let folder = ctx.object_folder();
        let texture = ctx.register_texture(&folder, reference, &params, &expr.location)?;
        BackgroundSource::Static { texture }
    };

    let entry: &mut Background = data.backgrounds.entry(index).or_default();
    entry.source = source;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::panic)]
mod tests {
    use std::path::PathBuf;

    use super::install_default_poles;
    use crate::diagnostics::DiagnosticKind;
    use crate::error::RouteError;
    use crate::loader::mock::MockLoader;
    use crate::model::{BackgroundSource, StructureKind};
    use crate::registry::handlers::testing::{expr, Harness};

    #[test]
    fn last_writer_wins() {
        let mut h = Harness::new();
        h.ok(&expr("Structure", "Rail", &["1"], &["a.csv"]));
        h.ok(&expr("Structure", "Rail", &["1"], &["b.csv"]));
        let rail = h.data.structure.rail.get(1).unwrap();
        assert_eq!(rail.path, PathBuf::from("/route/b.csv"));
    }

    #[test]
    fn negative_index_is_not_stored() {
        let mut h = Harness::new();
        h.run(&expr("Structure", "Ground", &["-1"], &["g.csv"])).unwrap();
        assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::IndexOutOfRange);
        assert!(h.data.structure.ground.is_empty());
        assert!(h.loader.requested().is_empty());
    }

    #[test]
    fn deformable_objects_load_static() {
        let mut h = Harness::new();
        h.ok(&expr("Structure", "FormCL", &["0"], &["form.csv"]));
        h.ok(&expr("Structure", "FormL", &["0"], &["edge.csv"]));
        assert!(h.data.structure.dictionary(StructureKind::FormCenterLeft).get(0).unwrap().is_static);
        assert!(!h.data.structure.form_left.get(0).unwrap().is_static);
    }

    #[test]
    fn missing_object_leaves_slot_empty() {
        let mut h = Harness::with_loader(MockLoader::new().with_missing("/route/gone.csv"));
        for ext in ["csv", "b3d", "x", "animated", "obj"] {
            h.loader.missing.insert(PathBuf::from(format!("/route/gone.csv.{ext}")));
        }
        h.run(&expr("Structure", "Rail", &["2"], &["gone.csv"])).unwrap();
        assert!(h.sink.has_critical());
        assert!(!h.data.structure.rail.is_declared(2));
    }

    #[test]
    fn loader_failure_aborts_a_full_load() {
        let mut h = Harness::with_loader(MockLoader::new().with_failing("/route/bad.csv"));
        let err = h.run(&expr("Structure", "Rail", &["0"], &["bad.csv"])).unwrap_err();
        assert!(matches!(err, RouteError::Loader(_)));
    }

    #[test]
    fn pole_defaults_are_protected() {
        let mut h = Harness::new();
        install_default_poles(&mut h.data);
        h.run(&expr("Structure", "Pole", &["0", "1"], &["mine.csv"])).unwrap();
        assert_eq!(h.sink.entries()[0].kind, DiagnosticKind::IndexOutOfRange);
        assert!(h.data.structure.pole.get(1).unwrap().path.starts_with("<builtin>"));
        h.sink = crate::diagnostics::Diagnostics::new();
        h.ok(&expr("Structure", "Pole", &["0", "3"], &["mine.csv"]));
        assert_eq!(h.data.structure.pole.get(3).unwrap().path, PathBuf::from("/route/mine.csv"));
    }

    #[test]
    fn static_background() {
        let mut h = Harness::new();
        h.ok(&expr("Structure", "Back", &["0"], &["sky.png"]));
        h.ok(&expr("Structure", "BackX", &["0"], &["4"]));
        let bg = &h.data.backgrounds[&0];
        assert_eq!(bg.repetitions, 4);
        let BackgroundSource::Static { texture } = &bg.source else {
            panic!("expected a static background");
        };
        assert_eq!(texture.as_ref().unwrap().path, PathBuf::from("/route/sky.png"));
    }

    #[test]
    fn dynamic_background() {
        let xml = "<openBVE>
            <Background><Time>18.00</Time><Texture>night.png</Texture></Background>
            <Background><Time>06.00</Time><Mode>FadeIn</Mode><Texture>day.png</Texture></Background>
        </openBVE>";
        let mut h = Harness::with_loader(MockLoader::new().with_file("/route/sky/dyn.xml", xml));
        h.ok(&expr("Structure", "Background", &["1"], &["sky\\dyn.xml"]));
        let BackgroundSource::Dynamic { layers } = &h.data.backgrounds[&1].source else {
            panic!("expected a dynamic background");
        };
        assert_eq!(layers.len(), 2);
        assert_eq!(
            layers[0].texture.as_ref().unwrap().path,
            PathBuf::from("/route/sky/day.png")
        );
    }

    #[test]
    fn background_aspect_flag() {
        let mut h = Harness::new();
        h.ok(&expr("Structure", "BackgroundAspect", &["2"], &["1"]));
        assert!(h.data.backgrounds[&2].keep_aspect);
        assert_eq!(h.data.backgrounds[&2].source, BackgroundSource::Unset);
    }
}
