use crate::diagnostics::DiagnosticKind;
use crate::dsl::lexer::Expression;
use crate::error::RouteError;
use crate::model::{BlendMode, GlowAttenuation, RouteData, SignalDefinition, SignalGlow};
use crate::paths::{self, ANIMATED_EXTENSION};
use crate::registry::SignalCommand;

use super::ParseContext;

pub fn execute(
    ctx: &mut ParseContext<'_>,
    data: &mut RouteData,
    command: SignalCommand,
    expr: &Expression,
) -> Result<(), RouteError> {
    match command {
        SignalCommand::Load => load(ctx, data, expr),
    }
}

/// `Signal(i) file.animated` or `Signal(i) base; glow`.
fn load(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) -> Result<(), RouteError> {
    let Some(index) = ctx.index(expr, 0, "Signal index") else {
        return Ok(());
    };
    if index < 0 {
        ctx.error(
            DiagnosticKind::IndexOutOfRange,
            format!("Signal index {index} is negative"),
            &expr.location,
        );
        return Ok(());
    }
    let Some(reference) = ctx.required_text(expr, 0, "Signal file") else {
        return Ok(());
    };

    let definition = if paths::has_extension(reference, ANIMATED_EXTENSION) {
        ctx.load_object(reference, &expr.location)?
            .map(|object| SignalDefinition::Animated { object })
    } else {
        match ctx.load_static_object(reference, &expr.location)? {
            None => None,
            Some(base) => {
                let glow = match ctx.arg_text(expr, 1) {
                    Some(glow_ref) => ctx
                        .load_static_object(glow_ref, &expr.location)?
                        .map(|object| SignalGlow {
                            object,
                            blend: BlendMode::Additive,
                            attenuation: GlowAttenuation::DivisionExponent4,
                        }),
                    None => None,
                };
                Some(SignalDefinition::Textured { base, glow })
            }
        }
    };

    if let Err(e) = data.signals.add(index, definition, None) {
        ctx.error(DiagnosticKind::IndexOutOfRange, format!("Signal {e}"), &expr.location);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::path::PathBuf;

    use crate::loader::mock::MockLoader;
    use crate::model::{BlendMode, SignalDefinition};
    use crate::registry::handlers::testing::{expr, Harness};

    #[test]
    fn animated_signal() {
        let mut h = Harness::new();
        h.ok(&expr("Signal", "Load", &["4"], &["sig\\home.animated"]));
        let Some(SignalDefinition::Animated { object }) = h.data.signals.get(4) else {
            panic!("expected an animated signal");
        };
        assert_eq!(object.path, PathBuf::from("/route/sig/home.animated"));
    }

    #[test]
    fn base_and_glow() {
        let mut h = Harness::new();
        h.ok(&expr("Signal", "Signal", &["0"], &["base.csv", "glow.csv"]));
        let Some(SignalDefinition::Textured { base, glow }) = h.data.signals.get(0) else {
            panic!("expected a textured signal");
        };
        assert!(base.is_static);
        assert_eq!(glow.as_ref().unwrap().blend, BlendMode::Additive);
    }

    #[test]
    fn missing_glow_keeps_the_base() {
        let mut loader = MockLoader::new();
        for p in ["/route/glow.csv", "/route/glow.csv.csv", "/route/glow.csv.b3d", "/route/glow.csv.x", "/route/glow.csv.animated", "/route/glow.csv.obj"] {
            loader.missing.insert(PathBuf::from(p));
        }
        let mut h = Harness::with_loader(loader);
        h.run(&expr("Signal", "Load", &["1"], &["base.csv", "glow.csv"])).unwrap();
        assert!(h.sink.has_critical());
        let Some(SignalDefinition::Textured { glow, .. }) = h.data.signals.get(1) else {
            panic!("expected a textured signal");
        };
        assert!(glow.is_none());
    }
}
