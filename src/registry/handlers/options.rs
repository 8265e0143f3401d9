use crate::diagnostics::DiagnosticKind;
use crate::dsl::lexer::Expression;
use crate::dsl::numeric::parse_double_legacy;
use crate::model::{CantBehavior, FogBehavior, ObjectVisibility, RouteData, SectionBehavior};
use crate::registry::OptionsCommand;

use super::ParseContext;

pub fn execute(ctx: &mut ParseContext<'_>, data: &mut RouteData, command: OptionsCommand, expr: &Expression) {
    match command {
        OptionsCommand::UnitOfLength => unit_of_length(ctx, data, expr),
        OptionsCommand::UnitOfSpeed => {
            if let Some(v) = positive(ctx, expr, "UnitOfSpeed") {
                data.options.unit_of_speed = v;
            }
        }
        OptionsCommand::BlockLength => {
            if let Some(v) = positive(ctx, expr, "BlockLength") {
                data.block_interval = v;
            }
        }
        OptionsCommand::ObjectVisibility => {
            if let Some(flag) = ctx.arg_flag(expr, 0, "ObjectVisibility") {
                data.options.object_visibility = if flag {
                    ObjectVisibility::TrackBased
                } else {
                    ObjectVisibility::Legacy
                };
            }
        }
        OptionsCommand::SectionBehavior => {
            if let Some(flag) = ctx.arg_flag(expr, 0, "SectionBehavior") {
                data.options.section_behavior = if flag {
                    SectionBehavior::Simplified
                } else {
                    SectionBehavior::Default
                };
            }
        }
        OptionsCommand::CantBehavior => {
            if let Some(flag) = ctx.arg_flag(expr, 0, "CantBehavior") {
                data.options.cant_behavior = if flag {
                    CantBehavior::Signed
                } else {
                    CantBehavior::Unsigned
                };
            }
        }
        OptionsCommand::FogBehavior => {
            if let Some(flag) = ctx.arg_flag(expr, 0, "FogBehavior") {
                data.options.fog_behavior = if flag {
                    FogBehavior::Interpolated
                } else {
                    FogBehavior::BlockBased
                };
            }
        }
        OptionsCommand::EnableBveTsHacks => {
            if let Some(flag) = ctx.arg_flag(expr, 0, "EnableBveTsHacks") {
                data.options.enable_hacks = flag;
            }
        }
    }
}

/// Every argument is a factor. Unusable ones fall back to 1.
fn unit_of_length(ctx: &mut ParseContext<'_>, data: &mut RouteData, expr: &Expression) {
    if expr.arguments.is_empty() {
        data.options.unit_of_length = vec![1.0];
        return;
    }
    let mut factors = Vec::with_capacity(expr.arguments.len());
    for (i, raw) in expr.arguments.iter().enumerate() {
        let text = raw.trim();
        let factor = if text.is_empty() {
            // An omitted factor means metres.
            Some(1.0)
        } else {
            parse_double_legacy(text).filter(|f| *f > 0.0)
        };
        match factor {
            Some(f) => factors.push(f),
            None => {
                ctx.error(
                    DiagnosticKind::InvalidArgument,
                    format!("UnitOfLength factor {i} '{text}' must be a positive number"),
                    &expr.location,
                );
                factors.push(1.0);
            }
        }
    }
    data.options.unit_of_length = factors;
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
