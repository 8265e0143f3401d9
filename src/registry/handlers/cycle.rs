use crate::diagnostics::DiagnosticKind;
use crate::dsl::lexer::Expression;
use crate::model::{Cycle, ObjectDictionary, RouteData};
use crate::registry::CycleCommand;

use super::ParseContext;

/// `Cycle.Ground(i) a;b;c` and `Cycle.Rail(i) a;b;c`.
///
/// Members must name structures declared earlier. An undeclared or malformed
/// member is reported and replaced by index 0.
pub fn execute(ctx: &mut ParseContext<'_>, data: &mut RouteData, command: CycleCommand, expr: &Expression) {
    let (label, base) = match command {
        CycleCommand::Ground => ("Ground", &data.structure.ground),
        CycleCommand::Rail => ("Rail", &data.structure.rail),
    };
    let Some(index) = ctx.index(expr, 0, "Cycle index") else {
        return;
    };
    let members = members(ctx, expr, label, base);
    let Some(cycle) = Cycle::new(members) else {
        ctx.error(
            DiagnosticKind::InvalidArgument,
            format!("Cycle.{label}({index}) has no members"),
            &expr.location,
        );
        return;
    };
    let table = match command {
        CycleCommand::Ground => &mut data.structure.cycles,
        CycleCommand::Rail => &mut data.structure.rail_cycles,
    };
    if let Err(e) = table.add(index, Some(cycle), None) {
        ctx.error(DiagnosticKind::IndexOutOfRange, format!("Cycle.{label} {e}"), &expr.location);
    }
}

fn members(ctx: &mut ParseContext<'_>, expr: &Expression, label: &str, base: &ObjectDictionary) -> Vec<usize> {
    let mut members = Vec::with_capacity(expr.arguments.len());
    for i in 0..expr.arguments.len() {
        if ctx.arg_text(expr, i).is_none() {
            continue;
        }
        let member = ctx
            .arg_declared(expr, i, label, |slot| base.is_declared(slot))
            .unwrap_or(0);
        members.push(member);
    }
    members
}
