use crate::dsl::lexer::Expression;
use crate::error::RouteError;
use crate::model::RouteData;

use super::handlers::{self, ParseContext};
use super::Command;

/// Execute one resolved command against the route being built.
/// This is the single dispatch point for every statement of a route file.
pub fn execute(
    ctx: &mut ParseContext<'_>,
    data: &mut RouteData,
    command: Command,
    expr: &Expression,
) -> Result<(), RouteError> {
    if ctx.preview_only() && !command.applies_in_preview() {
        return Ok(());
    }
    log::trace!("{} at {}", command.qualified_name(), expr.location);
    match command {
        Command::Options(c) => {
            handlers::options::execute(ctx, data, c, expr);
            Ok(())
        }
        Command::Route(c) => handlers::route::execute(ctx, data, c, expr),
        Command::Structure(c) => handlers::structure::execute(ctx, data, c, expr),
        Command::Signal(c) => handlers::signal::execute(ctx, data, c, expr),
        Command::Train(c) => handlers::train::execute(ctx, data, c, expr),
        Command::Cycle(c) => {
            handlers::cycle::execute(ctx, data, c, expr);
            Ok(())
        }
        Command::Track(c) => handlers::track::execute(ctx, data, c, expr),
    }
}
