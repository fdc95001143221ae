//! One run, start to finish: load, build the graph, plan, emit. Every stage fails fast; nothing
//! is written unless the whole plan resolves.

use gypsum_eval::CommandRunner;
use tracing::info;

use crate::context::BuildContext;
use crate::error::GypError;
use crate::generator::{self, EmitContext};
use crate::graph::TargetGraph;
use crate::loader::Loader;
use crate::plan::BuildPlan;

/// Generate every requested format. Returns the files written, in order.
pub fn run(ctx: &BuildContext) -> Result<Vec<String>, GypError> {
    let mut written = Vec::new();
    for format in &ctx.formats {
        written.extend(run_format(ctx, format)?);
    }
    Ok(written)
}

fn run_format(ctx: &BuildContext, format: &str) -> Result<Vec<String>, GypError> {
    // Fail on an unknown format before doing any work
    let emitter = generator::emitter(format)?;
    info!("generating {format} files for {}", ctx.build_files.join(" "));

    // Build files see GENERATOR, so each format loads them afresh
    let runner = CommandRunner::new(ctx.command_timeout);
    let loader = Loader::new(ctx, &runner, format);
    let files = loader.load_all()?;
    let graph = TargetGraph::build(&files, &loader, ctx.check)?;
    let plan = BuildPlan::resolve(&graph, ctx)?;

    let cx = EmitContext::new(ctx, &plan);
    Ok(generator::emit(emitter, &cx)?)
}
