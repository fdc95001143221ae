use std::fs;
use std::path::Path;

use gypsum_eval::CommandRunner;
use tempfile::TempDir;

use crate::context::{BuildContext, BuildContextBuilder};
use crate::error::GypError;
use crate::graph::{Target, TargetGraph};
use crate::loader::Loader;
use crate::plan::BuildPlan;

mod graph;
mod loader;
mod plan;

/// A source tree on disk.
pub(crate) struct Tree {
    dir: TempDir,
}

impl Tree {
    pub(crate) fn new(files: &[(&str, &str)]) -> Tree {
        let dir = tempfile::tempdir().unwrap();
        for (path, contents) in files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        Tree { dir }
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn path(&self, relative: &str) -> String {
        self.dir.path().join(relative).to_string_lossy().into_owned()
    }

    /// A context for `build_file` with the tree's root as the toplevel directory.
    pub(crate) fn context(&self, build_file: &str) -> BuildContext {
        BuildContextBuilder::default()
            .build_files(vec![self.path(build_file)])
            .depth(Some(self.path(".")))
            .build()
            .unwrap()
    }
}

pub(crate) fn build_graph(ctx: &BuildContext) -> Result<TargetGraph, GypError> {
    let runner = CommandRunner::new(None);
    let loader = Loader::new(ctx, &runner, "ninja");
    let files = loader.load_all()?;
    Ok(TargetGraph::build(&files, &loader, ctx.check)?)
}

pub(crate) fn build_plan(ctx: &BuildContext) -> Result<BuildPlan, GypError> {
    let graph = build_graph(ctx)?;
    Ok(BuildPlan::resolve(&graph, ctx)?)
}

pub(crate) fn target<'g>(graph: &'g TargetGraph, name: &str) -> &'g Target {
    graph
        .targets
        .values()
        .find(|t| t.name.name == name)
        .unwrap_or_else(|| panic!("no target {name}"))
}

pub(crate) fn names(
    graph: &TargetGraph,
    targets: &[crate::target::QualifiedTarget],
) -> Vec<String> {
    targets
        .iter()
        .map(|t| graph.get(t).map(|t| t.name.name.clone()).unwrap())
        .collect()
}
