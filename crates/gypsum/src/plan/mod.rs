//! The build plan: what every target runs, reads and writes, with paths resolved and variables
//! expanded, independent of any backend.

pub mod paths;
pub mod steps;

use gypsum_syntax::{Mapping, Value};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::context::BuildContext;
use crate::graph::{Target, TargetGraph};
use crate::target::{QualifiedTarget, TargetType};
pub use paths::{BuildPath, PathRoot};

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("{target} has several files with the same basename:\n{}", format_collisions(.collisions))]
    DuplicateBasename {
        target: String,
        collisions: Vec<(String, Vec<String>)>,
    },
    #[error("{output} is produced by both {first} and {second}")]
    DuplicateOutput {
        output: String,
        first: String,
        second: String,
    },
    #[error("unknown placeholder {placeholder} in target {target}")]
    UnknownPlaceholder { placeholder: String, target: String },
    #[error("configuration {0} is not defined by any target")]
    UnknownConfiguration(String),
    #[error("{target}: {message}")]
    Invalid { target: String, message: String },
}

fn format_collisions(collisions: &[(String, Vec<String>)]) -> String {
    collisions
        .iter()
        .map(|(basename, paths)| format!("  {basename}: {}", paths.join(" ")))
        .collect::<Vec<_>>()
        .join("\n")
}

impl PlanError {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanError::DuplicateBasename { .. } => "DuplicateBasenameError",
            PlanError::DuplicateOutput { .. } => "DuplicateOutputError",
            PlanError::UnknownPlaceholder { .. } => "UnknownPlaceholderError",
            PlanError::UnknownConfiguration(_) => "ConfigurationError",
            PlanError::Invalid { .. } => "GypError",
        }
    }

    pub(crate) fn invalid(target: &QualifiedTarget, message: impl Into<String>) -> Self {
        PlanError::Invalid {
            target: target.to_string(),
            message: message.into(),
        }
    }
}

pub type PlanResult<T> = Result<T, PlanError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    C,
    Cxx,
}

impl Language {
    /// The compiler a source goes through, if any. Assembly goes through the C compiler.
    pub fn for_extension(extension: &str) -> Option<Language> {
        match extension {
            "c" | "s" | "S" => Some(Language::C),
            "cc" | "cpp" | "cxx" => Some(Language::Cxx),
            _ => None,
        }
    }
}

/// A custom command: an action as declared, or a rule applied to one source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionStep {
    /// The action's or rule's name.
    pub name: String,
    /// For a rule, the source it was applied to.
    pub rule_source: Option<BuildPath>,
    pub inputs: Vec<BuildPath>,
    pub outputs: Vec<BuildPath>,
    /// Shell command line, run from the build file's directory. `PRODUCT_DIR` and
    /// `CONFIGURATION_NAME` placeholders are left for the backend.
    pub command: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyStep {
    pub source: BuildPath,
    pub destination: BuildPath,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompileStep {
    pub source: BuildPath,
    pub object: BuildPath,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkStep {
    pub output: BuildPath,
    pub objects: Vec<BuildPath>,
    /// Static libraries of dependencies, dependents first.
    pub static_libraries: Vec<BuildPath>,
    pub shared_libraries: Vec<BuildPath>,
    /// `libraries` as the build files give them: `-lfoo` flags or paths.
    pub system_libraries: Vec<String>,
}

/// Compiler and linker settings of one configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigSettings {
    pub defines: Vec<String>,
    pub include_dirs: Vec<BuildPath>,
    pub cflags: Vec<String>,
    pub cflags_c: Vec<String>,
    pub cflags_cc: Vec<String>,
    pub ldflags: Vec<String>,
    /// Backend-neutral switches (`warnings_as_errors`, `optimization`, `debug_info`), which
    /// each backend maps to its toolchain's flags.
    pub generic: IndexMap<String, String>,
}

pub const GENERIC_SETTINGS: [&str; 3] = ["warnings_as_errors", "optimization", "debug_info"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetPlan {
    pub name: QualifiedTarget,
    pub target_type: TargetType,
    /// The build file's directory, relative to the toplevel directory.
    pub base: String,
    pub actions: Vec<ActionStep>,
    pub copies: Vec<CopyStep>,
    pub compiles: Vec<CompileStep>,
    pub link: Option<LinkStep>,
    /// The file dependents wait for: the linked product, or a stamp.
    pub product: BuildPath,
    /// Products of the targets that must be built first.
    pub prerequisites: Vec<BuildPath>,
    pub configurations: IndexMap<String, ConfigSettings>,
}

static NO_SETTINGS: Lazy<ConfigSettings> = Lazy::new(ConfigSettings::default);

impl TargetPlan {
    pub fn settings(&self, configuration: &str) -> &ConfigSettings {
        self.configurations.get(configuration).unwrap_or(&NO_SETTINGS)
    }

    /// Outputs of actions, rules and copies, which compiles must wait for.
    pub fn generated(&self) -> impl Iterator<Item = &BuildPath> {
        self.actions
            .iter()
            .flat_map(|a| a.outputs.iter())
            .chain(self.copies.iter().map(|c| &c.destination))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildPlan {
    /// Configurations to generate, in first-declared order.
    pub configurations: Vec<String>,
    /// Dependencies before dependents.
    pub targets: Vec<TargetPlan>,
    /// Every build file and include read, for regeneration.
    pub build_files: Vec<String>,
}

impl BuildPlan {
    /// Resolve every target of `graph`.
    pub fn resolve(graph: &TargetGraph, ctx: &BuildContext) -> PlanResult<BuildPlan> {
        let configurations = plan_configurations(graph, ctx.generator_flag("config"))?;
        let depth = ctx.depth();
        info!(
            "planning {} targets for {}",
            graph.targets.len(),
            configurations.join(", ")
        );

        let mut products: IndexMap<&QualifiedTarget, BuildPath> = IndexMap::new();
        let mut targets = Vec::with_capacity(graph.targets.len());
        for target in graph.ordered() {
            let plan = steps::plan_target(graph, target, &depth, &configurations, &products)?;
            products.insert(&target.name, plan.product.clone());
            targets.push(plan);
        }

        check_unique_outputs(&targets)?;
        debug!("build plan complete");
        Ok(BuildPlan {
            configurations,
            targets,
            build_files: graph.build_files.clone(),
        })
    }
}

/// Every concrete configuration any target declares, or only `only` if given.
fn plan_configurations(graph: &TargetGraph, only: Option<&str>) -> PlanResult<Vec<String>> {
    let mut names: Vec<String> = Vec::new();
    for target in graph.targets.values() {
        for (name, _) in target.configurations() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    match only {
        Some(only) if names.iter().any(|n| n == only) => Ok(vec![only.to_string()]),
        Some(only) => Err(PlanError::UnknownConfiguration(only.to_string())),
        None => Ok(names),
    }
}

/// A target's settings for `name`, falling back to its default configuration when it does not
/// declare that one.
pub(crate) fn target_configuration<'t>(target: &'t Target, name: &str) -> Option<&'t Mapping> {
    target
        .configuration(name)
        .or_else(|| target.configuration(target.default_configuration()?))
}

fn check_unique_outputs(targets: &[TargetPlan]) -> PlanResult<()> {
    let mut producers: IndexMap<&BuildPath, String> = IndexMap::new();
    for target in targets {
        let outputs = target
            .generated()
            .chain(target.compiles.iter().map(|c| &c.object))
            .chain(std::iter::once(&target.product));
        for output in outputs {
            let producer = target.name.to_string();
            if let Some(first) = producers.get(output) {
                return Err(PlanError::DuplicateOutput {
                    output: output.to_string(),
                    first: first.clone(),
                    second: producer,
                });
            }
            producers.insert(output, producer);
        }
    }
    Ok(())
}

pub(crate) fn scalar_setting(config: &Mapping, key: &str) -> Option<String> {
    config.get(key).and_then(Value::to_scalar_string)
}
