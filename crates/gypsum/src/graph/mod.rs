//! The target graph: every target of every loaded build file, its resolved dependencies, and
//! the settings it ends up with once dependents, the late phase and configurations are applied.
//!
//! Building the graph follows a fixed sequence:
//!
//! 1. collect targets and qualify their dependencies ([input])
//! 2. order them, failing on cycles
//! 3. publish dependent settings and adjust static library dependencies ([settings])
//! 4. run the late phase, set up configurations, apply list filters and validate ([configs])

pub mod configs;
pub mod input;
pub mod settings;

use std::collections::HashSet;

use gypsum_eval::EvalError;
use gypsum_syntax::{Mapping, Value};
use gypsum_util::fifo_heap::FifoHeap;
use indexmap::IndexMap;
use itertools::Itertools;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use thiserror::Error;
use tracing::{debug, info};

use crate::loader::{BuildFile, Loader};
use crate::target::{QualifiedTarget, TargetType};

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate target definitions for {target} in {build_file}")]
    DuplicateTarget { target: String, build_file: String },
    #[error("Dependency '{dependency}' not found while trying to load target {target}")]
    MissingDependency { dependency: String, target: String },
    #[error("rule {rule} exists in duplicate, target {target}")]
    DuplicateRule { rule: String, target: String },
    #[error("extension {extension} associated with multiple rules, target {target} rules {first} and {second}")]
    DuplicateRuleExtension {
        extension: String,
        target: String,
        first: String,
        second: String,
    },
    #[error("Cycle in dependency graph detected: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },
    #[error("{target}: {message}")]
    InvalidTarget { target: String, message: String },
    #[error("{key} not allowed in the {configuration} configuration, found in target {target}")]
    InvalidConfigurationKey {
        key: String,
        configuration: String,
        target: String,
    },
    #[error("{target}: {message}")]
    Check { target: String, message: String },
    #[error("{target}: {source}")]
    Eval {
        target: String,
        #[source]
        source: EvalError,
    },
}

impl GraphError {
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::DuplicateTarget { .. } => "DuplicateTargetError",
            GraphError::MissingDependency { .. } => "MissingDependencyError",
            GraphError::DuplicateRule { .. } | GraphError::DuplicateRuleExtension { .. } => {
                "DuplicateRuleError"
            }
            GraphError::DependencyCycle { .. } => "DependencyCycleError",
            GraphError::InvalidTarget { .. } => "GypError",
            GraphError::InvalidConfigurationKey { .. } => "ConfigurationError",
            GraphError::Check { .. } => "CheckError",
            GraphError::Eval { source, .. } => source.kind(),
        }
    }

    pub(crate) fn invalid(target: &QualifiedTarget, message: impl Into<String>) -> Self {
        GraphError::InvalidTarget {
            target: target.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn eval(target: &QualifiedTarget) -> impl FnOnce(EvalError) -> GraphError + '_ {
        move |source| GraphError::Eval {
            target: target.to_string(),
            source,
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// One target and what the graph knows about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub name: QualifiedTarget,
    pub target_type: TargetType,
    /// The target's settings. After [TargetGraph::build] the keys that vary by configuration
    /// live under `configurations`.
    pub dict: Mapping,
    /// Declared dependencies, qualified and without duplicates.
    pub dependencies: Vec<QualifiedTarget>,
    pub export_dependent_settings: Vec<QualifiedTarget>,
    /// What must be built before this target, after static library adjustment. Linkable
    /// targets list everything they link, dependents before dependencies.
    pub build_dependencies: Vec<QualifiedTarget>,
}

impl Target {
    pub fn is_hard_dependency(&self) -> bool {
        self.dict.get("hard_dependency").is_some_and(Value::is_truthy)
    }

    pub fn build_file(&self) -> &str {
        &self.name.build_file
    }

    /// Concrete configurations in declaration order.
    pub fn configurations(&self) -> impl Iterator<Item = (&String, &Mapping)> {
        self.dict
            .get("configurations")
            .and_then(Value::as_mapping)
            .into_iter()
            .flatten()
            .filter_map(|(name, config)| config.as_mapping().map(|c| (name, c)))
    }

    pub fn configuration(&self, name: &str) -> Option<&Mapping> {
        self.configurations()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c)
    }

    pub fn default_configuration(&self) -> Option<&str> {
        self.dict.get("default_configuration").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct TargetGraph {
    /// Targets in declaration order.
    pub targets: IndexMap<QualifiedTarget, Target>,
    /// Indexes into `targets`, dependencies before dependents.
    order: Vec<usize>,
    /// Every build file and include that went into the graph.
    pub build_files: Vec<String>,
}

impl TargetGraph {
    /// Turn loaded build files into a fully resolved graph.
    pub fn build(
        files: &IndexMap<String, BuildFile>,
        loader: &Loader<'_>,
        check: bool,
    ) -> GraphResult<TargetGraph> {
        let mut targets = input::collect_targets(files)?;
        input::qualify_dependencies(&mut targets)?;
        info!("{} targets in {} build files", targets.len(), files.len());

        let order = dependency_order(&targets)?;
        let mut graph = TargetGraph {
            targets,
            order,
            build_files: files
                .values()
                .flat_map(|f| std::iter::once(&f.path).chain(&f.included_files))
                .unique()
                .cloned()
                .collect(),
        };

        settings::fold_libraries(&mut graph)?;
        settings::publish_dependent_settings(&mut graph)?;
        settings::adjust_static_libraries(&mut graph);

        for index in graph.order.clone() {
            let target = &mut graph.targets[index];
            configs::process_late_phase(target, loader)?;
            configs::set_up_configurations(target)?;
            configs::apply_list_filters(target)?;
            configs::validate(target, check)?;
        }
        debug!("target graph complete");
        Ok(graph)
    }

    /// Targets with dependencies first; ties follow declaration order.
    pub fn ordered(&self) -> impl Iterator<Item = &Target> {
        self.order.iter().map(|&i| &self.targets[i])
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn get(&self, name: &QualifiedTarget) -> Option<&Target> {
        self.targets.get(name)
    }

    pub(crate) fn index_of(&self, name: &QualifiedTarget) -> Option<usize> {
        self.targets.get_index_of(name)
    }
}

fn build_petgraph(targets: &IndexMap<QualifiedTarget, Target>) -> DiGraph<usize, ()> {
    let mut graph = DiGraph::with_capacity(targets.len(), 0);
    for index in 0..targets.len() {
        graph.add_node(index);
    }
    for (index, target) in targets.values().enumerate() {
        for dependency in &target.dependencies {
            if let Some(dep) = targets.get_index_of(dependency) {
                graph.update_edge(NodeIndex::new(index), NodeIndex::new(dep), ());
            }
        }
    }
    graph
}

/// Topologically sort `targets`, dependencies first. Among targets that are ready at the same
/// time the earliest declared goes first.
pub fn dependency_order(targets: &IndexMap<QualifiedTarget, Target>) -> GraphResult<Vec<usize>> {
    let graph = build_petgraph(targets);
    if let Some(cycle) = find_cycle(&graph, targets) {
        return Err(GraphError::DependencyCycle {
            cycle: cycle
                .into_iter()
                .map(|i| targets.get_index(i).map(|(k, _)| k.to_string()).unwrap_or_default())
                .collect(),
        });
    }

    let mut pending: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Outgoing).count())
        .collect();
    let mut ready: FifoHeap<usize> = pending
        .iter()
        .enumerate()
        .filter(|(_, count)| **count == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(targets.len());
    while let Some(index) = ready.pop() {
        order.push(index);
        for dependent in graph.neighbors_directed(NodeIndex::new(index), Direction::Incoming) {
            let slot = &mut pending[dependent.index()];
            *slot -= 1;
            if *slot == 0 {
                ready.push(dependent.index());
            }
        }
    }
    Ok(order)
}

/// The first cycle, by declaration order, as a path that starts and ends on the same target.
fn find_cycle(
    graph: &DiGraph<usize, ()>,
    targets: &IndexMap<QualifiedTarget, Target>,
) -> Option<Vec<usize>> {
    let mut components: Vec<Vec<usize>> = tarjan_scc(graph)
        .into_iter()
        .map(|scc| scc.into_iter().map(NodeIndex::index).sorted().collect_vec())
        .filter(|scc: &Vec<usize>| {
            scc.len() > 1 || graph.contains_edge(NodeIndex::new(scc[0]), NodeIndex::new(scc[0]))
        })
        .collect();
    // Report by toolset, then declaration order
    components.sort_by_key(|scc| {
        let first = scc[0];
        let toolset = targets.get_index(first).map(|(k, _)| k.toolset.clone());
        (toolset, first)
    });

    let scc = components.first()?;
    let members: HashSet<usize> = scc.iter().copied().collect();
    let start = scc[0];
    let mut path = vec![start];
    let mut visited = HashSet::from([start]);
    walk_cycle(targets, &members, start, start, &mut path, &mut visited).then_some(path)
}

fn walk_cycle(
    targets: &IndexMap<QualifiedTarget, Target>,
    members: &HashSet<usize>,
    start: usize,
    node: usize,
    path: &mut Vec<usize>,
    visited: &mut HashSet<usize>,
) -> bool {
    let Some((_, target)) = targets.get_index(node) else {
        return false;
    };
    for dependency in &target.dependencies {
        let Some(next) = targets.get_index_of(dependency) else {
            continue;
        };
        if !members.contains(&next) {
            continue;
        }
        if next == start {
            path.push(start);
            return true;
        }
        if visited.insert(next) {
            path.push(next);
            if walk_cycle(targets, members, start, next, path, visited) {
                return true;
            }
            path.pop();
        }
    }
    false
}
