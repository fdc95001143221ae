//! Settings that flow along dependency edges, and the dependency adjustments linking needs.
//!
//! * `all_dependent_settings` reach every target that depends on the declaring one, however
//!   indirectly.
//! * `direct_dependent_settings` reach direct dependents, plus the dependents of any target that
//!   lists the declaring target in its `export_dependent_settings`.
//! * `link_settings` reach every target that ends up linking the declaring one: they pass
//!   through static libraries and `none` targets and stop at whatever performs the link.

use std::cmp::Reverse;
use std::collections::HashMap;

use gypsum_eval::{merge_dicts, merge_lists, MergeContext};
use gypsum_syntax::{Mapping, Value};
use indexmap::IndexSet;
use tracing::trace;

use super::{GraphError, GraphResult, TargetGraph};
use crate::target::TargetType;

const DEPENDENT_SETTINGS: [&str; 3] = [
    "all_dependent_settings",
    "direct_dependent_settings",
    "link_settings",
];

fn dependency_indexes(graph: &TargetGraph, index: usize) -> Vec<usize> {
    graph.targets[index]
        .dependencies
        .iter()
        .filter_map(|d| graph.index_of(d))
        .collect()
}

/// Every transitive dependency, each after its own dependencies.
pub fn deep_dependencies(graph: &TargetGraph, index: usize) -> Vec<usize> {
    fn visit(graph: &TargetGraph, index: usize, out: &mut IndexSet<usize>) {
        for dependency in dependency_indexes(graph, index) {
            if !out.contains(&dependency) {
                visit(graph, dependency, out);
                out.insert(dependency);
            }
        }
    }
    let mut out = IndexSet::new();
    visit(graph, index, &mut out);
    out.into_iter().collect()
}

/// Direct dependencies, with what each of them exports inserted right after it.
pub fn direct_and_imported_dependencies(graph: &TargetGraph, index: usize) -> Vec<usize> {
    let mut dependencies = dependency_indexes(graph, index);
    let mut i = 0;
    while i < dependencies.len() {
        let mut insert_at = i + 1;
        for imported in &graph.targets[dependencies[i]].export_dependent_settings {
            let Some(imported) = graph.index_of(imported) else {
                continue;
            };
            if !dependencies.contains(&imported) {
                dependencies.insert(insert_at, imported);
                insert_at += 1;
            }
        }
        i += 1;
    }
    dependencies
}

/// The targets whose products `index` links, itself included. Targets that are not linked
/// themselves have none.
pub fn link_dependencies(graph: &TargetGraph, index: usize, include_shared: bool) -> Vec<usize> {
    fn visit(
        graph: &TargetGraph,
        index: usize,
        include_shared: bool,
        initial: bool,
        out: &mut IndexSet<usize>,
    ) {
        let target = &graph.targets[index];
        let target_type = target.target_type;
        let linkable = target_type.is_linkable();

        if initial && !linkable {
            return;
        }
        let traverse = target
            .dict
            .get("dependencies_traverse")
            .is_none_or(Value::is_truthy);
        if target_type == TargetType::None && !traverse {
            out.insert(index);
            return;
        }
        // Already fully linked
        if !initial
            && (matches!(target_type, TargetType::Executable | TargetType::LoadableModule)
                || (target_type == TargetType::SharedLibrary && !include_shared))
        {
            return;
        }

        if out.insert(index) && (initial || !linkable) {
            for dependency in dependency_indexes(graph, index) {
                visit(graph, dependency, include_shared, false, out);
            }
        }
    }

    let mut out = IndexSet::new();
    visit(graph, index, include_shared, true, &mut out);
    out.into_iter().collect()
}

/// A static library links nothing, so its own `libraries` belong to whoever links it.
pub fn fold_libraries(graph: &mut TargetGraph) -> GraphResult<()> {
    for target in graph.targets.values_mut() {
        if target.target_type != TargetType::StaticLibrary {
            continue;
        }
        let Some(libraries) = target.dict.shift_remove("libraries") else {
            continue;
        };
        let Value::List(libraries) = libraries else {
            return Err(GraphError::invalid(&target.name, "libraries must be a list"));
        };

        let link_settings = target
            .dict
            .entry("link_settings".to_string())
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        let Value::Mapping(link_settings) = link_settings else {
            return Err(GraphError::invalid(&target.name, "link_settings must be a dict"));
        };
        let existing = link_settings
            .entry("libraries".to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        let Value::List(existing) = existing else {
            return Err(GraphError::invalid(
                &target.name,
                "link_settings.libraries must be a list",
            ));
        };
        merge_lists(existing, &libraries, MergeContext::local(""), true, true)
            .map_err(GraphError::eval(&target.name))?;
    }
    Ok(())
}

/// Merge every kind of dependent settings into the targets they reach, then drop them.
pub fn publish_dependent_settings(graph: &mut TargetGraph) -> GraphResult<()> {
    let order = graph.order().to_vec();

    for key in DEPENDENT_SETTINGS {
        for &index in &order {
            let sources = match key {
                "all_dependent_settings" => deep_dependencies(graph, index),
                "direct_dependent_settings" => direct_and_imported_dependencies(graph, index),
                _ => {
                    let include_shared = graph.targets[index]
                        .dict
                        .get("allow_sharedlib_linksettings_propagation")
                        .is_none_or(Value::is_truthy);
                    link_dependencies(graph, index, include_shared)
                }
            };

            for source in sources {
                let from = &graph.targets[source];
                let settings = match from.dict.get(key) {
                    None => continue,
                    Some(Value::Mapping(m)) => m.clone(),
                    Some(_) => {
                        return Err(GraphError::invalid(
                            &from.name,
                            format!("{key} must be a dict"),
                        ));
                    }
                };
                let from_dir = from.name.build_file_dir().to_string();
                let from_name = from.name.clone();

                let target = &mut graph.targets[index];
                trace!("{key} of {from_name} -> {}", target.name);
                let to_dir = target.name.build_file_dir().to_string();
                merge_dicts(
                    &mut target.dict,
                    &settings,
                    MergeContext::new(&to_dir, &from_dir),
                )
                .map_err(GraphError::eval(&target.name))?;
            }
        }

        for target in graph.targets.values_mut() {
            target.dict.shift_remove(key);
        }
    }
    Ok(())
}

/// Decide what each target must wait for.
///
/// A static library only keeps dependencies it cannot build without: hard static library
/// dependencies (its own or exported to it) and direct dependencies that are not static
/// libraries. Linkable targets additionally wait for everything they link, sorted so that
/// dependents come before their dependencies.
pub fn adjust_static_libraries(graph: &mut TargetGraph) {
    let order = graph.order().to_vec();
    let position: HashMap<usize, usize> = order.iter().enumerate().map(|(p, &i)| (i, p)).collect();

    for &index in &order {
        let target = &graph.targets[index];
        let build_dependencies: Vec<usize> = match target.target_type {
            TargetType::StaticLibrary => direct_and_imported_dependencies(graph, index)
                .into_iter()
                .filter(|&d| {
                    let dependency = &graph.targets[d];
                    if dependency.target_type == TargetType::StaticLibrary {
                        dependency.is_hard_dependency()
                    } else {
                        target.dependencies.contains(&dependency.name)
                    }
                })
                .collect(),
            t if t.is_linkable() => {
                let mut dependencies = dependency_indexes(graph, index);
                for linked in link_dependencies(graph, index, true) {
                    if linked != index && !dependencies.contains(&linked) {
                        dependencies.push(linked);
                    }
                }
                dependencies.sort_by_key(|d| Reverse(position.get(d).copied().unwrap_or_default()));
                dependencies
            }
            _ => dependency_indexes(graph, index),
        };

        let names = build_dependencies
            .into_iter()
            .map(|d| graph.targets[d].name.clone())
            .collect();
        graph.targets[index].build_dependencies = names;
    }
}
