//! Gathering targets from loaded build files and resolving the names they depend on.

use std::collections::HashSet;

use gypsum_syntax::{Mapping, Value};
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::trace;

use super::{GraphError, GraphResult, Target};
use crate::loader::BuildFile;
use crate::target::{DependencyRef, QualifiedTarget, TargetType, Toolset};

/// Every target of every build file, in declaration order. Dependencies stay unresolved in
/// each target's dict until [qualify_dependencies].
pub fn collect_targets(
    files: &IndexMap<String, BuildFile>,
) -> GraphResult<IndexMap<QualifiedTarget, Target>> {
    let mut targets = IndexMap::new();

    for file in files.values() {
        for dict in file.targets() {
            let Some(name) = dict.get("target_name").and_then(Value::to_scalar_string) else {
                return Err(GraphError::InvalidTarget {
                    target: file.path.clone(),
                    message: "Missing 'target_name' field in target.".to_string(),
                });
            };
            let toolset = dict
                .get("toolset")
                .and_then(Value::as_str)
                .map(Toolset::new)
                .unwrap_or_else(Toolset::target);
            let qualified = QualifiedTarget::new(&file.path, name, toolset);

            let target_type = match dict.get("type") {
                None => {
                    return Err(GraphError::invalid(
                        &qualified,
                        "Missing 'type' field in target.",
                    ));
                }
                Some(value) => value
                    .as_str()
                    .and_then(|t| t.parse::<TargetType>().ok())
                    .ok_or_else(|| {
                        GraphError::invalid(
                            &qualified,
                            format!("Target type {value} is not a valid target type."),
                        )
                    })?,
            };

            if targets.contains_key(&qualified) {
                return Err(GraphError::DuplicateTarget {
                    target: qualified.short(),
                    build_file: file.path.clone(),
                });
            }
            trace!("found {qualified} ({target_type})");

            targets.insert(
                qualified.clone(),
                Target {
                    name: qualified,
                    target_type,
                    dict: dict.clone(),
                    dependencies: Vec::new(),
                    export_dependent_settings: Vec::new(),
                    build_dependencies: Vec::new(),
                },
            );
        }
    }
    Ok(targets)
}

fn take_strings(
    dict: &mut Mapping,
    key: &str,
    target: &QualifiedTarget,
) -> GraphResult<Vec<String>> {
    match dict.shift_remove(key) {
        None => Ok(Vec::new()),
        Some(Value::List(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(GraphError::invalid(
                    target,
                    format!("{key} must hold strings, found {other}"),
                )),
            })
            .collect(),
        Some(other) => Err(GraphError::invalid(
            target,
            format!("{key} must be a list, found a {}", other.type_name()),
        )),
    }
}

/// Resolve every `dependencies` and `export_dependent_settings` entry to a known target.
/// `file.gyp:*` stands for every target of that file that does not set `suppress_wildcard`,
/// other than the referring target itself.
pub fn qualify_dependencies(targets: &mut IndexMap<QualifiedTarget, Target>) -> GraphResult<()> {
    let known: Vec<(QualifiedTarget, bool)> = targets
        .values()
        .map(|t| {
            let suppressed = t.dict.get("suppress_wildcard").is_some_and(Value::is_truthy);
            (t.name.clone(), suppressed)
        })
        .collect();
    let names: HashSet<&QualifiedTarget> = known.iter().map(|(name, _)| name).collect();

    for target in targets.values_mut() {
        let mut dependencies = Vec::new();
        for text in take_strings(&mut target.dict, "dependencies", &target.name)? {
            let reference = DependencyRef::parse(&text);
            let qualified = reference.qualify(&target.name);

            if reference.is_wildcard() {
                let any_toolset = qualified.toolset.as_str() == "*";
                dependencies.extend(
                    known
                        .iter()
                        .filter(|(other, suppressed)| {
                            !suppressed
                                && *other != target.name
                                && other.build_file == qualified.build_file
                                && (any_toolset || other.toolset == qualified.toolset)
                        })
                        .map(|(other, _)| other.clone()),
                );
                continue;
            }

            if !names.contains(&qualified) {
                return Err(GraphError::MissingDependency {
                    dependency: qualified.to_string(),
                    target: target.name.to_string(),
                });
            }
            dependencies.push(qualified);
        }
        target.dependencies = dependencies.into_iter().unique().collect();

        let mut exports = Vec::new();
        for text in take_strings(&mut target.dict, "export_dependent_settings", &target.name)? {
            let qualified = DependencyRef::parse(&text).qualify(&target.name);
            if !names.contains(&qualified) {
                return Err(GraphError::MissingDependency {
                    dependency: qualified.to_string(),
                    target: target.name.to_string(),
                });
            }
            exports.push(qualified);
        }
        target.export_dependent_settings = exports.into_iter().unique().collect();
    }
    Ok(())
}
