//! The per-target passes that run once dependent settings are in place.

use std::path::Path;

use gypsum_eval::{merge_dicts, process_document, process_list_filters, MergeContext, Phase};
use gypsum_syntax::{Mapping, Value};
use gypsum_util::path::split_extension;
use indexmap::IndexMap;
use tracing::trace;

use super::{GraphError, GraphResult, Target};
use crate::loader::Loader;
use crate::target::QualifiedTarget;

/// Keys that describe the target itself and never vary by configuration.
const NON_CONFIGURATION_KEYS: &[&str] = &[
    "actions",
    "allow_sharedlib_linksettings_propagation",
    "configurations",
    "copies",
    "default_configuration",
    "dependencies",
    "dependencies_original",
    "dependencies_traverse",
    "hard_dependency",
    "libraries",
    "postbuilds",
    "product_dir",
    "product_extension",
    "product_name",
    "product_prefix",
    "rules",
    "run_as",
    "sources",
    "standalone_static_library",
    "suppress_wildcard",
    "target_name",
    "toolset",
    "toolsets",
    "type",
    "variables",
];

const INVALID_CONFIGURATION_KEYS: &[&str] = &[
    "actions",
    "all_dependent_settings",
    "configurations",
    "dependencies",
    "direct_dependent_settings",
    "libraries",
    "link_settings",
    "sources",
    "standalone_static_library",
    "target_name",
    "type",
];

const ACTION_KEYS: &[&str] = &[
    "action",
    "action_name",
    "inputs",
    "message",
    "outputs",
    "process_outputs_as_sources",
    "variables",
];

const RULE_KEYS: &[&str] = &[
    "action",
    "extension",
    "inputs",
    "message",
    "outputs",
    "process_outputs_as_sources",
    "rule_name",
    "rule_sources",
    "variables",
];

const COPY_KEYS: &[&str] = &["destination", "files"];

fn key_base(key: &str) -> &str {
    key.strip_suffix(['=', '+', '?', '!', '/']).unwrap_or(key)
}

fn is_configuration_key(key: &str) -> bool {
    !NON_CONFIGURATION_KEYS.contains(&key_base(key))
}

/// Expand `>` references and apply `target_conditions`.
pub fn process_late_phase(target: &mut Target, loader: &Loader<'_>) -> GraphResult<()> {
    let build_file = target.name.build_file.clone();
    let scope = loader.scope_for(&build_file);
    process_document(
        &mut target.dict,
        Phase::Late,
        &scope,
        loader.runner(),
        Path::new(&build_file),
    )
    .map_err(GraphError::eval(&target.name))
}

fn merge_configuration(
    merged: &mut Mapping,
    configurations: &Mapping,
    name: &str,
    visiting: &mut Vec<String>,
    target: &QualifiedTarget,
) -> GraphResult<()> {
    if visiting.iter().any(|v| v == name) {
        return Ok(());
    }
    let Some(Value::Mapping(configuration)) = configurations.get(name) else {
        return Err(GraphError::invalid(
            target,
            format!("configuration {name} is not defined"),
        ));
    };

    visiting.push(name.to_string());
    let parents = configuration
        .get("inherit_from")
        .map(Value::string_items)
        .unwrap_or_default();
    for parent in parents {
        merge_configuration(merged, configurations, &parent, visiting, target)?;
    }
    visiting.pop();

    merge_dicts(merged, configuration, MergeContext::local(target.build_file_dir()))
        .map_err(GraphError::eval(target))?;
    merged.shift_remove("abstract");
    Ok(())
}

fn is_abstract(configuration: &Value) -> bool {
    configuration
        .as_mapping()
        .and_then(|c| c.get("abstract"))
        .is_some_and(Value::is_truthy)
}

/// Move every setting that may vary by configuration into each concrete configuration.
///
/// A configuration starts from the target's own settings, then merges in what it inherits
/// (`inherit_from`, parents first) and finally its own dict. Abstract configurations only
/// exist to be inherited and are dropped. A target without configurations gets `Default`.
pub fn set_up_configurations(target: &mut Target) -> GraphResult<()> {
    let configurations = match target.dict.shift_remove("configurations") {
        None => Mapping::from_iter([("Default".to_string(), Value::Mapping(Mapping::new()))]),
        Some(Value::Mapping(m)) => m,
        Some(other) => {
            return Err(GraphError::invalid(
                &target.name,
                format!("configurations must be a dict, found a {}", other.type_name()),
            ));
        }
    };
    if let Some((name, _)) = configurations.iter().find(|(_, c)| !c.is_mapping()) {
        return Err(GraphError::invalid(
            &target.name,
            format!("configuration {name} must be a dict"),
        ));
    }

    let base: Mapping = target
        .dict
        .iter()
        .filter(|(key, _)| is_configuration_key(key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let mut concrete: IndexMap<String, Value> = IndexMap::new();
    for (name, configuration) in &configurations {
        if is_abstract(configuration) {
            continue;
        }
        let mut merged = base.clone();
        merge_configuration(
            &mut merged,
            &configurations,
            name,
            &mut Vec::new(),
            &target.name,
        )?;

        if let Some(key) = merged
            .keys()
            .find(|k| INVALID_CONFIGURATION_KEYS.contains(&key_base(k)))
        {
            return Err(GraphError::InvalidConfigurationKey {
                key: key.clone(),
                configuration: name.clone(),
                target: target.name.to_string(),
            });
        }
        concrete.insert(name.clone(), Value::Mapping(merged));
    }

    let default = match target.dict.get("default_configuration") {
        Some(value) => value.to_scalar_string().unwrap_or_default(),
        None => concrete.keys().next().cloned().ok_or_else(|| {
            GraphError::invalid(&target.name, "no concrete configurations")
        })?,
    };
    if !concrete.contains_key(&default) {
        return Err(GraphError::invalid(
            &target.name,
            format!("default_configuration {default} is not a concrete configuration"),
        ));
    }
    trace!(
        "{}: configurations {:?}, default {default}",
        target.name,
        concrete.keys().collect::<Vec<_>>()
    );

    target.dict.retain(|key, _| !is_configuration_key(key));
    target
        .dict
        .insert("configurations".to_string(), Value::Mapping(concrete));
    target
        .dict
        .insert("default_configuration".to_string(), Value::String(default));
    Ok(())
}

pub fn apply_list_filters(target: &mut Target) -> GraphResult<()> {
    let name = target.name.to_string();
    process_list_filters(&name, &mut target.dict).map_err(GraphError::eval(&target.name))
}

fn dict_list<'d>(
    target: &QualifiedTarget,
    dict: &'d Mapping,
    key: &str,
) -> GraphResult<Vec<&'d Mapping>> {
    match dict.get(key) {
        None => Ok(Vec::new()),
        Some(Value::List(items)) => items
            .iter()
            .map(|item| {
                item.as_mapping().ok_or_else(|| {
                    GraphError::invalid(target, format!("{key} must hold dicts, found {item}"))
                })
            })
            .collect(),
        Some(other) => Err(GraphError::invalid(
            target,
            format!("{key} must be a list, found a {}", other.type_name()),
        )),
    }
}

fn check_keys(
    target: &QualifiedTarget,
    what: &str,
    dict: &Mapping,
    known: &[&str],
) -> GraphResult<()> {
    match dict.keys().find(|k| !known.contains(&k.as_str())) {
        Some(key) => Err(GraphError::Check {
            target: target.to_string(),
            message: format!("unknown key {key} in {what}"),
        }),
        None => Ok(()),
    }
}

fn require(target: &QualifiedTarget, what: &str, dict: &Mapping, keys: &[&str]) -> GraphResult<()> {
    match keys.iter().find(|k| !dict.contains_key(**k)) {
        Some(key) => Err(GraphError::Check {
            target: target.to_string(),
            message: format!("{what} has no {key}"),
        }),
        None => Ok(()),
    }
}

/// Check rules (always) and actions and copies (with `check`), and record each rule's
/// `rule_sources`: the target's sources with the rule's extension, unless given explicitly.
pub fn validate(target: &mut Target, check: bool) -> GraphResult<()> {
    let name = &target.name;
    let sources = target
        .dict
        .get("sources")
        .map(Value::string_items)
        .unwrap_or_default();

    let mut rule_names: Vec<String> = Vec::new();
    let mut extensions: IndexMap<String, String> = IndexMap::new();
    let mut rule_sources: Vec<Option<Vec<String>>> = Vec::new();

    for rule in dict_list(name, &target.dict, "rules")? {
        let rule_name = rule
            .get("rule_name")
            .and_then(Value::to_scalar_string)
            .ok_or_else(|| GraphError::invalid(name, "rule has no rule_name"))?;
        if rule_names.contains(&rule_name) {
            return Err(GraphError::DuplicateRule {
                rule: rule_name,
                target: name.to_string(),
            });
        }

        let extension = rule
            .get("extension")
            .and_then(Value::to_scalar_string)
            .ok_or_else(|| {
                GraphError::invalid(name, format!("rule {rule_name} has no extension"))
            })?;
        let extension = extension.trim_start_matches('.').to_string();
        if let Some(first) = extensions.get(&extension) {
            return Err(GraphError::DuplicateRuleExtension {
                extension,
                target: name.to_string(),
                first: first.clone(),
                second: rule_name,
            });
        }

        if check {
            check_keys(name, &format!("rule {rule_name}"), rule, RULE_KEYS)?;
            require(name, &format!("rule {rule_name}"), rule, &["outputs", "action"])?;
        }

        rule_sources.push(match rule.contains_key("rule_sources") {
            true => None,
            false => Some(
                sources
                    .iter()
                    .filter(|s| split_extension(s).1 == extension)
                    .cloned()
                    .collect(),
            ),
        });
        extensions.insert(extension, rule_name.clone());
        rule_names.push(rule_name);
    }

    for (index, action) in dict_list(name, &target.dict, "actions")?.into_iter().enumerate() {
        let action_name = action.get("action_name").and_then(Value::to_scalar_string);
        if check {
            let what = match &action_name {
                Some(n) if !n.is_empty() => format!("action {n}"),
                _ => {
                    return Err(GraphError::Check {
                        target: name.to_string(),
                        message: format!("action {index} has no action_name"),
                    });
                }
            };
            check_keys(name, &what, action, ACTION_KEYS)?;
            require(name, &what, action, &["inputs", "outputs", "action"])?;
        }
        let empty = match action.get("action") {
            Some(Value::List(argv)) => argv.first().is_some_and(|a| a.as_str() == Some("")),
            Some(Value::String(s)) => s.is_empty(),
            _ => false,
        };
        if empty {
            return Err(GraphError::invalid(name, "empty action as command"));
        }
    }

    if check {
        for copy in dict_list(name, &target.dict, "copies")? {
            check_keys(name, "copies", copy, COPY_KEYS)?;
            require(name, "copies", copy, COPY_KEYS)?;
        }
    }

    if let Some(Value::List(rules)) = target.dict.get_mut("rules") {
        for (rule, matched) in rules.iter_mut().zip(rule_sources) {
            if let (Value::Mapping(rule), Some(matched)) = (rule, matched) {
                if !matched.is_empty() {
                    rule.insert(
                        "rule_sources".to_string(),
                        Value::List(matched.into_iter().map(Value::String).collect()),
                    );
                }
            }
        }
    }
    Ok(())
}
