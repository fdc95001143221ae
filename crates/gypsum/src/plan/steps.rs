//! Turning one target of the graph into concrete steps.

use gypsum_syntax::{Mapping, Value};
use gypsum_util::index_map::{collisions, IntoIndexMap};
use gypsum_util::path::{basename, dirname, normalize, relative_to, split_extension};
use gypsum_util::shell::encode_posix_list;
use gypsum_util::split::replace_all;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::trace;

use super::paths::{intermediate_dir, object_file, product_path, ProductOverrides, PRODUCT_DIR};
use super::{
    scalar_setting, target_configuration, ActionStep, BuildPath, CompileStep, ConfigSettings,
    CopyStep, Language, LinkStep, PlanError, PlanResult, TargetPlan, GENERIC_SETTINGS,
};
use crate::graph::{Target, TargetGraph};
use crate::target::{QualifiedTarget, TargetType};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$!(\w+)|\$\|(\w+)|\$\{(root|dirname|source|ext|name)\}").unwrap()
});

/// The `RULE_INPUT_*` values for one source a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RuleInput {
    source: String,
    dirname: String,
    root: String,
    ext: String,
    name: String,
}

impl RuleInput {
    fn new(source: &str) -> Self {
        let name = basename(source);
        let (root, ext) = split_extension(name);
        RuleInput {
            source: source.to_string(),
            dirname: dirname(source).to_string(),
            root: root.to_string(),
            ext: if ext.is_empty() {
                String::new()
            } else {
                format!(".{ext}")
            },
            name: name.to_string(),
        }
    }
}

/// Substitutes what the plan knows about a target into strings from its build file.
struct Placeholders<'a> {
    target: &'a QualifiedTarget,
    intermediate: String,
    rule: Option<&'a RuleInput>,
}

impl<'a> Placeholders<'a> {
    fn new(target: &'a QualifiedTarget, base: &str) -> Self {
        Placeholders {
            target,
            intermediate: format!("{PRODUCT_DIR}/{}", intermediate_dir(target, base)),
            rule: None,
        }
    }

    fn for_rule<'r>(&'r self, rule: &'r RuleInput) -> Placeholders<'r> {
        Placeholders {
            target: self.target,
            intermediate: self.intermediate.clone(),
            rule: Some(rule),
        }
    }

    fn unknown(&self, caps: &Captures) -> PlanError {
        PlanError::UnknownPlaceholder {
            placeholder: caps[0].to_string(),
            target: self.target.to_string(),
        }
    }

    fn expand(&self, text: &str) -> PlanResult<String> {
        replace_all(&PLACEHOLDER, text, |caps| {
            if let Some(name) = caps.get(1) {
                return match name.as_str() {
                    "PRODUCT_DIR" => Ok(caps[0].to_string()),
                    "INTERMEDIATE_DIR" => Ok(self.intermediate.clone()),
                    _ => Err(self.unknown(caps)),
                };
            }
            if let Some(name) = caps.get(2) {
                return match name.as_str() {
                    "CONFIGURATION_NAME" => Ok(caps[0].to_string()),
                    _ => Err(self.unknown(caps)),
                };
            }
            // Outside rules `${...}` is left to the shell
            let Some(rule) = self.rule else {
                return Ok(caps[0].to_string());
            };
            Ok(match &caps[3] {
                "root" => rule.root.clone(),
                "dirname" => rule.dirname.clone(),
                "source" => rule.source.clone(),
                "ext" => rule.ext.clone(),
                _ => rule.name.clone(),
            })
        })
    }

    fn expand_all(&self, items: &[String]) -> PlanResult<Vec<String>> {
        items.iter().map(|item| self.expand(item)).collect()
    }

    fn paths(&self, items: &[String], base: &str) -> PlanResult<Vec<BuildPath>> {
        items
            .iter()
            .map(|item| Ok(BuildPath::parse(&self.expand(item)?, base)))
            .collect()
    }
}

fn strings(dict: &Mapping, key: &str) -> Vec<String> {
    dict.get(key).map(Value::string_items).unwrap_or_default()
}

fn dicts<'d>(dict: &'d Mapping, key: &str) -> impl Iterator<Item = &'d Mapping> {
    dict.get(key)
        .and_then(Value::as_list)
        .into_iter()
        .flatten()
        .filter_map(Value::as_mapping)
}

fn command_line(
    step: &Mapping,
    placeholders: &Placeholders<'_>,
    what: &str,
) -> PlanResult<String> {
    match step.get("action") {
        Some(Value::List(argv)) => {
            let argv = argv
                .iter()
                .filter_map(Value::to_scalar_string)
                .map(|arg| placeholders.expand(&arg))
                .collect::<PlanResult<Vec<_>>>()?;
            Ok(encode_posix_list(argv))
        }
        Some(command) if command.is_scalar() => {
            placeholders.expand(&command.to_scalar_string().unwrap_or_default())
        }
        _ => Err(PlanError::invalid(
            placeholders.target,
            format!("{what} has no action"),
        )),
    }
}

fn message(step: &Mapping, placeholders: &Placeholders<'_>) -> PlanResult<Option<String>> {
    step.get("message")
        .and_then(Value::to_scalar_string)
        .map(|m| placeholders.expand(&m))
        .transpose()
}

fn process_outputs_as_sources(step: &Mapping) -> bool {
    step.get("process_outputs_as_sources")
        .is_some_and(Value::is_truthy)
}

/// Actions as declared, then every rule applied to each of its sources once.
fn plan_actions(
    target: &Target,
    base: &str,
    placeholders: &Placeholders<'_>,
    extra_sources: &mut Vec<BuildPath>,
) -> PlanResult<Vec<ActionStep>> {
    let mut steps = Vec::new();

    for (index, action) in dicts(&target.dict, "actions").enumerate() {
        let name = scalar_setting(action, "action_name")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("action_{index}"));
        let outputs = placeholders.paths(&strings(action, "outputs"), base)?;
        if outputs.is_empty() {
            return Err(PlanError::invalid(
                &target.name,
                format!("action {name} has no outputs"),
            ));
        }
        if process_outputs_as_sources(action) {
            extra_sources.extend(outputs.iter().cloned());
        }
        steps.push(ActionStep {
            command: command_line(action, placeholders, &format!("action {name}"))?,
            message: message(action, placeholders)?,
            inputs: placeholders.paths(&strings(action, "inputs"), base)?,
            outputs,
            rule_source: None,
            name,
        });
    }

    for rule in dicts(&target.dict, "rules") {
        let rule_name = scalar_setting(rule, "rule_name").unwrap_or_default();
        let rule_sources: IndexSet<String> = strings(rule, "rule_sources").into_iter().collect();
        trace!("{}: rule {rule_name} applies to {} sources", target.name, rule_sources.len());

        for source in &rule_sources {
            let input = RuleInput::new(source);
            let placeholders = placeholders.for_rule(&input);
            let source = BuildPath::parse(&placeholders.expand(source)?, base);

            let outputs = placeholders.paths(&strings(rule, "outputs"), base)?;
            if outputs.is_empty() {
                return Err(PlanError::invalid(
                    &target.name,
                    format!("rule {rule_name} has no outputs"),
                ));
            }
            if process_outputs_as_sources(rule) {
                extra_sources.extend(outputs.iter().cloned());
            }

            let mut inputs = vec![source.clone()];
            inputs.extend(placeholders.paths(&strings(rule, "inputs"), base)?);
            steps.push(ActionStep {
                name: rule_name.clone(),
                rule_source: Some(source),
                inputs,
                outputs,
                command: command_line(rule, &placeholders, &format!("rule {rule_name}"))?,
                message: message(rule, &placeholders)?,
            });
        }
    }
    Ok(steps)
}

/// One step per file, each landing in `destination` under its own basename.
fn plan_copies(
    target: &Target,
    base: &str,
    placeholders: &Placeholders<'_>,
) -> PlanResult<Vec<CopyStep>> {
    let mut steps = Vec::new();
    for copy in dicts(&target.dict, "copies") {
        let Some(destination) = scalar_setting(copy, "destination") else {
            return Err(PlanError::invalid(&target.name, "copies without a destination"));
        };
        let destination = placeholders.expand(&destination)?;
        for file in placeholders.expand_all(&strings(copy, "files"))? {
            let file = file.trim_end_matches('/');
            steps.push(CopyStep {
                source: BuildPath::parse(file, base),
                destination: BuildPath::parse(
                    &format!("{destination}/{}", basename(file)),
                    base,
                ),
            });
        }
    }
    Ok(steps)
}

/// Sources with a compiler, each once. Objects share one directory per target, so two
/// sources with the same basename cannot both be compiled.
fn plan_compiles(
    target: &Target,
    base: &str,
    sources: Vec<BuildPath>,
) -> PlanResult<Vec<CompileStep>> {
    let sources: Vec<(BuildPath, Language)> = sources
        .into_iter()
        .unique()
        .filter_map(|source| {
            let language = Language::for_extension(source.extension())?;
            Some((source, language))
        })
        .collect();

    let duplicates = collisions(
        sources
            .iter()
            .into_index_map_by(|(source, _)| {
                split_extension(basename(&source.path)).0.to_string()
            }),
    );
    if !duplicates.is_empty() {
        return Err(PlanError::DuplicateBasename {
            target: target.name.to_string(),
            collisions: duplicates
                .into_iter()
                .map(|(stem, paths)| {
                    (stem, paths.into_iter().map(|(p, _)| p.path.clone()).collect())
                })
                .collect(),
        });
    }

    Ok(sources
        .into_iter()
        .map(|(source, language)| CompileStep {
            object: object_file(&target.name, base, &source),
            source,
            language,
        })
        .collect())
}

fn product_overrides(
    target: &Target,
    base: &str,
    placeholders: &Placeholders<'_>,
) -> PlanResult<ProductOverrides> {
    let setting = |key: &str| {
        scalar_setting(&target.dict, key)
            .map(|v| placeholders.expand(&v))
            .transpose()
    };
    Ok(ProductOverrides {
        name: setting("product_name")?,
        prefix: setting("product_prefix")?,
        extension: setting("product_extension")?,
        dir: setting("product_dir")?.map(|dir| BuildPath::parse(&dir, base)),
    })
}

fn config_settings(
    config: &Mapping,
    base: &str,
    placeholders: &Placeholders<'_>,
) -> PlanResult<ConfigSettings> {
    let mut generic = IndexMap::new();
    for key in GENERIC_SETTINGS {
        if let Some(value) = scalar_setting(config, key) {
            generic.insert(key.to_string(), value);
        }
    }
    Ok(ConfigSettings {
        defines: placeholders.expand_all(&strings(config, "defines"))?,
        include_dirs: placeholders.paths(&strings(config, "include_dirs"), base)?,
        cflags: placeholders.expand_all(&strings(config, "cflags"))?,
        cflags_c: placeholders.expand_all(&strings(config, "cflags_c"))?,
        cflags_cc: placeholders.expand_all(&strings(config, "cflags_cc"))?,
        ldflags: placeholders.expand_all(&strings(config, "ldflags"))?,
        generic,
    })
}

pub(super) fn plan_target(
    graph: &TargetGraph,
    target: &Target,
    depth: &str,
    configurations: &[String],
    products: &IndexMap<&QualifiedTarget, BuildPath>,
) -> PlanResult<TargetPlan> {
    let base = normalize(&relative_to(target.name.build_file_dir(), depth));
    let placeholders = Placeholders::new(&target.name, &base);

    let mut sources = placeholders.paths(&strings(&target.dict, "sources"), &base)?;
    let actions = plan_actions(target, &base, &placeholders, &mut sources)?;
    let copies = plan_copies(target, &base, &placeholders)?;
    let compiles = if target.target_type.compiles() {
        plan_compiles(target, &base, sources)?
    } else {
        Vec::new()
    };

    let overrides = product_overrides(target, &base, &placeholders)?;
    let product = product_path(&target.name, target.target_type, &base, &overrides);

    let prerequisites = target
        .build_dependencies
        .iter()
        .filter_map(|d| products.get(d).cloned())
        .collect();

    let link = match target.target_type {
        TargetType::None => None,
        target_type => {
            let mut link = LinkStep {
                output: product.clone(),
                objects: compiles.iter().map(|c| c.object.clone()).collect(),
                static_libraries: Vec::new(),
                shared_libraries: Vec::new(),
                system_libraries: Vec::new(),
            };
            if target_type.is_linkable() {
                for dependency in &target.build_dependencies {
                    let linked = graph.get(dependency);
                    let (Some(linked), Some(product)) = (linked, products.get(dependency)) else {
                        continue;
                    };
                    match linked.target_type {
                        TargetType::StaticLibrary => link.static_libraries.push(product.clone()),
                        TargetType::SharedLibrary => link.shared_libraries.push(product.clone()),
                        _ => {}
                    }
                }
                link.system_libraries =
                    placeholders.expand_all(&strings(&target.dict, "libraries"))?;
            }
            Some(link)
        }
    };

    let mut settings = IndexMap::new();
    for name in configurations {
        let config = target_configuration(target, name).ok_or_else(|| {
            PlanError::invalid(&target.name, format!("no settings for configuration {name}"))
        })?;
        settings.insert(name.clone(), config_settings(config, &base, &placeholders)?);
    }

    Ok(TargetPlan {
        name: target.name.clone(),
        target_type: target.target_type,
        base,
        actions,
        copies,
        compiles,
        link,
        product,
        prerequisites,
        configurations: settings,
    })
}
