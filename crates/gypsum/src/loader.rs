//! Reading build files: parsing, merging includes, early-phase evaluation and discovering the
//! other build files that targets depend on.

use std::collections::HashSet;
use std::path::Path;

use gypsum_eval::{
    merge_dicts, process_document, CommandRunner, EvalError, MergeContext, Phase, VariableScope,
};
use gypsum_syntax::{parse_document, Mapping, ParseError, Value};
use gypsum_util::path::{dirname, join, normalize, relative_to};
use indexmap::IndexMap;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::context::BuildContext;
use crate::target::{DependencyRef, QualifiedTarget, Toolset};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },
    #[error("{path}: {message}")]
    Invalid { path: String, message: String },
    #[error("{include} not found, included from {from}")]
    IncludeNotFound { include: String, from: String },
    #[error("{}", .chain.join(" -> "))]
    CyclicInclude { chain: Vec<String> },
    #[error("build file {build_file} not found while loading dependencies of {target}")]
    MissingBuildFile { build_file: String, target: String },
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl LoadError {
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::Io { .. } => "IOError",
            LoadError::Parse { .. } => "ParseError",
            LoadError::Invalid { .. } => "GypError",
            LoadError::IncludeNotFound { .. } => "IncludeNotFoundError",
            LoadError::CyclicInclude { .. } => "CyclicIncludeError",
            LoadError::MissingBuildFile { .. } => "MissingDependencyError",
            LoadError::Eval(e) => e.kind(),
        }
    }
}

pub type LoadResult<T> = Result<T, LoadError>;

/// A build file after includes, early evaluation, toolset expansion and `target_defaults`.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildFile {
    /// Normalized path, as the rest of the pipeline names it.
    pub path: String,
    pub data: Mapping,
    /// Every file merged in through `includes` (and `-I`), transitively, in load order.
    pub included_files: Vec<String>,
}

impl BuildFile {
    pub fn dir(&self) -> &str {
        dirname(&self.path)
    }

    pub fn targets(&self) -> impl Iterator<Item = &Mapping> {
        self.data
            .get("targets")
            .and_then(Value::as_list)
            .into_iter()
            .flatten()
            .filter_map(Value::as_mapping)
    }

    /// Build files named by this file's dependencies, each with the first target naming it.
    fn dependency_files(&self) -> Vec<(String, String)> {
        let mut ret: Vec<(String, String)> = Vec::new();
        for target in self.targets() {
            let name = target.get("target_name").and_then(Value::to_scalar_string);
            let toolset = target
                .get("toolset")
                .and_then(Value::as_str)
                .map(Toolset::new)
                .unwrap_or_else(Toolset::target);
            let referrer = QualifiedTarget::new(&self.path, name.unwrap_or_default(), toolset);

            for dependency in target
                .get("dependencies")
                .map(Value::string_items)
                .unwrap_or_default()
            {
                let dependency = DependencyRef::parse(&dependency).qualify(&referrer);
                if dependency.build_file != self.path
                    && !ret.iter().any(|(f, _)| *f == dependency.build_file)
                {
                    ret.push((dependency.build_file, referrer.to_string()));
                }
            }
        }
        ret
    }
}

/// Variables every build file starts with. Defines from the command line override them.
pub fn default_variables(generator: &str) -> Mapping {
    let os = match std::env::consts::OS {
        "macos" => "mac",
        "windows" => "win",
        other => other,
    };
    [
        ("OS", os),
        ("GENERATOR", generator),
        ("PRODUCT_DIR", "$!PRODUCT_DIR"),
        ("INTERMEDIATE_DIR", "$!INTERMEDIATE_DIR"),
        ("SHARED_INTERMEDIATE_DIR", "$!PRODUCT_DIR/gen"),
        ("CONFIGURATION_NAME", "$|CONFIGURATION_NAME"),
        ("EXECUTABLE_PREFIX", ""),
        ("EXECUTABLE_SUFFIX", ""),
        ("STATIC_LIB_PREFIX", "lib"),
        ("STATIC_LIB_SUFFIX", ".a"),
        ("SHARED_LIB_PREFIX", "lib"),
        ("SHARED_LIB_SUFFIX", ".so"),
        ("RULE_INPUT_ROOT", "${root}"),
        ("RULE_INPUT_DIRNAME", "${dirname}"),
        ("RULE_INPUT_PATH", "${source}"),
        ("RULE_INPUT_EXT", "${ext}"),
        ("RULE_INPUT_NAME", "${name}"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), Value::from(v)))
    .collect()
}

pub struct Loader<'a> {
    ctx: &'a BuildContext,
    runner: &'a CommandRunner,
    variables: Mapping,
    depth: String,
}

impl<'a> Loader<'a> {
    pub fn new(ctx: &'a BuildContext, runner: &'a CommandRunner, generator: &str) -> Self {
        let mut variables = default_variables(generator);
        for (name, value) in &ctx.defines {
            variables.insert(name.clone(), value.clone());
        }
        Self {
            ctx,
            runner,
            variables,
            depth: ctx.depth(),
        }
    }

    /// The variables a build file's early phase starts from.
    pub fn scope_for(&self, build_file: &str) -> VariableScope {
        let mut scope: VariableScope = self
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        scope.set("DEPTH", relative_to(&self.depth, dirname(build_file)));
        scope
    }

    pub fn runner(&self) -> &CommandRunner {
        self.runner
    }

    /// Load the command line's build files and, transitively, every build file their targets
    /// depend on. Each wave of newly discovered files is loaded in parallel; the result is in
    /// discovery order.
    pub fn load_all(&self) -> LoadResult<IndexMap<String, BuildFile>> {
        let mut loaded = IndexMap::new();
        let mut seen = HashSet::new();
        let mut wave: Vec<(String, Option<String>)> = Vec::new();
        for file in &self.ctx.build_files {
            let file = normalize(file);
            if seen.insert(file.clone()) {
                wave.push((file, None));
            }
        }

        while !wave.is_empty() {
            debug!("loading {} build files", wave.len());
            let results: Vec<LoadResult<BuildFile>> = wave
                .par_iter()
                .map(|(path, referrer)| self.load_file(path, referrer.as_deref()))
                .collect();

            let mut next = Vec::new();
            for result in results {
                let build_file = result?;
                for (dependency, referrer) in build_file.dependency_files() {
                    if seen.insert(dependency.clone()) {
                        next.push((dependency, Some(referrer)));
                    }
                }
                loaded.insert(build_file.path.clone(), build_file);
            }
            wave = next;
        }
        Ok(loaded)
    }

    /// Load one build file. `referrer` names the target whose dependency led here, if any.
    pub fn load_file(&self, path: &str, referrer: Option<&str>) -> LoadResult<BuildFile> {
        info!("loading {path}");
        let mut data = match read_document(path) {
            Err(LoadError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound && referrer.is_some() =>
            {
                return Err(LoadError::MissingBuildFile {
                    build_file: path.to_string(),
                    target: referrer.unwrap_or_default().to_string(),
                });
            }
            other => other?,
        };

        let mut included_files = Vec::new();
        let forced: Vec<String> = self.ctx.includes.iter().map(|i| normalize(i)).collect();
        let mut stack = vec![path.to_string()];
        merge_includes(&mut data, path, &forced, &mut stack, &mut included_files)?;

        let scope = self.scope_for(path);
        process_document(&mut data, Phase::Early, &scope, self.runner, Path::new(path))?;

        apply_target_defaults(&mut data, path)?;
        expand_toolsets(&mut data, path)?;

        Ok(BuildFile {
            path: path.to_string(),
            data,
            included_files,
        })
    }
}

fn read_document(path: &str) -> LoadResult<Mapping> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_string(),
        source,
    })?;
    match parse_document(&text) {
        Ok(Value::Mapping(m)) => Ok(m),
        Ok(other) => Err(LoadError::Invalid {
            path: path.to_string(),
            message: format!("build file must be a dict, found a {}", other.type_name()),
        }),
        Err(source) => Err(LoadError::Parse {
            path: path.to_string(),
            source,
        }),
    }
}

/// Merge `dict`'s `includes` (preceded by `forced`) into it, recursing into nested dicts. The
/// including dict's own keys win over what it includes.
fn merge_includes(
    dict: &mut Mapping,
    path: &str,
    forced: &[String],
    stack: &mut Vec<String>,
    included_files: &mut Vec<String>,
) -> LoadResult<()> {
    let mut includes: Vec<String> = forced.to_vec();
    match dict.shift_remove("includes") {
        Some(Value::List(items)) => {
            for item in items {
                let Some(include) = item.as_str() else {
                    return Err(LoadError::Invalid {
                        path: path.to_string(),
                        message: format!("includes must be strings, found {item}"),
                    });
                };
                includes.push(join(dirname(path), include));
            }
        }
        Some(other) => {
            return Err(LoadError::Invalid {
                path: path.to_string(),
                message: format!("includes must be a list, found a {}", other.type_name()),
            });
        }
        None => {}
    }

    if !includes.is_empty() {
        let mut merged = Mapping::new();
        for include in includes {
            if stack.contains(&include) {
                let mut chain = stack.clone();
                chain.push(include);
                return Err(LoadError::CyclicInclude { chain });
            }
            trace!("{path} includes {include}");

            let mut included = match read_document(&include) {
                Err(LoadError::Io { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    return Err(LoadError::IncludeNotFound {
                        include,
                        from: path.to_string(),
                    });
                }
                other => other?,
            };
            included_files.push(include.clone());

            stack.push(include.clone());
            merge_includes(&mut included, &include, &[], stack, included_files)?;
            stack.pop();

            merge_dicts(
                &mut merged,
                &included,
                MergeContext::new(dirname(path), dirname(&include)),
            )?;
        }
        merge_dicts(&mut merged, dict, MergeContext::local(dirname(path)))?;
        *dict = merged;
    }

    for value in dict.values_mut() {
        merge_includes_in_value(value, path, stack, included_files)?;
    }
    Ok(())
}

fn merge_includes_in_value(
    value: &mut Value,
    path: &str,
    stack: &mut Vec<String>,
    included_files: &mut Vec<String>,
) -> LoadResult<()> {
    match value {
        Value::Mapping(m) => merge_includes(m, path, &[], stack, included_files),
        Value::List(items) => items
            .iter_mut()
            .try_for_each(|item| merge_includes_in_value(item, path, stack, included_files)),
        _ => Ok(()),
    }
}

fn targets_mut<'d>(data: &'d mut Mapping, path: &str) -> LoadResult<Option<&'d mut Vec<Value>>> {
    match data.get_mut("targets") {
        None => Ok(None),
        Some(Value::List(targets)) => {
            if let Some(bad) = targets.iter().find(|t| !t.is_mapping()) {
                return Err(LoadError::Invalid {
                    path: path.to_string(),
                    message: format!("targets must be dicts, found {bad}"),
                });
            }
            Ok(Some(targets))
        }
        Some(other) => Err(LoadError::Invalid {
            path: path.to_string(),
            message: format!("targets must be a list, found a {}", other.type_name()),
        }),
    }
}

/// Put a copy of `target_defaults` underneath every target of the file.
fn apply_target_defaults(data: &mut Mapping, path: &str) -> LoadResult<()> {
    let defaults = match data.shift_remove("target_defaults") {
        None => return Ok(()),
        Some(Value::Mapping(m)) => m,
        Some(other) => {
            return Err(LoadError::Invalid {
                path: path.to_string(),
                message: format!("target_defaults must be a dict, found a {}", other.type_name()),
            });
        }
    };
    let Some(targets) = targets_mut(data, path)? else {
        return Ok(());
    };
    for target in targets.iter_mut() {
        if let Value::Mapping(own) = target {
            let mut merged = defaults.clone();
            merge_dicts(&mut merged, own, MergeContext::local(dirname(path)))?;
            *own = merged;
        }
    }
    Ok(())
}

/// Give every target one copy per entry of its `toolsets`, each with a `toolset` key.
fn expand_toolsets(data: &mut Mapping, path: &str) -> LoadResult<()> {
    let Some(targets) = targets_mut(data, path)? else {
        return Ok(());
    };

    let mut expanded = Vec::with_capacity(targets.len());
    for target in targets.drain(..) {
        let Value::Mapping(mut target) = target else {
            continue;
        };
        if target.contains_key("toolset") && !target.contains_key("toolsets") {
            expanded.push(Value::Mapping(target));
            continue;
        }
        let toolsets = match target.shift_remove("toolsets") {
            Some(list @ Value::List(_)) => list.string_items(),
            Some(other) => {
                return Err(LoadError::Invalid {
                    path: path.to_string(),
                    message: format!("toolsets must be a list, found a {}", other.type_name()),
                });
            }
            None => vec!["target".to_string()],
        };
        for toolset in toolsets {
            let mut copy = target.clone();
            copy.insert("toolset".to_string(), Value::String(toolset));
            expanded.push(Value::Mapping(copy));
        }
    }
    *targets = expanded;
    Ok(())
}
