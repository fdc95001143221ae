//! Everything a run needs to know before the first build file is read.

use std::time::Duration;

use derive_builder::Builder;
use gypsum_syntax::{Mapping, Value};
use gypsum_util::path::{dirname, normalize};
use gypsum_util::shell::{split_words, ShellSplitError};
use gypsum_util::split::{is_canonical_int, split_assignment};
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("could not split ${variable}: {source}")]
    Environment {
        variable: &'static str,
        #[source]
        source: ShellSplitError,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
    #[error("no build files given and none found in {0}")]
    NoBuildFiles(String),
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Compiler and archiver overrides, from `CC`, `CXX`, `LD`, `AR` and their `_host` variants.
/// Unset tools fall back to each backend's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Toolchain {
    pub target: Tools,
    pub host: Tools,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tools {
    pub cc: Option<String>,
    pub cxx: Option<String>,
    pub ld: Option<String>,
    pub ar: Option<String>,
}

impl Toolchain {
    /// `CC_target` beats `CC` for the target toolset; the host only reads `CC_host`.
    pub fn from_env(env: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str, suffix: &str| {
            env(&format!("{name}_{suffix}")).or_else(|| {
                if suffix == "target" {
                    env(name)
                } else {
                    None
                }
            })
        };
        let tools = |suffix: &str| Tools {
            cc: read("CC", suffix),
            cxx: read("CXX", suffix),
            ld: read("LD", suffix),
            ar: read("AR", suffix),
        };
        Toolchain {
            target: tools("target"),
            host: tools("host"),
        }
    }
}

/// The settings of one invocation.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct BuildContext {
    /// Build files named on the command line, as given.
    pub build_files: Vec<String>,
    /// `-D` and `GYP_DEFINES` values; they override every build-file default.
    #[builder(default)]
    pub defines: Mapping,
    /// Files included ahead of every build file's own includes.
    #[builder(default)]
    pub includes: Vec<String>,
    #[builder(default)]
    pub generator_flags: IndexMap<String, String>,
    #[builder(default = "vec![\"make\".to_string()]")]
    pub formats: Vec<String>,
    /// Where generated files go, relative to the toplevel directory.
    #[builder(default)]
    pub generator_output: Option<String>,
    #[builder(default)]
    pub depth: Option<String>,
    #[builder(default)]
    pub check: bool,
    #[builder(default)]
    pub command_timeout: Option<Duration>,
    #[builder(default)]
    pub toolchain: Toolchain,
    /// Arguments that reproduce this run, minus the build files, for regeneration rules.
    #[builder(default)]
    pub regenerate_args: Vec<String>,
    #[builder(default = "\"gyp\".to_string()")]
    pub gyp_binary: String,
}

impl BuildContext {
    /// The directory every generated path is relative to: `--depth`, or the first build file's
    /// directory.
    pub fn depth(&self) -> String {
        match &self.depth {
            Some(depth) => normalize(depth),
            None => self
                .build_files
                .first()
                .map(|f| normalize(dirname(f)))
                .unwrap_or_else(|| ".".to_string()),
        }
    }

    pub fn generator_flag(&self, name: &str) -> Option<&str> {
        self.generator_flags.get(name).map(String::as_str)
    }

    /// Name of the build directory under the generator output, `out` unless overridden.
    pub fn output_dir(&self) -> &str {
        self.generator_flag("output_dir").unwrap_or("out")
    }

    /// The toplevel directory generated files are written under.
    pub fn output_root(&self) -> String {
        let depth = self.depth();
        match &self.generator_output {
            Some(out) => gypsum_util::path::join(&depth, out),
            None => depth,
        }
    }
}

/// The value a define takes: bare names are 1, canonical integers are integers.
pub fn define_value(value: Option<&str>) -> Value {
    match value {
        None => Value::Integer(1),
        Some(v) if is_canonical_int(v) => v
            .parse()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::from(v)),
        Some(v) => Value::from(v),
    }
}

/// Apply `NAME=VALUE` definitions in order; a later definition of a name replaces an earlier
/// one.
pub fn apply_defines<'a>(defines: &mut Mapping, items: impl IntoIterator<Item = &'a str>) {
    for item in items {
        let (name, value) = split_assignment(item);
        defines.insert(name.to_string(), define_value(value));
    }
}

/// Like [apply_defines] for `NAME=VALUE` generator flags, kept as strings.
pub fn apply_flags<'a>(
    flags: &mut IndexMap<String, String>,
    items: impl IntoIterator<Item = &'a str>,
) {
    for item in items {
        let (name, value) = split_assignment(item);
        flags.insert(name.to_string(), value.unwrap_or("1").to_string());
    }
}

/// Split a shell-quoted environment variable into words; unset means none.
pub fn env_words(
    env: &impl Fn(&str) -> Option<String>,
    variable: &'static str,
) -> Result<Vec<String>, ContextError> {
    match env(variable) {
        Some(value) => {
            split_words(&value).map_err(|source| ContextError::Environment { variable, source })
        }
        None => Ok(Vec::new()),
    }
}
