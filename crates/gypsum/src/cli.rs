//! Command line parsing, and building the [BuildContext] from it and the environment.

use std::fs;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use gypsum_syntax::Value;
use gypsum_util::split::split_filter_empty;
use indexmap::IndexMap;
use itertools::Itertools;
use tracing::debug;

use crate::context::{
    apply_defines, apply_flags, env_words, BuildContext, BuildContextBuilder, ContextError,
    Toolchain,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DebugMode {
    /// Variable expansion and condition evaluation.
    Variables,
    /// Include merging and build file discovery.
    Includes,
    General,
    All,
}

/// Generate build files from declarative gyp build files.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "gyp", version)]
pub struct Cli {
    /// Build files to process; every *.gyp file in the working directory when omitted.
    pub build_files: Vec<String>,

    /// Set a variable, overriding build-file defaults and GYP_DEFINES.
    #[arg(short = 'D', value_name = "VAR=VAL")]
    pub defines: Vec<String>,

    /// Include a file ahead of every build file's own includes.
    #[arg(short = 'I', long = "include", value_name = "INCLUDE")]
    pub includes: Vec<String>,

    /// Set a generator flag, overriding GYP_GENERATOR_FLAGS.
    #[arg(short = 'G', value_name = "FLAG=VAL")]
    pub generator_flags: Vec<String>,

    /// Output formats to generate; GYP_GENERATORS, or make, when omitted.
    #[arg(short = 'f', long = "format", value_delimiter = ',')]
    pub formats: Vec<String>,

    /// Write generated files under DIR instead of next to the build files.
    #[arg(long, value_name = "DIR")]
    pub generator_output: Option<String>,

    /// The toplevel directory of the source tree.
    #[arg(long, value_name = "PATH")]
    pub depth: Option<String>,

    /// Validate build files more strictly.
    #[arg(long)]
    pub check: bool,

    /// Turn on debug logging for a part of the run.
    #[arg(short = 'd', long = "debug", value_enum, value_name = "MODE")]
    pub debug: Vec<DebugMode>,

    /// Give up on a `<!(command)` after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,
}

impl Cli {
    /// The log filter `-d` asks for, used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> String {
        let mut directives = vec!["warn".to_string()];
        for mode in &self.debug {
            directives.extend(match mode {
                DebugMode::Variables => vec!["gypsum_eval=debug"],
                DebugMode::Includes => vec!["gypsum::loader=debug"],
                DebugMode::General => vec!["gypsum=debug"],
                DebugMode::All => vec!["gypsum=trace", "gypsum_eval=trace"],
            }
            .into_iter()
            .map(str::to_string));
        }
        directives.into_iter().unique().join(",")
    }

    /// Resolve the command line against the environment. Environment values come first and
    /// command line values override them.
    pub fn context(
        &self,
        env: impl Fn(&str) -> Option<String>,
        gyp_binary: &str,
    ) -> Result<BuildContext, ContextError> {
        let build_files = if self.build_files.is_empty() {
            find_build_files(".")?
        } else {
            self.build_files.clone()
        };

        let mut defines = gypsum_syntax::Mapping::new();
        let env_defines = env_words(&env, "GYP_DEFINES")?;
        apply_defines(&mut defines, env_defines.iter().map(String::as_str));
        apply_defines(&mut defines, self.defines.iter().map(String::as_str));

        let mut generator_flags = IndexMap::new();
        let env_flags = env_words(&env, "GYP_GENERATOR_FLAGS")?;
        apply_flags(&mut generator_flags, env_flags.iter().map(String::as_str));
        apply_flags(&mut generator_flags, self.generator_flags.iter().map(String::as_str));

        let formats = if !self.formats.is_empty() {
            self.formats.clone()
        } else {
            match env("GYP_GENERATORS") {
                Some(value) => split_filter_empty(&value, ",").map(str::to_string).collect(),
                None => vec!["make".to_string()],
            }
        };

        let generator_output = self
            .generator_output
            .clone()
            .or_else(|| env("GYP_GENERATOR_OUTPUT"));

        let regenerate_args = regenerate_args(
            &defines,
            &self.includes,
            &generator_flags,
            generator_output.as_deref(),
            self.depth.as_deref(),
            self.check,
            self.command_timeout,
        );
        debug!("formats {formats:?}, {} defines", defines.len());

        BuildContextBuilder::default()
            .build_files(build_files)
            .defines(defines)
            .includes(self.includes.clone())
            .generator_flags(generator_flags)
            .formats(formats)
            .generator_output(generator_output)
            .depth(self.depth.clone())
            .check(self.check)
            .command_timeout(self.command_timeout.map(Duration::from_secs))
            .toolchain(Toolchain::from_env(&env))
            .regenerate_args(regenerate_args)
            .gyp_binary(gyp_binary)
            .build()
            .map_err(|e| ContextError::Invalid(e.to_string()))
    }
}

/// Flags that reproduce the resolved settings, with environment values folded in, so that a
/// regeneration does not depend on the environment it runs in.
fn regenerate_args(
    defines: &gypsum_syntax::Mapping,
    includes: &[String],
    generator_flags: &IndexMap<String, String>,
    generator_output: Option<&str>,
    depth: Option<&str>,
    check: bool,
    command_timeout: Option<u64>,
) -> Vec<String> {
    let mut args = Vec::new();
    for (name, value) in defines {
        match value {
            Value::Integer(1) => args.push(format!("-D{name}")),
            other => args.push(format!(
                "-D{name}={}",
                other.to_scalar_string().unwrap_or_default()
            )),
        }
    }
    args.extend(includes.iter().map(|i| format!("-I{i}")));
    args.extend(generator_flags.iter().map(|(k, v)| format!("-G{k}={v}")));
    if let Some(output) = generator_output {
        args.push(format!("--generator-output={output}"));
    }
    if let Some(depth) = depth {
        args.push(format!("--depth={depth}"));
    }
    if check {
        args.push("--check".to_string());
    }
    if let Some(secs) = command_timeout {
        args.push(format!("--command-timeout={secs}"));
    }
    args
}

/// Every `*.gyp` file directly in `dir`, sorted.
fn find_build_files(dir: &str) -> Result<Vec<String>, ContextError> {
    let io_error = |source| ContextError::Io {
        path: dir.to_string(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "gyp") {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push(name.to_string());
            }
        }
    }
    if files.is_empty() {
        return Err(ContextError::NoBuildFiles(dir.to_string()));
    }
    files.sort();
    Ok(files)
}
